//! Definition validation CLI
//!
//! Loads every encounter definition TOML under a directory and reports
//! structural problems: unparseable files, duplicate ids, out-of-order phase
//! thresholds, chances outside [0, 1], inverted reward ranges. Exits
//! non-zero when anything is wrong, for use in CI and data review.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use incursion_core::load_definitions_from_file;

#[derive(Parser)]
#[command(version, about = "validate incursion encounter definition files")]
struct Args {
    /// Directory of definition TOML files (searched recursively)
    #[arg(default_value = "data/definitions")]
    dir: PathBuf,

    /// Print every definition checked, not just the ones with problems
    #[arg(long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let args = Args::parse();

    if !args.dir.exists() {
        eprintln!("directory {} does not exist", args.dir.display());
        return ExitCode::FAILURE;
    }

    let mut files = Vec::new();
    collect_toml_files(&args.dir, &mut files);
    files.sort();

    let mut checked = 0usize;
    let mut problem_count = 0usize;
    let mut seen_ids: HashSet<String> = HashSet::new();

    for file in &files {
        match load_definitions_from_file(file) {
            Ok(definitions) => {
                for def in definitions {
                    checked += 1;
                    let mut problems = def.validate();
                    if !seen_ids.insert(def.id.clone()) {
                        problems.push(format!("id '{}' already defined in another file", def.id));
                    }

                    if problems.is_empty() {
                        if args.verbose {
                            println!("ok   {} ({})", def.id, file.display());
                        }
                    } else {
                        problem_count += problems.len();
                        println!("FAIL {} ({})", def.id, file.display());
                        for problem in problems {
                            println!("     - {problem}");
                        }
                    }
                }
            }
            Err(e) => {
                problem_count += 1;
                println!("FAIL {}", file.display());
                println!("     - {e}");
            }
        }
    }

    println!(
        "checked {} definitions in {} files: {} problem(s)",
        checked,
        files.len(),
        problem_count
    );

    if problem_count > 0 {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn collect_toml_files(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_toml_files(&path, files);
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            files.push(path);
        }
    }
}
