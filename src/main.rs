//! Incursion admin console
//!
//! Interactive REPL over a live encounter registry: spawn and announce
//! encounters, drive joins/attacks/abilities by hand, and watch the signal
//! stream the transport layer would normally fan out to clients.

use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use incursion_core::{
    Clock, DefinitionStore, EncounterRegistry, EncounterSignal, EngineConfig, HistoryStore,
    JsonHistoryStore, SystemClock,
};

mod commands;

#[derive(Parser)]
#[command(version, about = "incursion encounter engine admin console")]
struct Args {
    /// Directory of encounter definition TOML files
    #[arg(long, default_value = "data/definitions")]
    definitions: PathBuf,

    /// Directory for history/achievement persistence (defaults to the
    /// platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let data_dir = args
        .data_dir
        .or_else(|| dirs::data_dir().map(|d| d.join("incursion")))
        .unwrap_or_else(|| PathBuf::from(".incursion"));

    let definitions =
        DefinitionStore::from_dir(&args.definitions).map_err(|e| e.to_string())?;
    println!(
        "loaded {} definitions from {}",
        definitions.len(),
        args.definitions.display()
    );

    let registry = Arc::new(EncounterRegistry::new(
        definitions,
        EngineConfig::load(),
        Arc::new(SystemClock) as Arc<dyn Clock>,
        Arc::new(JsonHistoryStore::new(data_dir)) as Arc<dyn HistoryStore>,
    ));

    // Print the signal stream as the transport layer would see it
    let mut rx = registry.bus().subscribe();
    tokio::spawn(async move {
        while let Ok(signal) = rx.recv().await {
            print_signal(&signal);
        }
    });

    loop {
        let line = readline()?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match respond(line, &registry) {
            Ok(quit) => {
                if quit {
                    break;
                }
            }
            Err(err) => {
                writeln!(std::io::stdout(), "{err}").map_err(|e| e.to_string())?;
                std::io::stdout().flush().map_err(|e| e.to_string())?;
            }
        }
    }

    Ok(())
}

#[derive(Parser)]
#[command(version, about = "console")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Spawn an encounter from a definition
    Spawn {
        definition: String,
        #[arg(default_value = "unknown")]
        location: String,
        #[arg(long, default_value_t = 1.0)]
        modifier: f64,
    },
    /// Announce a scheduled encounter (starts the countdown)
    Announce { id: u64 },
    /// Join a player into an encounter
    Join {
        id: u64,
        player: i64,
        name: String,
        #[arg(long, default_value_t = 50)]
        level: u16,
        #[arg(long, default_value_t = 500)]
        hp: i32,
    },
    /// Remove a player (contribution is retained)
    Leave { id: u64, player: i64 },
    /// Deal damage to the shared pool
    Attack {
        id: u64,
        player: i64,
        damage: i64,
        #[arg(long)]
        critical: bool,
        #[arg(long, default_value = "attack")]
        source: String,
    },
    /// Trigger an adversary ability
    Ability { id: u64, ability: String },
    /// Heal a participant
    Heal {
        id: u64,
        player: i64,
        target: i64,
        amount: i64,
    },
    /// Log repair/utility contribution
    Repair { id: u64, player: i64, amount: i64 },
    /// Report the defended structure destroyed
    Fail { id: u64 },
    /// Show one encounter's state
    Status { id: u64 },
    /// List encounters, optionally by status
    List {
        #[arg(long)]
        status: Option<String>,
    },
    /// List loaded definitions
    Definitions,
    /// Show recorded history summaries
    History,
    Exit,
}

fn respond(line: &str, registry: &Arc<EncounterRegistry>) -> Result<bool, String> {
    let mut args = shlex::split(line).ok_or("error: invalid quoting")?;
    args.insert(0, "incursion".to_string());
    let cli = Cli::try_parse_from(args).map_err(|e| e.to_string())?;

    match cli.command {
        Some(Commands::Spawn {
            definition,
            location,
            modifier,
        }) => commands::spawn(registry, &definition, &location, modifier),
        Some(Commands::Announce { id }) => commands::announce(registry, id),
        Some(Commands::Join {
            id,
            player,
            name,
            level,
            hp,
        }) => commands::join(registry, id, player, &name, level, hp),
        Some(Commands::Leave { id, player }) => commands::leave(registry, id, player),
        Some(Commands::Attack {
            id,
            player,
            damage,
            critical,
            source,
        }) => commands::attack(registry, id, player, damage, critical, &source),
        Some(Commands::Ability { id, ability }) => commands::ability(registry, id, &ability),
        Some(Commands::Heal {
            id,
            player,
            target,
            amount,
        }) => commands::heal(registry, id, player, target, amount),
        Some(Commands::Repair { id, player, amount }) => {
            commands::repair(registry, id, player, amount)
        }
        Some(Commands::Fail { id }) => commands::fail(registry, id),
        Some(Commands::Status { id }) => commands::status(registry, id),
        Some(Commands::List { status }) => commands::list(registry, status.as_deref()),
        Some(Commands::Definitions) => commands::definitions(registry),
        Some(Commands::History) => commands::history(registry),
        Some(Commands::Exit) => {
            println!("quitting...");
            return Ok(true);
        }
        None => {}
    }
    Ok(false)
}

fn print_signal(signal: &EncounterSignal) {
    match signal {
        EncounterSignal::Started { encounter_id, .. } => {
            println!("[event] encounter {encounter_id} started");
        }
        EncounterSignal::PhaseChanged {
            encounter_id,
            new_phase_index,
            mechanics_delta,
            ..
        } => {
            println!(
                "[event] encounter {encounter_id} entered phase {new_phase_index} (+{})",
                mechanics_delta.join(", ")
            );
        }
        EncounterSignal::AbilityUsed {
            encounter_id,
            ability_id,
            affected_participants,
            ..
        } => {
            println!(
                "[event] encounter {encounter_id}: {ability_id} hit {:?}",
                affected_participants
            );
        }
        EncounterSignal::ProgressUpdated {
            encounter_id,
            pool_remaining,
            ..
        } => {
            println!("[event] encounter {encounter_id} pool at {pool_remaining}");
        }
        EncounterSignal::Completed {
            encounter_id,
            mvp_id,
            ..
        } => {
            println!("[event] encounter {encounter_id} completed, mvp {mvp_id:?}");
        }
        EncounterSignal::Failed { encounter_id, .. } => {
            println!("[event] encounter {encounter_id} failed");
        }
        EncounterSignal::Expired { encounter_id, .. } => {
            println!("[event] encounter {encounter_id} expired");
        }
    }
}

fn readline() -> Result<String, String> {
    write!(std::io::stdout(), "> ").map_err(|e| e.to_string())?;
    std::io::stdout().flush().map_err(|e| e.to_string())?;
    let mut buffer = String::new();
    std::io::stdin()
        .read_line(&mut buffer)
        .map_err(|e| e.to_string())?;
    Ok(buffer)
}
