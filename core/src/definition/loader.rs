//! Definition loading
//!
//! Loads encounter definitions from TOML files, recursively over a directory.
//! Files use the consolidated format: an optional `[region]` header plus one
//! or more `[[encounter]]` tables. Malformed files are reported and skipped
//! so one bad file never takes down the whole store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use hashbrown::HashMap;
use thiserror::Error;

use super::{DefinitionConfig, EncounterDefinition};

#[derive(Debug, Error)]
pub enum DefinitionError {
    #[error("failed to read {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("duplicate definition id '{0}'")]
    DuplicateId(String),
}

/// Load encounter definitions from a single TOML file.
/// A `[region]` header, when present, fills in the tier on encounters that
/// don't set their own.
pub fn load_definitions_from_file(path: &Path) -> Result<Vec<EncounterDefinition>, DefinitionError> {
    let content = fs::read_to_string(path).map_err(|source| DefinitionError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    let config: DefinitionConfig =
        toml::from_str(&content).map_err(|source| DefinitionError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let mut encounters = config.encounters;
    if let Some(region) = config.region
        && let Some(region_tier) = region.tier
    {
        for def in &mut encounters {
            if def.tier == super::default_tier() {
                def.tier = region_tier;
            }
        }
    }

    Ok(encounters)
}

/// Load all encounter definitions from a directory (recursive).
/// Unparseable files are logged and skipped.
pub fn load_definitions_from_dir(dir: &Path) -> Result<Vec<EncounterDefinition>, DefinitionError> {
    let mut definitions = Vec::new();
    if !dir.exists() {
        return Ok(definitions);
    }
    load_recursive(dir, &mut definitions)?;
    Ok(definitions)
}

fn load_recursive(
    dir: &Path,
    definitions: &mut Vec<EncounterDefinition>,
) -> Result<(), DefinitionError> {
    let entries = fs::read_dir(dir).map_err(|source| DefinitionError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            load_recursive(&path, definitions)?;
        } else if path.extension().is_some_and(|ext| ext == "toml") {
            match load_definitions_from_file(&path) {
                Ok(file_definitions) => {
                    for def in &file_definitions {
                        tracing::debug!(id = %def.id, file = %path.display(), "loaded definition");
                    }
                    definitions.extend(file_definitions);
                }
                Err(e) => {
                    tracing::warn!(file = %path.display(), error = %e, "skipping definition file");
                }
            }
        }
    }

    Ok(())
}

/// Immutable, id-indexed set of definitions. Built once at startup and shared
/// read-only with every live encounter.
#[derive(Debug, Default)]
pub struct DefinitionStore {
    by_id: HashMap<String, Arc<EncounterDefinition>>,
}

impl DefinitionStore {
    pub fn new(definitions: Vec<EncounterDefinition>) -> Result<Self, DefinitionError> {
        let mut by_id = HashMap::with_capacity(definitions.len());
        for def in definitions {
            let id = def.id.clone();
            if by_id.insert(id.clone(), Arc::new(def)).is_some() {
                return Err(DefinitionError::DuplicateId(id));
            }
        }
        Ok(Self { by_id })
    }

    pub fn from_dir(dir: &Path) -> Result<Self, DefinitionError> {
        Self::new(load_definitions_from_dir(dir)?)
    }

    pub fn get(&self, definition_id: &str) -> Option<Arc<EncounterDefinition>> {
        self.by_id.get(definition_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<EncounterDefinition>> {
        self.by_id.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONSOLIDATED: &str = r#"
        [region]
        name = "Emberhold"
        tier = 3

        [[encounter]]
        id = "ashen_colossus"
        display_name = "The Ashen Colossus"
        base_pool_size = 50000
        level_requirement = 20

        [[encounter.phase]]
        threshold_percent = 50.0
        mechanics = ["enrage"]

        [[encounter.ability]]
        id = "molten_slam"
        name = "Molten Slam"
        cooldown_secs = 30.0
        targeting = "single"
        effect = { kind = "damage", amount = 250 }
    "#;

    #[test]
    fn parses_consolidated_format_and_inherits_tier() {
        let config: DefinitionConfig = toml::from_str(CONSOLIDATED).expect("parse");
        assert_eq!(config.encounters.len(), 1);
        assert_eq!(config.region.as_ref().map(|r| r.tier), Some(Some(3)));

        let def = &config.encounters[0];
        assert_eq!(def.id, "ashen_colossus");
        assert_eq!(def.phases.len(), 1);
        assert_eq!(def.abilities.len(), 1);
    }

    #[test]
    fn store_rejects_duplicate_ids() {
        let config: DefinitionConfig = toml::from_str(CONSOLIDATED).expect("parse");
        let mut defs = config.encounters.clone();
        defs.extend(config.encounters);
        let result = DefinitionStore::new(defs);
        assert!(matches!(result, Err(DefinitionError::DuplicateId(id)) if id == "ashen_colossus"));
    }

    #[test]
    fn store_lookup() {
        let config: DefinitionConfig = toml::from_str(CONSOLIDATED).expect("parse");
        let store = DefinitionStore::new(config.encounters).expect("store");
        assert!(store.get("ashen_colossus").is_some());
        assert!(store.get("missing").is_none());
    }
}
