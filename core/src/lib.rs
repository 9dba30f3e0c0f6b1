pub mod clock;
pub mod config;
pub mod definition;
pub mod encounter;
pub mod error;
pub mod events;
pub mod history;
pub mod loot;
pub mod registry;


// Re-exports for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{EngineConfig, SpawnPolicy};
pub use definition::{
    AbilityDefinition, AbilityEffect, DefinitionError, DefinitionStore, EncounterDefinition,
    GuaranteedReward, PhaseDefinition, RandomReward, RewardRange, RewardTable, Targeting,
    load_definitions_from_dir, load_definitions_from_file,
};
pub use encounter::{
    AbilityOutcome, ActionKind, ActorKind, AttackOutcome, CombatLog, CombatLogEntry, Encounter,
    EncounterId, EncounterSnapshot, EncounterStatus, JoinOutcome, ParticipantLedger,
    ParticipantRecord, PhaseTransition,
};
pub use error::{EngineError, ErrorKind};
pub use events::{EncounterSignal, SignalBus};
pub use history::{
    AchievementUnlock, HistoryRecorder, HistoryStore, HistorySummary, JsonHistoryStore,
    MemoryHistoryStore, Outcome,
};
pub use loot::{AllocationContext, ItemGrant, LootDistribution, RewardBundle, effective_chance};
pub use registry::{EncounterListing, EncounterRegistry};
