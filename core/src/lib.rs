pub mod rules;
mod session;

pub use rules::{
    AcceptAll, AcceptancePolicy, AttemptOutcome, Change, ChancePacing, CompiledScenario,
    DefinitionError, EngineSettings, GameRegistry, HistoryEvent, NodeId, Notification,
    PhaseRelation, PlayerId, RuleBook, load_builtin_scenario, load_default_scenario,
    load_scenario_file,
};
pub use session::{GameSession, SessionBuilder};
