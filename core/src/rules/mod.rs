mod action;
mod apply;
mod book;
mod bridge;
mod chance;
mod change;
mod compiler;
mod condition;
mod constants;
mod error;
mod evaluator;
mod loader;
mod node;
mod politics;
mod registry;
mod trigger;

#[cfg(test)]
pub(crate) mod test_support;

pub use action::{
    can_perform, other_players, reset_all_attempts, reset_attempts, use_attempt, valid_actions,
    would_change_anything,
};
pub use apply::{apply_all, apply_change};
pub use book::RuleBook;
pub use bridge::{HistoryEvent, Notification, RecordingBridge};
pub use chance::{ChanceContext, ChancePacing, adjusted_chance, test_chance};
pub use change::{Change, DelegateBridge, PropertyChange, RandomSource, StdRandomSource};
pub use compiler::{CompiledScenario, EngineSettings, ScenarioRaw, compile};
pub use error::DefinitionError;
pub use evaluator::{
    SatisfactionMap, collect_transitive_closure, evaluate_all, evaluate_closure, is_satisfied,
};
pub use loader::{
    ScenarioSource, builtin_scenario_names, load_builtin_scenario, load_default_scenario,
    load_scenario_file, parse_and_compile,
};
pub use node::{
    ActionState, Chance, Combinator, ConditionCore, ConditionNode, NodeId, NodeKind,
    PhaseRelation, RelationshipChange, RelationshipCheck, RelationshipMatch, ResourceAmount,
    RoundRange, RulesCheck, TriggerRelationshipChange, TriggerState, When,
};
pub use politics::{AcceptAll, AcceptancePolicy, AttemptOutcome, attempt_action};
pub use registry::{
    Archetype, GameRegistry, Player, PlayerId, RelationshipType, RelationshipTypeId,
};
pub use trigger::{
    PhaseFilter, collect_and_fire, consume_round_uses, fire, fire_activated, fire_effects,
    select_eligible, set_uses_for_when_triggers,
};
