use std::fmt;

use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_CHANCE_HIT, DEFAULT_CHANCE_SIDES, UNLIMITED_USES};
use super::registry::{Archetype, PlayerId, RelationshipTypeId};

/// Stable handle of a node inside a [`RuleBook`](super::RuleBook). Nodes are identified by
/// handle, never by value: two nodes with identical fields are distinct entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Folds the children's results of one node into a single boolean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Combinator {
    #[default]
    And,
    Or,
    /// Exactly one child is true.
    Xor,
    Exactly(u32),
    Between(u32, u32),
}

impl Combinator {
    /// `And` over no children is `false`, as are `Or` and `Xor`.
    pub fn combine<I>(&self, results: I) -> bool
    where
        I: IntoIterator<Item = bool>,
    {
        let mut results = results.into_iter();
        match self {
            Combinator::And => {
                let mut met = false;
                for result in results {
                    met = result;
                    if !met {
                        break;
                    }
                }
                met
            }
            Combinator::Or => results.any(|result| result),
            Combinator::Xor => results.filter(|result| *result).count() == 1,
            Combinator::Exactly(count) => results.filter(|result| *result).count() == *count as usize,
            Combinator::Between(low, high) => {
                let count = results.filter(|result| *result).count();
                count >= *low as usize && count <= *high as usize
            }
        }
    }
}

impl fmt::Display for Combinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Combinator::And => write!(f, "AND"),
            Combinator::Or => write!(f, "OR"),
            Combinator::Xor => write!(f, "XOR"),
            Combinator::Exactly(count) => write!(f, "{count}"),
            Combinator::Between(low, high) => write!(f, "{low}-{high}"),
        }
    }
}

/// `hit` out of `sides`; the default `1:1` always succeeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chance {
    pub hit: u32,
    pub sides: u32,
}

impl Chance {
    pub fn new(hit: u32, sides: u32) -> Self {
        Self { hit, sides }
    }

    pub fn is_guaranteed(&self) -> bool {
        self.sides == 0 || self.hit >= self.sides
    }

    pub fn is_impossible(&self) -> bool {
        !self.is_guaranteed() && self.hit == 0
    }
}

impl Default for Chance {
    fn default() -> Self {
        Self::new(DEFAULT_CHANCE_HIT, DEFAULT_CHANCE_SIDES)
    }
}

impl fmt::Display for Chance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.hit, self.sides)
    }
}

/// The capability every node kind shares: child conditions, how they combine, negation and
/// the chance gate.
#[derive(Debug, Clone, Default)]
pub struct ConditionCore {
    pub children: Vec<NodeId>,
    pub combinator: Combinator,
    pub invert: bool,
    pub chance: Chance,
    pub chance_increment_on_failure: u32,
    pub chance_decrement_on_success: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseRelation {
    Before,
    After,
}

impl fmt::Display for PhaseRelation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PhaseRelation::Before => write!(f, "before"),
            PhaseRelation::After => write!(f, "after"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct When {
    pub relation: PhaseRelation,
    pub phase: String,
}

impl When {
    pub fn new(relation: PhaseRelation, phase: impl Into<String>) -> Self {
        Self {
            relation,
            phase: phase.into(),
        }
    }
}

impl fmt::Display for When {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.relation, self.phase)
    }
}

/// Inclusive round range; `end == None` is open ended (`"5-+"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundRange {
    pub start: u32,
    pub end: Option<u32>,
}

impl RoundRange {
    pub fn contains(&self, round: u32) -> bool {
        round >= self.start && self.end.is_none_or(|end| round <= end)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipMatch {
    Any,
    Archetype(Archetype),
    Exactly(RelationshipTypeId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipCheck {
    pub first: PlayerId,
    pub second: PlayerId,
    pub expected: RelationshipMatch,
    /// Rounds the relationship must have lasted; `-1` accepts any age.
    pub min_rounds_existing: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceAmount {
    pub resource: String,
    pub amount: i64,
}

/// Intrinsic game-state checks of a rules node.
#[derive(Debug, Clone)]
pub struct RulesCheck {
    pub switch: bool,
    pub rounds: Vec<RoundRange>,
    pub relationships: Vec<RelationshipCheck>,
    pub resources: Vec<ResourceAmount>,
    pub players: Vec<PlayerId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRelationshipChange {
    pub first: PlayerId,
    pub second: PlayerId,
    pub from: RelationshipMatch,
    pub to: RelationshipTypeId,
}

#[derive(Debug, Clone)]
pub struct TriggerState {
    /// Remaining uses, `-1` for unlimited.
    pub uses: i32,
    pub used_this_round: bool,
    /// Empty means the trigger fires at its default location only.
    pub when: Vec<When>,
    pub notification: Option<String>,
    pub players: Vec<PlayerId>,
    pub relationship_changes: Vec<TriggerRelationshipChange>,
    pub resource_grants: Vec<ResourceAmount>,
}

impl TriggerState {
    pub fn has_uses_left(&self) -> bool {
        self.uses != 0
    }

    pub fn is_unlimited(&self) -> bool {
        self.uses == UNLIMITED_USES
    }
}

#[derive(Debug, Clone)]
pub struct ActionState {
    pub text: String,
    pub cost: u32,
    pub attempts_per_turn: u32,
    pub attempts_left: u32,
    pub accepting_players: Vec<PlayerId>,
}

impl ActionState {
    pub fn has_attempts_left(&self) -> bool {
        self.attempts_left > 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationshipChange {
    pub first: PlayerId,
    pub second: PlayerId,
    pub to: RelationshipTypeId,
}

#[derive(Debug, Clone)]
pub enum NodeKind {
    Rules(RulesCheck),
    Trigger(TriggerState),
    UserAction {
        action: ActionState,
        activate_triggers: Vec<NodeId>,
    },
    PoliticalAction {
        action: ActionState,
        relationship_changes: Vec<RelationshipChange>,
    },
}

#[derive(Debug, Clone)]
pub struct ConditionNode {
    pub name: String,
    pub owner: PlayerId,
    pub core: ConditionCore,
    pub kind: NodeKind,
}

impl ConditionNode {
    pub fn trigger(&self) -> Option<&TriggerState> {
        match &self.kind {
            NodeKind::Trigger(state) => Some(state),
            _ => None,
        }
    }

    pub(crate) fn trigger_mut(&mut self) -> Option<&mut TriggerState> {
        match &mut self.kind {
            NodeKind::Trigger(state) => Some(state),
            _ => None,
        }
    }

    pub fn action(&self) -> Option<&ActionState> {
        match &self.kind {
            NodeKind::UserAction { action, .. } | NodeKind::PoliticalAction { action, .. } => {
                Some(action)
            }
            _ => None,
        }
    }

    pub(crate) fn action_mut(&mut self) -> Option<&mut ActionState> {
        match &mut self.kind {
            NodeKind::UserAction { action, .. } | NodeKind::PoliticalAction { action, .. } => {
                Some(action)
            }
            _ => None,
        }
    }

    pub fn rules(&self) -> Option<&RulesCheck> {
        match &self.kind {
            NodeKind::Rules(check) => Some(check),
            _ => None,
        }
    }

    pub(crate) fn rules_mut(&mut self) -> Option<&mut RulesCheck> {
        match &mut self.kind {
            NodeKind::Rules(check) => Some(check),
            _ => None,
        }
    }

    pub fn kind_label(&self) -> &'static str {
        match &self.kind {
            NodeKind::Rules(_) => "rules",
            NodeKind::Trigger(_) => "trigger",
            NodeKind::UserAction { .. } => "user_action",
            NodeKind::PoliticalAction { .. } => "political_action",
        }
    }
}
