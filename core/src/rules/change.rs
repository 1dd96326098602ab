use rand::Rng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use super::node::{Chance, NodeId};
use super::registry::{PlayerId, RelationshipTypeId};

/// New value for one mutable property of a node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "property", content = "value", rename_all = "camelCase")]
pub enum PropertyChange {
    Chance(Chance),
    Uses(i32),
    UsedThisRound(bool),
    AttemptsLeftThisTurn(u32),
    Switch(bool),
}

impl PropertyChange {
    pub fn name(&self) -> &'static str {
        match self {
            PropertyChange::Chance(_) => "chance",
            PropertyChange::Uses(_) => "uses",
            PropertyChange::UsedThisRound(_) => "usedThisRound",
            PropertyChange::AttemptsLeftThisTurn(_) => "attemptsLeftThisTurn",
            PropertyChange::Switch(_) => "switch",
        }
    }
}

/// A recorded description of a state mutation. Nothing in the engine writes node or
/// registry state directly; it emits one of these and the application layer applies it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Change {
    NodeProperty {
        target: NodeId,
        change: PropertyChange,
    },
    Relationship {
        first: PlayerId,
        second: PlayerId,
        from: RelationshipTypeId,
        to: RelationshipTypeId,
    },
    Resource {
        player: PlayerId,
        resource: String,
        delta: i64,
    },
    AdvanceRound,
    Composite {
        changes: Vec<Change>,
    },
}

impl Change {
    pub fn property(target: NodeId, change: PropertyChange) -> Self {
        Change::NodeProperty { target, change }
    }

    pub fn composite(changes: Vec<Change>) -> Self {
        Change::Composite { changes }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Change::Composite { changes } => changes.iter().all(Change::is_empty),
            _ => false,
        }
    }
}

/// Source of randomness for chance gates.
pub trait RandomSource {
    /// Returns an integer in `[0, sides)`. `label` describes what the draw is for.
    fn draw(&mut self, sides: u32, label: &str) -> u32;
}

#[derive(Debug)]
pub struct StdRandomSource {
    rng: StdRng,
}

impl StdRandomSource {
    pub fn new(rng: StdRng) -> Self {
        Self { rng }
    }
}

impl RandomSource for StdRandomSource {
    fn draw(&mut self, sides: u32, _label: &str) -> u32 {
        if sides == 0 {
            return 0;
        }
        self.rng.gen_range(0..sides)
    }
}

/// Everything the engine is allowed to touch while it runs a game step: the change
/// recorder, the history log, the random source and the per-player message channel.
pub trait DelegateBridge {
    fn add_change(&mut self, change: Change);
    fn start_event(&mut self, text: &str);
    fn add_child_to_event(&mut self, text: &str);
    fn random(&mut self, sides: u32, label: &str) -> u32;
    fn report_to_player(&mut self, player: PlayerId, message: &str);
}
