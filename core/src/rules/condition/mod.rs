mod parser;

use super::node::RelationshipMatch;
use super::registry::{GameRegistry, RelationshipTypeId};

pub(crate) use parser::{
    parse_chance, parse_condition_names, parse_condition_type, parse_political_change,
    parse_relationship_check, parse_resource_amount, parse_rounds, parse_trigger_relationship_change,
    parse_when,
};

impl RelationshipMatch {
    pub(crate) fn matches(&self, current: RelationshipTypeId, registry: &GameRegistry) -> bool {
        match self {
            RelationshipMatch::Any => true,
            RelationshipMatch::Archetype(archetype) => {
                registry.relationship_type(current).archetype == *archetype
            }
            RelationshipMatch::Exactly(expected) => *expected == current,
        }
    }

    pub(crate) fn describe(&self, registry: &GameRegistry) -> String {
        match self {
            RelationshipMatch::Any => "任意".to_string(),
            RelationshipMatch::Archetype(archetype) => format!("任意の{}", archetype.label()),
            RelationshipMatch::Exactly(id) => registry.relationship_type(*id).name.clone(),
        }
    }
}
