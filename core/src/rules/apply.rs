use tracing::trace;

use super::book::RuleBook;
use super::change::{Change, PropertyChange};
use super::registry::GameRegistry;

/// Applies one recorded change to the book and registry. This is the only place node and
/// registry state is written after compilation.
///
/// # Panics
///
/// Panics if a property change targets a node kind that does not carry that property.
pub fn apply_change(book: &mut RuleBook, registry: &mut GameRegistry, change: &Change) {
    match change {
        Change::NodeProperty { target, change } => {
            trace!(node = book.name_of(*target), property = change.name(), "apply property");
            let node = book.node_mut(*target);
            let name = node.name.clone();
            match change {
                PropertyChange::Chance(chance) => node.core.chance = *chance,
                PropertyChange::Uses(uses) => {
                    node.trigger_mut()
                        .unwrap_or_else(|| panic!("{name} はトリガーではありません"))
                        .uses = *uses;
                }
                PropertyChange::UsedThisRound(used) => {
                    node.trigger_mut()
                        .unwrap_or_else(|| panic!("{name} はトリガーではありません"))
                        .used_this_round = *used;
                }
                PropertyChange::AttemptsLeftThisTurn(attempts) => {
                    node.action_mut()
                        .unwrap_or_else(|| panic!("{name} はアクションではありません"))
                        .attempts_left = *attempts;
                }
                PropertyChange::Switch(switch) => {
                    node.rules_mut()
                        .unwrap_or_else(|| panic!("{name} はルールノードではありません"))
                        .switch = *switch;
                }
            }
        }
        Change::Relationship {
            first, second, to, ..
        } => registry.set_relationship(*first, *second, *to),
        Change::Resource {
            player,
            resource,
            delta,
        } => registry.adjust_resource(*player, resource, *delta),
        Change::AdvanceRound => registry.advance_round(),
        Change::Composite { changes } => {
            for inner in changes {
                apply_change(book, registry, inner);
            }
        }
    }
}

pub fn apply_all<'a, I>(book: &mut RuleBook, registry: &mut GameRegistry, changes: I)
where
    I: IntoIterator<Item = &'a Change>,
{
    for change in changes {
        apply_change(book, registry, change);
    }
}
