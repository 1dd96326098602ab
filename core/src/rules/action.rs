use std::collections::BTreeSet;

use super::book::RuleBook;
use super::change::{Change, DelegateBridge, PropertyChange};
use super::evaluator::{SatisfactionMap, evaluate_closure, is_satisfied};
use super::node::{NodeId, NodeKind};
use super::registry::{GameRegistry, PlayerId};

/// An action with no conditions can always be performed.
pub fn can_perform(book: &RuleBook, id: NodeId, map: &SatisfactionMap) -> bool {
    book.node(id).core.children.is_empty() || is_satisfied(book, id, map)
}

/// Restores the per-turn attempt budget. Emits nothing when the budget is already full.
pub fn reset_attempts(book: &RuleBook, id: NodeId, bridge: &mut dyn DelegateBridge) {
    let Some(action) = book.node(id).action() else {
        return;
    };
    if action.attempts_left == action.attempts_per_turn {
        return;
    }
    bridge.add_change(Change::property(
        id,
        PropertyChange::AttemptsLeftThisTurn(action.attempts_per_turn),
    ));
}

pub fn reset_all_attempts(book: &RuleBook, bridge: &mut dyn DelegateBridge) {
    for id in book.actions() {
        reset_attempts(book, id, bridge);
    }
}

pub fn use_attempt(book: &RuleBook, id: NodeId, bridge: &mut dyn DelegateBridge) {
    let Some(action) = book.node(id).action() else {
        return;
    };
    bridge.add_change(Change::property(
        id,
        PropertyChange::AttemptsLeftThisTurn(action.attempts_left.saturating_sub(1)),
    ));
}

/// Players affected by a political action's relationship changes, excluding its owner.
pub fn other_players(book: &RuleBook, id: NodeId) -> Vec<PlayerId> {
    let node = book.node(id);
    let NodeKind::PoliticalAction {
        relationship_changes,
        ..
    } = &node.kind
    else {
        return Vec::new();
    };
    let players: BTreeSet<PlayerId> = relationship_changes
        .iter()
        .flat_map(|change| [change.first, change.second])
        .filter(|player| *player != node.owner)
        .collect();
    players.into_iter().collect()
}

/// Whether performing the action would alter anything right now. Political actions need at
/// least one relationship change whose target differs from the current relationship.
pub fn would_change_anything(book: &RuleBook, registry: &GameRegistry, id: NodeId) -> bool {
    match &book.node(id).kind {
        NodeKind::PoliticalAction {
            relationship_changes,
            ..
        } => relationship_changes
            .iter()
            .any(|change| registry.relationship(change.first, change.second) != change.to),
        _ => true,
    }
}

/// Actions `player` may attempt this turn, in definition order.
pub fn valid_actions(book: &RuleBook, registry: &GameRegistry, player: PlayerId) -> Vec<NodeId> {
    let owned: Vec<NodeId> = book.actions_of(player).collect();
    let map = evaluate_closure(book, registry, owned.iter().copied());
    owned
        .into_iter()
        .filter(|id| {
            book.node(*id)
                .action()
                .is_some_and(|action| action.has_attempts_left())
                && can_perform(book, *id, &map)
                && would_change_anything(book, registry, *id)
        })
        .collect()
}
