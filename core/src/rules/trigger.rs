use std::collections::HashSet;

use tracing::{debug, info};

use super::book::RuleBook;
use super::chance::{ChanceContext, ChancePacing, test_chance};
use super::change::{Change, DelegateBridge, PropertyChange};
use super::evaluator::{SatisfactionMap, evaluate_closure, is_satisfied};
use super::node::{NodeId, PhaseRelation, TriggerState};
use super::registry::GameRegistry;

/// A phase filter: `None` selects triggers without a `when` list.
pub type PhaseFilter<'a> = Option<(PhaseRelation, &'a str)>;

fn uses_remaining(state: &TriggerState) -> bool {
    state.has_uses_left()
}

fn when_matches(state: &TriggerState, phase: PhaseFilter<'_>) -> bool {
    match phase {
        None => state.when.is_empty(),
        Some((relation, name)) => state
            .when
            .iter()
            .any(|when| when.relation == relation && when.phase == name),
    }
}

/// Triggers among `candidates` with uses left, a matching phase filter and satisfied
/// conditions, in candidate order. Non-trigger nodes are skipped.
pub fn select_eligible<I>(
    book: &RuleBook,
    candidates: I,
    phase: PhaseFilter<'_>,
    map: &SatisfactionMap,
) -> Vec<NodeId>
where
    I: IntoIterator<Item = NodeId>,
{
    candidates
        .into_iter()
        .filter(|id| {
            book.node(*id).trigger().is_some_and(|state| {
                uses_remaining(state)
                    && when_matches(state, phase)
                    && is_satisfied(book, *id, map)
            })
        })
        .collect()
}

/// Latches `usedThisRound` the first time a limited trigger fires in a round. Already
/// latched triggers and triggers with `uses <= 0` record nothing.
pub fn fire(book: &RuleBook, id: NodeId, bridge: &mut dyn DelegateBridge) {
    let Some(state) = book.node(id).trigger() else {
        return;
    };
    if state.used_this_round || state.uses <= 0 {
        return;
    }
    bridge.add_change(Change::property(id, PropertyChange::UsedThisRound(true)));
}

/// Records the effects of a fired trigger: its notification (once per `notified` set),
/// relationship changes and resource grants.
pub fn fire_effects(
    book: &RuleBook,
    registry: &GameRegistry,
    id: NodeId,
    bridge: &mut dyn DelegateBridge,
    notified: &mut HashSet<String>,
) {
    let node = book.node(id);
    let Some(state) = node.trigger() else {
        return;
    };

    if let Some(text) = &state.notification {
        if notified.insert(text.clone()) {
            bridge.start_event(&format!("{}: {}", node.name, text));
            for player in &state.players {
                bridge.report_to_player(*player, text);
            }
        }
    }

    for change in &state.relationship_changes {
        let current = registry.relationship(change.first, change.second);
        if !change.from.matches(current, registry) || current == change.to {
            continue;
        }
        bridge.add_change(Change::Relationship {
            first: change.first,
            second: change.second,
            from: current,
            to: change.to,
        });
        bridge.start_event(&format!(
            "{}: {} と {} の関係が {} から {} に変化しました",
            node.name,
            registry.player_name(change.first),
            registry.player_name(change.second),
            registry.relationship_type(current).name,
            registry.relationship_type(change.to).name
        ));
    }

    for grant in &state.resource_grants {
        for player in &state.players {
            bridge.add_change(Change::Resource {
                player: *player,
                resource: grant.resource.clone(),
                delta: grant.amount,
            });
            bridge.start_event(&format!(
                "{}: {} が {} を {} 獲得しました",
                node.name,
                registry.player_name(*player),
                grant.resource,
                grant.amount
            ));
        }
    }
}

/// Evaluates the closure of `candidates`, selects the eligible triggers, tests each one's
/// chance and fires those that pass. Returns the fired triggers.
///
/// When a phase is given, triggers that fired with a `when` list and limited uses have one
/// use consumed immediately.
pub fn collect_and_fire(
    book: &RuleBook,
    registry: &GameRegistry,
    candidates: &[NodeId],
    phase: PhaseFilter<'_>,
    bridge: &mut dyn DelegateBridge,
    pacing: ChancePacing,
) -> Vec<NodeId> {
    let map = evaluate_closure(book, registry, candidates.iter().copied());
    let eligible = select_eligible(book, candidates.iter().copied(), phase, &map);
    debug!(
        candidates = candidates.len(),
        eligible = eligible.len(),
        "trigger selection"
    );

    let mut notified = HashSet::new();
    let mut fired = Vec::new();
    for id in eligible {
        if !test_chance(book, registry, id, bridge, pacing, ChanceContext::Trigger) {
            continue;
        }
        info!(trigger = book.name_of(id), "trigger fired");
        fire_effects(book, registry, id, bridge, &mut notified);
        fire(book, id, bridge);
        fired.push(id);
    }

    if phase.is_some() {
        set_uses_for_when_triggers(book, &fired, bridge);
    }
    fired
}

/// Fires the effects of the given triggers whose conditions hold and whose uses remain,
/// without a phase filter or chance test. Used by user actions.
pub fn fire_activated(
    book: &RuleBook,
    registry: &GameRegistry,
    triggers: &[NodeId],
    bridge: &mut dyn DelegateBridge,
) -> Vec<NodeId> {
    let map = evaluate_closure(book, registry, triggers.iter().copied());
    let mut notified = HashSet::new();
    let mut fired = Vec::new();
    for id in triggers {
        let ready = book
            .node(*id)
            .trigger()
            .is_some_and(|state| state.has_uses_left() && is_satisfied(book, *id, &map));
        if !ready {
            continue;
        }
        info!(trigger = book.name_of(*id), "trigger activated by action");
        fire_effects(book, registry, *id, bridge, &mut notified);
        fire(book, *id, bridge);
        fired.push(*id);
    }
    fired
}

/// Consumes one use of each fired phase trigger (`when` set, `uses > 0`) and clears its
/// round latch, as one composite change.
pub fn set_uses_for_when_triggers(
    book: &RuleBook,
    fired: &[NodeId],
    bridge: &mut dyn DelegateBridge,
) {
    let mut changes = Vec::new();
    for id in fired {
        let Some(state) = book.node(*id).trigger() else {
            continue;
        };
        if state.uses > 0 && !state.when.is_empty() {
            changes.push(Change::property(*id, PropertyChange::Uses(state.uses - 1)));
            changes.push(Change::property(*id, PropertyChange::UsedThisRound(false)));
        }
    }
    if changes.is_empty() {
        return;
    }
    bridge.start_event("このフェーズで使用したトリガーの残り回数を更新しました");
    bridge.add_change(Change::composite(changes));
}

/// Round boundary bookkeeping: every latched trigger loses one use (unless unlimited) and
/// has its latch cleared, as one composite change.
pub fn consume_round_uses(book: &RuleBook, bridge: &mut dyn DelegateBridge) {
    let mut changes = Vec::new();
    for id in book.triggers() {
        let Some(state) = book.node(id).trigger() else {
            continue;
        };
        if !state.used_this_round {
            continue;
        }
        if state.uses > 0 {
            changes.push(Change::property(id, PropertyChange::Uses(state.uses - 1)));
        }
        changes.push(Change::property(id, PropertyChange::UsedThisRound(false)));
    }
    if changes.is_empty() {
        return;
    }
    bridge.start_event("ラウンド終了: 使用済みトリガーの残り回数を更新しました");
    bridge.add_change(Change::composite(changes));
}
