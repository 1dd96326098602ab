use tracing::info;

use super::action::{can_perform, other_players, use_attempt};
use super::book::RuleBook;
use super::chance::{ChanceContext, test_chance};
use super::change::{Change, DelegateBridge};
use super::compiler::EngineSettings;
use super::evaluator::evaluate_closure;
use super::node::{ConditionNode, NodeId, NodeKind};
use super::registry::{GameRegistry, PlayerId};
use super::trigger::fire_activated;

/// Decides whether a player agrees to an action that needs their acceptance.
pub trait AcceptancePolicy {
    fn accepts(&mut self, player: PlayerId, action: &ConditionNode) -> bool;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AcceptancePolicy for AcceptAll {
    fn accepts(&mut self, _player: PlayerId, _action: &ConditionNode) -> bool {
        true
    }
}

impl<F> AcceptancePolicy for F
where
    F: FnMut(PlayerId, &ConditionNode) -> bool,
{
    fn accepts(&mut self, player: PlayerId, action: &ConditionNode) -> bool {
        self(player, action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// Conditions no longer hold, no attempts are left, or the node is not an action.
    NotValid,
    InsufficientFunds { cost: i64, available: i64 },
    ChanceFailed,
    Rejected { by: PlayerId },
    /// `effects` counts relationship changes for political actions and fired triggers for
    /// user actions.
    Succeeded { effects: usize },
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, AttemptOutcome::Succeeded { .. })
    }
}

/// Attempts an action for its owner: validity, payment, attempt budget, chance roll,
/// acceptance, then the action's effects. Every step is recorded on `bridge`.
pub fn attempt_action(
    book: &RuleBook,
    registry: &GameRegistry,
    id: NodeId,
    bridge: &mut dyn DelegateBridge,
    settings: &EngineSettings,
    policy: &mut dyn AcceptancePolicy,
) -> AttemptOutcome {
    let node = book.node(id);
    let owner = node.owner;
    let owner_name = registry.player_name(owner);
    let Some(action) = node.action() else {
        return AttemptOutcome::NotValid;
    };

    let map = evaluate_closure(book, registry, [id]);
    if !action.has_attempts_left() || !can_perform(book, id, &map) {
        bridge.report_to_player(
            owner,
            &format!("{} はもう実行できません", action.text),
        );
        return AttemptOutcome::NotValid;
    }

    let resource = settings.cost_resource.as_str();
    let cost = i64::from(action.cost);
    let available = registry.resource_of(owner, resource);
    if available < cost {
        bridge.report_to_player(
            owner,
            &format!(
                "{} の実行には {cost} {resource} が必要です (所持: {available})",
                action.text
            ),
        );
        return AttemptOutcome::InsufficientFunds { cost, available };
    }

    bridge.start_event(&format!("{owner_name} が {} を試みます", action.text));
    if cost > 0 {
        bridge.add_change(Change::Resource {
            player: owner,
            resource: resource.to_string(),
            delta: -cost,
        });
        bridge.add_child_to_event(&format!(
            "{owner_name} が {cost} {resource} を支払いました (残り {})",
            available - cost
        ));
    }
    use_attempt(book, id, bridge);

    let audience = other_players(book, id);
    if !test_chance(
        book,
        registry,
        id,
        bridge,
        settings.pacing(),
        ChanceContext::Attempt,
    ) {
        let message = format!("{owner_name} の {} は失敗しました", action.text);
        notify(bridge, owner, &audience, &message);
        info!(action = node.name.as_str(), "attempt failed on chance");
        return AttemptOutcome::ChanceFailed;
    }

    for player in &action.accepting_players {
        if !policy.accepts(*player, node) {
            let message = format!(
                "{} が {owner_name} の {} を拒否しました",
                registry.player_name(*player),
                action.text
            );
            bridge.add_child_to_event(&message);
            notify(bridge, owner, &audience, &message);
            info!(
                action = node.name.as_str(),
                by = registry.player_name(*player),
                "attempt rejected"
            );
            return AttemptOutcome::Rejected { by: *player };
        }
    }

    let effects = match &node.kind {
        NodeKind::PoliticalAction {
            relationship_changes,
            ..
        } => {
            let mut changed = 0;
            for change in relationship_changes {
                let current = registry.relationship(change.first, change.second);
                if current == change.to {
                    continue;
                }
                bridge.add_change(Change::Relationship {
                    first: change.first,
                    second: change.second,
                    from: current,
                    to: change.to,
                });
                bridge.add_child_to_event(&format!(
                    "{} と {} の関係が {} から {} に変化しました",
                    registry.player_name(change.first),
                    registry.player_name(change.second),
                    registry.relationship_type(current).name,
                    registry.relationship_type(change.to).name
                ));
                changed += 1;
            }
            changed
        }
        NodeKind::UserAction {
            activate_triggers, ..
        } => fire_activated(book, registry, activate_triggers, bridge).len(),
        _ => 0,
    };

    let message = format!("{owner_name} の {} は成功しました", action.text);
    notify(bridge, owner, &audience, &message);
    info!(action = node.name.as_str(), effects, "attempt succeeded");
    AttemptOutcome::Succeeded { effects }
}

fn notify(bridge: &mut dyn DelegateBridge, owner: PlayerId, audience: &[PlayerId], message: &str) {
    bridge.report_to_player(owner, message);
    for player in audience {
        bridge.report_to_player(*player, message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::apply::apply_all;
    use crate::rules::test_support::{compile_yaml_scenario, scripted_bridge};

    const SCENARIO: &str = r#"
players: [Germany, Russia, Japan]
relationship_types:
  - { name: Neutrality, archetype: neutral }
  - { name: War, archetype: war }
  - { name: Alliance, archetype: allied }
resources: [PUs]
initial_resources:
  - { player: Germany, resource: PUs, amount: 12 }
nodes:
  - name: alliance
    kind: political_action
    owner: Germany
    text: 日独同盟
    cost: 5
    chance: "3:6"
    chanceIncrementOnFailure: 1
    actionAccept: "Japan"
    relationshipChange: ["Germany:Japan:Alliance"]
  - { name: always_true, kind: rules, owner: Germany }
  - name: mobilize
    kind: user_action
    owner: Germany
    text: 総動員
    activateTrigger: ["bonus"]
  - { name: bonus, kind: trigger, owner: Germany, conditions: "always_true", resourceGrant: ["PUs:7"] }
"#;

    #[test]
    fn successful_attempt_charges_rolls_and_changes_relationships() {
        let mut scenario = compile_yaml_scenario(SCENARIO);
        let alliance = scenario.book.find("alliance").unwrap();
        let germany = scenario.registry.player_id("Germany").unwrap();
        let japan = scenario.registry.player_id("Japan").unwrap();
        let allied = scenario.registry.relationship_type_id("Alliance").unwrap();
        let mut bridge = scripted_bridge(vec![0]);

        let outcome = attempt_action(
            &scenario.book,
            &scenario.registry,
            alliance,
            &mut bridge,
            &scenario.settings,
            &mut AcceptAll,
        );
        assert_eq!(outcome, AttemptOutcome::Succeeded { effects: 1 });

        let changes = bridge.take_changes();
        apply_all(&mut scenario.book, &mut scenario.registry, &changes);
        assert_eq!(scenario.registry.resource_of(germany, "PUs"), 7);
        assert_eq!(scenario.registry.relationship(germany, japan), allied);
        assert_eq!(
            scenario.book.node(alliance).action().unwrap().attempts_left,
            0
        );
        assert_eq!(bridge.history().len(), 1);
    }

    #[test]
    fn insufficient_funds_stops_before_any_change() {
        let mut scenario = compile_yaml_scenario(SCENARIO);
        let alliance = scenario.book.find("alliance").unwrap();
        let germany = scenario.registry.player_id("Germany").unwrap();
        apply_all(
            &mut scenario.book,
            &mut scenario.registry,
            &[Change::Resource {
                player: germany,
                resource: "PUs".to_string(),
                delta: -10,
            }],
        );
        let mut bridge = scripted_bridge(Vec::new());

        let outcome = attempt_action(
            &scenario.book,
            &scenario.registry,
            alliance,
            &mut bridge,
            &scenario.settings,
            &mut AcceptAll,
        );

        assert_eq!(
            outcome,
            AttemptOutcome::InsufficientFunds {
                cost: 5,
                available: 2
            }
        );
        assert!(bridge.pending_changes().is_empty());
        assert_eq!(bridge.notifications().len(), 1);
    }

    #[test]
    fn failed_roll_still_spends_cost_and_attempt() {
        let scenario = compile_yaml_scenario(SCENARIO);
        let alliance = scenario.book.find("alliance").unwrap();
        let mut bridge = scripted_bridge(vec![5]);

        let outcome = attempt_action(
            &scenario.book,
            &scenario.registry,
            alliance,
            &mut bridge,
            &scenario.settings,
            &mut AcceptAll,
        );

        assert_eq!(outcome, AttemptOutcome::ChanceFailed);
        let kinds: Vec<&Change> = bridge.pending_changes().iter().collect();
        assert_eq!(kinds.len(), 3);
        assert!(matches!(kinds[0], Change::Resource { delta: -5, .. }));
        assert!(matches!(kinds[2], Change::NodeProperty { .. }));
    }

    #[test]
    fn rejection_by_an_accepting_player_blocks_the_change() {
        let scenario = compile_yaml_scenario(SCENARIO);
        let alliance = scenario.book.find("alliance").unwrap();
        let japan = scenario.registry.player_id("Japan").unwrap();
        let mut bridge = scripted_bridge(vec![0]);
        let mut refuse = |_player: PlayerId, _action: &ConditionNode| false;

        let outcome = attempt_action(
            &scenario.book,
            &scenario.registry,
            alliance,
            &mut bridge,
            &scenario.settings,
            &mut refuse,
        );

        assert_eq!(outcome, AttemptOutcome::Rejected { by: japan });
        assert!(
            bridge
                .pending_changes()
                .iter()
                .all(|change| !matches!(change, Change::Relationship { .. }))
        );
    }

    #[test]
    fn user_action_fires_its_activated_triggers() {
        let mut scenario = compile_yaml_scenario(SCENARIO);
        let mobilize = scenario.book.find("mobilize").unwrap();
        let germany = scenario.registry.player_id("Germany").unwrap();
        let mut bridge = scripted_bridge(Vec::new());

        let outcome = attempt_action(
            &scenario.book,
            &scenario.registry,
            mobilize,
            &mut bridge,
            &scenario.settings,
            &mut AcceptAll,
        );
        assert_eq!(outcome, AttemptOutcome::Succeeded { effects: 1 });

        let changes = bridge.take_changes();
        apply_all(&mut scenario.book, &mut scenario.registry, &changes);
        assert_eq!(scenario.registry.resource_of(germany, "PUs"), 19);
    }

    #[test]
    fn attempt_without_attempts_left_is_not_valid() {
        let mut scenario = compile_yaml_scenario(SCENARIO);
        let alliance = scenario.book.find("alliance").unwrap();
        let mut bridge = scripted_bridge(vec![0]);
        attempt_action(
            &scenario.book,
            &scenario.registry,
            alliance,
            &mut bridge,
            &scenario.settings,
            &mut AcceptAll,
        );
        let changes = bridge.take_changes();
        apply_all(&mut scenario.book, &mut scenario.registry, &changes);

        let outcome = attempt_action(
            &scenario.book,
            &scenario.registry,
            alliance,
            &mut bridge,
            &scenario.settings,
            &mut AcceptAll,
        );
        assert_eq!(outcome, AttemptOutcome::NotValid);
        assert_eq!(bridge.draw_count(), 1);
    }
}
