use std::collections::VecDeque;

use rulegraph_core::rules::{Chance, RandomSource};
use rulegraph_core::{
    AcceptAll, AttemptOutcome, GameSession, PhaseRelation, SessionBuilder, load_default_scenario,
};

struct Scripted(VecDeque<u32>);

impl RandomSource for Scripted {
    fn draw(&mut self, _sides: u32, label: &str) -> u32 {
        self.0
            .pop_front()
            .unwrap_or_else(|| panic!("unexpected draw: {label}"))
    }
}

fn default_session(draws: &[u32]) -> GameSession {
    let scenario = load_default_scenario().expect("default scenario should load");
    SessionBuilder::new(scenario)
        .with_random(Box::new(Scripted(draws.iter().copied().collect())))
        .build()
}

fn relationship(session: &GameSession, first: &str, second: &str) -> String {
    let registry = session.registry();
    let first = session.find_player(first).unwrap();
    let second = session.find_player(second).unwrap();
    registry
        .relationship_type(registry.relationship(first, second))
        .name
        .clone()
}

#[test]
fn four_rounds_of_the_default_scenario() {
    // 0: pact roll succeeds, 5: first winter offensive roll fails, 2: second one succeeds.
    let mut session = default_session(&[0, 5, 2]);
    let germany = session.find_player("Germany").unwrap();
    let war_bonds = session.find_node("war_bonds").unwrap();
    let pact = session.find_node("non_aggression_pact").unwrap();
    let winter = session.find_node("winter_offensive").unwrap();

    // Round 1: war bonds pay out, then the pact goes through.
    let fired = session.run_phase(None);
    assert!(fired.contains(&war_bonds));
    assert_eq!(session.registry().resource_of(germany, "PUs"), 35);

    assert_eq!(session.valid_actions(germany), vec![pact]);
    let outcome = session
        .attempt_action(germany, pact, &mut AcceptAll)
        .unwrap();
    assert_eq!(outcome, AttemptOutcome::Succeeded { effects: 1 });
    assert_eq!(relationship(&session, "Germany", "Russia"), "NonAggression");
    assert_eq!(session.registry().resource_of(germany, "PUs"), 25);
    assert_eq!(session.book().node(pact).core.chance, Chance::new(3, 6));
    assert!(session.run_phase(Some((PhaseRelation::Before, "combat"))).is_empty());
    assert_eq!(session.end_round(), 2);

    // Rounds 2 and 3 use up the remaining war bonds.
    for _ in 0..2 {
        assert!(session.run_phase(None).contains(&war_bonds));
        session.end_round();
    }
    assert_eq!(session.round(), 4);
    assert_eq!(session.book().node(war_bonds).trigger().unwrap().uses, 0);
    assert_eq!(session.registry().resource_of(germany, "PUs"), 35);
    assert!(!session.run_phase(None).contains(&war_bonds));

    // Round 4: the winter offensive fails once, its odds improve, then it lands.
    let before_combat = Some((PhaseRelation::Before, "combat"));
    assert!(session.run_phase(before_combat).is_empty());
    assert_eq!(session.book().node(winter).core.chance, Chance::new(3, 6));
    assert_eq!(session.book().node(winter).trigger().unwrap().uses, 2);

    assert_eq!(session.run_phase(before_combat), vec![winter]);
    assert_eq!(relationship(&session, "Russia", "Germany"), "War");
    let state = session.book().node(winter).trigger().unwrap();
    assert_eq!(state.uses, 1);
    assert!(!state.used_this_round);

    assert!(!session.evaluate("single_front").unwrap());
    assert!(session.history().len() > 5);
}

#[test]
fn switch_unlocks_the_pacific_strike() {
    let mut session = default_session(&[0]);
    let strike = session.find_node("pacific_strike").unwrap();
    let after_purchase = Some((PhaseRelation::After, "purchase"));

    assert!(session.run_phase(after_purchase).is_empty());
    session.set_switch("pacific_plan", true).unwrap();
    assert_eq!(session.run_phase(after_purchase), vec![strike]);

    assert_eq!(relationship(&session, "Japan", "Britain"), "War");
    assert_eq!(session.book().node(strike).core.chance, Chance::new(3, 6));
    assert_eq!(session.book().node(strike).trigger().unwrap().uses, 0);
    assert!(!session.evaluate("japan_restrained").unwrap());

    let japan = session.find_player("Japan").unwrap();
    let notes = session.take_notifications();
    assert!(notes.iter().any(|note| note.player == japan));
}

#[test]
fn lend_lease_fires_its_trigger_for_russia() {
    let mut session = default_session(&[]);
    let britain = session.find_player("Britain").unwrap();
    let russia = session.find_player("Russia").unwrap();
    let lend_lease = session.find_node("lend_lease").unwrap();

    let outcome = session
        .attempt_action(britain, lend_lease, &mut AcceptAll)
        .unwrap();
    assert_eq!(outcome, AttemptOutcome::Succeeded { effects: 1 });
    assert_eq!(session.registry().resource_of(britain, "PUs"), 22);
    assert_eq!(session.registry().resource_of(russia, "PUs"), 30);

    let again = session
        .attempt_action(britain, lend_lease, &mut AcceptAll)
        .unwrap();
    assert_eq!(again, AttemptOutcome::NotValid);
}

#[test]
fn change_log_serializes_to_json() {
    let mut session = default_session(&[]);
    session.run_phase(None);
    session.end_round();

    let json = serde_json::to_value(session.changes()).unwrap();
    let entries = json.as_array().unwrap();
    assert!(!entries.is_empty());
    assert_eq!(entries.last().unwrap()["type"], "advance_round");
}
