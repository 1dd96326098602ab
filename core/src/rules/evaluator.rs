use std::collections::{BTreeSet, HashMap, HashSet};

use tracing::debug;

use super::book::RuleBook;
use super::node::{NodeId, NodeKind, RulesCheck};
use super::registry::GameRegistry;

/// Results of one evaluation pass, keyed by node handle. Only valid for the pass that
/// produced it; never carried across game steps.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SatisfactionMap {
    results: HashMap<NodeId, bool>,
}

impl SatisfactionMap {
    pub fn get(&self, id: NodeId) -> Option<bool> {
        self.results.get(&id).copied()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.results.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// # Panics
    ///
    /// Panics if `id` was not evaluated in this pass.
    pub fn satisfied(&self, id: NodeId) -> bool {
        self.get(id).unwrap_or_else(|| {
            panic!(
                "評価結果が存在しないノードを参照しました: {}",
                id.index()
            )
        })
    }

    fn insert(&mut self, id: NodeId, value: bool) {
        self.results.insert(id, value);
    }
}

/// Every node reachable from `roots` through child references, roots included.
pub fn collect_transitive_closure<I>(book: &RuleBook, roots: I) -> BTreeSet<NodeId>
where
    I: IntoIterator<Item = NodeId>,
{
    let mut closure = BTreeSet::new();
    for root in roots {
        visit(book, root, &mut closure);
    }
    closure
}

fn visit(book: &RuleBook, id: NodeId, closure: &mut BTreeSet<NodeId>) {
    if !closure.insert(id) {
        return;
    }
    for child in &book.node(id).core.children {
        visit(book, *child, closure);
    }
}

/// Evaluates every node in `nodes`, children before parents, each exactly once.
///
/// # Panics
///
/// Panics if a node is reached again while it is still being evaluated. Compiled rule
/// books reject cycles, so this only fires on a hand-built graph that bypassed the compiler.
pub fn evaluate_all(
    book: &RuleBook,
    registry: &GameRegistry,
    nodes: &BTreeSet<NodeId>,
) -> SatisfactionMap {
    let mut map = SatisfactionMap::default();
    let mut in_progress = HashSet::new();
    for id in nodes {
        evaluate_node(book, registry, *id, &mut map, &mut in_progress);
    }
    debug!(
        requested = nodes.len(),
        evaluated = map.len(),
        "evaluation pass complete"
    );
    map
}

/// Closure of `roots` followed by [`evaluate_all`].
pub fn evaluate_closure<I>(book: &RuleBook, registry: &GameRegistry, roots: I) -> SatisfactionMap
where
    I: IntoIterator<Item = NodeId>,
{
    let closure = collect_transitive_closure(book, roots);
    evaluate_all(book, registry, &closure)
}

fn evaluate_node(
    book: &RuleBook,
    registry: &GameRegistry,
    id: NodeId,
    map: &mut SatisfactionMap,
    in_progress: &mut HashSet<NodeId>,
) {
    if map.contains(id) {
        return;
    }
    if !in_progress.insert(id) {
        panic!(
            "条件の循環参照を検出しました: {}",
            book.name_of(id)
        );
    }
    for child in &book.node(id).core.children {
        evaluate_node(book, registry, *child, map, in_progress);
    }
    let result = node_result(book, registry, id, map);
    in_progress.remove(&id);
    map.insert(id, result);
}

fn node_result(
    book: &RuleBook,
    registry: &GameRegistry,
    id: NodeId,
    map: &SatisfactionMap,
) -> bool {
    let node = book.node(id);
    match &node.kind {
        NodeKind::Rules(check) => {
            let mut met = true;
            if !node.core.children.is_empty() {
                met = combine_children(book, id, map);
            }
            met = met && rules_check_met(check, registry);
            met != node.core.invert
        }
        _ => combine_children(book, id, map) != node.core.invert,
    }
}

/// Satisfaction of one node against an already filled map.
///
/// Nodes evaluated in the pass answer from the map. Trigger and action nodes missing from
/// the map are folded from their children's entries, which must be present.
///
/// # Panics
///
/// Panics if a required entry is missing, or if a rules node was not part of the pass.
pub fn is_satisfied(book: &RuleBook, id: NodeId, map: &SatisfactionMap) -> bool {
    if let Some(result) = map.get(id) {
        return result;
    }
    let node = book.node(id);
    if matches!(node.kind, NodeKind::Rules(_)) {
        panic!(
            "ルールノード {} は評価パスに含まれていません",
            node.name
        );
    }
    combine_children(book, id, map) != node.core.invert
}

fn combine_children(book: &RuleBook, id: NodeId, map: &SatisfactionMap) -> bool {
    let core = &book.node(id).core;
    core.combinator
        .combine(core.children.iter().map(|child| map.satisfied(*child)))
}

fn rules_check_met(check: &RulesCheck, registry: &GameRegistry) -> bool {
    if !check.switch {
        return false;
    }
    if !check.rounds.is_empty() {
        let round = registry.round();
        if !check.rounds.iter().any(|range| range.contains(round)) {
            return false;
        }
    }
    let relationships_met = check.relationships.iter().all(|relation| {
        let since = registry.relationship_since(relation.first, relation.second);
        let age = i64::from(registry.round()) - i64::from(since);
        if age < i64::from(relation.min_rounds_existing) {
            return false;
        }
        let current = registry.relationship(relation.first, relation.second);
        relation.expected.matches(current, registry)
    });
    if !relationships_met {
        return false;
    }
    check.resources.iter().all(|requirement| {
        check
            .players
            .iter()
            .all(|player| registry.resource_of(*player, &requirement.resource) >= requirement.amount)
    })
}

/// Finds a cycle in the child graph, returning the nodes along it (first node repeated at
/// the end) if one exists.
pub(crate) fn find_cycle(book: &RuleBook) -> Option<Vec<NodeId>> {
    #[derive(Clone, Copy, PartialEq, Eq)]
    enum Mark {
        Unvisited,
        InProgress,
        Done,
    }

    fn walk(
        book: &RuleBook,
        id: NodeId,
        marks: &mut [Mark],
        stack: &mut Vec<NodeId>,
    ) -> Option<Vec<NodeId>> {
        marks[id.index()] = Mark::InProgress;
        stack.push(id);
        for child in &book.node(id).core.children {
            match marks[child.index()] {
                Mark::InProgress => {
                    let start = stack.iter().position(|entry| entry == child).unwrap_or(0);
                    let mut cycle = stack[start..].to_vec();
                    cycle.push(*child);
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = walk(book, *child, marks, stack) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }
        stack.pop();
        marks[id.index()] = Mark::Done;
        None
    }

    let mut marks = vec![Mark::Unvisited; book.len()];
    let mut stack = Vec::new();
    for id in book.ids() {
        if marks[id.index()] == Mark::Unvisited {
            if let Some(cycle) = walk(book, id, &mut marks, &mut stack) {
                return Some(cycle);
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::node::{Combinator, ConditionCore, ConditionNode};
    use crate::rules::registry::PlayerId;
    use crate::rules::test_support::{compile_yaml, rules_node};

    const DIAMOND: &str = r#"
players: [Germany, Russia]
relationship_types:
  - { name: Neutrality, archetype: neutral }
  - { name: War, archetype: war }
resources: [PUs]
nodes:
  - { name: on, kind: rules, owner: Germany }
  - { name: off, kind: rules, owner: Germany, switch: false }
  - { name: left, kind: rules, owner: Germany, conditions: "on:off", conditionType: OR }
  - { name: right, kind: rules, owner: Germany, conditions: "on", invert: true }
  - { name: top, kind: rules, owner: Germany, conditions: "left:right", conditionType: "1" }
"#;

    #[test]
    fn closure_reaches_shared_children_once() {
        let (book, _) = compile_yaml(DIAMOND);
        let top = book.find("top").unwrap();
        let closure = collect_transitive_closure(&book, [top]);
        let names: BTreeSet<&str> = closure.iter().map(|id| book.name_of(*id)).collect();
        assert_eq!(
            names,
            BTreeSet::from(["top", "left", "right", "on", "off"])
        );
    }

    #[test]
    fn evaluates_children_before_parents() {
        let (book, registry) = compile_yaml(DIAMOND);
        let top = book.find("top").unwrap();
        let map = evaluate_closure(&book, &registry, [top]);

        assert!(map.satisfied(book.find("on").unwrap()));
        assert!(!map.satisfied(book.find("off").unwrap()));
        assert!(map.satisfied(book.find("left").unwrap()));
        assert!(!map.satisfied(book.find("right").unwrap()));
        assert!(map.satisfied(top));
        assert_eq!(map.len(), 5);
    }

    #[test]
    fn invert_negates_the_folded_result() {
        let (book, registry) = compile_yaml(DIAMOND);
        let on = book.find("on").unwrap();
        let right = book.find("right").unwrap();
        let map = evaluate_closure(&book, &registry, [right]);
        assert_eq!(map.satisfied(right), !map.satisfied(on));
    }

    #[test]
    fn rules_node_checks_rounds_relationships_and_resources() {
        let yaml = r#"
players: [Germany, Russia]
relationship_types:
  - { name: Neutrality, archetype: neutral }
  - { name: War, archetype: war }
resources: [PUs]
initial_resources:
  - { player: Germany, resource: PUs, amount: 30 }
nodes:
  - { name: early, kind: rules, owner: Germany, rounds: "1-2" }
  - { name: late, kind: rules, owner: Germany, rounds: "3-+" }
  - { name: peaceful, kind: rules, owner: Germany, relationship: ["Germany:Russia:anyNeutral"] }
  - { name: at_war, kind: rules, owner: Germany, relationship: ["Germany:Russia:War"] }
  - { name: rich, kind: rules, owner: Germany, resources: ["PUs:25"] }
  - { name: very_rich, kind: rules, owner: Germany, resources: ["PUs:40"] }
"#;
        let (book, registry) = compile_yaml(yaml);
        let map = evaluate_all(&book, &registry, &book.ids().collect());
        let result = |name: &str| map.satisfied(book.find(name).unwrap());

        assert!(result("early"));
        assert!(!result("late"));
        assert!(result("peaceful"));
        assert!(!result("at_war"));
        assert!(result("rich"));
        assert!(!result("very_rich"));
    }

    #[test]
    fn relationship_checks_can_require_a_minimum_age() {
        let yaml = r#"
players: [Germany, Russia]
relationship_types:
  - { name: Neutrality, archetype: neutral }
  - { name: War, archetype: war }
initial_relationships:
  - { first: Germany, second: Russia, type: War }
nodes:
  - { name: long_war, kind: rules, owner: Germany, relationship: ["Germany:Russia:War:3"] }
  - { name: any_war, kind: rules, owner: Germany, relationship: ["Germany:Russia:anyWar:-1"] }
  - { name: fresh_war, kind: rules, owner: Germany, relationship: ["Russia:Germany:War:0"] }
"#;
        let (book, mut registry) = compile_yaml(yaml);
        let germany = registry.player_id("Germany").unwrap();
        let russia = registry.player_id("Russia").unwrap();
        let war = registry.relationship_type_id("War").unwrap();
        let states = |registry: &GameRegistry| {
            let map = evaluate_all(&book, registry, &book.ids().collect());
            ["long_war", "any_war", "fresh_war"].map(|name| map.satisfied(book.find(name).unwrap()))
        };

        // Declared in the scenario, so the war dates from round 0.
        assert_eq!(states(&registry), [false, true, true]);
        registry.set_round(3);
        assert_eq!(states(&registry), [true, true, true]);

        // Re-declaring restarts the clock.
        registry.set_relationship(germany, russia, war);
        assert_eq!(states(&registry), [false, true, true]);
        registry.set_round(6);
        assert_eq!(states(&registry), [true, true, true]);
    }

    #[test]
    fn trigger_without_conditions_is_not_satisfied() {
        let yaml = r#"
players: [Germany]
relationship_types: [{ name: Neutrality, archetype: neutral }]
nodes:
  - { name: lonely, kind: trigger, owner: Germany }
"#;
        let (book, registry) = compile_yaml(yaml);
        let lonely = book.find("lonely").unwrap();
        let map = evaluate_closure(&book, &registry, [lonely]);
        assert!(!map.satisfied(lonely));
    }

    #[test]
    fn is_satisfied_folds_unmapped_trigger_from_children() {
        let yaml = r#"
players: [Germany]
relationship_types: [{ name: Neutrality, archetype: neutral }]
nodes:
  - { name: base, kind: rules, owner: Germany }
  - { name: gate, kind: trigger, owner: Germany, conditions: "base", invert: true }
"#;
        let (book, registry) = compile_yaml(yaml);
        let base = book.find("base").unwrap();
        let gate = book.find("gate").unwrap();
        let map = evaluate_closure(&book, &registry, [base]);
        assert!(!is_satisfied(&book, gate, &map));
    }

    #[test]
    #[should_panic(expected = "評価結果が存在しない")]
    fn reading_an_unevaluated_node_panics() {
        let map = SatisfactionMap::default();
        map.satisfied(NodeId(0));
    }

    #[test]
    #[should_panic(expected = "循環参照")]
    fn hand_built_cycle_panics_instead_of_recursing_forever() {
        let mut book = RuleBook::new();
        let owner = PlayerId(0);
        let first = book.insert(rules_node("first", owner));
        let second = book.insert(ConditionNode {
            core: ConditionCore {
                children: vec![first],
                combinator: Combinator::And,
                ..ConditionCore::default()
            },
            ..rules_node("second", owner)
        });
        book.node_mut(first).core.children.push(second);

        let registry = GameRegistry::new();
        evaluate_closure(&book, &registry, [first]);
    }

    #[test]
    fn find_cycle_reports_the_loop() {
        let mut book = RuleBook::new();
        let owner = PlayerId(0);
        let a = book.insert(rules_node("a", owner));
        let b = book.insert(rules_node("b", owner));
        book.insert(rules_node("c", owner));
        book.node_mut(a).core.children.push(b);
        assert!(find_cycle(&book).is_none());

        book.node_mut(b).core.children.push(a);
        let cycle = find_cycle(&book).unwrap();
        assert_eq!(cycle.first(), cycle.last());
        assert!(cycle.contains(&a) && cycle.contains(&b));
    }
}
