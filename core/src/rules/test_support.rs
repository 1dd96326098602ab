use std::collections::VecDeque;

use super::book::RuleBook;
use super::bridge::RecordingBridge;
use super::change::RandomSource;
use super::compiler::{CompiledScenario, ScenarioRaw, compile};
use super::node::{ConditionCore, ConditionNode, NodeKind, RulesCheck};
use super::registry::{GameRegistry, PlayerId};

/// Returns pre-queued draws in order. Running out is a test bug.
pub(crate) struct ScriptedRandom {
    draws: VecDeque<u32>,
}

impl ScriptedRandom {
    pub(crate) fn new(draws: Vec<u32>) -> Self {
        Self {
            draws: draws.into(),
        }
    }
}

impl RandomSource for ScriptedRandom {
    fn draw(&mut self, sides: u32, label: &str) -> u32 {
        let value = self
            .draws
            .pop_front()
            .unwrap_or_else(|| panic!("予定外の乱数要求です: {label}"));
        assert!(value < sides, "スクリプトの値 {value} が面数 {sides} を超えています");
        value
    }
}

pub(crate) fn scripted_bridge(draws: Vec<u32>) -> RecordingBridge {
    RecordingBridge::new(Box::new(ScriptedRandom::new(draws)))
}

pub(crate) fn compile_yaml_scenario(yaml: &str) -> CompiledScenario {
    let raw: ScenarioRaw = serde_yaml::from_str(yaml).expect("テスト用シナリオの解析に失敗しました");
    compile(raw).expect("テスト用シナリオのコンパイルに失敗しました")
}

pub(crate) fn compile_yaml(yaml: &str) -> (RuleBook, GameRegistry) {
    let scenario = compile_yaml_scenario(yaml);
    (scenario.book, scenario.registry)
}

/// A rules node with no children and every check passing.
pub(crate) fn rules_node(name: &str, owner: PlayerId) -> ConditionNode {
    ConditionNode {
        name: name.to_string(),
        owner,
        core: ConditionCore::default(),
        kind: NodeKind::Rules(RulesCheck {
            switch: true,
            rounds: Vec::new(),
            relationships: Vec::new(),
            resources: Vec::new(),
            players: vec![owner],
        }),
    }
}
