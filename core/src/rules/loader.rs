use std::fs;
use std::path::Path;

use anyhow::{Context, Result, anyhow};

use super::compiler::{CompiledScenario, ScenarioRaw, compile};

const BUILTIN_SCENARIOS: &[ScenarioSource<'static>] = &[
    ScenarioSource::Yaml(
        "default.yaml",
        include_str!("../../../config/scenarios/default.yaml"),
    ),
    ScenarioSource::Json(
        "border_crisis.json",
        include_str!("../../../config/scenarios/border_crisis.json"),
    ),
];

/// A scenario body together with the name used in error messages.
#[derive(Debug, Clone, Copy)]
pub enum ScenarioSource<'a> {
    Yaml(&'a str, &'a str),
    Json(&'a str, &'a str),
}

impl<'a> ScenarioSource<'a> {
    /// Picks the format from the file extension; anything but `.json` is read as YAML.
    pub fn from_path(name: &'a str, body: &'a str) -> Self {
        if name.to_ascii_lowercase().ends_with(".json") {
            ScenarioSource::Json(name, body)
        } else {
            ScenarioSource::Yaml(name, body)
        }
    }

    pub fn name(&self) -> &'a str {
        match self {
            ScenarioSource::Yaml(name, _) | ScenarioSource::Json(name, _) => name,
        }
    }
}

pub fn builtin_scenario_names() -> Vec<&'static str> {
    BUILTIN_SCENARIOS.iter().map(|source| source.name()).collect()
}

pub fn load_default_scenario() -> Result<CompiledScenario> {
    parse_and_compile(&BUILTIN_SCENARIOS[0])
}

pub fn load_builtin_scenario(name: &str) -> Result<CompiledScenario> {
    let source = BUILTIN_SCENARIOS
        .iter()
        .find(|source| source.name() == name)
        .ok_or_else(|| anyhow!("組み込みシナリオ {} は存在しません", name))?;
    parse_and_compile(source)
}

pub fn load_scenario_file(path: &Path) -> Result<CompiledScenario> {
    let body = fs::read_to_string(path)
        .with_context(|| format!("シナリオファイルを開けません: {}", path.display()))?;
    let name = path.display().to_string();
    parse_and_compile(&ScenarioSource::from_path(&name, &body))
}

/// Parses a scenario source and compiles it. Parse failures and definition errors both
/// come back with the scenario name attached.
pub fn parse_and_compile(source: &ScenarioSource<'_>) -> Result<CompiledScenario> {
    let raw = parse_scenario(source)?;
    compile(raw).map_err(|err| {
        anyhow!(
            "シナリオ {} のコンパイルに失敗しました: {}",
            source.name(),
            err
        )
    })
}

fn parse_scenario(source: &ScenarioSource<'_>) -> Result<ScenarioRaw> {
    match source {
        ScenarioSource::Yaml(name, body) => serde_yaml::from_str::<ScenarioRaw>(body)
            .map_err(|err| anyhow!("YAML シナリオ {} の解析に失敗しました: {}", name, err)),
        ScenarioSource::Json(name, body) => serde_json::from_str::<ScenarioRaw>(body)
            .map_err(|err| anyhow!("JSON シナリオ {} の解析に失敗しました: {}", name, err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_scenarios_compile() {
        for name in builtin_scenario_names() {
            let scenario = load_builtin_scenario(name)
                .unwrap_or_else(|err| panic!("{name} should compile: {err}"));
            assert!(!scenario.book.is_empty());
        }
    }

    #[test]
    fn default_scenario_has_triggers_and_actions() {
        let scenario = load_default_scenario().expect("default scenario should load");
        assert!(scenario.book.triggers().count() > 0);
        assert!(scenario.book.actions().count() > 0);
    }

    #[test]
    fn parse_errors_name_the_source() {
        let err = parse_and_compile(&ScenarioSource::Yaml("broken.yaml", "players: [unterminated"))
            .expect_err("should fail to parse");
        let message = format!("{err}");
        assert!(message.contains("broken.yaml"));
        assert!(message.contains("解析に失敗しました"));
    }

    #[test]
    fn definition_errors_name_the_node() {
        let body = r#"{
            "players": ["Germany"],
            "relationship_types": [{ "name": "Neutrality", "archetype": "neutral" }],
            "nodes": [
                { "name": "odds", "kind": "trigger", "owner": "Germany", "chance": "3:2" }
            ]
        }"#;
        let err = parse_and_compile(&ScenarioSource::Json("odds.json", body))
            .expect_err("should fail to compile");
        let message = format!("{err}");
        assert!(message.contains("コンパイルに失敗しました"));
        assert!(message.contains("odds"));
        assert!(message.contains("3:2"));
    }

    #[test]
    fn format_follows_extension() {
        assert!(matches!(
            ScenarioSource::from_path("a.JSON", "{}"),
            ScenarioSource::Json(..)
        ));
        assert!(matches!(
            ScenarioSource::from_path("a.yml", ""),
            ScenarioSource::Yaml(..)
        ));
    }
}
