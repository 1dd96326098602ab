use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::book::RuleBook;
use super::chance::ChancePacing;
use super::condition::{
    parse_chance, parse_condition_names, parse_condition_type, parse_political_change,
    parse_relationship_check, parse_resource_amount, parse_rounds,
    parse_trigger_relationship_change, parse_when,
};
use super::constants::{DEFAULT_ATTEMPTS_PER_TURN, DEFAULT_COST_RESOURCE, UNLIMITED_USES};
use super::error::DefinitionError;
use super::evaluator::find_cycle;
use super::node::{
    ActionState, Combinator, ConditionCore, ConditionNode, NodeId, NodeKind, RulesCheck,
    TriggerState,
};
use super::registry::{Archetype, GameRegistry, PlayerId};

/// Node name used in errors about the scenario header rather than a node.
const SCENARIO_SCOPE: &str = "シナリオ設定";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSettings {
    /// Delay before each live chance draw, in milliseconds.
    pub chance_pacing_ms: u64,
    /// Resource an action's `cost` is paid in.
    pub cost_resource: String,
}

impl EngineSettings {
    const fn default_chance_pacing_ms() -> u64 {
        0
    }

    pub fn pacing(&self) -> ChancePacing {
        ChancePacing::from_millis(self.chance_pacing_ms)
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            chance_pacing_ms: Self::default_chance_pacing_ms(),
            cost_resource: DEFAULT_COST_RESOURCE.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioRaw {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    settings: EngineSettings,
    players: Vec<String>,
    relationship_types: Vec<RelationshipTypeRaw>,
    #[serde(default)]
    resources: Vec<String>,
    #[serde(default)]
    initial_relationships: Vec<InitialRelationshipRaw>,
    #[serde(default)]
    initial_resources: Vec<InitialResourceRaw>,
    #[serde(default)]
    round: Option<u32>,
    #[serde(default)]
    nodes: Vec<NodeDefinitionRaw>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationshipTypeRaw {
    name: String,
    archetype: Archetype,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct InitialRelationshipRaw {
    first: String,
    second: String,
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct InitialResourceRaw {
    player: String,
    resource: String,
    amount: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
enum NodeKindRaw {
    Rules,
    Trigger,
    UserAction,
    PoliticalAction,
}

/// One node as written by a map author. Attribute names follow the map format
/// (`conditionType`, `chanceIncrementOnFailure`, ...).
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct NodeDefinitionRaw {
    name: String,
    kind: NodeKindRaw,
    owner: String,
    conditions: Option<String>,
    condition_type: Option<String>,
    #[serde(default)]
    invert: bool,
    chance: Option<String>,
    #[serde(default)]
    chance_increment_on_failure: u32,
    #[serde(default)]
    chance_decrement_on_success: u32,

    switch: Option<bool>,
    rounds: Option<String>,
    #[serde(default)]
    relationship: Vec<String>,
    #[serde(default)]
    resources: Vec<String>,
    #[serde(default)]
    players: Vec<String>,

    uses: Option<i32>,
    #[serde(default)]
    when: Vec<String>,
    notification: Option<String>,
    #[serde(default)]
    relationship_change: Vec<String>,
    #[serde(default)]
    resource_grant: Vec<String>,

    text: Option<String>,
    cost: Option<u32>,
    attempts_per_turn: Option<u32>,
    action_accept: Option<String>,
    #[serde(default)]
    activate_trigger: Vec<String>,
}

impl NodeDefinitionRaw {
    /// Attributes set on this node that its kind does not carry.
    fn foreign_fields(&self) -> Vec<&'static str> {
        use NodeKindRaw::{PoliticalAction, Rules, Trigger, UserAction};

        let table: [(&'static str, bool, &[NodeKindRaw]); 14] = [
            ("switch", self.switch.is_some(), &[Rules]),
            ("rounds", self.rounds.is_some(), &[Rules]),
            ("relationship", !self.relationship.is_empty(), &[Rules]),
            ("resources", !self.resources.is_empty(), &[Rules]),
            ("players", !self.players.is_empty(), &[Rules, Trigger]),
            ("uses", self.uses.is_some(), &[Trigger]),
            ("when", !self.when.is_empty(), &[Trigger]),
            ("notification", self.notification.is_some(), &[Trigger]),
            ("resourceGrant", !self.resource_grant.is_empty(), &[Trigger]),
            (
                "relationshipChange",
                !self.relationship_change.is_empty(),
                &[Trigger, PoliticalAction],
            ),
            ("text", self.text.is_some(), &[UserAction, PoliticalAction]),
            ("cost", self.cost.is_some(), &[UserAction, PoliticalAction]),
            (
                "attemptsPerTurn",
                self.attempts_per_turn.is_some(),
                &[UserAction, PoliticalAction],
            ),
            (
                "actionAccept",
                self.action_accept.is_some(),
                &[UserAction, PoliticalAction],
            ),
        ];
        let mut foreign: Vec<&'static str> = table
            .iter()
            .filter(|(_, present, kinds)| *present && !kinds.contains(&self.kind))
            .map(|(field, _, _)| *field)
            .collect();
        if !self.activate_trigger.is_empty() && self.kind != UserAction {
            foreign.push("activateTrigger");
        }
        foreign
    }
}

/// A validated scenario: registry, rule book and engine settings.
#[derive(Debug, Clone)]
pub struct CompiledScenario {
    pub name: String,
    pub settings: EngineSettings,
    pub registry: GameRegistry,
    pub book: RuleBook,
}

/// Compiles a raw scenario.
///
/// Names are resolved in two passes: every node name is indexed first, so conditions and
/// activated triggers may refer to nodes defined further down. A graph containing a
/// condition cycle is rejected.
pub fn compile(raw: ScenarioRaw) -> Result<CompiledScenario, DefinitionError> {
    let registry = build_registry(&raw)?;

    let mut names: HashMap<&str, (NodeId, NodeKindRaw)> = HashMap::new();
    for (idx, node) in raw.nodes.iter().enumerate() {
        if names
            .insert(node.name.as_str(), (NodeId(idx), node.kind))
            .is_some()
        {
            return Err(DefinitionError::DuplicateNode {
                node: node.name.clone(),
            });
        }
    }

    let mut book = RuleBook::new();
    for node in &raw.nodes {
        let compiled = compile_node(node, &names, &registry)?;
        book.insert(compiled);
    }

    if let Some(cycle) = find_cycle(&book) {
        let path: Vec<&str> = cycle.iter().map(|id| book.name_of(*id)).collect();
        return Err(DefinitionError::ConditionCycle {
            node: path.first().copied().unwrap_or_default().to_string(),
            path: path.join(" -> "),
        });
    }

    validate_cost_resource(&raw, &registry)?;

    let name = raw.name.clone().unwrap_or_else(|| "無名シナリオ".to_string());
    info!(
        scenario = name.as_str(),
        nodes = book.len(),
        players = raw.players.len(),
        "scenario compiled"
    );
    Ok(CompiledScenario {
        name,
        settings: raw.settings,
        registry,
        book,
    })
}

fn build_registry(raw: &ScenarioRaw) -> Result<GameRegistry, DefinitionError> {
    let mut registry = GameRegistry::new();
    if raw.players.is_empty() {
        return Err(DefinitionError::EmptyField {
            node: SCENARIO_SCOPE.to_string(),
            field: "players",
        });
    }
    for player in &raw.players {
        if registry.player_id(player).is_some() {
            return Err(DefinitionError::MalformedValue {
                node: SCENARIO_SCOPE.to_string(),
                raw: player.clone(),
                reason: "プレイヤー名が重複しています".to_string(),
            });
        }
        registry.add_player(player);
    }

    if raw.relationship_types.is_empty() {
        return Err(DefinitionError::EmptyField {
            node: SCENARIO_SCOPE.to_string(),
            field: "relationship_types",
        });
    }
    for kind in &raw.relationship_types {
        if registry.relationship_type_id(&kind.name).is_some() {
            return Err(DefinitionError::MalformedValue {
                node: SCENARIO_SCOPE.to_string(),
                raw: kind.name.clone(),
                reason: "関係タイプ名が重複しています".to_string(),
            });
        }
        registry.add_relationship_type(&kind.name, kind.archetype);
    }
    for resource in &raw.resources {
        registry.add_resource(resource);
    }

    for relation in &raw.initial_relationships {
        let text = format!("{}:{}:{}", relation.first, relation.second, relation.kind);
        let change = parse_political_change(SCENARIO_SCOPE, &text, &registry)?;
        registry.seed_relationship(change.first, change.second, change.to);
    }

    for grant in &raw.initial_resources {
        let player = registry.player_id(&grant.player).ok_or_else(|| {
            DefinitionError::UnknownPlayer {
                node: SCENARIO_SCOPE.to_string(),
                player: grant.player.clone(),
                raw: grant.player.clone(),
            }
        })?;
        if !registry.has_resource(&grant.resource) {
            return Err(DefinitionError::UnknownResource {
                node: SCENARIO_SCOPE.to_string(),
                name: grant.resource.clone(),
                raw: format!("{}:{}", grant.resource, grant.amount),
            });
        }
        registry.adjust_resource(player, &grant.resource, grant.amount);
    }

    if let Some(round) = raw.round {
        registry.set_round(round.max(1));
    }
    Ok(registry)
}

fn compile_node(
    raw: &NodeDefinitionRaw,
    names: &HashMap<&str, (NodeId, NodeKindRaw)>,
    registry: &GameRegistry,
) -> Result<ConditionNode, DefinitionError> {
    let name = raw.name.as_str();
    if let Some(field) = raw.foreign_fields().first() {
        return Err(DefinitionError::MalformedValue {
            node: name.to_string(),
            raw: (*field).to_string(),
            reason: "この種類のノードでは使用できない属性です".to_string(),
        });
    }

    let owner = registry
        .player_id(&raw.owner)
        .ok_or_else(|| DefinitionError::UnknownOwner {
            node: name.to_string(),
            player: raw.owner.clone(),
        })?;

    let core = compile_core(raw, names)?;
    let kind = match raw.kind {
        NodeKindRaw::Rules => NodeKind::Rules(compile_rules(raw, owner, registry)?),
        NodeKindRaw::Trigger => NodeKind::Trigger(compile_trigger(raw, owner, registry)?),
        NodeKindRaw::UserAction => {
            let mut activate_triggers = Vec::with_capacity(raw.activate_trigger.len());
            for trigger in &raw.activate_trigger {
                match names.get(trigger.as_str()) {
                    Some((id, NodeKindRaw::Trigger)) => activate_triggers.push(*id),
                    _ => {
                        return Err(DefinitionError::UnknownTrigger {
                            node: name.to_string(),
                            name: trigger.clone(),
                        });
                    }
                }
            }
            NodeKind::UserAction {
                action: compile_action(raw, registry)?,
                activate_triggers,
            }
        }
        NodeKindRaw::PoliticalAction => {
            if raw.relationship_change.is_empty() {
                return Err(DefinitionError::EmptyField {
                    node: name.to_string(),
                    field: "relationshipChange",
                });
            }
            let relationship_changes = raw
                .relationship_change
                .iter()
                .map(|text| parse_political_change(name, text, registry))
                .collect::<Result<Vec<_>, _>>()?;
            NodeKind::PoliticalAction {
                action: compile_action(raw, registry)?,
                relationship_changes,
            }
        }
    };

    Ok(ConditionNode {
        name: raw.name.clone(),
        owner,
        core,
        kind,
    })
}

fn compile_core(
    raw: &NodeDefinitionRaw,
    names: &HashMap<&str, (NodeId, NodeKindRaw)>,
) -> Result<ConditionCore, DefinitionError> {
    let name = raw.name.as_str();
    let mut children = Vec::new();
    if let Some(text) = &raw.conditions {
        for child in parse_condition_names(name, text)? {
            let (id, _) = names
                .get(child)
                .ok_or_else(|| DefinitionError::UnknownCondition {
                    node: name.to_string(),
                    name: child.to_string(),
                    raw: text.clone(),
                })?;
            children.push(*id);
        }
    }
    let combinator = match &raw.condition_type {
        Some(text) => parse_condition_type(name, text)?,
        None => Combinator::And,
    };
    let chance = match &raw.chance {
        Some(text) => parse_chance(name, text)?,
        None => Default::default(),
    };
    Ok(ConditionCore {
        children,
        combinator,
        invert: raw.invert,
        chance,
        chance_increment_on_failure: raw.chance_increment_on_failure,
        chance_decrement_on_success: raw.chance_decrement_on_success,
    })
}

fn compile_rules(
    raw: &NodeDefinitionRaw,
    owner: PlayerId,
    registry: &GameRegistry,
) -> Result<RulesCheck, DefinitionError> {
    let name = raw.name.as_str();
    let rounds = match &raw.rounds {
        Some(text) => parse_rounds(name, text)?,
        None => Vec::new(),
    };
    let relationships = raw
        .relationship
        .iter()
        .map(|text| parse_relationship_check(name, text, registry))
        .collect::<Result<Vec<_>, _>>()?;
    let resources = raw
        .resources
        .iter()
        .map(|text| parse_resource_amount(name, text, registry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(RulesCheck {
        switch: raw.switch.unwrap_or(true),
        rounds,
        relationships,
        resources,
        players: resolve_players(name, &raw.players, owner, registry)?,
    })
}

fn compile_trigger(
    raw: &NodeDefinitionRaw,
    owner: PlayerId,
    registry: &GameRegistry,
) -> Result<TriggerState, DefinitionError> {
    let name = raw.name.as_str();
    let uses = raw.uses.unwrap_or(UNLIMITED_USES);
    if uses < UNLIMITED_USES {
        return Err(DefinitionError::InvalidUses {
            node: name.to_string(),
            raw: uses,
        });
    }
    let when = raw
        .when
        .iter()
        .map(|text| parse_when(name, text))
        .collect::<Result<Vec<_>, _>>()?;
    let relationship_changes = raw
        .relationship_change
        .iter()
        .map(|text| parse_trigger_relationship_change(name, text, registry))
        .collect::<Result<Vec<_>, _>>()?;
    let resource_grants = raw
        .resource_grant
        .iter()
        .map(|text| parse_resource_amount(name, text, registry))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(TriggerState {
        uses,
        used_this_round: false,
        when,
        notification: raw.notification.clone(),
        players: resolve_players(name, &raw.players, owner, registry)?,
        relationship_changes,
        resource_grants,
    })
}

fn compile_action(
    raw: &NodeDefinitionRaw,
    registry: &GameRegistry,
) -> Result<ActionState, DefinitionError> {
    let name = raw.name.as_str();
    let mut accepting_players = Vec::new();
    if let Some(text) = &raw.action_accept {
        for player in text.split(':').map(str::trim).filter(|token| !token.is_empty()) {
            let id = registry
                .player_id(player)
                .ok_or_else(|| DefinitionError::UnknownPlayer {
                    node: name.to_string(),
                    player: player.to_string(),
                    raw: text.clone(),
                })?;
            accepting_players.push(id);
        }
    }
    let attempts_per_turn = raw.attempts_per_turn.unwrap_or(DEFAULT_ATTEMPTS_PER_TURN);
    Ok(ActionState {
        text: raw.text.clone().unwrap_or_else(|| raw.name.clone()),
        cost: raw.cost.unwrap_or(0),
        attempts_per_turn,
        attempts_left: attempts_per_turn,
        accepting_players,
    })
}

/// Explicit player list, or the owner alone when none is given.
fn resolve_players(
    node: &str,
    names: &[String],
    owner: PlayerId,
    registry: &GameRegistry,
) -> Result<Vec<PlayerId>, DefinitionError> {
    if names.is_empty() {
        return Ok(vec![owner]);
    }
    names
        .iter()
        .map(|player| {
            registry
                .player_id(player)
                .ok_or_else(|| DefinitionError::UnknownPlayer {
                    node: node.to_string(),
                    player: player.clone(),
                    raw: names.join(":"),
                })
        })
        .collect()
}

fn validate_cost_resource(raw: &ScenarioRaw, registry: &GameRegistry) -> Result<(), DefinitionError> {
    let resource = raw.settings.cost_resource.as_str();
    if registry.has_resource(resource) {
        return Ok(());
    }
    match raw.nodes.iter().find(|node| node.cost.unwrap_or(0) > 0) {
        Some(node) => Err(DefinitionError::UnknownResource {
            node: node.name.clone(),
            name: resource.to_string(),
            raw: format!("cost: {}", node.cost.unwrap_or(0)),
        }),
        None => Ok(()),
    }
}
