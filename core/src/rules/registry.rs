use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(pub(crate) usize);

impl PlayerId {
    pub fn index(&self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RelationshipTypeId(pub(crate) usize);

/// Broad category a relationship type belongs to. `anyAllied` / `anyNeutral` / `anyWar`
/// relationship checks match on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Allied,
    Neutral,
    War,
}

impl Archetype {
    pub fn label(&self) -> &'static str {
        match self {
            Archetype::Allied => "同盟",
            Archetype::Neutral => "中立",
            Archetype::War => "戦争",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Player {
    pub name: String,
    resources: BTreeMap<String, i64>,
}

impl Player {
    pub fn resources(&self) -> &BTreeMap<String, i64> {
        &self.resources
    }
}

#[derive(Debug, Clone)]
pub struct RelationshipType {
    pub name: String,
    pub archetype: Archetype,
}

/// Players, relationship types and resources a scenario refers to by name.
///
/// Lookups by name return `None` for unknown names so callers can tell "not found" apart
/// from "found but invalid for this use". Node construction only ever reads from the
/// registry; the mutating methods are reserved for [`apply`](super::apply).
#[derive(Debug, Clone, Default)]
pub struct GameRegistry {
    players: Vec<Player>,
    relationship_types: Vec<RelationshipType>,
    resources: Vec<String>,
    /// Explicitly set relationships with the round each one took effect.
    relationships: BTreeMap<(PlayerId, PlayerId), (RelationshipTypeId, u32)>,
    default_relationship: Option<RelationshipTypeId>,
    round: u32,
}

impl GameRegistry {
    pub fn new() -> Self {
        Self {
            round: 1,
            ..Self::default()
        }
    }

    pub fn add_player(&mut self, name: &str) -> PlayerId {
        if let Some(id) = self.player_id(name) {
            return id;
        }
        self.players.push(Player {
            name: name.to_string(),
            resources: BTreeMap::new(),
        });
        PlayerId(self.players.len() - 1)
    }

    pub fn add_relationship_type(&mut self, name: &str, archetype: Archetype) -> RelationshipTypeId {
        if let Some(id) = self.relationship_type_id(name) {
            return id;
        }
        self.relationship_types.push(RelationshipType {
            name: name.to_string(),
            archetype,
        });
        let id = RelationshipTypeId(self.relationship_types.len() - 1);
        if self.default_relationship.is_none() {
            self.default_relationship = Some(id);
        }
        id
    }

    pub fn add_resource(&mut self, name: &str) {
        if !self.has_resource(name) {
            self.resources.push(name.to_string());
        }
    }

    pub fn set_round(&mut self, round: u32) {
        self.round = round;
    }

    pub fn round(&self) -> u32 {
        self.round
    }

    pub fn player_id(&self, name: &str) -> Option<PlayerId> {
        self.players
            .iter()
            .position(|player| player.name == name)
            .map(PlayerId)
    }

    /// Resolves a player by exact name or by its 1-based position in the player list.
    pub fn find_player(&self, token: &str) -> Option<PlayerId> {
        if let Ok(number) = token.parse::<usize>() {
            if number >= 1 && number <= self.players.len() {
                return Some(PlayerId(number - 1));
            }
        }
        self.player_id(token).or_else(|| {
            self.players
                .iter()
                .position(|player| player.name.eq_ignore_ascii_case(token))
                .map(PlayerId)
        })
    }

    pub fn player(&self, id: PlayerId) -> &Player {
        self.players
            .get(id.0)
            .unwrap_or_else(|| panic!("無効なプレイヤー番号です: {}", id.0))
    }

    pub fn player_name(&self, id: PlayerId) -> &str {
        &self.player(id).name
    }

    pub fn player_ids(&self) -> impl Iterator<Item = PlayerId> + '_ {
        (0..self.players.len()).map(PlayerId)
    }

    pub fn relationship_type_id(&self, name: &str) -> Option<RelationshipTypeId> {
        self.relationship_types
            .iter()
            .position(|kind| kind.name == name)
            .map(RelationshipTypeId)
    }

    pub fn relationship_type(&self, id: RelationshipTypeId) -> &RelationshipType {
        self.relationship_types
            .get(id.0)
            .unwrap_or_else(|| panic!("無効な関係タイプ番号です: {}", id.0))
    }

    pub fn has_resource(&self, name: &str) -> bool {
        self.resources.iter().any(|resource| resource == name)
    }

    pub fn resource_of(&self, player: PlayerId, resource: &str) -> i64 {
        self.player(player)
            .resources
            .get(resource)
            .copied()
            .unwrap_or(0)
    }

    /// Current relationship between two distinct players; pairs never set explicitly use
    /// the default relationship type.
    pub fn relationship(&self, first: PlayerId, second: PlayerId) -> RelationshipTypeId {
        if let Some((id, _)) = self.relationships.get(&pair_key(first, second)) {
            return *id;
        }
        self.default_relationship
            .unwrap_or_else(|| panic!("関係タイプが1つも登録されていません"))
    }

    /// Round the current relationship between two players took effect. Scenario-defined and
    /// default relationships count as existing since round 0.
    pub fn relationship_since(&self, first: PlayerId, second: PlayerId) -> u32 {
        self.relationships
            .get(&pair_key(first, second))
            .map_or(0, |(_, since)| *since)
    }

    /// Sets a relationship as of the current round.
    pub(crate) fn set_relationship(
        &mut self,
        first: PlayerId,
        second: PlayerId,
        kind: RelationshipTypeId,
    ) {
        self.relationships.insert(pair_key(first, second), (kind, self.round));
    }

    /// Sets a relationship that predates the first round.
    pub(crate) fn seed_relationship(
        &mut self,
        first: PlayerId,
        second: PlayerId,
        kind: RelationshipTypeId,
    ) {
        self.relationships.insert(pair_key(first, second), (kind, 0));
    }

    pub(crate) fn adjust_resource(&mut self, player: PlayerId, resource: &str, delta: i64) {
        let slot = self
            .players
            .get_mut(player.0)
            .unwrap_or_else(|| panic!("無効なプレイヤー番号です: {}", player.0))
            .resources
            .entry(resource.to_string())
            .or_insert(0);
        *slot += delta;
    }

    pub(crate) fn advance_round(&mut self) {
        self.round += 1;
    }
}

fn pair_key(first: PlayerId, second: PlayerId) -> (PlayerId, PlayerId) {
    if first <= second {
        (first, second)
    } else {
        (second, first)
    }
}
