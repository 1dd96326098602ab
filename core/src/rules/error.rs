use thiserror::Error;

/// Raised while a scenario definition is compiled into a [`RuleBook`](super::RuleBook).
///
/// Every variant names the node being defined and the raw text that was rejected, so a
/// map author can find the offending entry. These errors are never produced during an
/// evaluation pass.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    #[error("{node}: 同名のノードが既に定義されています")]
    DuplicateNode { node: String },

    #[error("{node}: 所有プレイヤー '{player}' が存在しません")]
    UnknownOwner { node: String, player: String },

    #[error("{node}: 条件 '{name}' が見つかりません (conditions=\"{raw}\")")]
    UnknownCondition {
        node: String,
        name: String,
        raw: String,
    },

    #[error("{node}: トリガー '{name}' が見つかりません")]
    UnknownTrigger { node: String, name: String },

    #[error(
        "{node}: conditionType \"{raw}\" は 'AND' / 'OR' / 'XOR' / 'y' / 'y-z' (0 <= y < z) のいずれかで指定してください"
    )]
    InvalidConditionType { node: String, raw: String },

    #[error(
        "{node}: chance \"{raw}\" は \"x:y\" 形式 (0 <= x <= y <= 120) で指定してください"
    )]
    InvalidChance { node: String, raw: String },

    #[error("{node}: when \"{raw}\" は \"before:フェーズ名\" か \"after:フェーズ名\" で指定してください")]
    InvalidWhen { node: String, raw: String },

    #[error("{node}: rounds \"{raw}\" の形式が不正です (例: \"1:3-5:7-+\")")]
    InvalidRounds { node: String, raw: String },

    #[error("{node}: uses は -1 以上で指定してください (値: {raw})")]
    InvalidUses { node: String, raw: i32 },

    #[error("{node}: \"{raw}\" の形式が不正です: {reason}")]
    MalformedValue {
        node: String,
        raw: String,
        reason: String,
    },

    #[error("{node}: プレイヤー '{player}' が存在しません (\"{raw}\")")]
    UnknownPlayer {
        node: String,
        player: String,
        raw: String,
    },

    #[error("{node}: 関係タイプ '{name}' が存在しません (\"{raw}\")")]
    UnknownRelationshipType {
        node: String,
        name: String,
        raw: String,
    },

    #[error("{node}: 資源 '{name}' が存在しません (\"{raw}\")")]
    UnknownResource {
        node: String,
        name: String,
        raw: String,
    },

    #[error("{node}: {field} を1件以上指定してください")]
    EmptyField { node: String, field: &'static str },

    #[error("{node}: 条件が循環参照しています ({path})")]
    ConditionCycle { node: String, path: String },
}

impl DefinitionError {
    /// Name of the node whose definition was rejected.
    pub fn node(&self) -> &str {
        match self {
            DefinitionError::DuplicateNode { node }
            | DefinitionError::UnknownOwner { node, .. }
            | DefinitionError::UnknownCondition { node, .. }
            | DefinitionError::UnknownTrigger { node, .. }
            | DefinitionError::InvalidConditionType { node, .. }
            | DefinitionError::InvalidChance { node, .. }
            | DefinitionError::InvalidWhen { node, .. }
            | DefinitionError::InvalidRounds { node, .. }
            | DefinitionError::InvalidUses { node, .. }
            | DefinitionError::MalformedValue { node, .. }
            | DefinitionError::UnknownPlayer { node, .. }
            | DefinitionError::UnknownRelationshipType { node, .. }
            | DefinitionError::UnknownResource { node, .. }
            | DefinitionError::EmptyField { node, .. }
            | DefinitionError::ConditionCycle { node, .. } => node,
        }
    }
}
