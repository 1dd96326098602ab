use crate::rules::constants::{
    ANY_RELATIONSHIP_AGE, MAX_CHANCE_SIDES, RELATIONSHIP_ANY, RELATIONSHIP_ANY_ALLIED, RELATIONSHIP_ANY_NEUTRAL,
    RELATIONSHIP_ANY_WAR,
};
use crate::rules::error::DefinitionError;
use crate::rules::node::{
    Chance, Combinator, PhaseRelation, RelationshipChange, RelationshipCheck, RelationshipMatch,
    ResourceAmount, RoundRange, TriggerRelationshipChange, When,
};
use crate::rules::registry::{Archetype, GameRegistry, PlayerId};

type ParseResult<T> = Result<T, DefinitionError>;

/// Splits `"name1:name2:..."` into condition names. Resolution against the rule book
/// happens in the compiler, once every node name is known.
pub(crate) fn parse_condition_names<'a>(node: &str, raw: &'a str) -> ParseResult<Vec<&'a str>> {
    let names: Vec<&str> = split_on_colon(raw);
    if names.is_empty() || names.iter().any(|name| name.is_empty()) {
        return Err(DefinitionError::MalformedValue {
            node: node.to_string(),
            raw: raw.to_string(),
            reason: "条件名が空です".to_string(),
        });
    }
    Ok(names)
}

pub(crate) fn parse_condition_type(node: &str, raw: &str) -> ParseResult<Combinator> {
    let text = raw.trim();
    if text.eq_ignore_ascii_case("AND") {
        return Ok(Combinator::And);
    }
    if text.eq_ignore_ascii_case("OR") {
        return Ok(Combinator::Or);
    }
    if text.eq_ignore_ascii_case("XOR") {
        return Ok(Combinator::Xor);
    }
    let invalid = || DefinitionError::InvalidConditionType {
        node: node.to_string(),
        raw: raw.to_string(),
    };
    let nums: Vec<&str> = text.split('-').collect();
    match nums.as_slice() {
        [single] => single.parse::<u32>().map(Combinator::Exactly).map_err(|_| invalid()),
        [low, high] => {
            let low = low.parse::<u32>().map_err(|_| invalid())?;
            let high = high.parse::<u32>().map_err(|_| invalid())?;
            if low >= high {
                return Err(invalid());
            }
            Ok(Combinator::Between(low, high))
        }
        _ => Err(invalid()),
    }
}

pub(crate) fn parse_chance(node: &str, raw: &str) -> ParseResult<Chance> {
    let invalid = || DefinitionError::InvalidChance {
        node: node.to_string(),
        raw: raw.to_string(),
    };
    let parts = split_on_colon(raw);
    let [hit, sides] = parts.as_slice() else {
        return Err(invalid());
    };
    let hit = hit.parse::<u32>().map_err(|_| invalid())?;
    let sides = sides.parse::<u32>().map_err(|_| invalid())?;
    if hit > sides || sides > MAX_CHANCE_SIDES {
        return Err(invalid());
    }
    Ok(Chance::new(hit, sides))
}

pub(crate) fn parse_when(node: &str, raw: &str) -> ParseResult<When> {
    let invalid = || DefinitionError::InvalidWhen {
        node: node.to_string(),
        raw: raw.to_string(),
    };
    let parts = split_on_colon(raw);
    let [relation, phase] = parts.as_slice() else {
        return Err(invalid());
    };
    if phase.is_empty() {
        return Err(invalid());
    }
    let relation = if relation.eq_ignore_ascii_case("before") {
        PhaseRelation::Before
    } else if relation.eq_ignore_ascii_case("after") {
        PhaseRelation::After
    } else {
        return Err(invalid());
    };
    Ok(When::new(relation, *phase))
}

pub(crate) fn parse_rounds(node: &str, raw: &str) -> ParseResult<Vec<RoundRange>> {
    let invalid = || DefinitionError::InvalidRounds {
        node: node.to_string(),
        raw: raw.to_string(),
    };
    let parts = split_on_colon(raw);
    if parts.is_empty() {
        return Err(invalid());
    }
    let mut ranges = Vec::with_capacity(parts.len());
    for part in parts {
        if let Ok(round) = part.parse::<u32>() {
            ranges.push(RoundRange {
                start: round,
                end: Some(round),
            });
            continue;
        }
        let Some((start, end)) = part.split_once('-') else {
            return Err(invalid());
        };
        let start = start.trim().parse::<u32>().map_err(|_| invalid())?;
        let end = match end.trim() {
            "+" => None,
            value => Some(value.parse::<u32>().map_err(|_| invalid())?),
        };
        if end.is_some_and(|end| end < start) {
            return Err(invalid());
        }
        ranges.push(RoundRange { start, end });
    }
    Ok(ranges)
}

/// `"player1:player2:relationshipTypeName"` for a political action. Both players must exist
/// and differ, and the relationship type must be registered.
pub(crate) fn parse_political_change(
    node: &str,
    raw: &str,
    registry: &GameRegistry,
) -> ParseResult<RelationshipChange> {
    let parts = split_on_colon(raw);
    let [first, second, kind] = parts.as_slice() else {
        return Err(malformed(node, raw, "\"プレイヤー1:プレイヤー2:関係タイプ\" の3要素が必要です"));
    };
    let (first, second) = resolve_pair(node, raw, first, second, registry)?;
    let to = registry
        .relationship_type_id(kind)
        .ok_or_else(|| DefinitionError::UnknownRelationshipType {
            node: node.to_string(),
            name: kind.to_string(),
            raw: raw.to_string(),
        })?;
    Ok(RelationshipChange { first, second, to })
}

/// `"player1:player2:oldRelation:newRelation"` for a trigger, where the old relation may be
/// `any`, `anyAllied`, `anyNeutral` or `anyWar`.
pub(crate) fn parse_trigger_relationship_change(
    node: &str,
    raw: &str,
    registry: &GameRegistry,
) -> ParseResult<TriggerRelationshipChange> {
    let parts = split_on_colon(raw);
    let [first, second, from, to] = parts.as_slice() else {
        return Err(malformed(
            node,
            raw,
            "\"プレイヤー1:プレイヤー2:旧関係:新関係\" の4要素が必要です",
        ));
    };
    let (first, second) = resolve_pair(node, raw, first, second, registry)?;
    let from = parse_relationship_match(node, raw, from, registry)?;
    let to = registry
        .relationship_type_id(to)
        .ok_or_else(|| DefinitionError::UnknownRelationshipType {
            node: node.to_string(),
            name: to.to_string(),
            raw: raw.to_string(),
        })?;
    Ok(TriggerRelationshipChange {
        first,
        second,
        from,
        to,
    })
}

pub(crate) fn parse_relationship_check(
    node: &str,
    raw: &str,
    registry: &GameRegistry,
) -> ParseResult<RelationshipCheck> {
    let parts = split_on_colon(raw);
    let (first, second, expected, age) = match parts.as_slice() {
        [first, second, expected] => (*first, *second, *expected, None),
        [first, second, expected, age] => (*first, *second, *expected, Some(*age)),
        _ => {
            return Err(malformed(
                node,
                raw,
                "\"プレイヤー1:プレイヤー2:関係タイプ[:継続ラウンド数]\" の3または4要素が必要です",
            ));
        }
    };
    let (first, second) = resolve_pair(node, raw, first, second, registry)?;
    let expected = parse_relationship_match(node, raw, expected, registry)?;
    let min_rounds_existing = match age {
        None => ANY_RELATIONSHIP_AGE,
        Some(age) => age
            .parse::<i32>()
            .ok()
            .filter(|rounds| *rounds >= ANY_RELATIONSHIP_AGE)
            .ok_or_else(|| malformed(node, raw, "継続ラウンド数は -1 以上の整数で指定してください"))?,
    };
    Ok(RelationshipCheck {
        first,
        second,
        expected,
        min_rounds_existing,
    })
}

/// `"resourceName:amount"`.
pub(crate) fn parse_resource_amount(
    node: &str,
    raw: &str,
    registry: &GameRegistry,
) -> ParseResult<ResourceAmount> {
    let parts = split_on_colon(raw);
    let [resource, amount] = parts.as_slice() else {
        return Err(malformed(node, raw, "\"資源名:数量\" の2要素が必要です"));
    };
    if !registry.has_resource(resource) {
        return Err(DefinitionError::UnknownResource {
            node: node.to_string(),
            name: resource.to_string(),
            raw: raw.to_string(),
        });
    }
    let amount = amount
        .parse::<i64>()
        .map_err(|_| malformed(node, raw, "数量は整数で指定してください"))?;
    Ok(ResourceAmount {
        resource: resource.to_string(),
        amount,
    })
}

fn parse_relationship_match(
    node: &str,
    raw: &str,
    token: &str,
    registry: &GameRegistry,
) -> ParseResult<RelationshipMatch> {
    match token {
        RELATIONSHIP_ANY => Ok(RelationshipMatch::Any),
        RELATIONSHIP_ANY_ALLIED => Ok(RelationshipMatch::Archetype(Archetype::Allied)),
        RELATIONSHIP_ANY_NEUTRAL => Ok(RelationshipMatch::Archetype(Archetype::Neutral)),
        RELATIONSHIP_ANY_WAR => Ok(RelationshipMatch::Archetype(Archetype::War)),
        name => registry
            .relationship_type_id(name)
            .map(RelationshipMatch::Exactly)
            .ok_or_else(|| DefinitionError::UnknownRelationshipType {
                node: node.to_string(),
                name: name.to_string(),
                raw: raw.to_string(),
            }),
    }
}

fn resolve_pair(
    node: &str,
    raw: &str,
    first: &str,
    second: &str,
    registry: &GameRegistry,
) -> ParseResult<(PlayerId, PlayerId)> {
    let lookup = |name: &str| {
        registry
            .player_id(name)
            .ok_or_else(|| DefinitionError::UnknownPlayer {
                node: node.to_string(),
                player: name.to_string(),
                raw: raw.to_string(),
            })
    };
    let first = lookup(first)?;
    let second = lookup(second)?;
    if first == second {
        return Err(malformed(node, raw, "同じプレイヤー同士の関係は指定できません"));
    }
    Ok((first, second))
}

fn split_on_colon(raw: &str) -> Vec<&str> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.split(':').map(str::trim).collect()
}

fn malformed(node: &str, raw: &str, reason: &str) -> DefinitionError {
    DefinitionError::MalformedValue {
        node: node.to_string(),
        raw: raw.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::registry::Archetype;

    fn registry() -> GameRegistry {
        let mut registry = GameRegistry::new();
        registry.add_player("Germany");
        registry.add_player("Russia");
        registry.add_relationship_type("Neutrality", Archetype::Neutral);
        registry.add_relationship_type("War", Archetype::War);
        registry.add_resource("PUs");
        registry
    }

    #[test]
    fn condition_type_accepts_keywords_and_thresholds() {
        assert_eq!(parse_condition_type("n", "and").unwrap(), Combinator::And);
        assert_eq!(parse_condition_type("n", "OR").unwrap(), Combinator::Or);
        assert_eq!(parse_condition_type("n", "Xor").unwrap(), Combinator::Xor);
        assert_eq!(parse_condition_type("n", "2").unwrap(), Combinator::Exactly(2));
        assert_eq!(
            parse_condition_type("n", "2-3").unwrap(),
            Combinator::Between(2, 3)
        );
    }

    #[test]
    fn condition_type_rejects_reversed_or_malformed_ranges() {
        for raw in ["3-2", "2-2", "-1", "1-2-3", "NAND", ""] {
            let err = parse_condition_type("germany_rule", raw).unwrap_err();
            assert!(
                matches!(err, DefinitionError::InvalidConditionType { ref node, .. } if node == "germany_rule"),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn chance_rejects_hit_above_sides() {
        let err = parse_chance("trigger_a", "3:2").unwrap_err();
        assert_eq!(
            err,
            DefinitionError::InvalidChance {
                node: "trigger_a".to_string(),
                raw: "3:2".to_string(),
            }
        );
        assert!(err.to_string().contains("3:2"));
    }

    #[test]
    fn chance_bounds() {
        assert_eq!(parse_chance("n", "1:10").unwrap(), Chance::new(1, 10));
        assert_eq!(parse_chance("n", "120:120").unwrap(), Chance::new(120, 120));
        assert!(parse_chance("n", "1:121").is_err());
        assert!(parse_chance("n", "-1:6").is_err());
        assert!(parse_chance("n", "1").is_err());
        assert!(parse_chance("n", "a:b").is_err());
    }

    #[test]
    fn when_requires_relation_and_phase() {
        assert_eq!(
            parse_when("n", "before:combat").unwrap(),
            When::new(PhaseRelation::Before, "combat")
        );
        assert_eq!(
            parse_when("n", "After:purchase").unwrap(),
            When::new(PhaseRelation::After, "purchase")
        );
        assert!(parse_when("n", "during:combat").is_err());
        assert!(parse_when("n", "before:").is_err());
        assert!(parse_when("n", "before").is_err());
    }

    #[test]
    fn rounds_support_single_values_and_ranges() {
        let ranges = parse_rounds("n", "1:3-5:7-+").unwrap();
        assert_eq!(ranges.len(), 3);
        assert!(ranges[0].contains(1));
        assert!(!ranges[0].contains(2));
        assert!(ranges[1].contains(4));
        assert!(ranges[2].contains(70));
        assert!(parse_rounds("n", "5-3").is_err());
        assert!(parse_rounds("n", "").is_err());
    }

    #[test]
    fn political_change_validates_players_and_type() {
        let registry = registry();
        let change = parse_political_change("pa", "Germany:Russia:War", &registry).unwrap();
        assert_eq!(registry.player_name(change.first), "Germany");
        assert_eq!(registry.relationship_type(change.to).name, "War");

        assert!(matches!(
            parse_political_change("pa", "Germany:Atlantis:War", &registry),
            Err(DefinitionError::UnknownPlayer { ref player, .. }) if player == "Atlantis"
        ));
        assert!(matches!(
            parse_political_change("pa", "Germany:Russia:Vassal", &registry),
            Err(DefinitionError::UnknownRelationshipType { .. })
        ));
        assert!(matches!(
            parse_political_change("pa", "Germany:Germany:War", &registry),
            Err(DefinitionError::MalformedValue { .. })
        ));
        assert!(parse_political_change("pa", "Germany:Russia", &registry).is_err());
    }

    #[test]
    fn trigger_relationship_change_accepts_wildcards() {
        let registry = registry();
        let change =
            parse_trigger_relationship_change("t", "Germany:Russia:anyNeutral:War", &registry)
                .unwrap();
        assert_eq!(change.from, RelationshipMatch::Archetype(Archetype::Neutral));
        let any = parse_trigger_relationship_change("t", "Germany:Russia:any:War", &registry)
            .unwrap();
        assert_eq!(any.from, RelationshipMatch::Any);
    }

    #[test]
    fn relationship_check_takes_an_optional_minimum_age() {
        let registry = registry();
        let plain = parse_relationship_check("r", "Germany:Russia:anyWar", &registry).unwrap();
        assert_eq!(plain.expected, RelationshipMatch::Archetype(Archetype::War));
        assert_eq!(plain.min_rounds_existing, -1);

        let aged = parse_relationship_check("r", "Germany:Russia:War:2", &registry).unwrap();
        assert_eq!(aged.min_rounds_existing, 2);
        assert!(parse_relationship_check("r", "Germany:Russia:War:-1", &registry).is_ok());

        for raw in ["Germany:Russia:War:-2", "Germany:Russia:War:long", "Germany:Russia"] {
            assert!(matches!(
                parse_relationship_check("r", raw, &registry),
                Err(DefinitionError::MalformedValue { .. })
            ));
        }
    }

    #[test]
    fn resource_amount_requires_known_resource() {
        let registry = registry();
        let amount = parse_resource_amount("r", "PUs:12", &registry).unwrap();
        assert_eq!(amount.amount, 12);
        assert!(matches!(
            parse_resource_amount("r", "Oil:12", &registry),
            Err(DefinitionError::UnknownResource { .. })
        ));
        assert!(parse_resource_amount("r", "PUs:many", &registry).is_err());
    }

    #[test]
    fn condition_names_reject_empty_entries() {
        assert_eq!(
            parse_condition_names("n", "a:b:c").unwrap(),
            vec!["a", "b", "c"]
        );
        assert!(parse_condition_names("n", "a::c").is_err());
        assert!(parse_condition_names("n", "").is_err());
    }
}
