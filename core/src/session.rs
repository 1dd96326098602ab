use anyhow::{Result, anyhow, bail};
use rand::{SeedableRng, rngs::StdRng};
use tracing::info;

use crate::rules::{
    AcceptancePolicy, AttemptOutcome, Change, ChancePacing, CompiledScenario, DelegateBridge,
    EngineSettings, GameRegistry, HistoryEvent, NodeId, NodeKind, Notification, PhaseFilter,
    PlayerId, PropertyChange, RandomSource, RecordingBridge, RuleBook, StdRandomSource,
    apply_all, attempt_action, collect_and_fire, consume_round_uses, evaluate_closure,
    reset_all_attempts, valid_actions,
};

pub struct SessionBuilder {
    scenario: CompiledScenario,
    random: Box<dyn RandomSource>,
    pacing: Option<ChancePacing>,
}

impl SessionBuilder {
    pub fn new(scenario: CompiledScenario) -> Self {
        Self {
            scenario,
            random: Box::new(StdRandomSource::new(StdRng::from_entropy())),
            pacing: None,
        }
    }

    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.random = Box::new(StdRandomSource::new(rng));
        self
    }

    pub fn with_seed(self, seed: u64) -> Self {
        self.with_rng(StdRng::seed_from_u64(seed))
    }

    pub fn with_random(mut self, random: Box<dyn RandomSource>) -> Self {
        self.random = random;
        self
    }

    /// Overrides the pacing taken from the scenario settings.
    pub fn with_pacing(mut self, pacing: ChancePacing) -> Self {
        self.pacing = Some(pacing);
        self
    }

    pub fn build(self) -> GameSession {
        let SessionBuilder {
            scenario,
            random,
            pacing,
        } = self;
        let CompiledScenario {
            name,
            mut settings,
            registry,
            book,
        } = scenario;
        if let Some(pacing) = pacing {
            settings.chance_pacing_ms = u64::try_from(pacing.delay().as_millis()).unwrap_or(u64::MAX);
        }
        GameSession {
            name,
            settings,
            registry,
            book,
            bridge: RecordingBridge::new(random),
            change_log: Vec::new(),
        }
    }
}

/// One running game: the rule book and registry, the bridge every step records on, and
/// the ordered log of every change applied so far.
///
/// Each operation runs the engine against the current state, then drains the bridge and
/// applies the recorded changes in order.
pub struct GameSession {
    name: String,
    settings: EngineSettings,
    registry: GameRegistry,
    book: RuleBook,
    bridge: RecordingBridge,
    change_log: Vec<Change>,
}

impl GameSession {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    pub fn book(&self) -> &RuleBook {
        &self.book
    }

    pub fn round(&self) -> u32 {
        self.registry.round()
    }

    pub fn history(&self) -> &[HistoryEvent] {
        self.bridge.history()
    }

    /// Every change applied since the session started, in application order.
    pub fn changes(&self) -> &[Change] {
        &self.change_log
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        self.bridge.take_notifications()
    }

    pub fn find_player(&self, token: &str) -> Result<PlayerId> {
        self.registry.find_player(token).ok_or_else(|| {
            anyhow!(
                "プレイヤーを特定できませんでした: {} (番号か名前を入力してください)",
                token
            )
        })
    }

    pub fn find_node(&self, token: &str) -> Result<NodeId> {
        self.book
            .find_loose(token)
            .ok_or_else(|| anyhow!("ノードが見つかりません: {}", token))
    }

    /// Fires the triggers eligible for `phase` (or the default, phase-less location).
    pub fn run_phase(&mut self, phase: PhaseFilter<'_>) -> Vec<NodeId> {
        let triggers: Vec<NodeId> = self.book.triggers().collect();
        let fired = collect_and_fire(
            &self.book,
            &self.registry,
            &triggers,
            phase,
            &mut self.bridge,
            self.settings.pacing(),
        );
        self.flush();
        fired
    }

    /// Closes the current round: consumes uses of latched triggers, restores every
    /// action's attempts and advances the round counter. Returns the new round.
    pub fn end_round(&mut self) -> u32 {
        let finished = self.registry.round();
        self.bridge
            .start_event(&format!("ラウンド{finished} を終了します"));
        consume_round_uses(&self.book, &mut self.bridge);
        reset_all_attempts(&self.book, &mut self.bridge);
        self.bridge.add_change(Change::AdvanceRound);
        self.flush();
        info!(finished, next = self.registry.round(), "round advanced");
        self.registry.round()
    }

    pub fn valid_actions(&self, player: PlayerId) -> Vec<NodeId> {
        valid_actions(&self.book, &self.registry, player)
    }

    pub fn attempt_action(
        &mut self,
        player: PlayerId,
        action: NodeId,
        policy: &mut dyn AcceptancePolicy,
    ) -> Result<AttemptOutcome> {
        let node = self.book.node(action);
        if node.action().is_none() {
            bail!("{} はアクションではありません", node.name);
        }
        if node.owner != player {
            bail!(
                "{} は {} のアクションではありません",
                node.name,
                self.registry.player_name(player)
            );
        }
        let outcome = attempt_action(
            &self.book,
            &self.registry,
            action,
            &mut self.bridge,
            &self.settings,
            policy,
        );
        self.flush();
        Ok(outcome)
    }

    /// Satisfaction of one node against a fresh evaluation pass.
    pub fn evaluate(&self, name: &str) -> Result<bool> {
        let id = self.find_node(name)?;
        let map = evaluate_closure(&self.book, &self.registry, [id]);
        Ok(map.satisfied(id))
    }

    pub fn set_switch(&mut self, name: &str, on: bool) -> Result<()> {
        let id = self.find_node(name)?;
        let node = self.book.node(id);
        let Some(check) = node.rules() else {
            bail!("{} はルールノードではないためスイッチを持ちません", node.name);
        };
        if check.switch == on {
            return Ok(());
        }
        self.bridge.start_event(&format!(
            "{} のスイッチを {} にしました",
            node.name,
            if on { "on" } else { "off" }
        ));
        self.bridge
            .add_change(Change::property(id, PropertyChange::Switch(on)));
        self.flush();
        Ok(())
    }

    /// Applies a previously recorded change log, e.g. to rebuild a game from a fresh
    /// scenario. The changes are appended to this session's own log.
    pub fn replay(&mut self, changes: &[Change]) {
        apply_all(&mut self.book, &mut self.registry, changes);
        self.change_log.extend_from_slice(changes);
    }

    /// Human-readable description of a node, one line per attribute.
    pub fn describe_node(&self, id: NodeId) -> Vec<String> {
        let node = self.book.node(id);
        let registry = &self.registry;
        let mut lines = vec![
            format!("{} ({})", node.name, node.kind_label()),
            format!("所有者: {}", registry.player_name(node.owner)),
        ];
        if !node.core.children.is_empty() {
            let children: Vec<&str> = node
                .core
                .children
                .iter()
                .map(|child| self.book.name_of(*child))
                .collect();
            lines.push(format!(
                "条件: {} [{}]{}",
                children.join(":"),
                node.core.combinator,
                if node.core.invert { " (反転)" } else { "" }
            ));
        }
        lines.push(format!(
            "確率: {} (成功時 -{}, 失敗時 +{})",
            node.core.chance,
            node.core.chance_decrement_on_success,
            node.core.chance_increment_on_failure
        ));

        match &node.kind {
            NodeKind::Rules(check) => {
                lines.push(format!("スイッチ: {}", if check.switch { "on" } else { "off" }));
                for range in &check.rounds {
                    lines.push(match range.end {
                        Some(end) => format!("ラウンド: {}-{}", range.start, end),
                        None => format!("ラウンド: {}-+", range.start),
                    });
                }
                for relation in &check.relationships {
                    let mut line = format!(
                        "関係: {} と {} が {}",
                        registry.player_name(relation.first),
                        registry.player_name(relation.second),
                        relation.expected.describe(registry)
                    );
                    if relation.min_rounds_existing >= 0 {
                        line.push_str(&format!(" ({} ラウンド以上継続)", relation.min_rounds_existing));
                    }
                    lines.push(line);
                }
                for requirement in &check.resources {
                    lines.push(format!(
                        "資源: {} >= {}",
                        requirement.resource, requirement.amount
                    ));
                }
            }
            NodeKind::Trigger(state) => {
                let uses = if state.is_unlimited() {
                    "無制限".to_string()
                } else {
                    state.uses.to_string()
                };
                lines.push(format!(
                    "残り回数: {uses}{}",
                    if state.used_this_round {
                        " (このラウンド使用済み)"
                    } else {
                        ""
                    }
                ));
                if !state.when.is_empty() {
                    let when: Vec<String> = state.when.iter().map(ToString::to_string).collect();
                    lines.push(format!("発動タイミング: {}", when.join(", ")));
                }
                if let Some(text) = &state.notification {
                    lines.push(format!("通知: {text}"));
                }
                for change in &state.relationship_changes {
                    lines.push(format!(
                        "関係変更: {} と {} ({} -> {})",
                        registry.player_name(change.first),
                        registry.player_name(change.second),
                        change.from.describe(registry),
                        registry.relationship_type(change.to).name
                    ));
                }
                for grant in &state.resource_grants {
                    lines.push(format!("資源付与: {} {}", grant.resource, grant.amount));
                }
            }
            NodeKind::UserAction {
                action,
                activate_triggers,
            } => {
                lines.push(format!(
                    "{} / 費用 {} / 残り試行 {}/{}",
                    action.text, action.cost, action.attempts_left, action.attempts_per_turn
                ));
                let triggers: Vec<&str> = activate_triggers
                    .iter()
                    .map(|trigger| self.book.name_of(*trigger))
                    .collect();
                if !triggers.is_empty() {
                    lines.push(format!("発動トリガー: {}", triggers.join(", ")));
                }
            }
            NodeKind::PoliticalAction {
                action,
                relationship_changes,
            } => {
                lines.push(format!(
                    "{} / 費用 {} / 残り試行 {}/{}",
                    action.text, action.cost, action.attempts_left, action.attempts_per_turn
                ));
                for change in relationship_changes {
                    lines.push(format!(
                        "関係変更: {} と {} -> {}",
                        registry.player_name(change.first),
                        registry.player_name(change.second),
                        registry.relationship_type(change.to).name
                    ));
                }
            }
        }
        lines
    }

    fn flush(&mut self) {
        let changes = self.bridge.take_changes();
        apply_all(&mut self.book, &mut self.registry, &changes);
        self.change_log.extend(changes);
    }
}
