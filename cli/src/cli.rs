mod commands;

use std::io::{self, BufRead, Write};

use anyhow::{Context as _, Result, anyhow, bail};
use rulegraph_core::rules::{AcceptancePolicy, ConditionNode, PhaseRelation, PlayerId};
use rulegraph_core::{AttemptOutcome, GameSession, NodeId};
use tracing::info;

use commands::{CommandRegistry, Context};

pub fn run(session: &mut GameSession, ask: bool) -> Result<()> {
    info!(scenario = session.name(), ask, "session started");
    print_intro(session);
    let registry = CommandRegistry::default();
    let stdin = io::stdin();

    loop {
        print!("ラウンド{}> ", session.round());
        io::stdout()
            .flush()
            .context("プロンプトのフラッシュに失敗しました")?;

        let mut line = String::new();
        let bytes = stdin
            .lock()
            .read_line(&mut line)
            .context("入力の読み込みに失敗しました")?;

        if bytes == 0 {
            println!("入力が終了したため終了します。");
            return Ok(());
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let mut ctx = Context::new(session, ask);
        let result = registry.execute_input(&mut ctx, trimmed);
        if let Err(error) = result {
            println!("エラー: {error}");
        }
        if ctx.should_quit() {
            return Ok(());
        }
        print_notifications(session);
    }
}

fn print_intro(session: &GameSession) {
    println!("シナリオ「{}」を読み込みました。", session.name());
    println!(
        "プレイヤー {} 人 / ノード {} 件",
        session.registry().player_ids().count(),
        session.book().len()
    );
    println!("コマンド例: overview / eval single_front / phase before combat / actions 1 / round");
    println!("help で利用可能なコマンド一覧を表示します。");
}

pub(crate) fn print_help() {
    println!("利用可能なコマンド:");
    println!("  overview                    プレイヤーとノードの一覧を表示");
    println!("  inspect <ノード>            ノードの詳細を表示");
    println!("  eval <ノード>               ノードの条件を評価");
    println!("  phase [before|after <名>]   フェーズのトリガーを発動 (省略時は既定位置)");
    println!("  actions <プレイヤー>        実行可能なアクションを表示");
    println!("  attempt <プレイヤー> <名>   アクションを試行");
    println!("  switch <ルール> on|off      ルールのスイッチを切り替え");
    println!("  round                       ラウンドを終了して次へ進む");
    println!("  history                     履歴を表示");
    println!("  changes                     適用済みの変更を JSON で表示");
    println!("  quit                        終了");
}

pub(crate) fn print_overview(session: &GameSession) {
    let registry = session.registry();
    println!("ラウンド {}", session.round());
    println!("ID | {:<12} | 資源", "プレイヤー");
    for id in registry.player_ids() {
        let player = registry.player(id);
        let resources: Vec<String> = player
            .resources()
            .iter()
            .map(|(name, amount)| format!("{name}={amount}"))
            .collect();
        println!(
            "{:>2} | {:<12} | {}",
            id.index() + 1,
            player.name,
            resources.join(", ")
        );
    }

    println!("関係:");
    let players: Vec<PlayerId> = registry.player_ids().collect();
    for (pos, first) in players.iter().enumerate() {
        for second in &players[pos + 1..] {
            let kind = registry.relationship_type(registry.relationship(*first, *second));
            println!(
                "  {} - {}: {} ({})",
                registry.player_name(*first),
                registry.player_name(*second),
                kind.name,
                kind.archetype.label()
            );
        }
    }

    println!("ノード:");
    for (_, node) in session.book().iter() {
        println!(
            "  {:<28} {:<16} {}",
            node.name,
            node.kind_label(),
            registry.player_name(node.owner)
        );
    }
}

pub(crate) fn print_node_details(session: &GameSession, id: NodeId) {
    let mut lines = session.describe_node(id).into_iter();
    if let Some(title) = lines.next() {
        println!("-- {title} --");
    }
    for line in lines {
        println!("{line}");
    }
}

pub(crate) fn print_history(session: &GameSession) {
    if session.history().is_empty() {
        println!("履歴はまだありません。");
        return;
    }
    for (idx, event) in session.history().iter().enumerate() {
        println!("{:>3}. {}", idx + 1, event.title);
        for child in &event.children {
            println!("       - {child}");
        }
    }
}

fn print_notifications(session: &mut GameSession) {
    let notes = session.take_notifications();
    for note in notes {
        println!(
            "[{}への通知] {}",
            session.registry().player_name(note.player),
            note.message
        );
    }
}

pub(crate) fn print_attempt_outcome(session: &GameSession, outcome: &AttemptOutcome) {
    match outcome {
        AttemptOutcome::NotValid => println!("このアクションは現在実行できません。"),
        AttemptOutcome::InsufficientFunds { cost, available } => {
            println!("資金が不足しています (必要 {cost} / 所持 {available})。")
        }
        AttemptOutcome::ChanceFailed => println!("判定に失敗しました。"),
        AttemptOutcome::Rejected { by } => println!(
            "{} が拒否しました。",
            session.registry().player_name(*by)
        ),
        AttemptOutcome::Succeeded { effects } => {
            println!("成功しました (効果 {effects} 件)。")
        }
    }
}

pub(crate) fn parse_phase<'a>(
    first: Option<&'a str>,
    second: Option<&'a str>,
) -> Result<Option<(PhaseRelation, &'a str)>> {
    let Some(first) = first else {
        return Ok(None);
    };
    let (relation, phase) = match first.split_once(':') {
        Some((relation, phase)) => (relation, Some(phase)),
        None => (first, second),
    };
    let relation = match relation.to_ascii_lowercase().as_str() {
        "before" => PhaseRelation::Before,
        "after" => PhaseRelation::After,
        other => bail!("before か after を指定してください: {other}"),
    };
    let phase = phase
        .filter(|phase| !phase.is_empty())
        .ok_or_else(|| anyhow!("フェーズ名を指定してください。"))?;
    Ok(Some((relation, phase)))
}

pub(crate) fn parse_switch(token: &str) -> Result<bool> {
    match token.to_ascii_lowercase().as_str() {
        "on" | "true" => Ok(true),
        "off" | "false" => Ok(false),
        other => bail!("on か off を指定してください: {other}"),
    }
}

/// Asks on stdin whether each accepting player agrees.
pub(crate) struct PromptAcceptance {
    names: Vec<String>,
}

impl PromptAcceptance {
    pub(crate) fn new(session: &GameSession) -> Self {
        let registry = session.registry();
        Self {
            names: registry
                .player_ids()
                .map(|id| registry.player_name(id).to_string())
                .collect(),
        }
    }
}

impl AcceptancePolicy for PromptAcceptance {
    fn accepts(&mut self, player: PlayerId, action: &ConditionNode) -> bool {
        let name = self
            .names
            .get(player.index())
            .map(String::as_str)
            .unwrap_or("?");
        let text = action.action().map_or(action.name.as_str(), |state| state.text.as_str());
        print!("{name} は「{text}」を受け入れますか? [y/N] ");
        if io::stdout().flush().is_err() {
            return false;
        }
        let mut answer = String::new();
        if io::stdin().lock().read_line(&mut answer).is_err() {
            return false;
        }
        matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_accepts_separate_or_joined_tokens() {
        assert_eq!(parse_phase(None, None).unwrap(), None);
        assert_eq!(
            parse_phase(Some("before"), Some("combat")).unwrap(),
            Some((PhaseRelation::Before, "combat"))
        );
        assert_eq!(
            parse_phase(Some("AFTER:purchase"), None).unwrap(),
            Some((PhaseRelation::After, "purchase"))
        );
        assert!(parse_phase(Some("during"), Some("combat")).is_err());
        assert!(parse_phase(Some("before"), None).is_err());
    }

    #[test]
    fn switch_tokens() {
        assert!(parse_switch("ON").unwrap());
        assert!(!parse_switch("off").unwrap());
        assert!(parse_switch("maybe").is_err());
    }
}
