use std::collections::HashMap;

use anyhow::{Context as _, Result, anyhow, bail};
use rulegraph_core::{AcceptAll, GameSession};

use super::{
    PromptAcceptance, parse_phase, parse_switch, print_attempt_outcome, print_help,
    print_history, print_node_details, print_overview,
};

pub struct Context<'a> {
    session: &'a mut GameSession,
    ask: bool,
    quit: bool,
}

impl<'a> Context<'a> {
    pub fn new(session: &'a mut GameSession, ask: bool) -> Self {
        Self {
            session,
            ask,
            quit: false,
        }
    }

    pub fn session(&self) -> &GameSession {
        &*self.session
    }

    pub fn session_mut(&mut self) -> &mut GameSession {
        &mut *self.session
    }

    pub fn should_quit(&self) -> bool {
        self.quit
    }
}

/// Whitespace-separated arguments that follow the command word.
pub struct Args<'a> {
    tokens: std::vec::IntoIter<&'a str>,
}

impl<'a> Args<'a> {
    pub fn new(tokens: Vec<&'a str>) -> Self {
        Self {
            tokens: tokens.into_iter(),
        }
    }

    pub fn next(&mut self) -> Option<&'a str> {
        self.tokens.next()
    }

    pub fn next_required(&mut self, message: &str) -> Result<&'a str> {
        self.next().ok_or_else(|| anyhow!(message.to_owned()))
    }

    pub fn finish(mut self) -> Result<()> {
        match self.tokens.next() {
            Some(extra) => bail!("余分な引数があります: {extra}"),
            None => Ok(()),
        }
    }
}

pub trait Command {
    fn name() -> &'static str;
    fn execute(ctx: &mut Context<'_>, args: Args<'_>) -> Result<()>;
}

type CommandFn = for<'a> fn(&mut Context<'a>, Args<'a>) -> Result<()>;

pub struct CommandRegistry {
    handlers: HashMap<&'static str, CommandFn>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<C: Command>(&mut self) {
        let previous = self.handlers.insert(C::name(), C::execute);
        assert!(previous.is_none(), "重複したコマンド登録です: {}", C::name());
    }

    pub fn execute_input<'a>(&self, ctx: &mut Context<'a>, input: &'a str) -> Result<()> {
        let mut words = input.split_whitespace();
        let command = words
            .next()
            .map(str::to_ascii_lowercase)
            .ok_or_else(|| anyhow!("コマンドが指定されていません。"))?;
        let Some(handler) = self.handlers.get(command.as_str()) else {
            bail!("未対応のコマンドです: {command}. help で一覧を確認してください。");
        };
        handler(ctx, Args::new(words.collect()))
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        let mut registry = Self::new();
        registry.register::<HelpCommand>();
        registry.register::<HelpAliasCommand>();
        registry.register::<OverviewCommand>();
        registry.register::<OverviewAliasCommand>();
        registry.register::<InspectCommand>();
        registry.register::<ShowCommand>();
        registry.register::<EvalCommand>();
        registry.register::<PhaseCommand>();
        registry.register::<ActionsCommand>();
        registry.register::<AttemptCommand>();
        registry.register::<SwitchCommand>();
        registry.register::<RoundCommand>();
        registry.register::<EndCommand>();
        registry.register::<HistoryCommand>();
        registry.register::<ChangesCommand>();
        registry.register::<QuitCommand>();
        registry.register::<ExitCommand>();
        registry
    }
}

pub struct HelpCommand;

impl Command for HelpCommand {
    fn name() -> &'static str {
        "help"
    }

    fn execute(_ctx: &mut Context<'_>, _args: Args<'_>) -> Result<()> {
        print_help();
        Ok(())
    }
}

pub struct HelpAliasCommand;

impl Command for HelpAliasCommand {
    fn name() -> &'static str {
        "?"
    }

    fn execute(ctx: &mut Context<'_>, args: Args<'_>) -> Result<()> {
        HelpCommand::execute(ctx, args)
    }
}

pub struct OverviewCommand;

impl Command for OverviewCommand {
    fn name() -> &'static str {
        "overview"
    }

    fn execute(ctx: &mut Context<'_>, _args: Args<'_>) -> Result<()> {
        print_overview(ctx.session());
        Ok(())
    }
}

pub struct OverviewAliasCommand;

impl Command for OverviewAliasCommand {
    fn name() -> &'static str {
        "ov"
    }

    fn execute(ctx: &mut Context<'_>, args: Args<'_>) -> Result<()> {
        OverviewCommand::execute(ctx, args)
    }
}

pub struct InspectCommand;

impl Command for InspectCommand {
    fn name() -> &'static str {
        "inspect"
    }

    fn execute(ctx: &mut Context<'_>, mut args: Args<'_>) -> Result<()> {
        let token = args.next_required("ノード名を指定してください。")?;
        let id = ctx.session().find_node(token)?;
        print_node_details(ctx.session(), id);
        Ok(())
    }
}

pub struct ShowCommand;

impl Command for ShowCommand {
    fn name() -> &'static str {
        "show"
    }

    fn execute(ctx: &mut Context<'_>, args: Args<'_>) -> Result<()> {
        InspectCommand::execute(ctx, args)
    }
}

pub struct EvalCommand;

impl Command for EvalCommand {
    fn name() -> &'static str {
        "eval"
    }

    fn execute(ctx: &mut Context<'_>, mut args: Args<'_>) -> Result<()> {
        let token = args.next_required("評価するノード名を指定してください。")?;
        let satisfied = ctx.session().evaluate(token)?;
        println!(
            "{}: {}",
            token,
            if satisfied { "成立" } else { "不成立" }
        );
        Ok(())
    }
}

pub struct PhaseCommand;

impl Command for PhaseCommand {
    fn name() -> &'static str {
        "phase"
    }

    fn execute(ctx: &mut Context<'_>, mut args: Args<'_>) -> Result<()> {
        let first = args.next();
        let second = match first {
            Some(token) if !token.contains(':') => args.next(),
            _ => None,
        };
        let phase = parse_phase(first, second)?;
        args.finish()?;
        let fired = ctx.session_mut().run_phase(phase);
        if fired.is_empty() {
            println!("発動したトリガーはありません。");
            return Ok(());
        }
        let session = ctx.session();
        println!("発動したトリガー:");
        for id in fired {
            println!("  - {}", session.book().name_of(id));
        }
        Ok(())
    }
}

pub struct ActionsCommand;

impl Command for ActionsCommand {
    fn name() -> &'static str {
        "actions"
    }

    fn execute(ctx: &mut Context<'_>, mut args: Args<'_>) -> Result<()> {
        let token = args.next_required("プレイヤーを指定してください。")?;
        let session = ctx.session();
        let player = session.find_player(token)?;
        let actions = session.valid_actions(player);
        let player_name = session.registry().player_name(player);
        if actions.is_empty() {
            println!("{player_name} が実行できるアクションはありません。");
            return Ok(());
        }
        println!("{player_name} が実行できるアクション:");
        for id in actions {
            let node = session.book().node(id);
            if let Some(action) = node.action() {
                println!(
                    "  {:<28} {} (費用 {}, 残り {}/{})",
                    node.name,
                    action.text,
                    action.cost,
                    action.attempts_left,
                    action.attempts_per_turn
                );
            }
        }
        Ok(())
    }
}

pub struct AttemptCommand;

impl Command for AttemptCommand {
    fn name() -> &'static str {
        "attempt"
    }

    fn execute(ctx: &mut Context<'_>, mut args: Args<'_>) -> Result<()> {
        let player_token = args.next_required("プレイヤーを指定してください。")?;
        let action_token = args.next_required("アクション名を指定してください。")?;
        let player = ctx.session().find_player(player_token)?;
        let action = ctx.session().find_node(action_token)?;
        let outcome = if ctx.ask {
            let mut policy = PromptAcceptance::new(ctx.session());
            ctx.session_mut().attempt_action(player, action, &mut policy)?
        } else {
            ctx.session_mut()
                .attempt_action(player, action, &mut AcceptAll)?
        };
        print_attempt_outcome(ctx.session(), &outcome);
        Ok(())
    }
}

pub struct SwitchCommand;

impl Command for SwitchCommand {
    fn name() -> &'static str {
        "switch"
    }

    fn execute(ctx: &mut Context<'_>, mut args: Args<'_>) -> Result<()> {
        let token = args.next_required("ルール名を指定してください。")?;
        let value = parse_switch(args.next_required("on か off を指定してください。")?)?;
        ctx.session_mut().set_switch(token, value)?;
        println!(
            "{} のスイッチを {} にしました。",
            token,
            if value { "on" } else { "off" }
        );
        Ok(())
    }
}

pub struct RoundCommand;

impl Command for RoundCommand {
    fn name() -> &'static str {
        "round"
    }

    fn execute(ctx: &mut Context<'_>, args: Args<'_>) -> Result<()> {
        args.finish()?;
        let next = ctx.session_mut().end_round();
        println!("--- ラウンド{next} を開始します ---");
        Ok(())
    }
}

pub struct EndCommand;

impl Command for EndCommand {
    fn name() -> &'static str {
        "end"
    }

    fn execute(ctx: &mut Context<'_>, args: Args<'_>) -> Result<()> {
        RoundCommand::execute(ctx, args)
    }
}

pub struct HistoryCommand;

impl Command for HistoryCommand {
    fn name() -> &'static str {
        "history"
    }

    fn execute(ctx: &mut Context<'_>, _args: Args<'_>) -> Result<()> {
        print_history(ctx.session());
        Ok(())
    }
}

pub struct ChangesCommand;

impl Command for ChangesCommand {
    fn name() -> &'static str {
        "changes"
    }

    fn execute(ctx: &mut Context<'_>, _args: Args<'_>) -> Result<()> {
        let json = serde_json::to_string_pretty(ctx.session().changes())
            .context("変更履歴の JSON 変換に失敗しました")?;
        println!("{json}");
        Ok(())
    }
}

pub struct QuitCommand;

impl Command for QuitCommand {
    fn name() -> &'static str {
        "quit"
    }

    fn execute(ctx: &mut Context<'_>, _args: Args<'_>) -> Result<()> {
        println!("終了します。");
        ctx.quit = true;
        Ok(())
    }
}

pub struct ExitCommand;

impl Command for ExitCommand {
    fn name() -> &'static str {
        "exit"
    }

    fn execute(ctx: &mut Context<'_>, args: Args<'_>) -> Result<()> {
        QuitCommand::execute(ctx, args)
    }
}
