use std::thread;
use std::time::Duration;

use tracing::debug;

use super::book::RuleBook;
use super::change::{Change, DelegateBridge, PropertyChange};
use super::node::{Chance, ConditionCore, NodeId};
use super::registry::GameRegistry;

/// Delay inserted before each live chance draw. Throttles bursts of chance triggers against
/// a shared random service; it only ever blocks the calling session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChancePacing {
    delay: Duration,
}

impl ChancePacing {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn from_millis(millis: u64) -> Self {
        Self {
            delay: Duration::from_millis(millis),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    fn pause(&self) {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
    }
}

/// Where the draw's history line goes: a trigger opens its own event, an action attempt
/// adds to the event the attempt already started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChanceContext {
    Trigger,
    Attempt,
}

/// Runs the chance gate of `id`.
///
/// Guaranteed (`hit >= sides`, or `sides == 0`) and impossible (`hit == 0`) chances never
/// draw. Otherwise one value in `[0, sides)` is drawn, shifted to 1-based, and compared with
/// the hit target. The threshold adjustment is recorded before the owner is notified.
pub fn test_chance(
    book: &RuleBook,
    registry: &GameRegistry,
    id: NodeId,
    bridge: &mut dyn DelegateBridge,
    pacing: ChancePacing,
    context: ChanceContext,
) -> bool {
    let node = book.node(id);
    let chance = node.core.chance;
    if chance.is_guaranteed() {
        record_adjustment(book, id, true, bridge, adjustment_line(context));
        return true;
    }
    if chance.is_impossible() {
        record_adjustment(book, id, false, bridge, adjustment_line(context));
        return false;
    }

    pacing.pause();
    let label = format!(
        "{} が {} の発動判定 ({}/{})",
        registry.player_name(node.owner),
        node.name,
        chance.hit,
        chance.sides
    );
    let roll = bridge.random(chance.sides, &label) + 1;
    let success = roll <= chance.hit;
    let message = format!(
        "{}: {} ({} / {}) の判定 結果: {} = {}",
        registry.player_name(node.owner),
        node.name,
        chance.hit,
        chance.sides,
        roll,
        if success { "成功!" } else { "失敗" }
    );
    debug!(
        node = node.name.as_str(),
        hit = chance.hit,
        sides = chance.sides,
        roll,
        success,
        "chance draw"
    );
    match context {
        ChanceContext::Trigger => bridge.start_event(&message),
        ChanceContext::Attempt => bridge.add_child_to_event(&message),
    }
    record_adjustment(book, id, success, bridge, HistoryLine::Child);
    bridge.report_to_player(node.owner, &message);
    success
}

/// The threshold after a success or failure, or `None` when it would not move.
pub fn adjusted_chance(core: &ConditionCore, success: bool) -> Option<Chance> {
    let Chance { hit, sides } = core.chance;
    let next = if success {
        hit.saturating_sub(core.chance_decrement_on_success)
    } else {
        hit.saturating_add(core.chance_increment_on_failure)
    };
    let next = next.min(sides);
    (next != hit).then(|| Chance::new(next, sides))
}

/// How the adjustment line enters the history log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryLine {
    Event,
    Child,
}

/// Without a draw event a trigger has nothing of its own to attach to.
fn adjustment_line(context: ChanceContext) -> HistoryLine {
    match context {
        ChanceContext::Trigger => HistoryLine::Event,
        ChanceContext::Attempt => HistoryLine::Child,
    }
}

fn record_adjustment(
    book: &RuleBook,
    id: NodeId,
    success: bool,
    bridge: &mut dyn DelegateBridge,
    line: HistoryLine,
) {
    let node = book.node(id);
    let Some(next) = adjusted_chance(&node.core, success) else {
        return;
    };
    debug!(
        node = node.name.as_str(),
        from = %node.core.chance,
        to = %next,
        "chance threshold adjusted"
    );
    bridge.add_change(Change::property(id, PropertyChange::Chance(next)));
    let outcome = if success { "成功" } else { "失敗" };
    let text = format!("{outcome}により {} の確率が {next} に変化しました", node.name);
    match line {
        HistoryLine::Event => bridge.start_event(&text),
        HistoryLine::Child => bridge.add_child_to_event(&text),
    }
}
