use serde::Serialize;

use super::change::{Change, DelegateBridge, RandomSource};
use super::registry::PlayerId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HistoryEvent {
    pub title: String,
    pub children: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub player: PlayerId,
    pub message: String,
}

/// In-memory [`DelegateBridge`]: keeps pending changes until the session applies them, and
/// keeps the history and player messages for display.
pub struct RecordingBridge {
    random: Box<dyn RandomSource>,
    pending: Vec<Change>,
    history: Vec<HistoryEvent>,
    notifications: Vec<Notification>,
    draws: usize,
}

impl RecordingBridge {
    pub fn new(random: Box<dyn RandomSource>) -> Self {
        Self {
            random,
            pending: Vec::new(),
            history: Vec::new(),
            notifications: Vec::new(),
            draws: 0,
        }
    }

    pub fn take_changes(&mut self) -> Vec<Change> {
        std::mem::take(&mut self.pending)
    }

    pub fn pending_changes(&self) -> &[Change] {
        &self.pending
    }

    pub fn history(&self) -> &[HistoryEvent] {
        &self.history
    }

    pub fn take_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.notifications)
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    /// Number of live random draws made through this bridge.
    pub fn draw_count(&self) -> usize {
        self.draws
    }
}

impl DelegateBridge for RecordingBridge {
    fn add_change(&mut self, change: Change) {
        if change.is_empty() {
            return;
        }
        self.pending.push(change);
    }

    fn start_event(&mut self, text: &str) {
        self.history.push(HistoryEvent {
            title: text.to_string(),
            children: Vec::new(),
        });
    }

    fn add_child_to_event(&mut self, text: &str) {
        match self.history.last_mut() {
            Some(event) => event.children.push(text.to_string()),
            None => self.start_event(text),
        }
    }

    fn random(&mut self, sides: u32, label: &str) -> u32 {
        self.draws += 1;
        self.random.draw(sides, label)
    }

    fn report_to_player(&mut self, player: PlayerId, message: &str) {
        self.notifications.push(Notification {
            player,
            message: message.to_string(),
        });
    }
}
