//! One-shot user notifications with auto-dismiss deadlines.

use chrono::{NaiveDateTime, Timelike};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Warning,
    Error,
}

impl Level {
    pub fn lifetime(self) -> Duration {
        match self {
            Level::Error => Duration::from_secs(8),
            Level::Success => Duration::from_secs(5),
            Level::Info | Level::Warning => Duration::from_secs(6),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub id: u64,
    pub level: Level,
    pub message: String,
    pub created_at: Instant,
}

impl Notification {
    pub fn expired(&self, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) >= self.level.lifetime()
    }
}

#[derive(Debug, Default)]
pub struct Notifications {
    items: Vec<Notification>,
    next_id: u64,
}

impl Notifications {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: Level, message: impl Into<String>) -> u64 {
        self.push_at(level, message, Instant::now())
    }

    pub fn push_at(&mut self, level: Level, message: impl Into<String>, now: Instant) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.items.push(Notification {
            id,
            level,
            message: message.into(),
            created_at: now,
        });
        id
    }

    /// Removing an id that already expired or was dismissed is a no-op.
    pub fn dismiss(&mut self, id: u64) {
        self.items.retain(|n| n.id != id);
    }

    pub fn dismiss_latest(&mut self) {
        self.items.pop();
    }

    pub fn prune(&mut self, now: Instant) {
        self.items.retain(|n| !n.expired(now));
    }

    pub fn latest(&self) -> Option<&Notification> {
        self.items.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notification> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// "🌅 Good morning, ocean! (9:05 AM)"
pub fn greeting(username: &str, now: NaiveDateTime) -> String {
    let salutation = match now.hour() {
        0..=5 => "🌙 Late night productivity",
        6..=11 => "🌅 Good morning",
        12..=16 => "☀️ Good afternoon",
        17..=20 => "🌅 Good evening",
        _ => "🌙 Good night",
    };
    format!("{}, {}! ({})", salutation, username, now.format("%-I:%M %p"))
}
