//! Notification feed: the short user-facing messages the front-end shows as toasts.

use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Oldest entries are dropped beyond this many.
const FEED_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Info,
    Warning,
    Destructive,
}

#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub seq: u64,
    pub level: Level,
    pub title: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Feed {
    next_seq: u64,
    items: VecDeque<Notification>,
}

/// Append-only, bounded, sequence-numbered notifications.
///
/// Pushed from synchronous retry hooks, so this uses a blocking mutex that is never
/// held across an await.
#[derive(Debug, Default)]
pub struct NotificationFeed {
    feed: Mutex<Feed>,
}

impl NotificationFeed {
    pub fn push(&self, level: Level, title: impl Into<String>, description: impl Into<String>) -> u64 {
        let mut feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
        feed.next_seq += 1;
        let seq = feed.next_seq;
        feed.items.push_back(Notification {
            seq,
            level,
            title: title.into(),
            description: description.into(),
            created_at: Utc::now(),
        });
        while feed.items.len() > FEED_CAPACITY {
            feed.items.pop_front();
        }
        seq
    }

    /// Notifications with a sequence number greater than `seq`, oldest first.
    pub fn since(&self, seq: u64) -> Vec<Notification> {
        let feed = self.feed.lock().unwrap_or_else(PoisonError::into_inner);
        feed.items.iter().filter(|n| n.seq > seq).cloned().collect()
    }
}
