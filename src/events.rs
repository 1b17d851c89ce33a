//! UI-facing log stream: a bounded, drop-oldest broadcast of timestamped
//! strings, per `spec.md` §9 ("a bounded queue with drop-oldest is
//! preferred over unbounded buffering"). Every event published here is also
//! emitted as a `tracing` event, so the crate still logs normally when no
//! UI is attached.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

pub struct LogHub {
    sender: broadcast::Sender<LogEvent>,
    history: Mutex<VecDeque<LogEvent>>,
    capacity: usize,
}

impl LogHub {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            history: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<LogEvent> {
        self.sender.subscribe()
    }

    /// Records and broadcasts a log line. The oldest retained line is
    /// dropped once `max_log_lines` history entries are held; broadcast
    /// subscribers that fall behind likewise lose only their oldest
    /// unread events (`tokio::sync::broadcast`'s native lagged-receiver
    /// behavior), never the whole stream.
    pub fn publish(&self, message: impl Into<String>) {
        let event = LogEvent {
            timestamp: Utc::now(),
            message: message.into(),
        };
        tracing::info!(target: "arpcage::events", "{}", event.message);

        let mut history = self.history.lock().unwrap();
        if history.len() == self.capacity {
            history.pop_front();
        }
        history.push_back(event.clone());
        drop(history);

        // No subscribers is not an error; the event is still in history.
        let _ = self.sender.send(event);
    }

    pub fn history(&self) -> Vec<LogEvent> {
        self.history.lock().unwrap().iter().cloned().collect()
    }
}
