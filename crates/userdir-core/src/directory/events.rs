use tokio::sync::broadcast;
use tracing::trace;

use crate::models::{User, UserId, ValidationError};

/// Buffer size for the change event channel.
/// Subscribers that fall further behind than this see `Lagged` and skip ahead.
pub const EVENT_BUFFER_SIZE: usize = 64;

/// Text shown when the initial user fetch fails
pub const LOAD_FAILED_MESSAGE: &str = "Error fetching users!!";

/// A blocking, user-visible message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    /// The remote list fetch failed
    LoadFailed,
    /// Add-user input was rejected
    Validation(ValidationError),
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::LoadFailed => LOAD_FAILED_MESSAGE.to_string(),
            Notice::Validation(e) => e.to_string(),
        }
    }
}

/// Changes published by `UserDirectory`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectoryEvent {
    /// Loading settled with `count` users
    Loaded { count: usize, from_cache: bool },
    UserAdded(User),
    UserRemoved(UserId),
    Notice(Notice),
}

/// Broadcast channel for directory changes.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<DirectoryEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DirectoryEvent> {
        self.tx.subscribe()
    }

    /// Publish to current subscribers. Having none is fine.
    pub fn publish(&self, event: DirectoryEvent) {
        if self.tx.send(event).is_err() {
            trace!("No directory event subscribers");
        }
    }
}
