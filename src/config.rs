//! Chat core configuration

use std::time::Duration;

use crate::actor::MAILBOX_CAPACITY;

/// Tunables shared by the room, the receiver and every user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatConfig {
    /// Capacity of every actor mailbox
    pub mailbox_capacity: usize,
    /// How long a new connection may take to send its name (`None` waits forever)
    pub handshake_timeout: Option<Duration>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            mailbox_capacity: MAILBOX_CAPACITY,
            handshake_timeout: None,
        }
    }
}

impl ChatConfig {
    /// Set the mailbox capacity (clamped to at least 1)
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity.max(1);
        self
    }

    /// Set the handshake deadline
    pub fn with_handshake_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.handshake_timeout = timeout;
        self
    }
}
