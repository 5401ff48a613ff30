//! Error types for the chat core
//!
//! Defines name admission errors, connection errors and actor mailbox errors.
//! Uses thiserror for ergonomic error definitions.

use std::fmt;
use std::io;

use thiserror::Error;

use crate::connection::Connection;
use crate::receiver::MAX_NAME_LEN;

/// Reasons a candidate name is refused
///
/// The Display text is sent verbatim to the rejected client.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Empty name line
    #[error("Username can't be empty")]
    EmptyName,

    /// Name longer than the allowed number of bytes
    #[error("Username can't be longer than {max} characters", max = MAX_NAME_LEN)]
    NameTooLong,

    /// Name contains something other than letters and digits
    #[error("Username can contain only letters and digits")]
    InvalidCharacter,

    /// Another connected user already holds this name
    #[error("Name {0} is already taken")]
    NameTaken(String),

    /// The room stopped before it could answer
    #[error("Chat is shutting down")]
    Unavailable,
}

/// Read or write failure on a client connection (fatal for that client)
#[derive(Debug, Error)]
#[error("user [{}] ({addr}) error: {cause}", .name.as_deref().unwrap_or(""))]
pub struct ConnError {
    /// Peer address of the connection
    pub addr: String,
    /// Display name, once one has been accepted
    pub name: Option<String>,
    /// Underlying I/O failure
    #[source]
    pub cause: io::Error,
}

impl ConnError {
    /// Create a connection error
    pub fn new(addr: impl Into<String>, name: Option<&str>, cause: io::Error) -> Self {
        Self {
            addr: addr.into(),
            name: name.map(str::to_string),
            cause,
        }
    }

    /// Clean end-of-stream reported by the peer
    pub fn closed(addr: impl Into<String>, name: Option<&str>) -> Self {
        Self::new(
            addr,
            name,
            io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed by peer"),
        )
    }
}

/// Actor mailbox errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ActorError {
    /// The actor has been stopped and no longer accepts work
    #[error("Actor stopped")]
    Stopped,

    /// The actor stopped before answering a call
    #[error("Actor dropped the reply")]
    NoReply,
}

/// A refused admission
///
/// Hands the connection back so the caller can report the reason and close
/// it. The connection is gone if the room stopped while holding it.
pub struct Rejected {
    /// Why the name was refused
    pub error: ChatError,
    /// The connection that asked to join
    pub connection: Option<Connection>,
}

impl Rejected {
    /// Refuse an admission and return the connection
    pub fn new(error: ChatError, connection: Connection) -> Self {
        Self {
            error,
            connection: Some(connection),
        }
    }

    /// Refuse an admission whose connection was lost
    pub fn lost(error: ChatError) -> Self {
        Self {
            error,
            connection: None,
        }
    }
}

impl fmt::Debug for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rejected")
            .field("error", &self.error)
            .field("connection", &self.connection.as_ref().map(Connection::peer))
            .finish()
    }
}
