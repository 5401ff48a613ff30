//! Connection identity
//!
//! A display name only identifies a user while it is registered; once the
//! holder leaves, the next client may claim it. [`UserId`] tells the two
//! apart so a late teardown of the old connection cannot evict the new one.

use uuid::Uuid;

/// Identity of one admitted connection, fresh per admission
///
/// The room stores it next to each name and ignores a removal whose id no
/// longer matches the registered entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Mint an id for a newly admitted connection
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
