//! Chat message definitions
//!
//! A message is either a chat line from a named user or a system notice
//! (empty `from`). Display renders the exact wire text, without the newline.

use std::fmt;

/// A line to deliver to room members
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Author name, empty for system notices
    pub from: String,
    /// Message body
    pub text: String,
}

impl Message {
    /// Chat line typed by a user
    pub fn chat(from: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            text: text.into(),
        }
    }

    /// System notice, delivered to everyone
    pub fn notice(text: impl Into<String>) -> Self {
        Self {
            from: String::new(),
            text: text.into(),
        }
    }

    /// `<name> joined`
    pub fn joined(name: &str) -> Self {
        Self::notice(format!("{} joined", name))
    }

    /// `<name> left`
    pub fn left(name: &str) -> Self {
        Self::notice(format!("{} left", name))
    }

    /// Roster listing the given member names
    pub fn roster<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let names: Vec<&str> = names.into_iter().collect();
        Self::notice(format!("Users in chat: {}", names.join(" ")))
    }

    /// True for system notices
    pub fn is_notice(&self) -> bool {
        self.from.is_empty()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_notice() {
            write!(f, "* {}", self.text)
        } else {
            write!(f, "[{}] {}", self.from, self.text)
        }
    }
}
