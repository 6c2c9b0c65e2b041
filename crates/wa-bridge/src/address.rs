//! Chat addresses.
//!
//! Every conversation is keyed by an opaque `user@server` string. The server part
//! tells group chats (`g.us`) apart from direct chats (`s.whatsapp.net`). A device
//! suffix (`user:3@server`) may appear on sender addresses and is dropped, since chats
//! are keyed per account rather than per device.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Server part of group chat addresses.
pub const GROUP_SERVER: &str = "g.us";

/// Server part of direct (one-to-one) chat addresses.
pub const USER_SERVER: &str = "s.whatsapp.net";

/// Older server name still seen on some direct chat addresses.
const LEGACY_USER_SERVER: &str = "c.us";

/// Errors produced when parsing a chat address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("address contains whitespace: {0:?}")]
    Whitespace(String),

    #[error("address has no server part: {0:?}")]
    MissingServer(String),

    #[error("address has no user part: {0:?}")]
    MissingUser(String),

    #[error("address has more than one '@': {0:?}")]
    MultipleSeparators(String),
}

/// Namespace a chat address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressKind {
    Group,
    Direct,
    Other,
}

/// A parsed `user@server` chat address.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatAddress {
    user: String,
    server: String,
}

impl ChatAddress {
    /// Build an address in the direct-contact namespace.
    pub fn direct(user: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            server: USER_SERVER.to_string(),
        }
    }

    /// Normalize a send recipient.
    ///
    /// Fully-qualified addresses are parsed as-is. Bare identifiers (phone numbers)
    /// are placed in the direct-contact namespace.
    pub fn normalize_recipient(recipient: &str) -> Result<Self, AddressError> {
        if recipient.contains('@') {
            return recipient.parse();
        }
        if recipient.is_empty() {
            return Err(AddressError::Empty);
        }
        if recipient.chars().any(char::is_whitespace) {
            return Err(AddressError::Whitespace(recipient.to_string()));
        }
        Ok(Self::direct(recipient))
    }

    /// The user part, without any device suffix.
    pub fn local_part(&self) -> &str {
        &self.user
    }

    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn kind(&self) -> AddressKind {
        match self.server.as_str() {
            GROUP_SERVER => AddressKind::Group,
            USER_SERVER | LEGACY_USER_SERVER => AddressKind::Direct,
            _ => AddressKind::Other,
        }
    }

    pub fn is_group(&self) -> bool {
        self.kind() == AddressKind::Group
    }
}

impl FromStr for ChatAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(AddressError::Whitespace(s.to_string()));
        }

        let mut parts = s.split('@');
        let user = parts.next().unwrap_or_default();
        let Some(server) = parts.next() else {
            return Err(AddressError::MissingServer(s.to_string()));
        };
        if parts.next().is_some() {
            return Err(AddressError::MultipleSeparators(s.to_string()));
        }
        if server.is_empty() {
            return Err(AddressError::MissingServer(s.to_string()));
        }

        let user = user.split(':').next().unwrap_or_default();
        if user.is_empty() {
            return Err(AddressError::MissingUser(s.to_string()));
        }

        Ok(Self {
            user: user.to_string(),
            server: server.to_string(),
        })
    }
}

impl fmt::Display for ChatAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.server)
    }
}
