//! Correlation tokens for matching server echoes to optimistic local messages.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque correlation token.
///
/// Carried on client-originated messages and echoed back by the relay
/// unchanged. The relay never interprets it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationToken(String);

impl CorrelationToken {
    /// Wrap an existing token value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the token as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates correlation tokens for one client session.
///
/// Tokens are `<session>-<sequence>`: a random session id fixed at creation
/// and a counter that only moves forward, so a generator never repeats itself
/// and two sessions collide only if their v4 UUIDs do.
#[derive(Debug)]
pub struct TokenGenerator {
    session: String,
    next: u64,
}

impl TokenGenerator {
    /// Create a generator with a fresh random session id.
    pub fn new() -> Self {
        Self {
            session: Uuid::new_v4().simple().to_string(),
            next: 0,
        }
    }

    /// Session part shared by every token of this generator.
    pub fn session(&self) -> &str {
        &self.session
    }

    /// Produce the next token.
    pub fn next_token(&mut self) -> CorrelationToken {
        let token = CorrelationToken(format!("{}-{}", self.session, self.next));
        self.next += 1;
        token
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}
