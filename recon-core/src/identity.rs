//! Identifiers used by the dispatcher: action tags, operation ids and
//! per-dispatch correlation ids.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::error::RegistryError;

static TAG_SYNTAX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z][A-Za-z0-9_-]*(\.[A-Za-z0-9_-]+)*$").expect("static tag regex")
});

const SENTINEL_OPERATION: &str = "__unbound";

// ============================================================================
// ACTION TAG
// ============================================================================

/// Logical name of an action, matched against the slot registry.
///
/// Tags are usually dotted procedure paths such as `example.user.create`.
/// Constructing a tag through `From` does not validate it; a malformed tag
/// simply never matches a registered slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActionTag(String);

impl ActionTag {
    /// Parse a tag, rejecting anything outside the dotted-path syntax.
    pub fn parse(raw: impl Into<String>) -> Result<Self, RegistryError> {
        let raw = raw.into();
        if !Self::is_valid_syntax(&raw) {
            return Err(RegistryError::InvalidTag {
                tag: raw,
                reason: "expected a dotted path like `items.create`".to_string(),
            });
        }
        Ok(Self(raw))
    }

    /// Check a raw string against the tag syntax.
    pub fn is_valid_syntax(raw: &str) -> bool {
        TAG_SYNTAX.is_match(raw)
    }

    /// Whether this tag satisfies the tag syntax.
    pub fn is_valid(&self) -> bool {
        Self::is_valid_syntax(&self.0)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ActionTag {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for ActionTag {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ActionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// OPERATION ID
// ============================================================================

/// Identifier of a remote operation exposed by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(String);

impl OperationId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The reserved id bound to unused registry slots.
    pub fn sentinel() -> Self {
        Self(SENTINEL_OPERATION.to_string())
    }

    pub fn is_sentinel(&self) -> bool {
        self.0 == SENTINEL_OPERATION
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for OperationId {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for OperationId {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<&ActionTag> for OperationId {
    fn from(tag: &ActionTag) -> Self {
        Self::new(tag.as_str())
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// DISPATCH ID
// ============================================================================

/// Correlation id assigned to every dispatch call.
///
/// UUIDv7, so ids sort by the time the dispatch was issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DispatchId(Uuid);

impl DispatchId {
    pub fn now_v7() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for DispatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}
