//! Domain identifier types for participants and planning states.
//!
//! These types provide type-safe wrappers around the string identifiers that
//! traces, action-value tables, and result rows are keyed by.

use std::{borrow::Borrow, fmt};

use serde::{Deserialize, Serialize};

/// Identifier of the participant (or simulated agent) that produced a trace.
///
/// Group-level fits pool every trace and are reported under
/// [`ParticipantId::group`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ParticipantId(String);

impl ParticipantId {
    const GROUP: &'static str = "group";

    /// Create a new participant identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use costometer::identifiers::ParticipantId;
    ///
    /// let pid = ParticipantId::new("17");
    /// assert_eq!(pid.as_str(), "17");
    /// ```
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Pseudo-participant that owns group-level (pooled) fits.
    pub fn group() -> Self {
        Self(Self::GROUP.to_string())
    }

    /// Whether this identifier denotes the pooled group.
    pub fn is_group(&self) -> bool {
        self.0 == Self::GROUP
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the identifier into its inner String.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for ParticipantId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for ParticipantId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<u64> for ParticipantId {
    fn from(pid: u64) -> Self {
        Self::new(pid.to_string())
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

/// Identifier of a planning state, as recorded in traces and action-value tables.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct StateId(String);

impl StateId {
    /// Create a new state identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use costometer::identifiers::StateId;
    ///
    /// let state = StateId::new("clicked=1,3");
    /// assert_eq!(state.as_str(), "clicked=1,3");
    /// ```
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Get the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Convert the identifier into its inner String.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for StateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PartialEq<&str> for StateId {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == *other
    }
}

impl Borrow<str> for StateId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<String> for StateId {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for StateId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl AsRef<str> for StateId {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}
