//! Session and Turn domain types.
//!
//! A session is the unit of conversational context: an append-only history
//! of role-tagged turns plus an arbitrary key/value state map. State keys
//! follow a prefix convention:
//!
//! - `user:*` keys are long-lived preferences (e.g. `user:woreda`) that
//!   survive [`SessionState::clear_ephemeral`]
//! - unprefixed keys are turn-scoped facts (e.g. `current_issue_type`)
//!
//! The helper methods on [`SessionState`] are the documented way for tools
//! to read and write state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Prefix marking long-lived user preferences in the state map.
pub const USER_PREFIX: &str = "user:";

pub const KEY_USER_WOREDA: &str = "user:woreda";
pub const KEY_CURRENT_ISSUE_TYPE: &str = "current_issue_type";
pub const KEY_LAST_TICKET_NUMBER: &str = "last_ticket_number";
pub const KEY_LAST_TICKET_SERVICE: &str = "last_ticket_service";
pub const KEY_LAST_TICKET_CREATED: &str = "last_ticket_created";

/// The role of a turn in a session's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnRole {
    /// The end user
    User,
    /// The dispatcher model
    Model,
}

/// A single role-tagged message in a session's history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub role: TurnRole,

    /// Text content; empty when the exchange carried only tool calls
    pub content: String,

    pub timestamp: DateTime<Utc>,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::User,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self {
            role: TurnRole::Model,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Insertion-ordered key/value state attached to a session.
///
/// Iteration order is insertion order, so identical state always renders to
/// identical prompt text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionState(Map<String, Value>);

impl SessionState {
    pub fn new() -> Self {
        Self(Map::new())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Get a string value, ignoring non-string entries.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Insert or overwrite a key. Overwriting keeps the key's original position.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.0.shift_remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn keys(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    // --- Helper operations ---

    /// Remember the user's woreda as a long-lived preference.
    pub fn set_user_woreda(&mut self, woreda: &str) {
        self.set(KEY_USER_WOREDA, woreda);
    }

    pub fn user_woreda(&self) -> Option<&str> {
        self.get_str(KEY_USER_WOREDA)
    }

    /// Record which service domain the current conversation is about.
    pub fn set_current_issue_type(&mut self, issue_type: &str) {
        self.set(KEY_CURRENT_ISSUE_TYPE, issue_type);
    }

    pub fn current_issue_type(&self) -> Option<&str> {
        self.get_str(KEY_CURRENT_ISSUE_TYPE)
    }

    /// Record the most recently created ticket.
    pub fn set_last_ticket(&mut self, ticket_number: &str, service: &str, created_at: DateTime<Utc>) {
        self.set(KEY_LAST_TICKET_NUMBER, ticket_number);
        self.set(KEY_LAST_TICKET_SERVICE, service);
        self.set(KEY_LAST_TICKET_CREATED, created_at.to_rfc3339());
    }

    pub fn last_ticket(&self) -> Option<LastTicket> {
        let ticket_number = self.get_str(KEY_LAST_TICKET_NUMBER)?;
        Some(LastTicket {
            ticket_number: ticket_number.to_string(),
            service: self.get_str(KEY_LAST_TICKET_SERVICE).map(String::from),
            created_at: self.get_str(KEY_LAST_TICKET_CREATED).map(String::from),
        })
    }

    /// Store a preference under the `user:` prefix.
    pub fn set_user_preference(&mut self, key: &str, value: impl Into<Value>) {
        self.set(format!("{USER_PREFIX}{key}"), value);
    }

    pub fn user_preference(&self, key: &str) -> Option<&Value> {
        self.get(&format!("{USER_PREFIX}{key}"))
    }

    /// Drop every turn-scoped key, keeping only `user:*` preferences.
    /// Returns the number of keys removed.
    pub fn clear_ephemeral(&mut self) -> usize {
        let before = self.0.len();
        self.0.retain(|key, _| key.starts_with(USER_PREFIX));
        before - self.0.len()
    }
}

impl From<Map<String, Value>> for SessionState {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// The last ticket recorded in a session's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LastTicket {
    pub ticket_number: String,
    pub service: Option<String>,
    pub created_at: Option<String>,
}

/// A conversation session: history plus state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,

    /// Ordered turns; only ever appended to, in (user, model) pairs
    pub history: Vec<Turn>,

    pub state: SessionState,

    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            history: Vec::new(),
            state: SessionState::new(),
            created_at: Utc::now(),
        }
    }

    /// Append one completed exchange: the user's prompt and the model's reply.
    pub fn record_exchange(&mut self, prompt: impl Into<String>, reply: impl Into<String>) {
        self.history.push(Turn::user(prompt));
        self.history.push(Turn::model(reply));
    }

    /// Number of completed (user, model) exchanges.
    pub fn exchanges(&self) -> usize {
        self.history.len() / 2
    }
}
