//! Check-in session management.
//!
//! A session records which answer the bot is waiting for and what the user
//! has told it so far. Sessions live only in memory; a restart drops them
//! and users begin again with `/start`.

use gatehouse_core::{ChatUserId, Dni};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Which answer the conversation is waiting for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConversationState {
    /// No check-in in progress.
    #[default]
    Idle,
    /// Waiting for "1" (check in) or "2" (cancel).
    AwaitingConfirmation,
    /// Waiting for the driver's document number.
    AwaitingDni,
    /// Waiting for a new driver's name.
    AwaitingName,
    /// Waiting for a new driver's vehicle plate.
    AwaitingPlate,
}

impl ConversationState {
    /// Returns a stable name for logging.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::AwaitingConfirmation => "awaiting_confirmation",
            Self::AwaitingDni => "awaiting_dni",
            Self::AwaitingName => "awaiting_name",
            Self::AwaitingPlate => "awaiting_plate",
        }
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A check-in session.
///
/// Sessions are values: each turn produces a new session rather than
/// editing the stored one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub state: ConversationState,
    pub dni: Option<Dni>,
    pub name: Option<String>,
    pub plate: Option<String>,
}

impl Session {
    /// Creates an idle session with nothing collected.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fresh session waiting for confirmation.
    #[must_use]
    pub fn started() -> Self {
        Self {
            state: ConversationState::AwaitingConfirmation,
            ..Self::default()
        }
    }

    /// Returns this session moved to `state`.
    #[must_use]
    pub fn awaiting(self, state: ConversationState) -> Self {
        Self { state, ..self }
    }

    /// Returns this session with the document number recorded.
    #[must_use]
    pub fn with_dni(self, dni: Dni) -> Self {
        Self {
            dni: Some(dni),
            ..self
        }
    }

    /// Returns this session with the driver's name recorded.
    #[must_use]
    pub fn with_name(self, name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..self
        }
    }

    /// Returns this session with the vehicle plate recorded.
    #[must_use]
    pub fn with_plate(self, plate: impl Into<String>) -> Self {
        Self {
            plate: Some(plate.into()),
            ..self
        }
    }

    /// Returns true if no check-in is in progress.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.state == ConversationState::Idle
    }
}

/// Trait for per-user session storage.
///
/// Implementations must be safe to use from many tasks at once; each user
/// maps to at most one session.
pub trait SessionStore: Send + Sync {
    /// Returns the user's session, or a fresh idle one if none is stored.
    ///
    /// Idle sessions are not stored; only `save` adds entries.
    fn get_or_create(&self, user: ChatUserId) -> Session;

    /// Replaces the user's session.
    fn save(&self, user: ChatUserId, session: Session);

    /// Drops the user's session.
    fn clear(&self, user: ChatUserId);

    /// Returns the number of users with a stored session.
    fn active_sessions(&self) -> usize;
}

/// Session storage in process memory.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    sessions: RwLock<HashMap<ChatUserId, Session>>,
}

impl InMemorySessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the user's session without creating one.
    #[must_use]
    pub fn get(&self, user: ChatUserId) -> Option<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&user)
            .cloned()
    }
}

impl SessionStore for InMemorySessionStore {
    fn get_or_create(&self, user: ChatUserId) -> Session {
        self.get(user).unwrap_or_default()
    }

    fn save(&self, user: ChatUserId, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(user, session);
    }

    fn clear(&self, user: ChatUserId) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&user);
    }

    fn active_sessions(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
