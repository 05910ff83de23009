//! Check-in conversation engine for gatehouse.
//!
//! This crate provides:
//!
//! - **Input**: normalisation of inbound chat text
//! - **Session Store**: one ephemeral check-in session per chat user
//! - **Replies**: every text the bot can answer with
//! - **Engine**: the state machine driving a check-in, one message at a time

pub mod engine;
pub mod error;
pub mod input;
pub mod reply;
pub mod session;

pub use engine::{ConversationEngine, SessionUpdate, Turn};
pub use error::{CheckInError, ErrorKind};
pub use input::Input;
pub use reply::Reply;
pub use session::{ConversationState, InMemorySessionStore, Session, SessionStore};
