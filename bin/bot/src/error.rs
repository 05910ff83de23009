//! Error types for the bot binary.

use std::fmt;

/// Errors that stop the bot from starting.
#[derive(Debug)]
pub enum BotError {
    /// Configuration could not be loaded.
    Config { details: String },
    /// The SMTP notifier could not be built.
    Notifier { details: String },
    /// The Telegram client could not be built.
    Transport { details: String },
}

impl fmt::Display for BotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Config { details } => write!(f, "invalid configuration: {details}"),
            Self::Notifier { details } => write!(f, "cannot set up email notifier: {details}"),
            Self::Transport { details } => write!(f, "cannot set up telegram client: {details}"),
        }
    }
}

impl std::error::Error for BotError {}

/// Errors talking to the Telegram Bot API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelegramError {
    /// The HTTP client could not be built.
    Client { details: String },
    /// The request did not complete.
    Request {
        method: &'static str,
        details: String,
    },
    /// The API answered with `ok: false`.
    Api {
        method: &'static str,
        description: String,
    },
    /// The response body could not be decoded.
    Decode {
        method: &'static str,
        details: String,
    },
}

impl fmt::Display for TelegramError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Client { details } => write!(f, "http client error: {details}"),
            Self::Request { method, details } => write!(f, "{method} request failed: {details}"),
            Self::Api {
                method,
                description,
            } => write!(f, "{method} rejected: {description}"),
            Self::Decode { method, details } => {
                write!(f, "{method} returned an unreadable response: {details}")
            }
        }
    }
}

impl std::error::Error for TelegramError {}
