//! The driver's national identity document number.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Error returned when a string is not a valid document number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidDni {
    /// The input was empty.
    Empty,
    /// The input contained something other than ASCII digits.
    NonDigit { input: String },
}

impl fmt::Display for InvalidDni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "document number is empty"),
            Self::NonDigit { input } => {
                write!(f, "document number '{input}' must contain only digits")
            }
        }
    }
}

impl std::error::Error for InvalidDni {}

/// A validated document number: a non-empty string of ASCII digits.
///
/// Leading zeros are significant, so the value is kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Dni(String);

impl Dni {
    /// Validates and wraps a document number.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidDni`] if the input is empty or contains anything
    /// other than `0`-`9`.
    pub fn parse(input: impl Into<String>) -> Result<Self, InvalidDni> {
        let input = input.into();
        if input.is_empty() {
            return Err(InvalidDni::Empty);
        }
        if !input.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidDni::NonDigit { input });
        }
        Ok(Self(input))
    }

    /// Returns the document number as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Dni {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Dni {
    type Err = InvalidDni;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Dni {
    type Error = InvalidDni;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Dni> for String {
    fn from(dni: Dni) -> Self {
        dni.0
    }
}

impl AsRef<str> for Dni {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
