//! Normalisation of inbound chat text.

/// The command that starts (or restarts) a check-in.
pub const START_COMMAND: &str = "/start";

/// An inbound message, normalised for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    /// The entry command, with or without a `@botname` suffix or payload.
    Start,
    /// Any other slash command.
    Command { name: String },
    /// Freeform text.
    Text {
        /// Trimmed text as the user typed it.
        raw: String,
        /// Trimmed and lowercased, used for matching.
        folded: String,
    },
}

impl Input {
    /// Parses raw message text.
    #[must_use]
    pub fn parse(text: &str) -> Self {
        let raw = text.trim();
        let folded = raw.to_lowercase();

        if let Some(rest) = folded.strip_prefix('/') {
            let command = rest
                .split(|c: char| c.is_whitespace() || c == '@')
                .next()
                .unwrap_or_default();
            if !command.is_empty() {
                if START_COMMAND.strip_prefix('/') == Some(command) {
                    return Self::Start;
                }
                return Self::Command {
                    name: command.to_string(),
                };
            }
        }

        Self::Text {
            raw: raw.to_string(),
            folded,
        }
    }

    /// Returns the folded text, if this is freeform text.
    #[must_use]
    pub fn folded(&self) -> Option<&str> {
        match self {
            Self::Text { folded, .. } => Some(folded),
            _ => None,
        }
    }

    /// Returns the trimmed text as typed, if this is non-empty freeform text.
    #[must_use]
    pub fn non_empty_raw(&self) -> Option<&str> {
        match self {
            Self::Text { raw, .. } if !raw.is_empty() => Some(raw),
            _ => None,
        }
    }
}
