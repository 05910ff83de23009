//! Every text the bot can answer with.

use std::fmt;

/// A reply to send back to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Welcome,
    AskDni,
    Farewell,
    ConfirmationHint,
    InvalidDni,
    AskName,
    AskPlate,
    /// Check-in completed and security notified.
    CheckedIn { name: String },
    InvalidInput,
    StoreUnavailable,
    StoreFailed,
    /// The arrival was saved but the notification did not go out.
    NotificationFailed { name: String },
    Unexpected,
}

impl Reply {
    /// Returns the text sent to the user.
    #[must_use]
    pub fn text(&self) -> String {
        match self {
            Self::Welcome => "Welcome to the arrival check-in. Do you want to register your \
                              arrival so security has you on their list? \
                              (Reply 1 for yes or 2 for no)"
                .to_string(),
            Self::AskDni => "Please enter your DNI to register your arrival.".to_string(),
            Self::Farewell => "Thank you. Send /start whenever you want to check in.".to_string(),
            Self::ConfirmationHint => "Please respond with 1 or 2.".to_string(),
            Self::InvalidDni => "Your DNI must contain digits only. Please enter it again."
                .to_string(),
            Self::AskName => "DNI not found. Please enter your name to register.".to_string(),
            Self::AskPlate => "Please enter your vehicle's plate.".to_string(),
            Self::CheckedIn { name } => {
                format!("Arrival registered for {name}. Security has been notified.")
            }
            Self::InvalidInput => "Invalid input, try again.".to_string(),
            Self::StoreUnavailable => "Error: the driver database could not be reached. \
                                       Please check with the gate and send your answer again."
                .to_string(),
            Self::StoreFailed => "Error accessing the driver database. \
                                  Please start again with /start."
                .to_string(),
            Self::NotificationFailed { name } => format!(
                "Arrival registered for {name}, but security could not be notified. \
                 Please let the guard know you are here."
            ),
            Self::Unexpected => "An unexpected error occurred. Please try again.".to_string(),
        }
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn checked_in_names_driver() {
        let reply = Reply::CheckedIn {
            name: "Juan".to_string(),
        };
        assert_eq!(
            reply.to_string(),
            "Arrival registered for Juan. Security has been notified."
        );
    }

    #[test]
    fn welcome_offers_both_options() {
        let text = Reply::Welcome.text();
        assert!(text.contains("1 for yes"));
        assert!(text.contains("2 for no"));
    }

    #[test]
    fn notification_failure_is_not_a_success_message() {
        let text = Reply::NotificationFailed {
            name: "Juan".to_string(),
        }
        .text();
        assert!(text.contains("could not be notified"));
        assert_ne!(
            text,
            Reply::CheckedIn {
                name: "Juan".to_string()
            }
            .text()
        );
    }
}
