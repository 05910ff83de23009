//! The arrival notice template.

use gatehouse_core::Dni;

/// Subject line of every arrival notification.
pub const SUBJECT: &str = "Driver arrival notification";

/// A notification that a driver has checked in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrivalNotice {
    pub name: String,
    pub dni: Dni,
}

impl ArrivalNotice {
    #[must_use]
    pub fn new(name: impl Into<String>, dni: Dni) -> Self {
        Self {
            name: name.into(),
            dni,
        }
    }

    #[must_use]
    pub fn subject(&self) -> &'static str {
        SUBJECT
    }

    /// Plain-text body sent to the monitoring party.
    #[must_use]
    pub fn body(&self) -> String {
        format!(
            "Driver {} with id {} has arrived and is ready to enter the premises.",
            self.name, self.dni
        )
    }
}
