//! Durable records kept by the registry.

use chrono::{DateTime, Utc};
use gatehouse_core::{ArrivalRecordId, Dni, DriverId};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A registered driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    /// Store-assigned identifier.
    pub id: DriverId,
    /// Name as entered by the driver.
    pub name: String,
    /// Document number, unique across drivers.
    pub dni: Dni,
    /// Vehicle plate.
    pub plate: String,
}

/// The data needed to register a new driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDriver {
    pub name: String,
    pub dni: Dni,
    pub plate: String,
}

impl NewDriver {
    /// Creates a new registration request.
    #[must_use]
    pub fn new(name: impl Into<String>, dni: Dni, plate: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            dni,
            plate: plate.into(),
        }
    }

    /// Attaches the store-assigned id.
    #[must_use]
    pub fn into_driver(self, id: DriverId) -> Driver {
        Driver {
            id,
            name: self.name,
            dni: self.dni,
            plate: self.plate,
        }
    }
}

/// Where an arrival was recorded.
///
/// Every check-in happens at the gate, so there is a single location today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Location {
    #[default]
    Checkpoint,
}

impl Location {
    /// Returns the value stored in the `location` column.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Checkpoint => "checkpoint",
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Location {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "checkpoint" => Ok(Self::Checkpoint),
            other => Err(format!("unknown location '{other}'")),
        }
    }
}

/// An append-only record of a driver arriving.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArrivalRecord {
    /// Store-assigned identifier.
    pub id: ArrivalRecordId,
    /// The driver who arrived.
    pub driver_id: DriverId,
    /// Where the arrival was recorded.
    pub location: Location,
    /// When the arrival was recorded.
    pub timestamp: DateTime<Utc>,
}
