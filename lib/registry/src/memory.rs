//! In-memory driver registry.
//!
//! Enforces the same constraints as the SQLite store (unique document
//! number, arrivals must reference a known driver) and can be switched into
//! failure modes so callers can exercise their error paths.

use crate::error::RegistryError;
use crate::model::{ArrivalRecord, Driver, Location, NewDriver};
use crate::registry::DriverRegistry;
use async_trait::async_trait;
use chrono::Utc;
use gatehouse_core::{ArrivalRecordId, Dni, DriverId};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
struct State {
    drivers: Vec<Driver>,
    arrivals: Vec<ArrivalRecord>,
    unavailable: bool,
    failing_arrivals: bool,
}

/// A registry that keeps everything in process memory.
#[derive(Debug, Default)]
pub struct InMemoryDriverRegistry {
    state: Mutex<State>,
}

impl InMemoryDriverRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry pre-populated with drivers, ids assigned in order.
    #[must_use]
    pub fn with_drivers(drivers: impl IntoIterator<Item = NewDriver>) -> Self {
        let registry = Self::new();
        {
            let mut state = registry.state();
            for driver in drivers {
                let id = DriverId::new(state.drivers.len() as i64 + 1);
                state.drivers.push(driver.into_driver(id));
            }
        }
        registry
    }

    /// Makes every subsequent operation fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.state().unavailable = unavailable;
    }

    /// Makes every subsequent `record_arrival` fail with an operation error.
    pub fn set_failing_arrivals(&self, failing: bool) {
        self.state().failing_arrivals = failing;
    }

    /// Returns a snapshot of all registered drivers.
    #[must_use]
    pub fn drivers(&self) -> Vec<Driver> {
        self.state().drivers.clone()
    }

    /// Returns a snapshot of all arrival records.
    #[must_use]
    pub fn arrivals(&self) -> Vec<ArrivalRecord> {
        self.state().arrivals.clone()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_available(state: &State) -> Result<(), RegistryError> {
        if state.unavailable {
            return Err(RegistryError::StoreUnavailable {
                reason: "in-memory store marked unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl DriverRegistry for InMemoryDriverRegistry {
    async fn lookup(&self, dni: &Dni) -> Result<Option<Driver>, RegistryError> {
        let state = self.state();
        Self::check_available(&state)?;
        Ok(state.drivers.iter().find(|d| &d.dni == dni).cloned())
    }

    async fn create(&self, driver: NewDriver) -> Result<Driver, RegistryError> {
        let mut state = self.state();
        Self::check_available(&state)?;
        if state.drivers.iter().any(|d| d.dni == driver.dni) {
            return Err(RegistryError::OperationFailed {
                operation: "create",
                reason: format!("driver with dni {} already exists", driver.dni),
            });
        }
        let id = DriverId::new(state.drivers.len() as i64 + 1);
        let driver = driver.into_driver(id);
        state.drivers.push(driver.clone());
        Ok(driver)
    }

    async fn record_arrival(
        &self,
        driver_id: DriverId,
        location: Location,
    ) -> Result<ArrivalRecord, RegistryError> {
        let mut state = self.state();
        Self::check_available(&state)?;
        if state.failing_arrivals {
            return Err(RegistryError::OperationFailed {
                operation: "record arrival",
                reason: "in-memory store rejecting arrivals".to_string(),
            });
        }
        if !state.drivers.iter().any(|d| d.id == driver_id) {
            return Err(RegistryError::OperationFailed {
                operation: "record arrival",
                reason: format!("no driver with id {driver_id}"),
            });
        }
        let record = ArrivalRecord {
            id: ArrivalRecordId::new(state.arrivals.len() as i64 + 1),
            driver_id,
            location,
            timestamp: Utc::now(),
        };
        state.arrivals.push(record.clone());
        Ok(record)
    }
}
