//! The driver registry capability.

use crate::error::RegistryError;
use crate::model::{ArrivalRecord, Driver, Location, NewDriver};
use async_trait::async_trait;
use gatehouse_core::{Dni, DriverId};

/// Trait for driver and arrival storage.
///
/// Implementations own all access to durable storage. Uniqueness of the
/// document number is enforced by the store; callers are expected to have
/// checked with [`lookup`](Self::lookup) before calling
/// [`create`](Self::create).
#[async_trait]
pub trait DriverRegistry: Send + Sync {
    /// Finds the driver registered under `dni`, if any. Read-only.
    async fn lookup(&self, dni: &Dni) -> Result<Option<Driver>, RegistryError>;

    /// Registers a new driver and returns it with its assigned id.
    async fn create(&self, driver: NewDriver) -> Result<Driver, RegistryError>;

    /// Appends an arrival record for an existing driver.
    ///
    /// Fails with [`RegistryError::OperationFailed`] if `driver_id` does not
    /// reference a registered driver.
    async fn record_arrival(
        &self,
        driver_id: DriverId,
        location: Location,
    ) -> Result<ArrivalRecord, RegistryError>;
}
