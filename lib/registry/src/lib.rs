//! Driver registry for gatehouse.
//!
//! This crate provides:
//!
//! - **Model**: drivers, arrival records and the check-in location
//! - **Registry**: the `DriverRegistry` capability used by the conversation engine
//! - **SQLite store**: the production registry backed by a SQLite file
//! - **In-memory store**: a registry for tests and local experiments

pub mod error;
pub mod memory;
pub mod model;
pub mod registry;
pub mod sqlite;

pub use error::RegistryError;
pub use memory::InMemoryDriverRegistry;
pub use model::{ArrivalRecord, Driver, Location, NewDriver};
pub use registry::DriverRegistry;
pub use sqlite::{SqliteDriverRegistry, StoreConfig};
