//! Core domain types and utilities for the gatehouse check-in bot.
//!
//! This crate provides the identifiers, the validated driver document
//! number, and the `Result` alias shared by every other gatehouse crate.

pub mod dni;
pub mod error;
pub mod id;

pub use dni::{Dni, InvalidDni};
pub use error::Result;
pub use id::{ArrivalRecordId, ChatUserId, DriverId, ParseIdError};
