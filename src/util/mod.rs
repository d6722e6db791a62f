//! Shared error types.

pub mod error;

pub use error::{ContractViolation, FrontError, FrontResult, SerializationError};
