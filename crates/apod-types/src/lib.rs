//! APOD Types - Pure type definitions shared by the server and its tests
//!
//! This crate contains only data types with no async runtime dependencies.

pub mod record;
pub mod response;

pub use record::*;
pub use response::*;
