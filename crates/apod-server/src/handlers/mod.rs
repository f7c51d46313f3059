//! HTTP handlers

pub mod health;
pub mod records;

pub use health::{fallback, health};
