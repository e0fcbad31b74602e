//! Core types for the WiFi event bridge.
//!
//! This module provides foundational types used throughout the system:
//! - **IDs**: Strongly-typed identifiers (TaskId, MacAddress)
//! - **Errors**: Application error types with thiserror derives
//! - **Config**: Configuration structures for observability, readiness, and radios

mod config;
mod errors;
mod ids;

pub use config::{Config, ObservabilityConfig, ReadinessConfig};
pub use errors::{Error, Result};
pub use ids::{MacAddress, TaskId};
