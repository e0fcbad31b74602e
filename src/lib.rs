//! # WiFi Event Bridge
//!
//! Delivers network-adapter lifecycle events (link up/down, address
//! acquired, peer joined/left) from the network stack's event-loop task into
//! callbacks living in a single-threaded script runtime:
//! - Role contexts for the station and access-point roles
//! - One dispatcher registered with the stack, routing to the active context
//! - Callback invocation with the owner task suspended and allocations
//!   scoped to an arena
//! - A shared readiness signal for "network usable"
//!
//! ## Architecture
//!
//! ```text
//!                    ┌──────────────────────────────────────┐
//!   stack events  →  │             Dispatcher               │
//!   (event loop)     │  reaction ─► registry ─► invoker     │
//!                    │     │                      │         │
//!                    │  readiness            suspend owner  │
//!                    │   signal              arena scope    │
//!                    └──────────────────────────┬───────────┘
//!                                               ▼
//!                                      script runtime closure
//! ```

// Enforce strict safety at compile time
#![deny(unsafe_code)]
#![warn(missing_debug_implementations)]
#![warn(rust_2018_idioms)]

pub mod bridge;
pub mod events;
pub mod roles;
pub mod runtime;
pub mod stack;
pub mod tasks;
pub mod types;

// Internal utilities
pub mod observability;

pub use bridge::WifiBridge;
pub use events::WifiEvent;
pub use roles::{AccessPoint, Station};
pub use types::{Config, Error, Result};
