//! Script-facing role objects.
//!
//! Constructing a role object creates and registers its context; dropping it
//! is the finalizer that unregisters it. Only one role is routed at a time:
//! constructing a second displaces the first.

mod access_point;
mod station;

pub use access_point::AccessPoint;
pub use station::Station;
