//! Script runtime collaborator interface.
//!
//! The runtime is single-threaded and not reentrant: the bridge only touches
//! it while the owner task is suspended. Everything the bridge needs is a
//! way to build a string value, call a closure, bracket allocations in an
//! arena scope, and hand user errors back to the runtime's own reporting.

pub mod native;

pub use native::{NativeClosure, NativeRuntime, RuntimeStats};

use std::fmt;

/// Arena position captured by `ScriptRuntime::arena_save`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ArenaIndex(pub usize);

/// The managed scripting environment callbacks live in.
pub trait ScriptRuntime: Send + Sync + 'static {
    /// A managed closure held in a callback slot.
    type Closure: Clone + Send + Sync + 'static;

    /// A managed value passed as a callback argument.
    type Value;

    /// Error raised by user code.
    type Error: fmt::Display + Send + 'static;

    /// Mark the current arena position. Values allocated after this point
    /// become collectable once the position is restored.
    fn arena_save(&self) -> ArenaIndex;

    fn arena_restore(&self, index: ArenaIndex);

    /// Allocate a runtime string.
    fn new_string(&self, s: &str) -> Self::Value;

    /// Call `closure` with `args` (zero or one element).
    fn call(&self, closure: &Self::Closure, args: &[Self::Value]) -> Result<(), Self::Error>;

    /// Hand an uncaught user error to the runtime's error reporting.
    fn report_error(&self, error: Self::Error);
}
