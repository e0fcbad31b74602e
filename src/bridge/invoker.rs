//! Callback invocation under exclusive runtime access.
//!
//! Sequence per event: suspend owner task, open arena scope, call the
//! closure if the slot is set, close arena scope, resume owner task. Both
//! brackets are guards, so they unwind on error returns and panics alike.

use super::context::{ContextCore, Slot};
use crate::events::Payload;
use crate::runtime::{ArenaIndex, ScriptRuntime};
use crate::tasks::TaskControl;
use crate::types::TaskId;

/// What the invoker did with one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// The closure ran and returned normally.
    Called,
    /// No closure in the slot.
    SlotUnset,
    /// Context destroyed between lookup and invocation; runtime untouched.
    Retired,
}

/// Holds the owner task suspended until dropped.
pub(crate) struct SuspendGuard<'a> {
    tasks: &'a dyn TaskControl,
    task: TaskId,
}

impl<'a> SuspendGuard<'a> {
    pub(crate) fn acquire(tasks: &'a dyn TaskControl, task: TaskId) -> Self {
        tasks.suspend(task);
        Self { tasks, task }
    }
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        self.tasks.resume(self.task);
    }
}

/// Holds `task`'s runtime section open on behalf of the owner.
///
/// Excludes the invoker: a callback already running finishes before this
/// is acquired, and one that starts later waits until it is dropped.
pub(crate) struct OwnerSection<'a> {
    tasks: &'a dyn TaskControl,
    task: TaskId,
}

impl<'a> OwnerSection<'a> {
    pub(crate) fn enter(tasks: &'a dyn TaskControl, task: TaskId) -> Self {
        tasks.enter_section(task);
        Self { tasks, task }
    }
}

impl Drop for OwnerSection<'_> {
    fn drop(&mut self) {
        self.tasks.exit_section(self.task);
    }
}

/// Restores the runtime arena to its entry position when dropped.
pub(crate) struct ArenaScope<'a, R: ScriptRuntime> {
    runtime: &'a R,
    index: ArenaIndex,
}

impl<'a, R: ScriptRuntime> ArenaScope<'a, R> {
    pub(crate) fn open(runtime: &'a R) -> Self {
        Self {
            index: runtime.arena_save(),
            runtime,
        }
    }
}

impl<R: ScriptRuntime> Drop for ArenaScope<'_, R> {
    fn drop(&mut self) {
        self.runtime.arena_restore(self.index);
    }
}

/// Run the closure in `slot` with `payload` as its only argument (or none).
///
/// A user error is returned as-is after the owner task has been resumed.
pub fn invoke<R: ScriptRuntime>(
    core: &ContextCore<R>,
    slot: &Slot<R::Closure>,
    payload: Payload,
) -> Result<Invocation, R::Error> {
    let _suspended = SuspendGuard::acquire(core.tasks().as_ref(), core.owner_task());

    // Contexts are retired only inside an owner section, which cannot open
    // while the owner is suspended.
    if core.is_retired() {
        tracing::debug!(slot = %slot.id(), "callback_skipped_retired_context");
        return Ok(Invocation::Retired);
    }

    let runtime = core.runtime().as_ref();
    let _scope = ArenaScope::open(runtime);

    let Some(closure) = slot.get() else {
        tracing::trace!(slot = %slot.id(), "callback_slot_unset");
        return Ok(Invocation::SlotUnset);
    };

    let args: Vec<R::Value> = payload
        .render()
        .map(|arg| runtime.new_string(&arg))
        .into_iter()
        .collect();

    tracing::debug!(slot = %slot.id(), argc = args.len(), "callback_invoking");
    runtime.call(&closure, &args)?;
    Ok(Invocation::Called)
}
