//! Task control: who owns the script runtime right now.
//!
//! On an RTOS the bridge suspends the owner task outright. On a hosted OS
//! threads cannot be preempted from outside, so [`CooperativeScheduler`]
//! turns suspend/resume into an explicit handoff lock: the owner task wraps
//! its runtime work in [`CooperativeScheduler::enter`], and `suspend` waits
//! until the owner is outside such a section and keeps it out until `resume`.
//! Context teardown opens the same section through
//! [`TaskControl::enter_section`], so it never overlaps a running callback.

use std::cell::Cell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::types::TaskId;

/// Suspend/resume primitives of the host scheduler.
#[cfg_attr(test, mockall::automock)]
pub trait TaskControl: Send + Sync {
    /// Identifier of the calling task.
    fn current_task(&self) -> TaskId;

    /// Stop `task` from running runtime code until the matching `resume`.
    fn suspend(&self, task: TaskId);

    fn resume(&self, task: TaskId);

    /// Run code on behalf of `task` until the matching `exit_section`.
    ///
    /// Waits while `task` is suspended by another thread. The default does
    /// nothing: a scheduler whose `suspend` halts the task outright already
    /// keeps its work apart from callbacks.
    fn enter_section(&self, _task: TaskId) {}

    fn exit_section(&self, _task: TaskId) {}
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_TASK_ID: Cell<Option<TaskId>> = const { Cell::new(None) };
}

/// Stable per-thread task id.
pub fn thread_task_id() -> TaskId {
    THREAD_TASK_ID.with(|cell| match cell.get() {
        Some(id) => id,
        None => {
            let id = TaskId::new(NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed));
            cell.set(Some(id));
            id
        }
    })
}

#[derive(Debug, Default)]
struct HandoffState {
    /// Outstanding suspends per task.
    suspended: HashMap<TaskId, usize>,
    /// Thread holding each outstanding suspension.
    suspended_by: HashMap<TaskId, TaskId>,
    /// Open `enter` sections per task.
    active: HashMap<TaskId, usize>,
    suspends: u64,
    resumes: u64,
}

impl HandoffState {
    fn is_suspended(&self, task: TaskId) -> bool {
        self.suspended.get(&task).copied().unwrap_or(0) > 0
    }

    fn is_active(&self, task: TaskId) -> bool {
        self.active.get(&task).copied().unwrap_or(0) > 0
    }

    /// Whether `caller` must wait before opening a section for `task`.
    ///
    /// A nested section and the suspending thread itself pass through;
    /// either one waiting would deadlock against the suspender.
    fn must_wait(&self, task: TaskId, caller: TaskId) -> bool {
        self.is_suspended(task)
            && !self.is_active(task)
            && self.suspended_by.get(&task) != Some(&caller)
    }
}

/// Counters for suspend/resume traffic.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerStats {
    pub suspends: u64,
    pub resumes: u64,
}

/// Hosted `TaskControl` built on a mutex and condition variable.
#[derive(Debug, Default)]
pub struct CooperativeScheduler {
    state: Mutex<HandoffState>,
    changed: Condvar,
}

impl CooperativeScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a runtime section for the calling task.
    ///
    /// Blocks while the task is suspended. Sections nest: an inner section
    /// opens at once even with a suspend pending.
    pub fn enter(&self) -> RuntimeAccess<'_> {
        let task = thread_task_id();
        self.open_section(task);
        RuntimeAccess {
            scheduler: self,
            task,
        }
    }

    /// Run `f` inside a runtime section.
    pub fn run<T>(&self, f: impl FnOnce() -> T) -> T {
        let _access = self.enter();
        f()
    }

    pub fn is_suspended(&self, task: TaskId) -> bool {
        self.lock().is_suspended(task)
    }

    pub fn stats(&self) -> SchedulerStats {
        let state = self.lock();
        SchedulerStats {
            suspends: state.suspends,
            resumes: state.resumes,
        }
    }

    fn lock(&self) -> MutexGuard<'_, HandoffState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open_section(&self, task: TaskId) {
        let caller = thread_task_id();
        let mut state = self.lock();
        while state.must_wait(task, caller) {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        *state.active.entry(task).or_insert(0) += 1;
    }

    fn close_section(&self, task: TaskId) {
        let mut state = self.lock();
        if let Some(depth) = state.active.get_mut(&task) {
            *depth -= 1;
            if *depth == 0 {
                state.active.remove(&task);
            }
        }
        drop(state);
        self.changed.notify_all();
    }
}

impl TaskControl for CooperativeScheduler {
    fn current_task(&self) -> TaskId {
        thread_task_id()
    }

    fn suspend(&self, task: TaskId) {
        let caller = thread_task_id();
        let mut state = self.lock();
        *state.suspended.entry(task).or_insert(0) += 1;
        state.suspended_by.insert(task, caller);
        state.suspends += 1;
        // A task suspending itself cannot be racing itself.
        if task == caller {
            return;
        }
        while state.is_active(task) {
            state = self
                .changed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    fn resume(&self, task: TaskId) {
        let mut state = self.lock();
        match state.suspended.get_mut(&task) {
            Some(depth) if *depth > 1 => *depth -= 1,
            Some(_) => {
                state.suspended.remove(&task);
                state.suspended_by.remove(&task);
            }
            None => {
                tracing::warn!(task = %task, "resume_without_suspend");
                return;
            }
        }
        state.resumes += 1;
        drop(state);
        self.changed.notify_all();
    }

    fn enter_section(&self, task: TaskId) {
        self.open_section(task);
    }

    fn exit_section(&self, task: TaskId) {
        self.close_section(task);
    }
}

/// An open runtime section; closing it lets a pending `suspend` proceed.
#[derive(Debug)]
pub struct RuntimeAccess<'a> {
    scheduler: &'a CooperativeScheduler,
    task: TaskId,
}

impl Drop for RuntimeAccess<'_> {
    fn drop(&mut self) {
        self.scheduler.close_section(self.task);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicBool;
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    #[test]
    fn test_thread_ids_are_stable_and_distinct() {
        let here = thread_task_id();
        assert_eq!(here, thread_task_id());
        let there = std::thread::spawn(thread_task_id).join().unwrap();
        assert_ne!(here, there);
    }

    #[test]
    fn test_self_suspend_does_not_block() {
        let scheduler = CooperativeScheduler::new();
        let me = scheduler.current_task();
        let _access = scheduler.enter();
        scheduler.suspend(me);
        assert!(scheduler.is_suspended(me));
        scheduler.resume(me);
        assert!(!scheduler.is_suspended(me));
        assert_eq!(scheduler.stats(), SchedulerStats { suspends: 1, resumes: 1 });
    }

    #[test]
    fn test_resume_without_suspend_is_ignored() {
        let scheduler = CooperativeScheduler::new();
        scheduler.resume(TaskId::new(999));
        assert_eq!(scheduler.stats().resumes, 0);
    }

    #[test]
    fn test_suspend_waits_for_owner_section_to_close() {
        let scheduler = Arc::new(CooperativeScheduler::new());
        let (owner_tx, owner_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let owner = std::thread::spawn({
            let scheduler = scheduler.clone();
            move || {
                let access = scheduler.enter();
                owner_tx.send(thread_task_id()).unwrap();
                release_rx.recv().unwrap();
                drop(access);
            }
        });

        let owner_id = owner_rx.recv().unwrap();
        let suspended = Arc::new(AtomicBool::new(false));
        let suspender = std::thread::spawn({
            let scheduler = scheduler.clone();
            let suspended = suspended.clone();
            move || {
                scheduler.suspend(owner_id);
                suspended.store(true, Ordering::SeqCst);
            }
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!suspended.load(Ordering::SeqCst), "suspend returned while owner was active");

        release_tx.send(()).unwrap();
        suspender.join().unwrap();
        owner.join().unwrap();
        assert!(suspended.load(Ordering::SeqCst));
        scheduler.resume(owner_id);
    }

    #[test]
    fn test_suspended_owner_blocks_on_enter_until_resume() {
        let scheduler = Arc::new(CooperativeScheduler::new());
        let (id_tx, id_rx) = mpsc::channel();
        let (go_tx, go_rx) = mpsc::channel::<()>();
        let entered = Arc::new(AtomicBool::new(false));

        let owner = std::thread::spawn({
            let scheduler = scheduler.clone();
            let entered = entered.clone();
            move || {
                id_tx.send(thread_task_id()).unwrap();
                go_rx.recv().unwrap();
                scheduler.run(|| entered.store(true, Ordering::SeqCst));
            }
        });

        let owner_id = id_rx.recv().unwrap();
        scheduler.suspend(owner_id);
        go_tx.send(()).unwrap();

        std::thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst), "owner ran while suspended");

        scheduler.resume(owner_id);
        owner.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_nested_section_opens_while_suspend_pending() {
        let scheduler = Arc::new(CooperativeScheduler::new());
        let (id_tx, id_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();

        let owner = std::thread::spawn({
            let scheduler = scheduler.clone();
            move || {
                scheduler.run(|| {
                    let me = thread_task_id();
                    id_tx.send(me).unwrap();
                    while !scheduler.is_suspended(me) {
                        std::thread::sleep(Duration::from_millis(1));
                    }
                    scheduler.run(|| {});
                });
                done_tx.send(()).unwrap();
            }
        });

        let owner_id = id_rx.recv().unwrap();
        let suspender = std::thread::spawn({
            let scheduler = scheduler.clone();
            move || {
                scheduler.suspend(owner_id);
                scheduler.resume(owner_id);
            }
        });

        done_rx
            .recv_timeout(Duration::from_secs(5))
            .expect("nested section blocked on a pending suspend");
        suspender.join().unwrap();
        owner.join().unwrap();
        assert_eq!(scheduler.stats(), SchedulerStats { suspends: 1, resumes: 1 });
    }

    #[test]
    fn test_suspending_thread_may_open_owner_section() {
        let scheduler = CooperativeScheduler::new();
        let owner = TaskId::new(4242);

        scheduler.suspend(owner);
        scheduler.enter_section(owner);
        scheduler.exit_section(owner);
        scheduler.resume(owner);

        assert!(!scheduler.is_suspended(owner));
    }

    #[test]
    fn test_foreign_section_waits_for_resume() {
        let scheduler = Arc::new(CooperativeScheduler::new());
        let owner = TaskId::new(9001);
        scheduler.suspend(owner);

        let entered = Arc::new(AtomicBool::new(false));
        let other = std::thread::spawn({
            let scheduler = scheduler.clone();
            let entered = entered.clone();
            move || {
                scheduler.enter_section(owner);
                entered.store(true, Ordering::SeqCst);
                scheduler.exit_section(owner);
            }
        });

        std::thread::sleep(Duration::from_millis(50));
        assert!(!entered.load(Ordering::SeqCst), "section opened while suspended");

        scheduler.resume(owner);
        other.join().unwrap();
        assert!(entered.load(Ordering::SeqCst));
    }
}
