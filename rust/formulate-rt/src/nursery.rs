//! Thread-per-task structured concurrency for one execution group's async
//! steps (spec §5): each async step gets its own OS thread; the driver
//! waits for every task in the group (or a deadline) before advancing to
//! the next group.
//!
//! The shape is the teacher's nursery/scope pattern: spawn, poll handles in
//! spawn order, and on a deadline stop waiting rather than block forever.
//! Unlike the teacher's nursery this one never cancels siblings on a single
//! failure — a step's own `Error` value is not a Rust-level failure here,
//! it is just the `Value` that thread produced (spec §4.7 error isolation
//! is a skip-list concern, not a concurrency-scope concern).

use formulate_core::{ErrorKind, Value, ValueError};
use std::thread::{self, JoinHandle};
use std::time::Instant;

/// A structured concurrency scope for the async steps of a single execution
/// group.
#[derive(Default)]
pub struct Nursery {
    handles: Vec<JoinHandle<Value>>,
}

impl Nursery {
    pub fn new() -> Self {
        Self { handles: Vec::new() }
    }

    /// Spawns one async step's evaluation onto its own thread.
    pub fn spawn<F>(&mut self, f: F)
    where
        F: FnOnce() -> Value + Send + 'static,
    {
        let handle = thread::Builder::new()
            .name("formulate-async-step".to_string())
            .spawn(f)
            .expect("failed to spawn async step thread");
        self.handles.push(handle);
    }

    /// Waits for every spawned task, in spawn order. If `deadline` elapses
    /// before all tasks finish, returns `None` and leaves the unfinished
    /// handles detached — best-effort per spec §5, the call does not block
    /// further on them.
    pub fn join_all(self, deadline: Option<Instant>) -> Option<Vec<Value>> {
        let n = self.handles.len();
        if n == 0 {
            return Some(Vec::new());
        }

        let mut handles: Vec<Option<JoinHandle<Value>>> =
            self.handles.into_iter().map(Some).collect();
        let mut slots: Vec<Option<Value>> = (0..n).map(|_| None).collect();
        let mut remaining = n;

        loop {
            if remaining == 0 {
                return Some(slots.into_iter().map(|s| s.expect("slot filled")).collect());
            }
            if let Some(dl) = deadline {
                if Instant::now() >= dl {
                    return None;
                }
            }

            let mut made_progress = false;
            #[allow(clippy::needless_range_loop)]
            for i in 0..n {
                let finished = matches!(&handles[i], Some(h) if h.is_finished());
                if !finished {
                    continue;
                }
                let handle = handles[i].take().expect("checked Some above");
                let value = handle.join().unwrap_or_else(|_| {
                    Value::Error(ValueError::new(ErrorKind::Internal, "async step panicked"))
                });
                slots[i] = Some(value);
                remaining -= 1;
                made_progress = true;
            }
            if !made_progress {
                thread::yield_now();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joins_all_tasks_in_spawn_order() {
        let mut nursery = Nursery::new();
        nursery.spawn(|| Value::Number(1.into()));
        nursery.spawn(|| Value::Number(2.into()));
        let results = nursery.join_all(None).unwrap();
        assert!(matches!(results[0], Value::Number(ref n) if *n == 1.into()));
        assert!(matches!(results[1], Value::Number(ref n) if *n == 2.into()));
    }

    #[test]
    fn empty_nursery_joins_immediately() {
        let nursery = Nursery::new();
        assert_eq!(nursery.join_all(None).unwrap().len(), 0);
    }

    #[test]
    fn panicking_task_becomes_an_internal_error_value() {
        let mut nursery = Nursery::new();
        nursery.spawn(|| panic!("boom"));
        let results = nursery.join_all(None).unwrap();
        assert!(matches!(
            results[0],
            Value::Error(ValueError { kind: ErrorKind::Internal, .. })
        ));
    }

    #[test]
    fn deadline_in_the_past_detaches_immediately() {
        let mut nursery = Nursery::new();
        nursery.spawn(|| {
            std::thread::sleep(std::time::Duration::from_millis(200));
            Value::Number(1.into())
        });
        let deadline = Instant::now();
        assert!(nursery.join_all(Some(deadline)).is_none());
    }
}
