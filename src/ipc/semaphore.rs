// Counting semaphore with a FIFO wait list
use std::collections::VecDeque;
use std::fmt;

use log::debug;
use serde::Serialize;
use spin::Mutex;

use crate::process::pcb::ProcessId;

/// Counting semaphore.
///
/// `wait` never blocks the calling thread: a denied caller is put on the wait
/// list and gets `false` back. `signal` wakes the oldest waiter, but only as
/// a hint. The woken PID holds no permit and must call `wait` again, so a
/// faster caller can take the permit first.
pub struct Semaphore {
    name: String,
    inner: Mutex<SemaphoreState>,
}

struct SemaphoreState {
    value: i64,
    waiting: VecDeque<ProcessId>,
    log: Vec<SemaphoreEvent>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SemaphoreOp {
    Acquired,
    Blocked,
    Released,
    Woken,
}

/// One entry of a semaphore's operation log
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SemaphoreEvent {
    pub semaphore: String,
    pub pid: ProcessId,
    pub op: SemaphoreOp,
    /// Semaphore value right after the operation
    pub value: i64,
}

impl fmt::Display for SemaphoreEvent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.op {
            SemaphoreOp::Acquired => write!(
                f,
                "process {} acquired semaphore '{}' (value now {})",
                self.pid, self.semaphore, self.value
            ),
            SemaphoreOp::Blocked => write!(
                f,
                "process {} blocked on semaphore '{}' (value {})",
                self.pid, self.semaphore, self.value
            ),
            SemaphoreOp::Released => write!(
                f,
                "process {} released semaphore '{}' (value now {})",
                self.pid, self.semaphore, self.value
            ),
            SemaphoreOp::Woken => write!(
                f,
                "process {} woken from semaphore '{}'",
                self.pid, self.semaphore
            ),
        }
    }
}

impl Semaphore {
    pub fn new(name: impl Into<String>, initial_value: i64) -> Self {
        Self {
            name: name.into(),
            inner: Mutex::new(SemaphoreState {
                value: initial_value,
                waiting: VecDeque::new(),
                log: Vec::new(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Try to take a permit. Returns false (and queues `pid`) when none is
    /// available. Every denied call appends, so a PID that retries while
    /// still queued appears more than once.
    pub fn wait(&self, pid: ProcessId) -> bool {
        let mut state = self.inner.lock();
        if state.value <= 0 {
            state.waiting.push_back(pid);
            let value = state.value;
            self.record(&mut state, pid, SemaphoreOp::Blocked, value);
            return false;
        }

        state.value -= 1;
        let value = state.value;
        self.record(&mut state, pid, SemaphoreOp::Acquired, value);
        true
    }

    /// Return a permit and wake the oldest waiter, if any.
    ///
    /// The returned list has at most one PID.
    pub fn signal(&self, pid: ProcessId) -> Vec<ProcessId> {
        let mut state = self.inner.lock();
        state.value += 1;
        let value = state.value;
        self.record(&mut state, pid, SemaphoreOp::Released, value);

        let mut woken = Vec::new();
        if let Some(next) = state.waiting.pop_front() {
            self.record(&mut state, next, SemaphoreOp::Woken, value);
            woken.push(next);
        }
        woken
    }

    pub fn value(&self) -> i64 {
        self.inner.lock().value
    }

    /// Waiting PIDs, oldest first
    pub fn waiting(&self) -> Vec<ProcessId> {
        self.inner.lock().waiting.iter().copied().collect()
    }

    pub fn log(&self) -> Vec<SemaphoreEvent> {
        self.inner.lock().log.clone()
    }

    fn record(&self, state: &mut SemaphoreState, pid: ProcessId, op: SemaphoreOp, value: i64) {
        let event = SemaphoreEvent {
            semaphore: self.name.clone(),
            pid,
            op,
            value,
        };
        debug!("{}", event);
        state.log.push(event);
    }
}

impl fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let state = self.inner.lock();
        f.debug_struct("Semaphore")
            .field("name", &self.name)
            .field("value", &state.value)
            .field("waiting", &state.waiting)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wait_decrements_until_zero() {
        let sem = Semaphore::new("s", 2);
        assert!(sem.wait(1));
        assert!(sem.wait(2));
        assert_eq!(sem.value(), 0);
        assert!(!sem.wait(3));
        assert_eq!(sem.value(), 0);
        assert_eq!(sem.waiting(), vec![3]);
    }

    #[test]
    fn signal_wakes_oldest_first() {
        let sem = Semaphore::new("s", 0);
        assert!(!sem.wait(10));
        assert!(!sem.wait(20));
        assert_eq!(sem.signal(1), vec![10]);
        assert_eq!(sem.signal(1), vec![20]);
        assert!(sem.signal(1).is_empty());
        assert_eq!(sem.value(), 3);
    }

    #[test]
    fn wake_is_only_a_hint() {
        let sem = Semaphore::new("s", 0);
        assert!(!sem.wait(10));
        assert_eq!(sem.signal(1), vec![10]);
        // value went up but nothing was handed to 10; anyone may take it
        assert_eq!(sem.value(), 1);
        assert!(sem.wait(30));
        assert!(!sem.wait(10));
        assert_eq!(sem.waiting(), vec![10]);
    }

    #[test]
    fn every_denied_wait_is_queued() {
        let sem = Semaphore::new("s", 0);
        assert!(!sem.wait(1));
        assert!(!sem.wait(1));
        assert!(!sem.wait(2));
        assert_eq!(sem.waiting(), vec![1, 1, 2]);
        assert_eq!(sem.signal(9), vec![1]);
        assert_eq!(sem.signal(9), vec![1]);
        assert_eq!(sem.signal(9), vec![2]);
    }

    #[test]
    fn log_records_every_operation() {
        let sem = Semaphore::new("mutex", 1);
        sem.wait(4);
        sem.wait(5);
        sem.signal(4);
        let ops: Vec<_> = sem.log().iter().map(|e| (e.pid, e.op)).collect();
        assert_eq!(
            ops,
            vec![
                (4, SemaphoreOp::Acquired),
                (5, SemaphoreOp::Blocked),
                (4, SemaphoreOp::Released),
                (5, SemaphoreOp::Woken),
            ]
        );
        assert_eq!(
            sem.log()[0].to_string(),
            "process 4 acquired semaphore 'mutex' (value now 0)"
        );
    }
}
