// Process table and ready queue
use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;

use crate::error::ProcessError;
use crate::process::pcb::{Process, ProcessId, ProcessState};

/// Owns every process record and the ready queue.
///
/// All state changes go through [`ProcessRegistry::set_state`] (or
/// [`ProcessRegistry::rotate_to_tail`]) so the ready queue always holds
/// exactly the processes in `Ready`, each once. Outside round-robin rotation
/// the queue is in creation order.
pub struct ProcessRegistry {
    next_pid: AtomicU64,
    processes: BTreeMap<ProcessId, Process>,
    ready_queue: VecDeque<ProcessId>,
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessRegistry {
    pub fn new() -> Self {
        Self {
            next_pid: AtomicU64::new(1), // Start from PID 1
            processes: BTreeMap::new(),
            ready_queue: VecDeque::new(),
        }
    }

    /// Register a new ready process at the tail of the ready queue.
    ///
    /// Memory must already have been reserved by the caller.
    pub fn create(&mut self, priority: u32, memory: u64, burst_time: u32) -> Process {
        let pid = self.next_pid.fetch_add(1, Ordering::Relaxed);
        let process = Process::new(pid, priority, memory, burst_time);

        self.processes.insert(pid, process.clone());
        self.ready_queue.push_back(pid);

        debug!(
            "registered process {} (priority {}, {} MB, burst {})",
            pid, priority, memory, burst_time
        );
        process
    }

    /// PID the next `create` will hand out
    pub fn next_pid(&self) -> ProcessId {
        self.next_pid.load(Ordering::Relaxed)
    }

    /// Snapshot of every process, in creation order
    pub fn list(&self) -> Vec<Process> {
        self.processes.values().cloned().collect()
    }

    pub fn find(&self, pid: ProcessId) -> Option<&Process> {
        self.processes.get(&pid)
    }

    /// Mark a process terminated.
    ///
    /// Returns false for unknown PIDs and for processes that already
    /// terminated. CPU and memory are the caller's business.
    pub fn terminate(&mut self, pid: ProcessId) -> bool {
        self.set_state(pid, ProcessState::Terminated).is_ok()
    }

    /// Run `pid` through the lifecycle validator and keep the ready queue in
    /// step. A process entering `Ready` (resumed, or handed back on an
    /// algorithm switch) takes its creation-order place in the queue.
    ///
    /// Returns the previous state.
    pub fn set_state(
        &mut self,
        pid: ProcessId,
        to: ProcessState,
    ) -> Result<ProcessState, ProcessError> {
        let pcb = self
            .processes
            .get_mut(&pid)
            .ok_or(ProcessError::ProcessNotFound(pid))?;
        let from = pcb.transition(to)?;

        if from == ProcessState::Ready {
            self.ready_queue.retain(|&p| p != pid);
        }
        if to == ProcessState::Ready && !self.ready_queue.contains(&pid) {
            let at = self
                .ready_queue
                .iter()
                .position(|&queued| queued > pid)
                .unwrap_or(self.ready_queue.len());
            self.ready_queue.insert(at, pid);
        }
        Ok(from)
    }

    /// Move a running process to the tail of the ready queue (round-robin
    /// quantum expiry).
    pub fn rotate_to_tail(&mut self, pid: ProcessId) -> Result<(), ProcessError> {
        let pcb = self
            .processes
            .get_mut(&pid)
            .ok_or(ProcessError::ProcessNotFound(pid))?;
        if pcb.state != ProcessState::Running {
            return Err(ProcessError::InvalidTransition {
                pid,
                from: pcb.state,
                to: ProcessState::Ready,
            });
        }
        pcb.transition(ProcessState::Ready)?;
        self.ready_queue.retain(|&p| p != pid);
        self.ready_queue.push_back(pid);
        Ok(())
    }

    /// Charge one cycle to a running process. Returns true when its burst is
    /// exhausted.
    pub fn consume_cycle(&mut self, pid: ProcessId) -> Result<bool, ProcessError> {
        let pcb = self
            .processes
            .get_mut(&pid)
            .ok_or(ProcessError::ProcessNotFound(pid))?;
        if pcb.state != ProcessState::Running {
            return Err(ProcessError::InvalidTransition {
                pid,
                from: pcb.state,
                to: ProcessState::Running,
            });
        }
        Ok(pcb.consume_cycle())
    }

    /// Ready processes in queue order
    pub fn ready_processes(&self) -> impl Iterator<Item = &Process> + '_ {
        self.ready_queue
            .iter()
            .filter_map(move |pid| self.processes.get(pid))
            .filter(|pcb| pcb.state == ProcessState::Ready)
    }

    /// PIDs in the ready queue, head first
    pub fn ready_queue(&self) -> Vec<ProcessId> {
        self.ready_queue.iter().copied().collect()
    }

    pub fn count_in_state(&self, state: ProcessState) -> usize {
        self.processes.values().filter(|pcb| pcb.state == state).count()
    }

    /// Every running process; never more than one when the engine is used correctly
    pub fn running(&self) -> Vec<ProcessId> {
        self.processes
            .values()
            .filter(|pcb| pcb.state == ProcessState::Running)
            .map(|pcb| pcb.pid)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.processes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pids_are_monotonic_and_queue_follows_arrival() {
        let mut reg = ProcessRegistry::new();
        let a = reg.create(3, 100, 5);
        let b = reg.create(1, 100, 2);
        let c = reg.create(2, 100, 4);
        assert_eq!((a.pid, b.pid, c.pid), (1, 2, 3));
        assert_eq!(reg.ready_queue(), vec![1, 2, 3]);
        assert_eq!(reg.list().iter().map(|p| p.pid).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn find_unknown_pid() {
        let reg = ProcessRegistry::new();
        assert!(reg.find(42).is_none());
    }

    #[test]
    fn terminate_is_a_noop_the_second_time() {
        let mut reg = ProcessRegistry::new();
        let p = reg.create(1, 10, 1);
        assert!(reg.terminate(p.pid));
        assert!(!reg.terminate(p.pid));
        assert!(!reg.terminate(99));
        assert_eq!(reg.find(p.pid).unwrap().state, ProcessState::Terminated);
        assert!(reg.ready_queue().is_empty());
    }

    #[test]
    fn pids_are_not_reused_after_termination() {
        let mut reg = ProcessRegistry::new();
        let p = reg.create(1, 10, 1);
        reg.terminate(p.pid);
        assert_eq!(reg.create(1, 10, 1).pid, 2);
    }

    #[test]
    fn dispatch_removes_and_rotation_appends() {
        let mut reg = ProcessRegistry::new();
        reg.create(1, 10, 5);
        reg.create(1, 10, 5);
        reg.set_state(1, ProcessState::Running).unwrap();
        assert_eq!(reg.ready_queue(), vec![2]);
        reg.rotate_to_tail(1).unwrap();
        assert_eq!(reg.ready_queue(), vec![2, 1]);
        assert!(reg.rotate_to_tail(1).is_err());
    }

    #[test]
    fn running_process_handed_back_keeps_creation_order() {
        let mut reg = ProcessRegistry::new();
        reg.create(1, 10, 5);
        reg.create(1, 10, 5);
        reg.create(1, 10, 5);
        reg.set_state(2, ProcessState::Running).unwrap();
        reg.set_state(2, ProcessState::Ready).unwrap();
        assert_eq!(reg.ready_queue(), vec![1, 2, 3]);
    }

    #[test]
    fn resumed_process_rejoins_in_creation_order() {
        let mut reg = ProcessRegistry::new();
        reg.create(1, 10, 5);
        reg.create(1, 10, 5);
        reg.create(1, 10, 5);
        reg.set_state(1, ProcessState::Waiting).unwrap();
        assert_eq!(reg.ready_queue(), vec![2, 3]);
        reg.set_state(1, ProcessState::Ready).unwrap();
        assert_eq!(reg.ready_queue(), vec![1, 2, 3]);
    }

    #[test]
    fn rejected_transition_leaves_queue_untouched() {
        let mut reg = ProcessRegistry::new();
        reg.create(1, 10, 5);
        assert!(reg.set_state(1, ProcessState::Ready).is_err());
        assert_eq!(reg.ready_queue(), vec![1]);
        assert_eq!(
            reg.consume_cycle(1),
            Err(ProcessError::InvalidTransition {
                pid: 1,
                from: ProcessState::Ready,
                to: ProcessState::Running,
            })
        );
    }
}
