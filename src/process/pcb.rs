// Process Control Block for the simulated CPU
use core::fmt;

use serde::Serialize;

use crate::error::ProcessError;

/// Process ID type
pub type ProcessId = u64;

/// Process state enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Ready,      // Ready to run, waiting for CPU
    Running,    // Holding the CPU
    Waiting,    // Suspended by the caller
    Terminated, // Finished or killed, kept for listing
}

impl ProcessState {
    /// Whether the lifecycle allows moving from `self` to `to`.
    pub fn can_transition_to(self, to: ProcessState) -> bool {
        use ProcessState::*;
        matches!(
            (self, to),
            (Ready, Running)
                | (Running, Ready)
                | (Ready, Waiting)
                | (Running, Waiting)
                | (Waiting, Ready)
                | (Ready, Terminated)
                | (Running, Terminated)
                | (Waiting, Terminated)
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ProcessState::Ready => "ready",
            ProcessState::Running => "running",
            ProcessState::Waiting => "waiting",
            ProcessState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Process Control Block
///
/// Records are owned by the [`ProcessRegistry`](super::registry::ProcessRegistry)
/// and handed out as clones. `memory` is fixed at creation; `burst_time` only
/// goes down, one cycle at a time, while the process holds the CPU.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Process {
    pub pid: ProcessId,
    pub state: ProcessState,
    /// Lower value wins
    pub priority: u32,
    /// MB reserved in the resource ledger
    pub memory: u64,
    /// Remaining CPU cycles
    pub burst_time: u32,
    /// Cycles spent running so far
    pub cpu_time: u64,
}

impl Process {
    pub fn new(pid: ProcessId, priority: u32, memory: u64, burst_time: u32) -> Self {
        Self {
            pid,
            state: ProcessState::Ready,
            priority,
            memory,
            burst_time,
            cpu_time: 0,
        }
    }

    /// Move to `to`, rejecting anything the lifecycle does not allow.
    ///
    /// Returns the previous state.
    pub fn transition(&mut self, to: ProcessState) -> Result<ProcessState, ProcessError> {
        let from = self.state;
        if from == ProcessState::Terminated {
            return Err(ProcessError::AlreadyTerminated(self.pid));
        }
        if !from.can_transition_to(to) {
            return Err(ProcessError::InvalidTransition {
                pid: self.pid,
                from,
                to,
            });
        }
        self.state = to;
        Ok(from)
    }

    /// Charge one cycle of CPU time. Returns true once the burst is used up.
    pub fn consume_cycle(&mut self) -> bool {
        debug_assert_eq!(self.state, ProcessState::Running);
        self.burst_time = self.burst_time.saturating_sub(1);
        self.cpu_time += 1;
        self.burst_time == 0
    }

    pub fn is_active(&self) -> bool {
        self.state != ProcessState::Terminated
    }
}
