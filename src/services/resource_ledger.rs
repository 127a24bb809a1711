// Resource Ledger - one CPU flag and a memory pool counter
use log::{debug, warn};
use serde::Serialize;

use crate::process::pcb::ProcessId;

/// Tracks CPU availability and the memory budget.
///
/// There is no allocator behind this: memory is a plain MB counter. The CPU
/// flag is flipped by the scheduler's cycle and by forced suspension or
/// termination of the running process.
#[derive(Debug, Clone)]
pub struct ResourceLedger {
    cpu_available: bool,
    total_memory: u64,
    available_memory: u64,
}

/// Point-in-time view of the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceStatus {
    pub cpu_available: bool,
    pub total_memory: u64,
    pub available_memory: u64,
}

impl ResourceStatus {
    pub fn used_memory(&self) -> u64 {
        self.total_memory - self.available_memory
    }
}

impl ResourceLedger {
    pub fn new(total_memory: u64) -> Self {
        Self {
            cpu_available: true,
            total_memory,
            available_memory: total_memory,
        }
    }

    /// Reserve `memory` MB for `pid`. Fails without side effects when the
    /// pool is short.
    pub fn assign_memory(&mut self, pid: ProcessId, memory: u64) -> bool {
        if memory > self.available_memory {
            debug!(
                "memory request of {} MB for process {} denied ({} MB free)",
                memory, pid, self.available_memory
            );
            return false;
        }
        self.available_memory -= memory;
        true
    }

    /// Give `memory` MB back to the pool.
    ///
    /// Callers release at most once per assignment. A release that would push
    /// the pool past its total is a bookkeeping bug; it trips a debug
    /// assertion and is capped in release builds.
    pub fn release_memory(&mut self, pid: ProcessId, memory: u64) {
        let restored = self.available_memory.saturating_add(memory);
        debug_assert!(
            restored <= self.total_memory,
            "process {} released {} MB more than was assigned",
            pid,
            restored - self.total_memory
        );
        if restored > self.total_memory {
            warn!("process {} over-released memory; capping pool", pid);
        }
        self.available_memory = restored.min(self.total_memory);
    }

    pub fn cpu_available(&self) -> bool {
        self.cpu_available
    }

    /// Mark the CPU busy. Returns false if it already was.
    pub fn acquire_cpu(&mut self) -> bool {
        let was_free = self.cpu_available;
        self.cpu_available = false;
        was_free
    }

    pub fn release_cpu(&mut self) {
        self.cpu_available = true;
    }

    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }

    pub fn available_memory(&self) -> u64 {
        self.available_memory
    }

    pub fn status(&self) -> ResourceStatus {
        ResourceStatus {
            cpu_available: self.cpu_available,
            total_memory: self.total_memory,
            available_memory: self.available_memory,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_and_release_net_to_zero() {
        let mut ledger = ResourceLedger::new(1024);
        assert!(ledger.assign_memory(1, 256));
        assert_eq!(ledger.available_memory(), 768);
        ledger.release_memory(1, 256);
        assert_eq!(ledger.available_memory(), 1024);
    }

    #[test]
    fn oversized_request_has_no_side_effects() {
        let mut ledger = ResourceLedger::new(512);
        assert!(ledger.assign_memory(1, 500));
        assert!(!ledger.assign_memory(2, 13));
        assert_eq!(ledger.available_memory(), 12);
        assert!(ledger.assign_memory(3, 12));
        assert_eq!(ledger.available_memory(), 0);
    }

    #[test]
    fn cpu_flag() {
        let mut ledger = ResourceLedger::new(1);
        assert!(ledger.cpu_available());
        assert!(ledger.acquire_cpu());
        assert!(!ledger.acquire_cpu());
        ledger.release_cpu();
        assert!(ledger.status().cpu_available);
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "released")]
    fn over_release_is_caught_in_debug() {
        let mut ledger = ResourceLedger::new(100);
        ledger.release_memory(1, 1);
    }
}
