// Process Scheduler - one CPU, four selection policies, one cycle driver
use core::fmt;
use core::str::FromStr;

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::DEFAULT_QUANTUM;
use crate::error::ConfigError;
use crate::process::pcb::{Process, ProcessId, ProcessState};
use crate::process::registry::ProcessRegistry;
use crate::services::resource_ledger::ResourceLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulingAlgorithm {
    FirstComeFirstServed,
    ShortestJobFirst,
    Priority,
    RoundRobin { quantum: u32 },
}

impl SchedulingAlgorithm {
    /// Build an algorithm from its configuration name.
    ///
    /// Names are `fcfs`, `sjf`, `priority` and `round_robin` (any case).
    /// `quantum` only matters for round robin and is clamped to at least 1.
    pub fn from_name(name: &str, quantum: u32) -> Result<Self, ConfigError> {
        match name.trim().to_ascii_lowercase().as_str() {
            "fcfs" => Ok(SchedulingAlgorithm::FirstComeFirstServed),
            "sjf" => Ok(SchedulingAlgorithm::ShortestJobFirst),
            "priority" => Ok(SchedulingAlgorithm::Priority),
            "round_robin" => Ok(SchedulingAlgorithm::round_robin(quantum)),
            _ => Err(ConfigError::UnknownAlgorithm(name.to_string())),
        }
    }

    pub fn round_robin(quantum: u32) -> Self {
        if quantum == 0 {
            warn!("round robin quantum of 0 raised to 1");
        }
        SchedulingAlgorithm::RoundRobin {
            quantum: quantum.max(1),
        }
    }

    /// Configuration name, the inverse of [`SchedulingAlgorithm::from_name`]
    pub fn name(&self) -> &'static str {
        match self {
            SchedulingAlgorithm::FirstComeFirstServed => "fcfs",
            SchedulingAlgorithm::ShortestJobFirst => "sjf",
            SchedulingAlgorithm::Priority => "priority",
            SchedulingAlgorithm::RoundRobin { .. } => "round_robin",
        }
    }
}

impl fmt::Display for SchedulingAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchedulingAlgorithm::FirstComeFirstServed => write!(f, "First-Come, First-Served (FCFS)"),
            SchedulingAlgorithm::ShortestJobFirst => write!(f, "Shortest Job First (SJF)"),
            SchedulingAlgorithm::Priority => write!(f, "Priority Scheduler"),
            SchedulingAlgorithm::RoundRobin { quantum } => {
                write!(f, "Round Robin (Quantum: {})", quantum)
            }
        }
    }
}

impl FromStr for SchedulingAlgorithm {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_name(s, DEFAULT_QUANTUM)
    }
}

/// What happened during one cycle. Carries a snapshot of the process taken
/// at the end of the cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", content = "process", rename_all = "snake_case")]
pub enum CycleEvent {
    ProcessStarted(Process),
    ProcessRunning(Process),
    ProcessCompleted(Process),
    ProcessPreempted(Process),
    Idle,
}

impl CycleEvent {
    pub fn process(&self) -> Option<&Process> {
        match self {
            CycleEvent::ProcessStarted(p)
            | CycleEvent::ProcessRunning(p)
            | CycleEvent::ProcessCompleted(p)
            | CycleEvent::ProcessPreempted(p) => Some(p),
            CycleEvent::Idle => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            CycleEvent::ProcessStarted(_) => "process_started",
            CycleEvent::ProcessRunning(_) => "process_running",
            CycleEvent::ProcessCompleted(_) => "process_completed",
            CycleEvent::ProcessPreempted(_) => "process_preempted",
            CycleEvent::Idle => "idle",
        }
    }
}

/// Policy plus whatever per-policy state it needs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Policy {
    FirstComeFirstServed,
    ShortestJobFirst,
    Priority,
    RoundRobin { quantum: u32, used: u32 },
}

impl From<SchedulingAlgorithm> for Policy {
    fn from(algorithm: SchedulingAlgorithm) -> Self {
        match algorithm {
            SchedulingAlgorithm::FirstComeFirstServed => Policy::FirstComeFirstServed,
            SchedulingAlgorithm::ShortestJobFirst => Policy::ShortestJobFirst,
            SchedulingAlgorithm::Priority => Policy::Priority,
            SchedulingAlgorithm::RoundRobin { quantum } => Policy::RoundRobin {
                quantum: quantum.max(1),
                used: 0,
            },
        }
    }
}

impl Policy {
    fn algorithm(&self) -> SchedulingAlgorithm {
        match *self {
            Policy::FirstComeFirstServed => SchedulingAlgorithm::FirstComeFirstServed,
            Policy::ShortestJobFirst => SchedulingAlgorithm::ShortestJobFirst,
            Policy::Priority => SchedulingAlgorithm::Priority,
            Policy::RoundRobin { quantum, .. } => SchedulingAlgorithm::RoundRobin { quantum },
        }
    }

    fn reset_quantum(&mut self) {
        if let Policy::RoundRobin { used, .. } = self {
            *used = 0;
        }
    }

    /// Read-only pick over the ready queue. FCFS takes the oldest process by
    /// creation (PIDs are handed out in creation order); other ties go to the
    /// earliest queue entry.
    fn pick(&self, registry: &ProcessRegistry) -> Option<ProcessId> {
        let mut ready = registry.ready_processes();
        let chosen = match self {
            Policy::FirstComeFirstServed => ready.min_by_key(|pcb| pcb.pid),
            Policy::RoundRobin { .. } => ready.next(),
            Policy::ShortestJobFirst => ready.min_by_key(|pcb| pcb.burst_time),
            Policy::Priority => ready.min_by_key(|pcb| pcb.priority),
        };
        chosen.map(|pcb| pcb.pid)
    }
}

/// Single-CPU cycle engine.
///
/// The scheduler only remembers *which* process holds the CPU; the record
/// itself stays in the [`ProcessRegistry`] and every change goes through it.
pub struct Scheduler {
    policy: Policy,
    current_process: Option<ProcessId>,
    time: u64,
    total_dispatches: u64,
}

/// Scheduler statistics
#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStats {
    pub algorithm: SchedulingAlgorithm,
    pub current_process: Option<ProcessId>,
    pub time: u64,
    /// Cycles the current holder has used of its quantum (round robin only)
    pub quantum_used: Option<u32>,
    pub total_dispatches: u64,
}

impl Scheduler {
    pub fn new(algorithm: SchedulingAlgorithm) -> Self {
        Self {
            policy: algorithm.into(),
            current_process: None,
            time: 0,
            total_dispatches: 0,
        }
    }

    pub fn algorithm(&self) -> SchedulingAlgorithm {
        self.policy.algorithm()
    }

    pub fn time(&self) -> u64 {
        self.time
    }

    pub fn current_process(&self) -> Option<ProcessId> {
        self.current_process
    }

    pub fn quantum_used(&self) -> Option<u32> {
        match self.policy {
            Policy::RoundRobin { used, .. } => Some(used),
            _ => None,
        }
    }

    /// Switch policy without losing any queued process.
    ///
    /// A running process goes back to its creation-order place in the ready
    /// queue, the CPU is freed and the new policy starts with no holder and a
    /// fresh quantum.
    /// The clock keeps counting.
    pub fn set_algorithm(
        &mut self,
        algorithm: SchedulingAlgorithm,
        registry: &mut ProcessRegistry,
        ledger: &mut ResourceLedger,
    ) {
        for pid in registry.running() {
            if let Err(e) = registry.set_state(pid, ProcessState::Ready) {
                warn!("could not requeue process {}: {}", pid, e);
            } else {
                debug!("process {} moved from running to ready on algorithm switch", pid);
            }
        }
        ledger.release_cpu();
        self.current_process = None;
        self.policy = algorithm.into();
        info!("Scheduler algorithm set to: {}", algorithm);
    }

    /// Forget `pid` as the CPU holder, if it is. Called when a process is
    /// suspended or killed from outside the cycle.
    pub fn vacate(&mut self, pid: ProcessId) -> bool {
        if self.current_process == Some(pid) {
            self.current_process = None;
            self.policy.reset_quantum();
            true
        } else {
            false
        }
    }

    /// Choose the next process to run.
    ///
    /// Only round robin touches any state here: if the holder is still running
    /// with its quantum spent, it is rotated to the tail first.
    pub fn select_next_process(
        &mut self,
        registry: &mut ProcessRegistry,
        ledger: &mut ResourceLedger,
    ) -> Option<ProcessId> {
        if let Policy::RoundRobin { quantum, used } = self.policy {
            if used >= quantum {
                if let Some(pid) = self.running_holder(registry) {
                    self.preempt(pid, registry, ledger);
                }
            }
            let next = self.policy.pick(registry);
            if next.is_some() {
                self.policy.reset_quantum();
            }
            return next;
        }
        self.policy.pick(registry)
    }

    /// Advance the clock by one cycle and report what happened.
    pub fn execute_cycle(
        &mut self,
        registry: &mut ProcessRegistry,
        ledger: &mut ResourceLedger,
    ) -> CycleEvent {
        self.time += 1;

        let event = match self.running_holder(registry) {
            None => {
                self.current_process = None;
                match self.select_next_process(registry, ledger) {
                    Some(pid) if ledger.cpu_available() => self.dispatch(pid, registry, ledger),
                    Some(pid) => {
                        warn!("cycle {}: process {} is ready but the CPU is held", self.time, pid);
                        CycleEvent::Idle
                    }
                    None => CycleEvent::Idle,
                }
            }
            Some(pid) => self.run_current(pid, registry, ledger),
        };

        debug!("cycle {}: {}", self.time, event.kind());
        debug_assert!(registry.running().len() <= 1, "more than one running process");
        debug_assert!(
            registry.running().is_empty() || !ledger.cpu_available(),
            "a process is running on a free CPU"
        );
        event
    }

    pub fn stats(&self) -> SchedulerStats {
        SchedulerStats {
            algorithm: self.algorithm(),
            current_process: self.current_process,
            time: self.time,
            quantum_used: self.quantum_used(),
            total_dispatches: self.total_dispatches,
        }
    }

    /// The recorded holder, if it is still actually running
    fn running_holder(&self, registry: &ProcessRegistry) -> Option<ProcessId> {
        self.current_process.filter(|pid| {
            registry
                .find(*pid)
                .map_or(false, |pcb| pcb.state == ProcessState::Running)
        })
    }

    fn dispatch(
        &mut self,
        pid: ProcessId,
        registry: &mut ProcessRegistry,
        ledger: &mut ResourceLedger,
    ) -> CycleEvent {
        if let Err(e) = registry.set_state(pid, ProcessState::Running) {
            warn!("cannot dispatch process {}: {}", pid, e);
            return CycleEvent::Idle;
        }
        ledger.acquire_cpu();
        self.current_process = Some(pid);
        self.policy.reset_quantum();
        self.total_dispatches += 1;

        match snapshot(registry, pid) {
            Some(pcb) => CycleEvent::ProcessStarted(pcb),
            None => CycleEvent::Idle,
        }
    }

    fn run_current(
        &mut self,
        pid: ProcessId,
        registry: &mut ProcessRegistry,
        ledger: &mut ResourceLedger,
    ) -> CycleEvent {
        if let Policy::RoundRobin { used, .. } = &mut self.policy {
            *used += 1;
        }

        let finished = match registry.consume_cycle(pid) {
            Ok(finished) => finished,
            Err(e) => {
                warn!("lost track of running process {}: {}", pid, e);
                self.current_process = None;
                self.policy.reset_quantum();
                return CycleEvent::Idle;
            }
        };

        if finished {
            return self.complete(pid, registry, ledger);
        }

        if let Policy::RoundRobin { quantum, used } = self.policy {
            if used >= quantum {
                return self.preempt(pid, registry, ledger);
            }
        }

        match snapshot(registry, pid) {
            Some(pcb) => CycleEvent::ProcessRunning(pcb),
            None => CycleEvent::Idle,
        }
    }

    fn complete(
        &mut self,
        pid: ProcessId,
        registry: &mut ProcessRegistry,
        ledger: &mut ResourceLedger,
    ) -> CycleEvent {
        if let Err(e) = registry.set_state(pid, ProcessState::Terminated) {
            warn!("cannot complete process {}: {}", pid, e);
        }
        ledger.release_cpu();
        self.current_process = None;
        self.policy.reset_quantum();

        match snapshot(registry, pid) {
            Some(pcb) => {
                ledger.release_memory(pid, pcb.memory);
                info!("process {} completed at cycle {}", pid, self.time);
                CycleEvent::ProcessCompleted(pcb)
            }
            None => CycleEvent::Idle,
        }
    }

    /// Rotate the holder to the tail of the ready queue and free the CPU
    fn preempt(
        &mut self,
        pid: ProcessId,
        registry: &mut ProcessRegistry,
        ledger: &mut ResourceLedger,
    ) -> CycleEvent {
        if let Err(e) = registry.rotate_to_tail(pid) {
            warn!("cannot preempt process {}: {}", pid, e);
        }
        ledger.release_cpu();
        self.current_process = None;
        self.policy.reset_quantum();

        match snapshot(registry, pid) {
            Some(pcb) => CycleEvent::ProcessPreempted(pcb),
            None => CycleEvent::Idle,
        }
    }
}

fn snapshot(registry: &ProcessRegistry, pid: ProcessId) -> Option<Process> {
    registry.find(pid).cloned()
}
