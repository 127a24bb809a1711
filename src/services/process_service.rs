// Process Service - owns the whole simulated machine
use log::info;
use serde::Serialize;

use crate::config::SimConfig;
use crate::error::{ConfigError, IpcError, ProcessError};
use crate::ipc::mailbox::{Message, MessageSystem, ReceiveMode};
use crate::ipc::producer_consumer::{BufferLogEntry, BufferStatus, ProducerConsumer};
use crate::process::pcb::{Process, ProcessId, ProcessState};
use crate::process::registry::ProcessRegistry;
use crate::process::scheduler::{CycleEvent, Scheduler, SchedulerStats, SchedulingAlgorithm};
use crate::services::resource_ledger::{ResourceLedger, ResourceStatus};

/// Process Service - Coordinates process lifecycle, scheduling and IPC.
///
/// Built once per run and passed around explicitly. Process operations take
/// `&mut self`; the IPC primitives lock internally and only need `&self`.
pub struct ProcessService {
    registry: ProcessRegistry,
    ledger: ResourceLedger,
    scheduler: Scheduler,
    messages: MessageSystem,
    buffer: ProducerConsumer,
}

/// System statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SystemStats {
    pub total_processes: usize,
    pub running_processes: usize,
    pub ready_processes: usize,
    pub waiting_processes: usize,
    pub terminated_processes: usize,
    pub current_process: Option<ProcessId>,
    pub time: u64,
}

impl ProcessService {
    pub fn new(config: SimConfig) -> Result<Self, ConfigError> {
        let algorithm = config.validate()?;
        info!(
            "process service up: {} MB memory, buffer of {}, {}",
            config.total_memory, config.buffer_capacity, algorithm
        );
        Ok(Self {
            registry: ProcessRegistry::new(),
            ledger: ResourceLedger::new(config.total_memory),
            scheduler: Scheduler::new(algorithm),
            messages: MessageSystem::new(),
            buffer: ProducerConsumer::new(config.buffer_capacity),
        })
    }

    // ---- process lifecycle ----

    /// Create a ready process and give it a mailbox.
    ///
    /// Memory is reserved before anything is registered; if the pool is
    /// short nothing changes and no PID is used.
    pub fn create_process(
        &mut self,
        priority: u32,
        memory: u64,
        burst_time: u32,
    ) -> Result<Process, ProcessError> {
        if priority < 1 {
            return Err(ProcessError::InvalidParameter("priority"));
        }
        if memory < 1 {
            return Err(ProcessError::InvalidParameter("memory"));
        }
        if burst_time < 1 {
            return Err(ProcessError::InvalidParameter("burst_time"));
        }

        let pid = self.registry.next_pid();
        if !self.ledger.assign_memory(pid, memory) {
            return Err(ProcessError::InsufficientMemory {
                requested: memory,
                available: self.ledger.available_memory(),
            });
        }

        let process = self.registry.create(priority, memory, burst_time);
        debug_assert_eq!(process.pid, pid);
        self.messages.create_queue(process.pid);

        info!(
            "Created process {} with priority {}, {} MB and burst {}",
            process.pid, priority, memory, burst_time
        );
        Ok(process)
    }

    pub fn list_processes(&self) -> Vec<Process> {
        self.registry.list()
    }

    pub fn find_process(&self, pid: ProcessId) -> Option<&Process> {
        self.registry.find(pid)
    }

    /// Move a ready or running process to `waiting`. A running process gives
    /// up the CPU.
    pub fn suspend_process(&mut self, pid: ProcessId) -> Result<(), ProcessError> {
        let previous = self.registry.set_state(pid, ProcessState::Waiting)?;
        if previous == ProcessState::Running {
            self.ledger.release_cpu();
            self.scheduler.vacate(pid);
        }
        info!("Suspended process {}", pid);
        Ok(())
    }

    /// Put a waiting process back in the ready queue at its creation-order
    /// place.
    pub fn resume_process(&mut self, pid: ProcessId) -> Result<(), ProcessError> {
        let state = self
            .registry
            .find(pid)
            .ok_or(ProcessError::ProcessNotFound(pid))?
            .state;
        if state != ProcessState::Waiting {
            return Err(ProcessError::InvalidTransition {
                pid,
                from: state,
                to: ProcessState::Ready,
            });
        }
        self.registry.set_state(pid, ProcessState::Ready)?;
        info!("Resumed process {}", pid);
        Ok(())
    }

    /// Kill a process from outside the cycle.
    ///
    /// Returns `Ok(false)` if it had already terminated. Otherwise the CPU is
    /// freed if it held it and its memory goes back to the pool.
    pub fn terminate_process(&mut self, pid: ProcessId) -> Result<bool, ProcessError> {
        let memory = match self.registry.find(pid) {
            None => return Err(ProcessError::ProcessNotFound(pid)),
            Some(pcb) if pcb.state == ProcessState::Terminated => return Ok(false),
            Some(pcb) => pcb.memory,
        };

        let previous = self.registry.set_state(pid, ProcessState::Terminated)?;
        if previous == ProcessState::Running {
            self.ledger.release_cpu();
            self.scheduler.vacate(pid);
        }
        self.ledger.release_memory(pid, memory);

        info!("Terminated process {} ({} MB released)", pid, memory);
        Ok(true)
    }

    // ---- resources ----

    pub fn resources(&self) -> ResourceStatus {
        self.ledger.status()
    }

    // ---- scheduling ----

    pub fn algorithm(&self) -> SchedulingAlgorithm {
        self.scheduler.algorithm()
    }

    pub fn set_algorithm(&mut self, algorithm: SchedulingAlgorithm) {
        self.scheduler
            .set_algorithm(algorithm, &mut self.registry, &mut self.ledger);
    }

    /// Switch algorithm by configuration name (`fcfs`, `sjf`, `priority`,
    /// `round_robin`).
    pub fn select_algorithm(&mut self, name: &str, quantum: u32) -> Result<(), ConfigError> {
        let algorithm = SchedulingAlgorithm::from_name(name, quantum)?;
        self.set_algorithm(algorithm);
        Ok(())
    }

    pub fn execute_cycle(&mut self) -> CycleEvent {
        self.scheduler
            .execute_cycle(&mut self.registry, &mut self.ledger)
    }

    pub fn run_cycles(&mut self, cycles: usize) -> Vec<CycleEvent> {
        (0..cycles).map(|_| self.execute_cycle()).collect()
    }

    pub fn time(&self) -> u64 {
        self.scheduler.time()
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Ready queue, head first
    pub fn ready_queue(&self) -> Vec<ProcessId> {
        self.registry.ready_queue()
    }

    pub fn system_stats(&self) -> SystemStats {
        SystemStats {
            total_processes: self.registry.len(),
            running_processes: self.registry.count_in_state(ProcessState::Running),
            ready_processes: self.registry.count_in_state(ProcessState::Ready),
            waiting_processes: self.registry.count_in_state(ProcessState::Waiting),
            terminated_processes: self.registry.count_in_state(ProcessState::Terminated),
            current_process: self.scheduler.current_process(),
            time: self.scheduler.time(),
        }
    }

    // ---- messaging ----

    pub fn messages(&self) -> &MessageSystem {
        &self.messages
    }

    pub fn create_mailbox(&self, pid: ProcessId) {
        self.messages.create_queue(pid);
    }

    pub fn remove_mailbox(&self, pid: ProcessId) {
        self.messages.remove_queue(pid);
    }

    pub fn send_message(&self, sender: ProcessId, receiver: ProcessId, content: &str) -> bool {
        self.messages.send(sender, receiver, content)
    }

    pub fn receive_message(&self, pid: ProcessId) -> Option<Message> {
        self.messages.receive(pid, ReceiveMode::NonBlocking)
    }

    pub fn peek_message(&self, pid: ProcessId) -> Option<Message> {
        self.messages.peek(pid)
    }

    pub fn message_count(&self, pid: ProcessId) -> usize {
        self.messages.queue_size(pid)
    }

    // ---- producer / consumer ----

    pub fn buffer(&self) -> &ProducerConsumer {
        &self.buffer
    }

    pub fn register_producer(&self, pid: ProcessId) -> Result<(), IpcError> {
        self.ensure_active(pid)?;
        self.buffer.set_producer(pid);
        Ok(())
    }

    pub fn register_consumer(&self, pid: ProcessId) -> Result<(), IpcError> {
        self.ensure_active(pid)?;
        self.buffer.set_consumer(pid);
        Ok(())
    }

    /// Produce as the registered producer. `Ok(false)` means blocked.
    pub fn produce(&self, item: &str) -> Result<bool, IpcError> {
        let pid = self.buffer.producer().ok_or(IpcError::NoProducer)?;
        self.ensure_active(pid)?;
        Ok(self.buffer.produce(pid, item))
    }

    /// Consume as the registered consumer. `Ok(None)` means blocked.
    pub fn consume(&self) -> Result<Option<String>, IpcError> {
        let pid = self.buffer.consumer().ok_or(IpcError::NoConsumer)?;
        self.ensure_active(pid)?;
        Ok(self.buffer.consume(pid))
    }

    /// Produce as `pid`. Any live process may act while no producer is
    /// registered.
    pub fn produce_as(&self, pid: ProcessId, item: &str) -> Result<bool, IpcError> {
        self.ensure_active(pid)?;
        Ok(self.buffer.produce(pid, item))
    }

    pub fn consume_as(&self, pid: ProcessId) -> Result<Option<String>, IpcError> {
        self.ensure_active(pid)?;
        Ok(self.buffer.consume(pid))
    }

    pub fn buffer_status(&self) -> BufferStatus {
        self.buffer.status()
    }

    pub fn buffer_logs(&self) -> Vec<BufferLogEntry> {
        self.buffer.logs()
    }

    fn ensure_active(&self, pid: ProcessId) -> Result<(), IpcError> {
        match self.registry.find(pid) {
            Some(pcb) if pcb.is_active() => Ok(()),
            _ => Err(IpcError::ProcessUnavailable(pid)),
        }
    }
}
