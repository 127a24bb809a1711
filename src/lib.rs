//! Discrete-cycle CPU scheduling and IPC simulator.
//!
//! A single simulated CPU runs processes under one of four selection
//! policies (FCFS, SJF, priority, round robin). Processes coordinate through
//! per-process mailboxes and a semaphore-guarded bounded buffer.
//!
//! Everything is driven by the caller: [`ProcessService::execute_cycle`]
//! advances the clock by one cycle and returns exactly one [`CycleEvent`].

pub mod config;
pub mod error;
pub mod ipc;
pub mod process;
pub mod services;

pub use config::SimConfig;
pub use error::{ConfigError, IpcError, ProcessError};
pub use ipc::mailbox::{Message, MessageSystem, ReceiveMode};
pub use ipc::producer_consumer::{BufferEvent, BufferLogEntry, BufferStatus, ProducerConsumer, Role};
pub use ipc::semaphore::{Semaphore, SemaphoreEvent, SemaphoreOp};
pub use process::pcb::{Process, ProcessId, ProcessState};
pub use process::registry::ProcessRegistry;
pub use process::scheduler::{CycleEvent, Scheduler, SchedulerStats, SchedulingAlgorithm};
pub use services::process_service::{ProcessService, SystemStats};
pub use services::resource_ledger::{ResourceLedger, ResourceStatus};
