// Process management: control blocks, the process table and the scheduler
pub mod pcb;
pub mod registry;
pub mod scheduler;

pub use pcb::{Process, ProcessId, ProcessState};
pub use registry::ProcessRegistry;
pub use scheduler::{CycleEvent, Scheduler, SchedulerStats, SchedulingAlgorithm};
