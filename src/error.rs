//! Error types for the simulator.
//!
//! Rejections (`ProcessError`, `IpcError`) are ordinary outcomes of the
//! simulated system and never leave state half-modified. `ConfigError` is a
//! caller programming error and is kept as a separate type.

use thiserror::Error;

use crate::process::pcb::{ProcessId, ProcessState};

/// Process management errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ProcessError {
    #[error("process {0} not found")]
    ProcessNotFound(ProcessId),

    #[error("insufficient memory: requested {requested} MB, available {available} MB")]
    InsufficientMemory { requested: u64, available: u64 },

    #[error("process {pid} cannot go from {from} to {to}")]
    InvalidTransition {
        pid: ProcessId,
        from: ProcessState,
        to: ProcessState,
    },

    #[error("process {0} is already terminated")]
    AlreadyTerminated(ProcessId),

    #[error("invalid parameter: {0} must be at least 1")]
    InvalidParameter(&'static str),
}

/// Service-level IPC errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum IpcError {
    #[error("no process is registered as producer")]
    NoProducer,

    #[error("no process is registered as consumer")]
    NoConsumer,

    #[error("process {0} is not available")]
    ProcessUnavailable(ProcessId),
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("unknown scheduling algorithm: {0:?} (expected fcfs, sjf, priority or round_robin)")]
    UnknownAlgorithm(String),

    #[error("bounded buffer capacity must be at least 1")]
    ZeroBufferCapacity,
}
