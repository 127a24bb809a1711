//! Simulator configuration.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::process::scheduler::SchedulingAlgorithm;

/// Memory pool size used when nothing else is configured (MB)
pub const DEFAULT_TOTAL_MEMORY: u64 = 4096;

/// Bounded buffer capacity used when nothing else is configured
pub const DEFAULT_BUFFER_CAPACITY: usize = 5;

/// Round-robin quantum used when nothing else is configured (cycles)
pub const DEFAULT_QUANTUM: u32 = 2;

/// Top-level configuration for a [`ProcessService`](crate::ProcessService)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Memory pool size in MB
    pub total_memory: u64,

    /// Capacity of the producer/consumer buffer
    pub buffer_capacity: usize,

    /// Initial scheduling algorithm (`fcfs`, `sjf`, `priority`, `round_robin`)
    pub algorithm: String,

    /// Quantum for round robin, clamped to at least 1
    pub quantum: u32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            total_memory: DEFAULT_TOTAL_MEMORY,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
            algorithm: "fcfs".into(),
            quantum: DEFAULT_QUANTUM,
        }
    }
}

impl SimConfig {
    /// Configuration with the given algorithm and defaults for everything else
    pub fn with_algorithm(algorithm: impl Into<String>) -> Self {
        Self {
            algorithm: algorithm.into(),
            ..Self::default()
        }
    }

    /// Check the configuration and resolve the initial algorithm
    pub fn validate(&self) -> Result<SchedulingAlgorithm, ConfigError> {
        if self.buffer_capacity == 0 {
            return Err(ConfigError::ZeroBufferCapacity);
        }
        SchedulingAlgorithm::from_name(&self.algorithm, self.quantum)
    }
}
