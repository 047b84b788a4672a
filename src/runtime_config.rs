//! Environment-based runtime tuning.
//!
//! File configuration ([`crate::config::PipelineConfig`]) describes *what*
//! the pipeline does; the variables here tune *how* it runs and are the kind
//! of thing operators override per deployment without touching config files.
//!
//! - `GANTRY_WORKERS` — worker threads in the request pool (default: 4)
//! - `GANTRY_QUEUE_BOUND` — pending-request queue depth (default: 1024)
//! - `GANTRY_BACKPRESSURE_MODE` — `block` or `shed` (default: `block`)

use std::env;

use crate::worker_pool::BackpressureMode;

/// Runtime configuration loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Number of worker threads draining the request queue
    pub workers: usize,
    /// Maximum queued requests before backpressure applies
    pub queue_bound: usize,
    /// What to do with requests that arrive while the queue is full
    pub backpressure_mode: BackpressureMode,
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let workers = env::var("GANTRY_WORKERS")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(4);

        let queue_bound = env::var("GANTRY_QUEUE_BOUND")
            .ok()
            .and_then(|s| s.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(1024);

        let backpressure_mode = env::var("GANTRY_BACKPRESSURE_MODE")
            .ok()
            .and_then(|s| BackpressureMode::from_str(&s))
            .unwrap_or_default();

        RuntimeConfig {
            workers,
            queue_bound,
            backpressure_mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_and_overrides() {
        env::remove_var("GANTRY_WORKERS");
        env::remove_var("GANTRY_QUEUE_BOUND");
        env::remove_var("GANTRY_BACKPRESSURE_MODE");
        let config = RuntimeConfig::from_env();
        assert_eq!(config.workers, 4);
        assert_eq!(config.queue_bound, 1024);
        assert_eq!(config.backpressure_mode, BackpressureMode::Block);

        env::set_var("GANTRY_WORKERS", "8");
        env::set_var("GANTRY_QUEUE_BOUND", "64");
        env::set_var("GANTRY_BACKPRESSURE_MODE", "shed");
        let config = RuntimeConfig::from_env();
        assert_eq!(config.workers, 8);
        assert_eq!(config.queue_bound, 64);
        assert_eq!(config.backpressure_mode, BackpressureMode::Shed);

        // Nonsense values fall back to defaults.
        env::set_var("GANTRY_WORKERS", "0");
        env::set_var("GANTRY_BACKPRESSURE_MODE", "bogus");
        let config = RuntimeConfig::from_env();
        assert_eq!(config.workers, 4);
        assert_eq!(config.backpressure_mode, BackpressureMode::Block);

        env::remove_var("GANTRY_WORKERS");
        env::remove_var("GANTRY_QUEUE_BOUND");
        env::remove_var("GANTRY_BACKPRESSURE_MODE");
    }
}
