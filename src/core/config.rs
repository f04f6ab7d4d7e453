//! Pipeline configuration with documented constants
//!
//! All tunable values are collected here with explanations of their purpose
//! and how they interact with each other. Credentials are NOT part of this
//! struct; they are passed explicitly to the generation client so the
//! pipeline stays testable with a fake client.

use crate::core::error::{PilotError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Configuration for the command execution pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // === HISTORY ===
    /// Maximum number of command records retained by the history store
    ///
    /// Insertion evicts the oldest record when full. Persisted history is
    /// truncated to this bound on reload.
    pub history_capacity: usize,

    /// Number of recent history records embedded into a generation prompt
    ///
    /// Only the user text and outcome are embedded (never full scripts),
    /// keeping request size bounded while still giving the generator
    /// conversational context.
    pub prompt_history_depth: usize,

    // === GENERATION ===
    /// Per-call timeout for the generation service (milliseconds)
    ///
    /// Derived from the 3-second end-to-end response budget minus local
    /// processing overhead.
    pub generation_timeout_ms: u64,

    /// Transport-level retries inside the generation client
    ///
    /// Applies only to transient transport failures (connect errors, 5xx).
    /// Auth and quota errors are never retried at this level.
    pub transport_retries: u32,

    /// Initial backoff between transport retries (milliseconds)
    ///
    /// Doubles on each subsequent attempt.
    pub retry_backoff_ms: u64,

    /// Orchestrator-level retries for Timeout and RateLimited errors
    ///
    /// Each retry re-runs the whole generation call; all other error kinds
    /// surface immediately.
    pub orchestrator_retries: u32,

    /// Sampling temperature sent to the generation service
    ///
    /// Kept low: code generation should be near-deterministic.
    pub temperature: f32,

    /// Maximum tokens requested from the generation service
    pub max_tokens: u32,

    // === QUEUEING ===
    /// Bound on pending requests per document
    ///
    /// A request arriving while the queue is full is rejected immediately
    /// with QueueOverflow rather than queued indefinitely.
    pub queue_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            history_capacity: 10,
            prompt_history_depth: 3,
            generation_timeout_ms: 2500,
            transport_retries: 2,
            retry_backoff_ms: 300,
            orchestrator_retries: 2,
            temperature: 0.1,
            max_tokens: 1500,
            queue_capacity: 4,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(PilotError::Config(
                "history_capacity must be at least 1".into(),
            ));
        }
        if self.prompt_history_depth > self.history_capacity {
            return Err(PilotError::Config(format!(
                "prompt_history_depth ({}) should be <= history_capacity ({})",
                self.prompt_history_depth, self.history_capacity
            )));
        }
        if self.generation_timeout_ms == 0 {
            return Err(PilotError::Config(
                "generation_timeout_ms must be positive".into(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(PilotError::Config(
                "queue_capacity must be at least 1".into(),
            ));
        }
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(PilotError::Config(format!(
                "temperature ({}) must be within 0.0..=1.0",
                self.temperature
            )));
        }
        Ok(())
    }
}
