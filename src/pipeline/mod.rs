//! Command pipeline orchestration
//!
//! Sequences one request through capture → compose → generate → validate →
//! execute, reports the outcome, and appends exactly one history record per
//! terminal state. One pipeline instance serves one open document; requests
//! are queued FIFO and processed by a single worker task, so two scripts
//! never mutate the same document concurrently. Requests against distinct
//! documents run in independent instances.

use crate::context::ContextSnapshot;
use crate::core::config::PipelineConfig;
use crate::core::error::{PilotError, Result};
use crate::exec::{ExecStatus, ScopedExecutor};
use crate::history::{CommandStatus, CommandSummary, HistoryStore, RecordDraft};
use crate::host::HostAdapter;
use crate::llm::client::ScriptGenerator;
use crate::llm::prompt;
use crate::script::policy::{Policy, RuleId};
use crate::script::validator::validate;
use crate::script::ValidationVerdict;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};

/// Observable pipeline state, published on every transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    ContextCaptured,
    Generating,
    Validating,
    Executing,
    Completed,
    Rejected,
    Failed,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::ContextCaptured => "context captured",
            PipelineState::Generating => "generating",
            PipelineState::Validating => "validating",
            PipelineState::Executing => "executing",
            PipelineState::Completed => "completed",
            PipelineState::Rejected => "rejected",
            PipelineState::Failed => "failed",
        }
    }
}

/// Final result of one submitted command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Succeeded {
        seq: u64,
        script: String,
        /// Human-readable mutation descriptions, in application order
        mutations: Vec<String>,
    },
    Rejected {
        seq: u64,
        violations: BTreeSet<RuleId>,
        details: Vec<String>,
    },
    Failed {
        seq: u64,
        reason: String,
    },
}

impl CommandOutcome {
    pub fn seq(&self) -> u64 {
        match self {
            CommandOutcome::Succeeded { seq, .. }
            | CommandOutcome::Rejected { seq, .. }
            | CommandOutcome::Failed { seq, .. } => *seq,
        }
    }
}

struct Job {
    user_text: String,
    reply: oneshot::Sender<CommandOutcome>,
}

/// The command execution pipeline for one open document
pub struct CommandPipeline {
    jobs: mpsc::Sender<Job>,
    state_rx: watch::Receiver<PipelineState>,
    cancel_tx: watch::Sender<u64>,
    history: Arc<Mutex<HistoryStore>>,
}

impl CommandPipeline {
    /// Build a pipeline and spawn its worker task
    ///
    /// Must be called within a tokio runtime.
    pub fn new(
        generator: Arc<dyn ScriptGenerator>,
        host: Arc<Mutex<dyn HostAdapter>>,
        policy: Arc<Policy>,
        config: PipelineConfig,
    ) -> Self {
        let history = HistoryStore::new(config.history_capacity);
        Self::with_history(generator, host, policy, config, history)
    }

    /// Build a pipeline around a pre-loaded (persisted) history store
    pub fn with_history(
        generator: Arc<dyn ScriptGenerator>,
        host: Arc<Mutex<dyn HostAdapter>>,
        policy: Arc<Policy>,
        config: PipelineConfig,
        history: HistoryStore,
    ) -> Self {
        let (jobs_tx, jobs_rx) = mpsc::channel(config.queue_capacity);
        let (state_tx, state_rx) = watch::channel(PipelineState::Idle);
        let (cancel_tx, cancel_rx) = watch::channel(0u64);
        let history = Arc::new(Mutex::new(history));

        let worker = Worker {
            generator,
            host,
            policy,
            config,
            history: Arc::clone(&history),
            state_tx,
            cancel_rx,
        };
        tokio::spawn(worker.run(jobs_rx));

        Self {
            jobs: jobs_tx,
            state_rx,
            cancel_tx,
            history,
        }
    }

    /// Submit a command; resolves asynchronously with the outcome
    ///
    /// Rejected immediately with QueueOverflow when the per-document queue
    /// is full.
    pub fn submit(&self, user_text: impl Into<String>) -> Result<oneshot::Receiver<CommandOutcome>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job = Job {
            user_text: user_text.into(),
            reply: reply_tx,
        };
        self.jobs.try_send(job).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => PilotError::QueueOverflow,
            mpsc::error::TrySendError::Closed(_) => PilotError::PipelineClosed,
        })?;
        Ok(reply_rx)
    }

    /// Request cancellation of the in-flight command
    ///
    /// Honored only while generating; once execution has begun the script
    /// runs to completion or rollback.
    pub fn cancel(&self) {
        self.cancel_tx.send_modify(|n| *n += 1);
    }

    /// Subscribe to state-machine transitions
    pub fn subscribe(&self) -> watch::Receiver<PipelineState> {
        self.state_rx.clone()
    }

    /// Ordered history summaries, oldest first
    pub fn history(&self) -> Vec<CommandSummary> {
        lock(&self.history).summaries()
    }

    /// Persist the history store
    pub fn save_history(&self, path: impl AsRef<Path>) -> Result<()> {
        lock(&self.history).save(path)
    }
}

fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Worker {
    generator: Arc<dyn ScriptGenerator>,
    host: Arc<Mutex<dyn HostAdapter>>,
    policy: Arc<Policy>,
    config: PipelineConfig,
    history: Arc<Mutex<HistoryStore>>,
    state_tx: watch::Sender<PipelineState>,
    cancel_rx: watch::Receiver<u64>,
}

impl Worker {
    async fn run(mut self, mut jobs: mpsc::Receiver<Job>) {
        while let Some(job) = jobs.recv().await {
            tracing::info!(command = %job.user_text, "processing command");
            let outcome = self.run_request(&job.user_text).await;
            let _ = self.state_tx.send(PipelineState::Idle);
            // The submitter may have gone away; the history record stands
            // either way.
            let _ = job.reply.send(outcome);
        }
    }

    async fn run_request(&mut self, user_text: &str) -> CommandOutcome {
        let snapshot = ContextSnapshot::capture(&*lock(&self.host));
        let _ = self.state_tx.send(PipelineState::ContextCaptured);

        let recent = lock(&self.history).recent_summaries(self.config.prompt_history_depth);
        let request = prompt::compose(user_text, &snapshot, &recent, &self.policy);

        let _ = self.state_tx.send(PipelineState::Generating);
        let candidate = match self.generate_with_retry(&request).await {
            Ok(candidate) => candidate,
            Err(reason) => {
                return self.finish_failed(user_text, snapshot, None, None, Vec::new(), reason)
            }
        };

        let _ = self.state_tx.send(PipelineState::Validating);
        let verdict = validate(&candidate, &self.policy);
        if !verdict.accepted {
            return self.finish_rejected(user_text, snapshot, candidate.text, verdict);
        }
        // Accepted verdicts always carry the sanitized script
        let Some(sanitized) = verdict.sanitized.clone() else {
            return self.finish_failed(
                user_text,
                snapshot,
                Some(candidate.text),
                Some(verdict),
                Vec::new(),
                "validation produced no sanitized script".into(),
            );
        };

        let _ = self.state_tx.send(PipelineState::Executing);
        let outcome = ScopedExecutor::execute(&sanitized, &mut *lock(&self.host));

        match outcome.status {
            ExecStatus::Succeeded => {
                let _ = self.state_tx.send(PipelineState::Completed);
                let mutations: Vec<String> =
                    outcome.mutations.iter().map(|m| m.describe()).collect();
                let seq = lock(&self.history).append(RecordDraft {
                    user_text: user_text.into(),
                    snapshot,
                    script: Some(candidate.text),
                    verdict: Some(verdict),
                    status: CommandStatus::Succeeded,
                    reason: None,
                    mutations: outcome.mutations,
                });
                tracing::info!(seq, applied = mutations.len(), "command succeeded");
                CommandOutcome::Succeeded {
                    seq,
                    script: sanitized.text,
                    mutations,
                }
            }
            ExecStatus::RolledBack | ExecStatus::Failed => {
                let reason = outcome
                    .error
                    .unwrap_or_else(|| "execution failed".into());
                // All mutations were reversed; the user-visible truth is
                // "command failed, no changes were made".
                self.finish_failed(
                    user_text,
                    snapshot,
                    Some(candidate.text),
                    Some(verdict),
                    outcome.mutations,
                    format!("command failed, no changes were made ({})", reason),
                )
            }
        }
    }

    /// Run the generation call, retrying Timeout/RateLimited up to the
    /// configured limit; cancellation is honored only here
    async fn generate_with_retry(
        &mut self,
        request: &prompt::GenerationRequest,
    ) -> std::result::Result<crate::script::CandidateScript, String> {
        let mut cancel_rx = self.cancel_rx.clone();
        // A cancel requested before this request started does not apply
        cancel_rx.borrow_and_update();

        let mut attempt: u32 = 0;
        loop {
            tokio::select! {
                result = self.generator.generate(request) => match result {
                    Ok(candidate) => return Ok(candidate),
                    Err(e) if e.is_retryable() && attempt < self.config.orchestrator_retries => {
                        attempt += 1;
                        tracing::info!(error = %e, attempt, "generation failed, retrying");
                        // Re-publish Generating as the backoff notice
                        let _ = self.state_tx.send(PipelineState::Generating);
                        let backoff =
                            Duration::from_millis(self.config.retry_backoff_ms << (attempt - 1));
                        tokio::select! {
                            _ = tokio::time::sleep(backoff) => {}
                            _ = cancel_rx.changed() => {
                                return Err("command cancelled".into());
                            }
                        }
                    }
                    Err(e) => return Err(e.to_string()),
                },
                _ = cancel_rx.changed() => {
                    tracing::info!("generation cancelled by user");
                    return Err("command cancelled".into());
                }
            }
        }
    }

    fn finish_rejected(
        &self,
        user_text: &str,
        snapshot: ContextSnapshot,
        script: String,
        verdict: ValidationVerdict,
    ) -> CommandOutcome {
        let _ = self.state_tx.send(PipelineState::Rejected);
        let violations = verdict.violations.clone();
        let details = verdict.details.clone();
        let reason = verdict.rejection_summary();
        let seq = lock(&self.history).append(RecordDraft {
            user_text: user_text.into(),
            snapshot,
            script: Some(script),
            verdict: Some(verdict),
            status: CommandStatus::Rejected,
            reason: Some(reason),
            mutations: Vec::new(),
        });
        tracing::warn!(seq, ?violations, "script rejected");
        CommandOutcome::Rejected {
            seq,
            violations,
            details,
        }
    }

    fn finish_failed(
        &self,
        user_text: &str,
        snapshot: ContextSnapshot,
        script: Option<String>,
        verdict: Option<ValidationVerdict>,
        mutations: Vec<crate::exec::mutation::MutationDescriptor>,
        reason: String,
    ) -> CommandOutcome {
        let _ = self.state_tx.send(PipelineState::Failed);
        let seq = lock(&self.history).append(RecordDraft {
            user_text: user_text.into(),
            snapshot,
            script,
            verdict,
            status: CommandStatus::Failed,
            reason: Some(reason.clone()),
            mutations,
        });
        tracing::warn!(seq, %reason, "command failed");
        CommandOutcome::Failed { seq, reason }
    }
}
