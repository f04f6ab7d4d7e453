//! Bounded command history
//!
//! Append-only log of past (request, script, outcome) records. The store
//! keeps the most recent N records; insertion evicts the oldest and never
//! reorders what remains. Sequence numbers are strictly increasing and
//! survive eviction, so a summary line can always be tied back to "the 3rd
//! command this session" even after older records are gone.

use crate::context::ContextSnapshot;
use crate::core::error::Result;
use crate::core::types::now_millis;
use crate::exec::mutation::MutationDescriptor;
use crate::script::ValidationVerdict;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;

/// Terminal status of one command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommandStatus {
    Succeeded,
    Rejected,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandStatus::Succeeded => "succeeded",
            CommandStatus::Rejected => "rejected",
            CommandStatus::Failed => "failed",
        }
    }
}

/// One completed interaction, owned exclusively by the history store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRecord {
    pub seq: u64,
    pub timestamp_ms: u64,
    pub user_text: String,
    /// Snapshot the generation prompt was built from (retained for replay)
    pub snapshot: ContextSnapshot,
    /// Generated script text, if generation got that far
    pub script: Option<String>,
    /// Validator verdict, if validation ran
    pub verdict: Option<ValidationVerdict>,
    pub status: CommandStatus,
    /// User-facing reason for rejected/failed commands
    pub reason: Option<String>,
    /// Mutation descriptors produced by execution
    pub mutations: Vec<MutationDescriptor>,
}

/// Everything the pipeline knows at terminal time; the store assigns the
/// sequence number and timestamp on append
#[derive(Debug, Clone)]
pub struct RecordDraft {
    pub user_text: String,
    pub snapshot: ContextSnapshot,
    pub script: Option<String>,
    pub verdict: Option<ValidationVerdict>,
    pub status: CommandStatus,
    pub reason: Option<String>,
    pub mutations: Vec<MutationDescriptor>,
}

/// Digest of a record for history listings and prompt context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandSummary {
    pub seq: u64,
    pub user_text: String,
    pub status: CommandStatus,
}

/// Append-only bounded log of command records
#[derive(Debug)]
pub struct HistoryStore {
    records: VecDeque<CommandRecord>,
    capacity: usize,
    next_seq: u64,
}

impl HistoryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(capacity.min(64)),
            capacity: capacity.max(1),
            next_seq: 1,
        }
    }

    /// Append a record, evicting the oldest when full
    pub fn append(&mut self, draft: RecordDraft) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.records.push_back(CommandRecord {
            seq,
            timestamp_ms: now_millis(),
            user_text: draft.user_text,
            snapshot: draft.snapshot,
            script: draft.script,
            verdict: draft.verdict,
            status: draft.status,
            reason: draft.reason,
            mutations: draft.mutations,
        });
        while self.records.len() > self.capacity {
            self.records.pop_front();
        }
        seq
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in sequence order, oldest first
    pub fn records(&self) -> impl Iterator<Item = &CommandRecord> {
        self.records.iter()
    }

    /// Summaries in sequence order, oldest first
    pub fn summaries(&self) -> Vec<CommandSummary> {
        self.records
            .iter()
            .map(|r| CommandSummary {
                seq: r.seq,
                user_text: r.user_text.clone(),
                status: r.status,
            })
            .collect()
    }

    /// The k most recent summaries, oldest of them first
    pub fn recent_summaries(&self, k: usize) -> Vec<CommandSummary> {
        let skip = self.records.len().saturating_sub(k);
        self.records
            .iter()
            .skip(skip)
            .map(|r| CommandSummary {
                seq: r.seq,
                user_text: r.user_text.clone(),
                status: r.status,
            })
            .collect()
    }

    /// Persist all retained records as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let records: Vec<&CommandRecord> = self.records.iter().collect();
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Load persisted records, keeping only the most recent `capacity`
    ///
    /// Older entries are silently dropped. The next sequence number resumes
    /// past the highest loaded one.
    pub fn load(path: impl AsRef<Path>, capacity: usize) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut records: Vec<CommandRecord> = serde_json::from_str(&text)?;
        records.sort_by_key(|r| r.seq);
        let capacity = capacity.max(1);
        let skip = records.len().saturating_sub(capacity);
        let retained: VecDeque<CommandRecord> = records.into_iter().skip(skip).collect();
        let next_seq = retained.iter().map(|r| r.seq).max().unwrap_or(0) + 1;
        Ok(Self {
            records: retained,
            capacity,
            next_seq,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(text: &str, status: CommandStatus) -> RecordDraft {
        RecordDraft {
            user_text: text.into(),
            snapshot: ContextSnapshot::no_document(),
            script: None,
            verdict: None,
            status,
            reason: None,
            mutations: Vec::new(),
        }
    }

    #[test]
    fn test_sequence_numbers_strictly_increase() {
        let mut store = HistoryStore::new(5);
        let a = store.append(draft("one", CommandStatus::Succeeded));
        let b = store.append(draft("two", CommandStatus::Failed));
        assert!(b > a);
    }

    #[test]
    fn test_eviction_keeps_most_recent_in_order() {
        let mut store = HistoryStore::new(3);
        for i in 0..8 {
            store.append(draft(&format!("cmd {}", i), CommandStatus::Succeeded));
        }
        assert_eq!(store.len(), 3);
        let seqs: Vec<u64> = store.records().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![6, 7, 8]);
    }

    #[test]
    fn test_recent_summaries_are_oldest_first() {
        let mut store = HistoryStore::new(10);
        for i in 0..5 {
            store.append(draft(&format!("cmd {}", i), CommandStatus::Succeeded));
        }
        let recent = store.recent_summaries(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].user_text, "cmd 2");
        assert_eq!(recent[2].user_text, "cmd 4");
    }

    #[test]
    fn test_save_and_load_truncates_to_capacity() {
        let mut store = HistoryStore::new(10);
        for i in 0..6 {
            store.append(draft(&format!("cmd {}", i), CommandStatus::Succeeded));
        }
        let path = std::env::temp_dir().join("canvas_pilot_history_test.json");
        store.save(&path).unwrap();

        let loaded = HistoryStore::load(&path, 4).unwrap();
        assert_eq!(loaded.len(), 4);
        let seqs: Vec<u64> = loaded.records().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![3, 4, 5, 6]);

        let mut loaded = loaded;
        let next = loaded.append(draft("after reload", CommandStatus::Failed));
        assert_eq!(next, 7);
        std::fs::remove_file(&path).ok();
    }
}
