//! Candidate script validation
//!
//! A candidate script is whatever the generation service returned after
//! code extraction; nothing about it can be trusted. The validator is the
//! safety gate: default-deny, side-effect free, independent of host state.

pub mod parse;
pub mod policy;
pub mod validator;

use crate::script::parse::Statement;
use crate::script::policy::RuleId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Code returned by the generation service, before validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateScript {
    pub text: String,
}

impl CandidateScript {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// A candidate that passed validation, normalized for execution
///
/// Carries the parsed statements so the executor runs exactly what was
/// validated rather than reinterpreting text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SanitizedScript {
    pub text: String,
    pub statements: Vec<Statement>,
}

/// Verdict produced by the validator, immutable once created
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationVerdict {
    pub accepted: bool,
    /// Every violated rule, not just the first
    pub violations: BTreeSet<RuleId>,
    /// Per-violation detail lines for the user
    pub details: Vec<String>,
    /// Present only when accepted
    pub sanitized: Option<SanitizedScript>,
}

impl ValidationVerdict {
    /// One user-facing summary line per violated rule
    pub fn rejection_summary(&self) -> String {
        self.violations
            .iter()
            .map(|rule| rule.message())
            .collect::<Vec<_>>()
            .join("; ")
    }
}
