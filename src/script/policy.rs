//! Static validation policy
//!
//! An explicit, versioned ruleset: lexical denylist grouped by escape
//! category, reference allowlist for the sanctioned API surface, and size
//! bounds. Loaded once at startup and read-only thereafter; changing the
//! policy means re-initializing the pipeline, never mutating it mid-flight.

use crate::core::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

/// Identifier for one validation rule
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum RuleId {
    EmptyScript,
    OversizedScript,
    ExcessiveNesting,
    ModuleImport,
    DynamicEvaluation,
    FilesystemAccess,
    NetworkAccess,
    ProcessInvocation,
    ReflectionAccess,
    UnknownRoot,
    UnknownMethod,
    CallableDefinition,
    MalformedStatement,
}

impl RuleId {
    /// Stable user-facing message for this rule
    pub fn message(&self) -> &'static str {
        match self {
            RuleId::EmptyScript => "the generated script was empty",
            RuleId::OversizedScript => "the generated script exceeds the size bound",
            RuleId::ExcessiveNesting => "the generated script is nested too deeply",
            RuleId::ModuleImport => "module imports are not permitted",
            RuleId::DynamicEvaluation => "dynamic code evaluation is not permitted",
            RuleId::FilesystemAccess => "filesystem access is not permitted",
            RuleId::NetworkAccess => "network access is not permitted",
            RuleId::ProcessInvocation => "process or system invocation is not permitted",
            RuleId::ReflectionAccess => "reflection into host internals is not permitted",
            RuleId::UnknownRoot => "the script references an unrecognized API root",
            RuleId::UnknownMethod => "the script calls a method outside the sanctioned surface",
            RuleId::CallableDefinition => {
                "defining functions or classes is not permitted in automation scripts"
            }
            RuleId::MalformedStatement => "the script contains lines that are not call statements",
        }
    }
}

impl fmt::Display for RuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message())
    }
}

/// Lexical denylist, grouped by the escape category each token enables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeniedTokens {
    pub module_import: Vec<String>,
    pub dynamic_evaluation: Vec<String>,
    pub filesystem_access: Vec<String>,
    pub network_access: Vec<String>,
    pub process_invocation: Vec<String>,
    pub reflection_access: Vec<String>,
    pub callable_definition: Vec<String>,
}

impl Default for DeniedTokens {
    fn default() -> Self {
        let list = |items: &[&str]| items.iter().map(|s| s.to_string()).collect();
        Self {
            module_import: list(&["import", "__import__", "from", "require", "include"]),
            dynamic_evaluation: list(&["eval", "exec", "execfile", "compile"]),
            filesystem_access: list(&[
                "open", "file", "os", "io", "fs", "pathlib", "shutil", "unlink", "rmdir",
                "mkdir",
            ]),
            network_access: list(&[
                "socket", "urllib", "requests", "http", "https", "fetch", "net", "curl",
                "wget",
            ]),
            process_invocation: list(&[
                "subprocess", "system", "popen", "spawn", "process", "shell", "kill",
            ]),
            reflection_access: list(&[
                "getattr", "setattr", "delattr", "globals", "locals", "vars", "builtins",
                "inspect", "reflect",
            ]),
            callable_definition: list(&["def", "lambda", "class", "function", "fn", "func"]),
        }
    }
}

impl DeniedTokens {
    /// Iterate (category rule, tokens) pairs
    pub fn categories(&self) -> impl Iterator<Item = (RuleId, &[String])> {
        [
            (RuleId::ModuleImport, self.module_import.as_slice()),
            (RuleId::DynamicEvaluation, self.dynamic_evaluation.as_slice()),
            (RuleId::FilesystemAccess, self.filesystem_access.as_slice()),
            (RuleId::NetworkAccess, self.network_access.as_slice()),
            (RuleId::ProcessInvocation, self.process_invocation.as_slice()),
            (RuleId::ReflectionAccess, self.reflection_access.as_slice()),
            (RuleId::CallableDefinition, self.callable_definition.as_slice()),
        ]
        .into_iter()
    }
}

/// The static ruleset governing validation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Bumped whenever the ruleset changes shape
    pub version: u32,
    /// Upper bound on candidate script size in bytes
    ///
    /// Calibration, not correctness: legitimate scripts in the dialect run
    /// well under a kilobyte, so an oversized candidate is a generation
    /// anomaly rather than a complex command.
    pub max_script_bytes: usize,
    /// Upper bound on statement count
    pub max_statements: usize,
    /// Upper bound on bracket nesting depth (the dialect itself needs 1)
    pub max_nesting_depth: usize,
    pub denied: DeniedTokens,
    /// Permitted API roots and, per root, permitted methods
    pub allowed_roots: BTreeMap<String, BTreeSet<String>>,
}

impl Default for Policy {
    fn default() -> Self {
        let mut allowed_roots = BTreeMap::new();
        let doc: BTreeSet<String> = [
            "createLayer",
            "removeLayer",
            "renameLayer",
            "setOpacity",
            "setVisible",
            "moveLayer",
            "rotateLayer",
            "setActiveLayer",
            "refresh",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let selection: BTreeSet<String> =
            ["select", "clear"].iter().map(|s| s.to_string()).collect();
        allowed_roots.insert("doc".to_string(), doc);
        allowed_roots.insert("selection".to_string(), selection);

        Self {
            version: 1,
            max_script_bytes: 4096,
            max_statements: 64,
            max_nesting_depth: 4,
            denied: DeniedTokens::default(),
            allowed_roots,
        }
    }
}

impl Policy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a policy from a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let policy: Self = toml::from_str(&text)?;
        Ok(policy)
    }

    /// Whether a root name is on the allowlist
    pub fn permits_root(&self, root: &str) -> bool {
        self.allowed_roots.contains_key(root)
    }

    /// Whether a root.method pair is on the allowlist
    pub fn permits(&self, root: &str, method: &str) -> bool {
        self.allowed_roots
            .get(root)
            .map(|methods| methods.contains(method))
            .unwrap_or(false)
    }

    /// The permitted surface as prompt-ready `root.method` names
    pub fn permitted_calls(&self) -> Vec<String> {
        self.allowed_roots
            .iter()
            .flat_map(|(root, methods)| {
                methods.iter().map(move |m| format!("{}.{}", root, m))
            })
            .collect()
    }
}
