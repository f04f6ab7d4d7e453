//! Scoped script execution with rollback
//!
//! The executor dispatches sanitized statements through its own table of
//! sanctioned operations. It does not trust the validator: a statement
//! outside the table is refused at runtime even though validation should
//! have caught it. Before each mutation it captures a reversal token; on
//! any host fault every applied mutation is reversed in strict reverse
//! order, so a failed command leaves the document exactly as it was.

pub mod mutation;

use crate::core::types::{Bounds, LayerKind};
use crate::exec::mutation::MutationDescriptor;
use crate::host::HostAdapter;
use crate::script::parse::{Literal, Statement};
use crate::script::SanitizedScript;
use serde::{Deserialize, Serialize};

/// Final status of one script execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecStatus {
    /// All statements applied; projection refreshed once
    Succeeded,
    /// A fault occurred after one or more mutations; all were reversed
    RolledBack,
    /// A fault occurred before any mutation was applied
    Failed,
}

/// Outcome of one script execution, immutable once returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub status: ExecStatus,
    /// Sanitized, categorized cause; never an internal stack trace
    pub error: Option<String>,
    /// Mutations applied during the run (reversed again if rolled back)
    pub mutations: Vec<MutationDescriptor>,
}

impl ExecutionOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ExecStatus::Succeeded
    }
}

pub struct ScopedExecutor;

impl ScopedExecutor {
    /// Run a sanitized script against the host, atomically
    ///
    /// Never retries: partial automation side effects are not safely
    /// re-playable, so retry is an orchestrator-level decision that re-runs
    /// the whole pipeline from generation.
    pub fn execute(script: &SanitizedScript, host: &mut dyn HostAdapter) -> ExecutionOutcome {
        let mut applied: Vec<MutationDescriptor> = Vec::new();

        for stmt in &script.statements {
            match apply(stmt, host) {
                Ok(Some(m)) => {
                    tracing::debug!(line = stmt.line, mutation = %m.describe(), "applied");
                    applied.push(m);
                }
                Ok(None) => {}
                Err(message) => {
                    let error = format!("line {}: {}", stmt.line, message);
                    tracing::warn!(%error, applied = applied.len(), "execution fault, rolling back");
                    return rollback(host, applied, error);
                }
            }
        }

        if let Err(fault) = host.refresh_projection() {
            let error = format!("projection refresh failed: {}", fault);
            return rollback(host, applied, error);
        }

        ExecutionOutcome {
            status: ExecStatus::Succeeded,
            error: None,
            mutations: applied,
        }
    }
}

/// Reverse every applied mutation in strict reverse order, then refresh
fn rollback(
    host: &mut dyn HostAdapter,
    applied: Vec<MutationDescriptor>,
    error: String,
) -> ExecutionOutcome {
    let had_mutations = !applied.is_empty();
    for m in applied.iter().rev() {
        if let Err(fault) = m.revert(host) {
            // A failed revert violates the no-changes invariant; it cannot
            // happen through this executor's own descriptors, but log it
            // loudly rather than silently skipping.
            tracing::error!(mutation = %m.describe(), %fault, "rollback step failed");
        }
    }
    if had_mutations {
        let _ = host.refresh_projection();
    }
    ExecutionOutcome {
        status: if had_mutations {
            ExecStatus::RolledBack
        } else {
            ExecStatus::Failed
        },
        error: Some(error),
        mutations: applied,
    }
}

/// Apply one statement through the sanctioned dispatch table
///
/// Returns the mutation descriptor, or None for non-mutating statements
/// (`doc.refresh()` is coalesced into the single end-of-script refresh).
fn apply(
    stmt: &Statement,
    host: &mut dyn HostAdapter,
) -> Result<Option<MutationDescriptor>, String> {
    match (stmt.root.as_str(), stmt.method.as_str()) {
        ("doc", "createLayer") => {
            arity(stmt, 2)?;
            let name = str_arg(stmt, 0)?;
            let kind_text = str_arg(stmt, 1)?;
            let kind = LayerKind::parse(&kind_text).ok_or_else(|| {
                format!(
                    "'{}' is not a layer kind (expected paint, group, fill or vector)",
                    kind_text
                )
            })?;
            let id = host.create_layer(&name, kind).map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::LayerCreated { id, name }))
        }
        ("doc", "removeLayer") => {
            arity(stmt, 1)?;
            let name = str_arg(stmt, 0)?;
            let node = host.remove_layer(&name).map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::LayerRemoved { node }))
        }
        ("doc", "renameLayer") => {
            arity(stmt, 2)?;
            let from = str_arg(stmt, 0)?;
            let to = str_arg(stmt, 1)?;
            host.rename_layer(&from, &to).map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::LayerRenamed { from, to }))
        }
        ("doc", "setOpacity") => {
            arity(stmt, 2)?;
            let name = str_arg(stmt, 0)?;
            let value = int_arg(stmt, 1)?;
            let opacity = u8::try_from(value)
                .map_err(|_| format!("opacity {} is out of range (0-255)", value))?;
            let prior = host.opacity(&name).map_err(|f| f.to_string())?;
            host.set_opacity(&name, opacity).map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::OpacityChanged { name, prior }))
        }
        ("doc", "setVisible") => {
            arity(stmt, 2)?;
            let name = str_arg(stmt, 0)?;
            let visible = bool_arg(stmt, 1)?;
            let prior = host.visible(&name).map_err(|f| f.to_string())?;
            host.set_visible(&name, visible).map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::VisibilityChanged { name, prior }))
        }
        ("doc", "moveLayer") => {
            arity(stmt, 3)?;
            let name = str_arg(stmt, 0)?;
            let dx = int_arg(stmt, 1)?;
            let dy = int_arg(stmt, 2)?;
            let (prior_x, prior_y) = host.position(&name).map_err(|f| f.to_string())?;
            let x = prior_x.saturating_add(clamp_i32(dx)?);
            let y = prior_y.saturating_add(clamp_i32(dy)?);
            host.set_position(&name, x, y).map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::LayerMoved {
                name,
                prior_x,
                prior_y,
            }))
        }
        ("doc", "rotateLayer") => {
            arity(stmt, 2)?;
            let name = str_arg(stmt, 0)?;
            let radians = float_arg(stmt, 1)?;
            let prior = host.rotation(&name).map_err(|f| f.to_string())?;
            host.set_rotation(&name, prior + radians)
                .map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::LayerRotated { name, prior }))
        }
        ("doc", "setActiveLayer") => {
            arity(stmt, 1)?;
            let name = str_arg(stmt, 0)?;
            let prior = host.active_layer().map_err(|f| f.to_string())?;
            host.set_active_layer(Some(&name))
                .map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::ActiveLayerChanged { prior }))
        }
        ("doc", "refresh") => {
            arity(stmt, 0)?;
            Ok(None)
        }
        ("selection", "select") => {
            arity(stmt, 4)?;
            let x = clamp_i32(int_arg(stmt, 0)?)?;
            let y = clamp_i32(int_arg(stmt, 1)?)?;
            let width = clamp_i32(int_arg(stmt, 2)?)?;
            let height = clamp_i32(int_arg(stmt, 3)?)?;
            let prior = host.selection().map_err(|f| f.to_string())?;
            host.set_selection(Some(Bounds::new(x, y, width, height)))
                .map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::SelectionChanged { prior }))
        }
        ("selection", "clear") => {
            arity(stmt, 0)?;
            let prior = host.selection().map_err(|f| f.to_string())?;
            host.set_selection(None).map_err(|f| f.to_string())?;
            Ok(Some(MutationDescriptor::SelectionChanged { prior }))
        }
        (root, method) => Err(format!(
            "'{}.{}' is not part of the sanctioned execution surface",
            root, method
        )),
    }
}

fn arity(stmt: &Statement, expected: usize) -> Result<(), String> {
    if stmt.args.len() == expected {
        Ok(())
    } else {
        Err(format!(
            "{}.{} expects {} argument(s), got {}",
            stmt.root,
            stmt.method,
            expected,
            stmt.args.len()
        ))
    }
}

fn str_arg(stmt: &Statement, index: usize) -> Result<String, String> {
    match &stmt.args[index] {
        Literal::Str(s) => Ok(s.clone()),
        other => Err(format!(
            "argument {} of {}.{} must be a string, got {}",
            index + 1,
            stmt.root,
            stmt.method,
            other
        )),
    }
}

fn int_arg(stmt: &Statement, index: usize) -> Result<i64, String> {
    match &stmt.args[index] {
        Literal::Int(i) => Ok(*i),
        other => Err(format!(
            "argument {} of {}.{} must be an integer, got {}",
            index + 1,
            stmt.root,
            stmt.method,
            other
        )),
    }
}

fn float_arg(stmt: &Statement, index: usize) -> Result<f64, String> {
    match &stmt.args[index] {
        Literal::Float(x) => Ok(*x),
        Literal::Int(i) => Ok(*i as f64),
        other => Err(format!(
            "argument {} of {}.{} must be a number, got {}",
            index + 1,
            stmt.root,
            stmt.method,
            other
        )),
    }
}

fn bool_arg(stmt: &Statement, index: usize) -> Result<bool, String> {
    match &stmt.args[index] {
        Literal::Bool(b) => Ok(*b),
        other => Err(format!(
            "argument {} of {}.{} must be a boolean, got {}",
            index + 1,
            stmt.root,
            stmt.method,
            other
        )),
    }
}

fn clamp_i32(value: i64) -> Result<i32, String> {
    i32::try_from(value).map_err(|_| format!("value {} is out of range", value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::LayerKind;
    use crate::host::document::MemoryHost;
    use crate::script::policy::Policy;
    use crate::script::validator::validate;
    use crate::script::CandidateScript;

    fn sanitized(text: &str) -> SanitizedScript {
        let verdict = validate(&CandidateScript::new(text), &Policy::default());
        verdict.sanitized.expect("script should validate in tests")
    }

    #[test]
    fn test_successful_script_refreshes_once() {
        let mut host = MemoryHost::with_document("d", 800, 600);
        let script = sanitized(
            "doc.createLayer(\"Background\", \"paint\")\ndoc.refresh()\ndoc.refresh()",
        );
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert_eq!(outcome.status, ExecStatus::Succeeded);
        assert_eq!(outcome.mutations.len(), 1);
        assert_eq!(host.refresh_count(), 1);
        assert_eq!(host.layers().unwrap()[0].name, "Background");
    }

    #[test]
    fn test_fault_mid_script_rolls_back_in_reverse() {
        let mut host = MemoryHost::with_document("d", 800, 600);
        let digest_before = host.digest();

        // Third statement faults: no layer named "Missing"
        let script = sanitized(
            "doc.createLayer(\"A\", \"paint\")\ndoc.createLayer(\"B\", \"paint\")\ndoc.setOpacity(\"Missing\", 128)",
        );
        let outcome = ScopedExecutor::execute(&script, &mut host);

        assert_eq!(outcome.status, ExecStatus::RolledBack);
        assert_eq!(outcome.mutations.len(), 2);
        assert!(outcome.error.as_deref().unwrap().contains("Missing"));
        assert_eq!(host.digest(), digest_before);
        // Rollback still refreshes the projection
        assert_eq!(host.refresh_count(), 1);
    }

    #[test]
    fn test_rollback_restores_active_layer_after_removal() {
        let mut host = MemoryHost::with_document("d", 100, 100);
        host.create_layer("A", LayerKind::Paint).unwrap();
        host.set_active_layer(Some("A")).unwrap();
        let digest_before = host.digest();

        let script = sanitized("doc.removeLayer(\"A\")\ndoc.setOpacity(\"Missing\", 1)");
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert_eq!(outcome.status, ExecStatus::RolledBack);
        assert_eq!(host.active_layer().unwrap(), Some("A".into()));
        assert_eq!(host.digest(), digest_before);
    }

    #[test]
    fn test_rollback_after_create_then_remove_of_same_layer() {
        let mut host = MemoryHost::with_document("d", 100, 100);
        let digest_before = host.digest();

        // The removal must restore the node under its original id so the
        // creation's own reversal can still find and delete it
        let script = sanitized(
            "doc.createLayer(\"A\", \"paint\")\ndoc.removeLayer(\"A\")\ndoc.setOpacity(\"Missing\", 1)",
        );
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert_eq!(outcome.status, ExecStatus::RolledBack);
        assert!(host.layers().unwrap().is_empty());
        assert_eq!(host.digest(), digest_before);
    }

    #[test]
    fn test_fault_on_first_statement_is_failed() {
        let mut host = MemoryHost::empty();
        let script = sanitized("doc.createLayer(\"A\", \"paint\")");
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert_eq!(outcome.status, ExecStatus::Failed);
        assert!(outcome.mutations.is_empty());
        assert!(outcome.error.as_deref().unwrap().contains("no document"));
    }

    #[test]
    fn test_unsanctioned_statement_refused_at_runtime() {
        // Defense in depth: hand-build a script the validator never saw
        let script = SanitizedScript {
            text: "doc.exportImage(\"/tmp/x.png\")".into(),
            statements: vec![Statement {
                root: "doc".into(),
                method: "exportImage".into(),
                args: vec![Literal::Str("/tmp/x.png".into())],
                line: 1,
            }],
        };
        let mut host = MemoryHost::with_document("d", 100, 100);
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert_eq!(outcome.status, ExecStatus::Failed);
        assert!(outcome
            .error
            .as_deref()
            .unwrap()
            .contains("sanctioned execution surface"));
    }

    #[test]
    fn test_move_is_relative_and_reversible() {
        let mut host = MemoryHost::with_document("d", 100, 100);
        host.create_layer("A", LayerKind::Paint).unwrap();
        host.set_position("A", 5, 5).unwrap();
        let digest_before = host.digest();

        let script = sanitized("doc.moveLayer(\"A\", 10, -3)\ndoc.setOpacity(\"Missing\", 1)");
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert_eq!(outcome.status, ExecStatus::RolledBack);
        assert_eq!(host.position("A").unwrap(), (5, 5));
        assert_eq!(host.digest(), digest_before);

        let script = sanitized("doc.moveLayer(\"A\", 10, -3)");
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert!(outcome.is_success());
        assert_eq!(host.position("A").unwrap(), (15, 2));
    }

    #[test]
    fn test_selection_and_clear_revert() {
        let mut host = MemoryHost::with_document("d", 100, 100);
        let script = sanitized("selection.select(10, 10, 50, 40)");
        assert!(ScopedExecutor::execute(&script, &mut host).is_success());
        assert!(host.selection().unwrap().is_some());

        let digest_before = host.digest();
        let script = sanitized("selection.clear()\ndoc.removeLayer(\"Missing\")");
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert_eq!(outcome.status, ExecStatus::RolledBack);
        assert_eq!(host.digest(), digest_before);
    }

    #[test]
    fn test_opacity_range_checked() {
        let mut host = MemoryHost::with_document("d", 100, 100);
        host.create_layer("A", LayerKind::Paint).unwrap();
        let script = sanitized("doc.setOpacity(\"A\", 300)");
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert_eq!(outcome.status, ExecStatus::Failed);
        assert!(outcome.error.as_deref().unwrap().contains("out of range"));
        assert_eq!(host.opacity("A").unwrap(), 255);
    }

    #[test]
    fn test_rename_then_fault_restores_original_name() {
        let mut host = MemoryHost::with_document("d", 100, 100);
        host.create_layer("Draft", LayerKind::Paint).unwrap();
        let digest_before = host.digest();

        let script =
            sanitized("doc.renameLayer(\"Draft\", \"Final\")\ndoc.setVisible(\"Ghost\", true)");
        let outcome = ScopedExecutor::execute(&script, &mut host);
        assert_eq!(outcome.status, ExecStatus::RolledBack);
        assert_eq!(host.digest(), digest_before);
        assert_eq!(host.layers().unwrap()[0].name, "Draft");
    }
}
