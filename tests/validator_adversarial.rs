//! Adversarial validator tests
//!
//! Property-based checks of the safety gate: every script composed purely
//! from the sanctioned surface is accepted, and injecting any denied
//! construct into an otherwise valid script is always rejected with the
//! matching rule. Handcrafted cases cover evasion attempts the generators
//! would not stumble into randomly.

use canvas_pilot::script::policy::{Policy, RuleId};
use canvas_pilot::script::validator::validate;
use canvas_pilot::script::CandidateScript;

use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

/// Layer names safe to embed in a double-quoted string literal
fn layer_name() -> impl Strategy<Value = String> {
    "[A-Za-z][A-Za-z0-9 _]{0,14}"
}

fn layer_kind() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["paint", "group", "fill", "vector"])
}

/// One statement drawn from the sanctioned surface
fn sanctioned_statement() -> impl Strategy<Value = String> {
    prop_oneof![
        (layer_name(), layer_kind())
            .prop_map(|(n, k)| format!("doc.createLayer(\"{}\", \"{}\")", n, k)),
        layer_name().prop_map(|n| format!("doc.removeLayer(\"{}\")", n)),
        (layer_name(), layer_name())
            .prop_map(|(a, b)| format!("doc.renameLayer(\"{}\", \"{}\")", a, b)),
        (layer_name(), 0u8..=255)
            .prop_map(|(n, o)| format!("doc.setOpacity(\"{}\", {})", n, o)),
        (layer_name(), any::<bool>())
            .prop_map(|(n, v)| format!("doc.setVisible(\"{}\", {})", n, v)),
        (layer_name(), -500i32..=500, -500i32..=500)
            .prop_map(|(n, x, y)| format!("doc.moveLayer(\"{}\", {}, {})", n, x, y)),
        (layer_name(), -628i32..=628).prop_map(|(n, r)| {
            format!("doc.rotateLayer(\"{}\", {:.2})", n, f64::from(r) / 100.0)
        }),
        layer_name().prop_map(|n| format!("doc.setActiveLayer(\"{}\")", n)),
        (0i32..=200, 0i32..=200, 1i32..=200, 1i32..=200)
            .prop_map(|(x, y, w, h)| format!("selection.select({}, {}, {}, {})", x, y, w, h)),
        Just("selection.clear()".to_string()),
        Just("doc.refresh()".to_string()),
    ]
}

fn sanctioned_script() -> impl Strategy<Value = String> {
    prop::collection::vec(sanctioned_statement(), 1..16).prop_map(|lines| lines.join("\n"))
}

/// (hostile line, rule it must trip)
fn hostile_line() -> impl Strategy<Value = (String, RuleId)> {
    prop::sample::select(vec![
        ("import os".to_string(), RuleId::ModuleImport),
        ("from pathlib import Path".to_string(), RuleId::ModuleImport),
        ("eval(\"doc.refresh()\")".to_string(), RuleId::DynamicEvaluation),
        ("exec(payload)".to_string(), RuleId::DynamicEvaluation),
        ("open(\"/etc/passwd\")".to_string(), RuleId::FilesystemAccess),
        ("shutil.rmtree(\"/home\")".to_string(), RuleId::FilesystemAccess),
        ("socket.create_connection((\"evil\", 80))".to_string(), RuleId::NetworkAccess),
        ("urllib.request.urlopen(url)".to_string(), RuleId::NetworkAccess),
        ("subprocess.run(cmd)".to_string(), RuleId::ProcessInvocation),
        ("system(\"rm -rf /\")".to_string(), RuleId::ProcessInvocation),
        ("getattr(doc, name)".to_string(), RuleId::ReflectionAccess),
        ("globals()".to_string(), RuleId::ReflectionAccess),
        ("def helper():".to_string(), RuleId::CallableDefinition),
        ("lambda x: x".to_string(), RuleId::CallableDefinition),
    ])
}

// ============================================================================
// Properties
// ============================================================================

proptest! {
    /// Acceptance completeness: the sanctioned surface always validates
    #[test]
    fn prop_sanctioned_scripts_accepted(script in sanctioned_script()) {
        let policy = Policy::default();
        let verdict = validate(&CandidateScript::new(script.clone()), &policy);
        prop_assert!(
            verdict.accepted,
            "rejected sanctioned script {:?} with {:?}",
            script,
            verdict.violations
        );
        prop_assert!(verdict.sanitized.is_some());
    }

    /// Sanitization is a fixed point: the canonical form re-validates
    #[test]
    fn prop_sanitized_scripts_revalidate(script in sanctioned_script()) {
        let policy = Policy::default();
        let verdict = validate(&CandidateScript::new(script), &policy);
        prop_assume!(verdict.accepted);
        let sanitized = verdict.sanitized.unwrap();
        let again = validate(&CandidateScript::new(sanitized.text.clone()), &policy);
        prop_assert!(again.accepted);
        prop_assert_eq!(again.sanitized.unwrap().text, sanitized.text);
    }

    /// Rejection soundness: one hostile line anywhere poisons the script
    #[test]
    fn prop_hostile_line_always_rejected(
        script in sanctioned_script(),
        (line, rule) in hostile_line(),
        position in 0usize..16,
    ) {
        let mut lines: Vec<&str> = script.lines().collect();
        let at = position.min(lines.len());
        lines.insert(at, &line);
        let tainted = lines.join("\n");

        let policy = Policy::default();
        let verdict = validate(&CandidateScript::new(tainted.clone()), &policy);
        prop_assert!(!verdict.accepted, "accepted tainted script {:?}", tainted);
        prop_assert!(
            verdict.violations.contains(&rule),
            "expected {:?} among {:?} for line {:?}",
            rule,
            verdict.violations,
            line
        );
        prop_assert!(verdict.sanitized.is_none());
    }

    /// Unknown roots are rejected even when the call shape is well formed
    #[test]
    fn prop_unknown_root_rejected(root in "[a-z]{2,8}", name in layer_name()) {
        let policy = Policy::default();
        prop_assume!(!policy.permits_root(&root));
        let script = format!("{}.createLayer(\"{}\", \"paint\")", root, name);
        let verdict = validate(&CandidateScript::new(script), &policy);
        prop_assert!(!verdict.accepted);
        // Denylisted identifiers trip their category; everything else is an
        // unknown root
        prop_assert!(
            verdict.violations.contains(&RuleId::UnknownRoot)
                || !verdict.violations.is_empty()
        );
    }

    /// Denied tokens inside string literals never cause a rejection
    #[test]
    fn prop_denied_tokens_in_strings_are_data(kind in layer_kind()) {
        let policy = Policy::default();
        let script = format!(
            "doc.createLayer(\"import os and eval\", \"{}\")\ndoc.refresh()",
            kind
        );
        let verdict = validate(&CandidateScript::new(script), &policy);
        prop_assert!(verdict.accepted, "violations: {:?}", verdict.violations);
    }
}

// ============================================================================
// Handcrafted evasion attempts
// ============================================================================

#[test]
fn test_dunder_access_rejected() {
    let policy = Policy::default();
    for script in [
        "doc.__class__",
        "doc.createLayer.__globals__",
        "__builtins__.print(1)",
    ] {
        let verdict = validate(&CandidateScript::new(script), &policy);
        assert!(!verdict.accepted, "accepted {:?}", script);
        assert!(
            verdict.violations.contains(&RuleId::ReflectionAccess),
            "{:?} -> {:?}",
            script,
            verdict.violations
        );
    }
}

#[test]
fn test_arrow_function_rejected() {
    let policy = Policy::default();
    let verdict = validate(
        &CandidateScript::new("doc.setVisible(\"bg\", (x) => true)"),
        &policy,
    );
    assert!(!verdict.accepted);
    assert!(verdict.violations.contains(&RuleId::CallableDefinition));
}

#[test]
fn test_arrow_inside_string_is_data() {
    let policy = Policy::default();
    let verdict = validate(
        &CandidateScript::new("doc.createLayer(\"a => b\", \"paint\")\ndoc.refresh()"),
        &policy,
    );
    assert!(verdict.accepted, "violations: {:?}", verdict.violations);
}

#[test]
fn test_case_variants_of_denied_tokens_rejected() {
    let policy = Policy::default();
    for script in ["Import os", "EVAL(\"x\")", "Subprocess.run(c)"] {
        let verdict = validate(&CandidateScript::new(script), &policy);
        assert!(!verdict.accepted, "accepted {:?}", script);
    }
}

#[test]
fn test_sanctioned_method_on_wrong_root_rejected() {
    let policy = Policy::default();
    let verdict = validate(&CandidateScript::new("selection.createLayer(\"a\", \"paint\")"), &policy);
    assert!(!verdict.accepted);
    assert!(verdict.violations.contains(&RuleId::UnknownMethod));
}

#[test]
fn test_all_violations_reported_together() {
    let policy = Policy::default();
    let script = "import os\neval(\"x\")\napp.quit()";
    let verdict = validate(&CandidateScript::new(script), &policy);
    assert!(!verdict.accepted);
    assert!(verdict.violations.contains(&RuleId::ModuleImport));
    assert!(verdict.violations.contains(&RuleId::DynamicEvaluation));
    assert!(verdict.violations.len() >= 3);
    // One detail line per occurrence, at least one per violated rule
    assert!(verdict.details.len() >= verdict.violations.len());
}

#[test]
fn test_statement_bound_enforced() {
    let policy = Policy::default();
    let script = vec!["doc.refresh()"; policy.max_statements + 1].join("\n");
    let verdict = validate(&CandidateScript::new(script), &policy);
    assert!(!verdict.accepted);
    assert!(verdict.violations.contains(&RuleId::OversizedScript));
}

#[test]
fn test_byte_bound_enforced() {
    let policy = Policy::default();
    let huge = format!("doc.createLayer(\"{}\", \"paint\")", "x".repeat(5000));
    let verdict = validate(&CandidateScript::new(huge), &policy);
    assert!(!verdict.accepted);
    assert!(verdict.violations.contains(&RuleId::OversizedScript));
}

#[test]
fn test_whitespace_only_script_rejected_as_empty() {
    let policy = Policy::default();
    let verdict = validate(&CandidateScript::new("\n  \n\t\n"), &policy);
    assert!(!verdict.accepted);
    assert!(verdict.violations.contains(&RuleId::EmptyScript));
}
