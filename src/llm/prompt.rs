//! Compose generation requests
//!
//! Builds the structured request sent to the generation service: system
//! instructions with the sanctioned API reference, the document snapshot,
//! a digest of recent commands, and the user's text. Deterministic given
//! identical inputs; no hidden state.

use crate::context::ContextSnapshot;
use crate::history::CommandSummary;
use crate::script::policy::Policy;

/// A fully composed request for the generation service
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system: String,
    pub user: String,
}

/// Compose a generation request
///
/// `recent` should be the K most recent history summaries, oldest first;
/// only user text and outcome are embedded, never full scripts, keeping
/// request size bounded.
pub fn compose(
    user_text: &str,
    snapshot: &ContextSnapshot,
    recent: &[CommandSummary],
    policy: &Policy,
) -> GenerationRequest {
    let mut user = String::new();

    user.push_str("DOCUMENT CONTEXT:\n");
    user.push_str(&snapshot.summary());

    if !recent.is_empty() {
        user.push_str("\nRECENT COMMANDS:\n");
        for summary in recent {
            user.push_str(&format!(
                "{}. \"{}\" -> {}\n",
                summary.seq,
                summary.user_text,
                summary.status.as_str()
            ));
        }
    }

    user.push_str("\nUSER COMMAND:\n");
    user.push_str(user_text);
    user.push_str("\n\nGenerate the automation script for this command:");

    GenerationRequest {
        system: system_prompt(policy),
        user,
    }
}

/// System instructions with the sanctioned surface enumerated from the
/// policy, so the generator is steered toward exactly what the validator
/// will accept; a call trimmed from the policy never appears in the prompt
pub fn system_prompt(policy: &Policy) -> String {
    let reference = policy
        .allowed_roots
        .iter()
        .flat_map(|(root, methods)| {
            methods.iter().map(move |m| reference_line(root, m))
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "{}\n\nAPI REFERENCE (the complete surface - nothing else exists):\n{}\n\n{}\n\n{}",
        PROMPT_INTRO, reference, PROMPT_EXAMPLES, PROMPT_RULES
    )
}

/// One API-reference line for a permitted call, with signature and pitfall
/// notes for the calls that have them
fn reference_line(root: &str, method: &str) -> String {
    match (root, method) {
        ("doc", "createLayer") => {
            "- doc.createLayer(name, kind) - create a layer; kind is \"paint\", \"group\", \"fill\" or \"vector\"".into()
        }
        ("doc", "removeLayer") => "- doc.removeLayer(name) - delete a layer by exact name".into(),
        ("doc", "renameLayer") => "- doc.renameLayer(old, new)".into(),
        ("doc", "setOpacity") => {
            "- doc.setOpacity(name, value) - value is 0-255, NOT a percentage (50% = 128)".into()
        }
        ("doc", "setVisible") => "- doc.setVisible(name, visible)".into(),
        ("doc", "moveLayer") => "- doc.moveLayer(name, dx, dy) - relative move in pixels".into(),
        ("doc", "rotateLayer") => {
            "- doc.rotateLayer(name, radians) - RADIANS, not degrees (90 degrees = 1.5708)".into()
        }
        ("doc", "setActiveLayer") => "- doc.setActiveLayer(name)".into(),
        ("doc", "refresh") => "- doc.refresh() - recomposite; call once at the end".into(),
        ("selection", "select") => {
            "- selection.select(x, y, width, height) - rectangular selection".into()
        }
        ("selection", "clear") => "- selection.clear()".into(),
        _ => format!("- {}.{}(...)", root, method),
    }
}

const PROMPT_INTRO: &str = r#"You are an automation assistant for a raster graphics editor.
Convert user commands into the editor's automation dialect: one call statement per line, literal arguments only (strings, integers, floats, booleans, null)."#;

const PROMPT_EXAMPLES: &str = r#"COMMON EXAMPLES:

Create a new layer:
doc.createLayer("New Layer", "paint")
doc.refresh()

Set 50% opacity on a layer:
doc.setOpacity("Sketch", 128)
doc.refresh()

Rotate a layer 90 degrees:
doc.rotateLayer("Photo", 1.5708)
doc.refresh()"#;

const PROMPT_RULES: &str = r#"STRICT INSTRUCTIONS:
1. ONLY use the permitted calls listed above; NEVER invent method names
2. One statement per line; no variables, loops, conditionals or function definitions
3. Return ONLY the script - no explanations, no markdown
4. Opacity is 0-255; rotation is radians
5. Refer to layers by the exact names in the document context
6. End with doc.refresh()

If the command cannot be expressed with the permitted calls, respond with exactly:
# cannot perform this operation"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::CommandStatus;

    fn summaries() -> Vec<CommandSummary> {
        vec![
            CommandSummary {
                seq: 4,
                user_text: "add a sketch layer".into(),
                status: CommandStatus::Succeeded,
            },
            CommandSummary {
                seq: 5,
                user_text: "delete everything on disk".into(),
                status: CommandStatus::Rejected,
            },
        ]
    }

    #[test]
    fn test_compose_embeds_context_and_history() {
        let snapshot = ContextSnapshot::no_document();
        let request = compose("make it blue", &snapshot, &summaries(), &Policy::default());

        assert!(request.user.contains("No document"));
        assert!(request.user.contains("4. \"add a sketch layer\" -> succeeded"));
        assert!(request.user.contains("5. \"delete everything on disk\" -> rejected"));
        assert!(request.user.contains("make it blue"));
    }

    #[test]
    fn test_system_prompt_mirrors_policy() {
        let system = system_prompt(&Policy::default());
        assert!(system.contains("- doc.createLayer"));
        assert!(system.contains("- selection.clear"));

        let mut trimmed = Policy::default();
        trimmed.allowed_roots.get_mut("doc").unwrap().remove("removeLayer");
        let system = system_prompt(&trimmed);
        assert!(!system.contains("- doc.removeLayer"));
    }

    #[test]
    fn test_system_prompt_covers_calls_without_reference_notes() {
        let mut extended = Policy::default();
        extended
            .allowed_roots
            .get_mut("doc")
            .unwrap()
            .insert("flatten".into());
        let system = system_prompt(&extended);
        assert!(system.contains("- doc.flatten(...)"));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let snapshot = ContextSnapshot::no_document();
        let policy = Policy::default();
        let a = compose("x", &snapshot, &[], &policy);
        let b = compose("x", &snapshot, &[], &policy);
        assert_eq!(a, b);
    }

    #[test]
    fn test_compose_without_history_omits_section() {
        let request = compose(
            "x",
            &ContextSnapshot::no_document(),
            &[],
            &Policy::default(),
        );
        assert!(!request.user.contains("RECENT COMMANDS"));
    }
}
