//! Extract the code payload from a generation response
//!
//! The generation service is asked for bare code, but responses routinely
//! arrive wrapped in markdown fences or padded with prose. Only the code
//! payload may travel downstream; the validator must never see prose.

/// Extract candidate code from a raw response
///
/// Prefers the first fenced code block. Without fences, falls back to the
/// lines that read as call statements or comments. Returns None when no
/// code can be found at all (a malformed response).
pub fn extract_code(response: &str) -> Option<String> {
    if let Some(block) = fenced_block(response) {
        let block = block.trim();
        if !block.is_empty() {
            return Some(block.to_string());
        }
    }

    let code_lines: Vec<&str> = response
        .lines()
        .map(str::trim)
        .filter(|line| looks_like_statement(line) || line.starts_with('#'))
        .collect();

    if code_lines.iter().any(|line| looks_like_statement(line)) {
        Some(code_lines.join("\n"))
    } else {
        None
    }
}

/// Contents of the first ``` fence, tolerating an optional language tag
fn fenced_block(response: &str) -> Option<&str> {
    let open = response.find("```")?;
    let after_ticks = &response[open + 3..];
    // Skip a language tag up to the first newline
    let body_start = after_ticks.find('\n').map(|i| i + 1)?;
    let body = &after_ticks[body_start..];
    let close = body.find("```")?;
    Some(&body[..close])
}

/// Whether a line has the shape `ident.ident(` of a call statement
fn looks_like_statement(line: &str) -> bool {
    let mut chars = line.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    let mut seen_dot = false;
    for (_, c) in chars {
        match c {
            '.' if !seen_dot => seen_dot = true,
            '(' => return seen_dot,
            c if c.is_ascii_alphanumeric() || c == '_' => {}
            _ => return false,
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracts_fenced_block() {
        let response = "Here you go:\n```\ndoc.refresh()\n```\nHope that helps!";
        assert_eq!(extract_code(response).unwrap(), "doc.refresh()");
    }

    #[test]
    fn test_extracts_fenced_block_with_language_tag() {
        let response = "```python\ndoc.createLayer(\"A\", \"paint\")\ndoc.refresh()\n```";
        assert_eq!(
            extract_code(response).unwrap(),
            "doc.createLayer(\"A\", \"paint\")\ndoc.refresh()"
        );
    }

    #[test]
    fn test_unfenced_response_strips_prose() {
        let response = "Sure! This creates the layer:\ndoc.createLayer(\"A\", \"paint\")\ndoc.refresh()\nLet me know if you need more.";
        assert_eq!(
            extract_code(response).unwrap(),
            "doc.createLayer(\"A\", \"paint\")\ndoc.refresh()"
        );
    }

    #[test]
    fn test_pure_prose_is_none() {
        assert_eq!(extract_code("I cannot do that, sorry."), None);
        assert_eq!(extract_code(""), None);
    }

    #[test]
    fn test_comment_only_refusal_is_none() {
        // A bare-comment refusal carries no statements to keep
        assert_eq!(extract_code("# Cannot perform this operation"), None);
    }

    #[test]
    fn test_statement_shape() {
        assert!(looks_like_statement("doc.refresh()"));
        assert!(looks_like_statement("selection.select(0, 0, 10, 10)"));
        assert!(!looks_like_statement("Note: this is prose"));
        assert!(!looks_like_statement("refresh()"));
        assert!(!looks_like_statement("1doc.refresh()"));
    }
}
