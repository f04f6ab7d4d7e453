//! Statement grammar for the automation dialect
//!
//! One call statement per line: `root.method(arg, ...)`. Arguments are
//! literals only. The validator and the scoped executor share this parser,
//! so what was validated is exactly what gets executed.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A literal argument in a call statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Str(s) => {
                write!(f, "\"")?;
                for c in s.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\\' => write!(f, "\\\\")?,
                        '\n' => write!(f, "\\n")?,
                        '\t' => write!(f, "\\t")?,
                        _ => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            Literal::Int(i) => write!(f, "{}", i),
            Literal::Float(x) => write!(f, "{:?}", x),
            Literal::Bool(b) => write!(f, "{}", b),
            Literal::Null => write!(f, "null"),
        }
    }
}

/// One parsed call statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub root: String,
    pub method: String,
    pub args: Vec<Literal>,
    /// 1-based source line in the candidate script
    pub line: usize,
}

impl Statement {
    /// Canonical rendering: normalized spacing, no comments
    pub fn render(&self) -> String {
        let args: Vec<String> = self.args.iter().map(|a| a.to_string()).collect();
        format!("{}.{}({})", self.root, self.method, args.join(", "))
    }
}

/// A line the parser could not read as a call statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineIssue {
    pub line: usize,
    pub message: String,
}

/// Result of parsing a whole script
#[derive(Debug, Clone, Default)]
pub struct ScriptParse {
    pub statements: Vec<Statement>,
    pub issues: Vec<LineIssue>,
}

/// Parse a script, one statement per line
///
/// Blank lines and `#` comments are skipped. Parsing continues past bad
/// lines so every defect is reported, not just the first.
pub fn parse_script(text: &str) -> ScriptParse {
    let mut parse = ScriptParse::default();
    for (idx, raw) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match parse_statement(line, line_no) {
            Ok(stmt) => parse.statements.push(stmt),
            Err(message) => parse.issues.push(LineIssue {
                line: line_no,
                message,
            }),
        }
    }
    parse
}

/// Maximum parenthesis nesting depth across the raw text, ignoring
/// parentheses inside string literals
pub fn max_nesting_depth(text: &str) -> usize {
    let mut depth: usize = 0;
    let mut max = 0;
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '(' | '[' | '{' => {
                depth += 1;
                max = max.max(depth);
            }
            ')' | ']' | '}' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    max
}

fn parse_statement(line: &str, line_no: usize) -> Result<Statement, String> {
    let mut cursor = Cursor::new(line);

    let root = cursor.ident().ok_or("expected a call like root.method(...)")?;
    cursor.expect('.')?;
    let method = cursor.ident().ok_or("expected a method name after '.'")?;
    cursor.expect('(')?;

    let mut args = Vec::new();
    cursor.skip_ws();
    if !cursor.eat(')') {
        loop {
            args.push(cursor.literal()?);
            cursor.skip_ws();
            if cursor.eat(',') {
                cursor.skip_ws();
                continue;
            }
            cursor.expect(')')?;
            break;
        }
    }

    cursor.skip_ws();
    cursor.eat(';');
    cursor.skip_ws();
    if !cursor.at_end() && !cursor.rest().starts_with('#') {
        return Err(format!(
            "unexpected trailing content: '{}'",
            cursor.rest().trim()
        ));
    }

    Ok(Statement {
        root,
        method,
        args,
        line: line_no,
    })
}

struct Cursor<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), String> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(format!(
                "expected '{}' at '{}'",
                expected,
                self.rest().trim()
            ))
        }
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        if !matches!(self.peek(), Some(c) if c.is_ascii_alphabetic() || c == '_') {
            return None;
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_alphanumeric() || c == '_') {
            self.bump();
        }
        Some(self.text[start..self.pos].to_string())
    }

    fn literal(&mut self) -> Result<Literal, String> {
        match self.peek() {
            Some('"') => self.string_literal(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' => self.number_literal(),
            Some(c) if c.is_ascii_alphabetic() => {
                let word = self.ident().unwrap_or_default();
                match word.as_str() {
                    "true" => Ok(Literal::Bool(true)),
                    "false" => Ok(Literal::Bool(false)),
                    "null" => Ok(Literal::Null),
                    other => Err(format!(
                        "'{}' is not a literal; arguments must be strings, numbers, booleans or null",
                        other
                    )),
                }
            }
            _ => Err(format!("expected an argument at '{}'", self.rest().trim())),
        }
    }

    fn string_literal(&mut self) -> Result<Literal, String> {
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(Literal::Str(value)),
                Some('\\') => match self.bump() {
                    Some('"') => value.push('"'),
                    Some('\\') => value.push('\\'),
                    Some('n') => value.push('\n'),
                    Some('t') => value.push('\t'),
                    Some(c) => return Err(format!("unknown escape '\\{}'", c)),
                    None => return Err("unterminated string".into()),
                },
                Some(c) => value.push(c),
                None => return Err("unterminated string".into()),
            }
        }
    }

    fn number_literal(&mut self) -> Result<Literal, String> {
        let start = self.pos;
        if matches!(self.peek(), Some('-') | Some('+')) {
            self.bump();
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() {
                self.bump();
            } else if c == '.' && !is_float {
                is_float = true;
                self.bump();
            } else {
                break;
            }
        }
        let text = &self.text[start..self.pos];
        if is_float {
            text.parse::<f64>()
                .map(Literal::Float)
                .map_err(|_| format!("invalid number '{}'", text))
        } else {
            text.parse::<i64>()
                .map(Literal::Int)
                .map_err(|_| format!("invalid number '{}'", text))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_statement() {
        let parse = parse_script("doc.createLayer(\"Background\", \"paint\")");
        assert!(parse.issues.is_empty());
        assert_eq!(parse.statements.len(), 1);
        let stmt = &parse.statements[0];
        assert_eq!(stmt.root, "doc");
        assert_eq!(stmt.method, "createLayer");
        assert_eq!(
            stmt.args,
            vec![
                Literal::Str("Background".into()),
                Literal::Str("paint".into())
            ]
        );
    }

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let parse = parse_script("# create the layer\n\ndoc.refresh()\n");
        assert!(parse.issues.is_empty());
        assert_eq!(parse.statements.len(), 1);
        assert_eq!(parse.statements[0].line, 3);
    }

    #[test]
    fn test_parse_numbers_and_booleans() {
        let parse = parse_script("doc.moveLayer(\"L\", -10, 25)\ndoc.setVisible(\"L\", false)\ndoc.rotateLayer(\"L\", 1.5708)");
        assert!(parse.issues.is_empty());
        assert_eq!(parse.statements[0].args[1], Literal::Int(-10));
        assert_eq!(parse.statements[1].args[1], Literal::Bool(false));
        assert_eq!(parse.statements[2].args[1], Literal::Float(1.5708));
    }

    #[test]
    fn test_parse_trailing_semicolon_and_comment() {
        let parse = parse_script("doc.refresh();  # done");
        assert!(parse.issues.is_empty());
        assert_eq!(parse.statements.len(), 1);
    }

    #[test]
    fn test_parse_collects_all_bad_lines() {
        let parse = parse_script("doc.refresh()\nif x:\nimport os\ndoc.refresh()");
        assert_eq!(parse.statements.len(), 2);
        assert_eq!(parse.issues.len(), 2);
        assert_eq!(parse.issues[0].line, 2);
        assert_eq!(parse.issues[1].line, 3);
    }

    #[test]
    fn test_parse_rejects_nested_calls() {
        let parse = parse_script("doc.setOpacity(doc.activeLayer(), 128)");
        assert_eq!(parse.statements.len(), 0);
        assert_eq!(parse.issues.len(), 1);
    }

    #[test]
    fn test_string_escapes() {
        let parse = parse_script(r#"doc.createLayer("a \"b\" \\ c", "paint")"#);
        assert!(parse.issues.is_empty());
        assert_eq!(
            parse.statements[0].args[0],
            Literal::Str("a \"b\" \\ c".into())
        );
    }

    #[test]
    fn test_render_is_canonical() {
        let parse = parse_script("doc.createLayer(  \"X\" ,\"paint\" )  ;");
        let rendered = parse.statements[0].render();
        assert_eq!(rendered, "doc.createLayer(\"X\", \"paint\")");
        // Rendering reparses to the same statement
        let again = parse_script(&rendered);
        assert_eq!(again.statements[0].args, parse.statements[0].args);
    }

    #[test]
    fn test_max_nesting_depth() {
        assert_eq!(max_nesting_depth("doc.refresh()"), 1);
        assert_eq!(max_nesting_depth("f(g(h(x)))"), 3);
        assert_eq!(max_nesting_depth("doc.createLayer(\"(((((\", \"paint\")"), 1);
    }
}
