//! Statement splitting and classification for the memory engine.

use std::collections::BTreeSet;

use super::literal::{self, Item};

/// Table flavour recorded in the catalog.
#[derive(Copy, Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub(crate) enum TableKind {
    Node,
    Rel,
}

#[derive(Debug)]
pub(crate) enum Statement {
    /// Projection of literal expressions.
    Return(Vec<Item>),
    CreateTable { kind: TableKind, name: String },
    DropTable { name: String },
    Copy { name: String },
    /// Pattern writes such as `CREATE (n:User ...)` or `SET`.
    Write,
    Transaction,
    /// Anything that needs graph data. Only answerable by a responder.
    Read { writes: bool },
}

impl Statement {
    pub(crate) fn writes(&self) -> bool {
        match self {
            Statement::Return(_) | Statement::Transaction => false,
            Statement::Read { writes } => *writes,
            _ => true,
        }
    }
}

const WRITE_CLAUSES: &[&str] = &["CREATE", "MERGE", "SET", "DELETE", "DETACH", "REMOVE"];

/// Tracks whether a scan position sits inside a quoted literal.
#[derive(Default)]
struct QuoteState {
    quote: Option<char>,
    escaped: bool,
}

impl QuoteState {
    /// Feeds one character. Returns true when the character is outside quotes.
    fn feed(&mut self, c: char) -> bool {
        match self.quote {
            Some(q) => {
                if self.escaped {
                    self.escaped = false;
                } else if c == '\\' {
                    self.escaped = true;
                } else if c == q {
                    self.quote = None;
                }
                false
            }
            None => {
                if matches!(c, '\'' | '"' | '`') {
                    self.quote = Some(c);
                    false
                } else {
                    true
                }
            }
        }
    }
}

/// Splits a script on top-level semicolons. Empty statements are dropped.
pub(crate) fn split(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut state = QuoteState::default();
    let mut start = 0;
    for (idx, c) in text.char_indices() {
        if state.feed(c) && c == ';' {
            push_trimmed(&mut out, &text[start..idx]);
            start = idx + 1;
        }
    }
    push_trimmed(&mut out, &text[start..]);
    out
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, stmt: &'a str) {
    let stmt = stmt.trim();
    if !stmt.is_empty() {
        out.push(stmt);
    }
}

/// Collapses whitespace outside literals so that responder keys ignore layout.
pub(crate) fn normalize(stmt: &str) -> String {
    let mut out = String::with_capacity(stmt.len());
    let mut state = QuoteState::default();
    let mut pending_space = false;
    for c in stmt.trim().trim_end_matches(';').trim_end().chars() {
        let outside = state.feed(c);
        if outside && c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space && !out.is_empty() {
            out.push(' ');
        }
        pending_space = false;
        out.push(c);
    }
    out
}

/// Names of `$parameters` referenced outside literals.
pub(crate) fn parameters(stmt: &str) -> BTreeSet<String> {
    let mut names = BTreeSet::new();
    let mut state = QuoteState::default();
    let mut chars = stmt.chars().peekable();
    while let Some(c) = chars.next() {
        if !state.feed(c) || c != '$' {
            continue;
        }
        let mut name = String::new();
        while let Some(&next) = chars.peek() {
            if next.is_alphanumeric() || next == '_' {
                name.push(next);
                chars.next();
            } else {
                break;
            }
        }
        if !name.is_empty() {
            names.insert(name);
        }
    }
    names
}

fn parser_error(stmt: &str) -> String {
    let token = stmt.split_whitespace().next().unwrap_or_default();
    format!(
        "Parser exception: Invalid input <{token}>: expected rule oC_Cypher (line: 1, offset: 0)\n\"{stmt}\""
    )
}

/// Classifies a single statement.
pub(crate) fn parse(stmt: &str) -> Result<Statement, String> {
    let keyword: String = stmt
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();
    let tokens: Vec<&str> = stmt
        .split(|c: char| c.is_whitespace() || c == '(')
        .filter(|t| !t.is_empty())
        .collect();
    let upper = |idx: usize| tokens.get(idx).map(|t| t.to_ascii_uppercase());

    match keyword.as_str() {
        "RETURN" => literal::parse_items(&stmt[keyword.len()..]).map(Statement::Return),
        "CREATE" => match upper(1).as_deref() {
            Some(kind @ ("NODE" | "REL")) => {
                if upper(2).as_deref() != Some("TABLE") {
                    return Err(parser_error(stmt));
                }
                let mut idx = 3;
                if upper(3).as_deref() == Some("IF")
                    && upper(4).as_deref() == Some("NOT")
                    && upper(5).as_deref() == Some("EXISTS")
                {
                    idx = 6;
                }
                let name = table_name(&tokens, idx).ok_or_else(|| parser_error(stmt))?;
                let kind = if kind == "NODE" {
                    TableKind::Node
                } else {
                    TableKind::Rel
                };
                Ok(Statement::CreateTable { kind, name })
            }
            _ => Ok(Statement::Write),
        },
        "DROP" => {
            if upper(1).as_deref() != Some("TABLE") {
                return Err(parser_error(stmt));
            }
            let name = table_name(&tokens, 2).ok_or_else(|| parser_error(stmt))?;
            Ok(Statement::DropTable { name })
        }
        "COPY" => {
            let name = table_name(&tokens, 1).ok_or_else(|| parser_error(stmt))?;
            Ok(Statement::Copy { name })
        }
        "MERGE" | "SET" | "DELETE" | "DETACH" | "CHECKPOINT" => Ok(Statement::Write),
        "BEGIN" | "COMMIT" | "ROLLBACK" => Ok(Statement::Transaction),
        "MATCH" | "OPTIONAL" | "UNWIND" | "WITH" | "CALL" => {
            let writes = tokens
                .iter()
                .any(|t| WRITE_CLAUSES.contains(&t.to_ascii_uppercase().as_str()));
            Ok(Statement::Read { writes })
        }
        _ => Err(parser_error(stmt)),
    }
}

fn table_name(tokens: &[&str], idx: usize) -> Option<String> {
    let name = tokens
        .get(idx)?
        .trim_matches(|c: char| !(c.is_alphanumeric() || c == '_'));
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}
