//! Statement Profile - classifies SQL before it reaches the engine
//!
//! Uses the sqlparser crate to decide whether a statement is a pure read and
//! whether it already caps its rows. SQLite accepts more syntax than the
//! parser does, so when parsing fails we fall back to the leading keyword and
//! leave syntax questions to the engine's dry run.

use serde::{Deserialize, Serialize};
use sqlparser::ast::{SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatementKind {
    /// SELECT / WITH ... SELECT / VALUES
    Read,
    /// INSERT, UPDATE, DELETE, REPLACE, MERGE
    Write,
    /// CREATE, DROP, ALTER, TRUNCATE
    Ddl,
    /// PRAGMA, ATTACH, EXPLAIN, VACUUM and anything unrecognised
    Other,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatementKind::Read => write!(f, "read"),
            StatementKind::Write => write!(f, "write"),
            StatementKind::Ddl => write!(f, "schema change"),
            StatementKind::Other => write!(f, "non-query"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatementProfile {
    pub kind: StatementKind,

    /// Number of top-level statements in the text
    pub statement_count: usize,

    /// Top-level LIMIT or FETCH present
    pub has_row_cap: bool,

    /// Whether the SQL grammar accepted the text (false = keyword fallback)
    pub parsed: bool,
}

impl StatementProfile {
    pub fn from_sql(sql: &str) -> Self {
        let dialect = SQLiteDialect {};
        match Parser::parse_sql(&dialect, sql) {
            Ok(ast) => Self::from_ast(&ast),
            Err(e) => {
                tracing::debug!("SQL parsing failed: {}, using keyword fallback", e);
                Self::from_sql_heuristic(sql)
            }
        }
    }

    pub fn is_read_only(&self) -> bool {
        self.kind == StatementKind::Read
    }

    fn from_ast(ast: &[Statement]) -> Self {
        let mut kind = if ast.is_empty() {
            StatementKind::Other
        } else {
            StatementKind::Read
        };
        let mut has_row_cap = false;

        for (idx, stmt) in ast.iter().enumerate() {
            let stmt_kind = match stmt {
                Statement::Query(query) => {
                    if idx == 0 {
                        has_row_cap = query.limit.is_some() || query.fetch.is_some();
                    }
                    if matches!(*query.body, SetExpr::Insert(_)) {
                        StatementKind::Write
                    } else {
                        StatementKind::Read
                    }
                }
                other => keyword_kind(&other.to_string()),
            };
            if kind == StatementKind::Read && stmt_kind != StatementKind::Read {
                kind = stmt_kind;
            }
        }

        Self {
            kind,
            statement_count: ast.len(),
            has_row_cap,
            parsed: true,
        }
    }

    fn from_sql_heuristic(sql: &str) -> Self {
        let body = skip_leading_comments(sql);
        let scan = LexicalScan::of(body);

        Self {
            kind: keyword_kind(body),
            statement_count: scan.statement_count,
            // Only a clause outside parentheses, literals and comments caps
            // the outer query.
            has_row_cap: scan
                .top_level_words
                .iter()
                .any(|w| w == "LIMIT" || w == "FETCH"),
            parsed: false,
        }
    }
}

/// Classify by the first word of a statement.
pub fn keyword_kind(sql: &str) -> StatementKind {
    let first = skip_leading_comments(sql)
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .find(|w| !w.is_empty())
        .unwrap_or("")
        .to_uppercase();

    match first.as_str() {
        "SELECT" | "WITH" | "VALUES" => StatementKind::Read,
        "INSERT" | "UPDATE" | "DELETE" | "REPLACE" | "MERGE" | "UPSERT" => StatementKind::Write,
        "CREATE" | "DROP" | "ALTER" | "TRUNCATE" => StatementKind::Ddl,
        _ => StatementKind::Other,
    }
}

/// Upper-case identifier-like tokens, split on anything that cannot be part
/// of an identifier. `created_at` stays one token.
pub fn word_tokens(text: &str) -> Vec<&str> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect()
}

/// Drop trailing semicolons, comments and whitespace.
///
/// Text after the last piece of real content goes, so an appended clause
/// cannot land behind a terminator or inside a trailing comment.
pub fn strip_terminator(sql: &str) -> &str {
    sql[..LexicalScan::of(sql).content_end].trim()
}

fn skip_leading_comments(sql: &str) -> &str {
    let mut rest = sql.trim_start();
    loop {
        if let Some(after) = rest.strip_prefix("--") {
            rest = match after.find('\n') {
                Some(pos) => after[pos + 1..].trim_start(),
                None => "",
            };
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = match after.find("*/") {
                Some(pos) => after[pos + 2..].trim_start(),
                None => "",
            };
        } else {
            return rest;
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum LexState {
    Code,
    Quoted(char),
    LineComment,
    BlockComment,
}

/// Single pass over SQL text that tracks quotes, comments and paren depth.
#[derive(Debug, Default)]
struct LexicalScan {
    /// `;`-separated statements that carry content
    statement_count: usize,
    /// Byte offset just past the last content character
    content_end: usize,
    /// Upper-cased words at paren depth 0, outside literals and comments
    top_level_words: Vec<String>,
}

impl LexicalScan {
    fn of(sql: &str) -> Self {
        let mut scan = Self::default();
        let mut state = LexState::Code;
        let mut depth: usize = 0;
        let mut current_has_content = false;
        let mut word = String::new();
        let mut chars = sql.char_indices().peekable();

        while let Some((idx, c)) = chars.next() {
            let next = chars.peek().map(|&(_, n)| n);
            match state {
                LexState::Quoted(q) => {
                    if c == q {
                        state = LexState::Code;
                    }
                    scan.content_end = idx + c.len_utf8();
                }
                LexState::LineComment => {
                    if c == '\n' {
                        state = LexState::Code;
                    }
                }
                LexState::BlockComment => {
                    if c == '*' && next == Some('/') {
                        chars.next();
                        state = LexState::Code;
                    }
                }
                LexState::Code => {
                    let is_word_char = c.is_alphanumeric() || c == '_';
                    if !is_word_char {
                        scan.flush_word(&mut word, depth);
                    }
                    match c {
                        '-' if next == Some('-') => {
                            chars.next();
                            state = LexState::LineComment;
                        }
                        '/' if next == Some('*') => {
                            chars.next();
                            state = LexState::BlockComment;
                        }
                        ';' => {
                            if current_has_content {
                                scan.statement_count += 1;
                            }
                            current_has_content = false;
                        }
                        c if c.is_whitespace() => {}
                        c => {
                            match c {
                                '\'' | '"' | '`' => state = LexState::Quoted(c),
                                '(' => depth += 1,
                                ')' => depth = depth.saturating_sub(1),
                                _ => {}
                            }
                            if is_word_char {
                                word.push(c);
                            }
                            current_has_content = true;
                            scan.content_end = idx + c.len_utf8();
                        }
                    }
                }
            }
        }
        scan.flush_word(&mut word, depth);
        if current_has_content {
            scan.statement_count += 1;
        }
        scan
    }

    fn flush_word(&mut self, word: &mut String, depth: usize) {
        if !word.is_empty() {
            if depth == 0 {
                self.top_level_words.push(word.to_uppercase());
            }
            word.clear();
        }
    }
}
