//! SQL salvage from free-form model output.
//!
//! The model is asked for bare SQL but often wraps it in markdown, prefixes it
//! with chatter, or appends an explanation. [`extract_sql`] recovers a single
//! statement in priority order:
//!
//! 1. the first ```` ```sql ```` fenced block, verbatim
//! 2. otherwise the first fenced block of any kind
//! 3. otherwise lead-in phrases are stripped and lines are kept while they
//!    look like SQL, stopping at the first explanatory line
//! 4. kept lines are joined with single spaces
//! 5. the result is cut after the first complete statement
//!
//! This is a heuristic, not a parser.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    static ref SQL_FENCE: Regex =
        Regex::new(r"(?is)```sql\b\s*(.*?)\s*```").expect("sql fence regex");
    static ref ANY_FENCE: Regex = Regex::new(r"(?s)```\s*(.*?)\s*```").expect("fence regex");
    static ref SQL_KEYWORD: Regex = Regex::new(
        r"(?i)\b(SELECT|FROM|WHERE|JOIN|ORDER|GROUP|HAVING|UNION|WITH|LIMIT|INSERT|UPDATE|DELETE)\b"
    )
    .expect("keyword regex");
    static ref JOIN_PREDICATE: Regex = Regex::new(r"(?i)\bON\b").expect("join regex");
    static ref CLAUSE_CONTINUATION: Regex =
        Regex::new(r"(?i)^(AND|OR|AS|CASE|WHEN|THEN|ELSE|END|DESC|ASC|BY|OFFSET)\b")
            .expect("continuation regex");
}

/// Lead-in phrases and stop phrases for one agent's output.
#[derive(Debug, Clone, Copy)]
pub struct ExtractionProfile {
    /// Stripped from the start of the response (case-insensitive)
    pub lead_ins: &'static [&'static str],
    /// A line starting with one of these ends the statement (case-insensitive)
    pub stop_phrases: &'static [&'static str],
}

pub const SYNTHESIS_PROFILE: ExtractionProfile = ExtractionProfile {
    lead_ins: &[
        "Here's the SQL query:",
        "Here is the SQL query:",
        "The SQL query is:",
        "Query:",
        "SQL:",
        "SQL Query:",
        "The query:",
        "Here is the query:",
        "Based on the schema,",
    ],
    stop_phrases: &["this query", "the query", "explanation:", "note:"],
};

pub const REPAIR_PROFILE: ExtractionProfile = ExtractionProfile {
    lead_ins: &[
        "Here's the corrected SQL query:",
        "The corrected SQL query is:",
        "Here's the fixed SQL query:",
        "The fixed SQL query is:",
        "Here's the SQL query:",
        "The SQL query is:",
        "Query:",
        "SQL:",
        "SQL Query:",
        "Fixed query:",
        "Corrected query:",
    ],
    stop_phrases: &["this query", "the query", "explanation:", "note:", "this fixes"],
};

/// Nothing resembling SQL was found. Carries the cleaned text so callers can
/// still pass it on as a best-effort candidate.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[error("no SQL statement found in model output")]
pub struct SalvageFailure {
    pub remainder: String,
}

impl SalvageFailure {
    pub fn into_remainder(self) -> String {
        self.remainder
    }
}

/// Salvage a single SQL statement from `response`.
pub fn extract_sql(
    response: &str,
    profile: &ExtractionProfile,
) -> std::result::Result<String, SalvageFailure> {
    if let Some(block) = first_capture(&SQL_FENCE, response) {
        return non_empty(block, response);
    }
    if let Some(block) = first_capture(&ANY_FENCE, response) {
        return non_empty(drop_info_string(block), response);
    }

    let cleaned = strip_lead_ins(response.trim(), profile.lead_ins);

    let mut kept: Vec<&str> = Vec::new();
    for line in cleaned.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if profile.stop_phrases.iter().any(|p| lower.starts_with(p)) {
            break;
        }
        if is_sql_line(line, !kept.is_empty()) {
            kept.push(line);
        }
    }

    let joined = kept.join(" ");
    let sql = truncate_after_first_statement(&joined).trim().to_string();
    if sql.is_empty() {
        Err(SalvageFailure {
            remainder: cleaned.trim().to_string(),
        })
    } else {
        Ok(sql)
    }
}

/// [`extract_sql`] or, failing that, the cleaned remainder.
pub fn salvage_sql(response: &str, profile: &ExtractionProfile) -> String {
    extract_sql(response, profile).unwrap_or_else(SalvageFailure::into_remainder)
}

fn first_capture<'a>(re: &Regex, text: &'a str) -> Option<&'a str> {
    re.captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
}

fn non_empty(block: &str, response: &str) -> std::result::Result<String, SalvageFailure> {
    if block.is_empty() {
        Err(SalvageFailure {
            remainder: response.trim().to_string(),
        })
    } else {
        Ok(block.to_string())
    }
}

/// A fence like ```` ```sqlite ```` leaves its language tag on the first line.
fn drop_info_string(block: &str) -> &str {
    if let Some((first, rest)) = block.split_once('\n') {
        let tag = first.trim();
        let looks_like_tag = !tag.is_empty()
            && tag.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
            && !SQL_KEYWORD.is_match(tag);
        if looks_like_tag {
            return rest.trim();
        }
    }
    block
}

fn strip_lead_ins<'a>(text: &'a str, lead_ins: &[&str]) -> &'a str {
    let mut cleaned = text;
    for prefix in lead_ins {
        let matches = cleaned
            .get(..prefix.len())
            .map_or(false, |head| head.eq_ignore_ascii_case(prefix));
        if matches {
            cleaned = cleaned[prefix.len()..].trim();
        }
    }
    cleaned
}

fn is_sql_line(line: &str, in_statement: bool) -> bool {
    if SQL_KEYWORD.is_match(line) {
        return true;
    }
    if line.ends_with(';') || line.ends_with(',') || JOIN_PREDICATE.is_match(line) {
        return true;
    }
    // Inside a statement, clause tails such as `SUM(x) AS total` carry no
    // leading keyword but are clearly not prose.
    in_statement
        && (CLAUSE_CONTINUATION.is_match(line)
            || line.contains(|c: char| matches!(c, '(' | ')' | '=' | '<' | '>' | '*')))
}

/// Cut after the first `;` that is not inside a quoted literal.
fn truncate_after_first_statement(sql: &str) -> &str {
    let mut quote: Option<char> = None;
    for (idx, c) in sql.char_indices() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => quote = Some(c),
                ';' => return &sql[..=idx],
                _ => {}
            },
        }
    }
    sql
}

#[cfg(test)]
mod tests {
    use super::*;

    fn squash(s: &str) -> String {
        s.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn test_sql_fence_with_lead_in() {
        let sql = extract_sql("Here's the SQL query: ```sql\nSELECT 1;\n```", &SYNTHESIS_PROFILE);
        assert_eq!(sql.unwrap(), "SELECT 1;");
    }

    #[test]
    fn test_sql_fence_case_insensitive_and_first_wins() {
        let response = "```SQL\nSELECT a FROM t;\n```\nor\n```sql\nSELECT b FROM t;\n```";
        assert_eq!(extract_sql(response, &SYNTHESIS_PROFILE).unwrap(), "SELECT a FROM t;");
    }

    #[test]
    fn test_sql_fence_preserves_content_verbatim() {
        let response = "```sql\nSELECT name,\n  price\nFROM products\n```";
        assert_eq!(
            extract_sql(response, &SYNTHESIS_PROFILE).unwrap(),
            "SELECT name,\n  price\nFROM products"
        );
    }

    #[test]
    fn test_plain_fence() {
        let response = "Sure!\n```\nSELECT COUNT(*) FROM customers;\n```\nHope that helps.";
        assert_eq!(
            extract_sql(response, &SYNTHESIS_PROFILE).unwrap(),
            "SELECT COUNT(*) FROM customers;"
        );
    }

    #[test]
    fn test_plain_fence_with_language_tag() {
        let response = "```sqlite\nSELECT 1;\n```";
        assert_eq!(extract_sql(response, &SYNTHESIS_PROFILE).unwrap(), "SELECT 1;");

        let bare_select = "```\nSELECT\n  name\nFROM t\n```";
        assert!(extract_sql(bare_select, &SYNTHESIS_PROFILE).unwrap().starts_with("SELECT"));
    }

    #[test]
    fn test_clean_input_is_unchanged() {
        let sql = "SELECT customer_id FROM orders GROUP BY customer_id ORDER BY SUM(total_amount) DESC LIMIT 1;";
        assert_eq!(extract_sql(sql, &SYNTHESIS_PROFILE).unwrap(), sql);
    }

    #[test]
    fn test_clean_multiline_input_is_unchanged_modulo_whitespace() {
        let sql = "SELECT customer_id,\n       SUM(total_amount) AS total\nFROM orders\nGROUP BY customer_id\nORDER BY total DESC\nLIMIT 1;";
        let out = extract_sql(sql, &SYNTHESIS_PROFILE).unwrap();
        assert_eq!(squash(&out), squash(sql));
    }

    #[test]
    fn test_lead_in_and_trailing_explanation() {
        let response = "SQL Query:\nSELECT product_name FROM products\nORDER BY price DESC LIMIT 1;\nThis query returns the most expensive product.";
        assert_eq!(
            extract_sql(response, &SYNTHESIS_PROFILE).unwrap(),
            "SELECT product_name FROM products ORDER BY price DESC LIMIT 1;"
        );
    }

    #[test]
    fn test_stops_at_explanation_even_with_keywords() {
        let response = "SELECT city FROM customers\nExplanation: we select from customers where needed";
        assert_eq!(
            extract_sql(response, &SYNTHESIS_PROFILE).unwrap(),
            "SELECT city FROM customers"
        );
    }

    #[test]
    fn test_prose_lines_dropped() {
        let response = "Sure thing.\nSELECT T2.product_name FROM order_items T1\nJOIN products T2\nON T1.product_id = T2.product_id;\n";
        assert_eq!(
            extract_sql(response, &SYNTHESIS_PROFILE).unwrap(),
            "SELECT T2.product_name FROM order_items T1 JOIN products T2 ON T1.product_id = T2.product_id;"
        );
    }

    #[test]
    fn test_truncates_to_first_statement_outside_quotes() {
        let response = "SELECT name FROM t WHERE note = 'a;b'; SELECT 2;";
        assert_eq!(
            extract_sql(response, &SYNTHESIS_PROFILE).unwrap(),
            "SELECT name FROM t WHERE note = 'a;b';"
        );
    }

    #[test]
    fn test_repair_profile_lead_ins_and_stops() {
        let response = "Corrected query:\nSELECT T1.city FROM customers T1\nThis fixes the ambiguous column.";
        assert_eq!(
            extract_sql(response, &REPAIR_PROFILE).unwrap(),
            "SELECT T1.city FROM customers T1"
        );
    }

    #[test]
    fn test_no_sql_is_salvage_failure() {
        let response = "I'm sorry, I cannot answer that.";
        let err = extract_sql(response, &SYNTHESIS_PROFILE).unwrap_err();
        assert_eq!(err.remainder, response);
        assert_eq!(salvage_sql(response, &SYNTHESIS_PROFILE), response);
    }

    #[test]
    fn test_empty_fence_is_salvage_failure() {
        assert!(extract_sql("```sql\n```", &SYNTHESIS_PROFILE).is_err());
    }
}
