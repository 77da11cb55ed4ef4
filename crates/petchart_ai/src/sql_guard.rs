//! Read-only gate for model-generated SQL.
//!
//! This is a lexical heuristic, not a SQL parser. It rejects anything that does not open
//! with `SELECT`, anything mentioning a mutating or administrative keyword as a whole word,
//! and anything with more than one `;`. Execution adds two more backstops: the diagnostics
//! database is opened read-only and SQLite must classify the prepared statement as read-only.

use std::fmt;
use std::sync::OnceLock;

use regex::{Captures, Regex};

pub const FORBIDDEN_KEYWORDS: [&str; 11] = [
    "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "ATTACH", "DETACH", "PRAGMA", "VACUUM",
    "CREATE", "REPLACE",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotReadStatement,
    ForbiddenKeyword(&'static str),
    MultipleStatements,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rejection::NotReadStatement => write!(f, "not a read statement"),
            Rejection::ForbiddenKeyword(k) => write!(f, "forbidden keyword: {k}"),
            Rejection::MultipleStatements => write!(f, "multiple statements"),
        }
    }
}

fn keyword_patterns() -> &'static Vec<(&'static str, Regex)> {
    static PATTERNS: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        FORBIDDEN_KEYWORDS
            .iter()
            .map(|k| {
                let re = Regex::new(&format!(r"(?i)\b{k}\b")).expect("keyword pattern is valid");
                (*k, re)
            })
            .collect()
    })
}

fn select_prefix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)^SELECT\b").expect("select pattern is valid"))
}

fn limit_literal() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // LIMIT <count> or SQLite's LIMIT <offset>, <count>.
    RE.get_or_init(|| {
        Regex::new(r"(?i)\bLIMIT\s+(-?\d+)(?:\s*,\s*(-?\d+))?").expect("limit pattern is valid")
    })
}

/// Accept `query` only if it looks like a single read statement.
///
/// Keywords are checked first so a write statement is reported by the keyword it uses.
pub fn check_read_only(query: &str) -> Result<(), Rejection> {
    for (keyword, re) in keyword_patterns() {
        if re.is_match(query) {
            tracing::warn!(keyword, "query rejected by safety gate");
            return Err(Rejection::ForbiddenKeyword(keyword));
        }
    }

    if !select_prefix().is_match(query.trim()) {
        tracing::warn!("query rejected by safety gate: not a SELECT");
        return Err(Rejection::NotReadStatement);
    }

    // A single trailing terminator is fine; two or more means stacked statements.
    if query.matches(';').count() > 1 {
        tracing::warn!("query rejected by safety gate: multiple statements");
        return Err(Rejection::MultipleStatements);
    }

    Ok(())
}

/// Tuple form used by callers that only need a flag and a message.
pub fn is_safe(query: &str) -> (bool, String) {
    match check_read_only(query) {
        Ok(()) => (true, String::new()),
        Err(r) => (false, r.to_string()),
    }
}

fn within_cap(raw: &str, max_rows: u64) -> bool {
    match raw.parse::<i128>() {
        Ok(v) => v >= 0 && v <= max_rows as i128,
        Err(_) => false,
    }
}

/// Parenthesis depth at byte offset `at`. Used to tell an outer LIMIT from a subquery's.
fn paren_depth(query: &str, at: usize) -> i64 {
    query[..at].chars().fold(0, |depth, c| match c {
        '(' => depth + 1,
        ')' => depth - 1,
        _ => depth,
    })
}

/// Clamp the row limit of an already-accepted query to `max_rows`.
///
/// Existing literal limits above the cap (or negative, which SQLite treats as unbounded)
/// are rewritten; limits within the cap are left alone. When the outer query has no
/// literal limit (a subquery's does not count), one is appended before any trailing `;`,
/// on its own line if the last line carries a `--` comment. Never rejects, and applying
/// it twice changes nothing.
pub fn enforce_cap(query: &str, max_rows: u64) -> String {
    let re = limit_literal();
    let clamped = re
        .replace_all(query, |caps: &Captures<'_>| match caps.get(2) {
            Some(count) if within_cap(count.as_str(), max_rows) => caps[0].to_string(),
            Some(_) => format!("LIMIT {}, {max_rows}", &caps[1]),
            None if within_cap(&caps[1], max_rows) => caps[0].to_string(),
            None => format!("LIMIT {max_rows}"),
        })
        .into_owned();

    let has_outer_limit = re
        .find_iter(&clamped)
        .any(|m| paren_depth(&clamped, m.start()) <= 0);
    if has_outer_limit {
        return clamped;
    }

    let trimmed = clamped.trim_end();
    let (body, terminator) = match trimmed.strip_suffix(';') {
        Some(body) => (body.trim_end(), ";"),
        None => (trimmed, ""),
    };
    let last_line = body.rsplit('\n').next().unwrap_or(body);
    let sep = if last_line.contains("--") { "\n" } else { " " };
    format!("{body}{sep}LIMIT {max_rows}{terminator}")
}
