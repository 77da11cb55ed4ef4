//! Typed readings of free-text model replies. Anything unexpected maps to an explicit
//! `Unrecognized` variant which the orchestrator treats permissively.

const FENCE: &str = "```";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClarifyDecision {
    Proceed(String),
    NeedsClarification(String),
    Unrecognized(String),
}

impl ClarifyDecision {
    pub fn parse(raw: &str) -> Self {
        let text = strip_decoration(raw);
        if let Some(rest) = strip_token(text, "NEEDS_CLARIFICATION") {
            return ClarifyDecision::NeedsClarification(rest.to_string());
        }
        if let Some(rest) = strip_token(text, "PROCEED") {
            return ClarifyDecision::Proceed(rest.to_string());
        }
        ClarifyDecision::Unrecognized(raw.trim().to_string())
    }

    pub fn outcome(&self) -> &'static str {
        match self {
            ClarifyDecision::Proceed(_) => "proceed",
            ClarifyDecision::NeedsClarification(_) => "needs_clarification",
            ClarifyDecision::Unrecognized(_) => "unrecognized",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolSelection {
    TranscriptsOnly,
    StructuredOnly,
    Both,
}

impl ToolSelection {
    pub fn uses_structured(self) -> bool {
        matches!(self, ToolSelection::StructuredOnly | ToolSelection::Both)
    }

    pub fn uses_transcripts(self) -> bool {
        matches!(self, ToolSelection::TranscriptsOnly | ToolSelection::Both)
    }

    pub fn label(self) -> &'static str {
        match self {
            ToolSelection::TranscriptsOnly => "DOCS_ONLY",
            ToolSelection::StructuredOnly => "SQL_ONLY",
            ToolSelection::Both => "BOTH",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    Selected(ToolSelection),
    Unrecognized(String),
}

impl ToolChoice {
    pub fn parse(raw: &str) -> Self {
        let upper = raw.to_ascii_uppercase();
        if upper.contains("BOTH") {
            return ToolChoice::Selected(ToolSelection::Both);
        }
        match (upper.contains("SQL"), upper.contains("DOCS")) {
            (true, true) => ToolChoice::Selected(ToolSelection::Both),
            (true, false) => ToolChoice::Selected(ToolSelection::StructuredOnly),
            (false, true) => ToolChoice::Selected(ToolSelection::TranscriptsOnly),
            (false, false) => ToolChoice::Unrecognized(raw.trim().to_string()),
        }
    }

    /// Unrecognized replies consult both sources.
    pub fn resolve(&self) -> ToolSelection {
        match self {
            ToolChoice::Selected(s) => *s,
            ToolChoice::Unrecognized(_) => ToolSelection::Both,
        }
    }
}

/// Pull the query text out of a model reply.
///
/// A fenced reply contributes the text between its first two fences, minus a leading
/// language tag. Trailing `;` are removed so the gate sees a bare statement.
pub fn extract_query_text(raw: &str) -> String {
    let text = raw.trim();
    let body = match text.find(FENCE) {
        Some(start) => {
            let after = &text[start + FENCE.len()..];
            let inner = match after.find(FENCE) {
                Some(end) => &after[..end],
                None => after,
            };
            drop_language_tag(inner)
        }
        None => text,
    };
    body.trim()
        .trim_end_matches(|c: char| c == ';' || c.is_whitespace())
        .to_string()
}

fn drop_language_tag(inner: &str) -> &str {
    let inner = inner.trim_start_matches([' ', '\t']);
    let (first, rest) = match inner.split_once(char::is_whitespace) {
        Some(parts) => parts,
        None => return inner,
    };
    let is_tag = !first.is_empty()
        && first
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        && !first.eq_ignore_ascii_case("select")
        && !first.eq_ignore_ascii_case("with");
    if is_tag {
        rest
    } else {
        inner
    }
}

fn strip_decoration(raw: &str) -> &str {
    raw.trim()
        .trim_matches(|c: char| c == '"' || c == '\'' || c == '*' || c == '`')
        .trim()
}

fn strip_token<'a>(text: &'a str, token: &str) -> Option<&'a str> {
    let head = text.get(..token.len())?;
    if !head.eq_ignore_ascii_case(token) {
        return None;
    }
    let rest = &text[token.len()..];
    if rest.starts_with(|c: char| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    Some(rest.trim_start_matches(|c: char| c == ':' || c.is_whitespace()).trim())
}
