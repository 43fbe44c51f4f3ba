use thiserror::Error;

const STATEMENT_PREVIEW_CHARS: usize = 160;

/// Malformed or unsupported DDL.
///
/// Carries a single-line preview of the offending statement.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("schema parse error: {reason} (statement: `{statement}`)")]
pub struct SchemaParseError {
    pub statement: String,
    pub reason: String,
}

impl SchemaParseError {
    pub fn new(statement: &str, reason: impl Into<String>) -> Self {
        Self {
            statement: preview(statement),
            reason: reason.into(),
        }
    }
}

/// Convenience alias for DDL parsing results.
pub type Result<T> = std::result::Result<T, SchemaParseError>;

fn preview(statement: &str) -> String {
    let collapsed = statement.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= STATEMENT_PREVIEW_CHARS {
        return collapsed;
    }
    let mut cut: String = collapsed.chars().take(STATEMENT_PREVIEW_CHARS).collect();
    cut.push_str("...");
    cut
}
