use serde::Serialize;
use thiserror::Error;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue with location and hint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ValidationIssue {
    pub fn new(
        severity: IssueSeverity,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            path: path.into(),
            message: message.into(),
            hint,
        }
    }

    pub fn warning(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self::new(IssueSeverity::Warning, code, path, message, hint)
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// One line per error, `path: message`.
    pub fn summary(&self) -> String {
        self.errors
            .iter()
            .map(|issue| format!("{}: {}", issue.path, issue.message))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// Failures while loading or shape-checking a scenario document.
#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("scenario does not match the expected shape: {}", .0.summary())]
    Shape(ValidationReport),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for scenario loading.
pub type Result<T> = std::result::Result<T, ScenarioError>;

/// Scenario does not fit the schema, or its relation order is wrong.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("table `{table}` is not defined in the schema")]
    UnknownTable { table: String },
    #[error("table `{table}` is listed more than once in the scenario")]
    DuplicateTable { table: String },
    #[error("invalid relation on `{table}.{column}`: {reason}")]
    InvalidRelation {
        table: String,
        column: String,
        reason: String,
    },
    #[error("column `{table}.{column}` does not exist")]
    UnknownColumn { table: String, column: String },
    #[error(
        "relation `{table}.{column}` references `{parent}`, which is not listed earlier in the scenario"
    )]
    UnresolvedRelation {
        table: String,
        column: String,
        parent: String,
    },
    #[error(
        "relation `{table}.{column}` targets `{parent}.{parent_column}`, which is not the primary key of `{parent}`"
    )]
    RelationTargetNotPrimaryKey {
        table: String,
        column: String,
        parent: String,
        parent_column: String,
    },
}
