use serde::{Deserialize, Serialize};

/// Unique constraint definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    pub name: Option<String>,
    pub columns: Vec<String>,
}

/// Foreign key action semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FkAction {
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl FkAction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            FkAction::NoAction => "NO ACTION",
            FkAction::Restrict => "RESTRICT",
            FkAction::Cascade => "CASCADE",
            FkAction::SetNull => "SET NULL",
            FkAction::SetDefault => "SET DEFAULT",
        }
    }
}

/// Foreign key declared in DDL, preserving column ordering.
///
/// Declared keys are informational: generation follows scenario relations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForeignKey {
    pub name: Option<String>,
    pub columns: Vec<String>,
    pub referenced_table: String,
    pub referenced_columns: Vec<String>,
    pub on_update: Option<FkAction>,
    pub on_delete: Option<FkAction>,
}

impl ForeignKey {
    /// Returns the referenced column when this key covers exactly `column`.
    pub fn single_column_target(&self, column: &str) -> Option<&str> {
        match (self.columns.as_slice(), self.referenced_columns.as_slice()) {
            ([local], [target]) if local.eq_ignore_ascii_case(column) => Some(target.as_str()),
            _ => None,
        }
    }
}
