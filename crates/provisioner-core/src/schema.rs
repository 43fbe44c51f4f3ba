use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constraints::{ForeignKey, UniqueConstraint};
use crate::types::ColumnKind;
use crate::value::GeneratedValue;

/// Parsed schema for one profile: tables in DDL order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaModel {
    pub tables: Vec<Table>,
}

impl SchemaModel {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    pub fn table(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|table| table.name == name)
    }

    pub fn table_names(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().map(|table| table.name.as_str())
    }

    /// Render the model back into canonical DDL.
    pub fn to_ddl(&self) -> String {
        self.tables
            .iter()
            .map(Table::to_ddl)
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Hex SHA-256 of the canonical rendering; stable across formatting changes.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.to_ddl().as_bytes());
        hex::encode(digest)
    }
}

/// A table with a single auto-increment integer primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<Column>,
    pub primary_key: String,
    pub foreign_keys: Vec<ForeignKey>,
    pub unique_constraints: Vec<UniqueConstraint>,
}

impl Table {
    /// Column lookup; MySQL column names are case-insensitive.
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|column| column.name.eq_ignore_ascii_case(name))
    }

    pub fn primary_key_column(&self) -> Option<&Column> {
        self.column(&self.primary_key)
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_key.eq_ignore_ascii_case(column)
    }

    /// Declared single-column foreign key on `column`, if any.
    pub fn foreign_key_for(&self, column: &str) -> Option<(&ForeignKey, &str)> {
        self.foreign_keys
            .iter()
            .find_map(|fk| fk.single_column_target(column).map(|target| (fk, target)))
    }

    pub fn to_ddl(&self) -> String {
        let mut items: Vec<String> = self.columns.iter().map(Column::to_ddl).collect();
        items.push(format!("PRIMARY KEY ({})", quote_ident(&self.primary_key)));

        for unique in &self.unique_constraints {
            let name = unique
                .name
                .as_ref()
                .map(|name| format!(" {}", quote_ident(name)))
                .unwrap_or_default();
            items.push(format!("UNIQUE KEY{name} ({})", quote_list(&unique.columns)));
        }

        for fk in &self.foreign_keys {
            let mut item = String::new();
            if let Some(name) = &fk.name {
                item.push_str(&format!("CONSTRAINT {} ", quote_ident(name)));
            }
            item.push_str(&format!(
                "FOREIGN KEY ({}) REFERENCES {} ({})",
                quote_list(&fk.columns),
                quote_ident(&fk.referenced_table),
                quote_list(&fk.referenced_columns)
            ));
            if let Some(action) = fk.on_delete {
                item.push_str(&format!(" ON DELETE {}", action.as_sql()));
            }
            if let Some(action) = fk.on_update {
                item.push_str(&format!(" ON UPDATE {}", action.as_sql()));
            }
            items.push(item);
        }

        format!(
            "CREATE TABLE {} (\n  {}\n);",
            quote_ident(&self.name),
            items.join(",\n  ")
        )
    }
}

/// Column metadata captured from a column definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub ordinal_position: u16,
    pub name: String,
    /// Declared type as written, normalized to lowercase (e.g. `varchar(64)`).
    pub data_type: String,
    pub kind: ColumnKind,
    pub is_nullable: bool,
    /// Raw default expression when `DEFAULT` is present.
    pub default: Option<String>,
    pub is_auto_increment: bool,
    pub is_primary: bool,
    pub is_unique: bool,
    /// Expression of a `GENERATED ALWAYS AS` column.
    pub generated: Option<String>,
}

impl Column {
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Whether a value for this column is ever supplied on insert.
    pub fn is_insertable(&self) -> bool {
        !self.is_primary && !self.is_auto_increment && self.generated.is_none()
    }

    /// Whether `value` satisfies this column's kind, bounds and nullability.
    pub fn accepts(&self, value: &GeneratedValue) -> bool {
        if value.is_null() {
            return self.is_nullable;
        }

        match (&self.kind, value) {
            (ColumnKind::Integer { min, max }, GeneratedValue::Int(value)) => {
                (*min..=*max).contains(value)
            }
            (ColumnKind::Decimal { precision, scale }, GeneratedValue::Decimal(text)) => {
                decimal_fits(text, *precision, *scale)
            }
            (ColumnKind::Float, GeneratedValue::Float(value)) => value.is_finite(),
            (ColumnKind::Boolean, GeneratedValue::Bool(_)) => true,
            (ColumnKind::String { max_len }, GeneratedValue::Text(text)) => max_len
                .map(|max| text.chars().count() <= max as usize)
                .unwrap_or(true),
            (ColumnKind::Text { max_len }, GeneratedValue::Text(text)) => {
                text.len() <= *max_len as usize
            }
            (ColumnKind::Date, GeneratedValue::Date(_)) => true,
            (ColumnKind::DateTime, GeneratedValue::DateTime(_)) => true,
            (ColumnKind::Time, GeneratedValue::Time(_)) => true,
            (ColumnKind::Json, GeneratedValue::Json(text)) => {
                serde_json::from_str::<serde_json::Value>(text).is_ok()
            }
            (ColumnKind::Enum { values }, GeneratedValue::Text(text)) => {
                if values.is_empty() {
                    !text.is_empty() && text.chars().all(|ch| ch.is_ascii_alphanumeric())
                } else {
                    values.iter().any(|allowed| allowed == text)
                }
            }
            _ => false,
        }
    }

    pub fn to_ddl(&self) -> String {
        let mut out = format!("{} {}", quote_ident(&self.name), self.data_type);
        if let Some(expr) = &self.generated {
            out.push_str(&format!(" GENERATED ALWAYS AS ({expr})"));
        }
        out.push_str(if self.is_nullable { " NULL" } else { " NOT NULL" });
        if let Some(default) = &self.default {
            out.push_str(&format!(" DEFAULT {default}"));
        }
        if self.is_auto_increment {
            out.push_str(" AUTO_INCREMENT");
        }
        if self.is_unique {
            out.push_str(" UNIQUE");
        }
        out
    }
}

/// Quote an identifier with backticks, doubling embedded backticks.
pub fn quote_ident(name: &str) -> String {
    format!("`{}`", name.replace('`', "``"))
}

fn quote_list(names: &[String]) -> String {
    names
        .iter()
        .map(|name| quote_ident(name))
        .collect::<Vec<_>>()
        .join(", ")
}

fn decimal_fits(text: &str, precision: u32, scale: u32) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    if int_part.is_empty()
        || !int_part.bytes().all(|byte| byte.is_ascii_digit())
        || !frac_part.bytes().all(|byte| byte.is_ascii_digit())
    {
        return false;
    }
    let significant = int_part.trim_start_matches('0').len() as u32;
    significant <= precision.saturating_sub(scale) && frac_part.len() as u32 <= scale
}
