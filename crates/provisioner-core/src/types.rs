use serde::{Deserialize, Serialize};

/// Semantic kind derived from a column's declared SQL type.
///
/// The kind drives value generation; the declared type text is kept on the
/// column for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ColumnKind {
    /// Integer with the inclusive bounds of the declared type.
    Integer { min: i64, max: i64 },
    /// Fixed-point number (`DECIMAL(precision, scale)`).
    Decimal { precision: u32, scale: u32 },
    /// Approximate number (`FLOAT`, `DOUBLE`, `REAL`).
    Float,
    Boolean,
    /// Short character data; `max_len` counts characters.
    String { max_len: Option<u32> },
    /// Long character or binary data; `max_len` counts bytes.
    Text { max_len: u32 },
    Date,
    DateTime,
    Time,
    Json,
    /// Enum-like column; empty `values` means the allowed set is unknown.
    Enum { values: Vec<String> },
}

impl ColumnKind {
    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnKind::Integer { .. })
    }

    /// Short label used in reports and logs.
    pub fn label(&self) -> &'static str {
        match self {
            ColumnKind::Integer { .. } => "integer",
            ColumnKind::Decimal { .. } => "decimal",
            ColumnKind::Float => "float",
            ColumnKind::Boolean => "boolean",
            ColumnKind::String { .. } => "string",
            ColumnKind::Text { .. } => "text",
            ColumnKind::Date => "date",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Time => "time",
            ColumnKind::Json => "json",
            ColumnKind::Enum { .. } => "enum",
        }
    }
}

const TEXT_MAX: u32 = 65_535;
const MEDIUM_TEXT_MAX: u32 = 16_777_215;

/// Map a declared type keyword and its arguments to a semantic kind.
///
/// `args` holds the raw parenthesized arguments (string literals unquoted).
/// Unrecognized types map to an unbounded string.
pub fn kind_for_type(type_name: &str, args: &[String], unsigned: bool) -> ColumnKind {
    let name = type_name.to_ascii_uppercase();
    let first_arg = args.first().and_then(|value| value.parse::<u32>().ok());

    match name.as_str() {
        "TINYINT" if first_arg == Some(1) => ColumnKind::Boolean,
        "BOOL" | "BOOLEAN" => ColumnKind::Boolean,
        "BIT" if first_arg.unwrap_or(1) == 1 => ColumnKind::Boolean,
        "BIT" => {
            let bits = first_arg.unwrap_or(1).min(63);
            ColumnKind::Integer {
                min: 0,
                max: (1_i64 << bits) - 1,
            }
        }
        "TINYINT" => integer_bounds(8, unsigned),
        "SMALLINT" => integer_bounds(16, unsigned),
        "MEDIUMINT" => integer_bounds(24, unsigned),
        "INT" | "INTEGER" => integer_bounds(32, unsigned),
        "BIGINT" | "SERIAL" => integer_bounds(64, unsigned || name == "SERIAL"),
        "YEAR" => ColumnKind::Integer {
            min: 1901,
            max: 2155,
        },
        "DECIMAL" | "DEC" | "NUMERIC" | "FIXED" => ColumnKind::Decimal {
            precision: first_arg.unwrap_or(10).clamp(1, 65),
            scale: args
                .get(1)
                .and_then(|value| value.parse::<u32>().ok())
                .unwrap_or(0)
                .min(30),
        },
        "FLOAT" | "DOUBLE" | "REAL" => ColumnKind::Float,
        "CHAR" | "NCHAR" | "BINARY" => ColumnKind::String {
            max_len: Some(first_arg.unwrap_or(1)),
        },
        "VARCHAR" | "NVARCHAR" | "VARBINARY" => ColumnKind::String {
            max_len: first_arg,
        },
        "TINYTEXT" | "TINYBLOB" => ColumnKind::Text { max_len: 255 },
        "TEXT" | "BLOB" => ColumnKind::Text {
            max_len: first_arg.unwrap_or(TEXT_MAX),
        },
        "MEDIUMTEXT" | "MEDIUMBLOB" => ColumnKind::Text {
            max_len: MEDIUM_TEXT_MAX,
        },
        "LONGTEXT" | "LONGBLOB" => ColumnKind::Text { max_len: u32::MAX },
        "DATE" => ColumnKind::Date,
        "DATETIME" | "TIMESTAMP" => ColumnKind::DateTime,
        "TIME" => ColumnKind::Time,
        "JSON" => ColumnKind::Json,
        "ENUM" | "SET" => ColumnKind::Enum {
            values: args.to_vec(),
        },
        _ => ColumnKind::String { max_len: None },
    }
}

fn integer_bounds(bits: u32, unsigned: bool) -> ColumnKind {
    if bits >= 64 {
        let min = if unsigned { 0 } else { i64::MIN };
        return ColumnKind::Integer { min, max: i64::MAX };
    }
    if unsigned {
        ColumnKind::Integer {
            min: 0,
            max: (1_i64 << bits) - 1,
        }
    } else {
        ColumnKind::Integer {
            min: -(1_i64 << (bits - 1)),
            max: (1_i64 << (bits - 1)) - 1,
        }
    }
}
