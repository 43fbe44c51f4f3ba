use std::collections::BTreeMap;
use std::fmt;

use schemars::JsonSchema;
use serde::de::{MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};

/// A scenario: which tables to fill, how many rows, and how child columns
/// bind to parent keys.
///
/// `tables` accepts an object keyed by table name (document order is kept)
/// or an array of entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Scenario {
    /// Tables in insertion order.
    #[serde(deserialize_with = "deserialize_tables")]
    #[schemars(with = "TablesShape")]
    pub tables: Vec<ScenarioTable>,
}

impl Scenario {
    pub fn total_rows(&self) -> u64 {
        self.tables
            .iter()
            .fold(0u64, |total, table| total.saturating_add(table.count))
    }
}

/// One table entry of a scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ScenarioTable {
    /// Table name as declared in the schema.
    pub table: String,
    /// Number of rows to insert.
    #[serde(default)]
    pub count: u64,
    /// Local column -> `parentTable.parentColumn`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub relations: BTreeMap<String, String>,
}

/// Value of an entry in the keyed form of `tables`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    /// Number of rows to insert.
    #[serde(default)]
    pub count: u64,
    /// Local column -> `parentTable.parentColumn`.
    #[serde(default)]
    pub relations: BTreeMap<String, String>,
}

// Only describes the accepted JSON shapes for the generated JSON Schema.
#[allow(dead_code)]
#[derive(JsonSchema)]
#[serde(untagged)]
enum TablesShape {
    Keyed(BTreeMap<String, TableSpec>),
    Listed(Vec<ScenarioTable>),
}

/// Parsed `parentTable.parentColumn` reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationRef {
    pub table: String,
    pub column: String,
}

impl RelationRef {
    /// Split on the last `.`; both sides must be non-empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let (table, column) = raw.trim().rsplit_once('.')?;
        if table.is_empty() || column.is_empty() || column.contains(char::is_whitespace) {
            return None;
        }
        Some(Self {
            table: table.to_string(),
            column: column.to_string(),
        })
    }
}

impl fmt::Display for RelationRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

fn deserialize_tables<'de, D>(deserializer: D) -> Result<Vec<ScenarioTable>, D::Error>
where
    D: Deserializer<'de>,
{
    struct TablesVisitor;

    impl<'de> Visitor<'de> for TablesVisitor {
        type Value = Vec<ScenarioTable>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("an object keyed by table name or an array of tables")
        }

        fn visit_map<A>(self, mut map: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut tables = Vec::new();
            while let Some((table, spec)) = map.next_entry::<String, TableSpec>()? {
                tables.push(ScenarioTable {
                    table,
                    count: spec.count,
                    relations: spec.relations,
                });
            }
            Ok(tables)
        }

        fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
        where
            A: SeqAccess<'de>,
        {
            let mut tables = Vec::new();
            while let Some(table) = seq.next_element::<ScenarioTable>()? {
                tables.push(table);
            }
            Ok(tables)
        }
    }

    deserializer.deserialize_any(TablesVisitor)
}
