//! Core schema model for the test-data provisioner.
//!
//! This crate owns the parsed table model, the MySQL DDL parser, the value
//! type produced by generation, and small helpers shared by the other crates.

pub mod constraints;
pub mod ddl;
pub mod error;
pub mod redaction;
pub mod schema;
pub mod types;
pub mod value;

pub use constraints::{FkAction, ForeignKey, UniqueConstraint};
pub use ddl::parse_ddl;
pub use error::{Result, SchemaParseError};
pub use redaction::{RedactedConnection, redact_connection_url};
pub use schema::{Column, SchemaModel, Table, quote_ident};
pub use types::{ColumnKind, kind_for_type};
pub use value::GeneratedValue;
