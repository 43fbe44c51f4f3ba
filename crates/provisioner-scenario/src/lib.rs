//! Scenario documents and their binding to a parsed schema.
//!
//! A scenario lists tables in insertion order with row counts and the
//! relations that tie child columns to parent primary keys.

pub mod errors;
pub mod model;
pub mod resolve;
pub mod schema;
pub mod validate;

pub use errors::{
    IssueSeverity, ResolveError, Result, ScenarioError, ValidationIssue, ValidationReport,
};
pub use model::{RelationRef, Scenario, ScenarioTable, TableSpec};
pub use resolve::{ResolvedRelation, ResolvedScenario, ResolvedTable, resolve};
pub use schema::scenario_json_schema;
pub use validate::{load_scenario, parse_scenario, validate_scenario_json};
