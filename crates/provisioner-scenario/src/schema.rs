use schemars::schema::RootSchema;
use schemars::schema_for;

use crate::model::Scenario;

/// Emit the JSON Schema for scenario documents.
pub fn scenario_json_schema() -> RootSchema {
    schema_for!(Scenario)
}
