use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;

use crate::errors::{IssueSeverity, Result, ScenarioError, ValidationIssue, ValidationReport};
use crate::model::Scenario;
use crate::schema::scenario_json_schema;

/// Check a scenario document against the scenario JSON Schema.
pub fn validate_scenario_json(scenario_json: &Value) -> Result<ValidationReport> {
    let schema = serde_json::to_value(scenario_json_schema())?;
    let compiled =
        JSONSchema::compile(&schema).map_err(|err| ScenarioError::Schema(err.to_string()))?;

    let mut report = ValidationReport::default();
    if let Err(errors) = compiled.validate(scenario_json) {
        for error in errors {
            let path = normalized_json_pointer(&error.instance_path.to_string());
            report.push_error(ValidationIssue::new(
                IssueSeverity::Error,
                "schema_violation",
                path,
                error.to_string(),
                None,
            ));
        }
    }

    Ok(report)
}

/// Parse scenario text, shape-checking it before deserializing.
///
/// Deserialization runs on the original text so the keyed `tables` form
/// keeps document order.
pub fn parse_scenario(text: &str) -> Result<Scenario> {
    let json: Value = serde_json::from_str(text)?;
    let report = validate_scenario_json(&json)?;
    if !report.is_ok() {
        return Err(ScenarioError::Shape(report));
    }
    Ok(serde_json::from_str(text)?)
}

/// Read and parse a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let text = fs::read_to_string(path)?;
    parse_scenario(&text)
}

fn normalized_json_pointer(pointer: &str) -> String {
    if pointer.is_empty() {
        "/".to_string()
    } else {
        pointer.to_string()
    }
}
