//! Declarative mapping model.
//!
//! These types mirror the on-disk mapping file schema. Deserialisation is
//! deliberately lenient: fields whose presence the load-time validator
//! checks default to empty rather than failing at parse time, so a broken
//! file produces a readable validation report instead of a serde error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a declarative transformation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MappingDirection {
    /// Flat/custom JSON in, FHIR resource document out.
    #[serde(rename = "JSON_TO_FHIR")]
    JsonToFhir,
    /// FHIR resource document in, flat/custom JSON out.
    #[serde(rename = "FHIR_TO_JSON")]
    FhirToJson,
}

impl fmt::Display for MappingDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappingDirection::JsonToFhir => f.write_str("JSON_TO_FHIR"),
            MappingDirection::FhirToJson => f.write_str("FHIR_TO_JSON"),
        }
    }
}

/// A single declarative rule producing one value at a target path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMapping {
    /// Unique id within the owning resource mapping.
    #[serde(default)]
    pub id: String,

    /// Path to read in the source document. May be omitted when the value
    /// comes entirely from `default_value`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_path: Option<String>,

    /// Path to write in the target document.
    #[serde(default)]
    pub target_path: String,

    /// Declared FHIR primitive type (see [`crate::types`]).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_type: Option<String>,

    /// Expression applied to the working value (`value` binding).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform_expression: Option<String>,

    /// Boolean expression gating the field; a false/null result skips it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Validation rule: `notEmpty()`, `regex('…')` or `range(min, max)`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub validator: Option<String>,

    /// Whether the transformation fails when no value can be produced.
    #[serde(default)]
    pub required: bool,

    /// Fallback value; may be a bare `$ctx.…` reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<String>,

    /// Id of a [`crate::CodeLookupTable`] in the owning registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_table: Option<String>,

    /// Alternate field for the lookup key. Kept for file compatibility;
    /// the interpreter does not consult it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lookup_source_field: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldMapping {
    /// Create a minimal field mapping writing to `target_path`.
    pub fn new(id: impl Into<String>, target_path: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            source_path: None,
            target_path: target_path.into(),
            data_type: None,
            transform_expression: None,
            condition: None,
            validator: None,
            required: false,
            default_value: None,
            lookup_table: None,
            lookup_source_field: None,
            description: None,
        }
    }

    /// Set the source path to read from.
    pub fn with_source_path(mut self, path: impl Into<String>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Set the declared data type.
    pub fn with_data_type(mut self, data_type: impl Into<String>) -> Self {
        self.data_type = Some(data_type.into());
        self
    }

    /// Set the transform expression.
    pub fn with_transform(mut self, expression: impl Into<String>) -> Self {
        self.transform_expression = Some(expression.into());
        self
    }

    /// Set the gating condition.
    pub fn with_condition(mut self, condition: impl Into<String>) -> Self {
        self.condition = Some(condition.into());
        self
    }

    /// Set the validation rule.
    pub fn with_validator(mut self, validator: impl Into<String>) -> Self {
        self.validator = Some(validator.into());
        self
    }

    /// Mark the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Reference a lookup table by id.
    pub fn with_lookup(mut self, table_id: impl Into<String>) -> Self {
        self.lookup_table = Some(table_id.into());
        self
    }
}

/// All field mappings for one `(source type, direction)` pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMapping {
    /// Unique mapping id.
    #[serde(default)]
    pub id: String,

    /// Human-readable name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Input document type (application type for JSON_TO_FHIR, FHIR
    /// resource type for FHIR_TO_JSON).
    #[serde(default)]
    pub source_type: String,

    /// Output document type, mirror of `source_type`.
    #[serde(default)]
    pub target_type: String,

    /// Mapping file version.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// Transformation direction. Optional in the model so a file missing it
    /// surfaces through the validator, not a parse failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<MappingDirection>,

    /// Field rules, executed in declared order.
    #[serde(default)]
    pub field_mappings: Vec<FieldMapping>,
}

impl ResourceMapping {
    /// Create an empty mapping.
    pub fn new(
        id: impl Into<String>,
        source_type: impl Into<String>,
        target_type: impl Into<String>,
        direction: MappingDirection,
    ) -> Self {
        Self {
            id: id.into(),
            name: None,
            source_type: source_type.into(),
            target_type: target_type.into(),
            version: None,
            direction: Some(direction),
            field_mappings: Vec::new(),
        }
    }

    /// Append a field mapping.
    pub fn with_field(mut self, field: FieldMapping) -> Self {
        self.field_mappings.push(field);
        self
    }

    /// The FHIR side of the mapping: `target_type` for JSON_TO_FHIR,
    /// `source_type` for FHIR_TO_JSON.
    pub fn fhir_resource_type(&self) -> Option<&str> {
        match self.direction? {
            MappingDirection::JsonToFhir => Some(&self.target_type),
            MappingDirection::FhirToJson => Some(&self.source_type),
        }
    }

    /// The FHIR-side path of a field: `target_path` for JSON_TO_FHIR,
    /// `source_path` for FHIR_TO_JSON.
    pub fn fhir_side_path<'a>(&self, field: &'a FieldMapping) -> Option<&'a str> {
        match self.direction? {
            MappingDirection::JsonToFhir => Some(&field.target_path),
            MappingDirection::FhirToJson => field.source_path.as_deref(),
        }
    }
}
