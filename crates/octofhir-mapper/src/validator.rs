//! Load-time validation of mapping registries.
//!
//! Every registry passes through [`MappingValidator::validate_registry`]
//! before it is installed. Structural problems (missing ids, unknown FHIR
//! elements, unparseable expressions, dangling lookup references) are
//! collected as errors; style problems (suspicious conditions, shadowed
//! mappings, unknown validator forms) as warnings. In strict mode the
//! loader fails the load on any error.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use mapper_core::lookup::CodeLookupTable;
use mapper_core::mapping::{FieldMapping, MappingDirection, ResourceMapping};
use mapper_core::path::FieldPath;
use mapper_core::registry::MappingRegistry;
use mapper_core::types;
use mapper_expr::Expression;
use regex::Regex;

use crate::catalog::{ResourceDefinition, StructureCatalog};
use crate::rules::{FieldRule, RuleError};

/// One validation finding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Where the finding applies, e.g. `mapping 'patient-v1', field 'gender'`.
    pub context: String,
    /// What is wrong.
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.context, self.message)
    }
}

/// Errors and warnings collected over one registry.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    errors: Vec<ValidationIssue>,
    warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Create an empty report.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error (fatal in strict mode).
    pub fn add_error(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ValidationIssue {
            context: context.into(),
            message: message.into(),
        });
    }

    /// Record a warning (never fatal).
    pub fn add_warning(&mut self, context: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ValidationIssue {
            context: context.into(),
            message: message.into(),
        });
    }

    /// Whether the report holds no errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All errors.
    pub fn errors(&self) -> &[ValidationIssue] {
        &self.errors
    }

    /// All warnings.
    pub fn warnings(&self) -> &[ValidationIssue] {
        &self.warnings
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} error(s), {} warning(s)",
            self.errors.len(),
            self.warnings.len()
        )?;
        for error in &self.errors {
            write!(f, "\n  [error] {error}")?;
        }
        for warning in &self.warnings {
            write!(f, "\n  [warning] {warning}")?;
        }
        Ok(())
    }
}

/// Validates registries against a FHIR structure catalog.
#[derive(Debug)]
pub struct MappingValidator {
    catalog: Arc<dyn StructureCatalog>,
    condition_shape: Regex,
}

impl MappingValidator {
    /// Create a validator backed by the given catalog.
    pub fn new(catalog: Arc<dyn StructureCatalog>) -> Self {
        Self {
            catalog,
            // A condition normally contains a comparison or logical
            // operator; a bare value is suspicious but not wrong.
            condition_shape: Regex::new(r"[=!<>&|]|\b(and|or|not)\b")
                .expect("static operator pattern compiles"),
        }
    }

    /// Validate every lookup table and resource mapping in the registry.
    ///
    /// Validation is pure: it depends only on the registry contents and
    /// the catalog, and running it twice yields the same report.
    pub fn validate_registry(&self, registry: &MappingRegistry) -> ValidationReport {
        let mut report = ValidationReport::new();

        for table in registry.lookup_tables() {
            self.validate_lookup_table(table, &mut report);
        }

        let mut seen_pairs: HashSet<(String, MappingDirection)> = HashSet::new();
        for mapping in registry.resource_mappings() {
            self.validate_resource_mapping(mapping, registry, &mut report);

            if let Some(direction) = mapping.direction {
                let pair = (mapping.source_type.clone(), direction);
                if !seen_pairs.insert(pair) {
                    report.add_warning(
                        mapping_context(mapping),
                        format!(
                            "another mapping already covers source type '{}' with direction {direction}; this one is shadowed",
                            mapping.source_type
                        ),
                    );
                }
            }
        }

        report
    }

    fn validate_lookup_table(&self, table: &CodeLookupTable, report: &mut ValidationReport) {
        let context = format!("lookup '{}'", table.id);

        if table.id.is_empty() {
            report.add_error("lookup", "lookup table id is required");
        }
        if table.mappings.is_empty() {
            report.add_error(&context, "lookup table must have at least one mapping");
        }

        let mut source_codes = HashSet::new();
        let mut target_codes = HashSet::new();
        for mapping in &table.mappings {
            if mapping.source_code.is_empty() {
                report.add_error(&context, "source code must not be empty");
            }
            if mapping.target_code.is_empty() {
                report.add_error(&context, "target code must not be empty");
            }
            if !source_codes.insert(mapping.source_code.as_str()) {
                report.add_error(
                    &context,
                    format!("duplicate source code '{}'", mapping.source_code),
                );
            }
            if table.bidirectional && !target_codes.insert(mapping.target_code.as_str()) {
                report.add_error(
                    &context,
                    format!(
                        "bidirectional lookup has duplicate target code '{}'",
                        mapping.target_code
                    ),
                );
            }
        }
    }

    fn validate_resource_mapping(
        &self,
        mapping: &ResourceMapping,
        registry: &MappingRegistry,
        report: &mut ValidationReport,
    ) {
        let context = mapping_context(mapping);

        if mapping.id.is_empty() {
            report.add_error(&context, "mapping id is required");
        }
        if mapping.source_type.is_empty() {
            report.add_error(&context, "source type is required");
        }
        if mapping.target_type.is_empty() {
            report.add_error(&context, "target type is required");
        }

        let resource = match mapping.direction {
            None => {
                report.add_error(&context, "mapping direction is required");
                None
            }
            Some(_) => {
                let fhir_type = mapping.fhir_resource_type().unwrap_or_default();
                let resource = self.catalog.resource(fhir_type);
                if resource.is_none() {
                    report.add_error(
                        &context,
                        format!("unknown FHIR resource type '{fhir_type}'"),
                    );
                }
                resource
            }
        };

        let mut field_ids = HashSet::new();
        for field in &mapping.field_mappings {
            if !field_ids.insert(field.id.as_str()) {
                report.add_error(&context, format!("duplicate field mapping id '{}'", field.id));
            }
            self.validate_field_mapping(field, mapping, resource, registry, report);
        }
    }

    fn validate_field_mapping(
        &self,
        field: &FieldMapping,
        mapping: &ResourceMapping,
        resource: Option<&ResourceDefinition>,
        registry: &MappingRegistry,
        report: &mut ValidationReport,
    ) {
        let context = field_context(mapping, field);

        if field.id.is_empty() {
            report.add_error(&context, "field id is required");
        }
        if field.target_path.is_empty() {
            report.add_error(&context, "target path is required");
        } else if let Err(err) = FieldPath::parse(&field.target_path) {
            report.add_error(&context, format!("invalid target path: {err}"));
        }
        if let Some(source_path) = &field.source_path {
            if let Err(err) = FieldPath::parse(source_path) {
                report.add_error(&context, format!("invalid source path: {err}"));
            }
        }

        if field.required && field.source_path.is_none() && field.default_value.is_none() {
            report.add_error(
                &context,
                "required field must have either a source path or a default value",
            );
        }

        if let Some(data_type) = &field.data_type {
            if !types::is_fhir_primitive(data_type) {
                report.add_error(
                    &context,
                    format!(
                        "invalid data type '{data_type}', expected one of: {}",
                        types::FHIR_PRIMITIVES.join(", ")
                    ),
                );
            }
        }

        if let Some(resource) = resource {
            self.validate_fhir_path(field, mapping, resource, report);
        }

        if let Some(condition) = &field.condition {
            match Expression::parse(condition) {
                Ok(_) => {
                    if !self.condition_shape.is_match(condition) {
                        report.add_warning(
                            &context,
                            format!("condition '{condition}' may not evaluate to a boolean"),
                        );
                    }
                }
                Err(err) => report.add_error(&context, format!("invalid condition: {err}")),
            }
        }

        if let Some(transform) = &field.transform_expression {
            if let Err(err) = Expression::parse(transform) {
                report.add_error(&context, format!("invalid transform expression: {err}"));
            }
        }

        if let Some(validator) = &field.validator {
            match FieldRule::parse(validator) {
                Ok(_) => {}
                Err(RuleError::Unknown(rule)) => {
                    report.add_warning(&context, format!("unknown validator '{rule}'"));
                }
                Err(err) => report.add_error(&context, err.to_string()),
            }
        }

        if let Some(table_id) = &field.lookup_table {
            if registry.lookup_table(table_id).is_none() {
                report.add_error(&context, format!("lookup table not found: '{table_id}'"));
            }
        }
    }

    /// Check the FHIR-side path of a field against the resource structure.
    ///
    /// Only the first segment is checked; FHIR nesting is deep and
    /// partially polymorphic, and the transformation engine materialises
    /// nested containers dynamically anyway. The declared data type is
    /// compared to the element type only for single-segment paths, where
    /// the element type is known exactly.
    fn validate_fhir_path(
        &self,
        field: &FieldMapping,
        mapping: &ResourceMapping,
        resource: &ResourceDefinition,
        report: &mut ValidationReport,
    ) {
        let Some(fhir_path) = mapping.fhir_side_path(field) else {
            return;
        };
        if fhir_path.is_empty() {
            return;
        }
        let Ok(parsed) = FieldPath::parse(fhir_path) else {
            // Malformed paths are already reported.
            return;
        };

        let context = field_context(mapping, field);
        let first = parsed.first_name();
        if !resource.has_child(first) {
            report.add_error(
                &context,
                format!(
                    "element '{first}' does not exist in {}",
                    resource.name()
                ),
            );
            return;
        }

        if parsed.segments().len() == 1 {
            if let (Some(declared), Some(expected)) = (
                field.data_type.as_deref(),
                self.catalog.child_type_name(resource, first),
            ) {
                if !types::is_compatible(declared, expected) {
                    report.add_error(
                        &context,
                        format!(
                            "data type mismatch: field declares '{declared}' but {}.{first} is '{expected}'",
                            resource.name()
                        ),
                    );
                }
            }
        }
    }
}

fn mapping_context(mapping: &ResourceMapping) -> String {
    format!("mapping '{}'", mapping.id)
}

fn field_context(mapping: &ResourceMapping, field: &FieldMapping) -> String {
    format!("mapping '{}', field '{}'", mapping.id, field.id)
}
