//! The transformation engine: interpreter and facade.
//!
//! The interpreter walks a mapping's field rules in declared order and
//! materialises the target document. Each field runs the same pipeline:
//! condition, read, default, required check, lookup, transform, validate,
//! write. A failing step on an optional field omits the field and traces
//! the reason; on a required field it aborts the transformation with the
//! mapping and field ids attached.
//!
//! The facade methods adapt the supported input and output kinds (JSON
//! string, document tree, serde-serialisable record, typed FHIR resource)
//! around that single interpreter.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use mapper_core::context::TransformationContext;
use mapper_core::lookup::LookupError;
use mapper_core::mapping::{FieldMapping, MappingDirection, ResourceMapping};
use mapper_core::path::{FieldPath, PathError};
use mapper_core::registry::MappingRegistry;
use mapper_expr::{ExprError, ExpressionCache, Scope};

use crate::rules::{FieldRule, RuleError};

/// A fatal transformation failure.
#[derive(Debug, Error)]
pub enum TransformError {
    /// A mapping was used with the wrong facade direction.
    #[error("mapping '{mapping_id}' has direction {actual}, expected {expected}")]
    DirectionMismatch {
        mapping_id: String,
        expected: MappingDirection,
        actual: String,
    },

    /// A required field could not be produced.
    #[error("failed to map required field '{field_id}' in mapping '{mapping_id}': {source}")]
    RequiredField {
        mapping_id: String,
        field_id: String,
        source: FieldError,
    },

    /// The source document is not a JSON object.
    #[error("source document must be a JSON object")]
    SourceNotObject,

    /// Input parsing or output conversion failed.
    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// A failure while processing one field mapping.
///
/// Field errors only surface for `required` fields; optional fields
/// swallow them and are omitted from the output.
#[derive(Debug, Error)]
pub enum FieldError {
    /// No value from the source path and no default.
    #[error("required field missing: {0}")]
    Missing(String),

    /// The referenced lookup table is not in the registry.
    #[error("lookup table not found: '{0}'")]
    UnknownLookupTable(String),

    /// The lookup key is not a scalar.
    #[error("lookup key must be a scalar code, got {0}")]
    NonScalarCode(&'static str),

    /// The lookup produced no code and the table has no default.
    #[error("no mapping found for code '{code}' in lookup table '{table}'")]
    LookupMiss { table: String, code: String },

    /// Reverse lookup on a one-way table.
    #[error(transparent)]
    Lookup(#[from] LookupError),

    /// A condition or transform expression failed.
    #[error(transparent)]
    Expression(#[from] ExprError),

    /// The validator rule rejected the value.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The validator rule itself is malformed.
    #[error(transparent)]
    Rule(#[from] RuleError),

    /// A source or target path is malformed, or the write conflicted with
    /// an existing value.
    #[error(transparent)]
    Path(#[from] PathError),
}

/// Outcome of one field rule, for tracing.
enum FieldOutcome {
    Written,
    Skipped,
}

/// Bidirectional JSON ↔ FHIR transformation engine.
///
/// The engine holds an immutable registry snapshot and a shared
/// compiled-expression cache; it keeps no per-run state, so one engine may
/// serve concurrent transformations. Deployments with hot reload create an
/// engine per request from the current registry snapshot and pass a shared
/// cache via [`TransformationEngine::with_cache`].
#[derive(Debug)]
pub struct TransformationEngine {
    registry: Arc<MappingRegistry>,
    expressions: Arc<ExpressionCache>,
}

impl TransformationEngine {
    /// Create an engine over a registry snapshot with its own cache.
    pub fn new(registry: Arc<MappingRegistry>) -> Self {
        Self::with_cache(registry, Arc::new(ExpressionCache::new()))
    }

    /// Create an engine sharing an existing expression cache.
    pub fn with_cache(registry: Arc<MappingRegistry>, expressions: Arc<ExpressionCache>) -> Self {
        Self {
            registry,
            expressions,
        }
    }

    /// The registry snapshot this engine works against.
    pub fn registry(&self) -> &Arc<MappingRegistry> {
        &self.registry
    }

    // ------------------------------------------------------------------
    // JSON → FHIR
    // ------------------------------------------------------------------

    /// Transform a source document tree into a FHIR document tree.
    pub fn json_to_fhir(
        &self,
        source: &Value,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<Value, TransformError> {
        self.transform(source, mapping, context, MappingDirection::JsonToFhir)
    }

    /// Transform a JSON string into a FHIR document tree.
    pub fn json_str_to_fhir(
        &self,
        source: &str,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<Value, TransformError> {
        let source: Value = serde_json::from_str(source)?;
        self.json_to_fhir(&source, mapping, context)
    }

    /// Transform a source document tree into canonical FHIR JSON.
    pub fn json_to_fhir_json(
        &self,
        source: &Value,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<String, TransformError> {
        let tree = self.json_to_fhir(source, mapping, context)?;
        Ok(serde_json::to_string(&tree)?)
    }

    /// Transform any serialisable record into a FHIR document tree.
    pub fn record_to_fhir<T: Serialize>(
        &self,
        source: &T,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<Value, TransformError> {
        let source = serde_json::to_value(source)?;
        self.json_to_fhir(&source, mapping, context)
    }

    /// Transform a source document tree into a typed FHIR resource.
    pub fn json_to_fhir_resource<R: DeserializeOwned>(
        &self,
        source: &Value,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<R, TransformError> {
        let tree = self.json_to_fhir(source, mapping, context)?;
        Ok(serde_json::from_value(tree)?)
    }

    // ------------------------------------------------------------------
    // FHIR → JSON
    // ------------------------------------------------------------------

    /// Transform a FHIR document tree into an application document tree.
    pub fn fhir_to_json(
        &self,
        source: &Value,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<Value, TransformError> {
        self.transform(source, mapping, context, MappingDirection::FhirToJson)
    }

    /// Transform a FHIR JSON string into an application document tree.
    pub fn fhir_str_to_json(
        &self,
        source: &str,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<Value, TransformError> {
        let source: Value = serde_json::from_str(source)?;
        self.fhir_to_json(&source, mapping, context)
    }

    /// Transform a FHIR document tree into an application JSON string.
    pub fn fhir_to_json_string(
        &self,
        source: &Value,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<String, TransformError> {
        let tree = self.fhir_to_json(source, mapping, context)?;
        Ok(serde_json::to_string(&tree)?)
    }

    /// Transform a typed FHIR resource into an application document tree.
    pub fn fhir_resource_to_json<T: Serialize>(
        &self,
        source: &T,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<Value, TransformError> {
        let source = serde_json::to_value(source)?;
        self.fhir_to_json(&source, mapping, context)
    }

    /// Transform a FHIR document tree into a typed application record.
    pub fn fhir_to_record<R: DeserializeOwned>(
        &self,
        source: &Value,
        mapping: &ResourceMapping,
        context: &TransformationContext,
    ) -> Result<R, TransformError> {
        let tree = self.fhir_to_json(source, mapping, context)?;
        Ok(serde_json::from_value(tree)?)
    }

    // ------------------------------------------------------------------
    // Interpreter
    // ------------------------------------------------------------------

    fn transform(
        &self,
        source: &Value,
        mapping: &ResourceMapping,
        context: &TransformationContext,
        expected: MappingDirection,
    ) -> Result<Value, TransformError> {
        let direction = match mapping.direction {
            Some(direction) if direction == expected => direction,
            other => {
                return Err(TransformError::DirectionMismatch {
                    mapping_id: mapping.id.clone(),
                    expected,
                    actual: other.map_or_else(|| "unset".to_string(), |d| d.to_string()),
                });
            }
        };
        if !source.is_object() {
            return Err(TransformError::SourceNotObject);
        }

        let ctx_binding = context.binding();
        let mut target = Value::Object(Map::new());
        if direction == MappingDirection::JsonToFhir {
            // The resource type leads the document; field writes follow in
            // declared order.
            if let Some(object) = target.as_object_mut() {
                object.insert(
                    "resourceType".to_string(),
                    Value::String(mapping.target_type.clone()),
                );
            }
        }

        for field in &mapping.field_mappings {
            match self.apply_field(source, &mut target, field, direction, &ctx_binding) {
                Ok(FieldOutcome::Written) => {}
                Ok(FieldOutcome::Skipped) => {
                    debug!(mapping = %mapping.id, field = %field.id, "field skipped");
                }
                Err(source_err) if field.required => {
                    return Err(TransformError::RequiredField {
                        mapping_id: mapping.id.clone(),
                        field_id: field.id.clone(),
                        source: source_err,
                    });
                }
                Err(source_err) => {
                    debug!(
                        mapping = %mapping.id,
                        field = %field.id,
                        error = %source_err,
                        "optional field failed and was omitted"
                    );
                }
            }
        }

        Ok(target)
    }

    /// Run the field pipeline: condition, read, default, required check,
    /// lookup, transform, validate, write.
    fn apply_field(
        &self,
        source: &Value,
        target: &mut Value,
        field: &FieldMapping,
        direction: MappingDirection,
        ctx_binding: &Value,
    ) -> Result<FieldOutcome, FieldError> {
        if let Some(condition) = &field.condition {
            let expression = self.expressions.get_or_parse(condition)?;
            let scope = Scope::new(source).with_ctx(ctx_binding);
            if !expression.evaluate_condition(&scope)? {
                return Ok(FieldOutcome::Skipped);
            }
        }

        // Read; a JSON null in the source counts as absent.
        let mut value: Option<Value> = match &field.source_path {
            Some(source_path) => FieldPath::parse(source_path)?
                .get(source)
                .filter(|found| !found.is_null())
                .cloned(),
            None => None,
        };

        if value.is_none() {
            if let Some(default) = &field.default_value {
                value = resolve_default(default, ctx_binding);
            }
        }

        let Some(mut value) = value else {
            if field.required {
                let what = field
                    .source_path
                    .clone()
                    .unwrap_or_else(|| field.id.clone());
                return Err(FieldError::Missing(what));
            }
            return Ok(FieldOutcome::Skipped);
        };

        if let Some(table_id) = &field.lookup_table {
            value = self.apply_lookup(&value, table_id, direction)?;
        }

        if let Some(transform) = &field.transform_expression {
            let expression = self.expressions.get_or_parse(transform)?;
            let scope = Scope::new(source).with_value(&value).with_ctx(ctx_binding);
            value = expression.evaluate(&scope)?;
        }

        if let Some(validator) = &field.validator {
            let rule = FieldRule::parse(validator)?;
            rule.check(&value).map_err(FieldError::Validation)?;
        }

        FieldPath::parse(&field.target_path)?.set(target, value)?;
        Ok(FieldOutcome::Written)
    }

    /// Translate a code through a lookup table. Forward mappings use the
    /// source→target index; reverse mappings use the target→source index,
    /// which requires a bidirectional table.
    fn apply_lookup(
        &self,
        value: &Value,
        table_id: &str,
        direction: MappingDirection,
    ) -> Result<Value, FieldError> {
        let table = self
            .registry
            .lookup_table(table_id)
            .ok_or_else(|| FieldError::UnknownLookupTable(table_id.to_string()))?;

        let code = scalar_code(value)?;
        let translated = match direction {
            MappingDirection::JsonToFhir => table.lookup_target(&code),
            MappingDirection::FhirToJson => table.lookup_source(&code)?,
        };

        match translated {
            Some(result) => Ok(Value::String(result.to_string())),
            None => Err(FieldError::LookupMiss {
                table: table_id.to_string(),
                code,
            }),
        }
    }
}

/// Resolve a default value string. A bare `$ctx.…` reference yields the
/// referenced context value itself (not a string); anything else is taken
/// literally. Unresolved references stay absent, so the required check
/// still applies.
fn resolve_default(default: &str, ctx_binding: &Value) -> Option<Value> {
    let Some(reference) = default.strip_prefix("$ctx.") else {
        return Some(Value::String(default.to_string()));
    };

    // settings['key'] / settings["key"]
    for quote in ["settings['", "settings[\""] {
        if let Some(rest) = reference.strip_prefix(quote) {
            let key = rest.strip_suffix("']").or_else(|| rest.strip_suffix("\"]"))?;
            return ctx_binding
                .get("settings")
                .and_then(|settings| settings.get(key))
                .filter(|found| !found.is_null())
                .cloned();
        }
    }

    ctx_binding
        .get(reference)
        .filter(|found| !found.is_null())
        .cloned()
}

fn scalar_code(value: &Value) -> Result<String, FieldError> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Bool(flag) => Ok(flag.to_string()),
        Value::Null => Err(FieldError::NonScalarCode("null")),
        Value::Array(_) => Err(FieldError::NonScalarCode("array")),
        Value::Object(_) => Err(FieldError::NonScalarCode("object")),
    }
}
