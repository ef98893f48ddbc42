//! Per-request transformation context.

use serde_json::{Map, Value};
use std::collections::HashMap;

/// Request-scoped substitution values available to expressions and default
/// values as `$ctx.…` references.
///
/// A context is constructed per transformation request and read-only while
/// the transformation runs. Resolution rules:
///
/// - `$ctx.organizationId` / `$ctx.facilityId` / `$ctx.tenantId` read the
///   direct fields (and shadow variables of the same name)
/// - `$ctx.settings['key']` reads the settings map
/// - `$ctx.<other>` reads the variables map
/// - anything unresolved evaluates to `null`
#[derive(Debug, Clone, Default)]
pub struct TransformationContext {
    organization_id: Option<String>,
    facility_id: Option<String>,
    tenant_id: Option<String>,
    variables: HashMap<String, Value>,
    settings: HashMap<String, String>,
}

impl TransformationContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the organisation id.
    pub fn with_organization_id(mut self, id: impl Into<String>) -> Self {
        self.organization_id = Some(id.into());
        self
    }

    /// Set the facility id.
    pub fn with_facility_id(mut self, id: impl Into<String>) -> Self {
        self.facility_id = Some(id.into());
        self
    }

    /// Set the tenant id.
    pub fn with_tenant_id(mut self, id: impl Into<String>) -> Self {
        self.tenant_id = Some(id.into());
        self
    }

    /// Add a free-form variable.
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Add a settings entry.
    pub fn with_setting(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.settings.insert(key.into(), value.into());
        self
    }

    /// The organisation id, if set.
    pub fn organization_id(&self) -> Option<&str> {
        self.organization_id.as_deref()
    }

    /// The facility id, if set.
    pub fn facility_id(&self) -> Option<&str> {
        self.facility_id.as_deref()
    }

    /// The tenant id, if set.
    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    /// Look up a variable by name.
    pub fn variable(&self, name: &str) -> Option<&Value> {
        self.variables.get(name)
    }

    /// Look up a settings entry by key.
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Assemble the `$ctx` document the expression evaluator binds.
    ///
    /// Variables come first so the direct fields and `settings` shadow
    /// variables with the same names. Unset direct fields are present as
    /// `null`, which keeps `$ctx.tenantId != null` style conditions honest.
    pub fn binding(&self) -> Value {
        let mut root = Map::new();

        for (name, value) in &self.variables {
            root.insert(name.clone(), value.clone());
        }

        root.insert("organizationId".to_string(), optional(&self.organization_id));
        root.insert("facilityId".to_string(), optional(&self.facility_id));
        root.insert("tenantId".to_string(), optional(&self.tenant_id));

        let settings: Map<String, Value> = self
            .settings
            .iter()
            .map(|(key, value)| (key.clone(), Value::String(value.clone())))
            .collect();
        root.insert("settings".to_string(), Value::Object(settings));

        Value::Object(root)
    }
}

fn optional(field: &Option<String>) -> Value {
    match field {
        Some(value) => Value::String(value.clone()),
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_binding_contains_direct_fields() {
        let context = TransformationContext::new()
            .with_organization_id("org-1")
            .with_tenant_id("tenant-9");

        let binding = context.binding();
        assert_eq!(binding["organizationId"], json!("org-1"));
        assert_eq!(binding["tenantId"], json!("tenant-9"));
        assert_eq!(binding["facilityId"], Value::Null);
    }

    #[test]
    fn test_binding_contains_settings_and_variables() {
        let context = TransformationContext::new()
            .with_setting("identifierSystem", "urn:oid:2.16.840.1.113883.4.1")
            .with_variable("batchId", 42);

        let binding = context.binding();
        assert_eq!(
            binding["settings"]["identifierSystem"],
            json!("urn:oid:2.16.840.1.113883.4.1")
        );
        assert_eq!(binding["batchId"], json!(42));
    }

    #[test]
    fn test_direct_fields_shadow_variables() {
        let context = TransformationContext::new()
            .with_variable("tenantId", "from-variables")
            .with_tenant_id("from-field");

        assert_eq!(context.binding()["tenantId"], json!("from-field"));
    }

    #[test]
    fn test_accessors() {
        let context = TransformationContext::new()
            .with_facility_id("fac-1")
            .with_setting("key", "value");
        assert_eq!(context.facility_id(), Some("fac-1"));
        assert_eq!(context.setting("key"), Some("value"));
        assert_eq!(context.setting("missing"), None);
        assert_eq!(context.organization_id(), None);
    }
}
