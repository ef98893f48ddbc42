//! Code lookup tables for value translation between vocabularies.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Errors raised by lookup-table operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// Reverse lookup requested on a table without a reverse index.
    #[error("lookup table '{0}' is not bidirectional")]
    NotBidirectional(String),
}

/// One source ↔ target code pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeMapping {
    #[serde(default)]
    pub source_code: String,
    #[serde(default)]
    pub target_code: String,
    /// Optional display text for the pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

/// A code translation table with prebuilt forward and reverse indices.
///
/// The forward index (`source → target`) is always built; the reverse
/// index only when `bidirectional` is set. Tables are deserialised from
/// JSON and must be finalised with [`CodeLookupTable::index`] before use;
/// tables handed out by a [`crate::MappingRegistry`] are always indexed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeLookupTable {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Source coding system URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_system: Option<String>,
    /// Target coding system URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_system: Option<String>,
    /// Whether reverse lookups are allowed.
    #[serde(default)]
    pub bidirectional: bool,
    /// Fallback result for reverse lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_source_code: Option<String>,
    /// Fallback result for forward lookups.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_target_code: Option<String>,
    #[serde(default)]
    pub mappings: Vec<CodeMapping>,

    #[serde(skip)]
    by_source: HashMap<String, usize>,
    #[serde(skip)]
    by_target: HashMap<String, usize>,
}

impl CodeLookupTable {
    /// Create an empty table with the given id.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    /// Append a code pair.
    pub fn with_mapping(
        mut self,
        source_code: impl Into<String>,
        target_code: impl Into<String>,
    ) -> Self {
        self.mappings.push(CodeMapping {
            source_code: source_code.into(),
            target_code: target_code.into(),
            display: None,
        });
        self
    }

    /// Allow reverse lookups.
    pub fn bidirectional(mut self) -> Self {
        self.bidirectional = true;
        self
    }

    /// Set the fallback for forward lookups.
    pub fn with_default_target(mut self, code: impl Into<String>) -> Self {
        self.default_target_code = Some(code.into());
        self
    }

    /// Set the fallback for reverse lookups.
    pub fn with_default_source(mut self, code: impl Into<String>) -> Self {
        self.default_source_code = Some(code.into());
        self
    }

    /// Build the lookup indices. On duplicate codes the first pair wins;
    /// the load-time validator reports duplicates as errors.
    pub fn index(mut self) -> Self {
        self.by_source = HashMap::with_capacity(self.mappings.len());
        self.by_target = HashMap::new();

        for (position, mapping) in self.mappings.iter().enumerate() {
            self.by_source
                .entry(mapping.source_code.clone())
                .or_insert(position);
        }
        if self.bidirectional {
            self.by_target = HashMap::with_capacity(self.mappings.len());
            for (position, mapping) in self.mappings.iter().enumerate() {
                self.by_target
                    .entry(mapping.target_code.clone())
                    .or_insert(position);
            }
        }
        self
    }

    /// Translate a source code to its target code, falling back to
    /// `default_target_code`. Returns `None` on a miss with no default.
    pub fn lookup_target(&self, source_code: &str) -> Option<&str> {
        self.by_source
            .get(source_code)
            .map(|&position| self.mappings[position].target_code.as_str())
            .or(self.default_target_code.as_deref())
    }

    /// Translate a target code back to its source code.
    ///
    /// # Errors
    ///
    /// Returns [`LookupError::NotBidirectional`] when the table was not
    /// declared bidirectional.
    pub fn lookup_source(&self, target_code: &str) -> Result<Option<&str>, LookupError> {
        if !self.bidirectional {
            return Err(LookupError::NotBidirectional(self.id.clone()));
        }
        Ok(self
            .by_target
            .get(target_code)
            .map(|&position| self.mappings[position].source_code.as_str())
            .or(self.default_source_code.as_deref()))
    }

    /// Display text attached to a source code, if any.
    pub fn display_for_source(&self, source_code: &str) -> Option<&str> {
        self.by_source
            .get(source_code)
            .and_then(|&position| self.mappings[position].display.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gender_table() -> CodeLookupTable {
        CodeLookupTable::new("gender-lookup")
            .with_mapping("M", "male")
            .with_mapping("F", "female")
            .bidirectional()
            .index()
    }

    #[test]
    fn test_forward_lookup() {
        let table = gender_table();
        assert_eq!(table.lookup_target("M"), Some("male"));
        assert_eq!(table.lookup_target("F"), Some("female"));
        assert_eq!(table.lookup_target("X"), None);
    }

    #[test]
    fn test_forward_lookup_default() {
        let table = CodeLookupTable::new("status")
            .with_mapping("A", "active")
            .with_default_target("unknown")
            .index();
        assert_eq!(table.lookup_target("Z"), Some("unknown"));
    }

    #[test]
    fn test_reverse_lookup() {
        let table = gender_table();
        assert_eq!(table.lookup_source("male").unwrap(), Some("M"));
        assert_eq!(table.lookup_source("other").unwrap(), None);
    }

    #[test]
    fn test_reverse_lookup_requires_bidirectional() {
        let table = CodeLookupTable::new("one-way").with_mapping("A", "B").index();
        assert_eq!(
            table.lookup_source("B"),
            Err(LookupError::NotBidirectional("one-way".to_string()))
        );
    }

    #[test]
    fn test_lookup_round_trip() {
        let table = gender_table();
        for code in ["M", "F"] {
            let target = table.lookup_target(code).unwrap();
            assert_eq!(table.lookup_source(target).unwrap(), Some(code));
        }
    }

    #[test]
    fn test_display_for_source() {
        let mut table = CodeLookupTable::new("gender");
        table.mappings.push(CodeMapping {
            source_code: "M".into(),
            target_code: "male".into(),
            display: Some("Male".into()),
        });
        let table = table.index();
        assert_eq!(table.display_for_source("M"), Some("Male"));
        assert_eq!(table.display_for_source("F"), None);
    }

    #[test]
    fn test_deserialises_from_file_schema() {
        let table: CodeLookupTable = serde_json::from_value(json!({
            "id": "gender-lookup",
            "name": "Gender Code Mapping",
            "sourceSystem": "internal",
            "targetSystem": "http://hl7.org/fhir/administrative-gender",
            "bidirectional": true,
            "mappings": [
                {"sourceCode": "M", "targetCode": "male", "display": "Male"},
                {"sourceCode": "F", "targetCode": "female", "display": "Female"}
            ]
        }))
        .unwrap();

        let table = table.index();
        assert_eq!(table.lookup_target("M"), Some("male"));
        assert_eq!(table.lookup_source("female").unwrap(), Some("F"));
    }

    #[test]
    fn test_duplicate_source_first_wins() {
        let table = CodeLookupTable::new("dup")
            .with_mapping("A", "first")
            .with_mapping("A", "second")
            .index();
        assert_eq!(table.lookup_target("A"), Some("first"));
    }
}
