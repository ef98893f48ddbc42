//! Dotted-path navigation over JSON document trees.
//!
//! A path is a `.`-separated sequence of segments; each segment is either a
//! plain object key (`name`) or a key with a literal array index
//! (`name[0]`). Reads walk the tree and return the addressed subtree if it
//! exists. Writes materialise missing intermediate objects and arrays so
//! that field mappings can target any address in any order.

use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors raised while parsing or applying a field path.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    /// The path string is empty.
    #[error("path must not be empty")]
    Empty,

    /// A segment is malformed (empty name, bad subscript, ...).
    #[error("invalid path segment '{0}'")]
    InvalidSegment(String),

    /// A write traversed an existing node of an incompatible kind.
    #[error("path '{path}' conflicts with existing {found} at segment '{segment}'")]
    Conflict {
        /// The full path being written.
        path: String,
        /// The segment where the conflict occurred.
        segment: String,
        /// Kind of the value found in the way.
        found: &'static str,
    },
}

/// A single parsed path segment: an object key with an optional array index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathSegment {
    /// The object key.
    pub name: String,
    /// Array index, if the segment was written as `name[i]`.
    pub index: Option<usize>,
}

/// A parsed dotted path such as `name[0].given[0]`.
///
/// Parsing happens once; `get`/`set` then walk the pre-split segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<PathSegment>,
}

impl FieldPath {
    /// Parse a dotted path. No wildcards or predicates are supported;
    /// subscripts must be literal non-negative integers.
    pub fn parse(path: &str) -> Result<Self, PathError> {
        if path.is_empty() {
            return Err(PathError::Empty);
        }

        let mut segments = Vec::new();
        for part in path.split('.') {
            segments.push(parse_segment(part)?);
        }

        Ok(Self {
            raw: path.to_string(),
            segments,
        })
    }

    /// The original path string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The parsed segments.
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Name of the first segment (used for structure validation).
    pub fn first_name(&self) -> &str {
        &self.segments[0].name
    }

    /// Read the value addressed by this path.
    ///
    /// Returns `None` when any segment is missing, out of range, or the
    /// current node is not a container of the expected kind. The returned
    /// reference borrows from `root`; nothing is copied.
    pub fn get<'a>(&self, root: &'a Value) -> Option<&'a Value> {
        let mut current = root;
        for segment in &self.segments {
            let entry = current.as_object()?.get(&segment.name)?;
            current = match segment.index {
                None => entry,
                Some(index) => entry.as_array()?.get(index)?,
            };
        }
        Some(current)
    }

    /// Write `value` at this path, materialising intermediate containers.
    ///
    /// Missing objects are created; missing arrays are created and grown
    /// with `null` placeholders until the subscript is in range. A `null`
    /// already present at an intermediate position counts as missing and is
    /// replaced by the needed container. Traversing through any other
    /// non-container value is a [`PathError::Conflict`].
    pub fn set(&self, root: &mut Value, value: Value) -> Result<(), PathError> {
        let Some((last, inner)) = self.segments.split_last() else {
            return Err(PathError::Empty);
        };

        let mut current = root;
        for segment in inner {
            current = self.descend(current, segment)?;
        }

        let object = self.object_for(current, last)?;
        match last.index {
            None => {
                object.insert(last.name.clone(), value);
            }
            Some(index) => {
                let entry = object.entry(last.name.clone()).or_insert(Value::Null);
                if entry.is_null() {
                    *entry = Value::Array(Vec::new());
                }
                let found = kind(entry);
                let Some(array) = entry.as_array_mut() else {
                    return Err(self.conflict(last, found));
                };
                while array.len() <= index {
                    array.push(Value::Null);
                }
                array[index] = value;
            }
        }
        Ok(())
    }

    /// Walk one non-terminal segment, materialising containers as needed.
    fn descend<'a>(
        &self,
        current: &'a mut Value,
        segment: &PathSegment,
    ) -> Result<&'a mut Value, PathError> {
        let object = self.object_for(current, segment)?;
        let entry = object.entry(segment.name.clone()).or_insert(Value::Null);

        let slot = match segment.index {
            None => entry,
            Some(index) => {
                if entry.is_null() {
                    *entry = Value::Array(Vec::new());
                }
                let found = kind(entry);
                let Some(array) = entry.as_array_mut() else {
                    return Err(self.conflict(segment, found));
                };
                while array.len() <= index {
                    array.push(Value::Null);
                }
                &mut array[index]
            }
        };

        if slot.is_null() {
            *slot = Value::Object(Map::new());
        }
        if !slot.is_object() {
            return Err(self.conflict(segment, kind(slot)));
        }
        Ok(slot)
    }

    /// View `current` as the object that holds `segment`, materialising an
    /// object over `null`.
    fn object_for<'a>(
        &self,
        current: &'a mut Value,
        segment: &PathSegment,
    ) -> Result<&'a mut Map<String, Value>, PathError> {
        if current.is_null() {
            *current = Value::Object(Map::new());
        }
        let found = kind(current);
        current
            .as_object_mut()
            .ok_or_else(|| self.conflict(segment, found))
    }

    fn conflict(&self, segment: &PathSegment, found: &'static str) -> PathError {
        PathError::Conflict {
            path: self.raw.clone(),
            segment: segment.name.clone(),
            found,
        }
    }
}

impl FromStr for FieldPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

fn parse_segment(part: &str) -> Result<PathSegment, PathError> {
    let (name, index) = match part.find('[') {
        None => (part, None),
        Some(bracket) => {
            let Some(subscript) = part[bracket..].strip_prefix('[').and_then(|s| s.strip_suffix(']'))
            else {
                return Err(PathError::InvalidSegment(part.to_string()));
            };
            let index: usize = subscript
                .parse()
                .map_err(|_| PathError::InvalidSegment(part.to_string()))?;
            (&part[..bracket], Some(index))
        }
    };

    if name.is_empty() {
        return Err(PathError::InvalidSegment(part.to_string()));
    }

    Ok(PathSegment {
        name: name.to_string(),
        index,
    })
}

/// Human-readable kind of a JSON value, for conflict messages.
fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> FieldPath {
        FieldPath::parse(s).unwrap()
    }

    #[test]
    fn test_parse_simple_path() {
        let p = path("name.family");
        assert_eq!(p.segments().len(), 2);
        assert_eq!(p.segments()[0].name, "name");
        assert_eq!(p.segments()[0].index, None);
        assert_eq!(p.first_name(), "name");
    }

    #[test]
    fn test_parse_indexed_path() {
        let p = path("name[0].given[2]");
        assert_eq!(p.segments()[0].index, Some(0));
        assert_eq!(p.segments()[1].name, "given");
        assert_eq!(p.segments()[1].index, Some(2));
    }

    #[test]
    fn test_parse_rejects_empty_path() {
        assert_eq!(FieldPath::parse(""), Err(PathError::Empty));
    }

    #[test]
    fn test_parse_rejects_bad_segments() {
        for bad in ["a..b", "a[", "a[]", "a[x]", "a[-1]", "[0]", "a]0["] {
            assert!(FieldPath::parse(bad).is_err(), "{bad} should not parse");
        }
    }

    #[test]
    fn test_get_nested() {
        let doc = json!({"name": [{"given": ["John", "Q"], "family": "Doe"}]});
        assert_eq!(path("name[0].family").get(&doc), Some(&json!("Doe")));
        assert_eq!(path("name[0].given[1]").get(&doc), Some(&json!("Q")));
    }

    #[test]
    fn test_get_missing_returns_none() {
        let doc = json!({"name": [{"family": "Doe"}]});
        assert_eq!(path("name[1].family").get(&doc), None);
        assert_eq!(path("name[0].given[0]").get(&doc), None);
        assert_eq!(path("address.city").get(&doc), None);
    }

    #[test]
    fn test_get_through_scalar_returns_none() {
        let doc = json!({"gender": "male"});
        assert_eq!(path("gender.code").get(&doc), None);
        assert_eq!(path("gender[0]").get(&doc), None);
    }

    #[test]
    fn test_set_materialises_objects() {
        let mut doc = json!({});
        path("address.city").set(&mut doc, json!("Springfield")).unwrap();
        assert_eq!(doc, json!({"address": {"city": "Springfield"}}));
    }

    #[test]
    fn test_set_materialises_arrays_with_null_gaps() {
        let mut doc = json!({});
        path("identifier[2].value").set(&mut doc, json!("P1")).unwrap();
        assert_eq!(
            doc,
            json!({"identifier": [null, null, {"value": "P1"}]})
        );
    }

    #[test]
    fn test_set_terminal_index_pads_with_nulls() {
        let mut doc = json!({});
        path("given[1]").set(&mut doc, json!("Q")).unwrap();
        assert_eq!(doc, json!({"given": [null, "Q"]}));
    }

    #[test]
    fn test_set_get_round_trip() {
        let mut doc = json!({});
        let p = path("contact[0].telecom[1].value");
        p.set(&mut doc, json!("555-0100")).unwrap();
        assert_eq!(p.get(&doc), Some(&json!("555-0100")));
    }

    #[test]
    fn test_set_preserves_shared_prefix() {
        let mut doc = json!({});
        path("name[0].given[0]").set(&mut doc, json!("John")).unwrap();
        path("name[0].family").set(&mut doc, json!("Doe")).unwrap();
        assert_eq!(
            doc,
            json!({"name": [{"given": ["John"], "family": "Doe"}]})
        );
    }

    #[test]
    fn test_set_replaces_null_placeholder() {
        let mut doc = json!({});
        path("name[1].family").set(&mut doc, json!("Doe")).unwrap();
        // name[0] was padded with null; a later write may claim it.
        path("name[0].family").set(&mut doc, json!("Roe")).unwrap();
        assert_eq!(
            doc,
            json!({"name": [{"family": "Roe"}, {"family": "Doe"}]})
        );
    }

    #[test]
    fn test_set_conflict_through_scalar() {
        let mut doc = json!({"gender": "male"});
        let err = path("gender.coding[0].code")
            .set(&mut doc, json!("M"))
            .unwrap_err();
        assert!(matches!(err, PathError::Conflict { found: "string", .. }));
    }

    #[test]
    fn test_set_conflict_index_into_object() {
        let mut doc = json!({"name": {"family": "Doe"}});
        let err = path("name[0].given[0]").set(&mut doc, json!("J")).unwrap_err();
        assert!(matches!(err, PathError::Conflict { found: "object", .. }));
    }

    #[test]
    fn test_later_write_wins() {
        let mut doc = json!({});
        path("status").set(&mut doc, json!("draft")).unwrap();
        path("status").set(&mut doc, json!("active")).unwrap();
        assert_eq!(doc, json!({"status": "active"}));
    }

    #[test]
    fn test_key_order_follows_write_order() {
        let mut doc = json!({});
        path("zebra").set(&mut doc, json!(1)).unwrap();
        path("alpha").set(&mut doc, json!(2)).unwrap();
        let keys: Vec<&String> = doc.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["zebra", "alpha"]);
    }
}
