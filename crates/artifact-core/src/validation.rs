//! Schema validation for artifact data
//!
//! Each kind's full data type derives a JSON Schema via `schemars`; the
//! schema is compiled once per descriptor with `jsonschema` and every
//! violation is reported with its instance path.

use jsonschema::JSONSchema;
use schemars::JsonSchema;
use serde_json::Value;
use std::fmt::{self, Debug, Formatter};

/// One schema or invariant violation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// JSON pointer into the instance (`""` for the root)
    pub path: String,
    /// Human-readable reason
    pub message: String,
}

impl Violation {
    /// Create violation
    #[inline]
    #[must_use]
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Structured validation failure for one artifact kind
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} failed validation: {}", .kind, summarize(.violations))]
pub struct ValidationError {
    /// Kind whose schema rejected the value
    pub kind: String,
    /// All violations found, in schema traversal order
    pub violations: Vec<Violation>,
}

impl ValidationError {
    /// Create from collected violations
    #[inline]
    #[must_use]
    pub fn new(kind: impl Into<String>, violations: Vec<Violation>) -> Self {
        Self {
            kind: kind.into(),
            violations,
        }
    }

    /// Create with a single violation
    #[inline]
    #[must_use]
    pub fn single(kind: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(kind, vec![Violation::new(path, message)])
    }

    /// Whether any violation points at `path`
    #[must_use]
    pub fn touches(&self, path: &str) -> bool {
        self.violations.iter().any(|v| v.path == path)
    }
}

fn summarize(violations: &[Violation]) -> String {
    match violations {
        [] => "no details".to_string(),
        [only] => format!("{} ({})", only.message, display_path(&only.path)),
        [first, rest @ ..] => format!(
            "{} ({}) and {} more",
            first.message,
            display_path(&first.path),
            rest.len()
        ),
    }
}

fn display_path(path: &str) -> &str {
    if path.is_empty() {
        "/"
    } else {
        path
    }
}

/// Compiled JSON Schema for one data type
pub struct SchemaValidator {
    schema: Value,
    compiled: JSONSchema,
}

impl SchemaValidator {
    /// Derive and compile the schema of `T`
    ///
    /// # Errors
    /// Returns error if the generated schema does not compile
    pub fn for_type<T: JsonSchema>(kind: &str) -> Result<Self, ValidationError> {
        let root = schemars::schema_for!(T);
        let schema = serde_json::to_value(&root)
            .map_err(|e| ValidationError::single(kind, "", format!("schema encoding failed: {e}")))?;
        let compiled = JSONSchema::compile(&schema)
            .map_err(|e| ValidationError::single(kind, "", format!("schema compilation failed: {e}")))?;
        Ok(Self { schema, compiled })
    }

    /// The raw JSON Schema document
    #[inline]
    #[must_use]
    pub fn schema(&self) -> &Value {
        &self.schema
    }

    /// Validate an instance, collecting every violation
    ///
    /// # Errors
    /// Returns all violations when the instance does not match
    pub fn check(&self, kind: &str, instance: &Value) -> Result<(), ValidationError> {
        let violations: Vec<Violation> = match self.compiled.validate(instance) {
            Ok(()) => return Ok(()),
            Err(errors) => errors
                .map(|e| Violation::new(e.instance_path.to_string(), e.to_string()))
                .collect(),
        };
        Err(ValidationError::new(kind, violations))
    }
}

impl Debug for SchemaValidator {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaValidator")
            .field("schema", &self.schema)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, JsonSchema)]
    #[serde(rename_all = "camelCase")]
    struct Probe {
        name: String,
        retry_count: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    }

    #[test]
    fn accepts_matching_instance() {
        let validator = SchemaValidator::for_type::<Probe>("probe").unwrap();
        let ok = json!({ "name": "a", "retryCount": 2 });
        assert!(validator.check("probe", &ok).is_ok());
    }

    #[test]
    fn reports_every_violation() {
        let validator = SchemaValidator::for_type::<Probe>("probe").unwrap();
        let bad = json!({ "name": 7 });
        let err = validator.check("probe", &bad).unwrap_err();
        assert_eq!(err.kind, "probe");
        assert!(err.violations.len() >= 2);
        assert!(err.touches("/name"));
    }

    #[test]
    fn display_mentions_kind_and_count() {
        let err = ValidationError::new(
            "probe",
            vec![Violation::new("/a", "bad a"), Violation::new("/b", "bad b")],
        );
        let text = err.to_string();
        assert!(text.starts_with("probe failed validation"));
        assert!(text.contains("and 1 more"));
    }
}
