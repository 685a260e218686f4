//! # Schema Validation Contract
//!
//! The runtime only needs a yes/no answer plus a structured explanation. How
//! a schema is checked is up to the [`SchemaValidator`] implementation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::schema::{ConfigSchema, FieldSpec, FieldType};

/// A single violated constraint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Violation {
    /// The slice is not a map at all.
    NotAnObject { found: String },
    /// A required field is absent.
    MissingField { field: String },
    /// A field holds a value of the wrong JSON type.
    WrongType {
        field: String,
        expected: FieldType,
        found: String,
    },
    /// A field is not in the catalog and the schema denies unknown fields.
    UnknownField { field: String },
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject { found } => write!(f, "expected an object, found {found}"),
            Self::MissingField { field } => write!(f, "missing required field '{field}'"),
            Self::WrongType {
                field,
                expected,
                found,
            } => write!(f, "field '{field}' must be {expected}, found {found}"),
            Self::UnknownField { field } => write!(f, "unknown field '{field}'"),
        }
    }
}

/// Structured description of a rejected configuration slice.
///
/// Carries every violated constraint, the schema's full field catalog and the
/// rejected input, so a single error is enough to fix the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub schema: String,
    pub violations: Vec<Violation>,
    pub fields: Vec<FieldSpec>,
    pub input: Value,
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "configuration for '{}' failed validation ({} violation{}):",
            self.schema,
            self.violations.len(),
            if self.violations.len() == 1 { "" } else { "s" }
        )?;
        for violation in &self.violations {
            writeln!(f, "  - {violation}")?;
        }
        writeln!(f, "expected fields:")?;
        for field in &self.fields {
            writeln!(f, "  * {field}")?;
        }
        write!(f, "received: {}", self.input)
    }
}

impl std::error::Error for ValidationReport {}

/// Validates a configuration slice against a declarative schema.
pub trait SchemaValidator: Send + Sync {
    /// Return `Ok(())` when `input` satisfies `schema`.
    fn validate(&self, schema: &ConfigSchema, input: &Value) -> Result<(), ValidationReport>;
}

/// Reference validator: presence, JSON type, and optionally unknown fields.
#[derive(Debug, Clone, Copy, Default)]
pub struct BasicSchemaValidator;

impl SchemaValidator for BasicSchemaValidator {
    fn validate(&self, schema: &ConfigSchema, input: &Value) -> Result<(), ValidationReport> {
        let mut violations = Vec::new();

        match input.as_object() {
            None => violations.push(Violation::NotAnObject {
                found: FieldType::describe(input).to_string(),
            }),
            Some(map) => {
                for spec in schema.fields() {
                    match map.get(&spec.name) {
                        None | Some(Value::Null) if spec.required => {
                            violations.push(Violation::MissingField {
                                field: spec.name.clone(),
                            });
                        }
                        None | Some(Value::Null) => {}
                        Some(value) if !spec.field_type.accepts(value) => {
                            violations.push(Violation::WrongType {
                                field: spec.name.clone(),
                                expected: spec.field_type,
                                found: FieldType::describe(value).to_string(),
                            });
                        }
                        Some(_) => {}
                    }
                }
                if !schema.allows_unknown() {
                    for key in map.keys() {
                        if schema.field_spec(key).is_none() {
                            violations.push(Violation::UnknownField { field: key.clone() });
                        }
                    }
                }
            }
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(ValidationReport {
                schema: schema.name().to_string(),
                violations,
                fields: schema.fields().to_vec(),
                input: input.clone(),
            })
        }
    }
}
