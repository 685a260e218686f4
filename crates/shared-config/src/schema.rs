//! # Configuration Schema
//!
//! Declarative description of a module's configuration slice.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON type expected for a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    /// Any JSON value, including `null`.
    Any,
}

impl FieldType {
    /// Whether `value` satisfies this type.
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Number => value.is_number(),
            Self::Boolean => value.is_boolean(),
            Self::Array => value.is_array(),
            Self::Object => value.is_object(),
            Self::Any => true,
        }
    }

    /// Name of the JSON type of `value`, for diagnostics.
    #[must_use]
    pub fn describe(value: &Value) -> &'static str {
        match value {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(n) if n.is_f64() => "number",
            Value::Number(_) => "integer",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
            Self::Any => "any",
        };
        f.write_str(name)
    }
}

/// One entry in a schema's field catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub field_type: FieldType,
    pub required: bool,
    pub description: String,
}

impl fmt::Display for FieldSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}, {})",
            self.name,
            self.field_type,
            if self.required { "required" } else { "optional" }
        )?;
        if !self.description.is_empty() {
            write!(f, ": {}", self.description)?;
        }
        Ok(())
    }
}

/// Schema of one module's configuration slice.
///
/// ```rust
/// use shared_config::{ConfigSchema, FieldType};
///
/// let schema = ConfigSchema::new("sql")
///     .required("url", FieldType::String, "Connection URL")
///     .optional("pool_size", FieldType::Integer, "Maximum pooled connections");
/// assert_eq!(schema.fields().len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfigSchema {
    name: String,
    fields: Vec<FieldSpec>,
    allow_unknown: bool,
}

impl ConfigSchema {
    /// Create an empty schema. Unknown fields are allowed by default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            allow_unknown: true,
        }
    }

    /// Declare a required field.
    #[must_use]
    pub fn required(self, name: impl Into<String>, field_type: FieldType, description: &str) -> Self {
        self.field(name, field_type, true, description)
    }

    /// Declare an optional field.
    #[must_use]
    pub fn optional(self, name: impl Into<String>, field_type: FieldType, description: &str) -> Self {
        self.field(name, field_type, false, description)
    }

    /// Reject fields not present in the catalog.
    #[must_use]
    pub fn deny_unknown(mut self) -> Self {
        self.allow_unknown = false;
        self
    }

    fn field(
        mut self,
        name: impl Into<String>,
        field_type: FieldType,
        required: bool,
        description: &str,
    ) -> Self {
        self.fields.push(FieldSpec {
            name: name.into(),
            field_type,
            required,
            description: description.to_string(),
        });
        self
    }

    /// Schema name, usually the owning module's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Full field catalog in declaration order.
    #[must_use]
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    /// Whether fields outside the catalog are tolerated.
    #[must_use]
    pub fn allows_unknown(&self) -> bool {
        self.allow_unknown
    }

    /// Look up a field by name.
    #[must_use]
    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }
}
