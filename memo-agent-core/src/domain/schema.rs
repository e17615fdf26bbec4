//! Structured view of a tool's JSON input schema.
//!
//! Only the subset tool servers actually emit is understood: a top-level
//! object with `properties`, an optional `required` list, per-property
//! `type` (string or list), `anyOf`/`oneOf` unions and `default`.

use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("input schema must be a JSON object")]
    NotAnObject,
    #[error("input schema type must be 'object', found '{0}'")]
    NotObjectType(String),
    #[error("input schema 'properties' must be an object")]
    InvalidProperties,
    #[error("property '{name}' has an invalid definition")]
    InvalidProperty { name: String },
    #[error("property '{name}' uses unsupported type '{found}'")]
    UnsupportedType { name: String, found: String },
    #[error("input schema 'required' must be a list of property names")]
    InvalidRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Any,
}

impl FieldType {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "string" => Some(FieldType::String),
            "integer" => Some(FieldType::Integer),
            "number" => Some(FieldType::Number),
            "boolean" => Some(FieldType::Boolean),
            "array" => Some(FieldType::Array),
            "object" => Some(FieldType::Object),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Any => "any",
        }
    }

    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Integer => {
                value.is_i64()
                    || value.is_u64()
                    || value.as_f64().is_some_and(|number| number.fract() == 0.0)
            }
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub field_type: FieldType,
    pub required: bool,
    pub nullable: bool,
    pub default: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputSchema {
    fields: BTreeMap<String, FieldSpec>,
}

impl InputSchema {
    pub fn parse(schema: &Value) -> Result<Self, SchemaError> {
        let object = schema.as_object().ok_or(SchemaError::NotAnObject)?;

        if let Some(kind) = object.get("type") {
            match kind.as_str() {
                Some("object") => {}
                Some(other) => return Err(SchemaError::NotObjectType(other.to_string())),
                None => return Err(SchemaError::NotObjectType(kind.to_string())),
            }
        }

        let mut fields = BTreeMap::new();
        if let Some(properties) = object.get("properties") {
            let properties = properties
                .as_object()
                .ok_or(SchemaError::InvalidProperties)?;
            for (name, definition) in properties {
                fields.insert(name.clone(), parse_property(name, definition)?);
            }
        }

        if let Some(required) = object.get("required") {
            let names = required.as_array().ok_or(SchemaError::InvalidRequired)?;
            for name in names {
                let name = name.as_str().ok_or(SchemaError::InvalidRequired)?;
                fields
                    .entry(name.to_string())
                    .or_insert(FieldSpec {
                        field_type: FieldType::Any,
                        required: true,
                        nullable: false,
                        default: None,
                    })
                    .required = true;
            }
        }

        Ok(Self { fields })
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldSpec)> {
        self.fields.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.get(name)
    }

    pub fn required_fields(&self) -> impl Iterator<Item = &str> {
        self.fields
            .iter()
            .filter(|(_, spec)| spec.required)
            .map(|(name, _)| name.as_str())
    }

    /// Lists every problem with `arguments`; empty means valid.
    ///
    /// Unknown argument names are tolerated, the server decides what to do
    /// with them.
    pub fn violations(&self, arguments: &Value) -> Vec<String> {
        let empty = Map::new();
        let map = match arguments {
            Value::Object(map) => map,
            Value::Null => &empty,
            other => {
                return vec![format!(
                    "arguments must be a JSON object, got {}",
                    describe(other)
                )];
            }
        };

        let mut problems = Vec::new();
        for (name, spec) in &self.fields {
            match map.get(name) {
                None => {
                    if spec.required {
                        problems.push(format!("missing required field '{name}'"));
                    }
                }
                Some(Value::Null) => {
                    if !spec.nullable && (spec.required || spec.field_type != FieldType::Any) {
                        problems.push(format!("field '{name}' must not be null"));
                    }
                }
                Some(value) => {
                    if !spec.field_type.accepts(value) {
                        problems.push(format!(
                            "field '{name}' must be of type {}, got {}",
                            spec.field_type.as_str(),
                            describe(value)
                        ));
                    }
                }
            }
        }
        problems
    }
}

fn parse_property(name: &str, definition: &Value) -> Result<FieldSpec, SchemaError> {
    let invalid = || SchemaError::InvalidProperty {
        name: name.to_string(),
    };

    let object = match definition {
        Value::Object(object) => object,
        Value::Bool(true) => {
            return Ok(FieldSpec {
                field_type: FieldType::Any,
                required: false,
                nullable: true,
                default: None,
            });
        }
        _ => return Err(invalid()),
    };

    let mut names = Vec::new();
    if let Some(kind) = object.get("type") {
        collect_type_names(kind, &mut names).ok_or_else(invalid)?;
    }
    for key in ["anyOf", "oneOf"] {
        if let Some(variants) = object.get(key) {
            let variants = variants.as_array().ok_or_else(invalid)?;
            for variant in variants {
                if let Some(kind) = variant.get("type") {
                    collect_type_names(kind, &mut names).ok_or_else(invalid)?;
                }
            }
        }
    }

    let nullable = names.iter().any(|kind| kind == "null");
    let mut field_type = FieldType::Any;
    if let Some(primary) = names.iter().find(|kind| kind.as_str() != "null") {
        field_type = FieldType::parse(primary).ok_or_else(|| SchemaError::UnsupportedType {
            name: name.to_string(),
            found: primary.clone(),
        })?;
    }

    Ok(FieldSpec {
        field_type,
        required: false,
        nullable,
        default: object.get("default").cloned(),
    })
}

fn collect_type_names(kind: &Value, names: &mut Vec<String>) -> Option<()> {
    match kind {
        Value::String(name) => names.push(name.clone()),
        Value::Array(items) => {
            for item in items {
                names.push(item.as_str()?.to_string());
            }
        }
        _ => return None,
    }
    Some(())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
