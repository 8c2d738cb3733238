//! Shape descriptors for structured generation output.
//!
//! A [`Shape`] names the fields, types, and enumerated values a generation
//! call must return. It renders to JSON Schema for the provider and checks
//! returned values for conformance.

use serde_json::{Map, Value, json};

/// Expected type of a generated value.
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    String,
    Number,
    Boolean,
    /// A string restricted to one of the listed values.
    Enum(Vec<String>),
    /// A list whose items all match the inner shape.
    Array(Box<Shape>),
    /// An object with named fields. Unlisted fields are allowed.
    Object(Vec<Field>),
    /// Any JSON object, contents unchecked.
    AnyObject,
}

/// One named field of an object shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub shape: Shape,
    pub required: bool,
}

impl Field {
    pub fn required(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, shape: Shape) -> Self {
        Self {
            name: name.into(),
            shape,
            required: false,
        }
    }
}

/// Where and how a value failed to match its shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapeMismatch {
    /// JSON-pointer-like path, `$` for the root.
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for ShapeMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

impl Shape {
    pub fn array_of(item: Shape) -> Self {
        Self::Array(Box::new(item))
    }

    pub fn one_of<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Enum(values.into_iter().map(Into::into).collect())
    }

    /// Render as a JSON Schema document.
    pub fn to_json_schema(&self) -> Value {
        match self {
            Self::String => json!({ "type": "string" }),
            Self::Number => json!({ "type": "number" }),
            Self::Boolean => json!({ "type": "boolean" }),
            Self::Enum(values) => json!({ "type": "string", "enum": values }),
            Self::Array(item) => json!({ "type": "array", "items": item.to_json_schema() }),
            Self::AnyObject => json!({ "type": "object" }),
            Self::Object(fields) => {
                let mut properties = Map::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.shape.to_json_schema());
                }
                let required: Vec<&str> = fields
                    .iter()
                    .filter(|f| f.required)
                    .map(|f| f.name.as_str())
                    .collect();
                json!({
                    "type": "object",
                    "properties": properties,
                    "required": required,
                })
            }
        }
    }

    /// Check that `value` conforms to this shape.
    ///
    /// Optional object fields may be absent or `null`.
    pub fn check(&self, value: &Value) -> Result<(), ShapeMismatch> {
        self.check_at(value, "$")
    }

    fn check_at(&self, value: &Value, path: &str) -> Result<(), ShapeMismatch> {
        let mismatch = |message: String| ShapeMismatch {
            path: path.to_string(),
            message,
        };

        match self {
            Self::String => match value {
                Value::String(_) => Ok(()),
                other => Err(mismatch(format!("expected string, got {}", type_name(other)))),
            },
            Self::Number => match value {
                Value::Number(_) => Ok(()),
                other => Err(mismatch(format!("expected number, got {}", type_name(other)))),
            },
            Self::Boolean => match value {
                Value::Bool(_) => Ok(()),
                other => Err(mismatch(format!("expected boolean, got {}", type_name(other)))),
            },
            Self::Enum(allowed) => match value {
                Value::String(s) if allowed.iter().any(|a| a == s) => Ok(()),
                Value::String(s) => Err(mismatch(format!(
                    "'{s}' is not one of [{}]",
                    allowed.join(", ")
                ))),
                other => Err(mismatch(format!("expected string, got {}", type_name(other)))),
            },
            Self::Array(item) => match value {
                Value::Array(items) => {
                    for (i, v) in items.iter().enumerate() {
                        item.check_at(v, &format!("{path}[{i}]"))?;
                    }
                    Ok(())
                }
                other => Err(mismatch(format!("expected array, got {}", type_name(other)))),
            },
            Self::AnyObject => match value {
                Value::Object(_) => Ok(()),
                other => Err(mismatch(format!("expected object, got {}", type_name(other)))),
            },
            Self::Object(fields) => {
                let Value::Object(map) = value else {
                    return Err(mismatch(format!(
                        "expected object, got {}",
                        type_name(value)
                    )));
                };
                for field in fields {
                    let field_path = format!("{path}.{}", field.name);
                    match map.get(&field.name) {
                        None | Some(Value::Null) if field.required => {
                            return Err(ShapeMismatch {
                                path: field_path,
                                message: "missing required field".into(),
                            });
                        }
                        None | Some(Value::Null) => {}
                        Some(v) => field.shape.check_at(v, &field_path)?,
                    }
                }
                Ok(())
            }
        }
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
