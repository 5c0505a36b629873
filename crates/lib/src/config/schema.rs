//! Structural schemas for configuration documents.
//!
//! A [`Schema`] is deserialized from the subset of JSON Schema the build
//! configurations use: `type`, `properties`, `patternProperties`,
//! `additionalProperties` (boolean or schema), `required`, `enum`, `items`,
//! `minimum`, `maximum`, `maxProperties` and `minItems`. The annotations
//! `$schema`, `$comment`, `title`, `description` and `default` are accepted.
//! Any other keyword is rejected when the schema is built. The empty schema
//! `{}` accepts any value.

use std::collections::BTreeMap;
use std::fmt;

use regex::Regex;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
/// JSON value kinds a schema can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
  Object,
  Array,
  String,
  Integer,
  Number,
  Boolean,
  Null,
}

impl SchemaType {
  fn matches(self, value: &Value) -> bool {
    match self {
      SchemaType::Object => value.is_object(),
      SchemaType::Array => value.is_array(),
      SchemaType::String => value.is_string(),
      SchemaType::Integer => match value {
        Value::Number(n) => n.is_i64() || n.is_u64() || n.as_f64().is_some_and(|f| f.fract() == 0.0),
        _ => false,
      },
      SchemaType::Number => value.is_number(),
      SchemaType::Boolean => value.is_boolean(),
      SchemaType::Null => value.is_null(),
    }
  }
}

impl fmt::Display for SchemaType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      SchemaType::Object => "object",
      SchemaType::Array => "array",
      SchemaType::String => "string",
      SchemaType::Integer => "integer",
      SchemaType::Number => "number",
      SchemaType::Boolean => "boolean",
      SchemaType::Null => "null",
    };
    f.write_str(name)
  }
}

/// A `type` keyword: one kind or a list of accepted kinds.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
  One(SchemaType),
  Any(Vec<SchemaType>),
}

impl TypeSpec {
  fn matches(&self, value: &Value) -> bool {
    match self {
      TypeSpec::One(kind) => kind.matches(value),
      TypeSpec::Any(kinds) => kinds.iter().any(|k| k.matches(value)),
    }
  }
}

impl fmt::Display for TypeSpec {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      TypeSpec::One(kind) => write!(f, "{}", kind),
      TypeSpec::Any(kinds) => {
        let names: Vec<String> = kinds.iter().map(|k| k.to_string()).collect();
        write!(f, "one of [{}]", names.join(", "))
      }
    }
  }
}

/// A structural contract for one configuration document.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Schema {
  #[serde(rename = "type")]
  pub kind: Option<TypeSpec>,

  #[serde(default)]
  pub properties: BTreeMap<String, Schema>,

  /// Compiled once, when the schema is deserialized.
  #[serde(default, deserialize_with = "compile_patterns")]
  pub pattern_properties: Vec<PatternProperty>,

  /// Applies to keys matched by neither `properties` nor `patternProperties`.
  pub additional_properties: Option<Additional>,

  #[serde(default)]
  pub required: Vec<String>,

  #[serde(rename = "enum")]
  pub enumeration: Option<Vec<Value>>,

  pub items: Option<Box<Schema>>,

  pub minimum: Option<f64>,

  pub maximum: Option<f64>,

  pub max_properties: Option<usize>,

  pub min_items: Option<usize>,

  #[serde(rename = "$schema")]
  pub dialect: Option<String>,

  #[serde(rename = "$comment")]
  pub comment: Option<String>,

  pub title: Option<String>,

  pub description: Option<String>,

  pub default: Option<Value>,
}

/// One `patternProperties` entry. Matching is an unanchored search.
#[derive(Debug, Clone)]
pub struct PatternProperty {
  pub regex: Regex,
  pub schema: Schema,
}

/// The `additionalProperties` keyword.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Additional {
  Allowed(bool),
  Schema(Box<Schema>),
}

fn compile_patterns<'de, D>(deserializer: D) -> Result<Vec<PatternProperty>, D::Error>
where
  D: Deserializer<'de>,
{
  BTreeMap::<String, Schema>::deserialize(deserializer)?
    .into_iter()
    .map(|(pattern, schema)| match Regex::new(&pattern) {
      Ok(regex) => Ok(PatternProperty { regex, schema }),
      Err(err) => Err(D::Error::custom(format!("invalid pattern '{}': {}", pattern, err))),
    })
    .collect()
}

/// A single schema violation: where it happened and what was wrong.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
  /// JSON-pointer-like location, `/` for the document root.
  pub path: String,
  pub message: String,
}

/// A schema that could not be built from its JSON form: a malformed keyword,
/// a pattern that does not compile, or a keyword outside the supported subset.
#[derive(Debug, thiserror::Error)]
#[error("invalid schema: {0}")]
pub struct SchemaError(#[from] serde_json::Error);

impl Schema {
  /// The schema that accepts every value.
  pub fn any() -> Self {
    Self::default()
  }

  /// A schema requiring one value kind.
  pub fn of(kind: SchemaType) -> Self {
    Self {
      kind: Some(TypeSpec::One(kind)),
      ..Self::default()
    }
  }

  /// A schema accepting any of `kinds`.
  pub fn of_any(kinds: &[SchemaType]) -> Self {
    Self {
      kind: Some(TypeSpec::Any(kinds.to_vec())),
      ..Self::default()
    }
  }

  /// An array schema whose items follow `items`.
  pub fn array_of(items: Schema) -> Self {
    Self {
      items: Some(Box::new(items)),
      ..Self::of(SchemaType::Array)
    }
  }

  pub fn property(mut self, name: impl Into<String>, schema: Schema) -> Self {
    self.properties.insert(name.into(), schema);
    self
  }

  pub fn require(mut self, keys: &[&str]) -> Self {
    self.required.extend(keys.iter().map(|k| k.to_string()));
    self
  }

  /// Reject keys not named by `properties` or `patternProperties`.
  pub fn closed(mut self) -> Self {
    self.additional_properties = Some(Additional::Allowed(false));
    self
  }

  /// Validate keys not named by `properties` or `patternProperties` against
  /// `schema`.
  pub fn additional(mut self, schema: Schema) -> Self {
    self.additional_properties = Some(Additional::Schema(Box::new(schema)));
    self
  }

  /// Build a schema from its JSON form.
  pub fn from_json(value: Value) -> Result<Self, SchemaError> {
    Ok(serde_json::from_value(value)?)
  }

  /// Validate `value`, returning the first violation found.
  pub fn validate(&self, value: &Value) -> Result<(), Violation> {
    self.validate_at(value, "")
  }

  fn validate_at(&self, value: &Value, path: &str) -> Result<(), Violation> {
    let fail = |message: String| Violation {
      path: if path.is_empty() { "/".to_string() } else { path.to_string() },
      message,
    };

    if let Some(kind) = &self.kind {
      if !kind.matches(value) {
        return Err(fail(format!("{} is not of type {}", describe(value), kind)));
      }
    }

    if let Some(allowed) = &self.enumeration {
      if !allowed.contains(value) {
        return Err(fail(format!("{} is not one of {}", describe(value), Value::Array(allowed.clone()))));
      }
    }

    if let Some(n) = value.as_f64() {
      if self.minimum.is_some_and(|min| n < min) {
        return Err(fail(format!("{} is less than the minimum of {}", n, self.minimum.unwrap_or_default())));
      }
      if self.maximum.is_some_and(|max| n > max) {
        return Err(fail(format!("{} is greater than the maximum of {}", n, self.maximum.unwrap_or_default())));
      }
    }

    match value {
      Value::Object(map) => {
        for key in &self.required {
          if !map.contains_key(key) {
            return Err(fail(format!("'{}' is a required property", key)));
          }
        }

        if let Some(max) = self.max_properties.filter(|max| map.len() > *max) {
          return Err(fail(format!("object has {} properties, at most {} allowed", map.len(), max)));
        }

        for (key, child) in map {
          let child_path = format!("{}/{}", path, key);
          let mut matched = false;

          if let Some(sub) = self.properties.get(key) {
            matched = true;
            sub.validate_at(child, &child_path)?;
          }
          for pattern in &self.pattern_properties {
            if pattern.regex.is_match(key) {
              matched = true;
              pattern.schema.validate_at(child, &child_path)?;
            }
          }

          if !matched {
            match &self.additional_properties {
              Some(Additional::Allowed(false)) => {
                return Err(fail(format!("additional property '{}' is not allowed", key)));
              }
              Some(Additional::Schema(sub)) => sub.validate_at(child, &child_path)?,
              Some(Additional::Allowed(true)) | None => {}
            }
          }
        }
      }
      Value::Array(items) => {
        if let Some(min) = self.min_items.filter(|min| items.len() < *min) {
          return Err(fail(format!("array has {} items, at least {} required", items.len(), min)));
        }
        if let Some(item_schema) = &self.items {
          for (i, item) in items.iter().enumerate() {
            item_schema.validate_at(item, &format!("{}/{}", path, i))?;
          }
        }
      }
      _ => {}
    }

    Ok(())
  }
}

/// Render `value` for a message, at most 60 characters.
fn describe(value: &Value) -> String {
  let rendered = value.to_string();
  if rendered.chars().count() > 60 {
    format!("{}...", rendered.chars().take(57).collect::<String>())
  } else {
    rendered
  }
}
