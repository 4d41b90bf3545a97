//! Decoded payload values.
//!
//! The validator works on [`Instance`], a closed set of value shapes. Decoded
//! JSON or YAML is converted once at the boundary; integral numbers that fit
//! in `i64` become [`Instance::Integer`], every other number becomes
//! [`Instance::Number`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

/// A decoded value to validate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum Instance {
    Null,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    Array(Vec<Instance>),
    Object(IndexMap<String, Instance>),
}

impl Instance {
    /// Type name for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Instance::Null => "null",
            Instance::Boolean(_) => "boolean",
            Instance::Integer(_) => "integer",
            Instance::Number(_) => "number",
            Instance::String(_) => "string",
            Instance::Array(_) => "array",
            Instance::Object(_) => "object",
        }
    }

    /// Numeric view of integers and numbers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Instance::Integer(i) => Some(*i as f64),
            Instance::Number(n) => Some(*n),
            _ => None,
        }
    }
}

impl From<&Value> for Instance {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => Instance::Null,
            Value::Bool(b) => Instance::Boolean(*b),
            Value::Number(n) => from_number(n),
            Value::String(s) => Instance::String(s.clone()),
            Value::Array(arr) => Instance::Array(arr.iter().map(Instance::from).collect()),
            Value::Object(map) => Instance::Object(
                map.iter()
                    .map(|(k, v)| (k.clone(), Instance::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<Value> for Instance {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Instance::String(s),
            Value::Array(arr) => Instance::Array(arr.into_iter().map(Instance::from).collect()),
            Value::Object(map) => Instance::Object(
                map.into_iter()
                    .map(|(k, v)| (k, Instance::from(v)))
                    .collect(),
            ),
            other => Instance::from(&other),
        }
    }
}

impl From<Instance> for Value {
    fn from(instance: Instance) -> Self {
        match instance {
            Instance::Null => Value::Null,
            Instance::Boolean(b) => Value::Bool(b),
            Instance::Integer(i) => Value::Number(i.into()),
            Instance::Number(n) => Number::from_f64(n).map_or(Value::Null, Value::Number),
            Instance::String(s) => Value::String(s),
            Instance::Array(arr) => Value::Array(arr.into_iter().map(Value::from).collect()),
            Instance::Object(map) => {
                Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect::<Map<_, _>>())
            }
        }
    }
}

fn from_number(n: &Number) -> Instance {
    match n.as_i64() {
        Some(i) => Instance::Integer(i),
        None => Instance::Number(n.as_f64().unwrap_or(f64::NAN)),
    }
}
