//! Payload validation against schema nodes.
//!
//! Checks are applied in a fixed order per type, and every violation carries
//! the JSON Pointer of the offending value. With
//! [`ValidateOptions::stop_on_failure`] set (the default) the first violation
//! ends validation; otherwise all violations are collected.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::error::{ResolveError, SchemaError, ValidateError, ViolationKind};
use crate::instance::Instance;
use crate::model::{AdditionalProperties, OpenApi, Schema};
use crate::resolver::resolve;
use crate::types::{escape_pointer, ResolveOptions, ValidateOptions};

/// Validate an instance against a schema node.
///
/// The schema should come from a resolved document; a node that still
/// carries a marker is reported as an `unresolved_reference` violation.
///
/// # Errors
///
/// Returns `ValidateError::Invalid` with one violation (or all of them when
/// `stop_on_failure` is false).
pub fn validate(
    schema: &Schema,
    instance: &Instance,
    options: &ValidateOptions,
) -> Result<(), ValidateError> {
    let mut validator = Validator::new(options);
    // Halt only signals early exit; the violation is already recorded.
    let _ = validator.check(schema, instance, "", 0);

    if validator.errors.is_empty() {
        Ok(())
    } else {
        debug!(errors = validator.errors.len(), "validation failed");
        Err(ValidateError::Invalid {
            errors: validator.errors,
        })
    }
}

/// Validate a decoded JSON value, either side of which may be absent.
///
/// # Errors
///
/// Returns `MissingSchema` or `MissingInstance` before any check runs,
/// otherwise the same as [`validate`].
pub fn validate_value(
    schema: Option<&Schema>,
    value: Option<&Value>,
    options: &ValidateOptions,
) -> Result<(), ValidateError> {
    let schema = schema.ok_or(ValidateError::MissingSchema)?;
    let value = value.ok_or(ValidateError::MissingInstance)?;
    validate(schema, &Instance::from(value), options)
}

/// Resolve a document and validate an instance against one of its schema
/// components.
///
/// Use this when the schema lives in a description document. To validate
/// many payloads, resolve once and call [`validate`] directly.
pub fn validate_component(
    document: &OpenApi,
    component: &str,
    instance: &Instance,
    options: &ValidateOptions,
) -> Result<(), ValidateError> {
    let resolution = resolve(document, &ResolveOptions::new())?;
    let schema = resolution
        .document
        .schema(component)
        .ok_or_else(|| ResolveError::ComponentNotFound {
            name: component.to_string(),
        })?;
    validate(schema, instance, options)
}

/// Early-exit signal when stopping on the first failure.
struct Halt;

type Step = Result<(), Halt>;

struct Validator<'o> {
    options: &'o ValidateOptions,
    errors: Vec<SchemaError>,
}

impl<'o> Validator<'o> {
    fn new(options: &'o ValidateOptions) -> Self {
        Self {
            options,
            errors: Vec::new(),
        }
    }

    fn report(&mut self, path: &str, kind: ViolationKind, message: String) -> Step {
        debug!(path, ?kind, %message, "violation");
        self.errors.push(SchemaError {
            path: path.to_string(),
            kind,
            message,
        });
        if self.options.stop_on_failure {
            Err(Halt)
        } else {
            Ok(())
        }
    }

    fn check(&mut self, schema: &Schema, instance: &Instance, path: &str, depth: usize) -> Step {
        if depth > self.options.max_depth {
            return self.report(
                path,
                ViolationKind::DepthExceeded,
                format!("maximum depth of {} exceeded", self.options.max_depth),
            );
        }

        if let Some(marker) = schema.marker() {
            return self.report(
                path,
                ViolationKind::UnresolvedReference,
                format!("schema reference '{}' is unresolved", marker),
            );
        }

        if let Instance::Null = instance {
            if schema.nullable {
                return Ok(());
            }
            return self.report(
                path,
                ViolationKind::NullValue,
                "value is null but schema is not nullable".to_string(),
            );
        }

        match schema.schema_type.as_deref() {
            Some("string") => self.check_string(schema, instance, path),
            Some("integer") => self.check_integer(schema, instance, path),
            Some("number") => self.check_number(schema, instance, path),
            Some("boolean") => match instance {
                Instance::Boolean(_) => Ok(()),
                other => self.mismatch(path, "boolean", other),
            },
            Some("array") => self.check_array(schema, instance, path, depth),
            Some("object") => self.check_object(schema, instance, path, depth),
            other => self.report(
                path,
                ViolationKind::UnsupportedType,
                format!("unsupported schema type: {}", other.unwrap_or("")),
            ),
        }
    }

    fn mismatch(&mut self, path: &str, expected: &str, got: &Instance) -> Step {
        self.report(
            path,
            ViolationKind::TypeMismatch,
            format!("expected {}, got {}", expected, got.kind()),
        )
    }

    fn check_string(&mut self, schema: &Schema, instance: &Instance, path: &str) -> Step {
        let Instance::String(s) = instance else {
            return self.mismatch(path, "string", instance);
        };
        let length = s.chars().count();

        if let Some(min) = schema.min_length {
            if length < min {
                self.report(
                    path,
                    ViolationKind::TooShort,
                    format!("string length is less than minimum length of {}", min),
                )?;
            }
        }
        if let Some(max) = schema.max_length {
            if length > max {
                self.report(
                    path,
                    ViolationKind::TooLong,
                    format!("string length exceeds maximum length of {}", max),
                )?;
            }
        }
        if let Some(pattern) = schema.pattern.as_deref() {
            match Regex::new(pattern) {
                Ok(re) if !re.is_match(s) => {
                    self.report(
                        path,
                        ViolationKind::PatternMismatch,
                        format!("string does not match pattern: {}", pattern),
                    )?;
                }
                Ok(_) => {}
                Err(e) => {
                    self.report(
                        path,
                        ViolationKind::InvalidPattern,
                        format!("error compiling pattern {}: {}", pattern, e),
                    )?;
                }
            }
        }
        if let Some(allowed) = schema.enum_values.as_deref() {
            if !allowed.iter().any(|v| v.as_str() == Some(s.as_str())) {
                self.report(
                    path,
                    ViolationKind::EnumMismatch,
                    format!(
                        "string is not one of the allowed values: {}",
                        list_values(allowed)
                    ),
                )?;
            }
        }
        Ok(())
    }

    fn check_integer(&mut self, schema: &Schema, instance: &Instance, path: &str) -> Step {
        let Instance::Integer(i) = instance else {
            return self.mismatch(path, "integer", instance);
        };
        self.check_numeric(schema, Numeric::Integer(*i), path)
    }

    fn check_number(&mut self, schema: &Schema, instance: &Instance, path: &str) -> Step {
        match instance {
            Instance::Integer(i) => self.check_numeric(schema, Numeric::Integer(*i), path),
            Instance::Number(n) => self.check_numeric(schema, Numeric::Number(*n), path),
            other => self.mismatch(path, "number", other),
        }
    }

    fn check_numeric(&mut self, schema: &Schema, value: Numeric, path: &str) -> Step {
        let label = value.label();
        let v = value.as_f64();

        if let Some(min) = schema.minimum {
            if v < min {
                self.report(
                    path,
                    ViolationKind::BelowMinimum,
                    format!("{} value is less than minimum value of {}", label, min),
                )?;
            }
        }
        if let Some(max) = schema.maximum {
            if v > max {
                self.report(
                    path,
                    ViolationKind::AboveMaximum,
                    format!("{} value exceeds maximum value of {}", label, max),
                )?;
            }
        }
        if let Some(m) = schema.multiple_of {
            if m <= 0.0 || !m.is_finite() {
                self.report(
                    path,
                    ViolationKind::InvalidConstraint,
                    format!("multipleOf must be a positive number, got {}", m),
                )?;
            } else if !value.is_multiple_of(m) {
                self.report(
                    path,
                    ViolationKind::NotMultipleOf,
                    format!("{} value is not a multiple of {}", label, m),
                )?;
            }
        }
        if schema.exclusive_minimum && schema.minimum == Some(v) {
            self.report(
                path,
                ViolationKind::BelowMinimum,
                format!("{} value is equal to exclusive minimum value of {}", label, v),
            )?;
        }
        if schema.exclusive_maximum && schema.maximum == Some(v) {
            self.report(
                path,
                ViolationKind::AboveMaximum,
                format!("{} value is equal to exclusive maximum value of {}", label, v),
            )?;
        }
        if let Some(allowed) = schema.enum_values.as_deref() {
            if !allowed.iter().any(|e| value.matches(e)) {
                self.report(
                    path,
                    ViolationKind::EnumMismatch,
                    format!(
                        "{} value is not one of the allowed values: {}",
                        label,
                        list_values(allowed)
                    ),
                )?;
            }
        }
        Ok(())
    }

    fn check_array(
        &mut self,
        schema: &Schema,
        instance: &Instance,
        path: &str,
        depth: usize,
    ) -> Step {
        let Instance::Array(items) = instance else {
            return self.mismatch(path, "array", instance);
        };

        if let Some(item_schema) = schema.items.as_deref() {
            for (i, item) in items.iter().enumerate() {
                self.check(item_schema, item, &format!("{}/{}", path, i), depth + 1)?;
            }
        }

        if let Some(min) = schema.min_items {
            if items.len() < min {
                self.report(
                    path,
                    ViolationKind::TooFewItems,
                    format!("array has fewer items than minimum of {}", min),
                )?;
            }
        }
        if let Some(max) = schema.max_items {
            if items.len() > max {
                self.report(
                    path,
                    ViolationKind::TooManyItems,
                    format!("array has more items than maximum of {}", max),
                )?;
            }
        }
        if schema.unique_items {
            if let Some((first, second)) = first_duplicate(items) {
                self.report(
                    path,
                    ViolationKind::DuplicateItems,
                    format!("array items at index {} and {} are equal", first, second),
                )?;
            }
        }
        Ok(())
    }

    fn check_object(
        &mut self,
        schema: &Schema,
        instance: &Instance,
        path: &str,
        depth: usize,
    ) -> Step {
        let Instance::Object(map) = instance else {
            return self.mismatch(path, "object", instance);
        };

        for (name, property) in &schema.properties {
            if let Some(value) = map.get(name) {
                let property_path = format!("{}/{}", path, escape_pointer(name));
                self.check(property, value, &property_path, depth + 1)?;
            }
        }

        for (key, value) in map {
            if schema.properties.contains_key(key) {
                continue;
            }
            let key_path = format!("{}/{}", path, escape_pointer(key));
            if self.options.strict {
                self.report(
                    &key_path,
                    ViolationKind::DisallowedProperty,
                    format!("property '{}' is not allowed", key),
                )?;
                continue;
            }
            match schema.additional_properties.as_ref() {
                Some(AdditionalProperties::Schema(extra)) => {
                    self.check(extra, value, &key_path, depth + 1)?;
                }
                Some(AdditionalProperties::Allowed(false)) => {
                    self.report(
                        &key_path,
                        ViolationKind::DisallowedProperty,
                        format!("property '{}' is not allowed", key),
                    )?;
                }
                _ => {}
            }
        }

        for name in &schema.required {
            if !map.contains_key(name) {
                self.report(
                    path,
                    ViolationKind::MissingRequired,
                    format!("required property '{}' is missing", name),
                )?;
            }
        }

        if let Some(min) = schema.min_properties {
            if map.len() < min {
                self.report(
                    path,
                    ViolationKind::TooFewProperties,
                    format!("object has fewer properties than minimum of {}", min),
                )?;
            }
        }
        if let Some(max) = schema.max_properties {
            if map.len() > max {
                self.report(
                    path,
                    ViolationKind::TooManyProperties,
                    format!("object has more properties than maximum of {}", max),
                )?;
            }
        }
        Ok(())
    }
}

/// A numeric instance, keeping integers exact.
#[derive(Clone, Copy)]
enum Numeric {
    Integer(i64),
    Number(f64),
}

impl Numeric {
    fn label(self) -> &'static str {
        match self {
            Numeric::Integer(_) => "integer",
            Numeric::Number(_) => "number",
        }
    }

    fn as_f64(self) -> f64 {
        match self {
            Numeric::Integer(i) => i as f64,
            Numeric::Number(n) => n,
        }
    }

    /// `m` must be positive and finite.
    fn is_multiple_of(self, m: f64) -> bool {
        match self {
            // Widened so divisors of 2^63 and above stay exact.
            Numeric::Integer(i) if m.fract() == 0.0 => {
                if m < i128::MAX as f64 {
                    i128::from(i) % (m as i128) == 0
                } else {
                    i == 0
                }
            }
            _ => {
                let q = self.as_f64() / m;
                q.trunc() == q
            }
        }
    }

    fn matches(self, candidate: &Value) -> bool {
        match (self, candidate) {
            (Numeric::Integer(i), Value::Number(n)) if n.is_i64() => n.as_i64() == Some(i),
            (_, Value::Number(n)) => n.as_f64() == Some(self.as_f64()),
            _ => false,
        }
    }
}

fn list_values(values: &[Value]) -> String {
    let items: Vec<String> = values.iter().map(Value::to_string).collect();
    format!("[{}]", items.join(", "))
}

/// Indices of the first pair of equal items, numerically comparing
/// integers with numbers.
fn first_duplicate(items: &[Instance]) -> Option<(usize, usize)> {
    for (i, a) in items.iter().enumerate() {
        for (j, b) in items.iter().enumerate().skip(i + 1) {
            if instances_equal(a, b) {
                return Some((i, j));
            }
        }
    }
    None
}

fn instances_equal(a: &Instance, b: &Instance) -> bool {
    match (a, b) {
        (Instance::Integer(_) | Instance::Number(_), Instance::Integer(_) | Instance::Number(_)) => {
            a.as_f64() == b.as_f64()
        }
        (Instance::Array(x), Instance::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| instances_equal(a, b))
        }
        (Instance::Object(x), Instance::Object(y)) => {
            x.len() == y.len()
                && x.iter()
                    .all(|(k, v)| y.get(k).is_some_and(|w| instances_equal(v, w)))
        }
        _ => a == b,
    }
}
