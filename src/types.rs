//! Core types for OpenAPI reference resolution and validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::MarkerError;

/// Prefix shared by every in-document component marker.
pub const COMPONENTS_PREFIX: &str = "#/components/";

/// Verb slots of a path item, in document order.
pub const HTTP_METHODS: &[&str] = &[
    "get", "put", "post", "delete", "options", "head", "patch", "trace",
];

/// Default recursion limit for validation.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Escape a key for use as a JSON Pointer segment (RFC 6901).
pub fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Component registry category a marker can point into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Category {
    Schemas,
    Responses,
    Parameters,
    RequestBodies,
    Headers,
    SecuritySchemes,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::Schemas,
        Category::Responses,
        Category::Parameters,
        Category::RequestBodies,
        Category::Headers,
        Category::SecuritySchemes,
    ];

    /// The literal token used in markers.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Schemas => "schemas",
            Category::Responses => "responses",
            Category::Parameters => "parameters",
            Category::RequestBodies => "requestBodies",
            Category::Headers => "headers",
            Category::SecuritySchemes => "securitySchemes",
        }
    }

    /// Parse a category token, ignoring ASCII case.
    ///
    /// Returns `None` for unknown tokens (caller should error).
    pub fn parse(s: &str) -> Option<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s))
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parsed `#/components/<category>/<name>` marker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Marker {
    pub category: Category,
    pub name: String,
}

impl Marker {
    /// Parse a marker string.
    ///
    /// The category is everything between the prefix and the last `/`, the
    /// name is everything after it. Names containing `/` therefore misparse
    /// into an unknown category.
    pub fn parse(marker: &str) -> Result<Self, MarkerError> {
        let rest = marker
            .strip_prefix(COMPONENTS_PREFIX)
            .ok_or_else(|| MarkerError::NotLocal {
                marker: marker.to_string(),
            })?;

        let (category, name) = rest.rsplit_once('/').ok_or_else(|| MarkerError::Malformed {
            marker: marker.to_string(),
        })?;

        if name.is_empty() {
            return Err(MarkerError::Malformed {
                marker: marker.to_string(),
            });
        }

        let category = Category::parse(category).ok_or_else(|| MarkerError::UnknownCategory {
            marker: marker.to_string(),
            category: category.to_string(),
        })?;

        Ok(Self {
            category,
            name: name.to_string(),
        })
    }

    /// JSON Pointer to the registry entry this marker designates.
    pub fn pointer(&self) -> String {
        format!(
            "/components/{}/{}",
            self.category,
            escape_pointer(&self.name)
        )
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/{}", COMPONENTS_PREFIX, self.category, self.name)
    }
}

/// Options for document resolution.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// When true, any marker left unresolved turns into a hard error
    /// instead of an entry in the resolution report.
    pub deny_unresolved: bool,
}

impl ResolveOptions {
    /// Create resolve options with unresolved markers tolerated (default).
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail resolution when any marker is left unresolved.
    pub fn deny_unresolved(mut self, deny: bool) -> Self {
        self.deny_unresolved = deny;
        self
    }
}

/// Options for payload validation.
#[derive(Debug, Clone)]
pub struct ValidateOptions {
    /// Reject object keys not declared in the schema's `properties`.
    pub strict: bool,
    /// Return on the first violation. When false, every violation is
    /// collected into a single error.
    pub stop_on_failure: bool,
    /// Maximum nesting depth of schema/value recursion.
    pub max_depth: usize,
}

impl Default for ValidateOptions {
    fn default() -> Self {
        Self {
            strict: false,
            stop_on_failure: true,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl ValidateOptions {
    /// Create validate options: lenient objects, first-failure reporting.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set strict mode (reject undeclared object keys).
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Set whether validation stops at the first violation.
    pub fn stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }

    pub fn max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }
}
