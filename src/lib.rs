//! OpenAPI Schema Resolver
//!
//! Reference resolution and payload validation for OpenAPI description
//! documents.
//!
//! The resolver replaces every `#/components/<category>/<name>` marker with
//! the registry entry it names, producing an inlined copy of the document.
//! The validator checks decoded payloads against any schema node of that
//! copy.
//!
//! # Example
//!
//! ```
//! use oas_schema::{load_document_str, resolve, validate, Instance, ResolveOptions, ValidateOptions};
//! use serde_json::json;
//!
//! let document = load_document_str(r##"{
//!     "openapi": "3.0.3",
//!     "paths": {},
//!     "components": {
//!         "schemas": {
//!             "Id": { "type": "integer", "minimum": 1 },
//!             "Pet": {
//!                 "type": "object",
//!                 "required": ["id"],
//!                 "properties": { "id": { "$ref": "#/components/schemas/Id" } }
//!             }
//!         }
//!     }
//! }"##).unwrap();
//!
//! let resolution = resolve(&document, &ResolveOptions::new()).unwrap();
//! assert!(resolution.is_complete());
//!
//! let pet = resolution.document.schema("Pet").unwrap();
//! let options = ValidateOptions::new();
//! assert!(validate(pet, &Instance::from(json!({ "id": 7 })), &options).is_ok());
//! assert!(validate(pet, &Instance::from(json!({ "id": 0 })), &options).is_err());
//! ```
//!
//! # Unresolved Markers
//!
//! | Marker | Outcome |
//! |--------|---------|
//! | target missing | left in place, reported as `not_found` |
//! | outside `#/components/` | left in place, reported as `external` |
//! | unknown category | left in place, reported as `unknown_category` |
//! | refers back into its own entry | left in place, reported as `recursive` |
//! | loops without a concrete node | `ResolveError::CircularReference` |
//! | on a route entry | `ResolveError::PathRef` |

mod error;
mod instance;
mod linter;
mod loader;
mod model;
mod resolver;
mod types;
mod validator;

pub use error::{MarkerError, ResolveError, SchemaError, ValidateError, ViolationKind};
pub use instance::Instance;
pub use linter::{lint, lint_file, Diagnostic, FileResult, FileStatus, LintResult, Severity};
pub use loader::{
    decode, is_url, load_document, load_document_auto, load_document_str, load_instance,
    load_instance_str, load_schema, load_value,
};
pub use model::{
    AdditionalProperties, Callback, Components, Contact, Encoding, Example,
    ExternalDocumentation, Header, Info, License, Link, MediaType, OAuthFlow, OAuthFlows,
    OpenApi, Operation, Parameter, PathItem, RequestBody, Response, Schema, SecurityRequirement,
    SecurityScheme, Server, ServerVariable, Tag, Xml,
};
pub use resolver::{resolve, residual_markers, Resolution, UnresolvedReason, UnresolvedRef};
pub use types::{
    escape_pointer, json_type_name, Category, Marker, ResolveOptions, ValidateOptions,
    COMPONENTS_PREFIX, DEFAULT_MAX_DEPTH, HTTP_METHODS,
};
pub use validator::{validate, validate_component, validate_value};

#[cfg(feature = "remote")]
pub use loader::load_document_url;
