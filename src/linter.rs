//! Document linting - static analysis of description files.
//!
//! Checks JSON/YAML description documents for:
//! - Syntax errors
//! - Malformed `$ref` markers and unknown component categories
//! - Markers whose target is missing from `components`
//! - Markers pointing into a category that does not fit their slot
//! - Markers on route entries, which resolution always rejects

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use crate::error::MarkerError;
use crate::loader::load_value;
use crate::types::{escape_pointer, json_type_name, Category, Marker, HTTP_METHODS};

/// File extensions picked up when linting a directory.
const DOCUMENT_EXTENSIONS: &[&str] = &["json", "yaml", "yml"];

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from linting.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: PathBuf,
    /// JSON Pointer to the issue (e.g., "/paths/~1pets/get/responses/200")
    pub path: String,
    pub message: String,
}

/// Result of linting a single file.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: PathBuf,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a linted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of linting a directory or set of files.
#[derive(Debug, Clone, Serialize)]
pub struct LintResult {
    pub path: PathBuf,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl LintResult {
    /// Returns true if all files passed (no errors).
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }
}

/// Lint a file or directory.
///
/// If path is a directory, recursively finds all .json, .yaml and .yml files.
/// If `strict` is true, warnings are treated as errors.
/// Returns aggregated results for all files.
pub fn lint(path: &Path, strict: bool) -> LintResult {
    let files = collect_document_files(path);
    let mut results = Vec::new();
    let mut total_errors = 0;
    let mut total_warnings = 0;

    for file in &files {
        let file_result = lint_file(file, path);
        total_errors += file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Error)
            .count();
        total_warnings += file_result
            .diagnostics
            .iter()
            .filter(|d| d.severity == Severity::Warning)
            .count();
        results.push(file_result);
    }

    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    LintResult {
        path: path.to_path_buf(),
        files_checked: files.len(),
        passed: files.len() - failed,
        failed,
        errors: total_errors,
        warnings: total_warnings,
        results,
    }
}

/// Lint a single description document.
pub fn lint_file(file: &Path, base_path: &Path) -> FileResult {
    let relative = file.strip_prefix(base_path).unwrap_or(file).to_path_buf();
    let mut lint = FileLint {
        file,
        diagnostics: Vec::new(),
    };

    let document = match load_value(file) {
        Ok(Value::Object(map)) => Value::Object(map),
        Ok(other) => {
            lint.error(
                "E001",
                "",
                format!(
                    "syntax error: document root is {}, expected an object",
                    json_type_name(&other)
                ),
            );
            return lint.finish(relative);
        }
        Err(e) => {
            lint.error("E001", "", format!("syntax error: {}", e));
            return lint.finish(relative);
        }
    };

    if document.get("openapi").is_none() {
        lint.warning("W002", "", "document missing openapi version field".to_string());
    }

    let components = document.get("components");
    for (key, value) in object_entries(&document) {
        let path = format!("/{}", escape_pointer(key));
        if key == "paths" {
            lint.check_paths(value, &path, components);
        } else {
            let slot = if key == "components" { Slot::Components } else { Slot::Other };
            lint.check_refs(value, &path, slot, components);
        }
    }

    lint.finish(relative)
}

struct FileLint<'a> {
    file: &'a Path,
    diagnostics: Vec<Diagnostic>,
}

impl FileLint<'_> {
    fn push(&mut self, severity: Severity, code: &str, path: &str, message: String) {
        self.diagnostics.push(Diagnostic {
            severity,
            code: code.to_string(),
            file: self.file.to_path_buf(),
            path: if path.is_empty() { "/".to_string() } else { path.to_string() },
            message,
        });
    }

    fn error(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Error, code, path, message);
    }

    fn warning(&mut self, code: &str, path: &str, message: String) {
        self.push(Severity::Warning, code, path, message);
    }

    fn finish(self, file: PathBuf) -> FileResult {
        let has_errors = self.diagnostics.iter().any(|d| d.severity == Severity::Error);
        let has_warnings = self
            .diagnostics
            .iter()
            .any(|d| d.severity == Severity::Warning);

        let status = if has_errors {
            FileStatus::Error
        } else if has_warnings {
            FileStatus::Warning
        } else {
            FileStatus::Ok
        };

        FileResult {
            file,
            status,
            diagnostics: self.diagnostics,
        }
    }

    /// Route entries may not carry markers; everything below them may.
    fn check_paths(&mut self, paths: &Value, path: &str, components: Option<&Value>) {
        for (route, item) in object_entries(paths) {
            let route_path = format!("{}/{}", path, escape_pointer(route));
            if let Some(Value::String(marker)) = item.get("$ref") {
                self.error(
                    "E004",
                    &route_path,
                    format!("path '{}' uses reference {}: path items cannot be references", route, marker),
                );
            }
            for (key, value) in object_entries(item) {
                if key != "$ref" {
                    let child_path = format!("{}/{}", route_path, escape_pointer(key));
                    self.check_refs(value, &child_path, Slot::PathItem.child(key), components);
                }
            }
        }
    }

    /// Recursively check $ref markers below a node of kind `slot`.
    fn check_refs(&mut self, value: &Value, path: &str, slot: Slot, components: Option<&Value>) {
        match value {
            Value::Object(map) => {
                if let Some(Value::String(marker)) = map.get("$ref") {
                    self.check_marker(marker, path, slot.category(), components);
                }
                for (key, child) in map {
                    let child_path = format!("{}/{}", path, escape_pointer(key));
                    self.check_refs(child, &child_path, slot.child(key), components);
                }
            }
            Value::Array(arr) => {
                for (i, item) in arr.iter().enumerate() {
                    let item_path = format!("{}/{}", path, i);
                    self.check_refs(item, &item_path, slot.child(""), components);
                }
            }
            _ => {}
        }
    }

    fn check_marker(
        &mut self,
        marker: &str,
        path: &str,
        slot: Option<Category>,
        components: Option<&Value>,
    ) {
        match (Marker::parse(marker), slot) {
            (Ok(parsed), Some(expected)) if parsed.category != expected => {
                self.warning(
                    "W003",
                    path,
                    format!(
                        "reference {} points into '{}' but this slot takes '{}' and is never resolved",
                        marker, parsed.category, expected
                    ),
                );
            }
            (Ok(parsed), _) => {
                let found = components
                    .and_then(|c| c.get(parsed.category.as_str()))
                    .and_then(|registry| registry.get(&parsed.name))
                    .is_some();
                if !found {
                    self.error(
                        "E003",
                        path,
                        format!("reference target not found: {}", marker),
                    );
                }
            }
            (Err(MarkerError::NotLocal { .. }), _) => {
                self.warning(
                    "W001",
                    path,
                    format!("reference {} points outside #/components and is not resolved", marker),
                );
            }
            (Err(e), _) => self.error("E002", path, e.to_string()),
        }
    }
}

/// Kind of node being walked, as far as the document structure tells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Slot {
    Other,
    Components,
    Registry(Category),
    CallbackMap,
    Callback,
    PathItem,
    Operation,
    ParameterList,
    Parameter,
    RequestBody,
    ResponseMap,
    Response,
    HeaderMap,
    Header,
    MediaMap,
    MediaType,
    EncodingMap,
    Encoding,
    SchemaMap,
    SchemaList,
    Schema,
    SecurityScheme,
}

impl Slot {
    /// Registry category a marker in this slot must point into.
    fn category(self) -> Option<Category> {
        match self {
            Slot::Schema => Some(Category::Schemas),
            Slot::Response => Some(Category::Responses),
            Slot::Parameter => Some(Category::Parameters),
            Slot::RequestBody => Some(Category::RequestBodies),
            Slot::Header => Some(Category::Headers),
            Slot::SecurityScheme => Some(Category::SecuritySchemes),
            _ => None,
        }
    }

    /// Kind of the value under `key` (array elements pass an empty key).
    fn child(self, key: &str) -> Slot {
        match (self, key) {
            (Slot::Components, "callbacks") => Slot::CallbackMap,
            (Slot::Components, _) => Category::ALL
                .into_iter()
                .find(|c| c.as_str() == key)
                .map_or(Slot::Other, Slot::Registry),
            (Slot::Registry(category), _) => match category {
                Category::Schemas => Slot::Schema,
                Category::Responses => Slot::Response,
                Category::Parameters => Slot::Parameter,
                Category::RequestBodies => Slot::RequestBody,
                Category::Headers => Slot::Header,
                Category::SecuritySchemes => Slot::SecurityScheme,
            },
            (Slot::CallbackMap, _) => Slot::Callback,
            (Slot::Callback, _) => Slot::PathItem,
            (Slot::PathItem, "parameters") => Slot::ParameterList,
            (Slot::PathItem, method) if HTTP_METHODS.contains(&method) => Slot::Operation,
            (Slot::Operation, "parameters") => Slot::ParameterList,
            (Slot::Operation, "requestBody") => Slot::RequestBody,
            (Slot::Operation, "responses") => Slot::ResponseMap,
            (Slot::Operation, "callbacks") => Slot::CallbackMap,
            (Slot::ParameterList, _) => Slot::Parameter,
            (Slot::ResponseMap, _) => Slot::Response,
            (Slot::HeaderMap, _) => Slot::Header,
            (Slot::MediaMap, _) => Slot::MediaType,
            (Slot::EncodingMap, _) => Slot::Encoding,
            (Slot::Parameter | Slot::Header | Slot::MediaType, "schema") => Slot::Schema,
            (Slot::Parameter | Slot::Header | Slot::RequestBody | Slot::Response, "content") => {
                Slot::MediaMap
            }
            (Slot::Response | Slot::Encoding, "headers") => Slot::HeaderMap,
            (Slot::MediaType, "encoding") => Slot::EncodingMap,
            (Slot::Schema, "items" | "additionalProperties" | "not") => Slot::Schema,
            (Slot::Schema, "properties") => Slot::SchemaMap,
            (Slot::Schema, "allOf" | "anyOf" | "oneOf") => Slot::SchemaList,
            (Slot::SchemaMap | Slot::SchemaList, _) => Slot::Schema,
            _ => Slot::Other,
        }
    }
}

fn object_entries(value: &Value) -> impl Iterator<Item = (&String, &Value)> {
    value.as_object().into_iter().flatten()
}

fn is_document_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| DOCUMENT_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// Collect all document files in a path (file or directory).
fn collect_document_files(path: &Path) -> Vec<PathBuf> {
    if path.is_file() {
        if is_document_file(path) {
            return vec![path.to_path_buf()];
        }
        return vec![];
    }

    let mut files = Vec::new();
    collect_files_recursive(path, &mut files);
    files.sort();
    files
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_files_recursive(&path, files);
        } else if is_document_file(&path) {
            files.push(path);
        }
    }
}
