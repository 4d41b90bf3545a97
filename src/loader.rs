//! Document and payload loading from various sources.
//!
//! Handles loading from files, strings, and HTTP URLs. Content is decoded as
//! JSON first and as YAML if that fails.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::ResolveError;
use crate::instance::Instance;
use crate::model::{OpenApi, Schema};

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Decode JSON or YAML text into `T`.
///
/// # Errors
///
/// Returns `ResolveError::Decode` with both parser errors if neither format
/// accepts the content.
pub fn decode<T: DeserializeOwned>(content: &str) -> Result<T, ResolveError> {
    let json = match serde_json::from_str(content) {
        Ok(value) => return Ok(value),
        Err(e) => e,
    };
    serde_yaml::from_str(content).map_err(|yaml| ResolveError::Decode { json, yaml })
}

fn read_file(path: &Path) -> Result<String, ResolveError> {
    if !path.exists() {
        return Err(ResolveError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    debug!(path = %path.display(), "reading file");
    std::fs::read_to_string(path).map_err(|source| ResolveError::ReadError {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a description document from a file path.
///
/// # Errors
///
/// Returns `ResolveError::FileNotFound` if the file doesn't exist,
/// or `ResolveError::Decode` if it is neither JSON nor YAML.
pub fn load_document(path: &Path) -> Result<OpenApi, ResolveError> {
    decode(&read_file(path)?)
}

/// Load a description document from a JSON or YAML string.
pub fn load_document_str(content: &str) -> Result<OpenApi, ResolveError> {
    decode(content)
}

/// Load a description document from an HTTP/HTTPS URL.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `ResolveError::NetworkError` if the request fails or the server
/// answers with an error status, or `ResolveError::Decode` if the body
/// can't be decoded.
#[cfg(feature = "remote")]
pub fn load_document_url(url: &str) -> Result<OpenApi, ResolveError> {
    decode(&fetch(url)?)
}

#[cfg(feature = "remote")]
fn fetch(url: &str) -> Result<String, ResolveError> {
    let network = |source: reqwest::Error| ResolveError::NetworkError {
        url: url.to_string(),
        source,
    };

    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    debug!(url, "fetching document");
    let response = client.get(url).send().map_err(network)?;

    // Check for HTTP errors before decoding
    let response = response.error_for_status().map_err(network)?;

    response.text().map_err(network)
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Load a description document from a file path or URL.
///
/// URL loading requires the `remote` feature.
pub fn load_document_auto(source: &str) -> Result<OpenApi, ResolveError> {
    if is_url(source) {
        #[cfg(feature = "remote")]
        {
            load_document_url(source)
        }
        #[cfg(not(feature = "remote"))]
        {
            Err(ResolveError::FileNotFound {
                path: std::path::PathBuf::from(source),
            })
        }
    } else {
        load_document(Path::new(source))
    }
}

/// Load a payload to validate from a file path.
pub fn load_instance(path: &Path) -> Result<Instance, ResolveError> {
    decode(&read_file(path)?)
}

/// Load a payload from a JSON or YAML string.
///
/// Note that any text is valid YAML: input that is not JSON and has no YAML
/// structure decodes as a plain string.
pub fn load_instance_str(content: &str) -> Result<Instance, ResolveError> {
    decode(content)
}

/// Load a standalone schema node from a file path.
pub fn load_schema(path: &Path) -> Result<Schema, ResolveError> {
    decode(&read_file(path)?)
}

/// Load an untyped document tree from a file path.
pub fn load_value(path: &Path) -> Result<Value, ResolveError> {
    decode(&read_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const PETSTORE_YAML: &str = "\
openapi: 3.0.3
info:
  title: Petstore
  version: 1.0.0
paths:
  /pets:
    get:
      responses:
        '200':
          description: ok
components:
  schemas:
    Pet:
      type: object
";

    #[test]
    fn load_document_json_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r#"{{"openapi": "3.0.3", "paths": {{}}}}"#).unwrap();

        let document = load_document(file.path()).unwrap();
        assert_eq!(document.openapi, "3.0.3");
        assert!(document.paths.is_empty());
    }

    #[test]
    fn load_document_yaml_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", PETSTORE_YAML).unwrap();

        let document = load_document(file.path()).unwrap();
        assert_eq!(document.info.unwrap().title, "Petstore");
        assert!(document.paths["/pets"].get.is_some());
        assert!(document.components.unwrap().schemas.contains_key("Pet"));
    }

    #[test]
    fn load_document_file_not_found() {
        let result = load_document(Path::new("/nonexistent/openapi.yaml"));
        assert!(matches!(result, Err(ResolveError::FileNotFound { .. })));
    }

    #[test]
    fn load_document_undecodable() {
        let result = load_document_str("paths: [unclosed");
        assert!(matches!(result, Err(ResolveError::Decode { .. })));

        // Valid YAML of the wrong shape fails both decoders too
        let result = load_document_str("just a string");
        assert!(matches!(result, Err(ResolveError::Decode { .. })));
    }

    #[test]
    fn decode_error_reports_both_formats() {
        let err = load_document_str("{ not: [json").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("neither valid JSON"));
        assert!(message.contains("nor valid YAML"));
    }

    #[test]
    fn load_instance_json_and_yaml() {
        let instance = load_instance_str(r#"{"id": 1}"#).unwrap();
        assert!(matches!(instance, Instance::Object(_)));

        let instance = load_instance_str("- 1\n- 2.5\n").unwrap();
        assert_eq!(
            instance,
            Instance::Array(vec![Instance::Integer(1), Instance::Number(2.5)])
        );

        let instance = load_instance_str("plain words").unwrap();
        assert_eq!(instance, Instance::String("plain words".into()));
    }

    #[test]
    fn load_instance_file() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "name: Rex").unwrap();

        let instance = load_instance(file.path()).unwrap();
        let Instance::Object(map) = instance else {
            panic!("expected object");
        };
        assert_eq!(map["name"], Instance::String("Rex".into()));
    }

    #[test]
    fn load_schema_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "type: integer\nminimum: 1\n").unwrap();

        let schema = load_schema(file.path()).unwrap();
        assert_eq!(schema.schema_type.as_deref(), Some("integer"));
        assert_eq!(schema.minimum, Some(1.0));
    }

    #[test]
    fn load_value_keeps_raw_markers() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, r##"{{"paths": {{"/a": {{"$ref": "#/components/schemas/A"}}}}}}"##).unwrap();

        let value = load_value(file.path()).unwrap();
        assert_eq!(value["paths"]["/a"]["$ref"], "#/components/schemas/A");
    }

    #[test]
    fn is_url_detection() {
        assert!(is_url("https://example.com/openapi.json"));
        assert!(is_url("http://example.com/openapi.json"));
        assert!(!is_url("/path/to/openapi.json"));
        assert!(!is_url("./openapi.yaml"));
        assert!(!is_url("openapi.yaml"));
    }

    #[test]
    fn load_document_auto_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}", PETSTORE_YAML).unwrap();

        let document = load_document_auto(file.path().to_str().unwrap()).unwrap();
        assert_eq!(document.openapi, "3.0.3");
    }

    // Remote tests run against a local mock server
    #[cfg(feature = "remote")]
    mod remote {
        use super::*;

        #[test]
        fn load_document_url_yaml() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/openapi.yaml")
                .with_status(200)
                .with_header("content-type", "application/yaml")
                .with_body(PETSTORE_YAML)
                .create();

            let url = format!("{}/openapi.yaml", server.url());
            let document = load_document_url(&url).unwrap();
            assert_eq!(document.openapi, "3.0.3");
            mock.assert();
        }

        #[test]
        fn load_document_url_404() {
            let mut server = mockito::Server::new();
            let _mock = server.mock("GET", "/missing.json").with_status(404).create();

            let url = format!("{}/missing.json", server.url());
            let result = load_document_url(&url);
            assert!(matches!(result, Err(ResolveError::NetworkError { .. })));
        }

        #[test]
        fn load_document_url_invalid_host() {
            let result =
                load_document_url("http://this-domain-does-not-exist-12345.invalid/openapi.json");
            assert!(matches!(result, Err(ResolveError::NetworkError { .. })));
        }

        #[test]
        fn load_document_auto_url() {
            let mut server = mockito::Server::new();
            let _mock = server
                .mock("GET", "/openapi.json")
                .with_status(200)
                .with_body(r#"{"openapi": "3.1.0", "paths": {}}"#)
                .create();

            let document = load_document_auto(&format!("{}/openapi.json", server.url())).unwrap();
            assert_eq!(document.openapi, "3.1.0");
        }
    }
}
