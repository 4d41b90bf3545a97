//! OpenAPI Schema CLI
//!
//! Command-line interface for resolving, validating against, and linting
//! OpenAPI description documents.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use oas_schema::{
    lint, load_document_auto, load_instance, load_schema, resolve, validate, validate_component,
    FileStatus, ResolveError, ResolveOptions, Severity, ValidateError, ValidateOptions,
    DEFAULT_MAX_DEPTH,
};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "oas-schema")]
#[command(about = "Resolve OpenAPI component references and validate payloads")]
#[command(version)]
struct Cli {
    /// Enable debug logging (RUST_LOG overrides)
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inline every #/components reference of a document
    Resolve {
        /// Document source: file path or URL (http:// or https://)
        document: String,

        /// Output file (stdout if not specified)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Pretty-print JSON output
        #[arg(long, conflicts_with = "yaml")]
        pretty: bool,

        /// Emit YAML instead of JSON
        #[arg(long)]
        yaml: bool,

        /// Fail if any reference is left unresolved
        #[arg(long)]
        deny_unresolved: bool,
    },

    /// Validate a payload against a schema
    Validate {
        /// Payload file to validate (JSON or YAML)
        payload: PathBuf,

        /// Description document holding the schema component
        #[arg(
            long,
            requires = "component",
            conflicts_with = "schema",
            required_unless_present = "schema"
        )]
        document: Option<String>,

        /// Name of the schema component in the document
        #[arg(long, requires = "document")]
        component: Option<String>,

        /// Standalone schema file
        #[arg(long)]
        schema: Option<PathBuf>,

        /// Strict mode: reject undeclared object keys
        #[arg(long)]
        strict: bool,

        /// Report every violation instead of stopping at the first
        #[arg(long)]
        all_errors: bool,

        /// Maximum schema nesting depth
        #[arg(long, default_value_t = DEFAULT_MAX_DEPTH)]
        max_depth: usize,

        /// Output results as JSON (for automation)
        #[arg(long)]
        json: bool,
    },

    /// Lint description documents (syntax, broken refs, route references)
    Lint {
        /// File or directory to lint
        path: PathBuf,

        /// Output format: text (default) or json
        #[arg(long, default_value = "text")]
        format: String,

        /// Treat warnings as errors
        #[arg(long)]
        strict: bool,

        /// Suppress progress output, only show errors
        #[arg(long, short)]
        quiet: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let result = match cli.command {
        Commands::Resolve {
            document,
            output,
            pretty,
            yaml,
            deny_unresolved,
        } => run_resolve(
            &document,
            output,
            OutputFormat::new(pretty, yaml),
            deny_unresolved,
        ),

        Commands::Validate {
            payload,
            document,
            component,
            schema,
            strict,
            all_errors,
            max_depth,
            json,
        } => {
            let source = match (document, component, schema) {
                (Some(document), Some(component), _) => SchemaSource::Component {
                    document,
                    component,
                },
                (_, _, Some(path)) => SchemaSource::File(path),
                _ => {
                    report_error(json, "either --document with --component, or --schema is required");
                    return ExitCode::from(2);
                }
            };
            let options = ValidateOptions::new()
                .strict(strict)
                .stop_on_failure(!all_errors)
                .max_depth(max_depth);
            run_validate(&payload, source, &options, json)
        }

        Commands::Lint {
            path,
            format,
            strict,
            quiet,
        } => run_lint(&path, &format, strict, quiet),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => ExitCode::from(code),
    }
}

/// Install the stderr log subscriber.
fn init_logger(verbose: bool) {
    let default = if verbose {
        "oas_schema=debug"
    } else {
        "oas_schema=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

#[derive(Clone, Copy)]
enum OutputFormat {
    Json,
    JsonPretty,
    Yaml,
}

impl OutputFormat {
    fn new(pretty: bool, yaml: bool) -> Self {
        match (pretty, yaml) {
            (_, true) => OutputFormat::Yaml,
            (true, false) => OutputFormat::JsonPretty,
            (false, false) => OutputFormat::Json,
        }
    }
}

fn run_resolve(
    source: &str,
    output: Option<PathBuf>,
    format: OutputFormat,
    deny_unresolved: bool,
) -> Result<(), u8> {
    let document = load_document_auto(source).map_err(|e| {
        eprintln!("Error: {}", e);
        e.exit_code() as u8
    })?;

    let options = ResolveOptions::new().deny_unresolved(deny_unresolved);
    let resolution = resolve(&document, &options).map_err(|e| {
        eprintln!("Error: {}", e);
        if let ResolveError::Unresolved { refs } = &e {
            for r in refs {
                eprintln!("  {}", r);
            }
        }
        e.exit_code() as u8
    })?;

    for r in &resolution.unresolved {
        eprintln!("Unresolved: {}", r);
    }

    let rendered = match format {
        OutputFormat::Json => serde_json::to_string(&resolution.document).map_err(|e| e.to_string()),
        OutputFormat::JsonPretty => {
            serde_json::to_string_pretty(&resolution.document).map_err(|e| e.to_string())
        }
        OutputFormat::Yaml => serde_yaml::to_string(&resolution.document).map_err(|e| e.to_string()),
    }
    .map_err(|e| {
        eprintln!("Error serializing output: {}", e);
        2u8
    })?;

    match output {
        Some(path) => {
            std::fs::write(&path, &rendered).map_err(|e| {
                eprintln!("Error writing to {}: {}", path.display(), e);
                3u8
            })?;
        }
        None => {
            println!("{}", rendered.trim_end());
        }
    }

    Ok(())
}

enum SchemaSource {
    Component { document: String, component: String },
    File(PathBuf),
}

fn run_validate(
    payload_path: &Path,
    source: SchemaSource,
    options: &ValidateOptions,
    json_output: bool,
) -> Result<(), u8> {
    let payload = load_instance(payload_path).map_err(|e| {
        report_error(json_output, &format!("loading payload: {}", e));
        e.exit_code() as u8
    })?;

    let result = match source {
        SchemaSource::Component {
            document,
            component,
        } => {
            let document = load_document_auto(&document).map_err(|e| {
                report_error(json_output, &format!("loading document: {}", e));
                e.exit_code() as u8
            })?;
            validate_component(&document, &component, &payload, options)
        }
        SchemaSource::File(path) => {
            let schema = load_schema(&path).map_err(|e| {
                report_error(json_output, &format!("loading schema: {}", e));
                e.exit_code() as u8
            })?;
            validate(&schema, &payload, options)
        }
    };

    match result {
        Ok(()) => {
            if json_output {
                println!(r#"{{"valid":true}}"#);
            } else {
                println!("Valid");
            }
            Ok(())
        }
        Err(ValidateError::Invalid { errors }) => {
            if json_output {
                let output = serde_json::json!({
                    "valid": false,
                    "errors": errors
                });
                println!("{}", output);
            } else {
                eprintln!("Validation failed:");
                for error in errors {
                    eprintln!("  {}", error);
                }
            }
            Err(1)
        }
        Err(e) => {
            report_error(json_output, &e.to_string());
            Err(e.exit_code() as u8)
        }
    }
}

/// Output an error message in plain text or JSON format.
fn report_error(json_output: bool, msg: &str) {
    if json_output {
        println!("{}", serde_json::json!({ "valid": false, "error": msg }));
    } else {
        eprintln!("Error: {}", msg);
    }
}

fn run_lint(path: &Path, format: &str, strict: bool, quiet: bool) -> Result<(), u8> {
    if !path.exists() {
        eprintln!("Error: path not found: {}", path.display());
        return Err(3);
    }

    let result = lint(path, strict);
    let passed = result.is_ok() && (!strict || result.warnings == 0);

    if format == "json" {
        let rendered = serde_json::to_string_pretty(&result).map_err(|e| {
            eprintln!("Error serializing output: {}", e);
            2u8
        })?;
        println!("{}", rendered);
    } else {
        if !quiet {
            println!("Linting {} ...\n", path.display());
        }

        for file_result in &result.results {
            let status_icon = match file_result.status {
                FileStatus::Ok => "\x1b[32m✓\x1b[0m",
                FileStatus::Warning => "\x1b[33m⚠\x1b[0m",
                FileStatus::Error => "\x1b[31m✗\x1b[0m",
            };

            if !quiet || file_result.status != FileStatus::Ok {
                println!("  {} {}", status_icon, file_result.file.display());
            }

            for diag in &file_result.diagnostics {
                let (color, label) = match diag.severity {
                    Severity::Error => ("\x1b[31m", "error"),
                    Severity::Warning => ("\x1b[33m", "warning"),
                };
                if !quiet || diag.severity == Severity::Error {
                    println!(
                        "    {}{}[{}]\x1b[0m: {} - {}",
                        color, label, diag.code, diag.path, diag.message
                    );
                }
            }
        }

        println!();
        if passed {
            println!(
                "\x1b[32m✓ {} files checked, all passed\x1b[0m",
                result.files_checked
            );
        } else {
            println!(
                "\x1b[31m✗ {} files checked: {} passed, {} failed ({} errors, {} warnings)\x1b[0m",
                result.files_checked, result.passed, result.failed, result.errors, result.warnings
            );
        }
    }

    if passed {
        Ok(())
    } else {
        Err(1)
    }
}
