//! Error types for the csvtemplate conversion pipeline.
//!
//! - [`ConfigError`] - Invalid invocation settings (options, delimiter, encodings)
//! - [`TemplateError`] - Template loading and rendering errors
//! - [`CsvError`] - Source reading, decoding and row splitting errors
//! - [`ConvertError`] - Top-level errors of one conversion run
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;
use thiserror::Error;

// =============================================================================
// Configuration Errors
// =============================================================================

/// Errors in the settings of a run, raised before any conversion work.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `KEY=VALUE` token without a separator.
    #[error("Malformed option '{0}': expected KEY=VALUE")]
    MalformedOption(String),

    /// `=VALUE` token.
    #[error("Malformed option '{0}': key is empty")]
    EmptyOptionKey(String),

    /// Delimiter that cannot be used by the row splitter.
    #[error("Invalid delimiter {0:?}: must be a single ASCII character")]
    InvalidDelimiter(char),

    /// Encoding label unknown to the encoding registry.
    #[error("Unknown encoding: {0}")]
    UnknownEncoding(String),
}

// =============================================================================
// Template Errors
// =============================================================================

/// Errors from loading or rendering a template.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// Template path does not exist.
    #[error("Template not found: {}", .0.display())]
    NotFound(PathBuf),

    /// Template file could not be read.
    #[error("Cannot read template '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Template bytes are not valid in the configured encoding.
    #[error("Cannot decode template '{}' as {encoding}", .path.display())]
    Decode { path: PathBuf, encoding: String },

    /// Template source did not compile.
    #[error("Cannot load template '{name}': {source}")]
    Load {
        name: String,
        #[source]
        source: minijinja::Error,
    },

    /// Rendering failed.
    #[error("Cannot render template '{name}': {source}")]
    Render {
        name: String,
        #[source]
        source: minijinja::Error,
    },
}

// =============================================================================
// CSV Errors
// =============================================================================

/// Errors while reading the delimited source.
#[derive(Debug, Error)]
pub enum CsvError {
    /// Failed to read the source.
    #[error("Failed to read source: {0}")]
    IoError(#[from] std::io::Error),

    /// Source bytes are not valid in the configured encoding.
    #[error("Failed to decode source as {encoding}")]
    EncodingError { encoding: String },

    /// The row splitter rejected a record.
    #[error("Invalid CSV at line {line}: {message}")]
    ParseError { line: u64, message: String },
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        let message = err.to_string();
        match err.into_kind() {
            csv::ErrorKind::Io(io) => CsvError::IoError(io),
            _ => CsvError::ParseError { line, message },
        }
    }
}

// =============================================================================
// Conversion Errors (top-level)
// =============================================================================

/// Top-level error of a conversion run.
///
/// This is the error returned by [`crate::transform::pipeline::convert_file`]
/// and [`crate::transform::Transformer::transform`]. Every failure terminates
/// the run; there is no partial output recovery.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// Invalid settings.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Template load or render error.
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    /// Source error.
    #[error("CSV error: {0}")]
    Csv(#[from] CsvError),

    /// Output could not be opened or written.
    #[error("Output error: {0}")]
    Io(#[from] std::io::Error),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for configuration parsing.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Result type for template operations.
pub type TemplateResult<T> = Result<T, TemplateError>;

/// Result type for source reading.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for a conversion run.
pub type ConvertResult<T> = Result<T, ConvertError>;
