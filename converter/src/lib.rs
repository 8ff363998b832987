//! # csvtemplate - Render CSV/TSV files through Jinja templates
//!
//! csvtemplate turns delimited text into any text format (SQL, HTML, config
//! files) by binding the rows to a template.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│ Transformer │────▶│  Template   │
//! │  (any enc)  │     │ (split rows)│     │   (hooks)   │     │  (lines)    │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! Every row becomes a record keyed by header name; the column, row and
//! dataset hooks can reshape the data before the template sees it as `lines`.
//!
//! ## Quick Start
//!
//! ```rust
//! use csvtemplate::{render_str, Context};
//!
//! let context = Context::builder("people").use_header(true).build();
//! let out = render_str(
//!     "{% for l in lines %}{{l.name}} is {{l.age}}\n{% endfor %}",
//!     "name,age\nAlice,30\nBob,25\n",
//!     context,
//! ).unwrap();
//! assert_eq!(out, "Alice is 30\nBob is 25\n");
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`context`] - Conversion settings and `KEY=VALUE` options
//! - [`parser`] - Decoding and row splitting
//! - [`transform`] - Headers, hooks, transformer and pipeline
//! - [`template`] - Template loading and rendering
//! - [`output`] - Encoded output sink
//! - [`logs`] - Progress logging

// Core modules
pub mod context;
pub mod error;

// Reading
pub mod parser;

// Transformation
pub mod transform;

// Rendering
pub mod output;
pub mod template;

// Logging
pub mod logs;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ConfigError,
    ConvertError,
    ConvertResult,
    CsvError,
    TemplateError,
};

// =============================================================================
// Re-exports - Settings
// =============================================================================

pub use context::{
    parse_key_value,
    parse_key_values,
    Context,
    ContextBuilder,
    RunConfig,
};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{
    ColumnHook,
    DatasetHook,
    Record,
    RowHook,
    RunPhase,
    TransformSummary,
    Transformer,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::pipeline::{
    convert_file,
    convert_file_with,
    convert_stream,
    render_str,
};

// =============================================================================
// Re-exports - Rendering
// =============================================================================

pub use output::OutputSink;
pub use template::{
    CompiledTemplate,
    EnvironmentHook,
    FileTemplateLoader,
    StringTemplateLoader,
    TemplateLoader,
};
