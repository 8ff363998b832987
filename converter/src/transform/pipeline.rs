//! High-level conversion API.
//!
//! Combines template loading, source reading and output writing into a
//! single call. Every file handle is scoped to the call and closed on all
//! exit paths.
//!
//! # Example
//!
//! ```rust,no_run
//! use csvtemplate::{convert_file, Context, RunConfig};
//!
//! let context = Context::builder("insert.sql.j2")
//!     .use_header(true)
//!     .option("table", "users")
//!     .build();
//! let config = RunConfig::new(context, "users.csv").with_output("users.sql");
//!
//! let summary = convert_file(&config)?;
//! eprintln!("Rendered {} lines", summary.lines);
//! # Ok::<(), csvtemplate::ConvertError>(())
//! ```

use std::fs::File;
use std::io::Write;

use super::transformer::{TransformSummary, Transformer};
use crate::context::{Context, RunConfig};
use crate::error::{ConvertResult, CsvError};
use crate::logs::{log_info, log_success};
use crate::output::OutputSink;
use crate::template::StringTemplateLoader;

/// Convert `config.csv` with the template in `config.context`.
///
/// The template is loaded before the source is opened, so a bad template
/// fails the run without reading any row.
pub fn convert_file(config: &RunConfig) -> ConvertResult<TransformSummary> {
    config.validate()?;
    log_info(format!("📄 Loading template: {}", config.context.template_source.display()));
    let mut transformer = Transformer::new(config.context.clone())?;
    convert_file_with(&mut transformer, config)
}

/// Convert `config.csv` with a prepared transformer (custom hooks, custom loader).
///
/// `config.context` is not consulted; the transformer's own context is used.
pub fn convert_file_with(
    transformer: &mut Transformer,
    config: &RunConfig,
) -> ConvertResult<TransformSummary> {
    log_info(format!("📖 Reading CSV: {}", config.csv.display()));
    let source = File::open(&config.csv).map_err(CsvError::from)?;

    let summary = match &config.output {
        Some(path) => {
            let mut sink = OutputSink::create(path, &config.output_encoding)?;
            let summary = transformer.transform(source, &mut sink)?;
            log_success(format!("💾 Output written to: {}", path.display()));
            summary
        }
        None => {
            let mut sink = OutputSink::stdout(&config.output_encoding)?;
            transformer.transform(source, &mut sink)?
        }
    };

    Ok(summary)
}

/// Convert in-memory text with an in-memory template.
///
/// Returns the rendered document without the trailing newline the sinks add.
///
/// # Example
/// ```
/// use csvtemplate::{render_str, Context};
///
/// let context = Context::new("inline");
/// let out = render_str("{{ lines|length }} rows", "x,y\n1,2\n", context).unwrap();
/// assert_eq!(out, "2 rows");
/// ```
pub fn render_str(template: &str, csv: &str, context: Context) -> ConvertResult<String> {
    let loader = StringTemplateLoader::new(context.template_source.display().to_string(), template);
    let mut transformer = Transformer::with_loader(context, &loader)?;
    transformer.transform_to_string(csv.as_bytes())
}

/// Convert a reader into a writer, both in the context's encodings.
pub fn convert_stream<R, W>(
    transformer: &mut Transformer,
    source: R,
    output: W,
    output_encoding: &str,
) -> ConvertResult<TransformSummary>
where
    R: std::io::Read,
    W: Write,
{
    let mut sink = OutputSink::new(output, output_encoding)?;
    transformer.transform(source, &mut sink)
}
