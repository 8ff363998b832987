//! Conversion settings.
//!
//! - [`Context`] - Settings read by the transformer during one run
//! - [`ContextBuilder`] - Fluent construction of a [`Context`]
//! - [`RunConfig`] - A complete invocation: context plus source and output
//! - [`parse_key_values`] - `KEY=VALUE` tokens to an options map

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Default column delimiter.
pub const DEFAULT_DELIMITER: char = ',';

/// Delimiter selected by `--tab`.
pub const TAB_DELIMITER: char = '\t';

/// Default encoding for the source, the template and the output.
pub const DEFAULT_ENCODING: &str = "utf-8";

/// Encoding label that asks for detection from the source bytes.
pub const AUTO_ENCODING: &str = "auto";

/// Prefix of synthesized header names when the first row is data.
pub const DEFAULT_HEADER_PREFIX: &str = "col_";

/// Settings of one conversion run.
///
/// Everything here is fixed before the run starts, except [`Context::headers`],
/// which the transformer fills in when it sees the first row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    /// Column delimiter (single ASCII character)
    pub delimiter: char,
    /// First row holds the header names
    pub use_header: bool,
    /// Encoding of the source and the template file
    pub encoding: String,
    /// Prefix for synthesized header names
    pub header_prefix: String,
    /// Extra values exposed to templates as `options`
    pub options: BTreeMap<String, String>,
    /// Template location
    pub template_source: PathBuf,
    /// Headers derived from the first row of the current run
    #[serde(skip)]
    pub headers: Option<Vec<String>>,
}

impl Context {
    /// Create a context with default settings for the given template.
    pub fn new(template_source: impl Into<PathBuf>) -> Self {
        Self {
            delimiter: DEFAULT_DELIMITER,
            use_header: false,
            encoding: DEFAULT_ENCODING.to_string(),
            header_prefix: DEFAULT_HEADER_PREFIX.to_string(),
            options: BTreeMap::new(),
            template_source: template_source.into(),
            headers: None,
        }
    }

    /// Start a builder for the given template.
    pub fn builder(template_source: impl Into<PathBuf>) -> ContextBuilder {
        ContextBuilder::new(template_source)
    }

    /// Delimiter as the byte the row splitter expects.
    pub fn delimiter_byte(&self) -> ConfigResult<u8> {
        if self.delimiter.is_ascii() {
            Ok(self.delimiter as u8)
        } else {
            Err(ConfigError::InvalidDelimiter(self.delimiter))
        }
    }

    /// Check the settings that can be checked without touching any file.
    pub fn validate(&self) -> ConfigResult<()> {
        self.delimiter_byte()?;
        if !self.encoding.eq_ignore_ascii_case(AUTO_ENCODING) {
            resolve_encoding(&self.encoding)?;
        }
        Ok(())
    }
}

/// Builder for [`Context`]
pub struct ContextBuilder {
    context: Context,
}

impl ContextBuilder {
    pub fn new(template_source: impl Into<PathBuf>) -> Self {
        Self {
            context: Context::new(template_source),
        }
    }

    pub fn delimiter(mut self, delimiter: char) -> Self {
        self.context.delimiter = delimiter;
        self
    }

    /// Switch to tab separated values.
    pub fn tab(self) -> Self {
        self.delimiter(TAB_DELIMITER)
    }

    pub fn use_header(mut self, use_header: bool) -> Self {
        self.context.use_header = use_header;
        self
    }

    pub fn encoding(mut self, encoding: impl Into<String>) -> Self {
        self.context.encoding = encoding.into();
        self
    }

    pub fn header_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.context.header_prefix = prefix.into();
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.options.insert(key.into(), value.into());
        self
    }

    pub fn options(mut self, options: BTreeMap<String, String>) -> Self {
        self.context.options.extend(options);
        self
    }

    pub fn build(self) -> Context {
        self.context
    }
}

/// One complete invocation of the converter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Settings handed to the transformer
    pub context: Context,
    /// Delimited source file
    pub csv: PathBuf,
    /// Output file (stdout when absent)
    pub output: Option<PathBuf>,
    /// Encoding of the rendered document
    pub output_encoding: String,
}

impl RunConfig {
    pub fn new(context: Context, csv: impl Into<PathBuf>) -> Self {
        Self {
            context,
            csv: csv.into(),
            output: None,
            output_encoding: DEFAULT_ENCODING.to_string(),
        }
    }

    pub fn with_output(mut self, output: impl AsRef<Path>) -> Self {
        self.output = Some(output.as_ref().to_path_buf());
        self
    }

    pub fn with_output_encoding(mut self, encoding: impl Into<String>) -> Self {
        self.output_encoding = encoding.into();
        self
    }

    /// Check all settings before any file is opened.
    pub fn validate(&self) -> ConfigResult<()> {
        self.context.validate()?;
        resolve_encoding(&self.output_encoding)?;
        Ok(())
    }
}

/// Parse repeated `KEY=VALUE` tokens into a map.
///
/// The token is split on the first `=`, so values may contain `=`.
/// Later tokens override earlier ones with the same key.
///
/// # Example
/// ```
/// use csvtemplate::parse_key_values;
///
/// let options = parse_key_values(["table=users", "where=id=1"]).unwrap();
/// assert_eq!(options["table"], "users");
/// assert_eq!(options["where"], "id=1");
/// ```
pub fn parse_key_values<I, S>(tokens: I) -> ConfigResult<BTreeMap<String, String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = BTreeMap::new();
    for token in tokens {
        let (key, value) = parse_key_value(token.as_ref())?;
        options.insert(key, value);
    }
    Ok(options)
}

/// Parse a single `KEY=VALUE` token.
pub fn parse_key_value(token: &str) -> ConfigResult<(String, String)> {
    let (key, value) = token
        .split_once('=')
        .ok_or_else(|| ConfigError::MalformedOption(token.to_string()))?;
    if key.is_empty() {
        return Err(ConfigError::EmptyOptionKey(token.to_string()));
    }
    Ok((key.to_string(), value.to_string()))
}

/// Look up an encoding by its WHATWG label (`utf-8`, `latin1`, `shift_jis`, ...).
pub fn resolve_encoding(label: &str) -> ConfigResult<&'static encoding_rs::Encoding> {
    encoding_rs::Encoding::for_label(label.trim().as_bytes())
        .ok_or_else(|| ConfigError::UnknownEncoding(label.to_string()))
}
