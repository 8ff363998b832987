//! Header derivation and row assembly.

use serde_json::Value;

use super::hooks::Record;
use crate::context::Context;

/// Header names for the first row's columns.
///
/// With `use_header` the column texts, trimmed. Otherwise `header_prefix`
/// followed by the column index padded to two digits (`col_00`, `col_01`, ...).
pub fn derive_headers(columns: &[String], context: &Context) -> Vec<String> {
    columns
        .iter()
        .enumerate()
        .map(|(idx, column)| {
            if context.use_header {
                column.trim().to_string()
            } else {
                synthesized_header(&context.header_prefix, idx)
            }
        })
        .collect()
}

/// Header name for a column index.
pub fn synthesized_header(prefix: &str, idx: usize) -> String {
    format!("{}{:02}", prefix, idx)
}

/// Pair headers with column values by position.
///
/// Pairing stops at the shorter of the two: missing trailing columns leave
/// their headers out, extra columns are dropped. A repeated header keeps its
/// first position and the last value.
pub fn assemble_record<I>(headers: &[String], columns: I) -> Record
where
    I: IntoIterator<Item = String>,
{
    headers
        .iter()
        .zip(columns)
        .map(|(header, value)| (header.clone(), Value::String(value)))
        .collect()
}
