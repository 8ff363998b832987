//! Delimited text reading: encoding handling and row splitting.
//!
//! Rows are returned as plain column strings. Naming columns is the
//! transformer's job, not this module's.

use encoding_rs::Encoding;
use std::collections::VecDeque;
use std::io::Read;

use crate::context::{resolve_encoding, AUTO_ENCODING};
use crate::error::{CsvError, CsvResult};

/// Detect the encoding of raw bytes using chardet.
///
/// Falls back to UTF-8 when the detected charset has no WHATWG equivalent.
pub fn detect_encoding(bytes: &[u8]) -> &'static Encoding {
    let (charset, _confidence, _language) = chardet::detect(bytes);
    let label = chardet::charset2encoding(&charset);
    Encoding::for_label(label.as_bytes()).unwrap_or(encoding_rs::UTF_8)
}

/// Resolve an encoding label, running detection on `bytes` for `auto`.
pub fn encoding_for(label: &str, bytes: &[u8]) -> CsvResult<&'static Encoding> {
    if label.trim().eq_ignore_ascii_case(AUTO_ENCODING) {
        return Ok(detect_encoding(bytes));
    }
    resolve_encoding(label).map_err(|_| CsvError::EncodingError {
        encoding: label.to_string(),
    })
}

/// Decode bytes to a string with the given encoding label.
///
/// A byte order mark takes precedence over `label`: UTF-8, UTF-16LE and
/// UTF-16BE BOMs select that encoding and are stripped.
/// Malformed input is an error rather than being replaced.
pub fn decode_content(bytes: &[u8], label: &str) -> CsvResult<String> {
    let encoding = encoding_for(label, bytes)?;
    let (text, used, had_errors) = encoding.decode(bytes);
    if had_errors {
        return Err(CsvError::EncodingError {
            encoding: used.name().to_string(),
        });
    }
    Ok(text.into_owned())
}

/// Read a whole source and decode it.
pub fn read_source<R: Read>(mut source: R, label: &str) -> CsvResult<String> {
    let mut bytes = Vec::new();
    source.read_to_end(&mut bytes)?;
    decode_content(&bytes, label)
}

/// Split decoded text into rows of columns.
///
/// Quoting follows the usual CSV rules (`"a,b"` is one column, `""` escapes a
/// quote). Rows may have any number of columns. A blank line is a row with no
/// columns.
///
/// # Example
/// ```
/// use csvtemplate::parser::split_rows;
///
/// let rows: Vec<Vec<String>> = split_rows("a,\"b,c\"\n\n1,2\n", b',')
///     .collect::<Result<_, _>>()
///     .unwrap();
/// assert_eq!(rows, vec![vec!["a", "b,c"], vec![], vec!["1", "2"]]);
/// ```
pub fn split_rows(content: &str, delimiter: u8) -> RowSplitter<'_> {
    RowSplitter {
        lines: content.split_inclusive('\n'),
        delimiter,
        pending: VecDeque::new(),
    }
}

/// Iterator over the rows of decoded text, see [`split_rows`].
///
/// Physical lines are grouped into records by quote parity, so a quoted
/// field may span lines. Each record is then split by the csv reader, which
/// on its own would skip blank lines.
pub struct RowSplitter<'a> {
    lines: std::str::SplitInclusive<'a, char>,
    delimiter: u8,
    pending: VecDeque<CsvResult<Vec<String>>>,
}

impl RowSplitter<'_> {
    /// Next physical line, plus continuation lines while a quote is open.
    fn next_record_text(&mut self) -> Option<String> {
        let mut text = self.lines.next()?.to_string();
        while text.matches('"').count() % 2 == 1 {
            match self.lines.next() {
                Some(line) => text.push_str(line),
                None => break,
            }
        }
        Some(text)
    }

    fn split_record(&self, text: &str) -> VecDeque<CsvResult<Vec<String>>> {
        let rows: VecDeque<CsvResult<Vec<String>>> = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(self.delimiter)
            .from_reader(text.as_bytes())
            .into_records()
            .map(|record| -> CsvResult<Vec<String>> {
                Ok(record?.iter().map(str::to_string).collect())
            })
            .collect();

        if rows.is_empty() {
            // Blank line
            VecDeque::from([Ok(Vec::new())])
        } else {
            rows
        }
    }
}

impl Iterator for RowSplitter<'_> {
    type Item = CsvResult<Vec<String>>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(row) = self.pending.pop_front() {
            return Some(row);
        }
        let text = self.next_record_text()?;
        self.pending = self.split_record(&text);
        self.pending.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(content: &str, delimiter: u8) -> Vec<Vec<String>> {
        split_rows(content, delimiter)
            .collect::<CsvResult<Vec<_>>>()
            .unwrap()
    }

    #[test]
    fn test_comma_rows() {
        let rows = collect("name,age\nAlice,30\nBob,25\n", b',');
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["name", "age"]);
        assert_eq!(rows[2], vec!["Bob", "25"]);
    }

    #[test]
    fn test_tab_rows_keep_commas() {
        let rows = collect("a\tb,c\n1\t2\n", b'\t');
        assert_eq!(rows[0], vec!["a", "b,c"]);
        assert_eq!(rows[1], vec!["1", "2"]);
    }

    #[test]
    fn test_quoted_values() {
        let rows = collect("\"Smith, John\",\"say \"\"hi\"\"\"\n", b',');
        assert_eq!(rows[0], vec!["Smith, John", "say \"hi\""]);
    }

    #[test]
    fn test_ragged_rows_allowed() {
        let rows = collect("a,b,c\n1,2\n1,2,3,4\n", b',');
        assert_eq!(rows[1].len(), 2);
        assert_eq!(rows[2].len(), 4);
    }

    #[test]
    fn test_whitespace_preserved() {
        let rows = collect("  a  , b\n", b',');
        assert_eq!(rows[0], vec!["  a  ", " b"]);
    }

    #[test]
    fn test_empty_input() {
        assert!(collect("", b',').is_empty());
    }

    #[test]
    fn test_blank_line_is_empty_row() {
        let rows = collect("a\n\nb\n", b',');
        assert_eq!(rows, vec![vec!["a".to_string()], vec![], vec!["b".to_string()]]);
    }

    #[test]
    fn test_leading_and_trailing_blank_lines() {
        let rows = collect("\nname\nAlice\n\n", b',');
        assert_eq!(rows.len(), 4);
        assert!(rows[0].is_empty());
        assert_eq!(rows[1], vec!["name"]);
        assert_eq!(rows[2], vec!["Alice"]);
        assert!(rows[3].is_empty());
    }

    #[test]
    fn test_consecutive_blank_lines_with_crlf() {
        let rows = collect("a\r\n\r\n\r\nb\r\n", b',');
        assert_eq!(rows.len(), 4);
        assert!(rows[1].is_empty() && rows[2].is_empty());
        assert_eq!(rows[3], vec!["b"]);
    }

    #[test]
    fn test_multiline_quoted_field_is_not_blank() {
        let rows = collect("\"x\ny\",1\n\n2\n", b',');
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0], vec!["x\ny", "1"]);
        assert!(rows[1].is_empty());
        assert_eq!(rows[2], vec!["2"]);
    }

    #[test]
    fn test_windows1252_decoding() {
        // "Société" in windows-1252
        let bytes: &[u8] = &[0x53, 0x6F, 0x63, 0x69, 0xE9, 0x74, 0xE9];
        let decoded = decode_content(bytes, "windows-1252").unwrap();
        assert_eq!(decoded, "Société");
    }

    #[test]
    fn test_bom_overrides_label() {
        // UTF-16LE BOM followed by "a,b"
        let bytes: &[u8] = &[0xFF, 0xFE, b'a', 0, b',', 0, b'b', 0];
        assert_eq!(decode_content(bytes, "utf-8").unwrap(), "a,b");
    }

    #[test]
    fn test_utf8_bom_stripped() {
        let decoded = decode_content(b"\xEF\xBB\xBFa,b", "utf-8").unwrap();
        assert_eq!(decoded, "a,b");
    }

    #[test]
    fn test_invalid_utf8_rejected() {
        let err = decode_content(&[0x61, 0xFF, 0x62], "utf-8").unwrap_err();
        assert!(matches!(err, CsvError::EncodingError { .. }));
    }

    #[test]
    fn test_unknown_label_rejected() {
        assert!(decode_content(b"a", "no-such-encoding").is_err());
    }

    #[test]
    fn test_auto_detects_ascii_as_compatible() {
        let decoded = decode_content(b"name,age\nAlice,30\n", "auto").unwrap();
        assert_eq!(decoded, "name,age\nAlice,30\n");
    }

    #[test]
    fn test_read_source() {
        let text = read_source("x,y\n".as_bytes(), "utf-8").unwrap();
        assert_eq!(text, "x,y\n");
    }
}
