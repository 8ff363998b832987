//! Encoded output sink.

use encoding_rs::Encoding;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};
use std::path::Path;

use crate::context::resolve_encoding;
use crate::error::{ConfigResult, ConvertResult};

/// Writes rendered documents in a fixed encoding.
pub struct OutputSink<W: Write> {
    inner: W,
    encoding: &'static Encoding,
}

impl<W: Write> OutputSink<W> {
    /// Wrap a writer, encoding output with the given label.
    pub fn new(inner: W, encoding: &str) -> ConfigResult<Self> {
        Ok(Self {
            inner,
            encoding: resolve_encoding(encoding)?,
        })
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Write one document followed by a newline, then flush.
    ///
    /// Characters the encoding cannot represent are written as HTML numeric
    /// character references. UTF-16 is written without a byte order mark.
    pub fn write_document(&mut self, text: &str) -> ConvertResult<()> {
        let mut document = String::with_capacity(text.len() + 1);
        document.push_str(text);
        document.push('\n');

        let bytes = encode(&document, self.encoding);
        self.inner.write_all(&bytes)?;
        self.inner.flush()?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Encode text for output.
///
/// `Encoding::encode` falls back to UTF-8 for UTF-16, so those two are
/// encoded here.
fn encode<'a>(text: &'a str, encoding: &'static Encoding) -> Cow<'a, [u8]> {
    if encoding == encoding_rs::UTF_16LE {
        Cow::Owned(text.encode_utf16().flat_map(u16::to_le_bytes).collect())
    } else if encoding == encoding_rs::UTF_16BE {
        Cow::Owned(text.encode_utf16().flat_map(u16::to_be_bytes).collect())
    } else {
        encoding.encode(text).0
    }
}

impl OutputSink<BufWriter<Stdout>> {
    /// Sink on standard output.
    pub fn stdout(encoding: &str) -> ConfigResult<Self> {
        Self::new(BufWriter::new(io::stdout()), encoding)
    }
}

impl OutputSink<BufWriter<File>> {
    /// Sink on a newly created (or truncated) file.
    pub fn create(path: &Path, encoding: &str) -> ConvertResult<Self> {
        let encoding = resolve_encoding(encoding)?;
        let file = File::create(path)?;
        Ok(Self {
            inner: BufWriter::new(file),
            encoding,
        })
    }
}
