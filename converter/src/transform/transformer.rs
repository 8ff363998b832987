//! The row-to-template transformer.
//!
//! A run goes through these phases:
//!
//! ```text
//! Init ─▶ ReadingRows (header pending) ─▶ ReadingRows (header resolved)
//!      ─▶ DatasetComplete ─▶ Rendered ─▶ Done
//! ```
//!
//! Rows are buffered until the dataset is complete; nothing is written before
//! the template has rendered successfully.

use serde::Serialize;
use serde_json::Value;
use std::io::{Read, Write};

use super::headers::{assemble_record, derive_headers};
use super::hooks::{ColumnHook, DatasetHook, KeepDataset, KeepRows, Record, RowHook, TrimColumns};
use crate::context::Context;
use crate::error::{ConvertResult, CsvResult};
use crate::logs::{log_info, log_success, log_warning};
use crate::output::OutputSink;
use crate::parser::{read_source, split_rows};
use crate::template::{
    CompiledTemplate, EnvironmentHook, FileTemplateLoader, PlainEnvironment, TemplateLoader,
};

/// Where a run currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Init,
    ReadingRows { header_resolved: bool },
    DatasetComplete,
    Rendered,
    Done,
}

/// Statistics of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransformSummary {
    /// Rows read from the source, header row included
    pub rows_read: usize,
    /// Records kept after the row hook
    pub records: usize,
    /// Rows dropped by the row hook
    pub dropped: usize,
    /// Data rows with fewer columns than headers
    pub short_rows: usize,
    /// Data rows with more columns than headers
    pub long_rows: usize,
    /// Entries handed to the template
    pub lines: usize,
    /// Headers of the run, if any row was read
    pub headers: Option<Vec<String>>,
}

/// Rows read into records, before the dataset hook.
#[derive(Debug, Clone, Default)]
pub struct RowPass {
    pub records: Vec<Record>,
    pub summary: TransformSummary,
}

/// Converts delimited rows into records and renders them through a template.
///
/// # Example
///
/// ```
/// use csvtemplate::{Context, Transformer, OutputSink};
/// use csvtemplate::template::StringTemplateLoader;
///
/// let context = Context::builder("people.j2").use_header(true).build();
/// let loader = StringTemplateLoader::new(
///     "people.j2",
///     "{% for l in lines %}{{ l.name }} is {{ l.age }}\n{% endfor %}",
/// );
/// let mut transformer = Transformer::with_loader(context, &loader).unwrap();
///
/// let mut sink = OutputSink::new(Vec::new(), "utf-8").unwrap();
/// transformer.transform("name,age\nAlice,30\nBob,25\n".as_bytes(), &mut sink).unwrap();
/// assert_eq!(sink.into_inner(), b"Alice is 30\nBob is 25\n\n");
/// ```
pub struct Transformer {
    context: Context,
    template: CompiledTemplate,
    column_hook: Box<dyn ColumnHook>,
    row_hook: Box<dyn RowHook>,
    dataset_hook: Box<dyn DatasetHook>,
    phase: RunPhase,
}

impl std::fmt::Debug for Transformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transformer")
            .field("context", &self.context)
            .field("template", &self.template)
            .field("phase", &self.phase)
            .finish_non_exhaustive()
    }
}

impl Transformer {
    /// Load `context.template_source` from disk and use the default hooks.
    pub fn new(context: Context) -> ConvertResult<Self> {
        Self::with_loader(context, &FileTemplateLoader)
    }

    /// Load the template through `loader`.
    pub fn with_loader(context: Context, loader: &dyn TemplateLoader) -> ConvertResult<Self> {
        Self::with_environment(context, loader, &PlainEnvironment)
    }

    /// Load the template through `loader`, customizing its environment first.
    pub fn with_environment(
        context: Context,
        loader: &dyn TemplateLoader,
        environment: &dyn EnvironmentHook,
    ) -> ConvertResult<Self> {
        context.validate()?;
        let template = loader.load(&context, environment)?;
        Ok(Self::from_template(context, template))
    }

    /// Use an already compiled template.
    pub fn from_template(context: Context, template: CompiledTemplate) -> Self {
        Self {
            context,
            template,
            column_hook: Box::new(TrimColumns),
            row_hook: Box::new(KeepRows),
            dataset_hook: Box::new(KeepDataset),
            phase: RunPhase::Init,
        }
    }

    pub fn with_column_hook(mut self, hook: impl ColumnHook + 'static) -> Self {
        self.column_hook = Box::new(hook);
        self
    }

    pub fn with_row_hook(mut self, hook: impl RowHook + 'static) -> Self {
        self.row_hook = Box::new(hook);
        self
    }

    pub fn with_dataset_hook(mut self, hook: impl DatasetHook + 'static) -> Self {
        self.dataset_hook = Box::new(hook);
        self
    }

    pub fn context(&self) -> &Context {
        &self.context
    }

    /// Headers of the current (or last) run.
    pub fn headers(&self) -> Option<&[String]> {
        self.context.headers.as_deref()
    }

    pub fn template(&self) -> &CompiledTemplate {
        &self.template
    }

    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Decode `source`, render it and write the document to `sink`.
    pub fn transform<R: Read, W: Write>(
        &mut self,
        source: R,
        sink: &mut OutputSink<W>,
    ) -> ConvertResult<TransformSummary> {
        let delimiter = self.context.delimiter_byte()?;
        let content = read_source(source, &self.context.encoding)?;
        self.transform_rows(split_rows(&content, delimiter), sink)
    }

    /// Render already split rows and write the document to `sink`.
    pub fn transform_rows<I, W>(
        &mut self,
        rows: I,
        sink: &mut OutputSink<W>,
    ) -> ConvertResult<TransformSummary>
    where
        I: IntoIterator<Item = CsvResult<Vec<String>>>,
        W: Write,
    {
        let (rendered, summary) = self.render_rows(rows)?;
        sink.write_document(&rendered)?;
        self.phase = RunPhase::Done;
        log_success(format!("Wrote {} lines", summary.lines));
        Ok(summary)
    }

    /// Decode `source` and return the rendered document without the trailing newline.
    pub fn transform_to_string<R: Read>(&mut self, source: R) -> ConvertResult<String> {
        let delimiter = self.context.delimiter_byte()?;
        let content = read_source(source, &self.context.encoding)?;
        let (rendered, _) = self.render_rows(split_rows(&content, delimiter))?;
        self.phase = RunPhase::Done;
        Ok(rendered)
    }

    fn render_rows<I>(&mut self, rows: I) -> ConvertResult<(String, TransformSummary)>
    where
        I: IntoIterator<Item = CsvResult<Vec<String>>>,
    {
        let (dataset, mut summary) = self.build_dataset(rows)?;
        summary.lines = dataset.len();

        log_info(format!("Rendering template '{}'...", self.template.name()));
        let rendered = self.render(&dataset)?;
        self.phase = RunPhase::Rendered;
        Ok((rendered, summary))
    }

    /// Read all rows, then apply the dataset hook.
    pub fn build_dataset<I>(&mut self, rows: I) -> ConvertResult<(Vec<Value>, TransformSummary)>
    where
        I: IntoIterator<Item = CsvResult<Vec<String>>>,
    {
        let pass = self.read_rows(rows)?;
        let dataset = self.dataset_hook.transform_all(pass.records);
        Ok((dataset, pass.summary))
    }

    /// Read all rows into records.
    ///
    /// The first row fixes the headers. It becomes a record too unless
    /// `use_header` is set. Headers of a previous run are discarded.
    pub fn read_rows<I>(&mut self, rows: I) -> ConvertResult<RowPass>
    where
        I: IntoIterator<Item = CsvResult<Vec<String>>>,
    {
        self.context.headers = None;
        self.phase = RunPhase::ReadingRows { header_resolved: false };
        log_info(format!(
            "Reading rows (delimiter '{}', header: {})...",
            format_delimiter(self.context.delimiter),
            if self.context.use_header { "first row" } else { "synthesized" }
        ));

        let mut pass = RowPass::default();

        for (line_no, row) in rows.into_iter().enumerate() {
            let columns = row?;
            pass.summary.rows_read += 1;

            if line_no == 0 {
                self.context.headers = Some(derive_headers(&columns, &self.context));
                self.phase = RunPhase::ReadingRows { header_resolved: true };
                if self.context.use_header {
                    continue;
                }
            }

            let headers = self.context.headers.as_deref().unwrap_or(&[]);
            if columns.len() < headers.len() {
                pass.summary.short_rows += 1;
            } else if columns.len() > headers.len() {
                pass.summary.long_rows += 1;
            }

            match self.read_record(headers, &columns) {
                Some(record) => pass.records.push(record),
                None => pass.summary.dropped += 1,
            }
        }

        pass.summary.records = pass.records.len();
        pass.summary.headers = self.context.headers.clone();
        self.phase = RunPhase::DatasetComplete;

        log_success(format!(
            "Read {} rows, {} records",
            pass.summary.rows_read, pass.summary.records
        ));
        if let Some(headers) = &self.context.headers {
            log_info(format!("Headers: {}", headers.join(", ")));
        }
        if pass.summary.short_rows > 0 {
            log_warning(format!("{} rows shorter than the header", pass.summary.short_rows));
        }
        if pass.summary.long_rows > 0 {
            log_warning(format!(
                "{} rows longer than the header, extra columns dropped",
                pass.summary.long_rows
            ));
        }
        if pass.summary.dropped > 0 {
            log_info(format!("{} rows dropped by the row hook", pass.summary.dropped));
        }

        Ok(pass)
    }

    /// Pair `columns` with `headers`, then apply the row hook.
    ///
    /// The column hook runs lazily on each paired column, so columns past the
    /// header count are never passed to it.
    pub fn read_record(&self, headers: &[String], columns: &[String]) -> Option<Record> {
        let values = columns.iter().map(|column| self.column_hook.read_column(column));
        self.row_hook.transform_row(assemble_record(headers, values))
    }

    /// Render a finished dataset.
    pub fn render(&self, dataset: &[Value]) -> ConvertResult<String> {
        Ok(self.template.render_lines(dataset)?)
    }
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "TAB".to_string(),
        c => c.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ConvertError, CsvError};
    use crate::template::{compile_str, StringTemplateLoader};
    use serde_json::json;
    use std::cell::Cell;
    use std::rc::Rc;

    const PEOPLE: &str = "{% for l in lines %}{{l.name}} is {{l.age}}\n{% endfor %}";

    fn transformer(template: &str, use_header: bool) -> Transformer {
        let context = Context::builder("test.j2").use_header(use_header).build();
        Transformer::with_loader(context, &StringTemplateLoader::new("test.j2", template)).unwrap()
    }

    fn rows(lines: &[&[&str]]) -> Vec<CsvResult<Vec<String>>> {
        lines
            .iter()
            .map(|cols| Ok(cols.iter().map(|c| c.to_string()).collect()))
            .collect()
    }

    #[test]
    fn test_end_to_end_with_header() {
        let mut t = transformer(PEOPLE, true);
        let out = t.transform_to_string("name,age\nAlice,30\nBob,25\n".as_bytes()).unwrap();
        assert_eq!(out, "Alice is 30\nBob is 25\n");
        assert_eq!(t.headers().unwrap(), ["name", "age"]);
        assert_eq!(t.phase(), RunPhase::Done);
    }

    #[test]
    fn test_sink_gets_trailing_newline() {
        let mut t = transformer(PEOPLE, true);
        let mut sink = OutputSink::new(Vec::new(), "utf-8").unwrap();
        let summary = t.transform("name,age\nAlice,30\n".as_bytes(), &mut sink).unwrap();
        assert_eq!(sink.into_inner(), b"Alice is 30\n\n");
        assert_eq!(summary.rows_read, 2);
        assert_eq!(summary.records, 1);
        assert_eq!(summary.lines, 1);
    }

    #[test]
    fn test_without_header_first_row_is_data() {
        let mut t =
            transformer("{% for l in lines %}{{ l.col_00 }}-{{ l.col_01 }};{% endfor %}", false);
        let out = t.transform_to_string("x,y\n1,2\n".as_bytes()).unwrap();
        assert_eq!(out, "x-y;1-2;");
        assert_eq!(t.headers().unwrap(), ["col_00", "col_01"]);
    }

    #[test]
    fn test_record_count_without_header() {
        let mut t = transformer("", false);
        let pass = t.read_rows(rows(&[&["a", "b"], &["c", "d"], &["e", "f"]])).unwrap();
        assert_eq!(pass.records.len(), 3);
        assert_eq!(pass.summary.rows_read, 3);
    }

    #[test]
    fn test_record_count_with_header() {
        let mut t = transformer("", true);
        let pass = t.read_rows(rows(&[&[" h1 ", "h2"], &["c", "d"], &["e", "f"]])).unwrap();
        assert_eq!(pass.records.len(), 2);
        assert_eq!(t.headers().unwrap(), ["h1", "h2"]);
        assert_eq!(pass.records[0]["h1"], "c");
    }

    #[test]
    fn test_records_keep_input_order() {
        let mut t = transformer("", false);
        let pass = t.read_rows(rows(&[&["3"], &["1"], &["2"]])).unwrap();
        let values: Vec<&Value> = pass.records.iter().map(|r| &r["col_00"]).collect();
        assert_eq!(values, vec!["3", "1", "2"]);
    }

    #[test]
    fn test_columns_trimmed() {
        let mut t = transformer("", false);
        let pass = t.read_rows(rows(&[&["  a  ", "\tb"]])).unwrap();
        assert_eq!(pass.records[0]["col_00"], "a");
        assert_eq!(pass.records[0]["col_01"], "b");
    }

    #[test]
    fn test_short_and_long_rows() {
        let mut t = transformer("", true);
        let pass = t
            .read_rows(rows(&[&["a", "b", "c"], &["x", "y"], &["1", "2", "3", "4"]]))
            .unwrap();

        assert_eq!(pass.records[0], json!({"a": "x", "b": "y"}).as_object().unwrap().clone());
        assert_eq!(pass.records[1].len(), 3);
        assert!(!pass.records[1].contains_key("col_03"));
        assert_eq!(pass.summary.short_rows, 1);
        assert_eq!(pass.summary.long_rows, 1);
    }

    #[test]
    fn test_empty_input_renders_empty_lines() {
        let mut t = transformer("count={{ lines|length }}", false);
        let out = t.transform_to_string("".as_bytes()).unwrap();
        assert_eq!(out, "count=0");
        assert!(t.headers().is_none());
    }

    #[test]
    fn test_blank_line_becomes_empty_record() {
        let mut t = transformer("{{ lines|length }}", false);
        let pass = t.read_rows(split_rows("a\n\nb\n", b',')).unwrap();
        assert_eq!(pass.records.len(), 3);
        assert!(pass.records[1].is_empty());
        assert_eq!(pass.summary.short_rows, 1);

        let out = t.transform_to_string("a\n\nb\n".as_bytes()).unwrap();
        assert_eq!(out, "3");
    }

    #[test]
    fn test_blank_first_line_gives_empty_headers() {
        let mut t = transformer("{{ lines|length }}", true);
        let pass = t.read_rows(split_rows("\nname\nAlice\n", b',')).unwrap();
        assert!(t.headers().unwrap().is_empty());
        assert_eq!(pass.records.len(), 2);
        assert!(pass.records.iter().all(|r| r.is_empty()));
        assert_eq!(pass.summary.long_rows, 2);
    }

    #[test]
    fn test_header_only_input() {
        let mut t = transformer("count={{ lines|length }}", true);
        let out = t.transform_to_string("a,b\n".as_bytes()).unwrap();
        assert_eq!(out, "count=0");
        assert_eq!(t.headers().unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_custom_column_hook() {
        let mut t = transformer(PEOPLE, true).with_column_hook(|c: &str| c.trim().to_uppercase());
        let out = t.transform_to_string("name,age\nalice,30\n".as_bytes()).unwrap();
        assert_eq!(out, "ALICE is 30\n");
    }

    #[test]
    fn test_column_hook_does_not_touch_headers() {
        let mut t = transformer(PEOPLE, true).with_column_hook(|c: &str| format!("<{}>", c));
        let out = t.transform_to_string("name,age\nalice,30\n".as_bytes()).unwrap();
        assert_eq!(out, "<alice> is <30>\n");
        assert_eq!(t.headers().unwrap(), ["name", "age"]);
    }

    #[test]
    fn test_column_hook_called_once_per_paired_column() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut t = transformer("", false).with_column_hook(move |c: &str| {
            counter.set(counter.get() + 1);
            c.to_string()
        });
        t.read_rows(rows(&[&["a", "b"], &["c", "d", "e"]])).unwrap();
        assert_eq!(calls.get(), 4);
    }

    #[test]
    fn test_row_hook_computed_field_and_filter() {
        let hook = |mut r: Record| -> Option<Record> {
            let age: u32 = r.get("age")?.as_str()?.parse().ok()?;
            if age < 18 {
                return None;
            }
            r.insert("adult".into(), json!("yes"));
            Some(r)
        };
        let mut t = transformer("{% for l in lines %}{{ l.name }}:{{ l.adult }};{% endfor %}", true)
            .with_row_hook(hook);

        let (dataset, summary) = t
            .build_dataset(rows(&[&["name", "age"], &["Alice", "30"], &["Tim", "9"]]))
            .unwrap();
        assert_eq!(dataset, vec![json!({"name": "Alice", "age": "30", "adult": "yes"})]);
        assert_eq!(summary.dropped, 1);
        assert_eq!(t.render(&dataset).unwrap(), "Alice:yes;");
    }

    #[test]
    fn test_dataset_hook_sorts() {
        let sort_by_name = |mut records: Vec<Record>| -> Vec<Value> {
            records.sort_by(|a, b| a["name"].as_str().cmp(&b["name"].as_str()));
            records.into_iter().map(Value::Object).collect()
        };
        let mut t = transformer(PEOPLE, true).with_dataset_hook(sort_by_name);
        let out = t.transform_to_string("name,age\nZoe,1\nAnn,2\n".as_bytes()).unwrap();
        assert_eq!(out, "Ann is 2\nZoe is 1\n");
    }

    #[test]
    fn test_dataset_hook_may_change_shape() {
        let summarize = |records: Vec<Record>| vec![json!({"total": records.len()})];
        let mut t = transformer("{{ lines[0].total }}", false).with_dataset_hook(summarize);
        assert_eq!(t.transform_to_string("a\nb\nc\n".as_bytes()).unwrap(), "3");
    }

    #[test]
    fn test_identity_dataset_hook_changes_nothing() {
        let input = "name,age\nAlice,30\nBob,25\n";
        let mut plain = transformer(PEOPLE, true);
        let mut explicit = transformer(PEOPLE, true).with_dataset_hook(KeepDataset);
        assert_eq!(
            plain.transform_to_string(input.as_bytes()).unwrap(),
            explicit.transform_to_string(input.as_bytes()).unwrap()
        );
    }

    #[test]
    fn test_headers_reset_between_runs() {
        let mut t = transformer("{{ lines|length }}", true);
        t.transform_to_string("a,b,c\n1,2,3\n".as_bytes()).unwrap();
        assert_eq!(t.headers().unwrap().len(), 3);
        t.transform_to_string("x\n1\n".as_bytes()).unwrap();
        assert_eq!(t.headers().unwrap(), ["x"]);
    }

    #[test]
    fn test_tab_delimiter() {
        let context = Context::builder("t").tab().use_header(true).build();
        let loader = StringTemplateLoader::new("t", PEOPLE);
        let mut t = Transformer::with_loader(context, &loader).unwrap();
        let out = t.transform_to_string("name\tage\nA, B\t1\n".as_bytes()).unwrap();
        assert_eq!(out, "A, B is 1\n");
    }

    #[test]
    fn test_windows1252_source() {
        let context = Context::builder("t").encoding("windows-1252").use_header(true).build();
        let loader = StringTemplateLoader::new("t", "{% for l in lines %}{{ l.city }}{% endfor %}");
        let mut t = Transformer::with_loader(context, &loader).unwrap();
        let source: &[u8] = b"city\nM\xfcnchen\n";
        assert_eq!(t.transform_to_string(source).unwrap(), "München");
    }

    #[test]
    fn test_row_error_aborts_run() {
        let mut t = transformer("{{ lines|length }}", false);
        let mut input = rows(&[&["a"]]);
        input.push(Err(CsvError::ParseError { line: 2, message: "bad".into() }));
        let mut sink = OutputSink::new(Vec::new(), "utf-8").unwrap();

        let err = t.transform_rows(input, &mut sink).unwrap_err();
        assert!(matches!(err, ConvertError::Csv(_)));
        assert!(sink.into_inner().is_empty());
    }

    #[test]
    fn test_invalid_delimiter_rejected_at_construction() {
        let context = Context::builder("t").delimiter('→').build();
        let err =
            Transformer::with_loader(context, &StringTemplateLoader::new("t", "")).unwrap_err();
        assert!(matches!(err, ConvertError::Config(_)));
    }

    #[test]
    fn test_from_template() {
        let context = Context::new("inline");
        let template =
            compile_str("inline", "{{ lines|length }}", &context, &PlainEnvironment).unwrap();
        let mut t = Transformer::from_template(context, template);
        assert_eq!(t.phase(), RunPhase::Init);
        assert_eq!(t.transform_to_string("1\n2\n".as_bytes()).unwrap(), "2");
    }
}
