//! Extension points of the row pipeline.
//!
//! Each hook is a trait with a default body, so a unit struct gets the stock
//! behavior and a custom type overrides only what it needs. Plain closures
//! with the matching signature are hooks too.

use serde_json::{Map, Value};

/// One row's data: header name to cell value, in column order.
pub type Record = Map<String, Value>;

/// Transforms a single column value before it is paired with its header.
pub trait ColumnHook {
    /// Default: trim surrounding whitespace.
    fn read_column(&self, column: &str) -> String {
        column.trim().to_string()
    }
}

/// Transforms an assembled record.
pub trait RowHook {
    /// Default: keep the record unchanged. Returning `None` drops the row.
    fn transform_row(&self, record: Record) -> Option<Record> {
        Some(record)
    }
}

/// Transforms the whole dataset once every row has been read.
pub trait DatasetHook {
    /// Default: every record as a JSON object, order unchanged.
    fn transform_all(&self, records: Vec<Record>) -> Vec<Value> {
        records.into_iter().map(Value::Object).collect()
    }
}

/// Trims every column.
#[derive(Debug, Clone, Copy, Default)]
pub struct TrimColumns;

impl ColumnHook for TrimColumns {}

/// Keeps every record as is.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepRows;

impl RowHook for KeepRows {}

/// Passes the dataset through.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeepDataset;

impl DatasetHook for KeepDataset {}

impl<F> ColumnHook for F
where
    F: Fn(&str) -> String,
{
    fn read_column(&self, column: &str) -> String {
        self(column)
    }
}

impl<F> RowHook for F
where
    F: Fn(Record) -> Option<Record>,
{
    fn transform_row(&self, record: Record) -> Option<Record> {
        self(record)
    }
}

impl<F> DatasetHook for F
where
    F: Fn(Vec<Record>) -> Vec<Value>,
{
    fn transform_all(&self, records: Vec<Record>) -> Vec<Value> {
        self(records)
    }
}
