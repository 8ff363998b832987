//! Transformation module.
//!
//! This module turns rows into template output:
//! - Headers: Header derivation and row assembly
//! - Hooks: Column, row and dataset extension points
//! - Transformer: The two-phase row/dataset transform and rendering
//! - Pipeline: File-level conversion runs

pub mod headers;
pub mod hooks;
pub mod pipeline;
pub mod transformer;

pub use headers::{assemble_record, derive_headers, synthesized_header};
pub use hooks::{ColumnHook, DatasetHook, KeepDataset, KeepRows, Record, RowHook, TrimColumns};
pub use pipeline::*;
pub use transformer::{RowPass, RunPhase, TransformSummary, Transformer};
