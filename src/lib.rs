//! mergezero - Pure-Rust Excel-to-Word mail merge engine
//!
//! This crate merges tabular records from an XLSX workbook into a DOCX
//! document template, producing one output document per record. Placeholders
//! of the form `«key»` are replaced with the record's values while preserving
//! every formatting attribute of the surrounding text runs, even when a
//! placeholder is split across multiple runs. Cell values are rendered the
//! way a spreadsheet application *displays* them (thousands separators,
//! currency symbols, percentages, zero-padded codes, dates), not as raw
//! stored values.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//! use mergezero::MergerBuilder;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create a merger with default settings
//!     let merger = MergerBuilder::new().build()?;
//!
//!     // One document per record, named after the first column
//!     let summary = merger.merge(
//!         Path::new("records.xlsx"),
//!         Path::new("template.docx"),
//!         Path::new("output_docs"),
//!     )?;
//!
//!     println!("{} documents generated", summary.generated);
//!     Ok(())
//! }
//! ```
//!
//! # Custom Configuration
//!
//! ```rust,no_run
//! use mergezero::{MergerBuilder, SheetSelector};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let merger = MergerBuilder::new()
//!         .with_sheet_selector(SheetSelector::Name("顧客一覧".to_string()))
//!         .with_naming_column("会社名")  // 出力ファイル名に使う列
//!         .build()?;
//!     # let _ = merger;
//!     Ok(())
//! }
//! ```
//!
//! # Working with the Core Operations Directly
//!
//! The two core operations are exposed for callers that drive their own
//! pipeline: [`collect_keys`] lists every placeholder in a template, and
//! [`substitute`] performs the in-place replacement.
//!
//! ```rust,no_run
//! use std::collections::HashMap;
//! use std::fs::File;
//! use mergezero::{collect_keys, substitute, Document};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut document = Document::read(File::open("template.docx")?)?;
//!     println!("placeholders: {:?}", collect_keys(&document));
//!
//!     let mut replacements = HashMap::new();
//!     replacements.insert("name".to_string(), "Alice".to_string());
//!     let report = substitute(&mut document, &replacements);
//!     println!("{} replaced, {} skipped", report.replaced, report.failures.len());
//!
//!     document.write(File::create("out.docx")?)?;
//!     Ok(())
//! }
//! ```
//!
//! # Format-Aware Cell Rendering
//!
//! ```rust
//! use mergezero::{CellFormatter, CellValue, FormatCode};
//!
//! let formatter = CellFormatter::new();
//! let code = FormatCode::classify("¥#,##0");
//! assert_eq!(formatter.render(&CellValue::Int(1500), &code), "¥1,500");
//! ```

mod api;
mod builder;
mod document;
mod engine;
mod error;
mod format;
mod formatter;
mod parser;
mod security;
mod types;

// 公開API
pub use api::SheetSelector;
pub use builder::{Merger, MergerBuilder};
pub use document::{Document, Paragraph, Run, TextPart};
pub use engine::{collect_keys, substitute};
pub use error::MergeError;
pub use format::FormatCode;
pub use formatter::CellFormatter;
pub use types::{
    CellValue, MappingReport, MergeSummary, Record, RecordIssue, RecordSet, SkippedMatch,
    SubstitutionReport,
};
