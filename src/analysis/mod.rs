//! Spreadsheet content analysis
//!
//! Parses workbook bytes into a typed dataset and condenses it into the short
//! description that is fed to the classifier.

pub mod column;
pub mod dataset;
pub mod summarizer;

pub use column::{ColumnAnalyzer, ColumnStats, ColumnSummary, NOT_APPLICABLE};
pub use dataset::{CellValue, Column, ColumnKind, DatasetError, TabularDataset};
pub use summarizer::{CorrelatedPair, DatasetSummarizer, DatasetSummary, CORRELATION_THRESHOLD};
