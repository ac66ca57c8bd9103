//! Tabular Dataset Module
//!
//! Parses spreadsheet bytes into typed columns using calamine.
//! Only the first worksheet is read; its first row is the header.
//!
//! ## Type inference
//! Each column gets exactly one [`ColumnKind`], decided over its non-empty
//! cells. First match wins:
//! 1. every cell is a number → `Numeric`
//! 2. every cell is a date/time → `Temporal`
//! 3. any text, any mixture of kinds, or no values at all → `Textual`
//! 4. anything else (booleans, durations, error cells) → `Other`

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;
use std::fmt;
use std::io::Cursor;
use std::mem::discriminant;

/// Timestamp format used wherever a date/time cell is rendered as text
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Errors raised while turning file bytes into a dataset
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to open workbook: {0}")]
    Open(#[source] calamine::Error),

    #[error("Workbook contains no worksheet")]
    NoWorksheet,

    #[error("Failed to read worksheet range: {0}")]
    Range(#[source] calamine::Error),
}

/// A single cell after conversion from the workbook
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    DateTime(NaiveDateTime),
    Text(String),
    Bool(bool),
    /// Durations, error cells and anything else without a richer reading
    Other(String),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<NaiveDateTime> {
        match self {
            CellValue::DateTime(dt) => Some(*dt),
            _ => None,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Empty => Ok(()),
            CellValue::Number(n) => write!(f, "{}", format_number(*n)),
            CellValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            CellValue::Text(s) | CellValue::Other(s) => f.write_str(s),
            CellValue::Bool(true) => f.write_str("True"),
            CellValue::Bool(false) => f.write_str("False"),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::DateTime(value)
    }
}

impl From<&Data> for CellValue {
    fn from(cell: &Data) -> Self {
        match cell {
            Data::Empty => CellValue::Empty,
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) if dt.is_duration() => CellValue::Other(cell.to_string()),
            Data::DateTime(dt) => match dt.as_datetime() {
                Some(parsed) => CellValue::DateTime(parsed),
                None => CellValue::Other(cell.to_string()),
            },
            Data::DateTimeIso(s) => match parse_iso_datetime(s) {
                Some(parsed) => CellValue::DateTime(parsed),
                None => CellValue::Other(s.clone()),
            },
            Data::DurationIso(s) => CellValue::Other(s.clone()),
            Data::Error(_) => CellValue::Other(cell.to_string()),
        }
    }
}

/// Render whole numbers without a fractional part ("42" rather than "42.0")
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>()
        .ok()
        .or_else(|| {
            s.parse::<NaiveDate>()
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

/// Semantic type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Numeric,
    Temporal,
    Textual,
    Other,
}

impl ColumnKind {
    /// Infer the kind from a column's cells. Empty cells do not vote.
    pub fn infer(values: &[CellValue]) -> Self {
        let present: Vec<&CellValue> = values.iter().filter(|v| !v.is_empty()).collect();

        let Some(first) = present.first() else {
            return ColumnKind::Textual;
        };

        if present.iter().all(|v| matches!(v, CellValue::Number(_))) {
            return ColumnKind::Numeric;
        }
        if present.iter().all(|v| matches!(v, CellValue::DateTime(_))) {
            return ColumnKind::Temporal;
        }

        let homogeneous = present
            .iter()
            .all(|v| discriminant(*v) == discriminant(*first));
        let has_text = present.iter().any(|v| matches!(v, CellValue::Text(_)));

        if has_text || !homogeneous {
            ColumnKind::Textual
        } else {
            ColumnKind::Other
        }
    }
}

/// One named column with its cells in row order
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    values: Vec<CellValue>,
    kind: ColumnKind,
}

impl Column {
    pub fn new(name: impl Into<String>, values: Vec<CellValue>) -> Self {
        let kind = ColumnKind::infer(&values);
        Self {
            name: name.into(),
            values,
            kind,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn values(&self) -> &[CellValue] {
        &self.values
    }

    pub fn kind(&self) -> ColumnKind {
        self.kind
    }

    /// Non-empty cells only
    pub fn present(&self) -> impl Iterator<Item = &CellValue> {
        self.values.iter().filter(|v| !v.is_empty())
    }
}

/// Parsed spreadsheet contents, read-only after load
#[derive(Debug, Clone, Default)]
pub struct TabularDataset {
    columns: Vec<Column>,
    row_count: usize,
}

impl TabularDataset {
    /// Build a dataset from already-typed columns.
    /// The row count is the length of the longest column.
    pub fn new(columns: Vec<Column>) -> Self {
        let row_count = columns.iter().map(|c| c.values.len()).max().unwrap_or(0);
        Self { columns, row_count }
    }

    /// Parse workbook bytes (xlsx, xlsm, xlsb, xls or ods) and read the first sheet
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DatasetError> {
        let mut workbook =
            open_workbook_auto_from_rs(Cursor::new(bytes.to_vec())).map_err(DatasetError::Open)?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or(DatasetError::NoWorksheet)?
            .map_err(DatasetError::Range)?;

        let dataset = Self::from_range(&range);

        tracing::debug!(
            rows = dataset.row_count(),
            columns = dataset.column_count(),
            "Parsed worksheet"
        );

        Ok(dataset)
    }

    /// Convert a worksheet range. The first row is the header.
    pub fn from_range(range: &Range<Data>) -> Self {
        let mut rows = range.rows();

        let Some(header) = rows.next() else {
            return Self::default();
        };

        let names = column_names(header);

        let mut values: Vec<Vec<CellValue>> = vec![Vec::new(); names.len()];
        let mut row_count = 0;

        for row in rows {
            if row.iter().all(|cell| matches!(cell, Data::Empty)) {
                continue;
            }
            for (idx, column) in values.iter_mut().enumerate() {
                column.push(row.get(idx).map(CellValue::from).unwrap_or(CellValue::Empty));
            }
            row_count += 1;
        }

        let columns = names
            .into_iter()
            .zip(values)
            .map(|(name, values)| Column::new(name, values))
            .collect();

        Self { columns, row_count }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Numeric columns in original order
    pub fn numeric_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns
            .iter()
            .filter(|c| c.kind == ColumnKind::Numeric)
    }
}

/// Header cells to unique column names.
/// Blank headers become `Unnamed: {idx}`; repeats get `.1`, `.2`, ... suffixes.
fn column_names(header: &[Data]) -> Vec<String> {
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut names = Vec::with_capacity(header.len());

    for (idx, cell) in header.iter().enumerate() {
        let base = match CellValue::from(cell) {
            CellValue::Empty => format!("Unnamed: {}", idx),
            other => other.to_string(),
        };

        let mut name = base.clone();
        while let Some(count) = seen.get_mut(&name) {
            *count += 1;
            name = format!("{}.{}", base, count);
        }
        seen.insert(name.clone(), 0);
        names.push(name);
    }

    names
}
