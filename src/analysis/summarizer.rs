//! Dataset Summarizer
//!
//! Turns a [`TabularDataset`] into one bounded text blob for the classifier:
//!
//! ```text
//! Rows: 3, Columns: 3 <column fragment> <column fragment> ... [Strong correlation between a and b]
//! ```
//!
//! Fragment order is fixed (size, columns in sheet order, correlations in
//! row-major order over the numeric correlation matrix) so the same sheet
//! always produces the same text.

use super::column::{ColumnAnalyzer, ColumnSummary};
use super::dataset::{Column, TabularDataset};
use std::fmt;

/// Absolute Pearson coefficient a pair must exceed to be reported
pub const CORRELATION_THRESHOLD: f64 = 0.8;

/// Two numeric columns that move together
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedPair {
    pub first: String,
    pub second: String,
    pub coefficient: f64,
}

impl fmt::Display for CorrelatedPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Strong correlation between {} and {}",
            self.first, self.second
        )
    }
}

/// Summary of a whole dataset. `Display` yields the classifier input.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub rows: usize,
    pub columns: usize,
    pub column_summaries: Vec<ColumnSummary>,
    pub correlations: Vec<CorrelatedPair>,
}

impl DatasetSummary {
    /// All fragments in output order
    pub fn fragments(&self) -> Vec<String> {
        let mut fragments = Vec::with_capacity(1 + self.column_summaries.len() + self.correlations.len());
        fragments.push(format!("Rows: {}, Columns: {}", self.rows, self.columns));
        fragments.extend(self.column_summaries.iter().map(|c| c.to_string()));
        fragments.extend(self.correlations.iter().map(|c| c.to_string()));
        fragments
    }
}

impl fmt::Display for DatasetSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.fragments().join(" "))
    }
}

/// Builds [`DatasetSummary`] values
#[derive(Debug, Clone)]
pub struct DatasetSummarizer {
    analyzer: ColumnAnalyzer,
    threshold: f64,
}

impl DatasetSummarizer {
    pub fn new() -> Self {
        Self {
            analyzer: ColumnAnalyzer::new(),
            threshold: CORRELATION_THRESHOLD,
        }
    }

    pub fn summarize(&self, dataset: &TabularDataset) -> DatasetSummary {
        let column_summaries = dataset
            .columns()
            .iter()
            .map(|column| self.analyzer.analyze(column))
            .collect();

        let correlations = if dataset.column_count() > 1 {
            self.strong_correlations(dataset)
        } else {
            Vec::new()
        };

        DatasetSummary {
            rows: dataset.row_count(),
            columns: dataset.column_count(),
            column_summaries,
            correlations,
        }
    }

    /// Upper triangle of the numeric correlation matrix, row-major
    fn strong_correlations(&self, dataset: &TabularDataset) -> Vec<CorrelatedPair> {
        let numeric: Vec<&Column> = dataset.numeric_columns().collect();
        let mut pairs = Vec::new();

        for i in 0..numeric.len() {
            for j in (i + 1)..numeric.len() {
                let Some(r) = pearson(numeric[i], numeric[j]) else {
                    continue;
                };
                if r.abs() > self.threshold {
                    pairs.push(CorrelatedPair {
                        first: numeric[i].name().to_string(),
                        second: numeric[j].name().to_string(),
                        coefficient: r,
                    });
                }
            }
        }

        pairs
    }
}

impl Default for DatasetSummarizer {
    fn default() -> Self {
        Self::new()
    }
}

/// Pearson coefficient over rows where both columns hold a number.
/// `None` when fewer than two rows overlap or either side has no variance.
pub fn pearson(a: &Column, b: &Column) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = a
        .values()
        .iter()
        .zip(b.values())
        .filter_map(|(x, y)| Some((x.as_number()?, y.as_number()?)))
        .collect();

    if pairs.len() < 2 {
        return None;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let mut sxy = 0.0;
    let mut sxx = 0.0;
    let mut syy = 0.0;
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }

    if sxx == 0.0 || syy == 0.0 {
        return None;
    }

    let r = sxy / (sxx * syy).sqrt();
    r.is_finite().then(|| r.clamp(-1.0, 1.0))
}
