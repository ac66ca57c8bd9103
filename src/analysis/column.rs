//! Per-column statistics and the text fragment each column contributes

use super::dataset::{CellValue, Column, ColumnKind, DATETIME_FORMAT};
use chrono::NaiveDateTime;
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Placeholder reported when a text column has no value to be "most common"
pub const NOT_APPLICABLE: &str = "N/A";

/// Statistics gathered for one column, one variant per [`ColumnKind`]
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnStats {
    Numeric { min: f64, max: f64, mean: f64 },
    Temporal { earliest: NaiveDateTime, latest: NaiveDateTime },
    Textual { unique: usize, most_common: Option<String> },
    Other { unique: usize },
}

/// Immutable description of a single column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnSummary {
    pub name: String,
    pub stats: ColumnStats,
}

impl fmt::Display for ColumnSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = &self.name;
        match &self.stats {
            ColumnStats::Numeric { min, max, mean } => write!(
                f,
                "{} (Numeric) - Min: {:.2}, Max: {:.2}, Mean: {:.2}",
                name, min, max, mean
            ),
            ColumnStats::Temporal { earliest, latest } => write!(
                f,
                "{} (Date/Time) - Earliest: {}, Latest: {}",
                name,
                earliest.format(DATETIME_FORMAT),
                latest.format(DATETIME_FORMAT)
            ),
            ColumnStats::Textual { unique, most_common } => write!(
                f,
                "{} (Text) - Unique Values: {}, Most Common: {}",
                name,
                unique,
                most_common.as_deref().unwrap_or(NOT_APPLICABLE)
            ),
            ColumnStats::Other { unique } => {
                write!(f, "{} (Other) - Unique Values: {}", name, unique)
            }
        }
    }
}

/// Describes a column according to its inferred kind
#[derive(Debug, Default, Clone, Copy)]
pub struct ColumnAnalyzer;

impl ColumnAnalyzer {
    pub fn new() -> Self {
        Self
    }

    pub fn analyze(&self, column: &Column) -> ColumnSummary {
        let stats = match column.kind() {
            ColumnKind::Numeric => numeric_stats(column),
            ColumnKind::Temporal => temporal_stats(column),
            ColumnKind::Textual => textual_stats(column),
            ColumnKind::Other => ColumnStats::Other {
                unique: distinct_count(column),
            },
        };

        ColumnSummary {
            name: column.name().to_string(),
            stats,
        }
    }
}

fn numeric_stats(column: &Column) -> ColumnStats {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    let mut sum = 0.0;
    let mut count = 0usize;

    for n in column.values().iter().filter_map(|v| v.as_number()) {
        min = min.min(n);
        max = max.max(n);
        sum += n;
        count += 1;
    }

    // Inferred numeric columns hold at least one value
    if count == 0 {
        return ColumnStats::Numeric {
            min: f64::NAN,
            max: f64::NAN,
            mean: f64::NAN,
        };
    }

    ColumnStats::Numeric {
        min,
        max,
        mean: sum / count as f64,
    }
}

fn temporal_stats(column: &Column) -> ColumnStats {
    let mut stamps = column.values().iter().filter_map(|v| v.as_datetime());

    match stamps.next() {
        Some(first) => {
            let (earliest, latest) = stamps.fold((first, first), |(lo, hi), dt| {
                (lo.min(dt), hi.max(dt))
            });
            ColumnStats::Temporal { earliest, latest }
        }
        None => ColumnStats::Other { unique: 0 },
    }
}

/// Identity of a present cell for counting. A number and the text of the
/// same digits are different values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum DistinctKey {
    Number(u64),
    DateTime(NaiveDateTime),
    Text(String),
    Bool(bool),
    Other(String),
}

impl DistinctKey {
    fn of(value: &CellValue) -> Option<Self> {
        Some(match value {
            CellValue::Empty => return None,
            // 0.0 and -0.0 compare equal
            CellValue::Number(n) if *n == 0.0 => DistinctKey::Number(0),
            CellValue::Number(n) => DistinctKey::Number(n.to_bits()),
            CellValue::DateTime(dt) => DistinctKey::DateTime(*dt),
            CellValue::Text(s) => DistinctKey::Text(s.clone()),
            CellValue::Bool(b) => DistinctKey::Bool(*b),
            CellValue::Other(s) => DistinctKey::Other(s.clone()),
        })
    }
}

/// Distinct values and the most frequent one. Ties go to the value seen first.
fn textual_stats(column: &Column) -> ColumnStats {
    let mut order: Vec<(DistinctKey, &CellValue)> = Vec::new();
    let mut counts: HashMap<DistinctKey, usize> = HashMap::new();

    for value in column.present() {
        let Some(key) = DistinctKey::of(value) else {
            continue;
        };
        let count = counts.entry(key.clone()).or_insert(0);
        if *count == 0 {
            order.push((key, value));
        }
        *count += 1;
    }

    let mut most_common: Option<(&CellValue, usize)> = None;
    for (key, value) in &order {
        let count = counts[key];
        if most_common.map_or(true, |(_, best)| count > best) {
            most_common = Some((*value, count));
        }
    }

    ColumnStats::Textual {
        unique: order.len(),
        most_common: most_common.map(|(value, _)| value.to_string()),
    }
}

fn distinct_count(column: &Column) -> usize {
    column
        .present()
        .filter_map(DistinctKey::of)
        .collect::<HashSet<_>>()
        .len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_numeric_fragment() {
        let column = Column::new(
            "price",
            vec![10.0.into(), CellValue::Empty, 2.5.into(), 7.25.into()],
        );

        let summary = ColumnAnalyzer::new().analyze(&column);

        assert_eq!(
            summary.to_string(),
            "price (Numeric) - Min: 2.50, Max: 10.00, Mean: 6.58"
        );
    }

    #[test]
    fn test_temporal_fragment() {
        let column = Column::new(
            "ordered_at",
            vec![at(2024, 5, 1).into(), at(2023, 12, 31).into(), at(2024, 2, 29).into()],
        );

        let summary = ColumnAnalyzer::new().analyze(&column);

        assert_eq!(
            summary.to_string(),
            "ordered_at (Date/Time) - Earliest: 2023-12-31 09:00:00, Latest: 2024-05-01 09:00:00"
        );
    }

    #[test]
    fn test_textual_fragment_prefers_first_seen_on_tie() {
        let column = Column::new(
            "city",
            vec!["Oslo".into(), "Lima".into(), "Lima".into(), "Oslo".into(), "Rome".into()],
        );

        let summary = ColumnAnalyzer::new().analyze(&column);

        assert_eq!(
            summary.to_string(),
            "city (Text) - Unique Values: 3, Most Common: Oslo"
        );
    }

    #[test]
    fn test_numbers_and_text_are_distinct() {
        let column = Column::new(
            "code",
            vec![1i64.into(), "1".into(), "1".into(), 1.0.into(), "A".into()],
        );

        let summary = ColumnAnalyzer::new().analyze(&column);

        assert_eq!(column.kind(), ColumnKind::Textual);
        assert_eq!(
            summary.stats,
            ColumnStats::Textual {
                unique: 3,
                most_common: Some("1".to_string())
            }
        );
    }

    #[test]
    fn test_other_kind_counts_by_value() {
        let column = Column::new("flag", vec![true.into(), false.into(), true.into()]);

        let summary = ColumnAnalyzer::new().analyze(&column);

        assert_eq!(summary.to_string(), "flag (Other) - Unique Values: 2");
    }

    #[test]
    fn test_textual_fragment_most_frequent() {
        let column = Column::new(
            "status",
            vec!["open".into(), "closed".into(), "closed".into(), CellValue::Empty],
        );

        let summary = ColumnAnalyzer::new().analyze(&column);

        assert_eq!(
            summary.stats,
            ColumnStats::Textual {
                unique: 2,
                most_common: Some("closed".to_string())
            }
        );
    }

    #[test]
    fn test_empty_textual_column_uses_placeholder() {
        let column = Column::new("notes", vec![]);

        let summary = ColumnAnalyzer::new().analyze(&column);

        assert_eq!(
            summary.to_string(),
            "notes (Text) - Unique Values: 0, Most Common: N/A"
        );
    }

    #[test]
    fn test_other_fragment_counts_distinct() {
        let column = Column::new("active", vec![true.into(), false.into(), true.into()]);

        let summary = ColumnAnalyzer::new().analyze(&column);

        assert_eq!(summary.to_string(), "active (Other) - Unique Values: 2");
    }
}
