//! Output file naming

use chrono::NaiveDateTime;
use std::path::Path;

/// Second-resolution stamp appended to processed files
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Build `{stem}_analyzed_{YYYYMMDD_HHMMSS}` from the original name.
///
/// Only the final path component is kept and its last extension dropped,
/// so `inbox/report.xlsx` and `report.xlsx` both yield `report_analyzed_...`.
pub fn generate_file_name(original_name: &str, now: NaiveDateTime) -> String {
    let stem = Path::new(original_name)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| original_name.to_string());

    format!("{}_analyzed_{}", stem, now.format(TIMESTAMP_FORMAT))
}
