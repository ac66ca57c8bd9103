//! Event Pipeline
//!
//! Handles one new-spreadsheet event end to end:
//! parse -> summarize -> classify -> name -> create folder -> move.
//!
//! Any failure aborts the event and leaves the source where it was. A folder
//! created before a failed move is not cleaned up.

use crate::ai::{Category, Classifier, ClassifierError};
use crate::analysis::{DatasetError, DatasetSummarizer, TabularDataset};
use crate::naming::generate_file_name;
use crate::storage::{StorageError, StorageMover};
use chrono::{Local, NaiveDateTime};
use std::fmt;
use std::sync::Arc;
use uuid::Uuid;

/// Extension given to every relocated file
const OUTPUT_EXTENSION: &str = "xlsx";

/// A new file that appeared in storage
#[derive(Debug, Clone)]
pub struct BlobEvent {
    pub id: Uuid,
    /// Storage-relative name, e.g. `report.xlsx`
    pub name: String,
    pub bytes: Vec<u8>,
}

impl BlobEvent {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            bytes,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }
}

/// Where a classified file ends up
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationPath {
    pub folder: String,
    pub file_name: String,
}

impl DestinationPath {
    pub fn new(output_root: &str, category: Category, new_name: &str) -> Self {
        Self {
            folder: format!("{}/{}", output_root.trim_matches('/'), category),
            file_name: format!("{}.{}", new_name, OUTPUT_EXTENSION),
        }
    }

    /// Storage path of the file itself
    pub fn item_path(&self) -> String {
        format!("{}/{}", self.folder, self.file_name)
    }
}

impl fmt::Display for DestinationPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}/{}", self.folder, self.file_name)
    }
}

/// Outcome of a processed event
#[derive(Debug, Clone)]
pub struct ProcessedFile {
    pub source: String,
    pub category: Category,
    pub destination: DestinationPath,
    pub summary: String,
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("Failed to parse spreadsheet: {0}")]
    Dataset(#[from] DatasetError),

    #[error("Classification failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("Storage operation failed: {0}")]
    Storage(#[from] StorageError),
}

pub struct Pipeline {
    classifier: Arc<Classifier>,
    storage: Arc<dyn StorageMover>,
    summarizer: DatasetSummarizer,
    output_root: String,
}

impl Pipeline {
    pub fn new(
        classifier: Arc<Classifier>,
        storage: Arc<dyn StorageMover>,
        output_root: impl Into<String>,
    ) -> Self {
        Self {
            classifier,
            storage,
            summarizer: DatasetSummarizer::new(),
            output_root: output_root.into(),
        }
    }

    /// Process an event stamped with the local wall-clock time
    pub async fn process(&self, event: &BlobEvent) -> Result<ProcessedFile, PipelineError> {
        self.process_at(event, Local::now().naive_local()).await
    }

    pub async fn process_at(
        &self,
        event: &BlobEvent,
        now: NaiveDateTime,
    ) -> Result<ProcessedFile, PipelineError> {
        tracing::info!(
            event_id = %event.id,
            name = %event.name,
            size = event.size(),
            "Processing spreadsheet"
        );

        let dataset = TabularDataset::from_bytes(&event.bytes)?;
        self.route(&event.name, &dataset, now).await
    }

    /// Summarize, classify and relocate an already parsed dataset
    pub async fn route(
        &self,
        name: &str,
        dataset: &TabularDataset,
        now: NaiveDateTime,
    ) -> Result<ProcessedFile, PipelineError> {
        if dataset.is_empty() {
            tracing::warn!(name = %name, "Worksheet has no columns, classifying on its size alone");
        }

        let summary = self.summarizer.summarize(dataset).to_string();
        tracing::debug!(rows = dataset.row_count(), columns = dataset.column_count(), "Summarized dataset");

        let category = self.classifier.classify(&summary).await?;

        let new_name = generate_file_name(name, now);
        let destination = DestinationPath::new(&self.output_root, category, &new_name);

        self.storage.create_folder(&destination.folder).await?;
        self.storage.move_item(name, &destination.item_path()).await?;

        tracing::info!(
            source = %name,
            category = %category,
            destination = %destination,
            "File moved"
        );
        tracing::info!(summary = %summary, "Dataset summary");

        Ok(ProcessedFile {
            source: name.to_string(),
            category,
            destination,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{LabelScore, ZeroShotModel};
    use crate::analysis::{CellValue, Column};
    use crate::storage::LocalStorage;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use regex::Regex;
    use tempfile::tempdir;

    /// Ranks `sales_data` first, with an out-of-vocabulary label on top
    struct FixedModel;

    #[async_trait]
    impl ZeroShotModel for FixedModel {
        async fn rank(
            &self,
            _text: &str,
            candidate_labels: &[&str],
        ) -> Result<Vec<LabelScore>, ClassifierError> {
            let mut ranking = vec![LabelScore {
                label: "unrelated".to_string(),
                score: 0.99,
            }];
            ranking.extend(candidate_labels.iter().map(|label| LabelScore {
                label: label.to_string(),
                score: if *label == "sales_data" { 0.7 } else { 0.05 },
            }));
            Ok(ranking)
        }
    }

    struct DownModel;

    #[async_trait]
    impl ZeroShotModel for DownModel {
        async fn rank(&self, _: &str, _: &[&str]) -> Result<Vec<LabelScore>, ClassifierError> {
            Err(ClassifierError::Api {
                status: 500,
                message: "model loading".to_string(),
            })
        }
    }

    fn stamp() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 2)
            .unwrap()
            .and_hms_opt(3, 4, 5)
            .unwrap()
    }

    fn pipeline(model: impl ZeroShotModel + 'static, root: &std::path::Path) -> Pipeline {
        Pipeline::new(
            Arc::new(Classifier::new(model)),
            Arc::new(LocalStorage::new(root)),
            "processed_files",
        )
    }

    fn sales_dataset() -> TabularDataset {
        TabularDataset::new(vec![
            Column::new("units", vec![1i64.into(), 2i64.into(), 3i64.into(), 4i64.into()]),
            Column::new(
                "revenue",
                vec![10.0.into(), 19.5.into(), 31.0.into(), 40.0.into()],
            ),
            Column::new(
                "region",
                vec!["north".into(), "south".into(), "north".into(), CellValue::Empty],
            ),
        ])
    }

    #[test]
    fn test_destination_path() {
        let dest = DestinationPath::new("/processed_files/", Category::SalesData, "q1_analyzed_20240102_030405");

        assert_eq!(dest.folder, "processed_files/sales_data");
        assert_eq!(dest.item_path(), "processed_files/sales_data/q1_analyzed_20240102_030405.xlsx");
        assert_eq!(
            dest.to_string(),
            "/processed_files/sales_data/q1_analyzed_20240102_030405.xlsx"
        );
    }

    #[tokio::test]
    async fn test_end_to_end_route() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("report.xlsx"), b"placeholder").unwrap();
        let pipeline = pipeline(FixedModel, dir.path());

        let processed = pipeline
            .route("report.xlsx", &sales_dataset(), stamp())
            .await
            .unwrap();

        assert!(processed.summary.starts_with("Rows: 4, Columns: 3 "));
        assert!(processed.summary.contains("units (Numeric) - Min: 1.00, Max: 4.00, Mean: 2.50"));
        assert!(processed.summary.contains("revenue (Numeric)"));
        assert!(processed.summary.contains("region (Text) - Unique Values: 2, Most Common: north"));
        assert_eq!(processed.summary.matches("Strong correlation between").count(), 1);
        assert!(processed.summary.contains("Strong correlation between units and revenue"));

        assert_eq!(processed.category, Category::SalesData);
        let pattern = Regex::new(
            r"^/processed_files/(financial_data|inventory_data|sales_data|customer_data|operational_data)/report_analyzed_\d{8}_\d{6}\.xlsx$",
        )
        .unwrap();
        assert!(pattern.is_match(&processed.destination.to_string()));

        assert!(!dir.path().join("report.xlsx").exists());
        let moved = dir
            .path()
            .join("processed_files/sales_data/report_analyzed_20240102_030405.xlsx");
        assert_eq!(std::fs::read(moved).unwrap(), b"placeholder");
    }

    const SALES_XLSX: &[u8] =
        include_bytes!(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures/sales.xlsx"));

    #[tokio::test]
    async fn test_process_workbook_end_to_end() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("sales.xlsx"), SALES_XLSX).unwrap();
        let pipeline = pipeline(FixedModel, dir.path());

        let event = BlobEvent::new("sales.xlsx", SALES_XLSX.to_vec());
        let processed = pipeline.process_at(&event, stamp()).await.unwrap();

        assert!(processed.summary.starts_with("Rows: 4, Columns: 4 "));
        assert!(processed.summary.contains("units (Numeric) - Min: 1.00, Max: 4.00, Mean: 2.50"));
        assert!(processed.summary.contains("revenue (Numeric) - Min: 10.00, Max: 40.00"));
        assert!(processed.summary.contains("region (Text) - Unique Values: 2, Most Common: north"));
        assert!(processed.summary.contains(
            "date (Date/Time) - Earliest: 2024-01-01 00:00:00, Latest: 2024-01-04 00:00:00"
        ));
        assert_eq!(processed.summary.matches("Strong correlation between").count(), 1);
        assert!(processed.summary.ends_with("Strong correlation between units and revenue"));

        assert_eq!(
            processed.destination.to_string(),
            "/processed_files/sales_data/sales_analyzed_20240102_030405.xlsx"
        );
        assert!(!dir.path().join("sales.xlsx").exists());
        let moved = dir
            .path()
            .join("processed_files/sales_data/sales_analyzed_20240102_030405.xlsx");
        assert_eq!(std::fs::read(moved).unwrap(), SALES_XLSX);
    }

    #[tokio::test]
    async fn test_malformed_bytes_leave_file_in_place() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.xlsx"), b"not a workbook").unwrap();
        let pipeline = pipeline(FixedModel, dir.path());

        let event = BlobEvent::new("broken.xlsx", b"not a workbook".to_vec());
        let result = pipeline.process(&event).await;

        assert!(matches!(result, Err(PipelineError::Dataset(_))));
        assert!(dir.path().join("broken.xlsx").exists());
        assert!(!dir.path().join("processed_files").exists());
    }

    #[tokio::test]
    async fn test_classifier_failure_leaves_file_in_place() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("report.xlsx"), b"placeholder").unwrap();
        let pipeline = pipeline(DownModel, dir.path());

        let result = pipeline.route("report.xlsx", &sales_dataset(), stamp()).await;

        assert!(matches!(result, Err(PipelineError::Classifier(_))));
        assert!(dir.path().join("report.xlsx").exists());
    }

    #[tokio::test]
    async fn test_second_file_with_same_stamp_is_not_overwritten() {
        let dir = tempdir().unwrap();
        let pipeline = pipeline(FixedModel, dir.path());

        std::fs::write(dir.path().join("report.xlsx"), b"first").unwrap();
        pipeline.route("report.xlsx", &sales_dataset(), stamp()).await.unwrap();

        std::fs::write(dir.path().join("report.xlsx"), b"second").unwrap();
        let result = pipeline.route("report.xlsx", &sales_dataset(), stamp()).await;

        assert!(matches!(
            result,
            Err(PipelineError::Storage(StorageError::DestinationExists { .. }))
        ));
        let moved = dir
            .path()
            .join("processed_files/sales_data/report_analyzed_20240102_030405.xlsx");
        assert_eq!(std::fs::read(moved).unwrap(), b"first");
    }
}
