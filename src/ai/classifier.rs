//! Category classifier and its process-wide handle

use super::labels::Category;
use super::zero_shot::{ClassifierError, LabelScore, ZeroShotModel};
use once_cell::sync::OnceCell;
use std::sync::Arc;

static GLOBAL_CLASSIFIER: OnceCell<Arc<Classifier>> = OnceCell::new();

/// Wraps a zero-shot model and always answers with one [`Category`]
pub struct Classifier {
    model: Box<dyn ZeroShotModel>,
}

impl Classifier {
    pub fn new(model: impl ZeroShotModel + 'static) -> Self {
        Self {
            model: Box::new(model),
        }
    }

    /// Install the process-wide classifier. Only the first call succeeds.
    pub fn install(classifier: Classifier) -> Result<(), ClassifierError> {
        GLOBAL_CLASSIFIER
            .set(Arc::new(classifier))
            .map_err(|_| ClassifierError::AlreadyInstalled)
    }

    /// The installed classifier, if any
    pub fn global() -> Option<Arc<Classifier>> {
        GLOBAL_CLASSIFIER.get().cloned()
    }

    /// Classify a summary into exactly one category
    pub async fn classify(&self, text: &str) -> Result<Category, ClassifierError> {
        let candidates = Category::candidate_labels();
        let ranking = self.model.rank(text, &candidates).await?;
        let category = best_category(&ranking)?;

        tracing::debug!(category = %category, "Classified summary");
        Ok(category)
    }
}

/// Highest-scoring label from the vocabulary.
/// Unknown labels are skipped; equal scores keep the earlier entry.
pub fn best_category(ranking: &[LabelScore]) -> Result<Category, ClassifierError> {
    let mut best: Option<(Category, f64)> = None;

    for entry in ranking {
        let Some(category) = Category::from_label(&entry.label) else {
            tracing::warn!(label = %entry.label, "Ignoring label outside the candidate set");
            continue;
        };
        if best.map_or(true, |(_, score)| entry.score > score) {
            best = Some((category, entry.score));
        }
    }

    best.map(|(category, _)| category)
        .ok_or_else(|| ClassifierError::NoKnownLabel {
            ranked: ranking.iter().map(|e| e.label.clone()).collect(),
        })
}
