//! Zero-Shot Model Client
//!
//! The classification model is a hosted black box: text plus candidate labels
//! in, ranked labels out. [`HuggingFaceZeroShot`] talks to the Hugging Face
//! inference API (default model `facebook/bart-large-mnli`).

use crate::config::ClassifierConfig;
use crate::http_client::build_client;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Errors from the classification capability
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("Classifier request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Classifier API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Malformed classifier response: {0}")]
    MalformedResponse(String),

    #[error("Classifier returned no known label (ranked: {ranked:?})")]
    NoKnownLabel { ranked: Vec<String> },

    #[error("A classifier is already installed")]
    AlreadyInstalled,

    #[error("No classifier has been installed")]
    NotInstalled,
}

/// One ranked label
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct LabelScore {
    pub label: String,
    pub score: f64,
}

/// Ranks candidate labels for a text
#[async_trait]
pub trait ZeroShotModel: Send + Sync {
    async fn rank(
        &self,
        text: &str,
        candidate_labels: &[&str],
    ) -> Result<Vec<LabelScore>, ClassifierError>;
}

/// Hugging Face inference API client
pub struct HuggingFaceZeroShot {
    client: Client,
    url: String,
    api_token: Option<String>,
}

impl HuggingFaceZeroShot {
    pub fn new(config: &ClassifierConfig) -> Result<Self, ClassifierError> {
        let client = build_client(Duration::from_secs(config.timeout_secs))?;
        let url = format!(
            "{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.model.trim_start_matches('/')
        );

        tracing::info!(url = %url, "Zero-shot classifier configured");

        Ok(Self {
            client,
            url,
            api_token: config.api_token.clone().filter(|t| !t.is_empty()),
        })
    }
}

#[async_trait]
impl ZeroShotModel for HuggingFaceZeroShot {
    async fn rank(
        &self,
        text: &str,
        candidate_labels: &[&str],
    ) -> Result<Vec<LabelScore>, ClassifierError> {
        let request = ZeroShotRequest {
            inputs: text,
            parameters: ZeroShotParameters { candidate_labels },
            options: RequestOptions {
                wait_for_model: true,
            },
        };

        let mut builder = self.client.post(&self.url).json(&request);
        if let Some(token) = &self.api_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClassifierError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let ranking = parse_ranking(&body)?;
        tracing::debug!(labels = ranking.len(), "Zero-shot ranking received");
        Ok(ranking)
    }
}

#[derive(Serialize)]
struct ZeroShotRequest<'a> {
    inputs: &'a str,
    parameters: ZeroShotParameters<'a>,
    options: RequestOptions,
}

#[derive(Serialize)]
struct ZeroShotParameters<'a> {
    candidate_labels: &'a [&'a str],
}

#[derive(Serialize)]
struct RequestOptions {
    wait_for_model: bool,
}

/// The API answers either with parallel arrays or a list of pairs
#[derive(Deserialize)]
#[serde(untagged)]
enum ZeroShotResponse {
    Columns {
        labels: Vec<String>,
        scores: Vec<f64>,
    },
    Pairs(Vec<LabelScore>),
}

/// Decode a response body into label/score pairs
pub fn parse_ranking(body: &str) -> Result<Vec<LabelScore>, ClassifierError> {
    let parsed: ZeroShotResponse = serde_json::from_str(body).map_err(|e| {
        ClassifierError::MalformedResponse(format!("{}. Content: {}", e, body))
    })?;

    match parsed {
        ZeroShotResponse::Columns { labels, scores } => {
            if labels.len() != scores.len() {
                return Err(ClassifierError::MalformedResponse(format!(
                    "{} labels but {} scores",
                    labels.len(),
                    scores.len()
                )));
            }
            Ok(labels
                .into_iter()
                .zip(scores)
                .map(|(label, score)| LabelScore { label, score })
                .collect())
        }
        ZeroShotResponse::Pairs(pairs) => Ok(pairs),
    }
}
