//! Microsoft Graph (OneDrive) storage backend
//!
//! Authenticates with the OAuth2 client-credentials flow and addresses drive
//! items by path (`{drive}/root:/{path}:`). Folder creation walks the path one
//! segment at a time; a 409 on create means the segment already exists.

use super::{path_segments, StorageError, StorageMover};
use crate::config::{GraphConfig, GraphCredentials};
use crate::http_client::graph_client;
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const GRAPH_SCOPE: &str = "https://graph.microsoft.com/.default";

/// Refresh tokens this long before they expire
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

struct AccessToken {
    value: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Drive storage reached through Microsoft Graph
pub struct GraphStorage {
    client: &'static Client,
    config: GraphConfig,
    credentials: GraphCredentials,
    token: Mutex<Option<AccessToken>>,
}

impl GraphStorage {
    pub fn new(config: GraphConfig, credentials: GraphCredentials) -> Result<Self, StorageError> {
        Ok(Self {
            client: graph_client()?,
            config,
            credentials,
            token: Mutex::new(None),
        })
    }

    /// Cached bearer token, refreshed shortly before expiry
    async fn access_token(&self) -> Result<String, StorageError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > Instant::now() + TOKEN_REFRESH_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let url = format!(
            "{}/{}/oauth2/v2.0/token",
            self.config.authority.trim_end_matches('/'),
            self.credentials.tenant_id
        );

        let response = self
            .client
            .post(&url)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("scope", GRAPH_SCOPE),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(StorageError::Auth(format!(
                "token request failed ({}): {}",
                status, text
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| StorageError::Auth(format!("Failed to parse token response: {}", e)))?;

        tracing::debug!(expires_in = token.expires_in, "Acquired Graph access token");

        let value = token.access_token.clone();
        *cached = Some(AccessToken {
            value: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(token.expires_in),
        });

        Ok(value)
    }

    /// `{base}/{drive}/root` for the root itself, `{base}/{drive}/root:/a/b:` for an item,
    /// with an optional trailing segment such as `children`
    fn item_url(&self, segments: &[&str], tail: Option<&str>) -> Result<Url, StorageError> {
        let base = format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.drive.trim_matches('/')
        );
        let mut url = Url::parse(&base).map_err(|e| StorageError::InvalidUrl(format!("{}: {}", base, e)))?;

        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| StorageError::InvalidUrl(base.clone()))?;
            path.pop_if_empty();

            match segments.split_last() {
                None => {
                    path.push("root");
                }
                Some((last, parents)) => {
                    path.push("root:");
                    path.extend(parents);
                    path.push(&format!("{}:", last));
                }
            }

            if let Some(tail) = tail {
                path.push(tail);
            }
        }

        Ok(url)
    }

    /// Look up an item and report whether it is a folder
    async fn is_folder(&self, segments: &[&str]) -> Result<bool, StorageError> {
        let token = self.access_token().await?;
        let response = self
            .client
            .get(self.item_url(segments, None)?)
            .bearer_auth(token)
            .send()
            .await?;

        let response = check_status(response).await?;
        let item: Value = response.json().await?;
        Ok(item.get("folder").is_some())
    }
}

#[async_trait]
impl StorageMover for GraphStorage {
    async fn create_folder(&self, path: &str) -> Result<(), StorageError> {
        let segments = path_segments(path)?;

        for depth in 0..segments.len() {
            let parent = &segments[..depth];
            let name = segments[depth];
            let token = self.access_token().await?;

            let response = self
                .client
                .post(self.item_url(parent, Some("children"))?)
                .bearer_auth(token)
                .json(&folder_request(name))
                .send()
                .await?;

            if response.status() == StatusCode::CONFLICT {
                if !self.is_folder(&segments[..=depth]).await? {
                    return Err(StorageError::NotAFolder {
                        path: segments[..=depth].join("/"),
                    });
                }
                continue;
            }

            check_status(response).await?;
            tracing::debug!(folder = %segments[..=depth].join("/"), "Created drive folder");
        }

        Ok(())
    }

    async fn move_item(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let source = path_segments(from)?;
        let destination = path_segments(to)?;
        let token = self.access_token().await?;

        let response = self
            .client
            .patch(self.item_url(&source, None)?)
            .bearer_auth(token)
            .json(&move_request(&destination))
            .send()
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => Err(StorageError::SourceNotFound {
                path: from.to_string(),
            }),
            StatusCode::CONFLICT => Err(StorageError::DestinationExists {
                path: to.to_string(),
            }),
            _ => {
                check_status(response).await?;
                tracing::debug!(from = %from, to = %to, "Moved drive item");
                Ok(())
            }
        }
    }
}

/// Body for creating one folder under a parent
fn folder_request(name: &str) -> Value {
    json!({
        "name": name,
        "folder": {},
        "@microsoft.graph.conflictBehavior": "fail",
    })
}

/// Body for moving an item to `destination` (parent folders + new name)
fn move_request(destination: &[&str]) -> Value {
    let (name, parents) = match destination.split_last() {
        Some((name, parents)) => (*name, parents),
        None => ("", &[][..]),
    };

    let parent_path = if parents.is_empty() {
        "/drive/root".to_string()
    } else {
        format!("/drive/root:/{}", parents.join("/"))
    };

    json!({
        "parentReference": { "path": parent_path },
        "name": name,
    })
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, StorageError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let message = response.text().await.unwrap_or_default();
    Err(StorageError::Api {
        status: status.as_u16(),
        message,
    })
}
