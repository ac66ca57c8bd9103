//! Configuration
//!
//! Uses `figment` for layered configuration: defaults -> TOML file -> environment.
//! Environment keys are prefixed `SHEET_SORTER_` and nest with `__`, e.g.
//! `SHEET_SORTER_STORAGE__BACKEND=local`.
//!
//! Graph credentials are read separately from `TENANT_ID`, `CLIENT_ID` and
//! `CLIENT_SECRET` and validated once at startup.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Config file picked up from the working directory when `--config` is absent
pub const DEFAULT_CONFIG_FILE: &str = "sheet-sorter.toml";

const ENV_PREFIX: &str = "SHEET_SORTER_";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable {0}")]
    MissingSecret(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Figment(#[from] Box<figment::Error>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Folder watched for new spreadsheets
    pub inbox_dir: PathBuf,
    /// Folder (relative to the storage root) that receives categorized files
    pub output_root: String,
    pub storage: StorageConfig,
    pub classifier: ClassifierConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            inbox_dir: PathBuf::from("inbox"),
            output_root: "processed_files".to_string(),
            storage: StorageConfig::default(),
            classifier: ClassifierConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Graph,
    Local,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Root for the local backend. Defaults to the inbox folder.
    pub local_root: Option<PathBuf>,
    pub graph: GraphConfig,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Graph,
            local_root: None,
            graph: GraphConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    pub base_url: String,
    /// Drive selector, `users/{id}/drive` or `drives/{id}`. App-only tokens cannot use `me/`.
    pub drive: String,
    pub authority: String,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            base_url: "https://graph.microsoft.com/v1.0".to_string(),
            drive: String::new(),
            authority: "https://login.microsoftonline.com".to_string(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    pub endpoint: String,
    pub model: String,
    pub api_token: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://router.huggingface.co/hf-inference/models".to_string(),
            model: "facebook/bart-large-mnli".to_string(),
            api_token: None,
            timeout_secs: 120,
        }
    }
}

impl fmt::Debug for ClassifierConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassifierConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load defaults, then the TOML file, then `SHEET_SORTER_*` variables
    pub fn load(config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(AppConfig::default()));

        match config_file {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Invalid(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => {
                if Path::new(DEFAULT_CONFIG_FILE).exists() {
                    figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE));
                }
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__"));

        Self::from_figment(figment)
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: AppConfig = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let root = self.output_root.trim_matches('/');
        if root.is_empty() {
            return Err(ConfigError::Invalid("output_root must not be empty".to_string()));
        }
        if root.split('/').any(|segment| segment == "..") {
            return Err(ConfigError::Invalid(
                "output_root must not contain '..'".to_string(),
            ));
        }
        if self.classifier.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "classifier.timeout_secs must be positive".to_string(),
            ));
        }
        if self.classifier.endpoint.trim().is_empty() || self.classifier.model.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "classifier.endpoint and classifier.model are required".to_string(),
            ));
        }
        if self.storage.backend == StorageBackend::Graph {
            self.storage.graph.validate()?;
        }
        if self.storage.backend == StorageBackend::Local && self.local_root().as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "storage.local_root (or inbox_dir) is required for the local backend".to_string(),
            ));
        }
        Ok(())
    }

    /// Output root without surrounding slashes
    pub fn output_root(&self) -> &str {
        self.output_root.trim_matches('/')
    }

    /// Root directory used by the local storage backend
    pub fn local_root(&self) -> &Path {
        self.storage.local_root.as_deref().unwrap_or(self.inbox_dir.as_path())
    }
}

impl GraphConfig {
    /// The drive must be addressable with a client-credentials token
    pub fn validate(&self) -> Result<(), ConfigError> {
        let drive = self.drive.trim_matches('/');
        if drive.is_empty() {
            return Err(ConfigError::Invalid(
                "storage.graph.drive is required for the graph backend \
                 (users/{id}/drive or drives/{id})"
                    .to_string(),
            ));
        }
        if drive == "me" || drive.starts_with("me/") {
            return Err(ConfigError::Invalid(format!(
                "storage.graph.drive {:?} needs a signed-in user; \
                 app credentials must use users/{{id}}/drive or drives/{{id}}",
                self.drive
            )));
        }
        Ok(())
    }
}

/// Client-credential secrets for Microsoft Graph
#[derive(Clone)]
pub struct GraphCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
}

impl GraphCredentials {
    /// Read `TENANT_ID`, `CLIENT_ID` and `CLIENT_SECRET` from the environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Populate from any key lookup. Empty values count as missing.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let require = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::MissingSecret(key))
        };

        Ok(Self {
            tenant_id: require("TENANT_ID")?,
            client_id: require("CLIENT_ID")?,
            client_secret: require("CLIENT_SECRET")?,
        })
    }
}

impl fmt::Debug for GraphCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphCredentials")
            .field("tenant_id", &self.tenant_id)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn graph_config(drive: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.storage.graph.drive = drive.to_string();
        config
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.output_root(), "processed_files");
        assert_eq!(config.storage.backend, StorageBackend::Graph);
        assert_eq!(config.local_root(), Path::new("inbox"));

        assert!(graph_config("users/42/drive").validate().is_ok());
    }

    #[test]
    fn test_graph_drive_is_required() {
        let result = AppConfig::default().validate();
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("storage.graph.drive")));
    }

    #[test]
    fn test_graph_drive_rejects_signed_in_user() {
        for drive in ["me/drive", "/me/drive", "me", "me/drives/abc"] {
            let result = graph_config(drive).validate();
            assert!(
                matches!(&result, Err(ConfigError::Invalid(msg)) if msg.contains("users/{id}/drive")),
                "{drive} accepted"
            );
        }

        assert!(graph_config("drives/b!abc").validate().is_ok());
        assert!(graph_config("users/me@contoso.com/drive").validate().is_ok());
    }

    #[test]
    fn test_local_backend_ignores_graph_drive() {
        let mut config = graph_config("me/drive");
        config.storage.backend = StorageBackend::Local;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let figment = Figment::from(Serialized::defaults(AppConfig::default())).merge(
            Toml::string(
                r#"
                output_root = "/sorted/"

                [storage]
                backend = "local"
                local_root = "/srv/drive"

                [classifier]
                timeout_secs = 30
                "#,
            ),
        );

        let config = AppConfig::from_figment(figment).unwrap();

        assert_eq!(config.output_root(), "sorted");
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.local_root(), Path::new("/srv/drive"));
        assert_eq!(config.classifier.timeout_secs, 30);
        assert_eq!(config.classifier.model, "facebook/bart-large-mnli");
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = graph_config("drives/abc");
        config.output_root = "/".to_string();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        let mut config = graph_config("drives/abc");
        config.output_root = "../escape".to_string();
        assert!(config.validate().is_err());

        let mut config = graph_config("drives/abc");
        config.classifier.timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Local;
        config.inbox_dir = PathBuf::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_config_file_is_error() {
        let result = AppConfig::load(Some(Path::new("/nonexistent/sheet-sorter.toml")));
        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_credentials_complete() {
        let creds = GraphCredentials::from_lookup(lookup(&[
            ("TENANT_ID", "tenant"),
            ("CLIENT_ID", "client"),
            ("CLIENT_SECRET", "s3cret"),
        ]))
        .unwrap();

        assert_eq!(creds.tenant_id, "tenant");
        assert!(!format!("{:?}", creds).contains("s3cret"));
    }

    #[test]
    fn test_each_missing_secret_is_fatal() {
        let all = [
            ("TENANT_ID", "tenant"),
            ("CLIENT_ID", "client"),
            ("CLIENT_SECRET", "secret"),
        ];

        for missing in ["TENANT_ID", "CLIENT_ID", "CLIENT_SECRET"] {
            let present: Vec<(&str, &str)> =
                all.iter().copied().filter(|(k, _)| *k != missing).collect();
            let result = GraphCredentials::from_lookup(lookup(&present));
            assert!(matches!(result, Err(ConfigError::MissingSecret(key)) if key == missing));
        }
    }

    #[test]
    fn test_blank_secret_counts_as_missing() {
        let result = GraphCredentials::from_lookup(lookup(&[
            ("TENANT_ID", "tenant"),
            ("CLIENT_ID", "  "),
            ("CLIENT_SECRET", "secret"),
        ]));
        assert!(matches!(result, Err(ConfigError::MissingSecret("CLIENT_ID"))));
    }
}
