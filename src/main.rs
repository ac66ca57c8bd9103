//! sheet-sorter: classify new spreadsheets and file them by category.

use clap::Parser;
use sheet_sorter::ai::{Classifier, ClassifierError, HuggingFaceZeroShot};
use sheet_sorter::config::{AppConfig, ConfigError, GraphCredentials, StorageBackend};
use sheet_sorter::pipeline::{BlobEvent, Pipeline, PipelineError};
use sheet_sorter::services::{watch_inbox, WatcherError};
use sheet_sorter::storage::{GraphStorage, LocalStorage, StorageError, StorageMover};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Sort incoming spreadsheets into category folders
#[derive(Parser, Debug)]
#[command(name = "sheet-sorter", version, about, long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./sheet-sorter.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Watch the inbox and process new spreadsheets (default)
    Watch {
        /// Override the configured inbox folder
        #[arg(long)]
        inbox: Option<PathBuf>,
    },
    /// Process one spreadsheet inside the inbox and exit
    Process {
        file: PathBuf,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Watcher(#[from] WatcherError),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    #[error("{}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("{} is not inside {}", file.display(), root.display())]
    OutsideRoot { file: PathBuf, root: PathBuf },
}

#[tokio::main]
async fn main() -> ExitCode {
    sheet_sorter::load_env();
    let cli = Cli::parse();
    sheet_sorter::init_tracing();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "sheet-sorter failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(Commands::Watch { inbox: Some(inbox) }) = &cli.command {
        config.inbox_dir = inbox.clone();
    }

    let app = App::start(&config)?;

    match cli.command {
        Some(Commands::Process { file }) => app.process_file(&file).await,
        Some(Commands::Watch { .. }) | None => app.watch().await,
    }
}

struct App {
    pipeline: Pipeline,
    inbox: PathBuf,
    /// Inbox location relative to the storage root, `/`-separated
    inbox_prefix: String,
}

impl App {
    /// Validate secrets, install the classifier and build storage before any event
    fn start(config: &AppConfig) -> Result<Self, CliError> {
        let inbox = canonical(&config.inbox_dir)?;

        let (storage, inbox_prefix): (Arc<dyn StorageMover>, String) = match config.storage.backend {
            StorageBackend::Graph => {
                let credentials = GraphCredentials::from_env()?;
                tracing::info!(drive = %config.storage.graph.drive, "Using Microsoft Graph storage");
                let storage = GraphStorage::new(config.storage.graph.clone(), credentials)?;
                (Arc::new(storage), String::new())
            }
            StorageBackend::Local => {
                let root = canonical(config.local_root())?;
                let prefix = relative_name(&inbox, &root)?;
                tracing::info!(root = %root.display(), "Using local storage");
                (Arc::new(LocalStorage::new(root)), prefix)
            }
        };

        let model = HuggingFaceZeroShot::new(&config.classifier)?;
        Classifier::install(Classifier::new(model))?;
        let classifier = Classifier::global().ok_or(ClassifierError::NotInstalled)?;

        Ok(Self {
            pipeline: Pipeline::new(classifier, storage, config.output_root()),
            inbox,
            inbox_prefix,
        })
    }

    async fn process_file(&self, file: &Path) -> Result<(), CliError> {
        let file = canonical(file)?;
        let name = relative_name(&file, &self.inbox)?;
        let bytes = tokio::fs::read(&file).await.map_err(|source| CliError::Io {
            path: file.clone(),
            source,
        })?;

        let event = BlobEvent::new(name, bytes);
        self.handle(event).await?;
        Ok(())
    }

    async fn watch(&self) -> Result<(), CliError> {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let _watcher = watch_inbox(&self.inbox, tx)?;

        loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    // Failures are per file; keep watching
                    if let Err(e) = self.handle(event).await {
                        tracing::error!(error = %e, "Failed to process file");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutting down");
                    return Ok(());
                }
            }
        }
    }

    /// Rebase an inbox-relative event onto the storage root and run it
    async fn handle(&self, mut event: BlobEvent) -> Result<(), PipelineError> {
        if !self.inbox_prefix.is_empty() {
            event.name = format!("{}/{}", self.inbox_prefix, event.name);
        }

        let processed = self.pipeline.process(&event).await?;
        tracing::debug!(event_id = %event.id, category = %processed.category, "Event complete");
        Ok(())
    }
}

fn canonical(path: &Path) -> Result<PathBuf, CliError> {
    path.canonicalize().map_err(|source| CliError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// `/`-separated path of `path` below `root` (empty when they are equal)
fn relative_name(path: &Path, root: &Path) -> Result<String, CliError> {
    let relative = path.strip_prefix(root).map_err(|_| CliError::OutsideRoot {
        file: path.to_path_buf(),
        root: root.to_path_buf(),
    })?;

    Ok(relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/"))
}
