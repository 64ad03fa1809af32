//! CLI Tooling
//!
//! Command-line access to records, their content blobs and attachments.
//! Each invocation builds one client; `--offline` swaps the HTTP transport for
//! an in-process [`MemoryBackend`].

use crate::attachment::{AttachmentManager, AttachmentRef, UploadFile};
use crate::backend::{HttpTransport, MemoryBackend, NodeClient, NodeTransport};
use crate::config::{ConfigLoader, LoggingConfig, SyncConfig};
use crate::content::{ContentLocator, ContentSync};
use crate::error::ApiError;
use crate::executor::{CancellableExecutor, Settlement};
use crate::optimistic::OptimisticEngine;
use crate::records::{JsonRecord, Record, RecordGateway, RecordPage, RecordQuery};
use crate::store::RecordStore;
use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Vaultsync CLI - sharded content store client
#[derive(Parser)]
#[command(name = "vaultsync")]
#[command(about = "Read and write record content across storage nodes")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path (layered over the global config)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Run against an in-process backend instead of the configured node
    #[arg(long)]
    pub offline: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file, file+stderr, both)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (if output includes "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Apply `--log-*` flags on top of the configured logging section.
    pub fn logging_overrides(&self, base: &LoggingConfig) -> LoggingConfig {
        let mut config = base.clone();
        if let Some(level) = &self.log_level {
            config.level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.format = format.clone();
        }
        if let Some(output) = &self.log_output {
            config.output = output.clone();
        }
        if let Some(file) = &self.log_file {
            config.file = Some(file.clone());
        }
        config
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the content blob of a record
    Read {
        /// Entity name, e.g. ActivityVault
        entity: String,
        /// Record id
        id: String,
    },
    /// Write a content blob for a record, creating the record if needed
    Write {
        entity: String,
        id: String,
        /// Inline JSON content
        #[arg(long, conflicts_with = "file")]
        data: Option<String>,
        /// Read JSON content from a file
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Upload a file to the default node
    Upload {
        path: PathBuf,
        /// Display label (defaults to the file name)
        #[arg(long)]
        label: Option<String>,
    },
    /// Delete an uploaded file from the node that stores it
    Remove {
        file_id: String,
        /// Node holding the file
        #[arg(long)]
        node: Option<String>,
    },
    /// List records of an entity
    List {
        entity: String,
        #[arg(long, default_value = "1")]
        page: u32,
        #[arg(long, default_value = "20")]
        page_size: u32,
        #[arg(long)]
        search: Option<String>,
        /// Output format (text or json)
        #[arg(long, default_value = "text")]
        format: String,
    },
    /// Show the effective configuration
    Config,
}

/// Shared state for executing CLI commands.
pub struct CliContext {
    config: SyncConfig,
    client: Arc<NodeClient>,
    offline: Option<Arc<MemoryBackend>>,
    list_stream: CancellableExecutor,
    runtime: tokio::runtime::Runtime,
}

impl CliContext {
    pub fn new(config_path: Option<PathBuf>, offline: bool) -> Result<Self, ApiError> {
        let config = ConfigLoader::load(config_path.as_deref())?;
        Self::with_config(config, offline)
    }

    pub fn with_config(config: SyncConfig, offline: bool) -> Result<Self, ApiError> {
        config.validate()?;
        let default_node = config.backend.default_node_url.clone();

        let (transport, offline): (Arc<dyn NodeTransport>, Option<Arc<MemoryBackend>>) =
            if offline {
                let backend = Arc::new(MemoryBackend::new(default_node.clone()));
                (backend.clone(), Some(backend))
            } else {
                (Arc::new(HttpTransport::new(&config.backend)?), None)
            };

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()?;

        Ok(Self {
            client: Arc::new(NodeClient::new(transport, default_node)),
            list_stream: CancellableExecutor::from_config(&config.executor),
            config,
            offline,
            runtime,
        })
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// The in-process backend when running `--offline`.
    pub fn offline_backend(&self) -> Option<&Arc<MemoryBackend>> {
        self.offline.as_ref()
    }

    pub fn execute(&self, command: &Commands) -> Result<String, ApiError> {
        self.runtime.block_on(self.execute_async(command))
    }

    async fn execute_async(&self, command: &Commands) -> Result<String, ApiError> {
        match command {
            Commands::Read { entity, id } => self.handle_read(entity, id).await,
            Commands::Write {
                entity,
                id,
                data,
                file,
            } => {
                let blob = parse_blob(data.as_deref(), file.as_deref())?;
                self.handle_write(entity, id, &blob).await
            }
            Commands::Upload { path, label } => self.handle_upload(path, label.as_deref()).await,
            Commands::Remove { file_id, node } => {
                let manager = AttachmentManager::new(self.client.clone());
                let reclaimed = manager
                    .remove(&AttachmentRef {
                        file_id: file_id.clone(),
                        node_url: node.clone(),
                        mime_type: String::new(),
                        label: String::new(),
                        preview_url: None,
                    })
                    .await;
                Ok(if reclaimed {
                    format!("Removed {}", file_id)
                } else {
                    format!("Could not reclaim {} (see log)", file_id)
                })
            }
            Commands::List {
                entity,
                page,
                page_size,
                search,
                format,
            } => {
                let query = RecordQuery {
                    page: *page,
                    page_size: *page_size,
                    search: search.clone().filter(|s| !s.trim().is_empty()),
                };
                let page = self.fetch_page(entity, query).await?;
                Ok(match format.as_str() {
                    "json" => format_page_json(&page),
                    _ => format_page_text(entity, &page),
                })
            }
            Commands::Config => {
                let rendered = toml::to_string_pretty(&self.config)
                    .map_err(|e| ApiError::Serialization(e.to_string()))?;
                let global = ConfigLoader::global_config_path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| "(unavailable)".to_string());
                Ok(format!("# global config: {}\n{}", global, rendered))
            }
        }
    }

    fn gateway(&self, entity: &str) -> Arc<RecordGateway<JsonRecord>> {
        Arc::new(RecordGateway::new(self.client.clone(), entity))
    }

    /// Find a record by id through the paginated search endpoint.
    ///
    /// The search is a substring match, so every page is walked until the
    /// exact id turns up or the results run out.
    async fn find_record(&self, entity: &str, id: &str) -> Result<Option<JsonRecord>, ApiError> {
        let gateway = self.gateway(entity);
        let mut query = RecordQuery::search(id);
        loop {
            let page = gateway.fetch_page(&query).await?;
            let has_more = page.has_more() && !page.items.is_empty();
            if let Some(record) = page.items.into_iter().find(|r| r.id() == id) {
                return Ok(Some(record));
            }
            if !has_more {
                return Ok(None);
            }
            debug!(entity, id, page = query.page, "Record not on this page, fetching next");
            query.page += 1;
        }
    }

    async fn handle_read(&self, entity: &str, id: &str) -> Result<String, ApiError> {
        let record = self
            .find_record(entity, id)
            .await?
            .ok_or_else(|| ApiError::RecordNotFound(id.to_string()))?;
        let locator = ContentLocator::new(self.client.clone());
        let blob: Option<Value> = locator.read_content(record.content_ref()).await?;
        match blob {
            Some(blob) => serde_json::to_string_pretty(&blob)
                .map_err(|e| ApiError::Serialization(e.to_string())),
            None => Ok(format!("{} {} has no content yet", entity, id)),
        }
    }

    async fn handle_write(&self, entity: &str, id: &str, blob: &Value) -> Result<String, ApiError> {
        let record = match self.find_record(entity, id).await? {
            Some(record) => record,
            None => JsonRecord::from_value(json!({ "id": id }))?,
        };
        let engine = OptimisticEngine::new(RecordStore::with_records(vec![record]));
        let sync = ContentSync::new(
            Arc::new(ContentLocator::new(self.client.clone())),
            self.gateway(entity),
            self.config.sync.clone(),
        );
        let content_ref = sync.commit(&engine, id, blob).await?;
        info!(entity, id, content_ref = %content_ref, "Content written");
        Ok(format!("Wrote {} {} -> {}", entity, id, content_ref))
    }

    async fn handle_upload(&self, path: &Path, label: Option<&str>) -> Result<String, ApiError> {
        let file = UploadFile::from_path(path)?;
        let label = label.unwrap_or(&file.file_name).to_string();
        let uploaded = AttachmentManager::new(self.client.clone())
            .upload(&file, &label)
            .await?;
        Ok(format!(
            "Uploaded {} as {}@{} ({})",
            label, uploaded.file_id, uploaded.node_url, uploaded.mime_type
        ))
    }

    /// Run the search on the list stream so a newer listing supersedes an older one.
    async fn fetch_page(
        &self,
        entity: &str,
        query: RecordQuery,
    ) -> Result<RecordPage<JsonRecord>, ApiError> {
        let gateway = self.gateway(entity);
        let outcome: Arc<Mutex<Option<Result<RecordPage<JsonRecord>, ApiError>>>> =
            Arc::new(Mutex::new(None));
        let on_success = {
            let outcome = outcome.clone();
            move |page| *outcome.lock() = Some(Ok(page))
        };
        let on_error = {
            let outcome = outcome.clone();
            move |err| *outcome.lock() = Some(Err(err))
        };

        let handle = self.list_stream.run(
            move |_token| async move { gateway.fetch_page(&query).await },
            on_success,
            on_error,
        );
        match handle.settled().await {
            Settlement::Superseded => Err(ApiError::Superseded),
            _ => outcome.lock().take().unwrap_or(Err(ApiError::Superseded)),
        }
    }
}

fn parse_blob(data: Option<&str>, file: Option<&Path>) -> Result<Value, ApiError> {
    let text = match (data, file) {
        (Some(data), _) => data.to_string(),
        (None, Some(path)) => std::fs::read_to_string(path)?,
        (None, None) => {
            return Err(ApiError::ConfigError(
                "write needs --data or --file".to_string(),
            ))
        }
    };
    serde_json::from_str(&text).map_err(|e| ApiError::Serialization(format!("content: {}", e)))
}

fn format_page_text(entity: &str, page: &RecordPage<JsonRecord>) -> String {
    if page.items.is_empty() {
        return format!("No {} records", entity);
    }
    let mut lines = vec![format!(
        "{} records (page {}, {} total)",
        entity, page.page, page.total_count
    )];
    for record in &page.items {
        lines.push(format!("  {:<24} {}", record.id(), record.content_ref()));
    }
    if page.has_more() {
        lines.push(format!("  ... more on page {}", page.page + 1));
    }
    lines.join("\n")
}

fn format_page_json(page: &RecordPage<JsonRecord>) -> String {
    json!({
        "page": page.page,
        "page_size": page.page_size,
        "total_count": page.total_count,
        "has_more": page.has_more(),
        "items": page.items,
    })
    .to_string()
}
