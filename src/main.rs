//! Media Uploadr - upload local files through a purpose policy
//!
//! Validates the given files against the policy for `--purpose`, uploads them
//! to the configured object store and prints the resulting public URLs.

use anyhow::Context;
use clap::Parser;
use media_uploadr::config::{Config, StorageBackend};
use media_uploadr::identity::SessionIdentity;
use media_uploadr::policy::{PolicyOverrides, Purpose};
use media_uploadr::storage::{HttpObjectStore, HttpStoreConfig, MemoryStore, ObjectStore};
use media_uploadr::upload::{SourceFile, UploadManager};
use media_uploadr::{metrics, notify::LogNotifier};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Media Uploadr - validate and upload files to object storage
#[derive(Parser, Debug)]
#[command(name = "media-uploadr")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). `RUST_LOG` takes precedence
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Upload purpose (avatar, image, video, file, media)
    #[arg(short, long, default_value = "file")]
    purpose: String,

    /// Destination bucket, overrides the purpose default
    #[arg(long)]
    bucket: Option<String>,

    /// Per-file size ceiling in bytes
    #[arg(long)]
    max_bytes: Option<u64>,

    /// Maximum number of files per batch
    #[arg(long)]
    max_items: Option<usize>,

    /// Accepted MIME pattern, e.g. "image/*,video/*"
    #[arg(long)]
    accept: Option<String>,

    /// User identifier used to namespace file names
    #[arg(long, conflicts_with = "session_token")]
    user: Option<String>,

    /// Session JWT; its subject namespaces file names
    #[arg(long)]
    session_token: Option<String>,

    /// Upload to an in-memory store instead of the configured backend
    #[arg(long)]
    dry_run: bool,

    /// Print a JSON summary instead of one URL per line
    #[arg(long)]
    json: bool,

    /// Print Prometheus metrics after the run
    #[arg(long)]
    print_metrics: bool,

    /// Files to upload
    #[arg(required = true)]
    files: Vec<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(log_filter(&args.log_level))
        .with_target(true)
        .with_writer(std::io::stderr)
        .json()
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting Media Uploadr v{}", media_uploadr::VERSION);

    let config = match &args.config {
        Some(path) => {
            let config = Config::load(path)?;
            info!("Loaded configuration from {:?}", path);
            config
        }
        None => Config::default(),
    };

    let store = build_store(&config, args.dry_run)?;
    let user_id = resolve_user(&config, &args)?;

    let cli_overrides = PolicyOverrides {
        bucket: args.bucket.clone(),
        max_items: args.max_items,
        max_bytes: args.max_bytes,
        accept: args.accept.clone(),
        ..Default::default()
    };
    let overrides = match args.purpose.parse::<Purpose>() {
        Ok(purpose) => config.policy_overrides(purpose).merged_with(&cli_overrides),
        Err(_) => cli_overrides,
    };

    let manager = UploadManager::builder(store)
        .purpose_tag(&args.purpose)
        .overrides(overrides)
        .settings(config.upload.clone())
        .notifier(Arc::new(LogNotifier))
        .user_id(user_id)
        .build();

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        files.push(read_source_file(path).await?);
    }

    let report = manager.add_files(files).await;

    let urls = match report.committed {
        Some(result) => vec![result?],
        None if report.accepted.is_empty() => Vec::new(),
        None => manager.upload_all().await?.urls,
    };

    if config.metrics.enabled && args.print_metrics {
        eprintln!("{}", metrics::render());
    }

    if args.json {
        let rejected: Vec<_> = report
            .rejected
            .iter()
            .map(|r| {
                serde_json::json!({
                    "file": r.file_name(),
                    "reason": r.reason(),
                    "message": r.to_string(),
                })
            })
            .collect();
        let summary = serde_json::json!({
            "purpose": manager.policy().purpose,
            "bucket": manager.policy().destination_bucket,
            "urls": urls,
            "rejected": rejected,
        });
        println!("{}", serde_json::to_string_pretty(&summary)?);
    }

    if urls.is_empty() {
        anyhow::bail!("no files were uploaded");
    }
    if !args.json {
        for url in &urls {
            println!("{}", url);
        }
    }

    Ok(())
}

fn build_store(config: &Config, dry_run: bool) -> anyhow::Result<Arc<dyn ObjectStore>> {
    if dry_run || config.storage.backend == StorageBackend::Memory {
        info!("Using in-memory object store");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let store = HttpObjectStore::new(HttpStoreConfig {
        endpoint: config.storage.endpoint.clone(),
        public_base_url: config.storage.public_base_url.clone(),
        token: config.storage.token.clone(),
        timeout_secs: config.storage.timeout_secs,
    })?;
    info!(endpoint = %store.endpoint(), "Using HTTP object store");
    Ok(Arc::new(store))
}

fn resolve_user(config: &Config, args: &Args) -> anyhow::Result<Option<String>> {
    if let Some(user) = &args.user {
        return Ok(Some(user.clone()));
    }
    let Some(token) = &args.session_token else {
        return Ok(None);
    };
    let identity = config
        .identity
        .as_ref()
        .context("--session-token requires an identity section in the configuration")?;
    Ok(Some(SessionIdentity::from_config(identity).user_id(token)?))
}

async fn read_source_file(path: &Path) -> anyhow::Result<SourceFile> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime_type = guess_mime(path);
    Ok(SourceFile::new(name, mime_type, data))
}

/// `RUST_LOG` when set, otherwise the `--log-level` value
fn log_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level))
}

/// MIME type from the file extension, `application/octet-stream` if unknown
fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
