//! Media Uploadr Library
//!
//! Policy-driven upload manager for agent avatars, news images, videos and
//! media galleries backed by an object store.
//!
//! # Features
//!
//! - **Purpose Policies**: bucket, size ceiling, accepted types and item count per purpose
//! - **Per-Item Lifecycle**: `pending → uploading → completed | error`, with synthetic progress
//! - **Batch Commit**: concurrent transfers, partial success kept, order-preserving results
//! - **Auto-Commit**: single-file purposes (avatars) upload as soon as they are selected
//! - **Cancellation & Timeouts**: removing an item aborts its transfer; hung transfers fail
//!
//! # Example
//!
//! ```no_run
//! use media_uploadr::policy::Purpose;
//! use media_uploadr::storage::{HttpObjectStore, HttpStoreConfig};
//! use media_uploadr::upload::{SourceFile, UploadManager};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = HttpObjectStore::new(HttpStoreConfig {
//!         endpoint: "http://localhost:9000".into(),
//!         public_base_url: None,
//!         token: None,
//!         timeout_secs: Some(60),
//!     })?;
//!     let manager = UploadManager::builder(Arc::new(store))
//!         .purpose(Purpose::Media)
//!         .build();
//!
//!     manager
//!         .add_files(vec![SourceFile::new("team.png", "image/png", std::fs::read("team.png")?)])
//!         .await;
//!     let outcome = manager.upload_all().await?;
//!     println!("{:?}", outcome.urls);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod events;
pub mod identity;
pub mod metrics;
pub mod notify;
pub mod policy;
pub mod storage;
pub mod upload;

// Re-export commonly used types
pub use config::Config;
pub use policy::{Purpose, UploadPolicy};
pub use upload::{SourceFile, UploadManager};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
