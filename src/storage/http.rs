//! HTTP object store
//!
//! Stores objects with a single `PUT {endpoint}/{bucket}/{key}` request and
//! derives public URLs from a configurable public base.
//!
//! # Example
//!
//! ```no_run
//! use media_uploadr::storage::{HttpObjectStore, HttpStoreConfig, ObjectStore, StoreOptions};
//! use bytes::Bytes;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HttpObjectStore::new(HttpStoreConfig {
//!     endpoint: "http://localhost:9000".to_string(),
//!     public_base_url: Some("https://cdn.example.com".to_string()),
//!     token: None,
//!     timeout_secs: None,
//! })?;
//!
//! let stored = store
//!     .store("media", "image/u1-1.png", Bytes::from("..."), Some("image/png"), StoreOptions::default())
//!     .await?;
//! println!("{}", store.public_url("media", &stored.path));
//! # Ok(())
//! # }
//! ```

use super::{ObjectStore, StoreError, StoreOptions, StoredObject};
use async_trait::async_trait;
use bytes::Bytes;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;

/// Characters left as-is inside a key segment
const KEY_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// HTTP object store configuration
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    pub endpoint: String,
    /// Base for public URLs. Defaults to `endpoint`.
    pub public_base_url: Option<String>,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Per-request timeout enforced by the HTTP client
    pub timeout_secs: Option<u64>,
}

/// [`ObjectStore`] backed by an HTTP storage endpoint
pub struct HttpObjectStore {
    config: HttpStoreConfig,
    http_client: reqwest::Client,
}

impl HttpObjectStore {
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        if !(config.endpoint.starts_with("http://") || config.endpoint.starts_with("https://")) {
            return Err(StoreError::ConfigError(format!(
                "Invalid endpoint '{}': must start with http:// or https://",
                config.endpoint
            )));
        }

        let mut builder = reqwest::Client::builder();
        if let Some(secs) = config.timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder
            .build()
            .map_err(|e| StoreError::ConfigError(e.to_string()))?;

        Ok(Self {
            config,
            http_client,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.config.endpoint.trim_end_matches('/')
    }

    fn object_url(base: &str, bucket: &str, path: &str) -> String {
        let key = path
            .split('/')
            .map(|segment| utf8_percent_encode(segment, KEY_SEGMENT).to_string())
            .collect::<Vec<_>>()
            .join("/");
        format!(
            "{}/{}/{}",
            base.trim_end_matches('/'),
            utf8_percent_encode(bucket, KEY_SEGMENT),
            key
        )
    }
}

#[async_trait]
impl ObjectStore for HttpObjectStore {
    #[tracing::instrument(
        name = "storage.put_object",
        skip(self, body, options),
        fields(
            storage.bucket = %bucket,
            storage.key = %name,
            http.method = "PUT",
            upload.bytes = body.len(),
            http.status_code = tracing::field::Empty
        ),
        err
    )]
    async fn store(
        &self,
        bucket: &str,
        name: &str,
        body: Bytes,
        content_type: Option<&str>,
        options: StoreOptions,
    ) -> Result<StoredObject, StoreError> {
        let url = Self::object_url(self.endpoint(), bucket, name);

        let mut request = self.http_client.put(&url).body(body);
        if let Some(content_type) = content_type {
            request = request.header(reqwest::header::CONTENT_TYPE, content_type);
        }
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }
        if !options.overwrite_existing {
            // conditional write: refuse to replace an existing object
            request = request.header(reqwest::header::IF_NONE_MATCH, "*");
        }

        let response = request
            .send()
            .await
            .map_err(|e| StoreError::RequestError(e.to_string()))?;

        let status = response.status();
        tracing::Span::current().record("http.status_code", status.as_u16());

        if status.is_success() {
            let etag = response
                .headers()
                .get(reqwest::header::ETAG)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            tracing::info!(etag = ?etag, "PutObject completed");

            return Ok(StoredObject {
                path: name.to_string(),
                etag,
            });
        }

        let message = response.text().await.unwrap_or_default();
        match status.as_u16() {
            409 | 412 => Err(StoreError::AlreadyExists(name.to_string())),
            code => Err(StoreError::Rejected {
                status: code,
                message: if message.trim().is_empty() {
                    status.canonical_reason().unwrap_or("unknown").to_string()
                } else {
                    message
                },
            }),
        }
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        let base = self
            .config
            .public_base_url
            .as_deref()
            .unwrap_or(self.endpoint());
        Self::object_url(base, bucket, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(endpoint: &str) -> HttpStoreConfig {
        HttpStoreConfig {
            endpoint: endpoint.to_string(),
            public_base_url: None,
            token: None,
            timeout_secs: None,
        }
    }

    #[test]
    fn test_rejects_non_http_endpoint() {
        let result = HttpObjectStore::new(config("ftp://example.com"));
        assert!(matches!(result, Err(StoreError::ConfigError(_))));
    }

    #[test]
    fn test_public_url_defaults_to_endpoint() {
        let store = HttpObjectStore::new(config("http://localhost:9000/")).unwrap();
        assert_eq!(
            store.public_url("avatars", "avatar/u1-1.png"),
            "http://localhost:9000/avatars/avatar/u1-1.png"
        );
    }

    #[test]
    fn test_public_url_encodes_segments() {
        let mut cfg = config("http://localhost:9000");
        cfg.public_base_url = Some("https://cdn.example.com".into());
        let store = HttpObjectStore::new(cfg).unwrap();
        assert_eq!(
            store.public_url("media", "file/my report.pdf"),
            "https://cdn.example.com/media/file/my%20report.pdf"
        );
    }
}
