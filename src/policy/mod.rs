//! Upload policies
//!
//! Maps a caller-declared purpose (avatar, image, video, generic file, mixed
//! media) to the constraints every selected file is checked against.
//!
//! # Example
//!
//! ```
//! use media_uploadr::policy::{self, PolicyOverrides, Purpose};
//!
//! let overrides = PolicyOverrides {
//!     max_bytes: Some(1024 * 1024),
//!     ..Default::default()
//! };
//! let policy = policy::resolve(Purpose::Avatar, &overrides);
//! assert_eq!(policy.max_bytes, 1024 * 1024);
//! assert!(policy.auto_commit);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

mod accept;

pub use accept::AcceptPattern;

const MB: u64 = 1024 * 1024;

/// Caller-declared intent that selects default upload constraints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Avatar,
    Image,
    Video,
    File,
    Media,
}

impl Purpose {
    pub const ALL: [Purpose; 5] = [
        Purpose::Avatar,
        Purpose::Image,
        Purpose::Video,
        Purpose::File,
        Purpose::Media,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Purpose::Avatar => "avatar",
            Purpose::Image => "image",
            Purpose::Video => "video",
            Purpose::File => "file",
            Purpose::Media => "media",
        }
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unknown purpose tag
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown upload purpose: {0}")]
pub struct UnknownPurpose(pub String);

impl FromStr for Purpose {
    type Err = UnknownPurpose;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "avatar" => Ok(Purpose::Avatar),
            "image" => Ok(Purpose::Image),
            "video" => Ok(Purpose::Video),
            "file" => Ok(Purpose::File),
            "media" => Ok(Purpose::Media),
            other => Err(UnknownPurpose(other.to_string())),
        }
    }
}

/// Resolved upload constraints, fixed for the lifetime of a manager
#[derive(Debug, Clone, PartialEq)]
pub struct UploadPolicy {
    pub purpose: Purpose,
    pub destination_bucket: String,
    pub allow_multiple: bool,
    pub max_items: usize,
    pub max_bytes: u64,
    pub accept: AcceptPattern,
    /// Upload immediately on selection instead of waiting for `upload_all`
    pub auto_commit: bool,
    pub overwrite_existing: bool,
}

/// Caller-supplied overrides, applied field by field over the purpose default
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyOverrides {
    #[serde(default)]
    pub bucket: Option<String>,
    #[serde(default)]
    pub allow_multiple: Option<bool>,
    #[serde(default)]
    pub max_items: Option<usize>,
    #[serde(default)]
    pub max_bytes: Option<u64>,
    #[serde(default)]
    pub accept: Option<String>,
    #[serde(default)]
    pub auto_commit: Option<bool>,
    #[serde(default)]
    pub overwrite_existing: Option<bool>,
}

impl PolicyOverrides {
    /// Layer `other` on top of `self`; fields set in `other` win.
    #[must_use]
    pub fn merged_with(&self, other: &PolicyOverrides) -> PolicyOverrides {
        PolicyOverrides {
            bucket: other.bucket.clone().or_else(|| self.bucket.clone()),
            allow_multiple: other.allow_multiple.or(self.allow_multiple),
            max_items: other.max_items.or(self.max_items),
            max_bytes: other.max_bytes.or(self.max_bytes),
            accept: other.accept.clone().or_else(|| self.accept.clone()),
            auto_commit: other.auto_commit.or(self.auto_commit),
            overwrite_existing: other.overwrite_existing.or(self.overwrite_existing),
        }
    }
}

/// Why a file was not admitted to the batch
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("{name} is too large ({size} bytes, limit is {limit} bytes)")]
    TooLarge { name: String, size: u64, limit: u64 },

    #[error("{name} has type '{mime}', accepted types are '{accept}'")]
    TypeNotAccepted {
        name: String,
        mime: String,
        accept: String,
    },

    #[error("{name} was not added: at most {max} files can be uploaded at once")]
    LimitExceeded { name: String, max: usize },

    #[error("{name} was not added: an upload is already in progress")]
    Busy { name: String },
}

impl Rejection {
    /// Name of the rejected file
    pub fn file_name(&self) -> &str {
        match self {
            Rejection::TooLarge { name, .. }
            | Rejection::TypeNotAccepted { name, .. }
            | Rejection::LimitExceeded { name, .. }
            | Rejection::Busy { name } => name,
        }
    }

    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Rejection::TooLarge { .. } => "too_large",
            Rejection::TypeNotAccepted { .. } => "type_not_accepted",
            Rejection::LimitExceeded { .. } => "limit_exceeded",
            Rejection::Busy { .. } => "busy",
        }
    }
}

impl UploadPolicy {
    /// Built-in defaults for a purpose
    pub fn builtin(purpose: Purpose) -> Self {
        let (bucket, max_bytes, accept, allow_multiple, max_items, auto_commit) = match purpose {
            Purpose::Avatar => ("avatars", 2 * MB, "image/*", false, 1, true),
            Purpose::Image => ("images", 5 * MB, "image/*", false, 1, false),
            Purpose::Video => ("videos", 100 * MB, "video/*", false, 1, false),
            Purpose::File => ("files", 10 * MB, "*", false, 1, false),
            Purpose::Media => ("media", 50 * MB, "image/*,video/*", true, 10, false),
        };

        Self {
            purpose,
            destination_bucket: bucket.to_string(),
            allow_multiple,
            max_items,
            max_bytes,
            accept: AcceptPattern::parse(accept),
            auto_commit,
            overwrite_existing: false,
        }
    }

    /// Most restrictive built-in policy: single file, generic bucket, smallest ceiling
    pub fn fail_closed() -> Self {
        let smallest = Purpose::ALL
            .iter()
            .map(|p| Self::builtin(*p).max_bytes)
            .min()
            .unwrap_or(2 * MB);

        Self {
            max_bytes: smallest,
            ..Self::builtin(Purpose::File)
        }
    }

    /// Apply overrides field by field
    #[must_use]
    pub fn with_overrides(mut self, overrides: &PolicyOverrides) -> Self {
        if let Some(bucket) = &overrides.bucket {
            self.destination_bucket = bucket.clone();
        }
        if let Some(allow_multiple) = overrides.allow_multiple {
            self.allow_multiple = allow_multiple;
        }
        if let Some(max_items) = overrides.max_items {
            self.max_items = max_items;
        }
        if let Some(max_bytes) = overrides.max_bytes {
            self.max_bytes = max_bytes;
        }
        if let Some(accept) = &overrides.accept {
            self.accept = AcceptPattern::parse(accept);
        }
        if let Some(auto_commit) = overrides.auto_commit {
            self.auto_commit = auto_commit;
        }
        if let Some(overwrite) = overrides.overwrite_existing {
            self.overwrite_existing = overwrite;
        }
        self
    }

    /// Check a file's metadata against the size ceiling and accept pattern.
    ///
    /// Pure and synchronous; the item-count ceiling is enforced by intake.
    pub fn check(&self, name: &str, size: u64, mime: &str) -> Result<(), Rejection> {
        if size > self.max_bytes {
            return Err(Rejection::TooLarge {
                name: name.to_string(),
                size,
                limit: self.max_bytes,
            });
        }

        if !self.accept.matches(mime, name) {
            return Err(Rejection::TypeNotAccepted {
                name: name.to_string(),
                mime: if mime.is_empty() {
                    "unknown".to_string()
                } else {
                    mime.to_string()
                },
                accept: self.accept.to_string(),
            });
        }

        Ok(())
    }
}

/// Resolve the policy for a purpose
pub fn resolve(purpose: Purpose, overrides: &PolicyOverrides) -> UploadPolicy {
    UploadPolicy::builtin(purpose).with_overrides(overrides)
}

/// Resolve the policy for a free-form purpose tag.
///
/// Unknown tags never fail; they fall back to [`UploadPolicy::fail_closed`].
pub fn resolve_tag(tag: &str, overrides: &PolicyOverrides) -> UploadPolicy {
    match tag.parse::<Purpose>() {
        Ok(purpose) => resolve(purpose, overrides),
        Err(e) => {
            tracing::warn!(tag = %tag, error = %e, "Falling back to restrictive upload policy");
            UploadPolicy::fail_closed().with_overrides(overrides)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_avatar_defaults() {
        let policy = resolve(Purpose::Avatar, &PolicyOverrides::default());
        assert_eq!(policy.destination_bucket, "avatars");
        assert_eq!(policy.max_bytes, 2 * MB);
        assert!(!policy.allow_multiple);
        assert!(policy.auto_commit);
    }

    #[test]
    fn test_media_allows_multiple() {
        let policy = resolve(Purpose::Media, &PolicyOverrides::default());
        assert!(policy.allow_multiple);
        assert_eq!(policy.max_items, 10);
        assert!(policy.accept.matches("video/mp4", "clip.mp4"));
        assert!(policy.accept.matches("image/png", "a.png"));
        assert!(!policy.accept.matches("application/pdf", "a.pdf"));
    }

    #[test]
    fn test_overrides_apply_field_by_field() {
        let overrides = PolicyOverrides {
            bucket: Some("agents".into()),
            max_bytes: Some(MB),
            ..Default::default()
        };
        let policy = resolve(Purpose::Image, &overrides);

        assert_eq!(policy.destination_bucket, "agents");
        assert_eq!(policy.max_bytes, MB);
        // untouched fields keep the purpose default
        assert_eq!(policy.accept.to_string(), "image/*");
        assert!(!policy.allow_multiple);
    }

    #[test]
    fn test_unknown_tag_fails_closed() {
        let policy = resolve_tag("banner", &PolicyOverrides::default());
        assert_eq!(policy.destination_bucket, "files");
        assert!(!policy.allow_multiple);
        assert_eq!(policy.max_items, 1);
        assert_eq!(policy.max_bytes, 2 * MB);
        assert!(!policy.auto_commit);
    }

    #[test]
    fn test_tag_parsing_is_case_insensitive() {
        assert_eq!("Avatar".parse::<Purpose>(), Ok(Purpose::Avatar));
        assert!(" media ".parse::<Purpose>().is_ok());
    }

    #[test]
    fn test_check_rejects_oversized() {
        let policy = resolve(Purpose::Avatar, &PolicyOverrides::default());
        let err = policy.check("me.png", 3 * MB, "image/png").unwrap_err();
        assert_eq!(err.reason(), "too_large");
        assert_eq!(err.file_name(), "me.png");
    }

    #[test]
    fn test_check_rejects_wrong_type() {
        let policy = resolve(Purpose::Video, &PolicyOverrides::default());
        let err = policy.check("notes.txt", 10, "text/plain").unwrap_err();
        assert!(matches!(err, Rejection::TypeNotAccepted { .. }));
        assert!(err.to_string().contains("video/*"));
    }

    #[test]
    fn test_merged_overrides_prefer_later_layer() {
        let base = PolicyOverrides {
            bucket: Some("from-config".into()),
            max_items: Some(4),
            ..Default::default()
        };
        let caller = PolicyOverrides {
            bucket: Some("from-caller".into()),
            ..Default::default()
        };
        let merged = base.merged_with(&caller);
        assert_eq!(merged.bucket.as_deref(), Some("from-caller"));
        assert_eq!(merged.max_items, Some(4));
    }
}
