//! Destination names
//!
//! `{purpose}/{user}-{unix_micros}-{seq}.{ext}`: derived from local data only,
//! so no round-trip is needed to check whether a name is taken. `seq` is the
//! item id, which separates items created within the same microsecond.

use crate::policy::Purpose;
use chrono::{DateTime, Utc};

/// Placeholder used when no user identifier is known
pub const ANONYMOUS: &str = "anonymous";

/// Build the destination name for a file
pub fn destination_name(
    purpose: Purpose,
    user_id: Option<&str>,
    timestamp: DateTime<Utc>,
    seq: u64,
    file_name: &str,
) -> String {
    let user = user_id
        .map(sanitize_user)
        .filter(|u| !u.is_empty())
        .unwrap_or_else(|| ANONYMOUS.to_string());

    let stem = format!(
        "{}/{}-{}-{}",
        purpose.as_str(),
        user,
        timestamp.timestamp_micros(),
        seq
    );

    match extension(file_name) {
        Some(ext) => format!("{}.{}", stem, ext),
        None => stem,
    }
}

/// Lowercased extension of a file name, if it is a plain alphanumeric one
pub fn extension(file_name: &str) -> Option<String> {
    let (base, ext) = file_name.rsplit_once('.')?;
    if base.is_empty() || ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

fn sanitize_user(user: &str) -> String {
    user.trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 123_456_000).unwrap()
    }

    #[test]
    fn test_name_with_user() {
        let name = destination_name(Purpose::Avatar, Some("agent-7"), at(), 3, "Me.PNG");
        assert_eq!(name, "avatar/agent-7-1700000000123456-3.png");
    }

    #[test]
    fn test_name_without_user() {
        let name = destination_name(Purpose::Media, None, at(), 1, "clip.mp4");
        assert_eq!(name, "media/anonymous-1700000000123456-1.mp4");

        let name = destination_name(Purpose::Media, Some("  "), at(), 1, "clip.mp4");
        assert!(name.starts_with("media/anonymous-"));
    }

    #[test]
    fn test_user_is_sanitized() {
        let name = destination_name(Purpose::File, Some("a/b c"), at(), 9, "x.txt");
        assert_eq!(name, "file/a_b_c-1700000000123456-9.txt");
    }

    #[test]
    fn test_extension_edge_cases() {
        assert_eq!(extension("archive.tar.gz").as_deref(), Some("gz"));
        assert_eq!(extension("README"), None);
        assert_eq!(extension(".bashrc"), None);
        assert_eq!(extension("weird.p?g"), None);
    }

    #[test]
    fn test_same_instant_distinct_items() {
        let a = destination_name(Purpose::Image, Some("u"), at(), 1, "a.png");
        let b = destination_name(Purpose::Image, Some("u"), at(), 2, "a.png");
        assert_ne!(a, b);
    }
}
