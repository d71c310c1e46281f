//! Accept pattern matching
//!
//! Comma-separated list of MIME matchers, as in an HTML `accept` attribute:
//! `*` or `*/*` (anything), `image/*` (top-level type), `image/png` (exact)
//! and `.pdf` (file extension).

use mime::Mime;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Matcher {
    Any,
    TopLevel(String),
    Exact(String),
    Extension(String),
}

/// Parsed accept pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptPattern {
    raw: String,
    matchers: Vec<Matcher>,
}

impl AcceptPattern {
    /// Parse a pattern. Never fails; an empty pattern accepts everything.
    pub fn parse(raw: &str) -> Self {
        let mut matchers: Vec<Matcher> = raw
            .split(',')
            .map(|token| token.trim().to_ascii_lowercase())
            .filter(|token| !token.is_empty())
            .map(|token| {
                if token == "*" || token == "*/*" {
                    Matcher::Any
                } else if let Some(ext) = token.strip_prefix('.') {
                    Matcher::Extension(ext.to_string())
                } else if let Some(top) = token.strip_suffix("/*") {
                    Matcher::TopLevel(top.to_string())
                } else {
                    Matcher::Exact(token)
                }
            })
            .collect();

        if matchers.is_empty() {
            matchers.push(Matcher::Any);
        }

        Self {
            raw: raw.trim().to_string(),
            matchers,
        }
    }

    pub fn wildcard() -> Self {
        Self::parse("*")
    }

    /// Whether a file with this MIME type and name is accepted
    pub fn matches(&self, mime_type: &str, file_name: &str) -> bool {
        let parsed = mime_type.trim().parse::<Mime>().ok();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase());

        self.matchers.iter().any(|matcher| match matcher {
            Matcher::Any => true,
            Matcher::TopLevel(top) => parsed
                .as_ref()
                .is_some_and(|m| m.type_().as_str().eq_ignore_ascii_case(top)),
            Matcher::Exact(essence) => parsed
                .as_ref()
                .is_some_and(|m| m.essence_str().eq_ignore_ascii_case(essence)),
            Matcher::Extension(ext) => extension.as_deref() == Some(ext.as_str()),
        })
    }

    pub fn is_wildcard(&self) -> bool {
        self.matchers.contains(&Matcher::Any)
    }
}

impl fmt::Display for AcceptPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.raw.is_empty() {
            f.write_str("*")
        } else {
            f.write_str(&self.raw)
        }
    }
}

impl Default for AcceptPattern {
    fn default() -> Self {
        Self::wildcard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_top_level_wildcard() {
        let pattern = AcceptPattern::parse("image/*");
        assert!(pattern.matches("image/png", "a.png"));
        assert!(pattern.matches("IMAGE/JPEG", "a.jpg"));
        assert!(!pattern.matches("video/mp4", "a.mp4"));
    }

    #[test]
    fn test_exact_and_list() {
        let pattern = AcceptPattern::parse("application/pdf, video/*");
        assert!(pattern.matches("application/pdf", "doc.pdf"));
        assert!(pattern.matches("video/webm", "clip.webm"));
        assert!(!pattern.matches("application/zip", "a.zip"));
    }

    #[test]
    fn test_wildcard_accepts_missing_type() {
        let pattern = AcceptPattern::parse("*");
        assert!(pattern.is_wildcard());
        assert!(pattern.matches("", "blob"));
    }

    #[test]
    fn test_empty_pattern_is_wildcard() {
        let pattern = AcceptPattern::parse("  ");
        assert!(pattern.is_wildcard());
        assert_eq!(pattern.to_string(), "*");
    }

    #[test]
    fn test_extension_matcher() {
        let pattern = AcceptPattern::parse(".pdf,.DOCX");
        assert!(pattern.matches("", "Report.PDF"));
        assert!(pattern.matches("application/octet-stream", "cv.docx"));
        assert!(!pattern.matches("application/pdf", "noext"));
    }

    #[test]
    fn test_unparseable_mime_only_matches_wildcards() {
        let pattern = AcceptPattern::parse("image/*");
        assert!(!pattern.matches("garbage", "x.png"));
    }
}
