//! Intake and validation
//!
//! Decides which of a raw selection enter the batch. Planning is pure and
//! synchronous: it only looks at file metadata and the current batch size.

use super::{ItemId, SourceFile, UploadError};
use crate::policy::{Rejection, UploadPolicy};

/// How a selection changes the batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntakeMode {
    /// Single-item policy: the accepted file replaces the whole batch
    Replace,
    /// Multi-item policy: accepted files are appended
    Append,
}

/// Outcome of planning a selection
#[derive(Debug)]
pub struct IntakePlan {
    pub mode: IntakeMode,
    pub accepted: Vec<SourceFile>,
    pub rejected: Vec<Rejection>,
}

/// What `add_files` did with a selection
#[derive(Debug, Default)]
pub struct IntakeReport {
    pub accepted: Vec<ItemId>,
    pub rejected: Vec<Rejection>,
    /// Result of the immediate upload, for auto-commit policies
    pub committed: Option<Result<String, UploadError>>,
}

impl IntakeReport {
    pub fn is_empty(&self) -> bool {
        self.accepted.is_empty() && self.rejected.is_empty()
    }
}

/// Check one file against the policy's size ceiling and accepted types
pub fn validate(policy: &UploadPolicy, file: &SourceFile) -> Result<(), Rejection> {
    policy.check(&file.name, file.size(), &file.mime_type)
}

/// Plan the intake of `files` into a batch currently holding `current_len` items.
///
/// Single mode looks at the first file only. Multi mode walks the files in
/// order: once the item ceiling is reached the current file is rejected and
/// the rest of the selection is dropped; a file failing validation is
/// rejected and the walk continues.
pub fn plan(policy: &UploadPolicy, current_len: usize, files: Vec<SourceFile>) -> IntakePlan {
    if !policy.allow_multiple {
        let mut plan = IntakePlan {
            mode: IntakeMode::Replace,
            accepted: Vec::new(),
            rejected: Vec::new(),
        };
        if let Some(file) = files.into_iter().next() {
            match validate(policy, &file) {
                Ok(()) => plan.accepted.push(file),
                Err(rejection) => plan.rejected.push(rejection),
            }
        }
        return plan;
    }

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();

    for file in files {
        if current_len + accepted.len() >= policy.max_items {
            rejected.push(Rejection::LimitExceeded {
                name: file.name,
                max: policy.max_items,
            });
            break;
        }

        match validate(policy, &file) {
            Ok(()) => accepted.push(file),
            Err(rejection) => rejected.push(rejection),
        }
    }

    IntakePlan {
        mode: IntakeMode::Append,
        accepted,
        rejected,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::{self, PolicyOverrides, Purpose};

    const MB: usize = 1024 * 1024;

    fn png(name: &str, size: usize) -> SourceFile {
        SourceFile::new(name, "image/png", vec![0u8; size])
    }

    fn multi(max_items: usize) -> UploadPolicy {
        policy::resolve(
            Purpose::Media,
            &PolicyOverrides {
                max_items: Some(max_items),
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_single_mode_takes_first_file_only() {
        let policy = policy::resolve(Purpose::Image, &PolicyOverrides::default());
        let plan = plan(&policy, 0, vec![png("a.png", 10), png("b.png", 10)]);
        assert_eq!(plan.mode, IntakeMode::Replace);
        assert_eq!(plan.accepted.len(), 1);
        assert_eq!(plan.accepted[0].name, "a.png");
        assert!(plan.rejected.is_empty());
    }

    #[test]
    fn test_single_mode_ignores_current_size() {
        let policy = policy::resolve(Purpose::Avatar, &PolicyOverrides::default());
        let plan = plan(&policy, 1, vec![png("b.png", 10)]);
        assert_eq!(plan.accepted.len(), 1);
    }

    #[test]
    fn test_oversized_avatar_rejected() {
        let policy = policy::resolve(Purpose::Avatar, &PolicyOverrides::default());
        let plan = plan(&policy, 0, vec![png("big.png", 3 * MB)]);
        assert!(plan.accepted.is_empty());
        assert_eq!(plan.rejected.len(), 1);
        assert_eq!(plan.rejected[0].reason(), "too_large");
    }

    #[test]
    fn test_limit_stops_processing() {
        let plan = plan(
            &multi(2),
            0,
            vec![png("a.png", MB), png("b.png", MB), png("c.png", MB), png("d.png", MB)],
        );
        let names: Vec<_> = plan.accepted.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.png"]);
        assert_eq!(plan.rejected.len(), 1);
        assert_eq!(
            plan.rejected[0],
            Rejection::LimitExceeded {
                name: "c.png".into(),
                max: 2
            }
        );
    }

    #[test]
    fn test_limit_counts_existing_items() {
        let plan = plan(&multi(3), 2, vec![png("a.png", 1), png("b.png", 1)]);
        assert_eq!(plan.accepted.len(), 1);
        assert_eq!(plan.rejected.len(), 1);
    }

    #[test]
    fn test_invalid_file_does_not_stop_processing() {
        let files = vec![
            png("a.png", 1),
            SourceFile::new("notes.txt", "text/plain", vec![0u8; 1]),
            png("b.png", 1),
        ];
        let plan = plan(&multi(10), 0, files);
        assert_eq!(plan.accepted.len(), 2);
        assert_eq!(plan.rejected.len(), 1);
        assert_eq!(plan.rejected[0].file_name(), "notes.txt");
    }

    #[test]
    fn test_validate_type_and_size() {
        let policy = policy::resolve(Purpose::Video, &PolicyOverrides::default());
        assert!(validate(&policy, &SourceFile::new("clip.mp4", "video/mp4", vec![0u8; 8])).is_ok());

        let rejection = validate(&policy, &png("still.png", 8)).unwrap_err();
        assert_eq!(rejection.reason(), "type_not_accepted");
    }

    #[test]
    fn test_empty_selection() {
        let plan = plan(&multi(2), 0, Vec::new());
        assert!(plan.accepted.is_empty());
        assert!(plan.rejected.is_empty());
    }
}
