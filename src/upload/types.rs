use crate::error::{ErrorContext, UploaderError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Lifecycle of one file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Initializing,
    Checking,
    ConflictPending,
    Uploading,
    DoneSuccess,
    DoneError,
    DoneCancelled,
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileStatus::DoneSuccess | FileStatus::DoneError | FileStatus::DoneCancelled
        )
    }
}

/// A file picked by the user. Content is streamed from `path` at upload time.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedFile {
    pub name: String,
    pub size: u64,
    pub path: PathBuf,
}

impl SelectedFile {
    pub fn from_path(path: &Path) -> Result<Self, UploaderError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| {
                UploaderError::Validation(format!("Invalid filename: {}", path.display()))
            })?
            .to_string();

        let metadata = fs::metadata(path).context("Failed to read file metadata")?;
        if !metadata.is_file() {
            return Err(UploaderError::Validation(format!(
                "Not a regular file: {}",
                path.display()
            )));
        }

        Ok(Self {
            name,
            size: metadata.len(),
            path: path.to_path_buf(),
        })
    }
}

/// Directive sent with a retried upload telling the server how to resolve a name clash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDirective {
    Overwrite,
    Rename,
}

impl ConflictDirective {
    /// Value of the `conflict` query parameter.
    pub fn as_query_value(&self) -> &'static str {
        match self {
            ConflictDirective::Overwrite => "0",
            ConflictDirective::Rename => "1",
        }
    }
}

/// What the user picked on a conflicting file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictChoice {
    Ignore,
    Overwrite,
    Rename,
}

/// Answer of the `file_exists` endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistenceAnswer {
    Absent,
    Exists,
    Invalid(String),
}

impl ExistenceAnswer {
    pub fn from_body(body: &str) -> Self {
        match body {
            "0" => ExistenceAnswer::Absent,
            "1" => ExistenceAnswer::Exists,
            other => ExistenceAnswer::Invalid(other.to_string()),
        }
    }
}

/// Answer of the `check_launchpad` request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LaunchpadCheck {
    Resolved(String),
    Rejected(String),
}

/// Terminal HTTP answer of an upload request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadReply {
    pub status: u16,
    pub message: String,
}

impl UploadReply {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageBody {
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Success,
    Warning,
    Danger,
}

/// A dismissible notification shown above the upload rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn new(level: NoticeLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_existence_answer_from_body() {
        assert_eq!(ExistenceAnswer::from_body("0"), ExistenceAnswer::Absent);
        assert_eq!(ExistenceAnswer::from_body("1"), ExistenceAnswer::Exists);
        assert_eq!(
            ExistenceAnswer::from_body("-1"),
            ExistenceAnswer::Invalid("-1".to_string())
        );
        assert!(matches!(
            ExistenceAnswer::from_body("<html>login</html>"),
            ExistenceAnswer::Invalid(_)
        ));
    }

    #[test]
    fn test_conflict_directive_query_values() {
        assert_eq!(ConflictDirective::Overwrite.as_query_value(), "0");
        assert_eq!(ConflictDirective::Rename.as_query_value(), "1");
    }

    #[test]
    fn test_selected_file_from_path() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("collect_host.tar.tgz");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(b"0123456789").unwrap();

        let selected = SelectedFile::from_path(&path).unwrap();
        assert_eq!(selected.name, "collect_host.tar.tgz");
        assert_eq!(selected.size, 10);
    }

    #[test]
    fn test_selected_file_rejects_directory() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = SelectedFile::from_path(dir.path()).unwrap_err();
        assert!(matches!(err, UploaderError::Validation(_)));
    }

    #[test]
    fn test_terminal_states() {
        assert!(FileStatus::DoneSuccess.is_terminal());
        assert!(FileStatus::DoneError.is_terminal());
        assert!(FileStatus::DoneCancelled.is_terminal());
        assert!(!FileStatus::ConflictPending.is_terminal());
        assert!(!FileStatus::Uploading.is_terminal());
    }
}
