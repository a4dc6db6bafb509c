//! Platform-error-to-[`ErrorCode`](crate::ErrorCode) classification (§7).

use crate::{ErrorCode, FragmenterError};
use std::path::PathBuf;

/// Classifies raw transport/filesystem errors into the closed taxonomy.
///
/// This is the single point where an `io::ErrorKind` or a reqwest error
/// crosses into the core's typed error model (Design Note: "throw then
/// classify" is replaced with a classifier that runs once at the boundary).
pub struct Classifier;

impl Classifier {
    /// Map a `std::io::Error` by its `ErrorKind`/raw OS code.
    #[must_use]
    pub fn classify_io(err: &std::io::Error, path: Option<PathBuf>) -> FragmenterError {
        let code = match err.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorCode::PermissionsError,
            std::io::ErrorKind::NotFound => ErrorCode::FileNotFound,
            std::io::ErrorKind::AlreadyExists => ErrorCode::DirectoryNotEmpty,
            _ => match err.raw_os_error() {
                Some(13) => ErrorCode::PermissionsError, // EACCES
                Some(1) => ErrorCode::PermissionsError,  // EPERM
                Some(16) => ErrorCode::ResourcesBusy,    // EBUSY
                Some(28) => ErrorCode::NoSpaceOnDevice,  // ENOSPC
                Some(2) => ErrorCode::FileNotFound,      // ENOENT
                Some(39) => ErrorCode::DirectoryNotEmpty, // ENOTEMPTY
                Some(20) => ErrorCode::NotADirectory,    // ENOTDIR
                _ => ErrorCode::Unknown,
            },
        };

        let detail = match &path {
            Some(p) => format!("{err} ({})", p.display()),
            None => err.to_string(),
        };

        FragmenterError::new(code, detail)
    }

    /// Map a reqwest transport error.
    #[must_use]
    pub fn classify_reqwest(err: &reqwest::Error) -> FragmenterError {
        if err.is_timeout() || err.is_connect() {
            return FragmenterError::new(ErrorCode::NetworkError, err.to_string());
        }
        if err.is_body() || err.is_decode() {
            return FragmenterError::new(ErrorCode::DownloadStreamClosed, err.to_string());
        }
        FragmenterError::new(ErrorCode::NetworkError, err.to_string())
    }

    /// Map a raw message for platform error codes exposed only as strings
    /// (e.g. from a classifier table keyed by errno name), and ZIP
    /// corruption messages surfaced as plain text.
    #[must_use]
    pub fn classify_message(message: &str) -> FragmenterError {
        let lower = message.to_ascii_lowercase();
        let code = if lower.contains("end of central directory")
            || lower.contains("unexpected eof")
            || lower.contains("invalid zip")
        {
            ErrorCode::CorruptedZipFile
        } else if lower.contains("econnreset") || lower.contains("enotfound") {
            ErrorCode::NetworkError
        } else if lower.contains("eacces") || lower.contains("eperm") {
            ErrorCode::PermissionsError
        } else if lower.contains("ebusy") {
            ErrorCode::ResourcesBusy
        } else if lower.contains("enospc") {
            ErrorCode::NoSpaceOnDevice
        } else if lower.contains("enoent") {
            ErrorCode::FileNotFound
        } else if lower.contains("enotempty") {
            ErrorCode::DirectoryNotEmpty
        } else if lower.contains("enotdir") {
            ErrorCode::NotADirectory
        } else {
            ErrorCode::Unknown
        };
        FragmenterError::new(code, message.to_string())
    }
}
