#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error taxonomy for the fragmenter package distribution engine.
//!
//! The taxonomy is closed (§7 of the spec): every failure the engine can
//! raise maps to exactly one [`ErrorCode`]. Unlike a per-domain error crate,
//! fragmenter has a single flat kind list because every component (planner,
//! downloader, decompressor, orchestrator) shares one retry/classification
//! policy keyed off the same codes.

mod classifier;

pub use classifier::Classifier;

use std::path::PathBuf;
use thiserror::Error;

/// The closed error kind taxonomy (§7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "PascalCase"))]
pub enum ErrorCode {
    PermissionsError,
    ResourcesBusy,
    NoSpaceOnDevice,
    MaxModuleRetries,
    FileNotFound,
    DirectoryNotEmpty,
    NotADirectory,
    ModuleJsonInvalid,
    ModuleCrcMismatch,
    UserAborted,
    NetworkError,
    CorruptedZipFile,
    InvalidOptions,
    InvalidParameters,
    InvalidDistributionManifest,
    DownloadStreamClosed,
    Unknown,
}

impl ErrorCode {
    /// Errors in this set abort a retry loop immediately (§7).
    #[must_use]
    pub fn is_unrecoverable(self) -> bool {
        matches!(
            self,
            Self::PermissionsError
                | Self::NoSpaceOnDevice
                | Self::MaxModuleRetries
                | Self::FileNotFound
                | Self::DirectoryNotEmpty
                | Self::NotADirectory
        )
    }

    /// Errors in this set are retried with exponential backoff (§7).
    #[must_use]
    pub fn is_recoverable(self) -> bool {
        !self.is_unrecoverable() && !matches!(self, Self::UserAborted)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PermissionsError => "PermissionsError",
            Self::ResourcesBusy => "ResourcesBusy",
            Self::NoSpaceOnDevice => "NoSpaceOnDevice",
            Self::MaxModuleRetries => "MaxModuleRetries",
            Self::FileNotFound => "FileNotFound",
            Self::DirectoryNotEmpty => "DirectoryNotEmpty",
            Self::NotADirectory => "NotADirectory",
            Self::ModuleJsonInvalid => "ModuleJsonInvalid",
            Self::ModuleCrcMismatch => "ModuleCrcMismatch",
            Self::UserAborted => "UserAborted",
            Self::NetworkError => "NetworkError",
            Self::CorruptedZipFile => "CorruptedZipFile",
            Self::InvalidOptions => "InvalidOptions",
            Self::InvalidParameters => "InvalidParameters",
            Self::InvalidDistributionManifest => "InvalidDistributionManifest",
            Self::DownloadStreamClosed => "DownloadStreamClosed",
            Self::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The engine's single error type.
///
/// `Display` renders as `FragmenterError(<Code>): <detail>` per §7.
#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[error("FragmenterError({code}): {detail}")]
pub struct FragmenterError {
    pub code: ErrorCode,
    pub detail: String,
}

impl FragmenterError {
    #[must_use]
    pub fn new(code: ErrorCode, detail: impl Into<String>) -> Self {
        Self {
            code,
            detail: detail.into(),
        }
    }

    #[must_use]
    pub fn is_unrecoverable(&self) -> bool {
        self.code.is_unrecoverable()
    }

    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        self.code.is_recoverable()
    }

    #[must_use]
    pub fn user_aborted() -> Self {
        Self::new(ErrorCode::UserAborted, "operation cancelled by user")
    }

    #[must_use]
    pub fn max_module_retries(module: &str, attempts: u32) -> Self {
        Self::new(
            ErrorCode::MaxModuleRetries,
            format!(
                "module {module} exceeded {attempts} retr{}",
                if attempts == 1 { "y" } else { "ies" }
            ),
        )
    }

    #[must_use]
    pub fn invalid_options(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidOptions, detail)
    }

    #[must_use]
    pub fn invalid_parameters(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidParameters, detail)
    }

    #[must_use]
    pub fn invalid_manifest(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidDistributionManifest, detail)
    }

    #[must_use]
    pub fn module_json_invalid(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::ModuleJsonInvalid, detail)
    }

    #[must_use]
    pub fn module_crc_mismatch(expected: &str, actual: &str) -> Self {
        Self::new(
            ErrorCode::ModuleCrcMismatch,
            format!("expected hash {expected}, got {actual}"),
        )
    }

    #[must_use]
    pub fn corrupted_zip(detail: impl Into<String>) -> Self {
        Self::new(ErrorCode::CorruptedZipFile, detail)
    }
}

impl From<std::io::Error> for FragmenterError {
    fn from(err: std::io::Error) -> Self {
        Classifier::classify_io(&err, None)
    }
}

/// Attach a path to an I/O error before classification; use at filesystem
/// call sites so `FileNotFound`/`NotADirectory` messages name the path.
pub fn io_error_with_path(err: &std::io::Error, path: impl Into<PathBuf>) -> FragmenterError {
    Classifier::classify_io(err, Some(path.into()))
}

/// Result type alias used throughout the fragmenter workspace.
pub type Result<T> = std::result::Result<T, FragmenterError>;

/// User-facing presentation surface, mirroring the teacher's
/// `UserFacingError` impls (one per domain error type) but collapsed onto
/// the single closed taxonomy.
pub trait UserFacingError {
    fn user_message(&self) -> String;
    fn is_retryable(&self) -> bool;
}

impl UserFacingError for FragmenterError {
    fn user_message(&self) -> String {
        self.to_string()
    }

    fn is_retryable(&self) -> bool {
        self.is_recoverable()
    }
}
