//! Per-run temp directory naming (§3 Lifecycle, §6 `temporaryDirectory`).

use fragmenter_errors::FragmenterError;
use std::path::{Path, PathBuf};

/// Resolve the directory a run's staging area lives under: the
/// caller-supplied path if given, otherwise a randomly-named directory
/// under the OS temp root. The directory is created, empty, before return.
///
/// # Errors
/// Returns an error if the directory cannot be created.
pub async fn unique_temp_dir(requested: Option<&Path>) -> Result<PathBuf, FragmenterError> {
    let dir = match requested {
        Some(path) => path.to_path_buf(),
        None => std::env::temp_dir().join(format!("fragmenter-{}", uuid::Uuid::new_v4())),
    };
    tokio::fs::create_dir_all(&dir)
        .await
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, &dir))?;
    Ok(dir)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_a_fresh_random_directory_when_unspecified() {
        let dir = unique_temp_dir(None).await.unwrap();
        assert!(dir.exists());
        tokio::fs::remove_dir_all(&dir).await.unwrap();
    }

    #[tokio::test]
    async fn honours_a_caller_supplied_path() {
        let base = tempfile::tempdir().unwrap();
        let requested = base.path().join("staging");
        let dir = unique_temp_dir(Some(&requested)).await.unwrap();
        assert_eq!(dir, requested);
        assert!(dir.exists());
    }
}
