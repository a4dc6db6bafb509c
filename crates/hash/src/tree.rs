//! Directory-tree fragment hashing (§3 invariant):
//!
//! ```text
//! fragment_hash   = H( concat_i H( basename_i || content_hash_i ) )   (sorted, recursive)
//! content_hash(f) = H( relative_path_unix || H(file_bytes) )
//! content_hash(d) = fragment_hash(d)
//! ```

use crate::Hash;
use fragmenter_errors::{io_error_with_path, FragmenterError};
use std::path::Path;

/// Compute the fragment hash of a directory tree, embedded in
/// `module.json` and compared after extraction (§3, §4.D).
///
/// # Errors
/// Returns an error if directory traversal or file reads fail.
pub async fn hash_directory(root: &Path) -> Result<Hash, FragmenterError> {
    hash_dir_at(root, root).await
}

fn hash_dir_at<'a>(
    root: &'a Path,
    dir: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Hash, FragmenterError>> + Send + 'a>> {
    Box::pin(async move {
        let mut entries = Vec::new();
        let mut read_dir = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| io_error_with_path(&e, dir))?;
        while let Some(entry) = read_dir
            .next_entry()
            .await
            .map_err(|e| io_error_with_path(&e, dir))?
        {
            entries.push(entry.path());
        }
        entries.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

        let mut concatenated = Vec::new();
        for entry_path in entries {
            let basename = entry_path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| {
                    FragmenterError::invalid_parameters(format!(
                        "non-UTF-8 file name under {}",
                        dir.display()
                    ))
                })?;

            let metadata = tokio::fs::metadata(&entry_path)
                .await
                .map_err(|e| io_error_with_path(&e, &entry_path))?;

            let content_hash = if metadata.is_dir() {
                hash_dir_at(root, &entry_path).await?
            } else {
                let rel = relative_unix_path(root, &entry_path)?;
                let file_hash = Hash::hash_file(&entry_path).await?;
                Hash::from_parts(&[rel.as_bytes(), file_hash.as_bytes()])
            };

            let entry_hash = Hash::from_parts(&[basename.as_bytes(), content_hash.as_bytes()]);
            concatenated.extend_from_slice(entry_hash.as_bytes());
        }

        Ok(Hash::from_data(&concatenated))
    })
}

fn relative_unix_path(root: &Path, path: &Path) -> Result<String, FragmenterError> {
    let rel = path.strip_prefix(root).map_err(|_| {
        FragmenterError::invalid_parameters(format!(
            "{} is not under {}",
            path.display(),
            root.display()
        ))
    })?;
    let mut parts = Vec::new();
    for component in rel.components() {
        let std::path::Component::Normal(os_str) = component else {
            continue;
        };
        let s = os_str.to_str().ok_or_else(|| {
            FragmenterError::invalid_parameters(format!("non-UTF-8 path component in {}", rel.display()))
        })?;
        parts.push(s.to_string());
    }
    Ok(parts.join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    async fn write_file(path: &Path, contents: &[u8]) {
        tokio::fs::create_dir_all(path.parent().unwrap())
            .await
            .unwrap();
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(contents).unwrap();
    }

    #[tokio::test]
    async fn hash_is_deterministic_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("a.txt"), b"hello").await;
        write_file(&dir.path().join("nested/b.txt"), b"world").await;

        let h1 = hash_directory(dir.path()).await.unwrap();
        let h2 = hash_directory(dir.path()).await.unwrap();
        assert_eq!(h1, h2);
    }

    #[tokio::test]
    async fn hash_is_order_independent_of_filesystem_iteration() {
        let dir_a = tempfile::tempdir().unwrap();
        write_file(&dir_a.path().join("z.txt"), b"1").await;
        write_file(&dir_a.path().join("a.txt"), b"2").await;

        let dir_b = tempfile::tempdir().unwrap();
        write_file(&dir_b.path().join("a.txt"), b"2").await;
        write_file(&dir_b.path().join("z.txt"), b"1").await;

        let h_a = hash_directory(dir_a.path()).await.unwrap();
        let h_b = hash_directory(dir_b.path()).await.unwrap();
        assert_eq!(h_a, h_b);
    }

    #[tokio::test]
    async fn hash_changes_when_content_changes() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("a.txt"), b"hello").await;
        let h1 = hash_directory(dir.path()).await.unwrap();

        write_file(&dir.path().join("a.txt"), b"goodbye").await;
        let h2 = hash_directory(dir.path()).await.unwrap();

        assert_ne!(h1, h2);
    }
}
