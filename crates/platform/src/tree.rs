//! Directory tree moves used by backup/apply/restore (§4.F).

use fragmenter_errors::FragmenterError;
use std::path::{Path, PathBuf};

const EXDEV: i32 = 18;

/// Move `src` to `dst`, falling back to recursive copy-then-remove when
/// `src` and `dst` live on different filesystems (`EXDEV`).
///
/// # Errors
/// Returns a classified filesystem error on failure.
pub async fn move_entry(src: &Path, dst: &Path) -> Result<(), FragmenterError> {
    if let Some(parent) = dst.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, parent))?;
    }

    match tokio::fs::rename(src, dst).await {
        Ok(()) => Ok(()),
        Err(e) if e.raw_os_error() == Some(EXDEV) => {
            copy_recursive(src, dst).await?;
            remove_tree(src).await
        }
        Err(e) => Err(fragmenter_errors::io_error_with_path(&e, src)),
    }
}

fn copy_recursive<'a>(
    src: &'a Path,
    dst: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<(), FragmenterError>> + Send + 'a>> {
    Box::pin(async move {
        let metadata = tokio::fs::metadata(src)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, src))?;

        if metadata.is_dir() {
            tokio::fs::create_dir_all(dst)
                .await
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, dst))?;
            let mut entries = tokio::fs::read_dir(src)
                .await
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, src))?;
            while let Some(entry) = entries
                .next_entry()
                .await
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, src))?
            {
                let name = entry.file_name();
                copy_recursive(&entry.path(), &dst.join(&name)).await?;
            }
        } else {
            tokio::fs::copy(src, dst)
                .await
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, src))?;
        }
        Ok(())
    })
}

/// Remove a directory tree, treating an already-absent path as success.
///
/// # Errors
/// Returns a classified filesystem error on failure.
pub async fn remove_tree(path: &Path) -> Result<(), FragmenterError> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(fragmenter_errors::io_error_with_path(&e, path)),
    }
}

/// Empty `dir` of all entries without removing `dir` itself.
///
/// # Errors
/// Returns a classified filesystem error on failure.
pub async fn empty_dir(dir: &Path) -> Result<(), FragmenterError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, dir))?;
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, dir))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, dir))?
    {
        remove_tree(&entry.path()).await?;
    }
    Ok(())
}

/// Move every top-level entry of `src_dir` into `dst_dir`, preserving
/// names, skipping entries already present at the destination (§4.F
/// backup step: "skipping entries already present").
///
/// # Errors
/// Returns a classified filesystem error on failure.
pub async fn move_tree_contents(src_dir: &Path, dst_dir: &Path) -> Result<(), FragmenterError> {
    tokio::fs::create_dir_all(dst_dir)
        .await
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, dst_dir))?;

    let mut entries = match tokio::fs::read_dir(src_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(fragmenter_errors::io_error_with_path(&e, src_dir)),
    };

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, src_dir))?
    {
        let name = entry.file_name();
        let dst = dst_dir.join(&name);
        if tokio::fs::try_exists(&dst).await.unwrap_or(false) {
            continue;
        }
        move_entry(&entry.path(), &dst).await?;
    }
    Ok(())
}

/// Move every file under `src_dir` into the matching relative path under
/// `dst_dir`, overwriting existing files, reporting `(moved, total)` file
/// counts as it goes (§4.F `copyProgress`, §9 Design Note: file count, not
/// byte count).
///
/// # Errors
/// Returns a classified filesystem error on failure.
pub async fn move_tree_with_progress(
    src_dir: &Path,
    dst_dir: &Path,
    mut on_progress: impl FnMut(usize, usize),
) -> Result<(), FragmenterError> {
    let files = list_files(src_dir).await?;
    let total = files.len();
    tokio::fs::create_dir_all(dst_dir)
        .await
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, dst_dir))?;

    for (moved, rel) in files.into_iter().enumerate() {
        let src = src_dir.join(&rel);
        let dst = dst_dir.join(&rel);
        move_entry(&src, &dst).await?;
        on_progress(moved + 1, total);
    }
    remove_tree(src_dir).await
}

/// Count every file under `dir`, recursively (§4.F `copyStarted.total`).
///
/// # Errors
/// Returns a classified filesystem error on failure.
pub async fn count_files(dir: &Path) -> Result<usize, FragmenterError> {
    Ok(list_files(dir).await?.len())
}

fn list_files<'a>(
    dir: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = Result<Vec<PathBuf>, FragmenterError>> + Send + 'a>>
{
    Box::pin(async move {
        let mut out = Vec::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, dir))?;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, dir))?
        {
            let path = entry.path();
            let metadata = tokio::fs::metadata(&path)
                .await
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, &path))?;
            if metadata.is_dir() {
                for child in list_files(&path).await? {
                    out.push(PathBuf::from(entry.file_name()).join(child));
                }
            } else {
                out.push(PathBuf::from(entry.file_name()));
            }
        }
        Ok(out)
    })
}

/// Move each relative path in `relative_paths` from `src_root` to
/// `dst_root`, overwriting whatever is already at the destination
/// (§4.F base-apply/restore step).
///
/// # Errors
/// Returns a classified filesystem error on failure.
pub async fn move_listed_files(
    relative_paths: &[String],
    src_root: &Path,
    dst_root: &Path,
) -> Result<(), FragmenterError> {
    for rel in relative_paths {
        let src = src_root.join(rel);
        if !tokio::fs::try_exists(&src).await.unwrap_or(false) {
            continue;
        }
        let dst = dst_root.join(rel);
        remove_tree(&dst).await?;
        move_entry(&src, &dst).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(path: &Path, contents: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::File::create(path).unwrap().write_all(contents).unwrap();
    }

    #[tokio::test]
    async fn moves_top_level_entries_and_skips_existing() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_file(&src.path().join("a.txt"), b"a");
        write_file(&src.path().join("nested/b.txt"), b"b");
        write_file(&dst.path().join("a.txt"), b"already-there");

        move_tree_contents(src.path(), dst.path()).await.unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.path().join("a.txt")).unwrap(),
            "already-there"
        );
        assert_eq!(
            std::fs::read_to_string(dst.path().join("nested/b.txt")).unwrap(),
            "b"
        );
        assert!(src.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn move_listed_files_overwrites_destination() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_file(&src.path().join("readme.txt"), b"new");
        write_file(&dst.path().join("readme.txt"), b"old");

        move_listed_files(&["readme.txt".to_string()], src.path(), dst.path())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dst.path().join("readme.txt")).unwrap(),
            "new"
        );
    }

    #[tokio::test]
    async fn move_tree_with_progress_reports_file_counts() {
        let src = tempfile::tempdir().unwrap();
        let dst = tempfile::tempdir().unwrap();
        write_file(&src.path().join("a.txt"), b"a");
        write_file(&src.path().join("nested/b.txt"), b"b");

        let mut calls = Vec::new();
        move_tree_with_progress(src.path(), dst.path(), |moved, total| calls.push((moved, total)))
            .await
            .unwrap();

        assert_eq!(calls.len(), 2);
        assert_eq!(calls.last().unwrap(), &(2, 2));
        assert!(dst.path().join("a.txt").exists());
        assert!(dst.path().join("nested/b.txt").exists());
        assert!(!src.path().exists());
    }

    #[tokio::test]
    async fn empty_dir_clears_contents_but_keeps_directory() {
        let dir = tempfile::tempdir().unwrap();
        write_file(&dir.path().join("x.txt"), b"x");
        empty_dir(dir.path()).await.unwrap();
        assert!(dir.path().exists());
        assert!(!dir.path().join("x.txt").exists());
    }
}
