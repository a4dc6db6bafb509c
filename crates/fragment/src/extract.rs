//! 4.D Module Decompressor — extract a ZIP, verify the embedded hash.

use fragmenter_errors::{Classifier, ErrorCode, FragmenterError};
use fragmenter_events::{AppEvent, SinkHandle};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Deserialize)]
struct ModuleJson {
    hash: String,
}

pub struct ModuleDecompressor;

impl ModuleDecompressor {
    /// Extract `zip_path` into `dest_dir`, then read `<dest_dir>/module.json`
    /// and compare its hash against `expected_hash`.
    ///
    /// # Errors
    /// - `CorruptedZipFile` for a truncated/malformed archive.
    /// - `ModuleJsonInvalid` if the manifest is missing or malformed.
    /// - `ModuleCrcMismatch` if the extracted hash does not match.
    pub async fn extract(
        zip_path: &Path,
        dest_dir: &Path,
        expected_hash: &str,
        module_name: &str,
        sink: &SinkHandle,
    ) -> Result<(), FragmenterError> {
        tokio::fs::create_dir_all(dest_dir)
            .await
            .map_err(|e| fragmenter_errors::io_error_with_path(&e, dest_dir))?;

        let zip_path = zip_path.to_path_buf();
        let dest_dir_owned = dest_dir.to_path_buf();
        let sink_for_blocking = sink.clone();
        let module_for_blocking = module_name.to_string();

        tokio::task::spawn_blocking(move || {
            extract_zip_blocking(&zip_path, &dest_dir_owned, &module_for_blocking, &sink_for_blocking)
        })
        .await
        .map_err(|e| FragmenterError::new(ErrorCode::Unknown, format!("extraction task panicked: {e}")))??;

        sink.on_event(AppEvent::UnzipFinished {
            module: module_name.to_string(),
        });

        verify_module_json(dest_dir, expected_hash).await
    }
}

fn extract_zip_blocking(
    zip_path: &Path,
    dest_dir: &Path,
    module_name: &str,
    sink: &SinkHandle,
) -> Result<(), FragmenterError> {
    let file = std::fs::File::open(zip_path)
        .map_err(|e| fragmenter_errors::io_error_with_path(&e, zip_path))?;
    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| Classifier::classify_message(&e.to_string()))?;

    let entry_count = archive.len();
    sink.on_event(AppEvent::UnzipStarted {
        module: module_name.to_string(),
        entry_count,
    });

    for i in 0..entry_count {
        let mut entry = archive
            .by_index(i)
            .map_err(|e| Classifier::classify_message(&e.to_string()))?;
        let entry_name = entry.name().to_string();

        let outpath: PathBuf = match entry.enclosed_name() {
            Some(path) => dest_dir.join(path),
            None => continue,
        };

        if entry.is_dir() {
            std::fs::create_dir_all(&outpath)
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, &outpath))?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| fragmenter_errors::io_error_with_path(&e, parent))?;
            }
            let mut outfile = std::fs::File::create(&outpath)
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, &outpath))?;
            std::io::copy(&mut entry, &mut outfile)
                .map_err(|e| fragmenter_errors::io_error_with_path(&e, &outpath))?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                let _ = std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode));
            }
        }

        sink.on_event(AppEvent::UnzipProgress {
            module: module_name.to_string(),
            entry_index: i,
            entry_name,
            entry_count,
        });
    }

    Ok(())
}

async fn verify_module_json(dest_dir: &Path, expected_hash: &str) -> Result<(), FragmenterError> {
    let path = dest_dir.join("module.json");
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| FragmenterError::module_json_invalid(format!("missing {}", path.display())))?;
    let parsed: ModuleJson = serde_json::from_slice(&bytes)
        .map_err(|e| FragmenterError::module_json_invalid(e.to_string()))?;

    if parsed.hash != expected_hash {
        return Err(FragmenterError::module_crc_mismatch(expected_hash, &parsed.hash));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use fragmenter_events::NullSink;
    use std::io::Write;
    use std::sync::Arc;

    fn write_sample_zip(path: &Path, hash: &str) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options: zip::write::FileOptions<()> = zip::write::FileOptions::default();
        zip.start_file("module.json", options).unwrap();
        zip.write_all(format!(r#"{{"hash":"{hash}"}}"#).as_bytes())
            .unwrap();
        zip.start_file("payload.txt", options).unwrap();
        zip.write_all(b"contents").unwrap();
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn extracts_and_verifies_matching_hash() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("m.zip");
        write_sample_zip(&zip_path, "deadbeef");
        let dest = dir.path().join("out");
        let sink: SinkHandle = Arc::new(NullSink);

        ModuleDecompressor::extract(&zip_path, &dest, "deadbeef", "m", &sink)
            .await
            .unwrap();
        assert!(dest.join("payload.txt").exists());
    }

    #[tokio::test]
    async fn rejects_hash_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        let zip_path = dir.path().join("m.zip");
        write_sample_zip(&zip_path, "deadbeef");
        let dest = dir.path().join("out");
        let sink: SinkHandle = Arc::new(NullSink);

        let err = ModuleDecompressor::extract(&zip_path, &dest, "cafef00d", "m", &sink)
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ModuleCrcMismatch);
    }
}
