use crate::error::{AgentError, Result};
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::info;

const UPLOAD_NAME: &str = "uploaded.zip";

/// Persists an uploaded archive into a fresh temp directory.
///
/// The returned `TempDir` owns the session's files: dropping it deletes the
/// archive and everything extracted next to it.
pub fn save_upload(bytes: &[u8]) -> Result<(TempDir, PathBuf)> {
    let dir = tempfile::tempdir()?;
    let zip_path = dir.path().join(UPLOAD_NAME);
    fs::write(&zip_path, bytes)?;
    Ok((dir, zip_path))
}

/// Extracts the archive next to itself and returns the extraction directory.
pub fn extract_zip(zip_path: &Path) -> Result<PathBuf> {
    let extract_dir = zip_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));

    let file = File::open(zip_path)?;
    let mut archive = zip::ZipArchive::new(file)?;

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        // enclosed_name rejects entries that would escape the extraction root
        let Some(relative) = entry.enclosed_name().map(Path::to_path_buf) else {
            return Err(AgentError::UnsafeArchiveEntry(entry.name().to_string()));
        };
        let target = extract_dir.join(relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut output = File::create(&target)?;
        std::io::copy(&mut entry, &mut output)?;
    }

    info!("Extracted {} entries to {}", archive.len(), extract_dir.display());
    Ok(extract_dir)
}

/// Recursively collects `.csv`/`.xlsx`/`.xls` files under `dir`, sorted for
/// deterministic load order.
pub fn find_data_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut found = Vec::new();
    walk(dir, &mut found)?;
    found.sort();
    Ok(found)
}

fn walk(dir: &Path, found: &mut Vec<PathBuf>) -> Result<()> {
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, found)?;
        } else if is_data_file(&path) {
            found.push(path);
        }
    }
    Ok(())
}

fn is_data_file(path: &Path) -> bool {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    matches!(extension.as_deref(), Some("csv" | "xlsx" | "xls"))
}
