//! Upload sandbox: the directory where incoming files are staged before ingestion.
//!
//! Every staged file gets a random prefix, `{uuid_hex}_{basename}`, so two
//! uploads with the same name never collide and a declared name can never
//! escape the sandbox.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};

use crate::error::{RagError, Result};

const BLOCK_SIZE: usize = 1024 * 1024;

/// A file written into the sandbox.
#[derive(Debug, Clone, Serialize)]
pub struct StagedUpload {
    pub path: PathBuf,
    /// File name inside the sandbox.
    pub saved_as: String,
    /// Name the client declared, reduced to its last path component.
    pub filename: String,
    pub bytes: u64,
}

/// One entry of [`list_uploads`].
#[derive(Debug, Clone, Serialize)]
pub struct UploadEntry {
    pub name: String,
    pub bytes: u64,
    /// Unix seconds, when the platform reports it.
    pub modified: Option<i64>,
}

/// Last path component of a declared name, accepting both separator styles.
pub fn sanitize_filename(declared: &str) -> Option<String> {
    let base = declared
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();
    if base.is_empty() || base == "." || base == ".." {
        None
    } else {
        Some(base.to_string())
    }
}

/// Stream `reader` into the sandbox under a collision-free name.
///
/// A blank name or an empty payload is an input error; an empty file is
/// removed again before returning.
pub async fn stage_upload<R>(dir: &Path, declared_name: &str, mut reader: R) -> Result<StagedUpload>
where
    R: AsyncRead + Unpin,
{
    let filename = sanitize_filename(declared_name)
        .ok_or_else(|| RagError::Input("upload has no filename".to_string()))?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| RagError::io(dir, e))?;

    let saved_as = format!("{}_{}", uuid::Uuid::new_v4().simple(), filename);
    let path = dir.join(&saved_as);

    let written = match copy_blocks(&mut reader, &path).await {
        Ok(written) => written,
        Err(e) => {
            let _ = tokio::fs::remove_file(&path).await;
            return Err(e);
        }
    };

    if written == 0 {
        let _ = tokio::fs::remove_file(&path).await;
        return Err(RagError::Input(format!("{} is empty (0 bytes)", filename)));
    }

    tracing::debug!(file = %filename, saved_as = %saved_as, bytes = written, "upload staged");
    Ok(StagedUpload {
        path,
        saved_as,
        filename,
        bytes: written,
    })
}

async fn copy_blocks<R>(reader: &mut R, path: &Path) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut file = tokio::fs::File::create(path)
        .await
        .map_err(|e| RagError::io(path, e))?;
    let mut buf = vec![0u8; BLOCK_SIZE];
    let mut written = 0u64;

    loop {
        let n = reader.read(&mut buf).await.map_err(|e| RagError::io(path, e))?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n])
            .await
            .map_err(|e| RagError::io(path, e))?;
        written += n as u64;
    }
    file.flush().await.map_err(|e| RagError::io(path, e))?;
    Ok(written)
}

/// Read a staged file back by its `saved_as` name.
///
/// Only the last path component of `saved_name` is used, so `../x` resolves
/// to `x` inside the sandbox. A missing file is an input error.
pub async fn read_upload(dir: &Path, saved_name: &str) -> Result<Vec<u8>> {
    let base = sanitize_filename(saved_name)
        .ok_or_else(|| RagError::Input("upload name is empty".to_string()))?;
    let path = dir.join(&base);
    match tokio::fs::metadata(&path).await {
        Ok(meta) if meta.is_file() => {}
        Ok(_) => return Err(RagError::Input(format!("upload not found: {}", base))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RagError::Input(format!("upload not found: {}", base)));
        }
        Err(e) => return Err(RagError::io(&path, e)),
    }
    tokio::fs::read(&path).await.map_err(|e| RagError::io(&path, e))
}

/// Staged files sorted by name. A missing sandbox lists as empty.
pub async fn list_uploads(dir: &Path) -> Result<Vec<UploadEntry>> {
    let mut read_dir = match tokio::fs::read_dir(dir).await {
        Ok(rd) => rd,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RagError::io(dir, e)),
    };

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(|e| RagError::io(dir, e))? {
        let meta = entry.metadata().await.map_err(|e| RagError::io(entry.path(), e))?;
        if !meta.is_file() {
            continue;
        }
        let modified = meta
            .modified()
            .ok()
            .map(|t| chrono::DateTime::<chrono::Utc>::from(t).timestamp());
        entries.push(UploadEntry {
            name: entry.file_name().to_string_lossy().into_owned(),
            bytes: meta.len(),
            modified,
        });
    }
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(entries)
}
