//! Atomic persistence of export archives
//!
//! The archive is streamed into a staging file next to its final name and
//! only renamed once every byte is written and synced. Readers therefore never
//! see a partially written `export_<caid>_<handle>.zip`.
//!
//! Each write gets its own staging file (`<final-name>.tmp.<pid>-<seq>`),
//! created exclusively. Overlapping writers for the same archive only race on
//! the final rename, and whichever rename lands last leaves its complete body.

use crate::error::{Error, Result};
use crate::types::Artifact;
use crate::validation::{
    validate_account_id, validate_file_path, validate_handle, validate_output_dir,
};
use futures::TryStreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;

/// Size of each read from the response body
pub const COPY_CHUNK_SIZE: usize = 32 * 1024;

/// Final path of the archive for `account_id` and `handle`
pub fn artifact_path(output_dir: &Path, account_id: i64, handle: &str) -> PathBuf {
    output_dir.join(format!("export_{account_id}_{handle}.zip"))
}

static STAGING_SEQ: AtomicU64 = AtomicU64::new(0);

/// A fresh staging path for one write of `final_path`
///
/// Every call returns a different path, unique across processes.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let seq = STAGING_SEQ.fetch_add(1, Ordering::Relaxed);
    let mut staged = final_path.as_os_str().to_owned();
    staged.push(format!(".tmp.{}-{seq}", std::process::id()));
    PathBuf::from(staged)
}

/// True if `path` looks like a staging file produced by [`temp_path`]
pub fn is_staging_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.contains(".zip.tmp."))
}

/// Adapt a live response into a byte reader without buffering the body
pub fn body_reader(response: reqwest::Response) -> impl AsyncRead + Unpin {
    let stream = response.bytes_stream().map_err(std::io::Error::other);
    StreamReader::new(Box::pin(stream))
}

/// Stream `body` into the archive file for `account_id` and `handle`
///
/// Inputs are validated before the filesystem is touched. On any failure, and
/// when the returned future is dropped early, the temp file is removed and no
/// file appears at the final path.
pub async fn save_export<R>(
    output_dir: &Path,
    account_id: i64,
    handle: &str,
    mut body: R,
) -> Result<Artifact>
where
    R: AsyncRead + Unpin,
{
    validate_account_id(account_id)?;
    let handle = validate_handle(handle)?;
    validate_output_dir(output_dir)?;

    let final_path = artifact_path(output_dir, account_id, handle);
    let staged_path = temp_path(&final_path);
    validate_file_path(&staged_path)?;

    create_output_dir(output_dir).await?;

    // No await between creating the file and arming the guard, or a dropped
    // future could leave the file behind. The async handle is declared after
    // the guard so it closes before removal.
    let file = open_temp_file(&staged_path)?;
    let mut guard = TempFileGuard::new(staged_path.clone());
    let mut file = tokio::fs::File::from_std(file);

    let bytes = copy_body(&mut body, &mut file, &staged_path).await?;

    file.flush()
        .await
        .map_err(|e| Error::io("failed to flush temp file", &staged_path, e))?;
    file.sync_all()
        .await
        .map_err(|e| Error::io("failed to sync temp file", &staged_path, e))?;
    drop(file);

    tokio::fs::rename(&staged_path, &final_path)
        .await
        .map_err(|e| Error::io("failed to rename temp file to final file", &final_path, e))?;
    guard.disarm();

    tracing::info!(
        path = %final_path.display(),
        bytes,
        "Export file downloaded successfully"
    );

    Ok(Artifact {
        path: final_path,
        bytes,
    })
}

async fn create_output_dir(output_dir: &Path) -> Result<()> {
    if output_dir.as_os_str().is_empty() {
        return Ok(());
    }

    let mut builder = tokio::fs::DirBuilder::new();
    builder.recursive(true);
    #[cfg(unix)]
    builder.mode(0o750);

    builder.create(output_dir).await.map_err(|e| {
        tracing::error!(error = %e, path = %output_dir.display(), "Failed to create output directory");
        Error::io("failed to create output directory", output_dir, e)
    })
}

fn open_temp_file(path: &Path) -> Result<std::fs::File> {
    let mut options = std::fs::OpenOptions::new();
    options.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    options.open(path).map_err(|e| {
        tracing::error!(error = %e, path = %path.display(), "Failed to create temp file");
        Error::io("failed to create temp file", path, e)
    })
}

async fn copy_body<R>(body: &mut R, file: &mut tokio::fs::File, staged_path: &Path) -> Result<u64>
where
    R: AsyncRead + Unpin,
{
    let mut buffer = vec![0u8; COPY_CHUNK_SIZE];
    let mut total: u64 = 0;

    loop {
        let read = body.read(&mut buffer).await.map_err(|e| {
            tracing::error!(error = %e, "Error reading response body");
            Error::io("error reading response body", staged_path, e)
        })?;
        if read == 0 {
            return Ok(total);
        }

        file.write_all(&buffer[..read]).await.map_err(|e| {
            tracing::error!(error = %e, path = %staged_path.display(), "Failed to write to temp file");
            Error::io("failed to write to temp file", staged_path, e)
        })?;
        total += read as u64;
    }
}

/// Removes the staged file on drop unless the rename succeeded
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!(error = %e, path = %self.path.display(), "Failed to remove temp file");
            }
        }
    }
}
