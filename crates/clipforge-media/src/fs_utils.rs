//! Filesystem helpers shared by the cache and the trimmer.

use std::io::ErrorKind;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

use crate::error::MediaResult;

/// Rename `src` to `dst`, creating the destination directory when needed.
///
/// Both paths must be on the same filesystem; the cache only ever renames
/// within its own directory.
pub async fn move_file(src: impl AsRef<Path>, dst: impl AsRef<Path>) -> MediaResult<()> {
    let src = src.as_ref();
    let dst = dst.as_ref();

    if let Some(parent) = dst.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::rename(src, dst).await?;
    debug!("Moved {} -> {}", src.display(), dst.display());
    Ok(())
}

/// Remove a file, treating "already gone" as success.
///
/// Returns `true` when a file was actually deleted. Other errors are logged
/// and reported as `false`.
pub async fn remove_if_exists(path: impl AsRef<Path>) -> bool {
    let path = path.as_ref();
    match fs::remove_file(path).await {
        Ok(()) => true,
        Err(e) if e.kind() == ErrorKind::NotFound => false,
        Err(e) => {
            warn!("Failed to remove {}: {}", path.display(), e);
            false
        }
    }
}
