use std::path::Path;

use tracing::debug;

use crate::error::Result;

/// What `update_link` had to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LinkUpdate {
    Unchanged,
    Created,
    Replaced,
    /// Target not written yet; whatever is at `link` was left alone.
    TargetMissing,
}

/// Point the symlink at `link` to `target`, recreating it when missing or
/// pointing elsewhere. A regular file in the way is replaced too. Nothing
/// happens until `target` exists, so the link never dangles.
#[cfg(unix)]
pub fn update_link(link: &Path, target: &Path) -> Result<LinkUpdate> {
    use std::{fs, io};

    if !target.exists() {
        debug!(target = %target.display(), "Tonight link target not written yet");
        return Ok(LinkUpdate::TargetMissing);
    }
    let update = match fs::symlink_metadata(link) {
        Ok(meta) if meta.file_type().is_symlink() => {
            if fs::read_link(link)? == target {
                debug!(link = %link.display(), "Tonight link current");
                return Ok(LinkUpdate::Unchanged);
            }
            fs::remove_file(link)?;
            LinkUpdate::Replaced
        }
        Ok(_) => {
            fs::remove_file(link)?;
            LinkUpdate::Replaced
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => LinkUpdate::Created,
        Err(e) => return Err(e.into()),
    };
    if let Some(dir) = link.parent() {
        fs::create_dir_all(dir)?;
    }
    std::os::unix::fs::symlink(target, link)?;
    tracing::info!(link = %link.display(), target = %target.display(), ?update, "Tonight link updated");
    Ok(update)
}

#[cfg(not(unix))]
pub fn update_link(link: &Path, target: &Path) -> Result<LinkUpdate> {
    debug!(link = %link.display(), target = %target.display(), "Symlinks unsupported; not linking");
    Ok(LinkUpdate::Unchanged)
}
