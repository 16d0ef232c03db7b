//! Sidecar metadata: locating, parsing, and turning it into header cards.

mod overlay;
pub mod sexagesimal;
mod sidecar;

use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::config::NightwatchConfig;
use crate::error::{NightwatchError, Result};
use crate::frame::Frame;
use crate::layout::NightLayout;
use crate::processor::ImageProcessor;

pub use overlay::HeaderOverlay;
pub use sidecar::SidecarMetadata;

/// Where the acquisition system writes this frame's sidecar.
pub fn sidecar_path(config: &NightwatchConfig, frame: &Frame) -> PathBuf {
    NightLayout::of_frame(&config.layout, frame).sidecar_for(&frame.basename)
}

/// Parse the frame's sidecar, failing with `MetadataUnavailable` if it is
/// not there yet.
pub fn read_sidecar(config: &NightwatchConfig, frame: &Frame) -> Result<SidecarMetadata> {
    SidecarMetadata::read(&sidecar_path(config, frame))
}

/// Header overlay from the sidecar alone (no site cards).
pub fn read_overlay(config: &NightwatchConfig, frame: &Frame) -> Result<HeaderOverlay> {
    let meta = read_sidecar(config, frame)?;
    Ok(HeaderOverlay::from_sidecar(&meta, &frame.night))
}

/// Write sidecar facts and the site location into the working copy's header.
///
/// A missing sidecar only costs the sidecar cards: the site cards are merged
/// regardless. Returns the overlay that was applied.
pub fn merge_into_working(
    config: &NightwatchConfig,
    frame: &Frame,
    working: &Path,
    processor: &dyn ImageProcessor,
) -> Result<HeaderOverlay> {
    let mut overlay = match read_overlay(config, frame) {
        Ok(overlay) => overlay,
        Err(NightwatchError::MetadataUnavailable(path)) => {
            warn!(path = %path.display(), "No sidecar metadata; keeping existing header values");
            HeaderOverlay::new()
        }
        Err(e) => return Err(e),
    };
    overlay.extend(HeaderOverlay::site(&config.site));
    debug!(cards = overlay.len(), "Merging header overlay");
    processor.merge_header(working, &overlay)?;
    Ok(overlay)
}
