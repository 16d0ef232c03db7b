use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::{RegionOfInterest, ToolsConfig};
use crate::error::{NightwatchError, Result};
use crate::fits::{self, Header};
use crate::frame::Frame;
use crate::metadata::HeaderOverlay;

use super::{
    astrometry, calibrate, convert, extract, render, CropBox, ExtractionParams, ImageProcessor,
    RenderRequest, SolveHint, Source,
};

/// `ImageProcessor` backed by `dcraw`, `solve-field` and SExtractor, with
/// FITS handling, calibration and rendering done in-process.
#[derive(Clone, Debug, Default)]
pub struct ToolchainProcessor {
    tools: ToolsConfig,
}

impl ToolchainProcessor {
    pub fn new(tools: ToolsConfig) -> Self {
        Self { tools }
    }
}

fn scratch_dir(image: &Path) -> &Path {
    image.parent().unwrap_or_else(|| Path::new("."))
}

impl ImageProcessor for ToolchainProcessor {
    fn acquire(&self, frame: &Frame, workdir: &Path) -> Result<PathBuf> {
        if !frame.path.is_file() {
            return Err(NightwatchError::InputNotFound(frame.path.clone()));
        }
        let working = workdir.join(format!("{}.fits", frame.basename));
        if convert::is_fits(&frame.path) {
            debug!(frame = %frame.basename, "Copying FITS frame");
            fs::copy(&frame.path, &working)?;
        } else {
            convert::raw_to_fits(&self.tools.dcraw, self.tools.channel, &frame.path, &working, workdir)?;
        }
        Ok(working)
    }

    fn read_header(&self, image: &Path) -> Result<Header> {
        fits::read_header(image)
    }

    fn merge_header(&self, image: &Path, overlay: &HeaderOverlay) -> Result<()> {
        fits::update_header(image, |header| overlay.apply(header))
    }

    fn solve_astrometry(&self, image: &Path, hint: &SolveHint) -> Result<bool> {
        astrometry::solve(&self.tools.solve_field, image, hint, scratch_dir(image))
    }

    fn subtract_dark(&self, image: &Path, darks: &[PathBuf]) -> Result<()> {
        calibrate::subtract_dark(image, darks)
    }

    fn crop(&self, image: &Path, roi: &RegionOfInterest, output: &Path) -> Result<Option<CropBox>> {
        calibrate::crop(image, roi, output)
    }

    fn extract_sources(&self, image: &Path, params: &ExtractionParams) -> Result<Vec<Source>> {
        extract::extract(&self.tools.sextractor, image, params, scratch_dir(image))
    }

    fn render_jpeg(&self, request: &RenderRequest) -> Result<PathBuf> {
        render::render_image(request)
    }
}
