//! The image-processing collaborator the dispatcher drives.
//!
//! `ImageProcessor` is the seam between the control logic and the heavy
//! lifting. `ToolchainProcessor` implements it with `dcraw`, `solve-field`,
//! SExtractor and in-process FITS/JPEG handling; tests substitute fakes.

mod astrometry;
mod calibrate;
pub mod convert;
mod extract;
mod render;
mod toolchain;

use std::path::{Path, PathBuf};

use crate::config::{Orientation, RegionOfInterest, TelescopeConfig};
use crate::error::Result;
use crate::fits::Header;
use crate::frame::Frame;
use crate::metadata::HeaderOverlay;

pub use astrometry::SolveHint;
pub use extract::parse_catalog;
pub use render::{render_image, stretch_limits};
pub use toolchain::ToolchainProcessor;

/// One detected source from the extraction catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct Source {
    /// 1-based pixel position.
    pub x: f64,
    pub y: f64,
    pub fwhm_pix: f64,
    pub ellipticity: f64,
    pub background: f64,
    pub flags: u32,
}

impl Source {
    /// Clean, resolved detection usable for image-quality statistics.
    pub fn is_star(&self) -> bool {
        self.flags == 0 && self.fwhm_pix > 0.0 && self.fwhm_pix.is_finite()
    }
}

/// Telescope-specific detection parameters handed to the extractor.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractionParams {
    pub detect_threshold: f64,
    pub phot_aperture_pix: f64,
    pub seeing_arcsec: f64,
    pub saturation_adu: f64,
    pub gain: f64,
    pub pixel_scale: f64,
}

impl ExtractionParams {
    pub fn for_telescope(telescope: &TelescopeConfig) -> Self {
        let ex = &telescope.extractor;
        Self {
            detect_threshold: ex.detect_threshold,
            phot_aperture_pix: ex.phot_aperture_pix,
            seeing_arcsec: ex.seeing_arcsec,
            saturation_adu: ex.saturation_adu,
            gain: telescope.gain,
            pixel_scale: telescope.pixel_scale(),
        }
    }
}

/// Zero-based pixel box `(x, y, width, height)` kept by a crop.
pub type CropBox = (usize, usize, usize, usize);

/// What to draw and where to write it.
#[derive(Clone, Debug)]
pub struct RenderRequest {
    pub image: PathBuf,
    pub output: PathBuf,
    /// Block size for downsampling; 1 keeps full resolution.
    pub binning: usize,
    pub orientation: Orientation,
    /// 1-based pixel positions to circle.
    pub stars: Vec<(f64, f64)>,
    /// 1-based pixel position of the commanded pointing.
    pub pointing: Option<(f64, f64)>,
}

/// Operations the pipeline dispatcher delegates.
///
/// Every path argument refers to a file inside the run's scratch
/// directory except the frame itself, which is never modified.
pub trait ImageProcessor {
    /// Write a scientific-image working copy of `frame` into `workdir` and
    /// return its path.
    fn acquire(&self, frame: &Frame, workdir: &Path) -> Result<PathBuf>;

    fn read_header(&self, image: &Path) -> Result<Header>;

    /// Update the header of `image` in place.
    fn merge_header(&self, image: &Path, overlay: &HeaderOverlay) -> Result<()>;

    /// Attach a world-coordinate solution to `image`.
    ///
    /// `Ok(false)` means the solver ran but found no solution.
    fn solve_astrometry(&self, image: &Path, hint: &SolveHint) -> Result<bool>;

    /// Subtract the combined `darks` from `image` in place.
    fn subtract_dark(&self, image: &Path, darks: &[PathBuf]) -> Result<()>;

    /// Write the region of interest of `image` to `output`. `None` when the
    /// region lies outside the image and nothing was written.
    fn crop(&self, image: &Path, roi: &RegionOfInterest, output: &Path) -> Result<Option<CropBox>>;

    fn extract_sources(&self, image: &Path, params: &ExtractionParams) -> Result<Vec<Source>>;

    fn render_jpeg(&self, request: &RenderRequest) -> Result<PathBuf>;
}
