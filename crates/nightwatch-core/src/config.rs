use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::error::{NightwatchError, Result};
use crate::frame::FramePattern;
use crate::pipeline::RowField;
use crate::retry::RetryPolicy;

/// Everything the classifier, dispatcher, monitor and batch driver need.
///
/// Built once (defaults or TOML) and passed by reference; nothing mutates it
/// after start-up.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct NightwatchConfig {
    #[serde(default)]
    pub site: SiteConfig,
    #[serde(default)]
    pub telescope: TelescopeConfig,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl NightwatchConfig {
    /// Reject values that would make the pipeline meaningless.
    pub fn validate(&self) -> Result<()> {
        let t = &self.telescope;
        if t.focal_length_mm <= 0.0 || t.pixel_size_um <= 0.0 {
            return Err(NightwatchError::InvalidConfig(
                "focal length and pixel size must be positive".into(),
            ));
        }
        if !(-90.0..=90.0).contains(&self.site.latitude) {
            return Err(NightwatchError::InvalidConfig(format!(
                "site latitude {} out of range",
                self.site.latitude
            )));
        }
        if self.monitor.cutoff_hour > 23 {
            return Err(NightwatchError::InvalidConfig(format!(
                "cutoff hour {} out of range",
                self.monitor.cutoff_hour
            )));
        }
        if self.monitor.metadata_retry_secs.is_empty() {
            return Err(NightwatchError::InvalidConfig(
                "metadata retry schedule needs at least one attempt".into(),
            ));
        }
        let tools = self.tools.total_timeout();
        if self.monitor.dispatch_timeout() <= tools {
            return Err(NightwatchError::InvalidConfig(format!(
                "dispatch timeout {} s must exceed the combined tool timeouts ({} s)",
                self.monitor.dispatch_timeout_secs,
                tools.as_secs()
            )));
        }
        if let RegionOfInterest::Central { fraction } = t.roi {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(NightwatchError::InvalidConfig(format!(
                    "ROI fraction {fraction} must be in (0, 1]"
                )));
            }
        }
        Ok(())
    }
}

/// Fixed observatory location, written into every frame header.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SiteConfig {
    pub name: String,
    /// Degrees, north positive.
    pub latitude: f64,
    /// Degrees, east positive.
    pub longitude: f64,
    /// Metres above sea level.
    pub altitude: f64,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Mauna Loa Observatory".into(),
            latitude: 19.5362,
            longitude: -155.5763,
            altitude: 3400.0,
        }
    }
}

/// Optical and sensor description plus measurement thresholds.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelescopeConfig {
    pub name: String,
    pub long_name: String,
    pub focal_length_mm: f64,
    pub aperture_mm: f64,
    pub pixel_size_um: f64,
    /// Electrons per ADU.
    pub gain: f64,
    #[serde(default)]
    pub roi: RegionOfInterest,
    pub threshold_fwhm_pix: f64,
    pub threshold_pointing_arcmin: f64,
    pub threshold_ellipticity: f64,
    #[serde(default)]
    pub extractor: ExtractorConfig,
    #[serde(default)]
    pub orientation: Orientation,
}

impl Default for TelescopeConfig {
    fn default() -> Self {
        Self {
            name: "Panoptes".into(),
            long_name: "Panoptes".into(),
            focal_length_mm: 85.0,
            aperture_mm: 60.7,
            pixel_size_um: 5.0,
            gain: 1.6,
            roi: RegionOfInterest::default(),
            threshold_fwhm_pix: 4.0,
            threshold_pointing_arcmin: 10.0,
            threshold_ellipticity: 0.30,
            extractor: ExtractorConfig::default(),
            orientation: Orientation::default(),
        }
    }
}

impl TelescopeConfig {
    /// Plate scale in arcsec per pixel.
    pub fn pixel_scale(&self) -> f64 {
        self.pixel_size_um * 1.0e-3 / self.focal_length_mm * ARCSEC_PER_RADIAN
    }

    pub fn f_ratio(&self) -> f64 {
        self.focal_length_mm / self.aperture_mm
    }
}

/// Region measured after cropping.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum RegionOfInterest {
    /// Whole frame.
    Full,
    /// One-based inclusive pixel section, as in `[x1:x2,y1:y2]`.
    Section { x1: u32, x2: u32, y1: u32, y2: u32 },
    /// Centred box covering this fraction of each axis.
    Central { fraction: f32 },
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self::Section {
            x1: 1024,
            x2: 3072,
            y1: 1024,
            y2: 3072,
        }
    }
}

impl RegionOfInterest {
    /// Parse an IRAF-style section string such as `[1024:3072,1024:3072]`.
    pub fn parse_section(s: &str) -> Option<Self> {
        let inner = s.trim().strip_prefix('[')?.strip_suffix(']')?;
        let (xs, ys) = inner.split_once(',')?;
        let (x1, x2) = xs.split_once(':')?;
        let (y1, y2) = ys.split_once(':')?;
        let roi = Self::Section {
            x1: x1.trim().parse().ok()?,
            x2: x2.trim().parse().ok()?,
            y1: y1.trim().parse().ok()?,
            y2: y2.trim().parse().ok()?,
        };
        Some(roi)
    }

    /// Zero-based `(x, y, width, height)` clipped to the image, or `None`
    /// if nothing of the region lies inside it.
    pub fn pixel_box(&self, width: usize, height: usize) -> Option<(usize, usize, usize, usize)> {
        let (x0, y0, x1, y1) = match *self {
            Self::Full => (0, 0, width, height),
            Self::Section { x1, x2, y1, y2 } => {
                let (xa, xb) = (x1.min(x2).max(1) as usize, x1.max(x2) as usize);
                let (ya, yb) = (y1.min(y2).max(1) as usize, y1.max(y2) as usize);
                (xa - 1, ya - 1, xb.min(width), yb.min(height))
            }
            Self::Central { fraction } => {
                let w = ((width as f32 * fraction).round() as usize).clamp(1, width.max(1));
                let h = ((height as f32 * fraction).round() as usize).clamp(1, height.max(1));
                let x = (width - w.min(width)) / 2;
                let y = (height - h.min(height)) / 2;
                (x, y, x + w, y + h)
            }
        };
        let x1 = x1.min(width);
        let y1 = y1.min(height);
        if x0 >= x1 || y0 >= y1 {
            return None;
        }
        Some((x0, y0, x1 - x0, y1 - y0))
    }
}

impl fmt::Display for RegionOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full frame"),
            Self::Section { x1, x2, y1, y2 } => write!(f, "[{x1}:{x2},{y1}:{y2}]"),
            Self::Central { fraction } => write!(f, "central {:.0}%", fraction * 100.0),
        }
    }
}

/// Source-extraction tuning for this telescope.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Detection threshold in sigma above background.
    pub detect_threshold: f64,
    /// Photometric aperture diameter in pixels.
    pub phot_aperture_pix: f64,
    /// Seeing estimate in arcsec.
    pub seeing_arcsec: f64,
    /// Saturation level in ADU.
    pub saturation_adu: f64,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            detect_threshold: 5.0,
            phot_aperture_pix: 6.0,
            seeing_arcsec: 2.0,
            saturation_adu: 30_000.0,
        }
    }
}

/// Display orientation applied to rendered JPEGs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Orientation {
    pub rotate_180: bool,
    pub flip_horizontal: bool,
    pub flip_vertical: bool,
}

impl Default for Orientation {
    fn default() -> Self {
        Self {
            rotate_180: true,
            flip_horizontal: false,
            flip_vertical: false,
        }
    }
}

/// Where nights, sidecars and outputs live on disk.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LayoutConfig {
    pub data_root: PathBuf,
    pub raw_dir: String,
    pub metadata_dir: String,
    pub dark_dir: String,
    #[serde(default)]
    pub frames: FramePattern,
    pub logs_dir: PathBuf,
    pub plots_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub tonight_link: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("/skycamdata"),
            raw_dir: DEFAULT_RAW_DIR.into(),
            metadata_dir: DEFAULT_METADATA_DIR.into(),
            dark_dir: DEFAULT_DARK_DIR.into(),
            frames: FramePattern::default(),
            logs_dir: PathBuf::from("/skycamdata/IQMon/Logs"),
            plots_dir: PathBuf::from("/skycamdata/IQMon/Plots"),
            tmp_dir: PathBuf::from("/skycamdata/IQMon/tmp"),
            tonight_link: DEFAULT_TONIGHT_LINK.into(),
        }
    }
}

/// Polling, retry and end-of-night behaviour of the directory monitor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MonitorConfig {
    pub poll_interval_secs: u64,
    pub settle_interval_secs: u64,
    /// Local hour at which the night is over.
    pub cutoff_hour: u32,
    /// Wait before each sidecar lookup attempt.
    pub metadata_retry_secs: Vec<u64>,
    pub dispatch_timeout_secs: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            settle_interval_secs: DEFAULT_SETTLE_INTERVAL_SECS,
            cutoff_hour: DEFAULT_CUTOFF_HOUR,
            metadata_retry_secs: DEFAULT_METADATA_RETRY_SECS.to_vec(),
            dispatch_timeout_secs: DEFAULT_DISPATCH_TIMEOUT_SECS,
        }
    }
}

impl MonitorConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::from_secs(&self.metadata_retry_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_secs(self.settle_interval_secs)
    }

    pub fn dispatch_timeout(&self) -> Duration {
        Duration::from_secs(self.dispatch_timeout_secs)
    }
}

/// An external program and how long it may run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolConfig {
    pub program: PathBuf,
    pub timeout_secs: u64,
}

impl ToolConfig {
    fn new(program: &str, timeout_secs: u64) -> Self {
        Self {
            program: PathBuf::from(program),
            timeout_secs,
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn name(&self) -> String {
        self.program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.display().to_string())
    }
}

/// Colour plane kept when converting a demosaiced raw frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum Channel {
    Red,
    #[default]
    Green,
    Blue,
    Luminance,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Red => write!(f, "Red"),
            Self::Green => write!(f, "Green"),
            Self::Blue => write!(f, "Blue"),
            Self::Luminance => write!(f, "Luminance"),
        }
    }
}

/// External programs used by the toolchain image processor.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    pub dcraw: ToolConfig,
    pub solve_field: ToolConfig,
    pub sextractor: ToolConfig,
    #[serde(default)]
    pub channel: Channel,
    /// Search radius around the commanded pointing for the solver, degrees.
    pub solve_radius_deg: f64,
}

impl ToolsConfig {
    /// Longest a single frame can spend inside external tools.
    pub fn total_timeout(&self) -> Duration {
        [&self.dcraw, &self.solve_field, &self.sextractor]
            .iter()
            .map(|tool| tool.timeout())
            .sum()
    }
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            dcraw: ToolConfig::new("dcraw", DEFAULT_CONVERT_TIMEOUT_SECS),
            solve_field: ToolConfig::new("solve-field", DEFAULT_SOLVE_TIMEOUT_SECS),
            sextractor: ToolConfig::new("sex", DEFAULT_EXTRACT_TIMEOUT_SECS),
            channel: Channel::default(),
            solve_radius_deg: 10.0,
        }
    }
}

/// Shape of the aggregate rows and rendered JPEGs.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OutputConfig {
    pub fields: Vec<RowField>,
    pub unavailable_marker: String,
    pub summary_delimiter: String,
    pub full_frame_jpeg: bool,
    pub crop_jpeg: bool,
    pub full_frame_binning: usize,
    pub crop_binning: usize,
    pub mark_stars: bool,
    pub mark_pointing: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            fields: RowField::ALL.to_vec(),
            unavailable_marker: UNAVAILABLE.into(),
            summary_delimiter: "\t".into(),
            full_frame_jpeg: true,
            crop_jpeg: true,
            full_frame_binning: 4,
            crop_binning: 1,
            mark_stars: true,
            mark_pointing: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panoptes_pixel_scale() {
        let t = TelescopeConfig::default();
        // 5 um / 85 mm
        assert!((t.pixel_scale() - 12.133).abs() < 0.01, "got {}", t.pixel_scale());
        assert!((t.f_ratio() - 1.400).abs() < 0.01);
    }

    #[test]
    fn test_parse_section() {
        let roi = RegionOfInterest::parse_section("[1024:3072, 1024:3072]").unwrap();
        assert_eq!(roi, RegionOfInterest::default());
        assert!(RegionOfInterest::parse_section("1024:3072,1024:3072").is_none());
    }

    #[test]
    fn test_section_pixel_box_is_zero_based_and_clipped() {
        let roi = RegionOfInterest::default();
        assert_eq!(roi.pixel_box(5202, 3465), Some((1023, 1023, 2049, 2049)));
        assert_eq!(roi.pixel_box(2048, 2048), Some((1023, 1023, 1025, 1025)));
        assert_eq!(roi.pixel_box(512, 512), None);
    }

    #[test]
    fn test_central_pixel_box() {
        let roi = RegionOfInterest::Central { fraction: 0.5 };
        assert_eq!(roi.pixel_box(100, 60), Some((25, 15, 50, 30)));
        assert_eq!(RegionOfInterest::Full.pixel_box(10, 20), Some((0, 0, 10, 20)));
    }

    #[test]
    fn test_default_config_validates() {
        NightwatchConfig::default().validate().unwrap();
    }

    #[test]
    fn test_dispatch_timeout_must_cover_tools() {
        let mut config = NightwatchConfig::default();
        assert_eq!(config.tools.total_timeout(), Duration::from_secs(210));
        config.monitor.dispatch_timeout_secs = 150;
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("210"), "{err}");
        config.monitor.dispatch_timeout_secs = 210;
        assert!(config.validate().is_err());
        config.tools.solve_field.timeout_secs = 30;
        config.validate().unwrap();
    }

    #[test]
    fn test_bad_roi_fraction_rejected() {
        let mut config = NightwatchConfig::default();
        config.telescope.roi = RegionOfInterest::Central { fraction: 1.5 };
        assert!(config.validate().is_err());
    }
}
