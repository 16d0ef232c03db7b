use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, error, info, info_span, warn};

use crate::astro::Wcs;
use crate::config::NightwatchConfig;
use crate::error::Result;
use crate::fits::Header;
use crate::frame::Frame;
use crate::layout::{JpegPaths, NightLayout};
use crate::metadata;
use crate::processor::{convert, ExtractionParams, ImageProcessor, RenderRequest, SolveHint};

use super::aggregate::AggregateFiles;
use super::conditions::{
    commanded_pointing, pointing_error_arcmin, position_angle, ObservingConditions,
};
use super::report::{Measurements, RowFormatter};
use super::stats::SourceStats;
use super::types::{DispatchOptions, FrameReport, PipelineStage, StageIssue};
use super::workspace::WorkingFiles;

/// Stage failure policy after acquisition.
///
/// External tool failures end the run; anything else is recorded and the
/// stage's outputs stay unavailable.
fn tolerate<T>(stage: PipelineStage, result: Result<T>, issues: &mut Vec<StageIssue>) -> Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e) if e.is_tool_failure() => {
            error!(%stage, "External tool failed: {e}");
            Err(e)
        }
        Err(e) => {
            warn!(%stage, "{e}; continuing without it");
            issues.push(StageIssue {
                stage,
                message: e.to_string(),
            });
            Ok(None)
        }
    }
}

/// Calibration frames in the night's dark directory, sorted by name.
pub fn find_darks(config: &NightwatchConfig, frame: &Frame) -> Vec<PathBuf> {
    let dir = NightLayout::of_frame(&config.layout, frame).dark_dir;
    let Ok(entries) = fs::read_dir(&dir) else {
        return Vec::new();
    };
    let mut darks: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && convert::is_fits(p))
        .collect();
    darks.sort();
    darks
}

/// Process one frame end to end and append its rows to the night's files.
///
/// Fails only when the working copy cannot be made, an external tool fails,
/// or the rows cannot be written. Scratch files are removed in every case.
pub fn dispatch_frame(
    frame: &Frame,
    config: &NightwatchConfig,
    processor: &dyn ImageProcessor,
    options: DispatchOptions,
) -> Result<FrameReport> {
    let start = Instant::now();
    let _span = info_span!("dispatch", frame = %frame.file_name()).entered();

    // The night log is one of the reset files, so nothing may be logged
    // for this frame before the reset.
    let aggregates = AggregateFiles::new(&config.layout, &config.telescope, &frame.night);
    if options.clobber {
        aggregates.reset()?;
    }
    info!(night = %frame.night, clobber = options.clobber, "Measuring frame");

    let workspace = WorkingFiles::create(&config.layout.tmp_dir, &frame.basename)?;
    let mut run = StageRun::new(frame, config, processor);
    let outcome = run.execute(&workspace);

    // Cleanup runs whether or not the stages above finished.
    if let Err(e) = workspace.cleanup() {
        warn!(stage = %PipelineStage::Cleanup, "Scratch files left behind: {e}");
    }
    if let Err(ref e) = outcome {
        error!(frame = %frame.file_name(), "Run aborted, no rows written: {e}");
    }
    outcome?;

    let elapsed = start.elapsed();
    run.measurements.elapsed_s = Some(elapsed.as_secs_f64());
    debug!(stage = %PipelineStage::Timing, elapsed = ?elapsed);

    let formatter = RowFormatter::from_config(config);
    aggregates.append(&formatter, &run.measurements).inspect_err(|e| {
        error!(stage = %PipelineStage::EmitRows, "{e}");
    })?;

    let m = &run.measurements;
    info!(
        frame = %frame.file_name(),
        fwhm_pix = ?m.fwhm_pix,
        ellipticity = ?m.ellipticity,
        stars = ?m.star_count,
        pointing_arcmin = ?m.pointing_error_arcmin,
        elapsed_s = format!("{:.1}", elapsed.as_secs_f64()),
        "Frame measured"
    );
    Ok(FrameReport {
        basename: frame.basename.clone(),
        night: frame.night.clone(),
        measurements: run.measurements,
        issues: run.issues,
        jpegs: run.jpegs,
        elapsed,
        clobbered: options.clobber,
    })
}

/// Mutable state threaded through stages 1-9.
struct StageRun<'a> {
    frame: &'a Frame,
    config: &'a NightwatchConfig,
    processor: &'a dyn ImageProcessor,
    measurements: Measurements,
    issues: Vec<StageIssue>,
    jpegs: Vec<PathBuf>,
}

impl<'a> StageRun<'a> {
    fn new(frame: &'a Frame, config: &'a NightwatchConfig, processor: &'a dyn ImageProcessor) -> Self {
        Self {
            frame,
            config,
            processor,
            measurements: Measurements {
                file_name: frame.file_name(),
                ..Default::default()
            },
            issues: Vec::new(),
            jpegs: Vec::new(),
        }
    }

    fn tolerate<T>(&mut self, stage: PipelineStage, result: Result<T>) -> Result<Option<T>> {
        tolerate(stage, result, &mut self.issues)
    }

    fn read_header(&mut self, stage: PipelineStage, image: &Path) -> Result<Header> {
        let header = self.processor.read_header(image);
        Ok(self.tolerate(stage, header)?.unwrap_or_default())
    }

    fn execute(&mut self, workspace: &WorkingFiles) -> Result<()> {
        let config = self.config;
        let telescope = &config.telescope;

        debug!(stage = %PipelineStage::Acquire);
        let working = self.processor.acquire(self.frame, workspace.path()).inspect_err(|e| {
            error!(stage = %PipelineStage::Acquire, "Cannot create working copy: {e}");
        })?;

        debug!(stage = %PipelineStage::MergeMetadata);
        let merged = metadata::merge_into_working(config, self.frame, &working, self.processor);
        self.tolerate(PipelineStage::MergeMetadata, merged)?;
        let mut header = self.read_header(PipelineStage::MergeMetadata, &working)?;

        if !header.has_wcs() {
            debug!(stage = %PipelineStage::Solve);
            let hint = SolveHint {
                pixel_scale: telescope.pixel_scale(),
                target: commanded_pointing(&header),
                radius_deg: config.tools.solve_radius_deg,
            };
            let solved = self.processor.solve_astrometry(&working, &hint);
            let solved = self.tolerate(PipelineStage::Solve, solved)?.unwrap_or(false);
            if solved {
                header = self.read_header(PipelineStage::Solve, &working)?;
            } else {
                warn!(frame = %self.frame.basename, "No astrometric solution; pointing error unavailable");
            }
        }

        debug!(stage = %PipelineStage::PointingError);
        let conditions = ObservingConditions::from_header(&header, &config.site);
        let m = &mut self.measurements;
        m.capture_time = header.get_str("DATE-OBS").map(str::to_string);
        m.target = header.get_str("OBJECT").map(str::to_string);
        m.exposure_s = header.get_f64("EXPTIME");
        m.altitude_deg = conditions.altitude_deg;
        m.azimuth_deg = conditions.azimuth_deg;
        m.airmass = conditions.airmass;
        m.moon_separation_deg = conditions.moon_separation_deg;
        m.moon_illumination = conditions.moon_illumination;
        m.pointing_error_arcmin = pointing_error_arcmin(&header);
        m.position_angle_deg = position_angle(&header);

        let darks = find_darks(config, self.frame);
        if darks.is_empty() {
            debug!("No dark frames for this night");
        } else {
            debug!(stage = %PipelineStage::DarkSubtract, darks = darks.len());
            let subtracted = self.processor.subtract_dark(&working, &darks);
            self.tolerate(PipelineStage::DarkSubtract, subtracted)?;
        }

        debug!(stage = %PipelineStage::Crop, roi = %telescope.roi);
        let crop_path = workspace.join(&format!("{}_crop.fits", self.frame.basename));
        let cropped = self.processor.crop(&working, &telescope.roi, &crop_path);
        let crop_box = self.tolerate(PipelineStage::Crop, cropped)?.flatten();
        let analysis = if crop_box.is_some() { &crop_path } else { &working };

        debug!(stage = %PipelineStage::ExtractSources);
        let params = ExtractionParams::for_telescope(telescope);
        let sources = self.processor.extract_sources(analysis, &params);
        let sources = self.tolerate(PipelineStage::ExtractSources, sources)?;

        debug!(stage = %PipelineStage::Statistics);
        let stars: Vec<(f64, f64)> = match &sources {
            Some(sources) => {
                let stats = SourceStats::from_sources(sources);
                let m = &mut self.measurements;
                m.star_count = Some(stats.star_count);
                m.fwhm_pix = stats.fwhm_pix;
                m.fwhm_arcsec = stats.fwhm_pix.map(|f| f * telescope.pixel_scale());
                m.ellipticity = stats.ellipticity;
                m.background = stats.background;
                sources.iter().filter(|s| s.is_star()).map(|s| (s.x, s.y)).collect()
            }
            None => Vec::new(),
        };

        self.render(&header, &working, analysis, crop_box, &stars)
    }

    fn render(
        &mut self,
        header: &Header,
        working: &Path,
        analysis: &Path,
        crop_box: Option<(usize, usize, usize, usize)>,
        stars: &[(f64, f64)],
    ) -> Result<()> {
        let config = self.config;
        let output = &config.output;
        let orientation = &config.telescope.orientation;
        let jpegs = JpegPaths::new(&config.layout, &config.telescope, &self.frame.basename);
        let wcs = Wcs::from_header(header);
        let commanded = commanded_pointing(header);
        let (x0, y0) = crop_box.map(|(x, y, _, _)| (x, y)).unwrap_or((0, 0));
        let marker = |wcs: Option<Wcs>| match (output.mark_pointing, wcs, commanded) {
            (true, Some(wcs), Some(target)) => wcs.world_to_pixel(target),
            _ => None,
        };

        let mut requests = Vec::new();
        if output.full_frame_jpeg {
            requests.push(RenderRequest {
                image: working.to_path_buf(),
                output: jpegs.full,
                binning: output.full_frame_binning,
                orientation: orientation.clone(),
                stars: if output.mark_stars {
                    stars.iter().map(|&(x, y)| (x + x0 as f64, y + y0 as f64)).collect()
                } else {
                    Vec::new()
                },
                pointing: marker(wcs),
            });
        }
        if output.crop_jpeg && crop_box.is_some() {
            requests.push(RenderRequest {
                image: analysis.to_path_buf(),
                output: jpegs.crop,
                binning: output.crop_binning,
                orientation: orientation.clone(),
                stars: if output.mark_stars { stars.to_vec() } else { Vec::new() },
                pointing: marker(wcs.map(|w| w.cropped(x0, y0))),
            });
        }

        for request in requests {
            debug!(stage = %PipelineStage::Render, output = %request.output.display());
            let rendered = self.processor.render_jpeg(&request);
            if let Some(path) = self.tolerate(PipelineStage::Render, rendered)? {
                self.jpegs.push(path);
            }
        }
        Ok(())
    }
}
