#[allow(dead_code)]
mod common;

use std::path::PathBuf;

use chrono::Utc;
use ndarray::Array2;

use common::{full_sidecar, summary_cell, NightBuilder};
use nightwatch_core::config::RegionOfInterest;
use nightwatch_core::consts::UNAVAILABLE;
use nightwatch_core::fits::{self, Header, Value};
use nightwatch_core::frame::Frame;
use nightwatch_core::pipeline::{dispatch_frame, DispatchOptions, PipelineStage, RowField};
use nightwatch_core::processor::ToolchainProcessor;

/// 64x64 FITS frame with a tangent-plane WCS centred 0.05 degree north of
/// the sidecar's commanded pointing.
fn solved_fits_frame(night: &NightBuilder) -> Frame {
    let scale = night.config.telescope.pixel_scale() / 3600.0;
    let mut header = Header::new();
    header.set("CTYPE1", Value::Str("RA---TAN".into()));
    header.set("CTYPE2", Value::Str("DEC--TAN".into()));
    header.set("CRVAL1", Value::Float(150.0));
    header.set("CRVAL2", Value::Float(20.05));
    header.set("CRPIX1", Value::Float(32.5));
    header.set("CRPIX2", Value::Float(32.5));
    header.set("CD1_1", Value::Float(-scale));
    header.set("CD1_2", Value::Float(0.0));
    header.set("CD2_1", Value::Float(0.0));
    header.set("CD2_2", Value::Float(scale));
    let data = Array2::from_shape_fn((64, 64), |(r, c)| 1000.0 + (r * 64 + c) as f32);

    let path = night.layout.raw_dir.join("IMG0_0001.fits");
    fits::write_image(&path, &header, &data).unwrap();
    night.write_sidecar(1, &full_sidecar("OBJECT"));
    Frame::from_path(&path, Utc::now()).unwrap()
}

/// Extractor that exits cleanly without writing a catalog.
#[cfg(unix)]
fn silent_extractor(dir: &std::path::Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("sex");
    std::fs::write(&path, "#!/bin/sh\nexit 0\n").unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

// ----------------------------------------------------------------------------
// Degraded stages
// ----------------------------------------------------------------------------

#[cfg(unix)]
#[test]
fn test_fits_frame_measured_without_catalog() {
    let bin = tempfile::tempdir().unwrap();
    let mut night = NightBuilder::new();
    night.config.telescope.roi = RegionOfInterest::Central { fraction: 0.5 };
    night.config.tools.sextractor.program = silent_extractor(bin.path());
    night.config.tools.solve_field.program = PathBuf::from("/nonexistent/bin/solve-field");
    let frame = solved_fits_frame(&night);
    let processor = ToolchainProcessor::new(night.config.tools.clone());

    let report =
        dispatch_frame(&frame, &night.config, &processor, DispatchOptions::default()).unwrap();

    // The catalog never appeared, so only extraction degrades.
    assert_eq!(report.issues.len(), 1);
    assert_eq!(report.issues[0].stage, PipelineStage::ExtractSources);

    let err = report.measurements.pointing_error_arcmin.unwrap();
    assert!((err - 3.0).abs() < 0.01, "pointing error {err}");
    assert_eq!(report.measurements.target.as_deref(), Some("Field 12"));

    assert_eq!(report.jpegs.len(), 2);
    for jpeg in &report.jpegs {
        let img = image::open(jpeg).unwrap();
        assert!(img.width() > 0);
    }
    let crop = image::open(&report.jpegs[1]).unwrap();
    assert_eq!((crop.width(), crop.height()), (32, 32));

    let row = &night.summary_rows()[0];
    assert_eq!(summary_cell(row, RowField::FileName), "IMG0_0001.fits");
    assert_eq!(summary_cell(row, RowField::Fwhm), UNAVAILABLE);
    assert_eq!(summary_cell(row, RowField::PointingError), "3.0");
    assert_eq!(night.tmp_entries(), 0);
}

// ----------------------------------------------------------------------------
// Aborted frames
// ----------------------------------------------------------------------------

#[test]
fn test_missing_extractor_aborts_frame() {
    let mut night = NightBuilder::new();
    night.config.tools.sextractor.program = PathBuf::from("/nonexistent/bin/sex");
    night.config.tools.solve_field.program = PathBuf::from("/nonexistent/bin/solve-field");
    let frame = solved_fits_frame(&night);
    let processor = ToolchainProcessor::new(night.config.tools.clone());

    let err = dispatch_frame(&frame, &night.config, &processor, DispatchOptions::default())
        .err()
        .unwrap();

    assert!(err.is_tool_failure(), "{err}");
    assert!(err.to_string().contains("not started"), "{err}");
    assert!(night.summary_rows().is_empty());
    assert_eq!(night.tmp_entries(), 0);
}

#[test]
fn test_missing_input_aborts_before_rows() {
    let night = NightBuilder::new();
    let path = night.layout.raw_dir.join("IMG0_0002.fits");
    let frame = Frame::from_path(&path, Utc::now()).unwrap();
    let processor = ToolchainProcessor::default();

    assert!(dispatch_frame(&frame, &night.config, &processor, DispatchOptions::default()).is_err());
    assert!(night.summary_rows().is_empty());
}
