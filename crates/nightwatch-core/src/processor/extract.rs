use std::collections::HashMap;
use std::ffi::OsString;
use std::fs;
use std::path::Path;

use tracing::debug;

use crate::config::ToolConfig;
use crate::error::{NightwatchError, Result};
use crate::process::run_tool;

use super::{ExtractionParams, Source};

/// Catalog columns requested from SExtractor.
const PARAMETERS: &[&str] = &[
    "NUMBER",
    "X_IMAGE",
    "Y_IMAGE",
    "FWHM_IMAGE",
    "ELLIPTICITY",
    "BACKGROUND",
    "FLAGS",
];

fn extractor_args(image: &Path, params: &ExtractionParams, catalog: &Path, param_file: &Path) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![image.into()];
    let mut opt = |key: &str, value: String| {
        args.push(format!("-{key}").into());
        args.push(value.into());
    };
    opt("CATALOG_NAME", catalog.display().to_string());
    opt("CATALOG_TYPE", "ASCII_HEAD".into());
    opt("PARAMETERS_NAME", param_file.display().to_string());
    opt("DETECT_THRESH", format!("{}", params.detect_threshold));
    opt("ANALYSIS_THRESH", format!("{}", params.detect_threshold));
    opt("PHOT_APERTURES", format!("{}", params.phot_aperture_pix));
    opt("SEEING_FWHM", format!("{}", params.seeing_arcsec));
    opt("SATUR_LEVEL", format!("{}", params.saturation_adu));
    opt("GAIN", format!("{}", params.gain));
    opt("PIXEL_SCALE", format!("{:.3}", params.pixel_scale));
    opt("FILTER", "N".into());
    opt("CHECKIMAGE_TYPE", "NONE".into());
    opt("VERBOSE_TYPE", "QUIET".into());
    args
}

/// Run SExtractor on `image` and read back its catalog.
pub(super) fn extract(tool: &ToolConfig, image: &Path, params: &ExtractionParams, workdir: &Path) -> Result<Vec<Source>> {
    let param_file = workdir.join("nightwatch.param");
    let catalog = workdir.join("nightwatch.cat");
    fs::write(&param_file, PARAMETERS.join("\n") + "\n")?;

    let args = extractor_args(image, params, &catalog, &param_file);
    run_tool(tool, args, Some(workdir), None)?;

    let text = fs::read_to_string(&catalog)?;
    let sources = parse_catalog(&text)?;
    debug!(count = sources.len(), "Sources extracted");
    Ok(sources)
}

/// Parse an `ASCII_HEAD` catalog.
///
/// Header lines look like `#   4 FWHM_IMAGE  FWHM assuming a gaussian core [pixel]`
/// and give the 1-based column of each parameter. Columns may come in any
/// order; rows that do not parse are skipped.
pub fn parse_catalog(text: &str) -> Result<Vec<Source>> {
    let mut columns: HashMap<String, usize> = HashMap::new();
    let mut sources = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix('#') {
            let mut parts = rest.split_whitespace();
            if let (Some(Ok(index)), Some(name)) = (parts.next().map(str::parse::<usize>), parts.next()) {
                columns.insert(name.to_string(), index.saturating_sub(1));
            }
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let get = |name: &str| -> Option<f64> {
            columns.get(name).and_then(|&i| fields.get(i)).and_then(|v| v.parse().ok())
        };
        let (Some(x), Some(y), Some(fwhm)) = (get("X_IMAGE"), get("Y_IMAGE"), get("FWHM_IMAGE")) else {
            continue;
        };
        sources.push(Source {
            x,
            y,
            fwhm_pix: fwhm,
            ellipticity: get("ELLIPTICITY").unwrap_or(f64::NAN),
            background: get("BACKGROUND").unwrap_or(f64::NAN),
            flags: get("FLAGS").map(|f| f as u32).unwrap_or(0),
        });
    }
    if columns.is_empty() && text.lines().any(|l| !l.trim().is_empty()) {
        return Err(NightwatchError::InvalidCatalog(
            "no ASCII_HEAD column description".into(),
        ));
    }
    Ok(sources)
}

#[cfg(test)]
mod tests {
    use super::*;

    const CATALOG: &str = "\
#   1 NUMBER                 Running object number
#   2 X_IMAGE                Object position along x                                    [pixel]
#   3 Y_IMAGE                Object position along y                                    [pixel]
#   4 FWHM_IMAGE             FWHM assuming a gaussian core                              [pixel]
#   5 ELLIPTICITY            1 - B_IMAGE/A_IMAGE
#   6 BACKGROUND             Background at centroid position                            [count]
#   7 FLAGS                  Extraction flags
         1    100.250    200.750     3.512   0.120    1012.5   0
         2     10.000     20.000     2.900   0.050    1001.0   4
         3     55.5       66.5       bad     0.1      1000.0   0
";

    #[test]
    fn test_parse_catalog() {
        let sources = parse_catalog(CATALOG).unwrap();
        assert_eq!(sources.len(), 2);
        let first = &sources[0];
        assert_eq!((first.x, first.y), (100.25, 200.75));
        assert_eq!(first.fwhm_pix, 3.512);
        assert_eq!(first.ellipticity, 0.12);
        assert!(first.is_star());
        assert_eq!(sources[1].flags, 4);
        assert!(!sources[1].is_star());
    }

    #[test]
    fn test_column_order_is_read_from_header() {
        let text = "\
# 1 FWHM_IMAGE
# 2 Y_IMAGE
# 3 X_IMAGE
4.0 20.0 10.0
";
        let sources = parse_catalog(text).unwrap();
        assert_eq!((sources[0].x, sources[0].y, sources[0].fwhm_pix), (10.0, 20.0, 4.0));
        assert!(sources[0].ellipticity.is_nan());
    }

    #[test]
    fn test_empty_catalog() {
        assert!(parse_catalog("").unwrap().is_empty());
        assert!(parse_catalog("# 1 NUMBER\n").unwrap().is_empty());
        assert!(parse_catalog("1 2 3\n").is_err());
    }

    #[test]
    fn test_args_carry_detection_parameters() {
        let params = ExtractionParams {
            detect_threshold: 5.0,
            phot_aperture_pix: 6.0,
            seeing_arcsec: 2.0,
            saturation_adu: 30000.0,
            gain: 1.6,
            pixel_scale: 12.133,
        };
        let args = extractor_args(Path::new("img.fits"), &params, Path::new("c.cat"), Path::new("p.param"));
        let value = |key: &str| {
            let i = args.iter().position(|a| a == key).unwrap();
            args[i + 1].clone()
        };
        assert_eq!(args[0], "img.fits");
        assert_eq!(value("-SATUR_LEVEL"), "30000");
        assert_eq!(value("-PHOT_APERTURES"), "6");
        assert_eq!(value("-GAIN"), "1.6");
        assert_eq!(value("-CATALOG_TYPE"), "ASCII_HEAD");
    }
}
