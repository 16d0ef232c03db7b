use std::ffi::OsString;
use std::path::Path;

use tracing::{debug, info};

use crate::astro::Equatorial;
use crate::config::ToolConfig;
use crate::error::Result;
use crate::fits;
use crate::process::run_tool;

/// What the solver is told up front to narrow its search.
#[derive(Clone, Debug, PartialEq)]
pub struct SolveHint {
    /// Expected plate scale, arcsec per pixel.
    pub pixel_scale: f64,
    /// Commanded pointing, if the header has one.
    pub target: Option<Equatorial>,
    /// Search radius around `target`, degrees.
    pub radius_deg: f64,
}

/// Allowed deviation from the nominal plate scale.
const SCALE_TOLERANCE: f64 = 0.1;

fn solver_args(image: &Path, hint: &SolveHint, outdir: &Path, cpu_limit: u64) -> Vec<OsString> {
    let mut args: Vec<OsString> = [
        "--overwrite",
        "--no-plots",
        "--no-remove-lines",
        "--new-fits",
        "none",
        "--corr",
        "none",
        "--match",
        "none",
        "--rdls",
        "none",
        "--index-xyls",
        "none",
        "--scale-units",
        "arcsecperpix",
    ]
    .iter()
    .map(OsString::from)
    .collect();
    let scale = |v: f64| OsString::from(format!("{v:.3}"));
    args.push("--scale-low".into());
    args.push(scale(hint.pixel_scale * (1.0 - SCALE_TOLERANCE)));
    args.push("--scale-high".into());
    args.push(scale(hint.pixel_scale * (1.0 + SCALE_TOLERANCE)));
    if let Some(target) = hint.target {
        args.push("--ra".into());
        args.push(format!("{:.5}", target.ra_deg).into());
        args.push("--dec".into());
        args.push(format!("{:.5}", target.dec_deg).into());
        args.push("--radius".into());
        args.push(format!("{:.2}", hint.radius_deg).into());
    }
    args.push("--cpulimit".into());
    args.push(cpu_limit.to_string().into());
    args.push("--dir".into());
    args.push(outdir.into());
    args.push(image.into());
    args
}

/// Run `solve-field` on `image` and copy the solution into its header.
///
/// Returns `Ok(false)` when the solver finished without a solution.
pub(super) fn solve(tool: &ToolConfig, image: &Path, hint: &SolveHint, outdir: &Path) -> Result<bool> {
    let stem = image
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let solved_marker = outdir.join(format!("{stem}.solved"));
    let wcs_file = outdir.join(format!("{stem}.wcs"));

    let args = solver_args(image, hint, outdir, tool.timeout_secs);
    run_tool(tool, args, Some(outdir), None)?;

    if !solved_marker.is_file() || !wcs_file.is_file() {
        debug!(image = %image.display(), "Solver found no solution");
        return Ok(false);
    }
    let solution = fits::read_header(&wcs_file)?;
    fits::update_header(image, |header| header.merge(&solution))?;
    info!(image = %image.display(), "Astrometric solution attached");
    Ok(true)
}
