//! Raw camera frames to FITS via `dcraw`.

use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb};
use ndarray::Array2;
use tracing::{debug, info, warn};

use crate::config::{Channel, ToolConfig};
use crate::error::{NightwatchError, Result};
use crate::fits::{self, Extension, Header, Value};
use crate::process::run_tool;

/// Raw formats `dcraw` is asked to decode.
pub const RAW_EXTENSIONS: &[&str] = &["cr2"];
pub const FITS_EXTENSIONS: &[&str] = &["fits", "fts", "fit"];

fn has_extension(path: &Path, allowed: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| allowed.iter().any(|a| e.eq_ignore_ascii_case(a)))
}

pub fn is_raw(path: &Path) -> bool {
    has_extension(path, RAW_EXTENSIONS)
}

pub fn is_fits(path: &Path) -> bool {
    has_extension(path, FITS_EXTENSIONS)
}

/// Default output for `raw`: same directory and stem, `.fits` extension.
pub fn default_output(raw: &Path) -> PathBuf {
    raw.with_extension("fits")
}

/// Validate paths, then decode `raw` with `dcraw -4 -c` into a 16-bit PPM
/// in `scratch`, reusing one that is already there.
fn decode(
    dcraw: &ToolConfig,
    raw: &Path,
    output: &Path,
    scratch: &Path,
) -> Result<ImageBuffer<Rgb<u16>, Vec<u16>>> {
    if !raw.is_file() {
        return Err(NightwatchError::InputNotFound(raw.to_path_buf()));
    }
    if !is_raw(raw) {
        return Err(NightwatchError::InvalidConfig(format!(
            "{} is not a raw frame (expected .{})",
            raw.display(),
            RAW_EXTENSIONS.join(", .")
        )));
    }
    if !is_fits(output) {
        return Err(NightwatchError::InvalidConfig(format!(
            "{} is not a FITS path (expected .{})",
            output.display(),
            FITS_EXTENSIONS.join(", .")
        )));
    }

    let stem = raw
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "frame".into());
    let ppm = scratch.join(format!("{stem}.ppm"));
    if ppm.is_file() {
        debug!(ppm = %ppm.display(), "Reusing decoded raw");
    } else {
        info!(raw = %raw.display(), "Decoding raw frame");
        let args = [OsStr::new("-4"), OsStr::new("-c"), raw.as_os_str()];
        if let Err(e) = run_tool(dcraw, args, None, Some(&ppm)) {
            // A partial PPM would be picked up as decoded next time.
            if let Err(rm) = fs::remove_file(&ppm) {
                warn!(ppm = %ppm.display(), "Cannot remove partial decode: {rm}");
            }
            return Err(e);
        }
    }
    Ok(image::open(&ppm)?.to_rgb16())
}

fn plane_header(raw: &Path, channel: Channel) -> Header {
    let mut header = Header::new();
    header.set("RAWFILE", Value::Str(raw_file_name(raw)));
    header.set("CHANNEL", Value::Str(channel.to_string()));
    header
}

/// Decode `raw` and write one colour plane as FITS.
pub fn raw_to_fits(
    dcraw: &ToolConfig,
    channel: Channel,
    raw: &Path,
    output: &Path,
    scratch: &Path,
) -> Result<()> {
    let rgb = decode(dcraw, raw, output, scratch)?;
    let data = extract_channel(&rgb, channel);
    fits::write_image(output, &plane_header(raw, channel), &data)?;
    info!(
        output = %output.display(),
        width = data.ncols(),
        height = data.nrows(),
        %channel,
        "Wrote FITS"
    );
    Ok(())
}

/// Decode `raw` and keep all three planes: red as the primary image, green
/// and blue as the `GREEN` and `BLUE` extensions.
pub fn raw_to_fits_all_channels(
    dcraw: &ToolConfig,
    raw: &Path,
    output: &Path,
    scratch: &Path,
) -> Result<()> {
    let rgb = decode(dcraw, raw, output, scratch)?;
    let red = extract_channel(&rgb, Channel::Red);
    let extensions: Vec<Extension> = [("GREEN", Channel::Green), ("BLUE", Channel::Blue)]
        .into_iter()
        .map(|(name, channel)| Extension {
            name: name.into(),
            header: plane_header(raw, channel),
            data: extract_channel(&rgb, channel),
        })
        .collect();
    fits::write_with_extensions(output, &plane_header(raw, Channel::Red), &red, &extensions)?;
    info!(
        output = %output.display(),
        width = red.ncols(),
        height = red.nrows(),
        "Wrote RGB FITS"
    );
    Ok(())
}

fn raw_file_name(raw: &Path) -> String {
    raw.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// One plane of a 16-bit RGB image as ADU values.
pub fn extract_channel(rgb: &ImageBuffer<Rgb<u16>, Vec<u16>>, channel: Channel) -> Array2<f32> {
    let (w, h) = rgb.dimensions();
    Array2::from_shape_fn((h as usize, w as usize), |(row, col)| {
        let Rgb([r, g, b]) = *rgb.get_pixel(col as u32, row as u32);
        match channel {
            Channel::Red => r as f32,
            Channel::Green => g as f32,
            Channel::Blue => b as f32,
            Channel::Luminance => 0.2126 * r as f32 + 0.7152 * g as f32 + 0.0722 * b as f32,
        }
    })
}
