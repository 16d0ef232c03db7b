use std::fs::{self, File};
use std::io::BufWriter;
use std::path::PathBuf;

use image::codecs::jpeg::JpegEncoder;
use image::{imageops, Rgb, RgbImage};
use ndarray::Array2;
use tracing::debug;

use crate::config::Orientation;
use crate::consts::{JPEG_QUALITY, JPEG_STRETCH_HIGH, JPEG_STRETCH_LOW};
use crate::error::Result;
use crate::fits;

use super::RenderRequest;

const STAR_COLOUR: Rgb<u8> = Rgb([0, 255, 0]);
const POINTING_COLOUR: Rgb<u8> = Rgb([255, 64, 64]);
const STAR_RADIUS: i64 = 6;
const CROSSHAIR_ARM: i64 = 15;
/// Pixels sampled when estimating stretch percentiles.
const STRETCH_SAMPLES: usize = 100_000;

/// Low/high display limits at the configured percentiles.
pub fn stretch_limits(data: &Array2<f32>) -> (f32, f32) {
    let step = (data.len() / STRETCH_SAMPLES).max(1);
    let mut sample: Vec<f32> = data.iter().step_by(step).copied().filter(|v| v.is_finite()).collect();
    if sample.is_empty() {
        return (0.0, 1.0);
    }
    sample.sort_unstable_by(|a, b| a.total_cmp(b));
    let at = |q: f32| sample[((sample.len() - 1) as f32 * q).round() as usize];
    let (lo, hi) = (at(JPEG_STRETCH_LOW), at(JPEG_STRETCH_HIGH));
    if hi > lo {
        (lo, hi)
    } else {
        (lo, lo + 1.0)
    }
}

/// Block-average `factor` x `factor` pixels; partial edge blocks are dropped.
fn bin(data: &Array2<f32>, factor: usize) -> Array2<f32> {
    if factor <= 1 {
        return data.clone();
    }
    let (h, w) = data.dim();
    let (bh, bw) = ((h / factor).max(1), (w / factor).max(1));
    Array2::from_shape_fn((bh, bw), |(r, c)| {
        let rows = r * factor..((r + 1) * factor).min(h);
        let cols = c * factor..((c + 1) * factor).min(w);
        let block = data.slice(ndarray::s![rows, cols]);
        block.sum() / block.len().max(1) as f32
    })
}

/// Map a 1-based FITS position to display pixel coordinates. FITS rows
/// count up from the bottom.
fn to_display(x: f64, y: f64, binning: usize, height: u32) -> (i64, i64) {
    let b = binning.max(1) as f64;
    let col = ((x - 1.0) / b).round() as i64;
    let row = height as i64 - 1 - ((y - 1.0) / b).round() as i64;
    (col, row)
}

fn put(img: &mut RgbImage, x: i64, y: i64, colour: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < img.width() && (y as u32) < img.height() {
        img.put_pixel(x as u32, y as u32, colour);
    }
}

fn draw_circle(img: &mut RgbImage, cx: i64, cy: i64, radius: i64, colour: Rgb<u8>) {
    let steps = (radius * 8).max(16);
    for i in 0..steps {
        let t = i as f64 / steps as f64 * std::f64::consts::TAU;
        let x = cx + (radius as f64 * t.cos()).round() as i64;
        let y = cy + (radius as f64 * t.sin()).round() as i64;
        put(img, x, y, colour);
    }
}

fn draw_crosshair(img: &mut RgbImage, cx: i64, cy: i64, arm: i64, colour: Rgb<u8>) {
    for d in -arm..=arm {
        put(img, cx + d, cy, colour);
        put(img, cx, cy + d, colour);
    }
}

fn orient(img: RgbImage, orientation: &Orientation) -> RgbImage {
    let mut img = img;
    if orientation.rotate_180 {
        img = imageops::rotate180(&img);
    }
    if orientation.flip_horizontal {
        img = imageops::flip_horizontal(&img);
    }
    if orientation.flip_vertical {
        img = imageops::flip_vertical(&img);
    }
    img
}

/// Render the request's image as an annotated JPEG.
pub fn render_image(request: &RenderRequest) -> Result<PathBuf> {
    let source = fits::read_image(&request.image)?;
    let binned = bin(&source.data, request.binning);
    let (lo, hi) = stretch_limits(&binned);
    let (h, w) = binned.dim();

    let mut img = RgbImage::new(w as u32, h as u32);
    for ((row, col), &v) in binned.indexed_iter() {
        let level = (((v - lo) / (hi - lo)).clamp(0.0, 1.0) * 255.0) as u8;
        img.put_pixel(col as u32, (h - 1 - row) as u32, Rgb([level, level, level]));
    }

    let height = img.height();
    for &(x, y) in &request.stars {
        let (cx, cy) = to_display(x, y, request.binning, height);
        draw_circle(&mut img, cx, cy, STAR_RADIUS, STAR_COLOUR);
    }
    if let Some((x, y)) = request.pointing {
        let (cx, cy) = to_display(x, y, request.binning, height);
        draw_crosshair(&mut img, cx, cy, CROSSHAIR_ARM, POINTING_COLOUR);
    }
    let img = orient(img, &request.orientation);

    if let Some(dir) = request.output.parent() {
        fs::create_dir_all(dir)?;
    }
    let mut writer = BufWriter::new(File::create(&request.output)?);
    JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(&img)?;
    debug!(output = %request.output.display(), width = img.width(), height = img.height(), "Rendered JPEG");
    Ok(request.output.clone())
}
