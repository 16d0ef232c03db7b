use std::path::{Path, PathBuf};

use ndarray::{s, Array2};
use rayon::prelude::*;
use tracing::{debug, info};

use crate::config::RegionOfInterest;
use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{NightwatchError, Result};
use crate::fits::{self, Value};

use super::CropBox;

/// Per-pixel median of equally sized frames.
///
/// Uses `select_nth_unstable` for O(n) median without full sort.
/// Parallelizes at the row level for large frames.
pub(super) fn median_combine(frames: &[Array2<f32>]) -> Result<Array2<f32>> {
    let Some(first) = frames.first() else {
        return Err(NightwatchError::InvalidFits("no dark frames to combine".into()));
    };
    let (h, w) = first.dim();
    if let Some(bad) = frames.iter().find(|f| f.dim() != (h, w)) {
        return Err(NightwatchError::InvalidFits(format!(
            "dark frame shape {:?} differs from {:?}",
            bad.dim(),
            (h, w)
        )));
    }
    let n = frames.len();

    let combine_row = |row: usize| {
        let mut pixel_values = vec![0.0f32; n];
        let mut row_result = vec![0.0f32; w];
        for (col, result) in row_result.iter_mut().enumerate() {
            for (i, frame) in frames.iter().enumerate() {
                pixel_values[i] = frame[[row, col]];
            }
            *result = compute_median(&mut pixel_values);
        }
        row_result
    };
    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        (0..h).into_par_iter().map(combine_row).collect()
    } else {
        (0..h).map(combine_row).collect()
    };

    let flat: Vec<f32> = rows.into_iter().flatten().collect();
    Array2::from_shape_vec((h, w), flat).map_err(|e| NightwatchError::InvalidFits(e.to_string()))
}

fn compute_median(values: &mut [f32]) -> f32 {
    let n = values.len();
    if n == 1 {
        values[0]
    } else if n % 2 == 1 {
        *values.select_nth_unstable_by(n / 2, |a, b| a.total_cmp(b)).1
    } else {
        let mid = n / 2;
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        values[..mid].select_nth_unstable_by(mid - 1, |a, b| a.total_cmp(b));
        (values[mid - 1] + values[mid]) / 2.0
    }
}

/// Subtract the median of `darks` from `image`, rewriting it in place.
pub(super) fn subtract_dark(image: &Path, darks: &[PathBuf]) -> Result<()> {
    let mut science = fits::read_image(image)?;
    let frames = darks
        .iter()
        .map(|p| fits::read_image(p).map(|f| f.data))
        .collect::<Result<Vec<_>>>()?;
    let master = median_combine(&frames)?;
    if master.dim() != science.data.dim() {
        return Err(NightwatchError::InvalidFits(format!(
            "master dark {:?} does not match image {:?}",
            master.dim(),
            science.data.dim()
        )));
    }
    science.data -= &master;
    science.header.set("DARKSUB", Value::Bool(true));
    science.header.set("NDARKS", Value::Int(darks.len() as i64));
    fits::write_image(image, &science.header, &science.data)?;
    info!(darks = darks.len(), "Dark subtracted");
    Ok(())
}

/// Write the region of interest of `image` to `output`, shifting the
/// reference pixel so any WCS stays valid.
pub(super) fn crop(image: &Path, roi: &RegionOfInterest, output: &Path) -> Result<Option<CropBox>> {
    let source = fits::read_image(image)?;
    let Some((x, y, w, h)) = roi.pixel_box(source.width(), source.height()) else {
        debug!(%roi, "Region of interest outside image");
        return Ok(None);
    };
    let data = source.data.slice(s![y..y + h, x..x + w]).to_owned();
    let mut header = source.header;
    for (key, offset) in [("CRPIX1", x), ("CRPIX2", y)] {
        if let Some(v) = header.get_f64(key) {
            header.set(key, Value::Float(v - offset as f64));
        }
    }
    fits::write_image(output, &header, &data)?;
    debug!(x, y, width = w, height = h, "Cropped");
    Ok(Some((x, y, w, h)))
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::fits::Header;

    #[test]
    fn test_median_combine_odd_and_even() {
        let a = array![[1.0f32, 10.0]];
        let b = array![[3.0f32, 20.0]];
        let c = array![[2.0f32, 90.0]];
        let odd = median_combine(&[a.clone(), b.clone(), c]).unwrap();
        assert_eq!(odd, array![[2.0, 20.0]]);
        let even = median_combine(&[a, b]).unwrap();
        assert_eq!(even, array![[2.0, 15.0]]);
    }

    #[test]
    fn test_median_combine_rejects_mismatched_shapes() {
        let a = Array2::<f32>::zeros((2, 2));
        let b = Array2::<f32>::zeros((2, 3));
        assert!(median_combine(&[a, b]).is_err());
        assert!(median_combine(&[]).is_err());
    }

    #[test]
    fn test_subtract_dark_in_place() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("sci.fits");
        let dark = dir.path().join("dark.fits");
        fits::write_image(&image, &Header::new(), &Array2::from_elem((4, 4), 100.0)).unwrap();
        fits::write_image(&dark, &Header::new(), &Array2::from_elem((4, 4), 30.0)).unwrap();
        subtract_dark(&image, &[dark]).unwrap();
        let out = fits::read_image(&image).unwrap();
        assert!(out.data.iter().all(|&v| v == 70.0));
        assert_eq!(out.header.get("DARKSUB"), Some(&Value::Bool(true)));
    }

    #[test]
    fn test_crop_shifts_reference_pixel() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("sci.fits");
        let out = dir.path().join("crop.fits");
        let data = Array2::from_shape_fn((10, 12), |(r, c)| (r * 100 + c) as f32);
        let mut header = Header::new();
        header.set("CRPIX1", Value::Float(6.5));
        header.set("CRPIX2", Value::Float(5.5));
        fits::write_image(&image, &header, &data).unwrap();

        let roi = RegionOfInterest::Section { x1: 3, x2: 8, y1: 2, y2: 5 };
        let kept = crop(&image, &roi, &out).unwrap();
        assert_eq!(kept, Some((2, 1, 6, 4)));
        let cropped = fits::read_image(&out).unwrap();
        assert_eq!((cropped.width(), cropped.height()), (6, 4));
        assert_eq!(cropped.data[[0, 0]], 102.0);
        assert_eq!(cropped.header.get_f64("CRPIX1"), Some(4.5));
        assert_eq!(cropped.header.get_f64("CRPIX2"), Some(4.5));
    }

    #[test]
    fn test_crop_outside_image_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("sci.fits");
        let out = dir.path().join("crop.fits");
        fits::write_image(&image, &Header::new(), &Array2::zeros((8, 8))).unwrap();
        assert_eq!(crop(&image, &RegionOfInterest::default(), &out).unwrap(), None);
        assert!(!out.exists());
    }
}
