use std::ffi::{CStr, CString};
use std::os::raw::{c_char, c_int};
use std::path::Path;

use fitsio::hdu::FitsHdu;
use fitsio::images::{ImageDescription, ImageType};
use fitsio::{sys, FitsFile};
use ndarray::Array2;

use super::header::{Card, Header, Value};
use crate::error::{NightwatchError, Result};

// cfitsio buffer sizes, terminator included.
const KEYWORD_LEN: usize = 75;
const VALUE_LEN: usize = 71;
const COMMENT_LEN: usize = 73;

/// Primary image and its header.
#[derive(Clone, Debug)]
pub struct FitsImage {
    pub header: Header,
    /// Physical pixel values, shape = (NAXIS2, NAXIS1).
    pub data: Array2<f32>,
}

impl FitsImage {
    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }
}

fn open(path: &Path) -> Result<FitsFile> {
    if !path.exists() {
        return Err(NightwatchError::InputNotFound(path.to_path_buf()));
    }
    Ok(FitsFile::open(path)?)
}

fn check(status: c_int, what: &str) -> Result<()> {
    if status == 0 {
        Ok(())
    } else {
        Err(NightwatchError::InvalidFits(format!(
            "cfitsio status {status} while {what}"
        )))
    }
}

/// Valued cards of the current HDU in file order. Commentary is skipped.
fn read_cards(fits: &mut FitsFile) -> Result<Header> {
    let mut status = 0;
    let mut count = 0;
    let mut more = 0;
    let fptr = unsafe { fits.as_raw() };
    unsafe { sys::ffghsp(fptr, &mut count, &mut more, &mut status) };
    check(status, "counting header cards")?;

    let mut header = Header::new();
    for n in 1..=count {
        let mut key = [0 as c_char; KEYWORD_LEN];
        let mut value = [0 as c_char; VALUE_LEN];
        let mut comment = [0 as c_char; COMMENT_LEN];
        unsafe {
            sys::ffgkyn(
                fptr,
                n,
                key.as_mut_ptr(),
                value.as_mut_ptr(),
                comment.as_mut_ptr(),
                &mut status,
            )
        };
        check(status, "reading header card")?;
        let key = unsafe { CStr::from_ptr(key.as_ptr()) }.to_string_lossy();
        let value = unsafe { CStr::from_ptr(value.as_ptr()) }.to_string_lossy();
        if matches!(key.as_ref(), "" | "COMMENT" | "HISTORY") {
            continue;
        }
        if let Some(value) = Value::from_raw(&value) {
            header.push(Card::new(&key, value));
        }
    }
    Ok(header)
}

fn write_card(fits: &mut FitsFile, hdu: &FitsHdu, card: &Card) -> Result<()> {
    match &card.value {
        Value::Str(s) => hdu.write_key(fits, &card.key, s.as_str())?,
        Value::Int(i) => hdu.write_key(fits, &card.key, *i)?,
        Value::Float(f) => hdu.write_key(fits, &card.key, *f)?,
        Value::Bool(b) => {
            let key = CString::new(card.key.as_str())
                .map_err(|e| NightwatchError::InvalidFits(e.to_string()))?;
            let comment = CString::default();
            let mut status = 0;
            let fptr = unsafe { fits.as_raw() };
            unsafe {
                sys::ffpkyl(
                    fptr,
                    key.as_ptr(),
                    c_int::from(*b),
                    comment.as_ptr(),
                    &mut status,
                )
            };
            check(status, "writing logical card")?;
        }
    }
    Ok(())
}

/// Read only the primary header.
pub fn read_header(path: &Path) -> Result<Header> {
    let mut fits = open(path)?;
    fits.primary_hdu()?;
    read_cards(&mut fits)
}

/// Read the primary image; cfitsio applies BSCALE/BZERO.
///
/// Cubes are accepted; only the first plane is returned.
pub fn read_image(path: &Path) -> Result<FitsImage> {
    let mut fits = open(path)?;
    let hdu = fits.primary_hdu()?;
    read_plane(&mut fits, &hdu)
}

/// Read the image extension called `name`.
pub fn read_extension(path: &Path, name: &str) -> Result<FitsImage> {
    let mut fits = open(path)?;
    let hdu = fits.hdu(name)?;
    read_plane(&mut fits, &hdu)
}

/// First plane of `hdu`, which must be the current HDU.
fn read_plane(fits: &mut FitsFile, hdu: &FitsHdu) -> Result<FitsImage> {
    let header = read_cards(fits)?;

    let naxis = header.get_i64("NAXIS").unwrap_or(0);
    if naxis < 2 {
        return Err(NightwatchError::InvalidFits(format!(
            "expected an image, NAXIS = {naxis}"
        )));
    }
    let axis = |key: &str| {
        header
            .get_i64(key)
            .and_then(|n| usize::try_from(n).ok())
            .filter(|&n| n > 0)
            .ok_or_else(|| NightwatchError::InvalidFits(format!("bad {key}")))
    };
    let width = axis("NAXIS1")?;
    let height = axis("NAXIS2")?;
    let count = width
        .checked_mul(height)
        .ok_or_else(|| NightwatchError::InvalidFits(format!("{width}x{height} overflows")))?;

    let pixels: Vec<f32> = hdu.read_section(fits, 0, count)?;
    let data = Array2::from_shape_vec((height, width), pixels)
        .map_err(|e| NightwatchError::InvalidFits(e.to_string()))?;
    Ok(FitsImage { header, data })
}

fn dimensions(data: &Array2<f32>) -> [usize; 2] {
    [data.nrows(), data.ncols()]
}

fn write_plane(fits: &mut FitsFile, hdu: &FitsHdu, header: &Header, data: &Array2<f32>) -> Result<()> {
    let pixels: Vec<f32> = data.iter().copied().collect();
    hdu.write_image(fits, &pixels)?;
    for card in header.keywords() {
        write_card(fits, hdu, card)?;
    }
    Ok(())
}

/// Write `data` as a 32-bit float primary image carrying `header`'s
/// non-structural cards. An existing file is replaced.
pub fn write_image(path: &Path, header: &Header, data: &Array2<f32>) -> Result<()> {
    write_with_extensions(path, header, data, &[])
}

/// Named 32-bit float image extension following the primary HDU.
#[derive(Clone, Debug)]
pub struct Extension {
    pub name: String,
    pub header: Header,
    pub data: Array2<f32>,
}

/// Like [`write_image`], then append `extensions` in order.
pub fn write_with_extensions(
    path: &Path,
    header: &Header,
    data: &Array2<f32>,
    extensions: &[Extension],
) -> Result<()> {
    let dims = dimensions(data);
    let primary = ImageDescription {
        data_type: ImageType::Float,
        dimensions: &dims,
    };
    let mut fits = FitsFile::create(path)
        .with_custom_primary(&primary)
        .overwrite()
        .open()?;
    let hdu = fits.primary_hdu()?;
    write_plane(&mut fits, &hdu, header, data)?;

    for ext in extensions {
        let dims = dimensions(&ext.data);
        let image = ImageDescription {
            data_type: ImageType::Float,
            dimensions: &dims,
        };
        let hdu = fits.create_image(ext.name.as_str(), &image)?;
        write_plane(&mut fits, &hdu, &ext.header, &ext.data)?;
    }
    Ok(())
}

/// Rewrite `path` with `update` applied to its primary header.
///
/// The image is rewritten as 32-bit float into a sibling temporary file
/// which then replaces the original, so a failed update leaves it intact.
pub fn update_header(path: &Path, update: impl FnOnce(&mut Header)) -> Result<()> {
    let mut image = read_image(path)?;
    update(&mut image.header);

    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    write_image(tmp.path(), &image.header, &image.data)?;
    tmp.persist(path).map_err(|e| NightwatchError::Io(e.error))?;
    Ok(())
}
