//! Primary-HDU FITS access on top of `fitsio`.
//!
//! Header cards are lifted into a [`Header`] so solver output and metadata
//! overlays can be merged before writing back.

mod file;
mod header;

pub use file::{
    read_extension, read_header, read_image, update_header, write_image, write_with_extensions,
    Extension, FitsImage,
};
pub use header::{Card, Header, Value};
