//! Positional astronomy for the observing-condition columns.
//!
//! Low precision throughout (arcminute level), which is ample for airmass,
//! lunar separation and pointing error on a wide-field camera.

mod coords;
mod ephemeris;
mod wcs;

pub use coords::{
    airmass, angular_separation, equatorial_to_horizontal, gmst_deg, julian_date,
    parse_timestamp, Equatorial, Horizontal,
};
pub use ephemeris::{moon_illumination, moon_position, sun_position};
pub use wcs::Wcs;
