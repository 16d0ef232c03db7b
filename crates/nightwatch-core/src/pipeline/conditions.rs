use crate::astro::{
    airmass, angular_separation, equatorial_to_horizontal, moon_illumination, moon_position,
    parse_timestamp, Equatorial, Wcs,
};
use crate::config::SiteConfig;
use crate::fits::{Header, Value};
use crate::metadata::sexagesimal::parse_sexagesimal;

/// Commanded pointing from the `RA`/`DEC` cards.
///
/// Strings are sexagesimal (RA in hours); bare numbers are degrees.
pub fn commanded_pointing(header: &Header) -> Option<Equatorial> {
    let ra_deg = match header.get("RA")? {
        Value::Str(s) => parse_sexagesimal(s)? * 15.0,
        other => other.as_f64()?,
    };
    let dec_deg = match header.get("DEC")? {
        Value::Str(s) => parse_sexagesimal(s)?,
        other => other.as_f64()?,
    };
    Some(Equatorial { ra_deg, dec_deg })
}

fn image_size(header: &Header) -> Option<(usize, usize)> {
    let w = header.get_i64("NAXIS1")?;
    let h = header.get_i64("NAXIS2")?;
    (w > 0 && h > 0).then_some((w as usize, h as usize))
}

/// Sky position at the centre of the image, from its WCS.
pub fn solved_center(header: &Header) -> Option<Equatorial> {
    let wcs = Wcs::from_header(header)?;
    let (w, h) = image_size(header)?;
    Some(wcs.center(w, h))
}

/// Distance between solved centre and commanded pointing, arcminutes.
pub fn pointing_error_arcmin(header: &Header) -> Option<f64> {
    let solved = solved_center(header)?;
    let commanded = commanded_pointing(header)?;
    Some(angular_separation(solved, commanded) * 60.0)
}

pub fn position_angle(header: &Header) -> Option<f64> {
    Wcs::from_header(header).map(|wcs| wcs.position_angle())
}

/// Where the telescope was looking and what the sky was doing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObservingConditions {
    pub altitude_deg: Option<f64>,
    pub azimuth_deg: Option<f64>,
    pub airmass: Option<f64>,
    pub moon_separation_deg: Option<f64>,
    pub moon_illumination: Option<f64>,
}

impl ObservingConditions {
    /// Uses the solved centre when there is one, else the commanded pointing.
    pub fn from_header(header: &Header, site: &SiteConfig) -> Self {
        let Some(time) = header.get_str("DATE-OBS").and_then(parse_timestamp) else {
            return Self::default();
        };
        let illumination = Some(moon_illumination(time));
        let Some(target) = solved_center(header).or_else(|| commanded_pointing(header)) else {
            return Self {
                moon_illumination: illumination,
                ..Self::default()
            };
        };
        let horizontal = equatorial_to_horizontal(target, site.latitude, site.longitude, time);
        Self {
            altitude_deg: Some(horizontal.alt_deg),
            azimuth_deg: Some(horizontal.az_deg),
            airmass: airmass(horizontal.alt_deg),
            moon_separation_deg: Some(angular_separation(target, moon_position(time))),
            moon_illumination: illumination,
        }
    }
}
