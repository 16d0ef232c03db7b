use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use crate::metadata::sexagesimal::parse_sexagesimal;

/// Julian date of the J2000.0 epoch.
const J2000: f64 = 2_451_545.0;
const UNIX_EPOCH_JD: f64 = 2_440_587.5;

/// Right ascension and declination, degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Equatorial {
    pub ra_deg: f64,
    pub dec_deg: f64,
}

/// Altitude above the horizon and azimuth (north = 0, east = 90), degrees.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Horizontal {
    pub alt_deg: f64,
    pub az_deg: f64,
}

pub fn julian_date(time: DateTime<Utc>) -> f64 {
    let secs = time.timestamp() as f64 + f64::from(time.timestamp_subsec_nanos()) * 1e-9;
    UNIX_EPOCH_JD + secs / 86_400.0
}

/// Greenwich mean sidereal time in degrees, [0, 360).
pub fn gmst_deg(jd: f64) -> f64 {
    let d = jd - J2000;
    let t = d / 36_525.0;
    let gmst = 280.460_618_37 + 360.985_647_366_29 * d + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    gmst.rem_euclid(360.0)
}

/// Great-circle distance between two positions, degrees.
pub fn angular_separation(a: Equatorial, b: Equatorial) -> f64 {
    let (ra1, dec1) = (a.ra_deg.to_radians(), a.dec_deg.to_radians());
    let (ra2, dec2) = (b.ra_deg.to_radians(), b.dec_deg.to_radians());
    let dra = ra2 - ra1;
    // Vincenty form: well conditioned at both small and large separations.
    let num = ((dec2.cos() * dra.sin()).powi(2)
        + (dec1.cos() * dec2.sin() - dec1.sin() * dec2.cos() * dra.cos()).powi(2))
    .sqrt();
    let den = dec1.sin() * dec2.sin() + dec1.cos() * dec2.cos() * dra.cos();
    num.atan2(den).to_degrees()
}

/// Topocentric-free horizontal coordinates for an observer at
/// `latitude`/`longitude` (degrees, east positive).
pub fn equatorial_to_horizontal(
    target: Equatorial,
    latitude: f64,
    longitude: f64,
    time: DateTime<Utc>,
) -> Horizontal {
    let lst = gmst_deg(julian_date(time)) + longitude;
    let ha = (lst - target.ra_deg).to_radians();
    let dec = target.dec_deg.to_radians();
    let lat = latitude.to_radians();

    let sin_alt = dec.sin() * lat.sin() + dec.cos() * lat.cos() * ha.cos();
    let alt = sin_alt.clamp(-1.0, 1.0).asin();
    let az = (-ha.sin() * dec.cos()).atan2(lat.cos() * dec.sin() - lat.sin() * dec.cos() * ha.cos());
    Horizontal {
        alt_deg: alt.to_degrees(),
        az_deg: az.to_degrees().rem_euclid(360.0),
    }
}

/// Plane-parallel airmass, `sec z`. `None` at or below the horizon.
pub fn airmass(alt_deg: f64) -> Option<f64> {
    (alt_deg > 0.0).then(|| 1.0 / alt_deg.to_radians().sin())
}

/// Parse `YYYY-MM-DDTHH:MM:SS[.s]`, including the unpadded seconds written
/// into `DATE-OBS` from sidecar UT start times.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let (date, time) = s.trim().split_once('T')?;
    let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
    let hours = parse_sexagesimal(time)?;
    if !(0.0..24.0).contains(&hours) {
        return None;
    }
    let midnight = Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?);
    let millis = (hours * 3_600_000.0).round() as i64;
    Some(midnight + chrono::Duration::milliseconds(millis))
}
