use chrono::{DateTime, Utc};

use super::coords::{angular_separation, julian_date, Equatorial};

fn sin_d(deg: f64) -> f64 {
    deg.to_radians().sin()
}

fn cos_d(deg: f64) -> f64 {
    deg.to_radians().cos()
}

fn ecliptic_to_equatorial(lambda: f64, beta: f64, epsilon: f64) -> Equatorial {
    let (l, b, e) = (lambda.to_radians(), beta.to_radians(), epsilon.to_radians());
    let ra = (l.sin() * e.cos() - b.tan() * e.sin()).atan2(l.cos());
    let dec = (b.sin() * e.cos() + b.cos() * e.sin() * l.sin()).asin();
    Equatorial {
        ra_deg: ra.to_degrees().rem_euclid(360.0),
        dec_deg: dec.to_degrees(),
    }
}

fn obliquity(days: f64) -> f64 {
    23.439 - 0.000_000_4 * days
}

/// Apparent solar position, good to about 0.01 degree.
pub fn sun_position(time: DateTime<Utc>) -> Equatorial {
    let n = julian_date(time) - 2_451_545.0;
    let mean_longitude = 280.460 + 0.985_647_4 * n;
    let mean_anomaly = 357.528 + 0.985_600_3 * n;
    let lambda = mean_longitude + 1.915 * sin_d(mean_anomaly) + 0.020 * sin_d(2.0 * mean_anomaly);
    ecliptic_to_equatorial(lambda.rem_euclid(360.0), 0.0, obliquity(n))
}

/// Geocentric lunar position from the principal periodic terms, good to a
/// few tenths of a degree.
pub fn moon_position(time: DateTime<Utc>) -> Equatorial {
    let n = julian_date(time) - 2_451_545.0;
    let t = n / 36_525.0;
    let lambda = 218.32 + 481_267.881 * t
        + 6.29 * sin_d(135.0 + 477_198.87 * t)
        - 1.27 * sin_d(259.3 - 413_335.36 * t)
        + 0.66 * sin_d(235.7 + 890_534.22 * t)
        + 0.21 * sin_d(269.9 + 954_397.74 * t)
        - 0.19 * sin_d(357.5 + 35_999.05 * t)
        - 0.11 * sin_d(186.5 + 966_404.03 * t);
    let beta = 5.13 * sin_d(93.3 + 483_202.02 * t)
        + 0.28 * sin_d(228.2 + 960_400.89 * t)
        - 0.28 * sin_d(318.3 + 6_003.15 * t)
        - 0.17 * sin_d(217.6 - 407_332.21 * t);
    ecliptic_to_equatorial(lambda.rem_euclid(360.0), beta, obliquity(n))
}

/// Illuminated fraction of the lunar disc, 0 (new) to 1 (full).
pub fn moon_illumination(time: DateTime<Utc>) -> f64 {
    let elongation = angular_separation(sun_position(time), moon_position(time));
    (1.0 - cos_d(elongation)) / 2.0
}
