//! Decimal to sexagesimal conversion for header values.
//!
//! The decomposition truncates: whole = floor(v), minutes = floor of the
//! remainder times 60, seconds keep the rest and are printed with one
//! decimal. Signs are handled on the magnitude so negative declinations
//! decompose the same way as positive ones.

/// A value split into whole units, minutes and seconds.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sexagesimal {
    pub negative: bool,
    pub whole: u32,
    pub minutes: u32,
    pub seconds: f64,
}

impl Sexagesimal {
    pub fn decompose(value: f64) -> Self {
        let negative = value < 0.0;
        let magnitude = value.abs();
        let whole = magnitude.floor();
        let minutes_full = (magnitude - whole) * 60.0;
        let minutes = minutes_full.floor();
        let seconds = (minutes_full - minutes) * 60.0;
        Self {
            negative,
            whole: whole as u32,
            minutes: minutes as u32,
            seconds,
        }
    }

    /// `HH:MM:SS.s` without a sign.
    pub fn format_unsigned(&self) -> String {
        format!("{:02}:{:02}:{:.1}", self.whole, self.minutes, self.seconds)
    }

    /// `±DD:MM:SS.s`
    pub fn format_signed(&self) -> String {
        let sign = if self.negative { '-' } else { '+' };
        format!("{sign}{}", self.format_unsigned())
    }
}

/// Right ascension in degrees to `HH:MM:SS.s` hours.
pub fn ra_to_sexagesimal(ra_deg: f64) -> String {
    Sexagesimal::decompose(ra_deg / 15.0).format_unsigned()
}

/// Declination in degrees to `±DD:MM:SS.s`.
pub fn dec_to_sexagesimal(dec_deg: f64) -> String {
    Sexagesimal::decompose(dec_deg).format_signed()
}

/// Decimal hours to `HH:MM:SS.s`.
pub fn hours_to_sexagesimal(hours: f64) -> String {
    Sexagesimal::decompose(hours).format_unsigned()
}

/// Night date and UT start hours joined as `YYYY-MM-DDTHH:MM:SS.s`.
pub fn ut_start_timestamp(night: &str, ut_hours: f64) -> String {
    format!("{night}T{}", hours_to_sexagesimal(ut_hours))
}

/// Parse `[±]A:B:C` (or space separated) back to a decimal value.
pub fn parse_sexagesimal(s: &str) -> Option<f64> {
    let s = s.trim();
    let (negative, body) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let parts: Vec<f64> = body
        .split([':', ' '])
        .filter(|p| !p.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<_, _>>()
        .ok()?;
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| *p < 0.0) {
        return None;
    }
    let value = parts
        .iter()
        .zip([1.0, 60.0, 3600.0])
        .map(|(p, div)| p / div)
        .sum::<f64>();
    Some(if negative { -value } else { value })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ra_divides_by_fifteen() {
        assert_eq!(ra_to_sexagesimal(0.0), "00:00:0.0");
        assert_eq!(ra_to_sexagesimal(187.5), "12:30:0.0");
        assert_eq!(ra_to_sexagesimal(83.8221), "05:35:17.3");
    }

    #[test]
    fn test_dec_keeps_sign() {
        assert_eq!(dec_to_sexagesimal(-5.391), "-05:23:27.6");
        assert_eq!(dec_to_sexagesimal(41.269), "+41:16:8.4");
        assert_eq!(dec_to_sexagesimal(-0.5), "-00:30:0.0");
    }

    #[test]
    fn test_ut_start_joins_night() {
        assert_eq!(ut_start_timestamp("2013-08-05", 6.5), "2013-08-05T06:30:0.0");
    }

    #[test]
    fn test_parse_accepts_both_separators() {
        assert_eq!(parse_sexagesimal("12:30:00"), Some(12.5));
        assert_eq!(parse_sexagesimal("-00 30 00"), Some(-0.5));
        assert_eq!(parse_sexagesimal("+10:00"), Some(10.0));
        assert_eq!(parse_sexagesimal("ab:cd"), None);
        assert_eq!(parse_sexagesimal(""), None);
    }

    #[test]
    fn test_ra_round_trip_within_tenth_of_second() {
        let mut ra = 0.0;
        while ra < 360.0 {
            let hours = parse_sexagesimal(&ra_to_sexagesimal(ra)).unwrap();
            let err_seconds = (hours - ra / 15.0).abs() * 3600.0;
            assert!(err_seconds <= 0.05 + 1e-9, "ra {ra}: off by {err_seconds}s");
            ra += 0.731;
        }
    }

    #[test]
    fn test_dec_monotonic_in_magnitude() {
        let mut previous = -1.0;
        let mut dec = 0.0;
        while dec <= 90.0 {
            for signed in [dec, -dec] {
                let parts = Sexagesimal::decompose(signed);
                assert_eq!(parts.negative, signed < 0.0);
                let magnitude =
                    parts.whole as f64 + parts.minutes as f64 / 60.0 + parts.seconds / 3600.0;
                assert!((magnitude - dec).abs() < 1e-9);
            }
            let parsed = parse_sexagesimal(&dec_to_sexagesimal(-dec)).unwrap().abs();
            assert!(parsed + 0.05 / 3600.0 >= previous, "dec {dec} went backwards");
            previous = parsed;
            dec += 0.377;
        }
    }
}
