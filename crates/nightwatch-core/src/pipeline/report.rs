//! Row contents and their HTML / summary renderings.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::{NightwatchConfig, OutputConfig, TelescopeConfig};

/// Columns an aggregate row can carry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowField {
    CaptureTime,
    FileName,
    Target,
    ExposureTime,
    Altitude,
    Azimuth,
    Airmass,
    MoonSeparation,
    MoonIllumination,
    Fwhm,
    Ellipticity,
    Background,
    PointingError,
    PositionAngle,
    StarCount,
    ZeroPoint,
    ElapsedTime,
}

impl RowField {
    pub const ALL: [RowField; 17] = [
        Self::CaptureTime,
        Self::FileName,
        Self::Target,
        Self::ExposureTime,
        Self::Altitude,
        Self::Azimuth,
        Self::Airmass,
        Self::MoonSeparation,
        Self::MoonIllumination,
        Self::Fwhm,
        Self::Ellipticity,
        Self::Background,
        Self::PointingError,
        Self::PositionAngle,
        Self::StarCount,
        Self::ZeroPoint,
        Self::ElapsedTime,
    ];
}

impl fmt::Display for RowField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::CaptureTime => "DateTime",
            Self::FileName => "Filename",
            Self::Target => "Target",
            Self::ExposureTime => "ExpTime(s)",
            Self::Altitude => "Alt(deg)",
            Self::Azimuth => "Az(deg)",
            Self::Airmass => "Airmass",
            Self::MoonSeparation => "MoonSep(deg)",
            Self::MoonIllumination => "MoonIllum(%)",
            Self::Fwhm => "FWHM(pix)",
            Self::Ellipticity => "Ellipticity",
            Self::Background => "Background(ADU)",
            Self::PointingError => "PointingErr(arcmin)",
            Self::PositionAngle => "PA(deg)",
            Self::StarCount => "nStars",
            Self::ZeroPoint => "ZeroPoint",
            Self::ElapsedTime => "ProcessTime(s)",
        };
        f.write_str(label)
    }
}

/// Everything measured for one frame. `None` means unavailable.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Measurements {
    pub capture_time: Option<String>,
    pub file_name: String,
    pub target: Option<String>,
    pub exposure_s: Option<f64>,
    pub altitude_deg: Option<f64>,
    pub azimuth_deg: Option<f64>,
    pub airmass: Option<f64>,
    pub moon_separation_deg: Option<f64>,
    /// Illuminated fraction, 0..1.
    pub moon_illumination: Option<f64>,
    pub fwhm_pix: Option<f64>,
    pub fwhm_arcsec: Option<f64>,
    pub ellipticity: Option<f64>,
    pub background: Option<f64>,
    pub pointing_error_arcmin: Option<f64>,
    pub position_angle_deg: Option<f64>,
    pub star_count: Option<usize>,
    pub zero_point: Option<f64>,
    pub elapsed_s: Option<f64>,
}

impl Measurements {
    /// Plain-text value of one column.
    pub fn cell(&self, field: RowField) -> Option<String> {
        let num = |v: Option<f64>, places: usize| v.map(|v| format!("{v:.places$}"));
        match field {
            RowField::CaptureTime => self.capture_time.clone(),
            RowField::FileName => Some(self.file_name.clone()),
            RowField::Target => self.target.clone(),
            RowField::ExposureTime => num(self.exposure_s, 1),
            RowField::Altitude => num(self.altitude_deg, 1),
            RowField::Azimuth => num(self.azimuth_deg, 1),
            RowField::Airmass => num(self.airmass, 2),
            RowField::MoonSeparation => num(self.moon_separation_deg, 1),
            RowField::MoonIllumination => num(self.moon_illumination.map(|f| f * 100.0), 0),
            RowField::Fwhm => num(self.fwhm_pix, 2),
            RowField::Ellipticity => num(self.ellipticity, 2),
            RowField::Background => num(self.background, 0),
            RowField::PointingError => num(self.pointing_error_arcmin, 1),
            RowField::PositionAngle => num(self.position_angle_deg, 1),
            RowField::StarCount => self.star_count.map(|n| n.to_string()),
            RowField::ZeroPoint => num(self.zero_point, 2),
            RowField::ElapsedTime => num(self.elapsed_s, 1),
        }
    }
}

/// Upper limits above which a cell is flagged in the HTML table.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Thresholds {
    pub fwhm_pix: f64,
    pub ellipticity: f64,
    pub pointing_arcmin: f64,
}

impl Thresholds {
    pub fn for_telescope(t: &TelescopeConfig) -> Self {
        Self {
            fwhm_pix: t.threshold_fwhm_pix,
            ellipticity: t.threshold_ellipticity,
            pointing_arcmin: t.threshold_pointing_arcmin,
        }
    }

    pub fn breached(&self, field: RowField, m: &Measurements) -> bool {
        let over = |v: Option<f64>, limit: f64| v.is_some_and(|v| v > limit);
        match field {
            RowField::Fwhm => over(m.fwhm_pix, self.fwhm_pix),
            RowField::Ellipticity => over(m.ellipticity, self.ellipticity),
            RowField::PointingError => over(m.pointing_error_arcmin, self.pointing_arcmin),
            _ => false,
        }
    }
}

/// Renders rows for the configured column set.
#[derive(Clone, Debug)]
pub struct RowFormatter {
    pub fields: Vec<RowField>,
    pub marker: String,
    pub delimiter: String,
    pub thresholds: Thresholds,
}

impl RowFormatter {
    pub fn new(output: &OutputConfig, telescope: &TelescopeConfig) -> Self {
        Self {
            fields: output.fields.clone(),
            marker: output.unavailable_marker.clone(),
            delimiter: output.summary_delimiter.clone(),
            thresholds: Thresholds::for_telescope(telescope),
        }
    }

    pub fn from_config(config: &NightwatchConfig) -> Self {
        Self::new(&config.output, &config.telescope)
    }

    /// `#`-prefixed column names.
    pub fn summary_header(&self) -> String {
        let names: Vec<String> = self.fields.iter().map(ToString::to_string).collect();
        format!("# {}", names.join(&self.delimiter))
    }

    pub fn summary_row(&self, m: &Measurements) -> String {
        let cells: Vec<String> = self
            .fields
            .iter()
            .map(|&f| m.cell(f).unwrap_or_else(|| self.marker.clone()))
            .collect();
        cells.join(&self.delimiter)
    }

    pub fn html_header_row(&self) -> String {
        let cells: String = self
            .fields
            .iter()
            .map(|f| format!("<th>{}</th>", escape_html(&f.to_string())))
            .collect();
        format!("<tr>{cells}</tr>")
    }

    pub fn html_row(&self, m: &Measurements) -> String {
        let cells: String = self
            .fields
            .iter()
            .map(|&field| {
                let text = match (field, m.cell(field)) {
                    (RowField::Fwhm, Some(pix)) => match m.fwhm_arcsec {
                        Some(arcsec) => format!("{pix} ({arcsec:.1}\")"),
                        None => pix,
                    },
                    (_, Some(text)) => text,
                    (_, None) => self.marker.clone(),
                };
                let class = if self.thresholds.breached(field, m) {
                    " class=\"alert\""
                } else {
                    ""
                };
                format!("<td{class}>{}</td>", escape_html(&text))
            })
            .collect();
        format!("<tr>{cells}</tr>")
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            c => out.push(c),
        }
    }
    out
}
