use std::path::Path;

use tracing::debug;

use crate::error::{NightwatchError, Result};

/// Facts recorded by the acquisition system for one frame.
///
/// Every field is independent: a sidecar missing some labels still fills
/// the others.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SidecarMetadata {
    pub target: Option<String>,
    /// Shutter duration in seconds.
    pub exposure_s: Option<f64>,
    /// Commanded right ascension in decimal degrees.
    pub ra_deg: Option<f64>,
    /// Commanded declination in decimal degrees.
    pub dec_deg: Option<f64>,
    /// Exposure start in decimal UT hours.
    pub ut_start_hours: Option<f64>,
    pub image_type: Option<String>,
}

type FieldParser = fn(&mut SidecarMetadata, &str) -> bool;

/// Recognized labels and how to store their value.
const FIELDS: &[(&str, FieldParser)] = &[
    ("TARGET", |m, v| set_text(&mut m.target, v)),
    ("EXPTIME", |m, v| set_number(&mut m.exposure_s, v)),
    ("RA", |m, v| set_number(&mut m.ra_deg, v)),
    ("DEC", |m, v| set_number(&mut m.dec_deg, v)),
    ("UT START", |m, v| set_number(&mut m.ut_start_hours, v)),
    ("IMTYPE", |m, v| set_word(&mut m.image_type, v)),
];

fn set_text(slot: &mut Option<String>, value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    *slot = Some(value.to_string());
    true
}

/// First token as a float; a trailing unit such as `deg` or `s` is ignored.
fn set_number(slot: &mut Option<f64>, value: &str) -> bool {
    match value.split_whitespace().next().map(str::parse::<f64>) {
        Some(Ok(v)) if v.is_finite() => {
            *slot = Some(v);
            true
        }
        _ => false,
    }
}

/// Leading run of word characters.
fn set_word(slot: &mut Option<String>, value: &str) -> bool {
    let word: String = value
        .trim_start()
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    if word.is_empty() {
        return false;
    }
    *slot = Some(word);
    true
}

/// Labels compare case-insensitively with runs of whitespace collapsed.
fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
}

impl SidecarMetadata {
    /// Apply every recognized `LABEL: value` line; anything else is skipped.
    pub fn parse(text: &str) -> Self {
        let mut meta = Self::default();
        for line in text.lines() {
            let Some((label, value)) = line.split_once(':') else {
                continue;
            };
            let label = normalize_label(label);
            for (name, parser) in FIELDS {
                if label == *name && !parser(&mut meta, value) {
                    debug!(label = *name, value = value.trim(), "Sidecar value not understood");
                }
            }
        }
        meta
    }

    pub fn read(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(NightwatchError::MetadataUnavailable(path.to_path_buf()));
        }
        let bytes = std::fs::read(path)?;
        Ok(Self::parse(&String::from_utf8_lossy(&bytes)))
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}
