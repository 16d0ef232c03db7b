use crate::config::SiteConfig;
use crate::fits::{Header, Value};

use super::sexagesimal::{dec_to_sexagesimal, ra_to_sexagesimal, ut_start_timestamp};
use super::sidecar::SidecarMetadata;

/// Header cards to merge into a frame's working copy, in insertion order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HeaderOverlay {
    entries: Vec<(String, Value)>,
}

impl HeaderOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Header-ready values for whichever sidecar fields are present.
    pub fn from_sidecar(meta: &SidecarMetadata, night: &str) -> Self {
        let mut overlay = Self::new();
        if let Some(ref target) = meta.target {
            overlay.insert("OBJECT", Value::Str(target.clone()));
        }
        if let Some(exposure) = meta.exposure_s {
            overlay.insert("EXPTIME", Value::Float(exposure));
        }
        if let Some(ra) = meta.ra_deg {
            overlay.insert("RA", Value::Str(ra_to_sexagesimal(ra)));
        }
        if let Some(dec) = meta.dec_deg {
            overlay.insert("DEC", Value::Str(dec_to_sexagesimal(dec)));
        }
        if let Some(ut) = meta.ut_start_hours {
            overlay.insert("DATE-OBS", Value::Str(ut_start_timestamp(night, ut)));
        }
        if let Some(ref imtype) = meta.image_type {
            overlay.insert("IMAGETYP", Value::Str(imtype.clone()));
        }
        overlay
    }

    /// Observatory location cards.
    pub fn site(site: &SiteConfig) -> Self {
        let mut overlay = Self::new();
        overlay.insert("LAT-OBS", Value::Float(site.latitude));
        overlay.insert("LONG-OBS", Value::Float(site.longitude));
        overlay.insert("ALT-OBS", Value::Float(site.altitude));
        overlay
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        let key = key.to_ascii_uppercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn extend(&mut self, other: HeaderOverlay) {
        for (key, value) in other.entries {
            self.insert(&key, value);
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    }

    pub fn entries(&self) -> &[(String, Value)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn apply(&self, header: &mut Header) {
        for (key, value) in &self.entries {
            header.set(key, value.clone());
        }
    }
}
