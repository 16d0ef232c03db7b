use std::fmt;

/// Keywords describing the data unit; written by the writer, never copied.
pub(crate) const STRUCTURAL_KEYS: &[&str] = &[
    "SIMPLE", "BITPIX", "NAXIS", "NAXIS1", "NAXIS2", "NAXIS3", "EXTEND", "BZERO", "BSCALE",
    "PCOUNT", "GCOUNT", "XTENSION", "EXTNAME",
];

/// A header card value.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Float(f) => Some(*f),
            Self::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Interpret a value field as cfitsio returns it, quotes included.
    pub(crate) fn from_raw(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if let Some(quoted) = raw.strip_prefix('\'') {
            let inner = quoted.strip_suffix('\'').unwrap_or(quoted);
            return Some(Self::Str(inner.replace("''", "'").trim_end().to_string()));
        }
        match raw {
            "" => None,
            "T" => Some(Self::Bool(true)),
            "F" => Some(Self::Bool(false)),
            _ => raw
                .parse::<i64>()
                .map(Self::Int)
                .or_else(|_| raw.replace(['D', 'd'], "E").parse::<f64>().map(Self::Float))
                .ok()
                .or_else(|| Some(Self::Str(raw.to_string()))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(b) => write!(f, "{}", if *b { "T" } else { "F" }),
        }
    }
}

/// One valued header keyword.
#[derive(Clone, Debug, PartialEq)]
pub struct Card {
    pub key: String,
    pub value: Value,
}

impl Card {
    pub fn new(key: &str, value: Value) -> Self {
        Self {
            key: key.to_ascii_uppercase(),
            value,
        }
    }
}

/// Ordered list of header cards.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Header {
    cards: Vec<Card>,
}

impl Header {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cards(&self) -> &[Card] {
        &self.cards
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        let key = key.to_ascii_uppercase();
        self.cards.iter().rev().find(|c| c.key == key).map(|c| &c.value)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_i64)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace the existing card for `key`, or append a new one.
    pub fn set(&mut self, key: &str, value: Value) {
        let key = key.to_ascii_uppercase();
        match self.cards.iter_mut().find(|c| c.key == key) {
            Some(card) => card.value = value,
            None => self.cards.push(Card::new(&key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) {
        let key = key.to_ascii_uppercase();
        self.cards.retain(|c| c.key != key);
    }

    /// Copy every card of `other` into `self` except structural ones.
    pub fn merge(&mut self, other: &Header) {
        for card in &other.cards {
            if !STRUCTURAL_KEYS.contains(&card.key.as_str()) {
                self.set(&card.key, card.value.clone());
            }
        }
    }

    /// True when the header carries a usable celestial WCS.
    pub fn has_wcs(&self) -> bool {
        let has_matrix = ["CD1_1", "CD1_2", "CD2_1", "CD2_2"]
            .iter()
            .all(|k| self.get_f64(k).is_some())
            || ["CDELT1", "CDELT2"].iter().all(|k| self.get_f64(k).is_some());
        let projected = self
            .get_str("CTYPE1")
            .is_some_and(|t| t.starts_with("RA"));
        has_matrix
            && projected
            && ["CRVAL1", "CRVAL2", "CRPIX1", "CRPIX2"]
                .iter()
                .all(|k| self.get_f64(k).is_some())
    }

    /// Cards that do not describe the data layout.
    pub(crate) fn keywords(&self) -> impl Iterator<Item = &Card> {
        self.cards
            .iter()
            .filter(|c| !STRUCTURAL_KEYS.contains(&c.key.as_str()))
    }

    /// Append without deduplication, keeping file order.
    pub(crate) fn push(&mut self, card: Card) {
        self.cards.push(card);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_value_kinds() {
        assert_eq!(Value::from_raw("'M42     '"), Some(Value::Str("M42".into())));
        assert_eq!(
            Value::from_raw("'Barnard''s Loop'"),
            Some(Value::Str("Barnard's Loop".into()))
        );
        assert_eq!(Value::from_raw("T"), Some(Value::Bool(true)));
        assert_eq!(Value::from_raw("16"), Some(Value::Int(16)));
        assert_eq!(Value::from_raw("120.0"), Some(Value::Float(120.0)));
        assert_eq!(Value::from_raw("1.0D2"), Some(Value::Float(100.0)));
        assert_eq!(Value::from_raw("   "), None);
    }

    #[test]
    fn test_set_replaces_in_place() {
        let mut h = Header::new();
        h.set("BITPIX", Value::Int(16));
        h.set("OBJECT", Value::Str("M31".into()));
        h.set("EXPTIME", Value::Float(30.0));
        h.set("object", Value::Str("M33".into()));
        assert_eq!(h.cards().len(), 3);
        assert_eq!(h.cards()[1].key, "OBJECT");
        assert_eq!(h.get_str("OBJECT"), Some("M33"));
        assert_eq!(h.get_i64("BITPIX"), Some(16));
    }

    #[test]
    fn test_merge_skips_structure() {
        let mut target = Header::new();
        target.set("NAXIS1", Value::Int(64));
        let mut solution = Header::new();
        solution.set("NAXIS1", Value::Int(1024));
        solution.set("CRVAL1", Value::Float(83.8));
        target.merge(&solution);
        assert_eq!(target.get_i64("NAXIS1"), Some(64));
        assert_eq!(target.get_f64("CRVAL1"), Some(83.8));
        assert_eq!(target.keywords().count(), 1);
    }

    #[test]
    fn test_wcs_detection() {
        let mut h = Header::new();
        assert!(!h.has_wcs());
        h.set("CTYPE1", Value::Str("RA---TAN".into()));
        h.set("CTYPE2", Value::Str("DEC--TAN".into()));
        for (k, v) in [("CRVAL1", 10.0), ("CRVAL2", 20.0), ("CRPIX1", 50.0), ("CRPIX2", 50.0)] {
            h.set(k, Value::Float(v));
        }
        assert!(!h.has_wcs());
        for (k, v) in [("CD1_1", -0.003), ("CD1_2", 0.0), ("CD2_1", 0.0), ("CD2_2", 0.003)] {
            h.set(k, Value::Float(v));
        }
        assert!(h.has_wcs());
    }
}
