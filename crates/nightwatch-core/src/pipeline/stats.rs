use crate::processor::Source;

/// Image-quality figures derived from an extraction catalog.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SourceStats {
    pub star_count: usize,
    pub fwhm_pix: Option<f64>,
    pub ellipticity: Option<f64>,
    pub background: Option<f64>,
}

impl SourceStats {
    /// Medians over clean detections (`FLAGS == 0`, positive FWHM).
    pub fn from_sources(sources: &[Source]) -> Self {
        let stars: Vec<&Source> = sources.iter().filter(|s| s.is_star()).collect();
        Self {
            star_count: stars.len(),
            fwhm_pix: median(stars.iter().map(|s| s.fwhm_pix)),
            ellipticity: median(stars.iter().map(|s| s.ellipticity)),
            background: median(stars.iter().map(|s| s.background)),
        }
    }
}

fn median(values: impl Iterator<Item = f64>) -> Option<f64> {
    let mut v: Vec<f64> = values.filter(|x| x.is_finite()).collect();
    if v.is_empty() {
        return None;
    }
    v.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = v.len() / 2;
    Some(if v.len() % 2 == 1 {
        v[mid]
    } else {
        (v[mid - 1] + v[mid]) / 2.0
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(fwhm: f64, ell: f64, flags: u32) -> Source {
        Source {
            x: 1.0,
            y: 1.0,
            fwhm_pix: fwhm,
            ellipticity: ell,
            background: 1000.0,
            flags,
        }
    }

    #[test]
    fn test_flagged_sources_excluded() {
        let stats = SourceStats::from_sources(&[
            source(3.0, 0.1, 0),
            source(5.0, 0.3, 0),
            source(4.0, 0.2, 0),
            source(40.0, 0.9, 16),
            source(0.0, 0.0, 0),
        ]);
        assert_eq!(stats.star_count, 3);
        assert_eq!(stats.fwhm_pix, Some(4.0));
        assert_eq!(stats.ellipticity, Some(0.2));
        assert_eq!(stats.background, Some(1000.0));
    }

    #[test]
    fn test_even_median_and_nan() {
        let stats = SourceStats::from_sources(&[source(2.0, f64::NAN, 0), source(4.0, 0.5, 0)]);
        assert_eq!(stats.fwhm_pix, Some(3.0));
        assert_eq!(stats.ellipticity, Some(0.5));
    }

    #[test]
    fn test_no_stars() {
        let stats = SourceStats::from_sources(&[]);
        assert_eq!(stats, SourceStats::default());
    }
}
