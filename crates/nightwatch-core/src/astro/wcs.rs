use crate::fits::Header;

use super::coords::Equatorial;

/// Linear TAN projection from a FITS header.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wcs {
    pub crval: [f64; 2],
    /// Reference pixel, 1-based as in FITS.
    pub crpix: [f64; 2],
    /// Degrees per pixel, `cd[i][j]` = `CDi_j`.
    pub cd: [[f64; 2]; 2],
}

impl Wcs {
    /// Read CD matrix, or CDELT with an optional CROTA2 rotation.
    pub fn from_header(header: &Header) -> Option<Self> {
        if !header.has_wcs() {
            return None;
        }
        let crval = [header.get_f64("CRVAL1")?, header.get_f64("CRVAL2")?];
        let crpix = [header.get_f64("CRPIX1")?, header.get_f64("CRPIX2")?];
        let cd = match header.get_f64("CD1_1") {
            Some(cd11) => [
                [cd11, header.get_f64("CD1_2").unwrap_or(0.0)],
                [
                    header.get_f64("CD2_1").unwrap_or(0.0),
                    header.get_f64("CD2_2")?,
                ],
            ],
            None => {
                let cdelt1 = header.get_f64("CDELT1")?;
                let cdelt2 = header.get_f64("CDELT2")?;
                let rot = header.get_f64("CROTA2").unwrap_or(0.0).to_radians();
                [
                    [cdelt1 * rot.cos(), -cdelt2 * rot.sin()],
                    [cdelt1 * rot.sin(), cdelt2 * rot.cos()],
                ]
            }
        };
        Some(Self { crval, crpix, cd })
    }

    /// Sky position of a 1-based pixel coordinate (gnomonic inverse).
    pub fn pixel_to_world(&self, x: f64, y: f64) -> Equatorial {
        let dx = x - self.crpix[0];
        let dy = y - self.crpix[1];
        let xi = (self.cd[0][0] * dx + self.cd[0][1] * dy).to_radians();
        let eta = (self.cd[1][0] * dx + self.cd[1][1] * dy).to_radians();

        let ra0 = self.crval[0].to_radians();
        let dec0 = self.crval[1].to_radians();
        let denom = dec0.cos() - eta * dec0.sin();
        let ra = ra0 + xi.atan2(denom);
        let dec = (dec0.sin() + eta * dec0.cos()).atan2(xi.hypot(denom));
        Equatorial {
            ra_deg: ra.to_degrees().rem_euclid(360.0),
            dec_deg: dec.to_degrees(),
        }
    }

    /// 1-based pixel coordinate of a sky position, or `None` if it lies on
    /// the far hemisphere or the matrix is singular.
    pub fn world_to_pixel(&self, pos: Equatorial) -> Option<(f64, f64)> {
        let ra0 = self.crval[0].to_radians();
        let dec0 = self.crval[1].to_radians();
        let ra = pos.ra_deg.to_radians();
        let dec = pos.dec_deg.to_radians();
        let dra = ra - ra0;
        let cos_c = dec0.sin() * dec.sin() + dec0.cos() * dec.cos() * dra.cos();
        if cos_c <= 0.0 {
            return None;
        }
        let xi = (dec.cos() * dra.sin() / cos_c).to_degrees();
        let eta = ((dec0.cos() * dec.sin() - dec0.sin() * dec.cos() * dra.cos()) / cos_c).to_degrees();

        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        if det == 0.0 {
            return None;
        }
        let dx = (self.cd[1][1] * xi - self.cd[0][1] * eta) / det;
        let dy = (-self.cd[1][0] * xi + self.cd[0][0] * eta) / det;
        Some((self.crpix[0] + dx, self.crpix[1] + dy))
    }

    /// Sky position of the geometric centre of a `width` x `height` image.
    pub fn center(&self, width: usize, height: usize) -> Equatorial {
        self.pixel_to_world((width as f64 + 1.0) / 2.0, (height as f64 + 1.0) / 2.0)
    }

    /// Angle of celestial north from the image +y axis, degrees in [0, 360).
    pub fn position_angle(&self) -> f64 {
        self.cd[0][1].atan2(self.cd[1][1]).to_degrees().rem_euclid(360.0)
    }

    /// Mean pixel scale in arcseconds.
    pub fn pixel_scale_arcsec(&self) -> f64 {
        let det = self.cd[0][0] * self.cd[1][1] - self.cd[0][1] * self.cd[1][0];
        det.abs().sqrt() * 3600.0
    }

    /// Shift the reference pixel after cropping `x0`/`y0` zero-based
    /// columns/rows off the origin.
    pub fn cropped(&self, x0: usize, y0: usize) -> Self {
        Self {
            crpix: [self.crpix[0] - x0 as f64, self.crpix[1] - y0 as f64],
            ..*self
        }
    }
}
