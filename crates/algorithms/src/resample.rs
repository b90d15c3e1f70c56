//! Reprojection and resampling onto a template grid
//!
//! Maps every template pixel center into the source image and samples it
//! with the requested kernel. CRS conversion covers WGS84 <-> UTM
//! (Snyder 1987, USGS formulas), which handles Sentinel-2, Landsat, and
//! most satellite imagery without external C dependencies.

use fieldchip_core::{BandStack, Error, Raster, Result, CRS};
use ndarray::{Array2, ArrayView2};
use rayon::prelude::*;
use std::str::FromStr;

/// Resampling kernel used when mapping source pixels onto the template
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResampleMethod {
    /// Nearest neighbor
    Nearest,
    /// Bilinear interpolation over a 2x2 neighborhood
    Bilinear,
    /// Cubic convolution over a 4x4 neighborhood (Keys, a = -0.5)
    #[default]
    Cubic,
}

impl FromStr for ResampleMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "nearest" => Ok(Self::Nearest),
            "bilinear" => Ok(Self::Bilinear),
            "cubic" => Ok(Self::Cubic),
            other => Err(Error::Other(format!("Unknown resampling method: {other}"))),
        }
    }
}

// ── WGS84 ellipsoid constants ────────────────────────────────────────────

const A: f64 = 6_378_137.0; // semi-major axis (m)
const F: f64 = 1.0 / 298.257_223_563; // flattening
const E2: f64 = 2.0 * F - F * F; // eccentricity squared
const E_PRIME2: f64 = E2 / (1.0 - E2); // second eccentricity squared
const K0: f64 = 0.9996; // UTM scale factor
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Point conversion from the template CRS into the source CRS
#[derive(Debug, Clone, Copy)]
pub enum PointTransform {
    /// Source and template share a CRS
    Identity,
    /// Template is WGS84 geographic, source is UTM
    ToUtm { zone: u32, north: bool },
    /// Template is UTM, source is WGS84 geographic
    FromUtm { zone: u32, north: bool },
}

impl PointTransform {
    /// Build the conversion from `template` coordinates into `source`
    /// coordinates.
    pub fn between(template: &CRS, source: &CRS) -> Result<Self> {
        if template.is_equivalent(source) {
            return Ok(Self::Identity);
        }
        if template.is_geographic() {
            if let Some((zone, north)) = source.utm_zone() {
                return Ok(Self::ToUtm { zone, north });
            }
        }
        if source.is_geographic() {
            if let Some((zone, north)) = template.utm_zone() {
                return Ok(Self::FromUtm { zone, north });
            }
        }
        Err(Error::UnsupportedReprojection(
            template.identifier(),
            source.identifier(),
        ))
    }

    /// Convert a template-CRS point into the source CRS
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Self::Identity => (x, y),
            Self::ToUtm { zone, north } => wgs84_to_utm(x, y, zone, north),
            Self::FromUtm { zone, north } => utm_to_wgs84(x, y, zone, north),
        }
    }
}

// ── Core projection (Snyder 1987, USGS Prof. Paper 1395, pp. 61-64) ─────

/// Convert WGS84 (longitude, latitude) in degrees to UTM (easting,
/// northing) in metres for the given zone and hemisphere.
pub fn wgs84_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();

    // Central meridian of the zone
    let lon0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a_coeff = cos_lat * (lon - lon0);

    let m = meridional_arc(lat);

    let a2 = a_coeff * a_coeff;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Easting (Snyder eq. 8-9)
    let easting = K0 * n
        * (a_coeff
            + (1.0 - t + c) * a2 * a_coeff / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a_coeff / 120.0)
        + FALSE_EASTING;

    // Northing (Snyder eq. 8-10)
    let northing = K0
        * (m + n
            * tan_lat
            * (a2 / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    let northing = if north {
        northing
    } else {
        northing + FALSE_NORTHING_SOUTH
    };

    (easting, northing)
}

/// Convert UTM (easting, northing) in metres to WGS84 (longitude,
/// latitude) in degrees (Snyder eqs. 8-17 to 8-25).
pub fn utm_to_wgs84(easting: f64, northing: f64, zone: u32, north: bool) -> (f64, f64) {
    let x = easting - FALSE_EASTING;
    let y = if north {
        northing
    } else {
        northing - FALSE_NORTHING_SOUTH
    };

    let lon0 = ((zone as f64 - 1.0) * 6.0 - 180.0 + 3.0).to_radians();

    // Footpoint latitude
    let m = y / K0;
    let mu = m / (A * (1.0 - E2 / 4.0 - 3.0 * E2 * E2 / 64.0 - 5.0 * E2 * E2 * E2 / 256.0));
    let e1 = (1.0 - (1.0 - E2).sqrt()) / (1.0 + (1.0 - E2).sqrt());

    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let sin_phi1 = phi1.sin();
    let cos_phi1 = phi1.cos();
    let tan_phi1 = phi1.tan();

    let c1 = E_PRIME2 * cos_phi1 * cos_phi1;
    let t1 = tan_phi1 * tan_phi1;
    let n1 = A / (1.0 - E2 * sin_phi1 * sin_phi1).sqrt();
    let r1 = A * (1.0 - E2) / (1.0 - E2 * sin_phi1 * sin_phi1).powf(1.5);
    let d = x / (n1 * K0);

    let d2 = d * d;
    let d4 = d2 * d2;
    let d6 = d4 * d2;

    let phi = phi1
        - (n1 * tan_phi1 / r1)
            * (d2 / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * E_PRIME2) * d4 / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1
                    - 252.0 * E_PRIME2
                    - 3.0 * c1 * c1)
                    * d6
                    / 720.0);

    let lon = lon0
        + (d - (1.0 + 2.0 * t1 + c1) * d2 * d / 6.0
            + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * E_PRIME2 + 24.0 * t1 * t1)
                * d4
                * d
                / 120.0)
            / cos_phi1;

    (lon.to_degrees(), phi.to_degrees())
}

/// Meridional arc from equator to latitude `lat` (radians).
/// Snyder eq. 3-21.
fn meridional_arc(lat: f64) -> f64 {
    let e2 = E2;
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    A * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

// ── Resampling ───────────────────────────────────────────────────────────

/// Reproject and resample a source stack onto a template grid.
///
/// The output carries the template's transform, CRS, and shape, with one
/// band per source band. Template pixels falling outside the source
/// coverage become NaN. A source without a CRS is assumed to share the
/// template's.
pub fn reproject_match(
    src: &BandStack<f32>,
    template: &Raster<u8>,
    method: ResampleMethod,
) -> Result<BandStack<f32>> {
    let template_crs = template.crs().cloned().unwrap_or_default();
    let point_transform = match src.crs() {
        Some(src_crs) => PointTransform::between(&template_crs, src_crs)?,
        None => PointTransform::Identity,
    };

    let (rows, cols) = template.shape();
    let template_transform = *template.transform();
    let src_transform = *src.transform();

    let mut bands = Vec::with_capacity(src.band_count());
    for band in src.bands() {
        let view = band.view();
        let data: Vec<f32> = (0..rows)
            .into_par_iter()
            .flat_map(|row| {
                let mut row_data = vec![f32::NAN; cols];
                for (col, out) in row_data.iter_mut().enumerate() {
                    let (x, y) = template_transform.pixel_to_geo(col, row);
                    let (sx, sy) = point_transform.apply(x, y);
                    // Continuous source indices where integers fall on
                    // pixel centers
                    let (fc, fr) = src_transform.geo_to_pixel(sx, sy);
                    let u = fc - 0.5;
                    let v = fr - 0.5;
                    *out = match method {
                        ResampleMethod::Nearest => sample_nearest(&view, v, u),
                        ResampleMethod::Bilinear => sample_bilinear(&view, v, u),
                        ResampleMethod::Cubic => sample_cubic(&view, v, u),
                    };
                }
                row_data
            })
            .collect();

        bands.push(
            Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?,
        );
    }

    let mut out = BandStack::from_bands(bands)?;
    out.set_transform(template_transform);
    out.set_crs(Some(template_crs));
    out.set_nodata(Some(f32::NAN));
    Ok(out)
}

fn sample_nearest(band: &ArrayView2<'_, f32>, v: f64, u: f64) -> f32 {
    let (rows, cols) = band.dim();
    let r = v.round();
    let c = u.round();
    if r < 0.0 || c < 0.0 || r >= rows as f64 || c >= cols as f64 {
        return f32::NAN;
    }
    band[[r as usize, c as usize]]
}

fn sample_bilinear(band: &ArrayView2<'_, f32>, v: f64, u: f64) -> f32 {
    let (rows, cols) = band.dim();
    if v < 0.0 || u < 0.0 || v > (rows - 1) as f64 || u > (cols - 1) as f64 {
        return f32::NAN;
    }

    let r0 = v.floor() as usize;
    let c0 = u.floor() as usize;
    let r1 = (r0 + 1).min(rows - 1);
    let c1 = (c0 + 1).min(cols - 1);
    let dv = (v - r0 as f64) as f32;
    let du = (u - c0 as f64) as f32;

    let v00 = band[[r0, c0]];
    let v01 = band[[r0, c1]];
    let v10 = band[[r1, c0]];
    let v11 = band[[r1, c1]];

    v00 * (1.0 - du) * (1.0 - dv) + v01 * du * (1.0 - dv) + v10 * (1.0 - du) * dv + v11 * du * dv
}

/// Keys cubic convolution weight, a = -0.5
fn cubic_weight(t: f64) -> f64 {
    const ALPHA: f64 = -0.5;
    let t = t.abs();
    if t <= 1.0 {
        (ALPHA + 2.0) * t * t * t - (ALPHA + 3.0) * t * t + 1.0
    } else if t < 2.0 {
        ALPHA * t * t * t - 5.0 * ALPHA * t * t + 8.0 * ALPHA * t - 4.0 * ALPHA
    } else {
        0.0
    }
}

fn sample_cubic(band: &ArrayView2<'_, f32>, v: f64, u: f64) -> f32 {
    let (rows, cols) = band.dim();
    if v < 0.0 || u < 0.0 || v > (rows - 1) as f64 || u > (cols - 1) as f64 {
        return f32::NAN;
    }

    let r0 = v.floor() as isize;
    let c0 = u.floor() as isize;

    let mut acc = 0.0f64;
    let mut weight_sum = 0.0f64;
    for dr in -1..=2isize {
        let rr = (r0 + dr).clamp(0, rows as isize - 1) as usize;
        let wr = cubic_weight(v - (r0 + dr) as f64);
        for dc in -1..=2isize {
            let cc = (c0 + dc).clamp(0, cols as isize - 1) as usize;
            let wc = cubic_weight(u - (c0 + dc) as f64);
            let w = wr * wc;
            acc += band[[rr, cc]] as f64 * w;
            weight_sum += w;
        }
    }

    if weight_sum.abs() < f64::EPSILON {
        return f32::NAN;
    }
    (acc / weight_sum) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use fieldchip_core::GeoTransform;

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        let diff = (a - b).abs();
        assert!(
            diff < tol,
            "{msg}: expected {b}, got {a}, diff {diff} exceeds tolerance {tol}"
        );
    }

    // Reference values from pyproj (PROJ 9.x):
    //   t = Transformer.from_crs(4326, 32630, always_xy=True)
    //   t.transform(-3.7037, 40.4168) -> (440298.94, 4474257.31)
    #[test]
    fn madrid_wgs84_to_utm30n() {
        let (e, n) = wgs84_to_utm(-3.7037, 40.4168, 30, true);
        assert_close(e, 440_298.94, 1.0, "easting");
        assert_close(n, 4_474_257.31, 1.0, "northing");
    }

    // Buenos Aires: (-58.3816, -34.6037) -> UTM 21S (EPSG:32721)
    #[test]
    fn buenos_aires_wgs84_to_utm21s() {
        let (e, n) = wgs84_to_utm(-58.3816, -34.6037, 21, false);
        assert_close(e, 373_317.50, 1.0, "easting");
        assert_close(n, 6_170_036.17, 1.0, "northing");
    }

    #[test]
    fn utm_roundtrip() {
        let (lon0, lat0) = (-3.7037, 40.4168);
        let (e, n) = wgs84_to_utm(lon0, lat0, 30, true);
        let (lon, lat) = utm_to_wgs84(e, n, 30, true);
        assert_close(lon, lon0, 1e-7, "longitude");
        assert_close(lat, lat0, 1e-7, "latitude");
    }

    #[test]
    fn utm_roundtrip_south() {
        let (lon0, lat0) = (-58.3816, -34.6037);
        let (e, n) = wgs84_to_utm(lon0, lat0, 21, false);
        let (lon, lat) = utm_to_wgs84(e, n, 21, false);
        assert_close(lon, lon0, 1e-7, "longitude");
        assert_close(lat, lat0, 1e-7, "latitude");
    }

    #[test]
    fn point_transform_identity() {
        let t = PointTransform::between(&CRS::wgs84(), &CRS::wgs84()).unwrap();
        let (x, y) = t.apply(12.5, -3.25);
        assert_eq!((x, y), (12.5, -3.25));
    }

    #[test]
    fn point_transform_unsupported() {
        let err = PointTransform::between(&CRS::wgs84(), &CRS::from_epsg(3857));
        assert!(err.is_err());
    }

    fn constant_stack(rows: usize, cols: usize, value: f32) -> BandStack<f32> {
        let mut stack =
            BandStack::from_bands(vec![Array2::from_elem((rows, cols), value)]).unwrap();
        stack.set_transform(GeoTransform::from_bounds(0.0, 0.0, 10.0, 10.0, cols, rows));
        stack.set_crs(Some(CRS::wgs84()));
        stack
    }

    fn inner_template(rows: usize, cols: usize) -> Raster<u8> {
        let mut template: Raster<u8> = Raster::new(rows, cols);
        template.set_transform(GeoTransform::from_bounds(2.0, 2.0, 8.0, 8.0, cols, rows));
        template.set_crs(Some(CRS::wgs84()));
        template
    }

    #[test]
    fn resample_constant_field_is_exact() {
        let src = constant_stack(100, 100, 7.0);
        let template = inner_template(30, 30);

        for method in [
            ResampleMethod::Nearest,
            ResampleMethod::Bilinear,
            ResampleMethod::Cubic,
        ] {
            let out = reproject_match(&src, &template, method).unwrap();
            assert_eq!(out.shape(), (30, 30));
            assert_eq!(out.band_count(), 1);
            assert_eq!(out.transform(), template.transform());
            for &v in out.band(0).unwrap() {
                assert!((v - 7.0).abs() < 1e-4, "expected 7.0, got {v}");
            }
        }
    }

    #[test]
    fn resample_outside_coverage_is_nan() {
        let src = constant_stack(20, 20, 1.0);
        // Template extends beyond the source on every side
        let mut template: Raster<u8> = Raster::new(40, 40);
        template.set_transform(GeoTransform::from_bounds(-10.0, -10.0, 20.0, 20.0, 40, 40));
        template.set_crs(Some(CRS::wgs84()));

        let out = reproject_match(&src, &template, ResampleMethod::Bilinear).unwrap();
        let band = out.band(0).unwrap();
        assert!(band[[0, 0]].is_nan());
        assert!((band[[20, 20]] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn resample_bilinear_gradient() {
        // A linear ramp must be reproduced exactly by bilinear sampling
        let band = Array2::from_shape_fn((50, 50), |(_, c)| c as f32);
        let mut src = BandStack::from_bands(vec![band]).unwrap();
        src.set_transform(GeoTransform::from_bounds(0.0, 0.0, 50.0, 50.0, 50, 50));
        src.set_crs(Some(CRS::wgs84()));

        let mut template: Raster<u8> = Raster::new(10, 10);
        template.set_transform(GeoTransform::from_bounds(10.0, 10.0, 40.0, 40.0, 10, 10));
        template.set_crs(Some(CRS::wgs84()));

        let out = reproject_match(&src, &template, ResampleMethod::Bilinear).unwrap();
        let band = out.band(0).unwrap();
        // Template pixel (r, 0) center x = 11.5 -> source column coord 11.0
        assert!((band[[5, 0]] - 11.0).abs() < 1e-4);
        assert!((band[[5, 9]] - 38.0).abs() < 1e-4);
    }
}
