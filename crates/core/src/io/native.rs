//! Native GeoTIFF reading/writing (without GDAL dependency)
//!
//! Uses the `tiff` crate. Chips are stored as one 32-bit float directory
//! per band; labels as a single 8-bit directory. Georeferencing rides on
//! the first directory via ModelPixelScaleTag/ModelTiepointTag, with the
//! CRS encoded in a minimal GeoKey directory. For full GeoTIFF support
//! enable the `gdal` feature.

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{BandStack, GeoTransform, Raster};
use ndarray::Array2;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray8};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;

// GeoKey ids
const GT_MODEL_TYPE: u16 = 1024;
const GT_RASTER_TYPE: u16 = 1025;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Read a multi-band GeoTIFF into a `BandStack<f32>`.
///
/// Each TIFF directory is treated as one band; integer samples are cast
/// to f32.
pub fn read_stack<P: AsRef<Path>>(path: P) -> Result<BandStack<f32>> {
    let file = File::open(path.as_ref())?;
    let mut decoder =
        Decoder::new(file).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let transform = read_geotransform(&mut decoder).ok();
    let crs = read_crs(&mut decoder);

    let mut bands: Vec<Array2<f32>> = Vec::new();
    loop {
        let (width, height) = decoder
            .dimensions()
            .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
        let rows = height as usize;
        let cols = width as usize;

        let data = read_band_f32(&mut decoder)?;
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        bands.push(
            Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?,
        );

        if !decoder.more_images() {
            break;
        }
        decoder
            .next_image()
            .map_err(|e| Error::Other(format!("Cannot advance to next band: {}", e)))?;
    }

    let mut stack = BandStack::from_bands(bands)?;
    if let Some(transform) = transform {
        stack.set_transform(transform);
    }
    stack.set_crs(crs);
    Ok(stack)
}

/// Write a `BandStack<f32>` as a multi-directory GeoTIFF
pub fn write_stack<P: AsRef<Path>>(stack: &BandStack<f32>, path: P) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = stack.shape();
    let tags = GeoTags::new(stack.transform(), stack.crs());
    for (index, band) in stack.bands().enumerate() {
        let mut image = encoder
            .new_image::<Gray32Float>(cols as u32, rows as u32)
            .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

        if index == 0 {
            image
                .encoder()
                .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), tags.scale.as_slice())
                .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;
            image
                .encoder()
                .write_tag(Tag::Unknown(MODEL_TIEPOINT), tags.tiepoint.as_slice())
                .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;
            image
                .encoder()
                .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), tags.geokeys.as_slice())
                .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;
        }

        let data: Vec<f32> = band.iter().copied().collect();
        image
            .write_data(&data)
            .map_err(|e| Error::Other(format!("Cannot write band {}: {}", index, e)))?;
    }

    Ok(())
}

/// Read a single-band label GeoTIFF into a `Raster<u8>`
pub fn read_label<P: AsRef<Path>>(path: P) -> Result<Raster<u8>> {
    let file = File::open(path.as_ref())?;
    let mut decoder =
        Decoder::new(file).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;
    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<u8> = match result {
        DecodingResult::U8(buf) => buf,
        DecodingResult::U16(buf) => buf.iter().map(|&v| v.min(u8::MAX as u16) as u8).collect(),
        DecodingResult::I16(buf) => buf.iter().map(|&v| v.clamp(0, u8::MAX as i16) as u8).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Label TIFF must hold 8- or 16-bit integers".to_string(),
            ))
        }
    };

    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;
    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }
    raster.set_crs(read_crs(&mut decoder));
    Ok(raster)
}

/// Write a `Raster<u8>` as a single-band GeoTIFF
pub fn write_label<P: AsRef<Path>>(raster: &Raster<u8>, path: P) -> Result<()> {
    let file = BufWriter::new(File::create(path.as_ref())?);
    let mut encoder =
        TiffEncoder::new(file).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();
    let tags = GeoTags::new(raster.transform(), raster.crs());
    let mut image = encoder
        .new_image::<Gray8>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_PIXEL_SCALE), tags.scale.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;
    image
        .encoder()
        .write_tag(Tag::Unknown(MODEL_TIEPOINT), tags.tiepoint.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;
    image
        .encoder()
        .write_tag(Tag::Unknown(GEO_KEY_DIRECTORY), tags.geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    let data: Vec<u8> = raster.data().iter().copied().collect();
    image
        .write_data(&data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

/// Decode the current TIFF directory as one f32 band
fn read_band_f32<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Result<Vec<f32>> {
    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<f32> = match result {
        DecodingResult::F32(buf) => buf,
        DecodingResult::F64(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::U8(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::U16(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::U32(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::I8(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::I16(buf) => buf.iter().map(|&v| v as f32).collect(),
        DecodingResult::I32(buf) => buf.iter().map(|&v| v as f32).collect(),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };
    Ok(data)
}

/// Attempt to read a GeoTransform from TIFF tags
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::Unknown(MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// Attempt to read the CRS from the GeoKey directory
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<CRS> {
    let keys = decoder
        .get_tag_u16_vec(Tag::Unknown(GEO_KEY_DIRECTORY))
        .ok()?;
    if keys.len() < 4 {
        return None;
    }

    // Directory header is 4 shorts; entries follow as [id, location, count, value]
    for entry in keys[4..].chunks_exact(4) {
        let (id, location, value) = (entry[0], entry[1], entry[3]);
        if location == 0 && (id == GEOGRAPHIC_TYPE || id == PROJECTED_CS_TYPE) {
            return Some(CRS::from_epsg(value as u32));
        }
    }
    None
}

/// GeoTIFF tag payloads for one grid
struct GeoTags {
    scale: Vec<f64>,
    tiepoint: Vec<f64>,
    geokeys: Vec<u16>,
}

impl GeoTags {
    fn new(transform: &GeoTransform, crs: Option<&CRS>) -> Self {
        let scale = vec![transform.pixel_width, transform.pixel_height.abs(), 0.0];
        let tiepoint = vec![0.0, 0.0, 0.0, transform.origin_x, transform.origin_y, 0.0];

        // GTRasterTypeGeoKey = 1 (RasterPixelIsArea); model type and EPSG
        // code depend on whether the CRS is geographic or projected.
        let mut entries: Vec<[u16; 4]> = vec![[GT_RASTER_TYPE, 0, 1, 1]];
        match crs.and_then(CRS::epsg) {
            Some(4326) => {
                entries.push([GT_MODEL_TYPE, 0, 1, 2]);
                entries.push([GEOGRAPHIC_TYPE, 0, 1, 4326]);
            }
            Some(code) if code <= u16::MAX as u32 => {
                entries.push([GT_MODEL_TYPE, 0, 1, 1]);
                entries.push([PROJECTED_CS_TYPE, 0, 1, code as u16]);
            }
            _ => {
                entries.push([GT_MODEL_TYPE, 0, 1, 1]);
            }
        }

        let mut geokeys: Vec<u16> = vec![1, 1, 0, entries.len() as u16];
        for entry in &entries {
            geokeys.extend_from_slice(entry);
        }

        Self {
            scale,
            tiepoint,
            geokeys,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crs::CRS;

    fn sample_stack() -> BandStack<f32> {
        let band0 = Array2::from_shape_fn((20, 30), |(r, c)| (r * 30 + c) as f32);
        let band1 = band0.mapv(|v| v * 0.5);
        let mut stack = BandStack::from_bands(vec![band0, band1]).unwrap();
        stack.set_transform(GeoTransform::from_bounds(10.0, 40.0, 13.0, 42.0, 30, 20));
        stack.set_crs(Some(CRS::wgs84()));
        stack
    }

    #[test]
    fn test_chip_roundtrip() {
        let stack = sample_stack();
        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_stack(&stack, tmp.path()).unwrap();

        let loaded = read_stack(tmp.path()).unwrap();
        assert_eq!(loaded.band_count(), 2);
        assert_eq!(loaded.shape(), (20, 30));
        assert_eq!(loaded.transform(), stack.transform());
        assert_eq!(loaded.bounds(), stack.bounds());
        assert_eq!(loaded.crs().and_then(CRS::epsg), Some(4326));
        assert_eq!(loaded.band(1).unwrap()[[5, 7]], stack.band(1).unwrap()[[5, 7]]);
    }

    #[test]
    fn test_label_roundtrip() {
        let mut raster: Raster<u8> = Raster::new(12, 12);
        raster.set_transform(GeoTransform::new(0.0, 12.0, 1.0, -1.0));
        raster.set_crs(Some(CRS::wgs84()));
        raster.set(3, 4, 2).unwrap();
        raster.set(5, 6, 1).unwrap();

        let tmp = tempfile::NamedTempFile::with_suffix(".tif").unwrap();
        write_label(&raster, tmp.path()).unwrap();

        let loaded = read_label(tmp.path()).unwrap();
        assert_eq!(loaded.shape(), (12, 12));
        assert_eq!(loaded.get(3, 4).unwrap(), 2);
        assert_eq!(loaded.get(5, 6).unwrap(), 1);
        assert_eq!(loaded.get(0, 0).unwrap(), 0);
        assert_eq!(loaded.transform(), raster.transform());
    }
}
