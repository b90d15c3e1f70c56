//! Chip and label GeoTIFF I/O using GDAL

use crate::crs::CRS;
use crate::error::Result;
use crate::raster::{BandStack, GeoTransform, Raster};
use gdal::raster::Buffer;
use gdal::spatial_ref::SpatialRef;
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

/// Read a multi-band GeoTIFF into a `BandStack<f32>`
pub fn read_stack<P: AsRef<Path>>(path: P) -> Result<BandStack<f32>> {
    let dataset = Dataset::open(path.as_ref())?;
    let (cols, rows) = dataset.raster_size();

    let mut bands = Vec::with_capacity(dataset.raster_count());
    for index in 1..=dataset.raster_count() {
        let rasterband = dataset.rasterband(index)?;
        let buffer = rasterband.read_as::<f32>((0, 0), (cols, rows), (cols, rows), None)?;
        bands.push(
            Array2::from_shape_vec((rows, cols), buffer.data().to_vec())
                .map_err(|e| crate::error::Error::Other(e.to_string()))?,
        );
    }

    let mut stack = BandStack::from_bands(bands)?;
    if let Ok(gt) = dataset.geo_transform() {
        stack.set_transform(GeoTransform::from_gdal(gt));
    }
    stack.set_crs(dataset_crs(&dataset));
    if let Ok(Some(nodata)) = dataset.rasterband(1).map(|b| b.no_data_value()) {
        if let Some(nd) = num_traits::cast(nodata) {
            stack.set_nodata(Some(nd));
        }
    }

    Ok(stack)
}

/// Write a `BandStack<f32>` as a multi-band GeoTIFF
pub fn write_stack<P: AsRef<Path>>(stack: &BandStack<f32>, path: P) -> Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (rows, cols) = stack.shape();

    let create_options = ["COMPRESS=DEFLATE", "TILED=YES"];
    let mut dataset = driver.create_with_band_type_with_options::<f32, _>(
        path.as_ref(),
        cols,
        rows,
        stack.band_count(),
        &create_options,
    )?;

    dataset.set_geo_transform(&stack.transform().to_gdal())?;
    set_dataset_crs(&mut dataset, stack.crs())?;

    for (index, band) in stack.bands().enumerate() {
        let mut rasterband = dataset.rasterband(index + 1)?;
        if let Some(nodata) = stack.nodata() {
            rasterband.set_no_data_value(Some(nodata as f64))?;
        }
        let mut buffer = Buffer::new((cols, rows), band.iter().copied().collect());
        rasterband.write((0, 0), (cols, rows), &mut buffer)?;
    }

    Ok(())
}

/// Read a single-band label GeoTIFF into a `Raster<u8>`
pub fn read_label<P: AsRef<Path>>(path: P) -> Result<Raster<u8>> {
    let dataset = Dataset::open(path.as_ref())?;
    let (cols, rows) = dataset.raster_size();
    let rasterband = dataset.rasterband(1)?;

    let buffer = rasterband.read_as::<u8>((0, 0), (cols, rows), (cols, rows), None)?;
    let mut raster = Raster::from_vec(buffer.data().to_vec(), rows, cols)?;

    if let Ok(gt) = dataset.geo_transform() {
        raster.set_transform(GeoTransform::from_gdal(gt));
    }
    raster.set_crs(dataset_crs(&dataset));

    Ok(raster)
}

/// Write a `Raster<u8>` as a single-band GeoTIFF
pub fn write_label<P: AsRef<Path>>(raster: &Raster<u8>, path: P) -> Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let (rows, cols) = raster.shape();

    let create_options = ["COMPRESS=DEFLATE"];
    let mut dataset = driver.create_with_band_type_with_options::<u8, _>(
        path.as_ref(),
        cols,
        rows,
        1,
        &create_options,
    )?;

    dataset.set_geo_transform(&raster.transform().to_gdal())?;
    set_dataset_crs(&mut dataset, raster.crs())?;

    let mut rasterband = dataset.rasterband(1)?;
    let mut buffer = Buffer::new((cols, rows), raster.data().iter().copied().collect());
    rasterband.write((0, 0), (cols, rows), &mut buffer)?;

    Ok(())
}

fn dataset_crs(dataset: &Dataset) -> Option<CRS> {
    let srs = dataset.spatial_ref().ok()?;
    if let Ok(code) = srs.auth_code() {
        return Some(CRS::from_epsg(code as u32));
    }
    srs.to_wkt().ok().map(CRS::from_wkt)
}

fn set_dataset_crs(dataset: &mut Dataset, crs: Option<&CRS>) -> Result<()> {
    if let Some(crs) = crs {
        if let Some(epsg) = crs.epsg() {
            let srs = SpatialRef::from_epsg(epsg)?;
            dataset.set_spatial_ref(&srs)?;
        } else if let Some(wkt) = crs.wkt() {
            let srs = SpatialRef::from_wkt(wkt)?;
            dataset.set_spatial_ref(&srs)?;
        }
    }
    Ok(())
}
