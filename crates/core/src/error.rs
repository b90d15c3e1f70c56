//! Error types for fieldchip

use thiserror::Error;

/// Main error type for fieldchip operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("{name}: wrong bounds (expected {expected:?}, got {actual:?})")]
    BoundsMismatch {
        name: String,
        expected: (f64, f64, f64, f64),
        actual: (f64, f64, f64, f64),
    },

    #[error("{name}: wrong shape (expected {er}x{ec}, got {ar}x{ac})")]
    ShapeMismatch {
        name: String,
        er: usize,
        ec: usize,
        ar: usize,
        ac: usize,
    },

    #[error("Unsupported reprojection: {0} -> {1}")]
    UnsupportedReprojection(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Degenerate geometry: {0}")]
    DegenerateGeometry(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Missing catalog column: {0}")]
    MissingColumn(String),

    #[error("Vector data error: {0}")]
    Vector(String),

    #[cfg(feature = "gdal")]
    #[error("GDAL error: {0}")]
    Gdal(String),

    #[error("{0}")]
    Other(String),
}

#[cfg(feature = "gdal")]
impl From<gdal::errors::GdalError> for Error {
    fn from(e: gdal::errors::GdalError) -> Self {
        Error::Gdal(e.to_string())
    }
}

/// Result type alias for fieldchip operations
pub type Result<T> = std::result::Result<T, Error>;
