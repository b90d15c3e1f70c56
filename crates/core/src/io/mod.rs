//! I/O operations for reading and writing chips and labels

#[cfg(feature = "gdal")]
mod gdal_io;
mod native;

#[cfg(feature = "gdal")]
pub use gdal_io::{read_stack, read_label, write_stack, write_label};

#[cfg(not(feature = "gdal"))]
pub use native::{read_stack, read_label, write_stack, write_label};
