//! Metadata, raster, and geometry collaborators

pub mod geometry;
pub mod metadata;
pub mod raster;

// Re-export main types
pub use geometry::{
    GeneratedAnglesFile, GeometryResolver, ManualAngleFiles, PreloadedAngles, UsgsAngleUtility,
    DEFAULT_ANGLE_SCALE,
};
pub use metadata::MetadataReader;
pub use raster::{read_band_dn, read_band_f32, save_geotiff};
