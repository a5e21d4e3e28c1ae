//! srem-landsat: SREM atmospheric correction for Landsat imagery
//!
//! This library converts raw Landsat digital numbers to radiance, TOA
//! reflectance or brightness temperature, and applies the SREM
//! (Simplified and Robust surface-reflectance Estimation Method,
//! Bilal et al. 2019) Rayleigh correction to produce surface
//! reflectance rasters.

pub mod core;
pub mod io;
pub mod types;

// Re-export main types and functions for easier access
pub use types::{
    AngleGrids, BandCalibration, BandGrid, BandType, DnGrid, GeoReference, GeoTransform,
    SceneMetadata, SpacecraftId, SremError, SremResult,
};

pub use crate::core::{
    correct_band, process_band, process_scene, rayleigh_optical_depth, BandCalibrator, SremModel,
};
pub use crate::io::{GeometryResolver, MetadataReader};
