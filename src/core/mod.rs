//! Core radiometric and atmospheric processing modules

pub mod calibrate;
pub mod pipeline;
pub mod srem;

// Re-export main types
pub use calibrate::BandCalibrator;
pub use pipeline::{correct_band, process_band, process_scene};
#[cfg(feature = "parallel")]
pub use pipeline::process_scene_par;
pub use srem::{rayleigh_optical_depth, SremModel};
