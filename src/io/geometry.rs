//! Acquisition-geometry resolvers.
//!
//! The SREM core needs four per-pixel angle grids in radians. How those
//! grids come to exist varies by workflow: pre-rendered angle rasters,
//! a four-band angles file from a third-party generator, or the USGS
//! per-band angle utility run as a subprocess. Each strategy implements
//! [`GeometryResolver`]; the pipeline does not care which one produced
//! the grids.

use crate::io::raster::read_band_f32;
use crate::types::{AngleGrids, BandCalibration, BandGrid, SceneMetadata, SremError, SremResult};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Default scale factor for integer-encoded angle rasters (hundredths
/// of a degree).
pub const DEFAULT_ANGLE_SCALE: f64 = 0.01;

/// Supplies the four angle grids for one band of one scene.
pub trait GeometryResolver {
    fn resolve_angles(
        &self,
        band: &BandCalibration,
        scene: &SceneMetadata,
    ) -> SremResult<AngleGrids>;
}

fn scaled_radians(grid: BandGrid, scale: f64) -> BandGrid {
    let scale = scale as f32;
    grid.mapv(|v| (v * scale).to_radians())
}

/// Four pre-rendered single-band angle rasters, integer-encoded in
/// degrees with a configurable scale factor.
#[derive(Debug, Clone)]
pub struct ManualAngleFiles {
    pub solar_zenith: PathBuf,
    pub solar_azimuth: PathBuf,
    pub sensor_zenith: PathBuf,
    pub sensor_azimuth: PathBuf,
    pub scale: f64,
}

impl ManualAngleFiles {
    pub fn new<P: AsRef<Path>>(
        solar_zenith: P,
        solar_azimuth: P,
        sensor_zenith: P,
        sensor_azimuth: P,
    ) -> Self {
        Self {
            solar_zenith: solar_zenith.as_ref().to_path_buf(),
            solar_azimuth: solar_azimuth.as_ref().to_path_buf(),
            sensor_zenith: sensor_zenith.as_ref().to_path_buf(),
            sensor_azimuth: sensor_azimuth.as_ref().to_path_buf(),
            scale: DEFAULT_ANGLE_SCALE,
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }
}

impl GeometryResolver for ManualAngleFiles {
    fn resolve_angles(
        &self,
        _band: &BandCalibration,
        _scene: &SceneMetadata,
    ) -> SremResult<AngleGrids> {
        log::info!("Resolving geometry from pre-rendered angle rasters");

        let (solar_zenith, _) = read_band_f32(&self.solar_zenith, 1)?;
        let (solar_azimuth, _) = read_band_f32(&self.solar_azimuth, 1)?;
        let (sensor_zenith, _) = read_band_f32(&self.sensor_zenith, 1)?;
        let (sensor_azimuth, _) = read_band_f32(&self.sensor_azimuth, 1)?;

        Ok(AngleGrids {
            solar_zenith: scaled_radians(solar_zenith, self.scale),
            solar_azimuth: scaled_radians(solar_azimuth, self.scale),
            sensor_zenith: scaled_radians(sensor_zenith, self.scale),
            sensor_azimuth: scaled_radians(sensor_azimuth, self.scale),
        })
    }
}

/// A single four-band angles raster as produced by third-party angle
/// generators: band 1 sensor azimuth, band 2 sensor zenith, band 3
/// solar azimuth, band 4 solar zenith, all in plain degrees.
#[derive(Debug, Clone)]
pub struct GeneratedAnglesFile {
    pub angles_file: PathBuf,
}

impl GeneratedAnglesFile {
    pub fn new<P: AsRef<Path>>(angles_file: P) -> Self {
        Self {
            angles_file: angles_file.as_ref().to_path_buf(),
        }
    }
}

impl GeometryResolver for GeneratedAnglesFile {
    fn resolve_angles(
        &self,
        _band: &BandCalibration,
        _scene: &SceneMetadata,
    ) -> SremResult<AngleGrids> {
        log::info!(
            "Resolving geometry from generated angles file: {}",
            self.angles_file.display()
        );

        let (sensor_azimuth, _) = read_band_f32(&self.angles_file, 1)?;
        let (sensor_zenith, _) = read_band_f32(&self.angles_file, 2)?;
        let (solar_azimuth, _) = read_band_f32(&self.angles_file, 3)?;
        let (solar_zenith, _) = read_band_f32(&self.angles_file, 4)?;

        Ok(AngleGrids {
            solar_zenith: solar_zenith.mapv(f32::to_radians),
            solar_azimuth: solar_azimuth.mapv(f32::to_radians),
            sensor_zenith: sensor_zenith.mapv(f32::to_radians),
            sensor_azimuth: sensor_azimuth.mapv(f32::to_radians),
        })
    }
}

/// Invokes the USGS per-band angle-generation utility, then reads the
/// solar/sensor `.img` pair it drops into the working directory.
///
/// The utility writes `<PRODUCT_ID>_solar_B<nn>.img` and
/// `<PRODUCT_ID>_sensor_B<nn>.img` with band 1 = azimuth and
/// band 2 = zenith, in hundredths of a degree.
#[derive(Debug, Clone)]
pub struct UsgsAngleUtility {
    pub utility_path: PathBuf,
    pub angle_coefficients_file: PathBuf,
    /// Directory the utility runs in and drops its `.img` outputs into.
    /// A fresh temporary directory is used when not set.
    pub working_dir: Option<PathBuf>,
}

impl UsgsAngleUtility {
    pub fn new<P: AsRef<Path>>(utility_path: P, angle_coefficients_file: P) -> Self {
        Self {
            utility_path: utility_path.as_ref().to_path_buf(),
            angle_coefficients_file: angle_coefficients_file.as_ref().to_path_buf(),
            working_dir: None,
        }
    }

    pub fn with_working_dir<P: AsRef<Path>>(mut self, working_dir: P) -> Self {
        self.working_dir = Some(working_dir.as_ref().to_path_buf());
        self
    }

    fn angle_file(
        working_dir: &Path,
        scene: &SceneMetadata,
        kind: &str,
        band_number: &str,
    ) -> PathBuf {
        working_dir.join(format!(
            "{}_{}_B{:0>2}.img",
            scene.product_id, kind, band_number
        ))
    }
}

impl GeometryResolver for UsgsAngleUtility {
    fn resolve_angles(
        &self,
        band: &BandCalibration,
        scene: &SceneMetadata,
    ) -> SremResult<AngleGrids> {
        // The temp dir must outlive the reads below; grids are copied
        // into memory before it is dropped and cleaned up.
        let temp_dir;
        let working_dir: &Path = match &self.working_dir {
            Some(dir) => {
                std::fs::create_dir_all(dir)?;
                dir.as_path()
            }
            None => {
                temp_dir = tempfile::tempdir()?;
                temp_dir.path()
            }
        };

        log::info!(
            "Generating band {} angles with USGS utility: {}",
            band.band_number,
            self.utility_path.display()
        );

        let status = Command::new(&self.utility_path)
            .arg(&self.angle_coefficients_file)
            .arg("BOTH")
            .arg("1")
            .arg("-b")
            .arg(&band.band_number)
            .current_dir(working_dir)
            .status()?;

        if !status.success() {
            return Err(SremError::Collaborator(format!(
                "USGS angle utility exited with status {} for band {}",
                status, band.band_number
            )));
        }

        let solar_path = Self::angle_file(working_dir, scene, "solar", &band.band_number);
        let sensor_path = Self::angle_file(working_dir, scene, "sensor", &band.band_number);

        let (solar_azimuth, _) = read_band_f32(&solar_path, 1)?;
        let (solar_zenith, _) = read_band_f32(&solar_path, 2)?;
        let (sensor_azimuth, _) = read_band_f32(&sensor_path, 1)?;
        let (sensor_zenith, _) = read_band_f32(&sensor_path, 2)?;

        Ok(AngleGrids {
            solar_zenith: scaled_radians(solar_zenith, DEFAULT_ANGLE_SCALE),
            solar_azimuth: scaled_radians(solar_azimuth, DEFAULT_ANGLE_SCALE),
            sensor_zenith: scaled_radians(sensor_zenith, DEFAULT_ANGLE_SCALE),
            sensor_azimuth: scaled_radians(sensor_azimuth, DEFAULT_ANGLE_SCALE),
        })
    }
}

/// Hands back angle grids that already live in memory. Useful when a
/// caller computed or cached the geometry itself, and in tests.
#[derive(Debug, Clone)]
pub struct PreloadedAngles {
    pub angles: AngleGrids,
}

impl PreloadedAngles {
    pub fn new(angles: AngleGrids) -> Self {
        Self { angles }
    }
}

impl GeometryResolver for PreloadedAngles {
    fn resolve_angles(
        &self,
        _band: &BandCalibration,
        _scene: &SceneMetadata,
    ) -> SremResult<AngleGrids> {
        Ok(self.angles.clone())
    }
}
