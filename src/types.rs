use chrono::NaiveDate;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Real-valued raster data (rows x columns)
pub type BandGrid = Array2<f32>;

/// Raw digital-number raster as delivered by the sensor
pub type DnGrid = Array2<u16>;

/// Landsat sensor generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SpacecraftId {
    Landsat4,
    Landsat5,
    Landsat7,
    Landsat8,
}

impl SpacecraftId {
    /// Parse the SPACECRAFT_ID value found in MTL metadata
    pub fn from_mtl(value: &str) -> Option<Self> {
        match value {
            "LANDSAT_4" => Some(SpacecraftId::Landsat4),
            "LANDSAT_5" => Some(SpacecraftId::Landsat5),
            "LANDSAT_7" => Some(SpacecraftId::Landsat7),
            "LANDSAT_8" => Some(SpacecraftId::Landsat8),
            _ => None,
        }
    }

    /// Reflective band numbers eligible for SREM correction
    pub fn reflective_bands(&self) -> &'static [&'static str] {
        match self {
            SpacecraftId::Landsat8 => &["1", "2", "3", "4", "5", "6", "7"],
            SpacecraftId::Landsat7 | SpacecraftId::Landsat5 | SpacecraftId::Landsat4 => {
                &["1", "2", "3", "4", "5", "7"]
            }
        }
    }
}

impl std::fmt::Display for SpacecraftId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SpacecraftId::Landsat4 => write!(f, "LANDSAT_4"),
            SpacecraftId::Landsat5 => write!(f, "LANDSAT_5"),
            SpacecraftId::Landsat7 => write!(f, "LANDSAT_7"),
            SpacecraftId::Landsat8 => write!(f, "LANDSAT_8"),
        }
    }
}

/// Whether a band calibrates to reflectance or to brightness temperature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BandType {
    Reflectance,
    Thermal,
}

/// Per-band radiometric calibration constants resolved from MTL metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BandCalibration {
    /// Band identifier as it appears in the MTL ("1".."11", "QA", ...)
    pub band_number: String,
    pub band_type: BandType,
    pub file_name: String,

    // Linear DN -> radiance mapping
    pub radiance_maximum: f64,
    pub radiance_minimum: f64,
    pub quantize_cal_maximum: f64,
    pub quantize_cal_minimum: f64,

    /// Exo-atmospheric solar irradiance (W/m^2/um), reflective bands only
    pub solar_irradiance: Option<f64>,
    /// Thermal conversion constants, thermal bands only
    pub k1_constant: Option<f64>,
    pub k2_constant: Option<f64>,
    /// Band-center wavelength in micrometers, reflective bands only
    pub wavelength: Option<f64>,
}

impl BandCalibration {
    /// Check the constants every conversion path depends on.
    pub fn validate(&self) -> SremResult<()> {
        if self.quantize_cal_maximum == self.quantize_cal_minimum {
            return Err(SremError::InvalidConfiguration(format!(
                "band {}: quantize_cal_maximum == quantize_cal_minimum ({})",
                self.band_number, self.quantize_cal_maximum
            )));
        }
        Ok(())
    }
}

/// Scene-wide acquisition metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneMetadata {
    pub spacecraft: SpacecraftId,
    pub product_id: String,
    pub acquisition_date: Option<NaiveDate>,
    /// Earth-sun distance in astronomical units
    pub earth_sun_distance: f64,
    /// Scene-center sun elevation in degrees, [-90, 90]
    pub sun_elevation_degrees: f64,
}

/// Geospatial transformation parameters (GDAL geotransform order)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub top_left_x: f64,
    pub pixel_width: f64,
    pub rotation_x: f64,
    pub top_left_y: f64,
    pub rotation_y: f64,
    pub pixel_height: f64,
}

impl GeoTransform {
    pub fn from_gdal(gt: &[f64; 6]) -> Self {
        Self {
            top_left_x: gt[0],
            pixel_width: gt[1],
            rotation_x: gt[2],
            top_left_y: gt[3],
            rotation_y: gt[4],
            pixel_height: gt[5],
        }
    }

    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.top_left_x,
            self.pixel_width,
            self.rotation_x,
            self.top_left_y,
            self.rotation_y,
            self.pixel_height,
        ]
    }
}

/// Georeferencing carried from a source raster to any derived output
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeoReference {
    /// Projection as WKT
    pub projection: String,
    pub geo_transform: GeoTransform,
    pub width: usize,
    pub height: usize,
}

/// The four per-pixel geometry grids the atmospheric model consumes,
/// all in radians and aligned to the band raster.
#[derive(Debug, Clone)]
pub struct AngleGrids {
    pub solar_zenith: BandGrid,
    pub solar_azimuth: BandGrid,
    pub sensor_zenith: BandGrid,
    pub sensor_azimuth: BandGrid,
}

impl AngleGrids {
    pub fn dim(&self) -> (usize, usize) {
        self.solar_zenith.dim()
    }

    /// All four grids must share one shape, and it must match the band raster.
    pub fn check_shape(&self, band_dim: (usize, usize)) -> SremResult<()> {
        for (name, grid) in [
            ("solar_zenith", &self.solar_zenith),
            ("solar_azimuth", &self.solar_azimuth),
            ("sensor_zenith", &self.sensor_zenith),
            ("sensor_azimuth", &self.sensor_azimuth),
        ] {
            if grid.dim() != band_dim {
                return Err(SremError::InvalidConfiguration(format!(
                    "{} grid is {:?} but band raster is {:?}",
                    name,
                    grid.dim(),
                    band_dim
                )));
            }
        }
        Ok(())
    }
}

/// Error types for SREM processing
#[derive(Debug, thiserror::Error)]
pub enum SremError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid band type: {0}")]
    InvalidBandType(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Metadata error: {0}")]
    Metadata(String),

    #[error("Collaborator failure: {0}")]
    Collaborator(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),
}

/// Result type for SREM operations
pub type SremResult<T> = Result<T, SremError>;
