use crate::types::{
    BandCalibration, BandType, SceneMetadata, SpacecraftId, SremError, SremResult,
};
use chrono::NaiveDate;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

/// Spectral constants the MTL file does not carry: band-center wavelength
/// (micrometers) and exo-atmospheric solar irradiance (W/m^2/um).
struct BandSpec {
    number: &'static str,
    band_type: BandType,
    wavelength: Option<f64>,
    solar_irradiance: Option<f64>,
}

const LANDSAT8_BANDS: &[BandSpec] = &[
    BandSpec { number: "1", band_type: BandType::Reflectance, wavelength: Some(0.4430), solar_irradiance: Some(1895.33) },
    BandSpec { number: "2", band_type: BandType::Reflectance, wavelength: Some(0.4825), solar_irradiance: Some(2004.57) },
    BandSpec { number: "3", band_type: BandType::Reflectance, wavelength: Some(0.5625), solar_irradiance: Some(1820.75) },
    BandSpec { number: "4", band_type: BandType::Reflectance, wavelength: Some(0.6550), solar_irradiance: Some(1549.49) },
    BandSpec { number: "5", band_type: BandType::Reflectance, wavelength: Some(0.8650), solar_irradiance: Some(951.76) },
    BandSpec { number: "6", band_type: BandType::Reflectance, wavelength: Some(1.6100), solar_irradiance: Some(247.55) },
    BandSpec { number: "7", band_type: BandType::Reflectance, wavelength: Some(2.2000), solar_irradiance: Some(85.46) },
    BandSpec { number: "8", band_type: BandType::Reflectance, wavelength: Some(0.5900), solar_irradiance: Some(1723.88) },
    BandSpec { number: "9", band_type: BandType::Reflectance, wavelength: Some(1.3750), solar_irradiance: Some(366.97) },
    BandSpec { number: "10", band_type: BandType::Thermal, wavelength: None, solar_irradiance: None },
    BandSpec { number: "11", band_type: BandType::Thermal, wavelength: None, solar_irradiance: None },
];

const LANDSAT7_BANDS: &[BandSpec] = &[
    BandSpec { number: "1", band_type: BandType::Reflectance, wavelength: Some(0.4850), solar_irradiance: Some(1969.0) },
    BandSpec { number: "2", band_type: BandType::Reflectance, wavelength: Some(0.5600), solar_irradiance: Some(1840.0) },
    BandSpec { number: "3", band_type: BandType::Reflectance, wavelength: Some(0.6600), solar_irradiance: Some(1551.0) },
    BandSpec { number: "4", band_type: BandType::Reflectance, wavelength: Some(0.8350), solar_irradiance: Some(1044.0) },
    BandSpec { number: "5", band_type: BandType::Reflectance, wavelength: Some(1.6500), solar_irradiance: Some(225.7) },
    BandSpec { number: "6", band_type: BandType::Thermal, wavelength: None, solar_irradiance: None },
    BandSpec { number: "7", band_type: BandType::Reflectance, wavelength: Some(2.2200), solar_irradiance: Some(82.07) },
    BandSpec { number: "8", band_type: BandType::Reflectance, wavelength: Some(0.7100), solar_irradiance: Some(1368.0) },
];

const LANDSAT45_BANDS: &[BandSpec] = &[
    BandSpec { number: "1", band_type: BandType::Reflectance, wavelength: Some(0.4850), solar_irradiance: Some(1957.0) },
    BandSpec { number: "2", band_type: BandType::Reflectance, wavelength: Some(0.5600), solar_irradiance: Some(1826.0) },
    BandSpec { number: "3", band_type: BandType::Reflectance, wavelength: Some(0.6600), solar_irradiance: Some(1554.0) },
    BandSpec { number: "4", band_type: BandType::Reflectance, wavelength: Some(0.8300), solar_irradiance: Some(1036.0) },
    BandSpec { number: "5", band_type: BandType::Reflectance, wavelength: Some(1.6500), solar_irradiance: Some(215.0) },
    BandSpec { number: "6", band_type: BandType::Thermal, wavelength: None, solar_irradiance: None },
    BandSpec { number: "7", band_type: BandType::Reflectance, wavelength: Some(2.2200), solar_irradiance: Some(80.67) },
];

/// Reader for Landsat Level-1 MTL metadata files.
///
/// The MTL format is a nested GROUP/END_GROUP structure of KEY = VALUE
/// lines; key names are unique across the whole file, so the reader
/// flattens everything into one map and resolves typed records from it.
pub struct MetadataReader {
    values: HashMap<String, String>,
    scene: SceneMetadata,
    bands: Vec<BandCalibration>,
}

impl MetadataReader {
    pub fn from_file<P: AsRef<Path>>(path: P) -> SremResult<Self> {
        log::info!("Reading MTL metadata: {}", path.as_ref().display());
        let content = std::fs::read_to_string(path)?;
        Self::from_mtl_text(&content)
    }

    pub fn from_mtl_text(content: &str) -> SremResult<Self> {
        let values = parse_mtl_pairs(content)?;
        if values.is_empty() {
            return Err(SremError::Metadata(
                "No KEY = VALUE pairs found in MTL content".to_string(),
            ));
        }

        let scene = resolve_scene(&values)?;
        let bands = resolve_bands(&values, scene.spacecraft);
        log::info!(
            "Parsed MTL for {} ({}): {} calibrated bands",
            scene.product_id,
            scene.spacecraft,
            bands.len()
        );

        Ok(Self {
            values,
            scene,
            bands,
        })
    }

    pub fn scene(&self) -> &SceneMetadata {
        &self.scene
    }

    pub fn bands(&self) -> &[BandCalibration] {
        &self.bands
    }

    /// Calibration record by band number ("1".."11").
    pub fn band(&self, number: &str) -> SremResult<&BandCalibration> {
        self.bands
            .iter()
            .find(|b| b.band_number == number)
            .ok_or_else(|| {
                SremError::Metadata(format!("No calibration metadata for band {}", number))
            })
    }

    /// Calibration record by band file name; the match ignores any
    /// directory components on either side.
    pub fn band_by_file_name(&self, file_name: &str) -> SremResult<&BandCalibration> {
        let base = Path::new(file_name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(file_name);
        self.bands
            .iter()
            .find(|b| b.file_name == base)
            .ok_or_else(|| SremError::Metadata(format!("No band with file name {}", base)))
    }

    /// Raw MTL value lookup for keys the typed records do not cover.
    pub fn value(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }
}

/// Flatten an MTL document into KEY -> VALUE pairs, dropping the GROUP
/// structure and surrounding quotes.
fn parse_mtl_pairs(content: &str) -> SremResult<HashMap<String, String>> {
    let pair_re = Regex::new(r#"^\s*([A-Z0-9_]+)\s*=\s*"?([^"]*?)"?\s*$"#)
        .map_err(|e| SremError::Metadata(format!("Regex error: {}", e)))?;
    let mut values = HashMap::new();

    for line in content.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed == "END" {
            continue;
        }
        if let Some(caps) = pair_re.captures(trimmed) {
            let key = caps[1].to_string();
            if key == "GROUP" || key == "END_GROUP" {
                continue;
            }
            values.insert(key, caps[2].trim().to_string());
        }
    }

    Ok(values)
}

fn require<'a>(values: &'a HashMap<String, String>, key: &str) -> SremResult<&'a str> {
    values
        .get(key)
        .map(|s| s.as_str())
        .ok_or_else(|| SremError::Metadata(format!("Missing MTL key: {}", key)))
}

fn require_f64(values: &HashMap<String, String>, key: &str) -> SremResult<f64> {
    let raw = require(values, key)?;
    raw.parse::<f64>()
        .map_err(|e| SremError::Metadata(format!("Invalid value for {}: {} ({})", key, raw, e)))
}

fn optional_f64(values: &HashMap<String, String>, key: &str) -> Option<f64> {
    values.get(key).and_then(|v| v.parse::<f64>().ok())
}

fn resolve_scene(values: &HashMap<String, String>) -> SremResult<SceneMetadata> {
    let spacecraft_raw = require(values, "SPACECRAFT_ID")?;
    let spacecraft = SpacecraftId::from_mtl(spacecraft_raw).ok_or_else(|| {
        SremError::Metadata(format!("Unsupported spacecraft: {}", spacecraft_raw))
    })?;

    let product_id = values
        .get("LANDSAT_PRODUCT_ID")
        .or_else(|| values.get("LANDSAT_SCENE_ID"))
        .cloned()
        .ok_or_else(|| SremError::Metadata("Missing LANDSAT_PRODUCT_ID".to_string()))?;

    let acquisition_date = values
        .get("DATE_ACQUIRED")
        .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok());

    let sun_elevation_degrees = require_f64(values, "SUN_ELEVATION")?;
    if !(-90.0..=90.0).contains(&sun_elevation_degrees) {
        return Err(SremError::Metadata(format!(
            "SUN_ELEVATION out of range: {}",
            sun_elevation_degrees
        )));
    }

    Ok(SceneMetadata {
        spacecraft,
        product_id,
        acquisition_date,
        earth_sun_distance: require_f64(values, "EARTH_SUN_DISTANCE")?,
        sun_elevation_degrees,
    })
}

fn resolve_bands(values: &HashMap<String, String>, spacecraft: SpacecraftId) -> Vec<BandCalibration> {
    let specs = match spacecraft {
        SpacecraftId::Landsat8 => LANDSAT8_BANDS,
        SpacecraftId::Landsat7 => LANDSAT7_BANDS,
        SpacecraftId::Landsat5 | SpacecraftId::Landsat4 => LANDSAT45_BANDS,
    };

    let mut bands = Vec::new();
    for spec in specs {
        let n = spec.number;
        let radiance_maximum = optional_f64(values, &format!("RADIANCE_MAXIMUM_BAND_{}", n));
        let radiance_minimum = optional_f64(values, &format!("RADIANCE_MINIMUM_BAND_{}", n));
        let quantize_max = optional_f64(values, &format!("QUANTIZE_CAL_MAX_BAND_{}", n));
        let quantize_min = optional_f64(values, &format!("QUANTIZE_CAL_MIN_BAND_{}", n));
        let file_name = values.get(&format!("FILE_NAME_BAND_{}", n));

        let (radiance_maximum, radiance_minimum, quantize_max, quantize_min, file_name) = match (
            radiance_maximum,
            radiance_minimum,
            quantize_max,
            quantize_min,
            file_name,
        ) {
            (Some(a), Some(b), Some(c), Some(d), Some(f)) => (a, b, c, d, f.clone()),
            _ => {
                log::debug!("Band {}: incomplete radiometric keys, skipping", n);
                continue;
            }
        };

        bands.push(BandCalibration {
            band_number: n.to_string(),
            band_type: spec.band_type,
            file_name,
            radiance_maximum,
            radiance_minimum,
            quantize_cal_maximum: quantize_max,
            quantize_cal_minimum: quantize_min,
            solar_irradiance: spec.solar_irradiance,
            k1_constant: optional_f64(values, &format!("K1_CONSTANT_BAND_{}", n)),
            k2_constant: optional_f64(values, &format!("K2_CONSTANT_BAND_{}", n)),
            wavelength: spec.wavelength,
        });
    }

    bands
}
