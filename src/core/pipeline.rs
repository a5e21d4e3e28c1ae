//! One-band correction pipeline and full-scene batch driver.

use crate::core::calibrate::BandCalibrator;
use crate::core::srem::SremModel;
use crate::io::geometry::GeometryResolver;
use crate::io::metadata::MetadataReader;
use crate::io::raster::{read_band_dn, save_geotiff};
use crate::types::{
    AngleGrids, BandCalibration, BandGrid, BandType, DnGrid, SceneMetadata, SremError, SremResult,
};
use std::path::{Path, PathBuf};

/// Run the full correction chain for one band held in memory:
/// DN -> radiance -> TOA reflectance -> SREM surface reflectance.
///
/// All preconditions (band type, wavelength, grid shapes) are checked
/// before any pixel work starts. The output grid has the shape of the
/// input DN grid; no-data pixels (DN == 0) come out as NaN.
pub fn correct_band(
    dn: &DnGrid,
    calibration: &BandCalibration,
    scene: &SceneMetadata,
    angles: &AngleGrids,
) -> SremResult<BandGrid> {
    angles.check_shape(dn.dim())?;

    // Thermal bands carry no wavelength, so this check must come first
    // or they would misreport as a configuration problem.
    if calibration.band_type != BandType::Reflectance {
        return Err(SremError::InvalidBandType(format!(
            "band {} is thermal, SREM correction is defined for reflective bands only",
            calibration.band_number
        )));
    }

    let wavelength = calibration.wavelength.ok_or_else(|| {
        SremError::InvalidConfiguration(format!(
            "band {}: no wavelength, SREM correction undefined",
            calibration.band_number
        ))
    })?;
    let model = SremModel::new(wavelength)?;
    let calibrator = BandCalibrator::new(calibration.clone(), scene.clone())?;

    log::info!(
        "Correcting band {} ({}x{} pixels)",
        calibration.band_number,
        dn.nrows(),
        dn.ncols()
    );

    let toa_reflectance = calibrator.reflectance(dn)?;
    model.surface_reflectance(&toa_reflectance, angles)
}

/// Read one band raster, correct it, and write the surface-reflectance
/// GeoTIFF next to wherever `output_path` points. The output inherits
/// the band raster's projection and geotransform.
pub fn process_band<P: AsRef<Path>>(
    band_path: P,
    metadata_path: P,
    resolver: &dyn GeometryResolver,
    output_path: P,
) -> SremResult<()> {
    let reader = MetadataReader::from_file(metadata_path.as_ref())?;
    let scene = reader.scene();
    let band_name = band_path
        .as_ref()
        .to_str()
        .ok_or_else(|| SremError::InvalidConfiguration("non-UTF8 band path".to_string()))?;
    let calibration = reader.band_by_file_name(band_name)?;

    let (dn, georef) = read_band_dn(band_path.as_ref())?;
    let angles = resolver.resolve_angles(calibration, scene)?;
    let surface = correct_band(&dn, calibration, scene, &angles)?;

    save_geotiff(&surface, &georef, output_path.as_ref())
}

/// Correct every reflective band of a scene, writing
/// `<band_stem>_SREM_SR.TIF` files into `output_dir`. Returns the paths
/// written. A failing band aborts the batch; bands already written stay
/// on disk.
pub fn process_scene<P: AsRef<Path>>(
    metadata_path: P,
    resolver: &dyn GeometryResolver,
    output_dir: P,
) -> SremResult<Vec<PathBuf>> {
    let reader = MetadataReader::from_file(metadata_path.as_ref())?;
    let scene = reader.scene().clone();
    let scene_dir = metadata_path
        .as_ref()
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    std::fs::create_dir_all(output_dir.as_ref())?;

    let mut written = Vec::new();
    for band_number in scene.spacecraft.reflective_bands() {
        let calibration = reader.band(band_number)?;
        let band_path = scene_dir.join(&calibration.file_name);
        let stem = Path::new(&calibration.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&calibration.file_name);
        let output_path = output_dir.as_ref().join(format!("{}_SREM_SR.TIF", stem));

        log::info!("---------------");
        log::info!("Processing {}...", calibration.file_name);

        let (dn, georef) = read_band_dn(&band_path)?;
        let angles = resolver.resolve_angles(calibration, &scene)?;
        let surface = correct_band(&dn, calibration, &scene, &angles)?;
        save_geotiff(&surface, &georef, &output_path)?;

        written.push(output_path);
    }

    log::info!("Scene complete: {} bands written", written.len());
    Ok(written)
}

/// Parallel variant of [`process_scene`]: bands share no state, so they
/// run concurrently on the Rayon pool. The first failing band aborts
/// the batch.
#[cfg(feature = "parallel")]
pub fn process_scene_par<P, R>(
    metadata_path: P,
    resolver: &R,
    output_dir: P,
) -> SremResult<Vec<PathBuf>>
where
    P: AsRef<Path> + Sync,
    R: GeometryResolver + Sync,
{
    use rayon::prelude::*;

    let reader = MetadataReader::from_file(metadata_path.as_ref())?;
    let scene = reader.scene().clone();
    let scene_dir = metadata_path
        .as_ref()
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .to_path_buf();

    std::fs::create_dir_all(output_dir.as_ref())?;

    scene
        .spacecraft
        .reflective_bands()
        .par_iter()
        .map(|band_number| {
            let calibration = reader.band(band_number)?;
            let band_path = scene_dir.join(&calibration.file_name);
            let stem = Path::new(&calibration.file_name)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&calibration.file_name);
            let output_path = output_dir.as_ref().join(format!("{}_SREM_SR.TIF", stem));

            log::info!("Processing {}...", calibration.file_name);

            let (dn, georef) = read_band_dn(&band_path)?;
            let angles = resolver.resolve_angles(calibration, &scene)?;
            let surface = correct_band(&dn, calibration, &scene, &angles)?;
            save_geotiff(&surface, &georef, &output_path)?;

            Ok(output_path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BandType, SpacecraftId};
    use ndarray::Array2;

    fn calibration() -> BandCalibration {
        BandCalibration {
            band_number: "4".to_string(),
            band_type: BandType::Reflectance,
            file_name: "LC08_B4.TIF".to_string(),
            radiance_maximum: 600.92914,
            radiance_minimum: -49.62308,
            quantize_cal_maximum: 65535.0,
            quantize_cal_minimum: 1.0,
            solar_irradiance: Some(1549.49),
            k1_constant: None,
            k2_constant: None,
            wavelength: Some(0.655),
        }
    }

    fn scene() -> SceneMetadata {
        SceneMetadata {
            spacecraft: SpacecraftId::Landsat8,
            product_id: "LC08_L1TP_TEST".to_string(),
            acquisition_date: None,
            earth_sun_distance: 1.0164353,
            sun_elevation_degrees: 55.18,
        }
    }

    fn angles(dim: (usize, usize)) -> AngleGrids {
        AngleGrids {
            solar_zenith: Array2::from_elem(dim, 0.6f32),
            solar_azimuth: Array2::from_elem(dim, 2.4f32),
            sensor_zenith: Array2::from_elem(dim, 0.05f32),
            sensor_azimuth: Array2::from_elem(dim, 1.7f32),
        }
    }

    #[test]
    fn test_correct_band_shape_and_nodata() {
        let mut dn = Array2::from_elem((4, 5), 20000u16);
        dn[[2, 3]] = 0;
        let surface = correct_band(&dn, &calibration(), &scene(), &angles((4, 5))).unwrap();
        assert_eq!(surface.dim(), (4, 5));
        assert!(surface[[2, 3]].is_nan());
        assert!(surface[[0, 0]].is_finite());
    }

    #[test]
    fn test_correct_band_rejects_shape_mismatch() {
        let dn = Array2::from_elem((4, 5), 20000u16);
        match correct_band(&dn, &calibration(), &scene(), &angles((5, 4))) {
            Err(SremError::InvalidConfiguration(_)) => {}
            _ => panic!("expected InvalidConfiguration"),
        }
    }

    #[test]
    fn test_correct_band_rejects_thermal_band() {
        // Shaped like a thermal band resolved from a real MTL: no
        // wavelength, no solar irradiance, K constants present.
        let mut thermal = calibration();
        thermal.band_number = "10".to_string();
        thermal.band_type = BandType::Thermal;
        thermal.solar_irradiance = None;
        thermal.wavelength = None;
        thermal.k1_constant = Some(774.8853);
        thermal.k2_constant = Some(1321.0789);
        let dn = Array2::from_elem((2, 2), 20000u16);
        match correct_band(&dn, &thermal, &scene(), &angles((2, 2))) {
            Err(SremError::InvalidBandType(_)) => {}
            _ => panic!("expected InvalidBandType"),
        }
    }

    #[test]
    fn test_correct_band_requires_wavelength() {
        let mut cal = calibration();
        cal.wavelength = None;
        let dn = Array2::from_elem((2, 2), 20000u16);
        match correct_band(&dn, &cal, &scene(), &angles((2, 2))) {
            Err(SremError::InvalidConfiguration(_)) => {}
            _ => panic!("expected InvalidConfiguration"),
        }
    }
}
