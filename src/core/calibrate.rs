use crate::types::{
    BandCalibration, BandGrid, BandType, DnGrid, SceneMetadata, SremError, SremResult,
};

const CELSIUS_OFFSET: f64 = 273.15;

/// Radiometric calibration for one Landsat band.
///
/// Converts raw digital numbers to spectral radiance, and radiance to
/// top-of-atmosphere reflectance (reflective bands) or brightness
/// temperature (thermal bands). DN value 0 marks no-data and is written
/// out as NaN; NaN then rides through every downstream formula.
pub struct BandCalibrator {
    calibration: BandCalibration,
    scene: SceneMetadata,
}

impl BandCalibrator {
    pub fn new(calibration: BandCalibration, scene: SceneMetadata) -> SremResult<Self> {
        calibration.validate()?;
        Ok(Self { calibration, scene })
    }

    pub fn calibration(&self) -> &BandCalibration {
        &self.calibration
    }

    /// Convert raw digital numbers to spectral radiance (W/m^2/sr/um).
    pub fn radiance(&self, dn: &DnGrid) -> BandGrid {
        log::debug!(
            "Converting band {} DN to radiance ({}x{})",
            self.calibration.band_number,
            dn.nrows(),
            dn.ncols()
        );

        let gain = (self.calibration.radiance_maximum - self.calibration.radiance_minimum)
            / (self.calibration.quantize_cal_maximum - self.calibration.quantize_cal_minimum);
        let q_min = self.calibration.quantize_cal_minimum;
        let offset = self.calibration.radiance_minimum;

        dn.mapv(|v| {
            if v == 0 {
                f32::NAN
            } else {
                (gain * (v as f64 - q_min) + offset) as f32
            }
        })
    }

    /// Convert raw digital numbers to top-of-atmosphere reflectance.
    ///
    /// Fails unless the band is a reflective band.
    pub fn reflectance(&self, dn: &DnGrid) -> SremResult<BandGrid> {
        let radiance = self.radiance(dn);
        self.reflectance_from_radiance(&radiance)
    }

    /// Convert an already-computed radiance grid to TOA reflectance.
    ///
    /// Numerically identical to [`reflectance`](Self::reflectance); this
    /// entry point exists so a caller holding the radiance grid does not
    /// pay for recomputing it.
    pub fn reflectance_from_radiance(&self, radiance: &BandGrid) -> SremResult<BandGrid> {
        if self.calibration.band_type != BandType::Reflectance {
            return Err(SremError::InvalidBandType(format!(
                "band {} is thermal, cannot convert to reflectance",
                self.calibration.band_number
            )));
        }
        let irradiance = self.calibration.solar_irradiance.ok_or_else(|| {
            SremError::InvalidConfiguration(format!(
                "band {}: missing solar irradiance",
                self.calibration.band_number
            ))
        })?;

        let d = self.scene.earth_sun_distance;
        let sun_elevation = self.scene.sun_elevation_degrees.to_radians();
        // Sun at the horizon makes this scale blow up; that is propagated
        // as-is rather than clamped.
        let scale = std::f64::consts::PI * d * d / (irradiance * sun_elevation.sin());

        log::debug!(
            "Band {} TOA reflectance: d={} AU, sun elevation={} deg",
            self.calibration.band_number,
            d,
            self.scene.sun_elevation_degrees
        );

        Ok(radiance.mapv(|l| (l as f64 * scale) as f32))
    }

    /// Convert raw digital numbers to at-sensor brightness temperature
    /// in degrees Celsius.
    ///
    /// Fails unless the band is a thermal band.
    pub fn brightness_temperature(&self, dn: &DnGrid) -> SremResult<BandGrid> {
        if self.calibration.band_type != BandType::Thermal {
            return Err(SremError::InvalidBandType(format!(
                "band {} is reflective, cannot convert to brightness temperature",
                self.calibration.band_number
            )));
        }
        let k1 = self.calibration.k1_constant.ok_or_else(|| {
            SremError::InvalidConfiguration(format!(
                "band {}: missing K1 constant",
                self.calibration.band_number
            ))
        })?;
        let k2 = self.calibration.k2_constant.ok_or_else(|| {
            SremError::InvalidConfiguration(format!(
                "band {}: missing K2 constant",
                self.calibration.band_number
            ))
        })?;

        let radiance = self.radiance(dn);
        // Radiance <= -K1 drives the log argument non-positive; the
        // resulting NaN/-inf is left in the output.
        Ok(radiance.mapv(|l| {
            let l = l as f64;
            ((k2 / (k1 / l + 1.0).ln()) - CELSIUS_OFFSET) as f32
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SpacecraftId;
    use ndarray::Array2;

    fn reflective_calibration() -> BandCalibration {
        BandCalibration {
            band_number: "4".to_string(),
            band_type: BandType::Reflectance,
            file_name: "LC08_B4.TIF".to_string(),
            radiance_maximum: 300.0,
            radiance_minimum: -1.0,
            quantize_cal_maximum: 65535.0,
            quantize_cal_minimum: 1.0,
            solar_irradiance: Some(1549.49),
            k1_constant: None,
            k2_constant: None,
            wavelength: Some(0.6546),
        }
    }

    fn thermal_calibration() -> BandCalibration {
        BandCalibration {
            band_number: "10".to_string(),
            band_type: BandType::Thermal,
            file_name: "LC08_B10.TIF".to_string(),
            radiance_maximum: 22.0,
            radiance_minimum: 0.1,
            quantize_cal_maximum: 65535.0,
            quantize_cal_minimum: 1.0,
            solar_irradiance: None,
            k1_constant: Some(774.8853),
            k2_constant: Some(1321.0789),
            wavelength: None,
        }
    }

    fn scene() -> SceneMetadata {
        SceneMetadata {
            spacecraft: SpacecraftId::Landsat8,
            product_id: "LC08_L1TP_TEST".to_string(),
            acquisition_date: None,
            earth_sun_distance: 1.0141,
            sun_elevation_degrees: 45.0,
        }
    }

    #[test]
    fn test_radiance_at_quantize_minimum() {
        let calibrator = BandCalibrator::new(reflective_calibration(), scene()).unwrap();
        let dn = Array2::from_elem((2, 2), 1u16);
        let radiance = calibrator.radiance(&dn);
        // DN at quantize_cal_minimum maps exactly to radiance_minimum
        assert_eq!(radiance[[0, 0]], -1.0);
    }

    #[test]
    fn test_radiance_nodata_sentinel() {
        let calibrator = BandCalibrator::new(reflective_calibration(), scene()).unwrap();
        let mut dn = Array2::from_elem((2, 2), 100u16);
        dn[[1, 1]] = 0;
        let radiance = calibrator.radiance(&dn);
        assert!(radiance[[1, 1]].is_nan());
        assert!(radiance[[0, 0]].is_finite());
    }

    #[test]
    fn test_reflectance_call_paths_agree() {
        let calibrator = BandCalibrator::new(reflective_calibration(), scene()).unwrap();
        let dn = Array2::from_shape_fn((3, 3), |(i, j)| (1 + i * 100 + j) as u16);
        let direct = calibrator.reflectance(&dn).unwrap();
        let radiance = calibrator.radiance(&dn);
        let via_radiance = calibrator.reflectance_from_radiance(&radiance).unwrap();
        for (a, b) in direct.iter().zip(via_radiance.iter()) {
            assert_eq!(a, b);
        }
    }

    #[test]
    fn test_reflectance_rejects_thermal_band() {
        let calibrator = BandCalibrator::new(thermal_calibration(), scene()).unwrap();
        let dn = Array2::from_elem((2, 2), 100u16);
        match calibrator.reflectance(&dn) {
            Err(SremError::InvalidBandType(_)) => {}
            other => panic!("expected InvalidBandType, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_brightness_temperature_rejects_reflective_band() {
        let calibrator = BandCalibrator::new(reflective_calibration(), scene()).unwrap();
        let dn = Array2::from_elem((2, 2), 100u16);
        match calibrator.brightness_temperature(&dn) {
            Err(SremError::InvalidBandType(_)) => {}
            other => panic!("expected InvalidBandType, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_brightness_temperature_reference_value() {
        let calibrator = BandCalibrator::new(thermal_calibration(), scene()).unwrap();
        // DN 32768 sits at exactly half the quantize range, so radiance is
        // 21.9 * 0.5 + 0.1 = 11.05, and with the band-10 K constants
        // T = 1321.0789 / ln(774.8853 / 11.05 + 1) - 273.15 = 36.639 C
        let dn = Array2::from_elem((1, 1), 32768u16);
        let temp = calibrator.brightness_temperature(&dn).unwrap();
        approx::assert_relative_eq!(temp[[0, 0]], 36.639, epsilon = 1e-2);
    }

    #[test]
    fn test_degenerate_quantize_range_rejected() {
        let mut calibration = reflective_calibration();
        calibration.quantize_cal_maximum = 1.0;
        calibration.quantize_cal_minimum = 1.0;
        match BandCalibrator::new(calibration, scene()) {
            Err(SremError::InvalidConfiguration(_)) => {}
            _ => panic!("expected InvalidConfiguration"),
        }
    }
}
