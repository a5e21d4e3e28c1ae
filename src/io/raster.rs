use crate::types::{BandGrid, DnGrid, GeoReference, GeoTransform, SremError, SremResult};
use gdal::{Dataset, DriverManager};
use ndarray::Array2;
use std::path::Path;

fn georeference_of(dataset: &Dataset) -> SremResult<GeoReference> {
    let (width, height) = dataset.raster_size();
    let gt = dataset.geo_transform()?;
    Ok(GeoReference {
        projection: dataset.projection(),
        geo_transform: GeoTransform::from_gdal(&gt),
        width,
        height,
    })
}

/// Read a raw digital-number band (band 1) plus its georeferencing.
pub fn read_band_dn<P: AsRef<Path>>(path: P) -> SremResult<(DnGrid, GeoReference)> {
    log::info!("Reading band raster: {}", path.as_ref().display());

    let dataset = Dataset::open(path.as_ref())?;
    let georef = georeference_of(&dataset)?;
    let (width, height) = (georef.width, georef.height);

    let rasterband = dataset.rasterband(1)?;
    let buffer = rasterband.read_as::<u16>((0, 0), (width, height), (width, height), None)?;
    let grid = Array2::from_shape_vec((height, width), buffer.data)
        .map_err(|e| SremError::Collaborator(format!("Failed to reshape band data: {}", e)))?;

    log::debug!("Read {}x{} DN raster", height, width);
    Ok((grid, georef))
}

/// Read one band of a raster as f32, for angle grids and other
/// floating-point collaborator products.
pub fn read_band_f32<P: AsRef<Path>>(
    path: P,
    band_index: usize,
) -> SremResult<(BandGrid, GeoReference)> {
    log::debug!(
        "Reading band {} of raster: {}",
        band_index,
        path.as_ref().display()
    );

    let dataset = Dataset::open(path.as_ref())?;
    let georef = georeference_of(&dataset)?;
    let (width, height) = (georef.width, georef.height);

    let rasterband = dataset.rasterband(band_index as isize)?;
    let buffer = rasterband.read_as::<f32>((0, 0), (width, height), (width, height), None)?;
    let grid = Array2::from_shape_vec((height, width), buffer.data)
        .map_err(|e| SremError::Collaborator(format!("Failed to reshape band data: {}", e)))?;

    Ok((grid, georef))
}

/// Write a single-band Float32 GeoTIFF, inheriting projection and
/// geotransform from the source band's georeferencing. NaN is declared
/// as the no-data value so downstream tools mask the sentinel pixels.
pub fn save_geotiff<P: AsRef<Path>>(
    grid: &BandGrid,
    georef: &GeoReference,
    output_path: P,
) -> SremResult<()> {
    log::info!("Saving GeoTIFF: {}", output_path.as_ref().display());

    let (height, width) = grid.dim();
    if (width, height) != (georef.width, georef.height) {
        return Err(SremError::InvalidConfiguration(format!(
            "grid is {}x{} but georeference describes {}x{}",
            height, width, georef.height, georef.width
        )));
    }

    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let mut dataset = driver.create_with_band_type::<f32, _>(
        output_path.as_ref(),
        width as isize,
        height as isize,
        1,
    )?;

    dataset.set_geo_transform(&georef.geo_transform.to_gdal())?;
    dataset.set_projection(&georef.projection)?;

    let mut rasterband = dataset.rasterband(1)?;
    let flat_data: Vec<f32> = grid.iter().cloned().collect();
    let buffer = gdal::raster::Buffer::new((width, height), flat_data);
    rasterband.write((0, 0), (width, height), &buffer)?;
    rasterband.set_no_data_value(Some(f64::NAN))?;

    log::debug!("GeoTIFF saved ({}x{})", height, width);
    Ok(())
}
