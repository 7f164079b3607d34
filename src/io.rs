use crate::compress::{tile_creation_options, to_csl};
use crate::error::{Result, TilerError};
use crate::grid::TileWindow;
use crate::transform::AffineTransform;
use gdal::raster::{Buffer, GdalDataType, GdalType};
use gdal::{Dataset, DriverManager};
use log::{debug, info};
use ndarray::Array2;
use std::fs;
use std::path::{Path, PathBuf};

/// Metadata of the opened source raster.
#[derive(Debug, Clone)]
pub struct RasterSource {
    pub path: PathBuf,
    pub width: usize,
    pub height: usize,
    pub transform: AffineTransform,
    pub projection: String,
    pub no_data: Option<f64>,
    pub band_count: usize,
    pub data_type: GdalDataType,
}

impl RasterSource {
    /// File stem used to name tiles, e.g. `lulc_2000` for `lulc_2000.tif`.
    pub fn base_name(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "raster".to_string())
    }
}

/// Pixel types that can be copied from source to tile unchanged.
pub trait Sample: GdalType + Copy + Send + Sync + 'static {
    fn to_f64(self) -> f64;

    /// NaN no-data matches NaN samples.
    fn is_no_data(self, no_data: f64) -> bool {
        let value = self.to_f64();
        if no_data.is_nan() {
            value.is_nan()
        } else {
            value == no_data
        }
    }
}

macro_rules! impl_sample {
    ($($t:ty),*) => {
        $(impl Sample for $t {
            fn to_f64(self) -> f64 {
                self as f64
            }
        })*
    };
}

impl_sample!(u8, u16, i16, u32, i32, f32, f64);

pub fn is_supported_type(data_type: GdalDataType) -> bool {
    matches!(
        data_type,
        GdalDataType::UInt8
            | GdalDataType::UInt16
            | GdalDataType::Int16
            | GdalDataType::UInt32
            | GdalDataType::Int32
            | GdalDataType::Float32
            | GdalDataType::Float64
    )
}

/// The single supported pixel type shared by all bands.
///
/// Tiles keep the source type, so bands of differing types are rejected
/// rather than converted to band 1's type.
pub fn common_band_type(path: &Path, band_types: &[GdalDataType]) -> Result<GdalDataType> {
    let Some(&first) = band_types.first() else {
        return Err(invalid(path, "raster has no bands"));
    };
    if let Some((i, other)) = band_types
        .iter()
        .enumerate()
        .find(|(_, t)| **t != first)
    {
        return Err(invalid(
            path,
            format!(
                "bands have mixed pixel types (band 1 is {first:?}, band {} is {other:?})",
                i + 1
            ),
        ));
    }
    if !is_supported_type(first) {
        return Err(invalid(path, format!("unsupported pixel type {first:?}")));
    }
    Ok(first)
}

fn invalid(path: &Path, reason: impl Into<String>) -> TilerError {
    TilerError::InvalidRaster {
        path: path.to_path_buf(),
        reason: reason.into(),
    }
}

/// Open the source raster and extract its metadata.
pub fn open_source(path: &Path) -> Result<(Dataset, RasterSource)> {
    info!("Opening input raster: {}", path.display());
    if !path.is_file() {
        return Err(TilerError::SourceNotFound(path.to_path_buf()));
    }

    let dataset = Dataset::open(path).map_err(|e| {
        debug!("GDAL could not open {}: {}", path.display(), e);
        TilerError::SourceNotFound(path.to_path_buf())
    })?;

    let source = extract_source(&dataset, path)?;
    Ok((dataset, source))
}

/// Extract metadata from a dataset without reading pixel data
pub fn extract_source(dataset: &Dataset, path: &Path) -> Result<RasterSource> {
    let (width, height) = dataset.raster_size();
    if width == 0 || height == 0 {
        return Err(invalid(path, format!("invalid dimensions {width}x{height}")));
    }

    let band_count = dataset.raster_count();
    if band_count == 0 {
        return Err(invalid(path, "raster has no bands"));
    }

    let transform = dataset
        .geo_transform()
        .map(AffineTransform::from)
        .map_err(|e| invalid(path, format!("missing geotransform: {e}")))?;
    if !transform.is_valid() {
        return Err(invalid(
            path,
            format!(
                "raster resolution cannot be zero (x={}, y={})",
                transform.resolution_x(),
                transform.resolution_y()
            ),
        ));
    }

    let band_types = (1..=band_count)
        .map(|i| dataset.rasterband(i).map(|b| b.band_type()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let data_type = common_band_type(path, &band_types)?;
    let band = dataset.rasterband(1)?;

    debug!("Raster dimensions: {}x{}, {} band(s) of {:?}", width, height, band_count, data_type);
    debug!(
        "Pixel size: {:.6} x {:.6}",
        transform.resolution_x(),
        transform.resolution_y()
    );

    Ok(RasterSource {
        path: path.to_path_buf(),
        width,
        height,
        transform,
        projection: dataset.projection(),
        no_data: band.no_data_value(),
        band_count,
        data_type,
    })
}

/// Pixel data of one window, one array per band in (row, col) order.
#[derive(Debug, Clone)]
pub struct TileData<T> {
    pub width: usize,
    pub height: usize,
    pub bands: Vec<Array2<T>>,
}

impl<T: Sample> TileData<T> {
    /// True when every sample of every band equals `no_data`.
    pub fn is_all_no_data(&self, no_data: f64) -> bool {
        self.bands
            .iter()
            .all(|band| band.iter().all(|v| v.is_no_data(no_data)))
    }
}

/// Read all bands of a window
pub fn read_tile<T: Sample>(
    dataset: &Dataset,
    window: &TileWindow,
    band_count: usize,
) -> Result<TileData<T>> {
    debug!(
        "Reading tile {}_{}: offset=({},{}), size=({},{})",
        window.col, window.row, window.x_off, window.y_off, window.width, window.height
    );

    let size = (window.width, window.height);
    let mut bands = Vec::with_capacity(band_count);
    for band_index in 1..=band_count {
        let rasterband = dataset.rasterband(band_index)?;
        let buffer = rasterband.read_as::<T>(
            (window.x_off as isize, window.y_off as isize),
            size,
            size,
            None,
        )?;
        let data_vec: Vec<T> = buffer.into_iter().collect();
        bands.push(Array2::from_shape_vec((window.height, window.width), data_vec)?);
    }

    Ok(TileData {
        width: window.width,
        height: window.height,
        bands,
    })
}

/// Georeferencing carried onto a written tile.
#[derive(Debug, Clone)]
pub struct TileProfile<'a> {
    pub transform: AffineTransform,
    pub projection: &'a str,
    pub no_data: Option<f64>,
    pub compression: &'a str,
}

fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Write a tile as a standalone GeoTIFF.
///
/// Data goes to `<path>.part` first and is renamed once the dataset is closed,
/// so a failed write never leaves a file under the final name.
pub fn write_tile<T: Sample>(path: &Path, tile: &TileData<T>, profile: &TileProfile) -> Result<()> {
    let staging = partial_path(path);
    let written = write_dataset(&staging, tile, profile)
        .and_then(|()| fs::rename(&staging, path).map_err(TilerError::from));
    match written {
        Ok(()) => Ok(()),
        Err(e) => {
            if staging.exists() {
                if let Err(cleanup) = fs::remove_file(&staging) {
                    debug!("Could not remove {}: {}", staging.display(), cleanup);
                }
            }
            Err(e)
        }
    }
}

fn write_dataset<T: Sample>(path: &Path, tile: &TileData<T>, profile: &TileProfile) -> Result<()> {
    let driver = DriverManager::get_driver_by_name("GTiff")?;
    let options = to_csl(&tile_creation_options(profile.compression))?;

    let mut dataset = driver.create_with_band_type_with_options::<T, _>(
        path,
        tile.width,
        tile.height,
        tile.bands.len(),
        &options,
    )?;

    dataset.set_geo_transform(&profile.transform.coefficients())?;
    if !profile.projection.is_empty() {
        dataset.set_projection(profile.projection)?;
    }

    for (i, band_data) in tile.bands.iter().enumerate() {
        let mut raster_band = dataset.rasterband(i + 1)?;
        let mut buffer = Buffer::new((tile.width, tile.height), band_data.iter().copied().collect());
        raster_band.write((0, 0), (tile.width, tile.height), &mut buffer)?;
        if let Some(nd) = profile.no_data {
            raster_band.set_no_data_value(Some(nd))?;
        }
    }

    dataset.flush_cache()?;
    Ok(())
}
