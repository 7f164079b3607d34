use std::path::PathBuf;
use thiserror::Error;

/// Exit code of a run that finished with at least one failed tile.
pub const EXIT_TILE_FAILURES: u8 = 6;

#[derive(Error, Debug)]
pub enum TilerError {
    #[error("Input raster not found or unreadable: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Invalid raster {}: {reason}", .path.display())]
    InvalidRaster { path: PathBuf, reason: String },

    #[error(
        "Invalid grid configuration: tile {tile_x}x{tile_y} px, overlap {overlap_x}x{overlap_y} px \
         (grid {grid_size_km} km, overlap {overlap_km} km); grid size must be larger than overlap"
    )]
    InvalidGridConfig {
        grid_size_km: f64,
        overlap_km: f64,
        tile_x: i64,
        tile_y: i64,
        overlap_x: i64,
        overlap_y: i64,
    },

    #[error("Invalid grid parameter: {0}")]
    InvalidGridParameter(String),

    #[error("Output directory {} is not writable: {reason}", .path.display())]
    DestinationUnwritable { path: PathBuf, reason: String },

    #[error("Failed to write tile {col}_{row}: {source}")]
    TileWrite {
        col: usize,
        row: usize,
        #[source]
        source: Box<TilerError>,
    },

    #[error("Invalid compression type: {0} (expected one of LZW, DEFLATE, ZSTD, PACKBITS)")]
    InvalidCompression(String),

    #[error("GDAL error: {0}")]
    Gdal(#[from] gdal::errors::GdalError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("Manifest error: {0}")]
    Manifest(#[from] serde_json::Error),

    #[error("Thread pool error: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl TilerError {
    /// Process exit code for this failure class.
    pub fn exit_code(&self) -> u8 {
        match self {
            TilerError::SourceNotFound(_) => 2,
            TilerError::InvalidRaster { .. } => 3,
            TilerError::InvalidGridConfig { .. }
            | TilerError::InvalidGridParameter(_)
            | TilerError::InvalidCompression(_) => 4,
            TilerError::DestinationUnwritable { .. } => 5,
            TilerError::TileWrite { .. } => EXIT_TILE_FAILURES,
            _ => 1,
        }
    }

    /// Fatal errors abort a run; per-tile failures do not.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, TilerError::TileWrite { .. })
    }
}

pub type Result<T> = std::result::Result<T, TilerError>;
