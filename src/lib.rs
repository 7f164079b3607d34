// Library exports for testing and reuse

pub mod cli;
pub mod compress;
pub mod error;
pub mod events;
pub mod grid;
pub mod io;
pub mod manifest;
pub mod tiler;
pub mod transform;

// Re-export commonly used types
pub use error::{Result, TilerError};
pub use events::{CollectingSink, EventSink, LogSink, TileEvent};
pub use grid::{GridPlan, TileWindow, TileWindows};
pub use io::RasterSource;
pub use manifest::{ManifestEntry, TileManifest};
pub use tiler::{split_raster, TileOutcome, Tiler, TilingOptions, TilingSummary};
pub use transform::AffineTransform;
