use crate::compress::DEFAULT_COMPRESSION;
use crate::tiler::{TilingOptions, DEFAULT_GRID_SIZE_KM, DEFAULT_OVERLAP_KM};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "grid-tiler")]
#[command(about = "Split a large GeoTIFF raster into smaller, overlapping tiles")]
#[command(version)]
pub struct Args {
    /// Path to the input GeoTIFF raster file
    #[arg(short, long = "input_raster", visible_alias = "input-raster", value_name = "FILE")]
    pub input_raster: PathBuf,

    /// Directory to save the output tiles
    #[arg(short, long = "output_dir", visible_alias = "output-dir", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Side length of each square tile in kilometers
    #[arg(long = "grid_size_km", visible_alias = "grid-size-km", value_name = "KM", default_value_t = DEFAULT_GRID_SIZE_KM)]
    pub grid_size_km: f64,

    /// Overlap between adjacent tiles in kilometers
    #[arg(long = "overlap_km", visible_alias = "overlap-km", value_name = "KM", default_value_t = DEFAULT_OVERLAP_KM)]
    pub overlap_km: f64,

    /// Lossless compression for tiles (LZW, DEFLATE, ZSTD, PACKBITS)
    #[arg(short, long, value_name = "CODEC", default_value = DEFAULT_COMPRESSION)]
    pub compression: String,

    /// Number of threads (default: 1, sequential)
    #[arg(short, long, value_name = "N", default_value_t = 1)]
    pub threads: usize,

    /// Do not write the <name>_tiles.json manifest
    #[arg(long)]
    pub no_manifest: bool,

    /// Plan the grid and list windows without reading pixels or writing tiles
    #[arg(long)]
    pub dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    pub fn tiling_options(&self) -> TilingOptions {
        TilingOptions {
            grid_size_km: self.grid_size_km,
            overlap_km: self.overlap_km,
            compression: self.compression.clone(),
            threads: self.threads.max(1),
            write_manifest: !self.no_manifest,
        }
    }
}
