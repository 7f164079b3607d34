use crate::compress::{validate_compression, DEFAULT_COMPRESSION};
use crate::error::{Result, TilerError};
use crate::events::{EventSink, TileEvent};
use crate::grid::{GridPlan, TileWindow, TileWindows};
use crate::io::{open_source, read_tile, write_tile, RasterSource, Sample, TileProfile};
use crate::manifest::{ManifestEntry, TileManifest};
use gdal::raster::GdalDataType;
use gdal::Dataset;
use log::{debug, info};
use rayon::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

pub const DEFAULT_GRID_SIZE_KM: f64 = 1000.0;
pub const DEFAULT_OVERLAP_KM: f64 = 25.0;

#[derive(Debug, Clone, PartialEq)]
pub struct TilingOptions {
    pub grid_size_km: f64,
    pub overlap_km: f64,
    pub compression: String,
    /// Worker threads; 1 processes windows sequentially.
    pub threads: usize,
    pub write_manifest: bool,
}

impl Default for TilingOptions {
    fn default() -> Self {
        Self {
            grid_size_km: DEFAULT_GRID_SIZE_KM,
            overlap_km: DEFAULT_OVERLAP_KM,
            compression: DEFAULT_COMPRESSION.to_string(),
            threads: 1,
            write_manifest: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TileOutcome {
    Written { window: TileWindow, path: PathBuf },
    Skipped(TileWindow),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TilingSummary {
    pub planned: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

impl TilingSummary {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

/// Format a duration as `HH:MM:SS`.
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

/// Output path of a tile: `<dir>/<base>_tile_<col>_<row>.tif`.
pub fn tile_path(output_dir: &Path, base_name: &str, window: &TileWindow) -> PathBuf {
    output_dir.join(format!("{}_tile_{}_{}.tif", base_name, window.col, window.row))
}

/// Create the destination directory and check it can take files.
pub fn prepare_destination(dir: &Path) -> Result<()> {
    let unwritable = |reason: String| TilerError::DestinationUnwritable {
        path: dir.to_path_buf(),
        reason,
    };

    fs::create_dir_all(dir).map_err(|e| unwritable(e.to_string()))?;
    let metadata = fs::metadata(dir).map_err(|e| unwritable(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(unwritable("not a directory".to_string()));
    }

    // Mode bits do not reflect ownership, ACLs or read-only mounts.
    let check = dir.join(format!(".grid-tiler-write-check-{}", std::process::id()));
    fs::File::create(&check).map_err(|e| unwritable(e.to_string()))?;
    fs::remove_file(&check).map_err(|e| unwritable(e.to_string()))?;

    info!("Output directory created at: {}", dir.display());
    Ok(())
}

/// An open source raster together with its grid plan.
///
/// The source dataset stays open for the lifetime of the `Tiler` and is
/// closed when it is dropped, including when iteration stops early.
pub struct Tiler {
    dataset: Dataset,
    source: RasterSource,
    plan: GridPlan,
    options: TilingOptions,
}

impl Tiler {
    /// Open `input` and plan its grid. No pixel data is read.
    pub fn open(input: &Path, options: TilingOptions) -> Result<Self> {
        let compression = validate_compression(&options.compression)?;
        let (dataset, source) = open_source(input)?;

        info!("Raster size: {}x{}, {} band(s)", source.width, source.height, source.band_count);
        info!(
            "Pixel size: {:.6} x {:.6}",
            source.transform.resolution_x(),
            source.transform.resolution_y()
        );
        match source.no_data {
            Some(nd) => info!("Using nodata value: {}", nd),
            None => info!("No nodata value set; no tiles will be skipped"),
        }

        let plan = GridPlan::new(
            &source.transform,
            source.width,
            source.height,
            options.grid_size_km,
            options.overlap_km,
        )?;

        info!("Grid size in pixels: {} x {}", plan.tile_width_px, plan.tile_height_px);
        info!("Overlap size in pixels: {} x {}", plan.overlap_x_px, plan.overlap_y_px);
        info!("Splitting raster into {} x {} tiles...", plan.tiles_x, plan.tiles_y);

        Ok(Self {
            dataset,
            source,
            plan,
            options: TilingOptions {
                compression,
                ..options
            },
        })
    }

    pub fn source(&self) -> &RasterSource {
        &self.source
    }

    pub fn plan(&self) -> &GridPlan {
        &self.plan
    }

    pub fn options(&self) -> &TilingOptions {
        &self.options
    }

    pub fn windows(&self) -> TileWindows<'_> {
        self.plan.windows()
    }

    /// Read, test and write a single window.
    ///
    /// Any failure is returned as [`TilerError::TileWrite`] for that window.
    /// The caller must have prepared `output_dir`.
    pub fn materialize(&self, window: &TileWindow, output_dir: &Path) -> Result<TileOutcome> {
        materialize_on(
            &self.dataset,
            &self.source,
            window,
            output_dir,
            &self.options.compression,
        )
        .map_err(|e| wrap_tile_error(window, e))
    }

    /// Emit a `Planned` event per window without touching pixel data.
    pub fn plan_windows(&self, sink: &dyn EventSink) -> TilingSummary {
        let start = Instant::now();
        let planned = self
            .windows()
            .inspect(|w| sink.on_event(&TileEvent::Planned(*w)))
            .count();
        TilingSummary {
            planned,
            elapsed: start.elapsed(),
            ..TilingSummary::default()
        }
    }

    /// Tile the whole raster into `output_dir`.
    pub fn run(&self, output_dir: &Path, sink: &dyn EventSink) -> Result<TilingSummary> {
        let start = Instant::now();
        prepare_destination(output_dir)?;

        let outcomes = if self.options.threads <= 1 {
            self.windows()
                .map(|w| {
                    sink.on_event(&TileEvent::Planned(w));
                    let outcome = self.materialize(&w, output_dir);
                    report(sink, &w, &outcome);
                    (w, outcome)
                })
                .collect::<Vec<_>>()
        } else {
            self.run_parallel(output_dir, sink)?
        };

        let mut summary = TilingSummary {
            planned: outcomes.len(),
            ..TilingSummary::default()
        };
        let mut manifest = self.empty_manifest();
        for (window, outcome) in outcomes {
            match outcome {
                Ok(TileOutcome::Written { path, .. }) => {
                    summary.written += 1;
                    manifest.tiles.push(ManifestEntry {
                        window,
                        file: path
                            .file_name()
                            .map(|n| n.to_string_lossy().into_owned())
                            .unwrap_or_default(),
                        transform: self.source.transform.window_transform(window.x_off, window.y_off),
                    });
                }
                Ok(TileOutcome::Skipped(_)) => {
                    summary.skipped += 1;
                    manifest.skipped.push(window);
                }
                Err(_) => summary.failed += 1,
            }
        }

        if self.options.write_manifest {
            manifest.sort();
            let path = output_dir.join(TileManifest::file_name(&self.source.base_name()));
            manifest.save(&path)?;
        }

        summary.elapsed = start.elapsed();
        info!(
            "Tiling finished: {} written, {} skipped (no-data), {} failed of {} tiles",
            summary.written, summary.skipped, summary.failed, summary.planned
        );
        Ok(summary)
    }

    fn run_parallel(
        &self,
        output_dir: &Path,
        sink: &dyn EventSink,
    ) -> Result<Vec<(TileWindow, Result<TileOutcome>)>> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.threads)
            .build()?;
        info!("Using {} threads", self.options.threads);

        let windows: Vec<TileWindow> = self.windows().collect();
        let source = &self.source;
        let compression = self.options.compression.as_str();

        // GDAL handles are not shareable across threads, so each worker opens its own.
        let outcomes = pool.install(|| {
            windows
                .par_iter()
                .map_init(
                    || Dataset::open(&source.path).map_err(|e| e.to_string()),
                    |dataset, w| {
                        sink.on_event(&TileEvent::Planned(*w));
                        let outcome = match dataset {
                            Ok(dataset) => {
                                materialize_on(dataset, source, w, output_dir, compression)
                            }
                            Err(reason) => Err(TilerError::InvalidRaster {
                                path: source.path.clone(),
                                reason: format!("cannot reopen source: {reason}"),
                            }),
                        }
                        .map_err(|e| wrap_tile_error(w, e));
                        report(sink, w, &outcome);
                        (*w, outcome)
                    },
                )
                .collect::<Vec<_>>()
        });
        Ok(outcomes)
    }

    fn empty_manifest(&self) -> TileManifest {
        TileManifest {
            source: self.source.path.clone(),
            grid_size_km: self.options.grid_size_km,
            overlap_km: self.options.overlap_km,
            plan: self.plan,
            no_data: self.source.no_data,
            compression: self.options.compression.clone(),
            tiles: Vec::new(),
            skipped: Vec::new(),
        }
    }
}

/// Open `input`, plan the grid and tile it into `output_dir`.
pub fn split_raster(
    input: &Path,
    output_dir: &Path,
    options: TilingOptions,
    sink: &dyn EventSink,
) -> Result<TilingSummary> {
    let tiler = Tiler::open(input, options)?;
    tiler.run(output_dir, sink)
}

fn wrap_tile_error(window: &TileWindow, error: TilerError) -> TilerError {
    TilerError::TileWrite {
        col: window.col,
        row: window.row,
        source: Box::new(error),
    }
}

fn report(sink: &dyn EventSink, window: &TileWindow, outcome: &Result<TileOutcome>) {
    let event = match outcome {
        Ok(TileOutcome::Written { path, .. }) => TileEvent::Written {
            window: *window,
            path: path.clone(),
        },
        Ok(TileOutcome::Skipped(_)) => TileEvent::Skipped(*window),
        Err(e) => TileEvent::Failed {
            window: *window,
            error: e.to_string(),
        },
    };
    sink.on_event(&event);
}

fn materialize_on(
    dataset: &Dataset,
    source: &RasterSource,
    window: &TileWindow,
    output_dir: &Path,
    compression: &str,
) -> Result<TileOutcome> {
    match source.data_type {
        GdalDataType::UInt8 => copy_window::<u8>(dataset, source, window, output_dir, compression),
        GdalDataType::UInt16 => copy_window::<u16>(dataset, source, window, output_dir, compression),
        GdalDataType::Int16 => copy_window::<i16>(dataset, source, window, output_dir, compression),
        GdalDataType::UInt32 => copy_window::<u32>(dataset, source, window, output_dir, compression),
        GdalDataType::Int32 => copy_window::<i32>(dataset, source, window, output_dir, compression),
        GdalDataType::Float32 => copy_window::<f32>(dataset, source, window, output_dir, compression),
        GdalDataType::Float64 => copy_window::<f64>(dataset, source, window, output_dir, compression),
        other => Err(TilerError::InvalidRaster {
            path: source.path.clone(),
            reason: format!("unsupported pixel type {other:?}"),
        }),
    }
}

fn copy_window<T: Sample>(
    dataset: &Dataset,
    source: &RasterSource,
    window: &TileWindow,
    output_dir: &Path,
    compression: &str,
) -> Result<TileOutcome> {
    let tile = read_tile::<T>(dataset, window, source.band_count)?;

    if let Some(nd) = source.no_data {
        if tile.is_all_no_data(nd) {
            return Ok(TileOutcome::Skipped(*window));
        }
    }

    let path = tile_path(output_dir, &source.base_name(), window);
    let profile = TileProfile {
        transform: source.transform.window_transform(window.x_off, window.y_off),
        projection: &source.projection,
        no_data: source.no_data,
        compression,
    };
    write_tile(&path, &tile, &profile)?;
    debug!("Wrote tile {}_{} to {}", window.col, window.row, path.display());

    Ok(TileOutcome::Written {
        window: *window,
        path,
    })
}
