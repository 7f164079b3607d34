use clap::Parser;
use env_logger::Env;
use geotiff_grid_tiler::cli::Args;
use geotiff_grid_tiler::error::EXIT_TILE_FAILURES;
use geotiff_grid_tiler::tiler::format_elapsed;
use geotiff_grid_tiler::{LogSink, Result, Tiler, TilingSummary};
use log::{error, info, warn};
use std::process::ExitCode;
use std::time::Instant;

fn run(args: &Args) -> Result<TilingSummary> {
    let tiler = Tiler::open(&args.input_raster, args.tiling_options())?;

    if args.dry_run {
        info!("Dry run: no pixels are read and no tiles are written");
        return Ok(tiler.plan_windows(&LogSink));
    }

    info!("Writing tiles to: {}", args.output_dir.display());
    tiler.run(&args.output_dir, &LogSink)
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Initialize logger
    let log_level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    info!("=== GeoTIFF Grid Tiler ===");
    let start = Instant::now();

    let code = match run(&args) {
        Ok(summary) if args.dry_run => {
            info!("Planned {} tiles", summary.planned);
            ExitCode::SUCCESS
        }
        Ok(summary) => {
            info!(
                "Tiles written: {}, skipped (no-data): {}, failed: {}",
                summary.written, summary.skipped, summary.failed
            );
            if summary.is_complete() {
                info!("Raster splitting completed successfully.");
                ExitCode::SUCCESS
            } else {
                warn!("{} tile(s) could not be written", summary.failed);
                ExitCode::from(EXIT_TILE_FAILURES)
            }
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    };

    info!("Total Time Taken: {}", format_elapsed(start.elapsed()));
    code
}
