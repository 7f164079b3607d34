//! Progress events emitted while tiling.
//!
//! The tiling core reports what happens to each window through an
//! [`EventSink`]; front ends decide how to present it.

use crate::grid::TileWindow;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq)]
pub enum TileEvent {
    /// Window enumerated, before any pixel read.
    Planned(TileWindow),
    /// Window contained only no-data; nothing was written.
    Skipped(TileWindow),
    Written { window: TileWindow, path: PathBuf },
    Failed { window: TileWindow, error: String },
}

impl TileEvent {
    pub fn window(&self) -> &TileWindow {
        match self {
            TileEvent::Planned(w) | TileEvent::Skipped(w) => w,
            TileEvent::Written { window, .. } | TileEvent::Failed { window, .. } => window,
        }
    }
}

pub trait EventSink: Sync {
    fn on_event(&self, event: &TileEvent);
}

impl<F> EventSink for F
where
    F: Fn(&TileEvent) + Sync,
{
    fn on_event(&self, event: &TileEvent) {
        self(event)
    }
}

/// Forwards events to the `log` facade.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl EventSink for LogSink {
    fn on_event(&self, event: &TileEvent) {
        match event {
            TileEvent::Planned(w) => debug!(
                "Planned tile {}_{}: offset=({},{}), size={}x{}",
                w.col, w.row, w.x_off, w.y_off, w.width, w.height
            ),
            TileEvent::Skipped(w) => {
                info!("Skipping tile {}_{} as it is entirely NoData", w.col, w.row)
            }
            TileEvent::Written { path, .. } => info!("Exported {}", path.display()),
            TileEvent::Failed { window, error } => {
                warn!("Tile {}_{} failed: {}", window.col, window.row, error)
            }
        }
    }
}

/// Collects events in memory, mostly useful in tests.
#[derive(Debug, Default)]
pub struct CollectingSink {
    events: Mutex<Vec<TileEvent>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TileEvent> {
        match self.events.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

impl EventSink for CollectingSink {
    fn on_event(&self, event: &TileEvent) {
        match self.events.lock() {
            Ok(mut guard) => guard.push(event.clone()),
            Err(poisoned) => poisoned.into_inner().push(event.clone()),
        }
    }
}
