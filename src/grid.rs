use crate::error::{Result, TilerError};
use crate::transform::AffineTransform;
use log::debug;
use serde::{Deserialize, Serialize};

/// Pixel rectangle of one tile, clipped to the raster extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileWindow {
    pub col: usize,
    pub row: usize,
    pub x_off: usize,
    pub y_off: usize,
    pub width: usize,
    pub height: usize,
}

impl TileWindow {
    pub fn x_max(&self) -> usize {
        self.x_off + self.width
    }

    pub fn y_max(&self) -> usize {
        self.y_off + self.height
    }
}

/// Tiling grid derived from a tile size and overlap in kilometres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPlan {
    pub raster_width: usize,
    pub raster_height: usize,
    pub tile_width_px: usize,
    pub tile_height_px: usize,
    pub overlap_x_px: usize,
    pub overlap_y_px: usize,
    pub step_x: usize,
    pub step_y: usize,
    pub tiles_x: usize,
    pub tiles_y: usize,
}

fn km_to_pixels(km: f64, resolution: f64) -> i64 {
    (km * 1000.0 / resolution).floor() as i64
}

impl GridPlan {
    pub fn new(
        transform: &AffineTransform,
        raster_width: usize,
        raster_height: usize,
        grid_size_km: f64,
        overlap_km: f64,
    ) -> Result<Self> {
        if !grid_size_km.is_finite() || grid_size_km <= 0.0 {
            return Err(TilerError::InvalidGridParameter(format!(
                "grid size must be a positive number of kilometres, got {grid_size_km}"
            )));
        }
        if !overlap_km.is_finite() || overlap_km < 0.0 {
            return Err(TilerError::InvalidGridParameter(format!(
                "overlap must be zero or a positive number of kilometres, got {overlap_km}"
            )));
        }

        let (res_x, res_y) = (transform.resolution_x(), transform.resolution_y());
        let tile_x = km_to_pixels(grid_size_km, res_x);
        let tile_y = km_to_pixels(grid_size_km, res_y);
        let overlap_x = km_to_pixels(overlap_km, res_x);
        let overlap_y = km_to_pixels(overlap_km, res_y);

        let step_x = tile_x - overlap_x;
        let step_y = tile_y - overlap_y;
        if tile_x <= 0 || tile_y <= 0 || overlap_x < 0 || overlap_y < 0 || step_x <= 0 || step_y <= 0
        {
            return Err(TilerError::InvalidGridConfig {
                grid_size_km,
                overlap_km,
                tile_x,
                tile_y,
                overlap_x,
                overlap_y,
            });
        }

        let (step_x, step_y) = (step_x as usize, step_y as usize);
        let tiles_x = tile_count(raster_width, step_x);
        let tiles_y = tile_count(raster_height, step_y);

        debug!(
            "GridPlan: {}x{} raster, tile {}x{} px, overlap {}x{} px, step {}x{} → {}x{} tiles",
            raster_width, raster_height, tile_x, tile_y, overlap_x, overlap_y, step_x, step_y,
            tiles_x, tiles_y
        );

        Ok(Self {
            raster_width,
            raster_height,
            tile_width_px: tile_x as usize,
            tile_height_px: tile_y as usize,
            overlap_x_px: overlap_x as usize,
            overlap_y_px: overlap_y as usize,
            step_x,
            step_y,
            tiles_x,
            tiles_y,
        })
    }

    pub fn total_tiles(&self) -> usize {
        self.tiles_x * self.tiles_y
    }

    /// Window at grid position `(col, row)`, or `None` outside the grid.
    pub fn window(&self, col: usize, row: usize) -> Option<TileWindow> {
        if col >= self.tiles_x || row >= self.tiles_y {
            return None;
        }
        let x_off = col * self.step_x;
        let y_off = row * self.step_y;
        Some(TileWindow {
            col,
            row,
            x_off,
            y_off,
            width: self.tile_width_px.min(self.raster_width - x_off),
            height: self.tile_height_px.min(self.raster_height - y_off),
        })
    }

    /// Row-major iterator over all windows, `(0, 0)` first.
    pub fn windows(&self) -> TileWindows<'_> {
        TileWindows {
            plan: self,
            current_idx: 0,
        }
    }
}

/// `floor((extent - 1) / step) + 1`, zero for an empty extent.
fn tile_count(extent: usize, step: usize) -> usize {
    if extent == 0 {
        0
    } else {
        (extent - 1) / step + 1
    }
}

#[derive(Debug, Clone)]
pub struct TileWindows<'a> {
    plan: &'a GridPlan,
    current_idx: usize,
}

impl Iterator for TileWindows<'_> {
    type Item = TileWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_idx >= self.plan.total_tiles() {
            return None;
        }
        let col = self.current_idx % self.plan.tiles_x;
        let row = self.current_idx / self.plan.tiles_x;
        self.current_idx += 1;
        self.plan.window(col, row)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.plan.total_tiles().saturating_sub(self.current_idx);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileWindows<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn transform(res: f64) -> AffineTransform {
        AffineTransform::new([0.0, res, 0.0, 0.0, 0.0, -res])
    }

    #[test]
    fn test_plan_no_overlap() {
        // 500 km at 500 m per pixel is a 1000 px tile
        let plan = GridPlan::new(&transform(500.0), 2000, 2000, 500.0, 0.0).unwrap();
        assert_eq!(plan.tile_width_px, 1000);
        assert_eq!(plan.step_x, 1000);
        assert_eq!((plan.tiles_x, plan.tiles_y), (2, 2));

        let windows: Vec<_> = plan.windows().collect();
        let indices: Vec<_> = windows.iter().map(|w| (w.col, w.row)).collect();
        assert_eq!(indices, vec![(0, 0), (1, 0), (0, 1), (1, 1)]);
        assert!(windows.iter().all(|w| w.width == 1000 && w.height == 1000));
    }

    #[test]
    fn test_plan_with_overlap_clips_last_windows() {
        let plan = GridPlan::new(&transform(500.0), 2000, 2000, 500.0, 250.0).unwrap();
        assert_eq!(plan.overlap_x_px, 500);
        assert_eq!(plan.step_x, 500);
        assert_eq!((plan.tiles_x, plan.tiles_y), (4, 4));

        let last = plan.window(3, 3).unwrap();
        assert_eq!((last.x_off, last.y_off), (1500, 1500));
        assert_eq!((last.width, last.height), (500, 500));

        let second = plan.window(1, 0).unwrap();
        assert_eq!((second.x_off, second.width), (500, 1000));
    }

    #[test]
    fn test_overlap_not_smaller_than_grid_fails() {
        for overlap in [1.0, 1.5] {
            match GridPlan::new(&transform(100.0), 500, 500, 1.0, overlap) {
                Err(TilerError::InvalidGridConfig { tile_x, overlap_x, .. }) => {
                    assert_eq!(tile_x, 10);
                    assert!(overlap_x >= tile_x);
                }
                other => panic!("expected InvalidGridConfig, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_tile_smaller_than_pixel_fails() {
        // 0.01 km at 30 m resolution floors to zero pixels
        let err = GridPlan::new(&transform(30.0), 100, 100, 0.01, 0.0).unwrap_err();
        assert!(matches!(err, TilerError::InvalidGridConfig { tile_x: 0, .. }));
    }

    #[test]
    fn test_negative_pixel_width_fails() {
        let gt = AffineTransform::new([0.0, -30.0, 0.0, 0.0, 0.0, -30.0]);
        let err = GridPlan::new(&gt, 100, 100, 1.0, 0.0).unwrap_err();
        assert!(matches!(err, TilerError::InvalidGridConfig { .. }));
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(matches!(
            GridPlan::new(&transform(30.0), 10, 10, 0.0, 0.0),
            Err(TilerError::InvalidGridParameter(_))
        ));
        assert!(matches!(
            GridPlan::new(&transform(30.0), 10, 10, 1.0, -1.0),
            Err(TilerError::InvalidGridParameter(_))
        ));
        assert!(matches!(
            GridPlan::new(&transform(30.0), 10, 10, f64::NAN, 0.0),
            Err(TilerError::InvalidGridParameter(_))
        ));
    }

    #[test]
    fn test_plan_is_deterministic() {
        let a = GridPlan::new(&transform(27.5), 1234, 987, 3.3, 0.4).unwrap();
        let b = GridPlan::new(&transform(27.5), 1234, 987, 3.3, 0.4).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.windows().collect::<Vec<_>>(), b.windows().collect::<Vec<_>>());
    }

    #[test]
    fn test_single_pixel_raster_has_one_tile() {
        let plan = GridPlan::new(&transform(30.0), 1, 1, 1.0, 0.0).unwrap();
        let windows: Vec<_> = plan.windows().collect();
        assert_eq!(windows.len(), 1);
        assert_eq!((windows[0].width, windows[0].height), (1, 1));
    }

    #[test]
    fn test_windows_cover_raster_within_bounds() {
        // Resolution 1 km per pixel makes grid/overlap km equal to pixels
        let gt = transform(1000.0);
        for width in [1usize, 7, 10, 23] {
            for height in [1usize, 5, 16] {
                for (tile, overlap) in [(1.0, 0.0), (3.0, 1.0), (4.0, 0.0), (5.0, 4.0), (30.0, 2.0)] {
                    let plan = GridPlan::new(&gt, width, height, tile, overlap).unwrap();
                    let windows: Vec<_> = plan.windows().collect();
                    assert_eq!(windows.len(), plan.tiles_x * plan.tiles_y);
                    assert_eq!(plan.windows().len(), windows.len());

                    let mut covered = vec![false; width * height];
                    for w in &windows {
                        assert!(w.width > 0 && w.height > 0);
                        assert!(w.x_max() <= width, "{w:?} exceeds width {width}");
                        assert!(w.y_max() <= height, "{w:?} exceeds height {height}");
                        for y in w.y_off..w.y_max() {
                            for x in w.x_off..w.x_max() {
                                covered[y * width + x] = true;
                            }
                        }
                    }
                    assert!(
                        covered.iter().all(|&c| c),
                        "gap in coverage for {width}x{height} tile={tile} overlap={overlap}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_windows_are_restartable() {
        let plan = GridPlan::new(&transform(1000.0), 10, 10, 4.0, 1.0).unwrap();
        let mut iter = plan.windows();
        let first = iter.next().unwrap();
        let rest = iter.clone().count();
        assert_eq!(rest + 1, plan.total_tiles());
        assert_eq!(plan.windows().next(), Some(first));
        assert!(plan.window(plan.tiles_x, 0).is_none());
    }
}
