//! JSON index of a tiling run.
//!
//! Consumers look tiles up by grid position instead of parsing file names.

use crate::error::Result;
use crate::grid::{GridPlan, TileWindow};
use crate::transform::AffineTransform;
use log::info;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub window: TileWindow,
    /// File name relative to the manifest's directory.
    pub file: String,
    pub transform: AffineTransform,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TileManifest {
    pub source: PathBuf,
    pub grid_size_km: f64,
    pub overlap_km: f64,
    pub plan: GridPlan,
    /// `null` when the source has no no-data value, `"NaN"` for a NaN one.
    #[serde(with = "no_data_format")]
    pub no_data: Option<f64>,
    pub compression: String,
    pub tiles: Vec<ManifestEntry>,
    pub skipped: Vec<TileWindow>,
}

/// JSON has no NaN, so a NaN no-data value is stored as the string `"NaN"`.
mod no_data_format {
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn serialize<S: Serializer>(value: &Option<f64>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            None => serializer.serialize_none(),
            Some(v) if v.is_nan() => serializer.serialize_some("NaN"),
            Some(v) => serializer.serialize_some(v),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
        match Option::<Repr>::deserialize(deserializer)? {
            None => Ok(None),
            Some(Repr::Number(v)) => Ok(Some(v)),
            Some(Repr::Text(s)) if s.eq_ignore_ascii_case("nan") => Ok(Some(f64::NAN)),
            Some(Repr::Text(s)) => Err(de::Error::custom(format!("invalid no-data value {s:?}"))),
        }
    }
}

impl TileManifest {
    /// Manifest file name for a source stem, e.g. `lulc_2000_tiles.json`.
    pub fn file_name(base_name: &str) -> String {
        format!("{base_name}_tiles.json")
    }

    pub fn entry(&self, col: usize, row: usize) -> Option<&ManifestEntry> {
        self.tiles
            .iter()
            .find(|e| e.window.col == col && e.window.row == row)
    }

    /// Absolute paths of every written tile, given the manifest's directory.
    pub fn tile_paths(&self, dir: &Path) -> Vec<PathBuf> {
        self.tiles.iter().map(|e| dir.join(&e.file)).collect()
    }

    /// Sort entries in row-major grid order.
    pub fn sort(&mut self) {
        self.tiles.sort_by_key(|e| (e.window.row, e.window.col));
        self.skipped.sort_by_key(|w| (w.row, w.col));
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        info!("Wrote tile manifest: {}", path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn manifest() -> TileManifest {
        let gt = AffineTransform::new([0.0, 1000.0, 0.0, 0.0, 0.0, -1000.0]);
        let plan = GridPlan::new(&gt, 4, 4, 2.0, 0.0).unwrap();
        let tiles = plan
            .windows()
            .filter(|w| (w.col, w.row) != (0, 0))
            .map(|w| ManifestEntry {
                window: w,
                file: format!("dem_tile_{}_{}.tif", w.col, w.row),
                transform: gt.window_transform(w.x_off, w.y_off),
            })
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();
        TileManifest {
            source: PathBuf::from("dem.tif"),
            grid_size_km: 2.0,
            overlap_km: 0.0,
            plan,
            no_data: Some(-9999.0),
            compression: "LZW".to_string(),
            tiles,
            skipped: plan.window(0, 0).into_iter().collect(),
        }
    }

    #[test]
    fn test_entry_lookup_by_grid_position() {
        let m = manifest();
        assert!(m.entry(0, 0).is_none());
        let e = m.entry(1, 1).unwrap();
        assert_eq!(e.file, "dem_tile_1_1.tif");
        assert_eq!(e.transform.origin(), (2000.0, -2000.0));
    }

    #[test]
    fn test_sort_is_row_major() {
        let mut m = manifest();
        m.sort();
        let order: Vec<_> = m.tiles.iter().map(|e| (e.window.col, e.window.row)).collect();
        assert_eq!(order, vec![(1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn test_nan_no_data_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TileManifest::file_name("ndvi"));
        let mut m = manifest();
        m.no_data = Some(f64::NAN);
        m.save(&path).unwrap();

        assert!(fs::read_to_string(&path).unwrap().contains("\"no_data\": \"NaN\""));
        let loaded = TileManifest::load(&path).unwrap();
        assert!(loaded.no_data.is_some_and(f64::is_nan));
    }

    #[test]
    fn test_missing_no_data_stays_none() {
        let mut m = manifest();
        m.no_data = None;
        let json = serde_json::to_string(&m).unwrap();
        assert!(json.contains("\"no_data\":null"));
        let loaded: TileManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(loaded.no_data, None);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(TileManifest::file_name("dem"));
        let m = manifest();
        m.save(&path).unwrap();
        let loaded = TileManifest::load(&path).unwrap();
        assert_eq!(loaded, m);
        assert_eq!(loaded.tile_paths(dir.path())[0], dir.path().join("dem_tile_1_1.tif"));
    }
}
