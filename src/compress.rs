use crate::error::{Result, TilerError};
use gdal::cpl::CslStringList;

/// Lossless GTiff codecs accepted for tile output.
pub const LOSSLESS_CODECS: [&str; 4] = ["LZW", "DEFLATE", "ZSTD", "PACKBITS"];

pub const DEFAULT_COMPRESSION: &str = "LZW";

/// Validate compression type, returning its canonical upper-case name
pub fn validate_compression(compression: &str) -> Result<String> {
    let normalized = compression.trim().to_ascii_uppercase();
    if !LOSSLESS_CODECS.contains(&normalized.as_str()) {
        return Err(TilerError::InvalidCompression(compression.to_string()));
    }
    Ok(normalized)
}

/// GTiff creation options for a tile
pub fn tile_creation_options(compression: &str) -> Vec<String> {
    vec![
        format!("COMPRESS={}", compression),
        "BIGTIFF=IF_SAFER".to_string(),
    ]
}

pub fn to_csl(options: &[String]) -> Result<CslStringList> {
    let mut list = CslStringList::new();
    for opt in options {
        list.add_string(opt)?;
    }
    Ok(list)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_compression_valid() {
        assert_eq!(validate_compression("LZW").unwrap(), "LZW");
        assert_eq!(validate_compression("deflate").unwrap(), "DEFLATE");
        assert_eq!(validate_compression(" zstd ").unwrap(), "ZSTD");
        assert!(validate_compression("PACKBITS").is_ok());
    }

    #[test]
    fn test_validate_compression_rejects_lossy_and_none() {
        assert!(validate_compression("JPEG").is_err());
        assert!(validate_compression("NONE").is_err());
        assert!(validate_compression("").is_err());
    }

    #[test]
    fn test_tile_creation_options() {
        let opts = tile_creation_options("LZW");
        assert!(opts.contains(&"COMPRESS=LZW".to_string()));
        assert!(opts.contains(&"BIGTIFF=IF_SAFER".to_string()));
    }
}
