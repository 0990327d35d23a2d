//! Before/after size reporting

use serde::{Deserialize, Serialize};

use crate::document::CompressionProfile;

/// Size reduction in percent, rounded to one decimal
///
/// Zero or negative results are valid: a re-save can grow a file. An empty
/// original yields `0.0`.
pub fn compression_ratio(original: u64, compressed: u64) -> f64 {
    if original == 0 {
        return 0.0;
    }
    let ratio = (original as f64 - compressed as f64) / original as f64 * 100.0;
    let rounded = (ratio * 10.0).round() / 10.0;
    // -0.0 prints as "-0.0"
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}

/// `compression_ratio` as a one-decimal string, e.g. `"37.5"`
pub fn format_ratio(original: u64, compressed: u64) -> String {
    format!("{:.1}", compression_ratio(original, compressed))
}

const UNITS: [&str; 4] = ["Bytes", "KB", "MB", "GB"];

/// Human-readable size in base 1024, at most two decimals, trailing zeros dropped
pub fn format_file_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 Bytes".to_string();
    }

    let mut exponent = 0;
    let mut scaled = bytes;
    while scaled >= 1024 && exponent < UNITS.len() - 1 {
        scaled /= 1024;
        exponent += 1;
    }
    let value = bytes as f64 / 1024f64.powi(exponent as i32);

    let mut text = format!("{:.2}", value);
    if text.contains('.') {
        let trimmed = text.trim_end_matches('0').trim_end_matches('.').len();
        text.truncate(trimmed);
    }
    format!("{} {}", text, UNITS[exponent])
}

/// Size figures reported to the client after compression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeStats {
    pub original_size: u64,
    pub compressed_size: u64,
    pub compression_ratio: String,
    pub compression_level: CompressionProfile,
}

impl SizeStats {
    pub fn new(original: u64, compressed: u64, profile: CompressionProfile) -> Self {
        SizeStats {
            original_size: original,
            compressed_size: compressed,
            compression_ratio: format_ratio(original, compressed),
            compression_level: profile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    #[test]
    fn test_identical_sizes_give_zero() {
        assert_eq!(format_ratio(1000, 1000), "0.0");
    }

    #[test]
    fn test_empty_original_never_divides() {
        assert_eq!(compression_ratio(0, 0), 0.0);
        assert_eq!(format_ratio(0, 512), "0.0");
    }

    #[test]
    fn test_ratio_rounds_to_one_decimal() {
        assert_eq!(format_ratio(1000, 625), "37.5");
        assert_eq!(format_ratio(3, 2), "33.3");
        assert_eq!(format_ratio(1000, 1100), "-10.0");
    }

    #[test]
    fn test_tiny_growth_is_not_negative_zero() {
        assert_eq!(format_ratio(1_000_000, 1_000_001), "0.0");
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0 Bytes");
        assert_eq!(format_file_size(512), "512 Bytes");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(2 * 1024 * 1024), "2 MB");
        assert_eq!(format_file_size(1234567), "1.18 MB");
        assert_eq!(format_file_size(5 * 1024 * 1024 * 1024 * 1024), "5120 GB");
    }

    #[test]
    fn test_size_stats_camel_case() {
        let stats = SizeStats::new(2000, 1500, CompressionProfile::Medium);
        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "originalSize": 2000,
                "compressedSize": 1500,
                "compressionRatio": "25.0",
                "compressionLevel": "medium"
            })
        );
    }

    proptest! {
        #[test]
        fn ratio_is_finite_and_bounded(original in 0u64..u32::MAX as u64, compressed in 0u64..u32::MAX as u64) {
            let ratio = compression_ratio(original, compressed);
            prop_assert!(ratio.is_finite());
            prop_assert!(ratio <= 100.0);
        }

        #[test]
        fn shrinking_never_reports_growth(original in 1u64..1_000_000, cut in 0u64..1_000_000) {
            let compressed = original.saturating_sub(cut);
            prop_assert!(compression_ratio(original, compressed) >= 0.0);
        }
    }
}
