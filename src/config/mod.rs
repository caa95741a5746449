//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Capture settings
    pub capture: CaptureSettings,
    /// Preprocessing settings
    pub preprocess: PreprocessSettings,
    /// OCR engine settings
    pub ocr: OcrSettings,
    /// Morphological analyzer settings
    pub segmenter: SegmenterSettings,
}

/// Capture-related settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Camera device index
    pub device_index: u32,
    /// Resolution hint: ask the device for the highest mode up to this width
    pub ideal_width: u32,
    /// Resolution hint: ask the device for the highest mode up to this height
    pub ideal_height: u32,
    /// Delay before the post-start layout pass; dimension queries right after
    /// stream-bind are unreliable
    pub settle_delay_ms: u64,
    /// Delay between freezing the feed and sampling, so a caller can show
    /// feedback before the capture blocks
    pub freeze_delay_ms: u64,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device_index: 0,
            ideal_width: 4096,
            ideal_height: 4096,
            settle_delay_ms: 100,
            freeze_delay_ms: 20,
        }
    }
}

/// Binarization strategy applied before recognition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum BinarizeStrategy {
    /// Smoothing plus adaptive local thresholding; handles the uneven
    /// lighting typical of handheld shots of print pages
    #[default]
    Standard,
    /// Global Otsu thresholding; cheaper and stable for evenly lit material
    Otsu,
}

/// Preprocessing settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreprocessSettings {
    /// Strategy to apply when the caller does not override it
    pub strategy: BinarizeStrategy,
    /// Gaussian smoothing kernel size; must be odd and >= 3
    pub gaussian_kernel: u32,
    /// Median smoothing kernel size; must be odd and >= 3
    pub median_kernel: u32,
    /// Neighborhood block size for adaptive thresholding; must be odd and >= 3
    pub block_size: u32,
    /// Constant subtracted from the local mean before comparison
    pub offset: f32,
    /// Contrast factor applied around the midpoint before thresholding
    pub contrast: f32,
    /// Brightness added after the contrast adjustment
    pub brightness: f32,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            strategy: BinarizeStrategy::Standard,
            gaussian_kernel: 3,
            median_kernel: 3,
            block_size: 11,
            offset: 10.0,
            contrast: 1.5,
            brightness: 1.2,
        }
    }
}

/// OCR engine settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrSettings {
    /// Directory holding the traineddata files, or `None` for the system path
    pub datapath: Option<PathBuf>,
    /// Language profile for horizontally laid-out text
    pub horizontal_lang: String,
    /// Language profile for vertically laid-out text
    pub vertical_lang: String,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            datapath: None,
            horizontal_lang: "jpn".to_string(),
            vertical_lang: "jpn_vert".to_string(),
        }
    }
}

/// Morphological analyzer settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SegmenterSettings {
    /// Path to the mecab binary
    pub mecab_binary: PathBuf,
    /// Dictionary directory passed to mecab, or `None` for its default
    pub dicdir: Option<PathBuf>,
}

impl Default for SegmenterSettings {
    fn default() -> Self {
        Self {
            mecab_binary: PathBuf::from("mecab"),
            dicdir: None,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = toml::from_str(&content)?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_app_config() {
        let config = AppConfig::default();

        // Check capture defaults
        assert_eq!(config.capture.device_index, 0);
        assert_eq!(config.capture.ideal_width, 4096);
        assert_eq!(config.capture.ideal_height, 4096);
        assert_eq!(config.capture.settle_delay_ms, 100);

        // Check preprocess defaults
        assert_eq!(config.preprocess.strategy, BinarizeStrategy::Standard);
        assert_eq!(config.preprocess.block_size, 11);
        assert!((config.preprocess.offset - 10.0).abs() < 0.01);
        assert!((config.preprocess.contrast - 1.5).abs() < 0.01);

        // Check engine defaults
        assert_eq!(config.ocr.horizontal_lang, "jpn");
        assert_eq!(config.ocr.vertical_lang, "jpn_vert");
        assert_eq!(config.segmenter.mecab_binary, PathBuf::from("mecab"));
    }

    #[test]
    fn test_config_serialization_roundtrip() {
        let config = AppConfig::default();

        // Serialize to TOML
        let toml_str = toml::to_string_pretty(&config).unwrap();

        // Deserialize back
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        // Verify values match
        assert_eq!(parsed.capture.ideal_width, config.capture.ideal_width);
        assert_eq!(parsed.preprocess.strategy, config.preprocess.strategy);
        assert_eq!(parsed.preprocess.block_size, config.preprocess.block_size);
        assert_eq!(parsed.ocr.vertical_lang, config.ocr.vertical_lang);
    }

    #[test]
    fn test_config_with_custom_values() {
        let mut config = AppConfig::default();
        config.preprocess.strategy = BinarizeStrategy::Otsu;
        config.capture.device_index = 2;
        config.ocr.datapath = Some(PathBuf::from("/usr/share/tessdata"));

        // Serialize and deserialize
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: AppConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(parsed.preprocess.strategy, BinarizeStrategy::Otsu);
        assert_eq!(parsed.capture.device_index, 2);
        assert_eq!(parsed.ocr.datapath, Some(PathBuf::from("/usr/share/tessdata")));
    }

    #[test]
    fn test_strategy_parses_from_snake_case() {
        let parsed: AppConfig = toml::from_str(
            r#"
            [capture]
            device_index = 0
            ideal_width = 1920
            ideal_height = 1080
            settle_delay_ms = 100
            freeze_delay_ms = 20

            [preprocess]
            strategy = "otsu"
            gaussian_kernel = 3
            median_kernel = 3
            block_size = 11
            offset = 10.0
            contrast = 1.5
            brightness = 1.2

            [ocr]
            horizontal_lang = "jpn"
            vertical_lang = "jpn_vert"

            [segmenter]
            mecab_binary = "mecab"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.preprocess.strategy, BinarizeStrategy::Otsu);
    }

    #[test]
    fn test_save_and_load_config() {
        let config = AppConfig::default();

        // Create a temporary file
        let temp_file = NamedTempFile::new().unwrap();

        // Save config
        save_config(&config, temp_file.path()).unwrap();

        // Load config
        let loaded = load_config(temp_file.path()).unwrap();

        // Verify
        assert_eq!(loaded.capture.ideal_width, config.capture.ideal_width);
        assert_eq!(loaded.preprocess.strategy, config.preprocess.strategy);
    }

    #[test]
    fn test_load_config_file_not_found() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();

        let result = load_config(temp_file.path());
        assert!(result.is_err());
    }
}
