use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::features::ScaleMode;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default = "default_pix_fmt")]
    pub pix_fmt: String,
    #[serde(default)]
    pub font: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_fft_size")]
    pub fft_size: usize,
    #[serde(default)]
    pub scale: ScaleMode,
    #[serde(default = "default_min_db")]
    pub min_db: f64,
    #[serde(default = "default_max_db")]
    pub max_db: f64,
    #[serde(default = "default_smoothing")]
    pub smoothing: f64,
}

#[derive(Debug, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            pix_fmt: default_pix_fmt(),
            font: None,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            fft_size: default_fft_size(),
            scale: ScaleMode::default(),
            min_db: default_min_db(),
            max_db: default_max_db(),
            smoothing: default_smoothing(),
        }
    }
}

fn default_width() -> u32 { 1280 }
fn default_height() -> u32 { 720 }
fn default_fps() -> u32 { 30 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }
fn default_pix_fmt() -> String { "yuv420p".into() }
fn default_fft_size() -> usize { 2048 }
fn default_min_db() -> f64 { -100.0 }
fn default_max_db() -> f64 { -30.0 }
fn default_smoothing() -> f64 { 0.8 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::debug!("{}: {}", path.display(), err);
            None
        }
    }
}

/// `cascade.toml` in the working directory, then the user config locations.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("cascade.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("cascade").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("cascade").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

pub fn default_storage_path() -> Option<PathBuf> {
    dirs::data_dir().map(|dir| dir.join("cascade").join("recordings.json"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [output]
            fps = 60

            [analysis]
            scale = "linear"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.output.fps, 60);
        assert_eq!(cfg.output.width, 1280);
        assert_eq!(cfg.analysis.scale, ScaleMode::Linear);
        assert_eq!(cfg.analysis.fft_size, 2048);
        assert!(cfg.storage.path.is_none());
    }

    #[test]
    fn log_alias_accepted() {
        let cfg: Config = toml::from_str("[analysis]\nscale = \"log\"\n").unwrap();
        assert_eq!(cfg.analysis.scale, ScaleMode::Logarithmic);
    }

    #[test]
    fn unreadable_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cascade.toml");
        assert!(load_config(&path).is_none());
        std::fs::write(&path, "[output\nwidth = ").unwrap();
        assert!(load_config(&path).is_none());
    }
}
