//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// External renderer settings.
    pub renderer: RendererConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Settings for the external renderer process.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererConfig {
    /// Renderer binary (name on PATH or absolute path).
    pub ffmpeg_path: String,

    /// Prober binary used to check input stream layouts.
    pub ffprobe_path: String,

    /// Overwrite an existing output file (`-y`).
    pub overwrite: bool,

    /// Suppress the renderer's banner (`-hide_banner`).
    pub hide_banner: bool,

    /// Extra output arguments placed right before the output path
    /// (e.g. `["-c:v", "libx264"]`).
    pub output_args: Vec<String>,

    /// Probe the background music and refuse non-stereo layouts.
    pub verify_bgm_layout: bool,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "highlights=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
            overwrite: true,
            hide_banner: true,
            output_args: Vec::new(),
            verify_bgm_layout: true,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl RendererConfig {
    /// Global flags emitted before the first input.
    pub fn global_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        if self.hide_banner {
            args.push("-hide_banner".to_string());
        }
        if self.overwrite {
            args.push("-y".to_string());
        }
        args
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match std::fs::read_to_string(&config_path) {
                Ok(content) => match serde_json::from_str(&content) {
                    Ok(config) => return config,
                    Err(e) => {
                        tracing::warn!("Failed to parse config at {:?}: {}", config_path, e);
                    }
                },
                Err(e) => {
                    tracing::warn!("Failed to read config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<(), std::io::Error> {
        let config_path = config_file_path();
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("highlights").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: AppConfig =
            serde_json::from_str(r#"{"renderer":{"ffmpeg_path":"/opt/ffmpeg/bin/ffmpeg"}}"#)
                .unwrap();
        assert_eq!(config.renderer.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.renderer.ffprobe_path, "ffprobe");
        assert!(config.renderer.verify_bgm_layout);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_global_args_follow_flags() {
        let mut renderer = RendererConfig::default();
        assert_eq!(renderer.global_args(), vec!["-hide_banner", "-y"]);

        renderer.hide_banner = false;
        renderer.overwrite = false;
        assert!(renderer.global_args().is_empty());
    }
}
