//! User defaults for the CLI.
//!
//! Read from `config.toml` in the platform config directory, then from
//! `TUNE__*` environment variables. Command-line flags win over both.
use anyhow::{Context, Result};
use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::plugins::registry::DownloadCliConfig;

#[derive(Debug, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Settings {
    pub out_dir: Option<String>,
    pub quality: Option<String>,
    pub ytdlp_bin: Option<String>,
    pub ffmpeg_location: Option<String>,
    pub probe_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        // Linux:   ~/.config/tune-downloader/config.toml
        // Windows: C:\Users\Name\AppData\Roaming\tune-downloader\config\config.toml
        // Mac:     ~/Library/Application Support/com.tune-downloader.tune-downloader/config.toml
        let path = ProjectDirs::from("com", "tune-downloader", "tune-downloader")
            .map(|dirs| dirs.config_dir().join("config.toml"));
        Self::load_from(path.as_deref(), "TUNE")
    }

    fn load_from(path: Option<&Path>, env_prefix: &str) -> Result<Self> {
        let mut s = Config::builder();
        if let Some(path) = path.filter(|p| p.exists()) {
            s = s.add_source(File::from(path));
        }
        s = s.add_source(Environment::with_prefix(env_prefix).separator("__"));

        s.build()
            .and_then(|c| c.try_deserialize())
            .with_context(|| match path {
                Some(p) => format!("invalid settings in {} or {}__* variables", p.display(), env_prefix),
                None => format!("invalid {}__* variables", env_prefix),
            })
    }

    /// Engine defaults before plugin flags are applied.
    pub fn download_config(&self) -> DownloadCliConfig {
        let mut cfg = DownloadCliConfig::default();
        if let Some(bin) = &self.ytdlp_bin {
            cfg.engine_ctx.ytdlp_bin = PathBuf::from(bin);
        }
        cfg.engine_ctx.ffmpeg_location = self.ffmpeg_location.as_ref().map(PathBuf::from);
        if let Some(secs) = self.probe_timeout_secs {
            cfg.engine_ctx.probe_timeout = Duration::from_secs(secs);
        }
        cfg
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "out_dir = \"/srv/music\"\nquality = \"semi\"\nprobe_timeout_secs = 30\n",
        )
        .unwrap();

        let s = Settings::load_from(Some(&path), "TUNE_TEST_FILE").unwrap();
        assert_eq!(s.out_dir.as_deref(), Some("/srv/music"));
        assert_eq!(s.quality.as_deref(), Some("semi"));
        assert_eq!(s.probe_timeout_secs, Some(30));
        assert_eq!(s.ytdlp_bin, None);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let s = Settings::load_from(Some(&dir.path().join("absent.toml")), "TUNE_TEST_ABSENT").unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "probe_timeout_secs = \"soon\"\n").unwrap();
        assert!(Settings::load_from(Some(&path), "TUNE_TEST_BAD").is_err());
    }

    #[test]
    fn feeds_engine_context() {
        let s = Settings {
            ytdlp_bin: Some("/opt/yt-dlp".into()),
            probe_timeout_secs: Some(7),
            ..Default::default()
        };
        let cfg = s.download_config();
        assert_eq!(cfg.engine_ctx.ytdlp_bin, PathBuf::from("/opt/yt-dlp"));
        assert_eq!(cfg.engine_ctx.ffmpeg_location, None);
        assert_eq!(cfg.engine_ctx.probe_timeout, Duration::from_secs(7));
    }
}
