use anyhow::Context;
use async_trait::async_trait;
use crate::core::model::JobRequest;
use crate::core::signal::LifecycleMarker;
use clap::{ArgMatches, Command};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Item metadata attached to engine callbacks. Every field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ItemInfo {
    pub title: Option<String>,
    pub filename: Option<String>,
    pub filepath: Option<String>,
    pub playlist_index: Option<u32>,
    pub n_entries: Option<u32>,
    pub playlist_count: Option<u32>,
}

/// One byte-progress tick as the engine reports it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct ProgressReport {
    pub status: Option<String>,
    pub downloaded_bytes: Option<f64>,
    pub total_bytes: Option<f64>,
    pub total_bytes_estimate: Option<f64>,
    pub filename: Option<String>,
    pub info_dict: Option<ItemInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeResult {
    pub total_items: Option<u32>,
    pub first_title: Option<String>,
}

/// Callbacks the engine drives while a job downloads.
///
/// Implementations must not fail or block; the engine ignores what they do.
pub trait EngineOutput: Send {
    fn on_progress(&mut self, report: ProgressReport);
    fn on_postprocess(&mut self, info: ItemInfo);
    fn on_lifecycle(&mut self, marker: LifecycleMarker, info: ItemInfo);
    /// Free-text status output that did not arrive through a hook.
    fn on_log(&mut self, line: &str);
}

#[derive(Debug, Clone)]
pub struct EngineContext {
    pub ytdlp_bin: PathBuf,
    pub ffmpeg_location: Option<PathBuf>,
    pub probe_timeout: Duration,
}

impl Default for EngineContext {
    fn default() -> Self {
        Self {
            ytdlp_bin: PathBuf::from("yt-dlp"),
            ffmpeg_location: None,
            probe_timeout: Duration::from_secs(120),
        }
    }
}

#[async_trait]
pub trait MediaEngine: Send + Sync {
    fn name(&self) -> &'static str;
    /// Confidence that this engine handles the URL; 0 means not at all.
    fn can_handle(&self, url: &Url) -> u8;

    /// Metadata-only pass that enumerates collection members.
    async fn probe(&self, req: &JobRequest, ctx: &EngineContext) -> anyhow::Result<ProbeResult>;

    /// Runs the whole job, reporting through `out`. Returns the result title.
    async fn download(
        &self,
        req: &JobRequest,
        ctx: &EngineContext,
        out: &mut dyn EngineOutput,
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Clone, Default)]
pub struct DownloadCliConfig {
    pub engine_ctx: EngineContext,
}

pub trait CliPlugin: Send + Sync {
    fn name(&self) -> &'static str;
    fn augment_download_command(&self, cmd: Command) -> Command;
    fn apply_download_matches(&self, matches: &ArgMatches, cfg: &mut DownloadCliConfig) -> anyhow::Result<()>;
}

pub struct PluginRegistry {
    engines: Vec<Arc<dyn MediaEngine>>,
    cli_plugins: Vec<Box<dyn CliPlugin>>,
}

impl PluginRegistry {
    pub fn empty() -> Self {
        Self { engines: vec![], cli_plugins: vec![] }
    }

    pub fn with_defaults() -> Self {
        let mut reg = Self::empty();
        reg.register_engine(Arc::new(crate::plugins::ytdlp::driver::YtDlpEngine::new()));
        reg.cli_plugins.push(Box::new(crate::plugins::ytdlp::cli::YtDlpCliPlugin::new()));
        reg
    }

    pub fn register_engine(&mut self, engine: Arc<dyn MediaEngine>) {
        self.engines.push(engine);
    }

    pub fn augment_download_command(&self, cmd: Command) -> Command {
        self.cli_plugins
            .iter()
            .fold(cmd, |c, p| p.augment_download_command(c))
    }

    pub fn apply_download_matches(&self, matches: &ArgMatches, cfg: &mut DownloadCliConfig) -> anyhow::Result<()> {
        for p in &self.cli_plugins {
            p.apply_download_matches(matches, cfg)
                .with_context(|| format!("invalid {} options", p.name()))?;
        }
        Ok(())
    }

    pub fn engine_for(&self, url: &Url) -> Option<Arc<dyn MediaEngine>> {
        self.engines
            .iter()
            .map(|e| (e.can_handle(url), e))
            .max_by_key(|(c, _)| *c)
            .and_then(|(c, e)| if c == 0 { None } else { Some(e.clone()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plugin_errors_name_the_plugin() {
        let reg = PluginRegistry::with_defaults();
        let m = reg
            .augment_download_command(Command::new("download"))
            .try_get_matches_from(["download", "--probe-timeout-secs", "soon"])
            .unwrap();
        let mut cfg = DownloadCliConfig::default();
        let err = reg.apply_download_matches(&m, &mut cfg).unwrap_err();
        assert!(format!("{err:#}").starts_with("invalid yt-dlp options"));
    }

    #[test]
    fn only_web_urls_find_an_engine() {
        let reg = PluginRegistry::with_defaults();
        let web = Url::parse("https://www.youtube.com/watch?v=x").unwrap();
        let file = Url::parse("file:///tmp/a.mp3").unwrap();
        assert_eq!(reg.engine_for(&web).map(|e| e.name()), Some("yt-dlp"));
        assert!(reg.engine_for(&file).is_none());
        assert!(PluginRegistry::empty().engine_for(&web).is_none());
    }
}
