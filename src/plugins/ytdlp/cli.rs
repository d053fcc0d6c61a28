use crate::plugins::registry::{CliPlugin, DownloadCliConfig};
use clap::{Arg, ArgMatches, Command};
use std::path::PathBuf;
use std::time::Duration;

pub struct YtDlpCliPlugin;

impl YtDlpCliPlugin {
    pub fn new() -> Self {
        Self
    }
}

impl CliPlugin for YtDlpCliPlugin {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn augment_download_command(&self, cmd: Command) -> Command {
        cmd.arg(
            Arg::new("ytdlp_bin")
                .long("ytdlp-bin")
                .env("YTDLP_BIN")
                .help_heading("YT-DLP")
                .help("Path to the yt-dlp executable")
                .num_args(1),
        )
        .arg(
            Arg::new("ffmpeg_location")
                .long("ffmpeg-location")
                .help_heading("YT-DLP")
                .help("ffmpeg binary or folder (default: bundled copy, then PATH)")
                .num_args(1),
        )
        .arg(
            Arg::new("probe_timeout_secs")
                .long("probe-timeout-secs")
                .help_heading("YT-DLP")
                .help("Timeout for the playlist size probe")
                .num_args(1),
        )
    }

    fn apply_download_matches(&self, matches: &ArgMatches, cfg: &mut DownloadCliConfig) -> anyhow::Result<()> {
        if let Some(bin) = matches.get_one::<String>("ytdlp_bin") {
            cfg.engine_ctx.ytdlp_bin = PathBuf::from(bin);
        }
        if let Some(loc) = matches.get_one::<String>("ffmpeg_location") {
            cfg.engine_ctx.ffmpeg_location = Some(PathBuf::from(loc));
        }
        if let Some(s) = matches.get_one::<String>("probe_timeout_secs") {
            cfg.engine_ctx.probe_timeout = Duration::from_secs(s.parse()?);
        }
        Ok(())
    }
}
