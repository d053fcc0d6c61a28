use anyhow::Context;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use url::Url;

use crate::core::model::JobRequest;
use crate::plugins::registry::{EngineContext, EngineOutput, MediaEngine, ProbeResult};
use crate::plugins::ytdlp::output::{self, LineDecoder};
use crate::plugins::ytdlp::probe::parse_flat_info;

#[derive(thiserror::Error, Debug)]
pub enum YtDlpError {
    #[error("yt-dlp failed: {0}")]
    Failed(String),

    #[error("yt-dlp probe returned malformed metadata: {0}")]
    MalformedProbe(#[from] serde_json::Error),
}

const ITEM_FIELDS: &str = "title,filename,filepath,playlist_index,n_entries,playlist_count";

pub struct YtDlpEngine;

impl YtDlpEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn probe_args(req: &JobRequest) -> Vec<String> {
        let mut args: Vec<String> = [
            "--flat-playlist",
            "--dump-single-json",
            "--skip-download",
            "--no-warnings",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        if !req.is_playlist {
            args.push("--no-playlist".into());
        }
        args.push(req.source_url.clone());
        args
    }

    pub fn download_args(req: &JobRequest, ffmpeg: Option<&Path>) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "--newline".into(),
            "--no-colors".into(),
            "--progress".into(),
            "--verbose".into(),
            "--no-simulate".into(),
            "--windows-filenames".into(),
            "-o".into(),
            req.destination.join("%(title)s.%(ext)s").to_string_lossy().into_owned(),
            "--progress-template".into(),
            format!(
                "download:{}{{\"progress\":%(progress)j,\"info\":%(info.{{{}}})j}}",
                output::PROGRESS,
                ITEM_FIELDS
            ),
            "--progress-template".into(),
            format!("postprocess:{}%(info.{{{}}})j", output::POSTPROCESS, ITEM_FIELDS),
        ];

        for (when, prefix, template) in [
            ("video", output::STARTED, format!("%(.{{{}}})j", ITEM_FIELDS)),
            ("before_dl", output::DESTINATION, format!("%(.{{{}}})j", ITEM_FIELDS)),
            ("post_process", output::FINISHED, format!("%(.{{{}}})j", ITEM_FIELDS)),
            ("after_video", output::VIDEO_TITLE, "%(title)j".to_string()),
            ("playlist", output::PLAYLIST_TITLE, "%(title)j".to_string()),
        ] {
            args.push("--print".into());
            args.push(format!("{when}:{prefix}{template}"));
        }

        args.push(if req.is_playlist { "--yes-playlist" } else { "--no-playlist" }.into());

        if req.want_video {
            args.extend(["-f", "bv*+ba/b", "--merge-output-format", "mp4"].map(String::from));
        } else {
            args.extend(["-f", "bestaudio/best", "-x", "--audio-format", "mp3"].map(String::from));
            args.push("--audio-quality".into());
            args.push(format!("{}K", req.quality.audio_kbps()));
        }

        if let Some(ff) = ffmpeg {
            args.push("--ffmpeg-location".into());
            args.push(ff.to_string_lossy().into_owned());
        }

        args.push(req.source_url.clone());
        args
    }
}

/// Configured location first, then a copy bundled next to the executable.
/// `None` leaves the lookup to yt-dlp (`PATH`).
pub fn find_ffmpeg(ctx: &EngineContext) -> Option<PathBuf> {
    if let Some(p) = &ctx.ffmpeg_location {
        return Some(p.clone());
    }
    let exe_dir = std::env::current_exe().ok()?.parent()?.to_path_buf();
    let name = if cfg!(windows) { "ffmpeg.exe" } else { "ffmpeg" };
    [exe_dir.join("tools").join("ffmpeg").join(name), exe_dir.join(name)]
        .into_iter()
        .find(|c| c.is_file())
}

#[async_trait]
impl MediaEngine for YtDlpEngine {
    fn name(&self) -> &'static str {
        "yt-dlp"
    }

    fn can_handle(&self, url: &Url) -> u8 {
        if url.scheme() == "http" || url.scheme() == "https" {
            50
        } else {
            0
        }
    }

    async fn probe(&self, req: &JobRequest, ctx: &EngineContext) -> anyhow::Result<ProbeResult> {
        let out = Command::new(&ctx.ytdlp_bin)
            .args(Self::probe_args(req))
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("spawn {}", ctx.ytdlp_bin.display()))?;

        if !out.status.success() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            return Err(YtDlpError::Failed(stderr.trim().to_string()).into());
        }

        let stdout = String::from_utf8_lossy(&out.stdout);
        Ok(parse_flat_info(stdout.trim()).map_err(YtDlpError::from)?)
    }

    async fn download(
        &self,
        req: &JobRequest,
        ctx: &EngineContext,
        out: &mut dyn EngineOutput,
    ) -> anyhow::Result<String> {
        let ffmpeg = find_ffmpeg(ctx);
        let args = Self::download_args(req, ffmpeg.as_deref());
        tracing::debug!(bin = %ctx.ytdlp_bin.display(), ?args, "starting yt-dlp");

        let mut child = Command::new(&ctx.ytdlp_bin)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .with_context(|| format!("spawn {}", ctx.ytdlp_bin.display()))?;

        let stdout = child.stdout.take().context("yt-dlp stdout")?;
        let stderr = child.stderr.take().context("yt-dlp stderr")?;
        let mut out_lines = BufReader::new(stdout).lines();
        let mut err_lines = BufReader::new(stderr).lines();
        let (mut out_open, mut err_open) = (true, true);
        let mut decoder = LineDecoder::default();

        // both pipes are drained here so every callback runs on this task
        while out_open || err_open {
            tokio::select! {
                line = out_lines.next_line(), if out_open => match line {
                    Ok(Some(l)) => decoder.dispatch(&l, out),
                    Ok(None) => out_open = false,
                    Err(e) => {
                        tracing::debug!(error = %e, "yt-dlp stdout read failed");
                        out_open = false;
                    }
                },
                line = err_lines.next_line(), if err_open => match line {
                    Ok(Some(l)) => decoder.dispatch(&l, out),
                    Ok(None) => err_open = false,
                    Err(e) => {
                        tracing::debug!(error = %e, "yt-dlp stderr read failed");
                        err_open = false;
                    }
                },
            }
        }

        let status = child.wait().await.context("wait for yt-dlp")?;
        if !status.success() {
            let msg = decoder
                .last_error()
                .map(str::to_string)
                .unwrap_or_else(|| format!("yt-dlp exited with {status}"));
            return Err(YtDlpError::Failed(msg).into());
        }

        Ok(decoder.result_title().unwrap_or_default().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::model::QualityTier;

    fn request(playlist: bool, video: bool) -> JobRequest {
        JobRequest {
            source_url: "https://example.com/watch?v=1".into(),
            destination: PathBuf::from("/music"),
            quality: QualityTier::Semi,
            is_playlist: playlist,
            want_video: video,
        }
    }

    fn has_pair(args: &[String], a: &str, b: &str) -> bool {
        args.windows(2).any(|w| w[0] == a && w[1] == b)
    }

    #[test]
    fn audio_job_extracts_mp3_at_tier_bitrate() {
        let args = YtDlpEngine::download_args(&request(false, false), None);
        assert!(has_pair(&args, "-f", "bestaudio/best"));
        assert!(has_pair(&args, "--audio-format", "mp3"));
        assert!(has_pair(&args, "--audio-quality", "320K"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--ffmpeg-location".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/watch?v=1"));
    }

    #[test]
    fn video_playlist_job_merges_mp4() {
        let args = YtDlpEngine::download_args(&request(true, true), Some(Path::new("/opt/ff")));
        assert!(has_pair(&args, "-f", "bv*+ba/b"));
        assert!(has_pair(&args, "--merge-output-format", "mp4"));
        assert!(has_pair(&args, "--ffmpeg-location", "/opt/ff"));
        assert!(args.contains(&"--yes-playlist".to_string()));
        assert!(!args.contains(&"-x".to_string()));
    }

    #[test]
    fn templates_carry_tap_markers() {
        let args = YtDlpEngine::download_args(&request(true, false), None);
        let progress = args
            .iter()
            .find(|a| a.starts_with("download:"))
            .expect("progress template");
        assert_eq!(
            progress,
            "download:[tap:progress] {\"progress\":%(progress)j,\"info\":%(info.{title,filename,filepath,playlist_index,n_entries,playlist_count})j}"
        );
        assert!(args.iter().any(|a| a == "video:[tap:started] %(.{title,filename,filepath,playlist_index,n_entries,playlist_count})j"));
        assert!(args.iter().any(|a| a == "playlist:[tap:playlist] %(title)j"));
    }

    #[test]
    fn probe_args_respect_playlist_flag() {
        let single = YtDlpEngine::probe_args(&request(false, false));
        assert!(single.contains(&"--no-playlist".to_string()));
        let list = YtDlpEngine::probe_args(&request(true, false));
        assert!(!list.contains(&"--no-playlist".to_string()));
        assert!(list.contains(&"--flat-playlist".to_string()));
    }

    #[test]
    fn configured_ffmpeg_wins() {
        let ctx = EngineContext { ffmpeg_location: Some(PathBuf::from("/x/ffmpeg")), ..Default::default() };
        assert_eq!(find_ffmpeg(&ctx), Some(PathBuf::from("/x/ffmpeg")));
    }
}
