use crate::core::signal::LifecycleMarker;
use crate::plugins::registry::{EngineOutput, ItemInfo, ProgressReport};
use serde::Deserialize;

pub const PROGRESS: &str = "[tap:progress] ";
pub const POSTPROCESS: &str = "[tap:postprocess] ";
pub const STARTED: &str = "[tap:started] ";
pub const DESTINATION: &str = "[tap:destination] ";
pub const FINISHED: &str = "[tap:finished] ";
pub const VIDEO_TITLE: &str = "[tap:video] ";
pub const PLAYLIST_TITLE: &str = "[tap:playlist] ";

#[derive(Deserialize)]
struct ProgressLine {
    progress: ProgressReport,
    #[serde(default)]
    info: Option<ItemInfo>,
}

/// Splits yt-dlp's output into hook, lifecycle and free-text callbacks.
///
/// Marker lines whose payload does not decode are passed on as text.
#[derive(Debug, Default)]
pub struct LineDecoder {
    playlist_title: Option<String>,
    video_title: Option<String>,
    last_error: Option<String>,
}

impl LineDecoder {
    pub fn dispatch(&mut self, line: &str, out: &mut dyn EngineOutput) {
        let line = line.trim();
        if line.is_empty() {
            return;
        }

        if let Some(rest) = line.strip_prefix(PROGRESS) {
            match serde_json::from_str::<ProgressLine>(rest) {
                Ok(p) => {
                    let mut report = p.progress;
                    if p.info.is_some() {
                        report.info_dict = p.info;
                    }
                    out.on_progress(report);
                }
                Err(e) => {
                    tracing::debug!(error = %e, "undecodable progress line");
                    out.on_log(line);
                }
            }
            return;
        }

        if let Some(rest) = line.strip_prefix(POSTPROCESS) {
            match serde_json::from_str::<ItemInfo>(rest) {
                Ok(info) => out.on_postprocess(info),
                Err(e) => {
                    tracing::debug!(error = %e, "undecodable postprocess line");
                    out.on_log(line);
                }
            }
            return;
        }

        for (prefix, marker) in [
            (STARTED, LifecycleMarker::Started),
            (DESTINATION, LifecycleMarker::Destination),
            (FINISHED, LifecycleMarker::Finished),
        ] {
            if let Some(rest) = line.strip_prefix(prefix) {
                match serde_json::from_str::<ItemInfo>(rest) {
                    Ok(info) => out.on_lifecycle(marker, info),
                    Err(e) => {
                        tracing::debug!(error = %e, ?marker, "undecodable lifecycle line");
                        out.on_log(line);
                    }
                }
                return;
            }
        }

        if let Some(rest) = line.strip_prefix(VIDEO_TITLE) {
            if let Ok(Some(t)) = serde_json::from_str::<Option<String>>(rest) {
                self.video_title = Some(t);
            }
            return;
        }
        if let Some(rest) = line.strip_prefix(PLAYLIST_TITLE) {
            if let Ok(Some(t)) = serde_json::from_str::<Option<String>>(rest) {
                self.playlist_title = Some(t);
            }
            return;
        }

        if let Some(msg) = line.strip_prefix("ERROR:") {
            self.last_error = Some(msg.trim().to_string());
        }
        out.on_log(line);
    }

    /// Playlist title if one was reported, else the last item title.
    pub fn result_title(&self) -> Option<&str> {
        self.playlist_title.as_deref().or(self.video_title.as_deref())
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
