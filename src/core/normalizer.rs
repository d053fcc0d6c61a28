use crate::core::model::{CanonicalEvent, ItemMeta, ProgressStatus};
use crate::core::signal::{LifecycleMarker, RawSignal, TextSignal};
use crate::core::state::JobState;

/// Fallback file percent when bytes moved but no size is known.
pub const INDETERMINATE_PERCENT: u8 = 1;

/// Turns raw tap output into canonical events for one job.
///
/// Keeps the last title and the last overall percent so that neither
/// regresses across events. Never fails: a field that cannot be computed
/// is left as `None`.
#[derive(Debug, Default)]
pub struct Normalizer {
    last_title: String,
    last_overall: Option<u8>,
}

impl Normalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_title(&self) -> &str {
        &self.last_title
    }

    pub fn normalize(&mut self, raw: RawSignal, state: &JobState) -> CanonicalEvent {
        let (status, file_percent, meta) = classify(raw);

        let item_index = meta
            .index
            .filter(|i| *i > 0)
            .or_else(|| state.is_multi_item().then(|| state.current_index().max(1)));
        let item_total = meta.total.filter(|t| *t > 0).or(state.total_items());

        let computed = if state.is_multi_item() {
            match (item_index, item_total, file_percent) {
                (Some(index), Some(total), Some(file)) => overall_percent(index, total, file),
                _ => None,
            }
        } else {
            file_percent
        };
        let overall = match (computed, self.last_overall) {
            (Some(now), Some(prev)) => Some(now.max(prev)),
            (now, prev) => now.or(prev),
        };
        self.last_overall = overall;

        let title = resolve_title(&meta).unwrap_or_else(|| self.last_title.clone());
        if !title.is_empty() {
            self.last_title = title.clone();
        }

        CanonicalEvent {
            status,
            file_percent,
            overall_percent: overall,
            item_index,
            item_total,
            title,
        }
    }
}

fn classify(raw: RawSignal) -> (ProgressStatus, Option<u8>, ItemMeta) {
    match raw {
        RawSignal::Probe { title } => (
            ProgressStatus::Preparing,
            None,
            ItemMeta { title, ..Default::default() },
        ),
        RawSignal::ByteProgress { downloaded, total, meta } => {
            (ProgressStatus::Downloading, file_percent(downloaded, total), meta)
        }
        RawSignal::Lifecycle { marker, meta } => {
            let (status, pct) = match marker {
                LifecycleMarker::Started => (ProgressStatus::Preparing, 0),
                LifecycleMarker::Destination => (ProgressStatus::DestinationChosen, 0),
                LifecycleMarker::Finished => (ProgressStatus::Finished, 100),
                LifecycleMarker::PostProcessed => (ProgressStatus::Postprocessing, 100),
            };
            (status, Some(pct), meta)
        }
        RawSignal::TextLine(TextSignal::Destination { filename }) => (
            ProgressStatus::Downloading,
            Some(INDETERMINATE_PERCENT),
            ItemMeta { filename: Some(filename), ..Default::default() },
        ),
        RawSignal::TextLine(TextSignal::PostProcess) => {
            (ProgressStatus::Postprocessing, Some(100), ItemMeta::default())
        }
        RawSignal::TextLine(TextSignal::Percent(p)) => {
            (ProgressStatus::Downloading, Some(p.min(100)), ItemMeta::default())
        }
    }
}

/// Byte-based percent of the current item.
pub fn file_percent(downloaded: u64, total: Option<u64>) -> Option<u8> {
    match total {
        Some(total) if total > 0 => {
            let pct = (downloaded as u128 * 100 / total as u128).min(100);
            Some(pct as u8)
        }
        _ if downloaded > 0 => Some(INDETERMINATE_PERCENT),
        _ => None,
    }
}

/// Completed items plus the fraction of the in-flight one, over the total.
pub fn overall_percent(index: u32, total: u32, file: u8) -> Option<u8> {
    if index == 0 || total == 0 {
        return None;
    }
    let done = (index as u64 - 1) * 100 + file.min(100) as u64;
    Some((done / total as u64).min(100) as u8)
}

fn resolve_title(meta: &ItemMeta) -> Option<String> {
    meta.title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .or_else(|| meta.filename.as_deref().and_then(title_from_filename))
}

/// `"/music/Some Song.mp3"` -> `"Some Song"`.
pub fn title_from_filename(path: &str) -> Option<String> {
    let path = path.trim().trim_matches('"');
    let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = match base.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => base,
    };
    let stem = stem.trim();
    (!stem.is_empty()).then(|| stem.to_string())
}
