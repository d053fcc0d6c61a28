use crate::core::model::ItemMeta;
use crate::core::signal::{LifecycleMarker, RawSignal};
use crate::plugins::registry::{ItemInfo, ProgressReport};

/// Reads one byte-progress tick from the engine's progress hook.
pub fn observe_progress(report: &ProgressReport) -> Option<RawSignal> {
    let meta = item_meta(report.info_dict.as_ref(), report.filename.as_deref());
    match report.status.as_deref() {
        Some("finished") => Some(RawSignal::Lifecycle { marker: LifecycleMarker::Finished, meta }),
        Some("error") => None,
        _ => {
            let downloaded = as_bytes(report.downloaded_bytes).unwrap_or(0);
            let total = as_bytes(report.total_bytes)
                .filter(|t| *t > 0)
                .or_else(|| as_bytes(report.total_bytes_estimate).filter(|t| *t > 0));
            Some(RawSignal::ByteProgress { downloaded, total, meta })
        }
    }
}

/// Reads one tick from the engine's post-processor hook.
pub fn observe_postprocess(info: &ItemInfo) -> RawSignal {
    RawSignal::Lifecycle {
        marker: LifecycleMarker::PostProcessed,
        meta: item_meta(Some(info), None),
    }
}

pub(crate) fn item_meta(info: Option<&ItemInfo>, fallback_filename: Option<&str>) -> ItemMeta {
    let Some(info) = info else {
        return ItemMeta { filename: fallback_filename.map(str::to_string), ..Default::default() };
    };
    ItemMeta {
        title: info.title.clone(),
        filename: info
            .filepath
            .clone()
            .or_else(|| info.filename.clone())
            .or_else(|| fallback_filename.map(str::to_string)),
        index: info.playlist_index,
        total: info.n_entries.or(info.playlist_count),
    }
}

fn as_bytes(v: Option<f64>) -> Option<u64> {
    v.filter(|b| b.is_finite() && *b >= 0.0).map(|b| b.round() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(json: &str) -> ProgressReport {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn uses_estimate_when_total_missing() {
        let r = report(r#"{"status":"downloading","downloaded_bytes":50,"total_bytes":null,"total_bytes_estimate":200.4}"#);
        match observe_progress(&r) {
            Some(RawSignal::ByteProgress { downloaded, total, .. }) => {
                assert_eq!(downloaded, 50);
                assert_eq!(total, Some(200));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn no_size_no_bytes() {
        let r = report(r#"{"status":"downloading"}"#);
        assert_eq!(
            observe_progress(&r),
            Some(RawSignal::ByteProgress { downloaded: 0, total: None, meta: ItemMeta::default() })
        );
    }

    #[test]
    fn finished_becomes_lifecycle_marker() {
        let r = report(
            r#"{"status":"finished","filename":"/x/a.m4a","info_dict":{"title":"A","playlist_index":2,"n_entries":5}}"#,
        );
        match observe_progress(&r) {
            Some(RawSignal::Lifecycle { marker, meta }) => {
                assert_eq!(marker, LifecycleMarker::Finished);
                assert_eq!(meta.title.as_deref(), Some("A"));
                assert_eq!(meta.filename.as_deref(), Some("/x/a.m4a"));
                assert_eq!((meta.index, meta.total), (Some(2), Some(5)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn error_ticks_are_dropped() {
        let r = report(r#"{"status":"error","downloaded_bytes":10}"#);
        assert_eq!(observe_progress(&r), None);
    }

    #[test]
    fn playlist_count_stands_in_for_n_entries() {
        let info = ItemInfo { playlist_count: Some(7), ..Default::default() };
        match observe_postprocess(&info) {
            RawSignal::Lifecycle { marker, meta } => {
                assert_eq!(marker, LifecycleMarker::PostProcessed);
                assert_eq!(meta.total, Some(7));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
