use crate::core::signal::{LifecycleMarker, RawSignal};
use crate::core::state::JobState;
use crate::core::taps::hook::item_meta;
use crate::plugins::registry::ItemInfo;

/// Per-item lifecycle points reported by the engine.
///
/// `Started` on a multi-item job is the only place `current_index` moves.
pub fn observe(state: &mut JobState, marker: LifecycleMarker, info: &ItemInfo) -> RawSignal {
    if marker == LifecycleMarker::Started && state.is_multi_item() {
        let index = state.begin_item();
        tracing::debug!(index, total = ?state.total_items(), "item started");
    }
    RawSignal::Lifecycle { marker, meta: item_meta(Some(info), None) }
}
