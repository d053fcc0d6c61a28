//! Adapters between the external engine's output and the normalizer.
//!
//! `JobTaps` is the per-job sink handed to the engine. It owns the job's
//! `JobState` and `Normalizer`, so every tap call happens on the worker and
//! nothing mutable crosses into the consumer. Relaying is best effort: a
//! malformed tick or a departed consumer never reaches the download.

pub mod hook;
pub mod lifecycle;
pub mod text_log;

use crate::core::channel::DeliverySender;
use crate::core::events::JobEvent;
use crate::core::normalizer::Normalizer;
use crate::core::signal::{LifecycleMarker, RawSignal};
use crate::core::state::JobState;
use crate::plugins::registry::{EngineOutput, ItemInfo, ProgressReport};

pub struct JobTaps {
    state: JobState,
    normalizer: Normalizer,
    delivery: DeliverySender,
    structured_seen: bool,
}

impl JobTaps {
    pub fn new(state: JobState, delivery: DeliverySender) -> Self {
        Self { state, normalizer: Normalizer::new(), delivery, structured_seen: false }
    }

    #[cfg(test)]
    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn last_title(&self) -> &str {
        self.normalizer.last_title()
    }

    /// Emits the `preparing` event that precedes any engine output.
    pub fn announce(&mut self, title: Option<String>) {
        self.relay(RawSignal::Probe { title });
    }

    fn relay(&mut self, raw: RawSignal) {
        let event = self.normalizer.normalize(raw, &self.state);
        self.delivery.send(JobEvent::Progress(event));
    }
}

impl EngineOutput for JobTaps {
    fn on_progress(&mut self, report: ProgressReport) {
        self.structured_seen = true;
        match hook::observe_progress(&report) {
            Some(raw) => self.relay(raw),
            None => tracing::debug!(status = ?report.status, "progress tick ignored"),
        }
    }

    fn on_postprocess(&mut self, info: ItemInfo) {
        self.structured_seen = true;
        self.relay(hook::observe_postprocess(&info));
    }

    fn on_lifecycle(&mut self, marker: LifecycleMarker, info: ItemInfo) {
        self.structured_seen = true;
        let raw = lifecycle::observe(&mut self.state, marker, &info);
        self.relay(raw);
    }

    fn on_log(&mut self, line: &str) {
        tracing::trace!(target: "engine", "{}", line);
        if self.structured_seen {
            return;
        }
        if let Some(sig) = text_log::parse_line(line) {
            self.relay(RawSignal::TextLine(sig));
        }
    }
}
