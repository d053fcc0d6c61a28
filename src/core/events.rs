use crate::core::model::CanonicalEvent;
use serde::Serialize;

/// Everything a consumer receives for one job. Exactly one terminal
/// variant closes the stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    Progress(CanonicalEvent),
    Succeeded { title: String },
    Failed { message: String },
}

impl JobEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobEvent::Progress(_))
    }
}
