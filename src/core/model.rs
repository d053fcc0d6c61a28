use serde::Serialize;
use std::path::PathBuf;
use uuid::Uuid;

pub type JobId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QualityTier {
    #[default]
    Best,
    Semi,
    Worst,
}

impl QualityTier {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "best" => Some(Self::Best),
            "semi" => Some(Self::Semi),
            "worst" => Some(Self::Worst),
            _ => None,
        }
    }

    /// Audio encoder target in kbps. Advisory only for video jobs.
    pub fn audio_kbps(self) -> u32 {
        match self {
            Self::Best => 1411,
            Self::Semi => 320,
            Self::Worst => 128,
        }
    }
}

#[derive(Debug, Clone)]
pub struct JobRequest {
    pub source_url: String,
    pub destination: PathBuf,
    pub quality: QualityTier,
    pub is_playlist: bool,
    pub want_video: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProgressStatus {
    Preparing,
    Downloading,
    DestinationChosen,
    Postprocessing,
    Finished,
}

/// Normalized progress record handed to the consumer. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanonicalEvent {
    pub status: ProgressStatus,
    pub file_percent: Option<u8>,
    pub overall_percent: Option<u8>,
    pub item_index: Option<u32>,
    pub item_total: Option<u32>,
    pub title: String,
}

/// Item metadata as far as a tap could see it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemMeta {
    pub title: Option<String>,
    pub filename: Option<String>,
    pub index: Option<u32>,
    pub total: Option<u32>,
}
