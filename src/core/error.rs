use std::path::PathBuf;

/// Reasons a job is rejected before any worker is spawned.
#[derive(thiserror::Error, Debug)]
pub enum JobError {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("unsupported URL scheme `{0}` (expected http or https)")]
    UnsupportedScheme(String),

    #[error("no engine can handle: {0}")]
    UnsupportedSource(String),

    #[error("destination folder does not exist: {}", .0.display())]
    MissingDestination(PathBuf),

    #[error("destination is not a folder: {}", .0.display())]
    NotADirectory(PathBuf),

    #[error("engine is closed to new jobs")]
    EngineClosed,
}
