use crate::core::channel::{delivery_channel, DeliveryReceiver, DeliverySender};
use crate::core::error::JobError;
use crate::core::events::JobEvent;
use crate::core::model::*;
use crate::core::preflight;
use crate::core::state::JobState;
use crate::core::taps::JobTaps;
use crate::plugins::registry::{EngineContext, MediaEngine, PluginRegistry};
use futures::FutureExt;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use url::Url;
use uuid::Uuid;

/// Accepts jobs and runs each one on its own worker task.
///
/// Jobs cannot be interrupted mid-transfer. `close` stops new submissions
/// while running jobs finish or fail on their own.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<PluginRegistry>,
    ctx: EngineContext,
    jobs: Arc<Mutex<HashMap<JobId, JobStatus>>>,
    accepting: Arc<AtomicBool>,
}

/// Consumer side of one job.
pub struct JobHandle {
    id: JobId,
    events: DeliveryReceiver,
    worker: JoinHandle<()>,
}

impl JobHandle {
    pub fn id(&self) -> JobId {
        self.id
    }

    pub async fn recv(&mut self) -> Option<JobEvent> {
        self.events.recv().await
    }

    pub async fn recv_coalesced(&mut self) -> Option<JobEvent> {
        self.events.recv_coalesced().await
    }

    pub async fn join(self) {
        if let Err(e) = self.worker.await {
            tracing::error!(job_id = %self.id, error = %e, "job worker aborted");
        }
    }
}

impl Engine {
    pub fn new(registry: PluginRegistry, ctx: EngineContext) -> Self {
        Self {
            registry: Arc::new(registry),
            ctx,
            jobs: Arc::new(Mutex::new(HashMap::new())),
            accepting: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Validates the request and spawns its worker. Nothing is spawned on error.
    pub async fn start_job(&self, req: JobRequest) -> Result<JobHandle, JobError> {
        if self.is_closed() {
            return Err(JobError::EngineClosed);
        }
        let url = validate_url(&req.source_url)?;
        validate_destination(&req.destination).await?;
        let media = self
            .registry
            .engine_for(&url)
            .ok_or_else(|| JobError::UnsupportedSource(req.source_url.clone()))?;

        let job_id = Uuid::new_v4();
        {
            let mut jobs = self.jobs.lock().await;
            jobs.insert(job_id, JobStatus::Pending);
        }
        tracing::info!(
            %job_id,
            url = %req.source_url,
            playlist = req.is_playlist,
            video = req.want_video,
            engine = media.name(),
            "job accepted"
        );

        let (tx, rx) = delivery_channel(job_id);
        let engine = self.clone();
        let worker = tokio::spawn(async move {
            engine.run_job(job_id, req, media, tx).await;
        });

        Ok(JobHandle { id: job_id, events: rx, worker })
    }

    pub async fn job_status(&self, job_id: JobId) -> Option<JobStatus> {
        let jobs = self.jobs.lock().await;
        jobs.get(&job_id).copied()
    }

    pub fn close(&self) {
        if self.accepting.swap(false, Ordering::SeqCst) {
            tracing::info!("engine closed to new jobs");
        }
    }

    pub fn is_closed(&self) -> bool {
        !self.accepting.load(Ordering::SeqCst)
    }

    async fn run_job(
        &self,
        job_id: JobId,
        req: JobRequest,
        media: Arc<dyn MediaEngine>,
        delivery: DeliverySender,
    ) {
        {
            let mut jobs = self.jobs.lock().await;
            jobs.insert(job_id, JobStatus::Running);
        }

        let mut state = JobState::new(req.is_playlist);
        let early_title = preflight::discover(media.as_ref(), &req, &self.ctx, &mut state).await;

        let mut taps = JobTaps::new(state, delivery.clone());
        taps.announce(early_title);

        let outcome = AssertUnwindSafe(media.download(&req, &self.ctx, &mut taps))
            .catch_unwind()
            .await;

        let (status, terminal) = match outcome {
            Ok(Ok(raw_title)) => {
                let mut title = clean_result_title(&raw_title);
                if title.is_empty() {
                    title = taps.last_title().to_string();
                }
                tracing::info!(%job_id, %title, "job succeeded");
                (JobStatus::Completed, JobEvent::Succeeded { title })
            }
            Ok(Err(e)) => {
                let message = format!("{:#}", e);
                tracing::warn!(%job_id, error = %message, "job failed");
                (JobStatus::Failed, JobEvent::Failed { message })
            }
            Err(_) => {
                tracing::error!(%job_id, "engine panicked");
                let message = "download engine crashed".to_string();
                (JobStatus::Failed, JobEvent::Failed { message })
            }
        };
        drop(taps);

        {
            let mut jobs = self.jobs.lock().await;
            jobs.insert(job_id, status);
        }
        delivery.send(terminal);
    }
}

fn validate_url(raw: &str) -> Result<Url, JobError> {
    let url = Url::parse(raw.trim()).map_err(|e| JobError::InvalidUrl(format!("{raw}: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(JobError::UnsupportedScheme(other.to_string())),
    }
}

async fn validate_destination(dir: &Path) -> Result<(), JobError> {
    match tokio::fs::metadata(dir).await {
        Ok(m) if m.is_dir() => Ok(()),
        Ok(_) => Err(JobError::NotADirectory(dir.to_path_buf())),
        Err(_) => Err(JobError::MissingDestination(dir.to_path_buf())),
    }
}

/// `"Song | Channel"` -> `"Song"`.
pub fn clean_result_title(raw: &str) -> String {
    raw.split('|').next().unwrap_or_default().trim().to_string()
}
