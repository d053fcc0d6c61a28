use crate::core::model::JobRequest;
use crate::core::state::JobState;
use crate::plugins::registry::{EngineContext, MediaEngine};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;

/// Metadata-only pass run before the download starts.
///
/// Records the item count on multi-item jobs and returns the first title
/// for an early display. Never fails: an error, a timeout or a panic in the
/// probe leaves the total unknown.
/// Skipped entirely once a total is known.
pub async fn discover(
    engine: &dyn MediaEngine,
    req: &JobRequest,
    ctx: &EngineContext,
    state: &mut JobState,
) -> Option<String> {
    if state.total_items().is_some() {
        return None;
    }

    let guarded = AssertUnwindSafe(engine.probe(req, ctx)).catch_unwind();
    let probe = match tokio::time::timeout(ctx.probe_timeout, guarded).await {
        Ok(Ok(Ok(probe))) => probe,
        Ok(Ok(Err(e))) => {
            tracing::warn!(engine = engine.name(), error = %format!("{:#}", e), "probe failed, total unknown");
            return None;
        }
        Ok(Err(_)) => {
            tracing::warn!(engine = engine.name(), "probe panicked, total unknown");
            return None;
        }
        Err(_) => {
            tracing::warn!(engine = engine.name(), timeout = ?ctx.probe_timeout, "probe timed out, total unknown");
            return None;
        }
    };

    if state.is_multi_item() {
        if let Some(total) = probe.total_items {
            state.set_total_items(total);
            tracing::info!(total, "playlist size discovered");
        }
    }
    probe.first_title
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::registry::{EngineOutput, ProbeResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use url::Url;

    struct CountingProbe {
        calls: AtomicUsize,
        result: Option<ProbeResult>,
        delay: Duration,
        panics: bool,
    }

    #[async_trait]
    impl MediaEngine for CountingProbe {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn can_handle(&self, _url: &Url) -> u8 {
            1
        }

        async fn probe(&self, _req: &JobRequest, _ctx: &EngineContext) -> anyhow::Result<ProbeResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if self.panics {
                panic!("extractor blew up");
            }
            self.result.clone().ok_or_else(|| anyhow::anyhow!("network unreachable"))
        }

        async fn download(
            &self,
            _req: &JobRequest,
            _ctx: &EngineContext,
            _out: &mut dyn EngineOutput,
        ) -> anyhow::Result<String> {
            Ok(String::new())
        }
    }

    fn request(playlist: bool) -> JobRequest {
        JobRequest {
            source_url: "https://example.com/list".into(),
            destination: std::env::temp_dir(),
            quality: Default::default(),
            is_playlist: playlist,
            want_video: false,
        }
    }

    fn engine(result: Option<ProbeResult>) -> CountingProbe {
        CountingProbe {
            calls: AtomicUsize::new(0),
            result,
            delay: Duration::ZERO,
            panics: false,
        }
    }

    #[tokio::test]
    async fn records_total_for_playlists() {
        let e = engine(Some(ProbeResult { total_items: Some(4), first_title: Some("a".into()) }));
        let mut state = JobState::new(true);
        let title = discover(&e, &request(true), &EngineContext::default(), &mut state).await;
        assert_eq!(title.as_deref(), Some("a"));
        assert_eq!(state.total_items(), Some(4));
    }

    #[tokio::test]
    async fn single_item_keeps_title_only() {
        let e = engine(Some(ProbeResult { total_items: Some(4), first_title: Some("a".into()) }));
        let mut state = JobState::new(false);
        discover(&e, &request(false), &EngineContext::default(), &mut state).await;
        assert_eq!(state.total_items(), None);
    }

    #[tokio::test]
    async fn failure_degrades_to_unknown() {
        let e = engine(None);
        let mut state = JobState::new(true);
        let title = discover(&e, &request(true), &EngineContext::default(), &mut state).await;
        assert_eq!(title, None);
        assert_eq!(state.total_items(), None);
    }

    #[tokio::test]
    async fn panic_degrades_to_unknown() {
        let mut e = engine(Some(ProbeResult { total_items: Some(4), first_title: Some("a".into()) }));
        e.panics = true;
        let mut state = JobState::new(true);
        let title = discover(&e, &request(true), &EngineContext::default(), &mut state).await;
        assert_eq!(title, None);
        assert_eq!(state.total_items(), None);
        assert_eq!(e.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn timeout_degrades_to_unknown() {
        let mut e = engine(Some(ProbeResult { total_items: Some(2), first_title: None }));
        e.delay = Duration::from_secs(5);
        let ctx = EngineContext { probe_timeout: Duration::from_millis(20), ..Default::default() };
        let mut state = JobState::new(true);
        discover(&e, &request(true), &ctx, &mut state).await;
        assert_eq!(state.total_items(), None);
    }

    #[tokio::test]
    async fn known_total_is_not_probed_again() {
        let e = engine(Some(ProbeResult { total_items: Some(9), first_title: None }));
        let mut state = JobState::new(true);
        state.set_total_items(3);
        discover(&e, &request(true), &EngineContext::default(), &mut state).await;
        assert_eq!(e.calls.load(Ordering::SeqCst), 0);
        assert_eq!(state.total_items(), Some(3));
    }
}
