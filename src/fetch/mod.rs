// src/fetch/mod.rs
//! Fetch coordinator: runs all configured sources concurrently with bounded
//! parallelism, per-source politeness delays, retry-on-transient-failure, and
//! an overall run timeout. A single source failing never aborts the others;
//! every source ends up with exactly one [`SourceReport`].

pub mod sources;
pub mod types;

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::FetchSection;
use crate::fetch::types::{FetchError, FundingSource, SourceReport};

/// Fetch from all sources. Resolves when every source has finished or the
/// run timeout expires, whichever comes first; sources still pending at the
/// deadline are cancelled and reported as [`FetchError::RunExpired`].
pub async fn fetch_all(
    sources: Vec<Arc<dyn FundingSource>>,
    cfg: &FetchSection,
) -> Vec<SourceReport> {
    let deadline = Instant::now() + cfg.run_timeout();
    let semaphore = Arc::new(Semaphore::new(cfg.max_parallel));

    let mut set: JoinSet<(usize, SourceReport)> = JoinSet::new();
    for (idx, source) in sources.iter().enumerate() {
        let source = Arc::clone(source);
        let semaphore = Arc::clone(&semaphore);
        let cfg = cfg.clone();
        set.spawn(async move {
            // The semaphore is never closed, so this always yields a permit.
            let _permit = semaphore.acquire_owned().await.ok();
            let report = fetch_one(source.as_ref(), &cfg).await;
            (idx, report)
        });
    }

    // Each task writes only its own slot; order of completion does not matter.
    let mut slots: Vec<Option<SourceReport>> = Vec::new();
    slots.resize_with(sources.len(), || None);

    while !set.is_empty() {
        match tokio::time::timeout_at(deadline, set.join_next()).await {
            Ok(Some(Ok((idx, report)))) => slots[idx] = Some(report),
            Ok(Some(Err(join_err))) => {
                warn!(error = %join_err, "fetch task aborted unexpectedly");
            }
            Ok(None) => break,
            Err(_) => {
                warn!("run timeout expired; cancelling pending sources");
                set.abort_all();
                // Tasks that finished before the abort still have their
                // results queued; drain them instead of dropping them.
                while let Some(joined) = set.join_next().await {
                    if let Ok((idx, report)) = joined {
                        slots[idx] = Some(report);
                    }
                }
                break;
            }
        }
    }

    slots
        .into_iter()
        .enumerate()
        .map(|(idx, slot)| {
            slot.unwrap_or_else(|| SourceReport {
                source: sources[idx].id().to_string(),
                attempts: 0,
                result: Err(FetchError::RunExpired),
            })
        })
        .collect()
}

/// Fetch one source with retries. The politeness delay is observed before
/// every request, retries included; backoff grows linearly with the attempt
/// number. Non-transient failures stop immediately.
async fn fetch_one(source: &dyn FundingSource, cfg: &FetchSection) -> SourceReport {
    let mut attempts = 0;
    let result = loop {
        attempts += 1;
        tokio::time::sleep(cfg.request_delay()).await;

        match source.fetch().await {
            Ok(mut records) => {
                for rec in &mut records {
                    if rec.source_name.is_empty() {
                        rec.source_name = source.name().to_string();
                    }
                }
                info!(source = source.id(), records = records.len(), attempts, "source fetched");
                break Ok(records);
            }
            Err(e) if e.is_transient() && attempts < cfg.max_attempts => {
                warn!(source = source.id(), attempt = attempts, error = %e, "transient failure, retrying");
                tokio::time::sleep(cfg.backoff_for_attempt(attempts)).await;
            }
            Err(e) => {
                warn!(source = source.id(), attempts, error = %e, "source failed");
                break Err(e);
            }
        }
    };

    SourceReport {
        source: source.id().to_string(),
        attempts,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::record::RawRecord;

    fn quick_cfg() -> FetchSection {
        FetchSection {
            max_parallel: 4,
            request_delay_ms: 10,
            max_attempts: 3,
            backoff_base_ms: 10,
            run_timeout_secs: 60,
            user_agent: "test".into(),
        }
    }

    struct FlakySource {
        id: &'static str,
        failures_before_success: u32,
        error: FetchError,
        calls: AtomicU32,
    }

    impl FlakySource {
        fn new(id: &'static str, failures: u32, error: FetchError) -> Self {
            Self {
                id,
                failures_before_success: failures,
                error,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl FundingSource for FlakySource {
        fn id(&self) -> &str {
            self.id
        }
        fn name(&self) -> &str {
            "Mock Funding Body"
        }
        async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures_before_success {
                return Err(self.error.clone());
            }
            Ok(vec![RawRecord {
                source: self.id.to_string(),
                title: format!("{} call", self.id),
                url: format!("https://{}.test/call", self.id),
                ..Default::default()
            }])
        }
    }

    struct HangingSource;

    #[async_trait]
    impl FundingSource for HangingSource {
        fn id(&self) -> &str {
            "hanging"
        }
        fn name(&self) -> &str {
            "hanging"
        }
        async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
            tokio::time::sleep(std::time::Duration::from_secs(3600)).await;
            Ok(vec![])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let src = Arc::new(FlakySource::new("nwo", 2, FetchError::Server(503)));
        let reports = fetch_all(vec![src.clone() as Arc<dyn FundingSource>], &quick_cfg()).await;
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].attempts, 3);
        assert_eq!(reports[0].record_count(), 1);
        assert_eq!(src.calls.load(Ordering::SeqCst), 3);

        // Records get the organization name stamped on the way out.
        let records = reports[0].result.as_ref().unwrap();
        assert_eq!(records[0].source_name, "Mock Funding Body");
    }

    #[tokio::test(start_paused = true)]
    async fn permanent_failures_are_not_retried() {
        let src = Arc::new(FlakySource::new("rvo", 99, FetchError::Blocked(403)));
        let reports = fetch_all(vec![src.clone() as Arc<dyn FundingSource>], &quick_cfg()).await;
        assert_eq!(reports[0].attempts, 1);
        assert_eq!(reports[0].result, Err(FetchError::Blocked(403)));
        assert_eq!(src.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn one_failing_source_does_not_abort_the_others() {
        let ok = Arc::new(FlakySource::new("nwo", 0, FetchError::Timeout));
        let bad = Arc::new(FlakySource::new("zonmw", 99, FetchError::Timeout));
        let reports = fetch_all(
            vec![
                ok as Arc<dyn FundingSource>,
                bad as Arc<dyn FundingSource>,
            ],
            &quick_cfg(),
        )
        .await;
        assert_eq!(reports[0].record_count(), 1);
        assert!(reports[1].result.is_err());
        assert_eq!(reports[1].attempts, 3, "timeout retried to exhaustion");
    }

    struct SlowSource {
        id: &'static str,
        delay: std::time::Duration,
    }

    #[async_trait]
    impl FundingSource for SlowSource {
        fn id(&self) -> &str {
            self.id
        }
        fn name(&self) -> &str {
            self.id
        }
        async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
            tokio::time::sleep(self.delay).await;
            Ok(vec![RawRecord {
                source: self.id.to_string(),
                title: format!("{} call", self.id),
                url: format!("https://{}.test/call", self.id),
                ..Default::default()
            }])
        }
    }

    #[tokio::test(start_paused = true)]
    async fn run_timeout_cancels_pending_sources_but_keeps_finished_ones() {
        let mut cfg = quick_cfg();
        cfg.run_timeout_secs = 5;
        let fast = Arc::new(FlakySource::new("nwo", 0, FetchError::Timeout));
        // Finishes just inside the deadline; its records must survive.
        let late = Arc::new(SlowSource {
            id: "zonmw",
            delay: std::time::Duration::from_millis(4_500),
        });
        let slow = Arc::new(HangingSource);
        let reports = fetch_all(
            vec![
                fast as Arc<dyn FundingSource>,
                late as Arc<dyn FundingSource>,
                slow as Arc<dyn FundingSource>,
            ],
            &cfg,
        )
        .await;
        assert_eq!(reports[0].record_count(), 1);
        assert_eq!(reports[1].record_count(), 1, "finished before the deadline");
        assert_eq!(reports[2].result, Err(FetchError::RunExpired));
        assert_eq!(reports[2].source, "hanging");
    }

    #[tokio::test(start_paused = true)]
    async fn parallelism_is_bounded() {
        struct CountingSource {
            id: String,
            active: Arc<AtomicU32>,
            peak: Arc<AtomicU32>,
        }

        #[async_trait]
        impl FundingSource for CountingSource {
            fn id(&self) -> &str {
                &self.id
            }
            fn name(&self) -> &str {
                &self.id
            }
            async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
                let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
                self.peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                self.active.fetch_sub(1, Ordering::SeqCst);
                Ok(vec![])
            }
        }

        let active = Arc::new(AtomicU32::new(0));
        let peak = Arc::new(AtomicU32::new(0));
        let mut cfg = quick_cfg();
        cfg.max_parallel = 2;

        let sources: Vec<Arc<dyn FundingSource>> = (0..6)
            .map(|i| {
                Arc::new(CountingSource {
                    id: format!("src{i}"),
                    active: Arc::clone(&active),
                    peak: Arc::clone(&peak),
                }) as Arc<dyn FundingSource>
            })
            .collect();

        let reports = fetch_all(sources, &cfg).await;
        assert_eq!(reports.len(), 6);
        assert!(peak.load(Ordering::SeqCst) <= 2, "semaphore must bound concurrency");
    }
}
