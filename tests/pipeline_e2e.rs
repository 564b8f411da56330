// tests/pipeline_e2e.rs
// Full pipeline runs against mock sources: fetch → normalize → score →
// dedup/rank, including partial-failure and run-timeout behavior.

use anyhow::Context;
use async_trait::async_trait;
use std::sync::Arc;

use subsidy_finder::config::Config;
use subsidy_finder::fetch::types::{FetchError, FundingSource};
use subsidy_finder::record::RawRecord;
use subsidy_finder::score::Scorer;

const TEST_CONFIG: &str = r#"
[keywords]
terms = ["AI", "clinical chemistry", "diagnostics"]

[scoring]
min_score = 3.0
match_mode = "substring"
deadline_bonus = 0.5
deadline_window_days = 90

[scoring.weights]
title = 3.0
description = 2.0
research_areas = 1.5
eligibility = 1.0

[fetch]
max_parallel = 4
request_delay_ms = 10
max_attempts = 3
backoff_base_ms = 10
run_timeout_secs = 30
"#;

fn config() -> Config {
    let cfg = Config::from_toml_str(TEST_CONFIG).unwrap();
    cfg.validate().unwrap();
    cfg
}

struct StaticSource {
    id: &'static str,
    records: Vec<RawRecord>,
}

#[async_trait]
impl FundingSource for StaticSource {
    fn id(&self) -> &str {
        self.id
    }
    fn name(&self) -> &str {
        self.id
    }
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        Ok(self.records.clone())
    }
}

struct AlwaysTimesOut;

#[async_trait]
impl FundingSource for AlwaysTimesOut {
    fn id(&self) -> &str {
        "horizon_europe"
    }
    fn name(&self) -> &str {
        "Horizon Europe"
    }
    async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
        Err(FetchError::Timeout)
    }
}

fn listing(source: &str, title: &str, description: &str, url: &str) -> RawRecord {
    RawRecord {
        source: source.into(),
        title: title.into(),
        description: description.into(),
        url: url.into(),
        ..Default::default()
    }
}

fn static_source(id: &'static str, records: Vec<RawRecord>) -> Arc<dyn FundingSource> {
    Arc::new(StaticSource { id, records })
}

#[tokio::test(start_paused = true)]
async fn one_source_timing_out_on_every_retry_does_not_spoil_the_run() {
    let cfg = config();
    let scorer = Scorer::from_config(&cfg).unwrap();

    let sources: Vec<Arc<dyn FundingSource>> = vec![
        static_source(
            "nwo",
            vec![listing(
                "nwo",
                "AI subsidy for clinical chemistry labs",
                "Machine learning in diagnostics",
                "https://nwo.test/ai-labs",
            )],
        ),
        static_source(
            "zonmw",
            vec![listing(
                "zonmw",
                "Diagnostics innovation call",
                "",
                "https://zonmw.test/diagnostics",
            )],
        ),
        static_source("rvo", vec![]),
        static_source(
            "health_holland",
            vec![listing(
                "health_holland",
                "General farming grant",
                "no relevant topics here",
                "https://hh.test/farming",
            )],
        ),
        Arc::new(AlwaysTimesOut),
    ];

    let report = subsidy_finder::pipeline::run(&cfg, &scorer, sources).await;

    // The timing-out source was retried to exhaustion and reported once.
    assert_eq!(report.summary.failed_sources(), 1);
    let failed = report
        .summary
        .sources
        .iter()
        .find(|s| s.failure.is_some())
        .unwrap();
    assert_eq!(failed.source, "horizon_europe");
    assert_eq!(failed.attempts, 3);

    // The remaining four sources still produced a non-empty ranked result.
    assert!(!report.ranked.is_empty());
    let titles: Vec<&str> = report.ranked.iter().map(|r| r.record.title.as_str()).collect();
    assert!(titles.contains(&"AI subsidy for clinical chemistry labs"));
    assert!(titles.contains(&"Diagnostics innovation call"));
    assert!(!titles.contains(&"General farming grant"), "below threshold");
}

#[tokio::test(start_paused = true)]
async fn duplicate_listing_across_sources_appears_once_with_higher_score() {
    let cfg = config();
    let scorer = Scorer::from_config(&cfg).unwrap();
    let url = "https://shared.test/ai-health-grant-2025";

    // Same call listed by two sources; zonmw's copy carries a richer
    // description and therefore scores higher.
    let sources: Vec<Arc<dyn FundingSource>> = vec![
        static_source(
            "nwo",
            vec![listing("nwo", "AI Health Grant 2025", "", url)],
        ),
        static_source(
            "zonmw",
            vec![listing(
                "zonmw",
                "AI Health Grant 2025",
                "AI for diagnostics",
                url,
            )],
        ),
    ];

    let report = subsidy_finder::pipeline::run(&cfg, &scorer, sources).await;
    assert_eq!(report.ranked.len(), 1);
    assert_eq!(report.summary.duplicates_merged, 1);
    assert_eq!(report.ranked[0].record.source, "zonmw");
}

#[tokio::test(start_paused = true)]
async fn all_sources_failing_completes_with_empty_result_and_full_summary() {
    let cfg = config();
    let scorer = Scorer::from_config(&cfg).unwrap();

    struct Blocked(&'static str);
    #[async_trait]
    impl FundingSource for Blocked {
        fn id(&self) -> &str {
            self.0
        }
        fn name(&self) -> &str {
            self.0
        }
        async fn fetch(&self) -> Result<Vec<RawRecord>, FetchError> {
            Err(FetchError::Blocked(403))
        }
    }

    let sources: Vec<Arc<dyn FundingSource>> =
        vec![Arc::new(Blocked("nwo")), Arc::new(Blocked("rvo"))];

    let report = subsidy_finder::pipeline::run(&cfg, &scorer, sources).await;
    assert!(report.ranked.is_empty());
    assert_eq!(report.summary.failed_sources(), 2);
    assert_eq!(report.summary.sources.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn exported_csv_lists_ranked_records() -> anyhow::Result<()> {
    let cfg = config();
    let scorer = Scorer::from_config(&cfg).unwrap();

    let sources: Vec<Arc<dyn FundingSource>> = vec![static_source(
        "nwo",
        vec![listing(
            "nwo",
            "AI subsidy for labs",
            "diagnostics with machine learning",
            "https://nwo.test/1",
        )],
    )];

    let report = subsidy_finder::pipeline::run(&cfg, &scorer, sources).await;
    let dir = tempfile::tempdir().context("tempdir")?;
    let path = subsidy_finder::report::export_csv(&report, dir.path())?;
    let content = std::fs::read_to_string(&path)?;
    assert!(content.lines().count() >= 2, "header plus one row");
    assert!(content.contains("AI subsidy for labs"));
    Ok(())
}
