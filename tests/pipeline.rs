//! End-to-end pipeline runs over stub collaborators.

use std::{
    collections::HashSet,
    sync::Arc,
    time::{Duration, Instant},
};

use clipscout::{
    http::RetryPolicy,
    outside::{MediaFetcher, VideoSearch},
    pipeline::{Pipeline, PipelineConfig},
    proxy::ProxyPool,
    result::{Error, Result},
    scheduler::{DownloadScheduler, SchedulerConfig},
    selector::{SegmentSelector, SelectorConfig},
    services::{Embedder, UniquenessFilter},
    types::{Candidate, EmbeddingResult, LocalMedia, SegmentWindow},
};

struct StubSearch {
    results: Vec<Candidate>,
    fail: bool,
}

impl VideoSearch for StubSearch {
    fn search(&self, _query: &str, max_results: usize) -> Result<Vec<Candidate>> {
        if self.fail {
            return Err(Error::CollaboratorUnavailable {
                service: "search",
                report: miette::miette!("index down"),
            });
        }
        Ok(self.results.iter().take(max_results).cloned().collect())
    }
}

struct StubDedup {
    unique_ids: Vec<String>,
    fail: bool,
}

impl UniquenessFilter for StubDedup {
    fn filter_unique(&self, _ids: &[String]) -> Result<Vec<String>> {
        if self.fail {
            return Err(Error::CollaboratorUnavailable {
                service: "dedup-registry",
                report: miette::miette!("timed out"),
            });
        }
        Ok(self.unique_ids.clone())
    }

    fn exists(&self, id: &str) -> Result<bool> {
        Ok(!self.unique_ids.contains(&id.to_string()))
    }
}

struct StubFetcher {
    fail_ids: HashSet<String>,
    fail_all: bool,
    duration: f64,
    clip_delay: Duration,
}

impl StubFetcher {
    fn healthy() -> Self {
        Self {
            fail_ids: HashSet::new(),
            fail_all: false,
            duration: 90.0,
            clip_delay: Duration::ZERO,
        }
    }

    fn failing_ids(ids: &[&str]) -> Self {
        Self {
            fail_ids: ids.iter().map(|s| s.to_string()).collect(),
            ..Self::healthy()
        }
    }

    fn outage() -> Self {
        Self {
            fail_all: true,
            ..Self::healthy()
        }
    }

    fn slow_clips(delay: Duration) -> Self {
        Self {
            clip_delay: delay,
            ..Self::healthy()
        }
    }
}

impl MediaFetcher for StubFetcher {
    fn fetch(
        &self,
        video_id: &str,
        _start: f64,
        _end: f64,
        _proxy: Option<&str>,
    ) -> Result<LocalMedia> {
        if self.fail_all || self.fail_ids.contains(video_id) {
            return Err(Error::CollaboratorUnavailable {
                service: "yt-dlp",
                report: miette::miette!("download of '{video_id}' failed"),
            });
        }
        Ok(LocalMedia::new(tempfile::NamedTempFile::new().unwrap()))
    }

    fn probe_duration(&self, _media: &LocalMedia) -> Result<f64> {
        Ok(self.duration)
    }

    fn clip(&self, _media: &LocalMedia, _window: SegmentWindow) -> Result<LocalMedia> {
        std::thread::sleep(self.clip_delay);
        Ok(LocalMedia::new(tempfile::NamedTempFile::new().unwrap()))
    }
}

struct StubEmbedder;

impl Embedder for StubEmbedder {
    fn embed(&self, _description: &str, _media: &LocalMedia) -> Result<EmbeddingResult> {
        Ok(EmbeddingResult::new(
            vec![0.1, 0.2, 0.3],
            vec![1.0, 0.0],
            vec![0.5, 0.5],
        ))
    }
}

fn candidates(n: usize) -> Vec<Candidate> {
    (0..n)
        .map(|i| Candidate {
            id: format!("v{i}"),
            title: format!("video {i}"),
            description: format!("description {i}"),
            views: i as u64,
            duration: 60.0,
        })
        .collect()
}

fn pipeline_with(
    search: StubSearch,
    dedup: StubDedup,
    fetcher: StubFetcher,
    select_deadline: Duration,
) -> Pipeline {
    let fetcher: Arc<dyn MediaFetcher> = Arc::new(fetcher);

    let scheduler = DownloadScheduler::new(
        fetcher.clone(),
        Arc::new(ProxyPool::disabled()),
        SchedulerConfig {
            max_candidates: 10,
            workers: 8,
            max_clip_secs: 300.0,
            retry: RetryPolicy::new(1, Duration::ZERO),
        },
    );
    let selector = SegmentSelector::new(
        fetcher,
        Arc::new(StubEmbedder),
        SelectorConfig {
            max_segment_secs: 120.0,
            max_segments: 5,
        },
    );

    Pipeline::new(
        Arc::new(search),
        Arc::new(dedup),
        scheduler,
        Arc::new(selector),
        PipelineConfig {
            oversample_factor: 10,
            min_unique: 8,
            candidate_cap: 16,
            download_target: 8,
            download_deadline: Duration::from_secs(10),
            select_deadline,
            select_workers: 8,
        },
    )
}

fn pipeline(search: StubSearch, dedup: StubDedup, fetcher: StubFetcher) -> Pipeline {
    pipeline_with(search, dedup, fetcher, Duration::from_secs(60))
}

#[test]
fn full_run_caps_and_deduplicates_the_result_set() {
    // 40 distinct candidates, 10 confirmed unique, 4 of those fail to
    // download, so 6 make it through selection and 4 are kept.
    let unique_ids: Vec<String> = (0..10).map(|i| format!("v{i}")).collect();

    let pipeline = pipeline(
        StubSearch {
            results: candidates(40),
            fail: false,
        },
        StubDedup {
            unique_ids: unique_ids.clone(),
            fail: false,
        },
        StubFetcher::failing_ids(&["v1", "v2", "v3", "v4"]),
    );

    let outcome = pipeline.run("cats playing", 4);

    assert_eq!(outcome.records.len(), 4);
    assert_eq!(outcome.stats.searched, 40);
    assert_eq!(outcome.stats.unique_confirmed, 10);
    assert_eq!(outcome.stats.selected_candidates, 10);
    assert_eq!(outcome.stats.downloaded, 6);

    let ids: HashSet<_> = outcome.records.iter().map(|r| r.video_id.clone()).collect();
    assert_eq!(ids.len(), 4, "result ids must be pairwise distinct");
    for record in &outcome.records {
        assert!(unique_ids.contains(&record.video_id));
        assert!(!record.video_emb.is_empty());
        assert!(!record.audio_emb.is_empty());
        assert!(!record.description_emb.is_empty());
        assert!(record.start_secs < record.end_secs);
    }
}

#[test]
fn dedup_outage_degrades_to_all_unique() {
    let pipeline = pipeline(
        StubSearch {
            results: candidates(20),
            fail: false,
        },
        StubDedup {
            unique_ids: vec![],
            fail: true,
        },
        StubFetcher::healthy(),
    );

    let outcome = pipeline.run("cats playing", 4);

    assert_eq!(outcome.records.len(), 4);
    assert_eq!(outcome.stats.unique_confirmed, 20);
}

#[test]
fn download_outage_yields_an_empty_result_set() {
    let pipeline = pipeline(
        StubSearch {
            results: candidates(20),
            fail: false,
        },
        StubDedup {
            unique_ids: (0..20).map(|i| format!("v{i}")).collect(),
            fail: false,
        },
        StubFetcher::outage(),
    );

    let outcome = pipeline.run("cats playing", 4);

    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stats.downloaded, 0);
}

#[test]
fn search_outage_yields_an_empty_result_set() {
    let pipeline = pipeline(
        StubSearch {
            results: vec![],
            fail: true,
        },
        StubDedup {
            unique_ids: vec![],
            fail: false,
        },
        StubFetcher::healthy(),
    );

    let outcome = pipeline.run("cats playing", 4);
    assert!(outcome.records.is_empty());
    assert_eq!(outcome.stats.searched, 0);
}

#[test]
fn wedged_selection_is_abandoned_at_the_phase_deadline() {
    // Every clip call hangs far longer than the selection budget. The run
    // must still return shortly after the deadline, without any records,
    // instead of waiting out the stuck workers.
    let pipeline = pipeline_with(
        StubSearch {
            results: candidates(20),
            fail: false,
        },
        StubDedup {
            unique_ids: (0..20).map(|i| format!("v{i}")).collect(),
            fail: false,
        },
        StubFetcher::slow_clips(Duration::from_secs(8)),
        Duration::from_millis(300),
    );

    let started = Instant::now();
    let outcome = pipeline.run("cats playing", 4);

    assert!(
        started.elapsed() < Duration::from_secs(3),
        "run took {:.1?}",
        started.elapsed()
    );
    assert!(outcome.records.is_empty());
    assert!(outcome.stats.downloaded > 0);
}

#[test]
fn never_returns_more_than_requested() {
    let pipeline = pipeline(
        StubSearch {
            results: candidates(40),
            fail: false,
        },
        StubDedup {
            unique_ids: (0..40).map(|i| format!("v{i}")).collect(),
            fail: false,
        },
        StubFetcher::healthy(),
    );

    let outcome = pipeline.run("cats playing", 2);
    assert!(outcome.records.len() <= 2);
}
