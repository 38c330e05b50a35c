use std::{path::PathBuf, sync::Arc, time::Duration};

use clap::Parser;

use crate::{
    http::RetryPolicy,
    outside::MediaFetcher,
    pipeline::PipelineConfig,
    proxy::ProxyPool,
    scheduler::{DownloadScheduler, SchedulerConfig},
    selector::SelectorConfig,
    services::Embedder,
};

macro_rules! arg_env {
    ($v:literal) => {
        concat!("CLIPSCOUT_", $v)
    };
}

/// Parser for duration-like tunables where zero or less makes no sense.
fn positive_f64(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|err| format!("{err}"))?;
    if value > 0.0 {
        Ok(value)
    } else {
        Err(format!("must be a positive number of seconds, got {value}"))
    }
}

/// Acquire short video clips relevant to a text query, embed candidate
/// segments, and emit a bounded, deduplicated set of annotated records.
#[derive(Parser, Debug)]
pub struct Args {
    /// The text query to acquire clips for
    #[arg(env = arg_env!("QUERY"))]
    pub query: String,

    /// How many records to produce at most
    #[arg(long, default_value_t = 4, env = arg_env!("COUNT"))]
    pub count: usize,

    /// How many search results to request per requested record
    #[arg(long, default_value_t = 10, env = arg_env!("OVERSAMPLE"))]
    pub oversample_factor: usize,

    /// Minimum confirmed-unique candidates before dedup backfill kicks in
    #[arg(long, default_value_t = 8, env = arg_env!("MIN_UNIQUE"))]
    pub min_unique: usize,

    /// Post-dedup candidate set size cap
    #[arg(long, default_value_t = 16, env = arg_env!("CANDIDATE_CAP"))]
    pub candidate_cap: usize,

    /// Hard cap on download attempts per run
    #[arg(long, default_value_t = 10, env = arg_env!("MAX_DOWNLOADS"))]
    pub max_downloads: usize,

    /// Stop the download phase once this many downloads succeeded
    #[arg(long, default_value_t = 8, env = arg_env!("DOWNLOAD_TARGET"))]
    pub download_target: usize,

    /// Download phase wall-clock budget, in seconds
    #[arg(long, default_value_t = 35, env = arg_env!("DOWNLOAD_DEADLINE_SECS"))]
    pub download_deadline_secs: u64,

    /// Download worker pool size
    #[arg(long, default_value_t = 10, env = arg_env!("DOWNLOAD_WORKERS"))]
    pub download_workers: usize,

    /// Segment-selection phase wall-clock budget, in seconds
    #[arg(long, default_value_t = 120, env = arg_env!("SELECT_DEADLINE_SECS"))]
    pub select_deadline_secs: u64,

    /// Segment-selection worker pool size
    #[arg(long, default_value_t = 8, env = arg_env!("SELECT_WORKERS"))]
    pub select_workers: usize,

    /// Download attempts per candidate, each with a fresh proxy
    #[arg(long, default_value_t = 3, env = arg_env!("FETCH_ATTEMPTS"))]
    pub fetch_attempts: usize,

    /// Longest section fetched per video, in seconds
    #[arg(
        long,
        default_value_t = 300.0,
        value_parser = positive_f64,
        env = arg_env!("MAX_CLIP_SECS")
    )]
    pub max_clip_secs: f64,

    /// Longest candidate segment window, in seconds
    #[arg(
        long,
        default_value_t = 120.0,
        value_parser = positive_f64,
        env = arg_env!("MAX_SEGMENT_SECS")
    )]
    pub max_segment_secs: f64,

    /// Most segment windows evaluated per video
    #[arg(long, default_value_t = 5, env = arg_env!("MAX_SEGMENTS"))]
    pub max_segments: usize,

    /// Base URL of the dedup registry service
    #[arg(long, default_value = "http://localhost:8000", env = arg_env!("DEDUP_URL"))]
    pub dedup_url: String,

    /// URL of the embedding service endpoint
    #[arg(long, default_value = "http://localhost:8888/embed", env = arg_env!("EMBED_URL"))]
    pub embed_url: String,

    /// Newline-delimited list of egress proxies, one `host:port` per line.
    /// Downloads egress directly when not set
    #[arg(long, env = arg_env!("PROXY_FILE"))]
    pub proxy_file: Option<PathBuf>,

    /// How often to re-read the proxy file, in seconds
    #[arg(long, default_value_t = 900, env = arg_env!("PROXY_REFRESH_SECS"))]
    pub proxy_refresh_secs: u64,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", env = arg_env!("LOG"))]
    pub log_level: tracing::Level,
}

impl Args {
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            oversample_factor: self.oversample_factor,
            min_unique: self.min_unique,
            candidate_cap: self.candidate_cap,
            download_target: self.download_target,
            download_deadline: Duration::from_secs(self.download_deadline_secs),
            select_deadline: Duration::from_secs(self.select_deadline_secs),
            select_workers: self.select_workers,
        }
    }

    pub fn scheduler(
        &self,
        fetcher: Arc<dyn MediaFetcher>,
        proxies: Arc<ProxyPool>,
    ) -> DownloadScheduler {
        DownloadScheduler::new(
            fetcher,
            proxies,
            SchedulerConfig {
                max_candidates: self.max_downloads,
                workers: self.download_workers,
                max_clip_secs: self.max_clip_secs,
                retry: RetryPolicy::new(self.fetch_attempts, Duration::from_millis(500)),
            },
        )
    }

    pub fn selector(
        &self,
        fetcher: Arc<dyn MediaFetcher>,
        embedder: Arc<dyn Embedder>,
    ) -> crate::selector::SegmentSelector {
        crate::selector::SegmentSelector::new(
            fetcher,
            embedder,
            SelectorConfig {
                max_segment_secs: self.max_segment_secs,
                max_segments: self.max_segments,
            },
        )
    }
}
