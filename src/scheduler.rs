use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, RecvTimeoutError};
use tracing::{debug, info, warn};

use crate::{
    http::RetryPolicy,
    outside::MediaFetcher,
    proxy::ProxyPool,
    result::Error,
    types::{Candidate, LocalMedia},
};

#[derive(Debug, Clone, Copy)]
pub struct SchedulerConfig {
    /// Hard cap on how many candidates are attempted, bounding fan-out.
    pub max_candidates: usize,
    /// Download worker pool size.
    pub workers: usize,
    /// Longest section requested per video, in seconds.
    pub max_clip_secs: f64,
    /// Per-candidate retry budget, fresh proxy each attempt.
    pub retry: RetryPolicy,
}

/// Turns a ranked candidate list into a bounded set of local media clips
/// under a global time budget, never assuming all downloads succeed.
pub struct DownloadScheduler {
    fetcher: Arc<dyn MediaFetcher>,
    proxies: Arc<ProxyPool>,
    config: SchedulerConfig,
}

impl DownloadScheduler {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        proxies: Arc<ProxyPool>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            fetcher,
            proxies,
            config,
        }
    }

    /// Download up to `target` candidates within `deadline`.
    ///
    /// Returns as soon as `target` downloads succeeded, when every task is
    /// accounted for, or when the deadline fires. Tasks still running at
    /// that point are abandoned, not cancelled: in-flight downloads finish
    /// on their own but their results are discarded when the result channel
    /// closes, which also releases their media files. Queued tasks are
    /// drained and never started.
    ///
    /// A partial or empty map is a valid, non-error result.
    pub fn schedule(
        &self,
        candidates: &[Candidate],
        target: usize,
        deadline: Duration,
    ) -> HashMap<String, LocalMedia> {
        let mut downloaded = HashMap::new();
        if candidates.is_empty() || target == 0 {
            return downloaded;
        }

        let candidates = &candidates[..candidates.len().min(self.config.max_candidates)];
        let total = candidates.len();

        let (task_tx, task_rx) = bounded::<Candidate>(total);
        let (result_tx, result_rx) = bounded::<(String, crate::result::Result<LocalMedia>)>(total);
        for candidate in candidates {
            task_tx.send(candidate.clone()).unwrap();
        }
        drop(task_tx);

        let workers = self.config.workers.min(total);
        let stop = Arc::new(AtomicBool::new(false));
        debug!("Starting {workers} download workers for {total} candidates");
        for i in 0..workers {
            let task_rx = task_rx.clone();
            let result_tx = result_tx.clone();
            let fetcher = Arc::clone(&self.fetcher);
            let proxies = Arc::clone(&self.proxies);
            let retry = self.config.retry;
            let max_clip_secs = self.config.max_clip_secs;
            let stop = Arc::clone(&stop);

            // Detached on purpose: abandoned workers must not block the
            // deadline-bounded wait below.
            std::thread::Builder::new()
                .name(format!("download-{i}"))
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let Ok(candidate) = task_rx.recv() else {
                            break;
                        };
                        if stop.load(Ordering::Relaxed) {
                            break;
                        }
                        debug!("Downloading video {}", candidate.id);
                        let end = if candidate.duration > 0.0 {
                            candidate.duration.min(max_clip_secs)
                        } else {
                            max_clip_secs
                        };

                        let res = retry.run_with_resource(
                            || proxies.draw(),
                            |proxy| fetcher.fetch(&candidate.id, 0.0, end, proxy.as_deref()),
                        );

                        // A closed channel means the scheduler stopped
                        // waiting. Dropping the result here releases the
                        // media file of a too-late download.
                        if result_tx.send((candidate.id, res)).is_err() {
                            break;
                        }
                    }
                })
                .expect("Could not spawn download worker");
        }
        drop(result_tx);

        let hard_deadline = Instant::now() + deadline;
        let started = Instant::now();
        let mut failed = 0usize;

        loop {
            if downloaded.len() >= target {
                info!(
                    "Reached download target ({target}) in {:.1?}, abandoning the rest",
                    started.elapsed()
                );
                break;
            }
            if downloaded.len() + failed == total {
                break;
            }

            match result_rx.recv_deadline(hard_deadline) {
                Ok((id, Ok(media))) => {
                    debug!("Downloaded video {id} in {:.1?}", started.elapsed());
                    downloaded.insert(id, media);
                }
                Ok((id, Err(err))) => {
                    warn!("Download of video {id} failed: {err}");
                    failed += 1;
                }
                Err(RecvTimeoutError::Timeout) => {
                    let err = Error::DeadlineExceeded("download");
                    warn!(
                        "{err}: {} of {target} targets reached, abandoning pending tasks",
                        downloaded.len()
                    );
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        // Stop the pool: in-flight downloads finish on their own (and get
        // discarded through the closed result channel), but nothing queued
        // is picked up anymore.
        stop.store(true, Ordering::Relaxed);
        while task_rx.try_recv().is_ok() {}

        info!(
            "Download phase done: {} succeeded, {failed} failed, {} attempted",
            downloaded.len(),
            total
        );
        downloaded
    }
}
