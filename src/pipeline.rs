use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::{Duration, Instant},
};

use crossbeam_channel::{bounded, RecvTimeoutError};
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{
    outside::VideoSearch,
    result::Error,
    scheduler::DownloadScheduler,
    selector::SegmentSelector,
    services::{select_candidates, UniquenessFilter},
    types::{Candidate, LocalMedia, VideoRecord},
};

#[derive(Debug, Clone, Copy)]
pub struct PipelineConfig {
    /// How many candidates to request per requested record.
    pub oversample_factor: usize,
    /// Minimum confirmed-unique candidates before backfill kicks in.
    pub min_unique: usize,
    /// Post-filter candidate set size cap.
    pub candidate_cap: usize,
    /// How many downloads to aim for per run.
    pub download_target: usize,
    /// Wall-clock budget of the download phase.
    pub download_deadline: Duration,
    /// Wall-clock budget of the segment-selection phase.
    pub select_deadline: Duration,
    /// Segment-selection worker pool size.
    pub select_workers: usize,
}

/// Per-phase counters, reported for observability.
#[derive(Debug, Default, Clone, Copy, Serialize)]
pub struct RunStats {
    pub searched: usize,
    pub unique_confirmed: usize,
    pub selected_candidates: usize,
    pub downloaded: usize,
    pub records: usize,
}

pub struct RunOutcome {
    pub records: Vec<VideoRecord>,
    pub stats: RunStats,
}

/// Top-level entry point composing one query-scoped run:
/// search → dedup → bounded downloads → per-video segment selection →
/// bounded, deduplicated result assembly.
///
/// Individual candidate failures are absorbed and logged at each phase
/// boundary; the run always produces a (possibly empty) result set.
pub struct Pipeline {
    search: Arc<dyn VideoSearch>,
    dedup: Arc<dyn UniquenessFilter>,
    scheduler: DownloadScheduler,
    selector: Arc<SegmentSelector>,
    config: PipelineConfig,
}

impl Pipeline {
    pub fn new(
        search: Arc<dyn VideoSearch>,
        dedup: Arc<dyn UniquenessFilter>,
        scheduler: DownloadScheduler,
        selector: Arc<SegmentSelector>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            search,
            dedup,
            scheduler,
            selector,
            config,
        }
    }

    /// Run the whole pipeline for one query.
    ///
    /// Returns at most `requested` records with pairwise distinct video
    /// ids, ordered by segment-selection completion. Fewer records than
    /// requested (down to zero) is a valid outcome, not an error.
    pub fn run(&self, query: &str, requested: usize) -> RunOutcome {
        let mut stats = RunStats::default();

        // Searching
        let candidates = match self
            .search
            .search(query, requested * self.config.oversample_factor)
        {
            Ok(candidates) => candidates,
            Err(err) => {
                error!("Search failed, nothing to acquire: {err}");
                return RunOutcome {
                    records: vec![],
                    stats,
                };
            }
        };
        stats.searched = candidates.len();
        info!("Got {} search results", candidates.len());

        // Deduping. A dead registry never blocks the run: degrade to
        // treating every candidate as unique.
        let ids: Vec<String> = candidates.iter().map(|c| c.id.clone()).collect();
        let unique_ids: HashSet<String> = match self.dedup.filter_unique(&ids) {
            Ok(unique) => {
                stats.unique_confirmed = unique.len();
                unique.into_iter().collect()
            }
            Err(err) => {
                warn!("Dedup registry unavailable, treating all candidates as unique: {err}");
                stats.unique_confirmed = ids.len();
                ids.into_iter().collect()
            }
        };
        let selected = select_candidates(
            candidates,
            &unique_ids,
            self.config.min_unique,
            self.config.candidate_cap,
        );
        stats.selected_candidates = selected.len();
        info!(
            "{} candidates after dedup ({} confirmed unique)",
            selected.len(),
            stats.unique_confirmed
        );

        // Downloading
        let mut downloaded = self.scheduler.schedule(
            &selected,
            self.config.download_target,
            self.config.download_deadline,
        );
        stats.downloaded = downloaded.len();

        // Selecting. The scheduler map is keyed by id, so each video is
        // selected at most once per run.
        let jobs: Vec<(Candidate, LocalMedia)> = selected
            .into_iter()
            .filter_map(|candidate| {
                downloaded
                    .remove(&candidate.id)
                    .map(|media| (candidate, media))
            })
            .collect();
        let records = self.select_all(jobs, self.config.select_deadline);
        stats.records = records.len().min(requested);

        info!(
            "Run complete: {} searched, {} unique, {} selected, {} downloaded, {} records",
            stats.searched,
            stats.unique_confirmed,
            stats.selected_candidates,
            stats.downloaded,
            stats.records
        );

        let mut records = records;
        records.truncate(requested);
        RunOutcome { records, stats }
    }

    /// Run segment selection over all downloaded clips under a bounded
    /// worker pool and a wall-clock budget, collecting successes in
    /// completion order.
    ///
    /// Like the download phase, workers still running when the deadline
    /// fires are abandoned, not cancelled: undispatched jobs are drained
    /// (releasing their media files) and late results are discarded when
    /// the record channel closes.
    fn select_all(
        &self,
        jobs: Vec<(Candidate, LocalMedia)>,
        deadline: Duration,
    ) -> Vec<VideoRecord> {
        if jobs.is_empty() {
            return vec![];
        }

        let total = jobs.len();
        let (job_tx, job_rx) = bounded(total);
        let (record_tx, record_rx) = bounded::<Option<VideoRecord>>(total);
        for job in jobs {
            job_tx.send(job).unwrap();
        }
        drop(job_tx);

        let workers = self.config.select_workers.min(total);
        let stop = Arc::new(AtomicBool::new(false));
        for i in 0..workers {
            let job_rx = job_rx.clone();
            let record_tx = record_tx.clone();
            let selector = Arc::clone(&self.selector);
            let stop = Arc::clone(&stop);

            // Detached on purpose: a wedged selection (a hung probe or
            // clip subprocess) must not block the deadline-bounded wait
            // below.
            std::thread::Builder::new()
                .name(format!("select-{i}"))
                .spawn(move || {
                    while !stop.load(Ordering::Relaxed) {
                        let Ok((candidate, media)) = job_rx.recv() else {
                            break;
                        };
                        if stop.load(Ordering::Relaxed) {
                            // Dropping the job here releases its media file
                            break;
                        }
                        let record = match selector.select_best(&candidate, media) {
                            Ok(record) => Some(record),
                            Err(err) => {
                                warn!("Dropping video {}: {err}", candidate.id);
                                None
                            }
                        };
                        if record_tx.send(record).is_err() {
                            break;
                        }
                    }
                })
                .expect("Could not spawn selection worker");
        }
        drop(record_tx);

        let hard_deadline = Instant::now() + deadline;
        let mut records = Vec::new();
        let mut settled = 0usize;
        while settled < total {
            match record_rx.recv_deadline(hard_deadline) {
                Ok(Some(record)) => {
                    settled += 1;
                    records.push(record);
                }
                Ok(None) => settled += 1,
                Err(RecvTimeoutError::Timeout) => {
                    let err = Error::DeadlineExceeded("segment selection");
                    warn!("{err}: {settled} of {total} videos settled, abandoning the rest");
                    break;
                }
                Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        stop.store(true, Ordering::Relaxed);
        while job_rx.try_recv().is_ok() {}

        records
    }
}
