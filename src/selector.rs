use std::sync::Arc;

use crossbeam_channel::bounded;
use tracing::{debug, info, warn};

use crate::{
    outside::MediaFetcher,
    result::{Error, Result},
    services::Embedder,
    types::{Candidate, EmbeddingResult, LocalMedia, SegmentWindow, VideoRecord},
};

#[derive(Debug, Clone, Copy)]
pub struct SelectorConfig {
    /// Longest candidate window, in seconds.
    pub max_segment_secs: f64,
    /// Most windows evaluated per video; excess tiles are sampled down.
    pub max_segments: usize,
}

/// Finds the sub-window of one downloaded clip most relevant to its text
/// description, judged by the audio/description embedding similarity.
pub struct SegmentSelector {
    fetcher: Arc<dyn MediaFetcher>,
    embedder: Arc<dyn Embedder>,
    config: SelectorConfig,
}

impl SegmentSelector {
    pub fn new(
        fetcher: Arc<dyn MediaFetcher>,
        embedder: Arc<dyn Embedder>,
        config: SelectorConfig,
    ) -> Self {
        Self {
            fetcher,
            embedder,
            config,
        }
    }

    /// Evaluate candidate windows concurrently and build a record from the
    /// one maximizing `|similarity|`, ties to the earliest start.
    ///
    /// Takes ownership of the media so the file is released on every exit
    /// path. Per-window clips are released as soon as they are embedded.
    /// Fails with [`Error::EmbeddingFailureAll`] when no window produced an
    /// embedding: a record is only ever emitted with a complete triple.
    pub fn select_best(&self, candidate: &Candidate, media: LocalMedia) -> Result<VideoRecord> {
        // The search index regularly lies about durations; measure the
        // downloaded file instead.
        let duration = match self.fetcher.probe_duration(&media) {
            Ok(duration) if duration > 0.0 => duration,
            Ok(_) => return Err(Error::MediaUnusable(candidate.id.clone())),
            Err(err) => {
                warn!("Could not probe video {}: {err}", candidate.id);
                return Err(Error::MediaUnusable(candidate.id.clone()));
            }
        };

        let windows = SegmentWindow::tile(
            duration,
            self.config.max_segment_secs,
            self.config.max_segments,
        );
        if windows.is_empty() {
            return Err(Error::MediaUnusable(candidate.id.clone()));
        }
        debug!(
            "Evaluating {} windows of video {} ({duration:.0}s)",
            windows.len(),
            candidate.id
        );

        let description = candidate.embed_description();

        let (result_tx, result_rx) = bounded(windows.len());
        std::thread::scope(|scope| {
            for &window in &windows {
                let result_tx = result_tx.clone();
                let description = &description;
                let media = &media;
                scope.spawn(move || {
                    let res = self.evaluate_window(description, media, window);
                    let _ = result_tx.send((window, res));
                });
            }
        });
        drop(result_tx);

        let mut best: Option<(SegmentWindow, EmbeddingResult)> = None;
        for (window, res) in result_rx {
            let embedding = match res {
                Ok(embedding) => embedding,
                Err(err) => {
                    warn!(
                        "Embedding window {window} of video {} failed: {err}",
                        candidate.id
                    );
                    continue;
                }
            };

            let better = match &best {
                None => true,
                Some((best_window, best_embedding)) => {
                    let (score, best_score) =
                        (embedding.similarity.abs(), best_embedding.similarity.abs());
                    score > best_score || (score == best_score && window.start < best_window.start)
                }
            };
            if better {
                best = Some((window, embedding));
            }
        }

        let (window, embedding) = best.ok_or_else(|| Error::EmbeddingFailureAll {
            video_id: candidate.id.clone(),
        })?;

        info!(
            "Selected window {window} of video {} (similarity {:.3})",
            candidate.id, embedding.similarity
        );

        Ok(VideoRecord {
            video_id: candidate.id.clone(),
            description,
            views: candidate.views,
            start_secs: window.start,
            end_secs: window.end,
            video_emb: embedding.video,
            audio_emb: embedding.audio,
            description_emb: embedding.description,
        })
    }

    fn evaluate_window(
        &self,
        description: &str,
        media: &LocalMedia,
        window: SegmentWindow,
    ) -> Result<EmbeddingResult> {
        let clip = self
            .fetcher
            .clip(media, window)
            .map_err(|err| err.wrap_err_with(|| format!("Could not clip window {window}")))?;

        // The clip handle drops (and the file is deleted) when this
        // returns, success or not.
        self.embedder.embed(description, &clip)
    }
}
