use std::fmt::Display;

/// A contiguous time sub-range of a clip considered for embedding.
/// Invariant: `0 <= start < end`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentWindow {
    pub start: f64,
    pub end: f64,
}

impl SegmentWindow {
    /// Partition `duration` seconds into candidate windows of at most
    /// `max_len` seconds.
    ///
    /// A clip shorter than `max_len` yields a single window spanning the
    /// whole clip. Longer clips are tiled from 0 in `max_len` steps, with
    /// the final window right-aligned to the clip end (it may overlap the
    /// previous tile) instead of leaving a short tail.
    ///
    /// If the tiling produces more than `cap` windows, `cap` of them are
    /// sampled uniformly at random, bounding embedding calls per video.
    /// The returned windows are always sorted by start time.
    pub fn tile(duration: f64, max_len: f64, cap: usize) -> Vec<SegmentWindow> {
        assert!(max_len > 0.0, "window length must be positive");

        if duration <= 0.0 {
            return vec![];
        }
        if duration <= max_len {
            return vec![SegmentWindow {
                start: 0.0,
                end: duration,
            }];
        }

        let full_tiles = (duration / max_len).floor() as usize;
        let mut windows = Vec::with_capacity(full_tiles + 1);
        for i in 0..full_tiles {
            let start = i as f64 * max_len;
            windows.push(SegmentWindow {
                start,
                end: start + max_len,
            });
        }

        // Right-align the final window instead of keeping a short tail.
        // Skipped when the duration is an exact multiple of the tile length.
        let last_start = duration - max_len;
        if last_start > (full_tiles - 1) as f64 * max_len {
            windows.push(SegmentWindow {
                start: last_start,
                end: duration,
            });
        }

        if windows.len() > cap && cap > 0 {
            windows = fastrand::choose_multiple(windows.into_iter(), cap);
            windows.sort_by(|a, b| a.start.total_cmp(&b.start));
        }

        windows
    }

    pub fn len_secs(&self) -> f64 {
        self.end - self.start
    }
}

impl Display for SegmentWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:.1}s - {:.1}s]", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_clip_yields_single_full_span_window() {
        let windows = SegmentWindow::tile(45.0, 120.0, 5);
        assert_eq!(windows, vec![SegmentWindow { start: 0.0, end: 45.0 }]);
    }

    #[test]
    fn exact_multiple_tiles_without_overlap() {
        let windows = SegmentWindow::tile(240.0, 120.0, 5);
        assert_eq!(
            windows,
            vec![
                SegmentWindow { start: 0.0, end: 120.0 },
                SegmentWindow { start: 120.0, end: 240.0 },
            ]
        );
    }

    #[test]
    fn final_window_is_right_aligned() {
        let windows = SegmentWindow::tile(300.0, 120.0, 5);
        assert_eq!(
            windows,
            vec![
                SegmentWindow { start: 0.0, end: 120.0 },
                SegmentWindow { start: 120.0, end: 240.0 },
                SegmentWindow { start: 180.0, end: 300.0 },
            ]
        );
    }

    #[test]
    fn oversized_tiling_is_sampled_down_to_cap() {
        let windows = SegmentWindow::tile(1000.0, 60.0, 5);
        assert_eq!(windows.len(), 5);

        // Sampled windows stay sorted and within bounds
        for pair in windows.windows(2) {
            assert!(pair[0].start < pair[1].start);
        }
        for w in &windows {
            assert!(w.start >= 0.0);
            assert!(w.end <= 1000.0);
            assert!((w.len_secs() - 60.0).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_duration_yields_no_windows() {
        assert!(SegmentWindow::tile(0.0, 120.0, 5).is_empty());
    }
}
