use std::{ffi::OsStr, sync::OnceLock};

use miette::{miette, Context, IntoDiagnostic};
use regex::Regex;
use tempfile::NamedTempFile;

use super::command::{
    assert_success_command, run_command, Capture, FFMPEG, FFPROBE, FFXXX_DEFAULT_ARGS, YT_DLP,
};
use crate::{
    result::{Error, Result},
    types::{LocalMedia, SegmentWindow},
};

/// Interface for turning a remote video id into local media.
///
/// All operations return failure instead of faulting, so a bad candidate
/// never takes a worker down with it.
pub trait MediaFetcher: Send + Sync {
    /// Download the `[start, end]` section of the video, optionally through
    /// the given egress proxy.
    fn fetch(&self, video_id: &str, start: f64, end: f64, proxy: Option<&str>)
        -> Result<LocalMedia>;

    /// Measure the real duration of a downloaded file in seconds.
    fn probe_duration(&self, media: &LocalMedia) -> Result<f64>;

    /// Cut a sub-window out of a downloaded file into a new handle.
    fn clip(&self, media: &LocalMedia, window: SegmentWindow) -> Result<LocalMedia>;
}

/// Fetcher over the `yt-dlp`, `ffmpeg` and `ffprobe` binaries.
pub struct YtdlFetcher;

impl YtdlFetcher {
    /// Verify that all three binaries are reachable.
    pub fn new() -> Result<Self> {
        assert_success_command(YT_DLP, |cmd| cmd.arg("--version"))
            .map_err(|err| err.wrap_err_with(|| "yt-dlp not found"))?;
        assert_success_command(FFMPEG, |cmd| cmd.arg("-version"))
            .map_err(|err| err.wrap_err_with(|| "ffmpeg not found"))?;
        assert_success_command(FFPROBE, |cmd| cmd.arg("-version"))
            .map_err(|err| err.wrap_err_with(|| "ffprobe not found"))?;

        Ok(Self)
    }
}

impl MediaFetcher for YtdlFetcher {
    fn fetch(
        &self,
        video_id: &str,
        start: f64,
        end: f64,
        proxy: Option<&str>,
    ) -> Result<LocalMedia> {
        let out = named_tempfile(".mp4")?;
        let section = format!("*{start:.0}-{end:.0}");

        let res = run_command(
            YT_DLP,
            |cmd| {
                let mut cmd = cmd
                    .arg("-q")
                    .args([OsStr::new("-o"), out.path().as_os_str()])
                    .arg("--no-continue") // Or else fails when file already exists, even an empty one
                    .args(["-f", "mp4"])
                    .args(["--download-sections", &section])
                    .arg("--force-keyframes-at-cuts");

                if let Some(proxy) = proxy {
                    cmd = cmd.args(["--proxy", proxy]);
                }

                cmd.arg("--").arg(video_id)
            },
            Capture::STDERR,
        )?;

        let stderr = String::from_utf8_lossy(&res.stderr);
        let is_unavailable = stderr
            .lines()
            .any(|line| line.starts_with("ERROR:") && line.to_lowercase().contains("unavailable"));
        if is_unavailable {
            return Err(Error::MediaUnusable(video_id.to_owned()));
        }
        if !res.status.success() {
            return Err(Error::CollaboratorUnavailable {
                service: "yt-dlp",
                report: miette!("Download of '{video_id}' failed: {stderr}"),
            });
        }

        // yt-dlp exits 0 on some soft failures, leaving an empty file behind
        let size = out.as_file().metadata().into_diagnostic()?.len();
        if size == 0 {
            return Err(Error::MediaUnusable(video_id.to_owned()));
        }

        Ok(LocalMedia::new(out))
    }

    fn probe_duration(&self, media: &LocalMedia) -> Result<f64> {
        static DURATION_RE: OnceLock<Regex> = OnceLock::new();

        let res = run_command(
            FFPROBE,
            |cmd| {
                cmd.args(["-show_entries", "format=duration"])
                    .arg(media.path().as_os_str())
            },
            Capture::STDOUT,
        )?;
        if !res.status.success() {
            return Err(miette!("ffprobe did run but was not successful").into());
        }

        let output = String::from_utf8_lossy(&res.stdout);
        let re = DURATION_RE.get_or_init(|| Regex::new(r"duration=(\d+(?:\.\d+)?)").unwrap());
        let cap = re
            .captures(&output)
            .ok_or_else(|| miette!("Did not find the duration in the ffprobe output"))?;

        cap.get(1)
            .unwrap()
            .as_str()
            .parse()
            .into_diagnostic()
            .wrap_err("Could not parse duration")
            .map_err(Error::from)
    }

    fn clip(&self, media: &LocalMedia, window: SegmentWindow) -> Result<LocalMedia> {
        let out = named_tempfile(".mp4")?;

        assert_success_command(FFMPEG, |cmd| {
            cmd.args(FFXXX_DEFAULT_ARGS)
                .arg("-y")
                .args(["-ss", &format!("{:.3}", window.start)])
                .args(["-to", &format!("{:.3}", window.end)])
                .args([OsStr::new("-i"), media.path().as_os_str()])
                .args(["-c", "copy"])
                .arg(out.path())
        })
        .map_err(|err| err.wrap_err_with(|| format!("Could not extract clip {window}")))?;

        Ok(LocalMedia::new(out))
    }
}

/// Create a named temporary file and return its handle.
///
/// The file destructor will be called at the handle drop.
fn named_tempfile(suffix: &str) -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .into_diagnostic()
        .wrap_err("Could not create tempfile")
        .map_err(Error::from)
}
