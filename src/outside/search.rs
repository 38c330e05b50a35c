use miette::{miette, Context, IntoDiagnostic};

use super::command::{assert_success_command, run_command, Capture, YT_DLP};
use crate::{result::Result, types::Candidate};

/// Interface for resolving a text query to a ranked candidate list.
///
/// The index may return fewer results than requested and may return
/// duplicates across calls; no other contract is assumed.
pub trait VideoSearch: Send + Sync {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>>;
}

/// Search adapter over the [yt-dlp](https://github.com/yt-dlp/yt-dlp)
/// `ytsearch` pseudo-playlist.
pub struct YtdlSearch;

impl YtdlSearch {
    /// Verify that the `yt-dlp` binary is reachable.
    pub fn new() -> Result<Self> {
        assert_success_command(YT_DLP, |cmd| cmd.arg("--version"))
            .map_err(|err| err.wrap_err_with(|| "yt-dlp not found"))?;
        Ok(Self)
    }
}

impl VideoSearch for YtdlSearch {
    fn search(&self, query: &str, max_results: usize) -> Result<Vec<Candidate>> {
        let res = run_command(
            YT_DLP,
            |cmd| {
                cmd.arg("-q")
                    .arg("--flat-playlist")
                    .arg("-j")
                    .arg("--")
                    .arg(format!("ytsearch{max_results}:{query}"))
            },
            Capture::STDOUT,
        )?;

        if !res.status.success() {
            return Err(miette!("yt-dlp search did run but was not successful").into());
        }

        // One JSON object per line, one line per search result
        let output = String::from_utf8_lossy(&res.stdout);
        let mut candidates = Vec::new();
        for line in output.lines().filter(|l| !l.trim().is_empty()) {
            match parse_search_line(line) {
                Ok(candidate) => candidates.push(candidate),
                Err(err) => {
                    tracing::warn!("Skipping unparseable search result: {err}");
                }
            }
        }

        Ok(candidates)
    }
}

fn parse_search_line(line: &str) -> Result<Candidate> {
    let json = serde_json::from_str::<serde_json::Value>(line)
        .into_diagnostic()
        .wrap_err("Could not parse json")?;
    let json = json.as_object().ok_or_else(|| miette!("JSON is not an object"))?;

    let get_str = |key: &str| -> String {
        json.get(key)
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_owned()
    };

    let id = json
        .get("id")
        .and_then(|v| v.as_str())
        .ok_or_else(|| miette!("Key 'id' not found in JSON"))?
        .to_owned();

    Ok(Candidate {
        id,
        title: get_str("title"),
        description: get_str("description"),
        views: json.get("view_count").and_then(|v| v.as_u64()).unwrap_or(0),
        duration: json.get("duration").and_then(|v| v.as_f64()).unwrap_or(0.0),
    })
}
