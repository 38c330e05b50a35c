use std::{
    path::{Path, PathBuf},
    sync::Mutex,
    time::{Duration, Instant},
};

use miette::{Context, IntoDiagnostic};
use tracing::{debug, warn};

use crate::result::Result;

/// Rotating pool of network egress identities.
///
/// Loads a newline-delimited `host:port` list once at startup and hands
/// out one entry at random per draw. The backing file is re-read when the
/// refresh interval has elapsed, so a rotated list is picked up without a
/// restart. Draws are safe under concurrent callers.
#[derive(Debug)]
pub struct ProxyPool {
    path: Option<PathBuf>,
    refresh_every: Duration,
    inner: Mutex<PoolState>,
}

#[derive(Debug)]
struct PoolState {
    proxies: Vec<String>,
    loaded_at: Instant,
}

impl ProxyPool {
    /// Load the pool from a proxy list file.
    pub fn from_file<P: AsRef<Path>>(path: P, refresh_every: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let proxies = read_proxy_file(&path)?;
        debug!("Loaded {} proxies from {}", proxies.len(), path.display());

        Ok(Self {
            path: Some(path),
            refresh_every,
            inner: Mutex::new(PoolState {
                proxies,
                loaded_at: Instant::now(),
            }),
        })
    }

    /// A pool that never yields a proxy. Downloads then egress directly.
    pub fn disabled() -> Self {
        Self {
            path: None,
            refresh_every: Duration::MAX,
            inner: Mutex::new(PoolState {
                proxies: vec![],
                loaded_at: Instant::now(),
            }),
        }
    }

    /// Draw a random proxy, or `None` when the pool is empty or disabled.
    pub fn draw(&self) -> Option<String> {
        let mut state = self.inner.lock().unwrap();

        if let Some(path) = &self.path {
            if state.loaded_at.elapsed() >= self.refresh_every {
                match read_proxy_file(path) {
                    Ok(proxies) => {
                        debug!("Refreshed proxy list: {} entries", proxies.len());
                        state.proxies = proxies;
                    }
                    // Keep serving the stale list over failing every draw
                    Err(err) => warn!("Could not refresh proxy list: {err}"),
                }
                state.loaded_at = Instant::now();
            }
        }

        if state.proxies.is_empty() {
            None
        } else {
            let idx = fastrand::usize(..state.proxies.len());
            Some(state.proxies[idx].clone())
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().proxies.len()
    }
}

fn read_proxy_file(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .into_diagnostic()
        .wrap_err_with(|| format!("Could not read proxy file '{}'", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(|line| {
            if line.contains("://") {
                line.to_string()
            } else {
                format!("http://{line}")
            }
        })
        .collect())
}
