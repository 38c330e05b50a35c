use std::collections::HashSet;

use serde::Deserialize;

use crate::{
    http,
    result::{Error, Result},
    types::Candidate,
};

/// Interface to the id registry deciding which candidates were never
/// submitted before.
///
/// Callers must tolerate this collaborator being down: on any error they
/// degrade to treating every id as unique rather than aborting the run.
pub trait UniquenessFilter: Send + Sync {
    /// Which of the given ids are not previously registered.
    fn filter_unique(&self, ids: &[String]) -> Result<Vec<String>>;

    /// Ad hoc single-id existence check.
    fn exists(&self, id: &str) -> Result<bool>;
}

/// HTTP client for the dedup registry service.
pub struct HttpDedup {
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UniqueResponse {
    #[serde(default)]
    unique_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ExistsResponse {
    #[serde(default)]
    exists: bool,
}

impl HttpDedup {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

impl UniquenessFilter for HttpDedup {
    fn filter_unique(&self, ids: &[String]) -> Result<Vec<String>> {
        let url = format!("{}/api/v1/unique", self.base_url);
        let response = http::agent()
            .post(&url)
            .send_json(serde_json::json!({ "ids": ids }))
            .map_err(|err| Error::unavailable("dedup-registry", err))?;

        let body: UniqueResponse = response
            .into_json()
            .map_err(|err| Error::unavailable("dedup-registry", err))?;

        Ok(body.unique_ids)
    }

    fn exists(&self, id: &str) -> Result<bool> {
        let url = format!("{}/api/v1/exists/{id}", self.base_url);
        let response = http::agent()
            .get(&url)
            .call()
            .map_err(|err| Error::unavailable("dedup-registry", err))?;

        let body: ExistsResponse = response
            .into_json()
            .map_err(|err| Error::unavailable("dedup-registry", err))?;

        Ok(body.exists)
    }
}

/// Post-filter selection policy.
///
/// With at least `min_unique` confirmed-unique candidates, keep up to `cap`
/// of them preferring higher view counts. With fewer, keep the confirmed
/// ones in search order and backfill up to `cap` total from the unconfirmed
/// remainder, also in search order.
pub fn select_candidates(
    candidates: Vec<Candidate>,
    unique_ids: &HashSet<String>,
    min_unique: usize,
    cap: usize,
) -> Vec<Candidate> {
    let (mut unique, rest): (Vec<_>, Vec<_>) = candidates
        .into_iter()
        .partition(|c| unique_ids.contains(&c.id));

    if unique.len() >= min_unique {
        unique.sort_by(|a, b| b.views.cmp(&a.views));
        unique.truncate(cap);
        return unique;
    }

    let backfill = cap.saturating_sub(unique.len());
    unique.extend(rest.into_iter().take(backfill));
    unique
}

#[cfg(test)]
mod tests {
    use std::{
        io::{Read, Write},
        net::TcpListener,
        thread,
    };

    use super::*;

    fn serve_once(body: &str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
            body.len(),
            body
        );
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut buf = [0u8; 4096];
                let _ = stream.read(&mut buf);
                let _ = stream.write_all(response.as_bytes());
            }
        });
        format!("http://{addr}")
    }

    #[test]
    fn filter_unique_parses_the_registry_response() {
        let url = serve_once(r#"{"unique_ids":["a","b"]}"#);
        let dedup = HttpDedup::new(url);
        let unique = dedup
            .filter_unique(&["a".into(), "b".into(), "c".into()])
            .unwrap();
        assert_eq!(unique, vec!["a", "b"]);
    }

    #[test]
    fn exists_parses_the_registry_response() {
        let url = serve_once(r#"{"exists":true}"#);
        let dedup = HttpDedup::new(url);
        assert!(dedup.exists("a").unwrap());
    }

    #[test]
    fn unreachable_registry_is_a_collaborator_error() {
        let dedup = HttpDedup::new("http://127.0.0.1:1");
        let err = dedup.filter_unique(&["a".into()]).unwrap_err();
        assert!(matches!(
            err,
            crate::result::Error::CollaboratorUnavailable { .. }
        ));
    }

    fn candidate(id: &str, views: u64) -> Candidate {
        Candidate {
            id: id.to_owned(),
            title: format!("title {id}"),
            description: String::new(),
            views,
            duration: 60.0,
        }
    }

    fn ids(candidates: &[Candidate]) -> Vec<&str> {
        candidates.iter().map(|c| c.id.as_str()).collect()
    }

    #[test]
    fn enough_unique_sorts_by_views_and_caps() {
        let candidates: Vec<_> = (0..20).map(|i| candidate(&format!("v{i}"), i)).collect();
        let unique: HashSet<_> = (0..18).map(|i| format!("v{i}")).collect();

        let selected = select_candidates(candidates, &unique, 8, 16);
        assert_eq!(selected.len(), 16);
        assert_eq!(selected[0].id, "v17");
        for pair in selected.windows(2) {
            assert!(pair[0].views >= pair[1].views);
        }
    }

    #[test]
    fn too_few_unique_backfills_in_search_order() {
        let candidates: Vec<_> = (0..10).map(|i| candidate(&format!("v{i}"), 100 - i)).collect();
        let unique: HashSet<_> = ["v3", "v7"].iter().map(|s| s.to_string()).collect();

        let selected = select_candidates(candidates, &unique, 8, 16);
        assert_eq!(
            ids(&selected),
            vec!["v3", "v7", "v0", "v1", "v2", "v4", "v5", "v6", "v8", "v9"]
        );
    }

    #[test]
    fn backfill_respects_cap() {
        let candidates: Vec<_> = (0..30).map(|i| candidate(&format!("v{i}"), 0)).collect();
        let unique: HashSet<_> = ["v0"].iter().map(|s| s.to_string()).collect();

        let selected = select_candidates(candidates, &unique, 8, 16);
        assert_eq!(selected.len(), 16);
        assert_eq!(selected[0].id, "v0");
    }

    #[test]
    fn no_unique_confirmed_takes_first_cap_in_order() {
        let candidates: Vec<_> = (0..5).map(|i| candidate(&format!("v{i}"), 0)).collect();
        let selected = select_candidates(candidates, &HashSet::new(), 8, 16);
        assert_eq!(ids(&selected), vec!["v0", "v1", "v2", "v3", "v4"]);
    }
}
