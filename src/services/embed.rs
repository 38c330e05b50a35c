use serde::Deserialize;

use crate::{
    http,
    result::{Error, Result},
    types::{EmbeddingResult, LocalMedia},
};

/// Interface to the multimodal embedding collaborator.
///
/// Network-based; every call goes through the shared agent and therefore
/// carries a per-call timeout.
pub trait Embedder: Send + Sync {
    fn embed(&self, description: &str, media: &LocalMedia) -> Result<EmbeddingResult>;
}

/// HTTP client for the embedding service.
///
/// The service computes one row per modality for a batch of one; the
/// audio/description similarity is derived client-side.
pub struct HttpEmbedder {
    url: String,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    video: Vec<Vec<f32>>,
    audio: Vec<Vec<f32>>,
    description: Vec<Vec<f32>>,
}

impl HttpEmbedder {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

impl Embedder for HttpEmbedder {
    fn embed(&self, description: &str, media: &LocalMedia) -> Result<EmbeddingResult> {
        let response = http::agent()
            .post(&self.url)
            .send_json(serde_json::json!({
                "description": description,
                "path": media.path().to_string_lossy(),
            }))
            .map_err(|err| Error::unavailable("embedding-service", err))?;

        let body: EmbedResponse = response
            .into_json()
            .map_err(|err| Error::unavailable("embedding-service", err))?;

        into_result(body)
    }
}

fn into_result(body: EmbedResponse) -> Result<EmbeddingResult> {
    let first = |name: &'static str, mut rows: Vec<Vec<f32>>| -> Result<Vec<f32>> {
        if rows.is_empty() || rows[0].is_empty() {
            Err(Error::CollaboratorUnavailable {
                service: "embedding-service",
                report: miette::miette!("Empty '{name}' embedding in response"),
            })
        } else {
            Ok(rows.swap_remove(0))
        }
    };

    Ok(EmbeddingResult::new(
        first("video", body.video)?,
        first("audio", body.audio)?,
        first("description", body.description)?,
    ))
}
