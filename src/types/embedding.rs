/// Embedding triple for one (description, clip window) pair.
///
/// `similarity` is the cosine similarity between the audio and description
/// vectors, the relevance proxy used for window selection. Immutable once
/// returned by the embedding collaborator.
#[derive(Debug, Clone)]
pub struct EmbeddingResult {
    pub video: Vec<f32>,
    pub audio: Vec<f32>,
    pub description: Vec<f32>,
    pub similarity: f32,
}

impl EmbeddingResult {
    pub fn new(video: Vec<f32>, audio: Vec<f32>, description: Vec<f32>) -> Self {
        let similarity = cosine_similarity(&audio, &description);
        Self {
            video,
            audio,
            description,
            similarity,
        }
    }
}

/// Cosine similarity of two vectors. Zero for empty, mismatched or
/// zero-norm inputs.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a.sqrt() * norm_b.sqrt())
    }
}
