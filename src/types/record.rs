use serde::Serialize;

/// Final output unit: one selected, embedded segment of one video.
///
/// At most one record is ever emitted per distinct video id in a single
/// pipeline run.
#[derive(Debug, Clone, Serialize)]
pub struct VideoRecord {
    pub video_id: String,
    pub description: String,
    pub views: u64,
    pub start_secs: f64,
    pub end_secs: f64,
    pub video_emb: Vec<f32>,
    pub audio_emb: Vec<f32>,
    pub description_emb: Vec<f32>,
}
