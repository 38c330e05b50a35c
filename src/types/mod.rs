mod candidate;
mod embedding;
mod media;
mod record;
mod window;

pub use candidate::Candidate;
pub use embedding::{cosine_similarity, EmbeddingResult};
pub use media::LocalMedia;
pub use record::VideoRecord;
pub use window::SegmentWindow;
