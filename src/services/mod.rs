mod dedup;
mod embed;

pub use dedup::{select_candidates, HttpDedup, UniquenessFilter};
pub use embed::{Embedder, HttpEmbedder};
