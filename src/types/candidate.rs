/// A search-returned reference to a remote video, pre-download.
///
/// Produced by the search collaborator and read-only afterwards.
/// `duration` is the duration advertised by the search index; the real
/// duration is re-probed after download as the two regularly disagree.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub id: String,
    pub title: String,
    pub description: String,
    pub views: u64,
    pub duration: f64,
}

impl Candidate {
    /// The text fed to the embedding service alongside the clip.
    /// The title alone when the uploader left the description empty.
    pub fn embed_description(&self) -> String {
        if self.description.is_empty() {
            self.title.clone()
        } else {
            format!("{}\n\n{}", self.title, self.description)
        }
    }
}
