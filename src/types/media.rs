use std::path::Path;

use tempfile::NamedTempFile;

/// A downloaded or clipped media file on local disk.
///
/// The underlying file is deleted when the handle is dropped.
/// **As such, one must not simply get the file path and drop the handle.**
/// Ownership moves along the pipeline (scheduler → selector) so the file
/// is released exactly once, whatever the exit path.
#[derive(Debug)]
pub struct LocalMedia {
    file: NamedTempFile,
}

impl LocalMedia {
    pub fn new(file: NamedTempFile) -> Self {
        Self { file }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }
}
