use std::fmt::Display;

use miette::miette;

#[derive(Debug)]
pub enum Error {
    /// A network collaborator (search, dedup registry, embedding service,
    /// media fetcher) could not be reached or answered garbage.
    /// Recoverable: callers degrade or drop the affected candidate.
    CollaboratorUnavailable {
        service: &'static str,
        report: miette::Report,
    },

    /// The fetched media has zero duration or cannot be probed.
    MediaUnusable(String),

    /// A phase deadline fired while work was still pending.
    /// Pending work is abandoned, never surfaced to the caller as an error.
    DeadlineExceeded(&'static str),

    /// Every candidate window of a video failed to embed.
    /// The whole video is dropped.
    EmbeddingFailureAll { video_id: String },

    Miette(miette::Report),
}

impl From<miette::Report> for Error {
    fn from(err: miette::Report) -> Self {
        Error::Miette(err)
    }
}

impl From<Error> for miette::Report {
    fn from(err: Error) -> Self {
        match err {
            Error::CollaboratorUnavailable { service, report } => {
                report.wrap_err(format!("Collaborator '{service}' unavailable"))
            }
            Error::MediaUnusable(id) => miette!("Media for video '{id}' is unusable"),
            Error::DeadlineExceeded(phase) => miette!("Deadline exceeded in phase '{phase}'"),
            Error::EmbeddingFailureAll { video_id } => {
                miette!("All segment embeddings failed for video '{video_id}'")
            }
            Error::Miette(err) => err,
        }
    }
}

impl Error {
    pub fn unavailable<E>(service: &'static str, err: E) -> Self
    where
        E: std::fmt::Debug + Display + Send + Sync + 'static,
    {
        Error::CollaboratorUnavailable {
            service,
            report: miette::Report::msg(err),
        }
    }

    pub fn wrap_err_with<D, F>(self, f: F) -> Error
    where
        D: Display + Send + Sync + 'static,
        F: FnOnce() -> D,
    {
        match self {
            Error::Miette(report) => Error::Miette(report.wrap_err(f())),
            err => err,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::CollaboratorUnavailable { service, report } => {
                write!(f, "collaborator '{service}' unavailable: {report}")
            }
            Error::MediaUnusable(id) => write!(f, "media for video '{id}' is unusable"),
            Error::DeadlineExceeded(phase) => write!(f, "deadline exceeded in phase '{phase}'"),
            Error::EmbeddingFailureAll { video_id } => {
                write!(f, "all segment embeddings failed for video '{video_id}'")
            }
            Error::Miette(report) => write!(f, "{report}"),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
