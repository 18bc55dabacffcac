use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Domain '{domain}' is not available locally and could not be fetched: {reason}")]
    Unavailable { domain: String, reason: String },

    #[error(
        "Requested split sizes need {requested} samples but only {available} valid samples are available"
    )]
    SplitTooLarge { requested: usize, available: usize },

    #[error("The {split} split is empty")]
    EmptySplit { split: &'static str },

    #[error("I/O error for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed data in {path}: {message}")]
    Format { path: PathBuf, message: String },
}
