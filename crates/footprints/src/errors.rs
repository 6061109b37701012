use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FootprintError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Satellite acquisition failed: {0}")]
    AcquisitionFailed(String),

    #[error("Failed to connect to detection server: {0}")]
    RemoteUnavailable(#[source] reqwest::Error),

    #[error("Could not build detection request: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Processing failed on detection server (Status {status}): {body}")]
    RemoteProcessingFailed { status: u16, body: String },

    #[error("Invalid GeoJSON: {0}")]
    Format(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, FootprintError>;
