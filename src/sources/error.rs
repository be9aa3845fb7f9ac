use thiserror::Error;

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Source unavailable: {0}")]
    Unavailable(String),
}
