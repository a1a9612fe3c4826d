use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid SEMP base url {url}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("unable to build the http client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
