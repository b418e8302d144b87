use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to access preference file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse preference file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Preference error: {0}")]
    Preference(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, Error>;
