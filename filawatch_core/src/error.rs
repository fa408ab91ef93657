use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum WatchError {
    #[error("transport error: {0}")]
    Transport(String),
    #[error("transport read timed out")]
    Timeout,
    #[error("configuration error: {0}")]
    Config(String),
    #[error("invalid state: {0}")]
    State(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing gpio transport")]
    MissingTransport,
    #[error("missing printer control")]
    MissingPrinter,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
