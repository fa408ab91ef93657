use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("bridge error: {0}")]
    Bridge(String),
    #[error("bridge read timeout")]
    ReadTimeout,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
