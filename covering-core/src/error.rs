use crate::models::Axis;

#[derive(Debug, thiserror::Error)]
pub enum AttributeError {
    #[error("Axis {0} is not supported by this covering")]
    UnsupportedAxis(Axis),

    #[error("Attribute {0} is unavailable")]
    Unavailable(&'static str),

    #[error("Position {0} is outside 0..=10000")]
    OutOfRange(u16),
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Attribute error: {0}")]
    Attribute(#[from] AttributeError),

    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Work queue is full")]
    QueueFull,

    #[error("Work queue is closed")]
    QueueClosed,

    #[error("Settings error: {0}")]
    Settings(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
