use std::{error::Error, fmt};

#[derive(Debug)]
pub enum TimelensError {
    ConfigError(String),
    NetworkError(String),
    ParseError(String),
    ImageLoadError(String),
    ObserverInit(String),
    Dom(String),
    StorageError(String),
}

impl fmt::Display for TimelensError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimelensError::ConfigError(msg) => write!(f, "Configuration error: {}", msg),
            TimelensError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            TimelensError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            TimelensError::ImageLoadError(msg) => write!(f, "Image load error: {}", msg),
            TimelensError::ObserverInit(msg) => write!(f, "Observer init error: {}", msg),
            TimelensError::Dom(msg) => write!(f, "Document error: {}", msg),
            TimelensError::StorageError(msg) => write!(f, "Storage error: {}", msg),
        }
    }
}

impl Error for TimelensError {}
