use thiserror::Error;

/// Error type for decompression profile calculation.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid gas mix: o2={o2}%, he={he}%")]
    InvalidGasMix { o2: f64, he: f64 },

    #[error("invalid gas mix switch depth {depth}m: {message}")]
    GasOrder { depth: f64, message: String },

    #[error("invalid exposure time {time}s")]
    InvalidExposureTime { time: f64 },

    #[error("parse error at position {position}: {message}")]
    Parse { position: usize, message: String },

    #[error("internal consistency error: {0}")]
    Consistency(String),
}
