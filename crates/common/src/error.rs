use std::fmt;

pub type Result<T> = std::result::Result<T, Error>;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error("type mismatch: expected {expected}, got {actual}")]
    TypeMismatch { expected: String, actual: String },

    #[error("Invalid sketch configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Malformed sketch blob: {0}")]
    MalformedSketch(String),

    #[error("Sketch resources exhausted: {0}")]
    ResourceExhausted(String),

    #[error("Unsupported feature: {0}")]
    UnsupportedFeature(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl Error {
    pub fn invalid_query(msg: impl fmt::Display) -> Self {
        Error::InvalidQuery(msg.to_string())
    }

    pub fn type_mismatch(expected: impl fmt::Display, actual: impl fmt::Display) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            actual: actual.to_string(),
        }
    }

    pub fn type_mismatch_value(expected: impl fmt::Display, value: &crate::types::Value) -> Self {
        Error::TypeMismatch {
            expected: expected.to_string(),
            actual: value.data_type().to_string(),
        }
    }

    pub fn invalid_configuration(msg: impl fmt::Display) -> Self {
        Error::InvalidConfiguration(msg.to_string())
    }

    pub fn malformed_sketch(msg: impl fmt::Display) -> Self {
        Error::MalformedSketch(msg.to_string())
    }

    pub fn resource_exhausted(msg: impl fmt::Display) -> Self {
        Error::ResourceExhausted(msg.to_string())
    }

    pub fn unsupported_feature(msg: impl fmt::Display) -> Self {
        Error::UnsupportedFeature(msg.to_string())
    }

    pub fn internal(msg: impl fmt::Display) -> Self {
        Error::InternalError(msg.to_string())
    }
}
