use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    #[error("Invalid record: {0}")]
    InvalidRecord(String),
}

impl CoreError {
    pub fn unknown_domain(name: impl Into<String>) -> Self {
        Self::UnknownDomain(name.into())
    }

    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord(message.into())
    }
}
