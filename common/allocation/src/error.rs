use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("unknown allocation strategy: {0}")]
    UnknownStrategy(String),

    #[error("allocation invariant violated: {0}")]
    InvariantViolation(String),
}

impl Error {
    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
