// shared/src/lib.rs

/// Error taxonomy shared by every share store backend.
///
/// `NotFound` deliberately collapses "never written", "expired" and "purged"
/// into one outcome.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("not found")]
    NotFound,
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl Error {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }

    pub fn unavailable(msg: impl std::fmt::Display) -> Self {
        Error::BackendUnavailable(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;

pub mod config;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(Error::NotFound.to_string(), "not found");
        assert_eq!(
            Error::invalid_input("shareId is required").to_string(),
            "invalid input: shareId is required"
        );
        assert_eq!(
            Error::unavailable("connection refused").to_string(),
            "backend unavailable: connection refused"
        );
    }
}
