use thiserror::Error as ThisError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidQuery,
    TypeMismatch,
    InvalidState,
    InvalidArgument,
    NotFound,
    NonUnique,
    ResourceExhausted,
    Conflict,
    UnsupportedQuery,
    Internal,
}

#[derive(Debug, ThisError)]
#[error("{kind:?}: {context}")]
pub struct Error {
    pub kind: ErrorKind,
    pub context: String,
}

impl Error {
    pub fn new(kind: ErrorKind, context: String) -> Self {
        Error { kind, context }
    }

    pub fn invalid_query(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidQuery, context.into())
    }

    pub fn type_mismatch(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::TypeMismatch, context.into())
    }

    pub fn invalid_state(context: impl Into<String>) -> Self {
        Error::new(ErrorKind::InvalidState, context.into())
    }

    /// Exhaustion and write conflicts go away on their own; everything else is a caller
    /// or data error and will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind, ErrorKind::ResourceExhausted | ErrorKind::Conflict)
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidQuery,
            context: format!("Invalid regex: {}", err),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            kind: ErrorKind::InvalidArgument,
            context: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_kind_and_context() {
        let err = Error::new(ErrorKind::NotFound, "index 'model' not registered".to_string());
        assert_eq!(err.to_string(), "NotFound: index 'model' not registered");
    }

    #[test]
    fn only_exhaustion_and_conflicts_are_retryable() {
        assert!(Error::new(ErrorKind::ResourceExhausted, String::new()).is_retryable());
        assert!(Error::new(ErrorKind::Conflict, String::new()).is_retryable());
        assert!(!Error::type_mismatch("x").is_retryable());
        assert!(!Error::invalid_state("x").is_retryable());
    }

    #[test]
    fn bad_regex_maps_to_invalid_query() {
        let err: Error = regex::Regex::new("(").unwrap_err().into();
        assert_eq!(err.kind, ErrorKind::InvalidQuery);
    }
}
