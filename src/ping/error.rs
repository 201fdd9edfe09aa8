// src/ping/error.rs
use std::io;
use thiserror::Error;

/// Ways a status ping can fail.
#[derive(Debug, Error)]
pub enum PingError {
    /// The server answered but the payload could not be understood.
    #[error("{reason}")]
    MalformedResponse { raw: String, reason: String },

    #[error("timed out")]
    Timeout,

    #[error("connection refused")]
    ConnectionRefused,

    #[error("unknown host")]
    UnknownHost,

    #[error("I/O error: {0}")]
    Io(io::Error),
}

impl PingError {
    pub fn malformed(raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedResponse { raw: raw.into(), reason: reason.into() }
    }
}

impl From<io::Error> for PingError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::TimedOut => Self::Timeout,
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            _ => Self::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_errors_map_to_expected_classes() {
        let refused = io::Error::from(io::ErrorKind::ConnectionRefused);
        assert!(matches!(PingError::from(refused), PingError::ConnectionRefused));

        let timed_out = io::Error::from(io::ErrorKind::TimedOut);
        assert!(matches!(PingError::from(timed_out), PingError::Timeout));

        let reset = io::Error::from(io::ErrorKind::ConnectionReset);
        assert!(matches!(PingError::from(reset), PingError::Io(_)));
    }

    #[test]
    fn malformed_displays_reason_only() {
        let e = PingError::malformed("{\"x\":1}", "missing players");
        assert_eq!(e.to_string(), "missing players");
    }
}
