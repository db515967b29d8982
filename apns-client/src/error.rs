//! Client error types.

use apns_protocol::{ProtocolError, StatusCode};
use std::time::Duration;
use thiserror::Error;

use crate::feedback::ProcessingError;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("cannot connect to '{endpoint}' with {timeout:?} timeout: {source}")]
    Connect {
        endpoint: String,
        timeout: Duration,
        #[source]
        source: std::io::Error,
    },

    #[error("{last} on '{attempts}' tries")]
    ConnectExhausted {
        attempts: u32,
        #[source]
        last: Box<ClientError>,
    },

    #[error("not connected")]
    NotConnected,

    #[error("send failed: {0}")]
    Send(#[from] SendError),

    #[error("feedback processing failed: {0}")]
    Processing(#[from] ProcessingError),

    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    #[error("TLS handshake failed: {0}")]
    TlsHandshake(String),
}

impl ClientError {
    /// Returns whether this error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClientError::Io(_) => true,
            ClientError::Connect { .. } => true,
            ClientError::ConnectExhausted { .. } => true,
            ClientError::TlsHandshake(_) => true,
            ClientError::Send(e) => e.is_retryable(),
            _ => false,
        }
    }
}

/// Delivery-time failures. Every one of them closes the connection first.
#[derive(Debug, Error)]
pub enum SendError {
    #[error("sent '{sent}' bytes, expected '{expected}' bytes")]
    ShortWrite { sent: usize, expected: usize },

    #[error("connection closed after send")]
    ConnectionClosed,

    #[error("{status} (status {code}, identifier {identifier})", code = .status.code())]
    Rejected { status: StatusCode, identifier: u32 },

    #[error("unsupported response command '{0}'")]
    UnsupportedCommand(u8),

    #[error("unsupported status code '{status}' (identifier {identifier})")]
    UnsupportedStatus { status: u8, identifier: u32 },
}

impl SendError {
    /// Gateway status for a rejected notification.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            SendError::Rejected { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Identifier the gateway reported, if any.
    pub fn identifier(&self) -> Option<u32> {
        match self {
            SendError::Rejected { identifier, .. }
            | SendError::UnsupportedStatus { identifier, .. } => Some(*identifier),
            _ => None,
        }
    }

    /// Returns whether resending may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SendError::ShortWrite { .. } | SendError::ConnectionClosed => true,
            SendError::Rejected { status, .. } => status.is_retryable(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_send_error_display() {
        let err = SendError::Rejected {
            status: StatusCode::InvalidTokenSize,
            identifier: 42,
        };
        assert_eq!(
            err.to_string(),
            "Invalid token size (status 5, identifier 42)"
        );

        let err = SendError::ShortWrite {
            sent: 3,
            expected: 80,
        };
        assert_eq!(err.to_string(), "sent '3' bytes, expected '80' bytes");

        let err = SendError::UnsupportedCommand(2);
        assert!(err.to_string().contains("'2'"));
    }

    #[test]
    fn test_send_error_accessors() {
        let err = SendError::Rejected {
            status: StatusCode::Shutdown,
            identifier: 7,
        };
        assert_eq!(err.status(), Some(StatusCode::Shutdown));
        assert_eq!(err.identifier(), Some(7));
        assert!(err.is_retryable());

        let err = SendError::UnsupportedStatus {
            status: 9,
            identifier: 1,
        };
        assert_eq!(err.status(), None);
        assert_eq!(err.identifier(), Some(1));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_connect_exhausted_display() {
        let last = ClientError::Connect {
            endpoint: "gateway.push.apple.com:2195".to_string(),
            timeout: Duration::from_secs(3),
            source: std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused"),
        };
        let err = ClientError::ConnectExhausted {
            attempts: 3,
            last: Box::new(last),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("cannot connect to 'gateway.push.apple.com:2195'"));
        assert!(msg.contains("refused"));
        assert!(msg.ends_with("on '3' tries"));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_retryable() {
        assert!(!ClientError::TlsConfig("bad".to_string()).is_retryable());
        assert!(!ClientError::NotConnected.is_retryable());
        assert!(ClientError::Send(SendError::ConnectionClosed).is_retryable());
        assert!(!ClientError::Send(SendError::Rejected {
            status: StatusCode::InvalidToken,
            identifier: 0,
        })
        .is_retryable());
    }
}
