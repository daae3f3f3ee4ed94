//! Error types for the `notifications` crate.
//!
//! Follows the platform pattern: a root Error struct carrying an error kind and
//! an optional source for chaining. None of these escape the `Manager`; they
//! exist so the transport can tell the manager which failures are terminal.

use std::error::Error as StdError;
use std::fmt;

/// HTTP status the backend uses to say the notification feature is switched off.
pub const SERVICE_UNAVAILABLE: u16 = 503;

/// Top-level error type for the notifications crate.
#[derive(Debug)]
pub struct Error {
    pub source: Option<Box<dyn StdError + Send + Sync>>,
    pub error_kind: ErrorKind,
}

/// Major categories of errors raised by a notification transport.
#[derive(Debug, PartialEq)]
pub enum ErrorKind {
    /// Terminal disable signal. Every other kind is transient.
    Unavailable,
    Http(HttpErrorKind),
    Stream(StreamErrorKind),
    Decode,
}

/// Errors from REST calls.
#[derive(Debug, PartialEq)]
pub enum HttpErrorKind {
    BuilderFailed,
    RequestFailed,
    Network,
    Timeout,
    UnexpectedStatus(u16),
}

/// Errors from the server-push stream.
#[derive(Debug, PartialEq)]
pub enum StreamErrorKind {
    SetupFailed,
    Interrupted,
    Closed,
}

impl Error {
    pub fn is_unavailable(&self) -> bool {
        self.error_kind == ErrorKind::Unavailable
    }

    /// Maps a non-success HTTP status onto an error, honoring the disable signal.
    pub fn from_status(status: u16) -> Self {
        if status == SERVICE_UNAVAILABLE {
            unavailable()
        } else {
            Error {
                source: Some(format!("unexpected status {status}").into()),
                error_kind: ErrorKind::Http(HttpErrorKind::UnexpectedStatus(status)),
            }
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.error_kind {
            ErrorKind::Unavailable => write!(f, "Notification service unavailable"),
            ErrorKind::Http(kind) => write!(f, "HTTP error: {:?}", kind),
            ErrorKind::Stream(kind) => write!(f, "Stream error: {:?}", kind),
            ErrorKind::Decode => write!(f, "Decode error"),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn StdError + 'static))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            if status.as_u16() == SERVICE_UNAVAILABLE {
                return Error {
                    source: Some(Box::new(err)),
                    error_kind: ErrorKind::Unavailable,
                };
            }
        }

        let error_kind = if err.is_builder() {
            ErrorKind::Http(HttpErrorKind::BuilderFailed)
        } else if err.is_timeout() {
            ErrorKind::Http(HttpErrorKind::Timeout)
        } else if err.is_decode() {
            ErrorKind::Decode
        } else if err.is_request() {
            ErrorKind::Http(HttpErrorKind::RequestFailed)
        } else {
            ErrorKind::Http(HttpErrorKind::Network)
        };

        Error {
            source: Some(Box::new(err)),
            error_kind,
        }
    }
}

impl From<eventsource_client::Error> for Error {
    fn from(err: eventsource_client::Error) -> Self {
        use eventsource_client::Error as EsError;

        let error_kind = match &err {
            EsError::UnexpectedResponse(status) if status.as_u16() == SERVICE_UNAVAILABLE => {
                ErrorKind::Unavailable
            }
            EsError::UnexpectedResponse(status) => {
                ErrorKind::Http(HttpErrorKind::UnexpectedStatus(status.as_u16()))
            }
            EsError::InvalidParameter(_) => ErrorKind::Stream(StreamErrorKind::SetupFailed),
            EsError::TimedOut => ErrorKind::Http(HttpErrorKind::Timeout),
            EsError::StreamClosed | EsError::Eof | EsError::UnexpectedEof => {
                ErrorKind::Stream(StreamErrorKind::Closed)
            }
            _ => ErrorKind::Stream(StreamErrorKind::Interrupted),
        };

        Error {
            source: Some(format!("{err:?}").into()),
            error_kind,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error {
            source: Some(Box::new(err)),
            error_kind: ErrorKind::Decode,
        }
    }
}

/// Helper function to create the terminal disable error.
pub fn unavailable() -> Error {
    Error {
        source: Some("notification service reported unavailable".to_string().into()),
        error_kind: ErrorKind::Unavailable,
    }
}

/// Helper function to create HTTP errors.
pub fn http_error(kind: HttpErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Http(kind),
    }
}

/// Helper function to create stream errors.
pub fn stream_error(kind: StreamErrorKind, message: &str) -> Error {
    Error {
        source: Some(message.to_string().into()),
        error_kind: ErrorKind::Stream(kind),
    }
}
