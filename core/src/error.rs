use std::fmt;

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::Deserialize;
use thiserror::Error;

/// The error type for reqexec operations.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct Error {
    kind: ErrorKind,
    message: String,
    #[source]
    source: Option<anyhow::Error>,
    service: Option<ServiceError>,
    response_headers: Option<HeaderMap>,
    attempts: Option<u32>,
}

/// The kind of error that occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Credentials exist but are invalid/malformed.
    CredentialInvalid,

    /// Credentials are expired.
    CredentialExpired,

    /// Request cannot be built or signed (missing required fields, etc.).
    RequestInvalid,

    /// Configuration error (missing fields, invalid values).
    ConfigInvalid,

    /// The checksum computed over transferred bytes disagrees with the value
    /// the service reported. Detected locally, never retried.
    IntegrityMismatch,

    /// The service returned a well-formed error response.
    Service,

    /// The transport failed before a response arrived (connection reset,
    /// per-attempt timeout, protocol error).
    Transport,

    /// The overall call deadline elapsed across all attempts.
    TimedOut,

    /// The call was cancelled cooperatively.
    Cancelled,

    /// Unexpected errors.
    Unexpected,
}

/// A structured error response from the storage service.
///
/// Every failed operation carries the same small body regardless of which
/// operation failed, so it is parsed once here.
#[derive(Debug, Clone)]
pub struct ServiceError {
    /// HTTP status code of the response.
    pub status: StatusCode,
    /// Service error code, e.g. `NoSuchKey` or `RequestTimeTooSkewed`.
    pub code: String,
    /// Human readable message.
    pub message: String,
    /// Server-assigned request id, for diagnostics only.
    pub request_id: String,
    /// Vendor-specific diagnostic code.
    pub ec: String,
}

/// XML layout of the service error body.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "PascalCase")]
struct ErrorBody {
    code: String,
    message: String,
    request_id: String,
    #[serde(rename = "EC")]
    ec: String,
}

impl ServiceError {
    /// Parse a service error from a non-2xx response.
    ///
    /// An unparsable body still yields a usable error with an empty code, so
    /// callers never lose the status.
    pub fn from_response(status: StatusCode, body: &Bytes) -> Self {
        let parsed: ErrorBody = quick_xml::de::from_reader(body.as_ref()).unwrap_or_default();

        Self {
            status,
            code: parsed.code,
            message: parsed.message,
            request_id: parsed.request_id,
            ec: parsed.ec,
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "service returned {} (code: {}, request id: {})",
            self.status, self.code, self.request_id
        )
    }
}

impl Error {
    /// Create a new error with the given kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
            service: None,
            response_headers: None,
            attempts: None,
        }
    }

    /// Add a source error.
    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Record how many attempts were made before this error was surfaced.
    ///
    /// Diagnostic only: the error itself is the last attempt's error,
    /// unchanged.
    pub fn with_attempts(mut self, attempts: u32) -> Self {
        self.attempts = Some(attempts);
        self
    }

    /// Get the error kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Attach the headers of the response this error came from.
    pub fn with_response_headers(mut self, headers: HeaderMap) -> Self {
        self.response_headers = Some(headers);
        self
    }

    /// Get the parsed service error, if this error came from the service.
    pub fn service(&self) -> Option<&ServiceError> {
        self.service.as_ref()
    }

    /// Headers of the response this error came from, if any.
    pub fn response_headers(&self) -> Option<&HeaderMap> {
        self.response_headers.as_ref()
    }

    /// Number of attempts made before the error was surfaced, if recorded.
    pub fn attempts(&self) -> Option<u32> {
        self.attempts
    }

    /// Check if this is a credential error.
    pub fn is_credential_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::CredentialInvalid | ErrorKind::CredentialExpired
        )
    }
}

// Convenience constructors
impl Error {
    /// Create a credential invalid error.
    pub fn credential_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialInvalid, message)
    }

    /// Create a credential expired error.
    pub fn credential_expired(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::CredentialExpired, message)
    }

    /// Create a request invalid error.
    pub fn request_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RequestInvalid, message)
    }

    /// Create a config invalid error.
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create a checksum inconsistency error naming both values.
    pub fn integrity_mismatch(computed: u64, reported: u64) -> Self {
        Self::new(
            ErrorKind::IntegrityMismatch,
            format!(
                "crc64 checksum inconsistency: computed {computed}, service reported {reported}"
            ),
        )
    }

    /// Create an error from a parsed service error response.
    pub fn service_error(err: ServiceError) -> Self {
        let mut e = Self::new(ErrorKind::Service, err.to_string());
        e.service = Some(err);
        e
    }

    /// Create a transport error.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transport, message)
    }

    /// Create an overall deadline error.
    pub fn timed_out(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimedOut, message)
    }

    /// Create a cancellation error.
    pub fn cancelled(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cancelled, message)
    }

    /// Create an unexpected error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unexpected, message)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::CredentialInvalid => write!(f, "invalid credentials"),
            ErrorKind::CredentialExpired => write!(f, "expired credentials"),
            ErrorKind::RequestInvalid => write!(f, "invalid request"),
            ErrorKind::ConfigInvalid => write!(f, "invalid configuration"),
            ErrorKind::IntegrityMismatch => write!(f, "checksum inconsistency"),
            ErrorKind::Service => write!(f, "service error"),
            ErrorKind::Transport => write!(f, "transport failure"),
            ErrorKind::TimedOut => write!(f, "deadline exceeded"),
            ErrorKind::Cancelled => write!(f, "cancelled"),
            ErrorKind::Unexpected => write!(f, "unexpected error"),
        }
    }
}

/// Convenience type alias for Results.
pub type Result<T> = std::result::Result<T, Error>;

// Common From implementations
impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(err)
    }
}

impl From<std::fmt::Error> for Error {
    fn from(err: std::fmt::Error) -> Self {
        Self::unexpected(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::Error> for Error {
    fn from(err: http::Error) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::uri::InvalidUriParts> for Error {
    fn from(err: http::uri::InvalidUriParts) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

impl From<http::header::ToStrError> for Error {
    fn from(err: http::header::ToStrError) -> Self {
        Self::request_invalid(err.to_string()).with_source(anyhow::Error::from(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_service_error_body() {
        let body = Bytes::from_static(
            br#"<?xml version="1.0" encoding="UTF-8"?>
<Error>
  <Code>RequestTimeTooSkewed</Code>
  <Message>The difference between the request time and the current time is too large.</Message>
  <RequestId>5C1B138A109F4E405B2D</RequestId>
  <EC>0002-00000504</EC>
</Error>"#,
        );

        let err = ServiceError::from_response(StatusCode::FORBIDDEN, &body);
        assert_eq!(err.status, StatusCode::FORBIDDEN);
        assert_eq!(err.code, "RequestTimeTooSkewed");
        assert_eq!(err.request_id, "5C1B138A109F4E405B2D");
        assert_eq!(err.ec, "0002-00000504");
    }

    #[test]
    fn test_parse_service_error_garbage_body() {
        let body = Bytes::from_static(b"not xml at all");

        let err = ServiceError::from_response(StatusCode::INTERNAL_SERVER_ERROR, &body);
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.code.is_empty());
    }

    #[test]
    fn test_attempts_are_diagnostic_only() {
        let err = Error::transport("connection reset").with_attempts(3);
        assert_eq!(err.kind(), ErrorKind::Transport);
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.to_string(), "connection reset");
    }
}
