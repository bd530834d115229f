use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

use crate::constants::X_OSS_REQUEST_ID;
use crate::time::DateTime;

/// The abstract result of one executed operation.
///
/// Per-operation response mapping happens above this layer; the core only
/// guarantees status, headers, and a verified body.
#[derive(Debug)]
pub struct OperationResponse {
    /// HTTP status code.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HeaderMap,
    /// Response body, fully buffered and integrity-checked when enabled.
    pub body: Bytes,
}

impl OperationResponse {
    /// Server-assigned request identifier, for diagnostics only.
    pub fn request_id(&self) -> Option<&str> {
        self.headers
            .get(X_OSS_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
    }
}

/// A signature computed offline: everything a third party needs to execute
/// the operation later, without this process sending anything.
#[derive(Debug, Clone)]
pub struct PresignedRequest {
    /// HTTP method the bearer must use.
    pub method: Method,
    /// Fully query-signed URL.
    pub url: String,
    /// The expiry instant baked into the signature.
    pub expires_at: DateTime,
    /// Header names that participated in signing and must accompany the
    /// request unchanged.
    pub signed_headers: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id() {
        let mut headers = HeaderMap::new();
        headers.insert("x-oss-request-id", "5C1B138A109F4E405B2D".parse().unwrap());
        let resp = OperationResponse {
            status: StatusCode::OK,
            headers,
            body: Bytes::new(),
        };
        assert_eq!(resp.request_id(), Some("5C1B138A109F4E405B2D"));
    }
}
