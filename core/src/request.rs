use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::Result;

/// Callback invoked as bytes move through a transfer.
///
/// Arguments are `(increment, transferred, total)` where `total` is known for
/// finite bodies. A plain function value, no delegate object needed.
pub type ProgressFn = Arc<dyn Fn(u64, u64, Option<u64>) + Send + Sync>;

/// Body of an operation, finite and replayable across retries.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body at all.
    #[default]
    Empty,
    /// A body already resident in memory.
    Bytes(Bytes),
    /// A body delivered in chunks, e.g. read from a file in pieces. Chunk
    /// boundaries carry no meaning; only the concatenated bytes do.
    Chunks(Vec<Bytes>),
}

impl RequestBody {
    /// Total size of the body in bytes.
    pub fn len(&self) -> u64 {
        match self {
            RequestBody::Empty => 0,
            RequestBody::Bytes(b) => b.len() as u64,
            RequestBody::Chunks(cs) => cs.iter().map(|c| c.len() as u64).sum(),
        }
    }

    /// Check if the body is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One logical operation against the storage service.
///
/// This is the abstract input of the executor: the per-operation request
/// builders that produce it are glue and live elsewhere. An OperationRequest
/// is owned exclusively by one in-flight call and never reused.
pub struct OperationRequest {
    /// Operation label, used only for diagnostics.
    pub operation: &'static str,
    /// HTTP method.
    pub method: Method,
    /// Object key, `None` for bucket-level operations.
    pub key: Option<String>,
    /// Query parameters. Insertion order is irrelevant; values may be empty
    /// markers such as `acl`.
    pub query: Vec<(String, String)>,
    /// HTTP headers.
    pub headers: HeaderMap,
    /// Body source.
    pub body: RequestBody,
    /// Progress callback for the body transfer.
    pub progress: Option<ProgressFn>,
    /// Initial checksum value, for objects whose checksum is accumulated
    /// across independent calls (appended writes).
    pub checksum_seed: Option<u64>,
}

impl Debug for OperationRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationRequest")
            .field("operation", &self.operation)
            .field("method", &self.method)
            .field("key", &self.key)
            .field("query", &self.query)
            .field("body_len", &self.body.len())
            .finish_non_exhaustive()
    }
}

impl OperationRequest {
    /// Create a new operation request.
    pub fn new(operation: &'static str, method: Method) -> Self {
        Self {
            operation,
            method,
            key: None,
            query: Vec::new(),
            headers: HeaderMap::new(),
            body: RequestBody::Empty,
            progress: None,
            checksum_seed: None,
        }
    }

    /// Set the object key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Push a query parameter. An empty value is a bare marker.
    pub fn query_push(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    /// Insert a header.
    pub fn header_insert(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Set the body.
    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Register a progress callback for the body transfer.
    pub fn with_progress(mut self, progress: ProgressFn) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Seed the running checksum, for transfers that continue an earlier one.
    pub fn with_checksum_seed(mut self, seed: u64) -> Self {
        self.checksum_seed = Some(seed);
        self
    }

    /// The request path derived from the object key, always `/`-prefixed.
    pub fn path(&self) -> String {
        match &self.key {
            Some(key) => format!("/{key}"),
            None => "/".to_string(),
        }
    }

    /// Concatenate the body chunks into one buffer.
    pub(crate) fn body_bytes(&self) -> Bytes {
        match &self.body {
            RequestBody::Empty => Bytes::new(),
            RequestBody::Bytes(b) => b.clone(),
            RequestBody::Chunks(cs) => {
                let mut buf = Vec::with_capacity(self.body.len() as usize);
                for c in cs {
                    buf.extend_from_slice(c);
                }
                Bytes::from(buf)
            }
        }
    }
}

/// Build the full request URI for one attempt.
pub(crate) fn build_uri(
    scheme: &str,
    authority: &str,
    encoded_path: &str,
    encoded_query: &[(String, String)],
) -> Result<http::Uri> {
    let mut s = format!("{scheme}://{authority}{encoded_path}");
    for (i, (k, v)) in encoded_query.iter().enumerate() {
        s.push(if i == 0 { '?' } else { '&' });
        s.push_str(k);
        if !v.is_empty() {
            s.push('=');
            s.push_str(v);
        }
    }

    Ok(s.parse()?)
}
