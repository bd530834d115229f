//! reqwest-backed [`HttpSend`] implementation.
//!
//! ## Example
//!
//! ```no_run
//! use reqexec_core::Context;
//! use reqexec_http_send_reqwest::ReqwestHttpSend;
//!
//! let ctx = Context::new().with_http_send(ReqwestHttpSend::default());
//! ```

#![warn(missing_docs)]

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::BodyExt;
use reqexec_core::{Error, HttpSend, Result};
use reqwest::{Client, Request};

/// Sends requests over a shared [`reqwest::Client`].
///
/// Carries one attempt per call and nothing more; retry, timeout, and
/// signing all live in the executor. Failures surface as transport errors so
/// the retry policy treats them as safe to repeat.
#[derive(Debug, Default)]
pub struct ReqwestHttpSend {
    client: Client,
}

impl ReqwestHttpSend {
    /// Create a new ReqwestHttpSend with a reqwest::Client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpSend for ReqwestHttpSend {
    async fn http_send(&self, req: http::Request<Bytes>) -> Result<http::Response<Bytes>> {
        let req = Request::try_from(req)
            .map_err(|e| Error::transport(format!("invalid request: {e}")).with_source(e))?;
        let resp: http::Response<_> = self
            .client
            .execute(req)
            .await
            .map_err(|e| Error::transport(e.to_string()).with_source(e))?
            .into();

        let (parts, body) = resp.into_parts();
        let bs = BodyExt::collect(body)
            .await
            .map(|buf| buf.to_bytes())
            .map_err(|e| Error::transport(format!("failed to read body: {e}")).with_source(e))?;
        Ok(http::Response::from_parts(parts, bs))
    }
}
