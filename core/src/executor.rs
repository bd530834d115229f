use std::time::Duration;

use bytes::Bytes;
use http::header::{AUTHORIZATION, DATE, HOST};
use log::{debug, warn};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::canonical::{uri_encode, CanonicalRequest};
use crate::clock::{detect_skew, ClockOffset};
use crate::config::Config;
use crate::constants::{UNSIGNED_PAYLOAD, X_OSS_CONTENT_SHA_256, X_OSS_DATE, X_OSS_SECURITY_TOKEN};
use crate::credential::{Credential, CredentialCache, ProvideCredential};
use crate::error::ServiceError;
use crate::integrity::IntegrityStream;
use crate::request::{build_uri, OperationRequest, RequestBody};
use crate::response::{OperationResponse, PresignedRequest};
use crate::retry::Classification;
use crate::sign::{RequestSigner, SigningVersion};
use crate::time::format_http_date;
use crate::{Context, Error, Result};

/// Executor drives one signed operation from request to verified response.
///
/// One instance is shared by any number of concurrent calls; everything
/// mutable behind it is either per-call or safely shared (the credential
/// cache and the clock offset). Each attempt gets a fresh signature so a
/// retry is never rejected for a stale timestamp.
#[derive(Debug, Clone)]
pub struct Executor {
    ctx: Context,
    config: Config,
    signer: RequestSigner,
    credentials: CredentialCache,
    clock: ClockOffset,
}

impl Executor {
    /// Create an executor over the given context, config, and credential
    /// source.
    pub fn new(
        ctx: Context,
        config: Config,
        provider: impl ProvideCredential,
    ) -> Result<Self> {
        config.validate()?;
        let signer = RequestSigner::new(config.signing_version, &config.bucket, &config.region);

        Ok(Self {
            ctx,
            config,
            signer,
            credentials: CredentialCache::new(provider),
            clock: ClockOffset::new(),
        })
    }

    /// The skew-corrected clock this executor signs with.
    pub fn clock(&self) -> &ClockOffset {
        &self.clock
    }

    /// Execute one operation to completion.
    pub async fn execute(&self, req: OperationRequest) -> Result<OperationResponse> {
        self.execute_cancellable(req, &CancellationToken::new())
            .await
    }

    /// Execute one operation, stopping at the next await point once `cancel`
    /// fires. A cancelled call returns [`ErrorKind::Cancelled`] and sends
    /// nothing further.
    ///
    /// [`ErrorKind::Cancelled`]: crate::ErrorKind::Cancelled
    pub async fn execute_cancellable(
        &self,
        req: OperationRequest,
        cancel: &CancellationToken,
    ) -> Result<OperationResponse> {
        if cancel.is_cancelled() {
            return Err(Error::cancelled(format!(
                "operation {} cancelled before any attempt",
                req.operation
            )));
        }

        let deadline = self.config.call_timeout.map(|t| Instant::now() + t);

        // The body is drained exactly once, before the attempt loop, so the
        // checksum and progress reports cover every byte exactly once no
        // matter how many attempts follow.
        let mut upload = IntegrityStream::new(
            req.checksum_seed,
            Some(req.body.len()),
            req.progress.clone(),
        );
        let body = req.body_bytes();
        match &req.body {
            RequestBody::Empty => {}
            RequestBody::Bytes(b) => upload.observe(b),
            RequestBody::Chunks(cs) => {
                for c in cs {
                    upload.observe(c);
                }
            }
        }

        let cred = self.credential().await?;

        let mut attempt: u32 = 0;
        let mut skew_corrected = false;
        loop {
            let err = match self
                .attempt(&req, &body, &cred, cancel, deadline)
                .await
            {
                Ok(response) => {
                    return self.verify_response(&req, &upload, response);
                }
                Err(err) => err,
            };

            // A skew rejection is a clock problem, not a service problem: fix
            // the clock once per call without consuming the retry budget. A
            // second rejection in the same call means correction did not help
            // and surfaces as an ordinary service error.
            if !skew_corrected {
                if let Some(server_time) = err.service().and_then(|s| {
                    err.response_headers()
                        .and_then(|headers| detect_skew(s, headers))
                }) {
                    warn!(
                        "operation {}: request time rejected, correcting clock",
                        req.operation
                    );
                    self.clock.record(server_time);
                    skew_corrected = true;
                    continue;
                }
            }

            match self.config.retry.classify(&err) {
                Classification::Terminal => {
                    return Err(err.with_attempts(attempt + 1));
                }
                Classification::RetryableTransport | Classification::RetryableServer => {
                    if !self.config.retry.should_retry(attempt) {
                        return Err(err.with_attempts(attempt + 1));
                    }
                }
            }

            let delay = self.config.retry.backoff(attempt);
            debug!(
                "operation {}: attempt {} failed ({err}), retrying in {delay:?}",
                req.operation,
                attempt + 1
            );
            if let Some(deadline) = deadline {
                if Instant::now() + delay >= deadline {
                    return Err(Error::timed_out(format!(
                        "operation {} exceeded its deadline while backing off",
                        req.operation
                    ))
                    .with_attempts(attempt + 1));
                }
            }
            tokio::select! {
                _ = cancel.cancelled() => {
                    return Err(Error::cancelled(format!(
                        "operation {} cancelled during backoff",
                        req.operation
                    )));
                }
                _ = tokio::time::sleep(delay) => {}
            }

            attempt += 1;
        }
    }

    /// Produce a presigned URL for the operation without sending anything.
    ///
    /// The transport is never touched: the signature is computed locally from
    /// the cached credential and the skew-corrected clock.
    pub async fn presign(
        &self,
        req: &OperationRequest,
        expires_in: Duration,
    ) -> Result<PresignedRequest> {
        let cred = self.credential().await?;
        let time = self.clock.now();

        let mut headers = req.headers.clone();
        headers.insert(HOST, self.config.authority().parse()?);

        let (sctx, query) = self.signer.presign(
            &req.method,
            &req.path(),
            &req.query,
            &headers,
            &cred,
            time,
            expires_in,
        )?;

        let encoded_query: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| (crate::canonical::query_encode(k), crate::canonical::query_encode(v)))
            .collect();
        let (scheme, _) = self.config.scheme_and_host();
        let uri = build_uri(
            scheme,
            &self.config.authority(),
            &uri_encode(&req.path()),
            &encoded_query,
        )?;

        let delta = chrono::TimeDelta::from_std(expires_in)
            .map_err(|e| Error::request_invalid(format!("invalid expiration duration: {e}")))?;

        Ok(PresignedRequest {
            method: req.method.clone(),
            url: uri.to_string(),
            expires_at: time + delta,
            signed_headers: sctx.signed_headers,
        })
    }

    async fn credential(&self) -> Result<Credential> {
        self.credentials
            .get(&self.ctx)
            .await?
            .ok_or_else(|| Error::config_invalid("no credential available for signing"))
    }

    /// Send one fully signed attempt. Returns the raw response on any status;
    /// non-2xx is turned into a service error here so the caller classifies a
    /// single error type.
    async fn attempt(
        &self,
        req: &OperationRequest,
        body: &Bytes,
        cred: &Credential,
        cancel: &CancellationToken,
        deadline: Option<Instant>,
    ) -> Result<http::Response<Bytes>> {
        let time = self.clock.now();
        let authority = self.config.authority();

        let mut headers = req.headers.clone();
        headers.insert(HOST, authority.parse()?);
        match self.config.signing_version {
            SigningVersion::V1 => {
                headers.insert(DATE, format_http_date(time).parse()?);
            }
            SigningVersion::V4 => {
                headers.insert(X_OSS_DATE, crate::time::format_iso8601(time).parse()?);
                headers.insert(X_OSS_CONTENT_SHA_256, UNSIGNED_PAYLOAD.parse()?);
            }
        }
        if let Some(token) = &cred.security_token {
            headers.insert(X_OSS_SECURITY_TOKEN, token.parse()?);
        }

        let creq = CanonicalRequest::build(&req.method, &req.path(), &req.query, &headers)?;
        let (_, auth) = self.signer.authorization(&creq, cred, time)?;
        headers.insert(AUTHORIZATION, auth);

        let (scheme, _) = self.config.scheme_and_host();
        let uri = build_uri(scheme, &authority, &creq.path, &creq.query)?;

        let mut http_req = http::Request::builder()
            .method(req.method.clone())
            .uri(uri)
            .body(body.clone())?;
        *http_req.headers_mut() = headers;

        let timeout = match deadline {
            Some(deadline) => {
                let remaining = deadline.saturating_duration_since(Instant::now());
                if remaining.is_zero() {
                    return Err(Error::timed_out(format!(
                        "operation {} exceeded its deadline",
                        req.operation
                    )));
                }
                self.config.attempt_timeout.min(remaining)
            }
            None => self.config.attempt_timeout,
        };

        let response = tokio::select! {
            _ = cancel.cancelled() => {
                return Err(Error::cancelled(format!(
                    "operation {} cancelled in flight",
                    req.operation
                )));
            }
            sent = tokio::time::timeout(timeout, self.ctx.http_send(http_req)) => match sent {
                Ok(result) => result?,
                Err(_) => {
                    return Err(Error::transport(format!(
                        "operation {} attempt timed out after {timeout:?}",
                        req.operation
                    )));
                }
            }
        };

        if !response.status().is_success() {
            let service = ServiceError::from_response(response.status(), response.body());
            let headers = response.headers().clone();
            return Err(Error::service_error(service).with_response_headers(headers));
        }

        Ok(response)
    }

    /// Check the completed response against the locally computed checksum and
    /// shape it for the caller.
    fn verify_response(
        &self,
        req: &OperationRequest,
        upload: &IntegrityStream,
        response: http::Response<Bytes>,
    ) -> Result<OperationResponse> {
        let (parts, body) = response.into_parts();

        if self.config.verify_checksum {
            if req.body.is_empty() {
                // Download: checksum the received bytes.
                let mut download =
                    IntegrityStream::new(req.checksum_seed, Some(body.len() as u64), None);
                download.observe(&body);
                download.verify(&parts.headers)?;
            } else {
                // Upload: the service reports the checksum of what it stored.
                upload.verify(&parts.headers)?;
            }
        }

        Ok(OperationResponse {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }
}
