use std::fmt::Write;
use std::time::Duration;

use http::{HeaderMap, HeaderValue, Method};
use log::debug;
use percent_encoding::percent_decode_str;

use crate::canonical::CanonicalRequest;
use crate::constants::*;
use crate::credential::Credential;
use crate::hash::{base64_hmac_sha1, hex_hmac_sha256, hex_sha256, hmac_sha256};
use crate::time::{format_date, format_http_date, format_iso8601, DateTime};
use crate::{Error, Result};

/// The signature algorithm placed on a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningVersion {
    /// Legacy HMAC-SHA1 signature over a string-to-sign, sent as
    /// `Authorization: OSS {access_key_id}:{signature}`.
    V1,
    /// Date-scoped HMAC-SHA256 signature over the hashed canonical request,
    /// keyed by a per-day derived key.
    V4,
}

/// Everything derived for one signature: never persisted, never shared.
#[derive(Debug)]
pub struct SigningContext {
    /// The timestamp placed in the signature, already skew-corrected.
    pub time: DateTime,
    /// Which algorithm produced the signature.
    pub version: SigningVersion,
    /// Credential scope `{date}/{region}/{service}/aliyun_v4_request`,
    /// V4 only.
    pub scope: Option<String>,
    /// Names of the headers that were actually signed.
    pub signed_headers: Vec<String>,
}

/// RequestSigner computes signatures for one bucket.
///
/// Pure: it performs no I/O and reads nothing but its arguments, so a
/// presigned URL can be produced entirely offline. Signing fails only when
/// the credential is unusable, which is a terminal configuration error.
#[derive(Debug, Clone)]
pub struct RequestSigner {
    version: SigningVersion,
    bucket: String,
    region: String,
    service: String,
}

impl RequestSigner {
    /// Create a new signer for the given bucket and region.
    pub fn new(version: SigningVersion, bucket: &str, region: &str) -> Self {
        Self {
            version,
            bucket: bucket.to_string(),
            region: region.to_string(),
            service: "oss".to_string(),
        }
    }

    /// Compute the `Authorization` header for a canonical request.
    pub fn authorization(
        &self,
        creq: &CanonicalRequest,
        cred: &Credential,
        time: DateTime,
    ) -> Result<(SigningContext, HeaderValue)> {
        check_credential(cred)?;

        let (ctx, value) = match self.version {
            SigningVersion::V1 => {
                let string_to_sign = self.string_to_sign_v1(creq, &format_http_date(time))?;
                debug!("calculated string to sign: {string_to_sign}");
                let signature =
                    base64_hmac_sha1(cred.access_key_secret.as_bytes(), string_to_sign.as_bytes());
                (
                    self.signing_context(creq, time, None),
                    format!("OSS {}:{}", cred.access_key_id, signature),
                )
            }
            SigningVersion::V4 => {
                let scope = self.scope(time);
                let signature = self.signature_v4(creq, cred, time, &scope)?;
                (
                    self.signing_context(creq, time, Some(scope.clone())),
                    format!(
                        "OSS4-HMAC-SHA256 Credential={}/{},Signature={}",
                        cred.access_key_id, scope, signature
                    ),
                )
            }
        };

        let mut header: HeaderValue = value.parse()?;
        header.set_sensitive(true);
        Ok((ctx, header))
    }

    /// Compute the presign query parameters for an operation.
    ///
    /// Returns the complete query list to place on the URL: the operation's
    /// own parameters plus credential identifier, timestamp, expiry,
    /// signed-header list, and the signature itself.
    pub fn presign(
        &self,
        method: &Method,
        path: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
        cred: &Credential,
        time: DateTime,
        expires_in: Duration,
    ) -> Result<(SigningContext, Vec<(String, String)>)> {
        check_credential(cred)?;

        let mut query = query.to_vec();

        match self.version {
            SigningVersion::V1 => {
                if let Some(token) = &cred.security_token {
                    query.push(("security-token".to_string(), token.clone()));
                }

                let creq = CanonicalRequest::build(method, path, &query, headers)?;
                let expires_at = expires_epoch(time, expires_in)?;
                let string_to_sign = self.string_to_sign_v1(&creq, &expires_at.to_string())?;
                debug!("calculated string to sign: {string_to_sign}");
                let signature =
                    base64_hmac_sha1(cred.access_key_secret.as_bytes(), string_to_sign.as_bytes());

                query.push(("OSSAccessKeyId".to_string(), cred.access_key_id.clone()));
                query.push(("Expires".to_string(), expires_at.to_string()));
                query.push(("Signature".to_string(), signature));

                Ok((self.signing_context(&creq, time, None), query))
            }
            SigningVersion::V4 => {
                let scope = self.scope(time);
                query.push((
                    X_OSS_SIGNATURE_VERSION.to_string(),
                    "OSS4-HMAC-SHA256".to_string(),
                ));
                query.push((
                    X_OSS_CREDENTIAL.to_string(),
                    format!("{}/{}", cred.access_key_id, scope),
                ));
                query.push((X_OSS_DATE.to_string(), format_iso8601(time)));
                query.push((
                    X_OSS_EXPIRES.to_string(),
                    expires_in.as_secs().to_string(),
                ));
                if let Some(token) = &cred.security_token {
                    query.push((X_OSS_SECURITY_TOKEN.to_string(), token.clone()));
                }

                let creq = CanonicalRequest::build(method, path, &query, headers)?;
                let signature = self.signature_v4(&creq, cred, time, &scope)?;
                query.push((X_OSS_SIGNATURE.to_string(), signature));

                Ok((self.signing_context(&creq, time, Some(scope)), query))
            }
        }
    }

    fn signing_context(
        &self,
        creq: &CanonicalRequest,
        time: DateTime,
        scope: Option<String>,
    ) -> SigningContext {
        SigningContext {
            time,
            version: self.version,
            scope,
            signed_headers: creq
                .signed_header_names()
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }

    /// Scope: `20220313/<region>/oss/aliyun_v4_request`
    fn scope(&self, time: DateTime) -> String {
        format!(
            "{}/{}/{}/aliyun_v4_request",
            format_date(time),
            self.region,
            self.service
        )
    }

    /// Legacy string-to-sign:
    ///
    /// ```text
    /// VERB
    /// content-md5
    /// content-type
    /// <http date or expiry epoch>
    /// x-oss-name:value (each on its own line)
    /// /bucket/path?sorted-query
    /// ```
    fn string_to_sign_v1(&self, creq: &CanonicalRequest, date_or_expiry: &str) -> Result<String> {
        let mut f = String::with_capacity(256);

        writeln!(f, "{}", creq.method.as_str().to_uppercase())?;
        writeln!(f, "{}", creq.header_get_or_default("content-md5"))?;
        writeln!(f, "{}", creq.header_get_or_default("content-type"))?;
        writeln!(f, "{date_or_expiry}")?;
        for (name, value) in creq.prefixed_headers() {
            writeln!(f, "{name}:{value}")?;
        }
        write!(f, "{}", self.canonical_resource(creq))?;

        Ok(f)
    }

    /// Resource for the legacy string-to-sign, percent-decoded.
    fn canonical_resource(&self, creq: &CanonicalRequest) -> String {
        let path = percent_decode_str(&creq.path).decode_utf8_lossy();
        let mut s = format!("/{}{}", self.bucket, path);

        for (i, (k, v)) in creq.query.iter().enumerate() {
            s.push(if i == 0 { '?' } else { '&' });
            s.push_str(&percent_decode_str(k).decode_utf8_lossy());
            if !v.is_empty() {
                s.push('=');
                s.push_str(&percent_decode_str(v).decode_utf8_lossy());
            }
        }

        s
    }

    /// Date-scoped signature over the hashed canonical request.
    fn signature_v4(
        &self,
        creq: &CanonicalRequest,
        cred: &Credential,
        time: DateTime,
        scope: &str,
    ) -> Result<String> {
        let canonical = creq.to_canonical_string()?;
        debug!("calculated canonical request: {canonical}");

        // StringToSign:
        //
        // OSS4-HMAC-SHA256
        // 20220313T072004Z
        // 20220313/<region>/oss/aliyun_v4_request
        // <hashed_canonical_request>
        let mut string_to_sign = String::with_capacity(128);
        writeln!(string_to_sign, "OSS4-HMAC-SHA256")?;
        writeln!(string_to_sign, "{}", format_iso8601(time))?;
        writeln!(string_to_sign, "{scope}")?;
        write!(string_to_sign, "{}", hex_sha256(canonical.as_bytes()))?;
        debug!("calculated string to sign: {string_to_sign}");

        let key = self.signing_key(&cred.access_key_secret, time);
        Ok(hex_hmac_sha256(&key, string_to_sign.as_bytes()))
    }

    /// Derive the per-day signing key by chaining HMACs over the scope parts.
    fn signing_key(&self, secret: &str, time: DateTime) -> Vec<u8> {
        let secret = format!("aliyun_v4{secret}");
        let sign_date = hmac_sha256(secret.as_bytes(), format_date(time).as_bytes());
        let sign_region = hmac_sha256(&sign_date, self.region.as_bytes());
        let sign_service = hmac_sha256(&sign_region, self.service.as_bytes());
        hmac_sha256(&sign_service, b"aliyun_v4_request")
    }
}

/// Convert the signing time plus validity window into an epoch expiry.
fn expires_epoch(time: DateTime, expires_in: Duration) -> Result<i64> {
    let delta = chrono::TimeDelta::from_std(expires_in)
        .map_err(|e| Error::request_invalid(format!("invalid expiration duration: {e}")))?;
    Ok((time + delta).timestamp())
}

fn check_credential(cred: &Credential) -> Result<()> {
    if cred.access_key_id.is_empty() || cred.access_key_secret.is_empty() {
        return Err(Error::config_invalid(
            "cannot sign request: credentials are absent",
        ));
    }
    Ok(())
}
