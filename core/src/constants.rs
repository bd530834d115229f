use percent_encoding::AsciiSet;
use percent_encoding::NON_ALPHANUMERIC;

/// Prefix of the service's custom headers. Every header carrying it
/// participates in signing.
pub const HEADER_PREFIX: &str = "x-oss-";

// Headers used by the storage service.
pub const X_OSS_DATE: &str = "x-oss-date";
pub const X_OSS_CONTENT_SHA_256: &str = "x-oss-content-sha256";
pub const X_OSS_SECURITY_TOKEN: &str = "x-oss-security-token";
pub const X_OSS_HASH_CRC64_ECMA: &str = "x-oss-hash-crc64ecma";
pub const X_OSS_REQUEST_ID: &str = "x-oss-request-id";

// Presign query parameters, v4 signatures.
pub const X_OSS_SIGNATURE_VERSION: &str = "x-oss-signature-version";
pub const X_OSS_CREDENTIAL: &str = "x-oss-credential";
pub const X_OSS_EXPIRES: &str = "x-oss-expires";
pub const X_OSS_SIGNATURE: &str = "x-oss-signature";

/// Placeholder body hash when the payload is not signed.
pub const UNSIGNED_PAYLOAD: &str = "UNSIGNED-PAYLOAD";

/// Error code the service uses to reject a request whose timestamp is outside
/// its acceptance window.
pub const ERROR_CODE_TIME_TOO_SKEWED: &str = "RequestTimeTooSkewed";

// Env values used by the credential providers.
pub const ALIBABA_CLOUD_ACCESS_KEY_ID: &str = "ALIBABA_CLOUD_ACCESS_KEY_ID";
pub const ALIBABA_CLOUD_ACCESS_KEY_SECRET: &str = "ALIBABA_CLOUD_ACCESS_KEY_SECRET";
pub const ALIBABA_CLOUD_SECURITY_TOKEN: &str = "ALIBABA_CLOUD_SECURITY_TOKEN";

/// AsciiSet for percent-encoding a resource path.
///
/// Encode every byte except the unreserved characters 'A'-'Z', 'a'-'z',
/// '0'-'9', '-', '.', '_', '~', keeping '/' intact. Space becomes `%20` and
/// '+' becomes `%2B`, never the other way around.
pub static URI_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'/')
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

/// AsciiSet for percent-encoding query keys and values.
///
/// Same as [`URI_ENCODE_SET`] but '/' is encoded as well.
pub static QUERY_ENCODE_SET: AsciiSet = NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');
