use std::fmt::Write;

use http::{HeaderMap, Method};
use percent_encoding::{percent_decode_str, utf8_percent_encode};

use crate::constants::{HEADER_PREFIX, QUERY_ENCODE_SET, UNSIGNED_PAYLOAD, URI_ENCODE_SET, X_OSS_CONTENT_SHA_256};
use crate::Result;

/// The deterministic serialization of a request's signable fields.
///
/// Identical logical input always yields identical bytes, regardless of the
/// order headers or query parameters were inserted. That property is what
/// makes signature test vectors reproducible and presigned URLs generated
/// twice with the same timestamp byte-identical.
#[derive(Debug)]
pub struct CanonicalRequest {
    /// Uppercased HTTP method.
    pub method: Method,
    /// Percent-encoded path, `/` preserved.
    pub path: String,
    /// Query pairs, percent-encoded and sorted by encoded key then value.
    pub query: Vec<(String, String)>,
    /// Signed headers: lowercased names, normalized values, sorted by name.
    pub headers: Vec<(String, String)>,
    /// Body hash, or the unsigned-payload placeholder.
    pub body_hash: String,
}

impl CanonicalRequest {
    /// Build a canonical request from the signable parts of an operation.
    ///
    /// `path` is the raw (`/`-prefixed, possibly percent-encoded) resource
    /// path; it is decoded first so the encoding below is never applied
    /// twice.
    pub fn build(
        method: &Method,
        path: &str,
        query: &[(String, String)],
        headers: &HeaderMap,
    ) -> Result<Self> {
        let decoded_path = percent_decode_str(path).decode_utf8_lossy();
        let encoded_path = utf8_percent_encode(&decoded_path, &URI_ENCODE_SET).to_string();

        let mut encoded_query: Vec<(String, String)> = query
            .iter()
            .map(|(k, v)| {
                (
                    utf8_percent_encode(k, &QUERY_ENCODE_SET).to_string(),
                    utf8_percent_encode(v, &QUERY_ENCODE_SET).to_string(),
                )
            })
            .collect();
        encoded_query.sort();

        let mut signed_headers = Vec::new();
        for (name, value) in headers {
            let name = name.as_str().to_lowercase();
            if !is_signed_header(&name) {
                continue;
            }
            let value = value.to_str()?;
            signed_headers.push((name, normalize_header_value(value)));
        }
        signed_headers.sort();

        let body_hash = headers
            .get(X_OSS_CONTENT_SHA_256)
            .and_then(|v| v.to_str().ok())
            .unwrap_or(UNSIGNED_PAYLOAD)
            .to_string();

        Ok(Self {
            method: method.clone(),
            path: encoded_path,
            query: encoded_query,
            headers: signed_headers,
            body_hash,
        })
    }

    /// Names of the headers that participate in signing, sorted.
    pub fn signed_header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(k, _)| k.as_str()).collect()
    }

    /// Canonical query string, `k=v` pairs joined with `&`, bare markers kept
    /// bare.
    pub fn query_string(&self) -> String {
        let mut s = String::with_capacity(16);
        for (i, (k, v)) in self.query.iter().enumerate() {
            if i > 0 {
                s.push('&');
            }
            s.push_str(k);
            if !v.is_empty() {
                s.push('=');
                s.push_str(v);
            }
        }
        s
    }

    /// Serialize into the canonical byte string used as signature input.
    ///
    /// Field order is fixed: method, path, query, header lines, blank line,
    /// signed-header-name list, body hash.
    pub fn to_canonical_string(&self) -> Result<String> {
        // 256 is specially chosen to avoid reallocation for most requests.
        let mut f = String::with_capacity(256);

        writeln!(f, "{}", self.method.as_str().to_uppercase())?;
        writeln!(f, "{}", self.path)?;
        writeln!(f, "{}", self.query_string())?;
        for (name, value) in &self.headers {
            writeln!(f, "{name}:{value}")?;
        }
        writeln!(f)?;
        writeln!(f, "{}", self.signed_header_names().join(";"))?;
        write!(f, "{}", self.body_hash)?;

        Ok(f)
    }

    /// Look up a signed header value by lowercase name.
    ///
    /// Returns empty string if the header was not signed.
    pub fn header_get_or_default(&self, name: &str) -> &str {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .unwrap_or_default()
    }

    /// Signed headers carrying the service prefix, already sorted.
    pub fn prefixed_headers(&self) -> impl Iterator<Item = &(String, String)> {
        self.headers
            .iter()
            .filter(|(k, _)| k.starts_with(HEADER_PREFIX))
    }
}

/// A header participates in signing when it locates the resource, carries a
/// timestamp, describes the payload, or belongs to the service's own prefix.
fn is_signed_header(name: &str) -> bool {
    name == "host"
        || name == "date"
        || name == "content-type"
        || name == "content-md5"
        || name.starts_with(HEADER_PREFIX)
}

/// Trim surrounding whitespace and collapse internal runs to a single space.
fn normalize_header_value(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Percent-encode one query key or value with the canonical table.
pub(crate) fn query_encode(v: &str) -> String {
    utf8_percent_encode(v, &QUERY_ENCODE_SET).to_string()
}

/// Percent-encode a resource path, `/` preserved. Decodes first so an
/// already-encoded path is not encoded twice.
pub(crate) fn uri_encode(path: &str) -> String {
    let decoded = percent_decode_str(path).decode_utf8_lossy();
    utf8_percent_encode(&decoded, &URI_ENCODE_SET).to_string()
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;
    use pretty_assertions::assert_eq;

    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(
                http::header::HeaderName::from_bytes(k.as_bytes()).unwrap(),
                HeaderValue::from_str(v).unwrap(),
            );
        }
        map
    }

    #[test]
    fn test_insertion_order_is_irrelevant() {
        let h1 = headers(&[
            ("host", "bucket.example.com"),
            ("x-oss-meta-a", "1"),
            ("x-oss-meta-b", "2"),
        ]);
        let h2 = headers(&[
            ("x-oss-meta-b", "2"),
            ("host", "bucket.example.com"),
            ("x-oss-meta-a", "1"),
        ]);

        let q1 = vec![
            ("b".to_string(), "2".to_string()),
            ("a".to_string(), "1".to_string()),
        ];
        let q2 = vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ];

        let c1 = CanonicalRequest::build(&Method::GET, "/key", &q1, &h1).unwrap();
        let c2 = CanonicalRequest::build(&Method::GET, "/key", &q2, &h2).unwrap();

        assert_eq!(
            c1.to_canonical_string().unwrap(),
            c2.to_canonical_string().unwrap()
        );
    }

    #[test]
    fn test_unsigned_headers_are_excluded() {
        let h = headers(&[
            ("host", "bucket.example.com"),
            ("user-agent", "reqexec/0.1"),
            ("accept", "*/*"),
        ]);
        let c = CanonicalRequest::build(&Method::GET, "/", &[], &h).unwrap();
        assert_eq!(c.signed_header_names(), vec!["host"]);
    }

    #[test]
    fn test_space_and_plus_encoding() {
        let q = vec![("prefix".to_string(), "a+b c".to_string())];
        let c = CanonicalRequest::build(&Method::GET, "/a+b c", &q, &HeaderMap::new()).unwrap();

        // '+' and space must encode identically in path and query.
        assert_eq!(c.path, "/a%2Bb%20c");
        assert_eq!(c.query_string(), "prefix=a%2Bb%20c");
    }

    #[test]
    fn test_slash_preserved_in_path_encoded_in_query() {
        let q = vec![("prefix".to_string(), "photos/2024".to_string())];
        let c =
            CanonicalRequest::build(&Method::GET, "/dir/file.txt", &q, &HeaderMap::new()).unwrap();

        assert_eq!(c.path, "/dir/file.txt");
        assert_eq!(c.query_string(), "prefix=photos%2F2024");
    }

    #[test]
    fn test_already_encoded_path_is_not_double_encoded() {
        let c = CanonicalRequest::build(&Method::GET, "/a%20b", &[], &HeaderMap::new()).unwrap();
        assert_eq!(c.path, "/a%20b");
    }

    #[test]
    fn test_header_value_normalization() {
        let h = headers(&[("x-oss-meta-note", "  a   b  c ")]);
        let c = CanonicalRequest::build(&Method::PUT, "/", &[], &h).unwrap();
        assert_eq!(c.header_get_or_default("x-oss-meta-note"), "a b c");
    }

    #[test]
    fn test_canonical_string_layout() {
        let h = headers(&[("host", "b.example.com"), ("x-oss-date", "20220313T072004Z")]);
        let q = vec![("acl".to_string(), String::new())];
        let c = CanonicalRequest::build(&Method::PUT, "/key", &q, &h).unwrap();

        assert_eq!(
            c.to_canonical_string().unwrap(),
            "PUT\n\
             /key\n\
             acl\n\
             host:b.example.com\n\
             x-oss-date:20220313T072004Z\n\
             \n\
             host;x-oss-date\n\
             UNSIGNED-PAYLOAD"
        );
    }

    #[test]
    fn test_query_sorted_by_encoded_key_then_value() {
        let q = vec![
            ("k".to_string(), "2".to_string()),
            ("k".to_string(), "1".to_string()),
        ];
        let c = CanonicalRequest::build(&Method::GET, "/", &q, &HeaderMap::new()).unwrap();
        assert_eq!(c.query_string(), "k=1&k=2");
    }
}
