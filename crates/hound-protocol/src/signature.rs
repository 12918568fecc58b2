//! Request signature chain.
//!
//! Every request is signed with a three-link HMAC-SHA-256 chain. Each link's
//! digest becomes the key of the next link:
//!
//! 1. `OperationKey`: key = token key, message = `METHOD ++ URI` (no delimiter)
//! 2. `DateKey`: key = OperationKey, message = request date cut to the hour
//!    (`2020-12-01T23`)
//! 3. body: key = DateKey, message = request body, or nothing at all
//!
//! The server recomputes the chain from the `RequestDate` header and its own
//! copy of the token key, so a signature is only valid for the method, URI,
//! body, and hour it was produced for.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, FixedOffset, SecondsFormat};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::{
    Method, AUTH_SCHEME, CONTENT_TYPE_JSON, HEADER_AUTHORIZATION, HEADER_CONTENT_TYPE,
    HEADER_REQUEST_DATE, HEADER_SIGNATURE, HEADER_USER_AGENT,
};

type HmacSha256 = Hmac<Sha256>;

/// Length of the request date prefix bound into the chain (`YYYY-MM-DDTHH`).
pub const DATE_KEY_LEN: usize = 13;

/// Raw signature bytes (one SHA-256 block).
pub type Signature = [u8; 32];

/// Signing errors.
///
/// HMAC accepts keys of any length, so this is only reachable through a
/// defect in the underlying MAC implementation.
#[derive(Debug, thiserror::Error)]
pub enum SigningError {
    #[error("HMAC rejected key at chain link {link}")]
    InvalidKey { link: u8 },
}

/// Render a timestamp the way it is sent in the `RequestDate` header.
///
/// RFC 3339 with microseconds and a numeric offset, e.g.
/// `2020-12-01T23:59:59.123456-05:00`.
pub fn format_request_date(timestamp: &DateTime<FixedOffset>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, false)
}

/// The hour-granularity prefix of a request date.
pub fn date_key(request_date: &str) -> &str {
    request_date.get(..DATE_KEY_LEN).unwrap_or(request_date)
}

fn mac_for(key: &[u8], link: u8) -> Result<HmacSha256, SigningError> {
    HmacSha256::new_from_slice(key).map_err(|_| SigningError::InvalidKey { link })
}

/// Run links 1 and 2 and return a MAC keyed for the body link.
fn body_link(
    method: Method,
    uri: &str,
    token_key: &[u8],
    request_date: &str,
) -> Result<HmacSha256, SigningError> {
    let mut operation = mac_for(token_key, 1)?;
    operation.update(method.as_str().as_bytes());
    operation.update(uri.as_bytes());
    let operation_key = operation.finalize().into_bytes();

    let mut date = mac_for(&operation_key, 2)?;
    date.update(date_key(request_date).as_bytes());
    let date_key = date.finalize().into_bytes();

    mac_for(&date_key, 3)
}

/// Compute the signature for a request.
///
/// `request_date` is the full header value; only its first 13 characters
/// are bound into the chain. With no body the final link is computed over
/// zero bytes.
pub fn sign(
    method: Method,
    uri: &str,
    token_key: &[u8],
    request_date: &str,
    body: Option<&[u8]>,
) -> Result<Signature, SigningError> {
    let mut mac = body_link(method, uri, token_key, request_date)?;
    if let Some(body) = body {
        mac.update(body);
    }
    Ok(to_signature(&mac.finalize().into_bytes()))
}

fn to_signature(bytes: &[u8]) -> Signature {
    let mut signature = [0u8; 32];
    signature.copy_from_slice(bytes);
    signature
}

/// Check a base64 signature against a recomputed chain (constant time).
pub fn verify(
    method: Method,
    uri: &str,
    token_key: &[u8],
    request_date: &str,
    body: Option<&[u8]>,
    signature_b64: &str,
) -> bool {
    let Ok(presented) = STANDARD.decode(signature_b64) else {
        return false;
    };
    let Ok(mut mac) = body_link(method, uri, token_key, request_date) else {
        return false;
    };
    if let Some(body) = body {
        mac.update(body);
    }
    mac.verify_slice(&presented).is_ok()
}

/// A signed request, ready to be turned into headers.
///
/// Never persisted; recomputed for every call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: Method,
    pub uri: String,
    /// Untruncated `RequestDate` header value
    pub request_date: String,
    pub body: Option<Vec<u8>>,
    pub signature: Signature,
}

impl SignedRequest {
    /// Sign `method`/`uri`/`body` at `timestamp` with `token_key`
    pub fn new(
        method: Method,
        uri: impl Into<String>,
        token_key: &[u8],
        timestamp: &DateTime<FixedOffset>,
        body: Option<Vec<u8>>,
    ) -> Result<Self, SigningError> {
        let uri = uri.into();
        let request_date = format_request_date(timestamp);
        let signature = sign(method, &uri, token_key, &request_date, body.as_deref())?;
        Ok(Self {
            method,
            uri,
            request_date,
            body,
            signature,
        })
    }

    /// Signature encoded for the `Signature` header
    pub fn signature_base64(&self) -> String {
        STANDARD.encode(self.signature)
    }

    /// Full header set for this request.
    ///
    /// `Content-Type` is only present when the request has a body.
    pub fn headers(&self, client_id: &str, token_id: &str) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (HEADER_USER_AGENT, client_id.to_string()),
            (HEADER_AUTHORIZATION, format!("{} {}", AUTH_SCHEME, token_id)),
            (HEADER_REQUEST_DATE, self.request_date.clone()),
            (HEADER_SIGNATURE, self.signature_base64()),
        ];
        if self.body.is_some() {
            headers.push((HEADER_CONTENT_TYPE, CONTENT_TYPE_JSON.to_string()));
        }
        headers
    }
}
