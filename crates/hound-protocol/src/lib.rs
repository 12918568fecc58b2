//! Hound Protocol Types
//!
//! Defines the HTTP surface of the graph ingestion API: endpoint paths,
//! request/response bodies, job status codes, and the HMAC signature chain
//! every request carries.

pub mod error;
pub mod ops;
pub mod signature;

pub use error::{ServerError, ServerErrorDetail};
pub use ops::upload::{JobStatus, UploadBody, UploadMeta};
pub use ops::Envelope;
pub use signature::{SignedRequest, SigningError};

use std::fmt;

use serde::{Deserialize, Serialize};

/// Authorization scheme expected by the server for token-signed requests.
pub const AUTH_SCHEME: &str = "bhesignature";

/// Header carrying the client identifier.
pub const HEADER_USER_AGENT: &str = "User-Agent";

/// Header carrying `<scheme> <token_id>`.
pub const HEADER_AUTHORIZATION: &str = "Authorization";

/// Header carrying the untruncated timestamp used in the signature chain.
pub const HEADER_REQUEST_DATE: &str = "RequestDate";

/// Header carrying the base64 signature.
pub const HEADER_SIGNATURE: &str = "Signature";

/// Header carrying the body content type.
pub const HEADER_CONTENT_TYPE: &str = "Content-Type";

/// Content type sent with every request body.
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// HTTP methods used by the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
}

impl Method {
    /// Returns the wire representation of the method
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
