//! Canonical string construction and HMAC signing.
//!
//! GET-class calls (plain GET and file download) sign the path plus the
//! form-encoded query. POST-class calls (JSON body and multipart upload) sign
//! the bare path: the body is never part of the signature.

use crate::clock::{Clock, SystemClock};
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use storelink_core::{encode_query, Credentials, Payload};
use tracing::trace;

type HmacSha256 = Hmac<Sha256>;

/// Which part of the request feeds the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignMethod {
    /// Path plus query string.
    Get,
    /// Path only.
    Post,
}

/// Output of one signing pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Wall-clock milliseconds captured for this request.
    pub nonce: u64,
    /// Base64 HMAC-SHA256 of the canonical string.
    pub signature: String,
    /// Signed URI: path, plus `?query` for GET-class calls with a payload.
    pub uri: String,
}

/// Build the URI that is signed (and, for GET-class calls, requested).
///
/// The `?` separator is only added when the encoded query is non-empty.
pub fn signing_uri(method: SignMethod, path: &str, payload: &Payload) -> String {
    match method {
        SignMethod::Post => path.to_string(),
        SignMethod::Get => {
            let query = encode_query(payload);
            if query.is_empty() {
                path.to_string()
            } else {
                format!("{path}?{query}")
            }
        }
    }
}

/// `nonce + "\n" + access_key + "\n" + uri`.
pub fn canonical_string(nonce: u64, access_key: &str, uri: &str) -> String {
    format!("{nonce}\n{access_key}\n{uri}")
}

/// HMAC-SHA256 of `data` keyed by `key`, standard base64 with padding.
pub fn hmac_sha256_base64(data: &str, key: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(key.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// URL-safe base64 of the UTF-8 bytes of `input`, without padding.
pub fn base64url_encode(input: &str) -> String {
    URL_SAFE_NO_PAD.encode(input.as_bytes())
}

/// Signs datastore requests with a fixed credential pair.
///
/// Stateless apart from the clock: each call captures a fresh nonce. Two
/// calls in the same millisecond get the same nonce; nothing guards that.
pub struct RequestSigner<C: Clock = SystemClock> {
    credentials: Credentials,
    clock: C,
}

impl RequestSigner<SystemClock> {
    /// Create a signer using wall-clock time.
    pub fn new(credentials: Credentials) -> Self {
        Self::with_clock(credentials, SystemClock)
    }
}

impl<C: Clock> RequestSigner<C> {
    pub fn with_clock(credentials: Credentials, clock: C) -> Self {
        Self { credentials, clock }
    }

    /// Access identifier sent alongside every signature.
    pub fn access_key(&self) -> &str {
        &self.credentials.access_key
    }

    /// Sign a request with a nonce taken from the clock now.
    pub fn sign(&self, method: SignMethod, path: &str, payload: &Payload) -> SignedRequest {
        self.sign_with_nonce(self.clock.now_ms(), method, path, payload)
    }

    /// Sign a request with an explicit nonce.
    pub fn sign_with_nonce(
        &self,
        nonce: u64,
        method: SignMethod,
        path: &str,
        payload: &Payload,
    ) -> SignedRequest {
        let uri = signing_uri(method, path, payload);
        let canonical = canonical_string(nonce, &self.credentials.access_key, &uri);
        let signature = hmac_sha256_base64(&canonical, &self.credentials.secret_key);

        trace!(nonce, %uri, ?method, "Request signed");

        SignedRequest {
            nonce,
            signature,
            uri,
        }
    }
}
