//! Request signing for the datastore API.
//!
//! Every request carries a nonce, the access identifier and an
//! HMAC-SHA256 signature over the canonical string
//! `nonce + "\n" + access + "\n" + uri`.

pub mod clock;
pub mod signer;

pub use clock::{Clock, FixedClock, SystemClock};
pub use signer::{
    base64url_encode, canonical_string, hmac_sha256_base64, signing_uri, RequestSigner,
    SignMethod, SignedRequest,
};
