//! Signed HTTP transport for the datastore API.
//!
//! Four operations (GET, POST, multipart POST, binary GET), each signed by
//! [`storelink_signer::RequestSigner`] and resolved to either the envelope's
//! `data` or a [`RequestFailure`] classified as `server` or `network`.

pub mod client;
pub mod envelope;
pub mod error;

pub use client::{
    DatastoreClient, FileResponse, FileUpload, HEADER_ACCESS, HEADER_LANG, HEADER_NONCE,
    HEADER_SIGNATURE,
};
pub use envelope::{classify_file_body, resolve_envelope, SUCCESS_CODE};
pub use error::{FailureKind, HttpError, HttpResult, NetworkError, RequestFailure, RequestResult};
