//! HTTP client for the datastore API.
//!
//! Each call signs its own request, sends it once, and classifies the outcome.
//! There is no retry, caching or deduplication. Without a configured timeout a
//! stalled server stalls the returned future indefinitely.

use crate::envelope::{classify_file_body, resolve_envelope};
use crate::error::{HttpError, HttpResult, NetworkError, RequestFailure, RequestResult};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use storelink_core::{join_url, ClientConfig, Payload};
use storelink_signer::{Clock, RequestSigner, SignMethod, SignedRequest, SystemClock};
use storelink_telemetry::{Metrics, RequestOutcome};
use tracing::{debug, error, warn};

/// Locale header.
pub const HEADER_LANG: &str = "X-DATASTORE-LANG";
/// Nonce header.
pub const HEADER_NONCE: &str = "X-DATASTORE-NONCE";
/// Access identifier header.
pub const HEADER_ACCESS: &str = "X-DATASTORE-ACCESS";
/// Signature header.
pub const HEADER_SIGNATURE: &str = "X-DATASTORE-SIGNATURE";

/// Multipart field holding the JSON body.
const FIELD_JSON_BODY: &str = "jsonBody";
/// Multipart field holding the uploaded file.
const FIELD_FILE: &str = "file";

/// Binary payload for [`DatastoreClient::request_post_with_file`].
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub bytes: Vec<u8>,
    pub filename: String,
    /// MIME type of the part. Left unset when `None`.
    pub mime: Option<String>,
}

impl FileUpload {
    pub fn new(bytes: impl Into<Vec<u8>>, filename: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            filename: filename.into(),
            mime: None,
        }
    }

    pub fn with_mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

/// Resolved binary download.
#[derive(Debug)]
pub struct FileResponse {
    /// Raw response body.
    pub data: Vec<u8>,
    /// Response headers as received.
    pub headers: HeaderMap,
}

impl FileResponse {
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }
}

/// Signed client for the datastore HTTP API.
pub struct DatastoreClient<C: Clock = SystemClock> {
    /// HTTP client.
    client: Client,
    /// API base URL.
    base_url: String,
    /// Request signer.
    signer: RequestSigner<C>,
}

impl DatastoreClient<SystemClock> {
    /// Create a client from configuration, signing with wall-clock nonces.
    pub fn new(config: &ClientConfig) -> HttpResult<Self> {
        Self::with_signer(config, RequestSigner::new(config.credentials.clone()))
    }
}

impl<C: Clock> DatastoreClient<C> {
    /// Create a client with a custom signer (e.g., a fixed clock in tests).
    pub fn with_signer(config: &ClientConfig, signer: RequestSigner<C>) -> HttpResult<Self> {
        let mut builder = Client::builder();
        if let Some(ms) = config.request_timeout_ms {
            builder = builder.timeout(Duration::from_millis(ms));
        }
        let client = builder
            .build()
            .map_err(|e| HttpError::ClientBuild(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            signer,
        })
    }

    /// Base URL requests are issued against.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET `base_url + path?query` and resolve the envelope's `data`.
    pub async fn request_get(
        &self,
        locale: &str,
        path: &str,
        query: &Payload,
    ) -> RequestResult<Value> {
        let result = self.send_get(locale, path, query).await;
        record("get", path, &result);
        result
    }

    /// POST `body` as JSON to `base_url + path` and resolve the envelope's `data`.
    ///
    /// Only the path is signed.
    pub async fn request_post(
        &self,
        locale: &str,
        path: &str,
        body: &Payload,
    ) -> RequestResult<Value> {
        let result = self.send_post(locale, path, body).await;
        record("post", path, &result);
        result
    }

    /// POST a multipart form: `jsonBody` (JSON text of `body`) and `file`.
    ///
    /// No explicit `Content-Type` is set; the multipart boundary header comes
    /// from the form.
    pub async fn request_post_with_file(
        &self,
        locale: &str,
        path: &str,
        body: &Payload,
        file: FileUpload,
    ) -> RequestResult<Value> {
        let result = self.send_post_with_file(locale, path, body, file).await;
        record("post_file", path, &result);
        result
    }

    /// GET a binary resource.
    ///
    /// A reply declared as `application/json` is decoded and rejected as a
    /// server failure. Anything else resolves with the raw bytes and headers.
    pub async fn request_file(
        &self,
        locale: &str,
        path: &str,
        query: &Payload,
    ) -> RequestResult<FileResponse> {
        let result = self.send_file(locale, path, query).await;
        record("file", path, &result);
        result
    }

    async fn send_get(&self, locale: &str, path: &str, query: &Payload) -> RequestResult<Value> {
        let signed = self.signer.sign(SignMethod::Get, path, query);
        let headers = self.auth_headers(locale, &signed, true)?;
        let url = join_url(&self.base_url, &signed.uri);
        debug!(%url, nonce = signed.nonce, "Sending GET");

        let response = self.client.get(&url).headers(headers).send().await;
        resolve_json(response).await
    }

    async fn send_post(&self, locale: &str, path: &str, body: &Payload) -> RequestResult<Value> {
        let signed = self.signer.sign(SignMethod::Post, path, body);
        let headers = self.auth_headers(locale, &signed, true)?;
        let payload = serde_json::to_string(body)
            .map_err(|e| NetworkError::InvalidRequest(format!("body: {e}")))?;
        let url = join_url(&self.base_url, &signed.uri);
        debug!(%url, nonce = signed.nonce, "Sending POST");

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .body(payload)
            .send()
            .await;
        resolve_json(response).await
    }

    async fn send_post_with_file(
        &self,
        locale: &str,
        path: &str,
        body: &Payload,
        file: FileUpload,
    ) -> RequestResult<Value> {
        let signed = self.signer.sign(SignMethod::Post, path, body);
        let headers = self.auth_headers(locale, &signed, false)?;
        let form = build_form(body, file)?;
        let url = join_url(&self.base_url, &signed.uri);
        debug!(%url, nonce = signed.nonce, "Sending multipart POST");

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .multipart(form)
            .send()
            .await;
        resolve_json(response).await
    }

    async fn send_file(
        &self,
        locale: &str,
        path: &str,
        query: &Payload,
    ) -> RequestResult<FileResponse> {
        let signed = self.signer.sign(SignMethod::Get, path, query);
        let headers = self.auth_headers(locale, &signed, false)?;
        let url = join_url(&self.base_url, &signed.uri);
        debug!(%url, nonce = signed.nonce, "Sending file GET");

        let response = checked(self.client.get(&url).headers(headers).send().await).await?;
        let headers = response.headers().clone();
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = response.bytes().await.map_err(NetworkError::Transport)?;

        let data = classify_file_body(content_type.as_deref(), body.to_vec())?;
        Ok(FileResponse { data, headers })
    }

    fn auth_headers(
        &self,
        locale: &str,
        signed: &SignedRequest,
        json_content: bool,
    ) -> RequestResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        if json_content {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        insert_header(&mut headers, HEADER_LANG, locale)?;
        insert_header(&mut headers, HEADER_NONCE, &signed.nonce.to_string())?;
        insert_header(&mut headers, HEADER_ACCESS, self.signer.access_key())?;
        insert_header(&mut headers, HEADER_SIGNATURE, &signed.signature)?;
        Ok(headers)
    }
}

fn insert_header(headers: &mut HeaderMap, name: &'static str, value: &str) -> RequestResult<()> {
    let header_name = HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| NetworkError::InvalidRequest(format!("header {name}: {e}")))?;
    let value = HeaderValue::from_str(value)
        .map_err(|e| NetworkError::InvalidRequest(format!("header {name}: {e}")))?;
    headers.insert(header_name, value);
    Ok(())
}

fn build_form(body: &Payload, file: FileUpload) -> RequestResult<Form> {
    let json_body = serde_json::to_string(body)
        .map_err(|e| NetworkError::InvalidRequest(format!("jsonBody: {e}")))?;

    let mut part = Part::bytes(file.bytes).file_name(file.filename);
    if let Some(mime) = file.mime {
        part = part
            .mime_str(&mime)
            .map_err(|e| NetworkError::InvalidRequest(format!("file mime: {e}")))?;
    }

    Ok(Form::new().text(FIELD_JSON_BODY, json_body).part(FIELD_FILE, part))
}

/// Reject transport errors and non-2xx replies as network failures.
async fn checked(response: Result<Response, reqwest::Error>) -> RequestResult<Response> {
    let response = response.map_err(NetworkError::Transport)?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(NetworkError::Status {
            status: status.as_u16(),
            body,
        }
        .into());
    }
    Ok(response)
}

async fn resolve_json(response: Result<Response, reqwest::Error>) -> RequestResult<Value> {
    let response = checked(response).await?;
    let body = response.bytes().await.map_err(NetworkError::Transport)?;
    let envelope: Value = serde_json::from_slice(&body)
        .map_err(|e| NetworkError::Decode(format!("envelope: {e}")))?;
    resolve_envelope(envelope)
}

fn record<T>(op: &str, path: &str, result: &RequestResult<T>) {
    let outcome = match result {
        Ok(_) => RequestOutcome::Success,
        Err(RequestFailure::Server(payload)) => {
            warn!(op, path, reply = %payload, "Server rejected request");
            RequestOutcome::Server
        }
        Err(RequestFailure::Network(e)) => {
            error!(op, path, error = %e, "Request failed");
            RequestOutcome::Network
        }
    };
    Metrics::http_request(op, outcome);
}
