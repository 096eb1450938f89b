//! Application orchestration.
//!
//! Owns the signed HTTP client and the connection registry, and runs a single
//! command against them.

use crate::config::AppConfig;
use crate::error::{AppError, AppResult};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use storelink_core::Payload;
use storelink_http::{DatastoreClient, FileUpload};
use storelink_ws::{ConnectionEvent, ConnectionRegistry};
use tokio::time::sleep;
use tracing::{info, warn};

/// One unit of work for the application.
#[derive(Debug, Clone)]
pub enum Command {
    /// Signed GET returning the envelope's `data`.
    Get { path: String, query: Payload },
    /// Signed JSON POST returning the envelope's `data`.
    Post { path: String, body: Payload },
    /// Signed multipart POST with a file attachment.
    Upload {
        path: String,
        body: Payload,
        file: PathBuf,
        mime: Option<String>,
    },
    /// Signed binary GET; bytes go to `output` when given.
    Download {
        path: String,
        query: Payload,
        output: Option<PathBuf>,
    },
    /// Open a channel, send `messages` once it is open, and print events
    /// until `duration` elapses or the server closes.
    Listen {
        channel: String,
        query: Payload,
        messages: Vec<Value>,
        duration: Duration,
    },
}

/// Main application.
pub struct Application {
    config: AppConfig,
    client: DatastoreClient,
    registry: ConnectionRegistry,
}

impl Application {
    pub fn new(config: AppConfig) -> AppResult<Self> {
        let client = DatastoreClient::new(&config.client)?;
        let registry = ConnectionRegistry::from_config(&config.client);

        Ok(Self {
            config,
            client,
            registry,
        })
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Run `command` using `locale`, or the configured locale when `None`.
    ///
    /// Returns the text printed for the command.
    pub async fn run(&self, command: Command, locale: Option<&str>) -> AppResult<String> {
        let locale = locale.unwrap_or(&self.config.locale);

        match command {
            Command::Get { path, query } => {
                let data = self.client.request_get(locale, &path, &query).await?;
                render_json(&data)
            }
            Command::Post { path, body } => {
                let data = self.client.request_post(locale, &path, &body).await?;
                render_json(&data)
            }
            Command::Upload {
                path,
                body,
                file,
                mime,
            } => {
                let upload = read_upload(&file, mime).await?;
                let data = self
                    .client
                    .request_post_with_file(locale, &path, &body, upload)
                    .await?;
                render_json(&data)
            }
            Command::Download {
                path,
                query,
                output,
            } => {
                let file = self.client.request_file(locale, &path, &query).await?;
                let content_type = file.content_type().unwrap_or("unknown").to_string();
                match output {
                    Some(output) => {
                        tokio::fs::write(&output, &file.data).await?;
                        Ok(format!(
                            "Wrote {} bytes ({content_type}) to {}",
                            file.data.len(),
                            output.display()
                        ))
                    }
                    None => Ok(format!("Received {} bytes ({content_type})", file.data.len())),
                }
            }
            Command::Listen {
                channel,
                query,
                messages,
                duration,
            } => {
                let lines = self
                    .listen(locale, &channel, &query, &messages, duration)
                    .await;
                self.registry.close_all();
                Ok(lines?.join("\n"))
            }
        }
    }

    async fn listen(
        &self,
        locale: &str,
        channel: &str,
        query: &Payload,
        messages: &[Value],
        duration: Duration,
    ) -> AppResult<Vec<String>> {
        let connection = self.registry.open(locale, channel, query);
        let mut events = connection.take_events().ok_or_else(|| {
            AppError::Argument(format!("Channel {channel} is already being consumed"))
        })?;

        let deadline = sleep(duration);
        tokio::pin!(deadline);

        let mut lines = Vec::new();
        let mut sent = false;

        loop {
            tokio::select! {
                biased;

                _ = &mut deadline => {
                    info!(channel, "Listen duration elapsed");
                    break;
                }
                event = events.recv() => {
                    let Some(event) = event else { break };
                    lines.push(describe_event(&event));

                    match event {
                        ConnectionEvent::Open if !sent => {
                            sent = true;
                            for message in messages {
                                self.registry.send(channel, message)?;
                            }
                        }
                        ConnectionEvent::Closed { .. } => break,
                        _ => {}
                    }
                }
            }
        }

        if !sent && !messages.is_empty() {
            warn!(channel, pending = messages.len(), "Channel never opened; messages not sent");
        }
        Ok(lines)
    }
}

async fn read_upload(path: &Path, mime: Option<String>) -> AppResult<FileUpload> {
    let bytes = tokio::fs::read(path).await?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    let upload = FileUpload::new(bytes, filename);
    Ok(match mime {
        Some(mime) => upload.with_mime(mime),
        None => upload,
    })
}

fn render_json(value: &Value) -> AppResult<String> {
    serde_json::to_string_pretty(value).map_err(|e| AppError::Argument(format!("render: {e}")))
}

fn describe_event(event: &ConnectionEvent) -> String {
    match event {
        ConnectionEvent::Open => "open".to_string(),
        ConnectionEvent::Text(text) => format!("text {text}"),
        ConnectionEvent::Binary(data) => format!("binary {} bytes", data.len()),
        ConnectionEvent::Error(message) => format!("error {message}"),
        ConnectionEvent::Closed { code, reason } => format!("closed {code} {reason}"),
    }
}

/// Parse `key=value` arguments into an ordered payload.
///
/// Values that parse as JSON (numbers, booleans, objects, quoted strings) are
/// kept as JSON; anything else is a plain string.
pub fn parse_pairs(pairs: &[String]) -> AppResult<Payload> {
    let mut payload = Payload::new();
    for pair in pairs {
        let (key, raw) = pair
            .split_once('=')
            .ok_or_else(|| AppError::Argument(format!("expected key=value, got {pair:?}")))?;
        if key.is_empty() {
            return Err(AppError::Argument(format!("empty key in {pair:?}")));
        }
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        payload.insert(key.to_string(), value);
    }
    Ok(payload)
}

/// Parse a JSON object argument into a payload.
pub fn parse_object(text: &str) -> AppResult<Payload> {
    match serde_json::from_str(text) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Argument("expected a JSON object".to_string())),
        Err(e) => Err(AppError::Argument(format!("invalid JSON: {e}"))),
    }
}
