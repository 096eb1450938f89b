//! storelink - signed datastore requests and channel sessions from the shell.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use storelink_cli::app::{parse_object, parse_pairs};
use storelink_cli::{AppConfig, Application, Command};
use tracing::info;

/// storelink command-line client
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via STORELINK_CONFIG env var)
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Locale sent with the request (defaults to the configured locale)
    #[arg(short, long, global = true)]
    locale: Option<String>,

    /// Print Prometheus metrics after the command completes
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Signed GET
    Get {
        path: String,
        /// Query parameter as key=value (repeatable, order kept)
        #[arg(short, long = "param")]
        params: Vec<String>,
    },
    /// Signed JSON POST
    Post {
        path: String,
        /// Body field as key=value (repeatable, order kept)
        #[arg(short, long = "field")]
        fields: Vec<String>,
        /// Whole body as a JSON object (overrides --field)
        #[arg(long)]
        json: Option<String>,
    },
    /// Signed multipart POST with a file
    Upload {
        path: String,
        /// File to attach
        #[arg(long)]
        file: PathBuf,
        /// MIME type of the attachment
        #[arg(long)]
        mime: Option<String>,
        /// Body field as key=value (repeatable, order kept)
        #[arg(short, long = "field")]
        fields: Vec<String>,
    },
    /// Signed binary GET
    Download {
        path: String,
        /// Query parameter as key=value (repeatable, order kept)
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// Write the received bytes here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Open a WebSocket channel and print its events
    Listen {
        channel: String,
        /// Query parameter as key=value (repeatable, order kept)
        #[arg(short, long = "param")]
        params: Vec<String>,
        /// JSON message to send once open (repeatable)
        #[arg(short, long = "send")]
        send: Vec<String>,
        /// Seconds to listen before closing
        #[arg(long, default_value_t = 10)]
        seconds: u64,
    },
}

impl Cmd {
    fn into_command(self) -> storelink_cli::AppResult<Command> {
        Ok(match self {
            Cmd::Get { path, params } => Command::Get {
                path,
                query: parse_pairs(&params)?,
            },
            Cmd::Post { path, fields, json } => Command::Post {
                path,
                body: match json {
                    Some(json) => parse_object(&json)?,
                    None => parse_pairs(&fields)?,
                },
            },
            Cmd::Upload {
                path,
                file,
                mime,
                fields,
            } => Command::Upload {
                path,
                body: parse_pairs(&fields)?,
                file,
                mime,
            },
            Cmd::Download {
                path,
                params,
                output,
            } => Command::Download {
                path,
                query: parse_pairs(&params)?,
                output,
            },
            Cmd::Listen {
                channel,
                params,
                send,
                seconds,
            } => Command::Listen {
                channel,
                query: parse_pairs(&params)?,
                messages: send
                    .iter()
                    .map(|text| parse_object(text).map(serde_json::Value::Object))
                    .collect::<storelink_cli::AppResult<Vec<_>>>()?,
                duration: Duration::from_secs(seconds),
            },
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize TLS crypto provider (must be before any WS connections)
    storelink_ws::init_crypto();

    let args = Args::parse();

    storelink_telemetry::init_logging()?;

    info!("Starting storelink v{}", env!("CARGO_PKG_VERSION"));

    let config_path = AppConfig::resolve_path(args.config);
    info!(config_path = %config_path, "Loading configuration");

    let config = AppConfig::load(&config_path)?;
    info!(
        api_base_url = %config.client.api_base_url,
        ws_base_url = %config.client.ws_base_url,
        "Configuration loaded"
    );

    let app = Application::new(config)?;
    let command = args.command.into_command()?;
    let output = app.run(command, args.locale.as_deref()).await?;
    println!("{output}");

    if args.metrics {
        println!("{}", storelink_telemetry::Metrics::render()?);
    }

    Ok(())
}
