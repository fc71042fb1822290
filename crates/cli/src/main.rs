//! `synapse` command-line client.
//!
//! This binary is the composition root. Responsibilities:
//!
//! 1. **Parse configuration**: flags, each falling back to a `SYNAPSE_*`
//!    environment variable.
//! 2. **Wire observability**: install `tracing-subscriber` with an
//!    `EnvFilter` (`RUST_LOG`, default `info`) and either the text or the JSON
//!    formatter. Logs go to stderr; command output goes to stdout. Every
//!    invocation runs inside a span carrying a fresh invocation id.
//! 3. **Authenticate**: API-key mode when a key is configured, otherwise
//!    cookie login with `--user`/`--password` (and logout on the way out).
//! 4. **Run the subcommand**: `query`, `active` or `health`.

#![cfg_attr(test, allow(clippy::expect_used))]

use std::collections::BTreeMap;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use client::{Client, ClientConfig, PayloadMode, QueryRequest};
use protocol::DecodedStream;
use serde_json::{json, Value};
use tracing::{error, info, info_span, warn, Instrument};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Query used by `health` when none is given; a read-only lift.
const DEFAULT_HEALTH_QUERY: &str = "inet:fqdn=vertex.link";

#[derive(Debug, Parser)]
#[command(name = "synapse", version, about = "Query a Synapse Cortex over its HTTP API")]
struct Cli {
    /// Service host name.
    #[arg(long, env = "SYNAPSE_HOST")]
    host: Option<String>,

    /// Service port.
    #[arg(long, env = "SYNAPSE_PORT", default_value_t = client::config::DEFAULT_PORT)]
    port: u16,

    /// Static API key. Takes precedence over --user/--password.
    #[arg(long, env = "SYNAPSE_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// User name for cookie login.
    #[arg(long, env = "SYNAPSE_USER")]
    user: Option<String>,

    /// Password for cookie login.
    #[arg(long, env = "SYNAPSE_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Whole-request timeout in seconds.
    #[arg(long, env = "SYNAPSE_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Accept invalid (e.g. self-signed) TLS certificates.
    #[arg(long, env = "SYNAPSE_INSECURE")]
    insecure: bool,

    /// Log output format.
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a query and print its decoded result stream as JSON.
    Query {
        /// Query text.
        query: String,
        /// View to run the query in.
        #[arg(long, env = "SYNAPSE_VIEW")]
        view: Option<String>,
        /// Fail on payload fields of the wrong type instead of defaulting them.
        #[arg(long)]
        strict: bool,
        /// Print each frame as one JSON line as it arrives.
        #[arg(long)]
        each: bool,
    },
    /// Report whether the current credential is still active.
    Active,
    /// Check activity, a single-value call, and a streaming query.
    Health {
        /// View to run the checks in.
        #[arg(long, env = "SYNAPSE_VIEW")]
        view: Option<String>,
        /// Streaming query to run.
        #[arg(long, default_value = DEFAULT_HEALTH_QUERY)]
        query: String,
    },
}

impl Cli {
    fn client_config(&self) -> Result<ClientConfig> {
        let host = self
            .host
            .clone()
            .context("--host or SYNAPSE_HOST is required")?;
        let mut config = ClientConfig::new(host, self.port)
            .with_timeout(Duration::from_secs(self.timeout_secs))
            .with_accept_invalid_certs(self.insecure);
        if let Some(key) = &self.api_key {
            config = config.with_api_key(key.as_str());
        }
        Ok(config)
    }

    fn payload_mode(&self) -> PayloadMode {
        match self.command {
            Command::Query { strict: true, .. } => PayloadMode::Strict,
            _ => PayloadMode::Lenient,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let span = info_span!("synapse", invocation = %Uuid::new_v4());
    match run(cli).instrument(span).await {
        Ok(code) => code,
        Err(err) => {
            error!(error = format!("{err:#}"), "command failed");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let client = connect(&cli).await?;
    let outcome = dispatch(&client, &cli.command).await;

    if client.session().is_authenticated() && !client.session().uses_api_key() {
        if let Err(err) = client.logout().await {
            warn!(error = %err, "logout failed");
        }
    }
    outcome
}

async fn connect(cli: &Cli) -> Result<Client> {
    let config = cli.client_config()?;
    info!(endpoint = %config.endpoint, api_key = config.api_key.is_some(), "connecting");
    let client = Client::new(&config)
        .context("failed to build HTTP client")?
        .with_payload_mode(cli.payload_mode());

    if client.session().uses_api_key() {
        return Ok(client);
    }
    match (&cli.user, &cli.password) {
        (Some(user), Some(password)) => client.login(user, password).await.context("login failed")?,
        (Some(_), None) => bail!("--password or SYNAPSE_PASSWORD is required with --user"),
        (None, _) => bail!("an API key or --user/--password is required"),
    }
    Ok(client)
}

async fn dispatch(client: &Client, command: &Command) -> Result<ExitCode> {
    match command {
        Command::Query {
            query,
            view,
            each,
            strict: _,
        } => {
            let request = query_request(query, view.as_deref());
            if *each {
                client
                    .run_query_each(&request, |frame| println!("{}", frame.to_wire()))
                    .await?;
            } else {
                let stream = client.run_query(&request).await?;
                println!("{}", serde_json::to_string_pretty(&stream_to_json(&stream))?);
            }
            Ok(ExitCode::SUCCESS)
        }
        Command::Active => {
            let active = client.is_active().await?;
            println!("{}", json!({ "active": active }));
            Ok(if active {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Health { view, query } => health(client, view.as_deref(), query).await,
    }
}

fn query_request(query: &str, view: Option<&str>) -> QueryRequest {
    let request = QueryRequest::new(query);
    match view {
        Some(view) => request.with_view(view),
        None => request,
    }
}

/// Renders a decoded stream as `{inits, nodes, finis, prints}`.
fn stream_to_json(stream: &DecodedStream) -> Value {
    let nodes: Vec<Value> = stream
        .nodes
        .iter()
        .map(|node| json!({ "pairs": node.pairs, "info": node.info }))
        .collect();
    json!({
        "inits": stream.inits,
        "nodes": nodes,
        "finis": stream.finis,
        "prints": stream.prints,
    })
}

// ---------------------------------------------------------------------------
// health
// ---------------------------------------------------------------------------

async fn health(client: &Client, view: Option<&str>, query: &str) -> Result<ExitCode> {
    let checks = [
        ("active", check_active(client).await),
        ("storm call", check_storm_call(client, view).await),
        ("storm stream", check_stream(client, view, query).await),
    ];

    let mut healthy = true;
    for (name, outcome) in checks {
        match outcome {
            Ok(()) => info!(check = name, "passed"),
            Err(err) => {
                healthy = false;
                error!(check = name, error = format!("{err:#}"), "failed");
            }
        }
    }
    println!("{}", json!({ "healthy": healthy }));
    Ok(if healthy {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn check_active(client: &Client) -> Result<()> {
    client.require_active().await?;
    Ok(())
}

async fn check_storm_call(client: &Client, view: Option<&str>) -> Result<()> {
    let mut opts = BTreeMap::new();
    if let Some(view) = view {
        opts.insert("view".to_owned(), Value::from(view));
    }
    let result = client.storm_call("return(1)", opts).await?;
    ensure!(result == json!(1), "return(1) produced {result}");
    Ok(())
}

async fn check_stream(client: &Client, view: Option<&str>, query: &str) -> Result<()> {
    let stream = client.run_query(&query_request(query, view)).await?;
    ensure!(stream.fini().is_some(), "stream ended without a fini frame");
    Ok(())
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
