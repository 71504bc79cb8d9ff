use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::builder::FalseyValueParser;
use clap::{ArgAction, Parser};
use hookrelay_kernel::{
    DEFAULT_SERVER_URL, HookResponse, KernelBuilder, RelayConfig, parse_tag_list,
};
use hookrelay_protocol::{HookEventType, RawEventRecord};
use tokio::io::AsyncReadExt;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "HOOKRELAY_LOG";

#[derive(Debug, Parser)]
#[command(name = "hookrelay")]
#[command(about = "Agent lifecycle hook: guards, gates and relays tool calls")]
struct Cli {
    /// Lifecycle event kind, e.g. `PreToolUse` or `pre-tool-use`.
    event: HookEventType,

    #[arg(long, env = "OBSERVABILITY_SERVER", default_value = DEFAULT_SERVER_URL)]
    server: String,

    /// Decision service base URL; defaults to `--server`.
    #[arg(long, env = "HITL_SERVER")]
    hitl_server: Option<String>,

    /// Falls back to `SOURCE_APP`.
    #[arg(long, env = "CLAUDE_SOURCE_APP")]
    source_app: Option<String>,

    /// Comma-separated.
    #[arg(long, env = "CLAUDE_TAGS", default_value = "")]
    tags: String,

    /// Treat end-of-turn events as already being handled.
    #[arg(
        long,
        env = "STOP_HOOK_ACTIVE",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    stop_hook_active: bool,

    #[arg(long, env = "HOOKRELAY_STOP_MARKER")]
    stop_marker: Option<PathBuf>,

    #[arg(
        long,
        env = "HOOKRELAY_NO_HITL",
        action = ArgAction::SetTrue,
        value_parser = FalseyValueParser::new()
    )]
    no_hitl: bool,
}

impl Cli {
    fn relay_config(&self) -> RelayConfig {
        let defaults = RelayConfig::default();
        let source_app = self
            .source_app
            .clone()
            .filter(|app| !app.trim().is_empty())
            .or_else(|| std::env::var("SOURCE_APP").ok())
            .unwrap_or(defaults.source_app);

        RelayConfig {
            server_url: self.server.clone(),
            hitl_server_url: self.hitl_server.clone(),
            source_app,
            tags: parse_tag_list(&self.tags),
            stop_hook_active: self.stop_hook_active,
            stop_marker: self.stop_marker.clone().unwrap_or(defaults.stop_marker),
            hitl_enabled: !self.no_hitl,
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .compact()
        .init();
}

async fn read_record() -> RawEventRecord {
    let mut input = String::new();
    match tokio::io::stdin().read_to_string(&mut input).await {
        Ok(_) => RawEventRecord::parse(&input),
        Err(error) => {
            debug!(%error, "could not read hook input, using empty record");
            RawEventRecord::new()
        }
    }
}

async fn run(cli: Cli) -> Result<HookResponse> {
    if cli.event == HookEventType::GuardBlock {
        bail!("GuardBlock is produced by the relay and cannot be invoked directly");
    }
    let record = read_record().await;
    let kernel = KernelBuilder::new(cli.relay_config())
        .build()
        .context("failed to build hook kernel")?;
    Ok(kernel.handle(cli.event, record).await)
}

/// Writes the hook protocol document, if the response has one, as a single
/// JSON line.
fn write_response(response: &HookResponse, out: &mut impl Write) -> io::Result<()> {
    if let Some(payload) = response.stdout_payload() {
        writeln!(out, "{payload}")?;
        out.flush()?;
    }
    Ok(())
}

/// Always exits 0: denial travels on stdout, never through the exit status.
#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return ExitCode::SUCCESS;
        }
    };

    match run(cli).await {
        Ok(response) => {
            if let Err(error) = write_response(&response, &mut io::stdout().lock()) {
                debug!(%error, "could not write hook response");
            }
        }
        Err(error) => warn!(error = %format!("{error:#}"), "hook skipped"),
    }
    ExitCode::SUCCESS
}
