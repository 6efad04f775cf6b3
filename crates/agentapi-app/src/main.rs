use std::sync::Arc;
use std::time::Duration;

use agentapi_httpapi::{Server, ServerConfig};
use agentapi_protocol::AgentType;
use agentapi_term::{AgentProcess, AgentProcessConfig, TermError};
use anyhow::{bail, Context, Result};
use clap::Parser;

const MIN_TERM_DIMENSION: u16 = 10;
/// Codex distorts its TUI on very tall terminals.
const CODEX_MAX_TERM_HEIGHT: u16 = 930;
const PROCESS_CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// HTTP API for Claude Code, Goose, Aider, Codex, and Gemini.
#[derive(Debug, Parser)]
#[command(name = "agentapi", version, about)]
struct Cli {
    /// Override the agent type (one of: claude, goose, aider, codex, gemini,
    /// custom). Guessed from the program name when omitted.
    #[arg(short = 't', long = "type", env = "AGENTAPI_TYPE")]
    agent_type: Option<String>,

    /// Port to run the server on
    #[arg(short, long, default_value_t = 3284, env = "AGENTAPI_PORT")]
    port: u16,

    /// Width of the emulated terminal
    #[arg(short = 'W', long, default_value_t = 80, env = "AGENTAPI_TERM_WIDTH")]
    term_width: u16,

    /// Height of the emulated terminal
    #[arg(short = 'H', long, default_value_t = 1000, env = "AGENTAPI_TERM_HEIGHT")]
    term_height: u16,

    /// Hostnames accepted in the Host header; "*" allows any
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "*",
        env = "AGENTAPI_ALLOWED_HOSTS"
    )]
    allowed_hosts: Vec<String>,

    /// Origins allowed by CORS; "*" allows any
    #[arg(
        long,
        value_delimiter = ',',
        default_value = "*",
        env = "AGENTAPI_ALLOWED_ORIGINS"
    )]
    allowed_origins: Vec<String>,

    /// Trust the X-Forwarded-Host header when checking the host allowlist
    #[arg(long, default_value_t = false, env = "AGENTAPI_USE_X_FORWARDED_HOST")]
    use_x_forwarded_host: bool,

    /// Agent program to run, followed by its arguments
    #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
    agent: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();

    run(Cli::parse()).await
}

async fn run(cli: Cli) -> Result<()> {
    let program = cli.agent[0].clone();
    let args = cli.agent[1..].to_vec();

    let agent_type = AgentType::resolve(cli.agent_type.as_deref(), &program)
        .context("failed to parse agent type")?;

    if cli.term_width < MIN_TERM_DIMENSION {
        bail!("term width must be at least {MIN_TERM_DIMENSION}");
    }
    if cli.term_height < MIN_TERM_DIMENSION {
        bail!("term height must be at least {MIN_TERM_DIMENSION}");
    }
    let mut term_height = cli.term_height;
    if agent_type == AgentType::Codex && term_height > CODEX_MAX_TERM_HEIGHT {
        tracing::warn!(
            requested = term_height,
            clamped = CODEX_MAX_TERM_HEIGHT,
            "term height may cause issues with codex; clamping it"
        );
        term_height = CODEX_MAX_TERM_HEIGHT;
    }

    tracing::info!(%agent_type, %program, ?args, "starting agent");
    let process = Arc::new(
        AgentProcess::spawn(AgentProcessConfig {
            program,
            args,
            term_width: cli.term_width,
            term_height,
        })
        .context("failed to start agent process")?,
    );

    let server = Server::new(ServerConfig {
        agent_type,
        process: Arc::clone(&process),
        port: cli.port,
        allowed_hosts: cli.allowed_hosts,
        allowed_origins: cli.allowed_origins,
        use_x_forwarded_host: cli.use_x_forwarded_host,
    })
    .context("failed to build server")?;

    let event_loops = server.start_event_loops();
    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    tracing::info!(port = cli.port, "starting server");
    let serve_handle = tokio::spawn(server.serve(async {
        let _ = shutdown_rx.await;
    }));

    // Run until the agent exits on its own or we are interrupted.
    let agent_exit = tokio::select! {
        result = process.wait() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    let _ = shutdown_tx.send(());
    for task in event_loops {
        task.abort();
    }

    let result = match agent_exit {
        None => {
            tracing::info!("interrupted; closing agent process");
            process
                .close(PROCESS_CLOSE_TIMEOUT)
                .await
                .context("failed to close agent process")
        }
        Some(Ok(())) => Ok(()),
        Some(Err(TermError::NonZeroExit(code))) => {
            let screen = process.read_screen().await;
            Err(anyhow::anyhow!(
                "========\n{}\n========\nagent exited with non-zero code {code}",
                screen.trim()
            ))
        }
        Some(Err(error)) => Err(error).context("failed to wait for agent process"),
    };

    if let Ok(served) = serve_handle.await {
        served.context("server error")?;
    }
    result
}
