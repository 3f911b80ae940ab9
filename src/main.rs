use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use mona_agent::api::{ApiServerBuilder, TokenIssuer};
use mona_agent::console::{Console, run_console};
use mona_agent::replay::clean_transcript;
use mona_agent::tools::tool_definitions;
use mona_agent::{Config, PersonaManager, ReplayService, SessionMonitor};

/// Mona - Spanish-speaking virtual companion agent
#[derive(Parser)]
#[command(name = "mona", version, about)]
struct Cli {
    /// Port to listen on (overrides config)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Talk to the agent in the terminal
    Console {
        /// Persona to start with
        #[arg(short, long)]
        persona: Option<String>,
    },
    /// List available personas
    Personas,
    /// Check that a persona file loads and validates
    ValidatePersona {
        /// Persona ID (file name without `.json`)
        id: String,
    },
    /// Print a transcript after markup cleanup
    CleanText {
        /// Raw transcript text
        text: String,
    },
    /// Print the LLM tool definitions as JSON
    Tools,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,mona_agent=info",
        1 => "info,mona_agent=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::Console { persona } => cmd_console(config, persona).await,
            Command::Personas => cmd_personas(&config),
            Command::ValidatePersona { id } => cmd_validate_persona(&config, &id),
            Command::CleanText { text } => {
                println!("{}", clean_transcript(&text));
                Ok(())
            }
            Command::Tools => {
                println!("{}", serde_json::to_string_pretty(&tool_definitions())?);
                Ok(())
            }
        };
    }

    serve(config, cli.port).await
}

/// Cancel `token` on Ctrl+C
fn cancel_on_ctrl_c(token: &CancellationToken) {
    let token = token.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        tracing::info!("shutdown requested");
        token.cancel();
    });
}

fn spawn_monitor(config: &Config, monitor: &Arc<SessionMonitor>, shutdown: &CancellationToken) {
    if !config.monitor.enabled {
        return;
    }
    let monitor = Arc::clone(monitor);
    let interval = config.monitor.log_interval;
    let shutdown = shutdown.child_token();
    tokio::spawn(async move { monitor.run(interval, shutdown).await });
}

async fn serve(config: Config, port: Option<u16>) -> anyhow::Result<()> {
    let personas = Arc::new(PersonaManager::new(&config.agent.personas_dir));
    let available = personas.available();
    if available.is_empty() {
        tracing::warn!(dir = %personas.dir().display(), "no personas found");
    } else {
        tracing::info!(personas = ?available, "personas available");
    }

    let tokens = TokenIssuer::new(&config.livekit, &config.agent.default_persona)?;
    let replay = Arc::new(ReplayService::new(config.replay.clone()));
    let monitor = Arc::new(SessionMonitor::new());

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(&shutdown);
    spawn_monitor(&config, &monitor, &shutdown);

    let server = ApiServerBuilder::new(
        tokens,
        replay,
        personas,
        Arc::clone(&monitor),
        port.unwrap_or(config.server.port),
    )
    .default_persona(config.agent.default_persona.clone())
    .static_dir(config.server.static_dir.clone())
    .rate_limit(config.server.rate_limit_rpm)
    .build();

    server.run(shutdown).await?;

    tracing::info!(summary = %monitor.performance_summary(), "server stopped");
    Ok(())
}

async fn cmd_console(config: Config, persona: Option<String>) -> anyhow::Result<()> {
    let personas = Arc::new(PersonaManager::new(&config.agent.personas_dir));
    let replay = Arc::new(ReplayService::new(config.replay.clone()));
    let monitor = Arc::new(SessionMonitor::new());
    let persona_id = persona.unwrap_or_else(|| config.agent.default_persona.clone());

    let shutdown = CancellationToken::new();
    cancel_on_ctrl_c(&shutdown);
    spawn_monitor(&config, &monitor, &shutdown);

    println!("Mona en consola ({persona_id}). Escribe /help para ver los comandos.");
    let console = Console::new(
        &persona_id,
        config.agent.default_io_mode,
        personas,
        replay,
        Arc::clone(&monitor),
        shutdown.clone(),
    )?;
    run_console(console, &monitor).await?;

    shutdown.cancel();
    tracing::info!(summary = %monitor.performance_summary(), "console session ended");
    Ok(())
}

fn cmd_personas(config: &Config) -> anyhow::Result<()> {
    let personas = PersonaManager::new(&config.agent.personas_dir);
    let available = personas.available();
    if available.is_empty() {
        println!("No personas in {}", personas.dir().display());
        return Ok(());
    }

    for id in available {
        let persona = personas.load(&id)?;
        let marker = if id == config.agent.default_persona { "*" } else { " " };
        println!("{marker} {id:<16} {} (voice: {})", persona.name, persona.voice_id);
    }
    Ok(())
}

fn cmd_validate_persona(config: &Config, id: &str) -> anyhow::Result<()> {
    let personas = PersonaManager::new(&config.agent.personas_dir);
    let persona = personas.load(id)?;
    println!("✓ {id} is valid");
    println!("  Name:     {}", persona.name);
    println!("  Voice:    {}", persona.voice_id);
    println!("  Greeting: {}", persona.greeting());
    Ok(())
}
