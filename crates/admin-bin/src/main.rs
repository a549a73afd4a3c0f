use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use santorini_admin::{
    backend::{Backend, MemoryBackend},
    config::Settings,
    routes::{self, SessionView},
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "santorini-admin", version, about = "Santorini shop admin console")]
struct Cli {
    /// TOML settings file (defaults to santorini.{toml,yaml,json})
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Use the in-memory backend seeded with demo data
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        /// Override `server.bind_addr`
        #[arg(long)]
        bind: Option<SocketAddr>,
    },
    /// Sign in as the shop owner
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    /// End the current session
    Logout,
    /// Show the session gate's decision
    Status,
    /// List products
    Products,
    /// List categories
    Categories,
}

fn init_tracing(settings: &Settings) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(settings.log_level.to_lowercase()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if settings.log_format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn require_owner(state: &AppState) -> Result<()> {
    if !state.gate.snapshot().is_granted() {
        bail!("not signed in as the shop owner; run `santorini-admin login` first");
    }
    Ok(())
}

async fn run(command: Command, state: &AppState) -> Result<()> {
    match command {
        Command::Serve { bind } => {
            let addr = bind.unwrap_or(state.settings.server.bind_addr);
            let app = routes::create_router(state.clone());
            let listener = TcpListener::bind(addr)
                .await
                .with_context(|| format!("binding {addr}"))?;
            info!(%addr, "listening");
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    let _ = tokio::signal::ctrl_c().await;
                    info!("shutting down");
                })
                .await?;
        }
        Command::Login { email, password } => {
            let session = state.login.login(&email, &password).await?;
            let user = session.user_id();
            let mut rx = state.gate.subscribe();
            let snapshot = rx
                .wait_for(|s| !s.loading && s.identity().map(|i| i.id) == Some(user))
                .await?
                .clone();
            print_json(&SessionView::from(&snapshot))?;
        }
        Command::Logout => {
            state.gate.sign_out().await?;
            println!("signed out");
        }
        Command::Status => {
            print_json(&SessionView::from(&state.gate.snapshot()))?;
        }
        Command::Products => {
            require_owner(state)?;
            print_json(&state.catalog.products().await?)?;
        }
        Command::Categories => {
            require_owner(state)?;
            print_json(&state.catalog.categories().await?)?;
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };
    if cli.offline {
        settings.validate_local()?;
    } else {
        settings.validate()?;
    }
    init_tracing(&settings);

    let backend = if cli.offline {
        let memory = Arc::new(MemoryBackend::new());
        memory.seed_demo();
        info!("running offline with demo data");
        Backend::memory(memory)
    } else {
        Backend::hosted(&settings)?
    };

    let state = AppState::new(backend, settings);
    state.start().await;
    let result = run(cli.command, &state).await;
    state.shutdown();
    result
}
