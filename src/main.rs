use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use moments::admin::{self, ConfirmOutcome};
use moments::backend::{Backend, MemoryBackend, RestBackend};
use moments::config::{AdminCommand, BackendKind, Cli, Command, Config};
use moments::routes;
use moments::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    match cli.command.clone().unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Admin(command) => run_admin(&config, command).await,
    }
}

fn build_backend(config: &Config) -> anyhow::Result<Arc<dyn Backend>> {
    match config.backend.kind {
        BackendKind::Rest => {
            let backend = RestBackend::new(&config.backend.url, &config.backend.anon_key)
                .with_context(|| format!("invalid backend.url {:?}", config.backend.url))?;
            tracing::info!("Using backend at {}", config.backend.url);
            Ok(Arc::new(backend))
        }
        BackendKind::Memory => {
            tracing::warn!("Using the in-memory backend; nothing will be persisted");
            Ok(Arc::new(MemoryBackend::with_invitation_codes(
                config.backend.invitation_codes.iter().cloned(),
            )))
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let backend = build_backend(&config)?;
    let state = AppState::new(backend, config.clone());
    let sessions = state.sessions.clone();

    let app = routes::app(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.teardown().await;
    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

async fn run_admin(config: &Config, command: AdminCommand) -> anyhow::Result<()> {
    let service_role_key = std::env::var("MOMENTS_SERVICE_ROLE_KEY")
        .context("MOMENTS_SERVICE_ROLE_KEY must be set for admin commands")?;
    let backend = RestBackend::new(&config.backend.url, &config.backend.anon_key)
        .with_context(|| format!("invalid backend.url {:?}", config.backend.url))?
        .with_service_role(&service_role_key);

    match command {
        AdminCommand::ConfirmUser { email, password } => {
            match admin::confirm_user(&backend, &email, password.as_deref()).await? {
                ConfirmOutcome::Confirmed(user) => println!("Confirmed {} ({})", email, user.id),
                ConfirmOutcome::Created(user) => println!("Created {} ({})", email, user.id),
                ConfirmOutcome::NotFound => {
                    anyhow::bail!("no user with e-mail {}; pass --password to create one", email)
                }
            }
        }
    }
    Ok(())
}
