//! Plugport server binary.

mod cli;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use plugport_kernel::config::Config;
use plugport_kernel::models::{AccountStore, api_token, hash_password};
use plugport_kernel::registry::LocalRegistry;
use plugport_kernel::report::{get_status, list_installed};
use plugport_kernel::routes;
use plugport_kernel::state::AppState;

use crate::cli::{Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            init_tracing();
            serve().await
        }
        Command::HashPassword { password } => {
            println!("{}", hash_password(&password)?);
            Ok(())
        }
        Command::GenerateToken => {
            let token = api_token::generate_token();
            println!("token: {token}");
            println!("hash:  {}", api_token::hash_token(&token));
            Ok(())
        }
        Command::List => {
            let registry = open_registry()?;
            let packages = list_installed(&registry).await?;
            println!("{}", serde_json::to_string_pretty(&packages)?);
            Ok(())
        }
        Command::Status { slugs } => {
            let registry = open_registry()?;
            let status = get_status(&registry, &slugs).await?;
            println!("{}", serde_json::to_string_pretty(&status)?);
            Ok(())
        }
    }
}

fn open_registry() -> Result<LocalRegistry> {
    let config = Config::from_env().context("failed to load configuration")?;
    LocalRegistry::open(&config.packages_dir, &config.state_dir)
}

async fn serve() -> Result<()> {
    info!("Starting plugport");

    // Load configuration from environment
    let config = Config::from_env().context("failed to load configuration")?;
    info!(port = config.port, "Configuration loaded");

    let accounts = AccountStore::load(&config.accounts_file)?;
    let port = config.port;

    let state = AppState::from_config(config, accounts)
        .context("failed to initialize application state")?;

    let app = routes::app(state)
        .await
        .context("failed to build application")?;

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("failed to bind to address")?;

    info!(%addr, "Server listening");

    axum::serve(listener, app).await.context("server error")?;

    Ok(())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}
