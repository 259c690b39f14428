// src/main.rs

//! The entry point for the rolegate command-line tool.
//!
//! It opens the configured user directory, makes sure an administrator exists
//! (printing the one-time secret of a freshly bootstrapped admin), and reports
//! a summary of the directory.

use anyhow::{Context, Result};
use rolegate::config::Config;
use rolegate::core::acl::available_roles;
use rolegate::core::credential::CredentialPolicy;
use rolegate::core::directory::{JsonFileStore, MemoryStore, UserStore};
use rolegate::core::UserDirectory;
use std::env;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::filter::EnvFilter;

const DEFAULT_CONFIG_PATH: &str = "rolegate.toml";

#[tokio::main]
async fn main() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("rolegate version {VERSION}");
        return Ok(());
    }

    // The role catalog needs no configuration.
    if args.contains(&"--roles".to_string()) {
        println!("{}", serde_json::to_string_pretty(&available_roles())?);
        return Ok(());
    }

    let explicit_config = args
        .iter()
        .position(|arg| arg == "--config")
        .map(|i| args.get(i + 1));

    let config = match explicit_config {
        Some(Some(path)) => load_config_or_exit(path),
        Some(None) => {
            eprintln!("--config flag requires a value");
            std::process::exit(1);
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config_or_exit(DEFAULT_CONFIG_PATH),
        None => Config::default(),
    };

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(log_level))
        .compact()
        .with_ansi(true)
        .init();

    if let Err(e) = run(config).await {
        error!("rolegate error: {:#}", e);
        return Err(e);
    }
    Ok(())
}

fn load_config_or_exit(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{path}\": {e:#}");
            std::process::exit(1);
        }
    }
}

async fn run(config: Config) -> Result<()> {
    let store: Arc<dyn UserStore> = match &config.users_file {
        Some(path) => {
            info!("Using users file '{}'", path);
            Arc::new(JsonFileStore::new(path))
        }
        None => {
            info!("No users_file configured, the directory lives in memory only");
            Arc::new(MemoryStore::new())
        }
    };

    let policy = CredentialPolicy::new(config.credentials.clone())
        .context("Failed to build the credential policy")?;
    let directory = UserDirectory::open(store, policy)
        .await
        .context("Failed to open the user directory")?;

    if let Some(created) = directory
        .bootstrap_admin(&config.bootstrap_admin)
        .await
        .context("Failed to bootstrap the admin user")?
    {
        println!("Created admin user '{}'.", created.user.username);
        if let Some(secret) = created.temporary_secret {
            println!("Temporary password: {}", secret.expose());
            println!("It will not be shown again and must be changed on first login.");
        }
    }

    for (role, count) in directory.role_counts().await {
        info!("{} user(s) with role '{}'", count, role);
    }
    Ok(())
}
