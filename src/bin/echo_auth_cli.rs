//!
//! echo_auth_cli
//! -------------
//! Out-of-band auth surface for the analytics backend. Performs an
//! interactive login (storing the internal JWT in the durable token vault),
//! exchanges a stored internal JWT for a fresh session pair, or clears the
//! vault. Useful for scripting against the same account a browser session
//! holds.

use std::env;

use anyhow::{anyhow, Result};
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use socialecho_core::config::EchoConfig;
use socialecho_core::identity::ExchangeClient;
use socialecho_core::storage::{FileTokenVault, TokenVault, INTERNAL_JWT_KEY};

fn print_usage(program: &str) {
    eprintln!(
        "Usage:\n  {program} login --email <e> --password <p> [--backend <url>] [--vault <path>]\n  {program} auto [--backend <url>] [--vault <path>]\n  {program} clear-vault [--vault <path>]\n\nCommands:\n  login         Interactive sign-in; stores the internal JWT in the vault\n  auto          Exchange the vault-held internal JWT for fresh session tokens\n  clear-vault   Remove the stored internal JWT\n\nFlags:\n  --backend <url>   Exchange backend base URL (default: ECHO_BACKEND_URL or built-in)\n  --vault <path>    Token vault file (default: ECHO_VAULT_PATH or echo_vault.json)\n  --email <e>       Account email (login only)\n  --password <p>    Account password (login only)\n  -h, --help        Show this help\n\nExamples:\n  {program} login --email alice@example.com --password s3cr3t\n  {program} auto\n  RUST_LOG=debug {program} auto --backend https://socialinsightbackend.onrender.com"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();
    let program = args.first().cloned().unwrap_or_else(|| "echo_auth_cli".into());

    let mut command: Option<String> = None;
    let mut backend: Option<String> = None;
    let mut vault_path: Option<String> = None;
    let mut email: Option<String> = None;
    let mut password: Option<String> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_usage(&program);
                return Ok(());
            }
            "--backend" => {
                i += 1;
                backend = args.get(i).cloned();
            }
            "--vault" => {
                i += 1;
                vault_path = args.get(i).cloned();
            }
            "--email" => {
                i += 1;
                email = args.get(i).cloned();
            }
            "--password" => {
                i += 1;
                password = args.get(i).cloned();
            }
            other if command.is_none() && !other.starts_with('-') => {
                command = Some(other.to_string());
            }
            other => {
                eprintln!("unknown argument: {other}");
                print_usage(&program);
                return Err(anyhow!("invalid arguments"));
            }
        }
        i += 1;
    }

    let mut config = EchoConfig::from_env()?;
    if let Some(b) = backend {
        config = EchoConfig::new(b, config.redirect_url.clone(), config.vault_path.clone())?;
    }
    if let Some(p) = vault_path {
        config.vault_path = p.into();
    }
    let vault = FileTokenVault::open(&config.vault_path);

    match command.as_deref() {
        Some("login") => {
            let email = email.ok_or_else(|| anyhow!("login requires --email"))?;
            let password = password.ok_or_else(|| anyhow!("login requires --password"))?;
            let client = ExchangeClient::new(&config.backend_url)?;
            let body = client.login(&email, &password).await?;
            vault.put(INTERNAL_JWT_KEY, &body.jwt).await?;
            info!(vault = %config.vault_path.display(), "internal jwt stored");
            println!("signed in");
            println!("access_token:  {}", body.session.access_token);
            println!("refresh_token: {}", body.session.refresh_token);
        }
        Some("auto") => {
            let Some(jwt) = vault.get(INTERNAL_JWT_KEY).await? else {
                return Err(anyhow!("no internal jwt in vault; run login first"));
            };
            let client = ExchangeClient::new(&config.backend_url)?;
            let tokens = client.exchange(&jwt).await?;
            println!("session issued");
            println!("access_token:  {}", tokens.access_token);
            println!("refresh_token: {}", tokens.refresh_token);
        }
        Some("clear-vault") => {
            vault.remove(INTERNAL_JWT_KEY).await?;
            println!("vault cleared");
        }
        _ => {
            print_usage(&program);
            return Err(anyhow!("missing or unknown command"));
        }
    }
    Ok(())
}
