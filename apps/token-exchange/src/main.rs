#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod config;
mod logging;

use std::io::BufRead as _;
use std::path::PathBuf;

use anyhow::{Context as _, Result, bail};
use clap::{Parser, Subcommand};
use keycloak_token::{TokenError, TokenResponse, TokenService};

use crate::config::AppConfig;

/// Token Exchange - trade Keycloak authorization codes and refresh tokens
#[derive(Parser)]
#[command(name = "token-exchange")]
#[command(about = "Exchange Keycloak authorization codes and refresh tokens")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print effective configuration (YAML, secret redacted) and exit
    #[arg(long)]
    print_config: bool,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Exchange an authorization code and print the token response with roles
    Exchange {
        /// Authorization code, or `-` to read it from stdin
        code: String,
    },
    /// Exchange a refresh token and print the token response as received
    Refresh {
        /// Refresh token, or `-` to read it from stdin
        refresh_token: String,
    },
    /// Validate configuration and exit
    Check,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    logging::init(&config.logging, cli.verbose);

    tracing::debug!(
        config = ?cli.config,
        endpoint = %config.token_service.token_endpoint,
        "configuration loaded"
    );

    if cli.print_config {
        print!("{}", config.to_redacted_yaml()?);
        return Ok(());
    }

    let Some(command) = cli.command else {
        bail!("no command given; try `token-exchange --help`");
    };

    let service = TokenService::new(config.token_service).map_err(with_stage)?;

    match command {
        Commands::Check => {
            let checked = service.config();
            tracing::info!(
                endpoint = %checked.token_endpoint,
                client_id = %checked.client_id,
                "configuration is valid"
            );
            println!("ok: {}", checked.token_endpoint);
        }
        Commands::Exchange { code } => {
            let code = read_arg(code).context("failed to read authorization code")?;
            let response = service.exchange_code(&code).await.map_err(with_stage)?;
            print_response(&response)?;
        }
        Commands::Refresh { refresh_token } => {
            let token = read_arg(refresh_token).context("failed to read refresh token")?;
            let response = service.refresh(&token).await.map_err(with_stage)?;
            print_response(&response)?;
        }
    }

    Ok(())
}

fn with_stage(e: TokenError) -> anyhow::Error {
    let stage = e.stage();
    anyhow::Error::new(e).context(format!("token exchange failed during {stage}"))
}

fn read_arg(value: String) -> Result<String> {
    if value != "-" {
        return Ok(value);
    }
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_owned())
}

fn print_response(response: &TokenResponse) -> Result<()> {
    let json = serde_json::to_string_pretty(response)?;
    println!("{json}");
    Ok(())
}
