#![cfg_attr(not(test), deny(clippy::unwrap_used))]
mod client;
mod config;
mod keys;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use teams_server::api::LoginRequest;
use teams_server::auth::create_challenge;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::client::ApiClient;
use crate::config::ClientConfig;
use crate::keys::{FsKeyStore, KeyPair};

#[derive(Parser, Debug)]
#[command(name = "teams", about = "Log in to a teams server and query team membership")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL of the teams server, overriding the configuration file.
    #[arg(short, long)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage local key pairs.
    Keys {
        #[command(subcommand)]
        command: KeysCommand,
    },
    /// Sign a login challenge and print the access token.
    Login { username: String },
    /// Print the user an access token was issued to.
    Verify { token: String },
    /// Print the members of a team, one per line.
    List { team: String },
}

#[derive(Subcommand, Debug)]
enum KeysCommand {
    /// Generate a key pair and print the dataset entry for it.
    Generate { username: String },
    /// List users with a stored key pair.
    List,
    /// Print a user's public key.
    Public { username: String },
    /// Print a user's private key.
    Private { username: String },
    /// Delete a user's key pair.
    Delete { username: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = ClientConfig::load(cli.config.as_deref(), cli.server)?;
    tracing::debug!(server = %config.server, keys_dir = %config.keys_dir.display(), "resolved config");

    let store = FsKeyStore::new(&config.keys_dir);

    match cli.command {
        Command::Keys { command } => run_keys(&store, command),
        Command::Login { username } => {
            let key = store
                .load_signing_key(&username)
                .with_context(|| format!("cannot log in as {username}"))?;
            let timestamp = Utc::now().fixed_offset();
            let request = LoginRequest {
                challenge: create_challenge(&username, &timestamp, &key),
                username,
                timestamp,
            };

            let token = api(&config)?
                .login(&request)
                .await
                .context("login failed")?;
            println!("{token}");
            Ok(())
        }
        Command::Verify { token } => {
            let username = api(&config)?
                .verify(&token)
                .await
                .context("verification failed")?;
            println!("verified for {username}");
            Ok(())
        }
        Command::List { team } => {
            let members = api(&config)?
                .team(&team)
                .await
                .with_context(|| format!("cannot list team {team}"))?;
            for member in members {
                println!("{member}");
            }
            Ok(())
        }
    }
}

fn api(config: &ClientConfig) -> Result<ApiClient> {
    ApiClient::new(&config.server).context("failed to build HTTP client")
}

fn run_keys(store: &FsKeyStore, command: KeysCommand) -> Result<()> {
    match command {
        KeysCommand::Generate { username } => {
            let pair = store.generate(&username)?;
            println!("{}", dataset_entry(&username, &pair));
        }
        KeysCommand::List => {
            let users = store.list_users()?;
            if users.is_empty() {
                eprintln!("no keys in {}", store.dir().display());
            }
            for user in users {
                println!("{user}");
            }
        }
        KeysCommand::Public { username } => println!("{}", store.load(&username)?.public),
        KeysCommand::Private { username } => println!("{}", store.load(&username)?.private),
        KeysCommand::Delete { username } => {
            store.delete(&username)?;
            eprintln!("deleted keys for {username}");
        }
    }
    Ok(())
}

/// The `users:` entry to add to the server dataset for a new key pair.
fn dataset_entry(username: &str, pair: &KeyPair) -> String {
    format!("- name: {username}\n  key: {}", pair.public)
}
