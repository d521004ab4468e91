//! TherapyLog vault administration.
//!
//! Usage:
//!   therapylog --db records.db init
//!   therapylog --db records.db export backup.json
//!   therapylog --db records.db import backup.json
//!
//! Passwords are read one per line from stdin, so the tool can be scripted.
//! Nothing is ever printed in plaintext except what `list` is asked to show.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::io::{BufRead, Write};
use std::path::PathBuf;
use therapylog_types::next_client_id;
use therapylog_vault::{BackupBundle, Vault, VaultConfig, VaultError, VaultStatus};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "therapylog")]
#[command(about = "Administer an encrypted TherapyLog record store")]
struct Args {
    /// Path to a JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Database file (overrides the config file)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the credential for a new store
    Init,
    /// Show whether the store needs setup
    Status,
    /// Decrypt and print every record as JSON
    List,
    /// Suggest the next client id for an intake date (YYYY-MM-DD)
    NextId { date: String },
    /// Write an encrypted backup bundle
    Export { out: PathBuf },
    /// Replace the store with a backup bundle
    Import { bundle: PathBuf },
    /// Re-encrypt everything under a new password
    ChangePassword,
    /// Delete every record and the credential
    Clear {
        /// Required; there is no undo
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Serialize)]
struct Listing<'a> {
    clients: &'a [therapylog_vault::Client],
    sessions: &'a [therapylog_vault::Session],
    warnings: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let mut config = match &args.config {
        Some(path) => VaultConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => VaultConfig::default(),
    };
    if let Some(db) = args.db {
        config.db_path = db;
    }

    let vault = Vault::open(config)
        .await
        .context("failed to open record store")?;
    let mut stdin = std::io::stdin().lock();

    match args.command {
        Command::Init => {
            let password = prompt(&mut stdin, "New password")?;
            vault.setup(&password).await?;
            info!("store initialized");
        }
        Command::Status => {
            let status = vault.status().await?;
            println!("{status}");
        }
        Command::List => {
            unlock(&vault, &mut stdin).await?;
            let records = vault.load_all().await?;
            let listing = Listing {
                clients: &records.clients,
                sessions: &records.sessions,
                warnings: records.warnings.iter().map(ToString::to_string).collect(),
            };
            println!("{}", serde_json::to_string_pretty(&listing)?);
        }
        Command::NextId { date } => {
            unlock(&vault, &mut stdin).await?;
            let clients = vault.list_clients().await?;
            println!("{}", next_client_id(&clients, &date));
        }
        Command::Export { out } => {
            unlock(&vault, &mut stdin).await?;
            let bundle = vault.export_all().await?;
            bundle
                .write_to(&out)
                .await
                .with_context(|| format!("failed to write {}", out.display()))?;
            info!(
                clients = bundle.clients.len(),
                sessions = bundle.sessions.len(),
                "wrote {}",
                out.display()
            );
        }
        Command::Import { bundle } => {
            let parsed = BackupBundle::read_from(&bundle)
                .await
                .with_context(|| format!("failed to read {}", bundle.display()))?;
            let password = prompt(&mut stdin, "Backup password")?;
            vault.import_bundle(&parsed, &password).await?;
            info!("imported {}", bundle.display());
        }
        Command::ChangePassword => {
            let current = prompt(&mut stdin, "Current password")?;
            let new = prompt(&mut stdin, "New password")?;
            vault.rotate_password(&current, &new).await?;
            info!("password changed");
        }
        Command::Clear { yes } => {
            if !yes {
                bail!("refusing to clear without --yes");
            }
            unlock(&vault, &mut stdin).await?;
            vault.clear_all_data().await?;
        }
    }
    Ok(())
}

async fn unlock(vault: &Vault, input: &mut impl BufRead) -> Result<()> {
    if vault.status().await? == VaultStatus::NeedsSetup {
        return Err(VaultError::NotInitialized).context("run `therapylog init` first");
    }
    let password = prompt(input, "Password")?;
    vault.unlock(&password).await?;
    Ok(())
}

/// Reads one line, without its newline, after printing `label` to stderr.
fn prompt(input: &mut impl BufRead, label: &str) -> Result<String> {
    eprint!("{label}: ");
    std::io::stderr().flush()?;
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        bail!("expected {} on stdin", label.to_lowercase());
    }
    let trimmed = line.trim_end_matches(['\r', '\n']).len();
    line.truncate(trimmed);
    Ok(line)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn parses_export() {
        let args = Args::parse_from(["therapylog", "--db", "x.db", "export", "out.json"]);
        assert_eq!(args.db, Some(PathBuf::from("x.db")));
        assert!(matches!(args.command, Command::Export { out } if out == PathBuf::from("out.json")));
    }

    #[test]
    fn prompt_strips_line_endings() {
        let mut input = std::io::Cursor::new("correcthorse123\r\nsecond\n");
        assert_eq!(prompt(&mut input, "Password").unwrap(), "correcthorse123");
        assert_eq!(prompt(&mut input, "Password").unwrap(), "second");
        assert!(prompt(&mut input, "Password").is_err());
    }
}
