//! Operator CLI for credential records. Output goes to stdout, logs to stderr;
//! neither ever contains a plaintext password or key material.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::debug;

use migrale_credentials::config::resolve_config;
use migrale_credentials::crypto::record::StoredHash;
use migrale_credentials::telemetry::init_tracing;
use migrale_credentials::{CredentialError, PasswordHasher};

#[derive(Debug, Parser)]
#[command(name = "migrale-credentials", version, about = "Hash and verify Migrale credential records")]
struct Cli {
    /// JSON config file (falls back to $MIGRALE_CONFIG, then defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print a new credential record for the plaintext
    HashPassword { plaintext: String },
    /// Check a plaintext against a stored record
    VerifyPassword { plaintext: String, stored: String },
    /// Report whether a stored record is well formed
    InspectHash { stored: String },
    /// Print the effective KDF settings
    ShowConfig,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(cli.config.as_deref()).context("config load failed")?;
    init_tracing(&config.log_level);
    debug!(log_n = config.kdf.log_n, r = config.kdf.r, p = config.kdf.p, "kdf configured");

    let hasher = PasswordHasher::new(config.kdf.clone()).context("invalid kdf parameters")?;

    match cli.command {
        Command::HashPassword { plaintext } => {
            let record = hasher.hash(&plaintext).context("hashing failed")?;
            println!("{record}");
        }
        Command::VerifyPassword { plaintext, stored } => {
            let matches = match hasher.verify(&plaintext, &stored) {
                Ok(matches) => matches,
                Err(CredentialError::MalformedHash(err)) => {
                    tracing::warn!(error = %err, "stored credential record is malformed");
                    false
                }
                Err(err @ CredentialError::KeyDerivation(_)) => {
                    return Err(err).context("verification failed");
                }
            };
            println!("{}", if matches { "match" } else { "no-match" });
        }
        Command::InspectHash { stored } => {
            let report = match stored.parse::<StoredHash>() {
                Ok(record) => json!({
                    "wellFormed": true,
                    "length": stored.len(),
                    "salt": record.salt_text(),
                }),
                Err(err) => json!({
                    "wellFormed": false,
                    "length": stored.len(),
                    "reason": err.to_string(),
                }),
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::ShowConfig => {
            let printable = json!({
                "logLevel": config.log_level,
                "kdf": config.kdf,
                "memoryRequiredBytes": config.kdf.memory_required(),
            });
            println!("{}", serde_json::to_string_pretty(&printable)?);
        }
    }

    Ok(())
}
