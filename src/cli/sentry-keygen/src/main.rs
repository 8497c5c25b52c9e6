//! Sentry Keygen - Key provisioning CLI.
//!
//! Provisions the on-disk key repository the server loads at startup:
//! one directory per rotation epoch, holding `<ts>-private.pem` /
//! `<ts>-public.pem` Ed25519 pairs. Run `generate` into a fresh epoch
//! directory to rotate.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{EncodePrivateKey, EncodePublicKey};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use sentry_keystore::KeyStore;

#[derive(Parser)]
#[command(name = "sentry-keygen")]
#[command(about = "Nubster Sentry - Key pair provisioning")]
#[command(version)]
struct Cli {
    /// Key repository directory
    #[arg(long, default_value = "keys", env = "SENTRY_KEYS_DIR")]
    keys_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new Ed25519 key pair in the given epoch
    Generate {
        /// Epoch name (e.g. "sessions02"); created if absent
        #[arg(long)]
        epoch: String,
    },
    /// List provisioned epochs and key ids
    List,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { epoch } => generate(&cli.keys_dir, &epoch),
        Commands::List => list(&cli.keys_dir),
    }
}

fn generate(keys_dir: &Path, epoch: &str) -> Result<()> {
    if epoch.is_empty()
        || !epoch
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        bail!("epoch name must be non-empty and match [A-Za-z0-9_-]+");
    }

    let epoch_dir = keys_dir.join(epoch);
    fs::create_dir_all(&epoch_dir)
        .with_context(|| format!("failed to create {}", epoch_dir.display()))?;

    let stem = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system time before UNIX epoch")?
        .as_secs();

    let private_path = epoch_dir.join(format!("{stem}-private.pem"));
    let public_path = epoch_dir.join(format!("{stem}-public.pem"));
    if private_path.exists() || public_path.exists() {
        bail!("key files for stem {stem} already exist in epoch {epoch}");
    }

    let signing_key = SigningKey::generate(&mut OsRng);

    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .context("failed to encode private key")?;
    let public_pem = signing_key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .context("failed to encode public key")?;

    fs::write(&private_path, private_pem.as_bytes())
        .with_context(|| format!("failed to write {}", private_path.display()))?;
    restrict_permissions(&private_path)?;

    fs::write(&public_path, public_pem)
        .with_context(|| format!("failed to write {}", public_path.display()))?;

    println!("generated key pair {epoch}/{stem}");
    println!("  private: {}", private_path.display());
    println!("  public:  {}", public_path.display());

    Ok(())
}

fn list(keys_dir: &Path) -> Result<()> {
    let store = KeyStore::load(keys_dir)
        .with_context(|| format!("failed to load key repository at {}", keys_dir.display()))?;

    let epochs = store.epochs();
    if epochs.is_empty() {
        println!("no epochs provisioned under {}", keys_dir.display());
        return Ok(());
    }

    let signing = store.signing_key_id();
    for epoch in &epochs {
        println!("{epoch}/");
        for key_id in store.key_ids() {
            if let Some(stem) = key_id.strip_prefix(&format!("{epoch}/")) {
                let marker = if Some(&key_id) == signing.as_ref() {
                    "  (signing)"
                } else {
                    ""
                };
                println!("  {stem}{marker}");
            }
        }
    }

    Ok(())
}

/// Private key files are readable by the owner only.
#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
        .with_context(|| format!("failed to restrict permissions on {}", path.display()))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
