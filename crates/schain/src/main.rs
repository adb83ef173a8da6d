//! schain - Encrypted environment chains
//!
//! Commands:
//! - write <CHAIN>: Append NAME=VALUE lines from stdin to a chain
//! - export: Print the master key
//! - exec <CHAIN> <CMD>...: Run a command with a chain in its environment
//! - run <FILE> <CMD>...: Same, for an unencrypted chain file

use std::convert::Infallible;
use std::ffi::OsString;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use schain::{launch, legacy, Chains, Environment, KeyringStore};
use schain_core::Config;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "schain")]
#[command(about = "Encrypted environment chains - inject secrets into a command without leaving them on disk in plaintext")]
#[command(version)]
#[command(after_help = r#"EXAMPLES:
    printf 'AWS_ACCESS_KEY_ID=...\nAWS_SECRET_ACCESS_KEY=...\n' | schain write aws
    schain exec aws -- aws s3 ls

ENVIRONMENT:
    SCHAIN_DIR    Chain storage directory (default: ~/.schain)
    SCHAIN_KEY    Credential store account for the master key (default: schain)
    RUST_LOG      Log filter, e.g. RUST_LOG=schain=debug

SECURITY:
    - Chains are encrypted with ChaCha20-Poly1305, a fresh nonce per write
    - The master key is kept in the OS credential store, never on disk
    - exec replaces this process, so no wrapper keeps secrets in memory"#)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Append NAME=VALUE lines from stdin to a chain (ends at a blank line or EOF)
    Write {
        /// Chain name (e.g., aws, prod/db)
        chain: String,
    },

    /// Print the base64 master key (for backup or moving to another machine)
    Export,

    /// Run a command with a chain's entries added to its environment
    Exec {
        /// Chain name
        chain: String,
        /// Command and arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<OsString>,
    },

    /// Run a command with entries from an unencrypted NAME=VALUE file
    Run {
        /// Plaintext chain file
        file: PathBuf,
        /// Command and arguments
        #[arg(trailing_var_arg = true, allow_hyphen_values = true, required = true)]
        command: Vec<OsString>,
    },
}

fn main() -> Result<()> {
    // Logs go to stderr so `export` output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    let config = Config::from_env()?;
    let chains = Chains::new(&config, KeyringStore);

    match cli.command {
        Commands::Write { chain } => cmd_write(&chains, &chain),
        Commands::Export => cmd_export(&chains),
        Commands::Exec { chain, command } => cmd_exec(&chains, &chain, &command),
        Commands::Run { file, command } => cmd_run(&file, &command),
    }
}

/// Append entries from stdin
fn cmd_write(chains: &Chains<KeyringStore>, chain: &str) -> Result<()> {
    let stdin = io::stdin();

    if stdin.is_terminal() {
        eprintln!("Enter NAME=VALUE lines, blank line to finish:");
    }

    let added = chains
        .write(chain, stdin.lock())
        .with_context(|| format!("Failed to write chain {}", chain))?;

    if io::stderr().is_terminal() {
        eprintln!("success: {} entries added to {}", added, chain);
    }

    Ok(())
}

/// Print the master key
fn cmd_export(chains: &Chains<KeyringStore>) -> Result<()> {
    let key = chains.export_key().context("Failed to read master key")?;
    println!("{}", key);
    Ok(())
}

/// Decrypt a chain and replace this process with the command
fn cmd_exec(chains: &Chains<KeyringStore>, chain: &str, command: &[OsString]) -> Result<()> {
    let env = chains.environment(chain)?;
    hand_off(command, &env)
}

/// Legacy: merge a plaintext file and replace this process with the command
fn cmd_run(file: &Path, command: &[OsString]) -> Result<()> {
    let text = legacy::load_plaintext(file)?;
    let mut env = Environment::from_current();
    env.merge(&text);
    hand_off(command, &env)
}

fn hand_off(command: &[OsString], env: &Environment) -> Result<()> {
    let Some(program) = command.first() else {
        anyhow::bail!("Command required");
    };

    let path = launch::resolve(program)?;
    let never: Infallible = launch::launch(&path, command, env)?;
    match never {}
}
