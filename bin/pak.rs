//! `pak` is the primary CLI binary.
//!
//! Everything pak prints goes to stderr. Stdout is reserved for the server's
//! protocol stream.

use clap::Parser;
use colored::Colorize;
use pak_cli::handlers;
use pak_cli::{Cli, Command, FATAL_EXIT_CODE, PakError, PakResult, user_config_env_var};
use tracing_subscriber::EnvFilter;

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

#[tokio::main]
async fn main() {
    // Only enable tracing when RUST_LOG is set.
    init_tracing();

    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&e);
            std::process::exit(FATAL_EXIT_CODE);
        }
    }
}

/// Print an error with appropriate formatting based on error type.
fn print_error(e: &PakError) {
    eprintln!();
    match e {
        PakError::MissingRequiredConfig { package, keys } => {
            eprintln!(
                "  {} Missing required config for {}",
                "error".bright_red().bold(),
                package.bright_white()
            );
            eprintln!();
            for key in keys {
                eprintln!("    {}", key.bright_white());
            }
            eprintln!();
            eprintln!("    {}:", "hint".bright_blue().bold());
            eprintln!(
                "      Save values: {}",
                format!("pak config set {} KEY=value", package).bright_white()
            );
            let env_vars: Vec<String> = keys.iter().map(|k| user_config_env_var(k)).collect();
            eprintln!("      Or set: {}", env_vars.join(", ").bright_white());
        }
        PakError::ConfigCorrupted { path, reason } => {
            eprintln!("  {} Config file is corrupted", "error".bright_red().bold());
            eprintln!();
            eprintln!("    {}: {}", "File".dimmed(), path.display());
            eprintln!("    {}: {}", "Reason".dimmed(), reason);
            eprintln!();
            eprintln!(
                "    {}: Fix or remove the file and try again",
                "hint".bright_blue().bold()
            );
        }
        PakError::ManifestMissing(dir) => {
            eprintln!(
                "  {} manifest.json not found in bundle",
                "error".bright_red().bold()
            );
            eprintln!();
            eprintln!("    {}: {}", "Cache".dimmed(), dir.display());
            eprintln!();
            eprintln!(
                "    {}: Re-pull the bundle with {}",
                "hint".bright_blue().bold(),
                "pak run <package> --update".bright_white()
            );
        }
        PakError::Registry { status, message } => {
            eprintln!(
                "  {} {}",
                "error[registry]".bright_red().bold(),
                format!("(HTTP {})", status).dimmed()
            );
            eprintln!();
            eprintln!("    {}", message);
        }
        PakError::Cancelled => {
            eprintln!("  {} Operation cancelled", "✗".bright_red());
        }
        _ => {
            eprintln!("  {} {}", "error".bright_red().bold(), e);
        }
    }
    eprintln!();
}

/// Initialize tracing on stderr. Only enables logging when RUST_LOG is set.
fn init_tracing() {
    let rust_log_set = std::env::var("RUST_LOG")
        .ok()
        .filter(|s| !s.is_empty())
        .is_some();

    if !rust_log_set {
        return;
    }

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

/// Dispatch the parsed command. Returns the process exit code.
async fn run() -> PakResult<i32> {
    let cli = Cli::parse();

    match cli.command {
        Command::Run { package, update } => handlers::run_package(&package, update).await,
        Command::Config(cmd) => handlers::config_pak(cmd).await.map(|()| 0),
    }
}
