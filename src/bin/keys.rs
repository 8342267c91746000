use anyhow::{Context, Result};
use chatmgr::config::{KEYRING_SERVICE, KEYRING_USER};
use clap::{Parser, Subcommand};
use colored::Colorize;
use keyring::{Entry, Error as KeyringError};
use std::io::{self, Write};

#[derive(Parser)]
#[command(name = "chatmgr-keys", about = "Manage the `chatmgr` API key in the OS keyring")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store the API key
    Set,
    /// Print the stored API key
    Get,
    /// Delete the stored API key
    Delete,
}

fn main() -> Result<()> {
    env_logger::try_init().ok();

    let cli = Cli::parse();
    let entry =
        Entry::new(KEYRING_SERVICE, KEYRING_USER).context("Failed to create keyring entry")?;

    match cli.command {
        Commands::Set => {
            print!("Enter API key for {}: ", KEYRING_USER.cyan());
            io::stdout().flush()?;

            let key = rpassword::read_password().context("Failed to read password from stdin")?;
            if key.trim().is_empty() {
                println!("{}", "API key cannot be empty".red());
                return Ok(());
            }

            match entry.set_password(key.trim()) {
                Ok(()) => println!("{}", "API key saved successfully".green()),
                Err(e) => println!("{}", format!("Failed to set password: {e}").red()),
            }
        }
        Commands::Get => match entry.get_password() {
            Ok(key) => println!("{key}"),
            Err(KeyringError::NoEntry) => println!("{}", "No API key stored".yellow()),
            Err(e) => println!("{}", format!("Failed to read API key: {e}").red()),
        },
        Commands::Delete => match entry.delete_credential() {
            Ok(()) => println!("{}", "API key deleted successfully".green()),
            Err(KeyringError::NoEntry) => println!("{}", "No API key stored".yellow()),
            Err(e) => println!("{}", format!("Failed to delete password: {e}").red()),
        },
    }

    Ok(())
}
