//! Command-line interface parsing and handling
//!
//! This module parses command-line arguments and runs the requested
//! subcommand. With no subcommand the interactive worksheet view opens.

pub mod show;

use std::error::Error;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::api::{RestClient, WorksheetApi};
use crate::auth::AuthManager;
use crate::core::config::data::{path_display, Config};
use crate::core::config::defaults::ConfigKey;
use crate::ui::worksheet_loop::{run_worksheet, WorksheetLaunch};
use crate::utils::logging::init_tracing;
use crate::utils::url::normalize_base_url;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_DESCRIBE"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "quire")]
#[command(version, long_version = LONG_VERSION)]
#[command(about = "A full-screen terminal client for collaborative worksheets")]
#[command(
    long_about = "Quire opens a worksheet from a worksheet server in a full-screen terminal view. \
Blocks are navigated with the keyboard, bundles can be selected for bulk commands, \
and the worksheet source can be edited in place.\n\n\
Authentication:\n\
  Use 'quire auth' to store an access token in your system keyring.\n\n\
Environment Variables:\n\
  QUIRE_TOKEN       Access token (takes precedence over the keyring)\n\
  QUIRE_SERVER      Server URL (overridden by --server)\n\
  QUIRE_LOG         Log filter for --log, e.g. quire=debug\n\n\
Controls:\n\
  j/k or arrows     Move focus\n\
  g g / G           Jump to top / end\n\
  x or space        Select the focused bundle\n\
  c c               Focus the terminal\n\
  E                 Edit the worksheet source\n\
  ?                 Show every shortcut\n\
  q or Ctrl+C       Quit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Worksheet server URL
    #[arg(short = 's', long, global = true, value_name = "URL")]
    pub server: Option<String>,

    /// Write diagnostic logs to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a worksheet in the interactive view (default)
    Open {
        /// Worksheet uuid or name; defaults to the configured worksheet, then home
        worksheet: Option<String>,
    },
    /// Store an access token for the server
    Auth,
    /// Remove the stored access token for the server
    Deauth,
    /// Set a configuration value, or print the configuration when no value is given
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        value: Option<String>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
    /// Print the outline of a worksheet without opening the interactive view
    Show {
        /// Worksheet uuid or name
        worksheet: String,
    },
}

/// Worksheet opened when nothing is named on the command line or in the
/// config. The server resolves it to the user's home worksheet.
pub const HOME_WORKSHEET: &str = "home";

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    let config = Config::load()?;
    let server_url = normalize_base_url(&config.resolve_server_url(args.server.as_deref()));

    match args.command.unwrap_or(Commands::Open { worksheet: None }) {
        Commands::Auth => {
            if let Err(e) = AuthManager::new(&server_url).interactive_auth() {
                eprintln!("❌ Authentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Deauth => {
            if let Err(e) = AuthManager::new(&server_url).interactive_deauth() {
                eprintln!("❌ Deauthentication failed: {e}");
                std::process::exit(1);
            }
            Ok(())
        }
        Commands::Set { key, value } => {
            let (Some(key), Some(value)) = (key, value) else {
                config.print_all();
                println!("  (file: {})", path_display(Config::active_path()));
                return Ok(());
            };
            match set_config_value(&key, &value) {
                Ok(name) => println!("✅ Set {name} to: {}", value.trim()),
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        Commands::Unset { key } => {
            match unset_config_value(&key) {
                Ok(name) => println!("✅ Unset {name}"),
                Err(e) => {
                    eprintln!("❌ {e}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
        Commands::Show { worksheet } => {
            let api = build_client(&server_url)?;
            show::print_outline(api.as_ref(), &worksheet).await
        }
        Commands::Open { worksheet } => {
            let api = build_client(&server_url)?;
            let worksheet = worksheet
                .or_else(|| config.default_worksheet.clone())
                .unwrap_or_else(|| HOME_WORKSHEET.to_string());
            run_worksheet(WorksheetLaunch {
                config,
                api,
                server_url,
                worksheet,
            })
            .await
        }
    }
}

fn set_config_value(key: &str, value: &str) -> Result<&'static str, Box<dyn Error>> {
    let key = ConfigKey::parse(key)?;
    Config::mutate(|config| {
        key.set(config, value)?;
        Ok(key.name())
    })
}

fn unset_config_value(key: &str) -> Result<&'static str, Box<dyn Error>> {
    let key = ConfigKey::parse(key)?;
    Config::mutate(|config| {
        key.unset(config);
        Ok(key.name())
    })
}

/// REST client for `server_url`, authenticated when a token is available.
pub fn build_client(server_url: &str) -> Result<Arc<dyn WorksheetApi>, Box<dyn Error>> {
    let token = AuthManager::new(server_url)
        .resolve_token()?
        .map(|(token, _source)| token);
    let client = reqwest::Client::builder()
        .user_agent(concat!("quire/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(Arc::new(RestClient::new(client, server_url, token)))
}

#[cfg(test)]
mod tests;
