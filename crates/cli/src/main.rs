//! Kron CLI - search ranking and client state tools.
//!
//! # Usage
//!
//! ```bash
//! # Rank a local catalog for a query
//! kron search "лопата" --catalog products.json
//!
//! # Rank products from the storefront API (needs KRON_API_URL)
//! kron search "дрель" --limit 5 --include-out-of-stock
//!
//! # Show how text is normalized for matching
//! kron normalize "Лопата штыковая"
//!
//! # Show or clear recent searches
//! kron history
//! kron history --clear
//! ```
//!
//! # Commands
//!
//! - `search` - Rank products for a query and record it in the history
//! - `normalize` - Print the normalized form of a text
//! - `history` - List or clear recent searches

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

const DEFAULT_LOG_FILTER: &str = "kron_storefront=info,kron_cli=info";

#[derive(Parser)]
#[command(name = "kron")]
#[command(author, version, about = "Kron storefront tools")]
struct Cli {
    /// Directory holding persisted client state
    #[arg(long, global = true, env = "KRON_STORAGE_DIR", default_value = ".kron")]
    storage_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Rank products for a search query
    Search(commands::search::SearchArgs),
    /// Print the normalized form of a text
    Normalize {
        /// Text to normalize
        text: String,
    },
    /// List recent searches
    History {
        /// Forget all recent searches
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() {
    // Logs go to stderr so command output stays pipeable
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .with_writer(std::io::stderr)
        .init();

    // Before parsing, so `.env` values reach clap's `env` fallbacks
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> kron_storefront::Result<()> {
    match cli.command {
        Commands::Search(args) => commands::search::run(&args, &cli.storage_dir).await,
        Commands::Normalize { text } => {
            commands::normalize::run(&text);
            Ok(())
        }
        Commands::History { clear } => commands::history::run(&cli.storage_dir, clear),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_search() {
        let cli = Cli::try_parse_from([
            "kron",
            "search",
            "лопата",
            "--catalog",
            "products.json",
            "--limit",
            "5",
            "--include-out-of-stock",
        ])
        .unwrap();
        let Commands::Search(args) = cli.command else {
            panic!("expected search command");
        };
        assert_eq!(args.query, "лопата");
        assert_eq!(args.limit, 5);
        assert!(args.include_out_of_stock);
        assert_eq!(args.catalog, Some(PathBuf::from("products.json")));
    }

    #[test]
    fn test_parse_history_clear() {
        let cli = Cli::try_parse_from(["kron", "history", "--clear"]);
        assert!(matches!(
            cli.map(|c| c.command),
            Ok(Commands::History { clear: true })
        ));
    }
}
