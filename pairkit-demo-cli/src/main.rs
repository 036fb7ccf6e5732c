//! Pairkit Demo CLI
//!
//! Command-line interface for inspecting pairing codes and emulating the
//! login and sign handshakes.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;
mod ui;

#[derive(Parser)]
#[command(name = "pairkit-demo")]
#[command(about = "Pairkit Demo CLI - Inspect pairing codes and emulate remote signing", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Network to operate on (overrides PAIRKIT_NETWORK)
    #[arg(short, long, global = true)]
    network: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Pairing code operations
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },

    /// Fetch and print relay configuration
    FetchIce {
        /// Base URL serving ice-conf.json, or a .json document
        url: String,
    },

    /// Run both parties of a handshake in process
    Emulate {
        #[command(subcommand)]
        flow: EmulateFlow,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Mint a pairing code and show it as QR
    Encode {
        /// Flow type (login or sign)
        #[arg(short, long, default_value = "login")]
        flow: String,

        /// Random token to use instead of a fresh one
        #[arg(short, long)]
        token: Option<String>,

        /// Relay configuration URL to embed
        #[arg(long)]
        relay_url: Option<String>,

        /// Skip the QR rendering
        #[arg(long)]
        no_qr: bool,
    },

    /// Parse a scanned pairing code
    Decode {
        /// The scanned code
        raw: String,

        /// Also check the code against this party's network and the given flow
        #[arg(long)]
        expect_flow: Option<String>,
    },
}

#[derive(Subcommand)]
enum EmulateFlow {
    /// Prove account ownership to a dApp
    Login {
        #[command(flatten)]
        link: commands::emulate::LinkOptions,
    },

    /// Sign and execute transactions offered by a dApp
    Sign {
        #[command(flatten)]
        link: commands::emulate::LinkOptions,

        /// Route the transactions through a sponsorship gateway
        #[arg(long)]
        sponsored: bool,

        /// Number of transactions to offer in one batch
        #[arg(long, default_value = "1")]
        batch: usize,

        /// Approve without prompting
        #[arg(short, long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter("pairkit_demo_cli=debug,pairkit_lib=debug,pairkit_interactive=debug")
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter("pairkit_demo_cli=info,pairkit_lib=warn,pairkit_interactive=warn")
            .init();
    }

    let config = commands::load_config(cli.network.as_deref())?;

    // Dispatch commands
    match cli.command {
        Commands::Token { action } => match action {
            TokenAction::Encode {
                flow,
                token,
                relay_url,
                no_qr,
            } => {
                commands::token::encode(&config, &flow, token, relay_url, !no_qr, cli.verbose)?;
            }
            TokenAction::Decode { raw, expect_flow } => {
                commands::token::decode(&config, &raw, expect_flow.as_deref(), cli.verbose)?;
            }
        },
        Commands::FetchIce { url } => {
            commands::ice::fetch(&config, &url, cli.verbose).await?;
        }
        Commands::Emulate { flow } => match flow {
            EmulateFlow::Login { link } => {
                commands::emulate::login(config, &link, cli.verbose).await?;
            }
            EmulateFlow::Sign {
                link,
                sponsored,
                batch,
                yes,
            } => {
                commands::emulate::sign(config, &link, sponsored, batch, yes, cli.verbose).await?;
            }
        },
    }

    Ok(())
}
