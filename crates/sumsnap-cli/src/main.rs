mod client;
mod commands;
mod prompt;
mod session;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::client::DEFAULT_SERVER_URL;
use crate::commands::{chat::handle_chat, waitlist::handle_waitlist};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Address of the SumSnap server
    #[arg(long, global = true, env = "SUMSNAP_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat with the product guide
    Chat {
        /// Send turns without the built-in product instruction
        #[arg(long)]
        no_system_prompt: bool,
    },

    /// Join the launch waitlist
    Waitlist {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        email: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Replies are printed to stdout, so logs stay on stderr and default to warnings.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Chat { no_system_prompt } => handle_chat(&cli.server, no_system_prompt).await,
        Command::Waitlist { name, email } => handle_waitlist(&cli.server, name, email).await,
    }
}
