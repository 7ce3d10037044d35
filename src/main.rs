//! CLI for SkullsUp
//!
//! Subcommands:
//! - `server`: run the mailbox server
//! - `write`: enqueue one command
//! - `read`: dequeue one command, or keep polling with `--follow`

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use clap::{Parser, Subcommand};
use skullsup::broker::{Message, Topic};
use skullsup::client::RelayClient;
use skullsup::config::{Settings, load_config_from};
use skullsup::utils::error::RelayError;
use skullsup::utils::logging;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "skullsup", version, about = "Capacity-bounded command mailbox broker")]
struct Cli {
    /// Configuration file (defaults to config/default.*)
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the mailbox server
    Server,
    /// Enqueue one command on a topic
    Write {
        topic: String,
        cmd: String,
        args: Vec<String>,
        /// Frame period in milliseconds
        #[arg(long, short, default_value_t = 0)]
        period: u64,
    },
    /// Dequeue a pending command from a topic
    Read {
        topic: String,
        /// Keep polling and print every command as it arrives
        #[arg(long, short)]
        follow: bool,
    },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let settings = match load_config_from(cli.config.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            let _ = logging::init("error", "stderr");
            error!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = logging::init(&settings.logging.level, &settings.logging.path) {
        let _ = logging::init("error", "stderr");
        error!("Failed to open log file {:?}: {e}", settings.logging.path);
        std::process::exit(1);
    }

    let result = match cli.command {
        Command::Server => run_server(&settings).await,
        Command::Write {
            topic,
            cmd,
            args,
            period,
        } => run_write(&settings, &topic, Message::new(cmd, args, period)).await,
        Command::Read { topic, follow } => run_read(&settings, &topic, follow).await,
    };

    if let Err(e) = result {
        error!("{e}");
        std::process::exit(2);
    }
}

async fn run_server(settings: &Settings) -> Result<(), RelayError> {
    let server = skullsup::build_server(settings).await?;

    tokio::select! {
        _ = server.run() => {
            error!("Mailbox server exited unexpectedly.");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received. Exiting gracefully.");
        }
    }

    Ok(())
}

fn parse_topic(topic: &str) -> Result<Topic, RelayError> {
    Topic::from_str(topic).map_err(|e| RelayError::Invalid(e.to_string()))
}

async fn run_write(settings: &Settings, topic: &str, message: Message) -> Result<(), RelayError> {
    let topic = parse_topic(topic)?;
    let client = RelayClient::from_settings(&settings.client)?;
    client.write(&topic, &message).await?;
    info!("Enqueued {message} on {topic}");
    Ok(())
}

async fn run_read(settings: &Settings, topic: &str, follow: bool) -> Result<(), RelayError> {
    let topic = parse_topic(topic)?;
    let client = RelayClient::from_settings(&settings.client)?;

    if follow {
        let period = Duration::from_secs(settings.client.poll_period_secs);
        client
            .poll(&topic, period, |message| print_message(&message))
            .await?;
        return Ok(());
    }

    match client.read(&topic).await? {
        Some(message) => {
            print_message(&message);
        }
        None => info!("Nothing pending on {topic}"),
    }
    Ok(())
}

fn print_message(message: &Message) -> bool {
    match serde_json::to_string(message) {
        Ok(json) => {
            println!("{json}");
            true
        }
        Err(e) => {
            error!("Failed to encode message: {e}");
            false
        }
    }
}
