//! Terminal client for chatrelay.
//!
//! Reads lines from stdin and sends them as chat messages; prints the
//! sequence as it changes.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use chatrelay::chat::{DeliveryStatus, Entry, SequenceChange};
use chatrelay::client::{ChatClient, ClientEvent};
use chatrelay::Config;

#[derive(Parser, Debug)]
#[command(name = "chatrelay-client", about = "Join the chat relay from a terminal")]
struct Args {
    /// Display name to send messages as
    #[arg(short, long)]
    name: String,

    /// Relay WebSocket URL (overrides the config file)
    #[arg(short, long)]
    url: Option<String>,

    /// Config file to read the [client] section from
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print diagnostic log entries
    #[arg(long)]
    debug: bool,
}

fn render(change: SequenceChange, entry: &Entry) -> String {
    let marker = match (change, entry.status) {
        (_, DeliveryStatus::Sending) => "…",
        (SequenceChange::Replaced { .. }, DeliveryStatus::Delivered) => "✓",
        _ if entry.message.is_synthetic => "*",
        _ => " ",
    };
    format!("{:>4} {} {}", change.index(), marker, entry.message.format())
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    config.apply_env_overrides();
    if let Some(url) = args.url {
        config.client.server_url = url;
    }

    if let Err(e) = chatrelay::logging::init_stderr(if args.debug { "debug" } else { "warn" }) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let name = args.name.trim().to_string();
    if name.is_empty() {
        eprintln!("--name must not be empty");
        std::process::exit(2);
    }

    let (handle, mut events) = ChatClient::connect(&config.client, name);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(ClientEvent::Status(status)) => println!("-- {status}"),
                Some(ClientEvent::Sequence { change, entry }) => println!("{}", render(change, &entry)),
                Some(ClientEvent::Log(entry)) => {
                    if args.debug {
                        eprintln!("{}", entry.format());
                    }
                }
                None => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => {
                    if let Err(e) = handle.submit(line) {
                        eprintln!("Cannot send: {e}");
                    }
                }
                Ok(None) => {
                    let _ = handle.disconnect();
                    break;
                }
                Err(e) => {
                    eprintln!("Failed to read input: {e}");
                    break;
                }
            },
        }
    }
}
