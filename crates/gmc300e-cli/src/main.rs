//! GMC-300E command line reader
//!
//! Connects to the device, optionally lists serial ports, then runs each
//! requested command in order and prints its decoded reply.
//!
//! Usage:
//!   gmc300e [OPTIONS]
//!
//! Logging is controlled through `RUST_LOG` (default: info).

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use gmc300e_core::protocol::{list_ports, Command, Connector, SessionConfig};
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "gmc300e", version, about = "Read values from a GMC-300E radiation monitor")]
struct Args {
    /// JSON session configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Serial port (overrides the configuration file)
    #[arg(short, long)]
    port: Option<String>,

    /// Baud rate
    #[arg(short, long)]
    baud: Option<u32>,

    /// Wait between a command and its reply, in milliseconds
    #[arg(long)]
    settle_ms: Option<u64>,

    /// Read and write timeout, in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// List available serial ports after connecting
    #[arg(long)]
    list_ports: bool,

    /// Commands to run (default: all), e.g. GETVER GETCPM
    #[arg(value_name = "COMMAND")]
    commands: Vec<String>,

    /// Continue with the next command when one fails
    #[arg(long)]
    keep_going: bool,
}

fn load_config(args: &Args) -> Result<SessionConfig> {
    let mut config = match &args.config {
        Some(path) => SessionConfig::from_json_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => SessionConfig::default(),
    };
    if let Some(port) = &args.port {
        config.port = port.clone();
    }
    if let Some(baud) = args.baud {
        config.baud_rate = baud;
    }
    if let Some(settle) = args.settle_ms {
        config.settle_delay_ms = settle;
    }
    if let Some(timeout) = args.timeout_ms {
        config.read_timeout_ms = timeout;
        config.write_timeout_ms = timeout;
    }
    Ok(config)
}

fn print_ports() {
    let ports = list_ports();
    if ports.is_empty() {
        warn!("No ports could be enumerated");
        return;
    }
    for port in ports {
        println!("Found port: {}", port.name);
        if let Some(usb_id) = port.usb_id() {
            println!("\tUSB ID:\t{}", usb_id);
            println!(
                "\tUSB Serial:\t{}",
                port.serial_number.as_deref().unwrap_or("-")
            );
        }
    }
}

fn selected_commands(args: &Args) -> Result<Vec<Command>> {
    if args.commands.is_empty() {
        return Ok(Command::ALL.to_vec());
    }
    args.commands
        .iter()
        .map(|k| Command::from_keyword(k).ok_or_else(|| anyhow!("unknown command: {}", k)))
        .collect()
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = load_config(&args)?;
    let commands = selected_commands(&args)?;

    let mut conn = Connector::new(config);
    conn.connect()
        .with_context(|| format!("failed to open port {}", conn.config().port))?;

    if args.list_ports {
        print_ports();
    }

    for cmd in commands {
        match conn.query(cmd) {
            Ok(reading) => {
                info!("Got {}: {}", cmd, reading);
                println!("{}: {}", cmd, reading);
            }
            Err(e) if args.keep_going => warn!("failed to get {}: {}", cmd, e),
            Err(e) => return Err(e).with_context(|| format!("failed to get {}", cmd)),
        }
    }

    conn.disconnect();
    Ok(())
}
