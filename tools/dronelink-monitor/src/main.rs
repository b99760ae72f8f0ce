// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! dronelink-monitor - Watch a vehicle from the terminal
//!
//! # Usage
//!
//! ```bash
//! # Print attribute changes as they happen
//! dronelink-monitor udpin:0.0.0.0:14550 watch
//!
//! # Only mode and armed, stop after 20 changes
//! dronelink-monitor tcp:127.0.0.1:5760 watch -a mode -a armed -n 20
//!
//! # Dump the parameter table
//! dronelink-monitor /dev/ttyACM0,57600 params --filter RTL_
//!
//! # Download the mission as JSON
//! dronelink-monitor udpin:0.0.0.0:14550 mission --json
//!
//! # Write a default configuration file
//! dronelink-monitor - gen-config dronelink.toml
//! ```

use chrono::Local;
use clap::{Parser, Subcommand};
use colored::*;
use dronelink::{EventKind, Session, SessionConfig};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Watch a vehicle's state, parameters and mission
#[derive(Parser, Debug)]
#[command(name = "dronelink-monitor")]
#[command(version)]
#[command(about = "Watch a vehicle's state, parameters and mission")]
struct Args {
    /// Connection string (tcp:HOST:PORT, udpin:ADDR:PORT, udpout:HOST:PORT, /dev/ttyX[,BAUD])
    conn: String,

    /// Session configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Seconds to wait for the vehicle and for each download
    #[arg(short, long, default_value = "30")]
    timeout: u64,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print attribute changes as they happen
    Watch {
        /// Attributes to show (default: all)
        #[arg(short, long)]
        attribute: Vec<String>,

        /// Stop after this many changes (0 = unlimited)
        #[arg(short = 'n', long, default_value = "0")]
        count: u64,
    },

    /// Download and print the parameter table
    Params {
        /// Only names containing this text (case-insensitive)
        #[arg(short, long)]
        filter: Option<String>,

        /// Output JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Download and print the mission
    Mission {
        /// Output JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a configuration file with every default
    GenConfig {
        #[arg(default_value = "dronelink.toml")]
        output: PathBuf,
    },
}

type CliResult = Result<(), Box<dyn std::error::Error>>;

fn main() {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&args.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    if args.no_color || !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    if let Err(e) = run(&args) {
        eprintln!("{}: {}", "Error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> CliResult {
    let config = match &args.config {
        Some(path) => SessionConfig::from_file(path)?,
        None => SessionConfig::default(),
    };

    if let Command::GenConfig { output } = &args.command {
        config.write_file(output)?;
        eprintln!("{} wrote {}", ">>>".green().bold(), output.display());
        return Ok(());
    }

    let config = SessionConfig {
        heartbeat_timeout_ms: args.timeout * 1000,
        ..config
    };
    info!("dronelink-monitor v{}", env!("CARGO_PKG_VERSION"));
    info!("Connecting to {}", args.conn);
    let session = Session::connect(&args.conn, config)?;
    if let Some((system, component)) = session.target() {
        eprintln!(
            "{} vehicle {}/{} mode={} armed={}",
            ">>>".green().bold(),
            system,
            component,
            session.mode().unwrap_or_default().cyan(),
            session.armed().unwrap_or(false)
        );
    }

    let timeout = Duration::from_secs(args.timeout);
    let result = match &args.command {
        Command::Watch { attribute, count } => watch(&session, attribute, *count),
        Command::Params { filter, json } => params(&session, filter.as_deref(), *json, timeout),
        Command::Mission { json } => mission(&session, *json),
        Command::GenConfig { .. } => Ok(()),
    };

    let metrics = session.metrics();
    info!(
        "{} decoded, {} sent, {} decode errors, {} listener panics",
        metrics.messages_decoded,
        metrics.messages_sent,
        metrics.decode_errors,
        metrics.listener_panics
    );
    session.close();
    result
}

fn watch(session: &Session, attributes: &[String], max: u64) -> CliResult {
    let running = Arc::new(AtomicBool::new(true));
    {
        let running = Arc::clone(&running);
        ctrlc::set_handler(move || running.store(false, Ordering::SeqCst))?;
    }

    let wanted: Vec<String> = attributes.iter().map(|a| a.to_ascii_lowercase()).collect();
    let printed = Arc::new(AtomicU64::new(0));
    {
        let printed = Arc::clone(&printed);
        let running = Arc::clone(&running);
        session.on_attribute("*", move |event| {
            let EventKind::Attribute {
                name,
                value,
                version,
                changed,
            } = event.kind
            else {
                return;
            };
            if !changed || (!wanted.is_empty() && !wanted.iter().any(|w| w == name)) {
                return;
            }
            let n = printed.fetch_add(1, Ordering::SeqCst) + 1;
            println!(
                "{} {} {} {}",
                format!("[{}]", Local::now().format("%H:%M:%S%.3f")).dimmed(),
                format!("{:>14}", name).cyan(),
                value,
                format!("(v{})", version).dimmed()
            );
            if max > 0 && n >= max {
                running.store(false, Ordering::SeqCst);
            }
        });
    }
    session.on_disconnect(|event| {
        if let EventKind::Disconnect { reason } = event.kind {
            warn!("Disconnected: {}", reason);
        }
    });

    eprintln!("{}", "Press Ctrl+C to stop".dimmed());
    while running.load(Ordering::SeqCst) && !session.is_closed() {
        std::thread::sleep(Duration::from_millis(100));
        let health = session.link_health();
        if !health.is_alive() {
            warn!(
                "No messages for {:?}",
                health.last_message.unwrap_or(health.threshold)
            );
            std::thread::sleep(Duration::from_secs(1));
        }
    }
    eprintln!(
        "\n{} {} change(s)",
        "---".dimmed(),
        printed.load(Ordering::SeqCst)
    );
    Ok(())
}

fn params(session: &Session, filter: Option<&str>, json: bool, timeout: Duration) -> CliResult {
    let parameters = session.parameters();
    if let Err(e) = parameters.sync(timeout) {
        // Partial tables are still worth printing
        warn!("{}", e);
    }

    let filter = filter.map(str::to_ascii_uppercase);
    let mut shown = 0usize;
    for entry in parameters.entries() {
        if let Some(f) = &filter {
            if !entry.name.to_ascii_uppercase().contains(f.as_str()) {
                continue;
            }
        }
        shown += 1;
        if json {
            println!(
                "{}",
                serde_json::json!({
                    "name": entry.name,
                    "value": entry.value,
                    "index": entry.index,
                    "type": entry.kind,
                })
            );
        } else {
            println!(
                "{:>4}  {:<16} {}",
                entry.index.to_string().dimmed(),
                entry.name.cyan(),
                entry.value
            );
        }
    }
    if !json {
        eprintln!(
            "\n{} {} of {} parameter(s)",
            "---".dimmed(),
            shown,
            parameters.len()
        );
    }
    Ok(())
}

fn mission(session: &Session, json: bool) -> CliResult {
    let items = session.mission().download()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    for item in &items {
        println!(
            "{:>3}  cmd={:<4} frame={} p=[{}, {}, {}, {}] lat={:.7} lon={:.7} alt={:.1}",
            item.seq.to_string().yellow(),
            item.command,
            item.frame,
            item.param1,
            item.param2,
            item.param3,
            item.param4,
            item.latitude(),
            item.longitude(),
            item.z
        );
    }
    eprintln!("\n{} {} item(s)", "---".dimmed(), items.len());
    Ok(())
}
