use clap::{Arg, Command};
use std::process;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod server;
#[cfg(test)]
mod test_support;
mod utils;

use config::{RawSettings, ServiceConfig};

/// Prints a formatted box with the given lines
/// Empty strings create empty lines, other strings are centered within the box
fn print_box(lines: &[&str]) {
    const BOX_WIDTH: usize = 60; // Total width including borders
    const CONTENT_WIDTH: usize = BOX_WIDTH - 4; // Width for content (excluding "║  " and "  ║")

    eprintln!("\n\x1b[36m╔{}╗", "═".repeat(BOX_WIDTH - 2));

    for line in lines {
        if line.is_empty() {
            eprintln!("║{}║", " ".repeat(BOX_WIDTH - 2));
        } else {
            let visible_len = strip_ansi_codes(line).chars().count();

            if visible_len < CONTENT_WIDTH {
                let total_padding = CONTENT_WIDTH - visible_len;
                let left_padding = total_padding / 2;
                let right_padding = total_padding - left_padding;

                eprintln!(
                    "║  {}{}{}\x1b[36m║",
                    " ".repeat(left_padding),
                    line,
                    " ".repeat(right_padding)
                );
            } else {
                eprintln!("║  {}\x1b[36m  ║", line);
            }
        }
    }

    eprintln!("╚{}╝\x1b[0m\n", "═".repeat(BOX_WIDTH - 2));
}

/// Strips ANSI escape codes to calculate visible text length
fn strip_ansi_codes(text: &str) -> String {
    let mut result = String::new();
    let mut chars = text.chars();

    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.next() == Some('[') {
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() {
                        break;
                    }
                }
            }
        } else {
            result.push(ch);
        }
    }

    result
}

fn cli() -> Command {
    Command::new("pdf-text-service")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Downloads a remote PDF and returns its text layer over HTTP")
        .long_about(
            "Standalone PDF text-extraction service.\n\
            - GET  /       liveness probe\n\
            - POST /parse  {\"url\": \"...\"} -> {\"text\": \"...\"}",
        )
        .arg(
            Arg::new("port")
                .long("port")
                .short('p')
                .value_name("PORT")
                .env("PORT")
                .help("TCP port to listen on (default: 4000)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("timeout-secs")
                .long("timeout-secs")
                .value_name("SECONDS")
                .env("DOWNLOAD_TIMEOUT_SECS")
                .help("Wall-clock limit for downloading a PDF (default: 60)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("max-bytes")
                .long("max-bytes")
                .value_name("BYTES")
                .env("MAX_DOWNLOAD_BYTES")
                .help("Largest PDF accepted, in bytes (default: 314572800)")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("quiet")
                .long("quiet")
                .short('q')
                .help("Log errors only and skip the startup banner")
                .action(clap::ArgAction::SetTrue),
        )
}

#[tokio::main]
async fn main() {
    // A missing .env file is normal in production.
    dotenvy::dotenv().ok();

    let matches = cli().get_matches();
    let quiet = matches.get_flag("quiet");

    // RUST_LOG wins; otherwise info, or errors only in quiet mode
    let default_level = if quiet { "error" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();

    let raw = RawSettings {
        port: matches.get_one::<String>("port").cloned(),
        timeout_secs: matches.get_one::<String>("timeout-secs").cloned(),
        max_bytes: matches.get_one::<String>("max-bytes").cloned(),
    };
    let config = match ServiceConfig::from_raw(&raw) {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {:#}", e);
            process::exit(2);
        }
    };

    if !quiet {
        let listen = format!("\x1b[0m Listening on port {} \x1b[0m", config.port);
        print_box(&[
            "",
            "\x1b[1m\x1b[31m PDF Text Service \x1b[0m",
            "",
            "\x1b[0m Remote PDF to plain text over HTTP \x1b[0m",
            "",
            &listen,
            "",
        ]);
    }

    info!("Starting PDF parsing service...");

    if let Err(e) = server::router::serve(config).await {
        error!("Failed to start server: {:#}", e);
        process::exit(1);
    }
}
