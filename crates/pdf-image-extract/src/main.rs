//! pdf-image-extract-rs: dump every raster image of a PDF as PNG files.
//!
//! Paths come from `resources/config.json` under the working directory:
//! `{"input": "document.pdf", "output": "images/"}`.

use std::path::{Path, PathBuf};
use std::process;

use anyhow::{Context, Result};
use clap::Parser;

use extract_core::{Config, ExtractionEvent, Extractor, Outcome};
use extract_pdf::LopdfBackend;

#[derive(Parser)]
#[command(
    name = "pdf-image-extract-rs",
    version,
    about = "Extract embedded images from a PDF as PNG files"
)]
struct Cli {
    /// Config file (default: ./resources/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dump effective config as JSON and exit
    #[arg(long)]
    dump_config: bool,
}

fn default_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

/// Load the config, falling back to empty paths when it is missing or broken.
/// The run then fails at file-open time with a clearer error.
fn load_config_or_default(path: &Path) -> Config {
    match Config::load(path) {
        Ok(config) => config,
        Err(e) => {
            println!("{}", e);
            log::warn!("Using empty configuration: {}", e);
            Config::default()
        }
    }
}

fn current_dir_or_empty() -> PathBuf {
    match std::env::current_dir() {
        Ok(dir) => dir,
        Err(e) => {
            println!("Cannot determine working directory: {}", e);
            PathBuf::new()
        }
    }
}

/// Console lines for a progress event, if it has any.
fn console_line(event: &ExtractionEvent) -> Option<String> {
    match event {
        ExtractionEvent::PasswordRequired => Some("Need to decrypt with password".to_string()),
        ExtractionEvent::PageCount(n) => Some(format!("PDF Num Pages: {}", n)),
        ExtractionEvent::PageStarted(page) => Some(format!("-----\nPage {}:", page)),
        ExtractionEvent::PageImages { count, .. } => Some(format!("{} Images", count)),
        ExtractionEvent::Finished { total_images } => {
            Some(format!("Total: {} images", total_images))
        }
        ExtractionEvent::ImageWritten { .. } => None,
    }
}

fn main() {
    let cli = Cli::parse();

    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(default_filter(cli.verbose)),
    )
    .init();

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| Config::default_path(&current_dir_or_empty()));
    let config = load_config_or_default(&config_path);

    if cli.dump_config {
        match serde_json::to_string_pretty(&config) {
            Ok(s) => {
                println!("{}", s);
                process::exit(0);
            }
            Err(e) => {
                println!("Error serializing config: {}", e);
                process::exit(1);
            }
        }
    }

    if let Err(e) = run(&config) {
        println!("Error: {:#}", e);
        process::exit(1);
    }
}

fn run(config: &Config) -> Result<()> {
    println!("Input file: {}", config.input);

    let outcome = Extractor::new(LopdfBackend)
        .progress_reporter(Box::new(|event| {
            if let Some(line) = console_line(event) {
                println!("{}", line);
            }
        }))
        .run(config.input_path(), config.output_dir())
        .with_context(|| format!("Failed to extract images from {}", config.input))?;

    match outcome {
        Outcome::Completed(report) => log::info!(
            "Wrote {} PNG files to {}",
            report.written.len(),
            config.output
        ),
        Outcome::PasswordRequired => log::info!("Stopped: {} needs a password", config.input),
    }

    Ok(())
}
