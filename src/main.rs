mod automation;
mod capture;
mod classify;
mod config;
mod controller;
mod mapper;
mod parser;
mod rules;
mod speech;
mod ui;
mod vision;

use anyhow::{Context, Result};
use clap::{Arg, Command};
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::automation::RdevDriver;
use crate::capture::XcapCapturer;
use crate::classify::RemoteClassifier;
use crate::controller::Controller;
use crate::speech::CloudTranscriber;
use crate::vision::RegionLocator;

fn main() -> Result<()> {
    // The alternate screen owns stdout; diagnostics go to stderr so they can
    // be redirected to a file.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("voicemate=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let matches = Command::new("voicemate")
        .version("0.1.0")
        .about("Screen-scraping chess assistant: speak or type a move, it drags the piece")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Config file with board region, cadence, and speech settings")
                .default_value("voicemate.json"),
        )
        .arg(
            Arg::new("lang")
                .long("lang")
                .value_name("CODE")
                .help("Override the speech language code (e.g. en-US)"),
        )
        .get_matches();

    let config_path = matches.get_one::<String>("config").unwrap(); // Safe due to default
    let mut cfg = config::load(config_path)?;
    if let Some(lang) = matches.get_one::<String>("lang") {
        cfg.language = lang.clone();
    }

    if !speech::has_api_key() {
        info!("GOOGLE_SPEECH_API_KEY not set; voice commands will report a status error");
    }
    info!(
        "watching region ({},{}) {}x{} every {}ms",
        cfg.region.x, cfg.region.y, cfg.region.width, cfg.region.height, cfg.poll_interval_ms
    );

    let mut controller = Controller::new(
        Box::new(XcapCapturer),
        Box::new(RegionLocator::new(cfg.region)),
        Box::new(
            RemoteClassifier::new(cfg.classifier_url.clone())
                .context("Failed to set up the board classifier client")?,
        ),
        Box::new(
            CloudTranscriber::new(cfg.language.clone(), cfg.phrase_hints.clone(), cfg.listen_secs)
                .context("Failed to set up the speech client")?,
        ),
        Box::new(RdevDriver::new(cfg.move_duration_ms, cfg.drag_duration_ms)),
    );

    ui::run(
        &mut controller,
        Duration::from_millis(cfg.poll_interval_ms.max(1)),
    )
}
