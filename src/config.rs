//! Configuration: board region, poll cadence, speech settings, drag timings.
//! JSON on disk via serde; every field has a default so a missing or partial
//! file still yields a runnable setup.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use tracing::info;

use crate::parser;

/// Calibrated board bounds on the primary display.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where the board lives on screen. Tune with an OS screenshot tool.
    pub region: Region,
    /// Board refresh cadence.
    pub poll_interval_ms: u64,
    /// Served frozen-model endpoint for tile classification.
    pub classifier_url: String,
    /// Speech recognition language code.
    pub language: String,
    /// Bias vocabulary sent with every transcription request.
    pub phrase_hints: Vec<String>,
    /// Listen window per voice command.
    pub listen_secs: u64,
    /// Pointer travel time to the origin square.
    pub move_duration_ms: u64,
    /// Drag time from origin to destination.
    pub drag_duration_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            region: Region {
                x: 200,
                y: 300,
                width: 480,
                height: 480,
            },
            poll_interval_ms: 1000,
            classifier_url: "http://127.0.0.1:8508/v1/board:classify".to_string(),
            language: "en-US".to_string(),
            phrase_hints: parser::phrase_hints(),
            listen_secs: 4,
            move_duration_ms: 10,
            drag_duration_ms: 250,
        }
    }
}

/// Loads the config file, falling back to defaults when it does not exist.
pub fn load(path: &str) -> Result<Config> {
    match fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse config file {path}")),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            info!("config file {path} not found, using defaults");
            Ok(Config::default())
        }
        Err(e) => Err(e).with_context(|| format!("Failed to read config file {path}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_round_trips_through_json() {
        let config = Config::default();
        let json = serde_json::to_string(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.region, config.region);
        assert_eq!(parsed.poll_interval_ms, config.poll_interval_ms);
        assert_eq!(parsed.language, config.language);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: Config =
            serde_json::from_str(r#"{"poll_interval_ms": 250, "language": "de-DE"}"#).unwrap();
        assert_eq!(parsed.poll_interval_ms, 250);
        assert_eq!(parsed.language, "de-DE");
        assert_eq!(parsed.region, Config::default().region);
        assert_eq!(parsed.listen_secs, 4);
    }

    #[test]
    fn test_missing_file_is_defaults() {
        let config = load("definitely-not-a-real-config-file.json").unwrap();
        assert_eq!(config.poll_interval_ms, 1000);
    }

    #[test]
    fn test_default_hints_include_chess_vocabulary() {
        let config = Config::default();
        assert!(config.phrase_hints.iter().any(|h| h == "knight"));
        assert!(config.phrase_hints.iter().any(|h| h == "alpha"));
    }
}
