//! Position classification boundary.
//! The pre-trained vision model runs behind an HTTP inference endpoint; this
//! crate only re-stitches the tile grid into one collage image, ships it as
//! base64 PNG, and reads back a placement string plus a per-square confidence
//! matrix. The raw placement may be long-form (empty squares spelled out as
//! runs of '1'); `shorten_placement` normalizes it to the compact board field
//! the rules library expects.

use anyhow::{Context, Result, bail, ensure};
use base64::{Engine as _, engine::general_purpose};
use image::{GrayImage, ImageFormat, imageops};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use std::time::Duration;
use tracing::debug;

use crate::vision::TileGrid;

const MAX_API_RETRIES: u32 = 2; // Retries for network/API errors
const TIMEOUT_SECS: u64 = 10;
const RETRY_DELAY_MS: u64 = 500;

/// Classifier output: best-guess placement plus per-square confidence in the
/// same reading order as the tiles (rank 8 first).
#[derive(Clone, Debug)]
pub struct Classification {
    pub placement: String,
    pub confidence: [[f32; 8]; 8],
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfidenceStats {
    pub min: f32,
    pub max: f32,
    pub avg: f32,
}

impl Classification {
    pub fn stats(&self) -> ConfidenceStats {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        let mut sum = 0.0;
        for row in &self.confidence {
            for &c in row {
                min = min.min(c);
                max = max.max(c);
                sum += c;
            }
        }
        ConfidenceStats {
            min,
            max,
            avg: sum / 64.0,
        }
    }
}

/// Turns the per-square tile grid into a placement guess.
pub trait TileClassifier {
    fn classify(&self, tiles: &TileGrid) -> Result<Classification>;
}

// *************** Request/Response Types ***************

#[derive(Serialize)]
struct ClassifyRequest<'a> {
    image: &'a str,
    format: &'static str,
}

#[derive(Deserialize)]
struct ClassifyResponse {
    placement: String,
    confidence: Vec<Vec<f32>>,
}

/// Production classifier: served frozen model behind `endpoint`.
pub struct RemoteClassifier {
    endpoint: String,
    client: Client,
    rt: tokio::runtime::Runtime,
}

impl RemoteClassifier {
    pub fn new(endpoint: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(TIMEOUT_SECS))
            .build()
            .context("Failed to create HTTP client")?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to create classifier runtime")?;
        Ok(Self {
            endpoint,
            client,
            rt,
        })
    }

    async fn call_with_retry(&self, request: &ClassifyRequest<'_>) -> Result<ClassifyResponse> {
        let mut last_error = None;

        for attempt in 1..=MAX_API_RETRIES + 1 {
            match self.call(request).await {
                Ok(response) => return Ok(response),
                Err(e) => {
                    debug!(
                        "classifier attempt {}/{} failed: {e:#}",
                        attempt,
                        MAX_API_RETRIES + 1
                    );
                    last_error = Some(e);
                    if attempt <= MAX_API_RETRIES {
                        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS)).await;
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| anyhow::anyhow!("classifier retries exhausted")))
    }

    async fn call(&self, request: &ClassifyRequest<'_>) -> Result<ClassifyResponse> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .context("Failed to send request to classifier service")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Classifier service error {status}: {body}");
        }

        response
            .json()
            .await
            .context("Failed to parse classifier response")
    }
}

impl TileClassifier for RemoteClassifier {
    fn classify(&self, tiles: &TileGrid) -> Result<Classification> {
        let board = collage(tiles)?;
        let mut png = Vec::new();
        image::DynamicImage::ImageLuma8(board)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode board collage as PNG")?;
        let encoded = general_purpose::STANDARD.encode(&png);

        let request = ClassifyRequest {
            image: &encoded,
            format: "png",
        };
        let response = self.rt.block_on(self.call_with_retry(&request))?;

        Ok(Classification {
            placement: response.placement,
            confidence: confidence_matrix(response.confidence)?,
        })
    }
}

// *************** Internal Functions ***************

/// Re-stitches the 64 tiles into one 8x8 collage image for the model.
fn collage(tiles: &TileGrid) -> Result<GrayImage> {
    let first = &tiles.tiles()[0];
    let (cell_w, cell_h) = first.dimensions();
    ensure!(cell_w > 0 && cell_h > 0, "tiles have zero size");

    let mut canvas = GrayImage::new(cell_w * 8, cell_h * 8);
    for (i, tile) in tiles.tiles().iter().enumerate() {
        ensure!(
            tile.dimensions() == (cell_w, cell_h),
            "tile {i} is {:?}, expected {:?}",
            tile.dimensions(),
            (cell_w, cell_h)
        );
        let col = (i % 8) as i64;
        let row = (i / 8) as i64;
        imageops::replace(&mut canvas, tile, col * cell_w as i64, row * cell_h as i64);
    }
    Ok(canvas)
}

fn confidence_matrix(rows: Vec<Vec<f32>>) -> Result<[[f32; 8]; 8]> {
    ensure!(rows.len() == 8, "expected 8 confidence rows, got {}", rows.len());
    let mut matrix = [[0.0; 8]; 8];
    for (r, row) in rows.into_iter().enumerate() {
        ensure!(row.len() == 8, "confidence row {r} has {} entries", row.len());
        matrix[r].copy_from_slice(&row);
    }
    Ok(matrix)
}

/// Normalizes a placement string to the compact board field: runs of empty
/// squares collapse to a single digit. Accepts both long form
/// ("11111111") and already-compact input; validates shape on the way.
pub fn shorten_placement(raw: &str) -> Result<String> {
    let field = raw.split_whitespace().next().unwrap_or("");
    let ranks: Vec<&str> = field.split('/').collect();
    ensure!(ranks.len() == 8, "expected 8 ranks in placement, got {}", ranks.len());

    let mut out = String::new();
    for (i, rank) in ranks.iter().enumerate() {
        if i > 0 {
            out.push('/');
        }
        let mut empties = 0u32;
        let mut files = 0u32;
        for c in rank.chars() {
            if let Some(d) = c.to_digit(10) {
                ensure!(d >= 1, "unexpected '0' in placement rank {}", 8 - i);
                empties += d;
                files += d;
            } else {
                ensure!(
                    "prnbqk".contains(c.to_ascii_lowercase()),
                    "unexpected piece character '{c}' in placement"
                );
                if empties > 0 {
                    out.push_str(&empties.to_string());
                    empties = 0;
                }
                out.push(c);
                files += 1;
            }
        }
        if empties > 0 {
            out.push_str(&empties.to_string());
        }
        ensure!(files == 8, "rank {} covers {} files, expected 8", 8 - i, files);
    }
    Ok(out)
}

// *************** Tests ***************

#[cfg(test)]
mod tests {
    use super::*;

    const LONG_START: &str =
        "rnbqkbnr/pppppppp/11111111/11111111/11111111/11111111/PPPPPPPP/RNBQKBNR";
    const SHORT_START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR";

    #[test]
    fn test_shorten_long_form() {
        assert_eq!(shorten_placement(LONG_START).unwrap(), SHORT_START);
    }

    #[test]
    fn test_shorten_keeps_compact_input() {
        assert_eq!(shorten_placement(SHORT_START).unwrap(), SHORT_START);
    }

    #[test]
    fn test_shorten_mixed_runs() {
        assert_eq!(
            shorten_placement("r1111111/11P11111/8/8/8/8/8/7K").unwrap(),
            "r7/2P5/8/8/8/8/8/7K"
        );
    }

    #[test]
    fn test_shorten_ignores_trailing_fields() {
        assert_eq!(
            shorten_placement(&format!("{LONG_START} w KQkq - 0 1")).unwrap(),
            SHORT_START
        );
    }

    #[test]
    fn test_shorten_rejects_wrong_rank_count() {
        assert!(shorten_placement("8/8/8").is_err());
    }

    #[test]
    fn test_shorten_rejects_overfull_rank() {
        assert!(shorten_placement("rnbqkbnrr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR").is_err());
    }

    #[test]
    fn test_shorten_rejects_unknown_piece() {
        assert!(shorten_placement("rnbqzbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR").is_err());
    }

    #[test]
    fn test_confidence_stats() {
        let mut confidence = [[0.9; 8]; 8];
        confidence[3][4] = 0.5;
        confidence[0][0] = 1.0;
        let c = Classification {
            placement: SHORT_START.to_string(),
            confidence,
        };
        let stats = c.stats();
        assert_eq!(stats.min, 0.5);
        assert_eq!(stats.max, 1.0);
        assert!((stats.avg - (0.9 * 62.0 + 0.5 + 1.0) / 64.0).abs() < 1e-6);
    }

    #[test]
    fn test_collage_dimensions() {
        let tiles = TileGrid::new(vec![GrayImage::new(16, 16); 64]).unwrap();
        let board = collage(&tiles).unwrap();
        assert_eq!(board.dimensions(), (128, 128));
    }

    #[test]
    fn test_confidence_matrix_shape_check() {
        assert!(confidence_matrix(vec![vec![1.0; 8]; 8]).is_ok());
        assert!(confidence_matrix(vec![vec![1.0; 8]; 7]).is_err());
        assert!(confidence_matrix(vec![vec![1.0; 7]; 8]).is_err());
    }

    #[test]
    fn test_classifier_response_wire_format() {
        let json = format!(
            r#"{{"placement": "{LONG_START}", "confidence": [{}]}}"#,
            vec!["[0.9,0.9,0.9,0.9,0.9,0.9,0.9,0.9]"; 8].join(",")
        );
        let response: ClassifyResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(response.placement, LONG_START);
        assert_eq!(response.confidence.len(), 8);
    }

    #[test]
    #[ignore = "requires a running classifier endpoint"]
    fn test_remote_classifier_round_trip() {
        // Run with a served model on localhost:
        //   cargo test test_remote_classifier_round_trip -- --ignored
        let classifier =
            RemoteClassifier::new("http://127.0.0.1:8508/v1/board:classify".to_string()).unwrap();
        let tiles = TileGrid::new(vec![GrayImage::new(32, 32); 64]).unwrap();
        let result = classifier.classify(&tiles);
        println!("Result: {result:?}");
    }
}
