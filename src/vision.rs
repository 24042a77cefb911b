//! Board location boundary.
//! The real grid-detection smarts live outside this crate; the shipped
//! `RegionLocator` stands in for them with calibrated bounds, the same MVP
//! approach as hardcoded capture bounds: crop the configured rectangle and
//! slice it into the 8x8 grayscale tile grid the classifier expects. "Not
//! found" is reported when the region falls off the frame or nothing
//! board-like is drawn there.

use anyhow::{Result, ensure};
use image::{DynamicImage, GenericImageView, GrayImage, imageops};
use tracing::debug;

use crate::config::Region;

/// Tiles per board.
pub const BOARD_TILES: usize = 64;

/// Anything flatter than this luma spread is an empty patch of screen, not a
/// chessboard.
const FLATNESS_THRESHOLD: u8 = 24;

/// Pixel bounding box of the last detected board.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BoardRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// The 64 per-square grayscale images of one detection, in FEN reading order:
/// rank 8 down to rank 1, file a to file h within each rank.
pub struct TileGrid {
    tiles: Vec<GrayImage>,
}

impl TileGrid {
    pub fn new(tiles: Vec<GrayImage>) -> Result<Self> {
        ensure!(
            tiles.len() == BOARD_TILES,
            "expected {} tiles, got {}",
            BOARD_TILES,
            tiles.len()
        );
        Ok(Self { tiles })
    }

    pub fn tiles(&self) -> &[GrayImage] {
        &self.tiles
    }
}

/// One successful board detection.
pub struct BoardDetection {
    pub rect: BoardRect,
    pub tiles: TileGrid,
}

/// Finds a chessboard in a full-screen frame, or reports that there is none.
pub trait BoardLocator {
    fn locate(&self, frame: &DynamicImage) -> Result<Option<BoardDetection>>;
}

/// Locator backed by a calibrated screen region.
pub struct RegionLocator {
    region: Region,
}

impl RegionLocator {
    pub fn new(region: Region) -> Self {
        Self { region }
    }
}

impl BoardLocator for RegionLocator {
    fn locate(&self, frame: &DynamicImage) -> Result<Option<BoardDetection>> {
        let Region {
            x,
            y,
            width,
            height,
        } = self.region;
        let (frame_w, frame_h) = frame.dimensions();

        if x.saturating_add(width) > frame_w || y.saturating_add(height) > frame_h {
            debug!(
                "board region ({x},{y},{width},{height}) outside {frame_w}x{frame_h} frame"
            );
            return Ok(None);
        }

        let cell_w = width / 8;
        let cell_h = height / 8;
        if cell_w == 0 || cell_h == 0 {
            debug!("board region too small to hold an 8x8 grid");
            return Ok(None);
        }

        let gray = imageops::grayscale(&frame.crop_imm(x, y, width, height));

        let (mut min, mut max) = (u8::MAX, u8::MIN);
        for pixel in gray.pixels() {
            min = min.min(pixel.0[0]);
            max = max.max(pixel.0[0]);
        }
        if max - min < FLATNESS_THRESHOLD {
            debug!("board region is visually flat, no board drawn there");
            return Ok(None);
        }

        let mut tiles = Vec::with_capacity(BOARD_TILES);
        for row in 0..8 {
            for col in 0..8 {
                tiles.push(
                    imageops::crop_imm(&gray, col * cell_w, row * cell_h, cell_w, cell_h)
                        .to_image(),
                );
            }
        }

        Ok(Some(BoardDetection {
            rect: BoardRect {
                left: x as i32,
                top: y as i32,
                right: (x + width) as i32,
                bottom: (y + height) as i32,
            },
            tiles: TileGrid::new(tiles)?,
        }))
    }
}
