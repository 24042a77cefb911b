//! Screen capture boundary.
//! Uses `xcap` for cross-platform screenshots of the primary display. The
//! full frame goes to the locator untouched; cropping is its business.
//! Debug: set `DEBUG_CAPTURE=1` to save each frame to `screenshots/`.
//! Permissions note: on macOS, grant "Screen & System Audio Recording"
//! permission to the terminal in System Settings > Privacy & Security.

use anyhow::{Context, Result, bail};
use image::{DynamicImage, GenericImageView};
use std::env;
use std::fs;
use std::time::Instant;
use tracing::debug;
use xcap::Monitor;

/// Takes a full-screen snapshot on demand.
pub trait ScreenCapturer {
    fn capture(&self) -> Result<DynamicImage>;
}

/// Production capturer: primary monitor via xcap.
pub struct XcapCapturer;

impl ScreenCapturer for XcapCapturer {
    fn capture(&self) -> Result<DynamicImage> {
        let start = Instant::now();

        let monitors = Monitor::all().context("Failed to enumerate monitors")?;
        let primary = monitors.first().cloned().context("No monitors found")?;

        let raw = primary.capture_image().context(
            "Failed to capture image. On macOS, ensure the terminal has Screen Recording permission",
        )?;

        let frame = DynamicImage::ImageRgba8(raw);
        if frame.dimensions() == (0, 0) {
            bail!("Captured empty screenshot - possible permission issue or no display");
        }

        if env::var_os("DEBUG_CAPTURE").is_some() {
            fs::create_dir_all("screenshots")
                .context("Failed to create screenshots/ debug directory")?;
            frame
                .save("screenshots/current_frame.png")
                .context("Failed to save debug frame to screenshots/")?;
        }

        debug!("capture latency: {:?}", start.elapsed());
        Ok(frame)
    }
}
