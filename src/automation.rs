//! Pointer synthesis boundary.
//! Drives the piece drag through `rdev`: jump to the origin square, press,
//! glide to the destination, release. Durations are fixed constants from
//! config, not adaptive to system load.

use anyhow::{Result, anyhow};
use rdev::{Button, EventType};
use std::thread;
use std::time::Duration;
use tracing::debug;

use crate::mapper::Point;

/// Interpolation steps for the drag glide.
const GLIDE_STEPS: u32 = 12;
/// The OS needs a moment to register each synthesized event.
const EVENT_GAP: Duration = Duration::from_millis(8);

/// Performs the on-screen drag between two pixel coordinates.
pub trait AutomationDriver {
    fn drag(&self, from: Point, to: Point) -> Result<()>;
}

/// Production driver: rdev event synthesis.
pub struct RdevDriver {
    move_duration: Duration,
    drag_duration: Duration,
}

impl RdevDriver {
    pub fn new(move_ms: u64, drag_ms: u64) -> Self {
        Self {
            move_duration: Duration::from_millis(move_ms),
            drag_duration: Duration::from_millis(drag_ms),
        }
    }
}

impl AutomationDriver for RdevDriver {
    fn drag(&self, from: Point, to: Point) -> Result<()> {
        debug!(?from, ?to, "synthesizing drag");

        send(EventType::MouseMove {
            x: from.x as f64,
            y: from.y as f64,
        })?;
        thread::sleep(self.move_duration);

        send(EventType::ButtonPress(Button::Left))?;
        for step in 1..=GLIDE_STEPS {
            let t = step as f64 / GLIDE_STEPS as f64;
            send(EventType::MouseMove {
                x: from.x as f64 + (to.x - from.x) as f64 * t,
                y: from.y as f64 + (to.y - from.y) as f64 * t,
            })?;
            thread::sleep(self.drag_duration / GLIDE_STEPS);
        }
        send(EventType::ButtonRelease(Button::Left))?;
        Ok(())
    }
}

fn send(event: EventType) -> Result<()> {
    rdev::simulate(&event).map_err(|_| anyhow!("failed to synthesize input event {event:?}"))?;
    thread::sleep(EVENT_GAP);
    Ok(())
}
