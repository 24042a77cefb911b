//! The orchestration loop's brain.
//! Owns the held position and the last-known board rectangle, and wires the
//! injected collaborators together: capture -> locate -> classify on every
//! refresh tick, and parse -> judge -> map -> drag for each submitted move.
//! Everything runs on the caller's single thread; the rectangle is reused
//! between detections even if the board has since moved (staleness hazard,
//! accepted for this tool's scope).

use anyhow::Result;
use shakmaty::{Color, Square};
use tracing::{debug, info, warn};

use crate::automation::AutomationDriver;
use crate::capture::ScreenCapturer;
use crate::classify::{self, TileClassifier};
use crate::mapper;
use crate::parser::{self, ParsedCommand};
use crate::rules::{Game, MoveJudgement};
use crate::speech::{Transcriber, Transcript};
use crate::vision::{BoardLocator, BoardRect};

/// Result of one move submission.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// Parsed, legal, and dragged on screen.
    Automated { from: Square, to: Square },
    /// Parsed but not legal in the held position.
    Illegal,
    /// Not algebraic notation at all.
    Invalid,
    /// Legal, but the pointer synthesis failed.
    AutomationFailed,
}

/// Result of one voice command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VoiceOutcome {
    /// The user said "quit"/"exit": shut the interface down.
    Quit,
    /// A move phrase made it through to submission.
    Submitted(SubmitOutcome),
    /// Nothing usable: unintelligible audio or a service error. Already
    /// reflected in the move status; the user must re-trigger.
    Failed,
}

pub struct Controller {
    game: Game,
    board_rect: BoardRect,
    capturer: Box<dyn ScreenCapturer>,
    locator: Box<dyn BoardLocator>,
    classifier: Box<dyn TileClassifier>,
    transcriber: Box<dyn Transcriber>,
    driver: Box<dyn AutomationDriver>,
    board_status: String,
    move_status: String,
}

impl Controller {
    pub fn new(
        capturer: Box<dyn ScreenCapturer>,
        locator: Box<dyn BoardLocator>,
        classifier: Box<dyn TileClassifier>,
        transcriber: Box<dyn Transcriber>,
        driver: Box<dyn AutomationDriver>,
    ) -> Self {
        Self {
            game: Game::new(),
            // Zero until the first detection; deliberately never invalidated
            // afterwards.
            board_rect: BoardRect::default(),
            capturer,
            locator,
            classifier,
            transcriber,
            driver,
            board_status: "no board detected yet".to_string(),
            move_status: String::new(),
        }
    }

    pub fn board_status(&self) -> &str {
        &self.board_status
    }

    pub fn move_status(&self) -> &str {
        &self.move_status
    }

    /// One refresh tick: screenshot, locate, classify, replace the held
    /// placement and rectangle. Any failure leaves prior state untouched and
    /// is logged only; the next tick retries implicitly.
    pub fn refresh(&mut self) {
        debug!("START board refresh");
        if let Err(e) = self.try_refresh() {
            warn!("board refresh failed: {e:#}");
        }
        debug!("END board refresh");
    }

    fn try_refresh(&mut self) -> Result<()> {
        let frame = self.capturer.capture()?;
        let Some(detection) = self.locator.locate(&frame)? else {
            info!("FAIL no board detected");
            return Ok(());
        };

        let classification = self.classifier.classify(&detection.tiles)?;
        let stats = classification.stats();
        debug!(
            "per-tile certainty range [{:.3} - {:.3}], avg {:.3}",
            stats.min, stats.max, stats.avg
        );

        let placement = classify::shorten_placement(&classification.placement)?;
        self.game.set_placement(&placement)?;
        self.board_rect = detection.rect;

        info!("SUCCESS got board");
        debug!(placement = %placement, rect = ?self.board_rect, "held position updated");
        self.board_status = format!("board: {placement}");
        Ok(())
    }

    /// Submits a typed or voice-normalized algebraic move string. Judged
    /// against live legality; on success exactly one drag is synthesized.
    /// The held position is not advanced here - the next detection tick is
    /// the only feedback path.
    pub fn submit(&mut self, text: &str) -> SubmitOutcome {
        debug!("START move submission '{text}'");
        let outcome = match self.game.judge_san(text) {
            MoveJudgement::Legal { from, to } => {
                info!("move {text} is legal");
                let start = mapper::square_center(self.board_rect, from);
                let end = mapper::square_center(self.board_rect, to);
                match self.driver.drag(start, end) {
                    Ok(()) => {
                        self.move_status = format!("automated {from} -> {to}");
                        SubmitOutcome::Automated { from, to }
                    }
                    Err(e) => {
                        warn!("drag failed: {e:#}");
                        self.move_status = format!("automation failed: {e:#}");
                        SubmitOutcome::AutomationFailed
                    }
                }
            }
            MoveJudgement::Illegal => {
                warn!("move {text} is not legal");
                self.move_status = "illegal move".to_string();
                SubmitOutcome::Illegal
            }
            MoveJudgement::Invalid => {
                warn!("invalid move '{text}'");
                self.move_status = "invalid move".to_string();
                SubmitOutcome::Invalid
            }
        };
        debug!("END move submission");
        outcome
    }

    /// Manual side-to-move override (the "Black Move" control).
    pub fn force_turn(&mut self, color: Color) {
        if let Err(e) = self.game.force_turn(color) {
            warn!("cannot force turn: {e:#}");
            self.move_status = format!("cannot force turn: {e:#}");
        }
    }

    /// One voice command: listen, transcribe, and route the phrase. Speech
    /// failures surface as a status message only.
    pub fn voice_command(&mut self) -> VoiceOutcome {
        let transcript = match self.transcriber.listen() {
            Ok(Transcript::Text(text)) => text,
            Ok(Transcript::Unrecognized) => {
                info!("speech service could not understand audio");
                self.move_status = "could not understand audio".to_string();
                return VoiceOutcome::Failed;
            }
            Err(e) => {
                warn!("speech capture failed: {e:#}");
                self.move_status = format!("speech failed: {e:#}");
                return VoiceOutcome::Failed;
            }
        };

        info!("heard: '{transcript}'");
        match parser::parse_transcript(&transcript) {
            ParsedCommand::Quit => VoiceOutcome::Quit,
            ParsedCommand::Move { san, force } => {
                if let Some(color) = force {
                    self.force_turn(color);
                }
                VoiceOutcome::Submitted(self.submit(&san))
            }
        }
    }

    #[cfg(test)]
    fn held_state(&self) -> (String, BoardRect) {
        (self.game.board_fen(), self.board_rect)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classification;
    use crate::mapper::Point;
    use crate::vision::{BoardDetection, TileGrid};
    use anyhow::anyhow;
    use image::{DynamicImage, GrayImage};
    use std::cell::RefCell;
    use std::rc::Rc;

    const LONG_START: &str =
        "rnbqkbnr/pppppppp/11111111/11111111/11111111/11111111/PPPPPPPP/RNBQKBNR";

    struct FakeCapturer;

    impl ScreenCapturer for FakeCapturer {
        fn capture(&self) -> Result<DynamicImage> {
            Ok(DynamicImage::new_rgba8(8, 8))
        }
    }

    struct FakeLocator {
        rect: Option<BoardRect>,
    }

    impl BoardLocator for FakeLocator {
        fn locate(&self, _frame: &DynamicImage) -> Result<Option<BoardDetection>> {
            match self.rect {
                Some(rect) => Ok(Some(BoardDetection {
                    rect,
                    tiles: TileGrid::new(vec![GrayImage::new(1, 1); 64])?,
                })),
                None => Ok(None),
            }
        }
    }

    struct FakeClassifier {
        placement: String,
    }

    impl TileClassifier for FakeClassifier {
        fn classify(&self, _tiles: &TileGrid) -> Result<Classification> {
            Ok(Classification {
                placement: self.placement.clone(),
                confidence: [[0.9; 8]; 8],
            })
        }
    }

    enum FakeSpeech {
        Heard(&'static str),
        Unrecognized,
        ServiceDown,
    }

    impl Transcriber for FakeSpeech {
        fn listen(&self) -> Result<Transcript> {
            match self {
                FakeSpeech::Heard(text) => Ok(Transcript::Text(text.to_string())),
                FakeSpeech::Unrecognized => Ok(Transcript::Unrecognized),
                FakeSpeech::ServiceDown => Err(anyhow!("service unreachable")),
            }
        }
    }

    #[derive(Clone, Default)]
    struct RecordingDriver {
        drags: Rc<RefCell<Vec<(Point, Point)>>>,
    }

    impl AutomationDriver for RecordingDriver {
        fn drag(&self, from: Point, to: Point) -> Result<()> {
            self.drags.borrow_mut().push((from, to));
            Ok(())
        }
    }

    fn rect_800() -> BoardRect {
        BoardRect {
            left: 0,
            top: 0,
            right: 800,
            bottom: 800,
        }
    }

    fn controller_with(
        locator_rect: Option<BoardRect>,
        speech: FakeSpeech,
    ) -> (Controller, RecordingDriver) {
        let driver = RecordingDriver::default();
        let controller = Controller::new(
            Box::new(FakeCapturer),
            Box::new(FakeLocator { rect: locator_rect }),
            Box::new(FakeClassifier {
                placement: LONG_START.to_string(),
            }),
            Box::new(speech),
            Box::new(driver.clone()),
        );
        (controller, driver)
    }

    #[test]
    fn test_refresh_updates_position_and_rect() {
        let (mut controller, _driver) =
            controller_with(Some(rect_800()), FakeSpeech::Unrecognized);
        controller.refresh();
        let (fen, rect) = controller.held_state();
        assert_eq!(fen, "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR");
        assert_eq!(rect, rect_800());
        assert!(controller.board_status().contains("rnbqkbnr"));
    }

    #[test]
    fn test_detection_miss_leaves_state_untouched() {
        let (mut controller, _driver) = controller_with(None, FakeSpeech::Unrecognized);
        let before = controller.held_state();
        controller.refresh();
        assert_eq!(controller.held_state(), before);
    }

    #[test]
    fn test_legal_submit_drags_once_with_mapped_coords() {
        let (mut controller, driver) =
            controller_with(Some(rect_800()), FakeSpeech::Unrecognized);
        controller.refresh();

        let outcome = controller.submit("e4");
        assert_eq!(
            outcome,
            SubmitOutcome::Automated {
                from: Square::E2,
                to: Square::E4,
            }
        );

        let drags = driver.drags.borrow();
        assert_eq!(drags.len(), 1);
        // e2: file e (4), rank 2 (1); e4: rank 4 (3). 100px cells, 50px inset.
        assert_eq!(drags[0].0, Point { x: 450, y: 650 });
        assert_eq!(drags[0].1, Point { x: 450, y: 450 });
    }

    #[test]
    fn test_submission_does_not_advance_position() {
        let (mut controller, _driver) =
            controller_with(Some(rect_800()), FakeSpeech::Unrecognized);
        controller.refresh();
        let before = controller.held_state();
        controller.submit("e4");
        assert_eq!(controller.held_state(), before);
    }

    #[test]
    fn test_illegal_and_invalid_are_distinct_and_drag_free() {
        let (mut controller, driver) =
            controller_with(Some(rect_800()), FakeSpeech::Unrecognized);
        controller.refresh();

        assert_eq!(controller.submit("e5"), SubmitOutcome::Illegal);
        assert_eq!(controller.move_status(), "illegal move");

        assert_eq!(controller.submit("blunder"), SubmitOutcome::Invalid);
        assert_eq!(controller.move_status(), "invalid move");

        assert!(driver.drags.borrow().is_empty());
    }

    #[test]
    fn test_voice_black_prefix_forces_side_then_submits() {
        let (mut controller, driver) = controller_with(
            Some(rect_800()),
            FakeSpeech::Heard("black knight bravo six"),
        );
        // Nb6 needs a black knight on d7; the startpos b8 knight cannot
        // reach b6 in one move.
        controller.classifier = Box::new(FakeClassifier {
            placement: "r1bqkbnr/pppnpppp/8/8/8/8/PPPPPPPP/RNBQKBNR".to_string(),
        });
        controller.refresh();

        let outcome = controller.voice_command();
        assert_eq!(
            outcome,
            VoiceOutcome::Submitted(SubmitOutcome::Automated {
                from: Square::D7,
                to: Square::B6,
            })
        );
        assert_eq!(driver.drags.borrow().len(), 1);
    }

    #[test]
    fn test_voice_quit() {
        let (mut controller, _driver) =
            controller_with(Some(rect_800()), FakeSpeech::Heard("quit"));
        assert_eq!(controller.voice_command(), VoiceOutcome::Quit);
    }

    #[test]
    fn test_voice_unrecognized_is_status_only() {
        let (mut controller, driver) =
            controller_with(Some(rect_800()), FakeSpeech::Unrecognized);
        assert_eq!(controller.voice_command(), VoiceOutcome::Failed);
        assert_eq!(controller.move_status(), "could not understand audio");
        assert!(driver.drags.borrow().is_empty());
    }

    #[test]
    fn test_voice_service_error_is_status_only() {
        let (mut controller, driver) =
            controller_with(Some(rect_800()), FakeSpeech::ServiceDown);
        assert_eq!(controller.voice_command(), VoiceOutcome::Failed);
        assert!(controller.move_status().contains("speech failed"));
        assert!(driver.drags.borrow().is_empty());
    }

    #[test]
    fn test_typed_move_via_voice_vocabulary() {
        let (mut controller, driver) =
            controller_with(Some(rect_800()), FakeSpeech::Heard("echo.for"));
        controller.refresh();
        let outcome = controller.voice_command();
        assert_eq!(
            outcome,
            VoiceOutcome::Submitted(SubmitOutcome::Automated {
                from: Square::E2,
                to: Square::E4,
            })
        );
        assert_eq!(driver.drags.borrow().len(), 1);
    }
}
