//! Rules engine wrapper (shakmaty).
//! Holds the single chess position for the process lifetime. Placement is
//! replaced wholesale from each successful board detection while the side to
//! move is preserved; moves are judged against live legality, not just
//! syntax. Expected outcomes (unparsable, illegal) are variants of
//! `MoveJudgement`, never errors.

use anyhow::{Context, Result, anyhow};
use shakmaty::fen::Fen;
use shakmaty::san::San;
use shakmaty::{
    CastlingMode, CastlingSide, Chess, Color, EnPassantMode, FromSetup, Move, Position,
    PositionError, Square,
};

/// Verdict on a submitted algebraic move string.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MoveJudgement {
    /// Parses and is legal in the held position. For castling, `to` is the
    /// king's destination square (the square a player would drag to).
    Legal { from: Square, to: Square },
    /// Parses but is not playable right now.
    Illegal,
    /// Does not parse as algebraic notation.
    Invalid,
}

/// The held chess position.
pub struct Game {
    position: Chess,
}

impl Game {
    pub fn new() -> Self {
        Self {
            position: Chess::default(),
        }
    }

    pub fn turn(&self) -> Color {
        self.position.turn()
    }

    /// Compact board field of the held position, for diagnostics and change
    /// detection.
    pub fn board_fen(&self) -> String {
        self.position
            .board()
            .board_fen()
            .to_string()
    }

    /// Replaces the piece placement from a compact board field, keeping the
    /// current side to move. Castling rights are derived from where kings
    /// and rooks actually stand, since the detector knows nothing about move
    /// history.
    pub fn set_placement(&mut self, placement: &str) -> Result<()> {
        let turn = self.position.turn().char();
        let castling = castling_rights_for(placement);
        let text = format!("{placement} {turn} {castling} - 0 1");

        let fen: Fen = text
            .parse()
            .with_context(|| format!("rules library rejected placement '{placement}'"))?;
        self.position = fen
            .into_position::<Chess>(CastlingMode::Standard)
            .or_else(PositionError::ignore_too_much_material)
            .or_else(PositionError::ignore_impossible_check)
            .map_err(|e| anyhow!("detected position is not playable: {e}"))?;
        Ok(())
    }

    /// Forces the side to move without touching the placement. Used when a
    /// voice command names a color explicitly.
    pub fn force_turn(&mut self, color: Color) -> Result<()> {
        if self.position.turn() == color {
            return Ok(());
        }
        let mut setup = self.position.clone().to_setup(EnPassantMode::Legal);
        setup.turn = color;
        setup.ep_square = None; // meaningless once the turn is handed over
        self.position = Chess::from_setup(setup, CastlingMode::Standard)
            .or_else(PositionError::ignore_impossible_check)
            .map_err(|e| anyhow!("cannot pass the turn to {}: {e}", color_name(color)))?;
        Ok(())
    }

    /// Judges a move string against the held position. Does not apply the
    /// move: the on-screen board is the source of truth and the next
    /// detection tick picks the change up.
    pub fn judge_san(&self, text: &str) -> MoveJudgement {
        let san = match San::from_ascii(text.trim().as_bytes()) {
            Ok(san) => san,
            Err(_) => return MoveJudgement::Invalid,
        };
        let m = match san.to_move(&self.position) {
            Ok(m) => m,
            Err(_) => return MoveJudgement::Illegal,
        };
        match m {
            Move::Normal { from, to, .. } => MoveJudgement::Legal { from, to },
            Move::EnPassant { from, to } => MoveJudgement::Legal { from, to },
            Move::Castle { king, rook } => {
                let side = if rook.file() > king.file() {
                    CastlingSide::KingSide
                } else {
                    CastlingSide::QueenSide
                };
                MoveJudgement::Legal {
                    from: king,
                    to: side.king_to(self.position.turn()),
                }
            }
            // Drops do not exist in standard chess.
            _ => MoveJudgement::Invalid,
        }
    }
}

impl Default for Game {
    fn default() -> Self {
        Self::new()
    }
}

fn color_name(color: Color) -> &'static str {
    match color {
        Color::White => "white",
        Color::Black => "black",
    }
}

/// Derives castling rights from piece positions: a right survives only if
/// both the king and the matching rook stand on their starting squares.
fn castling_rights_for(placement: &str) -> String {
    let ranks: Vec<&str> = placement.split('/').collect();
    if ranks.len() != 8 {
        return "-".to_string();
    }

    fn expand(rank: &str) -> String {
        let mut out = String::new();
        for c in rank.chars() {
            if let Some(n) = c.to_digit(10) {
                out.push_str(&".".repeat(n as usize));
            } else {
                out.push(c);
            }
        }
        out
    }

    let rank1 = expand(ranks[7]); // White's back rank
    let rank8 = expand(ranks[0]); // Black's back rank

    let white_king_e1 = rank1.chars().nth(4) == Some('K');
    let black_king_e8 = rank8.chars().nth(4) == Some('k');

    let mut castling = String::new();
    if white_king_e1 && rank1.chars().nth(7) == Some('R') {
        castling.push('K');
    }
    if white_king_e1 && rank1.chars().nth(0) == Some('R') {
        castling.push('Q');
    }
    if black_king_e8 && rank8.chars().nth(7) == Some('r') {
        castling.push('k');
    }
    if black_king_e8 && rank8.chars().nth(0) == Some('r') {
        castling.push('q');
    }

    if castling.is_empty() {
        castling = "-".to_string();
    }
    castling
}
