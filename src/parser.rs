//! Spoken-phrase to algebraic-move rewriting.
//! No grammar, no tokenizer: the transcript is lower-cased, every vocabulary
//! entry is applied as a literal global substring replacement, and remaining
//! whitespace is stripped. Entries are applied longest-pattern-first so that
//! "captures" wins over "capture" and "castle queenside" wins over "queen";
//! ties keep the order of `VOCABULARY` below. The order is fixed and part of
//! the contract - collisions between overlapping fragments are resolved by it
//! and nothing else.

use shakmaty::Color;

/// Spoken fragment -> algebraic fragment. Listed roughly by theme; the
/// effective order is longest-first (see `substitutions`).
const VOCABULARY: &[(&str, &str)] = &[
    // Castling phrases
    ("castle queenside", "O-O-O"),
    ("queenside castle", "O-O-O"),
    ("castle kingside", "O-O"),
    ("kingside castle", "O-O"),
    ("castles", "O-O"),
    ("castle", "O-O"),
    // Move qualifiers
    ("checkmate", "#"),
    ("check", "+"),
    ("promotes to", "="),
    ("promote to", "="),
    ("captures", "x"),
    ("capture", "x"),
    ("takes", "x"),
    ("take", "x"),
    // Pieces
    ("knight", "N"),
    ("bishop", "B"),
    ("queen", "Q"),
    ("rook", "R"),
    ("king", "K"),
    ("pawn", ""),
    // Phonetic alphabet files
    ("alpha", "a"),
    ("bravo", "b"),
    ("charlie", "c"),
    ("delta", "d"),
    ("echo", "e"),
    ("foxtrot", "f"),
    ("golf", "g"),
    ("hotel", "h"),
    // Rank words and common mis-hearings
    ("three", "3"),
    ("seven", "7"),
    ("eight", "8"),
    ("four", "4"),
    ("five", "5"),
    ("one", "1"),
    ("two", "2"),
    ("six", "6"),
    ("for", "4"),
    ("won", "1"),
    // Punctuation the transcriber likes to insert
    (".", ""),
    (",", ""),
];

/// A voice command after control/color word handling.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedCommand {
    /// "quit" / "exit": terminate the interface.
    Quit,
    /// Everything else: a move attempt, optionally forcing the side to move
    /// first ("black knight bravo six").
    Move { san: String, force: Option<Color> },
}

/// The vocabulary in application order: longest pattern first, `VOCABULARY`
/// order for equal lengths.
fn substitutions() -> Vec<(&'static str, &'static str)> {
    let mut entries = VOCABULARY.to_vec();
    entries.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    entries
}

/// Rewrites a spoken phrase into a compact algebraic move string.
pub fn normalize(phrase: &str) -> String {
    let mut text = phrase.to_lowercase();
    for (pattern, replacement) in substitutions() {
        text = text.replace(pattern, replacement);
    }
    text.split_whitespace().collect()
}

/// Interprets a raw transcript: control words, then an optional leading color
/// word, then vocabulary normalization of the remainder.
pub fn parse_transcript(transcript: &str) -> ParsedCommand {
    let text = transcript.trim().to_lowercase();
    if text == "quit" || text == "exit" {
        return ParsedCommand::Quit;
    }

    let (force, rest) = if let Some(rest) = text.strip_prefix("black") {
        (Some(Color::Black), rest)
    } else if let Some(rest) = text.strip_prefix("white") {
        (Some(Color::White), rest)
    } else {
        (None, text.as_str())
    };

    ParsedCommand::Move {
        san: normalize(rest),
        force,
    }
}

/// Word-like vocabulary entries plus the control and color words, for use as
/// a transcription bias list.
pub fn phrase_hints() -> Vec<String> {
    let mut hints: Vec<String> = VOCABULARY
        .iter()
        .map(|(pattern, _)| *pattern)
        .filter(|pattern| pattern.chars().all(|c| c.is_ascii_alphabetic() || c == ' '))
        .map(str::to_string)
        .collect();
    for word in ["black", "white", "quit", "exit"] {
        hints.push(word.to_string());
    }
    hints
}
