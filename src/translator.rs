//! Text ↔ Morse translation.
//!
//! Direction is decided once per input: anything containing a `.` is read
//! as Morse, everything else as text. Symbols the table does not know are
//! echoed verbatim rather than rejected.

use crate::code_table::CodeTable;
use std::fmt;
use thiserror::Error;

/// Separator between Morse words.
pub const WORD_SEPARATOR: char = '/';
/// Separator between Morse letters, and between text words.
pub const LETTER_SEPARATOR: char = ' ';

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TranslateError {
    /// Nothing left after normalization.
    #[error("no input provided")]
    EmptyInput,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    TextToMorse,
    MorseToText,
}

impl Direction {
    /// Heuristic, not a format check: a literal period forces Morse decoding.
    pub fn detect(normalized: &str) -> Self {
        if normalized.contains('.') {
            Direction::MorseToText
        } else {
            Direction::TextToMorse
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::TextToMorse => write!(f, "text → morse"),
            Direction::MorseToText => write!(f, "morse → text"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub direction: Direction,
    pub output: String,
}

/// Trim, collapse whitespace runs to one space, uppercase.
pub fn normalize(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_uppercase()
}

/// Translate with the built-in table.
pub fn translate(raw: &str) -> Result<String, TranslateError> {
    Translator::standard().translate(raw).map(|t| t.output)
}

#[derive(Debug, Clone, Copy)]
pub struct Translator<'a> {
    table: &'a CodeTable,
}

impl Translator<'static> {
    pub fn standard() -> Self {
        Translator::new(CodeTable::standard())
    }
}

impl<'a> Translator<'a> {
    pub fn new(table: &'a CodeTable) -> Self {
        Translator { table }
    }

    pub fn translate(&self, raw: &str) -> Result<Translation, TranslateError> {
        let input = normalize(raw);
        if input.is_empty() {
            return Err(TranslateError::EmptyInput);
        }

        let direction = Direction::detect(&input);
        let output = match direction {
            Direction::TextToMorse => self.encode_text(&input),
            Direction::MorseToText => self.decode_morse(&input),
        };
        Ok(Translation { direction, output })
    }

    fn encode_text(&self, input: &str) -> String {
        input
            .split(LETTER_SEPARATOR)
            .map(|word| {
                word.chars()
                    .map(|c| match self.table.encode(c) {
                        Some(code) => code.to_string(),
                        None => c.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .collect::<Vec<_>>()
            .join("/")
    }

    fn decode_morse(&self, input: &str) -> String {
        input
            .split(WORD_SEPARATOR)
            .map(|word| {
                word.split(LETTER_SEPARATOR)
                    .map(|code| match self.table.decode(code) {
                        Some(c) => c.to_string(),
                        None => code.to_string(),
                    })
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}
