use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One unit of a playback run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlaybackEvent {
    Dot,
    Dash,
    LetterGap,
    WordGap,
    /// A symbol outside the Morse alphabet (or a whole line of plain
    /// text), handed to the speech device.
    Utterance(String),
}

impl PlaybackEvent {
    pub fn from_symbol(symbol: char) -> Self {
        match symbol {
            '.' => PlaybackEvent::Dot,
            '-' => PlaybackEvent::Dash,
            ' ' => PlaybackEvent::LetterGap,
            '/' => PlaybackEvent::WordGap,
            other => PlaybackEvent::Utterance(other.to_string()),
        }
    }

    pub fn is_tone(&self) -> bool {
        matches!(self, PlaybackEvent::Dot | PlaybackEvent::Dash)
    }
}

/// Fixed durations, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timing {
    pub dot_ms: u64,
    pub dash_ms: u64,
    pub letter_gap_ms: u64,
    pub word_gap_ms: u64,
    /// Awaited after every symbol, gaps included.
    pub symbol_gap_ms: u64,
}

impl Default for Timing {
    fn default() -> Self {
        Timing {
            dot_ms: 100,
            dash_ms: 300,
            letter_gap_ms: 600,
            word_gap_ms: 1800,
            symbol_gap_ms: 400,
        }
    }
}

impl Timing {
    /// Duration of an event; `None` for utterances, whose length is
    /// decided by the speech device.
    pub fn duration_of(&self, event: &PlaybackEvent) -> Option<Duration> {
        let ms = match event {
            PlaybackEvent::Dot => self.dot_ms,
            PlaybackEvent::Dash => self.dash_ms,
            PlaybackEvent::LetterGap => self.letter_gap_ms,
            PlaybackEvent::WordGap => self.word_gap_ms,
            PlaybackEvent::Utterance(_) => return None,
        };
        Some(Duration::from_millis(ms))
    }

    pub fn symbol_gap(&self) -> Duration {
        Duration::from_millis(self.symbol_gap_ms)
    }

    /// Every timing scaled down by `divisor`; handy for fast runs.
    pub fn scaled_down(&self, divisor: u64) -> Self {
        let d = divisor.max(1);
        Timing {
            dot_ms: self.dot_ms / d,
            dash_ms: self.dash_ms / d,
            letter_gap_ms: self.letter_gap_ms / d,
            word_gap_ms: self.word_gap_ms / d,
            symbol_gap_ms: self.symbol_gap_ms / d,
        }
    }
}

/// True if `text` should be played symbol by symbol: it contains a `.`, or it
/// is two or more Morse-alphabet symbols (`- -` for "TT"). A lone `-` or `/`
/// is decoded text and gets spoken.
pub fn is_morse(text: &str) -> bool {
    text.contains('.')
        || (text.trim().chars().count() >= 2
            && text.chars().all(|c| matches!(c, '.' | '-' | '/' | ' ')))
}

/// Ordered events for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackPlan {
    pub events: Vec<PlaybackEvent>,
    /// Whether the inter-symbol gap follows each event.
    pub symbol_gaps: bool,
}

impl PlaybackPlan {
    /// Morse is dispatched per character, left to right. Plain text becomes
    /// a single utterance with no gaps.
    pub fn for_text(text: &str) -> Self {
        if is_morse(text) {
            PlaybackPlan {
                events: text.chars().map(PlaybackEvent::from_symbol).collect(),
                symbol_gaps: true,
            }
        } else {
            PlaybackPlan {
                events: vec![PlaybackEvent::Utterance(text.to_string())],
                symbol_gaps: false,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Expected run time, not counting utterances. A tone overlaps the gap
    /// that follows it, so each tone step costs `max(tone, gap)`.
    pub fn estimated_duration(&self, timing: &Timing) -> Duration {
        let gap = if self.symbol_gaps {
            timing.symbol_gap()
        } else {
            Duration::ZERO
        };
        self.events
            .iter()
            .map(|event| match timing.duration_of(event) {
                Some(tone) if event.is_tone() => tone.max(gap),
                Some(pause) => pause + gap,
                None => gap,
            })
            .sum()
    }
}
