//! morseFlow — Core library for the Morse translator.
//!
//! Translation, the playback scheduler and its audio devices live here.
//! The CLI consumes this crate through `session::Session`.

pub mod code_table;
pub mod config;
pub mod playback;
pub mod playback_runtime;
pub mod session;
pub mod speech;
pub mod tone;
pub mod translator;

pub use code_table::CodeTable;
pub use translator::{translate, TranslateError};
