use serde::{Deserialize, Serialize};
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// Speaks text, returning once the utterance has finished.
pub trait SpeechDevice {
    fn speak(&mut self, text: &str) -> Result<(), String>;
}

impl<D: SpeechDevice + ?Sized> SpeechDevice for Box<D> {
    fn speak(&mut self, text: &str) -> Result<(), String> {
        (**self).speak(text)
    }
}

/// External speech program, e.g. `espeak` or `say`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpeechConfig {
    /// `None` disables speech; utterances are only logged.
    pub program: Option<String>,
    /// Arguments placed before the text.
    pub args: Vec<String>,
}

/// Runs the configured program once per utterance and waits for it.
pub struct SystemSpeech {
    program: String,
    args: Vec<String>,
}

impl SystemSpeech {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        SystemSpeech {
            program: program.into(),
            args,
        }
    }
}

impl SpeechDevice for SystemSpeech {
    fn speak(&mut self, text: &str) -> Result<(), String> {
        debug!(program = %self.program, text, "speaking");
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(text)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .status()
            .map_err(|e| format!("Cannot run '{}': {}", self.program, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("'{}' exited with {}", self.program, status))
        }
    }
}

/// Logs the text and returns immediately.
#[derive(Debug, Default)]
pub struct SilentSpeech;

impl SpeechDevice for SilentSpeech {
    fn speak(&mut self, text: &str) -> Result<(), String> {
        info!(text, "utterance (speech disabled)");
        Ok(())
    }
}

/// Pick a device for `config`.
pub fn from_config(config: &SpeechConfig) -> Box<dyn SpeechDevice> {
    match &config.program {
        Some(program) if !program.trim().is_empty() => {
            Box::new(SystemSpeech::new(program.clone(), config.args.clone()))
        }
        _ => Box::new(SilentSpeech),
    }
}
