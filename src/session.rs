//! Session — the contract between a front end and the translation/playback core.
//!
//! A front end supplies input, renders results and greys out its controls.
//! `Session` drives those collaborators: it translates, keeps the last output
//! (what the page showed in its result field) and wraps each playback run in
//! disable/enable hooks.

use crate::playback_runtime::{PlaybackError, PlaybackHandle, RuntimeEvent};
use crate::translator::{TranslateError, Translation, Translator};
use tracing::debug;

/// Provides raw text on demand.
pub trait InputSource {
    fn read_input(&mut self) -> String;
}

impl InputSource for String {
    fn read_input(&mut self) -> String {
        self.clone()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayStatus {
    Normal,
    Error,
}

/// Renders a result string.
pub trait DisplaySink {
    fn show(&mut self, text: &str, status: DisplayStatus);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Control {
    Input,
    Translate,
    Play,
}

impl Control {
    pub const ALL: [Control; 3] = [Control::Input, Control::Translate, Control::Play];
}

/// Receives enable/disable signals for front-end controls.
pub trait ControlSink {
    fn set_enabled(&mut self, control: Control, enabled: bool);
}

pub struct Session<'t, D, C> {
    translator: Translator<'t>,
    display: D,
    controls: C,
    output: Option<String>,
}

impl<D, C> Session<'static, D, C>
where
    D: DisplaySink,
    C: ControlSink,
{
    /// Session over the built-in table.
    pub fn new(display: D, controls: C) -> Self {
        Session::with_translator(Translator::standard(), display, controls)
    }
}

impl<'t, D, C> Session<'t, D, C>
where
    D: DisplaySink,
    C: ControlSink,
{
    pub fn with_translator(translator: Translator<'t>, display: D, controls: C) -> Self {
        Session {
            translator,
            display,
            controls,
            output: None,
        }
    }

    /// Translate `raw` and show the result. Empty input shows the advisory
    /// message in error status and disables Play.
    pub fn translate(&mut self, raw: &str) -> Result<Translation, TranslateError> {
        match self.translator.translate(raw) {
            Ok(translation) => {
                debug!(direction = %translation.direction, "translated");
                self.display.show(&translation.output, DisplayStatus::Normal);
                self.output = Some(translation.output.clone());
                self.controls.set_enabled(Control::Play, true);
                Ok(translation)
            }
            Err(e) => {
                self.controls.set_enabled(Control::Play, false);
                self.display.show(&e.to_string(), DisplayStatus::Error);
                self.output = None;
                Err(e)
            }
        }
    }

    pub fn translate_input<I: InputSource + ?Sized>(
        &mut self,
        input: &mut I,
    ) -> Result<Translation, TranslateError> {
        let raw = input.read_input();
        self.translate(&raw)
    }

    /// Last successful translation.
    pub fn output(&self) -> Option<&str> {
        self.output.as_deref()
    }

    /// Play the last output. Controls stay disabled until a terminal event
    /// reaches `on_playback_event`.
    pub fn play(&mut self, playback: &PlaybackHandle) -> Result<(), PlaybackError> {
        let text = self.output.clone().ok_or(PlaybackError::NothingToPlay)?;
        self.play_text(playback, &text)
    }

    /// Play `text` as given, with the same hooks as `play`. While a run is
    /// active the controls are left as they are.
    pub fn play_text(&mut self, playback: &PlaybackHandle, text: &str) -> Result<(), PlaybackError> {
        if playback.is_running() {
            return Err(PlaybackError::Busy);
        }
        self.set_all(false);
        match playback.play(text) {
            Ok(()) => Ok(()),
            // Another caller won the race; its run owns the controls now.
            Err(PlaybackError::Busy) => Err(PlaybackError::Busy),
            Err(e) => {
                self.set_all(true);
                Err(e)
            }
        }
    }

    /// Forward runtime events here; a terminal one re-enables the controls.
    pub fn on_playback_event(&mut self, event: &RuntimeEvent) {
        if event.is_terminal() {
            self.set_all(true);
        }
        if let RuntimeEvent::Failed(reason) | RuntimeEvent::DeviceError(reason) = event {
            self.display.show(reason, DisplayStatus::Error);
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn controls(&self) -> &C {
        &self.controls
    }

    fn set_all(&mut self, enabled: bool) {
        for control in Control::ALL {
            self.controls.set_enabled(control, enabled);
        }
    }
}
