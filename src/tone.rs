use rodio::source::SineWave;
use rodio::{OutputStream, OutputStreamHandle, Sink, Source};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// A continuous tone that can be switched on and off.
pub trait ToneDevice {
    fn start(&mut self) -> Result<(), String>;
    fn stop(&mut self);
    fn is_active(&self) -> bool;
}

/// Tone synthesis settings.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToneConfig {
    pub frequency_hz: f32,
    /// Linear gain, 0.0–1.0.
    pub volume: f32,
}

impl Default for ToneConfig {
    fn default() -> Self {
        ToneConfig {
            frequency_hz: 440.0,
            volume: 1.0,
        }
    }
}

/// Sine tone on the default audio output. Not `Send` — create it on the
/// thread that plays it.
pub struct RodioTone {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
    active: Option<Sink>,
    config: ToneConfig,
}

impl RodioTone {
    /// Open the default audio output.
    pub fn new(config: ToneConfig) -> Result<Self, String> {
        let (stream, handle) = OutputStream::try_default()
            .map_err(|e| format!("Failed to open audio output: {}", e))?;
        debug!(frequency = config.frequency_hz, volume = config.volume, "audio output opened");
        Ok(RodioTone {
            _stream: stream,
            stream_handle: handle,
            active: None,
            config,
        })
    }
}

impl ToneDevice for RodioTone {
    /// Each tone gets a fresh sink, dropped again on `stop`.
    fn start(&mut self) -> Result<(), String> {
        self.stop();
        let sink = Sink::try_new(&self.stream_handle)
            .map_err(|e| format!("Failed to create audio sink: {}", e))?;
        sink.append(SineWave::new(self.config.frequency_hz).amplify(self.config.volume));
        sink.play();
        self.active = Some(sink);
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(sink) = self.active.take() {
            sink.stop();
        }
    }

    fn is_active(&self) -> bool {
        self.active.is_some()
    }
}

impl Drop for RodioTone {
    fn drop(&mut self) {
        self.stop();
    }
}
