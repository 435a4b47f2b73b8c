//! PlaybackRuntime — dedicated playback thread with channel-based command dispatch.
//!
//! The thread owns the tone and speech devices (opened lazily, so they need
//! not be `Send`). External code talks to it through `PlaybackHandle`, which
//! wraps an `mpsc::Sender<PlaybackCmd>`. Every blocking wait inside a run is a
//! `recv_timeout` on the command channel, so cancel and shutdown are picked up
//! at each gap.

use crate::playback::{PlaybackEvent, PlaybackPlan, Timing};
use crate::speech::SpeechDevice;
use crate::tone::ToneDevice;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

// ── Commands & Events ────────────────────────────────────────────────────────

/// Commands sent to the playback thread.
pub enum PlaybackCmd {
    Play(String),
    Cancel,
    Shutdown,
}

/// Events emitted by the playback thread back to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RuntimeEvent {
    Started,
    /// About to process the event at `index` of the plan.
    Symbol {
        index: usize,
        event: PlaybackEvent,
    },
    /// A device call failed; the run carries on.
    DeviceError(String),
    Finished,
    Cancelled,
    /// Devices could not be opened; nothing was played.
    Failed(String),
}

impl RuntimeEvent {
    /// True for the events that end a run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RuntimeEvent::Finished | RuntimeEvent::Cancelled | RuntimeEvent::Failed(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Running,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlaybackError {
    #[error("playback already in progress")]
    Busy,

    #[error("nothing to play")]
    NothingToPlay,

    #[error("playback runtime has stopped")]
    RuntimeStopped,
}

// ── Handle ───────────────────────────────────────────────────────────────────

/// Thread-safe handle for sending commands to the playback runtime.
#[derive(Clone)]
pub struct PlaybackHandle {
    tx: mpsc::Sender<PlaybackCmd>,
    running: Arc<AtomicBool>,
}

impl PlaybackHandle {
    /// Start a run. At most one run is active; a second call while running is
    /// rejected with `Busy`.
    pub fn play(&self, text: &str) -> Result<(), PlaybackError> {
        if text.trim().is_empty() {
            return Err(PlaybackError::NothingToPlay);
        }
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(PlaybackError::Busy);
        }
        if self.tx.send(PlaybackCmd::Play(text.to_string())).is_err() {
            self.running.store(false, Ordering::Release);
            return Err(PlaybackError::RuntimeStopped);
        }
        Ok(())
    }

    /// Stop the active tone and drop the rest of the current run.
    pub fn cancel(&self) {
        let _ = self.tx.send(PlaybackCmd::Cancel);
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(PlaybackCmd::Shutdown);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    pub fn state(&self) -> PlaybackState {
        if self.is_running() {
            PlaybackState::Running
        } else {
            PlaybackState::Idle
        }
    }
}

// ── Runtime ──────────────────────────────────────────────────────────────────

/// Spawn the playback runtime on a dedicated thread.
///
/// `open_devices` runs on that thread before the first run (and again after a
/// failed attempt). `on_event` is called from the thread for every state
/// change; a terminal event is only emitted once the handle reports `Idle`.
pub fn spawn_playback_runtime<T, S, O, F>(
    timing: Timing,
    open_devices: O,
    on_event: F,
) -> std::io::Result<PlaybackHandle>
where
    T: ToneDevice + 'static,
    S: SpeechDevice + 'static,
    O: FnMut() -> Result<(T, S), String> + Send + 'static,
    F: Fn(RuntimeEvent) + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<PlaybackCmd>();
    let running = Arc::new(AtomicBool::new(false));
    let thread_running = running.clone();

    std::thread::Builder::new()
        .name("playback-runtime".into())
        .spawn(move || {
            playback_thread_loop(rx, timing, open_devices, thread_running, on_event);
        })?;

    Ok(PlaybackHandle { tx, running })
}

/// Why a wait ended early.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Interrupt {
    Cancel,
    Shutdown,
}

/// Main loop for the playback thread. Owns the devices.
fn playback_thread_loop<T, S, O, F>(
    rx: mpsc::Receiver<PlaybackCmd>,
    timing: Timing,
    mut open_devices: O,
    running: Arc<AtomicBool>,
    on_event: F,
) where
    T: ToneDevice,
    S: SpeechDevice,
    O: FnMut() -> Result<(T, S), String>,
    F: Fn(RuntimeEvent),
{
    let mut devices: Option<(T, S)> = None;

    while let Ok(cmd) = rx.recv() {
        match cmd {
            PlaybackCmd::Play(text) => {
                if devices.is_none() {
                    match open_devices() {
                        Ok(d) => devices = Some(d),
                        Err(e) => {
                            warn!(error = %e, "could not open playback devices");
                            running.store(false, Ordering::Release);
                            on_event(RuntimeEvent::Failed(e));
                            continue;
                        }
                    }
                }
                let Some((tone, speech)) = devices.as_mut() else {
                    continue;
                };

                let plan = PlaybackPlan::for_text(&text);
                debug!(symbols = plan.len(), "playback started");
                on_event(RuntimeEvent::Started);
                let outcome = run_plan(&plan, &timing, tone, speech, &rx, &on_event);
                tone.stop();
                running.store(false, Ordering::Release);

                match outcome {
                    Ok(()) => {
                        debug!("playback finished");
                        on_event(RuntimeEvent::Finished);
                    }
                    Err(Interrupt::Cancel) => {
                        debug!("playback cancelled");
                        on_event(RuntimeEvent::Cancelled);
                    }
                    Err(Interrupt::Shutdown) => {
                        on_event(RuntimeEvent::Cancelled);
                        break;
                    }
                }
            }

            // Nothing is playing; nothing to cancel.
            PlaybackCmd::Cancel => {}

            PlaybackCmd::Shutdown => break,
        }
    }

    if let Some((tone, _)) = devices.as_mut() {
        tone.stop();
    }
}

/// Process every event of `plan` in order.
fn run_plan<T, S, F>(
    plan: &PlaybackPlan,
    timing: &Timing,
    tone: &mut T,
    speech: &mut S,
    rx: &mpsc::Receiver<PlaybackCmd>,
    on_event: &F,
) -> Result<(), Interrupt>
where
    T: ToneDevice,
    S: SpeechDevice,
    F: Fn(RuntimeEvent),
{
    for (index, event) in plan.events.iter().enumerate() {
        on_event(RuntimeEvent::Symbol {
            index,
            event: event.clone(),
        });
        let step_start = Instant::now();
        let mut tone_deadline = None;

        match event {
            PlaybackEvent::Dot | PlaybackEvent::Dash => {
                let length = timing.duration_of(event).unwrap_or(Duration::ZERO);
                // Only one tone at a time
                if tone.is_active() {
                    warn!("tone still active at next symbol; stopping it");
                    tone.stop();
                }
                match tone.start() {
                    Ok(()) => tone_deadline = Some(step_start + length),
                    Err(e) => on_event(RuntimeEvent::DeviceError(e)),
                }
            }
            PlaybackEvent::LetterGap | PlaybackEvent::WordGap => {
                let length = timing.duration_of(event).unwrap_or(Duration::ZERO);
                pause_until(rx, step_start + length)?;
            }
            PlaybackEvent::Utterance(text) => {
                if let Err(e) = speech.speak(text) {
                    on_event(RuntimeEvent::DeviceError(e));
                }
                // Commands that arrived while speaking
                check_pending(rx)?;
            }
        }

        // The tone runs alongside the symbol gap and is stopped at its own
        // deadline; the next symbol waits for whichever ends last.
        let gap_end = if plan.symbol_gaps {
            Instant::now() + timing.symbol_gap()
        } else {
            Instant::now()
        };
        if let Some(deadline) = tone_deadline {
            let waited = pause_until(rx, deadline);
            tone.stop();
            waited?;
        }
        pause_until(rx, gap_end)?;
    }
    Ok(())
}

/// Block until `deadline`, returning early on cancel or shutdown.
fn pause_until(rx: &mpsc::Receiver<PlaybackCmd>, deadline: Instant) -> Result<(), Interrupt> {
    loop {
        let now = Instant::now();
        if now >= deadline {
            return check_pending(rx);
        }
        match rx.recv_timeout(deadline - now) {
            Ok(cmd) => handle_during_run(cmd)?,
            Err(mpsc::RecvTimeoutError::Timeout) => return Ok(()),
            // All senders dropped — shut down
            Err(mpsc::RecvTimeoutError::Disconnected) => return Err(Interrupt::Shutdown),
        }
    }
}

/// Drain already-queued commands without blocking.
fn check_pending(rx: &mpsc::Receiver<PlaybackCmd>) -> Result<(), Interrupt> {
    loop {
        match rx.try_recv() {
            Ok(cmd) => handle_during_run(cmd)?,
            Err(mpsc::TryRecvError::Empty) => return Ok(()),
            Err(mpsc::TryRecvError::Disconnected) => return Err(Interrupt::Shutdown),
        }
    }
}

fn handle_during_run(cmd: PlaybackCmd) -> Result<(), Interrupt> {
    match cmd {
        PlaybackCmd::Cancel => Err(Interrupt::Cancel),
        PlaybackCmd::Shutdown => Err(Interrupt::Shutdown),
        PlaybackCmd::Play(_) => {
            // The handle's guard keeps this from happening
            warn!("play requested while a run is active; ignored");
            Ok(())
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum ToneCall {
        Start,
        Stop,
    }

    #[derive(Clone, Default)]
    struct Log {
        tone: Arc<Mutex<Vec<(ToneCall, Instant)>>>,
        spoken: Arc<Mutex<Vec<String>>>,
    }

    struct FakeTone {
        log: Log,
        active: bool,
    }

    impl ToneDevice for FakeTone {
        fn start(&mut self) -> Result<(), String> {
            assert!(!self.active, "two tones active at once");
            self.active = true;
            self.log.tone.lock().unwrap().push((ToneCall::Start, Instant::now()));
            Ok(())
        }

        fn stop(&mut self) {
            if self.active {
                self.active = false;
                self.log.tone.lock().unwrap().push((ToneCall::Stop, Instant::now()));
            }
        }

        fn is_active(&self) -> bool {
            self.active
        }
    }

    struct FakeSpeech {
        log: Log,
    }

    impl SpeechDevice for FakeSpeech {
        fn speak(&mut self, text: &str) -> Result<(), String> {
            self.log.spoken.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn spawn_fake(timing: Timing) -> (PlaybackHandle, Log, mpsc::Receiver<(RuntimeEvent, Instant)>) {
        spawn_fake_with(timing, false)
    }

    /// `tone_active` opens the tone device already sounding.
    fn spawn_fake_with(
        timing: Timing,
        tone_active: bool,
    ) -> (PlaybackHandle, Log, mpsc::Receiver<(RuntimeEvent, Instant)>) {
        let log = Log::default();
        let device_log = log.clone();
        let (ev_tx, ev_rx) = mpsc::channel();
        let handle = spawn_playback_runtime(
            timing,
            move || {
                Ok((
                    FakeTone {
                        log: device_log.clone(),
                        active: tone_active,
                    },
                    FakeSpeech {
                        log: device_log.clone(),
                    },
                ))
            },
            move |evt| {
                let _ = ev_tx.send((evt, Instant::now()));
            },
        )
        .unwrap();
        (handle, log, ev_rx)
    }

    fn collect_until_terminal(
        rx: &mpsc::Receiver<(RuntimeEvent, Instant)>,
    ) -> Vec<(RuntimeEvent, Instant)> {
        let mut out = Vec::new();
        loop {
            let item = rx
                .recv_timeout(Duration::from_secs(10))
                .expect("runtime did not finish in time");
            let done = item.0.is_terminal();
            out.push(item);
            if done {
                return out;
            }
        }
    }

    #[test]
    fn handle_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<PlaybackHandle>();
    }

    #[test]
    fn dot_dash_takes_two_symbol_gaps() {
        let (handle, log, rx) = spawn_fake(Timing::default());
        handle.play(".-").unwrap();
        let events = collect_until_terminal(&rx);

        let started = events.first().unwrap().1;
        let (last, finished) = events.last().unwrap();
        assert_eq!(*last, RuntimeEvent::Finished);
        let elapsed = finished.duration_since(started);
        assert!(elapsed >= Duration::from_millis(790), "elapsed {:?}", elapsed);
        assert!(elapsed < Duration::from_millis(1200), "elapsed {:?}", elapsed);

        let tone = log.tone.lock().unwrap();
        let calls: Vec<ToneCall> = tone.iter().map(|(c, _)| *c).collect();
        assert_eq!(
            calls,
            vec![ToneCall::Start, ToneCall::Stop, ToneCall::Start, ToneCall::Stop]
        );
        let dot = tone[1].1.duration_since(tone[0].1);
        let dash = tone[3].1.duration_since(tone[2].1);
        assert!(dot >= Duration::from_millis(100) && dot < Duration::from_millis(250));
        assert!(dash >= Duration::from_millis(300) && dash < Duration::from_millis(450));
        // next tone starts only after the 400 ms gap
        assert!(tone[2].1.duration_since(tone[0].1) >= Duration::from_millis(400));

        handle.shutdown();
    }

    #[test]
    fn events_follow_symbol_order() {
        let (handle, log, rx) = spawn_fake(Timing::default().scaled_down(20));
        handle.play("- #/.").unwrap();
        let events: Vec<RuntimeEvent> =
            collect_until_terminal(&rx).into_iter().map(|(e, _)| e).collect();

        assert_eq!(
            events,
            vec![
                RuntimeEvent::Started,
                RuntimeEvent::Symbol { index: 0, event: PlaybackEvent::Dash },
                RuntimeEvent::Symbol { index: 1, event: PlaybackEvent::LetterGap },
                RuntimeEvent::Symbol {
                    index: 2,
                    event: PlaybackEvent::Utterance("#".to_string())
                },
                RuntimeEvent::Symbol { index: 3, event: PlaybackEvent::WordGap },
                RuntimeEvent::Symbol { index: 4, event: PlaybackEvent::Dot },
                RuntimeEvent::Finished,
            ]
        );
        assert_eq!(*log.spoken.lock().unwrap(), vec!["#".to_string()]);
        handle.shutdown();
    }

    #[test]
    fn plain_text_is_spoken_whole() {
        let (handle, log, rx) = spawn_fake(Timing::default());
        handle.play("HELLO WORLD").unwrap();
        let events = collect_until_terminal(&rx);
        assert_eq!(events.last().unwrap().0, RuntimeEvent::Finished);
        assert_eq!(*log.spoken.lock().unwrap(), vec!["HELLO WORLD".to_string()]);
        assert!(log.tone.lock().unwrap().is_empty());
        handle.shutdown();
    }

    #[test]
    fn second_play_is_rejected_while_running() {
        let (handle, _log, rx) = spawn_fake(Timing::default());
        handle.play("...").unwrap();
        assert_eq!(handle.state(), PlaybackState::Running);
        assert_eq!(handle.play("---"), Err(PlaybackError::Busy));

        handle.cancel();
        collect_until_terminal(&rx);
        assert_eq!(handle.state(), PlaybackState::Idle);
        handle.shutdown();
    }

    #[test]
    fn blank_text_is_rejected() {
        let (handle, _log, _rx) = spawn_fake(Timing::default());
        assert_eq!(handle.play("  "), Err(PlaybackError::NothingToPlay));
        assert!(!handle.is_running());
        handle.shutdown();
    }

    #[test]
    fn cancel_stops_tone_and_abandons_rest() {
        let (handle, log, rx) = spawn_fake(Timing::default());
        handle.play("--- --- ---").unwrap();
        std::thread::sleep(Duration::from_millis(150));
        handle.cancel();

        let events = collect_until_terminal(&rx);
        assert_eq!(events.last().unwrap().0, RuntimeEvent::Cancelled);
        let symbols = events
            .iter()
            .filter(|(e, _)| matches!(e, RuntimeEvent::Symbol { .. }))
            .count();
        assert!(symbols < 11, "run was not abandoned ({} symbols)", symbols);

        let tone = log.tone.lock().unwrap();
        assert_eq!(tone.last().map(|(c, _)| *c), Some(ToneCall::Stop));
        assert!(!handle.is_running());
        handle.shutdown();
    }

    #[test]
    fn shutdown_during_run_stops_tone_and_exits() {
        let (handle, log, rx) = spawn_fake(Timing::default());
        handle.play("--- --- ---").unwrap();
        std::thread::sleep(Duration::from_millis(150));
        handle.shutdown();

        let events = collect_until_terminal(&rx);
        assert_eq!(events.last().unwrap().0, RuntimeEvent::Cancelled);
        let tone = log.tone.lock().unwrap();
        assert_eq!(tone.last().map(|(c, _)| *c), Some(ToneCall::Stop));
        assert!(!handle.is_running());

        // The thread owned the event sender; it is gone once the thread exits
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).map(|(e, _)| e),
            Err(mpsc::RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn dropping_every_handle_abandons_run() {
        let (handle, log, rx) = spawn_fake(Timing::default());
        let second = handle.clone();
        handle.play("--- --- ---").unwrap();
        std::thread::sleep(Duration::from_millis(150));
        drop(handle);
        drop(second);

        let events = collect_until_terminal(&rx);
        assert_eq!(events.last().unwrap().0, RuntimeEvent::Cancelled);
        let symbols = events
            .iter()
            .filter(|(e, _)| matches!(e, RuntimeEvent::Symbol { .. }))
            .count();
        assert!(symbols < 11, "run was not abandoned ({} symbols)", symbols);
        let tone = log.tone.lock().unwrap();
        assert_eq!(tone.last().map(|(c, _)| *c), Some(ToneCall::Stop));
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(2)).map(|(e, _)| e),
            Err(mpsc::RecvTimeoutError::Disconnected)
        );
    }

    #[test]
    fn lingering_tone_is_stopped_before_next_start() {
        let (handle, log, rx) = spawn_fake_with(Timing::default().scaled_down(20), true);
        handle.play(".").unwrap();
        let events = collect_until_terminal(&rx);
        assert_eq!(events.last().unwrap().0, RuntimeEvent::Finished);

        let calls: Vec<ToneCall> = log.tone.lock().unwrap().iter().map(|(c, _)| *c).collect();
        assert_eq!(calls, vec![ToneCall::Stop, ToneCall::Start, ToneCall::Stop]);
        handle.shutdown();
    }

    #[test]
    fn runtime_can_play_again_after_finish() {
        let (handle, _log, rx) = spawn_fake(Timing::default().scaled_down(20));
        handle.play(".").unwrap();
        collect_until_terminal(&rx);
        handle.play("-").unwrap();
        let events = collect_until_terminal(&rx);
        assert_eq!(events.last().unwrap().0, RuntimeEvent::Finished);
        handle.shutdown();
    }

    #[test]
    fn device_open_failure_is_reported() {
        let (ev_tx, ev_rx) = mpsc::channel();
        let handle = spawn_playback_runtime(
            Timing::default(),
            || -> Result<(FakeTone, FakeSpeech), String> { Err("no audio device".to_string()) },
            move |evt| {
                let _ = ev_tx.send((evt, Instant::now()));
            },
        )
        .unwrap();

        handle.play(".").unwrap();
        let events = collect_until_terminal(&ev_rx);
        assert_eq!(
            events.last().unwrap().0,
            RuntimeEvent::Failed("no audio device".to_string())
        );
        assert!(!handle.is_running());
        handle.shutdown();
    }

    #[test]
    fn play_after_shutdown_reports_stopped_runtime() {
        let (handle, _log, _rx) = spawn_fake(Timing::default());
        handle.shutdown();
        std::thread::sleep(Duration::from_millis(100));
        assert_eq!(handle.play("."), Err(PlaybackError::RuntimeStopped));
        assert!(!handle.is_running());
    }

    #[test]
    fn terminal_events() {
        assert!(RuntimeEvent::Finished.is_terminal());
        assert!(RuntimeEvent::Cancelled.is_terminal());
        assert!(RuntimeEvent::Failed(String::new()).is_terminal());
        assert!(!RuntimeEvent::Started.is_terminal());
        assert!(!RuntimeEvent::DeviceError(String::new()).is_terminal());
    }
}
