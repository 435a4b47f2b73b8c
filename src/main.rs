use clap::{Parser, Subcommand};
use morse_flow::code_table::CodeTable;
use morse_flow::config::Config;
use morse_flow::playback::PlaybackEvent;
use morse_flow::playback_runtime::{spawn_playback_runtime, PlaybackHandle, RuntimeEvent};
use morse_flow::session::{Control, ControlSink, DisplaySink, DisplayStatus, Session};
use morse_flow::speech;
use morse_flow::tone::RodioTone;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::mpsc;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "morseflow", about = "Morse code translator with audible playback")]
struct Cli {
    /// Config file (defaults to the platform config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Log debug output to stderr
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate text to Morse, or Morse (anything containing '.') to text
    Translate {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Translate and play the result
    Play {
        #[arg(required = true)]
        text: Vec<String>,
        /// Play the input as given, without translating it first
        #[arg(long)]
        raw: bool,
    },
    /// Print the code table
    Table,
    /// Read lines from stdin: each line is translated, ':play' plays the
    /// last result, ':quit' exits
    Interactive,
    /// Configuration
    Config {
        #[command(subcommand)]
        action: ConfigCmd,
    },
}

#[derive(Subcommand)]
enum ConfigCmd {
    /// Show the effective configuration
    Show,
    /// Print the default config file path
    Path,
}

/// Prints results to stdout, errors to stderr.
struct Terminal;

impl DisplaySink for Terminal {
    fn show(&mut self, text: &str, status: DisplayStatus) {
        match status {
            DisplayStatus::Normal => println!("{}", text),
            DisplayStatus::Error => eprintln!("Error: {}", text),
        }
    }
}

/// A terminal has no widgets to grey out; just trace the transitions.
struct TraceControls;

impl ControlSink for TraceControls {
    fn set_enabled(&mut self, control: Control, enabled: bool) {
        debug!(?control, enabled, "control");
    }
}

type CliSession = Session<'static, Terminal, TraceControls>;

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> Config {
    match path {
        Some(p) => match Config::load_from(p) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        },
        None => Config::load(),
    }
}

/// Spawn the playback thread; events come back on the returned receiver.
fn start_playback(config: &Config) -> (PlaybackHandle, mpsc::Receiver<RuntimeEvent>) {
    let (ev_tx, ev_rx) = mpsc::channel();
    let tone_cfg = config.tone;
    let speech_cfg = config.speech.clone();
    let handle = spawn_playback_runtime(
        config.timing,
        move || {
            let tone = RodioTone::new(tone_cfg)?;
            Ok((tone, speech::from_config(&speech_cfg)))
        },
        move |evt| {
            let _ = ev_tx.send(evt);
        },
    );
    match handle {
        Ok(h) => (h, ev_rx),
        Err(e) => {
            eprintln!("Error: failed to start playback thread: {}", e);
            std::process::exit(1);
        }
    }
}

/// Play the session's output (or `raw` as given) and block until the run
/// ends, echoing each symbol as it sounds. Returns false if the run did not
/// complete.
fn play_and_wait(
    session: &mut CliSession,
    playback: &PlaybackHandle,
    events: &mpsc::Receiver<RuntimeEvent>,
    raw: Option<&str>,
) -> bool {
    let started = match raw {
        Some(text) => session.play_text(playback, text),
        None => session.play(playback),
    };
    if let Err(e) = started {
        eprintln!("Error: {}", e);
        return false;
    }
    let mut out = io::stdout();
    while let Ok(evt) = events.recv() {
        if let RuntimeEvent::Symbol { event, .. } = &evt {
            let shown = match event {
                PlaybackEvent::Dot => ".".to_string(),
                PlaybackEvent::Dash => "-".to_string(),
                PlaybackEvent::LetterGap => " ".to_string(),
                PlaybackEvent::WordGap => "/".to_string(),
                PlaybackEvent::Utterance(text) => text.clone(),
            };
            let _ = write!(out, "{}", shown);
            let _ = out.flush();
        }
        if evt.is_terminal() {
            println!();
        }
        session.on_playback_event(&evt);
        if evt.is_terminal() {
            return evt == RuntimeEvent::Finished;
        }
    }
    false
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {
        Commands::Translate { text } => {
            let mut session = Session::new(Terminal, TraceControls);
            if session.translate(&text.join(" ")).is_err() {
                std::process::exit(1);
            }
        }
        Commands::Play { text, raw } => {
            let config = load_config(cli.config.as_ref());
            let mut session = Session::new(Terminal, TraceControls);
            let input = text.join(" ");
            let (playback, events) = start_playback(&config);

            let ok = if raw {
                play_and_wait(&mut session, &playback, &events, Some(&input))
            } else {
                session.translate(&input).is_ok()
                    && play_and_wait(&mut session, &playback, &events, None)
            };
            playback.shutdown();
            if !ok {
                std::process::exit(1);
            }
        }
        Commands::Table => {
            for (symbol, code) in CodeTable::standard().iter() {
                let label = if symbol == ' ' {
                    "space".to_string()
                } else {
                    symbol.to_string()
                };
                println!("{:<6} {}", label, code);
            }
        }
        Commands::Interactive => {
            let config = load_config(cli.config.as_ref());
            let mut session = Session::new(Terminal, TraceControls);
            let (playback, events) = start_playback(&config);

            println!("Enter text or Morse. ':play' plays the last result, ':quit' exits.");
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        break;
                    }
                };
                match line.trim() {
                    ":quit" | ":q" => break,
                    ":play" | ":p" => {
                        play_and_wait(&mut session, &playback, &events, None);
                    }
                    _ => {
                        let _ = session.translate(&line);
                    }
                }
            }
            playback.shutdown();
        }
        Commands::Config { action } => match action {
            ConfigCmd::Show => {
                let config = load_config(cli.config.as_ref());
                match config.to_json() {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigCmd::Path => match Config::default_path() {
                Some(p) => println!("{}", p.display()),
                None => {
                    eprintln!("Error: no config directory on this platform");
                    std::process::exit(1);
                }
            },
        },
    }
}
