use anyhow::{Context, Result};
use log::{info, warn};
use loopseq::audio::{MidiOutputHandle, MidiSink, PlaybackEngine, RecordingSink};
use loopseq::commands::CommandContext;
use loopseq::config::AppConfig;
use loopseq::repl::Repl;
use loopseq_core::{persistence, Pattern};
use simplelog::{
    ColorChoice, CombinedLogger, Config, SharedLogger, TermLogger, TerminalMode, WriteLogger,
};
use std::fs::File;
use std::sync::Arc;

fn init_logging(config: &AppConfig) -> Result<()> {
    let file = File::create(&config.log_file)
        .with_context(|| format!("failed to create log file {}", config.log_file.display()))?;

    let mut loggers: Vec<Box<dyn SharedLogger>> =
        vec![WriteLogger::new(config.log_level, Config::default(), file)];
    if config.log_to_stderr {
        loggers.push(TermLogger::new(
            config.log_level,
            Config::default(),
            TerminalMode::Stderr,
            ColorChoice::Auto,
        ));
    }
    CombinedLogger::init(loggers).context("failed to initialize logging")
}

/// The pattern to start with: the `--pattern` file if given, else empty
fn initial_pattern(config: &AppConfig) -> Result<Pattern> {
    let pattern = match &config.pattern_file {
        Some(path) => persistence::load(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => Pattern::new(config.length),
    };
    if let Some(bpm) = config.tempo {
        pattern.set_tempo(bpm)?;
    }
    Ok(pattern)
}

fn main() -> Result<()> {
    let config = AppConfig::from_args();
    init_logging(&config)?;
    info!("Starting loopseq with {:?}", config);

    let pattern = Arc::new(initial_pattern(&config)?);

    let (sink, midi_handle): (Arc<dyn MidiSink>, Option<Arc<MidiOutputHandle>>) =
        if config.dry_run {
            (Arc::new(RecordingSink::logging()), None)
        } else {
            let handle = Arc::new(MidiOutputHandle::new()?);
            handle.set_channel(config.channel);
            if let Some(port) = &config.port {
                if let Err(e) = handle.connect(port) {
                    warn!("Could not connect to MIDI port '{}': {:#}", port, e);
                    eprintln!("Could not connect to MIDI port '{}': {:#}", port, e);
                }
            }
            (handle.clone(), Some(handle))
        };

    let engine = Arc::new(PlaybackEngine::with_config(
        pattern,
        sink,
        config.engine.clone(),
    ));
    let ctx = match midi_handle {
        Some(handle) => CommandContext::new_with_midi(engine, handle),
        None => CommandContext::new(engine),
    };

    let mut repl = Repl::new(ctx)?;
    repl.run()
}
