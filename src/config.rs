//! Command-line configuration

use crate::audio::playback_engine::{EngineConfig, DEFAULT_NOTE_OFF_LEAD};
use clap::Parser;
use log::LevelFilter;
use loopseq_core::types::pattern::{DEFAULT_LENGTH, MAX_STEPS, MAX_TEMPO, MIN_TEMPO};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "loopseq")]
#[command(about = "Live-editable MIDI step sequencer", long_about = None)]
pub struct Cli {
    /// MIDI output port to connect to at startup (partial name match)
    #[arg(short, long)]
    pub port: Option<String>,

    /// MIDI channel, 1-16
    #[arg(short, long, default_value_t = 1, value_parser = clap::value_parser!(u8).range(1..=16))]
    pub channel: u8,

    /// Pattern file to load at startup
    #[arg(long)]
    pub pattern: Option<PathBuf>,

    /// Starting tempo in BPM (overrides the pattern file)
    #[arg(short, long, value_parser = clap::value_parser!(u16).range(MIN_TEMPO as i64..=MAX_TEMPO as i64))]
    pub tempo: Option<u16>,

    /// Starting length of an empty pattern in steps
    #[arg(short, long, default_value_t = DEFAULT_LENGTH, value_parser = parse_length)]
    pub length: usize,

    /// Log file
    #[arg(long, default_value = "loopseq.log")]
    pub log_file: PathBuf,

    /// Log level: off, error, warn, info, debug, trace
    #[arg(long, default_value = "info", value_parser = parse_level)]
    pub log_level: LevelFilter,

    /// Also log to stderr
    #[arg(short, long)]
    pub verbose: bool,

    /// Log MIDI messages instead of opening a MIDI port
    #[arg(long)]
    pub dry_run: bool,

    /// Seed for humanization, for repeatable takes
    #[arg(long)]
    pub seed: Option<u64>,

    /// How early a note is released before its last step ends, in ms
    #[arg(long, default_value_t = DEFAULT_NOTE_OFF_LEAD.as_millis() as u64)]
    pub note_off_lead_ms: u64,
}

fn parse_length(raw: &str) -> Result<usize, String> {
    let length: usize = raw.parse().map_err(|_| format!("'{}' is not a number", raw))?;
    if !(1..=MAX_STEPS).contains(&length) {
        return Err(format!("length must be 1-{}", MAX_STEPS));
    }
    Ok(length)
}

fn parse_level(raw: &str) -> Result<LevelFilter, String> {
    raw.parse()
        .map_err(|_| format!("'{}' is not one of off, error, warn, info, debug, trace", raw))
}

/// Resolved application settings
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub port: Option<String>,
    /// 0-indexed
    pub channel: u8,
    pub pattern_file: Option<PathBuf>,
    pub tempo: Option<u16>,
    pub length: usize,
    pub log_file: PathBuf,
    pub log_level: LevelFilter,
    pub log_to_stderr: bool,
    pub dry_run: bool,
    pub engine: EngineConfig,
}

impl From<Cli> for AppConfig {
    fn from(cli: Cli) -> Self {
        let mut engine =
            EngineConfig::new().with_note_off_lead(Duration::from_millis(cli.note_off_lead_ms));
        if let Some(seed) = cli.seed {
            engine = engine.with_seed(seed);
        }

        Self {
            port: cli.port,
            channel: cli.channel - 1,
            pattern_file: cli.pattern,
            tempo: cli.tempo,
            length: cli.length,
            log_file: cli.log_file,
            log_level: cli.log_level,
            log_to_stderr: cli.verbose,
            dry_run: cli.dry_run,
            engine,
        }
    }
}

impl AppConfig {
    pub fn from_args() -> Self {
        Cli::parse().into()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Cli::parse_from(["loopseq"]).into()
    }
}
