//! Loop-quantized pattern playback engine
//!
//! The engine owns a handle to the shared "pending" [`Pattern`] that editors
//! mutate, and a dedicated thread that walks a private snapshot of it. The
//! snapshot is retaken only at loop boundaries, so an edit becomes audible
//! at the start of the next traversal (hard cut, no crossfade).

use crate::audio::midi::{MidiSink, SinkError};
use anyhow::{Context, Result};
use log::{debug, error, info, warn};
use loopseq_core::types::humanize::{humanize_gate, humanize_velocity, timing_jitter_ms};
use loopseq_core::types::time::{signed_millis, sounding_steps, step_period, swing_offset_ms};
use loopseq_core::{FastRandSource, Pattern, PatternSnapshot, RandomSource};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Default gap between a Note Off and the next step's onset
pub const DEFAULT_NOTE_OFF_LEAD: Duration = Duration::from_millis(10);

type BoxedRandom = Box<dyn RandomSource + Send>;

/// Configuration for the playback engine
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    /// How much earlier than the end of its last step a note is released
    pub note_off_lead: Duration,
    /// Seed for humanization; `None` draws a fresh seed
    pub seed: Option<u64>,
}

impl EngineConfig {
    pub fn new() -> Self {
        Self {
            note_off_lead: DEFAULT_NOTE_OFF_LEAD,
            seed: None,
        }
    }

    pub fn with_note_off_lead(mut self, lead: Duration) -> Self {
        self.note_off_lead = lead;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    fn random_source(&self) -> BoxedRandom {
        match self.seed {
            Some(seed) => Box::new(FastRandSource::with_seed(seed)),
            None => Box::new(FastRandSource::new()),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EngineState {
    Stopped,
    Running,
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineState::Stopped => write!(f, "stopped"),
            EngineState::Running => write!(f, "running"),
        }
    }
}

struct RunningLoop {
    stop_tx: Sender<()>,
    handle: JoinHandle<BoxedRandom>,
}

/// Plays the pending pattern on a MIDI sink in a continuous loop
pub struct PlaybackEngine {
    pending: Arc<Pattern>,
    sink: Arc<dyn MidiSink>,
    config: EngineConfig,
    running: Mutex<Option<RunningLoop>>,
    /// Humanization source, parked here while the loop is stopped
    rng: Mutex<Option<BoxedRandom>>,
    current_step: Arc<AtomicUsize>,
}

impl PlaybackEngine {
    pub fn new(pending: Arc<Pattern>, sink: Arc<dyn MidiSink>) -> Self {
        Self::with_config(pending, sink, EngineConfig::default())
    }

    pub fn with_config(pending: Arc<Pattern>, sink: Arc<dyn MidiSink>, config: EngineConfig) -> Self {
        let rng = config.random_source();
        Self {
            pending,
            sink,
            config,
            running: Mutex::new(None),
            rng: Mutex::new(Some(rng)),
            current_step: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Replace the humanization source, e.g. with a deterministic one in tests
    pub fn with_random_source(self, rng: impl RandomSource + Send + 'static) -> Self {
        *self.rng.lock().unwrap_or_else(PoisonError::into_inner) = Some(Box::new(rng));
        self
    }

    /// The one editable pattern handle
    pub fn pending_pattern(&self) -> Arc<Pattern> {
        self.pending.clone()
    }

    /// Start looping; a no-op if already running
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        if running.is_some() {
            return Ok(());
        }

        let rng = self
            .rng
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .unwrap_or_else(|| self.config.random_source());

        let (stop_tx, stop_rx) = channel();
        let mut playback = PlaybackLoop::new(
            self.pending.clone(),
            self.sink.clone(),
            self.config.note_off_lead,
            stop_rx,
            rng,
            self.current_step.clone(),
        );

        let handle = thread::Builder::new()
            .name("loopseq-playback".into())
            .spawn(move || {
                playback.run();
                playback.rng
            })
            .context("failed to spawn playback thread")?;

        *running = Some(RunningLoop { stop_tx, handle });
        info!("Playback started");
        Ok(())
    }

    /// Stop looping and wait for the loop to release every sounding note.
    ///
    /// Safe to call from any thread, and when already stopped.
    pub fn stop(&self) {
        let Some(RunningLoop { stop_tx, handle }) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        else {
            return;
        };

        let _ = stop_tx.send(());
        match handle.join() {
            Ok(rng) => {
                *self.rng.lock().unwrap_or_else(PoisonError::into_inner) = Some(rng);
            }
            Err(_) => error!("Playback thread panicked"),
        }
        info!("Playback stopped");
    }

    pub fn state(&self) -> EngineState {
        if self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
        {
            EngineState::Running
        } else {
            EngineState::Stopped
        }
    }

    pub fn is_running(&self) -> bool {
        self.state() == EngineState::Running
    }

    /// The last 1-based step the loop reached, or 0 when stopped
    pub fn current_step(&self) -> usize {
        self.current_step.load(Ordering::Relaxed)
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Counts sink failures so a dead port does not flood the log
#[derive(Default)]
struct FailureLog {
    failures: usize,
}

impl FailureLog {
    fn record(&mut self, what: fmt::Arguments<'_>, result: Result<(), SinkError>) {
        if let Err(e) = result {
            self.failures += 1;
            if self.failures == 1 {
                warn!("MIDI {} failed: {}", what, e);
            } else {
                debug!("MIDI {} failed: {}", what, e);
            }
        }
    }

    fn finish_traversal(&mut self) {
        if self.failures > 1 {
            warn!("{} MIDI messages failed during the last loop", self.failures);
        }
        self.failures = 0;
    }
}

/// Internal playback loop that runs in a dedicated thread
struct PlaybackLoop {
    pending: Arc<Pattern>,
    sink: Arc<dyn MidiSink>,
    note_off_lead: Duration,
    stop_rx: Receiver<()>,
    rng: BoxedRandom,
    current_step: Arc<AtomicUsize>,

    /// Scheduled Note Offs: (due time, pitch)
    note_offs: Vec<(Instant, u8)>,
    /// Steps still covered by the last multi-step note
    occupied: usize,
    failures: FailureLog,
}

impl PlaybackLoop {
    fn new(
        pending: Arc<Pattern>,
        sink: Arc<dyn MidiSink>,
        note_off_lead: Duration,
        stop_rx: Receiver<()>,
        rng: BoxedRandom,
        current_step: Arc<AtomicUsize>,
    ) -> Self {
        Self {
            pending,
            sink,
            note_off_lead,
            stop_rx,
            rng,
            current_step,
            note_offs: Vec::new(),
            occupied: 0,
            failures: FailureLog::default(),
        }
    }

    fn run(&mut self) {
        let mut traversal_start = Instant::now();

        'playing: loop {
            match self.stop_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                Ok(()) | Err(TryRecvError::Disconnected) => break,
            }
            if !self.wait_until(traversal_start) {
                break;
            }

            // Loop boundary: the only point where edits are picked up
            let live = self.pending.snapshot();
            let period = step_period(live.tempo);

            for (cc, value) in &live.global_cc {
                let result = self.sink.control_change(*cc, *value);
                self.failures.record(format_args!("global CC {}", cc), result);
            }

            for index in 0..live.len() {
                let onset = self.onset(&live, traversal_start, index, period);
                if !self.wait_until(onset) {
                    break 'playing;
                }
                self.play_step(&live, index, onset, period);
            }

            self.failures.finish_traversal();

            traversal_start += period * live.len() as u32;
            let now = Instant::now();
            if now > traversal_start + period {
                debug!("Playback fell behind by {:?}, resyncing", now - traversal_start);
                traversal_start = now;
            }
        }

        self.release_all();
        self.current_step.store(0, Ordering::Relaxed);
    }

    /// Scheduled time of a 0-based step, with swing and timing humanization
    fn onset(
        &mut self,
        live: &PatternSnapshot,
        traversal_start: Instant,
        index: usize,
        period: Duration,
    ) -> Instant {
        let period_ms = period.as_secs_f64() * 1000.0;
        let offset_ms = swing_offset_ms(index + 1, period_ms, live.swing)
            + timing_jitter_ms(live.humanize.timing_ms, self.rng.as_mut());
        let grid = traversal_start + period * index as u32;

        match signed_millis(offset_ms) {
            (delay, false) => grid + delay,
            // Early onsets before the traversal start fire right away
            (advance, true) => grid.checked_sub(advance).unwrap_or(grid),
        }
    }

    /// Sleep until `target`, releasing notes as they fall due.
    ///
    /// Returns false if playback was stopped while waiting.
    fn wait_until(&mut self, target: Instant) -> bool {
        loop {
            self.release_due(Instant::now());

            let now = Instant::now();
            if now >= target {
                return true;
            }
            let wake = self
                .note_offs
                .iter()
                .map(|(due, _)| *due)
                .min()
                .map_or(target, |due| due.min(target));

            match self.stop_rx.recv_timeout(wake.saturating_duration_since(now)) {
                Err(RecvTimeoutError::Timeout) => {}
                Ok(()) | Err(RecvTimeoutError::Disconnected) => return false,
            }
        }
    }

    fn play_step(&mut self, live: &PatternSnapshot, index: usize, onset: Instant, period: Duration) {
        let step = &live.steps[index];
        self.current_step.store(index + 1, Ordering::Relaxed);

        // CC automation goes out before any Note On for the step
        for (cc, value) in &step.cc {
            let result = self.sink.control_change(*cc, *value);
            self.failures
                .record(format_args!("CC {} on step {}", cc, index + 1), result);
        }

        if self.occupied > 0 {
            self.occupied -= 1;
            return;
        }
        let Some(pitch) = step.pitch else {
            return;
        };
        let pitch = pitch.midi();

        let humanize = live.humanize;
        let velocity = humanize_velocity(step.velocity, humanize.velocity, self.rng.as_mut());
        let gate = humanize_gate(step.gate, humanize.gate, self.rng.as_mut());

        // Retrigger: the earlier note on this pitch ends now
        if let Some(pos) = self.note_offs.iter().position(|(_, p)| *p == pitch) {
            self.note_offs.swap_remove(pos);
            let result = self.sink.note_off(pitch);
            self.failures.record(format_args!("note off {}", pitch), result);
        }

        let result = self.sink.note_on(pitch, velocity);
        self.failures.record(format_args!("note on {}", pitch), result);

        let sounding = period * sounding_steps(step.duration, gate) as u32;
        let release = (onset + sounding.saturating_sub(self.note_off_lead)).max(onset);
        self.note_offs.push((release, pitch));
        self.occupied = step.duration.saturating_sub(1);
    }

    fn release_due(&mut self, now: Instant) {
        let mut i = 0;
        while i < self.note_offs.len() {
            if self.note_offs[i].0 <= now {
                let (_, pitch) = self.note_offs.swap_remove(i);
                let result = self.sink.note_off(pitch);
                self.failures.record(format_args!("note off {}", pitch), result);
            } else {
                i += 1;
            }
        }
    }

    fn release_all(&mut self) {
        for (_, pitch) in std::mem::take(&mut self.note_offs) {
            if let Err(e) = self.sink.note_off(pitch) {
                warn!("MIDI note off {} failed while stopping: {}", pitch, e);
            }
        }
    }
}
