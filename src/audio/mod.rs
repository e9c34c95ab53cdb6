pub mod midi;
pub mod playback_engine;
pub mod recorder;

pub use midi::{MidiOutputHandle, MidiSink, SinkError};
pub use playback_engine::{EngineConfig, EngineState, PlaybackEngine};
pub use recorder::{MidiEvent, MidiMessage, RecordingSink};
