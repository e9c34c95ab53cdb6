//! MIDI output for loopseq
//!
//! Defines the [`MidiSink`] capability the playback engine drives, and a
//! midir-backed implementation: a dedicated MIDI thread owns the port
//! connection and receives commands over a channel.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use log::{debug, error, info, warn};
use midir::{MidiOutput, MidiOutputConnection, MidiOutputPort};
use std::collections::HashSet;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread::{self, JoinHandle};
use thiserror::Error;

const CLIENT_NAME: &str = "loopseq";

/// All Notes Off controller number
const ALL_NOTES_OFF: u8 = 123;

/// A MIDI message could not be delivered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    #[error("not connected to a MIDI port")]
    NotConnected,
    #[error("MIDI output thread has shut down")]
    Closed,
    #[error("MIDI transport error: {0}")]
    Transport(String),
}

/// The capability the playback engine needs from a MIDI transport.
///
/// Pitches, velocities, controller numbers and values are raw 7-bit MIDI data.
pub trait MidiSink: Send + Sync {
    fn note_on(&self, pitch: u8, velocity: u8) -> Result<(), SinkError>;
    fn note_off(&self, pitch: u8) -> Result<(), SinkError>;
    fn control_change(&self, number: u8, value: u8) -> Result<(), SinkError>;
}

/// Commands that can be sent to the MIDI output thread
enum MidiCommand {
    /// Open a port by (partial) name; the full name or an error is sent back
    Connect {
        port_name: String,
        reply: Sender<Result<String, String>>,
    },
    /// Send Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },
    /// Send Note Off: channel (0-15), note (0-127)
    NoteOff { channel: u8, note: u8 },
    /// Send Control Change: channel, controller number, value
    ControlChange {
        channel: u8,
        controller: u8,
        value: u8,
    },
    /// Send All Notes Off on specified channel
    AllNotesOff { channel: u8 },
    /// Drop the port connection
    Disconnect,
    /// Shutdown the MIDI thread
    Shutdown,
}

/// Internal MIDI output handler that owns the connection
struct MidiOutputInternal {
    connection: Option<MidiOutputConnection>,
    command_rx: Receiver<MidiCommand>,
}

impl MidiOutputInternal {
    fn new(command_rx: Receiver<MidiCommand>) -> Self {
        Self {
            connection: None,
            command_rx,
        }
    }

    fn connect(&mut self, port_name: &str) -> Result<String> {
        let midi_out = MidiOutput::new(CLIENT_NAME)?;
        let ports = midi_out.ports();

        let port: &MidiOutputPort = ports
            .iter()
            .find(|p| {
                midi_out
                    .port_name(p)
                    .map(|name| name.contains(port_name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("MIDI port '{}' not found", port_name))?;

        let actual_name = midi_out.port_name(port)?;
        let connection = midi_out
            .connect(port, "loopseq-out")
            .map_err(|e| anyhow!("failed to open '{}': {}", actual_name, e))?;

        self.connection = Some(connection);
        Ok(actual_name)
    }

    fn send(&mut self, bytes: &[u8]) {
        if let Some(conn) = &mut self.connection {
            if let Err(e) = conn.send(bytes) {
                error!("MIDI send failed for {:02X?}: {}", bytes, e);
            }
        }
    }

    fn run(&mut self) {
        while let Ok(cmd) = self.command_rx.recv() {
            match cmd {
                MidiCommand::Connect { port_name, reply } => {
                    let result = self.connect(&port_name).map_err(|e| format!("{:#}", e));
                    let _ = reply.send(result);
                }
                MidiCommand::NoteOn {
                    channel,
                    note,
                    velocity,
                } => {
                    self.send(&[0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]);
                }
                MidiCommand::NoteOff { channel, note } => {
                    self.send(&[0x80 | (channel & 0x0F), note & 0x7F, 0]);
                }
                MidiCommand::ControlChange {
                    channel,
                    controller,
                    value,
                } => {
                    self.send(&[0xB0 | (channel & 0x0F), controller & 0x7F, value & 0x7F]);
                }
                MidiCommand::AllNotesOff { channel } => {
                    self.send(&[0xB0 | (channel & 0x0F), ALL_NOTES_OFF, 0]);
                }
                MidiCommand::Disconnect => {
                    self.connection = None;
                }
                MidiCommand::Shutdown => {
                    for ch in 0..16u8 {
                        self.send(&[0xB0 | ch, ALL_NOTES_OFF, 0]);
                    }
                    break;
                }
            }
        }
        debug!("MIDI output thread exiting");
    }
}

/// Thread-safe handle to a midir output port, usable as a [`MidiSink`].
pub struct MidiOutputHandle {
    command_tx: Sender<MidiCommand>,
    thread: Option<JoinHandle<()>>,
    /// 0-indexed MIDI channel all messages go out on
    channel: AtomicU8,
    /// Pitches with an outstanding Note On, for panic handling
    active_notes: Mutex<HashSet<u8>>,
    /// Name of the connected port, `None` while disconnected
    port_name: RwLock<Option<String>>,
}

impl MidiOutputHandle {
    /// Create a new MIDI output handle (not connected to any port yet)
    pub fn new() -> Result<Self> {
        let (tx, rx) = unbounded();

        let thread = thread::Builder::new()
            .name("loopseq-midi".into())
            .spawn(move || MidiOutputInternal::new(rx).run())
            .context("failed to spawn MIDI output thread")?;

        Ok(Self {
            command_tx: tx,
            thread: Some(thread),
            channel: AtomicU8::new(0),
            active_notes: Mutex::new(HashSet::new()),
            port_name: RwLock::new(None),
        })
    }

    /// List available MIDI output ports
    ///
    /// Creating the temporary client occasionally fails on macOS, so this
    /// retries up to 3 times with a small delay.
    pub fn list_ports() -> Result<Vec<String>> {
        let mut last_err = None;
        for attempt in 0..3 {
            if attempt > 0 {
                thread::sleep(std::time::Duration::from_millis(100));
            }
            match MidiOutput::new(CLIENT_NAME) {
                Ok(midi_out) => {
                    return Ok(midi_out
                        .ports()
                        .iter()
                        .filter_map(|p| midi_out.port_name(p).ok())
                        .collect());
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(anyhow!(
            "MIDI initialization failed after 3 attempts: {:?}",
            last_err
        ))
    }

    /// Connect to a MIDI output port by name (partial match supported).
    ///
    /// The port is opened on the MIDI thread. Returns the full name of the
    /// port that was opened.
    pub fn connect(&self, port_name: &str) -> Result<String> {
        // Release anything still sounding on the previous port first
        if self.is_connected() {
            self.panic()?;
        }

        let (reply_tx, reply_rx) = bounded(1);
        self.command_tx
            .send(MidiCommand::Connect {
                port_name: port_name.to_string(),
                reply: reply_tx,
            })
            .map_err(|_| anyhow!(SinkError::Closed))?;

        let actual_name = reply_rx
            .recv()
            .map_err(|_| anyhow!(SinkError::Closed))?
            .map_err(|e| anyhow!(e))?;

        *self.port_name.write().unwrap_or_else(PoisonError::into_inner) =
            Some(actual_name.clone());
        info!("Connected to MIDI port '{}'", actual_name);
        Ok(actual_name)
    }

    /// Disconnect from the current MIDI port
    pub fn disconnect(&self) -> Result<()> {
        if self.is_connected() {
            self.panic()?;
        }
        self.command_tx
            .send(MidiCommand::Disconnect)
            .map_err(|_| anyhow!(SinkError::Closed))?;

        *self.port_name.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        info!("Disconnected from MIDI");
        Ok(())
    }

    /// Check if connected to a MIDI port
    pub fn is_connected(&self) -> bool {
        self.port_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Get the name of the connected port
    pub fn connected_port(&self) -> Option<String> {
        self.port_name
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Set the output channel (0-indexed)
    pub fn set_channel(&self, channel: u8) {
        self.channel.store(channel & 0x0F, Ordering::Relaxed);
    }

    /// Get the output channel (0-indexed)
    pub fn channel(&self) -> u8 {
        self.channel.load(Ordering::Relaxed)
    }

    fn dispatch(&self, command: MidiCommand) -> Result<(), SinkError> {
        if !self.is_connected() {
            return Err(SinkError::NotConnected);
        }
        self.command_tx
            .send(command)
            .map_err(|_| SinkError::Closed)
    }

    /// Note Off for every sounding note, then All Notes Off on the channel
    pub fn panic(&self) -> Result<()> {
        let channel = self.channel();
        let notes: Vec<u8> = self
            .active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .collect();

        for note in notes {
            self.dispatch(MidiCommand::NoteOff { channel, note })?;
        }
        self.dispatch(MidiCommand::AllNotesOff { channel })?;
        Ok(())
    }

    /// Send All Notes Off on all channels
    pub fn panic_all(&self) -> Result<()> {
        for channel in 0..16u8 {
            self.dispatch(MidiCommand::AllNotesOff { channel })?;
        }
        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    /// Number of notes currently held on
    pub fn active_note_count(&self) -> usize {
        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl MidiSink for MidiOutputHandle {
    fn note_on(&self, pitch: u8, velocity: u8) -> Result<(), SinkError> {
        self.dispatch(MidiCommand::NoteOn {
            channel: self.channel(),
            note: pitch,
            velocity,
        })?;
        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(pitch);
        Ok(())
    }

    fn note_off(&self, pitch: u8) -> Result<(), SinkError> {
        self.active_notes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&pitch);
        self.dispatch(MidiCommand::NoteOff {
            channel: self.channel(),
            note: pitch,
        })
    }

    fn control_change(&self, number: u8, value: u8) -> Result<(), SinkError> {
        self.dispatch(MidiCommand::ControlChange {
            channel: self.channel(),
            controller: number,
            value,
        })
    }
}

impl Drop for MidiOutputHandle {
    fn drop(&mut self) {
        let _ = self.command_tx.send(MidiCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("MIDI output thread panicked");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unconnected_handle_reports_not_connected() {
        let handle = MidiOutputHandle::new().unwrap();
        assert!(!handle.is_connected());
        assert_eq!(handle.note_on(60, 100), Err(SinkError::NotConnected));
        assert_eq!(handle.note_off(60), Err(SinkError::NotConnected));
        assert_eq!(handle.control_change(74, 1), Err(SinkError::NotConnected));
        assert_eq!(handle.active_note_count(), 0);
    }

    #[test]
    fn test_channel_is_masked_to_four_bits() {
        let handle = MidiOutputHandle::new().unwrap();
        handle.set_channel(9);
        assert_eq!(handle.channel(), 9);
        handle.set_channel(17);
        assert_eq!(handle.channel(), 1);
    }

    #[test]
    fn test_disconnect_without_port() {
        let handle = MidiOutputHandle::new().unwrap();
        assert!(handle.disconnect().is_ok());
        assert!(handle.connected_port().is_none());
    }
}
