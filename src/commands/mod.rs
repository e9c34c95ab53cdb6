//! Command registry for REPL commands
//!
//! Provides a clean, extensible pattern for handling REPL commands.

pub mod file;
pub mod general;
pub mod midi;
pub mod pattern;

use crate::audio::midi::MidiOutputHandle;
use crate::audio::playback_engine::PlaybackEngine;
use colored::*;
use loopseq_core::Pattern;
use std::str::FromStr;
use std::sync::Arc;

/// Result of executing a command
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// Command executed successfully, continue REPL
    Success,
    /// Command executed, show this message
    Message(String),
    /// Exit the REPL
    Exit,
    /// No command matches the input
    NotACommand,
    /// Error occurred
    Error(String),
    /// Watch a file for changes
    Watch(String),
}

/// Context passed to command handlers
pub struct CommandContext {
    /// The pending pattern; edits become audible at the next loop boundary
    pub pattern: Arc<Pattern>,
    pub engine: Arc<PlaybackEngine>,
    /// Absent in dry-run mode
    pub midi_handle: Option<Arc<MidiOutputHandle>>,
}

impl CommandContext {
    pub fn new(engine: Arc<PlaybackEngine>) -> Self {
        Self {
            pattern: engine.pending_pattern(),
            engine,
            midi_handle: None,
        }
    }

    /// Create a new context with MIDI support
    pub fn new_with_midi(engine: Arc<PlaybackEngine>, midi_handle: Arc<MidiOutputHandle>) -> Self {
        Self {
            midi_handle: Some(midi_handle),
            ..Self::new(engine)
        }
    }
}

/// Parse the whitespace-separated argument at `index`
pub(crate) fn arg<T: FromStr>(parts: &[&str], index: usize, name: &str, usage: &str) -> Result<T, String> {
    let raw = parts
        .get(index)
        .ok_or_else(|| format!("Usage: {}", usage))?;
    raw.parse()
        .map_err(|_| format!("Invalid {} '{}'\nUsage: {}", name, raw, usage))
}

/// Turn a handler outcome into a REPL result
pub(crate) fn respond(result: Result<String, String>) -> CommandResult {
    match result {
        Ok(message) => CommandResult::Message(message.green().to_string()),
        Err(e) => CommandResult::Error(e),
    }
}

/// A command handler function
pub type CommandHandler = fn(&str, &mut CommandContext) -> CommandResult;

/// Registry of available commands
pub struct CommandRegistry {
    /// Commands indexed by their prefix (e.g., "global apply")
    /// Sorted by prefix length descending for longest-match-first lookup
    commands: Vec<(String, CommandHandler)>,
}

impl CommandRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            commands: Vec::new(),
        }
    }

    /// Register a command with its prefix
    pub fn register(&mut self, prefix: &str, handler: CommandHandler) {
        self.commands.push((prefix.to_string(), handler));
        // Sort by prefix length descending for longest-match-first
        self.commands.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
    }

    /// Execute a command, returning NotACommand if no match found
    pub fn execute(&self, input: &str, ctx: &mut CommandContext) -> CommandResult {
        for (prefix, handler) in &self.commands {
            if input == prefix || input.starts_with(&format!("{} ", prefix)) {
                let args = if input.len() > prefix.len() {
                    input[prefix.len()..].trim()
                } else {
                    ""
                };
                return handler(args, ctx);
            }
        }
        CommandResult::NotACommand
    }

    /// Get all registered command prefixes
    pub fn list_commands(&self) -> Vec<&str> {
        self.commands.iter().map(|(p, _)| p.as_str()).collect()
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Create a fully populated command registry with all built-in commands
pub fn create_registry() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    // Transport
    registry.register("play", general::cmd_play);
    registry.register("stop", general::cmd_stop);
    registry.register("status", general::cmd_status);

    // Step editing
    registry.register("note", pattern::cmd_note);
    registry.register("rest", pattern::cmd_rest);
    registry.register("velocity", pattern::cmd_velocity);
    registry.register("gate", pattern::cmd_gate);
    registry.register("cc clear", pattern::cmd_cc_clear);
    registry.register("cc", pattern::cmd_cc);
    registry.register("show", pattern::cmd_show);
    registry.register("clear", pattern::cmd_clear);

    // Pattern settings
    registry.register("tempo", pattern::cmd_tempo);
    registry.register("length", pattern::cmd_length);
    registry.register("swing", pattern::cmd_swing);
    registry.register("humanize", pattern::cmd_humanize);

    // Global CC
    registry.register("global cc", pattern::cmd_global_cc);
    registry.register("global apply", pattern::cmd_global_apply);
    registry.register("global clear", pattern::cmd_global_clear);

    // Files
    registry.register("save", file::cmd_save);
    registry.register("load", file::cmd_load);
    registry.register("watch", general::cmd_watch);

    // MIDI commands
    registry.register("midi devices", midi::cmd_midi_devices);
    registry.register("midi connect", midi::cmd_midi_connect);
    registry.register("midi disconnect", midi::cmd_midi_disconnect);
    registry.register("midi channel", midi::cmd_midi_channel);
    registry.register("midi status", midi::cmd_midi_status);
    registry.register("midi panic", midi::cmd_midi_panic);

    // General commands
    registry.register("help", general::cmd_help);
    registry.register("quit", general::cmd_quit);
    registry.register("exit", general::cmd_quit);

    registry
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::audio::recorder::RecordingSink;

    /// Context over a fresh 16-step pattern and a recording sink
    pub fn context() -> (CommandContext, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::new());
        let engine = PlaybackEngine::new(Arc::new(Pattern::default()), sink.clone());
        (CommandContext::new(Arc::new(engine)), sink)
    }
}
