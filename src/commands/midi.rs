//! MIDI REPL commands

use crate::audio::midi::MidiOutputHandle;
use crate::commands::{CommandContext, CommandResult};
use colored::*;

const NOT_INITIALIZED: &str = "MIDI output not initialized (running with --dry-run)";

/// Handle `midi devices` command - list available MIDI output ports
pub fn cmd_midi_devices(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    match MidiOutputHandle::list_ports() {
        Ok(ports) => {
            if ports.is_empty() {
                CommandResult::Message(
                    "No MIDI output ports found. Make sure a MIDI device or virtual port is connected."
                        .yellow()
                        .to_string(),
                )
            } else {
                let mut output = format!("{}\n", "🎹 Available MIDI Output Ports:".bold());
                for (i, port) in ports.iter().enumerate() {
                    output.push_str(&format!("  {}. {}\n", i + 1, port.cyan()));
                }
                output.push_str(&format!(
                    "\n{} {}",
                    "Use".dimmed(),
                    "midi connect <port name>".green()
                ));
                CommandResult::Message(output)
            }
        }
        Err(e) => CommandResult::Error(format!("Failed to list MIDI ports: {}", e)),
    }
}

/// Handle `midi connect <port>` command - connect to a MIDI output port
pub fn cmd_midi_connect(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error(
            "Usage: midi connect <port name>\nUse 'midi devices' to see available ports"
                .to_string(),
        );
    }

    match &ctx.midi_handle {
        Some(handle) => match handle.connect(args) {
            Ok(port) => {
                CommandResult::Message(format!("🎹 Connected to MIDI port: {}", port.green()))
            }
            Err(e) => CommandResult::Error(format!("Failed to connect to '{}': {}", args, e)),
        },
        None => CommandResult::Error(NOT_INITIALIZED.to_string()),
    }
}

/// Handle `midi disconnect` command
pub fn cmd_midi_disconnect(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match &ctx.midi_handle {
        Some(handle) => match handle.disconnect() {
            Ok(()) => CommandResult::Message("🎹 Disconnected from MIDI".to_string()),
            Err(e) => CommandResult::Error(format!("Failed to disconnect: {}", e)),
        },
        None => CommandResult::Error(NOT_INITIALIZED.to_string()),
    }
}

/// Handle `midi channel [1-16]` command
pub fn cmd_midi_channel(args: &str, ctx: &mut CommandContext) -> CommandResult {
    let Some(handle) = &ctx.midi_handle else {
        return CommandResult::Error(NOT_INITIALIZED.to_string());
    };

    if args.is_empty() {
        return CommandResult::Message(format!("🎹 MIDI channel: {}", handle.channel() + 1));
    }

    match args.parse::<u8>() {
        Ok(ch) if (1..=16).contains(&ch) => {
            // Release notes on the old channel before switching
            if handle.is_connected() {
                if let Err(e) = handle.panic() {
                    return CommandResult::Error(format!("Failed to switch channel: {}", e));
                }
            }
            handle.set_channel(ch - 1); // Convert to 0-indexed
            CommandResult::Message(format!("🎹 MIDI channel: {}", ch).green().to_string())
        }
        _ => CommandResult::Error("Usage: midi channel <1-16>".to_string()),
    }
}

/// Handle `midi status` command - show MIDI connection status
pub fn cmd_midi_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match &ctx.midi_handle {
        Some(handle) => {
            let mut output = format!("{}\n", "🎹 MIDI Status:".bold());

            match handle.connected_port() {
                Some(name) => {
                    output.push_str(&format!("  Status: {}\n", "Connected".green().bold()));
                    output.push_str(&format!("  Port: {}\n", name.cyan()));
                }
                None => {
                    output.push_str(&format!("  Status: {}\n", "Not connected".yellow()));
                }
            }
            output.push_str(&format!("  Channel: {}\n", handle.channel() + 1));
            output.push_str(&format!("  Sounding notes: {}\n", handle.active_note_count()));

            CommandResult::Message(output)
        }
        None => CommandResult::Message(format!(
            "{}\n  Status: {}\n",
            "🎹 MIDI Status:".bold(),
            "dry run, messages are logged only".yellow()
        )),
    }
}

/// Handle `midi panic` command - send All Notes Off to all channels
pub fn cmd_midi_panic(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    match &ctx.midi_handle {
        Some(handle) => match handle.panic_all() {
            Ok(()) => CommandResult::Message(
                "🎹 MIDI Panic: All Notes Off sent to all channels"
                    .yellow()
                    .to_string(),
            ),
            Err(e) => CommandResult::Error(format!("Failed to send MIDI panic: {}", e)),
        },
        None => CommandResult::Error(NOT_INITIALIZED.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use std::sync::Arc;

    #[test]
    fn test_dry_run_context() {
        let (mut ctx, _) = context();
        assert!(matches!(cmd_midi_connect("x", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_midi_channel("2", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_midi_panic("", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_midi_status("", &mut ctx), CommandResult::Message(_)));
    }

    #[test]
    fn test_channel_and_status_without_port() {
        let (mut ctx, _) = context();
        ctx.midi_handle = Some(Arc::new(MidiOutputHandle::new().unwrap()));

        assert!(matches!(cmd_midi_channel("10", &mut ctx), CommandResult::Message(_)));
        assert!(matches!(cmd_midi_channel("17", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_midi_channel("bass", &mut ctx), CommandResult::Error(_)));
        assert_eq!(ctx.midi_handle.as_ref().unwrap().channel(), 9);

        match cmd_midi_status("", &mut ctx) {
            CommandResult::Message(text) => assert!(text.contains("Channel: 10")),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(matches!(cmd_midi_connect("", &mut ctx), CommandResult::Error(_)));
        // Panic needs a port
        assert!(matches!(cmd_midi_panic("", &mut ctx), CommandResult::Error(_)));
    }
}
