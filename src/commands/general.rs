//! General REPL commands (transport, status, help, quit)

use crate::commands::{CommandContext, CommandResult};
use colored::*;

/// Handle `play` command
pub fn cmd_play(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if ctx.engine.is_running() {
        return CommandResult::Message("Already playing".yellow().to_string());
    }
    if let Some(handle) = &ctx.midi_handle {
        if !handle.is_connected() {
            println!(
                "{}",
                "Not connected to MIDI, notes will be dropped. Use 'midi connect <port>'."
                    .yellow()
            );
        }
    }

    match ctx.engine.start() {
        Ok(()) => CommandResult::Message(
            format!("▶ Playing at {} BPM", ctx.pattern.tempo())
                .bright_green()
                .to_string(),
        ),
        Err(e) => CommandResult::Error(format!("Failed to start playback: {:#}", e)),
    }
}

/// Handle `stop` command
pub fn cmd_stop(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    if !ctx.engine.is_running() {
        return CommandResult::Message("Not playing".dimmed().to_string());
    }
    ctx.engine.stop();
    CommandResult::Message("⏹ Stopped".to_string())
}

/// Handle `status` command
pub fn cmd_status(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let snapshot = ctx.pattern.snapshot();
    let mut output = format!("{}\n", "Status:".bold());

    let state = ctx.engine.state().to_string();
    if ctx.engine.is_running() {
        output.push_str(&format!(
            "  Engine: {} (step {}/{})\n",
            state.green().bold(),
            ctx.engine.current_step(),
            snapshot.len()
        ));
    } else {
        output.push_str(&format!("  Engine: {}\n", state.yellow()));
    }

    output.push_str(&format!(
        "  Pattern: {} steps, {} notes @ {} BPM, swing {}%\n",
        snapshot.len(),
        snapshot.steps.iter().filter(|s| !s.is_rest()).count(),
        snapshot.tempo,
        snapshot.swing
    ));

    match &ctx.midi_handle {
        Some(handle) => match handle.connected_port() {
            Some(port) => output.push_str(&format!(
                "  MIDI: {} (channel {})\n",
                port.cyan(),
                handle.channel() + 1
            )),
            None => output.push_str(&format!("  MIDI: {}\n", "Not connected".yellow())),
        },
        None => output.push_str(&format!("  MIDI: {}\n", "dry run (log only)".dimmed())),
    }

    CommandResult::Message(output)
}

/// Handle `help` command
pub fn cmd_help(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    print_help();
    CommandResult::Success
}

/// Handle `quit` or `exit` command
pub fn cmd_quit(_args: &str, _ctx: &mut CommandContext) -> CommandResult {
    CommandResult::Exit
}

/// Handle `watch [file]` command
pub fn cmd_watch(args: &str, _ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: watch <file>".to_string());
    }
    CommandResult::Watch(args.to_string())
}

/// Print help information
fn print_help() {
    println!("{}", "🎹 loopseq Help".bold());
    println!("{}", "===============".bold());
    println!();
    println!("{}", "Playback:".green());
    println!("  {}                 - Start looping the pattern", "play".cyan());
    println!("  {}                 - Stop and release all notes", "stop".cyan());
    println!("  {}               - Engine, pattern and MIDI status", "status".cyan());
    println!("  {}                 - Show every step", "show".cyan());
    println!();
    println!("{}", "Steps:".green());
    println!(
        "  {} - Note on a step (C4 = 60)",
        "note <step> <pitch> [dur]".cyan()
    );
    println!("  {}          - Make a step silent", "rest <step>".cyan());
    println!("  {}  - Set step velocity", "velocity <step> <0-127>".cyan());
    println!("  {}      - Set step gate", "gate <step> <1-100>".cyan());
    println!("  {}                - Turn every step into a rest", "clear".cyan());
    println!();
    println!("{}", "Pattern:".green());
    println!("  {}          - Show or set tempo (20-300)", "tempo [bpm]".cyan());
    println!("  {}           - Show or set length (1-64)", "length [n]".cyan());
    println!("  {}        - Delay even steps (0-75)", "swing [pct]".cyan());
    println!(
        "  {} - Random variation",
        "humanize <velocity|timing|gate> <n>".cyan()
    );
    println!("  {}         - Turn humanization off", "humanize off".cyan());
    println!();
    println!("{}", "CC Automation:".green());
    println!("  {} - Send CC before a step", "cc <step> <num> <value>".cyan());
    println!("  {} - Remove step CC", "cc clear <step> <num|all>".cyan());
    println!(
        "  {} - Send once per loop (not saved)",
        "global cc <num> <value>".cyan()
    );
    println!(
        "  {}    - Copy global value onto note steps",
        "global apply <num>".cyan()
    );
    println!("  {} - Remove global CC", "global clear [num|all]".cyan());
    println!();
    println!("{}", "Files:".green());
    println!("  {}          - Save pattern as JSON", "save <file>".cyan());
    println!("  {}          - Load pattern from JSON", "load <file>".cyan());
    println!("  {}         - Reload file whenever it changes", "watch <file>".cyan());
    println!();
    println!("{}", "MIDI Commands:".green());
    println!("  {}       - List MIDI output ports", "midi devices".cyan());
    println!("  {} - Connect to MIDI port", "midi connect <port>".cyan());
    println!("  {}    - Disconnect MIDI", "midi disconnect".cyan());
    println!("  {}  - Show or set channel (1-16)", "midi channel [n]".cyan());
    println!("  {}        - Show MIDI status", "midi status".cyan());
    println!("  {}         - All notes off (panic)", "midi panic".cyan());
    println!();
    println!("{}", "Other Commands:".green());
    println!("  {}              - Show this help", "help".bright_green());
    println!("  {}              - Exit the REPL", "quit".bright_red());
    println!();
    println!(
        "{}",
        "Edits apply at the next loop boundary while playing.".dimmed()
    );
}
