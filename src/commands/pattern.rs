//! Pattern editing commands
//!
//! Every edit goes to the pending pattern and is picked up by the playback
//! loop at its next boundary.

use crate::commands::{arg, respond, CommandContext, CommandResult};
use colored::*;
use loopseq_core::types::pattern::{MAX_STEPS, MAX_SWING, MAX_TEMPO, MIN_TEMPO};
use loopseq_core::{CcSelector, PatternSnapshot, Pitch};

fn split(args: &str) -> Vec<&str> {
    args.split_whitespace().collect()
}

/// Handle `note <step> <pitch> [duration]`
pub fn cmd_note(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "note <step> <pitch> [duration]   e.g. note 1 C3 2";
    let parts = split(args);

    respond((|| -> Result<String, String> {
        let step: usize = arg(&parts, 0, "step", USAGE)?;
        let pitch: Pitch = parts
            .get(1)
            .ok_or_else(|| format!("Usage: {}", USAGE))?
            .parse()
            .map_err(|e| format!("{}", e))?;
        let duration: usize = if parts.len() > 2 {
            arg(&parts, 2, "duration", USAGE)?
        } else {
            1
        };

        ctx.pattern
            .set_note_with_duration(step, pitch, duration)
            .map_err(|e| e.to_string())?;
        Ok(if duration > 1 {
            format!("Step {}: {} for {} steps", step, pitch, duration)
        } else {
            format!("Step {}: {}", step, pitch)
        })
    })())
}

/// Handle `rest <step>`
pub fn cmd_rest(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "rest <step>";
    let parts = split(args);

    respond((|| -> Result<String, String> {
        let step: usize = arg(&parts, 0, "step", USAGE)?;
        ctx.pattern.set_rest(step).map_err(|e| e.to_string())?;
        Ok(format!("Step {}: rest", step))
    })())
}

/// Handle `velocity <step> <0-127>`
pub fn cmd_velocity(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "velocity <step> <0-127>";
    let parts = split(args);

    respond((|| -> Result<String, String> {
        let step: usize = arg(&parts, 0, "step", USAGE)?;
        let velocity: u8 = arg(&parts, 1, "velocity", USAGE)?;
        ctx.pattern
            .set_velocity(step, velocity)
            .map_err(|e| e.to_string())?;
        Ok(format!("Step {}: velocity {}", step, velocity))
    })())
}

/// Handle `gate <step> <1-100>`
pub fn cmd_gate(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "gate <step> <1-100>";
    let parts = split(args);

    respond((|| -> Result<String, String> {
        let step: usize = arg(&parts, 0, "step", USAGE)?;
        let gate: u8 = arg(&parts, 1, "gate", USAGE)?;
        ctx.pattern.set_gate(step, gate).map_err(|e| e.to_string())?;
        Ok(format!("Step {}: gate {}%", step, gate))
    })())
}

/// Handle `cc <step> <number> <value>`
pub fn cmd_cc(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "cc <step> <0-127> <0-127>   e.g. cc 1 74 64 (filter cutoff)";
    let parts = split(args);

    respond((|| -> Result<String, String> {
        let step: usize = arg(&parts, 0, "step", USAGE)?;
        let number: u8 = arg(&parts, 1, "CC number", USAGE)?;
        let value: u8 = arg(&parts, 2, "CC value", USAGE)?;
        ctx.pattern
            .set_step_cc(step, number, value)
            .map_err(|e| e.to_string())?;
        Ok(format!("Step {}: CC {} = {}", step, number, value))
    })())
}

/// Handle `cc clear <step> <number|all>`
pub fn cmd_cc_clear(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "cc clear <step> <number|all>";
    let parts = split(args);

    respond((|| -> Result<String, String> {
        let step: usize = arg(&parts, 0, "step", USAGE)?;
        let which: CcSelector = arg(&parts, 1, "CC selector", USAGE)?;
        ctx.pattern
            .clear_step_cc(step, which)
            .map_err(|e| e.to_string())?;
        Ok(match which {
            CcSelector::One(cc) => format!("Step {}: CC {} cleared", step, cc),
            CcSelector::All => format!("Step {}: all CC cleared", step),
        })
    })())
}

/// Handle `global cc <number> <value>`
pub fn cmd_global_cc(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "global cc <0-127> <0-127>";
    let parts = split(args);

    respond((|| -> Result<String, String> {
        let number: u8 = arg(&parts, 0, "CC number", USAGE)?;
        let value: u8 = arg(&parts, 1, "CC value", USAGE)?;
        ctx.pattern
            .set_global_cc(number, value)
            .map_err(|e| e.to_string())?;
        Ok(format!("Global CC {} = {} (sent once per loop)", number, value))
    })())
}

/// Handle `global apply <number>`
pub fn cmd_global_apply(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "global apply <0-127>";
    let parts = split(args);

    respond((|| -> Result<String, String> {
        let number: u8 = arg(&parts, 0, "CC number", USAGE)?;
        let applied = ctx
            .pattern
            .apply_global_cc(number)
            .map_err(|e| e.to_string())?;
        Ok(format!("Global CC {} written to {} note steps", number, applied))
    })())
}

/// Handle `global clear [number|all]`
pub fn cmd_global_clear(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "global clear [number|all]";
    let parts = split(args);

    respond((|| -> Result<String, String> {
        let which = if parts.is_empty() {
            CcSelector::All
        } else {
            arg(&parts, 0, "CC selector", USAGE)?
        };
        ctx.pattern
            .clear_global_cc(which)
            .map_err(|e| e.to_string())?;
        Ok(match which {
            CcSelector::One(cc) => format!("Global CC {} cleared", cc),
            CcSelector::All => "Global CC cleared".to_string(),
        })
    })())
}

/// Handle `tempo [bpm]`
pub fn cmd_tempo(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!("Current tempo: {} BPM", ctx.pattern.tempo()));
    }

    match args.parse::<u16>() {
        Ok(bpm) => match ctx.pattern.set_tempo(bpm) {
            Ok(()) => CommandResult::Message(
                format!("🎵 Tempo set to {} BPM", bpm)
                    .bright_green()
                    .to_string(),
            ),
            Err(e) => CommandResult::Error(e.to_string()),
        },
        Err(_) => CommandResult::Error(format!(
            "Invalid tempo. Use a value between {}-{} BPM",
            MIN_TEMPO, MAX_TEMPO
        )),
    }
}

/// Handle `length [steps]`
pub fn cmd_length(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!("Pattern length: {} steps", ctx.pattern.len()));
    }

    match args.parse::<usize>() {
        Ok(length) => match ctx.pattern.resize(length) {
            Ok(()) => respond(Ok(format!("Pattern length set to {} steps", length))),
            Err(e) => CommandResult::Error(e.to_string()),
        },
        Err(_) => CommandResult::Error(format!("Length must be 1-{}", MAX_STEPS)),
    }
}

/// Handle `swing [percent]`
pub fn cmd_swing(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Message(format!("Swing: {}%", ctx.pattern.swing()));
    }

    match args.trim_end_matches('%').parse::<u8>() {
        Ok(percent) => match ctx.pattern.set_swing(percent) {
            Ok(()) => respond(Ok(format!("Swing set to {}%", percent))),
            Err(e) => CommandResult::Error(e.to_string()),
        },
        Err(_) => CommandResult::Error(format!("Swing must be 0-{}%", MAX_SWING)),
    }
}

/// Handle `humanize [velocity|timing|gate <amount> | off]`
pub fn cmd_humanize(args: &str, ctx: &mut CommandContext) -> CommandResult {
    const USAGE: &str = "humanize <velocity|timing|gate> <amount> | humanize off";
    let parts = split(args);

    if parts.is_empty() {
        let h = ctx.pattern.humanize();
        return CommandResult::Message(format!(
            "Humanize: velocity ±{}, timing ±{}ms, gate ±{}%",
            h.velocity, h.timing_ms, h.gate
        ));
    }

    respond((|| -> Result<String, String> {
        if parts[0] == "off" {
            for result in [
                ctx.pattern.set_humanize_velocity(0),
                ctx.pattern.set_humanize_timing(0),
                ctx.pattern.set_humanize_gate(0),
            ] {
                result.map_err(|e| e.to_string())?;
            }
            return Ok("Humanization off".to_string());
        }

        let amount: u8 = arg(&parts, 1, "amount", USAGE)?;
        let (result, label) = match parts[0] {
            "velocity" | "vel" => (ctx.pattern.set_humanize_velocity(amount), ""),
            "timing" | "time" => (ctx.pattern.set_humanize_timing(amount), "ms"),
            "gate" => (ctx.pattern.set_humanize_gate(amount), "%"),
            _ => return Err(format!("Usage: {}", USAGE)),
        };
        result.map_err(|e| e.to_string())?;
        Ok(format!("Humanize {}: ±{}{}", parts[0], amount, label))
    })())
}

/// Handle `clear` - every step back to a default rest
pub fn cmd_clear(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    ctx.pattern.clear();
    respond(Ok("Pattern cleared".to_string()))
}

/// Handle `show` - print the pending pattern
pub fn cmd_show(_args: &str, ctx: &mut CommandContext) -> CommandResult {
    let playing = if ctx.engine.is_running() {
        Some(ctx.engine.current_step())
    } else {
        None
    };
    CommandResult::Message(render(&ctx.pattern.snapshot(), playing))
}

/// One line per step; steps held by an earlier note show as `~`
fn render(snapshot: &PatternSnapshot, playing: Option<usize>) -> String {
    let h = snapshot.humanize;
    let mut output = format!(
        "{} {} steps @ {} BPM, swing {}%, humanize v±{} t±{}ms g±{}%\n",
        "Pattern:".bold(),
        snapshot.len(),
        snapshot.tempo,
        snapshot.swing,
        h.velocity,
        h.timing_ms,
        h.gate
    );

    if !snapshot.global_cc.is_empty() {
        let entries: Vec<String> = snapshot
            .global_cc
            .iter()
            .map(|(cc, value)| format!("{}={}", cc, value))
            .collect();
        output.push_str(&format!("{} {}\n", "Global CC:".bold(), entries.join(" ")));
    }

    let mut held = 0;
    for (i, step) in snapshot.steps.iter().enumerate() {
        let number = i + 1;
        let marker = if playing == Some(number) { "▶" } else { " " };
        let body = if held > 0 {
            held -= 1;
            let cc: String = step
                .cc
                .iter()
                .map(|(cc, value)| format!(" cc{}={}", cc, value))
                .collect();
            format!("~{}", cc).dimmed().to_string()
        } else if step.is_rest() {
            step.to_string().dimmed().to_string()
        } else {
            held = step.duration - 1;
            step.to_string().cyan().to_string()
        };
        output.push_str(&format!("{} {:>2}  {}\n", marker.yellow(), number, body));
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;

    fn pitch(name: &str) -> Pitch {
        name.parse().unwrap()
    }

    fn is_error(result: CommandResult) -> bool {
        matches!(result, CommandResult::Error(_))
    }

    #[test]
    fn test_note_and_rest() {
        let (mut ctx, _) = context();
        assert!(!is_error(cmd_note("3 F#2 4", &mut ctx)));
        let step = ctx.pattern.step(3).unwrap();
        assert_eq!(step.pitch, Some(pitch("F#2")));
        assert_eq!(step.duration, 4);

        assert!(!is_error(cmd_note("3 G2", &mut ctx)));
        assert_eq!(ctx.pattern.step(3).unwrap().duration, 1);

        assert!(!is_error(cmd_rest("3", &mut ctx)));
        assert!(ctx.pattern.step(3).unwrap().is_rest());
    }

    #[test]
    fn test_note_rejects_bad_input() {
        let (mut ctx, _) = context();
        assert!(is_error(cmd_note("", &mut ctx)));
        assert!(is_error(cmd_note("1", &mut ctx)));
        assert!(is_error(cmd_note("1 H3", &mut ctx)));
        assert!(is_error(cmd_note("0 C3", &mut ctx)));
        assert!(is_error(cmd_note("1 C3 17", &mut ctx)));
        assert!(ctx.pattern.steps().iter().all(|s| s.is_rest()));
    }

    #[test]
    fn test_velocity_and_gate() {
        let (mut ctx, _) = context();
        assert!(!is_error(cmd_velocity("2 64", &mut ctx)));
        assert!(!is_error(cmd_gate("2 50", &mut ctx)));
        assert!(is_error(cmd_velocity("2 128", &mut ctx)));
        assert!(is_error(cmd_gate("2 0", &mut ctx)));

        let step = ctx.pattern.step(2).unwrap();
        assert_eq!((step.velocity, step.gate), (64, 50));
    }

    #[test]
    fn test_settings() {
        let (mut ctx, _) = context();
        assert!(!is_error(cmd_tempo("90", &mut ctx)));
        assert!(is_error(cmd_tempo("301", &mut ctx)));
        assert!(is_error(cmd_tempo("fast", &mut ctx)));
        assert_eq!(ctx.pattern.tempo(), 90);

        assert!(!is_error(cmd_length("8", &mut ctx)));
        assert!(is_error(cmd_length("65", &mut ctx)));
        assert_eq!(ctx.pattern.len(), 8);

        assert!(!is_error(cmd_swing("30%", &mut ctx)));
        assert!(is_error(cmd_swing("80", &mut ctx)));
        assert_eq!(ctx.pattern.swing(), 30);
    }

    #[test]
    fn test_humanize() {
        let (mut ctx, _) = context();
        assert!(!is_error(cmd_humanize("velocity 10", &mut ctx)));
        assert!(!is_error(cmd_humanize("timing 5", &mut ctx)));
        assert!(!is_error(cmd_humanize("gate 20", &mut ctx)));
        assert!(is_error(cmd_humanize("timing 51", &mut ctx)));
        assert!(is_error(cmd_humanize("pitch 3", &mut ctx)));

        let h = ctx.pattern.humanize();
        assert_eq!((h.velocity, h.timing_ms, h.gate), (10, 5, 20));

        assert!(!is_error(cmd_humanize("off", &mut ctx)));
        assert!(ctx.pattern.humanize().is_off());
    }

    #[test]
    fn test_cc_commands() {
        let (mut ctx, _) = context();
        assert!(!is_error(cmd_cc("1 74 64", &mut ctx)));
        assert!(!is_error(cmd_cc("1 71 10", &mut ctx)));
        assert!(is_error(cmd_cc("1 74 200", &mut ctx)));
        assert_eq!(ctx.pattern.step_cc(1).unwrap().len(), 2);

        assert!(!is_error(cmd_cc_clear("1 74", &mut ctx)));
        assert_eq!(ctx.pattern.step_cc(1).unwrap().len(), 1);
        assert!(!is_error(cmd_cc_clear("1 all", &mut ctx)));
        assert!(ctx.pattern.step_cc(1).unwrap().is_empty());
        assert!(is_error(cmd_cc_clear("1 cutoff", &mut ctx)));
    }

    #[test]
    fn test_global_cc_commands() {
        let (mut ctx, _) = context();
        cmd_note("1 C3", &mut ctx);
        assert!(is_error(cmd_global_apply("74", &mut ctx)));

        assert!(!is_error(cmd_global_cc("74 99", &mut ctx)));
        assert!(!is_error(cmd_global_apply("74", &mut ctx)));
        assert_eq!(ctx.pattern.step_cc(1).unwrap()[&74], 99);
        assert!(ctx.pattern.step_cc(2).unwrap().is_empty());

        assert!(!is_error(cmd_global_clear("", &mut ctx)));
        assert!(ctx.pattern.global_cc().is_empty());
    }

    #[test]
    fn test_clear_and_show() {
        let (mut ctx, _) = context();
        cmd_note("1 C3 3", &mut ctx);
        cmd_cc("2 74 1", &mut ctx);

        let shown = render(&ctx.pattern.snapshot(), None);
        assert_eq!(shown.lines().count(), 17);
        assert!(shown.contains("C3 v100 g90% x3"));
        assert!(shown.contains("~ cc74=1"));

        cmd_clear("", &mut ctx);
        assert!(ctx.pattern.steps().iter().all(|s| s.is_rest() && !s.has_cc()));
    }
}
