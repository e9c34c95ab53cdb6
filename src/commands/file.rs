//! Pattern file commands (save, load)

use crate::commands::{CommandContext, CommandResult};
use colored::*;
use log::info;
use loopseq_core::persistence;
use std::path::Path;

/// Handle `save <file>`
pub fn cmd_save(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: save <file>".to_string());
    }

    match persistence::save(&ctx.pattern, args) {
        Ok(()) => {
            info!("Saved pattern to {}", args);
            CommandResult::Message(format!("💾 Saved pattern to {}", args.cyan()))
        }
        Err(e) => CommandResult::Error(format!("Failed to save: {}", e)),
    }
}

/// Handle `load <file>`
pub fn cmd_load(args: &str, ctx: &mut CommandContext) -> CommandResult {
    if args.is_empty() {
        return CommandResult::Error("Usage: load <file>".to_string());
    }

    match load_into(ctx, Path::new(args)) {
        Ok(message) => CommandResult::Message(message),
        Err(e) => CommandResult::Error(e),
    }
}

/// Replace the pending pattern with the contents of `path`.
///
/// Shared with the file watcher. Global CC values survive the load; on
/// failure the pending pattern is untouched.
pub fn load_into(ctx: &CommandContext, path: &Path) -> Result<String, String> {
    let loaded = persistence::load(path).map_err(|e| format!("Failed to load: {}", e))?;
    ctx.pattern.install_loaded(&loaded);
    info!("Loaded pattern from {}", path.display());

    let mut message = format!(
        "📂 Loaded {} ({} steps @ {} BPM)",
        path.display().to_string().cyan(),
        loaded.len(),
        loaded.tempo()
    );
    if ctx.engine.is_running() {
        message.push_str(&" - plays from the next loop".dimmed().to_string());
    }
    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use std::fs;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("groove.json");
        let path_arg = path.to_str().unwrap();

        let (mut ctx, _) = context();
        ctx.pattern.set_note(1, "C3".parse().unwrap()).unwrap();
        ctx.pattern.set_tempo(95).unwrap();
        assert!(matches!(cmd_save(path_arg, &mut ctx), CommandResult::Message(_)));

        let (mut other, _) = context();
        assert!(matches!(cmd_load(path_arg, &mut other), CommandResult::Message(_)));
        assert_eq!(other.pattern.snapshot(), ctx.pattern.snapshot());
    }

    #[test]
    fn test_failed_load_keeps_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let (mut ctx, _) = context();
        ctx.pattern.set_note(2, "E3".parse().unwrap()).unwrap();
        let before = ctx.pattern.snapshot();

        assert!(matches!(
            cmd_load(path.to_str().unwrap(), &mut ctx),
            CommandResult::Error(_)
        ));
        assert!(matches!(
            cmd_load("/no/such/file.json", &mut ctx),
            CommandResult::Error(_)
        ));
        assert_eq!(ctx.pattern.snapshot(), before);
    }

    #[test]
    fn test_load_and_reload_keep_global_cc() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.json");
        let source = loopseq_core::Pattern::new(8);
        source.set_note(4, "A2".parse().unwrap()).unwrap();
        persistence::save(&source, &path).unwrap();

        let (mut ctx, _) = context();
        ctx.pattern.set_global_cc(74, 90).unwrap();
        assert!(matches!(
            cmd_load(path.to_str().unwrap(), &mut ctx),
            CommandResult::Message(_)
        ));
        assert_eq!(ctx.pattern.len(), 8);
        assert_eq!(ctx.pattern.global_cc().get(&74), Some(&90));

        // The watcher path goes through the same install
        source.set_tempo(140).unwrap();
        persistence::save(&source, &path).unwrap();
        load_into(&ctx, &path).unwrap();
        assert_eq!(ctx.pattern.tempo(), 140);
        assert_eq!(ctx.pattern.global_cc().get(&74), Some(&90));
    }

    #[test]
    fn test_usage_errors() {
        let (mut ctx, _) = context();
        assert!(matches!(cmd_save("", &mut ctx), CommandResult::Error(_)));
        assert!(matches!(cmd_load("", &mut ctx), CommandResult::Error(_)));
    }
}
