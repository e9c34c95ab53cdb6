//! REPL (Read-Eval-Print Loop) for editing and playing a pattern

use crate::commands::file::load_into;
use crate::commands::{create_registry, CommandContext, CommandRegistry, CommandResult};
use crate::repl::watcher::FileWatcher;
use anyhow::{Context, Result};
use colored::*;
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::{debug, warn};
use notify::{Event, EventKind};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::path::PathBuf;
use std::thread;

pub mod watcher;

/// Types of events the REPL loop handles
enum ReplEvent {
    Input(Result<String, ReadlineError>),
}

/// What the main loop should do after handling an event
#[derive(Debug, PartialEq)]
enum Flow {
    Continue,
    Exit,
}

/// Interactive REPL over one pending pattern
pub struct Repl {
    editor: Option<DefaultEditor>,
    registry: CommandRegistry,
    ctx: CommandContext,

    // Event channels
    tx_input: Sender<ReplEvent>,
    rx_input: Receiver<ReplEvent>,
    tx_watcher: Sender<notify::Result<Event>>,
    rx_watcher: Receiver<notify::Result<Event>>,

    // File watcher
    watcher: Option<FileWatcher>,
}

impl Repl {
    /// Create a new REPL instance
    pub fn new(ctx: CommandContext) -> Result<Self> {
        let editor = DefaultEditor::new().context("failed to initialize line editor")?;
        let (tx_input, rx_input) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();

        Ok(Repl {
            editor: Some(editor),
            registry: create_registry(),
            ctx,
            tx_input,
            rx_input,
            tx_watcher,
            rx_watcher,
            watcher: None,
        })
    }

    /// Start the REPL loop
    pub fn run(&mut self) -> Result<()> {
        println!(
            "{} {}",
            "🎹".bright_yellow(),
            "loopseq step sequencer".bright_cyan().bold()
        );
        println!(
            "Try: {}, {}, {}",
            "note 1 C3".cyan(),
            "tempo 100".cyan(),
            "play".cyan()
        );
        println!(
            "Type '{}' for more information, '{}' or {} to exit.\n",
            "help".bright_green(),
            "quit".bright_red(),
            "Ctrl+C".bright_red()
        );

        // Move editor to thread
        let mut editor = self.editor.take().context("REPL is already running")?;
        let tx_input = self.tx_input.clone();

        thread::Builder::new()
            .name("loopseq-input".into())
            .spawn(move || loop {
                let prompt = format!("{} ", "loopseq>".bright_magenta().bold());
                match editor.readline(&prompt) {
                    Ok(line) => {
                        let line = line.trim().to_string();
                        if !line.is_empty() {
                            let _ = editor.add_history_entry(&line);
                        }
                        if tx_input.send(ReplEvent::Input(Ok(line))).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        let _ = tx_input.send(ReplEvent::Input(Err(err)));
                        break;
                    }
                }
            })
            .context("failed to spawn input thread")?;

        // Local handles so the loop body can borrow `self` mutably
        let rx_input = self.rx_input.clone();
        let rx_watcher = self.rx_watcher.clone();

        loop {
            let flow = crossbeam_channel::select! {
                recv(rx_input) -> msg => match msg {
                    Ok(ReplEvent::Input(Ok(line))) => self.handle_line(&line),
                    Ok(ReplEvent::Input(Err(ReadlineError::Interrupted)))
                    | Ok(ReplEvent::Input(Err(ReadlineError::Eof))) => Flow::Exit,
                    Ok(ReplEvent::Input(Err(err))) => {
                        println!(
                            "{} {}",
                            "Error reading input:".bright_red().bold(),
                            err.to_string().red()
                        );
                        Flow::Exit
                    }
                    Err(_) => Flow::Exit, // Channel closed
                },

                recv(rx_watcher) -> msg => match msg {
                    Ok(Ok(event)) => {
                        self.handle_file_event(event);
                        Flow::Continue
                    }
                    Ok(Err(e)) => {
                        println!("{} Watch error: {}", "Error:".red(), e);
                        Flow::Continue
                    }
                    Err(_) => Flow::Exit,
                }
            };

            if flow == Flow::Exit {
                break;
            }
        }

        println!("{} 🎵", "Goodbye!".bright_cyan());
        self.ctx.engine.stop();
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Flow {
        if line.is_empty() {
            return Flow::Continue;
        }

        match self.registry.execute(line, &mut self.ctx) {
            CommandResult::Success => {}
            CommandResult::Message(msg) => println!("{}", msg),
            CommandResult::Exit => return Flow::Exit,
            CommandResult::Error(e) => {
                println!("{} {}", "Error:".bright_red().bold(), e.red());
            }
            CommandResult::Watch(path) => self.watch(PathBuf::from(path)),
            CommandResult::NotACommand => {
                println!(
                    "{} Unknown command '{}'. Type '{}' for a list.",
                    "Error:".bright_red().bold(),
                    line.red(),
                    "help".bright_green()
                );
            }
        }
        Flow::Continue
    }

    /// Load `path` now, then reload it on every change
    fn watch(&mut self, path: PathBuf) {
        match load_into(&self.ctx, &path) {
            Ok(msg) => println!("{}", msg),
            Err(e) => println!("{} {}", "Error:".red(), e),
        }

        // Initialize watcher if needed
        if self.watcher.is_none() {
            match FileWatcher::new(self.tx_watcher.clone()) {
                Ok(w) => self.watcher = Some(w),
                Err(e) => {
                    println!("{} Failed to create watcher: {}", "Error:".red(), e);
                    return;
                }
            }
        }

        if let Some(w) = &mut self.watcher {
            match w.watch(&path) {
                Ok(()) => {
                    println!(
                        "{} Watching {} for changes...",
                        "👀".bright_cyan(),
                        path.display().to_string().bright_green()
                    );
                }
                Err(e) => println!(
                    "{} Failed to watch {}: {}",
                    "Error:".red(),
                    path.display(),
                    e
                ),
            }
        }
    }

    /// Reload the pending pattern from a changed file.
    ///
    /// A file caught mid-write fails to parse and is skipped; the next
    /// modify event picks up the finished contents.
    fn handle_file_event(&mut self, event: Event) {
        if !matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) {
            debug!("Ignoring file event {:?}", event.kind);
            return;
        }

        for path in event.paths {
            println!(
                "{} File changed: {}",
                "⚡".bright_yellow(),
                path.display()
            );
            match load_into(&self.ctx, &path) {
                Ok(msg) => println!("{} {}", "✓".bright_green(), msg),
                Err(e) => {
                    warn!("Reload of {} failed: {}", path.display(), e);
                    println!("{} {}", "Error:".red(), e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::context;
    use loopseq_core::persistence;
    use loopseq_core::Pattern;
    use notify::event::{CreateKind, ModifyKind, RemoveKind};

    fn repl() -> Repl {
        let (ctx, _) = context();
        let (tx_input, rx_input) = unbounded();
        let (tx_watcher, rx_watcher) = unbounded();
        // No line editor: these tests never call run()
        Repl {
            editor: None,
            registry: create_registry(),
            ctx,
            tx_input,
            rx_input,
            tx_watcher,
            rx_watcher,
            watcher: None,
        }
    }

    #[test]
    fn test_lines_dispatch_to_commands() {
        let mut repl = repl();
        assert_eq!(repl.handle_line(""), Flow::Continue);
        assert_eq!(repl.handle_line("note 2 A2"), Flow::Continue);
        assert_eq!(repl.handle_line("wobble"), Flow::Continue);
        assert!(!repl.ctx.pattern.step(2).unwrap().is_rest());
        assert_eq!(repl.handle_line("quit"), Flow::Exit);
    }

    #[test]
    fn test_file_event_reloads_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.json");
        let source = Pattern::new(8);
        source.set_note(5, "G2".parse().unwrap()).unwrap();
        persistence::save(&source, &path).unwrap();

        let mut repl = repl();
        repl.handle_file_event(
            Event::new(EventKind::Remove(RemoveKind::File)).add_path(path.clone()),
        );
        assert_eq!(repl.ctx.pattern.len(), 16);

        repl.handle_file_event(
            Event::new(EventKind::Modify(ModifyKind::Any)).add_path(path.clone()),
        );
        assert_eq!(repl.ctx.pattern.snapshot(), source.snapshot());

        // A broken write leaves the loaded pattern alone
        std::fs::write(&path, "{ \"tempo\": ").unwrap();
        repl.handle_file_event(Event::new(EventKind::Create(CreateKind::File)).add_path(path));
        assert_eq!(repl.ctx.pattern.snapshot(), source.snapshot());
    }
}
