//! Interactive chat REPL for toolstream.
//!
//! Provides a multi-turn conversation loop using [`rustyline`] for readline
//! support (history, line editing). The whole conversation, tool calls
//! included, is sent with each request.

use anyhow::Result;
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::output::{self, StdoutRenderer};
use toolstream::agent::Agent;
use toolstream::config::Config;
use toolstream::message::Message;

/// Runs the interactive chat REPL.
///
/// # Readline behavior
///
/// - **Ctrl+C**: cancels current input, stays in REPL
/// - **Ctrl+D**, `exit` or `quit`: exits cleanly with "goodbye."
/// - Readline history is persisted to `~/.cache/toolstream/chat_history.txt`
///
/// A turn that fails rolls the history back to before the user's line so
/// the user can retry.
pub async fn run_chat(agent: &Agent, system_prompt: &str) -> Result<()> {
    println!(
        "{} [provider: {}] [model: {}] (Ctrl+D to exit)",
        "toolstream chat".bold().cyan(),
        agent.provider().name().yellow(),
        agent.provider().model().yellow(),
    );
    println!();

    let mut history = vec![Message::system(system_prompt)];

    let mut rl = DefaultEditor::new()?;
    let history_path = Config::cache_dir()?.join(toolstream::constants::HISTORY_FILENAME);
    if history_path.exists() {
        let _ = rl.load_history(&history_path);
    }

    loop {
        let readline = rl.readline(&format!("{} ", ">".green().bold()));

        match readline {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                if line == "exit" || line == "quit" {
                    println!("{}", "goodbye.".dimmed());
                    break;
                }

                let _ = rl.add_history_entry(&line);

                let checkpoint = history.len();
                history.push(Message::user(&line));
                println!();

                let mut renderer = StdoutRenderer::new();
                if output::render_run(agent, &mut history, &mut renderer)
                    .await
                    .is_err()
                {
                    // Error already rendered; drop the failed exchange.
                    history.truncate(checkpoint);
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", "^C".dimmed());
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("{}", "goodbye.".dimmed());
                break;
            }
            Err(e) => {
                eprintln!("{} {}", "error:".red().bold(), e);
                break;
            }
        }
    }

    if let Some(parent) = history_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let _ = rl.save_history(&history_path);

    Ok(())
}
