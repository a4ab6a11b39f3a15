//! Terminal rendering of an agent run.
//!
//! [`Renderer`] decouples the stream of [`StreamItem`]s from the display;
//! [`StdoutRenderer`] prints tokens as they arrive and a one-line summary
//! per resolved tool call.

use colored::Colorize;
use futures::StreamExt;
use std::io::{self, Write};

use toolstream::agent::Agent;
use toolstream::error::TurnError;
use toolstream::message::{Message, StreamItem, ToolInvocation};

/// Longest tool-response preview shown inline.
const PREVIEW_CHARS: usize = 120;

pub trait Renderer {
    /// Render a single token as it arrives.
    fn render_token(&mut self, token: &str);

    /// Render a tool call once its response is recorded.
    fn render_tool_call(&mut self, call: &ToolInvocation);

    /// Called when the run is complete.
    fn render_done(&mut self);

    /// Called when an error aborts the run.
    fn render_error(&mut self, err: &str);
}

/// Renders streaming LLM output directly to stdout.
///
/// Each token is printed immediately with an explicit flush so the user
/// sees a "typing" effect.
#[derive(Default)]
pub struct StdoutRenderer {
    token_count: usize,
    tool_calls: usize,
    /// Whether the cursor sits mid-line after streamed text.
    mid_line: bool,
}

impl StdoutRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    fn end_line(&mut self) {
        if self.mid_line {
            println!();
            self.mid_line = false;
        }
    }
}

impl Renderer for StdoutRenderer {
    fn render_token(&mut self, token: &str) {
        print!("{}", token);
        // Flush immediately so each token appears as it arrives
        io::stdout().flush().ok();
        self.token_count += 1;
        self.mid_line = !token.ends_with('\n');
    }

    fn render_tool_call(&mut self, call: &ToolInvocation) {
        self.end_line();
        self.tool_calls += 1;
        let args = serde_json::Value::Object(call.args.clone()).to_string();
        println!("{} {}{}", "⚙".yellow(), call.name.bold(), format!("({})", args).dimmed());
        let response = call.response().unwrap_or_default();
        let is_error = response.starts_with("Error:");
        let preview = preview(response);
        if is_error {
            println!("  {} {}", "↳".red(), preview.red());
        } else {
            println!("  {} {}", "↳".dimmed(), preview.dimmed());
        }
    }

    fn render_done(&mut self) {
        self.end_line();
        println!();
        println!(
            "{}",
            format!("[{} tokens, {} tool calls]", self.token_count, self.tool_calls).dimmed()
        );
    }

    fn render_error(&mut self, err: &str) {
        self.end_line();
        eprintln!("{} {}", "error:".red().bold(), err);
    }
}

/// First line of a tool response, shortened for display.
fn preview(response: &str) -> String {
    let first = response.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
    let mut out: String = first.chars().take(PREVIEW_CHARS).collect();
    let more_lines = response.lines().filter(|l| !l.trim().is_empty()).count() > 1;
    if first.chars().count() > PREVIEW_CHARS || more_lines {
        out.push_str(" …");
    }
    out
}

/// Drives one [`Agent::run`] to completion, rendering as it goes.
pub async fn render_run(
    agent: &Agent,
    history: &mut Vec<Message>,
    renderer: &mut dyn Renderer,
) -> Result<(), TurnError> {
    let mut stream = agent.run(history);
    while let Some(item) = stream.next().await {
        match item {
            Ok(StreamItem::Token(token)) => renderer.render_token(&token),
            Ok(StreamItem::Invocation(call)) => renderer.render_tool_call(&call),
            Err(e) => {
                renderer.render_error(&e.to_string());
                return Err(e);
            }
        }
    }
    renderer.render_done();
    Ok(())
}
