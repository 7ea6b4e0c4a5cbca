use std::io::Write;

use colored::*;
use terminal_size::{Width, Height, terminal_size};

use crate::agent::ChatEvent;

const MAX_RESULT_PREVIEW: usize = 120;

pub fn print_header(model: &str, endpoint: &str) {
    let (width, _) = terminal_size().unwrap_or((Width(80), Height(24)));
    let width = width.0 as usize;

    let line = "─".repeat(width);
    println!("{}", line.black().bold());

    let name = "mcpchat".cyan().bold();
    let version = format!("v{}", env!("CARGO_PKG_VERSION")).black().bold();
    println!("  {} {}", name, version);

    let info = format!("  {}  •  {}", model, endpoint).cyan();
    println!("{}", info);

    println!("{}", line.black().bold());
}

pub fn print_step(msg: &str) {
    println!("  {} {}", "•".green(), msg);
}

pub fn print_success(msg: &str) {
    println!("  {} {}", "✓".green().bold(), msg.green());
}

pub fn print_warning(msg: &str) {
    println!("  {} {}", "⚠️ ".yellow().bold(), msg.yellow());
}

pub fn print_error(msg: &str) {
    println!("  {} {}", "❌".red().bold(), msg.red());
}

pub fn print_thinking(msg: &str) {
    println!("  {} {}...", "∴".magenta(), msg);
}

/// Shorten a tool result for display.
pub fn preview(text: &str) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= MAX_RESULT_PREVIEW {
        return flat;
    }
    let cut: String = flat.chars().take(MAX_RESULT_PREVIEW).collect();
    format!("{}…", cut)
}

/// Render a progress event on the terminal.
pub fn render_event(event: &ChatEvent) {
    match event {
        ChatEvent::Start { .. } => {}
        ChatEvent::ToolCalls { tools } => {
            let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
            print_step(&format!("Model requested: {}", names.join(", ")));
        }
        ChatEvent::ToolExecuting { tool_name, .. } => print_step(&format!("Running {}", tool_name)),
        ChatEvent::ToolResult { tool_name, result } => {
            print_success(&format!("{}: {}", tool_name, preview(result)))
        }
        ChatEvent::ToolError { tool_name, error } => print_warning(&format!("{}: {}", tool_name, error)),
        ChatEvent::Generating { .. } => {
            print_thinking("Thinking");
            println!();
        }
        ChatEvent::Content { content } => {
            print!("{}", content);
            let _ = std::io::stdout().flush();
        }
        ChatEvent::End { .. } => println!(),
        ChatEvent::Error { error } => print_error(error),
    }
}
