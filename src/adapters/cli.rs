//! CLI adapter - interactive and single-message command line interface.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::{AgentLoop, LlmClient, LoopState, Response, Session};
use crate::config::Config;
use crate::ui;
use crate::Result;

use super::Channel;

/// CLI channel. Each message is its own conversation; nothing is remembered
/// between turns.
pub struct CliChannel {
    agent: AgentLoop<dyn LlmClient>,
    config: Config,
    http: reqwest::Client,
}

impl CliChannel {
    /// Create a new CLI channel.
    pub fn new(llm: Arc<dyn LlmClient>, config: Config) -> Self {
        Self {
            agent: AgentLoop::new(llm, config.persona.clone(), config.budget),
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Run a single message and return the response.
    pub async fn run_once(&self, message: &str) -> Response {
        let mut session = Session::open(&self.config, &self.http).await;
        let response = self.agent.run(message, &mut session).await;
        session.close().await;
        response
    }

    /// Run a single message, rendering progress as it happens.
    pub async fn run_streaming(&self, message: &str) -> Vec<LoopState> {
        let mut session = Session::open(&self.config, &self.http).await;
        let (tx, mut rx) = mpsc::channel(32);

        let run = async {
            let states = self.agent.run_streaming(message, &mut session, &tx).await;
            drop(tx);
            states
        };
        let render = async {
            while let Some(event) = rx.recv().await {
                ui::render_event(&event);
            }
        };

        let (states, ()) = tokio::join!(run, render);
        session.close().await;
        states
    }

    /// Run interactive REPL loop.
    pub async fn run_interactive(&self) -> Result<()> {
        let stdin = io::stdin();
        let mut stdout = io::stdout();

        loop {
            // Print prompt
            print!("\n> ");
            stdout.flush()?;

            // Read input
            let mut line = String::new();
            if stdin.lock().read_line(&mut line)? == 0 {
                // EOF
                break;
            }

            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            // Check for exit commands
            if matches!(input.to_lowercase().as_str(), "exit" | "quit" | "q") {
                println!("Goodbye! 👋");
                break;
            }

            self.run_streaming(input).await;
        }

        Ok(())
    }
}

impl Channel for CliChannel {
    fn name(&self) -> &str {
        "cli"
    }

    async fn start(&self) -> Result<()> {
        self.run_interactive().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::llm::FakeLlmClient;

    #[tokio::test]
    async fn test_run_once_without_tool_host() {
        let channel = CliChannel::new(Arc::new(FakeLlmClient::new(vec!["Hi!"])), Config::default());
        let response = channel.run_once("hello").await;

        assert_eq!(response.content, "Hi!");
        assert_eq!(response.states.last(), Some(&LoopState::End));
    }

    #[tokio::test]
    async fn test_run_streaming_reaches_end() {
        let channel = CliChannel::new(Arc::new(FakeLlmClient::new(vec!["Hi there"])), Config::default());
        let states = channel.run_streaming("hello").await;

        assert_eq!(states.last(), Some(&LoopState::End));
        assert_eq!(channel.name(), "cli");
    }
}
