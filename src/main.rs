//! mcpchat CLI entry point

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use mcpchat::adapters::cli::CliChannel;
use mcpchat::adapters::http::ChatServer;
use mcpchat::adapters::{Channel, ChannelRegistry};
use mcpchat::agent::{LlmClient, OpenAiClient};
use mcpchat::config::{self, Config};
use mcpchat::mcp::{McpClient, McpServer};
use mcpchat::tools::ToolHost;
use mcpchat::ui;

#[derive(Parser)]
#[command(name = "mcpchat")]
#[command(about = "Tool-augmented chat over an OpenAI-compatible API and MCP tool hosts")]
#[command(version)]
struct Cli {
    /// Path to a JSON config file (default: ~/.mcpchat/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat server
    Serve {
        /// Listen address host
        #[arg(long)]
        host: Option<String>,

        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Start the MCP tool host (weather, add, multiply)
    ToolHost {
        /// Listen address host
        #[arg(long)]
        host: Option<String>,

        /// Listen port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Ask a question from the terminal
    Ask {
        /// Message to send; omit for interactive mode
        message: Option<String>,

        /// Print only the final answer
        #[arg(short, long)]
        quiet: bool,
    },

    /// Show configuration and reachability
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            let server = ChatServer::from_config(config.clone());
            let addr = listen_addr(host.unwrap_or_else(|| config.server.host.clone()), port.unwrap_or(config.server.port))?;
            ui::print_header(&config.model, &config.openai_base_url);
            ui::print_step(&format!("Chat server on http://{}", addr));
            match config.mcp_server_url {
                Some(ref url) => ui::print_step(&format!("Tool host: {}", url)),
                None => ui::print_warning("MCP_SERVER_URL not set; answering without tools"),
            }
            server.serve(addr).await?;
        }

        Commands::ToolHost { host, port } => {
            let tool_host = &config.tool_host;
            let addr = listen_addr(host.unwrap_or_else(|| tool_host.host.clone()), port.unwrap_or(tool_host.port))?;
            let server = McpServer::from_config(tool_host)?;
            ui::print_step(&format!("Tool host on http://{}/mcp ({})", addr, server.tool_names().join(", ")));
            server.serve(addr).await?;
        }

        Commands::Ask { message, quiet } => {
            let client = llm_client(&config)?;
            let model = client.default_model().to_string();
            let channel = CliChannel::new(client, config.clone());

            match message {
                Some(msg) if quiet => {
                    let response = channel.run_once(&msg).await;
                    println!("{}", response.content);
                }
                Some(msg) => {
                    channel.run_streaming(&msg).await;
                }
                None => {
                    ui::print_header(&model, &config.openai_base_url);
                    println!("Interactive mode (type 'exit' to quit)");
                    channel.start().await?;
                }
            }
        }

        Commands::Status => {
            print_status(&config).await;
        }
    }

    Ok(())
}

fn listen_addr(host: String, port: u16) -> Result<SocketAddr> {
    format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("invalid listen address {}:{}", host, port))
}

fn llm_client(config: &Config) -> Result<Arc<dyn LlmClient>> {
    if !config.has_api_key() {
        anyhow::bail!("OPENAI_API_KEY is not set (environment, .env or config file)");
    }
    Ok(Arc::new(OpenAiClient::new(
        &config.openai_api_key,
        &config.openai_base_url,
        &config.model,
    )))
}

async fn print_status(config: &Config) {
    println!("mcpchat status\n");
    println!("Config: {:?}", config::config_path());
    println!("Model: {}", config.model);
    println!("API base: {}", config.openai_base_url);
    println!("API key: {}", if config.has_api_key() { "✓" } else { "not set" });
    println!("Schemas: {:?}", config.schemas_path);
    println!("AMap key: {}", if config.tool_host.amap_key.is_empty() { "not set" } else { "✓" });

    println!("\nChannels:");
    for name in ChannelRegistry::available() {
        let mark = if ChannelRegistry::is_enabled(name, config) { "✓" } else { "✗" };
        println!("  {} {:<5} {}", mark, name, ChannelRegistry::description(name));
    }

    println!();
    let Some(ref url) = config.mcp_server_url else {
        ui::print_warning("MCP_SERVER_URL not set");
        return;
    };

    match McpClient::connect(url, reqwest::Client::new()).await {
        Ok(client) => {
            match client.list_tools().await {
                Ok(tools) => {
                    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
                    ui::print_success(&format!("Tool host {} offers: {}", url, names.join(", ")));
                }
                Err(e) => ui::print_warning(&format!("Tool host {} connected but listing failed: {}", url, e)),
            }
            client.close().await;
        }
        Err(e) => ui::print_error(&format!("Tool host {} unreachable: {}", url, e)),
    }
}
