//! Toolpipe CLI - chat with an LLM that can call the tools of an MCP server
//!
//! Spawns the server script, connects to it and then answers queries typed
//! at the `Query:` prompt until `quit` or end of input.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use console::style;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use toolpipe_core::config::ConfigManager;
use toolpipe_core::{Config, OpenAiClient, ServerLaunch, ToolSession};

const PROMPT: &str = "Query: ";

#[derive(Parser, Debug)]
#[command(name = "toolpipe")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Chat with an LLM that can call the tools of an MCP server", long_about = None)]
struct Cli {
    /// Path to the MCP server script (.py or .js)
    server_script: Option<PathBuf>,

    /// Extra arguments passed through to the server script
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    extra_args: Vec<String>,

    /// Model to use (overrides LLM_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// Base URL of the OpenAI-compatible API (overrides LLM_BASE_URL)
    #[arg(long)]
    base_url: Option<String>,

    /// Maximum tokens per completion (overrides MAX_TOKENS)
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Config file (defaults to the user config directory)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("{}", style(format!("Warning: could not load .env: {}", e)).yellow());
        }
    }

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let Some(script) = cli.server_script.clone() else {
        eprintln!("{}", Cli::command().render_usage());
        return ExitCode::from(1);
    };

    match run(&cli, script).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style(format!("Error: {:#}", e)).red());
            ExitCode::from(1)
        }
    }
}

// Keep logs on stderr and quiet by default so they do not interleave with the prompt.
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "info,toolpipe_core=debug,toolpipe_mcp=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Defaults, config file, environment, then command line flags
fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path.clone())?,
        None => ConfigManager::new()?,
    };
    debug!("Using config file {}", manager.config_path().display());

    let mut config = manager.into_config()?;
    apply_flags(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_flags(config: &mut Config, cli: &Cli) {
    if let Some(model) = &cli.model {
        config.model = model.clone();
    }
    if let Some(url) = &cli.base_url {
        config.base_url = Some(url.clone());
    }
    if let Some(max_tokens) = cli.max_tokens {
        config.max_tokens = max_tokens;
    }
}

async fn run(cli: &Cli, script: PathBuf) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let llm = OpenAiClient::from_config(&config)?;
    let launch = ServerLaunch::from_script(&script, &cli.extra_args, &config)?;

    let mut session = ToolSession::open(&launch, &config, Box::new(llm))
        .await
        .with_context(|| format!("Failed to connect to {}", script.display()))?;

    println!("\nConnected to server with tools: {:?}", session.tool_names());

    let result = chat_loop(&mut session).await;
    let closed = session.close().await;

    result?;
    closed?;
    Ok(())
}

async fn chat_loop(session: &mut ToolSession) -> anyhow::Result<()> {
    let mut editor = DefaultEditor::new().context("Failed to initialize line editor")?;

    println!("\n{}", style("MCP Client Started!").bold());
    println!("Type your queries or 'quit' to exit.");

    loop {
        println!();
        let line = match tokio::task::block_in_place(|| editor.readline(PROMPT)) {
            Ok(line) => line,
            // Ctrl-C at the prompt just clears the line
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        };

        let query = line.trim();
        if query.is_empty() {
            continue;
        }
        if is_quit(query) {
            break;
        }
        if let Err(e) = editor.add_history_entry(query) {
            debug!("Failed to record history: {}", e);
        }

        tokio::select! {
            result = session.process_query(query) => match result {
                Ok(answer) => println!("\n{}", answer),
                Err(e) => println!("\n{}", style(format!("Error: {}", e)).red()),
            },
            _ = tokio::signal::ctrl_c() => {
                println!("\n{}", style("Query cancelled").yellow());
            }
        }

        if !session.is_connected() {
            println!("{}", style("Tool server disconnected; ending session.").red());
            break;
        }
    }

    Ok(())
}

fn is_quit(input: &str) -> bool {
    input.eq_ignore_ascii_case("quit")
}
