//! Terminal front end for agentloop.
//!
//! ```bash
//! agentloop                      # interactive chat
//! agentloop run script.rhai      # run a script in the sandbox
//! agentloop tools                # list the built-in tools
//! ```

use agentloop::config::{self, AgentLoopConfig};
use agentloop::llm::OpenAIClient;
use agentloop::logging;
use agentloop::orchestrator::{AgentEvent, AgentState, Orchestrator, OrchestratorHandle};
use agentloop::tools::builtins;
use agentloop::tools::sandbox::ScriptSandbox;
use agentloop::tools::ToolRegistry;
use anyhow::Context;
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use reedline::{DefaultPrompt, DefaultPromptSegment, Reedline, Signal};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use termimad::MadSkin;
use tokio::runtime::Runtime;
use tokio::sync::broadcast;

#[derive(Debug, Parser)]
#[command(name = "agentloop", version, about = "A tool-using chat agent")]
struct Cli {
    /// Config file; defaults to ./agentloop.toml, then ~/.config/agentloop/config.toml
    #[arg(long, short, env = "AGENTLOOP_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Chat with the agent (default)
    Chat,
    /// Run a script file in the sandbox and print the outcome as JSON
    Run {
        /// Script to run
        file: PathBuf,
    },
    /// Print the built-in tool catalogue with argument schemas as JSON
    Tools,
}

const HELP: &str = "\
/tools  list the available tools
/stats  show how often each tool ran
/help   show this help
/quit   leave (Ctrl-D works too)";

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => config::from_path(path)?,
        None => config::load()?,
    };

    if let Err(e) = logging::init_and_store_logging(&config.logging) {
        eprintln!("warning: file logging disabled: {e}");
    }
    tracing::info!(command = ?cli.command, "agentloop starting");

    let runtime = Runtime::new().context("failed to start the async runtime")?;

    match cli.command.unwrap_or(Command::Chat) {
        Command::Chat => chat(&runtime, &config),
        Command::Run { file } => runtime.block_on(run_file(&config, &file)),
        Command::Tools => {
            let registry = builtins::standard_registry(&config)?;
            let catalogue: Vec<_> = registry.list().iter().map(|d| d.to_json()).collect();
            println!("{}", serde_json::to_string_pretty(&catalogue)?);
            Ok(())
        }
    }
}

fn chat(runtime: &Runtime, config: &AgentLoopConfig) -> anyhow::Result<()> {
    let model = OpenAIClient::new(&config.model.to_provider_config())?;
    let registry = Arc::new(builtins::standard_registry(config)?);
    let handle = OrchestratorHandle::new(Orchestrator::with_registry(
        Arc::new(model),
        Arc::clone(&registry),
        config.agent.clone(),
    ));

    let skin = make_skin();
    let mut editor = Reedline::create();
    let prompt = DefaultPrompt::new(
        DefaultPromptSegment::Basic("agentloop".to_string()),
        DefaultPromptSegment::Empty,
    );

    println!(
        "agentloop {} · model {} · {} tools · /help for commands",
        env!("CARGO_PKG_VERSION"),
        config.model.model,
        registry.len()
    );

    loop {
        let line = match editor.read_line(&prompt) {
            Ok(Signal::Success(line)) => line,
            Ok(Signal::CtrlC) => continue,
            Ok(_) => break,
            Err(e) => return Err(e).context("failed to read input"),
        };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{HELP}"),
            "/tools" => print_tools(&registry),
            "/stats" => {
                for (tool, count) in handle.usage() {
                    println!("{tool:<20} {count}");
                }
            }
            input => {
                let spinner = spinner()?;
                let watcher = runtime.spawn(follow_events(handle.subscribe(), spinner.clone()));

                let result = runtime.block_on(handle.submit_user_input(input));

                watcher.abort();
                spinner.finish_and_clear();

                match result {
                    Ok(outcome) => match outcome.reply {
                        Some(reply) => skin.print_text(&reply),
                        None => println!("(no reply)"),
                    },
                    Err(e) => eprintln!("error: {e}"),
                }
            }
        }
    }

    tracing::info!(messages = handle.view().len(), "chat ended");
    Ok(())
}

/// Keeps the spinner message in step with what the turn is doing.
async fn follow_events(mut events: broadcast::Receiver<AgentEvent>, spinner: ProgressBar) {
    loop {
        match events.recv().await {
            Ok(AgentEvent::StateChanged {
                to: AgentState::AwaitingModel,
                ..
            }) => spinner.set_message("thinking"),
            Ok(AgentEvent::ToolUsageChanged { tool, count }) => {
                spinner.set_message(format!("running {tool} (call #{count})"));
            }
            Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

fn spinner() -> anyhow::Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}")?);
    spinner.set_message("thinking");
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn make_skin() -> MadSkin {
    let mut skin = MadSkin::default();
    skin.set_headers_fg(termimad::crossterm::style::Color::Yellow);
    skin.inline_code
        .set_fg(termimad::crossterm::style::Color::Green);
    skin.code_block
        .set_fg(termimad::crossterm::style::Color::Green);
    skin.code_block.left_margin = 2;
    skin
}

fn print_tools(registry: &ToolRegistry) {
    for definition in registry.list() {
        println!("{} [{}]", definition.name, definition.capability);
        println!("    {}", definition.description);
        for field in definition.schema.fields() {
            let required = if field.required { "required" } else { "optional" };
            println!(
                "    - {}: {} ({}) {}",
                field.name, field.field_type, required, field.description
            );
        }
    }
}

async fn run_file(config: &AgentLoopConfig, file: &Path) -> anyhow::Result<()> {
    let source = std::fs::read_to_string(file)
        .with_context(|| format!("failed to read '{}'", file.display()))?;

    let outcome = ScriptSandbox::new(config.sandbox.clone()).run(&source).await;
    println!("{}", serde_json::to_string_pretty(&outcome)?);

    match outcome.failure {
        Some(failure) => anyhow::bail!("script failed ({}): {}", failure.kind, failure.reason),
        None => Ok(()),
    }
}
