//! Canopy - terminal front end for the Canopy coding assistant
//!
//! Holds the current workspace tree and conversation, forwards each request
//! to the agent loop, and persists the returned state after every request.

mod state;

use anyhow::Context;
use canopy_agent::{AgentEvent, AgentLoop, AgentOutcome, GeminiClient};
use canopy_core::{ops, Config, PathTree, WorkspacePath};
use state::WorkspaceState;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Initialize tracing for logging
fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "canopy=info,canopy_agent=info,canopy_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// A line of user input
#[derive(Debug, PartialEq, Eq)]
enum Command {
    /// Blank line
    Empty,
    /// Leave the session
    Quit,
    /// Show local commands
    Help,
    /// Print every workspace path
    List,
    /// Print a file
    Cat(String),
    /// Start over from the starter workspace
    Reset,
    /// Unrecognised `:` command
    Unknown(String),
    /// A request for the agent
    Prompt(String),
}

impl Command {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }

        let Some(rest) = line.strip_prefix(':') else {
            return Command::Prompt(line.to_string());
        };

        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };

        match name {
            "q" | "quit" | "exit" => Command::Quit,
            "h" | "help" => Command::Help,
            "ls" => Command::List,
            "cat" if !argument.is_empty() => Command::Cat(argument.to_string()),
            "reset" => Command::Reset,
            _ => Command::Unknown(rest.to_string()),
        }
    }
}

const HELP: &str = "\
Commands:
  :ls           list workspace files
  :cat <path>   print a file
  :reset        discard the workspace and conversation
  :quit         leave
Anything else is sent to the assistant.";

fn print_outcome(outcome: &AgentOutcome) {
    for event in &outcome.events {
        match event {
            AgentEvent::ToolCall { name, args } => {
                let path = args.get("path").and_then(|v| v.as_str()).unwrap_or_default();
                println!("  [tool] {} {}", name, path);
            }
            AgentEvent::ToolResult { name, result } => {
                if let Some(error) = result.error_message() {
                    println!("  [tool] {} failed: {}", name, error);
                }
            }
            AgentEvent::ModelText { .. } | AgentEvent::Error { .. } => {}
        }
    }
    println!("{}", outcome.reply);
}

/// Content of the file at `raw`
fn read_file(files: &PathTree, raw: &str) -> canopy_core::error::Result<String> {
    let path = WorkspacePath::parse(raw)?;
    Ok(ops::read(files, &path)?.to_string())
}

fn prompt() -> std::io::Result<()> {
    print!("> ");
    std::io::stdout().flush()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let project_root = match std::env::args().nth(1) {
        Some(root) => PathBuf::from(root),
        None => std::env::current_dir()?,
    };

    let config = Config::load(&project_root)
        .with_context(|| format!("loading config from {}", project_root.display()))?;
    let state_path = config
        .state_path()
        .context("config has no project root")?;
    let mut state = WorkspaceState::load_or_seed(&state_path)?;

    let client = GeminiClient::from_config(&config)?;
    let agent = AgentLoop::from_config(client, &config);

    tracing::info!(
        "Workspace has {} nodes and {} turns",
        state.files.node_count(),
        state.history.len()
    );
    println!("Canopy - type :help for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt()?;

    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Empty => {}
            Command::Quit => break,
            Command::Help => println!("{}", HELP),
            Command::List => {
                for path in ops::list(&state.files) {
                    println!("{}", path);
                }
            }
            Command::Cat(raw) => match read_file(&state.files, &raw) {
                Ok(content) => println!("{}", content),
                Err(e) => println!("{}", e),
            },
            Command::Reset => {
                state = WorkspaceState::seeded();
                state.save(&state_path)?;
                println!("Workspace reset.");
            }
            Command::Unknown(name) => println!("Unknown command ':{}', try :help", name),
            Command::Prompt(text) => {
                let outcome = agent
                    .send(state.history.clone(), state.files.clone(), text)
                    .await;
                print_outcome(&outcome);

                state = WorkspaceState {
                    files: outcome.tree,
                    history: outcome.history,
                };
                state.save(&state_path)?;
            }
        }
        prompt()?;
    }

    Ok(())
}
