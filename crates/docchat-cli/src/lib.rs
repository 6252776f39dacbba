//! docchat CLI - command-line client for the document question-answering server.

mod cli_args;
mod commands;
mod console_surface;
mod interactive;
mod simple_output;
mod task_execution;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use docchat_backend::HttpBackend;
use docchat_config::Config;
use docchat_core::{markup, ChatClient, SessionContext, TurnState};

pub use cli_args::Cli;
use commands::CommandContext;
use console_surface::ConsoleSurface;
use interactive::run_interactive;
use simple_output::SimpleOutput;
use task_execution::execute_question;

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli);

    // Rendering a file needs neither configuration nor a server
    if let Some(path) = &cli.render {
        return render_file(path);
    }

    let config = Config::load_with_overrides(
        cli.config.as_deref(),
        cli.base_url.clone(),
        cli.document.clone(),
    )?;
    debug!("Using server at {}", config.base_url());

    let backend = HttpBackend::new(
        config.base_url(),
        Duration::from_secs(config.backend.connect_timeout_seconds),
    )?;
    let mut session = SessionContext::new();
    if let Some(document) = &config.session.default_document {
        session = session.with_document(document.clone());
    }
    let client = ChatClient::with_session(Arc::new(backend), ConsoleSurface::new(), session);
    let output = SimpleOutput::new();

    match client.refresh_documents().await {
        Ok(documents) if cli.list_documents => {
            for document in documents {
                output.print(&document);
            }
            return Ok(());
        }
        Ok(_) => {}
        Err(e) if cli.list_documents => return Err(e.context("Failed to list documents")),
        Err(e) => warn!("Could not fetch the document list: {}", e),
    }

    if let Some(chat_id) = &cli.chat {
        client
            .open_conversation(chat_id)
            .await
            .with_context(|| format!("Failed to open conversation {}", chat_id))?;
    }

    match cli.question {
        Some(question) => run_single_shot(&client, &question, &output).await,
        None => {
            let context = CommandContext {
                new_chat_title: config.session.new_chat_title.clone(),
                snippet_length: config.display.snippet_length,
            };
            run_interactive(client, context).await
        }
    }
}

// --- Helper functions ---

fn initialize_logging(cli: &Cli) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let level = if cli.verbose { "debug" } else { "info" };
    let mut filter = EnvFilter::from_default_env();
    for target in ["docchat", "docchat_cli", "docchat_core", "docchat_backend", "docchat_config"] {
        match format!("{}={}", target, level).parse() {
            Ok(directive) => filter = filter.add_directive(directive),
            Err(e) => eprintln!("Invalid log directive for {}: {}", target, e),
        }
    }

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

fn render_file(path: &Path) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    println!("{}", markup::render(&text));
    Ok(())
}

async fn run_single_shot(
    client: &ChatClient<ConsoleSurface>,
    question: &str,
    output: &SimpleOutput,
) -> Result<()> {
    let outcome = execute_question(client, question, output)
        .await
        .context("The question was not answered")?;

    match outcome.state {
        TurnState::Settled => Ok(()),
        _ => match outcome.error() {
            Some(err) => Err(err.into()),
            None => anyhow::bail!("turn ended in state {}", outcome.state),
        },
    }
}
