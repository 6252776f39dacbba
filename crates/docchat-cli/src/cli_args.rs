//! CLI argument parsing for docchat.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Clone, Debug)]
#[command(name = "docchat")]
#[command(about = "Ask questions about your documents and read the answers as they stream in")]
#[command(version)]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Override the configured server URL
    #[arg(long, value_name = "URL")]
    pub base_url: Option<String>,

    /// Document to ask about (defaults to the configured one, then the first listed)
    #[arg(short, long, value_name = "NAME")]
    pub document: Option<String>,

    /// Continue an existing conversation instead of starting a new one
    #[arg(long, value_name = "CHAT_ID")]
    pub chat: Option<String>,

    /// Render a markdown file to display markup and exit (no server needed)
    #[arg(long, value_name = "FILE", conflicts_with_all = ["list_documents", "chat"])]
    pub render: Option<PathBuf>,

    /// List the documents available on the server and exit
    #[arg(long)]
    pub list_documents: bool,

    /// Question to ask (if provided, runs in single-shot mode instead of interactive)
    pub question: Option<String>,
}
