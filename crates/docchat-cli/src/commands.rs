//! Interactive command handlers for docchat.
//!
//! Handles `/` commands in interactive mode.

use anyhow::Result;
use chrono::{Local, TimeZone};
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use docchat_backend::Role;
use docchat_core::markup::{self, snippet};
use docchat_core::{ChatClient, DisplaySurface};

use crate::simple_output::SimpleOutput;

/// Settings commands need from the loaded configuration
#[derive(Debug, Clone)]
pub struct CommandContext {
    pub new_chat_title: String,
    pub snippet_length: usize,
}

/// Handle a control command. Returns true if the command was handled and the loop should continue.
pub async fn handle_command<D: DisplaySurface>(
    input: &str,
    client: &ChatClient<D>,
    context: &CommandContext,
    output: &SimpleOutput,
) -> Result<bool> {
    let (command, argument) = match input.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (input, ""),
    };

    match command {
        "/help" => {
            output.print("");
            output.print("📖 Control Commands:");
            output.print("  /docs          - List the documents on the server");
            output.print("  /doc <name>    - Ask questions about this document");
            output.print("  /chats         - List stored conversations");
            output.print("  /open <id>     - Continue a stored conversation");
            output.print("  /new           - Start a new conversation");
            output.print("  /delete <id>   - Delete a stored conversation");
            output.print("  /history       - Show the current conversation");
            output.print("  /help          - Show this help message");
            output.print("  exit/quit      - Exit the interactive session");
            output.print("");
            Ok(true)
        }
        "/docs" => {
            match client.refresh_documents().await {
                Ok(documents) if documents.is_empty() => {
                    output.print("No documents available on the server.")
                }
                Ok(documents) => {
                    let selected = client.session().document().map(str::to_string);
                    for document in documents {
                        let marker = if selected.as_deref() == Some(document.as_str()) {
                            "*"
                        } else {
                            " "
                        };
                        output.print(&format!(" {} {}", marker, document));
                    }
                }
                Err(e) => output.print_error(&format!("Failed to list documents: {}", e)),
            }
            Ok(true)
        }
        "/doc" => {
            if argument.is_empty() {
                output.print("Usage: /doc <name>");
                output.print("Use /docs to list available documents.");
            } else {
                client.select_document(argument);
                output.print_info(&format!("Asking about {}", argument));
            }
            Ok(true)
        }
        "/chats" => {
            match client.list_conversations().await {
                Ok(chats) if chats.is_empty() => output.print("No stored conversations."),
                Ok(chats) => {
                    let current = client.session().conversation().map(str::to_string);
                    for chat in chats {
                        let marker = if current.as_deref() == Some(chat.chat_id.as_str()) {
                            "*"
                        } else {
                            " "
                        };
                        output.print(&format!(
                            " {} {}{}{} {}  {}",
                            marker,
                            SetForegroundColor(Color::Cyan),
                            chat.chat_id,
                            ResetColor,
                            chat.title,
                            format_timestamp(chat.ts)
                        ));
                        let preview = snippet(&chat.last_message, context.snippet_length);
                        if !preview.is_empty() {
                            output.print_info(&format!("     {}", preview));
                        }
                    }
                }
                Err(e) => output.print_error(&format!("Failed to list conversations: {}", e)),
            }
            Ok(true)
        }
        "/open" => {
            if argument.is_empty() {
                output.print("Usage: /open <chat_id>");
                output.print("Use /chats to list stored conversations.");
            } else {
                match client.open_conversation(argument).await {
                    Ok(history) => {
                        output.print_info(&format!(
                            "Continuing {} ({} messages)",
                            argument,
                            history.len()
                        ));
                    }
                    Err(e) => output.print_error(&format!("Failed to open {}: {}", argument, e)),
                }
            }
            Ok(true)
        }
        "/new" => {
            match client.new_conversation(&context.new_chat_title).await {
                Ok(chat_id) => output.print_info(&format!("Started conversation {}", chat_id)),
                Err(e) => output.print_error(&format!("Failed to start a conversation: {}", e)),
            }
            Ok(true)
        }
        "/delete" => {
            if argument.is_empty() {
                output.print("Usage: /delete <chat_id>");
            } else {
                match client.delete_conversation(argument).await {
                    Ok(true) => output.print_info(&format!(
                        "Deleted {}. The next question starts a new conversation.",
                        argument
                    )),
                    Ok(false) => output.print_info(&format!("Deleted {}", argument)),
                    Err(e) => output.print_error(&format!("Failed to delete {}: {}", argument, e)),
                }
            }
            Ok(true)
        }
        "/history" => {
            match client.history().await {
                Ok(history) if history.is_empty() => {
                    output.print("No messages yet. Ask a question to start.")
                }
                Ok(history) => {
                    for message in history {
                        let (label, color) = match message.role {
                            Role::User => ("you", Color::Green),
                            Role::Assistant => ("answer", Color::Blue),
                        };
                        output.print(&format!(
                            "{}{}{} {}",
                            SetForegroundColor(color),
                            label,
                            ResetColor,
                            format_timestamp(message.ts)
                        ));
                        let body = match message.role {
                            Role::User => markup::escape_html(&message.message),
                            Role::Assistant => markup::render(&message.message),
                        };
                        output.print(&body);
                    }
                }
                Err(e) => output.print_error(&format!("Failed to load history: {}", e)),
            }
            Ok(true)
        }
        _ => {
            output.print(&format!("Unknown command: {} (try /help)", command));
            Ok(true)
        }
    }
}

/// Local time for a unix timestamp in seconds, empty when unknown
fn format_timestamp(ts: Option<i64>) -> String {
    ts.and_then(|secs| Local.timestamp_opt(secs, 0).single())
        .map(|time| time.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_default()
}
