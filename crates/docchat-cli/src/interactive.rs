//! Interactive mode for docchat.

use anyhow::Result;
use crossterm::style::{Color, ResetColor, SetForegroundColor};
use docchat_core::{ChatClient, DisplaySurface};
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::error;

use crate::commands::{handle_command, CommandContext};
use crate::simple_output::SimpleOutput;
use crate::task_execution::execute_question;

/// Build the interactive prompt string.
///
/// Format:
/// - Multiline mode: `"... > "`
/// - No document: `"docchat> "`
/// - With document: `"docchat | manual.pdf> "` where `| manual.pdf>` is blue
///
/// ANSI escape codes are wrapped in \x01...\x02 so rustyline can compute the
/// visible prompt length.
pub fn build_prompt(in_multiline: bool, document: Option<&str>) -> String {
    if in_multiline {
        return "... > ".to_string();
    }
    match document {
        Some(document) => {
            let blue = format!("\x01{}\x02", SetForegroundColor(Color::Blue));
            let reset = format!("\x01{}\x02", ResetColor);
            format!("docchat {}| {}>{} ", blue, document, reset)
        }
        None => "docchat> ".to_string(),
    }
}

/// Run interactive mode with console output.
pub async fn run_interactive<D: DisplaySurface>(
    client: ChatClient<D>,
    context: CommandContext,
) -> Result<()> {
    let output = SimpleOutput::new();

    output.print("");
    output.print("docchat");
    output.print("      >> ask anything about your documents");
    output.print("");
    match client.session().document() {
        Some(document) => output.print_info(&format!("📄 {}", document)),
        None => output.print_info("No document selected. Use /docs and /doc <name>."),
    }
    output.print_info("Type /help for commands.");
    output.print("");

    let mut rl = DefaultEditor::new()?;

    // Try to load history from a file in the user's home directory
    let history_file = dirs::home_dir().map(|mut path| {
        path.push(".docchat_history");
        path
    });

    if let Some(ref history_path) = history_file {
        let _ = rl.load_history(history_path);
    }

    let mut multiline_buffer = String::new();
    let mut in_multiline = false;

    loop {
        let session = client.session();
        let prompt = build_prompt(in_multiline, session.document());

        match rl.readline(&prompt) {
            Ok(line) => {
                let trimmed = line.trim_end();

                // Check if line ends with backslash for continuation
                if let Some(without_backslash) = trimmed.strip_suffix('\\') {
                    multiline_buffer.push_str(without_backslash);
                    multiline_buffer.push('\n');
                    in_multiline = true;
                    continue;
                }

                let input = if in_multiline {
                    multiline_buffer.push_str(&line);
                    in_multiline = false;
                    let input = multiline_buffer.trim().to_string();
                    multiline_buffer.clear();
                    input
                } else {
                    line.trim().to_string()
                };

                if input.is_empty() {
                    continue;
                }

                rl.add_history_entry(&input)?;

                if input == "exit" || input == "quit" {
                    break;
                }

                if input.starts_with('/') && !input.contains('\n') {
                    if handle_command(&input, &client, &context, &output).await? {
                        continue;
                    }
                }

                execute_question(&client, &input, &output).await;
                output.print("");
            }
            Err(ReadlineError::Interrupted) => {
                if in_multiline {
                    output.print("Multi-line input cancelled");
                    multiline_buffer.clear();
                    in_multiline = false;
                } else {
                    output.print("CTRL-C");
                }
                continue;
            }
            Err(ReadlineError::Eof) => {
                output.print("CTRL-D");
                break;
            }
            Err(err) => {
                error!("Error: {:?}", err);
                break;
            }
        }
    }

    // Save history before exiting
    if let Some(ref history_path) = history_file {
        let _ = rl.save_history(history_path);
    }

    output.print("👋 Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_prompt_default() {
        assert_eq!(build_prompt(false, None), "docchat> ");
    }

    #[test]
    fn test_build_prompt_multiline_takes_precedence() {
        assert_eq!(build_prompt(true, None), "... > ");
        assert_eq!(build_prompt(true, Some("manual.pdf")), "... > ");
    }

    #[test]
    fn test_build_prompt_with_document() {
        let prompt = build_prompt(false, Some("manual.pdf"));
        assert!(prompt.starts_with("docchat "));
        assert!(prompt.contains("| manual.pdf>"));
    }
}
