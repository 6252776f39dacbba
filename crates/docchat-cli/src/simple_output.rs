use crossterm::style::{Color, ResetColor, SetForegroundColor};

/// Simple output helper for printing messages
#[derive(Clone)]
pub struct SimpleOutput;

impl SimpleOutput {
    pub fn new() -> Self {
        SimpleOutput
    }

    pub fn print(&self, message: &str) {
        println!("{}", message);
    }

    pub fn print_inline(&self, message: &str) {
        use std::io::{stdout, Write};
        print!("{}", message);
        let _ = stdout().flush();
    }

    /// Print a dimmed informational line
    pub fn print_info(&self, message: &str) {
        println!(
            "{}{}{}",
            SetForegroundColor(Color::DarkGrey),
            message,
            ResetColor
        );
    }

    pub fn print_error(&self, message: &str) {
        eprintln!(
            "{}❌ {}{}",
            SetForegroundColor(Color::Red),
            message,
            ResetColor
        );
    }
}

impl Default for SimpleOutput {
    fn default() -> Self {
        Self::new()
    }
}
