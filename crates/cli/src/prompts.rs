use std::io::{self, IsTerminal, Write};

use async_trait::async_trait;

use devup_lib::preflight::Prompter;

use crate::output::print_warning;

/// Yes/no questions on the controlling terminal.
pub struct TerminalPrompter;

#[async_trait]
impl Prompter for TerminalPrompter {
  async fn ask(&self, message: &str) -> Option<bool> {
    if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
      print_warning("Cannot prompt for confirmation in non-interactive mode. Use --skip to proceed.");
      return None;
    }

    let message = message.to_string();
    match tokio::task::spawn_blocking(move || confirm(&message)).await {
      Ok(Ok(answer)) => Some(answer),
      Ok(Err(err)) => {
        tracing::warn!(error = %err, "failed to read confirmation");
        None
      }
      Err(_) => None,
    }
  }
}

fn confirm(message: &str) -> io::Result<bool> {
  write!(io::stderr(), "{} [y/N] ", message)?;
  io::stderr().flush()?;

  let mut input = String::new();
  io::stdin().read_line(&mut input)?;

  Ok(is_yes(&input))
}

fn is_yes(input: &str) -> bool {
  matches!(input.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
