//! Reset command handler.

use clap::Args;
use ragchat_core::{config::AppConfig, AppResult};
use ragchat_knowledge::ChatSession;
use std::io::{BufRead, Write};

/// Delete the knowledge base
#[derive(Args, Debug)]
pub struct ResetCommand {
    /// Skip confirmation prompt
    #[arg(short, long)]
    pub yes: bool,
}

impl ResetCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing reset command");

        let mut session = ChatSession::from_config(config)?;
        let dir = session.index().dir().to_path_buf();
        if !dir.exists() {
            println!("Nothing to reset: {} does not exist", dir.display());
            return Ok(());
        }

        if !self.yes && !confirm(&format!("Delete the knowledge base at {}?", dir.display()))? {
            println!("Aborted");
            return Ok(());
        }

        session.reset()?;
        println!("Knowledge base at {} deleted", dir.display());
        Ok(())
    }
}

fn confirm(question: &str) -> AppResult<bool> {
    print!("{} [y/N] ", question);
    std::io::stdout().flush()?;

    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}
