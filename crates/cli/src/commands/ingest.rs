//! Ingest command handler.

use super::print_json;
use clap::Args;
use ragchat_core::{config::AppConfig, AppResult};
use ragchat_knowledge::ChatSession;
use std::path::PathBuf;

/// Load, chunk and index a directory of documents
#[derive(Args, Debug)]
pub struct IngestCommand {
    /// Directory (or single file) to ingest
    pub path: PathBuf,

    /// Delete the existing index before ingesting
    #[arg(long)]
    pub reset: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl IngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ingest command for {:?}", self.path);

        let mut session = ChatSession::from_config(config)?;
        if self.reset {
            session.reset()?;
        }

        let report = session.initialize(&self.path).await?;

        if self.json {
            return print_json(&report);
        }

        println!("{}", report.message());
        if report.new_chunks < report.chunks {
            println!(
                "{} chunks were already indexed",
                report.chunks - report.new_chunks
            );
        }
        for skipped in &report.skipped {
            println!("Skipped {}: {}", skipped.path.display(), skipped.reason);
        }

        Ok(())
    }
}
