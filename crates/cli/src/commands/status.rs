//! Status command handler.

use super::print_json;
use clap::Args;
use ragchat_core::{config::AppConfig, AppResult};
use ragchat_knowledge::ChatSession;

/// Show knowledge base status
#[derive(Args, Debug)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl StatusCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing status command");

        let session = ChatSession::from_config(config)?;
        let index = session.index();
        let stats = session.stats();
        let sources = index.source_count()?;

        if self.json {
            let output = serde_json::json!({
                "indexDirectory": index.dir(),
                "ready": stats.knowledge_base_ready,
                "units": stats.indexed_units,
                "sources": sources,
                "embeddingModel": index.embedder().model_name(),
                "embeddingProvider": index.embedder().provider_name(),
                "languageModel": config.llm.model,
                "languageModelProvider": config.llm.provider,
            });
            return print_json(&output);
        }

        println!("Index:      {}", index.dir().display());
        if stats.knowledge_base_ready {
            println!(
                "Contents:   {} units from {} sources",
                stats.indexed_units, sources
            );
        } else {
            println!("Contents:   empty (run `ragchat ingest <dir>`)");
        }
        println!(
            "Embeddings: {} via {}",
            index.embedder().model_name(),
            index.embedder().provider_name()
        );
        println!("Model:      {} via {}", config.llm.model, config.llm.provider);

        Ok(())
    }
}
