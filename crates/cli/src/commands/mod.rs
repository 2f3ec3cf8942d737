//! Command handlers for the ragchat CLI.
//!
//! One submodule per subcommand, plus the output helpers they share.

pub mod ask;
pub mod chat;
pub mod ingest;
pub mod reset;
pub mod status;

// Re-export command types for convenience
pub use ask::AskCommand;
pub use chat::ChatCommand;
pub use ingest::IngestCommand;
pub use reset::ResetCommand;
pub use status::StatusCommand;

use ragchat_core::AppResult;
use ragchat_knowledge::SourceAttribution;
use serde::Serialize;

/// Print the sources an answer was grounded on, numbered like the context.
pub(crate) fn print_sources(sources: &[SourceAttribution]) {
    if sources.is_empty() {
        return;
    }

    println!();
    println!("Sources:");
    for (i, source) in sources.iter().enumerate() {
        println!(
            "  [{}] {} (page {}): {}",
            i + 1,
            source.source_id,
            source.location.as_deref().unwrap_or("N/A"),
            source.preview.replace('\n', " ")
        );
    }
}

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
