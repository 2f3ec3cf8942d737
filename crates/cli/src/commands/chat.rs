//! Chat command handler.
//!
//! Interactive loop over one session, so follow-up questions are rewritten
//! against the conversation so far.

use super::{print_json, print_sources};
use clap::Args;
use futures::StreamExt;
use ragchat_core::{config::AppConfig, AppResult};
use ragchat_knowledge::{AnswerOptions, ChatSession, RetrievalPolicy};
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &str = "\
Commands:
  /stats   show session statistics
  /clear   forget the conversation so far
  /reset   delete the knowledge base, history and statistics
  /help    show this message
  /quit    leave the chat";

/// Interactive conversation with history
#[derive(Args, Debug)]
pub struct ChatCommand {
    /// Ingest this directory before the first question
    #[arg(long)]
    pub docs: Option<PathBuf>,

    /// Retrieval policy (basic, threshold, diverse)
    #[arg(long, default_value_t = RetrievalPolicy::Basic)]
    pub policy: RetrievalPolicy,

    /// Number of units to retrieve (default from config)
    #[arg(short = 'k', long)]
    pub k: Option<usize>,

    /// Answer each question on its own, without conversation history
    #[arg(long)]
    pub no_history: bool,

    /// Wait for the full answer instead of streaming it
    #[arg(long)]
    pub no_stream: bool,

    /// Hide source listings after each answer
    #[arg(long)]
    pub no_sources: bool,
}

impl ChatCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing chat command");

        let mut session = ChatSession::from_config(config)?;
        if let Some(docs) = &self.docs {
            let report = session.initialize(docs).await?;
            println!("{}", report.message());
        }

        let options = AnswerOptions {
            use_history: !self.no_history,
            policy: self.policy,
            k: self.k,
        };

        println!("Ask a question about your documents. Type /help for commands.");

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            print!("\n> ");
            std::io::stdout().flush()?;

            let Some(line) = lines.next_line().await? else {
                break;
            };
            let input = line.trim();
            if input.is_empty() {
                continue;
            }

            match input {
                "/quit" | "/exit" => break,
                "/help" => println!("{}", HELP),
                "/stats" => print_json(&session.stats())?,
                "/clear" => {
                    session.clear_history();
                    println!("Conversation history cleared.");
                }
                "/reset" => {
                    session.reset()?;
                    println!("Knowledge base, history and statistics cleared.");
                }
                command if command.starts_with('/') => {
                    println!("Unknown command {}. Type /help for commands.", command);
                }
                question => self.respond(&mut session, question, options).await?,
            }
        }

        tracing::info!(session = %session.id(), "Chat ended");
        Ok(())
    }

    async fn respond(
        &self,
        session: &mut ChatSession,
        question: &str,
        options: AnswerOptions,
    ) -> AppResult<()> {
        let response = if self.no_stream {
            let response = session.answer(question, options).await?;
            println!("{}", response.answer);
            response
        } else {
            let mut stream = session.answer_streaming(question, options).await?;
            let mut stdout = std::io::stdout();
            while let Some(fragment) = stream.next().await {
                print!("{}", fragment);
                stdout.flush()?;
            }
            println!();
            match stream.into_response() {
                Some(response) => response,
                None => return Ok(()),
            }
        };

        if let Some(search_query) = &response.search_query {
            if search_query != question {
                tracing::debug!("Searched for: {}", search_query);
            }
        }

        if !self.no_sources {
            print_sources(&response.sources);
        }
        Ok(())
    }
}
