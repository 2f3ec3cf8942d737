//! Ask command handler.
//!
//! Answers one question from the knowledge base, optionally streaming the
//! answer as it is generated.

use super::{print_json, print_sources};
use clap::Args;
use futures::StreamExt;
use ragchat_core::{config::AppConfig, AppResult};
use ragchat_knowledge::{AnswerOptions, ChatSession, RetrievalPolicy};
use std::io::Write;

/// Ask a single question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question to ask
    pub question: String,

    /// Retrieval policy (basic, threshold, diverse)
    #[arg(long, default_value_t = RetrievalPolicy::Basic)]
    pub policy: RetrievalPolicy,

    /// Number of units to retrieve (default from config)
    #[arg(short = 'k', long)]
    pub k: Option<usize>,

    /// Print the answer as it is generated
    #[arg(long, conflicts_with = "json")]
    pub stream: bool,

    /// Also run the groundedness check on the answer
    #[arg(long)]
    pub evaluate: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let mut session = ChatSession::from_config(config)?;
        let options = AnswerOptions {
            use_history: false,
            policy: self.policy,
            k: self.k,
        };

        let response = if self.stream {
            let mut stream = session.answer_streaming(&self.question, options).await?;
            let mut stdout = std::io::stdout();
            while let Some(fragment) = stream.next().await {
                print!("{}", fragment);
                stdout.flush()?;
            }
            println!();
            stream.into_response()
        } else {
            let response = session.answer(&self.question, options).await?;
            if !self.json {
                println!("{}", response.answer);
            }
            Some(response)
        };

        let Some(response) = response else {
            return Ok(());
        };

        let evaluation = if self.evaluate && response.success {
            Some(
                session
                    .evaluate_answer(&self.question, &response.answer, &response.context)
                    .await?,
            )
        } else {
            None
        };

        if self.json {
            let mut output = serde_json::to_value(&response)?;
            if let Some(evaluation) = &evaluation {
                output["evaluation"] = serde_json::to_value(evaluation)?;
            }
            return print_json(&output);
        }

        print_sources(&response.sources);
        if let Some(evaluation) = evaluation {
            println!();
            println!(
                "Grounded: {}, hallucinations: {}",
                yes_no(evaluation.grounded),
                yes_no(evaluation.hallucinations)
            );
            if !evaluation.explanation.is_empty() {
                println!("{}", evaluation.explanation);
            }
        }

        Ok(())
    }
}

fn yes_no(value: Option<bool>) -> &'static str {
    match value {
        Some(true) => "yes",
        Some(false) => "no",
        None => "unknown",
    }
}
