//! Scripted LLM client for offline use and tests.
//!
//! The default responder answers extractively: it echoes the first context
//! document embedded in a grounded prompt, and echoes the follow-up question
//! when asked to rewrite one. Tests can install their own responder and
//! inspect every request the client received.

use crate::client::{LlmClient, LlmRequest, LlmResponse, LlmStream, LlmStreamChunk, LlmUsage};
use ragchat_core::{AppError, AppResult};
use std::sync::{Arc, Mutex};

type Responder = dyn Fn(&LlmRequest) -> AppResult<String> + Send + Sync;

/// Answer used when a grounded prompt carries no context documents.
pub const NO_CONTEXT_ANSWER: &str =
    "I don't have enough information in the provided documents to answer this question.";

/// In-process LLM client driven by a closure.
#[derive(Clone)]
pub struct MockLlmClient {
    responder: Arc<Responder>,
    requests: Arc<Mutex<Vec<LlmRequest>>>,
}

impl MockLlmClient {
    /// Client that answers with [`extractive_answer`].
    pub fn extractive() -> Self {
        Self::with_responder(|request| Ok(extractive_answer(&request.prompt)))
    }

    /// Client that answers every prompt with the same text.
    pub fn fixed(answer: impl Into<String>) -> Self {
        let answer = answer.into();
        Self::with_responder(move |_| Ok(answer.clone()))
    }

    /// Client whose every call fails, as if the runtime were unreachable.
    pub fn failing() -> Self {
        Self::with_responder(|_| Err(AppError::Llm("connection refused".to_string())))
    }

    /// Client driven by a custom responder.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: Fn(&LlmRequest) -> AppResult<String> + Send + Sync + 'static,
    {
        Self {
            responder: Arc::new(responder),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .map(|requests| requests.iter().map(|r| r.prompt.clone()).collect())
            .unwrap_or_default()
    }

    fn respond(&self, request: &LlmRequest) -> AppResult<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        (self.responder)(request)
    }
}

impl std::fmt::Debug for MockLlmClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockLlmClient").finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl LlmClient for MockLlmClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &LlmRequest) -> AppResult<LlmResponse> {
        let content = self.respond(request)?;
        let completion_tokens = content.split_whitespace().count() as u32;

        Ok(LlmResponse {
            content,
            model: request.model.clone(),
            usage: LlmUsage::new(request.prompt.split_whitespace().count() as u32, completion_tokens),
        })
    }

    async fn stream(&self, request: &LlmRequest) -> AppResult<LlmStream> {
        let content = self.respond(request)?;

        // Word-sized fragments that concatenate back to the full answer
        let mut chunks: Vec<AppResult<LlmStreamChunk>> = content
            .split_inclusive(' ')
            .map(|fragment| {
                Ok(LlmStreamChunk {
                    content: fragment.to_string(),
                    done: false,
                    usage: None,
                })
            })
            .collect();

        chunks.push(Ok(LlmStreamChunk {
            content: String::new(),
            done: true,
            usage: Some(LlmUsage::new(0, content.split_whitespace().count() as u32)),
        }));

        Ok(Box::pin(futures::stream::iter(chunks)))
    }
}

/// Produce an answer from the prompt alone, without a model.
///
/// - Rewrite prompts ("standalone question") return the follow-up question.
/// - Grounded prompts return the body of the first `[Document 1]` block.
/// - Anything else is answered with [`NO_CONTEXT_ANSWER`].
pub fn extractive_answer(prompt: &str) -> String {
    if prompt.contains("standalone question") {
        if let Some(question) = line_after(prompt, "Follow-up Question:") {
            return question;
        }
    }

    if let Some(start) = prompt.find("[Document 1]") {
        let block = &prompt[start..];
        let body = block.split_once('\n').map(|(_, rest)| rest).unwrap_or("");
        let end = body
            .find("\n---\n")
            .or_else(|| body.find("\n\n"))
            .unwrap_or(body.len());
        let answer = body[..end].trim();
        if !answer.is_empty() {
            return answer.to_string();
        }
    }

    NO_CONTEXT_ANSWER.to_string()
}

fn line_after(text: &str, marker: &str) -> Option<String> {
    text.lines()
        .find_map(|line| line.trim().strip_prefix(marker))
        .map(|rest| rest.trim().to_string())
        .filter(|rest| !rest.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[test]
    fn test_extractive_answer_uses_first_document() {
        let prompt = "Context:\n[Document 1] (Source: a.txt, Page: N/A)\nGuido created Python.\n\n---\n[Document 2] (Source: b.txt, Page: N/A)\nOther.\n";
        assert_eq!(extractive_answer(prompt), "Guido created Python.");
    }

    #[test]
    fn test_extractive_answer_without_context() {
        assert_eq!(extractive_answer("Context:\n\nHuman: hi"), NO_CONTEXT_ANSWER);
    }

    #[test]
    fn test_extractive_rewrite_echoes_question() {
        let prompt = "rephrase the follow-up question to be a standalone question.\n\nFollow-up Question: And its speed?\n";
        assert_eq!(extractive_answer(prompt), "And its speed?");
    }

    #[tokio::test]
    async fn test_stream_fragments_concatenate() {
        let client = MockLlmClient::fixed("one two three");
        let mut stream = client.stream(&LlmRequest::new("p", "m")).await.unwrap();

        let mut text = String::new();
        let mut done = false;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            text.push_str(&chunk.content);
            done = chunk.done;
        }

        assert_eq!(text, "one two three");
        assert!(done);
    }

    #[tokio::test]
    async fn test_failing_client_records_request() {
        let client = MockLlmClient::failing();
        assert!(client.complete(&LlmRequest::new("hello", "m")).await.is_err());
        assert_eq!(client.prompts(), vec!["hello".to_string()]);
    }
}
