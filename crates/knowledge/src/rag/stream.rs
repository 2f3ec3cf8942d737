//! Streaming answers with a deferred session update.

use crate::rag::session::{generation_failure_message, ChatSession, PreparedAnswer};
use crate::rag::types::{AnswerResponse, SourceAttribution};
use futures::Stream;
use ragchat_core::AppError;
use ragchat_llm::TextStream;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Answer fragments as the model produces them.
///
/// The session is borrowed for the lifetime of the stream. History and
/// statistics are committed once, when the stream yields `None`; a stream
/// dropped before that commits nothing. A generation failure, before or
/// during streaming, is yielded as a final apologetic fragment.
pub struct AnswerStream<'a> {
    session: Option<&'a mut ChatSession>,
    prepared: Option<PreparedAnswer>,
    inner: Option<TextStream>,
    sources: Vec<SourceAttribution>,
    buffer: String,
    /// Text still to be yielded before the stream ends
    pending: Option<String>,
    failure: Option<AppError>,
    response: Option<AnswerResponse>,
    finished: bool,
}

impl<'a> AnswerStream<'a> {
    pub(crate) fn new(
        session: &'a mut ChatSession,
        prepared: PreparedAnswer,
        sources: Vec<SourceAttribution>,
        inner: TextStream,
    ) -> Self {
        Self {
            session: Some(session),
            prepared: Some(prepared),
            inner: Some(inner),
            sources,
            buffer: String::new(),
            pending: None,
            failure: None,
            response: None,
            finished: false,
        }
    }

    /// Stream whose generation could not start.
    pub(crate) fn failed(
        session: &'a mut ChatSession,
        prepared: PreparedAnswer,
        sources: Vec<SourceAttribution>,
        error: AppError,
    ) -> Self {
        Self {
            session: Some(session),
            prepared: Some(prepared),
            inner: None,
            sources,
            buffer: String::new(),
            pending: Some(generation_failure_message(&error)),
            failure: Some(error),
            response: None,
            finished: false,
        }
    }

    /// Stream that yields a finished response's answer once, with no
    /// session update.
    pub(crate) fn immediate(response: AnswerResponse) -> Self {
        Self {
            session: None,
            prepared: None,
            inner: None,
            sources: response.sources.clone(),
            buffer: String::new(),
            pending: Some(response.answer.clone()),
            failure: None,
            response: Some(response),
            finished: false,
        }
    }

    /// Sources the answer is grounded on, known before the first fragment.
    pub fn sources(&self) -> &[SourceAttribution] {
        &self.sources
    }

    /// The full response, available once the stream has been drained.
    pub fn response(&self) -> Option<&AnswerResponse> {
        self.response.as_ref()
    }

    pub fn into_response(self) -> Option<AnswerResponse> {
        self.response
    }

    fn complete(&mut self) {
        self.finished = true;
        let (Some(session), Some(prepared)) = (self.session.take(), self.prepared.take()) else {
            return;
        };

        let response = match self.failure.take() {
            Some(error) => session.commit_failure(prepared, &error),
            None => {
                let answer = std::mem::take(&mut self.buffer).trim().to_string();
                session.commit_answer(prepared, answer)
            }
        };
        self.response = Some(response);
    }
}

impl Stream for AnswerStream<'_> {
    type Item = String;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.finished {
                return Poll::Ready(None);
            }

            if let Some(inner) = this.inner.as_mut() {
                match inner.as_mut().poll_next(cx) {
                    Poll::Pending => return Poll::Pending,
                    Poll::Ready(Some(Ok(fragment))) => {
                        this.buffer.push_str(&fragment);
                        return Poll::Ready(Some(fragment));
                    }
                    Poll::Ready(Some(Err(error))) => {
                        this.inner = None;
                        this.pending = Some(generation_failure_message(&error));
                        this.failure = Some(error);
                    }
                    Poll::Ready(None) => {
                        this.inner = None;
                    }
                }
                continue;
            }

            if let Some(text) = this.pending.take() {
                return Poll::Ready(Some(text));
            }

            this.complete();
        }
    }
}
