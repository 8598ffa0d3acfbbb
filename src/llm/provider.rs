//! Pluggable LLM provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls, keeping phase logic decoupled from
//! any particular vendor.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;

use super::message::{ChatRequest, ChatResponse};
use crate::error::LlmError;

/// Trait for LLM provider backends.
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g. `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a non-streaming chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] on API failures, timeouts, or parse errors.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, LlmError>;

    /// Executes a streaming chat completion request, returning a stream
    /// of text chunks as they arrive from the provider.
    ///
    /// # Errors
    ///
    /// Returns [`LlmError`] on connection or streaming failures.
    async fn chat_stream(
        &self,
        request: &ChatRequest,
    ) -> Result<Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>, LlmError>;
}
