//! Concrete [`crate::llm::provider::LlmProvider`] implementations.

pub mod openai;
