//! Native function-calling types, carried for provider compatibility.
//!
//! The core itself never dispatches retrieval through native tool
//! calls — Phase 3 retrieval requests are a JSON field inside the
//! streamed response body, parsed by the stream parser (§4.2) — but the
//! chat transport still needs to speak a provider's tool-calling wire
//! format for requests that do attach tools.

use serde::{Deserialize, Serialize};

/// A tool definition that can be sent to an LLM for function-calling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Human-readable description of what the tool does.
    pub description: String,
    /// JSON Schema object describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A tool call requested by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this call (assigned by the provider).
    pub id: String,
    /// Name of the tool invoked.
    pub name: String,
    /// JSON-encoded arguments for the tool.
    pub arguments: String,
}
