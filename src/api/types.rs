//! API request and response types.

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Request to chat with the travel assistant.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    /// The user's message
    pub message: String,

    /// Confirmed street address of the user, injected ahead of the
    /// message so the agent answers relative to it
    pub location_context: Option<String>,

    /// Optional override of the configured iteration cap
    pub max_iterations: Option<usize>,
}

/// Reply from one agent run.
#[derive(Debug, Clone, Serialize)]
pub struct ChatReply {
    /// The agent's final answer
    pub reply: String,

    /// Static-map URL found in the reply, with its key repaired
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_url: Option<String>,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,

    /// Configured chat model
    pub model: String,

    /// Default iteration cap per run
    pub max_iterations: usize,
}

/// A tool as listed by `GET /api/tools`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolSummary {
    pub name: String,
    pub human_name: String,
    pub description: String,
}

/// Find the first static-map URL embedded in the agent's reply.
///
/// Stops at `)` and whitespace so URLs wrapped in Markdown link syntax
/// come out clean.
pub fn extract_map_url(text: &str) -> Option<String> {
    let pattern = Regex::new(r"https://restapi\.amap\.com/v3/staticmap\?[^)\s]+").unwrap();
    pattern.find(text).map(|m| m.as_str().to_string())
}

/// Replace a placeholder or missing `key=` parameter with the real key.
///
/// The model sometimes reproduces a literal placeholder such as
/// `key=<用户的密钥>` from its tool descriptions instead of the key the
/// URL was built with.
pub fn repair_map_key(url: &str, api_key: &str) -> String {
    let damaged = url.contains('<') || url.contains("用户的密钥") || !url.contains("key=");
    if !damaged {
        return url.to_string();
    }

    if url.contains("key=") {
        let pattern = Regex::new(r"key=[^&]*").unwrap();
        pattern
            .replace_all(url, regex::NoExpand(&format!("key={}", api_key)))
            .to_string()
    } else {
        format!("{}&key={}", url, api_key)
    }
}
