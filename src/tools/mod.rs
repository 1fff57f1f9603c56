//! Amap (Gaode) local-service tools the agent can dispatch to.
//!
//! Each tool owns its argument binding: dispatch hands over the parsed
//! mapping as-is and the tool validates what it needs, ignoring extra
//! keys. All network tools share one injected [`AmapClient`]; nothing
//! here reads ambient state.

mod district;
mod geocode;
mod locate;
mod poi;
mod staticmap;

pub use district::GetSubDistricts;
pub use geocode::AddressToLocation;
pub use locate::GetCity;
pub use poi::SearchNearbyPoi;
pub use staticmap::MapPosition;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

// ============================================================================
// Shared Amap client
// ============================================================================

/// HTTP client for the Amap web-service APIs.
///
/// Cloning is cheap; clones share the underlying connection pool.
#[derive(Clone)]
pub struct AmapClient {
    client: Client,
    api_key: String,
}

impl AmapClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
        }
    }

    /// The configured web-service key. Static-map URLs embed it.
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// GET an Amap endpoint and decode the JSON body. The key parameter
    /// is appended automatically.
    pub(crate) async fn get<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&str, String)],
    ) -> anyhow::Result<T> {
        let response = self
            .client
            .get(url)
            .timeout(Duration::from_secs(30))
            .query(&[("key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Amap API error ({}): {}", status, body);
        }

        Ok(response.json::<T>().await?)
    }
}

/// Coerce an Amap response field to text.
///
/// Amap encodes fields it could not resolve as empty arrays rather than
/// omitting them, so any non-string value collapses to the default.
pub(crate) fn text_or(value: &Value, default: &str) -> String {
    match value.as_str() {
        Some(s) => s.to_string(),
        None => default.to_string(),
    }
}

// ============================================================================
// Tool trait and registry
// ============================================================================

/// One declared tool parameter, for operator-facing listings.
#[derive(Debug, Clone, Serialize)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub required: bool,
    pub schema: Value,
}

impl ParameterSpec {
    pub fn new(name: &str, description: &str, required: bool, schema: Value) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            required,
            schema,
        }
    }
}

/// Descriptor for one registered tool.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub human_name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

/// Trait for implementing tools.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The identifier the model writes on `行动：` lines.
    fn name(&self) -> &str;

    /// Short human-readable name for UI listings.
    fn human_name(&self) -> &str;

    /// Model-facing description; ends up verbatim in the system prompt.
    fn description(&self) -> &str;

    /// Parameter specs for the descriptor listing.
    fn parameters(&self) -> Vec<ParameterSpec>;

    /// Execute the tool with the parsed argument mapping.
    async fn execute(&self, args: Value) -> anyhow::Result<String>;
}

/// Registry of available tools, kept in registration order.
///
/// Order matters: the system prompt enumerates the registry, and a
/// stable listing keeps rendered prompts reproducible across runs.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    /// Create an empty registry.
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Create the standard registry: the five Amap travel tools sharing
    /// one client.
    pub fn with_amap(amap: AmapClient) -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(AddressToLocation::new(amap.clone())));
        registry.register(Arc::new(GetCity::new(amap.clone())));
        registry.register(Arc::new(GetSubDistricts::new(amap.clone())));
        registry.register(Arc::new(SearchNearbyPoi::new(amap.clone())));
        registry.register(Arc::new(MapPosition::new(amap)));
        tracing::debug!("Tool registry ready with {} tools", registry.len());
        registry
    }

    /// Register a tool, replacing any earlier tool of the same name in
    /// place.
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&slot) => self.tools[slot] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Check if a tool exists by name.
    pub fn has_tool(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors in registration order, for prompt construction and
    /// the tools listing endpoint.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|tool| ToolDescriptor {
                name: tool.name().to_string(),
                human_name: tool.human_name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    /// Invoke a tool by name with an argument mapping.
    ///
    /// Unknown names and tool-internal failures both surface as errors;
    /// the orchestration loop converts them to observation text.
    pub async fn invoke(&self, name: &str, args: Value) -> anyhow::Result<String> {
        let tool = self
            .index
            .get(name)
            .map(|&slot| &self.tools[slot])
            .ok_or_else(|| anyhow::anyhow!("Unknown tool: {}", name))?;

        tracing::debug!("Invoking tool {}", name);
        tool.execute(args).await
    }
}
