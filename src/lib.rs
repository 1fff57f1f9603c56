//! # Wayfinder
//!
//! Self-hosted ReAct travel assistant over Amap (Gaode) local services.
//!
//! The agent alternates between asking a chat model to reason in the
//! Chinese 思考/行动/行动输入 format and dispatching the Amap tool the
//! model names, feeding every observation back into the conversation
//! until the model writes 最终答案.
//!
//! ## Architecture
//!
//! ```text
//!      POST /api/chat
//!            │
//!            ▼
//!     ┌─────────────┐  transcript   ┌──────────────────┐
//!     │ ReactAgent  │──────────────▶│ CompletionClient │
//!     │   (loop)    │◀──────────────│  (DeepSeek API)  │
//!     └──────┬──────┘  completion   └──────────────────┘
//!            │ 行动 / 行动输入
//!            ▼
//!     ┌──────────────┐
//!     │ ToolRegistry │  geocoding, IP locate, districts,
//!     │    (Amap)    │  nearby POIs, static maps
//!     └──────────────┘
//! ```
//!
//! ## Run Flow
//! 1. Receive a chat request via the API
//! 2. Seed a transcript with the system prompt and the wrapped query
//! 3. Alternate completion and tool dispatch, appending observations
//! 4. Extract the final answer and any static-map URL it carries
//!
//! ## Modules
//! - `agent`: the reason-act-observe loop and the response parser
//! - `llm`: completion-provider trait and the DeepSeek-compatible client
//! - `tools`: the Amap tool set and registry
//! - `api`: HTTP surface (`/api/health`, `/api/tools`, `/api/chat`)

pub mod agent;
pub mod api;
pub mod config;
pub mod llm;
pub mod tools;

pub use agent::{ParsedAction, ReactAgent, ReactParser, RunOptions};
pub use config::Config;
pub use llm::{ChatMessage, CompletionClient, OpenAiCompatibleClient, Role};
pub use tools::{AmapClient, Tool, ToolRegistry};
