//! Documentation tools for the Q&A agent, served over MCP.
//!
//! - `search_documentation`: Tavily web search restricted to given domains,
//!   with optional LLM summarization of the results.
//! - `scrape_website`: full-page text extraction through headless Chromium
//!   (or plain HTTP).
//!
//! Both tools always answer with text; failures are rendered by
//! [`ToolOutcome::into_text`].

pub mod outcome;
pub mod registry;
pub mod scrape;
pub mod search;
pub mod server;

pub use outcome::ToolOutcome;
pub use registry::ToolRegistry;
pub use server::{router, McpServer};
