//! Result of one tool invocation, rendered to text at the MCP boundary.

use dq_domain::Error;

/// What a tool call produced.
///
/// Tools report failures to the model as readable text rather than as
/// protocol errors. Only malformed calls set `isError` on the wire.
#[derive(Debug)]
pub enum ToolOutcome {
    /// Normal tool output, already formatted for the model.
    Text(String),
    /// The search provider (or its input checks) failed.
    SearchFailed(Error),
    /// Loading or parsing a page failed.
    ScrapeFailed { url: String, error: Error },
    /// Arguments did not match the tool's input schema.
    InvalidArguments { tool: String, message: String },
    /// No tool with this name is registered.
    UnknownTool(String),
}

impl ToolOutcome {
    /// Whether the wire result should carry `isError: true`.
    pub fn is_error(&self) -> bool {
        matches!(self, Self::InvalidArguments { .. } | Self::UnknownTool(_))
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Text(text) => text,
            Self::SearchFailed(e) => format!("❌ Search error: {e}"),
            Self::ScrapeFailed { url, error } => format!("Web scraping error for {url}: {error}"),
            Self::InvalidArguments { tool, message } => {
                format!("Invalid arguments for {tool}: {message}")
            }
            Self::UnknownTool(name) => format!("Unknown tool: {name}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_render_as_text() {
        let out = ToolOutcome::SearchFailed(Error::Http("connection refused".into()));
        assert!(!out.is_error());
        assert_eq!(out.into_text(), "❌ Search error: HTTP: connection refused");

        let out = ToolOutcome::ScrapeFailed {
            url: "https://x.test".into(),
            error: Error::Timeout("30s".into()),
        };
        assert_eq!(out.into_text(), "Web scraping error for https://x.test: timeout: 30s");
    }

    #[test]
    fn protocol_misuse_is_flagged() {
        assert!(ToolOutcome::UnknownTool("nope".into()).is_error());
        let out = ToolOutcome::InvalidArguments {
            tool: "scrape_website".into(),
            message: "missing field `url`".into(),
        };
        assert!(out.is_error());
        assert!(out.into_text().contains("missing field `url`"));
    }
}
