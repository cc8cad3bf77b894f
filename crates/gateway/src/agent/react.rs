//! Structured-chat reasoning loop.
//!
//! The model answers every turn with a single JSON action blob. Tool
//! actions are dispatched and their output appended to the scratchpad as
//! an observation; a `Final Answer` action ends the loop. Output that does
//! not parse is recorded as a failed step and the model is asked again.

use std::sync::Arc;

use dq_domain::error::{Error, Result};
use dq_domain::tool::{Message, ToolCall};
use dq_providers::{ChatRequest, LlmProvider};
use regex::Regex;
use serde_json::{json, Map, Value};

use super::connector::ToolSession;
use crate::prompt::human_turn;

pub const FINAL_ANSWER: &str = "Final Answer";
pub const INVALID_RESPONSE: &str = "Invalid or incomplete response";
pub const ITERATION_LIMIT: &str = "Agent stopped due to iteration limit or time limit.";
pub const EMPTY_ANSWER: &str = "I couldn't process your request.";
const STOP_SEQUENCE: &str = "\nObservation";

/// A decoded model action.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Final(String),
    Tool(ToolCall),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Action parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Extracts the JSON action blob from model output.
///
/// Built once at startup and shared by every agent.
#[derive(Debug, Clone)]
pub struct ActionParser {
    fence: Regex,
}

impl ActionParser {
    pub fn new() -> Result<Self> {
        let fence = Regex::new(r"(?s)```(?:json)?[ \t]*\r?\n?(.*?)```")
            .map_err(|e| Error::Other(format!("action fence pattern: {e}")))?;
        Ok(Self { fence })
    }

    /// Decode the first fenced block, or failing that the first balanced
    /// `{...}` object, into an [`Action`].
    pub fn parse(&self, text: &str) -> Result<Action> {
        let blob = match self.fence.captures(text).and_then(|c| c.get(1)) {
            Some(m) => m.as_str().trim(),
            None => first_object(text)
                .ok_or_else(|| Error::Parse("no JSON action found in model output".into()))?,
        };

        let value: Value = serde_json::from_str(blob)
            .map_err(|e| Error::Parse(format!("action blob is not valid JSON: {e}")))?;
        let Value::Object(mut obj) = value else {
            return Err(Error::Parse("action blob is not a JSON object".into()));
        };
        let action = match obj.remove("action") {
            Some(Value::String(s)) => s,
            Some(_) => return Err(Error::Parse("'action' must be a string".into())),
            None => return Err(Error::Parse("missing 'action'".into())),
        };
        let input = obj
            .remove("action_input")
            .ok_or_else(|| Error::Parse("missing 'action_input'".into()))?;

        if action == FINAL_ANSWER {
            let answer = match input {
                Value::String(s) => s,
                other => other.to_string(),
            };
            return Ok(Action::Final(answer));
        }

        let arguments = tool_arguments(&action, input);
        Ok(Action::Tool(ToolCall {
            tool_name: action,
            arguments,
        }))
    }
}

/// Objects pass through; a bare string becomes the tool's primary argument.
fn tool_arguments(tool: &str, input: Value) -> Value {
    match input {
        Value::Object(_) => input,
        Value::String(s) => {
            let key = match tool {
                "search_documentation" => "query",
                "scrape_website" => "url",
                _ => "input",
            };
            let mut map = Map::new();
            map.insert(key.into(), Value::String(s));
            Value::Object(map)
        }
        other => json!({ "input": other }),
    }
}

/// The first brace-balanced `{...}` span, ignoring braces inside strings.
fn first_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// State machine
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum Step {
    AwaitingModel,
    InvokingTool { call: ToolCall, model_text: String },
    Terminal { answer: String },
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoopOutcome {
    pub answer: String,
    /// Model completions consumed.
    pub iterations: usize,
}

/// One reasoning run over a fixed prompt prefix.
pub struct ReasoningLoop<'a> {
    pub provider: &'a Arc<dyn LlmProvider>,
    pub tools: &'a dyn ToolSession,
    pub tool_names: &'a [String],
    pub parser: &'a ActionParser,
    pub max_iterations: usize,
}

impl ReasoningLoop<'_> {
    /// Run until a final answer or the iteration cap.
    ///
    /// `prefix` is the system prompt followed by prior history. Provider
    /// failures abort the run; tool failures become observations.
    pub async fn run(&self, prefix: &[Message], input: &str) -> Result<LoopOutcome> {
        let mut scratchpad = String::new();
        let mut iterations = 0usize;
        let mut step = Step::AwaitingModel;

        loop {
            step = match step {
                Step::AwaitingModel if iterations >= self.max_iterations => {
                    tracing::warn!(iterations, "iteration limit reached");
                    Step::Terminal {
                        answer: ITERATION_LIMIT.into(),
                    }
                }
                Step::AwaitingModel => {
                    iterations += 1;
                    let mut messages = prefix.to_vec();
                    messages.push(Message::user(human_turn(input, &scratchpad)));
                    let mut request = ChatRequest::new(messages);
                    request.stop = vec![STOP_SEQUENCE.into()];

                    let reply = self.provider.chat(&request).await?;
                    match self.parser.parse(&reply.content) {
                        Ok(Action::Final(answer)) => Step::Terminal { answer },
                        Ok(Action::Tool(call)) => Step::InvokingTool {
                            call,
                            model_text: reply.content,
                        },
                        Err(e) => {
                            tracing::debug!(iteration = iterations, error = %e, "unparseable model output");
                            push_step(&mut scratchpad, &reply.content, INVALID_RESPONSE);
                            Step::AwaitingModel
                        }
                    }
                }
                Step::InvokingTool { call, model_text } => {
                    let observation = self.observe(&call).await;
                    push_step(&mut scratchpad, &model_text, &observation);
                    Step::AwaitingModel
                }
                Step::Terminal { answer } => {
                    let answer = if answer.trim().is_empty() {
                        EMPTY_ANSWER.to_string()
                    } else {
                        answer
                    };
                    return Ok(LoopOutcome { answer, iterations });
                }
            };
        }
    }

    async fn observe(&self, call: &ToolCall) -> String {
        if !self.tool_names.iter().any(|n| n == &call.tool_name) {
            return format!(
                "{} is not a valid tool, try one of [{}].",
                call.tool_name,
                self.tool_names.join(", ")
            );
        }

        tracing::info!(tool = %call.tool_name, args = %call.arguments, "invoking tool");
        match self.tools.call(&call.tool_name, call.arguments.clone()).await {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(tool = %call.tool_name, error = %e, "tool call failed");
                format!("Tool error: {e}")
            }
        }
    }
}

fn push_step(scratchpad: &mut String, model_text: &str, observation: &str) {
    scratchpad.push_str(model_text);
    scratchpad.push_str("\nObservation: ");
    scratchpad.push_str(observation);
    scratchpad.push_str("\nThought: ");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
