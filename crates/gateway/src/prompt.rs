//! System prompt and human-turn assembly for the structured-chat loop.

use dq_domain::tool::ToolDefinition;

use crate::catalog::{python_list, Catalog};

const SYSTEM_TEMPLATE: &str = r#"You are a specialized Q&A agent that searches specific documentation websites.

AVAILABLE KNOWLEDGE SOURCES split by category/domain/topic having the website and description for each category:
{knowledge_sources}

INSTRUCTIONS:
1. ALWAYS start with the search_documentation tool for ANY question
2. Analyze the user's question to determine relevant domains/topics/categories
3. Select appropriate sites based on technologies/topics mentioned
4. If search results don't provide sufficient information to answer the question completely, then use scrape_website tool on the most relevant URL from search results
5. You must only answer questions about available knowledge sources: {domains}
6. If question is outside available knowledge sources, do not answer the question and suggest which topics you can answer

TOOL USAGE STRATEGY:
- First: Use search_documentation to find relevant information quickly
- Second: If search results are incomplete, unclear or do not provide enough information to answer the question, use scrape_website on the most promising URL from search results
- Always prefer search over scraping for efficiency but always use scraping when search results provided no relevant information

RULES:
- Be helpful and comprehensive
- Cite sources when possible
- Only use scraping when search results provide no answer
- When scraping, choose the most relevant URL from previous search results

You have access to the following tools:

{tools}

Use a json blob to specify a tool by providing an action key (tool name) and an action_input key (tool input).

Valid "action" values: "Final Answer" or {tool_names}

Provide only ONE action per $JSON_BLOB, as shown:
```
{
  "action": "$TOOL_NAME",
  "action_input": "$INPUT"
}
```

Follow this format:

Question: input question to answer
Thought: consider previous and subsequent steps
Action:
```
$JSON_BLOB
```
Observation: action result
... (repeat Thought/Action/Observation N times)
Thought: I know what to respond
Action:
```
{
  "action": "Final Answer",
  "action_input": "response"
}
```
Begin! Reminder to ALWAYS respond with a valid json blob of a single action. Use tools if necessary. Respond directly if appropriate and ask for clarification if something is not clear. Format is Action:```$JSON_BLOB```then Observation
"#;

const HUMAN_SUFFIX: &str = "(reminder to respond in a JSON blob no matter what)\n IMPORTANT:When calling a tool keep the JSON blob in the same format using action/action_input fields and pass the function parameters in the action_input field";

/// Build the system prompt. Placeholders are filled in a single pass, so
/// braces inside catalog text or tool schemas are never re-expanded.
pub fn system_prompt(catalog: &Catalog, tools: &[ToolDefinition]) -> String {
    let knowledge = catalog.knowledge_markdown();
    let domains = python_list(&catalog.domains());
    let tools_text = render_tools(tools);
    let names = tool_names(tools);

    substitute(
        SYSTEM_TEMPLATE,
        &[
            ("{knowledge_sources}", knowledge.as_str()),
            ("{domains}", domains.as_str()),
            ("{tools}", tools_text.as_str()),
            ("{tool_names}", names.as_str()),
        ],
    )
}

/// One line per tool: `name: description, args: {properties}`.
pub fn render_tools(tools: &[ToolDefinition]) -> String {
    tools
        .iter()
        .map(|t| format!("{}: {}, args: {}", t.name, t.description, t.argument_properties()))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn tool_names(tools: &[ToolDefinition]) -> String {
    tools
        .iter()
        .map(|t| t.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// The human turn: user input, the reasoning scratchpad, then the format
/// reminder.
pub fn human_turn(input: &str, scratchpad: &str) -> String {
    format!("{input}\n\n{scratchpad}{HUMAN_SUFFIX}")
}

fn substitute(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len() * 2);
    let mut rest = template;
    'outer: while !rest.is_empty() {
        if rest.starts_with('{') {
            for (key, value) in vars {
                if let Some(tail) = rest.strip_prefix(key) {
                    out.push_str(value);
                    rest = tail;
                    continue 'outer;
                }
            }
        }
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            out.push(c);
        }
        rest = chars.as_str();
    }
    out
}
