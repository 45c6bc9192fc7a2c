//! Built-in (provider-hosted) tool calls.
//!
//! Web search, file search, code interpreter and computer use run on the
//! provider side and never reach the tool hooks.  They only show up as raw
//! response items, from which they are turned into tool messages.

use serde_json::{json, Value};

use mt_domain::records::Message;

/// Raw item type to reported tool name.
const INTERNAL_TOOLS: &[(&str, &str)] = &[
    ("web_search_call", "web_search"),
    ("file_search_call", "file_search"),
    ("code_interpreter_call", "code_interpreter"),
    ("computer_call", "computer_use"),
];

pub fn tool_name_for(item_type: &str) -> Option<&'static str> {
    INTERNAL_TOOLS
        .iter()
        .find(|(ty, _)| *ty == item_type)
        .map(|(_, name)| *name)
}

fn field(item: &Value, key: &str) -> Value {
    item.get(key).cloned().unwrap_or(Value::Null)
}

/// `(arguments, result)` for one raw item.
fn details(item: &Value, item_type: &str) -> (Value, Value) {
    let action = item.get("action").cloned().unwrap_or(Value::Null);
    match item_type {
        "web_search_call" => (
            json!({ "query": field(&action, "query"), "sources": field(&action, "sources") }),
            field(item, "result"),
        ),
        "file_search_call" => (
            json!({ "query": field(item, "query"), "file_ids": field(item, "file_ids") }),
            field(item, "results"),
        ),
        "code_interpreter_call" => {
            let language = item
                .get("language")
                .cloned()
                .unwrap_or_else(|| Value::from("python"));
            (
                json!({ "code": field(item, "code"), "language": language }),
                field(item, "output"),
            )
        }
        "computer_call" => (
            json!({ "action_type": field(&action, "type") }),
            field(item, "output"),
        ),
        _ => (Value::Null, Value::Null),
    }
}

/// Tool messages for every built-in tool call among `raw_items`.
pub fn capture(raw_items: &[Value], agent: &str) -> Vec<Message> {
    raw_items
        .iter()
        .filter_map(|item| {
            let item_type = item.get("type")?.as_str()?;
            let name = tool_name_for(item_type)?;
            let (arguments, result) = details(item, item_type);

            let mut msg = Message::tool(format!("Internal tool: {name}"), agent, name)
                .with_tool_call(json!({
                    "name": name,
                    "type": item_type,
                    "id": field(item, "id"),
                    "status": field(item, "status"),
                    "arguments": arguments,
                    "result": result,
                }));
            msg.is_internal_tool = Some(true);
            msg.internal_tool_type = Some(item_type.to_owned());
            Some(msg)
        })
        .collect()
}
