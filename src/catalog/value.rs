//! Metadata values and their wire rendering.

use std::borrow::Cow;

use serde_json::Value as Json;

use crate::catalog::endpoint::ContentType;

/// A value produced by an endpoint.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    /// Newline-separated list, e.g. security group names.
    Lines(Vec<String>),
    Json(Json),
}

impl Value {
    pub fn text(s: impl Into<String>) -> Self {
        Value::Text(s.into())
    }

    /// Render the value for the wire. `element` names the XML root.
    pub fn render(&self, content_type: ContentType, element: &str) -> String {
        match (self, content_type) {
            (Value::Text(s), _) => s.clone(),
            (Value::Lines(lines), ContentType::Json) => {
                serde_json::to_string_pretty(lines).unwrap_or_default()
            }
            (Value::Lines(lines), _) => lines.join("\n"),
            (Value::Json(Json::String(s)), ContentType::Text) => s.clone(),
            (Value::Json(json), ContentType::Text | ContentType::Json) => {
                serde_json::to_string_pretty(json).unwrap_or_default()
            }
            (Value::Json(json), ContentType::Xml) => render_xml(json, element),
        }
    }
}

impl From<Json> for Value {
    fn from(json: Json) -> Self {
        match json {
            Json::String(s) => Value::Text(s),
            other => Value::Json(other),
        }
    }
}

fn render_xml(json: &Json, root: &str) -> String {
    let mut out = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    write_element(&mut out, &xml_name(root), json, 0);
    out
}

fn write_element(out: &mut String, name: &str, json: &Json, depth: usize) {
    let indent = "  ".repeat(depth);
    match json {
        Json::Object(map) => {
            out.push_str(&format!("{indent}<{name}>\n"));
            for (key, value) in map {
                write_element(out, &xml_name(key), value, depth + 1);
            }
            out.push_str(&format!("{indent}</{name}>\n"));
        }
        Json::Array(items) => {
            out.push_str(&format!("{indent}<{name}>\n"));
            for item in items {
                write_element(out, "item", item, depth + 1);
            }
            out.push_str(&format!("{indent}</{name}>\n"));
        }
        Json::Null => out.push_str(&format!("{indent}<{name}/>\n")),
        Json::String(s) => out.push_str(&format!("{indent}<{name}>{}</{name}>\n", escape(s))),
        other => out.push_str(&format!("{indent}<{name}>{other}</{name}>\n")),
    }
}

/// Element names keep `[A-Za-z0-9_.-]` and must start with a letter or `_`.
/// Anything else becomes `_`; an empty name becomes `value`.
fn xml_name(name: &str) -> Cow<'_, str> {
    let valid = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');

    if starts_ok && name.chars().all(valid) {
        return Cow::Borrowed(name);
    }
    if name.is_empty() {
        return Cow::Borrowed("value");
    }

    let mut out = String::with_capacity(name.len() + 1);
    if !starts_ok {
        out.push('_');
    }
    out.extend(name.chars().map(|c| if valid(c) { c } else { '_' }));
    Cow::Owned(out)
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}
