use std::fmt;

use serde_json::{Map, Value, json};

use crate::redact::redact_sensitive;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Human => "human",
            Self::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputModeSelectionError {
    pub explicit: OutputMode,
}

impl fmt::Display for OutputModeSelectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "conflicting output mode flags: --json requires --output json (got {})",
            self.explicit.as_str()
        )
    }
}

pub fn select_output_mode(
    explicit: Option<OutputMode>,
    json_flag: bool,
    default_mode: OutputMode,
) -> Result<OutputMode, OutputModeSelectionError> {
    match (explicit, json_flag) {
        (Some(mode), true) if mode != OutputMode::Json => {
            Err(OutputModeSelectionError { explicit: mode })
        }
        (Some(mode), _) => Ok(mode),
        (None, true) => Ok(OutputMode::Json),
        (None, false) => Ok(default_mode),
    }
}

/// Success envelope: `{"success": true, "data": <data>, ...extra}`.
///
/// `extra` carries the per-route siblings of `data` (`cached` for weather
/// lookups, `count` for searches). Keys that collide with `success` or `data`
/// are ignored.
pub fn success_envelope(data: Value, extra: &[(&str, Value)]) -> Value {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    body.insert("data".to_string(), data);
    for (key, value) in extra {
        if matches!(*key, "success" | "data") {
            continue;
        }
        body.insert((*key).to_string(), value.clone());
    }
    Value::Object(body)
}

/// Failure envelope: `{"success": false, "error": {"message", "code", "status"}}`.
///
/// The message is redacted before it is embedded so upstream URLs that echo
/// credentials never reach the caller.
pub fn error_envelope(message: &str, code: &str, status: u16) -> Value {
    json!({
        "success": false,
        "error": {
            "message": redact_sensitive(message),
            "code": code,
            "status": status,
        }
    })
}

pub fn render(value: &Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|error| {
        format!(
            "{{\"success\":false,\"error\":{{\"message\":\"failed to serialize envelope: {}\",\"code\":\"runtime.serialize_failed\",\"status\":500}}}}",
            escape_json_string(&error.to_string())
        )
    })
}

fn escape_json_string(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c if c < '\u{20}' => escaped.push_str(&format!("\\u{:04x}", c as u32)),
            c => escaped.push(c),
        }
    }
    escaped
}
