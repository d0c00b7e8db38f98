//! Webhook signal parsing.
//!
//! Alerts arrive either as JSON (`{"action": "buy"}`, `{"signal": "SHORT"}`)
//! or as a bare token (`BUY`, `long`). Each payload is run through an ordered
//! list of strategies; the first one that recognises an action wins.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use tracing::debug;

use crate::error::ParseError;
use crate::exchange::types::Side;

/// Longest slice of a rejected payload echoed back in errors and logs
const MAX_ECHO_CHARS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Action {
    Buy,
    Sell,
}

impl Action {
    /// BUY/LONG and SELL/SHORT, any case, surrounding whitespace ignored.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_uppercase().as_str() {
            "BUY" | "LONG" => Some(Action::Buy),
            "SELL" | "SHORT" => Some(Action::Sell),
            _ => None,
        }
    }

    pub fn side(self) -> Side {
        match self {
            Action::Buy => Side::Buy,
            Action::Sell => Side::Sell,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Buy => write!(f, "BUY"),
            Action::Sell => write!(f, "SELL"),
        }
    }
}

/// A normalized trade instruction.
#[derive(Clone, Debug)]
pub struct Directive {
    pub kind: Action,
    pub received_at: DateTime<Utc>,
    /// Raw payload as received, kept for the audit log only
    pub raw: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Payload {
    Structured(Value),
    Text(String),
}

impl Payload {
    /// Build a payload from an HTTP body. JSON content types that actually
    /// decode become `Structured`; everything else is treated as text.
    pub fn from_body(content_type: Option<&str>, body: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(body).map_err(|_| ParseError::InvalidEncoding)?;

        let is_json = content_type.is_some_and(|ct| ct.to_ascii_lowercase().contains("json"));
        if is_json {
            if let Ok(value) = serde_json::from_str::<Value>(text) {
                return Ok(Payload::Structured(value));
            }
        }
        Ok(Payload::Text(text.to_string()))
    }

    pub fn raw(&self) -> String {
        match self {
            Payload::Structured(v) => v.to_string(),
            Payload::Text(t) => t.clone(),
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Payload::Structured(Value::Null) => true,
            Payload::Structured(Value::String(s)) => s.trim().is_empty(),
            Payload::Structured(_) => false,
            Payload::Text(t) => t.trim().is_empty(),
        }
    }
}

type Strategy = fn(&Payload) -> Option<Action>;

const STRATEGIES: &[(&str, Strategy)] = &[
    ("structured", structured),
    ("token", plain_token),
    ("embedded_json", embedded_json),
];

fn structured(payload: &Payload) -> Option<Action> {
    match payload {
        Payload::Structured(value) => action_from_value(value),
        Payload::Text(_) => None,
    }
}

fn plain_token(payload: &Payload) -> Option<Action> {
    match payload {
        Payload::Text(text) => Action::from_token(text),
        Payload::Structured(_) => None,
    }
}

fn embedded_json(payload: &Payload) -> Option<Action> {
    match payload {
        Payload::Text(text) => serde_json::from_str::<Value>(text.trim())
            .ok()
            .and_then(|v| action_from_value(&v)),
        Payload::Structured(_) => None,
    }
}

/// `action` wins when present and non-empty; `signal` is only the fallback.
fn action_from_value(value: &Value) -> Option<Action> {
    match value {
        Value::Object(map) => ["action", "signal"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|s| !s.is_empty())
            .and_then(Action::from_token),
        Value::String(s) => Action::from_token(s),
        _ => None,
    }
}

pub fn parse_payload(payload: &Payload) -> Result<Directive, ParseError> {
    if payload.is_empty() {
        return Err(ParseError::Empty);
    }

    let raw = payload.raw();
    for (name, strategy) in STRATEGIES {
        if let Some(kind) = strategy(payload) {
            debug!("[SIGNAL] {} recognised via {} strategy", kind, name);
            return Ok(Directive {
                kind,
                received_at: Utc::now(),
                raw,
            });
        }
    }

    Err(ParseError::Unrecognized(raw.chars().take(MAX_ECHO_CHARS).collect()))
}

/// Convenience for the HTTP layer: body bytes straight to a directive.
pub fn parse_body(content_type: Option<&str>, body: &[u8]) -> Result<Directive, ParseError> {
    parse_payload(&Payload::from_body(content_type, body)?)
}
