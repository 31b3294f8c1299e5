// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Text encoding of a route's opaque `extra` payload.

use serde_json::Value;

/// Renders `extra` for storage as JSON text; strings keep their quotes.
pub fn get_extra_text(extra: &Value) -> String {
    extra.to_string()
}

/// Parses stored text back: JSON when parseable, otherwise the raw string
/// (rows written before `extra` was always JSON).
pub fn parse_extra(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
