// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! The JSON body delivered to webhooks and AMQP queues.

use serde_json::Value;

use quepasa_core::{Message, QuepasaError};

/// Serializes `msg` and merges the route's `extra` under the `extra` key.
pub fn build_envelope(msg: &Message, extra: Option<&Value>) -> Result<Value, QuepasaError> {
    let mut body = serde_json::to_value(msg)
        .map_err(|e| QuepasaError::Internal(format!("failed to serialize message: {e}")))?;
    if let (Some(extra), Value::Object(map)) = (extra, &mut body) {
        map.insert("extra".into(), extra.clone());
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extra_is_merged_at_top_level() {
        let mut m = Message::text("5511@s.whatsapp.net", "hi");
        m.id = "ABC".into();
        let body = build_envelope(&m, Some(&json!({"tenant": "acme"}))).unwrap();
        assert_eq!(body["id"], "ABC");
        assert_eq!(body["text"], "hi");
        assert_eq!(body["extra"]["tenant"], "acme");
    }

    #[test]
    fn no_extra_key_without_extra() {
        let m = Message::text("5511@s.whatsapp.net", "hi");
        let body = build_envelope(&m, None).unwrap();
        assert!(body.get("extra").is_none());
    }
}
