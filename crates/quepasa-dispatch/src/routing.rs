// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! AMQP routing key selection.

use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use quepasa_core::{Message, MessageType};

/// Fixed exchange every AMQP route publishes to.
pub const EXCHANGE: &str = "quepasa.exchange";

/// The three standard routing keys, each bound to its own queue.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, IntoStaticStr,
)]
#[strum(serialize_all = "lowercase")]
pub enum RoutingKey {
    Prod,
    Events,
    History,
}

impl RoutingKey {
    pub fn as_str(self) -> &'static str {
        self.into()
    }

    /// Picks the key for one message.
    pub fn for_message(msg: &Message) -> Self {
        if msg.from_history {
            return Self::History;
        }
        match msg.kind {
            MessageType::Unhandled => Self::Events,
            MessageType::Contact if msg.edited && msg.has_attachment() => Self::Events,
            _ => Self::Prod,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quepasa_core::Attachment;

    #[test]
    fn history_wins() {
        let mut m = Message::text("x@s.whatsapp.net", "hi");
        m.from_history = true;
        m.kind = MessageType::Unhandled;
        assert_eq!(RoutingKey::for_message(&m), RoutingKey::History);
    }

    #[test]
    fn unhandled_goes_to_events() {
        let mut m = Message::text("x@s.whatsapp.net", "");
        m.kind = MessageType::Unhandled;
        assert_eq!(RoutingKey::for_message(&m).as_str(), "events");
    }

    #[test]
    fn edited_contact_with_attachment_goes_to_events() {
        let mut m = Message::text("x@s.whatsapp.net", "");
        m.kind = MessageType::Contact;
        m.edited = true;
        assert_eq!(RoutingKey::for_message(&m), RoutingKey::Prod);
        m.attachment = Some(Attachment::default());
        assert_eq!(RoutingKey::for_message(&m), RoutingKey::Events);
    }

    #[test]
    fn default_is_prod() {
        let m = Message::text("x@s.whatsapp.net", "hello");
        assert_eq!(RoutingKey::for_message(&m).to_string(), "prod");
    }
}
