// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Filters applied once per message before any route sees it.

use quepasa_core::{Message, MessageType};

use crate::route::DropReason;

pub fn validate_for_dispatch(msg: &Message, dispatch_unhandled: bool) -> Result<(), DropReason> {
    if msg.kind == MessageType::Unhandled && !dispatch_unhandled {
        return Err(DropReason::Unhandled);
    }
    if msg.kind == MessageType::Text && msg.text.trim().is_empty() {
        return Err(DropReason::EmptyText);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unhandled_depends_on_setting() {
        let mut m = Message::text("x@s.whatsapp.net", "");
        m.kind = MessageType::Unhandled;
        assert_eq!(validate_for_dispatch(&m, false), Err(DropReason::Unhandled));
        assert!(validate_for_dispatch(&m, true).is_ok());
    }

    #[test]
    fn blank_text_is_dropped() {
        let m = Message::text("x@s.whatsapp.net", "  \n ");
        assert_eq!(validate_for_dispatch(&m, true), Err(DropReason::EmptyText));
        let m = Message::text("x@s.whatsapp.net", "ok");
        assert!(validate_for_dispatch(&m, false).is_ok());
    }
}
