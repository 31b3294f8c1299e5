// SPDX-FileCopyrightText: 2026 Blufio Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat id and phone number helpers.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::QuepasaError;

pub const USER_SUFFIX: &str = "@s.whatsapp.net";
pub const GROUP_SUFFIX: &str = "@g.us";
pub const LID_SUFFIX: &str = "@lid";

static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\d").unwrap());

static VALID_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[1-9]\d{6,14}$").unwrap()
});

static BRAZIL_NINTH_DIGIT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+55([4-9][1-9]|[3-9][1-9])9\d{8}$").unwrap()
});

/// True when `source` holds 9 to 15 digits, separators allowed.
pub fn is_valid_e164(source: &str) -> bool {
    (9..=15).contains(&DIGIT.find_iter(source).count())
}

/// Normalizes a user supplied recipient into a full chat id.
///
/// Numeric personal ids get `@s.whatsapp.net`, ids containing `-` (legacy
/// group ids) get `@g.us`. Ids that already carry a suffix must use one of
/// the known domains.
pub fn format_endpoint(source: &str) -> Result<String, QuepasaError> {
    let recipient: String = source.chars().filter(|c| !c.is_whitespace()).collect();
    if recipient.is_empty() {
        return Err(QuepasaError::Validation("empty chatid recipient".into()));
    }
    if recipient.len() < 8 {
        return Err(QuepasaError::Validation(format!(
            "invalid chatid length: {recipient}"
        )));
    }

    if let Some(phone) = recipient.strip_prefix('+') {
        return Ok(format!("{phone}{USER_SUFFIX}"));
    }

    if let Some((_, domain)) = recipient.split_once('@') {
        return match domain {
            "s.whatsapp.net" | "g.us" | "lid" => Ok(recipient),
            other => Err(QuepasaError::Validation(format!(
                "invalid chatid suffix: {other}"
            ))),
        };
    }

    if let Some((prefix, _)) = recipient.split_once('-') {
        if !is_valid_e164(prefix) {
            return Err(QuepasaError::Validation(format!(
                "invalid group id: {recipient}"
            )));
        }
        return Ok(format!("{recipient}{GROUP_SUFFIX}"));
    }

    if is_valid_e164(&recipient) {
        Ok(format!("{recipient}{USER_SUFFIX}"))
    } else {
        Ok(format!("{recipient}{GROUP_SUFFIX}"))
    }
}

/// Extracts the phone digits from a wid like `5511999.0:12@s.whatsapp.net`.
pub fn phone_from_wid(wid: &str) -> String {
    let compact: String = wid.chars().filter(|c| !c.is_whitespace()).collect();
    let user = compact.split('@').next().unwrap_or_default();
    let user = user.split(['.', ':']).next().unwrap_or_default();
    user.chars().take_while(|c| c.is_ascii_digit()).collect()
}

/// Returns `+<digits>` when `source` looks like a valid international number.
pub fn phone_if_valid(source: &str) -> Option<String> {
    let digits = source.trim().trim_start_matches('+');
    VALID_PHONE
        .is_match(digits)
        .then(|| format!("+{digits}"))
}

/// For Brazilian mobiles written with the extra 9th digit, returns the
/// variant without it.
pub fn remove_digit9(phone: &str) -> Option<String> {
    if phone.len() != 14 || !BRAZIL_NINTH_DIGIT.is_match(phone) {
        return None;
    }
    Some(format!("{}{}", &phone[..5], &phone[6..]))
}

/// Drops the `:device` part of a wid.
pub fn trim_session_id(wid: &str) -> String {
    match wid.split_once('@') {
        Some((user, domain)) => {
            let user = user.split(':').next().unwrap_or(user);
            format!("{user}@{domain}")
        }
        None => wid.split(':').next().unwrap_or(wid).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_become_personal_chats() {
        assert_eq!(
            format_endpoint("5511999998888").unwrap(),
            "5511999998888@s.whatsapp.net"
        );
        assert_eq!(
            format_endpoint("+55 11 99999 8888").unwrap(),
            "5511999998888@s.whatsapp.net"
        );
    }

    #[test]
    fn dashed_ids_become_groups() {
        assert_eq!(
            format_endpoint("551199999888-1612345678").unwrap(),
            "551199999888-1612345678@g.us"
        );
        assert!(format_endpoint("abc-1612345678").is_err());
    }

    #[test]
    fn suffixed_ids_are_checked() {
        assert_eq!(
            format_endpoint("120363000000@g.us").unwrap(),
            "120363000000@g.us"
        );
        assert!(format_endpoint("5511999998888@example.com").is_err());
    }

    #[test]
    fn short_or_empty_is_rejected() {
        assert!(matches!(
            format_endpoint("   "),
            Err(QuepasaError::Validation(m)) if m == "empty chatid recipient"
        ));
        assert!(format_endpoint("1234").is_err());
    }

    #[test]
    fn e164_counts_digits_around_separators() {
        assert!(is_valid_e164("55-11-99999-8888"));
        assert!(is_valid_e164("(55) 11.99999.8888"));
        assert!(!is_valid_e164("55-11-999"));
        assert!(!is_valid_e164("1234567890123456"));
        assert_eq!(
            format_endpoint("55.11.99999.8888").unwrap(),
            "55.11.99999.8888@s.whatsapp.net"
        );
        assert_eq!(
            format_endpoint("55(11)99999-1612345678").unwrap(),
            "55(11)99999-1612345678@g.us"
        );
    }

    #[test]
    fn long_non_numeric_defaults_to_group() {
        assert_eq!(
            format_endpoint("120363025246125888").unwrap(),
            "120363025246125888@g.us"
        );
    }

    #[test]
    fn phone_from_wid_strips_device_and_domain() {
        assert_eq!(phone_from_wid("5511999998888.0:12@s.whatsapp.net"), "5511999998888");
        assert_eq!(phone_from_wid("5511999998888:3@s.whatsapp.net"), "5511999998888");
        assert_eq!(phone_from_wid("5511999998888@migrated"), "5511999998888");
    }

    #[test]
    fn phone_validation() {
        assert_eq!(phone_if_valid("5511999998888").as_deref(), Some("+5511999998888"));
        assert_eq!(phone_if_valid("+5511999998888").as_deref(), Some("+5511999998888"));
        assert!(phone_if_valid("0123").is_none());
    }

    #[test]
    fn brazilian_ninth_digit() {
        assert_eq!(
            remove_digit9("+5511987654321").as_deref(),
            Some("+551187654321")
        );
        assert!(remove_digit9("+551187654321").is_none());
        assert!(remove_digit9("+4411987654321").is_none());
    }

    #[test]
    fn session_id_trimming() {
        assert_eq!(trim_session_id("5511:12@s.whatsapp.net"), "5511@s.whatsapp.net");
        assert_eq!(trim_session_id("5511@s.whatsapp.net"), "5511@s.whatsapp.net");
    }

    proptest::proptest! {
        #[test]
        fn personal_numbers_always_get_user_suffix(digits in "[1-9][0-9]{8,14}") {
            let formatted = format_endpoint(&digits).unwrap();
            proptest::prop_assert_eq!(formatted, format!("{digits}{USER_SUFFIX}"));
        }

        #[test]
        fn phone_from_wid_recovers_digits(digits in "[1-9][0-9]{6,14}", device in 0u8..50) {
            let wid = format!("{digits}:{device}@s.whatsapp.net");
            proptest::prop_assert_eq!(phone_from_wid(&wid), digits);
        }
    }
}
