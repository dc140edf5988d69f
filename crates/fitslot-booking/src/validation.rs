// SPDX-FileCopyrightText: 2026 Fitslot Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Input normalization and validation applied before anything reaches storage.

use chrono::{NaiveDate, NaiveTime};

use fitslot_core::FitslotError;
use fitslot_core::types::{BookingParty, GuestContact, NewBooking};

const MAX_NAME_LEN: usize = 120;
const MAX_EMAIL_LEN: usize = 254;
const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

fn invalid(message: impl Into<String>) -> FitslotError {
    FitslotError::Validation(message.into())
}

/// Normalize a Kenyan mobile number to the `2547XXXXXXXX` / `2541XXXXXXXX` form.
///
/// Accepts `07..`, `01..`, `+254..` and `254..`, with spaces or dashes.
pub fn normalize_msisdn(raw: &str) -> Result<String, FitslotError> {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-'))
        .collect();
    let unsigned = compact.strip_prefix('+').unwrap_or(&compact);
    let msisdn = match unsigned.strip_prefix('0') {
        Some(rest) => format!("254{rest}"),
        None => unsigned.to_string(),
    };

    let bytes = msisdn.as_bytes();
    let valid = bytes.len() == 12
        && msisdn.starts_with("254")
        && bytes.iter().all(u8::is_ascii_digit)
        && matches!(bytes[3], b'7' | b'1');
    if valid {
        Ok(msisdn)
    } else {
        Err(invalid(format!("{raw:?} is not a Kenyan mobile number")))
    }
}

/// Trim and lowercase an email address after checking its shape.
pub fn normalize_email(raw: &str) -> Result<String, FitslotError> {
    let email = raw.trim().to_lowercase();
    let well_formed = email.len() <= MAX_EMAIL_LEN
        && !email.chars().any(char::is_whitespace)
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };
    if well_formed {
        Ok(email)
    } else {
        Err(invalid(format!("{raw:?} is not a valid email address")))
    }
}

/// Check a `YYYY-MM-DD` calendar date.
pub fn validate_date(date: &str) -> Result<(), FitslotError> {
    if date.len() == 10 && NaiveDate::parse_from_str(date, "%Y-%m-%d").is_ok() {
        Ok(())
    } else {
        Err(invalid(format!("date {date:?} must be YYYY-MM-DD")))
    }
}

fn parse_hhmm(time: &str) -> Result<NaiveTime, FitslotError> {
    if time.len() != 5 {
        return Err(invalid(format!("time {time:?} must be HH:MM")));
    }
    NaiveTime::parse_from_str(time, "%H:%M")
        .map_err(|_| invalid(format!("time {time:?} must be HH:MM")))
}

/// Check that both times are `HH:MM` and `end` is after `start`.
pub fn validate_time_range(start: &str, end: &str) -> Result<(), FitslotError> {
    if parse_hhmm(end)? <= parse_hhmm(start)? {
        return Err(invalid(format!("end time {end} must be after start time {start}")));
    }
    Ok(())
}

/// A trimmed, non-empty required text field.
pub fn required_text(field: &str, value: &str) -> Result<String, FitslotError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(invalid(format!("{field} must not be empty")));
    }
    if value.chars().count() > MAX_NAME_LEN {
        return Err(invalid(format!(
            "{field} must be at most {MAX_NAME_LEN} characters"
        )));
    }
    Ok(value.to_string())
}

fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Normalize a booking request and enforce the holder rules.
///
/// A booking belongs to exactly one registered user or one guest, and a guest
/// must leave an email or a phone number.
pub fn normalize_new_booking(
    request: NewBooking,
    allow_guests: bool,
) -> Result<NewBooking, FitslotError> {
    let time_slot_id = required_text("time_slot_id", &request.time_slot_id)?;
    let group_id = optional_text(request.group_id);

    let party = match request.party {
        BookingParty::Registered { user_id } => BookingParty::Registered {
            user_id: required_text("user_id", &user_id)?,
        },
        BookingParty::Guest(contact) => {
            if !allow_guests {
                return Err(invalid("guest bookings are disabled; sign in to book"));
            }
            let name = required_text("guest name", &contact.name)?;
            let email = optional_text(contact.email)
                .map(|e| normalize_email(&e))
                .transpose()?;
            let phone = optional_text(contact.phone)
                .map(|p| normalize_msisdn(&p))
                .transpose()?;
            if email.is_none() && phone.is_none() {
                return Err(invalid("guest bookings need an email or a phone number"));
            }
            BookingParty::Guest(GuestContact { name, email, phone })
        }
    };

    let idempotency_key = optional_text(request.idempotency_key);
    if let Some(key) = &idempotency_key {
        if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
            return Err(invalid(format!(
                "idempotency_key must be at most {MAX_IDEMPOTENCY_KEY_LEN} bytes"
            )));
        }
    }

    Ok(NewBooking {
        time_slot_id,
        group_id,
        party,
        idempotency_key,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn guest(email: Option<&str>, phone: Option<&str>) -> NewBooking {
        NewBooking {
            time_slot_id: "slot-1".into(),
            group_id: None,
            party: BookingParty::Guest(GuestContact {
                name: "  Achieng Otieno ".into(),
                email: email.map(Into::into),
                phone: phone.map(Into::into),
            }),
            idempotency_key: None,
        }
    }

    #[test]
    fn msisdn_forms_normalize_to_254() {
        assert_eq!(normalize_msisdn("0712 345 678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("+254712345678").unwrap(), "254712345678");
        assert_eq!(normalize_msisdn("254-110-345-678").unwrap(), "254110345678");
        assert_eq!(normalize_msisdn("0110345678").unwrap(), "254110345678");
    }

    #[test]
    fn msisdn_rejects_non_mobile_numbers() {
        for raw in ["", "12345", "0212345678", "25471234567", "2547123456789", "07123x5678"] {
            assert!(normalize_msisdn(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn email_is_lowercased_and_checked() {
        assert_eq!(
            normalize_email(" Achieng@Example.COM ").unwrap(),
            "achieng@example.com"
        );
        for raw in ["achieng", "@example.com", "a@example", "a@.com", "a b@x.com", "a@x.com."] {
            assert!(normalize_email(raw).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn dates_and_times() {
        assert!(validate_date("2026-11-02").is_ok());
        assert!(validate_date("2026-02-30").is_err());
        assert!(validate_date("2026-1-5").is_err());
        assert!(validate_time_range("07:00", "08:00").is_ok());
        assert!(validate_time_range("08:00", "08:00").is_err());
        assert!(validate_time_range("09:00", "08:00").is_err());
        assert!(validate_time_range("7:00", "08:00").is_err());
        assert!(validate_time_range("07:00", "24:00").is_err());
    }

    #[test]
    fn guest_needs_a_contact() {
        let err = normalize_new_booking(guest(None, Some("  ")), true).unwrap_err();
        assert!(err.to_string().contains("email or a phone"));
    }

    #[test]
    fn guest_fields_are_normalized() {
        let booking =
            normalize_new_booking(guest(Some("A@B.co"), Some("0712345678")), true).unwrap();
        let contact = booking.party.guest().unwrap();
        assert_eq!(contact.name, "Achieng Otieno");
        assert_eq!(contact.email.as_deref(), Some("a@b.co"));
        assert_eq!(contact.phone.as_deref(), Some("254712345678"));
    }

    #[test]
    fn guests_can_be_disabled() {
        let err = normalize_new_booking(guest(Some("a@b.co"), None), false).unwrap_err();
        assert!(matches!(err, FitslotError::Validation(_)));
    }

    #[test]
    fn registered_user_needs_an_id() {
        let request = NewBooking {
            time_slot_id: "slot-1".into(),
            group_id: Some(" ".into()),
            party: BookingParty::Registered {
                user_id: " ".into(),
            },
            idempotency_key: Some("".into()),
        };
        assert!(normalize_new_booking(request.clone(), true).is_err());

        let ok = normalize_new_booking(
            NewBooking {
                party: BookingParty::Registered {
                    user_id: "u-1".into(),
                },
                ..request
            },
            true,
        )
        .unwrap();
        assert_eq!(ok.group_id, None);
        assert_eq!(ok.idempotency_key, None);
    }

    #[test]
    fn oversized_idempotency_key_is_rejected() {
        let mut request = guest(Some("a@b.co"), None);
        request.idempotency_key = Some("k".repeat(129));
        assert!(normalize_new_booking(request, true).is_err());
    }
}
