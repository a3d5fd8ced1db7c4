//! Shape validators: small, boring predicate functions.
//!
//! Each one takes a value that already passed the gateway's type check and
//! returns it normalized (trimmed, case-folded) or a short reason. They know
//! nothing about records, storage or each other.

use std::fmt::Display;
use std::str::FromStr;

use super::FieldValue;
use crate::config::{
    MAX_DESCRIPTION_LENGTH, MAX_NAME_LENGTH, MAX_PASSWORD_LENGTH, MAX_TITLE_LENGTH,
    MIN_PASSWORD_LENGTH, PIN_LENGTH,
};

type Verdict = Result<FieldValue, String>;

fn text(value: &FieldValue) -> Result<&str, String> {
    value
        .as_text()
        .ok_or_else(|| format!("expected text, got {}", value.type_name()))
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// First or last name: letters, spaces, `'`, `-`, `.`, 1 to 64 characters.
pub fn person_name(value: &FieldValue) -> Verdict {
    let name = text(value)?.trim();
    if name.is_empty() || char_len(name) > MAX_NAME_LENGTH {
        return Err(format!("name must be 1 to {MAX_NAME_LENGTH} characters"));
    }
    let allowed = |c: char| c.is_alphabetic() || matches!(c, ' ' | '\'' | '-' | '.');
    if !name.chars().all(allowed) {
        return Err("name contains characters other than letters, spaces, ' - .".into());
    }
    Ok(FieldValue::Text(name.to_string()))
}

/// Email: one `@`, a non-empty local part, a dotted domain. Lowercased.
pub fn email(value: &FieldValue) -> Verdict {
    let address = text(value)?.trim().to_lowercase();
    let mut parts = address.split('@');
    let (local, domain) = match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => (local, domain),
        _ => return Err("email must contain exactly one '@'".into()),
    };
    let domain_ok = domain.contains('.')
        && domain.split('.').all(|label| {
            !label.is_empty() && label.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        });
    if local.is_empty() || local.chars().any(char::is_whitespace) || !domain_ok {
        return Err("email is not well formed".into());
    }
    Ok(FieldValue::Text(address))
}

/// Mobile number: optional leading `+`, then 7 to 15 digits once spaces and
/// dashes are stripped.
pub fn mobile_number(value: &FieldValue) -> Verdict {
    let raw = text(value)?.trim();
    let (plus, rest) = match raw.strip_prefix('+') {
        Some(rest) => ("+", rest),
        None => ("", raw),
    };
    let digits: String = rest.chars().filter(|c| !matches!(c, ' ' | '-')).collect();
    if !(7..=15).contains(&digits.len()) || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err("mobile number must be 7 to 15 digits".into());
    }
    Ok(FieldValue::Text(format!("{plus}{digits}")))
}

/// Password: 8 to 128 characters. Never trimmed, never logged.
pub fn password(value: &FieldValue) -> Verdict {
    let secret = text(value)?;
    let len = char_len(secret);
    if !(MIN_PASSWORD_LENGTH..=MAX_PASSWORD_LENGTH).contains(&len) {
        return Err(format!(
            "password must be {MIN_PASSWORD_LENGTH} to {MAX_PASSWORD_LENGTH} characters"
        ));
    }
    Ok(FieldValue::Text(secret.to_string()))
}

fn letter_code(value: &FieldValue, len: usize, what: &str, upper: bool) -> Verdict {
    let code = text(value)?.trim();
    if code.len() != len || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(format!("{what} must be {len} ASCII letters"));
    }
    let code = if upper {
        code.to_ascii_uppercase()
    } else {
        code.to_ascii_lowercase()
    };
    Ok(FieldValue::Text(code))
}

/// ISO 3166 alpha-2 country code, uppercased.
pub fn country_code(value: &FieldValue) -> Verdict {
    letter_code(value, 2, "country code", true)
}

/// ISO 639-1 language code, lowercased.
pub fn language_code(value: &FieldValue) -> Verdict {
    letter_code(value, 2, "language code", false)
}

/// ISO 4217 currency code, uppercased.
pub fn currency_code(value: &FieldValue) -> Verdict {
    letter_code(value, 3, "currency code", true)
}

/// Profile alias or contract title: 1 to 120 characters, trimmed.
pub fn title(value: &FieldValue) -> Verdict {
    let title = text(value)?.trim();
    if title.is_empty() || char_len(title) > MAX_TITLE_LENGTH {
        return Err(format!("must be 1 to {MAX_TITLE_LENGTH} characters"));
    }
    Ok(FieldValue::Text(title.to_string()))
}

/// Free-form description: at most 2000 characters, trimmed.
pub fn description(value: &FieldValue) -> Verdict {
    let body = text(value)?.trim();
    if char_len(body) > MAX_DESCRIPTION_LENGTH {
        return Err(format!("must be at most {MAX_DESCRIPTION_LENGTH} characters"));
    }
    Ok(FieldValue::Text(body.to_string()))
}

/// Amount in minor units. Zero is not a payment.
pub fn amount(value: &FieldValue) -> Verdict {
    match value {
        FieldValue::Unsigned(0) => Err("amount must be greater than zero".into()),
        FieldValue::Unsigned(n) => Ok(FieldValue::Unsigned(*n)),
        other => Err(format!("expected unsigned integer, got {}", other.type_name())),
    }
}

/// PIN: exactly four ASCII digits.
pub fn pin(value: &FieldValue) -> Verdict {
    let pin = text(value)?;
    if pin.len() != PIN_LENGTH || !pin.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("PIN must be exactly {PIN_LENGTH} digits"));
    }
    Ok(FieldValue::Text(pin.to_string()))
}

/// Status name for any status enum: parsed case-insensitively by the enum's
/// own `FromStr`, re-rendered in canonical form.
pub fn status_name<T>(value: &FieldValue) -> Verdict
where
    T: FromStr + Display,
{
    let raw = text(value)?;
    raw.trim()
        .parse::<T>()
        .map(|status| FieldValue::Text(status.to_string()))
        .map_err(|_| format!("'{}' is not a known status", raw.trim()))
}
