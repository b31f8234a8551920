//! Utility module
//!
//! This module provides common utilities and helper functions used
//! throughout the library.

pub mod logging;
pub mod runtime;

/// Parses the leading decimal integer of `bytes`.
///
/// Leading ASCII whitespace and one optional sign are skipped, then digits are
/// consumed up to the first non-digit. Text without digits yields 0 and
/// out-of-range values saturate, so malformed fields never produce an error.
pub fn parse_decimal_prefix(bytes: &[u8]) -> i64 {
    let mut rest = bytes;
    while let Some((first, tail)) = rest.split_first() {
        if first.is_ascii_whitespace() {
            rest = tail;
        } else {
            break;
        }
    }

    let negative = match rest.first() {
        Some(b'-') => {
            rest = &rest[1..];
            true
        }
        Some(b'+') => {
            rest = &rest[1..];
            false
        }
        _ => false,
    };

    let mut value: i64 = 0;
    for &b in rest.iter().take_while(|b| b.is_ascii_digit()) {
        let digit = i64::from(b - b'0');
        value = value.saturating_mul(10);
        value = if negative {
            value.saturating_sub(digit)
        } else {
            value.saturating_add(digit)
        };
    }
    value
}
