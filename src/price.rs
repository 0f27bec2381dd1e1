//! Currency string parsing.
//!
//! Accepts `"$19.99"`, `"R$10,50"`, `"25.75"` and `"30,00"` alike and
//! returns an exact [`Decimal`]; no floating point is involved.

use rust_decimal::Decimal;
use std::str::FromStr;

use crate::error::PriceError;

/// Parse a currency-formatted price.
///
/// Everything except digits, `.`, `,` and `-` is stripped. A lone comma
/// separator is treated as the decimal point; when both `.` and `,` are
/// present the commas are thousands separators.
pub fn parse_price(text: &str) -> Result<Decimal, PriceError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(PriceError::MissingPrice);
    }

    let cleaned: String = trimmed
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | ',' | '-'))
        .collect();

    let normalized = if cleaned.contains('.') {
        cleaned.replace(',', "")
    } else {
        cleaned.replace(',', ".")
    };

    if !normalized.chars().any(|c| c.is_ascii_digit()) {
        return Err(PriceError::InvalidPriceFormat(trimmed.to_string()));
    }

    Decimal::from_str(&normalized).map_err(|_| PriceError::InvalidPriceFormat(trimmed.to_string()))
}
