//! Import record validation.
//!
//! Rules run in a fixed order and the first failure wins: name, type,
//! price presence, price format and sign, quantity presence and sign.
//! `industry` and `origin` are optional and default to `""`.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::error::{Field, PriceError, RecordError};
use crate::models::{NewProduct, PriceField, RawImportRecord};
use crate::price::parse_price;

pub const NAME_MAX: usize = 100;
pub const TYPE_MAX: usize = 50;
pub const INDUSTRY_MAX: usize = 100;
pub const ORIGIN_MAX: usize = 50;

/// Where a record came from, for log lines.
#[derive(Debug, Clone, Copy)]
pub struct RecordContext<'a> {
    pub filename: &'a str,
    /// 1-based position inside the file.
    pub index: usize,
}

impl RecordContext<'_> {
    pub fn describe(&self, record_name: Option<&str>) -> String {
        match record_name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(name) => format!("{} #{} ('{}')", self.filename, self.index, name),
            None => format!("{} #{}", self.filename, self.index),
        }
    }
}

pub fn validate(record: &RawImportRecord, ctx: &RecordContext<'_>) -> Result<NewProduct, RecordError> {
    let name = required_text(record.product_name(), Field::Product)?;
    let kind = required_text(record.kind.as_deref(), Field::Type)?;

    let (price, price_text) = match &record.price {
        Some(PriceField::Text(text)) => {
            let text = required_text(Some(text.as_str()), Field::Price)?;
            match parse_price(&text) {
                Ok(p) => (p, text),
                Err(PriceError::MissingPrice) => {
                    return Err(RecordError::MissingField(Field::Price))
                }
                Err(PriceError::InvalidPriceFormat(text)) => {
                    return Err(RecordError::InvalidPriceFormat(text))
                }
            }
        }
        Some(PriceField::Number(n)) => {
            let text = n.to_string();
            (numeric_price(&text)?, text)
        }
        None => return Err(RecordError::MissingField(Field::Price)),
    };
    if price <= Decimal::ZERO {
        return Err(RecordError::NonPositivePrice(price_text));
    }

    let quantity = record
        .quantity
        .ok_or(RecordError::MissingField(Field::Quantity))?;
    if quantity < 0 {
        return Err(RecordError::NegativeQuantity(quantity));
    }

    let industry = record.industry.as_deref().unwrap_or("").trim().to_string();
    let origin = record.origin.as_deref().unwrap_or("").trim().to_string();

    check_len("product", &name, NAME_MAX)?;
    check_len("type", &kind, TYPE_MAX)?;
    check_len("industry", &industry, INDUSTRY_MAX)?;
    check_len("origin", &origin, ORIGIN_MAX)?;

    tracing::trace!(record = %ctx.describe(Some(&name)), "record valid");

    Ok(NewProduct {
        name,
        kind,
        price,
        quantity,
        industry,
        origin,
    })
}

/// A bare JSON number, taken as written. Exponent forms such as `1e16`
/// are expanded rather than run through currency cleanup.
fn numeric_price(text: &str) -> Result<Decimal, RecordError> {
    let parsed = if text.contains(['e', 'E']) {
        Decimal::from_scientific(text)
    } else {
        Decimal::from_str(text)
    };
    parsed.map_err(|_| RecordError::InvalidPriceFormat(text.to_string()))
}

fn required_text(value: Option<&str>, field: Field) -> Result<String, RecordError> {
    match value.map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(RecordError::MissingField(field)),
    }
}

pub(crate) fn check_len(field: &'static str, value: &str, max: usize) -> Result<(), RecordError> {
    if value.chars().count() > max {
        Err(RecordError::FieldTooLong { field, max })
    } else {
        Ok(())
    }
}
