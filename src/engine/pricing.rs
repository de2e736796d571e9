use crate::model::*;

use super::EngineError;
use super::normalize::AmountOverrides;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quote {
    pub amounts: MoneyAmounts,
    pub currency: Currency,
    /// Set when a caller-supplied total differs from `base + fees + tax`.
    pub total_overridden: bool,
}

/// Round to the cent, half away from zero.
pub fn round2(value: f64) -> f64 {
    let cents = (value.abs() * 100.0 * (1.0 + f64::EPSILON)).round();
    value.signum() * cents / 100.0
}

/// Parse one caller override. `Ok(None)` means "not supplied".
fn parse_override(input: Option<&AmountInput>, field: &'static str) -> Result<Option<f64>, EngineError> {
    let value = match input {
        None => return Ok(None),
        Some(AmountInput::Number(v)) => *v,
        Some(AmountInput::Text(raw)) => {
            let raw = raw.trim();
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f64>()
                .map_err(|_| EngineError::AmountInvalid(field))?
        }
    };
    if !value.is_finite() || value < 0.0 {
        return Err(EngineError::AmountInvalid(field));
    }
    finite(round2(value), field).map(Some)
}

/// Rounding scales by 100, so values near `f64::MAX` can overflow.
fn finite(value: f64, field: &'static str) -> Result<f64, EngineError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::AmountInvalid(field))
    }
}

/// Base amount derived from the resource's price, or `None` when the
/// resource has no usable price.
pub fn computed_base(resource: &Resource, schedule: &ScheduleContext) -> Option<f64> {
    let unit = resource.price;
    if !unit.is_finite() || unit <= 0.0 {
        return None;
    }
    let multiplier = if schedule.schedule_type == ScheduleType::DateRange
        && resource.pricing_model.scales_with_nights()
    {
        schedule.nights.max(1)
    } else {
        1
    };
    Some(round2(unit * f64::from(multiplier))).filter(|base| base.is_finite())
}

pub fn resolve_currency(
    override_code: Option<&str>,
    resource: &Resource,
) -> Result<Currency, EngineError> {
    match override_code.or(resource.currency.as_deref()) {
        None => Ok(Currency::FALLBACK),
        Some(raw) if raw.trim().is_empty() => Ok(Currency::FALLBACK),
        Some(raw) => {
            Currency::parse(raw).ok_or_else(|| EngineError::CurrencyNotSupported(raw.trim().to_string()))
        }
    }
}

/// Reconcile the resource price with caller overrides.
///
/// A caller-supplied total is trusted as-is; `total_overridden` reports
/// whether it disagrees with the component sum.
pub fn price(
    resource: &Resource,
    schedule: &ScheduleContext,
    overrides: &AmountOverrides,
    currency: Option<&str>,
) -> Result<Quote, EngineError> {
    let base = match parse_override(overrides.base.as_ref(), "baseAmount")? {
        Some(base) => base,
        None => computed_base(resource, schedule).ok_or(EngineError::AmountInvalid("baseAmount"))?,
    };
    let fees = parse_override(overrides.fees.as_ref(), "feesAmount")?.unwrap_or(0.0);
    let tax = parse_override(overrides.tax.as_ref(), "taxAmount")?.unwrap_or(0.0);
    let sum = finite(round2(base + fees + tax), "totalAmount")?;
    let total = parse_override(overrides.total.as_ref(), "totalAmount")?.unwrap_or(sum);
    let currency = resolve_currency(currency, resource)?;

    Ok(Quote {
        amounts: MoneyAmounts {
            base,
            fees,
            tax,
            total,
        },
        currency,
        total_overridden: (total - sum).abs() >= 0.005,
    })
}
