//! Money and discount arithmetic.
//!
//! All money is `rust_decimal::Decimal` rounded to two places, half away from zero.
//! Every function here is pure; the cost calculator, the payment ledger and the
//! status machine all go through them so that a preview and a persisted visit can
//! never disagree.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Alias used for every monetary field.
pub type Money = Decimal;

/// Decimal places kept for monetary values.
pub const MONEY_SCALE: u32 = 2;

/// Largest single amount or fee accepted (one trillion). Keeps every sum of visit
/// money far inside `Decimal`'s range.
pub const MAX_MONEY: Decimal = Decimal::from_parts(3_567_587_328, 232, 0, false, 0);

/// How a visit's discount is expressed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    #[default]
    None,
    /// `discount_value` is a percentage of the total (clamped to 0..=100)
    Percentage,
    /// `discount_value` is a fixed amount (clamped to 0..=total)
    Amount,
}

impl DiscountType {
    /// Lenient parse: anything unrecognized is treated as no discount.
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "percentage" | "percent" => DiscountType::Percentage,
            "amount" | "fixed" => DiscountType::Amount,
            _ => DiscountType::None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DiscountType::None => "none",
            DiscountType::Percentage => "percentage",
            DiscountType::Amount => "amount",
        }
    }
}

/// Round to the money scale.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Clamp `value` into `[min, max]`.
pub fn clamp(value: Decimal, min: Decimal, max: Decimal) -> Decimal {
    value.max(min).min(max)
}

/// Discount for a total. Never negative, never more than `total`.
pub fn discount_amount(total: Money, discount_type: DiscountType, discount_value: Decimal) -> Money {
    let total = total.max(Decimal::ZERO);
    let value = discount_value.max(Decimal::ZERO);

    let raw = match discount_type {
        DiscountType::None => Decimal::ZERO,
        DiscountType::Percentage => {
            let percent = clamp(value, Decimal::ZERO, Decimal::ONE_HUNDRED);
            round_money(total * percent / Decimal::ONE_HUNDRED)
        }
        DiscountType::Amount => round_money(value),
    };

    clamp(raw, Decimal::ZERO, total)
}

/// `max(0, total - discount)`.
pub fn final_amount(total: Money, discount: Money) -> Money {
    (total - discount).max(Decimal::ZERO)
}

/// Outstanding balance: `max(0, final - paid)`.
pub fn due_amount(final_amount: Money, total_paid: Money) -> Money {
    (final_amount - total_paid).max(Decimal::ZERO)
}

/// True when `value` is within `[-MAX_MONEY, MAX_MONEY]`.
pub fn within_range(value: Decimal) -> bool {
    value.abs() <= MAX_MONEY
}

/// Sum that reports overflow as `None` instead of panicking.
pub fn checked_sum<I>(values: I) -> Option<Money>
where
    I: IntoIterator<Item = Money>,
{
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

/// Parse a decimal money string ("120", "99.50"). Rejects more than two decimal places
/// and anything beyond `MAX_MONEY`.
pub fn parse_money(s: &str) -> Option<Money> {
    let value = Decimal::from_str(s.trim()).ok()?;
    if value.scale() > MONEY_SCALE && value != round_money(value) {
        return None;
    }
    if !within_range(value) {
        return None;
    }
    Some(round_money(value))
}

/// Canonical string form with exactly two decimals.
pub fn format_money(value: Money) -> String {
    let mut v = round_money(value);
    v.rescale(MONEY_SCALE);
    v.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn d(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_max_money_is_one_trillion() {
        assert_eq!(MAX_MONEY, Decimal::new(1_000_000_000_000, 0));
    }

    #[test]
    fn test_checked_sum_reports_overflow() {
        assert_eq!(checked_sum([d("1.50"), d("2.25")]), Some(d("3.75")));
        assert_eq!(checked_sum(Vec::new()), Some(Decimal::ZERO));
        assert_eq!(checked_sum([Decimal::MAX, Decimal::ONE]), None);
    }

    #[test]
    fn test_no_discount() {
        assert_eq!(discount_amount(d("500"), DiscountType::None, d("30")), Decimal::ZERO);
    }

    #[test]
    fn test_percentage_clamped_to_hundred() {
        assert_eq!(discount_amount(d("1000"), DiscountType::Percentage, d("120")), d("1000"));
        assert_eq!(discount_amount(d("1000"), DiscountType::Percentage, d("-5")), Decimal::ZERO);
    }

    #[test]
    fn test_percentage_rounds_to_cents() {
        // 33.333..% of 100 -> 33.33
        assert_eq!(
            discount_amount(d("100"), DiscountType::Percentage, d("33.3333")),
            d("33.33")
        );
    }

    #[test]
    fn test_amount_clamped_to_total() {
        assert_eq!(discount_amount(d("800"), DiscountType::Amount, d("1000")), d("800"));
        assert_eq!(discount_amount(d("800"), DiscountType::Amount, d("150")), d("150"));
    }

    #[test]
    fn test_final_and_due_never_negative() {
        assert_eq!(final_amount(d("100"), d("150")), Decimal::ZERO);
        assert_eq!(due_amount(d("100"), d("250")), Decimal::ZERO);
        assert_eq!(due_amount(d("500"), d("200")), d("300"));
    }

    #[test]
    fn test_parse_lenient_discount_type() {
        assert_eq!(DiscountType::parse_lenient("Percentage"), DiscountType::Percentage);
        assert_eq!(DiscountType::parse_lenient("amount"), DiscountType::Amount);
        assert_eq!(DiscountType::parse_lenient("bogus"), DiscountType::None);
    }

    #[test]
    fn test_parse_and_format_money() {
        assert_eq!(parse_money(" 99.5 "), Some(d("99.50")));
        assert_eq!(parse_money("10.005"), None);
        assert_eq!(parse_money("abc"), None);
        assert_eq!(parse_money("1000000000000.01"), None);
        assert_eq!(parse_money("79228162514264337593543950335"), None);
        assert_eq!(parse_money("1000000000000"), Some(MAX_MONEY));
        assert_eq!(format_money(d("7")), "7.00");
        assert_eq!(format_money(d("7.5")), "7.50");
    }
}
