//! Fixed-point monetary amounts
//!
//! Amounts are `rust_decimal::Decimal` values tagged with an ISO 4217 code.
//! Arithmetic is exact; rounding happens only when a calculator produces an
//! output, using the `RoundingPolicy` from the engine configuration. The
//! engine never converts between currencies: combining two different codes
//! is an error.

use std::fmt;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// ISO 4217 currency code (three ASCII letters, stored upper-case)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn new(code: &str) -> EngineResult<Self> {
        let code = code.trim();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(EngineError::invalid_input(
                "currency",
                format!("{:?} is not a three-letter ISO 4217 code", code),
            ));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Currency {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Currency::new(s)
    }
}

impl TryFrom<String> for Currency {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Currency::new(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Rounding applied to calculator outputs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundingPolicy {
    /// Decimal places kept on monetary outputs
    pub decimal_places: u32,
    /// Decimal places kept on percentages
    pub percent_decimal_places: u32,
}

impl Default for RoundingPolicy {
    fn default() -> Self {
        Self {
            decimal_places: 2,
            percent_decimal_places: 2,
        }
    }
}

impl RoundingPolicy {
    /// Round a monetary value half away from zero
    pub fn round_amount(&self, value: Decimal) -> Decimal {
        value.round_dp_with_strategy(self.decimal_places, RoundingStrategy::MidpointAwayFromZero)
    }

    /// `part / whole * 100`, rounded to the percent precision
    ///
    /// The caller decides what a zero `whole` means; here it is an error.
    pub fn percent(&self, part: Decimal, whole: Decimal) -> EngineResult<f64> {
        if whole.is_zero() {
            return Err(EngineError::invalid_input("denominator", "percentage of zero"));
        }
        let ratio = part
            .checked_div(whole)
            .and_then(|r| r.checked_mul(dec!(100)))
            .ok_or(EngineError::ArithmeticOverflow("percentage"))?;
        self.percent_value(ratio)
    }

    /// Round an already-computed percentage and convert it for display
    pub fn percent_value(&self, pct: Decimal) -> EngineResult<f64> {
        pct.round_dp_with_strategy(self.percent_decimal_places, RoundingStrategy::MidpointAwayFromZero)
            .to_f64()
            .ok_or(EngineError::ArithmeticOverflow("percentage conversion"))
    }
}

/// A decimal amount in a single currency
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Money {
    pub value: Decimal,
    pub currency: Currency,
}

impl Money {
    pub fn new(value: Decimal, currency: Currency) -> Self {
        Self { value, currency }
    }

    pub fn zero(currency: Currency) -> Self {
        Self::new(Decimal::ZERO, currency)
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_sign_negative() && !self.value.is_zero()
    }

    /// Fail unless `other` is in the same currency; `context` names the computation
    pub fn ensure_same_currency(&self, other: &Money, context: &str) -> EngineResult<()> {
        if self.currency != other.currency {
            return Err(EngineError::MixedCurrency {
                group: context.to_string(),
                expected: self.currency.to_string(),
                found: other.currency.to_string(),
            });
        }
        Ok(())
    }

    pub fn checked_add(&self, other: &Money) -> EngineResult<Money> {
        self.ensure_same_currency(other, "addition")?;
        let value = self
            .value
            .checked_add(other.value)
            .ok_or(EngineError::ArithmeticOverflow("addition"))?;
        Ok(Money::new(value, self.currency.clone()))
    }

    pub fn checked_sub(&self, other: &Money) -> EngineResult<Money> {
        self.ensure_same_currency(other, "subtraction")?;
        let value = self
            .value
            .checked_sub(other.value)
            .ok_or(EngineError::ArithmeticOverflow("subtraction"))?;
        Ok(Money::new(value, self.currency.clone()))
    }

    /// Multiply by a dimensionless factor (scenario multiplier, weight, ...)
    pub fn scale(&self, factor: Decimal) -> EngineResult<Money> {
        let value = self
            .value
            .checked_mul(factor)
            .ok_or(EngineError::ArithmeticOverflow("scaling"))?;
        Ok(Money::new(value, self.currency.clone()))
    }

    /// Clamp negative amounts to zero
    pub fn max_zero(&self) -> Money {
        if self.value.is_sign_negative() {
            Money::zero(self.currency.clone())
        } else {
            self.clone()
        }
    }

    pub fn rounded(&self, policy: &RoundingPolicy) -> Money {
        Money::new(policy.round_amount(self.value), self.currency.clone())
    }

    /// Sum amounts that must all be in `currency`
    pub fn try_sum<'a, I>(currency: &Currency, amounts: I, context: &str) -> EngineResult<Money>
    where
        I: IntoIterator<Item = &'a Money>,
    {
        let mut total = Money::zero(currency.clone());
        for amount in amounts {
            total.ensure_same_currency(amount, context)?;
            total.value = total
                .value
                .checked_add(amount.value)
                .ok_or(EngineError::ArithmeticOverflow("summation"))?;
        }
        Ok(total)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.currency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn usd(value: Decimal) -> Money {
        Money::new(value, Currency::new("USD").unwrap())
    }

    #[test]
    fn test_currency_normalised() {
        assert_eq!(Currency::new(" eur ").unwrap().as_str(), "EUR");
        assert!(Currency::new("EURO").is_err());
        assert!(Currency::new("U$D").is_err());
    }

    #[test]
    fn test_add_and_subtract() {
        let total = usd(dec!(100.10)).checked_add(&usd(dec!(0.20))).unwrap();
        assert_eq!(total.value, dec!(100.30));

        let diff = usd(dec!(5)).checked_sub(&usd(dec!(7.5))).unwrap();
        assert_eq!(diff.value, dec!(-2.5));
        assert!(diff.is_negative());
    }

    #[test]
    fn test_mixed_currency_rejected() {
        let eur = Money::new(dec!(1), Currency::new("EUR").unwrap());
        let err = usd(dec!(1)).checked_add(&eur).unwrap_err();
        assert!(matches!(err, EngineError::MixedCurrency { .. }));
    }

    #[test]
    fn test_rounding_half_away_from_zero() {
        let policy = RoundingPolicy::default();
        assert_eq!(policy.round_amount(dec!(2.345)), dec!(2.35));
        assert_eq!(policy.round_amount(dec!(-2.345)), dec!(-2.35));
        assert_eq!(policy.round_amount(dec!(2.344)), dec!(2.34));
    }

    #[test]
    fn test_percent() {
        let policy = RoundingPolicy::default();
        assert_abs_diff_eq!(policy.percent(dec!(1), dec!(3)).unwrap(), 33.33, epsilon = 1e-9);
        assert_abs_diff_eq!(policy.percent(dec!(60000), dec!(100000)).unwrap(), 60.0, epsilon = 1e-9);
        assert!(policy.percent(dec!(1), Decimal::ZERO).is_err());
    }

    #[test]
    fn test_try_sum_checks_every_amount() {
        let usd_code = Currency::new("USD").unwrap();
        let amounts = vec![usd(dec!(1.5)), usd(dec!(2.5))];
        assert_eq!(Money::try_sum(&usd_code, &amounts, "test").unwrap().value, dec!(4.0));

        let mixed = vec![usd(dec!(1)), Money::new(dec!(1), Currency::new("GBP").unwrap())];
        assert!(Money::try_sum(&usd_code, &mixed, "test").is_err());
    }

    #[test]
    fn test_scale_overflow() {
        let err = usd(Decimal::MAX).scale(dec!(1.15)).unwrap_err();
        assert!(matches!(err, EngineError::ArithmeticOverflow("scaling")));
        assert_eq!(usd(dec!(200)).scale(dec!(1.15)).unwrap().value, dec!(230.00));
    }

    #[test]
    fn test_max_zero() {
        assert!(usd(dec!(-3)).max_zero().is_zero());
        assert_eq!(usd(dec!(3)).max_zero().value, dec!(3));
    }
}
