//! Exact rational numbers for fact values and formula literals.
//!
//! Facts arrive as JSON numbers and thresholds are written as decimal
//! literals. Both are held as reduced `i128` fractions so comparisons are
//! exact: `0.1 + 0.2 == 0.3` holds, and percentage constraints written with
//! cross-multiplication never drift.
//!
//! Every arithmetic operation is checked. Overflow and division by zero
//! return `None`; the evaluator turns that into an undefined value rather
//! than panicking.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// Largest number of fractional digits accepted when parsing a decimal.
const MAX_FRACTION_DIGITS: usize = 30;

/// Decimal places kept when approximating an unrepresentable float.
const MAX_APPROX_PLACES: u32 = 18;

/// Floats below this magnitude convert to `i128` without saturating.
const I128_SAFE_F64: f64 = 1e38;

/// An exact rational number `numer / denom` with `denom > 0`, always reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Number {
    numer: i128,
    denom: i128,
}

impl Number {
    /// Zero.
    pub const ZERO: Number = Number { numer: 0, denom: 1 };

    /// One.
    pub const ONE: Number = Number { numer: 1, denom: 1 };

    /// Creates an integer value.
    pub const fn int(n: i64) -> Self {
        Self {
            numer: n as i128,
            denom: 1,
        }
    }

    /// Creates an integer value from a wide integer.
    pub const fn from_i128(n: i128) -> Self {
        Self { numer: n, denom: 1 }
    }

    /// Creates `numer / denom`, reduced. Returns `None` when `denom` is zero
    /// or normalising the sign overflows.
    pub fn ratio(numer: i128, denom: i128) -> Option<Self> {
        if denom == 0 {
            return None;
        }
        let (numer, denom) = if denom < 0 {
            (numer.checked_neg()?, denom.checked_neg()?)
        } else {
            (numer, denom)
        };
        let g = gcd(numer.unsigned_abs(), denom.unsigned_abs());
        if g <= 1 {
            return Some(Self { numer, denom });
        }
        let g = g as i128;
        Some(Self {
            numer: numer / g,
            denom: denom / g,
        })
    }

    /// Numerator of the reduced fraction.
    pub fn numer(&self) -> i128 {
        self.numer
    }

    /// Denominator of the reduced fraction (always positive).
    pub fn denom(&self) -> i128 {
        self.denom
    }

    /// True when the value has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.denom == 1
    }

    /// True when the value is strictly below zero.
    pub fn is_negative(&self) -> bool {
        self.numer < 0
    }

    /// Parses a plain decimal literal such as `12`, `-3.25` or `0.001`.
    ///
    /// Exponents are not accepted. The result is exact.
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let text = text.trim();
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text.strip_prefix('+').unwrap_or(text)),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((w, f)) => (w, f),
            None => (digits, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return None;
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return None;
        }
        let fraction = fraction.trim_end_matches('0');
        if fraction.len() > MAX_FRACTION_DIGITS {
            return None;
        }

        let mut numer: i128 = 0;
        for c in whole.chars().chain(fraction.chars()) {
            let digit = c.to_digit(10)? as i128;
            numer = numer.checked_mul(10)?.checked_add(digit)?;
        }
        let denom = 10i128.checked_pow(fraction.len() as u32)?;
        if negative {
            numer = numer.checked_neg()?;
        }
        Self::ratio(numer, denom)
    }

    /// Converts a finite float through its shortest decimal representation.
    ///
    /// `0.1` becomes exactly `1/10`, not the binary approximation. Floats
    /// whose decimal form does not fit are approximated: fractions round to
    /// at most 18 decimal places and magnitudes beyond `i128` saturate.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        if value.fract() == 0.0 && value.abs() < 1e18 {
            return Some(Self::int(value as i64));
        }
        Self::parse_decimal(&value.to_string()).or_else(|| Some(Self::approximate(value)))
    }

    fn approximate(value: f64) -> Self {
        for places in (0..=MAX_APPROX_PLACES).rev() {
            let scale = 10i128.pow(places);
            let scaled = (value * scale as f64).round();
            if scaled.abs() < I128_SAFE_F64 {
                if let Some(n) = Self::ratio(scaled as i128, scale) {
                    return n;
                }
            }
        }
        Self::from_i128(if value < 0.0 { -i128::MAX } else { i128::MAX })
    }

    /// Converts a JSON number.
    pub fn from_json(number: &serde_json::Number) -> Option<Self> {
        if let Some(n) = number.as_i64() {
            return Some(Self::int(n));
        }
        if let Some(n) = number.as_u64() {
            return Some(Self {
                numer: n as i128,
                denom: 1,
            });
        }
        number.as_f64().and_then(Self::from_f64)
    }

    /// Nearest float. Only used for display and as an ordering fallback.
    pub fn to_f64(&self) -> f64 {
        self.numer as f64 / self.denom as f64
    }

    /// Returns the integer value when the number is integral and fits.
    pub fn to_i64(&self) -> Option<i64> {
        if self.is_integer() {
            i64::try_from(self.numer).ok()
        } else {
            None
        }
    }

    pub fn checked_neg(self) -> Option<Self> {
        Some(Self {
            numer: self.numer.checked_neg()?,
            denom: self.denom,
        })
    }

    pub fn checked_add(self, other: Self) -> Option<Self> {
        if self.denom == other.denom {
            return Self::ratio(self.numer.checked_add(other.numer)?, self.denom);
        }
        let numer = self
            .numer
            .checked_mul(other.denom)?
            .checked_add(other.numer.checked_mul(self.denom)?)?;
        Self::ratio(numer, self.denom.checked_mul(other.denom)?)
    }

    pub fn checked_sub(self, other: Self) -> Option<Self> {
        self.checked_add(other.checked_neg()?)
    }

    pub fn checked_mul(self, other: Self) -> Option<Self> {
        // Cross-reduce first to keep intermediates small.
        let g1 = gcd(self.numer.unsigned_abs(), other.denom.unsigned_abs()).max(1) as i128;
        let g2 = gcd(other.numer.unsigned_abs(), self.denom.unsigned_abs()).max(1) as i128;
        let numer = (self.numer / g1).checked_mul(other.numer / g2)?;
        let denom = (self.denom / g2).checked_mul(other.denom / g1)?;
        Self::ratio(numer, denom)
    }

    /// Division; `None` on division by zero.
    pub fn checked_div(self, other: Self) -> Option<Self> {
        if other.numer == 0 {
            return None;
        }
        let inverse = Self::ratio(other.denom, other.numer)?;
        self.checked_mul(inverse)
    }

    /// Renders as a finite decimal when the denominator allows it.
    fn decimal_string(&self) -> Option<String> {
        let mut denom = self.denom;
        let (mut twos, mut fives) = (0u32, 0u32);
        while denom % 2 == 0 {
            denom /= 2;
            twos += 1;
        }
        while denom % 5 == 0 {
            denom /= 5;
            fives += 1;
        }
        if denom != 1 {
            return None;
        }
        let scale = twos.max(fives);
        let factor = 10i128.checked_pow(scale)?.checked_div(self.denom)?;
        let scaled = self.numer.checked_mul(factor)?;
        let digits = scaled.unsigned_abs().to_string();
        let scale = scale as usize;
        let padded = if digits.len() <= scale {
            format!("{}{}", "0".repeat(scale - digits.len() + 1), digits)
        } else {
            digits
        };
        let (whole, fraction) = padded.split_at(padded.len() - scale);
        let sign = if scaled < 0 { "-" } else { "" };
        Some(format!("{sign}{whole}.{fraction}"))
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

impl PartialOrd for Number {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Number {
    fn cmp(&self, other: &Self) -> Ordering {
        if self.denom == other.denom {
            return self.numer.cmp(&other.numer);
        }
        match (
            self.numer.checked_mul(other.denom),
            other.numer.checked_mul(self.denom),
        ) {
            (Some(lhs), Some(rhs)) => lhs.cmp(&rhs),
            _ => self
                .to_f64()
                .partial_cmp(&other.to_f64())
                .unwrap_or(Ordering::Equal),
        }
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self {
        Self::int(n)
    }
}

impl From<i32> for Number {
    fn from(n: i32) -> Self {
        Self::int(n as i64)
    }
}

impl From<u32> for Number {
    fn from(n: u32) -> Self {
        Self::int(n as i64)
    }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_integer() {
            return write!(f, "{}", self.numer);
        }
        match self.decimal_string() {
            Some(text) => f.write_str(&text),
            None => write!(f, "{}/{}", self.numer, self.denom),
        }
    }
}

impl Serialize for Number {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_i64() {
            Some(n) => serializer.serialize_i64(n),
            None => serializer.serialize_f64(self.to_f64()),
        }
    }
}

impl<'de> Deserialize<'de> for Number {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Number::deserialize(deserializer)?;
        Number::from_json(&raw)
            .ok_or_else(|| de::Error::custom(format!("number {raw} is not representable")))
    }
}
