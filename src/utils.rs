//! Fixed-point money and rate types.
//!
//! Both are stored as hundredths: `Cents(1050)` is `10.50`, `Rate(1000)` is
//! `10.00%`. JSON carries them as two-decimal strings and accepts either a
//! string or a number on input.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Deserializer, Serialize, Serializer, de};

const SCALE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Cents(pub i64);

/// Percentage in basis points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct Rate(pub i32);

impl Rate {
  pub const MAX: Rate = Rate(100 * SCALE as i32);

  /// `amount * rate`, rounded half up to the cent.
  pub fn apply(self, amount: i64) -> i64 {
    let scaled = amount as i128 * self.0 as i128;
    ((scaled + 5_000) / 10_000) as i64
  }
}

fn format_hundredths(f: &mut fmt::Formatter<'_>, value: i64) -> fmt::Result {
  let sign = if value < 0 { "-" } else { "" };
  let abs = value.unsigned_abs();
  write!(f, "{sign}{}.{:02}", abs / SCALE as u64, abs % SCALE as u64)
}

fn parse_hundredths(input: &str) -> Option<i64> {
  let input = input.trim();
  let (whole, frac) = match input.split_once('.') {
    Some((whole, frac)) => (whole, frac),
    None => (input, ""),
  };

  if whole.is_empty() && frac.is_empty() {
    return None;
  }
  let mut digits = whole.bytes().chain(frac.bytes());
  if frac.len() > 2 || !digits.all(|b| b.is_ascii_digit()) {
    return None;
  }

  let whole: i64 = if whole.is_empty() { 0 } else { whole.parse().ok()? };
  let frac: i64 = match frac.len() {
    0 => 0,
    1 => frac.parse::<i64>().ok()? * 10,
    _ => frac.parse().ok()?,
  };

  whole.checked_mul(SCALE)?.checked_add(frac)
}

impl fmt::Display for Cents {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    format_hundredths(f, self.0)
  }
}

impl fmt::Display for Rate {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    format_hundredths(f, self.0 as i64)
  }
}

impl FromStr for Cents {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse_hundredths(s)
      .map(Cents)
      .ok_or_else(|| format!("invalid amount `{s}`"))
  }
}

impl FromStr for Rate {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    parse_hundredths(s)
      .and_then(|v| i32::try_from(v).ok())
      .map(Rate)
      .ok_or_else(|| format!("invalid rate `{s}`"))
  }
}

impl Serialize for Cents {
  fn serialize<S: Serializer>(
    &self,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

impl Serialize for Rate {
  fn serialize<S: Serializer>(
    &self,
    serializer: S,
  ) -> Result<S::Ok, S::Error> {
    serializer.collect_str(self)
  }
}

struct HundredthsVisitor;

impl de::Visitor<'_> for HundredthsVisitor {
  type Value = i64;

  fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
    f.write_str("a non-negative decimal with at most two fraction digits")
  }

  fn visit_str<E: de::Error>(self, v: &str) -> Result<i64, E> {
    parse_hundredths(v)
      .ok_or_else(|| E::invalid_value(de::Unexpected::Str(v), &self))
  }

  fn visit_u64<E: de::Error>(self, v: u64) -> Result<i64, E> {
    i64::try_from(v)
      .ok()
      .and_then(|v| v.checked_mul(SCALE))
      .ok_or_else(|| E::invalid_value(de::Unexpected::Unsigned(v), &self))
  }

  fn visit_i64<E: de::Error>(self, v: i64) -> Result<i64, E> {
    if v < 0 {
      return Err(E::invalid_value(de::Unexpected::Signed(v), &self));
    }
    v.checked_mul(SCALE)
      .ok_or_else(|| E::invalid_value(de::Unexpected::Signed(v), &self))
  }

  fn visit_f64<E: de::Error>(self, v: f64) -> Result<i64, E> {
    let scaled = (v * SCALE as f64).round();
    if !v.is_finite() || v < 0.0 || scaled > i64::MAX as f64 {
      return Err(E::invalid_value(de::Unexpected::Float(v), &self));
    }
    Ok(scaled as i64)
  }
}

impl<'de> Deserialize<'de> for Cents {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    deserializer.deserialize_any(HundredthsVisitor).map(Cents)
  }
}

impl<'de> Deserialize<'de> for Rate {
  fn deserialize<D: Deserializer<'de>>(
    deserializer: D,
  ) -> Result<Self, D::Error> {
    let value = deserializer.deserialize_any(HundredthsVisitor)?;
    i32::try_from(value).map(Rate).map_err(de::Error::custom)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_display() {
    assert_eq!(Cents(1000).to_string(), "10.00");
    assert_eq!(Cents(5).to_string(), "0.05");
    assert_eq!(Cents(-250).to_string(), "-2.50");
    assert_eq!(Rate(1250).to_string(), "12.50");
  }

  #[test]
  fn test_parse() {
    assert_eq!("50".parse::<Cents>(), Ok(Cents(5000)));
    assert_eq!("49.9".parse::<Cents>(), Ok(Cents(4990)));
    assert_eq!("0.05".parse::<Cents>(), Ok(Cents(5)));
    assert!("1.005".parse::<Cents>().is_err());
    assert!("-3".parse::<Cents>().is_err());
    assert!("abc".parse::<Cents>().is_err());
    assert!(".".parse::<Cents>().is_err());
  }

  #[test]
  fn test_rate_apply() {
    // 10% of 100.00
    assert_eq!(Rate(1000).apply(10_000), 1_000);
    // 10% of 49.99 = 4.999 -> 5.00
    assert_eq!(Rate(1000).apply(4_999), 500);
    // 12.5% of 0.04 = 0.005 -> 0.01
    assert_eq!(Rate(1250).apply(4), 1);
  }

  #[test]
  fn test_json_input_forms() {
    let from_str: Cents = json::from_str("\"50.00\"").unwrap();
    let from_int: Cents = json::from_str("50").unwrap();
    let from_float: Cents = json::from_str("50.1").unwrap();
    assert_eq!(from_str, Cents(5000));
    assert_eq!(from_int, Cents(5000));
    assert_eq!(from_float, Cents(5010));
    assert!(json::from_str::<Cents>("-1").is_err());

    assert_eq!(json::to_string(&Cents(1000)).unwrap(), "\"10.00\"");
    assert_eq!(json::to_string(&Rate(1000)).unwrap(), "\"10.00\"");
  }
}
