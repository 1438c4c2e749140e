use core::hash::Hash;
use core::hash::Hasher;
use num_bigint::BigUint;
use serde::Serialize;
use serde::Serializer;
use std::cmp::Ordering;
use std::fmt;
use std::fmt::Display;
use std::fmt::Formatter;

/// A JS number value with JS equality semantics (NaN == NaN, +0 == -0 is
/// distinguished only by sign bit) so it can key the literal table.
#[derive(Copy, Clone, Debug)]
pub struct JsNumber(pub f64);

impl JsNumber {
  /// Parse an ES5.1 source text numeric literal into a JS number value.
  pub fn from_literal(raw: &str) -> Option<Self> {
    parse_number_literal(raw).map(Self)
  }

  /// Integral values in `0..=255` are emitted as smallint assignments rather
  /// than literal-table references.
  pub fn as_small_int(self) -> Option<u8> {
    if self.0.fract() == 0.0 && self.0 >= 0.0 && self.0 <= 255.0 && !self.0.is_sign_negative() {
      Some(self.0 as u8)
    } else {
      None
    }
  }

  pub fn to_bits(self) -> u64 {
    self.0.to_bits()
  }
}

impl Display for JsNumber {
  fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
    if self.0.is_nan() {
      return f.write_str("NaN");
    }
    if self.0.is_infinite() {
      return f.write_str(if self.0.is_sign_negative() {
        "-Infinity"
      } else {
        "Infinity"
      });
    }
    let mut buffer = ryu::Buffer::new();
    let formatted = buffer.format_finite(self.0);
    if let Some(stripped) = formatted.strip_suffix(".0") {
      f.write_str(stripped)
    } else {
      f.write_str(formatted)
    }
  }
}

impl PartialEq for JsNumber {
  fn eq(&self, other: &Self) -> bool {
    if self.0.is_nan() {
      return other.0.is_nan();
    };
    self.0.to_bits() == other.0.to_bits()
  }
}

impl Eq for JsNumber {}

impl Ord for JsNumber {
  fn cmp(&self, other: &Self) -> Ordering {
    // Only NaNs cannot be compared, and we treat them as equal.
    self.0.partial_cmp(&other.0).unwrap_or(Ordering::Equal)
  }
}

impl PartialOrd for JsNumber {
  fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
    Some(self.cmp(other))
  }
}

impl Hash for JsNumber {
  fn hash<H: Hasher>(&self, state: &mut H) {
    if !self.0.is_nan() {
      self.0.to_bits().hash(state);
    };
  }
}

impl Serialize for JsNumber {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(self.0)
  }
}

fn parse_decimal(raw: &str) -> Option<f64> {
  fast_float::parse(raw).ok()
}

fn parse_decimal_literal(raw: &str) -> Option<f64> {
  let mut cleaned = raw.to_string();
  if cleaned.starts_with('.') {
    cleaned.insert(0, '0');
  }
  if cleaned.ends_with('.') {
    cleaned.push('0');
  }
  parse_decimal(&cleaned)
}

fn parse_integer_literal(raw_digits: &str, radix: u32) -> Option<f64> {
  if raw_digits.is_empty() {
    return None;
  }
  let bigint = BigUint::parse_bytes(raw_digits.as_bytes(), radix)?;
  let decimal = bigint.to_str_radix(10);
  parse_decimal(&decimal)
}

fn parse_number_literal(raw: &str) -> Option<f64> {
  if let Some(rest) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
    return parse_integer_literal(rest, 16);
  }

  // Legacy leading-zero literals: all-octal digits parse as octal, while
  // `08`/`09` fall back to decimal.
  if raw.starts_with('0') && raw.len() > 1 && !raw.contains(['.', 'e', 'E']) {
    let digits = &raw[1..];
    if digits.chars().all(|c| c.is_ascii_digit()) {
      if digits.chars().all(|c| ('0'..='7').contains(&c)) {
        return parse_integer_literal(raw, 8);
      }
      return parse_decimal_literal(raw);
    }
  }
  parse_decimal_literal(raw)
}
