use crate::error::CompileErrorType;
use crate::num::JsNumber;
use ahash::HashMap;
use ahash::HashMapExt;
use bytecode_js::LitId;
use serde::Serialize;

#[derive(Clone, Eq, PartialEq, Hash, Debug, Serialize)]
pub enum LitValue {
  Str(String),
  Num(JsNumber),
}

/// Interning table for identifier names, string/number literals and regexp
/// sources. Ids are 16-bit compressed references carried in op-meta literal
/// slots.
#[derive(Default)]
pub struct LitTable {
  values: Vec<LitValue>,
  index: HashMap<LitValue, LitId>,
}

impl LitTable {
  pub fn new() -> LitTable {
    LitTable::default()
  }

  fn intern(&mut self, value: LitValue) -> Result<LitId, CompileErrorType> {
    if let Some(&id) = self.index.get(&value) {
      return Ok(id);
    }
    let id = LitId(
      u16::try_from(self.values.len()).map_err(|_| CompileErrorType::TooManyLiterals)?,
    );
    self.values.push(value.clone());
    self.index.insert(value, id);
    Ok(id)
  }

  pub fn intern_str(&mut self, s: &str) -> Result<LitId, CompileErrorType> {
    self.intern(LitValue::Str(s.to_string()))
  }

  pub fn intern_num(&mut self, n: JsNumber) -> Result<LitId, CompileErrorType> {
    self.intern(LitValue::Num(n))
  }

  pub fn get(&self, id: LitId) -> &LitValue {
    &self.values[id.0 as usize]
  }

  pub fn str_value(&self, id: LitId) -> Option<&str> {
    match self.get(id) {
      LitValue::Str(s) => Some(s),
      LitValue::Num(_) => None,
    }
  }

  pub fn is_str(&self, id: LitId, expected: &str) -> bool {
    self.str_value(id) == Some(expected)
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }

  /// Finalizes the table into the id-ordered literal array the byte-code
  /// image is paired with.
  pub fn into_values(self) -> Vec<LitValue> {
    self.values
  }
}

/// Whether the raw literal (quotes included) contains any escape sequence.
/// The `"use strict"` directive is only recognized without escapes.
pub fn has_escape_sequences(raw: &str) -> bool {
  raw.contains('\\')
}

/// Decodes the body of a string literal token (quotes included) into its
/// string value.
pub fn unescape_string_literal(raw: &str) -> Result<String, CompileErrorType> {
  debug_assert!(raw.len() >= 2);
  let body = &raw[1..raw.len() - 1];
  let mut out = String::with_capacity(body.len());
  let mut chars = body.chars();
  while let Some(c) = chars.next() {
    if c != '\\' {
      out.push(c);
      continue;
    }
    let Some(escaped) = chars.next() else {
      return Err(CompileErrorType::InvalidCharacterEscape);
    };
    match escaped {
      'b' => out.push('\u{8}'),
      'f' => out.push('\u{c}'),
      'n' => out.push('\n'),
      'r' => out.push('\r'),
      't' => out.push('\t'),
      'v' => out.push('\u{b}'),
      '0' => out.push('\0'),
      'x' => {
        let hi = chars.next().ok_or(CompileErrorType::InvalidCharacterEscape)?;
        let lo = chars.next().ok_or(CompileErrorType::InvalidCharacterEscape)?;
        let code = hex_pair(hi, lo).ok_or(CompileErrorType::InvalidCharacterEscape)?;
        out.push(code as u8 as char);
      }
      'u' => {
        let mut code: u32 = 0;
        for _ in 0..4 {
          let digit = chars
            .next()
            .and_then(|c| c.to_digit(16))
            .ok_or(CompileErrorType::InvalidCharacterEscape)?;
          code = code * 16 + digit;
        }
        // Lone surrogates are preserved as the replacement character; the
        // engine's strings are UTF-8.
        out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
      }
      // Line continuation produces no characters.
      '\n' | '\u{2028}' | '\u{2029}' => {}
      '\r' => {
        if chars.clone().next() == Some('\n') {
          chars.next();
        }
      }
      other => out.push(other),
    }
  }
  Ok(out)
}

fn hex_pair(hi: char, lo: char) -> Option<u32> {
  Some(hi.to_digit(16)? * 16 + lo.to_digit(16)?)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn interning_is_stable() {
    let mut lits = LitTable::new();
    let a = lits.intern_str("x").unwrap();
    let b = lits.intern_str("y").unwrap();
    let a2 = lits.intern_str("x").unwrap();
    assert_eq!(a, a2);
    assert_ne!(a, b);
    assert!(lits.is_str(a, "x"));
  }

  #[test]
  fn numbers_and_strings_do_not_collide() {
    let mut lits = LitTable::new();
    let s = lits.intern_str("1").unwrap();
    let n = lits.intern_num(JsNumber(1.0)).unwrap();
    assert_ne!(s, n);
  }

  #[test]
  fn unescapes_common_sequences() {
    assert_eq!(unescape_string_literal(r#""a\nb""#).unwrap(), "a\nb");
    assert_eq!(unescape_string_literal(r#""\x41""#).unwrap(), "A");
    assert_eq!(unescape_string_literal(r#""A""#).unwrap(), "A");
    assert_eq!(unescape_string_literal(r#""\q""#).unwrap(), "q");
    assert_eq!(unescape_string_literal("\"a\\\nb\"").unwrap(), "ab");
    assert!(unescape_string_literal(r#""\x4""#).is_err());
  }
}
