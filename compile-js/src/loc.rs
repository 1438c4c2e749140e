use crate::error::CompileError;
use crate::error::CompileErrorType;
use crate::token::TT;
use std::cmp::max;
use std::cmp::min;

/// A location within the current source file expressed as UTF-8 byte offsets.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct Loc(pub usize, pub usize);

impl Loc {
  pub fn error(self, typ: CompileErrorType, actual_token: Option<TT>) -> CompileError {
    CompileError::new(typ, self, actual_token)
  }

  pub fn is_empty(&self) -> bool {
    self.0 >= self.1
  }

  pub fn len(&self) -> usize {
    self.1 - self.0
  }

  pub fn extend(&mut self, other: Loc) {
    self.0 = min(self.0, other.0);
    self.1 = max(self.1, other.1);
  }
}

/// 1-based line and column of a byte offset, for error reporting.
pub fn line_col(source: &str, offset: usize) -> (u32, u32) {
  let offset = offset.min(source.len());
  let mut line = 1;
  let mut col = 1;
  for c in source[..offset].chars() {
    match c {
      '\n' | '\u{2028}' | '\u{2029}' => {
        line += 1;
        col = 1;
      }
      '\r' => {}
      _ => col += 1,
    }
  }
  (line, col)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn line_col_counts_terminators() {
    let src = "a;\nbb;\ncc";
    assert_eq!(line_col(src, 0), (1, 1));
    assert_eq!(line_col(src, 3), (2, 1));
    assert_eq!(line_col(src, 8), (3, 2));
  }

  #[test]
  fn extend_grows_both_ends() {
    let mut loc = Loc(4, 6);
    loc.extend(Loc(1, 5));
    assert_eq!(loc, Loc(1, 6));
    assert_eq!(loc.len(), 5);
  }
}
