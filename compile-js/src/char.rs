use ahash::HashSet;
use ahash::HashSetExt;
use core::ops::RangeInclusive;
use once_cell::sync::Lazy;

#[derive(Clone)]
pub struct CharFilter {
  chars: HashSet<char>,
}

impl CharFilter {
  pub fn new() -> CharFilter {
    CharFilter {
      chars: HashSet::new(),
    }
  }

  pub fn add_char(&mut self, c: char) {
    self.chars.insert(c);
  }

  pub fn add_chars(&mut self, chars: RangeInclusive<char>) {
    for c in chars {
      self.chars.insert(c);
    }
  }

  pub fn add_chars_from_slice(&mut self, chars: &str) {
    for c in chars.chars() {
      self.chars.insert(c);
    }
  }

  pub fn has(&self, c: char) -> bool {
    self.chars.contains(&c)
  }
}

impl Default for CharFilter {
  fn default() -> Self {
    CharFilter::new()
  }
}

// WARNING: These do not consider Unicode characters allowed by spec.
pub const ID_START_CHARSTR: &str = "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ_$";

pub static DIGIT: Lazy<CharFilter> = Lazy::new(|| {
  let mut filter = CharFilter::new();
  filter.add_chars('0'..='9');
  filter
});

pub static DIGIT_HEX: Lazy<CharFilter> = Lazy::new(|| {
  let mut filter = CharFilter::new();
  filter.add_chars('0'..='9');
  filter.add_chars('a'..='f');
  filter.add_chars('A'..='F');
  filter
});

pub static ID_START: Lazy<CharFilter> = Lazy::new(|| {
  let mut filter = CharFilter::new();
  filter.add_chars_from_slice(ID_START_CHARSTR);
  filter
});

pub static ID_CONTINUE: Lazy<CharFilter> = Lazy::new(|| {
  let mut filter = ID_START.clone();
  // WARNING: Does not consider Unicode characters allowed by spec.
  filter.add_chars('0'..='9');
  filter
});

pub fn is_line_terminator(c: char) -> bool {
  matches!(c, '\u{0a}' | '\u{0d}' | '\u{2028}' | '\u{2029}')
}

pub static WHITESPACE: Lazy<CharFilter> = Lazy::new(|| {
  let mut filter = CharFilter::new();
  // Horizontal tab.
  filter.add_char('\x09');
  // Vertical tab.
  filter.add_char('\x0b');
  // Form feed.
  filter.add_char('\x0c');
  // Space.
  filter.add_char('\x20');
  filter.add_char('\u{00A0}'); // NO-BREAK SPACE
  filter.add_char('\u{FEFF}'); // ZERO WIDTH NO-BREAK SPACE (BOM)
  filter.add_char('\u{1680}');
  filter.add_char('\u{2000}');
  filter.add_char('\u{2001}');
  filter.add_char('\u{2002}');
  filter.add_char('\u{2003}');
  filter.add_char('\u{2004}');
  filter.add_char('\u{2005}');
  filter.add_char('\u{2006}');
  filter.add_char('\u{2007}');
  filter.add_char('\u{2008}');
  filter.add_char('\u{2009}');
  filter.add_char('\u{200A}');
  filter.add_char('\u{202F}');
  filter.add_char('\u{205F}');
  filter.add_char('\u{3000}');
  filter
});
