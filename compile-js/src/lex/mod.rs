use crate::char::is_line_terminator;
use crate::char::CharFilter;
use crate::char::DIGIT;
use crate::char::DIGIT_HEX;
use crate::char::ID_CONTINUE;
use crate::char::ID_START;
use crate::char::WHITESPACE;
use crate::loc::Loc;
use crate::token::Token;
use crate::token::TT;
use ahash::HashMap;
use ahash::HashMapExt;
use ahash::HashSet;
use ahash::HashSetExt;
use aho_corasick::AhoCorasick;
use aho_corasick::AhoCorasickBuilder;
use aho_corasick::AhoCorasickKind;
use aho_corasick::Anchored;
use aho_corasick::Input;
use aho_corasick::MatchKind;
use aho_corasick::StartKind;
use memchr::memchr2;
use once_cell::sync::Lazy;

#[cfg(test)]
mod tests;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum LexMode {
  /// `/` and `/=` lex as division punctuators.
  Standard,
  /// `/` opens a regular expression literal.
  SlashIsRegex,
}

#[derive(Copy, Clone)]
pub struct LexerCheckpoint {
  next: usize,
}

pub static KEYWORDS_MAPPING: Lazy<HashMap<&'static str, TT>> = Lazy::new(|| {
  let mut map = HashMap::new();
  map.insert("break", TT::KeywordBreak);
  map.insert("case", TT::KeywordCase);
  map.insert("catch", TT::KeywordCatch);
  map.insert("continue", TT::KeywordContinue);
  map.insert("debugger", TT::KeywordDebugger);
  map.insert("default", TT::KeywordDefault);
  map.insert("delete", TT::KeywordDelete);
  map.insert("do", TT::KeywordDo);
  map.insert("else", TT::KeywordElse);
  map.insert("finally", TT::KeywordFinally);
  map.insert("for", TT::KeywordFor);
  map.insert("function", TT::KeywordFunction);
  map.insert("if", TT::KeywordIf);
  map.insert("in", TT::KeywordIn);
  map.insert("instanceof", TT::KeywordInstanceof);
  map.insert("new", TT::KeywordNew);
  map.insert("return", TT::KeywordReturn);
  map.insert("switch", TT::KeywordSwitch);
  map.insert("this", TT::KeywordThis);
  map.insert("throw", TT::KeywordThrow);
  map.insert("try", TT::KeywordTry);
  map.insert("typeof", TT::KeywordTypeof);
  map.insert("var", TT::KeywordVar);
  map.insert("void", TT::KeywordVoid);
  map.insert("while", TT::KeywordWhile);
  map.insert("with", TT::KeywordWith);
  map.insert("true", TT::LiteralTrue);
  map.insert("false", TT::LiteralFalse);
  map.insert("null", TT::LiteralNull);
  map
});

/// Reserved in every mode (ES5.1 §7.6.1.2).
pub static RESERVED_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  let mut set = HashSet::new();
  set.insert("class");
  set.insert("const");
  set.insert("enum");
  set.insert("export");
  set.insert("extends");
  set.insert("import");
  set.insert("super");
  set
});

/// Additionally reserved when the code is strict. Toggling strict mode
/// changes the token stream, which is why the lexer's strict flag must be
/// resettable at any checkpoint.
pub static STRICT_RESERVED_WORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
  let mut set = HashSet::new();
  set.insert("implements");
  set.insert("interface");
  set.insert("let");
  set.insert("package");
  set.insert("private");
  set.insert("protected");
  set.insert("public");
  set.insert("static");
  set.insert("yield");
  set
});

struct PatternMatcher {
  patterns: Vec<TT>,
  matcher: AhoCorasick,
}

impl PatternMatcher {
  fn new(patterns: Vec<(TT, &'static str)>) -> Self {
    let (tts, syns): (Vec<_>, Vec<_>) = patterns.into_iter().unzip();
    let matcher = AhoCorasickBuilder::new()
      .start_kind(StartKind::Anchored)
      .kind(Some(AhoCorasickKind::DFA))
      .match_kind(MatchKind::LeftmostLongest)
      .build(syns)
      .unwrap();
    PatternMatcher {
      patterns: tts,
      matcher,
    }
  }

  fn find(&self, haystack: &str) -> Option<(TT, usize)> {
    self
      .matcher
      .find(Input::new(haystack).anchored(Anchored::Yes))
      .map(|m| (self.patterns[m.pattern().as_usize()], m.end()))
  }
}

static PUNCTUATORS: Lazy<PatternMatcher> = Lazy::new(|| {
  PatternMatcher::new(vec![
    (TT::Ampersand, "&"),
    (TT::AmpersandAmpersand, "&&"),
    (TT::AmpersandEquals, "&="),
    (TT::Asterisk, "*"),
    (TT::AsteriskEquals, "*="),
    (TT::Bar, "|"),
    (TT::BarBar, "||"),
    (TT::BarEquals, "|="),
    (TT::BraceClose, "}"),
    (TT::BraceOpen, "{"),
    (TT::BracketClose, "]"),
    (TT::BracketOpen, "["),
    (TT::Caret, "^"),
    (TT::CaretEquals, "^="),
    (TT::ChevronLeft, "<"),
    (TT::ChevronLeftChevronLeft, "<<"),
    (TT::ChevronLeftChevronLeftEquals, "<<="),
    (TT::ChevronLeftEquals, "<="),
    (TT::ChevronRight, ">"),
    (TT::ChevronRightChevronRight, ">>"),
    (TT::ChevronRightChevronRightChevronRight, ">>>"),
    (TT::ChevronRightChevronRightChevronRightEquals, ">>>="),
    (TT::ChevronRightChevronRightEquals, ">>="),
    (TT::ChevronRightEquals, ">="),
    (TT::Colon, ":"),
    (TT::Comma, ","),
    (TT::Dot, "."),
    (TT::Equals, "="),
    (TT::EqualsEquals, "=="),
    (TT::EqualsEqualsEquals, "==="),
    (TT::Exclamation, "!"),
    (TT::ExclamationEquals, "!="),
    (TT::ExclamationEqualsEquals, "!=="),
    (TT::Hyphen, "-"),
    (TT::HyphenEquals, "-="),
    (TT::HyphenHyphen, "--"),
    (TT::ParenthesisClose, ")"),
    (TT::ParenthesisOpen, "("),
    (TT::Percent, "%"),
    (TT::PercentEquals, "%="),
    (TT::Plus, "+"),
    (TT::PlusEquals, "+="),
    (TT::PlusPlus, "++"),
    (TT::Question, "?"),
    (TT::Semicolon, ";"),
    (TT::Slash, "/"),
    (TT::SlashEquals, "/="),
    (TT::Tilde, "~"),
  ])
});

pub struct Lexer<'a> {
  source: &'a str,
  next: usize,
  strict: bool,
}

impl<'a> Lexer<'a> {
  pub fn new(source: &'a str) -> Lexer<'a> {
    Lexer {
      source,
      next: 0,
      strict: false,
    }
  }

  pub fn next(&self) -> usize {
    self.next
  }

  pub fn source_range(&self) -> Loc {
    Loc(0, self.source.len())
  }

  pub fn str(&self, loc: Loc) -> &'a str {
    &self.source[loc.0..loc.1]
  }

  /// Strict mode changes the reserved word set; see [`STRICT_RESERVED_WORDS`].
  pub fn set_strict_mode(&mut self, strict: bool) {
    self.strict = strict;
  }

  pub fn strict_mode(&self) -> bool {
    self.strict
  }

  pub fn checkpoint(&self) -> LexerCheckpoint {
    LexerCheckpoint { next: self.next }
  }

  pub fn apply_checkpoint(&mut self, checkpoint: LexerCheckpoint) {
    self.next = checkpoint.next;
  }

  /// WARNING: Prefer checkpoints instead. Only use this if you know what
  /// you're doing (the parser's seek support does).
  pub fn set_next(&mut self, next: usize) {
    self.next = next;
  }

  fn at_end(&self) -> bool {
    self.next >= self.source.len()
  }

  fn peek_char(&self) -> Option<char> {
    self.source[self.next..].chars().next()
  }

  fn rest(&self) -> &'a str {
    &self.source[self.next..]
  }
}

/// Consumes whitespace and comments. Returns whether a line terminator was
/// crossed (a multi-line comment containing one counts, per ASI rules).
fn skip_insignificant(lexer: &mut Lexer) -> Result<bool, Loc> {
  let mut crossed_line_terminator = false;
  loop {
    let Some(c) = lexer.peek_char() else {
      return Ok(crossed_line_terminator);
    };
    if is_line_terminator(c) {
      crossed_line_terminator = true;
      lexer.next += c.len_utf8();
      continue;
    }
    if WHITESPACE.has(c) {
      lexer.next += c.len_utf8();
      continue;
    }
    let rest = lexer.rest();
    if rest.starts_with("//") {
      match rest.find(is_line_terminator) {
        Some(pos) => lexer.next += pos,
        None => lexer.next = lexer.source.len(),
      }
      continue;
    }
    if rest.starts_with("/*") {
      match rest[2..].find("*/") {
        Some(pos) => {
          let body = &rest[2..2 + pos];
          if body.contains(is_line_terminator) {
            crossed_line_terminator = true;
          }
          lexer.next += pos + 4;
        }
        None => {
          let loc = Loc(lexer.next, lexer.source.len());
          lexer.next = lexer.source.len();
          return Err(loc);
        }
      }
      continue;
    }
    return Ok(crossed_line_terminator);
  }
}

fn while_chars(lexer: &Lexer, filter: &CharFilter) -> usize {
  let mut len = 0;
  for c in lexer.rest().chars() {
    if !filter.has(c) {
      break;
    }
    len += c.len_utf8();
  }
  len
}

fn lex_identifier_or_keyword(lexer: &mut Lexer) -> TT {
  let start = lexer.next;
  lexer.next += while_chars(lexer, &ID_CONTINUE);
  let name = &lexer.source[start..lexer.next];
  if let Some(&tt) = KEYWORDS_MAPPING.get(name) {
    return tt;
  }
  if RESERVED_WORDS.contains(name) || (lexer.strict && STRICT_RESERVED_WORDS.contains(name)) {
    return TT::ReservedWord;
  }
  TT::Identifier
}

fn lex_number(lexer: &mut Lexer) -> TT {
  let rest = lexer.rest();
  if rest.starts_with("0x") || rest.starts_with("0X") {
    lexer.next += 2;
    let digits = while_chars(lexer, &DIGIT_HEX);
    if digits == 0 {
      return TT::Invalid;
    }
    lexer.next += digits;
  } else {
    lexer.next += while_chars(lexer, &DIGIT);
    if lexer.peek_char() == Some('.') {
      lexer.next += 1;
      lexer.next += while_chars(lexer, &DIGIT);
    }
    if matches!(lexer.peek_char(), Some('e') | Some('E')) {
      let mark = lexer.next;
      lexer.next += 1;
      if matches!(lexer.peek_char(), Some('+') | Some('-')) {
        lexer.next += 1;
      }
      let digits = while_chars(lexer, &DIGIT);
      if digits == 0 {
        lexer.next = mark;
        return TT::Invalid;
      }
      lexer.next += digits;
    }
  }
  // The character after a numeric literal must not start an identifier.
  match lexer.peek_char() {
    Some(c) if ID_START.has(c) || DIGIT.has(c) => TT::Invalid,
    _ => TT::LiteralNumber,
  }
}

fn lex_string(lexer: &mut Lexer, quote: char) -> TT {
  lexer.next += 1;
  loop {
    let Some(pos) = memchr2(quote as u8, b'\\', lexer.rest().as_bytes()) else {
      lexer.next = lexer.source.len();
      return TT::Invalid;
    };
    // A bare line terminator inside the skipped run ends the literal early.
    if lexer.rest()[..pos].contains(is_line_terminator) {
      return TT::Invalid;
    }
    if lexer.rest().as_bytes()[pos] == quote as u8 {
      lexer.next += pos + 1;
      return TT::LiteralString;
    }
    lexer.next += pos + 1;
    match lexer.peek_char() {
      // A backslash-escaped CRLF pair is one line continuation.
      Some('\r') => {
        lexer.next += 1;
        if lexer.peek_char() == Some('\n') {
          lexer.next += 1;
        }
      }
      Some(c) => lexer.next += c.len_utf8(),
      None => return TT::Invalid,
    }
  }
}

fn lex_regex(lexer: &mut Lexer) -> TT {
  debug_assert_eq!(lexer.peek_char(), Some('/'));
  lexer.next += 1;
  let mut in_class = false;
  loop {
    let Some(c) = lexer.peek_char() else {
      return TT::Invalid;
    };
    if is_line_terminator(c) {
      return TT::Invalid;
    }
    lexer.next += c.len_utf8();
    match c {
      '\\' => match lexer.peek_char() {
        Some(escaped) if !is_line_terminator(escaped) => lexer.next += escaped.len_utf8(),
        _ => return TT::Invalid,
      },
      '[' => in_class = true,
      ']' => in_class = false,
      '/' if !in_class => break,
      _ => {}
    }
  }
  lexer.next += while_chars(lexer, &ID_CONTINUE);
  TT::LiteralRegex
}

pub fn lex_next(lexer: &mut Lexer, mode: LexMode) -> Token {
  let preceded_by_line_terminator = match skip_insignificant(lexer) {
    Ok(crossed) => crossed,
    Err(loc) => {
      return Token {
        loc,
        preceded_by_line_terminator: false,
        typ: TT::Invalid,
      }
    }
  };

  let start = lexer.next;
  let typ = match lexer.peek_char() {
    None => TT::EOF,
    Some(c) if ID_START.has(c) => lex_identifier_or_keyword(lexer),
    Some(c) if DIGIT.has(c) => lex_number(lexer),
    Some('.') if lexer.rest().len() > 1 && DIGIT.has(lexer.rest().as_bytes()[1] as char) => {
      lex_number(lexer)
    }
    Some(c @ ('"' | '\'')) => lex_string(lexer, c),
    Some('/') if mode == LexMode::SlashIsRegex => lex_regex(lexer),
    Some(c) => match PUNCTUATORS.find(lexer.rest()) {
      Some((tt, len)) => {
        lexer.next += len;
        tt
      }
      None => {
        lexer.next += c.len_utf8();
        TT::Invalid
      }
    },
  };

  Token {
    loc: Loc(start, lexer.next),
    preceded_by_line_terminator,
    typ,
  }
}
