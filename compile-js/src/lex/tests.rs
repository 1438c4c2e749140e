use super::*;

fn lex_all(source: &str) -> Vec<TT> {
  let mut lexer = Lexer::new(source);
  let mut out = Vec::new();
  loop {
    let t = lex_next(&mut lexer, LexMode::Standard);
    if t.typ == TT::EOF {
      return out;
    }
    out.push(t.typ);
  }
}

#[test]
fn lexes_keywords_and_identifiers() {
  assert_eq!(lex_all("var x = null;"), vec![
    TT::KeywordVar,
    TT::Identifier,
    TT::Equals,
    TT::LiteralNull,
    TT::Semicolon,
  ]);
}

#[test]
fn longest_punctuator_wins() {
  assert_eq!(lex_all("a >>>= b >>> c >> d > e"), vec![
    TT::Identifier,
    TT::ChevronRightChevronRightChevronRightEquals,
    TT::Identifier,
    TT::ChevronRightChevronRightChevronRight,
    TT::Identifier,
    TT::ChevronRightChevronRight,
    TT::Identifier,
    TT::ChevronRight,
    TT::Identifier,
  ]);
}

#[test]
fn numbers_and_member_access() {
  assert_eq!(lex_all("0xFF .5 1. 1e3"), vec![
    TT::LiteralNumber,
    TT::LiteralNumber,
    TT::LiteralNumber,
    TT::LiteralNumber,
  ]);
  assert_eq!(lex_all("3in"), vec![TT::Invalid, TT::KeywordIn]);
}

#[test]
fn line_terminator_flag_drives_asi() {
  let mut lexer = Lexer::new("a\nb /* x\ny */ c d");
  let a = lex_next(&mut lexer, LexMode::Standard);
  let b = lex_next(&mut lexer, LexMode::Standard);
  let c = lex_next(&mut lexer, LexMode::Standard);
  let d = lex_next(&mut lexer, LexMode::Standard);
  assert!(!a.preceded_by_line_terminator);
  assert!(b.preceded_by_line_terminator);
  // A multi-line comment containing a newline counts.
  assert!(c.preceded_by_line_terminator);
  assert!(!d.preceded_by_line_terminator);
}

#[test]
fn slash_mode_switches_between_division_and_regex() {
  let mut lexer = Lexer::new("/a[/]b/gi");
  let t = lex_next(&mut lexer, LexMode::SlashIsRegex);
  assert_eq!(t.typ, TT::LiteralRegex);
  assert_eq!(t.loc, Loc(0, 9));

  let mut lexer = Lexer::new("/ 2");
  let t = lex_next(&mut lexer, LexMode::Standard);
  assert_eq!(t.typ, TT::Slash);
}

#[test]
fn strict_mode_reserves_more_words() {
  let mut lexer = Lexer::new("let interface");
  assert_eq!(lex_next(&mut lexer, LexMode::Standard).typ, TT::Identifier);
  lexer.set_strict_mode(true);
  assert_eq!(lex_next(&mut lexer, LexMode::Standard).typ, TT::ReservedWord);

  let mut lexer = Lexer::new("class");
  assert_eq!(lex_next(&mut lexer, LexMode::Standard).typ, TT::ReservedWord);
}

#[test]
fn strings_reject_raw_line_terminators() {
  assert_eq!(lex_all("'a\\nb'"), vec![TT::LiteralString]);
  assert_eq!(lex_all("'a\nb'").first(), Some(&TT::Invalid));
  assert_eq!(lex_all("'a\\\nb'"), vec![TT::LiteralString]);
}

#[test]
fn checkpoints_rewind_the_stream() {
  let mut lexer = Lexer::new("a b");
  let cp = lexer.checkpoint();
  let first = lex_next(&mut lexer, LexMode::Standard);
  lex_next(&mut lexer, LexMode::Standard);
  lexer.apply_checkpoint(cp);
  let again = lex_next(&mut lexer, LexMode::Standard);
  assert_eq!(first.loc, again.loc);
}
