use crate::dump::AssignSource;
use crate::dump::Dumper;
use crate::error::CompileError;
use crate::error::CompileErrorType;
use crate::error::CompileResult;
use crate::label::LabelSet;
use crate::lex::lex_next;
use crate::lex::LexMode;
use crate::lex::Lexer;
use crate::lit::has_escape_sequences;
use crate::lit::unescape_string_literal;
use crate::lit::LitTable;
use crate::loc::Loc;
use crate::num::JsNumber;
use crate::optimize;
use crate::scope::Scope;
use crate::scope::ScopeId;
use crate::scope::ScopeKind;
use crate::token::Token;
use crate::token::TT;
use bytecode_js::BytecodeImage;
use bytecode_js::LitId;
use bytecode_js::Operand;
use bytecode_js::ScopeCodeFlags;

pub mod expr;
pub mod func;
pub mod stmt;

/// Kind of an object-literal property, for duplicate-name early errors.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub(crate) enum PropKind {
  Data,
  Getter,
  Setter,
}

struct BufferedToken {
  token: Token,
  lex_mode: LexMode,
  // Tokens lexed under a different strictness are stale: strict mode changes
  // the reserved word set.
  strict: bool,
}

#[derive(Debug)]
#[must_use]
pub struct MaybeToken {
  typ: TT,
  loc: Loc,
  matched: bool,
}

impl MaybeToken {
  pub fn is_match(&self) -> bool {
    self.matched
  }

  pub fn error(&self, typ: CompileErrorType) -> CompileError {
    debug_assert!(!self.matched);
    self.loc.error(typ, Some(self.typ))
  }
}

/// Single-pass recursive-descent compiler driver: consumes the token stream
/// and pushes everything through the dumper. There is no AST.
pub struct Parser<'a> {
  lexer: Lexer<'a>,
  buf: Vec<BufferedToken>,
  next_tok_i: usize,
  // Byte offset at which buf[0] was (or will be) lexed; seeks reset it.
  buf_start: usize,

  pub(crate) dumper: Dumper,
  pub(crate) lits: LitTable,
  pub(crate) labels: LabelSet,
  scope_stack: Vec<ScopeId>,

  pub(crate) inside_eval: bool,
  pub(crate) inside_function: bool,

  prop_name_frames: Vec<Vec<(LitId, PropKind)>>,
  varg_frames: Vec<Vec<LitId>>,
}

impl<'a> Parser<'a> {
  pub fn new(source: &'a str, root_kind: ScopeKind, show_instructions: bool) -> Parser<'a> {
    let dumper = Dumper::new(root_kind, show_instructions);
    let root = dumper.current_scope_id();
    Parser {
      lexer: Lexer::new(source),
      buf: Vec::new(),
      next_tok_i: 0,
      buf_start: 0,
      dumper,
      lits: LitTable::new(),
      labels: LabelSet::new(),
      scope_stack: vec![root],
      inside_eval: false,
      inside_function: false,
      prop_name_frames: Vec::new(),
      varg_frames: Vec::new(),
    }
  }

  // ---------------------------------------------------------------------
  // Token plumbing.

  pub fn str(&self, loc: Loc) -> &'a str {
    self.lexer.str(loc)
  }

  fn reset_to(&mut self, n: usize) {
    self.next_tok_i = n;
    self.buf.truncate(n);
    match self.buf.last() {
      Some(t) => self.lexer.set_next(t.token.loc.1),
      None => self.lexer.set_next(self.buf_start),
    };
  }

  /// Seeks the token stream to an arbitrary byte offset; buffered tokens are
  /// discarded and re-lexed. The parser relies on this for for/for-in
  /// disambiguation, loop re-parses and the directive prologue.
  pub(crate) fn seek(&mut self, offset: usize) {
    self.buf.clear();
    self.next_tok_i = 0;
    self.buf_start = offset;
    self.lexer.set_next(offset);
  }

  fn forward<K: FnOnce(&Token) -> bool>(&mut self, mode: LexMode, keep: K) -> (bool, Token) {
    let strict = self.lexer.strict_mode();
    if self
      .buf
      .get(self.next_tok_i)
      .is_some_and(|t| t.lex_mode != mode || t.strict != strict)
    {
      self.reset_to(self.next_tok_i);
    }
    debug_assert!(self.next_tok_i <= self.buf.len());
    if self.buf.len() == self.next_tok_i {
      let token = lex_next(&mut self.lexer, mode);
      self.buf.push(BufferedToken {
        token,
        lex_mode: mode,
        strict,
      });
    }
    let t = self.buf[self.next_tok_i].token;
    let k = keep(&t);
    if k {
      self.next_tok_i += 1;
    };
    (k, t)
  }

  pub fn consume_with_mode(&mut self, mode: LexMode) -> Token {
    self.forward(mode, |_| true).1
  }

  pub fn consume(&mut self) -> Token {
    self.consume_with_mode(LexMode::Standard)
  }

  pub fn peek_with_mode(&mut self, mode: LexMode) -> Token {
    self.forward(mode, |_| false).1
  }

  pub fn peek(&mut self) -> Token {
    self.peek_with_mode(LexMode::Standard)
  }

  pub fn peek_nth(&mut self, n: usize) -> Token {
    let saved = self.next_tok_i;
    let mut t = self.peek();
    for _ in 0..n {
      self.consume();
      t = self.peek();
    }
    self.next_tok_i = saved;
    t
  }

  pub fn consume_if(&mut self, typ: TT) -> MaybeToken {
    let (matched, t) = self.forward(LexMode::Standard, |t| t.typ == typ);
    MaybeToken {
      typ,
      matched,
      loc: t.loc,
    }
  }

  pub fn require(&mut self, typ: TT) -> CompileResult<Token> {
    let t = self.consume();
    if t.typ != typ {
      Err(t.error(CompileErrorType::RequiredTokenNotFound(typ)))
    } else {
      Ok(t)
    }
  }

  // ---------------------------------------------------------------------
  // Scope helpers.

  pub(crate) fn scope(&self) -> &Scope {
    self.dumper.scope()
  }

  pub(crate) fn scope_mut(&mut self) -> &mut Scope {
    self.dumper.scope_mut()
  }

  pub(crate) fn is_strict_mode(&self) -> bool {
    self.scope().strict_mode
  }

  pub(crate) fn sync_lexer_strict(&mut self) {
    let strict = self.is_strict_mode();
    self.lexer.set_strict_mode(strict);
  }

  pub(crate) fn push_function_scope(&mut self) -> ScopeId {
    let parent = self.dumper.current_scope_id();
    let parent_strict = self.is_strict_mode();
    self.scope_mut().contains_functions = true;
    let child = self.dumper.alloc_scope(Some(parent), ScopeKind::Function);
    self.scope_stack.push(child);
    self.dumper.set_scope(child);
    self.scope_mut().strict_mode = parent_strict;
    self.sync_lexer_strict();
    child
  }

  /// Leaves a completed function scope. Declarations hoist their block ahead
  /// of the parent's body; expressions splice it inline at the use site.
  pub(crate) fn pop_function_scope(&mut self, is_expression: bool) -> CompileResult<()> {
    let child = self.scope_stack.pop().unwrap();
    let parent = *self.scope_stack.last().unwrap();
    self.dumper.set_scope(parent);
    if is_expression {
      self.dumper.dump_subscope(child)?;
    } else {
      self.dumper.attach_subscope(child);
    }
    self.sync_lexer_strict();
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Literal helpers.

  pub(crate) fn lit_err(&self, typ: CompileErrorType, loc: Loc) -> CompileError {
    loc.error(typ, None)
  }

  pub(crate) fn intern_str(&mut self, s: &str, loc: Loc) -> CompileResult<LitId> {
    self.lits.intern_str(s).map_err(|e| self.lit_err(e, loc))
  }

  pub(crate) fn intern_token_text(&mut self, t: Token) -> CompileResult<LitId> {
    let text = self.str(t.loc);
    self.lits.intern_str(text).map_err(|e| self.lit_err(e, t.loc))
  }

  pub(crate) fn intern_string_token(&mut self, t: Token) -> CompileResult<LitId> {
    let raw = self.str(t.loc);
    let value = unescape_string_literal(raw).map_err(|e| self.lit_err(e, t.loc))?;
    self.lits.intern_str(&value).map_err(|e| self.lit_err(e, t.loc))
  }

  pub(crate) fn token_number(&mut self, t: Token) -> CompileResult<JsNumber> {
    JsNumber::from_literal(self.str(t.loc))
      .ok_or_else(|| t.error(CompileErrorType::MalformedNumberLiteral))
  }

  // ---------------------------------------------------------------------
  // Early error checks.

  /// In strict mode, `eval` and `arguments` cannot be targets of assignment
  /// or mutation, nor parameter/declaration names.
  pub(crate) fn check_for_eval_and_arguments_in_strict_mode(
    &self,
    op: Operand,
    strict: bool,
    loc: Loc,
  ) -> CompileResult<()> {
    if !strict {
      return Ok(());
    }
    if let Operand::Lit(lit) = op {
      if self.lits.is_str(lit, "eval") || self.lits.is_str(lit, "arguments") {
        return Err(loc.error(CompileErrorType::EvalOrArgumentsInStrictMode, None));
      }
    }
    Ok(())
  }

  pub(crate) fn start_checking_of_prop_names(&mut self) {
    self.prop_name_frames.push(Vec::new());
  }

  pub(crate) fn add_prop_name(&mut self, lit: LitId, kind: PropKind) {
    self.prop_name_frames.last_mut().unwrap().push((lit, kind));
  }

  pub(crate) fn check_for_duplication_of_prop_names(
    &mut self,
    strict: bool,
    loc: Loc,
  ) -> CompileResult<()> {
    let frame = self.prop_name_frames.pop().unwrap();
    for (i, &(lit, kind)) in frame.iter().enumerate() {
      for &(other_lit, other_kind) in &frame[i + 1..] {
        if lit != other_lit {
          continue;
        }
        match (kind, other_kind) {
          (PropKind::Data, PropKind::Data) => {
            if strict {
              return Err(loc.error(CompileErrorType::DuplicatePropertyName, None));
            }
          }
          (PropKind::Data, _) | (_, PropKind::Data) => {
            return Err(loc.error(CompileErrorType::AccessorAndDataProperty, None));
          }
          (PropKind::Getter, PropKind::Getter) | (PropKind::Setter, PropKind::Setter) => {
            return Err(loc.error(CompileErrorType::DuplicatePropertyName, None));
          }
          _ => {}
        }
      }
    }
    Ok(())
  }

  pub(crate) fn start_checking_of_vargs(&mut self) {
    self.varg_frames.push(Vec::new());
  }

  pub(crate) fn add_varg(&mut self, lit: LitId) {
    self.varg_frames.last_mut().unwrap().push(lit);
  }

  pub(crate) fn check_for_syntax_errors_in_formal_param_list(
    &mut self,
    strict: bool,
    loc: Loc,
  ) -> CompileResult<()> {
    let frame = self.varg_frames.pop().unwrap();
    if !strict {
      return Ok(());
    }
    for (i, &lit) in frame.iter().enumerate() {
      if frame[i + 1..].contains(&lit) {
        return Err(loc.error(CompileErrorType::DuplicateFormalParameter, None));
      }
      if self.lits.is_str(lit, "eval") || self.lits.is_str(lit, "arguments") {
        return Err(loc.error(CompileErrorType::EvalOrArgumentsInStrictMode, None));
      }
    }
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Automatic semicolon insertion.

  /// A statement not ended by `;` must be followed by `}`, EOF, or a token
  /// on a new line.
  pub(crate) fn insert_semicolon(&mut self) -> CompileResult<()> {
    let t = self.peek();
    if t.typ == TT::Semicolon {
      self.consume();
      return Ok(());
    }
    if t.typ == TT::BraceClose || t.typ == TT::EOF || t.preceded_by_line_terminator {
      return Ok(());
    }
    Err(t.error(CompileErrorType::ExpectedSemicolonOrNewline))
  }

  // ---------------------------------------------------------------------
  // Directive prologue.

  /// Scans the leading run of string-literal statements for `"use strict"`
  /// (without escape sequences), then seeks back so the prologue is emitted
  /// as ordinary statements.
  fn check_directive_prologue_for_use_strict(&mut self) -> CompileResult<()> {
    let start = self.peek().loc.0;

    loop {
      let t = self.peek();
      if t.typ != TT::LiteralString {
        break;
      }
      let raw = self.str(t.loc);
      if raw.len() >= 2 && &raw[1..raw.len() - 1] == "use strict" && !has_escape_sequences(raw) {
        self.scope_mut().strict_mode = true;
        self.sync_lexer_strict();
        break;
      }
      self.consume();
      let _ = self.consume_if(TT::Semicolon);
    }

    self.seek(start);
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Source element lists.

  pub(crate) fn parse_source_element(&mut self) -> CompileResult<()> {
    if self.peek().typ == TT::KeywordFunction {
      self.parse_function_declaration()
    } else {
      self.parse_statement(None)
    }
  }

  /// Parses a program or function body: scope header templates, directive
  /// prologue, source elements, then the optimization pass and the header
  /// rewrites.
  pub(crate) fn parse_source_element_list(
    &mut self,
    is_global: bool,
    is_try_replace_local_vars_with_regs: bool,
  ) -> CompileResult<()> {
    let end_tt = if is_global { TT::EOF } else { TT::BraceClose };

    self.dumper.new_scope();
    tracing::trace!(scope = self.dumper.current_scope_id().0, "scope start");

    let mut scope_code_flags_oc = self.dumper.dump_scope_code_flags_for_rewrite()?;

    self.check_directive_prologue_for_use_strict()?;

    let mut reg_var_decl_oc = self.dumper.dump_reg_var_decl_for_rewrite()?;

    if self.inside_eval && !self.inside_function {
      let ret = self.dumper.eval_ret_operand();
      self.dumper.dump_assignment(ret, AssignSource::Undefined)?;
    }

    while !matches!(self.peek().typ, TT::EOF | TT::BraceClose) {
      let t = self.peek();
      // `case`/`default` only mean something inside a switch body.
      if matches!(t.typ, TT::KeywordCase | TT::KeywordDefault) {
        return Err(t.error(CompileErrorType::UnexpectedToken));
      }
      self.parse_source_element()?;
    }

    let t = self.peek();
    if t.typ != end_tt {
      return Err(t.error(CompileErrorType::UnexpectedToken));
    }

    let mut scope_flags = ScopeCodeFlags::empty();
    {
      let scope = self.scope();
      if scope.strict_mode {
        scope_flags |= ScopeCodeFlags::STRICT;
      }
      if !scope.ref_arguments {
        scope_flags |= ScopeCodeFlags::NOT_REF_ARGUMENTS_IDENTIFIER;
      }
      if !scope.ref_eval {
        scope_flags |= ScopeCodeFlags::NOT_REF_EVAL_IDENTIFIER;
      }
    }

    if is_try_replace_local_vars_with_regs && self.scope().kind == ScopeKind::Function {
      scope_flags |= optimize::try_move_vars_to_regs(
        &mut self.dumper,
        &mut scope_code_flags_oc,
        &mut reg_var_decl_oc,
      );
    }

    self.dumper.rewrite_scope_code_flags(scope_code_flags_oc, scope_flags);
    self.dumper.rewrite_reg_var_decl(reg_var_decl_oc);
    self.dumper.finish_scope();
    tracing::trace!(scope = self.dumper.current_scope_id().0, "scope end");
    Ok(())
  }
}

/// Compiles a whole program (or eval body) into a byte-code image. The `?`
/// propagation through every parse routine is the single recovery point: on
/// the first early error all transient state unwinds and no partial byte-code
/// escapes.
pub(crate) fn parse_program(
  source: &str,
  in_eval: bool,
  inherited_strict: bool,
  show_instructions: bool,
) -> CompileResult<(BytecodeImage, Vec<crate::lit::LitValue>, bool)> {
  let root_kind = if in_eval {
    ScopeKind::Eval
  } else {
    ScopeKind::Global
  };
  let mut p = Parser::new(source, root_kind, show_instructions);
  p.inside_eval = in_eval;
  p.scope_mut().strict_mode = inherited_strict;
  p.sync_lexer_strict();

  // Replacement of variables with registers is not attempted for global and
  // eval code: a global variable can be redefined behind the compiler's back.
  p.parse_source_element_list(true, false)?;

  let t = p.peek();
  if t.typ != TT::EOF {
    return Err(t.error(CompileErrorType::UnexpectedToken));
  }

  if in_eval {
    let ret = p.dumper.eval_ret_operand();
    p.dumper.dump_retval(ret)?;
  } else {
    p.dumper.dump_ret()?;
  }

  debug_assert!(p.labels.is_empty());
  let root = p.dumper.current_scope_id();
  let contains_functions = p.scope().contains_functions;
  let image = p.dumper.merge_scopes_into_bytecode(root);
  Ok((image, p.lits.into_values(), contains_functions))
}
