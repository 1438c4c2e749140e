use super::Parser;
use crate::error::CompileErrorType;
use crate::error::CompileResult;
use crate::label::LabelFlags;
use crate::label::LabelId;
use bytecode_js::Operand;
use crate::token::TT;

impl<'a> Parser<'a> {
  /// Consumes a balanced bracket run, starting at the opening token.
  fn skip_braces(&mut self, open: TT) -> CompileResult<()> {
    let close = match open {
      TT::ParenthesisOpen => TT::ParenthesisClose,
      TT::BraceOpen => TT::BraceClose,
      TT::BracketOpen => TT::BracketClose,
      _ => unreachable!(),
    };
    self.require(open)?;
    loop {
      let t = self.peek();
      match t.typ {
        typ if typ == close => break,
        TT::EOF => return Err(t.error(CompileErrorType::UnexpectedEnd)),
        TT::ParenthesisOpen | TT::BraceOpen | TT::BracketOpen => self.skip_braces(t.typ)?,
        _ => {
          self.consume();
        }
      }
    }
    self.require(close)?;
    Ok(())
  }

  /// Scans forward for a token of type `to_find` strictly before byte offset
  /// `end_pos`, optionally skipping whole `{}` blocks. On success the found
  /// token is the next token; otherwise the stream is left at `end_pos`.
  fn find_token_before(
    &mut self,
    to_find: TT,
    end_pos: usize,
    skip_brace_blocks: bool,
  ) -> CompileResult<bool> {
    loop {
      let t = self.peek();
      if t.loc.0 >= end_pos {
        break;
      }
      if skip_brace_blocks {
        if t.typ == TT::BraceOpen {
          self.skip_braces(TT::BraceOpen)?;
          if self.peek().loc.0 >= end_pos {
            break;
          }
          continue;
        }
        if t.typ == TT::BraceClose {
          return Err(t.error(CompileErrorType::UnexpectedToken));
        }
      }
      if t.typ == to_find {
        return Ok(true);
      }
      if t.typ == TT::EOF {
        break;
      }
      self.consume();
    }
    self.seek(end_pos);
    Ok(false)
  }

  pub(crate) fn parse_statement_list(&mut self) -> CompileResult<()> {
    loop {
      self.parse_statement(None)?;
      while self.peek().typ == TT::Semicolon {
        self.consume();
      }
      match self.peek().typ {
        TT::BraceClose | TT::KeywordCase | TT::KeywordDefault | TT::EOF => return Ok(()),
        _ => {}
      }
    }
  }

  fn parse_variable_declaration(&mut self) -> CompileResult<Operand> {
    let t = self.require(TT::Identifier)?;
    let lit = self.intern_token_text(t)?;
    let name = Operand::Lit(lit);

    if !self.scope().variable_exists(lit) {
      let strict = self.is_strict_mode();
      self.check_for_eval_and_arguments_in_strict_mode(name, strict, t.loc)?;
      self.scope_mut().add_variable(lit, false);
    }

    if self.consume_if(TT::Equals).is_match() {
      let expr = self.parse_assignment_expression(true)?;
      self.dumper.dump_variable_assignment(name, expr)?;
    }
    Ok(name)
  }

  fn parse_variable_declaration_list(&mut self) -> CompileResult<()> {
    debug_assert_eq!(self.peek().typ, TT::KeywordVar);
    self.consume();
    loop {
      self.parse_variable_declaration()?;
      if !self.consume_if(TT::Comma).is_match() {
        return Ok(());
      }
    }
  }

  fn parse_if_statement(&mut self) -> CompileResult<()> {
    self.require(TT::KeywordIf)?;
    let cond = self.parse_expression_inside_parens()?;
    self.dumper.dump_conditional_check_for_rewrite(cond)?;

    self.parse_statement(None)?;

    if self.peek().typ == TT::KeywordElse {
      self.consume();
      self.dumper.dump_jump_to_end_for_rewrite()?;
      self.dumper.rewrite_conditional_check()?;
      self.parse_statement(None)?;
      self.dumper.rewrite_jump_to_end()?;
    } else {
      self.dumper.rewrite_conditional_check()?;
    }
    Ok(())
  }

  fn parse_do_while_statement(&mut self, outermost: LabelId) -> CompileResult<()> {
    self.require(TT::KeywordDo)?;

    self.dumper.set_next_iteration_target();
    self.parse_statement(None)?;

    let continue_tgt = self.dumper.current_instr_counter();
    self.labels.setup_continue_target(&mut self.dumper, outermost, continue_tgt)?;

    self.require(TT::KeywordWhile)?;
    let cond = self.parse_expression_inside_parens()?;
    self.dumper.dump_continue_iterations_check(cond)?;
    Ok(())
  }

  /// The condition is emitted at the loop tail for optimal dispatch, so the
  /// lexer is seeked back to it after the body.
  fn parse_while_statement(&mut self, outermost: LabelId) -> CompileResult<()> {
    self.require(TT::KeywordWhile)?;

    let cond_pos = self.peek().loc.0;
    self.skip_braces(TT::ParenthesisOpen)?;

    self.dumper.dump_jump_to_end_for_rewrite()?;
    self.dumper.set_next_iteration_target();

    self.parse_statement(None)?;

    let continue_tgt = self.dumper.current_instr_counter();
    self.labels.setup_continue_target(&mut self.dumper, outermost, continue_tgt)?;

    self.dumper.rewrite_jump_to_end()?;

    let end_pos = self.peek().loc.0;
    self.seek(cond_pos);
    let cond = self.parse_expression_inside_parens()?;
    self.dumper.dump_continue_iterations_check(cond)?;
    self.seek(end_pos);
    Ok(())
  }

  /// Plain `for`. Byte-code layout:
  ///
  /// ```text
  ///                   Initializer
  ///                   Jump -> ConditionCheck
  ///   NextIteration:  Body
  ///   ContinueTarget: Increment
  ///   ConditionCheck: Condition
  ///                   If true, jump -> NextIteration
  /// ```
  fn parse_for_statement(&mut self, outermost: LabelId, body_pos: usize) -> CompileResult<()> {
    self.require(TT::ParenthesisOpen)?;

    let t = self.peek();
    if t.typ == TT::KeywordVar {
      self.parse_variable_declaration_list()?;
    } else if t.typ != TT::Semicolon {
      self.parse_expression(false, false)?;
    }

    self.dumper.dump_jump_to_end_for_rewrite()?;
    self.dumper.set_next_iteration_target();

    self.require(TT::Semicolon)?;

    let cond_pos = self.peek().loc.0;
    if !self.find_token_before(TT::Semicolon, body_pos, true)? {
      return Err(self.peek().error(CompileErrorType::InvalidForStatement));
    }
    self.require(TT::Semicolon)?;
    let increment_pos = self.peek().loc.0;

    self.seek(body_pos);
    self.parse_statement(None)?;
    let loop_end_pos = self.peek().loc.0;

    let continue_tgt = self.dumper.current_instr_counter();
    self.labels.setup_continue_target(&mut self.dumper, outermost, continue_tgt)?;

    self.seek(increment_pos);
    if self.peek().typ != TT::ParenthesisClose {
      self.parse_expression(true, false)?;
    }
    let t = self.peek();
    if t.typ != TT::ParenthesisClose {
      return Err(t.error(CompileErrorType::RequiredTokenNotFound(TT::ParenthesisClose)));
    }

    self.dumper.rewrite_jump_to_end()?;

    self.seek(cond_pos);
    if self.peek().typ == TT::Semicolon {
      self.dumper.dump_continue_iterations_check(Operand::Empty)?;
    } else {
      let cond = self.parse_expression(true, false)?;
      self.dumper.dump_continue_iterations_check(cond)?;
    }

    self.seek(loop_end_pos);
    Ok(())
  }

  /// VariableDeclarationNoIn / LeftHandSideExpression iterator of a for-in.
  /// Returns `(base, name)`: `base` is empty when the iterator is a plain
  /// name.
  fn parse_for_in_statement_iterator(&mut self) -> CompileResult<(Operand, Operand)> {
    if self.peek().typ == TT::KeywordVar {
      self.consume();
      let name = self.parse_variable_declaration()?;
      return Ok((Operand::Empty, name));
    }
    let r = self.parse_left_hand_side_expression()?;
    if r.base.is_empty() {
      Ok((Operand::Empty, r.value))
    } else {
      Ok((r.base, r.prop))
    }
  }

  /// `for (x in collection)`. Byte-code layout:
  ///
  /// ```text
  ///   tmp <- Collection
  ///   for_in tmp, end-mark
  ///     Iterator <- (for-in property name register)
  ///     Body
  ///   ContinueTarget:
  ///   meta(EndForIn)
  /// ```
  fn parse_for_in_statement(&mut self, outermost: LabelId, body_pos: usize) -> CompileResult<()> {
    let is_raised = self.labels.raise_nested_jumpable_border();

    self.require(TT::ParenthesisOpen)?;
    let iterator_pos = self.peek().loc.0;

    if !self.find_token_before(TT::KeywordIn, body_pos, true)? {
      return Err(self.peek().error(CompileErrorType::InvalidForStatement));
    }
    self.require(TT::KeywordIn)?;

    let collection = self.parse_expression(true, false)?;
    self.require(TT::ParenthesisClose)?;

    let for_in_oc = self.dumper.dump_for_in_for_rewrite(collection)?;

    self.seek(iterator_pos);
    let (base, name) = self.parse_for_in_statement_iterator()?;
    let prop_name_reg = self.dumper.for_in_prop_name_operand();
    if base.is_empty() {
      self.dumper.dump_variable_assignment(name, prop_name_reg)?;
    } else {
      self.dumper.dump_prop_setter(base, name, prop_name_reg)?;
    }

    self.seek(body_pos);
    self.parse_statement(None)?;
    let loop_end_pos = self.peek().loc.0;

    let continue_tgt = self.dumper.current_instr_counter();
    self.labels.setup_continue_target(&mut self.dumper, outermost, continue_tgt)?;

    self.dumper.rewrite_for_in(for_in_oc)?;
    self.dumper.dump_for_in_end()?;

    self.seek(loop_end_pos);

    if is_raised {
      self.labels.remove_nested_jumpable_border();
    }
    Ok(())
  }

  /// A `;` ahead of the body's `{` means a plain `for`; otherwise a for-in.
  /// Either way the parenthesized head is re-parsed in the chosen mode.
  fn parse_for_or_for_in_statement(&mut self, outermost: LabelId) -> CompileResult<()> {
    self.require(TT::KeywordFor)?;

    let open_paren_pos = self.peek().loc.0;
    self.skip_braces(TT::ParenthesisOpen)?;
    let body_pos = self.peek().loc.0;

    self.seek(open_paren_pos);
    self.require(TT::ParenthesisOpen)?;
    let is_plain_for = self.find_token_before(TT::Semicolon, body_pos, true)?;
    self.seek(open_paren_pos);

    if is_plain_for {
      self.parse_for_statement(outermost, body_pos)
    } else {
      self.parse_for_in_statement(outermost, body_pos)
    }
  }

  fn parse_iterational_statement(&mut self, outermost_named: Option<LabelId>) -> CompileResult<()> {
    let label = self.labels.push(
      LabelFlags::UNNAMED_BREAKS | LabelFlags::UNNAMED_CONTINUES,
      None,
    );
    let outermost = outermost_named.unwrap_or(label);

    match self.peek().typ {
      TT::KeywordDo => self.parse_do_while_statement(outermost)?,
      TT::KeywordWhile => self.parse_while_statement(outermost)?,
      _ => {
        debug_assert_eq!(self.peek().typ, TT::KeywordFor);
        self.parse_for_or_for_in_statement(outermost)?;
      }
    }

    let target = self.dumper.current_instr_counter();
    self.labels.rewrite_jumps_and_pop(&mut self.dumper, target)?;
    Ok(())
  }

  fn parse_with_statement(&mut self) -> CompileResult<()> {
    let kw = self.require(TT::KeywordWith)?;
    if self.is_strict_mode() {
      return Err(kw.error(CompileErrorType::WithInStrictMode));
    }
    let expr = self.parse_expression_inside_parens()?;

    self.scope_mut().contains_with = true;

    let is_raised = self.labels.raise_nested_jumpable_border();

    let with_begin_oc = self.dumper.dump_with_for_rewrite(expr)?;
    self.parse_statement(None)?;
    self.dumper.rewrite_with(with_begin_oc)?;
    self.dumper.dump_with_end()?;

    if is_raised {
      self.labels.remove_nested_jumpable_border();
    }
    Ok(())
  }

  fn skip_case_clause_body(&mut self) -> CompileResult<()> {
    loop {
      let t = self.peek();
      match t.typ {
        TT::KeywordCase | TT::KeywordDefault | TT::BraceClose => return Ok(()),
        TT::EOF => return Err(t.error(CompileErrorType::UnexpectedEnd)),
        TT::BraceOpen => self.skip_braces(TT::BraceOpen)?,
        _ => {
          self.consume();
        }
      }
    }
  }

  /// Two passes over the case clauses: the first emits the dispatch table of
  /// per-clause checks while recording each body's location, the second
  /// seeks back and emits the bodies in source order with fallthrough.
  fn parse_switch_statement(&mut self) -> CompileResult<()> {
    self.require(TT::KeywordSwitch)?;
    let parens = self.parse_expression_inside_parens()?;
    let switch_expr = self.dump_assignment_of_lhs_if_literal(parens)?;

    let brace = self.require(TT::BraceOpen)?;
    let start_pos = brace.loc.0;

    self.dumper.start_case_clauses();
    let mut was_default = false;
    let mut default_body_index = 0usize;
    let mut body_locs: Vec<usize> = Vec::new();

    loop {
      let t = self.peek();
      if t.typ == TT::KeywordCase {
        self.consume();
        let case_expr = self.parse_expression(true, false)?;
        self.require(TT::Colon)?;
        self.dumper.dump_case_clause_check_for_rewrite(switch_expr, case_expr)?;
        body_locs.push(self.peek().loc.0);
        self.skip_case_clause_body()?;
      } else if t.typ == TT::KeywordDefault {
        if was_default {
          return Err(t.error(CompileErrorType::DuplicateDefaultClause));
        }
        was_default = true;
        self.consume();
        self.require(TT::Colon)?;
        default_body_index = body_locs.len();
        body_locs.push(self.peek().loc.0);
        self.skip_case_clause_body()?;
      } else {
        break;
      }
    }
    let t = self.peek();
    if t.typ != TT::BraceClose {
      return Err(t.error(CompileErrorType::RequiredTokenNotFound(TT::BraceClose)));
    }

    self.dumper.dump_default_clause_check_for_rewrite()?;

    self.seek(start_pos);
    self.require(TT::BraceOpen)?;

    self.labels.push(LabelFlags::UNNAMED_BREAKS, None);

    for i in 0..body_locs.len() {
      self.seek(body_locs[i]);
      if was_default && default_body_index == i {
        self.dumper.rewrite_default_clause()?;
        if self.peek().typ == TT::KeywordCase {
          continue;
        }
      } else {
        self.dumper.rewrite_case_clause()?;
        if matches!(self.peek().typ, TT::KeywordCase | TT::KeywordDefault) {
          continue;
        }
      }
      if self.peek().typ == TT::BraceClose {
        continue;
      }
      self.parse_statement_list()?;
    }

    if !was_default {
      self.dumper.rewrite_default_clause()?;
    }

    self.require(TT::BraceClose)?;

    let target = self.dumper.current_instr_counter();
    self.labels.rewrite_jumps_and_pop(&mut self.dumper, target)?;

    self.dumper.finish_case_clauses();
    Ok(())
  }

  fn parse_catch_clause(&mut self) -> CompileResult<()> {
    self.require(TT::KeywordCatch)?;

    self.require(TT::ParenthesisOpen)?;
    let t = self.require(TT::Identifier)?;
    let lit = self.intern_token_text(t)?;
    let exception = Operand::Lit(lit);
    let strict = self.is_strict_mode();
    self.check_for_eval_and_arguments_in_strict_mode(exception, strict, t.loc)?;
    self.require(TT::ParenthesisClose)?;

    self.dumper.dump_catch_for_rewrite(exception)?;

    self.require(TT::BraceOpen)?;
    if self.peek().typ != TT::BraceClose {
      self.parse_statement_list()?;
    }
    self.require(TT::BraceClose)?;

    self.dumper.rewrite_catch()
  }

  fn parse_finally_clause(&mut self) -> CompileResult<()> {
    self.require(TT::KeywordFinally)?;

    self.dumper.dump_finally_for_rewrite()?;

    self.require(TT::BraceOpen)?;
    if self.peek().typ != TT::BraceClose {
      self.parse_statement_list()?;
    }
    self.require(TT::BraceClose)?;

    self.dumper.rewrite_finally()
  }

  /// Break/continue crossing a try block cannot use a plain jump, so a
  /// jumpable border is raised on the label stack for its duration.
  fn parse_try_statement(&mut self) -> CompileResult<()> {
    self.require(TT::KeywordTry)?;

    self.scope_mut().contains_try = true;

    let is_raised = self.labels.raise_nested_jumpable_border();

    self.dumper.dump_try_for_rewrite()?;

    self.require(TT::BraceOpen)?;
    if self.peek().typ != TT::BraceClose {
      self.parse_statement_list()?;
    }
    self.require(TT::BraceClose)?;

    self.dumper.rewrite_try()?;

    let t = self.peek();
    if t.typ == TT::KeywordCatch {
      self.parse_catch_clause()?;
      if self.peek().typ == TT::KeywordFinally {
        self.parse_finally_clause()?;
      }
    } else if t.typ == TT::KeywordFinally {
      self.parse_finally_clause()?;
    } else {
      return Err(t.error(CompileErrorType::ExpectedSyntax("either 'catch' or 'finally'")));
    }

    self.dumper.dump_end_try_catch_finally()?;

    if is_raised {
      self.labels.remove_nested_jumpable_border();
    }
    Ok(())
  }

  fn parse_break_or_continue_statement(&mut self) -> CompileResult<()> {
    let kw = self.consume();
    let is_break = kw.typ == TT::KeywordBreak;

    let (label, is_simply_jumpable) = if self.peek().typ == TT::Identifier {
      let t = self.consume();
      let lit = self.intern_token_text(t)?;
      match self.labels.find(LabelFlags::NAMED, Some(lit)) {
        Some(found) => found,
        None => return Err(t.error(CompileErrorType::LabelNotFound)),
      }
    } else if is_break {
      match self.labels.find(LabelFlags::UNNAMED_BREAKS, None) {
        Some(found) => found,
        None => return Err(kw.error(CompileErrorType::NoTargetForBreak)),
      }
    } else {
      match self.labels.find(LabelFlags::UNNAMED_CONTINUES, None) {
        Some(found) => found,
        None => return Err(kw.error(CompileErrorType::NoTargetForContinue)),
      }
    };

    self.labels.add_jump(&mut self.dumper, label, is_simply_jumpable, is_break)
  }

  fn parse_return_statement(&mut self) -> CompileResult<()> {
    let kw = self.peek();
    if !self.inside_function {
      return Err(kw.error(CompileErrorType::ReturnOutsideFunction));
    }
    self.consume();

    let t = self.peek();
    if !matches!(t.typ, TT::Semicolon | TT::BraceClose | TT::EOF)
      && !t.preceded_by_line_terminator
    {
      let op = self.parse_expression(true, false)?;
      self.dumper.dump_retval(op)?;
      self.insert_semicolon()?;
    } else {
      self.dumper.dump_ret()?;
    }
    Ok(())
  }

  pub(crate) fn parse_statement(&mut self, outermost_label: Option<LabelId>) -> CompileResult<()> {
    let t = self.peek();
    self.dumper.new_statement(t.loc);

    match t.typ {
      TT::BraceClose => Ok(()),
      TT::BraceOpen => {
        self.consume();
        if self.peek().typ != TT::BraceClose {
          self.parse_statement_list()?;
        }
        self.require(TT::BraceClose)?;
        Ok(())
      }
      TT::KeywordVar => {
        self.parse_variable_declaration_list()?;
        self.insert_semicolon()
      }
      TT::KeywordFunction => self.parse_function_declaration(),
      TT::Semicolon => {
        self.consume();
        Ok(())
      }
      TT::KeywordCase | TT::KeywordDefault => Ok(()),
      TT::KeywordIf => self.parse_if_statement(),
      TT::KeywordDo | TT::KeywordWhile | TT::KeywordFor => {
        self.parse_iterational_statement(outermost_label)
      }
      TT::KeywordBreak | TT::KeywordContinue => self.parse_break_or_continue_statement(),
      TT::KeywordReturn => self.parse_return_statement(),
      TT::KeywordWith => self.parse_with_statement(),
      TT::KeywordSwitch => self.parse_switch_statement(),
      TT::KeywordThrow => {
        self.consume();
        let op = self.parse_expression(true, false)?;
        self.insert_semicolon()?;
        self.dumper.dump_throw(op)
      }
      TT::KeywordTry => self.parse_try_statement(),
      TT::KeywordDebugger => {
        self.consume();
        self.insert_semicolon()
      }
      TT::Identifier if self.peek_nth(1).typ == TT::Colon => {
        let name = self.consume();
        self.consume();
        let lit = self.intern_token_text(name)?;
        if self.labels.find(LabelFlags::NAMED, Some(lit)).is_some() {
          return Err(name.error(CompileErrorType::DuplicateLabel));
        }
        let label = self.labels.push(LabelFlags::NAMED, Some(lit));
        self.parse_statement(Some(outermost_label.unwrap_or(label)))?;
        let target = self.dumper.current_instr_counter();
        self.labels.rewrite_jumps_and_pop(&mut self.dumper, target)
      }
      _ => {
        let expr = self.parse_expression(true, true)?;
        self.dump_assignment_of_lhs_if_literal(expr)?;
        self.insert_semicolon()
      }
    }
  }
}
