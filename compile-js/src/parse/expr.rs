use super::Parser;
use crate::dump::AssignSource;
use crate::dump::VargKind;
use crate::error::CompileErrorType;
use crate::error::CompileResult;
use crate::lex::LexMode;
use bytecode_js::Op;
use bytecode_js::Operand;
use crate::token::TT;

/// Result of parsing a left-hand-side-producing expression. When the
/// expression evaluates to an object-based reference, `base`/`prop` carry the
/// reference's base object and property name for write-back sequences;
/// otherwise they are empty.
#[derive(Copy, Clone, Debug)]
pub(crate) struct ExprRef {
  pub value: Operand,
  pub base: Operand,
  pub prop: Operand,
}

impl ExprRef {
  fn plain(value: Operand) -> ExprRef {
    ExprRef {
      value,
      base: Operand::Empty,
      prop: Operand::Empty,
    }
  }
}

impl<'a> Parser<'a> {
  /// Binary operand slots never carry a literal on the left-hand side: a
  /// still-unresolved literal reference is materialized into a temp first.
  pub(crate) fn dump_assignment_of_lhs_if_literal(
    &mut self,
    lhs: Operand,
  ) -> CompileResult<Operand> {
    if lhs.is_lit() {
      self.dumper.variable_assignment_res(lhs)
    } else {
      Ok(lhs)
    }
  }

  fn parse_literal(&mut self) -> CompileResult<Operand> {
    let t = self.consume();
    match t.typ {
      TT::LiteralNumber => {
        let num = self.token_number(t)?;
        match num.as_small_int() {
          Some(value) => self.dumper.assignment_res(AssignSource::Smallint(value)),
          None => {
            let lit = self.lits.intern_num(num).map_err(|e| self.lit_err(e, t.loc))?;
            self.dumper.assignment_res(AssignSource::Number(lit))
          }
        }
      }
      TT::LiteralString => {
        let lit = self.intern_string_token(t)?;
        self.dumper.assignment_res(AssignSource::Str(lit))
      }
      TT::LiteralRegex => {
        let lit = self.intern_token_text(t)?;
        self.dumper.assignment_res(AssignSource::Regexp(lit))
      }
      TT::LiteralNull => self.dumper.assignment_res(AssignSource::Null),
      TT::LiteralTrue => self.dumper.assignment_res(AssignSource::Bool(true)),
      TT::LiteralFalse => self.dumper.assignment_res(AssignSource::Bool(false)),
      _ => Err(t.error(CompileErrorType::ExpectedSyntax("literal"))),
    }
  }

  fn parse_primary_expression(&mut self) -> CompileResult<Operand> {
    let t = self.peek();
    match t.typ {
      TT::KeywordThis => {
        self.consume();
        Ok(self.dumper.this_res())
      }
      // Must be a regexp literal, so rescan the token.
      TT::Slash | TT::SlashEquals => {
        let t = self.peek_with_mode(LexMode::SlashIsRegex);
        if t.typ != TT::LiteralRegex {
          return Err(t.error(CompileErrorType::UnexpectedToken));
        }
        self.parse_literal_with_mode_regex()
      }
      TT::LiteralNull
      | TT::LiteralTrue
      | TT::LiteralFalse
      | TT::LiteralNumber
      | TT::LiteralString => self.parse_literal(),
      TT::Identifier => {
        self.consume();
        let name = self.str(t.loc);
        if name == "arguments" {
          self.scope_mut().ref_arguments = true;
        }
        if name == "eval" {
          self.scope_mut().ref_eval = true;
        }
        let lit = self.intern_token_text(t)?;
        Ok(Operand::Lit(lit))
      }
      TT::BracketOpen => self.parse_argument_list(VargKind::ArrayDecl, Operand::Empty, None),
      TT::BraceOpen => self.parse_argument_list(VargKind::ObjDecl, Operand::Empty, None),
      TT::ParenthesisOpen => {
        self.consume();
        let res = self.parse_expression(true, false)?;
        self.require(TT::ParenthesisClose)?;
        Ok(res)
      }
      TT::EOF => Err(t.error(CompileErrorType::UnexpectedEnd)),
      _ => Err(t.error(CompileErrorType::UnexpectedToken)),
    }
  }

  fn parse_literal_with_mode_regex(&mut self) -> CompileResult<Operand> {
    let t = self.consume_with_mode(LexMode::SlashIsRegex);
    debug_assert_eq!(t.typ, TT::LiteralRegex);
    let lit = self.intern_token_text(t)?;
    self.dumper.assignment_res(AssignSource::Regexp(lit))
  }

  pub(crate) fn parse_member_expression(&mut self) -> CompileResult<ExprRef> {
    let t = self.peek();
    let mut expr = match t.typ {
      TT::KeywordFunction => self.parse_function_expression()?,
      TT::KeywordNew => {
        self.consume();
        let constructed = self.parse_member_expression()?.value;
        if self.peek().typ == TT::ParenthesisOpen {
          self.parse_argument_list(VargKind::ConstructExpr, constructed, None)?
        } else {
          self.dumper.start_varg_header(VargKind::ConstructExpr, constructed)?;
          self.dumper.rewrite_varg_header_set_args_count(0, t.loc)?
        }
      }
      _ => self.parse_primary_expression()?,
    };

    let mut base = Operand::Empty;
    let mut prop = Operand::Empty;
    loop {
      let t = self.peek();
      match t.typ {
        TT::BracketOpen => {
          self.consume();
          prop = self.parse_expression(true, false)?;
          self.require(TT::BracketClose)?;
        }
        TT::Dot => {
          self.consume();
          let name = self.peek();
          if name.typ == TT::Identifier || name.typ.is_keyword_or_literal_name() {
            self.consume();
            let lit = self.intern_token_text(name)?;
            prop = self.dumper.assignment_res(AssignSource::Str(lit))?;
          } else {
            return Err(name.error(CompileErrorType::ExpectedSyntax("identifier")));
          }
        }
        _ => break,
      }
      base = expr;
      expr = self.dumper.prop_getter_res(expr, prop)?;
    }

    Ok(ExprRef {
      value: expr,
      base,
      prop,
    })
  }

  fn parse_call_expression(&mut self) -> CompileResult<ExprRef> {
    let member = self.parse_member_expression()?;
    if self.peek().typ != TT::ParenthesisOpen {
      return Ok(member);
    }

    let mut this_arg = member.base;
    let mut prop = member.prop;
    let mut expr = self.parse_argument_list(VargKind::CallExpr, member.value, Some(this_arg))?;
    this_arg = Operand::Empty;

    loop {
      let t = self.peek();
      match t.typ {
        TT::ParenthesisOpen => {
          expr = self.parse_argument_list(VargKind::CallExpr, expr, Some(this_arg))?;
        }
        TT::BracketOpen => {
          this_arg = expr;
          self.consume();
          prop = self.parse_expression(true, false)?;
          self.require(TT::BracketClose)?;
          expr = self.dumper.prop_getter_res(expr, prop)?;
        }
        TT::Dot => {
          this_arg = expr;
          self.consume();
          let name = self.require(TT::Identifier)?;
          let lit = self.intern_token_text(name)?;
          prop = self.dumper.assignment_res(AssignSource::Str(lit))?;
          expr = self.dumper.prop_getter_res(expr, prop)?;
        }
        _ => break,
      }
    }

    Ok(ExprRef {
      value: expr,
      base: this_arg,
      prop,
    })
  }

  pub(crate) fn parse_left_hand_side_expression(&mut self) -> CompileResult<ExprRef> {
    self.parse_call_expression()
  }

  fn parse_postfix_expression(&mut self) -> CompileResult<ExprRef> {
    let r = self.parse_left_hand_side_expression()?;

    let t = self.peek();
    if t.preceded_by_line_terminator {
      return Ok(r);
    }
    let expr = match t.typ {
      TT::PlusPlus => {
        self.consume();
        self.check_for_eval_and_arguments_in_strict_mode(r.value, self.is_strict_mode(), t.loc)?;
        let res = self.dumper.post_incr_res(r.value)?;
        if !r.base.is_empty() && !r.prop.is_empty() {
          self.dumper.dump_prop_setter(r.base, r.prop, r.value)?;
        }
        res
      }
      TT::HyphenHyphen => {
        self.consume();
        self.check_for_eval_and_arguments_in_strict_mode(r.value, self.is_strict_mode(), t.loc)?;
        let res = self.dumper.post_decr_res(r.value)?;
        if !r.base.is_empty() && !r.prop.is_empty() {
          self.dumper.dump_prop_setter(r.base, r.prop, r.value)?;
        }
        res
      }
      _ => return Ok(r),
    };
    Ok(ExprRef {
      value: expr,
      base: r.base,
      prop: r.prop,
    })
  }

  pub(crate) fn parse_unary_expression(&mut self) -> CompileResult<ExprRef> {
    let t = self.peek();
    let r = match t.typ {
      TT::PlusPlus => {
        self.consume();
        let operand = self.parse_unary_expression()?;
        self.check_for_eval_and_arguments_in_strict_mode(
          operand.value,
          self.is_strict_mode(),
          t.loc,
        )?;
        let expr = self.dumper.pre_incr_res(operand.value, t.loc)?;
        if !operand.base.is_empty() && !operand.prop.is_empty() {
          self.dumper.dump_prop_setter(operand.base, operand.prop, expr)?;
        }
        ExprRef {
          value: expr,
          ..operand
        }
      }
      TT::HyphenHyphen => {
        self.consume();
        let operand = self.parse_unary_expression()?;
        self.check_for_eval_and_arguments_in_strict_mode(
          operand.value,
          self.is_strict_mode(),
          t.loc,
        )?;
        let expr = self.dumper.pre_decr_res(operand.value, t.loc)?;
        if !operand.base.is_empty() && !operand.prop.is_empty() {
          self.dumper.dump_prop_setter(operand.base, operand.prop, expr)?;
        }
        ExprRef {
          value: expr,
          ..operand
        }
      }
      TT::Plus => {
        self.consume();
        let operand = self.parse_unary_expression()?.value;
        ExprRef::plain(self.dumper.unary_res(Op::UnaryPlus, operand)?)
      }
      TT::Hyphen => {
        self.consume();
        let operand = self.parse_unary_expression()?.value;
        ExprRef::plain(self.dumper.unary_res(Op::UnaryMinus, operand)?)
      }
      TT::Tilde => {
        self.consume();
        let operand = self.parse_unary_expression()?.value;
        ExprRef::plain(self.dumper.unary_res(Op::BNot, operand)?)
      }
      TT::Exclamation => {
        self.consume();
        let operand = self.parse_unary_expression()?.value;
        ExprRef::plain(self.dumper.unary_res(Op::LogicalNot, operand)?)
      }
      TT::KeywordDelete => {
        self.scope_mut().contains_delete = true;
        self.consume();
        let operand = self.parse_unary_expression()?.value;
        let strict = self.is_strict_mode();
        let res = self.dumper.delete_res(&self.lits, operand, strict, t.loc)?;
        ExprRef::plain(res)
      }
      TT::KeywordVoid => {
        self.consume();
        let operand = self.parse_unary_expression()?.value;
        let expr = self.dumper.variable_assignment_res(operand)?;
        self.dumper.dump_assignment(expr, AssignSource::Undefined)?;
        ExprRef::plain(expr)
      }
      TT::KeywordTypeof => {
        self.consume();
        let operand = self.parse_unary_expression()?.value;
        ExprRef::plain(self.dumper.typeof_res(operand)?)
      }
      _ => self.parse_postfix_expression()?,
    };
    Ok(r)
  }

  fn parse_multiplicative_expression(&mut self) -> CompileResult<Operand> {
    let mut expr = self.parse_unary_expression()?.value;
    loop {
      let op = match self.peek().typ {
        TT::Asterisk => Op::Multiplication,
        TT::Slash => Op::Division,
        TT::Percent => Op::Remainder,
        _ => break,
      };
      expr = self.dump_assignment_of_lhs_if_literal(expr)?;
      self.consume();
      let rhs = self.parse_unary_expression()?.value;
      expr = self.dumper.binary_res(op, expr, rhs)?;
    }
    Ok(expr)
  }

  fn parse_additive_expression(&mut self) -> CompileResult<Operand> {
    let mut expr = self.parse_multiplicative_expression()?;
    loop {
      let op = match self.peek().typ {
        TT::Plus => Op::Addition,
        TT::Hyphen => Op::Subtraction,
        _ => break,
      };
      expr = self.dump_assignment_of_lhs_if_literal(expr)?;
      self.consume();
      let rhs = self.parse_multiplicative_expression()?;
      expr = self.dumper.binary_res(op, expr, rhs)?;
    }
    Ok(expr)
  }

  fn parse_shift_expression(&mut self) -> CompileResult<Operand> {
    let mut expr = self.parse_additive_expression()?;
    loop {
      let op = match self.peek().typ {
        TT::ChevronLeftChevronLeft => Op::BShiftLeft,
        TT::ChevronRightChevronRight => Op::BShiftRight,
        TT::ChevronRightChevronRightChevronRight => Op::BShiftURight,
        _ => break,
      };
      expr = self.dump_assignment_of_lhs_if_literal(expr)?;
      self.consume();
      let rhs = self.parse_additive_expression()?;
      expr = self.dumper.binary_res(op, expr, rhs)?;
    }
    Ok(expr)
  }

  fn parse_relational_expression(&mut self, in_allowed: bool) -> CompileResult<Operand> {
    let mut expr = self.parse_shift_expression()?;
    loop {
      let op = match self.peek().typ {
        TT::ChevronLeft => Op::LessThan,
        TT::ChevronRight => Op::GreaterThan,
        TT::ChevronLeftEquals => Op::LessOrEqualThan,
        TT::ChevronRightEquals => Op::GreaterOrEqualThan,
        TT::KeywordInstanceof => Op::Instanceof,
        TT::KeywordIn if in_allowed => Op::In,
        _ => break,
      };
      expr = self.dump_assignment_of_lhs_if_literal(expr)?;
      self.consume();
      let rhs = self.parse_shift_expression()?;
      expr = self.dumper.binary_res(op, expr, rhs)?;
    }
    Ok(expr)
  }

  fn parse_equality_expression(&mut self, in_allowed: bool) -> CompileResult<Operand> {
    let mut expr = self.parse_relational_expression(in_allowed)?;
    loop {
      let op = match self.peek().typ {
        TT::EqualsEquals => Op::EqualValue,
        TT::ExclamationEquals => Op::NotEqualValue,
        TT::EqualsEqualsEquals => Op::EqualValueType,
        TT::ExclamationEqualsEquals => Op::NotEqualValueType,
        _ => break,
      };
      expr = self.dump_assignment_of_lhs_if_literal(expr)?;
      self.consume();
      let rhs = self.parse_relational_expression(in_allowed)?;
      expr = self.dumper.binary_res(op, expr, rhs)?;
    }
    Ok(expr)
  }

  fn parse_bitwise_and_expression(&mut self, in_allowed: bool) -> CompileResult<Operand> {
    let mut expr = self.parse_equality_expression(in_allowed)?;
    while self.peek().typ == TT::Ampersand {
      expr = self.dump_assignment_of_lhs_if_literal(expr)?;
      self.consume();
      let rhs = self.parse_equality_expression(in_allowed)?;
      expr = self.dumper.binary_res(Op::BAnd, expr, rhs)?;
    }
    Ok(expr)
  }

  fn parse_bitwise_xor_expression(&mut self, in_allowed: bool) -> CompileResult<Operand> {
    let mut expr = self.parse_bitwise_and_expression(in_allowed)?;
    while self.peek().typ == TT::Caret {
      expr = self.dump_assignment_of_lhs_if_literal(expr)?;
      self.consume();
      let rhs = self.parse_bitwise_and_expression(in_allowed)?;
      expr = self.dumper.binary_res(Op::BXor, expr, rhs)?;
    }
    Ok(expr)
  }

  fn parse_bitwise_or_expression(&mut self, in_allowed: bool) -> CompileResult<Operand> {
    let mut expr = self.parse_bitwise_xor_expression(in_allowed)?;
    while self.peek().typ == TT::Bar {
      expr = self.dump_assignment_of_lhs_if_literal(expr)?;
      self.consume();
      let rhs = self.parse_bitwise_xor_expression(in_allowed)?;
      expr = self.dumper.binary_res(Op::BOr, expr, rhs)?;
    }
    Ok(expr)
  }

  /// `a && b && c`: every link evaluates into one shared temp with an
  /// is-false jump template pointing past the chain; the templates are
  /// rewritten together on exit.
  fn parse_logical_and_expression(&mut self, in_allowed: bool) -> CompileResult<Operand> {
    let mut expr = self.parse_bitwise_or_expression(in_allowed)?;
    if self.peek().typ != TT::AmpersandAmpersand {
      return Ok(expr);
    }

    let tmp = self.dumper.variable_assignment_res(expr)?;
    self.dumper.start_logical_and_checks();
    self.dumper.dump_logical_and_check_for_rewrite(tmp)?;

    while self.peek().typ == TT::AmpersandAmpersand {
      self.consume();
      expr = self.parse_bitwise_or_expression(in_allowed)?;
      self.dumper.dump_variable_assignment(tmp, expr)?;
      if self.peek().typ == TT::AmpersandAmpersand {
        self.dumper.dump_logical_and_check_for_rewrite(tmp)?;
      }
    }
    self.dumper.rewrite_logical_and_checks()?;
    Ok(tmp)
  }

  fn parse_logical_or_expression(&mut self, in_allowed: bool) -> CompileResult<Operand> {
    let mut expr = self.parse_logical_and_expression(in_allowed)?;
    if self.peek().typ != TT::BarBar {
      return Ok(expr);
    }

    let tmp = self.dumper.variable_assignment_res(expr)?;
    self.dumper.start_logical_or_checks();
    self.dumper.dump_logical_or_check_for_rewrite(tmp)?;

    while self.peek().typ == TT::BarBar {
      self.consume();
      expr = self.parse_logical_and_expression(in_allowed)?;
      self.dumper.dump_variable_assignment(tmp, expr)?;
      if self.peek().typ == TT::BarBar {
        self.dumper.dump_logical_or_check_for_rewrite(tmp)?;
      }
    }
    self.dumper.rewrite_logical_or_checks()?;
    Ok(tmp)
  }

  fn parse_conditional_expression(
    &mut self,
    in_allowed: bool,
    is_conditional: &mut bool,
  ) -> CompileResult<Operand> {
    let expr = self.parse_logical_or_expression(in_allowed)?;
    if self.peek().typ != TT::Question {
      return Ok(expr);
    }

    self.consume();
    self.dumper.dump_conditional_check_for_rewrite(expr)?;
    let then_value = self.parse_assignment_expression(in_allowed)?;
    let tmp = self.dumper.variable_assignment_res(then_value)?;
    self.require(TT::Colon)?;
    self.dumper.dump_jump_to_end_for_rewrite()?;
    self.dumper.rewrite_conditional_check()?;
    let else_value = self.parse_assignment_expression(in_allowed)?;
    self.dumper.dump_variable_assignment(tmp, else_value)?;
    self.dumper.rewrite_jump_to_end()?;
    *is_conditional = true;
    Ok(tmp)
  }

  pub(crate) fn parse_assignment_expression(&mut self, in_allowed: bool) -> CompileResult<Operand> {
    let loc_expr = self.peek().loc;
    let mut is_conditional = false;
    let expr = self.parse_conditional_expression(in_allowed, &mut is_conditional)?;
    if is_conditional {
      return Ok(expr);
    }

    let t = self.peek();
    let compound_op = match t.typ {
      TT::Equals => None,
      TT::AsteriskEquals => Some(Op::Multiplication),
      TT::SlashEquals => Some(Op::Division),
      TT::PercentEquals => Some(Op::Remainder),
      TT::PlusEquals => Some(Op::Addition),
      TT::HyphenEquals => Some(Op::Subtraction),
      TT::ChevronLeftChevronLeftEquals => Some(Op::BShiftLeft),
      TT::ChevronRightChevronRightEquals => Some(Op::BShiftRight),
      TT::ChevronRightChevronRightChevronRightEquals => Some(Op::BShiftURight),
      TT::AmpersandEquals => Some(Op::BAnd),
      TT::CaretEquals => Some(Op::BXor),
      TT::BarEquals => Some(Op::BOr),
      _ => return Ok(expr),
    };

    self.check_for_eval_and_arguments_in_strict_mode(expr, self.is_strict_mode(), t.loc)?;
    self.consume();
    self.dumper.start_assignment_expression(expr, loc_expr)?;
    let assign_expr = self.parse_assignment_expression(in_allowed)?;

    match compound_op {
      None => self.dumper.prop_setter_or_assignment_res(expr, assign_expr),
      Some(op) => self.dumper.prop_setter_or_binary_res(op, expr, assign_expr),
    }
  }

  /// Comma-expression entry point. When compiling eval code at the top
  /// level, `dump_eval_ret` stores the completion value into the eval-result
  /// register.
  pub(crate) fn parse_expression(
    &mut self,
    in_allowed: bool,
    dump_eval_ret: bool,
  ) -> CompileResult<Operand> {
    let mut expr = self.parse_assignment_expression(in_allowed)?;
    while self.peek().typ == TT::Comma {
      self.dump_assignment_of_lhs_if_literal(expr)?;
      self.consume();
      expr = self.parse_assignment_expression(in_allowed)?;
    }

    if self.inside_eval && dump_eval_ret && !self.inside_function {
      let ret = self.dumper.eval_ret_operand();
      self.dumper.dump_variable_assignment(ret, expr)?;
    }
    Ok(expr)
  }

  pub(crate) fn parse_expression_inside_parens(&mut self) -> CompileResult<Operand> {
    self.require(TT::ParenthesisOpen)?;
    let res = self.parse_expression(true, false)?;
    self.require(TT::ParenthesisClose)?;
    Ok(res)
  }
}
