use super::Parser;
use super::PropKind;
use crate::dump::AssignSource;
use crate::dump::VargKind;
use crate::error::CompileErrorType;
use crate::error::CompileResult;
use crate::token::TT;
use bytecode_js::CallFlags;
use bytecode_js::LitId;
use bytecode_js::Operand;

impl<'a> Parser<'a> {
  /// Declarations register the function in the outer scope's instruction
  /// stream before the inner scope is entered.
  pub(crate) fn parse_function_declaration(&mut self) -> CompileResult<()> {
    let kw = self.require(TT::KeywordFunction)?;

    // Labels never cross function boundaries.
    self.labels.mask_set();

    self.push_function_scope();

    let name_token = self.require(TT::Identifier)?;
    let name_lit = self.intern_token_text(name_token)?;
    let name = Operand::Lit(name_lit);

    self.start_checking_of_vargs();
    self.parse_argument_list(VargKind::FuncDecl, name, None)?;

    self.dumper.dump_function_end_for_rewrite()?;

    self.require(TT::BraceOpen)?;

    let was_in_function = self.inside_function;
    self.inside_function = true;

    self.parse_source_element_list(false, true)?;

    self.require(TT::BraceClose)?;

    self.dumper.dump_ret()?;
    self.dumper.rewrite_function_end()?;

    self.inside_function = was_in_function;

    let strict = self.is_strict_mode();
    self.check_for_eval_and_arguments_in_strict_mode(name, strict, kw.loc)?;
    self.check_for_syntax_errors_in_formal_param_list(strict, kw.loc)?;

    self.pop_function_scope(false)?;
    self.labels.restore_set();
    Ok(())
  }

  /// Expressions register the optional name only inside the function's own
  /// scope.
  pub(crate) fn parse_function_expression(&mut self) -> CompileResult<Operand> {
    let kw = self.require(TT::KeywordFunction)?;

    self.start_checking_of_vargs();
    self.push_function_scope();

    let mut name = Operand::Empty;
    if self.peek().typ == TT::Identifier {
      let name_token = self.consume();
      name = Operand::Lit(self.intern_token_text(name_token)?);
    }
    let res = self.parse_argument_list(VargKind::FuncExpr, name, None)?;

    self.dumper.dump_function_end_for_rewrite()?;

    self.require(TT::BraceOpen)?;

    let was_in_function = self.inside_function;
    self.inside_function = true;

    self.labels.mask_set();
    self.parse_source_element_list(false, true)?;
    self.labels.restore_set();

    self.require(TT::BraceClose)?;

    self.dumper.dump_ret()?;
    self.dumper.rewrite_function_end()?;

    self.inside_function = was_in_function;

    let strict = self.is_strict_mode();
    self.check_for_eval_and_arguments_in_strict_mode(name, strict, kw.loc)?;
    self.check_for_syntax_errors_in_formal_param_list(strict, kw.loc)?;

    self.pop_function_scope(true)?;
    Ok(res)
  }

  /// Parses a comma-separated varg list (formal parameters, call arguments,
  /// array elements or object properties) between the kind's brackets,
  /// emitting the header template first and rewriting its argument count at
  /// the end.
  pub(crate) fn parse_argument_list(
    &mut self,
    kind: VargKind,
    obj: Operand,
    this_arg: Option<Operand>,
  ) -> CompileResult<Operand> {
    debug_assert!(this_arg.is_none() || kind == VargKind::CallExpr);

    let close_tt = match kind {
      VargKind::FuncDecl | VargKind::FuncExpr | VargKind::ConstructExpr | VargKind::CallExpr => {
        self.require(TT::ParenthesisOpen)?;
        TT::ParenthesisClose
      }
      VargKind::ArrayDecl => {
        self.require(TT::BracketOpen)?;
        TT::BracketClose
      }
      VargKind::ObjDecl => {
        self.require(TT::BraceOpen)?;
        self.start_checking_of_prop_names();
        TT::BraceClose
      }
    };

    let mut call_flags = CallFlags::empty();
    let mut call_this_arg = Operand::Empty;
    if kind == VargKind::CallExpr {
      if let Some(this_arg) = this_arg.filter(|t| !t.is_empty()) {
        call_flags |= CallFlags::HAVE_THIS_ARG;
        // The base of a call expression should be evaluated only once; a
        // still-literal base is re-evaluated into a temp here to materialize
        // the `this` argument.
        call_this_arg = if this_arg.is_lit() {
          self.dumper.variable_assignment_res(this_arg)?
        } else {
          this_arg
        };
        // An explicit `this` argument implies the call is not a direct call
        // to eval.
      } else if let Operand::Lit(lit) = obj {
        if self.lits.is_str(lit, "eval") {
          call_flags |= CallFlags::DIRECT_CALL_TO_EVAL_FORM;
        }
      }
    }

    self.dumper.start_varg_header(kind, obj)?;

    if !call_flags.is_empty() {
      if call_flags.contains(CallFlags::HAVE_THIS_ARG) {
        debug_assert!(!call_this_arg.is_empty());
        self.dumper.dump_call_site_info(call_flags, call_this_arg)?;
      } else {
        self.dumper.dump_call_site_info(call_flags, Operand::Empty)?;
      }
    }

    let mut args_num: usize = 0;
    while self.peek().typ != close_tt {
      self.dumper.start_varg_code_sequence();

      match kind {
        VargKind::FuncDecl | VargKind::FuncExpr => {
          let t = self.require(TT::Identifier)?;
          let lit = self.intern_token_text(t)?;
          self.add_varg(lit);
          self.scope_mut().add_variable(lit, true);
          self.dumper.dump_varg(Operand::Lit(lit))?;
        }
        VargKind::ConstructExpr | VargKind::CallExpr => {
          let op = self.parse_assignment_expression(true)?;
          self.dumper.dump_varg(op)?;
        }
        VargKind::ArrayDecl => {
          if self.peek().typ == TT::Comma {
            let op = self.dumper.assignment_res(AssignSource::ArrayHole)?;
            self.dumper.dump_varg(op)?;
          } else {
            let op = self.parse_assignment_expression(true)?;
            self.dumper.dump_varg(op)?;
          }
        }
        VargKind::ObjDecl => {
          self.parse_property_assignment()?;
        }
      }

      let t = self.peek();
      if t.typ == TT::Comma {
        self.consume();
      } else if t.typ != close_tt {
        return Err(t.error(CompileErrorType::RequiredTokenNotFound(close_tt)));
      }

      args_num += 1;
      self.dumper.finish_varg_code_sequence();
    }
    let close = self.require(close_tt)?;

    if kind == VargKind::ObjDecl {
      let strict = self.is_strict_mode();
      self.check_for_duplication_of_prop_names(strict, close.loc)?;
    }

    self.dumper.rewrite_varg_header_set_args_count(args_num, close.loc)
  }

  /// Property names are identifiers, keywords, strings or numbers; numeric
  /// names are stored as their string form.
  fn parse_property_name(&mut self) -> CompileResult<LitId> {
    let t = self.consume();
    match t.typ {
      TT::Identifier | TT::ReservedWord => self.intern_token_text(t),
      TT::LiteralString => self.intern_string_token(t),
      TT::LiteralNumber => {
        let num = self.token_number(t)?;
        let text = num.to_string();
        self.intern_str(&text, t.loc)
      }
      TT::LiteralTrue | TT::LiteralFalse | TT::LiteralNull => self.intern_token_text(t),
      typ if typ.is_keyword_or_literal_name() => self.intern_token_text(t),
      _ => Err(t.error(CompileErrorType::ExpectedSyntax("property name"))),
    }
  }

  fn parse_property_name_and_value(&mut self) -> CompileResult<()> {
    let name = self.parse_property_name()?;
    self.require(TT::Colon)?;
    let value = self.parse_assignment_expression(true)?;
    self.dumper.dump_prop_name_and_value(Operand::Lit(name), value)?;
    self.add_prop_name(name, PropKind::Data);
    Ok(())
  }

  /// One entry of an object literal: a data property, or a `get`/`set`
  /// accessor (which compiles as an anonymous function expression).
  pub(crate) fn parse_property_assignment(&mut self) -> CompileResult<()> {
    let t = self.peek();
    if t.typ != TT::Identifier {
      return self.parse_property_name_and_value();
    }

    let is_setter = match self.str(t.loc) {
      "get" => false,
      "set" => true,
      _ => return self.parse_property_name_and_value(),
    };

    // `get`/`set` followed by `:` is an ordinary data property name.
    if self.peek_nth(1).typ == TT::Colon {
      return self.parse_property_name_and_value();
    }
    self.consume();

    let name = self.parse_property_name()?;
    self.add_prop_name(name, if is_setter {
      PropKind::Setter
    } else {
      PropKind::Getter
    });

    self.start_checking_of_vargs();
    self.push_function_scope();

    let func = self.parse_argument_list(VargKind::FuncExpr, Operand::Empty, None)?;

    self.dumper.dump_function_end_for_rewrite()?;

    self.require(TT::BraceOpen)?;

    let was_in_function = self.inside_function;
    self.inside_function = true;

    self.labels.mask_set();
    self.parse_source_element_list(false, true)?;
    self.labels.restore_set();

    self.require(TT::BraceClose)?;

    self.dumper.dump_ret()?;
    self.dumper.rewrite_function_end()?;

    self.inside_function = was_in_function;

    let strict = self.is_strict_mode();
    self.check_for_syntax_errors_in_formal_param_list(strict, t.loc)?;

    self.pop_function_scope(true)?;

    if is_setter {
      self.dumper.dump_prop_setter_decl(Operand::Lit(name), func)?;
    } else {
      self.dumper.dump_prop_getter_decl(Operand::Lit(name), func)?;
    }
    Ok(())
  }
}
