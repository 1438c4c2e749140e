use super::Dumper;
use crate::error::CompileErrorType;
use crate::error::CompileResult;
use crate::loc::Loc;
use crate::scope::ScopeId;
use bytecode_js::join_distance;
use bytecode_js::ArgType;
use bytecode_js::CallFlags;
use bytecode_js::InstrIdx;
use bytecode_js::LitId;
use bytecode_js::MetaType;
use bytecode_js::Op;
use bytecode_js::Operand;
use bytecode_js::ScopeCodeFlags;
use bytecode_js::IDX_REWRITE_GENERAL;
use bytecode_js::IDX_REWRITE_LITERAL;
use bytecode_js::REG_GENERAL_FIRST;
use bytecode_js::REG_GENERAL_LAST;

/// Kind of a variable-argument-list header instruction.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum VargKind {
  FuncDecl,
  FuncExpr,
  ConstructExpr,
  CallExpr,
  ArrayDecl,
  ObjDecl,
}

/// End-of-chain sentinel for label jump chains threaded through displacement
/// fields.
const CHAIN_END: u16 = u16::MAX;

impl Dumper {
  /// Records that a resolved forward jump lands at `target`; instructions
  /// before it are no longer straight-line suffixes of the scope.
  fn note_resolved_jump_target(&mut self, target: u16) {
    let scope = self.scope_mut();
    if scope.resolved_jump_max < target {
      scope.resolved_jump_max = target;
    }
  }

  // ---------------------------------------------------------------------
  // Varg headers.

  /// Emits the header of a function/call/constructor/array/object argument
  /// list with a placeholder argument count, to be rewritten once the count
  /// is known.
  pub fn start_varg_header(&mut self, kind: VargKind, obj: Operand) -> CompileResult<()> {
    let oc = self.current_instr_counter();
    self.varg_headers.push(oc);
    match kind {
      VargKind::FuncExpr => {
        self.dump(Op::FuncExprN, &[Operand::Unknown, obj, Operand::Unknown])?;
      }
      VargKind::ConstructExpr => {
        self.dump(Op::ConstructN, &[Operand::Unknown, obj, Operand::Unknown])?;
      }
      VargKind::CallExpr => {
        self.dump(Op::CallN, &[Operand::Unknown, obj, Operand::Unknown])?;
      }
      VargKind::FuncDecl => {
        self.dump(Op::FuncDeclN, &[obj, Operand::Unknown])?;
      }
      VargKind::ArrayDecl => {
        self.dump(Op::ArrayDecl, &[
          Operand::Unknown,
          Operand::Unknown,
          Operand::Unknown,
        ])?;
      }
      VargKind::ObjDecl => {
        self.dump(Op::ObjDecl, &[
          Operand::Unknown,
          Operand::Unknown,
          Operand::Unknown,
        ])?;
      }
    }
    Ok(())
  }

  /// Writes the now-known argument count into the pending varg header, and
  /// allocates the result register for headers that produce a value.
  pub fn rewrite_varg_header_set_args_count(
    &mut self,
    args_count: usize,
    loc: Loc,
  ) -> CompileResult<Operand> {
    let oc = *self.varg_headers.last().unwrap();
    let mut om = self.get(oc);
    let res = match om.instr.op {
      Op::FuncExprN | Op::ConstructN | Op::CallN => {
        if args_count > 255 {
          return Err(loc.error(CompileErrorType::TooManyFormalParameters, None));
        }
        let res = self.tmp_operand()?;
        om.instr.args[0] = res.idx();
        om.instr.args[2] = args_count as u8;
        res
      }
      Op::FuncDeclN => {
        if args_count > 255 {
          return Err(loc.error(CompileErrorType::TooManyFormalParameters, None));
        }
        om.instr.args[1] = args_count as u8;
        Operand::Empty
      }
      Op::ArrayDecl | Op::ObjDecl => {
        if args_count > 65535 {
          return Err(loc.error(CompileErrorType::TooManyLiteralElements, None));
        }
        let res = self.tmp_operand()?;
        om.instr.args[0] = res.idx();
        om.instr.args[1] = (args_count >> 8) as u8;
        om.instr.args[2] = (args_count & 0xff) as u8;
        res
      }
      _ => unreachable!("varg header stack holds a non-header instruction"),
    };
    self.rewrite(oc, om);
    self.varg_headers.pop();
    Ok(res)
  }

  /// `Meta(CallSiteInfo)` with call flags and, optionally, the `this`
  /// argument.
  pub fn dump_call_site_info(
    &mut self,
    flags: CallFlags,
    this_arg: Operand,
  ) -> CompileResult<()> {
    if flags.contains(CallFlags::HAVE_THIS_ARG) {
      debug_assert!(this_arg.is_reg());
    } else {
      debug_assert!(this_arg.is_empty());
    }
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::CallSiteInfo as u8),
      Operand::IdxConst(flags.bits()),
      this_arg,
    ])?;
    Ok(())
  }

  pub fn dump_varg(&mut self, op: Operand) -> CompileResult<()> {
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::Varg as u8),
      op,
      Operand::Empty,
    ])?;
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Function end marker.

  pub fn dump_function_end_for_rewrite(&mut self) -> CompileResult<()> {
    let oc = self.current_instr_counter();
    self.function_ends.push(oc);
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::FunctionEnd as u8),
      Operand::Unknown,
      Operand::Unknown,
    ])?;
    Ok(())
  }

  /// Rewrites the pending function-end marker with the distance to the end
  /// of the function's finalized block: the rest of this scope's own buffer,
  /// plus the variable declarations and completed sub-scope blocks that will
  /// be spliced in ahead of the body.
  pub fn rewrite_function_end(&mut self) -> CompileResult<()> {
    let oc = *self.function_ends.last().unwrap();
    let distance = self.distance_from(oc)
      + self.scope().local_count()
      + self.count_instrs_in_subscopes();
    let (hi, lo) = self.split_checked(distance)?;

    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::Meta);
    debug_assert_eq!(om.instr.args[0], MetaType::FunctionEnd as u8);
    debug_assert_eq!(om.instr.args[1], IDX_REWRITE_GENERAL);
    debug_assert_eq!(om.instr.args[2], IDX_REWRITE_GENERAL);
    om.instr.args[1] = hi;
    om.instr.args[2] = lo;
    self.rewrite(oc, om);
    self.function_ends.pop();
    Ok(())
  }

  /// Used when a varg meta describing a formal parameter is deleted by the
  /// optimizer: the recorded function-end position shifts down by one.
  pub fn decrement_function_end_pos(&mut self) {
    let oc = self.function_ends.last_mut().unwrap();
    *oc = oc.back();
  }

  // ---------------------------------------------------------------------
  // Short-circuit chains and conditionals.

  pub fn start_logical_and_checks(&mut self) {
    self.base_stack.push(self.logical_and_checks.len());
  }

  pub fn dump_logical_and_check_for_rewrite(&mut self, op: Operand) -> CompileResult<()> {
    let oc = self.current_instr_counter();
    self.logical_and_checks.push(oc);
    self.dump(Op::IsFalseJmpDown, &[op, Operand::Unknown, Operand::Unknown])?;
    Ok(())
  }

  pub fn rewrite_logical_and_checks(&mut self) -> CompileResult<()> {
    let base = self.base_stack.pop().unwrap();
    for i in base..self.logical_and_checks.len() {
      let oc = self.logical_and_checks[i];
      let (hi, lo) = self.split_checked(self.distance_from(oc))?;
      let mut om = self.get(oc);
      debug_assert_eq!(om.instr.op, Op::IsFalseJmpDown);
      om.instr.args[1] = hi;
      om.instr.args[2] = lo;
      self.rewrite(oc, om);
    }
    self.logical_and_checks.truncate(base);
    self.note_resolved_jump_target(self.current_instr_counter().0);
    Ok(())
  }

  pub fn start_logical_or_checks(&mut self) {
    self.base_stack.push(self.logical_or_checks.len());
  }

  pub fn dump_logical_or_check_for_rewrite(&mut self, op: Operand) -> CompileResult<()> {
    let oc = self.current_instr_counter();
    self.logical_or_checks.push(oc);
    self.dump(Op::IsTrueJmpDown, &[op, Operand::Unknown, Operand::Unknown])?;
    Ok(())
  }

  pub fn rewrite_logical_or_checks(&mut self) -> CompileResult<()> {
    let base = self.base_stack.pop().unwrap();
    for i in base..self.logical_or_checks.len() {
      let oc = self.logical_or_checks[i];
      let (hi, lo) = self.split_checked(self.distance_from(oc))?;
      let mut om = self.get(oc);
      debug_assert_eq!(om.instr.op, Op::IsTrueJmpDown);
      om.instr.args[1] = hi;
      om.instr.args[2] = lo;
      self.rewrite(oc, om);
    }
    self.logical_or_checks.truncate(base);
    self.note_resolved_jump_target(self.current_instr_counter().0);
    Ok(())
  }

  pub fn dump_conditional_check_for_rewrite(&mut self, op: Operand) -> CompileResult<()> {
    let oc = self.current_instr_counter();
    self.conditional_checks.push(oc);
    self.dump(Op::IsFalseJmpDown, &[op, Operand::Unknown, Operand::Unknown])?;
    Ok(())
  }

  pub fn rewrite_conditional_check(&mut self) -> CompileResult<()> {
    let oc = self.conditional_checks.pop().unwrap();
    let (hi, lo) = self.split_checked(self.distance_from(oc))?;
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::IsFalseJmpDown);
    om.instr.args[1] = hi;
    om.instr.args[2] = lo;
    self.rewrite(oc, om);
    self.note_resolved_jump_target(self.current_instr_counter().0);
    Ok(())
  }

  pub fn dump_jump_to_end_for_rewrite(&mut self) -> CompileResult<()> {
    let oc = self.current_instr_counter();
    self.jumps_to_end.push(oc);
    self.dump(Op::JmpDown, &[Operand::Unknown, Operand::Unknown])?;
    Ok(())
  }

  pub fn rewrite_jump_to_end(&mut self) -> CompileResult<()> {
    let oc = self.jumps_to_end.pop().unwrap();
    let (hi, lo) = self.split_checked(self.distance_from(oc))?;
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::JmpDown);
    om.instr.args[0] = hi;
    om.instr.args[1] = lo;
    self.rewrite(oc, om);
    self.note_resolved_jump_target(self.current_instr_counter().0);
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Assignment expressions over property references.

  /// Called once the parsed left-hand side is known to be the target of an
  /// assignment. A register result is only a valid target if it was produced
  /// by the property getter dumped immediately before: the getter is backed
  /// out (the setter replaces it later) and remembered on the prop-getter
  /// stack.
  pub fn start_assignment_expression(&mut self, lhs: Operand, loc: Loc) -> CompileResult<()> {
    if !lhs.is_reg() {
      return Ok(());
    }
    let last = self.last_dumped_op_meta();
    if last.instr.op != Op::PropGetter {
      return Err(loc.error(CompileErrorType::InvalidLeftHandSide, None));
    }
    let oc = self.current_instr_counter().back();
    self.scope_mut().instrs.truncate(oc);
    self.prop_getters.push(last);
    Ok(())
  }

  /// Plain `=`: either the remembered getter becomes a setter, or a variable
  /// assignment is emitted. A just-dumped assignment/addition into a fresh
  /// temp is merged into the target instead, killing the redundant copy.
  pub fn prop_setter_or_assignment_res(
    &mut self,
    res: Operand,
    op: Operand,
  ) -> CompileResult<Operand> {
    if res.is_reg() {
      let last = self.prop_getters.pop().unwrap();
      debug_assert_eq!(last.instr.op, Op::PropGetter);
      self.dump_prop_setter(last.operand(1), last.operand(2), op)?;
      return Ok(op);
    }

    let last = self.last_dumped_op_meta();
    // A jump landing past the last instruction means it is skipped on some
    // path; merging the target into it would lose the assignment there.
    let is_straight_line_suffix =
      self.scope().resolved_jump_max < self.current_instr_counter().0;
    if self.varg_headers.is_empty()
      && is_straight_line_suffix
      && matches!(last.instr.op, Op::Assignment | Op::Addition)
      && last.instr.args[0] != IDX_REWRITE_LITERAL
      && last.instr.args[0] != bytecode_js::IDX_EMPTY
      && self.is_temp_register(last.instr.args[0])
    {
      let mut merged = last;
      merged.instr.args[0] = res.idx();
      merged.lit_ids[0] = res.lit();
      self.rewrite_last_dumped_op_meta(merged);
      return Ok(res);
    }

    self.dump_variable_assignment(res, op)?;
    Ok(op)
  }

  /// Compound assignment: getter, operator on a temp, then setter - or a
  /// plain in-place operation when the target is a name.
  pub fn prop_setter_or_binary_res(
    &mut self,
    op: Op,
    res: Operand,
    rhs: Operand,
  ) -> CompileResult<Operand> {
    if res.is_reg() {
      let last = self.prop_getters.pop().unwrap();
      debug_assert_eq!(last.instr.op, Op::PropGetter);
      let obj = last.operand(1);
      let prop = last.operand(2);
      let tmp = self.prop_getter_res(obj, prop)?;
      self.dump_binary(op, tmp, tmp, rhs)?;
      self.dump_prop_setter(obj, prop, tmp)?;
      return Ok(tmp);
    }
    self.dump_binary(op, res, res, rhs)?;
    Ok(res)
  }

  // ---------------------------------------------------------------------
  // Loops.

  pub fn set_next_iteration_target(&mut self) {
    let oc = self.current_instr_counter();
    self.next_iterations.push(oc);
  }

  /// Backward jump to the pending next-iteration target: unconditional when
  /// no condition operand is given.
  pub fn dump_continue_iterations_check(&mut self, op: Operand) -> CompileResult<()> {
    let target = self.next_iterations.pop().unwrap();
    let (hi, lo) = self.split_checked(self.distance_from(target))?;
    if op.is_empty() {
      self.dump(Op::JmpUp, &[Operand::IdxConst(hi), Operand::IdxConst(lo)])?;
    } else {
      self.dump(Op::IsTrueJmpUp, &[
        op,
        Operand::IdxConst(hi),
        Operand::IdxConst(lo),
      ])?;
    }
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Break/continue jump chains.

  /// Dumps a `JmpDown` (simply jumpable) or `JmpBreakContinue` (crossing a
  /// jumpable border) template. The displacement field temporarily threads
  /// the chain of jumps targeting the same label.
  pub fn dump_simple_or_nested_jump_for_rewrite(
    &mut self,
    is_simple_jump: bool,
    next_jump_for_target: Option<InstrIdx>,
  ) -> CompileResult<InstrIdx> {
    let chain = next_jump_for_target.map(|oc| oc.0).unwrap_or(CHAIN_END);
    let hi = (chain >> 8) as u8;
    let lo = (chain & 0xff) as u8;
    let oc = self.current_instr_counter();
    let op = if is_simple_jump {
      Op::JmpDown
    } else {
      Op::JmpBreakContinue
    };
    self.dump(op, &[Operand::IdxConst(hi), Operand::IdxConst(lo)])?;
    Ok(oc)
  }

  /// Writes the real target into a chained jump and returns the next jump of
  /// the chain, if any.
  pub fn rewrite_simple_or_nested_jump_and_get_next(
    &mut self,
    jump_oc: InstrIdx,
    target_oc: InstrIdx,
  ) -> CompileResult<Option<InstrIdx>> {
    let mut om = self.get(jump_oc);
    debug_assert!(matches!(om.instr.op, Op::JmpDown | Op::JmpBreakContinue));
    let prev = join_distance(om.instr.args[0], om.instr.args[1]);
    debug_assert!(target_oc.0 >= jump_oc.0);
    let (hi, lo) = self.split_checked((target_oc.0 - jump_oc.0) as usize)?;
    om.instr.args[0] = hi;
    om.instr.args[1] = lo;
    self.rewrite(jump_oc, om);
    self.note_resolved_jump_target(target_oc.0);
    Ok((prev != CHAIN_END).then_some(InstrIdx(prev)))
  }

  // ---------------------------------------------------------------------
  // Switch case tables.

  pub fn start_case_clauses(&mut self) {
    // Two entries: a cursor over the clause jumps, then the sub-stack base.
    self.base_stack.push(self.case_clauses.len());
    self.base_stack.push(self.case_clauses.len());
  }

  pub fn dump_case_clause_check_for_rewrite(
    &mut self,
    switch_expr: Operand,
    case_expr: Operand,
  ) -> CompileResult<()> {
    let res = self.binary_res(Op::EqualValueType, switch_expr, case_expr)?;
    let oc = self.current_instr_counter();
    self.case_clauses.push(oc);
    self.dump(Op::IsTrueJmpDown, &[res, Operand::Unknown, Operand::Unknown])?;
    Ok(())
  }

  pub fn dump_default_clause_check_for_rewrite(&mut self) -> CompileResult<()> {
    let oc = self.current_instr_counter();
    self.case_clauses.push(oc);
    self.dump(Op::JmpDown, &[Operand::Unknown, Operand::Unknown])?;
    Ok(())
  }

  /// Points the next pending case-clause jump at the current position.
  pub fn rewrite_case_clause(&mut self) -> CompileResult<()> {
    let cursor_slot = self.base_stack.len() - 2;
    let oc = self.case_clauses[self.base_stack[cursor_slot]];
    let (hi, lo) = self.split_checked(self.distance_from(oc))?;
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::IsTrueJmpDown);
    om.instr.args[1] = hi;
    om.instr.args[2] = lo;
    self.rewrite(oc, om);
    self.base_stack[cursor_slot] += 1;
    self.note_resolved_jump_target(self.current_instr_counter().0);
    Ok(())
  }

  /// Points the default-clause jump (dumped last) at the current position.
  pub fn rewrite_default_clause(&mut self) -> CompileResult<()> {
    let oc = *self.case_clauses.last().unwrap();
    let (hi, lo) = self.split_checked(self.distance_from(oc))?;
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::JmpDown);
    om.instr.args[0] = hi;
    om.instr.args[1] = lo;
    self.rewrite(oc, om);
    self.note_resolved_jump_target(self.current_instr_counter().0);
    Ok(())
  }

  pub fn finish_case_clauses(&mut self) {
    let base = self.base_stack.pop().unwrap();
    self.case_clauses.truncate(base);
    self.base_stack.pop();
  }

  // ---------------------------------------------------------------------
  // With, for-in.

  pub fn dump_with_for_rewrite(&mut self, op: Operand) -> CompileResult<InstrIdx> {
    let oc = self.current_instr_counter();
    self.dump(Op::With, &[op, Operand::Unknown, Operand::Unknown])?;
    Ok(oc)
  }

  pub fn rewrite_with(&mut self, oc: InstrIdx) -> CompileResult<()> {
    let (hi, lo) = self.split_checked(self.distance_from(oc))?;
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::With);
    om.instr.args[1] = hi;
    om.instr.args[2] = lo;
    self.rewrite(oc, om);
    Ok(())
  }

  pub fn dump_with_end(&mut self) -> CompileResult<()> {
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::EndWith as u8),
      Operand::Empty,
      Operand::Empty,
    ])?;
    Ok(())
  }

  pub fn dump_for_in_for_rewrite(&mut self, op: Operand) -> CompileResult<InstrIdx> {
    let oc = self.current_instr_counter();
    self.dump(Op::ForIn, &[op, Operand::Unknown, Operand::Unknown])?;
    Ok(oc)
  }

  pub fn rewrite_for_in(&mut self, oc: InstrIdx) -> CompileResult<()> {
    let (hi, lo) = self.split_checked(self.distance_from(oc))?;
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::ForIn);
    om.instr.args[1] = hi;
    om.instr.args[2] = lo;
    self.rewrite(oc, om);
    Ok(())
  }

  pub fn dump_for_in_end(&mut self) -> CompileResult<()> {
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::EndForIn as u8),
      Operand::Empty,
      Operand::Empty,
    ])?;
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Try / catch / finally.

  pub fn dump_try_for_rewrite(&mut self) -> CompileResult<()> {
    let oc = self.current_instr_counter();
    self.tries.push(oc);
    self.dump(Op::TryBlock, &[Operand::Unknown, Operand::Unknown])?;
    Ok(())
  }

  pub fn rewrite_try(&mut self) -> CompileResult<()> {
    let oc = self.tries.pop().unwrap();
    let (hi, lo) = self.split_checked(self.distance_from(oc))?;
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::TryBlock);
    om.instr.args[0] = hi;
    om.instr.args[1] = lo;
    self.rewrite(oc, om);
    Ok(())
  }

  pub fn dump_catch_for_rewrite(&mut self, exception: Operand) -> CompileResult<()> {
    debug_assert!(exception.is_lit());
    let oc = self.current_instr_counter();
    self.catches.push(oc);
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::Catch as u8),
      Operand::Unknown,
      Operand::Unknown,
    ])?;
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::CatchExceptionIdentifier as u8),
      exception,
      Operand::Empty,
    ])?;
    Ok(())
  }

  pub fn rewrite_catch(&mut self) -> CompileResult<()> {
    let oc = self.catches.pop().unwrap();
    let (hi, lo) = self.split_checked(self.distance_from(oc))?;
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::Meta);
    debug_assert_eq!(om.instr.args[0], MetaType::Catch as u8);
    om.instr.args[1] = hi;
    om.instr.args[2] = lo;
    self.rewrite(oc, om);
    Ok(())
  }

  pub fn dump_finally_for_rewrite(&mut self) -> CompileResult<()> {
    let oc = self.current_instr_counter();
    self.finallies.push(oc);
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::Finally as u8),
      Operand::Unknown,
      Operand::Unknown,
    ])?;
    Ok(())
  }

  pub fn rewrite_finally(&mut self) -> CompileResult<()> {
    let oc = self.finallies.pop().unwrap();
    let (hi, lo) = self.split_checked(self.distance_from(oc))?;
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::Meta);
    debug_assert_eq!(om.instr.args[0], MetaType::Finally as u8);
    om.instr.args[1] = hi;
    om.instr.args[2] = lo;
    self.rewrite(oc, om);
    Ok(())
  }

  pub fn dump_end_try_catch_finally(&mut self) -> CompileResult<()> {
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::EndTryCatchFinally as u8),
      Operand::Empty,
      Operand::Empty,
    ])?;
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Scope headers.

  pub fn dump_scope_code_flags_for_rewrite(&mut self) -> CompileResult<InstrIdx> {
    let oc = self.current_instr_counter();
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::ScopeCodeFlags as u8),
      Operand::Unknown,
      Operand::Empty,
    ])?;
    Ok(oc)
  }

  pub fn rewrite_scope_code_flags(&mut self, oc: InstrIdx, flags: ScopeCodeFlags) {
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::Meta);
    debug_assert_eq!(om.instr.args[0], MetaType::ScopeCodeFlags as u8);
    debug_assert_eq!(om.instr.args[1], IDX_REWRITE_GENERAL);
    om.instr.args[1] = flags.bits();
    self.rewrite(oc, om);
  }

  pub fn dump_reg_var_decl_for_rewrite(&mut self) -> CompileResult<InstrIdx> {
    let oc = self.current_instr_counter();
    self.dump(Op::RegVarDecl, &[
      Operand::Unknown,
      Operand::Unknown,
      Operand::Unknown,
    ])?;
    Ok(oc)
  }

  /// Writes the scope's register file layout `{temp, local-var, arg}` counts
  /// into its `RegVarDecl` header and resets the optimizer cursors.
  pub fn rewrite_reg_var_decl(&mut self, oc: InstrIdx) {
    let mut om = self.get(oc);
    debug_assert_eq!(om.instr.op, Op::RegVarDecl);

    om.instr.args[0] = self.reg_max_for_temps - REG_GENERAL_FIRST + 1;
    om.instr.args[1] = match self.reg_max_for_local_var {
      Some(max_local) => {
        debug_assert!(max_local >= self.reg_max_for_temps);
        max_local - self.reg_max_for_temps
      }
      None => 0,
    };
    om.instr.args[2] = match self.reg_max_for_args {
      Some(max_args) => {
        let below = self.reg_max_for_local_var.unwrap_or(self.reg_max_for_temps);
        debug_assert!(max_args >= below);
        max_args - below
      }
      None => 0,
    };
    self.reg_max_for_local_var = None;
    self.reg_max_for_args = None;
    self.rewrite(oc, om);
  }

  // ---------------------------------------------------------------------
  // Identifier-to-register optimization support.

  /// Local-variable registers are allocated directly above the temp
  /// high-water mark.
  pub fn start_move_of_vars_to_regs(&mut self) {
    debug_assert!(self.reg_max_for_local_var.is_none());
    debug_assert!(self.reg_max_for_args.is_none());
    self.reg_max_for_local_var = Some(self.reg_max_for_temps);
  }

  /// Argument registers follow the local-variable region. Returns false if
  /// the register file cannot hold all arguments, in which case none are
  /// moved.
  pub fn start_move_of_args_to_regs(&mut self, args_num: usize) -> bool {
    debug_assert!(self.reg_max_for_args.is_none());
    let base = self.reg_max_for_local_var.unwrap_or(self.reg_max_for_temps);
    if args_num + base as usize >= REG_GENERAL_LAST as usize {
      return false;
    }
    self.reg_max_for_args = Some(base);
    true
  }

  /// A duplicated formal parameter still occupies its register slot even
  /// though nothing refers to it.
  pub fn alloc_reg_for_unused_arg(&mut self) {
    let max = self.reg_max_for_args.expect("argument move not started");
    debug_assert!(max < REG_GENERAL_LAST);
    self.reg_max_for_args = Some(max + 1);
  }

  /// Assigns the next free register to `lit` and rewrites every operand slot
  /// of the scope's emitted instructions that carries that literal reference.
  ///
  /// Slot policy: the value slot of an `Assignment` names a variable only
  /// when its type tag is `Variable`; the second slot of a
  /// property-descriptor varg meta is the property key and is never
  /// substituted.
  pub fn try_replace_identifier_name_with_reg(
    &mut self,
    scope: ScopeId,
    lit: LitId,
    is_arg: bool,
  ) -> bool {
    let reg = if is_arg {
      let max = self.reg_max_for_args.expect("argument move not started");
      debug_assert!(max < REG_GENERAL_LAST);
      self.reg_max_for_args = Some(max + 1);
      max + 1
    } else {
      let max = self
        .reg_max_for_local_var
        .expect("local-variable move not started");
      if max == REG_GENERAL_LAST {
        // Not enough registers; the variable stays lexical.
        return false;
      }
      self.reg_max_for_local_var = Some(max + 1);
      max + 1
    };

    let buffer = &mut self.scopes.get_mut(scope).instrs;
    for pos in 0..buffer.len() {
      let mut om = buffer.get(InstrIdx(pos as u16));
      let op = om.instr.op;
      let mut changed = false;
      for slot in 0..op.operand_count() {
        if op == Op::Assignment
          && slot == 1
          && ArgType::from_idx(om.instr.args[1]) != Some(ArgType::Variable)
        {
          break;
        }
        if op == Op::Meta
          && slot == 1
          && MetaType::from_idx(om.instr.args[0])
            .is_some_and(|m| m.is_prop_descriptor())
        {
          continue;
        }
        if om.lit_ids[slot] == Some(lit) {
          debug_assert_eq!(om.instr.args[slot], IDX_REWRITE_LITERAL);
          om.lit_ids[slot] = None;
          om.instr.args[slot] = reg;
          changed = true;
        }
      }
      if changed {
        buffer.rewrite(InstrIdx(pos as u16), om);
      }
    }
    true
  }
}
