use crate::error::CompileErrorType;
use crate::error::CompileResult;
use crate::lit::LitTable;
use crate::lit::LitValue;
use crate::loc::Loc;
use crate::scope::Scope;
use crate::scope::ScopeArena;
use crate::scope::ScopeId;
use crate::scope::ScopeKind;
use bytecode_js::disasm::format_op_meta;
use bytecode_js::ArgType;
use bytecode_js::BytecodeImage;
use bytecode_js::InstrIdx;
use bytecode_js::LitId;
use bytecode_js::Op;
use bytecode_js::OpMeta;
use bytecode_js::Operand;
use bytecode_js::MetaType;
use bytecode_js::SimpleValue;
use bytecode_js::REG_GENERAL_FIRST;
use bytecode_js::REG_GENERAL_LAST;
use bytecode_js::REG_SPECIAL_EVAL_RET;
use bytecode_js::REG_SPECIAL_FOR_IN_PROP_NAME;
use bytecode_js::REG_SPECIAL_THIS;

mod rewrite;

pub use rewrite::VargKind;

/// Value source of an `Assignment` instruction.
#[derive(Copy, Clone, Debug)]
pub enum AssignSource {
  Bool(bool),
  Undefined,
  Null,
  ArrayHole,
  Smallint(u8),
  Number(LitId),
  Str(LitId),
  Regexp(LitId),
  Var(Operand),
}

/// Per-scope back-patch stack depths, snapshotted at scope entry. Every stack
/// must drain back to its snapshot by scope exit.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
struct StackDepths {
  varg_headers: usize,
  function_ends: usize,
  logical_and_checks: usize,
  logical_or_checks: usize,
  conditional_checks: usize,
  jumps_to_end: usize,
  prop_getters: usize,
  next_iterations: usize,
  case_clauses: usize,
  tries: usize,
  catches: usize,
  finallies: usize,
}

/// Stateful byte-code emitter.
///
/// Owns the scope arena (each scope owns its instruction buffer), the
/// per-scope register file cursors, and one back-patch stack per
/// template-and-rewrite construct. All parser output flows through here.
pub struct Dumper {
  pub scopes: ScopeArena,
  current: ScopeId,
  show_instructions: bool,

  // Register file cursors for the current scope.
  reg_next: u8,
  reg_max_for_temps: u8,
  reg_max_for_local_var: Option<u8>,
  reg_max_for_args: Option<u8>,
  reg_id_stack: Vec<u8>,

  // Back-patch stacks, one per construct category.
  pub(crate) varg_headers: Vec<InstrIdx>,
  function_ends: Vec<InstrIdx>,
  logical_and_checks: Vec<InstrIdx>,
  logical_or_checks: Vec<InstrIdx>,
  conditional_checks: Vec<InstrIdx>,
  jumps_to_end: Vec<InstrIdx>,
  prop_getters: Vec<OpMeta>,
  next_iterations: Vec<InstrIdx>,
  case_clauses: Vec<InstrIdx>,
  tries: Vec<InstrIdx>,
  catches: Vec<InstrIdx>,
  finallies: Vec<InstrIdx>,

  // Sub-stack bases for the logical-check and case-clause protocols.
  base_stack: Vec<usize>,

  depth_snapshots: Vec<StackDepths>,

  // Location of the statement being dumped; errors raised inside the dumper
  // (register exhaustion, jump overflow) attach to it.
  stmt_loc: Loc,
}

impl Dumper {
  pub fn new(root_kind: ScopeKind, show_instructions: bool) -> Dumper {
    let mut scopes = ScopeArena::new();
    let root = scopes.alloc(None, root_kind);
    Dumper {
      scopes,
      current: root,
      show_instructions,
      reg_next: REG_GENERAL_FIRST,
      reg_max_for_temps: REG_GENERAL_FIRST,
      reg_max_for_local_var: None,
      reg_max_for_args: None,
      reg_id_stack: Vec::new(),
      varg_headers: Vec::new(),
      function_ends: Vec::new(),
      logical_and_checks: Vec::new(),
      logical_or_checks: Vec::new(),
      conditional_checks: Vec::new(),
      jumps_to_end: Vec::new(),
      prop_getters: Vec::new(),
      next_iterations: Vec::new(),
      case_clauses: Vec::new(),
      tries: Vec::new(),
      finallies: Vec::new(),
      catches: Vec::new(),
      base_stack: Vec::new(),
      depth_snapshots: Vec::new(),
      stmt_loc: Loc(0, 0),
    }
  }

  // ---------------------------------------------------------------------
  // Scope plumbing (the serializer contract).

  pub fn current_scope_id(&self) -> ScopeId {
    self.current
  }

  pub fn scope(&self) -> &Scope {
    self.scopes.get(self.current)
  }

  pub fn scope_mut(&mut self) -> &mut Scope {
    self.scopes.get_mut(self.current)
  }

  pub fn set_scope(&mut self, id: ScopeId) {
    self.current = id;
  }

  pub fn alloc_scope(&mut self, parent: Option<ScopeId>, kind: ScopeKind) -> ScopeId {
    self.scopes.alloc(parent, kind)
  }

  pub fn current_instr_counter(&self) -> InstrIdx {
    self.scope().instrs.next_idx()
  }

  /// Total instructions of already-completed sub-scopes of the current
  /// scope, needed for inter-scope jump distances.
  pub fn count_instrs_in_subscopes(&self) -> usize {
    self.scope().subscope_instrs.len()
  }

  fn err(&self, typ: CompileErrorType) -> crate::error::CompileError {
    self.stmt_loc.error(typ, None)
  }

  pub(crate) fn dump(&mut self, op: Op, operands: &[Operand]) -> CompileResult<InstrIdx> {
    let meta = OpMeta::new(op, operands);
    let full = self.err(CompileErrorType::ScopeTooLarge);
    let idx = self
      .scopes
      .get_mut(self.current)
      .instrs
      .push(meta)
      .map_err(|_| full)?;
    if self.show_instructions {
      tracing::debug!(scope = self.current.0, "{}", format_op_meta(idx.0 as usize, &meta));
    }
    Ok(idx)
  }

  pub(crate) fn get(&self, idx: InstrIdx) -> OpMeta {
    self.scope().instrs.get(idx)
  }

  pub(crate) fn rewrite(&mut self, idx: InstrIdx, meta: OpMeta) {
    self.scope_mut().instrs.rewrite(idx, meta);
  }

  fn last_dumped_op_meta(&self) -> OpMeta {
    self.get(self.current_instr_counter().back())
  }

  fn rewrite_last_dumped_op_meta(&mut self, meta: OpMeta) {
    self.rewrite(self.current_instr_counter().back(), meta);
  }

  /// Distance from `oc` to the current counter, checked against the 16-bit
  /// displacement encoding.
  pub(crate) fn distance_from(&self, oc: InstrIdx) -> usize {
    self.scope().instrs.len() - oc.0 as usize
  }

  pub(crate) fn split_checked(&self, distance: usize) -> CompileResult<(u8, u8)> {
    bytecode_js::split_distance(distance)
      .ok_or_else(|| self.err(CompileErrorType::JumpDistanceTooLarge))
  }

  // ---------------------------------------------------------------------
  // Register file.

  fn alloc_reg_for_temp(&mut self) -> CompileResult<u8> {
    debug_assert!(self.reg_max_for_local_var.is_none());
    debug_assert!(self.reg_max_for_args.is_none());

    let next_reg = self.reg_next;
    if next_reg > REG_GENERAL_LAST {
      return Err(self.err(CompileErrorType::NotEnoughRegisters));
    }
    self.reg_next += 1;
    if self.reg_max_for_temps < next_reg {
      self.reg_max_for_temps = next_reg;
    }
    Ok(next_reg)
  }

  pub(crate) fn tmp_operand(&mut self) -> CompileResult<Operand> {
    Ok(Operand::reg(self.alloc_reg_for_temp()?))
  }

  fn is_temp_register(&self, reg: u8) -> bool {
    (REG_GENERAL_FIRST..=self.reg_max_for_temps).contains(&reg)
  }

  /// Temporaries do not survive across statements.
  pub fn new_statement(&mut self, loc: Loc) {
    self.reg_next = REG_GENERAL_FIRST;
    self.stmt_loc = loc;
  }

  pub fn new_scope(&mut self) {
    debug_assert!(self.reg_max_for_local_var.is_none());
    debug_assert!(self.reg_max_for_args.is_none());

    self.reg_id_stack.push(self.reg_next);
    self.reg_id_stack.push(self.reg_max_for_temps);
    self.reg_next = REG_GENERAL_FIRST;
    self.reg_max_for_temps = self.reg_next;

    self.depth_snapshots.push(self.stack_depths());
  }

  pub fn finish_scope(&mut self) {
    debug_assert!(self.reg_max_for_local_var.is_none());
    debug_assert!(self.reg_max_for_args.is_none());

    self.reg_max_for_temps = self.reg_id_stack.pop().unwrap();
    self.reg_next = self.reg_id_stack.pop().unwrap();

    // Every back-patch stack must be empty at scope exit.
    let snapshot = self.depth_snapshots.pop().unwrap();
    debug_assert_eq!(snapshot, self.stack_depths());
  }

  /// Registers allocated while preparing an argument list are not used after
  /// the sequence completes, so the cursor is saved and restored around it.
  pub fn start_varg_code_sequence(&mut self) {
    self.reg_id_stack.push(self.reg_next);
  }

  pub fn finish_varg_code_sequence(&mut self) {
    self.reg_next = self.reg_id_stack.pop().unwrap();
  }

  fn stack_depths(&self) -> StackDepths {
    StackDepths {
      varg_headers: self.varg_headers.len(),
      function_ends: self.function_ends.len(),
      logical_and_checks: self.logical_and_checks.len(),
      logical_or_checks: self.logical_or_checks.len(),
      conditional_checks: self.conditional_checks.len(),
      jumps_to_end: self.jumps_to_end.len(),
      prop_getters: self.prop_getters.len(),
      next_iterations: self.next_iterations.len(),
      case_clauses: self.case_clauses.len(),
      tries: self.tries.len(),
      catches: self.catches.len(),
      finallies: self.finallies.len(),
    }
  }

  // ---------------------------------------------------------------------
  // Special registers.

  pub fn this_res(&self) -> Operand {
    Operand::reg(REG_SPECIAL_THIS)
  }

  pub fn eval_ret_operand(&self) -> Operand {
    Operand::reg(REG_SPECIAL_EVAL_RET)
  }

  /// Operand for taking the next property name from the for-in handler.
  pub fn for_in_prop_name_operand(&self) -> Operand {
    Operand::reg(REG_SPECIAL_FOR_IN_PROP_NAME)
  }

  // ---------------------------------------------------------------------
  // Assignments.

  pub fn dump_assignment(&mut self, dst: Operand, src: AssignSource) -> CompileResult<()> {
    let (arg_type, value) = match src {
      AssignSource::Bool(true) => (ArgType::Simple, Operand::IdxConst(SimpleValue::True as u8)),
      AssignSource::Bool(false) => (ArgType::Simple, Operand::IdxConst(SimpleValue::False as u8)),
      AssignSource::Undefined => (
        ArgType::Simple,
        Operand::IdxConst(SimpleValue::Undefined as u8),
      ),
      AssignSource::Null => (ArgType::Simple, Operand::IdxConst(SimpleValue::Null as u8)),
      AssignSource::ArrayHole => (
        ArgType::Simple,
        Operand::IdxConst(SimpleValue::ArrayHole as u8),
      ),
      AssignSource::Smallint(value) => (ArgType::Smallint, Operand::IdxConst(value)),
      AssignSource::Number(lit) => (ArgType::Number, Operand::Lit(lit)),
      AssignSource::Str(lit) => (ArgType::String, Operand::Lit(lit)),
      AssignSource::Regexp(lit) => (ArgType::Regexp, Operand::Lit(lit)),
      AssignSource::Var(op) => (ArgType::Variable, op),
    };
    self.dump(Op::Assignment, &[
      dst,
      Operand::IdxConst(arg_type as u8),
      value,
    ])?;
    Ok(())
  }

  pub fn assignment_res(&mut self, src: AssignSource) -> CompileResult<Operand> {
    let dst = self.tmp_operand()?;
    self.dump_assignment(dst, src)?;
    Ok(dst)
  }

  pub fn dump_variable_assignment(&mut self, res: Operand, var: Operand) -> CompileResult<()> {
    self.dump_assignment(res, AssignSource::Var(var))
  }

  pub fn variable_assignment_res(&mut self, var: Operand) -> CompileResult<Operand> {
    self.assignment_res(AssignSource::Var(var))
  }

  // ---------------------------------------------------------------------
  // Unary and binary operations.

  pub fn dump_unary(&mut self, op: Op, res: Operand, obj: Operand) -> CompileResult<()> {
    debug_assert_eq!(op.operand_count(), 2);
    self.dump(op, &[res, obj])?;
    Ok(())
  }

  pub fn unary_res(&mut self, op: Op, obj: Operand) -> CompileResult<Operand> {
    let res = self.tmp_operand()?;
    self.dump_unary(op, res, obj)?;
    Ok(res)
  }

  pub fn dump_binary(
    &mut self,
    op: Op,
    res: Operand,
    lhs: Operand,
    rhs: Operand,
  ) -> CompileResult<()> {
    debug_assert_eq!(op.operand_count(), 3);
    self.dump(op, &[res, lhs, rhs])?;
    Ok(())
  }

  pub fn binary_res(&mut self, op: Op, lhs: Operand, rhs: Operand) -> CompileResult<Operand> {
    let res = self.tmp_operand()?;
    self.dump_binary(op, res, lhs, rhs)?;
    Ok(res)
  }

  pub fn post_incr_res(&mut self, obj: Operand) -> CompileResult<Operand> {
    self.unary_res(Op::PostIncr, obj)
  }

  pub fn post_decr_res(&mut self, obj: Operand) -> CompileResult<Operand> {
    self.unary_res(Op::PostDecr, obj)
  }

  /// A prefix operation's operand must be a reference: either a property
  /// getter result or a plain name.
  fn check_operand_in_prefix_operation(&self, obj: Operand, loc: Loc) -> CompileResult<()> {
    let last = self.last_dumped_op_meta();
    if last.instr.op != Op::PropGetter && obj.is_reg() {
      return Err(loc.error(
        CompileErrorType::InvalidLeftHandSideInPrefixOperation,
        None,
      ));
    }
    Ok(())
  }

  pub fn pre_incr_res(&mut self, obj: Operand, loc: Loc) -> CompileResult<Operand> {
    self.check_operand_in_prefix_operation(obj, loc)?;
    self.unary_res(Op::PreIncr, obj)
  }

  pub fn pre_decr_res(&mut self, obj: Operand, loc: Loc) -> CompileResult<Operand> {
    self.check_operand_in_prefix_operation(obj, loc)?;
    self.unary_res(Op::PreDecr, obj)
  }

  pub fn typeof_res(&mut self, obj: Operand) -> CompileResult<Operand> {
    self.unary_res(Op::Typeof, obj)
  }

  /// `delete` on a name emits `DeleteVar` (after the strict-mode early
  /// error check); on a just-emitted property getter it backs the getter out
  /// and emits `DeleteProp`; anything else deletes nothing and yields true.
  pub fn delete_res(
    &mut self,
    lits: &LitTable,
    op: Operand,
    strict: bool,
    loc: Loc,
  ) -> CompileResult<Operand> {
    let res = self.tmp_operand()?;
    match op {
      Operand::Lit(lit) => match lits.get(lit) {
        LitValue::Str(_) => {
          if strict {
            return Err(loc.error(CompileErrorType::DeleteOfIdentifierInStrictMode, None));
          }
          self.dump_unary(Op::DeleteVar, res, op)?;
        }
        LitValue::Num(_) => {
          self.dump_assignment(res, AssignSource::Bool(true))?;
        }
      },
      _ => {
        debug_assert!(op.is_reg());
        let last = self.last_dumped_op_meta();
        if last.instr.op == Op::PropGetter {
          // Undo the getter and delete the property it named instead.
          let oc = self.current_instr_counter().back();
          self.scope_mut().instrs.truncate(oc);
          self.dump(Op::DeleteProp, &[res, last.operand(1), last.operand(2)])?;
        } else {
          self.dump_assignment(res, AssignSource::Bool(true))?;
        }
      }
    }
    Ok(res)
  }

  // ---------------------------------------------------------------------
  // Property access.

  pub fn dump_prop_getter(
    &mut self,
    res: Operand,
    obj: Operand,
    prop: Operand,
  ) -> CompileResult<()> {
    self.dump(Op::PropGetter, &[res, obj, prop])?;
    Ok(())
  }

  pub fn prop_getter_res(&mut self, obj: Operand, prop: Operand) -> CompileResult<Operand> {
    let res = self.tmp_operand()?;
    self.dump_prop_getter(res, obj, prop)?;
    Ok(res)
  }

  pub fn dump_prop_setter(
    &mut self,
    obj: Operand,
    prop: Operand,
    value: Operand,
  ) -> CompileResult<()> {
    self.dump(Op::PropSetter, &[obj, prop, value])?;
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Object literal property descriptors.

  pub fn dump_prop_name_and_value(&mut self, name: Operand, value: Operand) -> CompileResult<()> {
    debug_assert!(name.is_lit());
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::VargPropData as u8),
      name,
      value,
    ])?;
    Ok(())
  }

  pub fn dump_prop_getter_decl(&mut self, name: Operand, func: Operand) -> CompileResult<()> {
    debug_assert!(name.is_lit());
    debug_assert!(func.is_reg());
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::VargPropGetter as u8),
      name,
      func,
    ])?;
    Ok(())
  }

  pub fn dump_prop_setter_decl(&mut self, name: Operand, func: Operand) -> CompileResult<()> {
    debug_assert!(name.is_lit());
    debug_assert!(func.is_reg());
    self.dump(Op::Meta, &[
      Operand::IdxConst(MetaType::VargPropSetter as u8),
      name,
      func,
    ])?;
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Returns, throw.

  pub fn dump_ret(&mut self) -> CompileResult<()> {
    self.dump(Op::Ret, &[])?;
    Ok(())
  }

  pub fn dump_retval(&mut self, op: Operand) -> CompileResult<()> {
    self.dump(Op::Retval, &[op])?;
    Ok(())
  }

  pub fn dump_throw(&mut self, op: Operand) -> CompileResult<()> {
    self.dump(Op::ThrowValue, &[op])?;
    Ok(())
  }

  // ---------------------------------------------------------------------
  // Scope completion.

  /// Hoists a completed function-declaration scope: its block is attached to
  /// the parent's sub-scope region, which is spliced ahead of the parent's
  /// body on finalization. The parent therefore creates the function before
  /// any of its body code runs.
  pub fn attach_subscope(&mut self, child: ScopeId) {
    let block = self.finalize_scope_block(child);
    let parent = self.scopes.get(child).parent.expect("root scope has no parent");
    self.scopes.get_mut(parent).subscope_instrs.extend(block);
  }

  /// Dumps a completed function-expression scope inline into the current
  /// (parent) buffer: the expression's header executes at its use site, so
  /// each evaluation produces a fresh function object.
  pub fn dump_subscope(&mut self, child: ScopeId) -> CompileResult<()> {
    debug_assert_ne!(child, self.current);
    for meta in self.finalize_scope_block(child) {
      let full = self.err(CompileErrorType::ScopeTooLarge);
      self
        .scopes
        .get_mut(self.current)
        .instrs
        .push(meta)
        .map_err(|_| full)?;
    }
    Ok(())
  }

  /// Flattens a scope into its finalized instruction order: header up to and
  /// including `RegVarDecl`, then one `VarDecl` per remaining local, then
  /// completed sub-scope blocks, then the body.
  fn finalize_scope_block(&self, id: ScopeId) -> Vec<OpMeta> {
    let scope = self.scopes.get(id);
    let instrs = scope.instrs.as_slice();
    let header_end = instrs
      .iter()
      .position(|m| m.instr.op == Op::RegVarDecl)
      .map(|p| p + 1)
      .unwrap_or(0);

    let mut out = Vec::with_capacity(
      instrs.len() + scope.local_count() + scope.subscope_instrs.len(),
    );
    out.extend_from_slice(&instrs[..header_end]);
    for variable in scope.variables.iter().filter(|v| !v.is_param) {
      out.push(OpMeta::new(Op::VarDecl, &[Operand::Lit(variable.lit)]));
    }
    out.extend_from_slice(&scope.subscope_instrs);
    out.extend_from_slice(&instrs[header_end..]);
    out
  }

  /// Merges the root scope into the finalized byte-code image.
  pub fn merge_scopes_into_bytecode(&self, root: ScopeId) -> BytecodeImage {
    let mut image = BytecodeImage::default();
    for meta in self.finalize_scope_block(root) {
      image.push(meta);
    }
    if self.show_instructions {
      tracing::debug!(
        "final image:\n{}",
        bytecode_js::disasm::dump_op_metas(&self.finalize_scope_block(root))
      );
    }
    image
  }
}
