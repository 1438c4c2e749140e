use crate::dump::Dumper;
use bytecode_js::InstrIdx;
use bytecode_js::MetaType;
use bytecode_js::Op;
use bytecode_js::ScopeCodeFlags;
use bytecode_js::IDX_EMPTY;

/// Parse-time byte-code optimization: after a function body is complete,
/// replace non-parameter locals (and, if they all fit, parameters) with
/// registers.
///
/// Skipped entirely when the scope uses `eval`, `arguments`, `with`, `try`,
/// `delete` or contains nested functions: each of those can observe the
/// lexical environment the variables would otherwise live in.
///
/// Removing a parameter's varg meta shifts every recorded position after it;
/// the caller's scope-flags and reg-var-decl positions are adjusted here, the
/// pending function-end position through the dumper.
pub(crate) fn try_move_vars_to_regs(
  dumper: &mut Dumper,
  scope_code_flags_oc: &mut InstrIdx,
  reg_var_decl_oc: &mut InstrIdx,
) -> ScopeCodeFlags {
  let scope_id = dumper.current_scope_id();
  let mut flags = ScopeCodeFlags::empty();

  {
    let scope = dumper.scope();
    if scope.ref_eval
      || scope.ref_arguments
      || scope.contains_with
      || scope.contains_try
      || scope.contains_delete
      || scope.contains_functions
    {
      return flags;
    }
    debug_assert!(scope.children.is_empty());
  }

  // The scope opens with its function header followed by one varg meta per
  // formal parameter and the function-end marker.
  debug_assert!(matches!(
    dumper.scope().instrs.get(InstrIdx(0)).instr.op,
    Op::FuncExprN | Op::FuncDeclN
  ));
  let mut function_end_pos: u16 = 1;
  loop {
    let meta = dumper.scope().instrs.get(InstrIdx(function_end_pos));
    debug_assert_eq!(meta.instr.op, Op::Meta);
    match MetaType::from_idx(meta.instr.args[0]) {
      Some(MetaType::FunctionEnd) => break,
      Some(MetaType::Varg) => function_end_pos += 1,
      other => unreachable!("unexpected meta in function header: {:?}", other),
    }
  }

  // Move locals to registers; on register exhaustion the rest stay lexical.
  dumper.start_move_of_vars_to_regs();
  let locals: Vec<_> = dumper
    .scope()
    .variables
    .iter()
    .filter(|v| !v.is_param)
    .map(|v| v.lit)
    .collect();
  for lit in locals {
    if dumper.try_replace_identifier_name_with_reg(scope_id, lit, false) {
      let scope = dumper.scope_mut();
      let idx = scope
        .variables
        .iter()
        .position(|v| v.lit == lit && !v.is_param)
        .unwrap();
      scope.variables.remove(idx);
    }
  }

  let args_num = dumper.scope().param_count;
  if dumper.scope().local_count() == 0 && dumper.start_move_of_args_to_regs(args_num) {
    flags |= ScopeCodeFlags::ARGUMENTS_ON_REGISTERS;
    flags |= ScopeCodeFlags::NO_LEX_ENV;

    // All arguments arrive in registers now, so the header declares none.
    let mut header = dumper.scope().instrs.get(InstrIdx(0));
    match header.instr.op {
      Op::FuncExprN => header.instr.args[2] = 0,
      Op::FuncDeclN => header.instr.args[1] = 0,
      _ => unreachable!(),
    }
    dumper.scope_mut().instrs.rewrite(InstrIdx(0), header);

    // Mark duplicated argument names as empty, leaving only the last
    // declaration of each name.
    for a in 1..function_end_pos {
      let mut meta_a = dumper.scope().instrs.get(InstrIdx(a));
      let Some(lit_a) = meta_a.lit_ids[1] else {
        continue;
      };
      for b in a + 1..function_end_pos {
        if dumper.scope().instrs.get(InstrIdx(b)).lit_ids[1] == Some(lit_a) {
          meta_a.instr.args[1] = IDX_EMPTY;
          meta_a.lit_ids[1] = None;
          dumper.scope_mut().instrs.rewrite(InstrIdx(a), meta_a);
          break;
        }
      }
    }

    // Assign argument registers in declaration order and drop the varg
    // metas; they are no longer needed at runtime.
    loop {
      let meta = dumper.scope().instrs.get(InstrIdx(1));
      debug_assert_eq!(meta.instr.op, Op::Meta);
      match MetaType::from_idx(meta.instr.args[0]) {
        Some(MetaType::FunctionEnd) => break,
        Some(MetaType::Varg) => {
          if meta.instr.args[1] == IDX_EMPTY {
            debug_assert!(meta.lit_ids[1].is_none());
            dumper.alloc_reg_for_unused_arg();
          } else {
            let lit = meta.lit_ids[1].expect("varg meta without a name");
            let replaced = dumper.try_replace_identifier_name_with_reg(scope_id, lit, true);
            debug_assert!(replaced);
          }
          dumper.scope_mut().instrs.remove(InstrIdx(1));
          *reg_var_decl_oc = reg_var_decl_oc.back();
          *scope_code_flags_oc = scope_code_flags_oc.back();
          dumper.decrement_function_end_pos();
        }
        other => unreachable!("unexpected meta in function header: {:?}", other),
      }
    }
  }

  flags
}
