mod common;

use bytecode_js::join_distance;
use bytecode_js::MetaType;
use bytecode_js::Op;
use bytecode_js::ScopeCodeFlags;
use common::*;

fn function_scope_flags(image: &bytecode_js::BytecodeImage, nth: usize) -> ScopeCodeFlags {
  let flags: Vec<u8> = image
    .instrs
    .iter()
    .filter(|i| i.op == Op::Meta && i.args[0] == MetaType::ScopeCodeFlags as u8)
    .map(|i| i.args[1])
    .collect();
  ScopeCodeFlags::from_bits_truncate(flags[nth])
}

#[test]
fn function_expression_produces_a_value() {
  let bytecode = compile("x = function (a) { return a; };");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let exprs = positions_of(image, Op::FuncExprN);
  assert_eq!(exprs.len(), 1);
  // The function-end marker follows the header (vargs removed by the
  // optimizer) and lands at the end of the function block.
  let end = exprs[0] + 1;
  let end_instr = &image.instrs[end];
  assert_eq!(end_instr.op, Op::Meta);
  assert_eq!(end_instr.args[0], MetaType::FunctionEnd as u8);
  let target = end + join_distance(end_instr.args[1], end_instr.args[2]) as usize;
  assert_eq!(image.instrs[target - 1].op, Op::Ret);
}

#[test]
fn named_function_expression_keeps_its_name_in_the_header() {
  let bytecode = compile("x = function rec() {};");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let expr = positions_of(image, Op::FuncExprN)[0];
  let rec = str_lit_id(&bytecode.literals, "rec");
  assert_eq!(image.lit_ref(expr, 1), Some(rec));
}

#[test]
fn parameters_stay_in_vargs_when_a_closure_captures() {
  let source = "function outer(a) { function inner() { return a; } }";
  let bytecode = compile(source);
  let image = &bytecode.image;
  assert_image_well_formed(image);

  // `outer` contains a function, so its parameter is not moved to a
  // register and its varg meta survives.
  let a = str_lit_id(&bytecode.literals, "a");
  let varg = image
    .instrs
    .iter()
    .enumerate()
    .find(|(_, i)| i.op == Op::Meta && i.args[0] == MetaType::Varg as u8)
    .map(|(pos, _)| pos)
    .expect("parameter varg survives");
  assert_eq!(image.lit_ref(varg, 1), Some(a));

  let outer_flags = function_scope_flags(image, 1);
  assert!(!outer_flags.contains(ScopeCodeFlags::ARGUMENTS_ON_REGISTERS));
}

#[test]
fn optimization_suppressed_by_each_disqualifier() {
  for body in [
    "eval(x);",
    "return arguments;",
    "with (o) {}",
    "try {} finally {}",
    "delete x;",
    "var g = function () {};",
  ] {
    let source = format!("function f(p) {{ {} }}", body);
    let bytecode = compile(&source);
    let flags = function_scope_flags(&bytecode.image, 1);
    assert!(
      !flags.contains(ScopeCodeFlags::ARGUMENTS_ON_REGISTERS),
      "body {:?} must suppress the optimization",
      body
    );
    // The parameter varg is still present.
    assert!(
      bytecode
        .image
        .instrs
        .iter()
        .any(|i| i.op == Op::Meta && i.args[0] == MetaType::Varg as u8),
      "body {:?}",
      body
    );
  }
}

#[test]
fn duplicate_parameters_last_wins_on_registers() {
  // Non-strict duplicated parameters: both become registers, the duplicate
  // slot is reserved but unused.
  let bytecode = compile("function f(a, a) { return a; }");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let a = str_lit_id(&bytecode.literals, "a");
  assert!(!references_lit(image, a), "both vargs were rewritten");

  let rvds = positions_of(image, Op::RegVarDecl);
  let func_rvd = &image.instrs[rvds[1]];
  assert_eq!(func_rvd.args[2], 2, "both parameter slots get registers");
}

#[test]
fn deeply_nested_functions_keep_consistent_extents() {
  let source = "function a() { function b() { function c() { return 1; } } }";
  let bytecode = compile(source);
  let image = &bytecode.image;
  assert_image_well_formed(image);

  // Every function-end target is the end of a block whose last instruction
  // is that function's Ret.
  for (pos, instr) in image.instrs.iter().enumerate() {
    if instr.op == Op::Meta && instr.args[0] == MetaType::FunctionEnd as u8 {
      let target = pos + join_distance(instr.args[1], instr.args[2]) as usize;
      assert!(target <= image.len());
      assert_eq!(image.instrs[target - 1].op, Op::Ret);
    }
  }
}

#[test]
fn function_declarations_hoist_ahead_of_body_code() {
  let source = "f(); function f() {}";
  let bytecode = compile(source);
  let image = &bytecode.image;
  assert_image_well_formed(image);

  // The child block (starting with FuncDeclN) precedes the call in the
  // merged image even though the call comes first in source order.
  let decl = positions_of(image, Op::FuncDeclN)[0];
  let call = positions_of(image, Op::CallN)[0];
  assert!(decl < call);
}

#[test]
fn var_statements_inside_loops_do_not_duplicate_declarations() {
  let bytecode = compile("function f() { var i; for (var i = 0; i < 2; i++) {} }");
  let image = &bytecode.image;
  assert_image_well_formed(image);
}
