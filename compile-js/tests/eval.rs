mod common;

use bytecode_js::ArgType;
use bytecode_js::Op;
use bytecode_js::SimpleValue;
use bytecode_js::REG_SPECIAL_EVAL_RET;
use common::assert_image_well_formed;
use compile_js::CompileErrorType;

#[test]
fn eval_code_returns_the_completion_value() {
  let bytecode = compile_js::parse_eval("1 + 2;", false).unwrap();
  let image = &bytecode.image;
  assert_image_well_formed(image);

  // Initialized to undefined up front...
  let init = image
    .instrs
    .iter()
    .find(|i| i.op == Op::Assignment && i.args[0] == REG_SPECIAL_EVAL_RET)
    .expect("eval-result register is initialized");
  assert_eq!(init.args[1], ArgType::Simple as u8);
  assert_eq!(init.args[2], SimpleValue::Undefined as u8);

  // ...updated by the expression statement, and returned at the end.
  let updates = image
    .instrs
    .iter()
    .filter(|i| i.op == Op::Assignment && i.args[0] == REG_SPECIAL_EVAL_RET)
    .count();
  assert!(updates >= 2);

  let last = image.instrs.last().unwrap();
  assert_eq!(last.op, Op::Retval);
  assert_eq!(last.args[0], REG_SPECIAL_EVAL_RET);
}

#[test]
fn script_code_ends_with_plain_ret() {
  let bytecode = common::compile("1 + 2;");
  assert_eq!(bytecode.image.instrs.last().unwrap().op, Op::Ret);
}

#[test]
fn eval_reports_contained_functions() {
  let with_fn = compile_js::parse_eval("function f() {}", false).unwrap();
  assert!(with_fn.contains_functions);
  let without_fn = compile_js::parse_eval("x = 1;", false).unwrap();
  assert!(!without_fn.contains_functions);
}

#[test]
fn eval_inherits_strictness() {
  let err = compile_js::parse_eval("with (x) {}", true).unwrap_err();
  assert_eq!(err.typ, CompileErrorType::WithInStrictMode);
  compile_js::parse_eval("with (x) {}", false).unwrap();
}

#[test]
fn function_bodies_inside_eval_do_not_store_eval_results() {
  let bytecode = compile_js::parse_eval("function f() { g(); }", false).unwrap();
  let image = &bytecode.image;
  assert_image_well_formed(image);
  // Only the top-level init assignment touches the eval-result register;
  // the call inside `f` does not.
  let touches = image
    .instrs
    .iter()
    .filter(|i| i.op == Op::Assignment && i.args[0] == REG_SPECIAL_EVAL_RET)
    .count();
  assert_eq!(touches, 1);
}
