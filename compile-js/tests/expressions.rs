mod common;

use bytecode_js::ArgType;
use bytecode_js::MetaType;
use bytecode_js::Op;
use bytecode_js::IDX_REWRITE_LITERAL;
use common::*;

#[test]
fn logical_and_chains_share_one_exit() {
  let bytecode = compile("x = a && b && c;");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let checks = positions_of(image, Op::IsFalseJmpDown);
  assert_eq!(checks.len(), 2);
  // Every check in the chain lands on the same merge point.
  let targets: Vec<usize> = checks
    .iter()
    .map(|&c| image.jump_target(c).unwrap())
    .collect();
  assert_eq!(targets[0], targets[1]);
}

#[test]
fn logical_or_uses_is_true_jumps() {
  let bytecode = compile("x = a || b;");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  assert_eq!(positions_of(image, Op::IsTrueJmpDown).len(), 1);
}

#[test]
fn ternary_emits_check_and_merge_jump() {
  let bytecode = compile("x = a ? b : c;");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let check = positions_of(image, Op::IsFalseJmpDown)[0];
  let merge = positions_of(image, Op::JmpDown)[0];
  // The false-branch jump lands right after the merge jump.
  assert_eq!(image.jump_target(check).unwrap(), merge + 1);
  assert!(image.jump_target(merge).unwrap() > merge);
}

#[test]
fn binary_left_operand_is_never_a_literal_slot() {
  let bytecode = compile("x = a + b * c;");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  for pos in positions_of(image, Op::Addition)
    .into_iter()
    .chain(positions_of(image, Op::Multiplication))
  {
    let instr = &image.instrs[pos];
    assert_ne!(instr.args[1], IDX_REWRITE_LITERAL, "lhs slot at {}", pos);
  }
}

#[test]
fn redundant_assignment_is_merged_into_the_target() {
  let bytecode = compile("x = 1 + 2;");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let add = positions_of(image, Op::Addition)[0];
  let x = str_lit_id(&bytecode.literals, "x");
  // The addition writes straight into `x`; no copy follows.
  assert_eq!(image.lit_ref(add, 0), Some(x));
  assert_ne!(image.instrs[add + 1].op, Op::Assignment);
}

#[test]
fn delete_of_a_property_replaces_the_getter() {
  let bytecode = compile("delete a.b;");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  assert!(positions_of(image, Op::PropGetter).is_empty());
  let del = positions_of(image, Op::DeleteProp)[0];
  let a = str_lit_id(&bytecode.literals, "a");
  assert_eq!(image.lit_ref(del, 1), Some(a));
}

#[test]
fn delete_of_an_identifier_emits_delete_var() {
  let bytecode = compile("delete a;");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  let del = positions_of(image, Op::DeleteVar)[0];
  let a = str_lit_id(&bytecode.literals, "a");
  assert_eq!(image.lit_ref(del, 1), Some(a));
}

#[test]
fn delete_of_a_plain_value_is_just_true() {
  let bytecode = compile("x = delete 5;");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  assert!(positions_of(image, Op::DeleteVar).is_empty());
  assert!(positions_of(image, Op::DeleteProp).is_empty());
}

#[test]
fn postfix_needs_the_operand_on_the_same_line() {
  let bytecode = compile("a\n++b;");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  assert!(positions_of(image, Op::PostIncr).is_empty());
  assert_eq!(positions_of(image, Op::PreIncr).len(), 1);
}

#[test]
fn postfix_on_a_property_writes_back() {
  let bytecode = compile("a.b++;");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let incr = positions_of(image, Op::PostIncr)[0];
  let setter = positions_of(image, Op::PropSetter)[0];
  assert!(setter > incr);
}

#[test]
fn call_with_this_argument_emits_call_site_info() {
  let bytecode = compile("o.m(1);");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let call = positions_of(image, Op::CallN)[0];
  let info = &image.instrs[call + 1];
  assert_eq!(info.op, Op::Meta);
  assert_eq!(info.args[0], MetaType::CallSiteInfo as u8);
}

#[test]
fn plain_call_has_no_call_site_info() {
  let bytecode = compile("f(1);");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let call = positions_of(image, Op::CallN)[0];
  assert_eq!(image.instrs[call].args[2], 1, "argument count");
  let next = &image.instrs[call + 1];
  assert!(!(next.op == Op::Meta && next.args[0] == MetaType::CallSiteInfo as u8));
}

#[test]
fn direct_eval_call_is_flagged() {
  let bytecode = compile("eval(x);");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let call = positions_of(image, Op::CallN)[0];
  let info = &image.instrs[call + 1];
  assert_eq!(info.op, Op::Meta);
  assert_eq!(info.args[0], MetaType::CallSiteInfo as u8);
}

#[test]
fn new_without_arguments_still_constructs() {
  let bytecode = compile("x = new F;");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  let construct = positions_of(image, Op::ConstructN)[0];
  assert_eq!(image.instrs[construct].args[2], 0);
}

#[test]
fn array_literal_counts_elements_and_holes() {
  let bytecode = compile("x = [1, , 2];");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let array = positions_of(image, Op::ArrayDecl)[0];
  let instr = &image.instrs[array];
  assert_eq!((instr.args[1], instr.args[2]), (0, 3));

  let vargs = image
    .instrs
    .iter()
    .filter(|i| i.op == Op::Meta && i.args[0] == MetaType::Varg as u8)
    .count();
  assert_eq!(vargs, 3);
}

#[test]
fn object_literal_descriptors() {
  let bytecode = compile("x = { a: 1, get b() { return 2; }, set b(v) {} };");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  assert_eq!(positions_of(image, Op::ObjDecl).len(), 1);
  let has_meta = |t: MetaType| {
    image
      .instrs
      .iter()
      .any(|i| i.op == Op::Meta && i.args[0] == t as u8)
  };
  assert!(has_meta(MetaType::VargPropData));
  assert!(has_meta(MetaType::VargPropGetter));
  assert!(has_meta(MetaType::VargPropSetter));
  // Accessor bodies compile as function expressions.
  assert_eq!(positions_of(image, Op::FuncExprN).len(), 2);
}

#[test]
fn string_number_and_regex_literals_assign_with_type_tags() {
  let bytecode = compile("a = 'x'; b = 3.5; c = /re/g; d = 300;");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let type_tags: Vec<u8> = positions_of(image, Op::Assignment)
    .into_iter()
    .map(|pos| image.instrs[pos].args[1])
    .collect();
  assert!(type_tags.contains(&(ArgType::String as u8)));
  assert!(type_tags.contains(&(ArgType::Number as u8)));
  assert!(type_tags.contains(&(ArgType::Regexp as u8)));
}

#[test]
fn small_integers_avoid_the_literal_table() {
  let bytecode = compile("x = 255;");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  let assign = positions_of(image, Op::Assignment)[0];
  let instr = &image.instrs[assign];
  assert_eq!(instr.args[1], ArgType::Smallint as u8);
  assert_eq!(instr.args[2], 255);
  assert!(!bytecode
    .literals
    .iter()
    .any(|l| matches!(l, compile_js::LitValue::Num(_))));
}

#[test]
fn typeof_and_void_and_unary_operators() {
  let bytecode = compile("a = typeof b; c = void d; e = -f; g = ~h; i = !j;");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  assert_eq!(positions_of(image, Op::Typeof).len(), 1);
  assert_eq!(positions_of(image, Op::UnaryMinus).len(), 1);
  assert_eq!(positions_of(image, Op::BNot).len(), 1);
  assert_eq!(positions_of(image, Op::LogicalNot).len(), 1);
}

#[test]
fn comma_expression_keeps_the_last_value() {
  let bytecode = compile("x = (a, b);");
  assert_image_well_formed(&bytecode.image);
}

#[test]
fn compilation_is_deterministic() {
  let source = "function f(a, b) { var t = a * b; return t; } x = f(1, 2) && g();";
  let first = compile(source);
  let second = compile(source);
  assert_eq!(first.image.to_bytes(), second.image.to_bytes());
  assert_eq!(first.image.lit_refs, second.image.lit_refs);
}
