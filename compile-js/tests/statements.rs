mod common;

use bytecode_js::join_distance;
use bytecode_js::MetaType;
use bytecode_js::Op;
use common::*;

#[test]
fn if_else_rewrites_both_jumps() {
  let bytecode = compile("if (a) b(); else c();");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let cond = positions_of(image, Op::IsFalseJmpDown)[0];
  let jump = positions_of(image, Op::JmpDown)[0];
  // The conditional check jumps past the then-arm (to the else-arm), the
  // unconditional jump past the else-arm.
  assert_eq!(image.jump_target(cond).unwrap(), jump + 1);
  assert!(image.jump_target(jump).unwrap() > jump + 1);
}

#[test]
fn for_loop_checks_condition_at_the_tail() {
  let bytecode = compile("for (i = 0; i < 3; i++) f();");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  // Initializer merges the constant straight into `i`.
  assert_eq!(image.instrs[2].op, Op::Assignment);

  // Jump down to the condition check, which jumps back up to the body.
  let jump_to_cond = positions_of(image, Op::JmpDown)[0];
  assert_eq!(jump_to_cond, 3);
  let cond_start = image.jump_target(jump_to_cond).unwrap();

  let back = positions_of(image, Op::IsTrueJmpUp)[0];
  assert!(back >= cond_start);
  // The backward jump targets the body, which begins right after the
  // forward jump.
  assert_eq!(image.jump_target(back).unwrap(), jump_to_cond + 1);

  assert_eq!(positions_of(image, Op::PostIncr).len(), 1);
}

#[test]
fn while_loop_layout() {
  let bytecode = compile("while (a) { b(); }");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let jump = positions_of(image, Op::JmpDown)[0];
  let back = positions_of(image, Op::IsTrueJmpUp)[0];
  assert_eq!(image.jump_target(jump).unwrap(), back);
  assert_eq!(image.jump_target(back).unwrap(), jump + 1);
}

#[test]
fn do_while_jumps_back_to_the_body() {
  let bytecode = compile("do { a(); } while (b);");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  assert!(positions_of(image, Op::JmpDown).is_empty());
  let back = positions_of(image, Op::IsTrueJmpUp)[0];
  // Target is the first body instruction.
  assert_eq!(image.jump_target(back).unwrap(), 2);
}

#[test]
fn break_and_continue_resolve_through_the_label_chains() {
  let bytecode = compile("while (a) { if (b) break; if (c) continue; d(); }");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let jumps = positions_of(image, Op::JmpDown);
  // Loop-entry jump + break + continue.
  assert_eq!(jumps.len(), 3);
  let back = positions_of(image, Op::IsTrueJmpUp)[0];
  let end = image.len() - 1; // final Ret

  // The break lands past the whole loop; the continue lands on the
  // condition check section at the loop tail.
  let targets: Vec<usize> = jumps[1..]
    .iter()
    .map(|&j| image.jump_target(j).unwrap())
    .collect();
  assert!(targets.contains(&end));
  assert!(targets.iter().any(|&t| t > back || (t <= back && t != end)));
}

#[test]
fn labeled_loops_support_targeted_break_and_continue() {
  let source = "outer: for (;;) { inner: for (;;) { break outer; continue outer; } }";
  let bytecode = compile(source);
  assert_image_well_formed(&bytecode.image);
}

#[test]
fn switch_emits_a_dispatch_table_then_bodies() {
  let source = "switch (a) { case 1: b(); break; case 2: c(); default: d(); }";
  let bytecode = compile(source);
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let checks = positions_of(image, Op::EqualValueType);
  assert_eq!(checks.len(), 2);
  let dispatches = positions_of(image, Op::IsTrueJmpDown);
  assert_eq!(dispatches.len(), 2);
  // Each case check is immediately followed by its dispatch jump, and every
  // dispatch jumps forward into the bodies.
  for (&check, &dispatch) in checks.iter().zip(&dispatches) {
    assert_eq!(dispatch, check + 1);
    assert!(image.jump_target(dispatch).unwrap() > dispatches[1]);
  }
}

#[test]
fn switch_without_default_jumps_past_everything() {
  let bytecode = compile("switch (a) { case 1: b(); }");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  // The default jump (dumped after the case table) targets the switch end.
  let jumps = positions_of(image, Op::JmpDown);
  assert_eq!(jumps.len(), 1);
  assert_eq!(image.jump_target(jumps[0]).unwrap(), image.len() - 1);
}

#[test]
fn try_catch_finally_spans_chain_into_each_other() {
  let bytecode = compile("try { a(); } catch (e) { b(); } finally { c(); }");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let tries = positions_of(image, Op::TryBlock);
  assert_eq!(tries.len(), 1);
  let catch_meta = image
    .instrs
    .iter()
    .position(|i| i.op == Op::Meta && i.args[0] == MetaType::Catch as u8)
    .unwrap();
  // The try block's extent ends where the catch meta begins.
  assert_eq!(image.jump_target(tries[0]).unwrap(), catch_meta);

  // The catch's extent ends at the finally meta.
  let finally_meta = image
    .instrs
    .iter()
    .position(|i| i.op == Op::Meta && i.args[0] == MetaType::Finally as u8)
    .unwrap();
  let catch = &image.instrs[catch_meta];
  assert_eq!(
    catch_meta + join_distance(catch.args[1], catch.args[2]) as usize,
    finally_meta
  );

  // The finally's extent ends at the terminator meta.
  let end_meta = image
    .instrs
    .iter()
    .position(|i| i.op == Op::Meta && i.args[0] == MetaType::EndTryCatchFinally as u8)
    .unwrap();
  let finally = &image.instrs[finally_meta];
  assert_eq!(
    finally_meta + join_distance(finally.args[1], finally.args[2]) as usize,
    end_meta
  );

  // The exception identifier rides its own meta.
  assert!(image
    .instrs
    .iter()
    .any(|i| i.op == Op::Meta && i.args[0] == MetaType::CatchExceptionIdentifier as u8));
}

#[test]
fn break_across_a_try_border_is_not_simply_jumpable() {
  let bytecode = compile("while (a) { try { break; } finally { b(); } }");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  assert_eq!(positions_of(image, Op::JmpBreakContinue).len(), 1);
}

#[test]
fn plain_break_stays_a_simple_jump() {
  let bytecode = compile("while (a) { break; }");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  assert!(positions_of(image, Op::JmpBreakContinue).is_empty());
}

#[test]
fn with_statement_wraps_its_body() {
  let bytecode = compile("with (o) { f(); }");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  let with = positions_of(image, Op::With)[0];
  let target = image.jump_target(with).unwrap();
  let end = &image.instrs[target];
  assert_eq!(end.op, Op::Meta);
  assert_eq!(end.args[0], MetaType::EndWith as u8);
}

#[test]
fn var_declarations_surface_as_var_decl_headers() {
  let bytecode = compile("var a = 1; var b;");
  let image = &bytecode.image;
  assert_image_well_formed(image);

  // Both names, declared once each, right after the scope header.
  let decls = positions_of(image, Op::VarDecl);
  assert_eq!(decls.len(), 2);
  assert_eq!(decls, vec![2, 3]);
  let a = str_lit_id(&bytecode.literals, "a");
  let b = str_lit_id(&bytecode.literals, "b");
  assert_eq!(image.lit_ref(decls[0], 0), Some(a));
  assert_eq!(image.lit_ref(decls[1], 0), Some(b));
}

#[test]
fn throw_emits_throw_value() {
  let bytecode = compile("throw a;");
  let image = &bytecode.image;
  assert_image_well_formed(image);
  assert_eq!(positions_of(image, Op::ThrowValue).len(), 1);
}
