use proptest::prelude::*;

fn arb_noise() -> impl Strategy<Value = String> {
  prop::collection::vec(any::<char>(), 0..64).prop_map(|chars| chars.into_iter().collect())
}

fn arb_snippet() -> impl Strategy<Value = String> {
  let statements = vec![
    "var x = 1;",
    "x = a + b * c;",
    "f(1, 'two', g());",
    "if (flag) { doThing(); } else { other(); }",
    "while (count < 10) { count++; }",
    "do { tick(); } while (more);",
    "for (i = 0; i < 3; i++) body();",
    "for (k in obj) use(obj[k]);",
    "switch (tag) { case 1: a(); break; default: b(); }",
    "try { risky(); } catch (e) { log(e); } finally { done(); }",
    "function helper(a, b) { var t = a - b; return t; }",
    "x = function () { return this.y; };",
    "o = { a: 1, get b() { return 2; } };",
    "arr = [1, , 'x', /re/g];",
    "outer: while (a) { continue outer; }",
    "x = cond ? left : right;",
    "x = a && b || !c;",
    "delete o.p;",
    "throw new Error('boom');",
    "with (env) { lookup(); }",
  ];
  prop::sample::select(statements).prop_map(|s| s.to_string())
}

fn arb_structured_program() -> impl Strategy<Value = String> {
  prop::collection::vec(arb_snippet(), 1..16).prop_map(|parts| parts.join("\n"))
}

fn arb_source() -> impl Strategy<Value = String> {
  prop_oneof![arb_noise(), arb_structured_program()]
}

proptest! {
  #![proptest_config(ProptestConfig::with_cases(64))]

  #[test]
  fn compilation_never_panics(src in arb_source()) {
    let _ = compile_js::parse_script(&src);
    let _ = compile_js::parse_eval(&src, false);
  }

  #[test]
  fn compilation_is_deterministic(src in arb_source()) {
    let first = compile_js::parse_script(&src);
    let second = compile_js::parse_script(&src);
    match (first, second) {
      (Ok(a), Ok(b)) => {
        prop_assert_eq!(a.image.to_bytes(), b.image.to_bytes());
        prop_assert_eq!(a.image.lit_refs, b.image.lit_refs);
        prop_assert_eq!(a.literals, b.literals);
      }
      (Err(a), Err(b)) => prop_assert_eq!(a, b),
      _ => prop_assert!(false, "one attempt failed, the other did not"),
    }
  }

  #[test]
  fn valid_programs_produce_well_formed_images(src in arb_structured_program()) {
    if let Ok(bytecode) = compile_js::parse_script(&src) {
      for pos in 0..bytecode.image.len() {
        if let Some(target) = bytecode.image.jump_target(pos) {
          prop_assert!(target <= bytecode.image.len());
        }
      }
      for lit_ref in &bytecode.image.lit_refs {
        prop_assert!((lit_ref.lit.0 as usize) < bytecode.literals.len());
      }
    }
  }
}
