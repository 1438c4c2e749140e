mod common;

use common::*;
use compile_js::CompileErrorType;
use compile_js::ErrorKind;

fn compile_err(source: &str) -> compile_js::CompileError {
  compile_js::parse_script(source).unwrap_err()
}

#[test]
fn assignment_to_a_value_is_a_reference_error() {
  let err = compile_err("1 = 2;");
  assert_eq!(err.kind(), ErrorKind::Reference);
  assert_eq!(err.typ, CompileErrorType::InvalidLeftHandSide);
}

#[test]
fn compound_assignment_to_a_call_result_is_a_reference_error() {
  let err = compile_err("f() += 1;");
  assert_eq!(err.kind(), ErrorKind::Reference);
}

#[test]
fn prefix_increment_of_a_value_is_a_reference_error() {
  let err = compile_err("++1;");
  assert_eq!(err.kind(), ErrorKind::Reference);
  assert_eq!(err.typ, CompileErrorType::InvalidLeftHandSideInPrefixOperation);
}

#[test]
fn assignment_to_a_property_is_fine() {
  compile("a.b = 1; a[0] = 2; a.b.c += 3;");
}

#[test]
fn return_outside_a_function() {
  let err = compile_err("return 1;");
  assert_eq!(err.typ, CompileErrorType::ReturnOutsideFunction);
}

#[test]
fn asi_requires_a_newline_between_statements() {
  let err = compile_err("a = 1 b = 2");
  assert_eq!(err.typ, CompileErrorType::ExpectedSemicolonOrNewline);
  compile("a = 1\nb = 2");
  compile("a = 1; b = 2");
}

#[test]
fn labels_must_exist_and_be_unique() {
  assert_eq!(
    compile_err("break;").typ,
    CompileErrorType::NoTargetForBreak
  );
  assert_eq!(
    compile_err("while (a) { break missing; }").typ,
    CompileErrorType::LabelNotFound
  );
  assert_eq!(
    compile_err("continue;").typ,
    CompileErrorType::NoTargetForContinue
  );
  assert_eq!(
    compile_err("x: x: while (a) {}").typ,
    CompileErrorType::DuplicateLabel
  );
}

#[test]
fn case_and_default_outside_a_switch() {
  assert!(compile_js::parse_script("case 1: a();").is_err());
  assert!(compile_js::parse_script("default: a();").is_err());
  assert!(compile_js::parse_script("{ case 1: a(); }").is_err());
}

#[test]
fn duplicate_default_clause() {
  let err = compile_err("switch (a) { default: b(); default: c(); }");
  assert_eq!(err.typ, CompileErrorType::DuplicateDefaultClause);
}

#[test]
fn try_requires_catch_or_finally() {
  let err = compile_err("try { a(); }");
  assert_eq!(err.typ, CompileErrorType::ExpectedSyntax("either 'catch' or 'finally'"));
}

#[test]
fn strict_mode_restrictions() {
  assert_eq!(
    compile_err("\"use strict\"; delete a;").typ,
    CompileErrorType::DeleteOfIdentifierInStrictMode
  );
  assert_eq!(
    compile_err("\"use strict\"; eval = 1;").typ,
    CompileErrorType::EvalOrArgumentsInStrictMode
  );
  assert_eq!(
    compile_err("\"use strict\"; arguments++;").typ,
    CompileErrorType::EvalOrArgumentsInStrictMode
  );
  assert_eq!(
    compile_err("\"use strict\"; var eval;").typ,
    CompileErrorType::EvalOrArgumentsInStrictMode
  );
  assert_eq!(
    compile_err("\"use strict\"; x = { a: 1, a: 2 };").typ,
    CompileErrorType::DuplicatePropertyName
  );
  assert_eq!(
    compile_err("\"use strict\"; function f(a, a) {}").typ,
    CompileErrorType::DuplicateFormalParameter
  );
  // Non-strict code allows all of the above.
  compile("delete a; eval = 1; arguments++; x = { a: 1, a: 2 }; function f(a, a) {}");
}

#[test]
fn strict_mode_directive_applies_inside_one_function_only() {
  compile("function f() { \"use strict\"; } with (x) {}");
  let err = compile_err("function f() { \"use strict\"; with (x) {} }");
  assert_eq!(err.typ, CompileErrorType::WithInStrictMode);
}

#[test]
fn use_strict_with_escape_sequences_is_inert() {
  compile("\"use\\u0020strict\"; with (x) {}");
}

#[test]
fn directive_prologue_is_still_emitted_as_statements() {
  let bytecode = compile("\"use strict\"; a = 1;");
  assert_image_well_formed(&bytecode.image);
  // The directive string appears in the literal table because the prologue
  // is re-parsed as an ordinary expression statement.
  str_lit_id(&bytecode.literals, "use strict");
}

#[test]
fn strict_mode_reserves_future_words() {
  assert!(compile_js::parse_script("\"use strict\"; var let = 1;").is_err());
  compile("var let = 1;");
  assert!(compile_js::parse_script("var class = 1;").is_err());
}

#[test]
fn accessor_and_data_property_conflict_in_any_mode() {
  let err = compile_err("x = { a: 1, get a() {} };");
  assert_eq!(err.typ, CompileErrorType::AccessorAndDataProperty);
  let err = compile_err("x = { get a() {}, get a() {} };");
  assert_eq!(err.typ, CompileErrorType::DuplicatePropertyName);
  compile("x = { get a() {}, set a(v) {} };");
}

#[test]
fn too_many_formal_parameters() {
  let names: Vec<String> = (0..256).map(|i| format!("p{}", i)).collect();
  let source = format!("function f({}) {{}}", names.join(", "));
  let err = compile_err(&source);
  assert_eq!(err.typ, CompileErrorType::TooManyFormalParameters);

  let names: Vec<String> = (0..255).map(|i| format!("p{}", i)).collect();
  let source = format!("function f({}) {{}}", names.join(", "));
  compile(&source);
}

#[test]
fn error_text_carries_a_source_position() {
  let source = "a = 1;\nwhile (;) {}";
  let err = compile_err(source);
  let rendered = compile_js::format_error(&err, source);
  assert!(rendered.contains("SyntaxError"));
  assert!(rendered.contains("at 2:"), "got {}", rendered);
}

#[test]
fn unterminated_constructs_fail_cleanly() {
  assert!(compile_js::parse_script("function f( {").is_err());
  assert!(compile_js::parse_script("'unterminated").is_err());
  assert!(compile_js::parse_script("/* no end").is_err());
  assert!(compile_js::parse_script("x = (1 + ;").is_err());
  assert!(compile_js::parse_script("if (a { b(); }").is_err());
}
