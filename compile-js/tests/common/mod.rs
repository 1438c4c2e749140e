use bytecode_js::BytecodeImage;
use bytecode_js::LitId;
use bytecode_js::Op;
use bytecode_js::IDX_REWRITE_LITERAL;
use compile_js::LitValue;
use compile_js::ScriptBytecode;

pub fn compile(source: &str) -> ScriptBytecode {
  match compile_js::parse_script(source) {
    Ok(bytecode) => bytecode,
    Err(err) => panic!("compilation failed: {}", compile_js::format_error(&err, source)),
  }
}

pub fn ops(image: &BytecodeImage) -> Vec<Op> {
  image.instrs.iter().map(|i| i.op).collect()
}

pub fn positions_of(image: &BytecodeImage, op: Op) -> Vec<usize> {
  image
    .instrs
    .iter()
    .enumerate()
    .filter(|(_, i)| i.op == op)
    .map(|(pos, _)| pos)
    .collect()
}

pub fn str_lit_id(literals: &[LitValue], value: &str) -> LitId {
  let pos = literals
    .iter()
    .position(|l| matches!(l, LitValue::Str(s) if s == value))
    .unwrap_or_else(|| panic!("literal {:?} not interned", value));
  LitId(pos as u16)
}

/// Whether any operand slot of any instruction references the literal.
pub fn references_lit(image: &BytecodeImage, lit: LitId) -> bool {
  image.lit_refs.iter().any(|r| r.lit == lit)
}

/// Slot invariant of the finalized image: every literal record pairs with a
/// literal-follow operand, and every decoded jump stays in range. (Idx-const
/// slots may hold any byte, so the reverse byte-level check is not sound.)
pub fn assert_image_well_formed(image: &BytecodeImage) {
  for (pos, instr) in image.instrs.iter().enumerate() {
    for slot in 0..3 {
      if image.lit_ref(pos, slot).is_some() {
        assert_eq!(
          instr.args[slot], IDX_REWRITE_LITERAL,
          "literal slot mismatch at {}:{}",
          pos, slot
        );
      }
    }
    if let Some(target) = image.jump_target(pos) {
      assert!(target <= image.len(), "jump target out of range at {}", pos);
    }
  }
}
