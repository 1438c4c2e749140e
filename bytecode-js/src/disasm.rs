use crate::instr::OpMeta;
use crate::op::MetaType;
use crate::op::Op;
use crate::op::IDX_EMPTY;
use crate::op::IDX_REWRITE_GENERAL;
use crate::op::IDX_REWRITE_LITERAL;
use std::fmt::Write;

fn format_arg(meta: &OpMeta, slot: usize, out: &mut String) {
  if let Some(lit) = meta.lit_ids[slot] {
    debug_assert_eq!(meta.instr.args[slot], IDX_REWRITE_LITERAL);
    write!(out, "lit:{}", lit.0).unwrap();
    return;
  }
  // Without the literal record the sentinel bytes are only a rendering hint:
  // idx-const slots may hold the same values as data.
  match meta.instr.args[slot] {
    IDX_EMPTY => out.push('_'),
    IDX_REWRITE_GENERAL => out.push('?'),
    idx => write!(out, "{}", idx).unwrap(),
  }
}

/// Renders one op-meta the way the engine's instruction dump prints it.
pub fn format_op_meta(idx: usize, meta: &OpMeta) -> String {
  let mut out = format!("{:5}  {:?}", idx, meta.instr.op);
  if meta.instr.op == Op::Meta {
    if let Some(meta_type) = MetaType::from_idx(meta.instr.args[0]) {
      write!(out, "[{:?}]", meta_type).unwrap();
    }
  }
  for slot in 0..meta.instr.op.operand_count() {
    if meta.instr.op == Op::Meta && slot == 0 {
      continue;
    }
    out.push(' ');
    format_arg(meta, slot, &mut out);
  }
  out
}

/// Renders a whole instruction sequence, one op-meta per line.
pub fn dump_op_metas(metas: &[OpMeta]) -> String {
  let mut out = String::new();
  for (idx, meta) in metas.iter().enumerate() {
    out.push_str(&format_op_meta(idx, meta));
    out.push('\n');
  }
  out
}
