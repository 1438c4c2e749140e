use crate::instr::InstrIdx;
use crate::instr::OpMeta;

/// The per-scope instruction counter is 16 bits; a scope with more
/// instructions than that cannot be encoded.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct BufferFull;

/// Append-only store of op-metas, addressable by instruction counter, with
/// rewrite-at-index and truncate-tail support for the back-patch protocol.
#[derive(Default, Debug, Clone)]
pub struct InstrBuffer {
  metas: Vec<OpMeta>,
}

impl InstrBuffer {
  pub fn new() -> InstrBuffer {
    InstrBuffer::default()
  }

  /// Current instruction counter, i.e. the position the next append gets.
  pub fn next_idx(&self) -> InstrIdx {
    InstrIdx(self.metas.len() as u16)
  }

  pub fn len(&self) -> usize {
    self.metas.len()
  }

  pub fn is_empty(&self) -> bool {
    self.metas.is_empty()
  }

  pub fn push(&mut self, meta: OpMeta) -> Result<InstrIdx, BufferFull> {
    meta.validate_slots();
    let idx = u16::try_from(self.metas.len()).map_err(|_| BufferFull)?;
    self.metas.push(meta);
    Ok(InstrIdx(idx))
  }

  pub fn get(&self, idx: InstrIdx) -> OpMeta {
    self.metas[idx.0 as usize]
  }

  /// Overwrites the op-meta at `idx` in place. Back-patch rewrites never
  /// reorder instructions.
  pub fn rewrite(&mut self, idx: InstrIdx, meta: OpMeta) {
    meta.validate_slots();
    self.metas[idx.0 as usize] = meta;
  }

  /// Removes the op-meta at `idx`, shifting every later instruction down by
  /// one. Recorded positions past `idx` must be adjusted by the caller.
  pub fn remove(&mut self, idx: InstrIdx) {
    self.metas.remove(idx.0 as usize);
  }

  /// Moves the write cursor back to `idx`, discarding the tail.
  pub fn truncate(&mut self, idx: InstrIdx) {
    debug_assert!((idx.0 as usize) <= self.metas.len());
    self.metas.truncate(idx.0 as usize);
  }

  pub fn iter(&self) -> impl Iterator<Item = &OpMeta> {
    self.metas.iter()
  }

  pub fn as_slice(&self) -> &[OpMeta] {
    &self.metas
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::instr::Operand;
  use crate::op::Op;

  #[test]
  fn append_rewrite_truncate() {
    let mut buf = InstrBuffer::new();
    assert_eq!(buf.next_idx(), InstrIdx(0));
    let a = buf.push(OpMeta::new(Op::Ret, &[])).unwrap();
    let b = buf
      .push(OpMeta::new(Op::Retval, &[Operand::reg(0)]))
      .unwrap();
    assert_eq!((a, b), (InstrIdx(0), InstrIdx(1)));

    let rewritten = OpMeta::new(Op::Retval, &[Operand::reg(1)]);
    buf.rewrite(b, rewritten);
    assert_eq!(buf.get(b), rewritten);

    buf.truncate(b);
    assert_eq!(buf.len(), 1);
    assert_eq!(buf.next_idx(), InstrIdx(1));
  }
}
