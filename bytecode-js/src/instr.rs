use crate::op::Op;
use crate::op::IDX_EMPTY;
use crate::op::IDX_REWRITE_GENERAL;
use crate::op::IDX_REWRITE_LITERAL;
use crate::op::REG_GENERAL_FIRST;
use crate::op::REG_SPECIAL_FOR_IN_PROP_NAME;
use serde::Serialize;

/// Compressed reference into the literal table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct LitId(pub u16);

/// Position of an instruction within one scope's buffer.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
pub struct InstrIdx(pub u16);

impl InstrIdx {
  pub fn back(self) -> InstrIdx {
    debug_assert!(self.0 > 0);
    InstrIdx(self.0 - 1)
  }
}

/// Splits a forward/backward jump distance into the two contiguous 8-bit
/// operand slots it is stored in. `None` when the distance does not fit the
/// 16-bit displacement encoding.
pub fn split_distance(distance: usize) -> Option<(u8, u8)> {
  let distance = u16::try_from(distance).ok()?;
  Some(((distance >> 8) as u8, (distance & 0xff) as u8))
}

/// Inverse of [`split_distance`].
pub fn join_distance(hi: u8, lo: u8) -> u16 {
  ((hi as u16) << 8) | lo as u16
}

/// Parser-level descriptor of one instruction argument.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Operand {
  /// Absent argument.
  Empty,
  /// Placeholder to be filled by a later rewrite.
  Unknown,
  /// Small unsigned constant (opcode sub-type tag, displacement half, ...).
  IdxConst(u8),
  /// VM register.
  Reg(u8),
  /// Reference into the literal table.
  Lit(LitId),
}

impl Operand {
  pub fn reg(index: u8) -> Operand {
    debug_assert!((REG_GENERAL_FIRST..=REG_SPECIAL_FOR_IN_PROP_NAME).contains(&index));
    Operand::Reg(index)
  }

  pub fn is_empty(self) -> bool {
    self == Operand::Empty
  }

  pub fn is_reg(self) -> bool {
    matches!(self, Operand::Reg(_))
  }

  pub fn is_lit(self) -> bool {
    matches!(self, Operand::Lit(_))
  }

  /// Raw operand index as encoded into the instruction.
  pub fn idx(self) -> u8 {
    match self {
      Operand::Empty => IDX_EMPTY,
      Operand::Unknown => IDX_REWRITE_GENERAL,
      Operand::IdxConst(c) => c,
      Operand::Reg(r) => r,
      Operand::Lit(_) => IDX_REWRITE_LITERAL,
    }
  }

  pub fn lit(self) -> Option<LitId> {
    match self {
      Operand::Lit(id) => Some(id),
      _ => None,
    }
  }

  /// Reconstructs an operand from a raw index + literal slot pair, e.g. when
  /// re-reading an emitted property getter to derive the matching setter.
  pub fn from_raw(idx: u8, lit: Option<LitId>) -> Operand {
    match lit {
      Some(id) => {
        debug_assert_eq!(idx, IDX_REWRITE_LITERAL);
        Operand::Lit(id)
      }
      None if idx == IDX_EMPTY => Operand::Empty,
      None if idx == IDX_REWRITE_GENERAL => Operand::Unknown,
      None => Operand::Reg(idx),
    }
  }
}

/// Raw instruction: opcode plus three operand index slots.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub struct Instr {
  pub op: Op,
  pub args: [u8; 3],
}

/// An emitted instruction together with the literal references of its
/// argument slots. This is the unit the instruction buffer stores and the
/// back-patch protocol rewrites.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub struct OpMeta {
  pub instr: Instr,
  pub lit_ids: [Option<LitId>; 3],
}

impl OpMeta {
  pub fn new(op: Op, operands: &[Operand]) -> OpMeta {
    debug_assert!(operands.len() <= 3);
    let mut args = [IDX_EMPTY; 3];
    let mut lit_ids = [None; 3];
    for (i, operand) in operands.iter().enumerate() {
      args[i] = operand.idx();
      lit_ids[i] = operand.lit();
    }
    OpMeta {
      instr: Instr { op, args },
      lit_ids,
    }
  }

  pub fn operand(&self, slot: usize) -> Operand {
    Operand::from_raw(self.instr.args[slot], self.lit_ids[slot])
  }

  /// Slot invariant: a slot carrying a literal reference always encodes the
  /// literal-follow marker. The reverse does not hold at the byte level:
  /// idx-const slots (smallints, displacement halves) may take any value.
  pub fn validate_slots(&self) {
    for slot in 0..3 {
      if self.lit_ids[slot].is_some() {
        debug_assert_eq!(self.instr.args[slot], IDX_REWRITE_LITERAL);
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn distance_split_round_trips() {
    for distance in [0usize, 1, 255, 256, 65534, 65535] {
      let (hi, lo) = split_distance(distance).unwrap();
      assert_eq!(join_distance(hi, lo) as usize, distance);
    }
    assert_eq!(split_distance(65536), None);
  }

  #[test]
  fn op_meta_encodes_operands() {
    let meta = OpMeta::new(Op::PropGetter, &[
      Operand::reg(3),
      Operand::Lit(LitId(7)),
      Operand::Empty,
    ]);
    assert_eq!(meta.instr.args, [3, IDX_REWRITE_LITERAL, IDX_EMPTY]);
    assert_eq!(meta.lit_ids, [None, Some(LitId(7)), None]);
    assert_eq!(meta.operand(1), Operand::Lit(LitId(7)));
    meta.validate_slots();
  }
}
