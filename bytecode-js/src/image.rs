use crate::instr::join_distance;
use crate::instr::LitId;
use crate::instr::OpMeta;
use crate::op::Op;
use serde::Serialize;

/// One finalized instruction: `{opcode, arg0, arg1, arg2}`, four bytes on the
/// wire.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub struct ImageInstr {
  pub op: Op,
  pub args: [u8; 3],
}

/// Literal reference record in the image's parallel table: instruction
/// position + operand slot → literal id.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
pub struct ImageLitRef {
  pub pos: u32,
  pub slot: u8,
  pub lit: LitId,
}

/// Finalized byte-code image handed to the VM.
///
/// Instructions of all scopes are concatenated depth-first: a scope's own
/// instructions first, then each completed sub-scope's block in declaration
/// order. Function-end metas inside the stream carry the distance from
/// themselves to the end of their function's block.
#[derive(Default, Debug, Clone, Serialize)]
pub struct BytecodeImage {
  pub instrs: Vec<ImageInstr>,
  pub lit_refs: Vec<ImageLitRef>,
}

impl BytecodeImage {
  // The general-rewrite sentinel never survives into a finalized image: every
  // template is resolved before its scope completes (the dumper's back-patch
  // stacks drain to empty). No byte-level assert is possible here because
  // idx-const slots may legitimately hold the sentinel values as data.
  pub fn push(&mut self, meta: OpMeta) {
    let pos = self.instrs.len() as u32;
    for (slot, lit) in meta.lit_ids.iter().enumerate() {
      if let Some(lit) = lit {
        self.lit_refs.push(ImageLitRef {
          pos,
          slot: slot as u8,
          lit: *lit,
        });
      }
    }
    self.instrs.push(ImageInstr {
      op: meta.instr.op,
      args: meta.instr.args,
    });
  }

  pub fn len(&self) -> usize {
    self.instrs.len()
  }

  pub fn is_empty(&self) -> bool {
    self.instrs.is_empty()
  }

  /// Literal reference of an instruction's slot, if any.
  pub fn lit_ref(&self, pos: usize, slot: usize) -> Option<LitId> {
    self
      .lit_refs
      .iter()
      .find(|r| r.pos as usize == pos && r.slot as usize == slot)
      .map(|r| r.lit)
  }

  /// Decodes the jump target of the instruction at `pos`, if it is a jump.
  /// Displacements are non-negative; direction is encoded in the opcode.
  pub fn jump_target(&self, pos: usize) -> Option<usize> {
    let instr = self.instrs.get(pos)?;
    let (hi, lo, down) = match instr.op {
      Op::JmpDown | Op::JmpBreakContinue | Op::TryBlock => (instr.args[0], instr.args[1], true),
      Op::JmpUp => (instr.args[0], instr.args[1], false),
      Op::IsTrueJmpDown | Op::IsFalseJmpDown | Op::With | Op::ForIn => {
        (instr.args[1], instr.args[2], true)
      }
      Op::IsTrueJmpUp => (instr.args[1], instr.args[2], false),
      _ => return None,
    };
    let distance = join_distance(hi, lo) as usize;
    Some(if down { pos + distance } else { pos - distance })
  }

  /// Serializes to the flat 4-byte-per-instruction wire layout.
  pub fn to_bytes(&self) -> Vec<u8> {
    let mut out = Vec::with_capacity(self.instrs.len() * 4);
    for instr in &self.instrs {
      out.push(instr.op as u8);
      out.extend_from_slice(&instr.args);
    }
    out
  }
}
