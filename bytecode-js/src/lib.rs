//! Byte-code instruction model shared by the compiler front-end and the VM.
//!
//! An instruction is an opcode plus three 8-bit operand slots. During
//! compilation each instruction travels as an [`OpMeta`]: the raw instruction
//! plus up to three literal references for the slots that name literals
//! rather than registers. Scope-local [`InstrBuffer`]s support the compiler's
//! template-then-rewrite protocol (append, read back, overwrite in place,
//! truncate the tail); [`BytecodeImage`] is the finalized wire form the VM
//! consumes.

pub mod buffer;
pub mod disasm;
pub mod image;
pub mod instr;
pub mod op;

pub use crate::buffer::BufferFull;
pub use crate::buffer::InstrBuffer;
pub use crate::image::BytecodeImage;
pub use crate::image::ImageInstr;
pub use crate::image::ImageLitRef;
pub use crate::instr::join_distance;
pub use crate::instr::split_distance;
pub use crate::instr::Instr;
pub use crate::instr::InstrIdx;
pub use crate::instr::LitId;
pub use crate::instr::OpMeta;
pub use crate::instr::Operand;
pub use crate::op::ArgType;
pub use crate::op::CallFlags;
pub use crate::op::MetaType;
pub use crate::op::Op;
pub use crate::op::ScopeCodeFlags;
pub use crate::op::SimpleValue;
pub use crate::op::IDX_EMPTY;
pub use crate::op::IDX_REWRITE_GENERAL;
pub use crate::op::IDX_REWRITE_LITERAL;
pub use crate::op::REG_GENERAL_FIRST;
pub use crate::op::REG_GENERAL_LAST;
pub use crate::op::REG_SPECIAL_EVAL_RET;
pub use crate::op::REG_SPECIAL_FOR_IN_PROP_NAME;
pub use crate::op::REG_SPECIAL_THIS;
