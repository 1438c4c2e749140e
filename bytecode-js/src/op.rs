use bitflags::bitflags;
use serde::Serialize;

/// Operand index space shared by every instruction argument slot.
///
/// Values below [`IDX_REWRITE_GENERAL`] are register indices or small
/// constants; the top three values are reserved sentinels and never denote a
/// real register.
pub const IDX_EMPTY: u8 = 0xff;
/// A literal reference follows: the op-meta's literal slot supplies it.
pub const IDX_REWRITE_LITERAL: u8 = 0xfe;
/// Placeholder awaiting a back-patch. Must not survive into a finalized image.
pub const IDX_REWRITE_GENERAL: u8 = 0xfd;

pub const REG_GENERAL_FIRST: u8 = 0;
pub const REG_GENERAL_LAST: u8 = 247;
pub const REG_SPECIAL_EVAL_RET: u8 = 248;
pub const REG_SPECIAL_THIS: u8 = 249;
pub const REG_SPECIAL_FOR_IN_PROP_NAME: u8 = 250;

/// Byte-code operation. One byte on the wire; see [`crate::BytecodeImage`].
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug, Serialize)]
#[repr(u8)]
pub enum Op {
  Assignment,
  PropGetter,
  PropSetter,

  Addition,
  Subtraction,
  Multiplication,
  Division,
  Remainder,
  BShiftLeft,
  BShiftRight,
  BShiftURight,
  BAnd,
  BOr,
  BXor,
  LessThan,
  GreaterThan,
  LessOrEqualThan,
  GreaterOrEqualThan,
  EqualValue,
  NotEqualValue,
  EqualValueType,
  NotEqualValueType,
  Instanceof,
  In,

  UnaryPlus,
  UnaryMinus,
  BNot,
  LogicalNot,
  Typeof,
  PostIncr,
  PostDecr,
  PreIncr,
  PreDecr,
  DeleteVar,
  DeleteProp,

  CallN,
  ConstructN,
  FuncDeclN,
  FuncExprN,
  ArrayDecl,
  ObjDecl,

  Meta,
  VarDecl,
  RegVarDecl,
  Ret,
  Retval,
  ThrowValue,

  JmpDown,
  JmpUp,
  JmpBreakContinue,
  IsTrueJmpDown,
  IsTrueJmpUp,
  IsFalseJmpDown,

  TryBlock,
  With,
  ForIn,
}

impl Op {
  /// Number of operand slots the instruction actually uses. Unused trailing
  /// slots always hold [`IDX_EMPTY`].
  pub fn operand_count(self) -> usize {
    use Op::*;
    match self {
      Ret => 0,
      Retval | ThrowValue | VarDecl => 1,
      UnaryPlus | UnaryMinus | BNot | LogicalNot | Typeof | PostIncr | PostDecr | PreIncr
      | PreDecr | DeleteVar | FuncDeclN | JmpDown | JmpUp | JmpBreakContinue | TryBlock => 2,
      _ => 3,
    }
  }
}

/// Sub-type tag carried in the second operand slot of [`Op::Assignment`],
/// telling the VM how to interpret the third slot.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
#[repr(u8)]
pub enum ArgType {
  Simple,
  Smallint,
  Number,
  String,
  Regexp,
  Variable,
}

impl ArgType {
  pub fn from_idx(idx: u8) -> Option<ArgType> {
    Some(match idx {
      0 => ArgType::Simple,
      1 => ArgType::Smallint,
      2 => ArgType::Number,
      3 => ArgType::String,
      4 => ArgType::Regexp,
      5 => ArgType::Variable,
      _ => return None,
    })
  }
}

/// Simple immediate values for `Assignment` with [`ArgType::Simple`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
#[repr(u8)]
pub enum SimpleValue {
  Undefined,
  Null,
  False,
  True,
  ArrayHole,
}

/// Discriminator carried in the first operand slot of [`Op::Meta`].
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Serialize)]
#[repr(u8)]
pub enum MetaType {
  Varg,
  VargPropData,
  VargPropGetter,
  VargPropSetter,
  FunctionEnd,
  Catch,
  CatchExceptionIdentifier,
  Finally,
  EndTryCatchFinally,
  EndWith,
  EndForIn,
  CallSiteInfo,
  ScopeCodeFlags,
}

impl MetaType {
  pub fn from_idx(idx: u8) -> Option<MetaType> {
    use MetaType::*;
    Some(match idx {
      0 => Varg,
      1 => VargPropData,
      2 => VargPropGetter,
      3 => VargPropSetter,
      4 => FunctionEnd,
      5 => Catch,
      6 => CatchExceptionIdentifier,
      7 => Finally,
      8 => EndTryCatchFinally,
      9 => EndWith,
      10 => EndForIn,
      11 => CallSiteInfo,
      12 => ScopeCodeFlags,
      _ => return None,
    })
  }

  /// Property-descriptor vargs carry the property key in their second slot.
  pub fn is_prop_descriptor(self) -> bool {
    matches!(
      self,
      MetaType::VargPropData | MetaType::VargPropGetter | MetaType::VargPropSetter
    )
  }
}

bitflags! {
  /// Flags of a `Meta(CallSiteInfo)` instruction.
  #[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
  pub struct CallFlags: u8 {
    const HAVE_THIS_ARG = 1 << 0;
    const DIRECT_CALL_TO_EVAL_FORM = 1 << 1;
  }
}

bitflags! {
  /// Flags of a scope, written into its `Meta(ScopeCodeFlags)` header.
  #[derive(Default, Clone, Copy, Debug, PartialEq, Eq, Hash)]
  pub struct ScopeCodeFlags: u8 {
    const STRICT = 1 << 0;
    const NOT_REF_ARGUMENTS_IDENTIFIER = 1 << 1;
    const NOT_REF_EVAL_IDENTIFIER = 1 << 2;
    const ARGUMENTS_ON_REGISTERS = 1 << 3;
    const NO_LEX_ENV = 1 << 4;
  }
}
