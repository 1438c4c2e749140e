//! Single-pass ECMAScript 5.1 to byte-code compiler.
//!
//! The pipeline is lexer → parser → dumper (→ instruction buffers): the
//! recursive-descent parser drives the byte-code dumper directly, with no
//! AST in between. Constructs whose operands are only known later (jump
//! targets, argument counts, scope flags, function extents) are emitted as
//! templates and rewritten in place once resolved. After a function body is
//! parsed, an optimization pass rewrites identifier references to registers
//! where the scope provably permits it.

use bytecode_js::BytecodeImage;

pub mod char;
pub mod dump;
pub mod error;
pub mod label;
pub mod lex;
pub mod lit;
pub mod loc;
pub mod num;
mod optimize;
pub mod parse;
pub mod scope;
pub mod token;

pub use crate::error::CompileError;
pub use crate::error::CompileErrorType;
pub use crate::error::CompileResult;
pub use crate::error::ErrorKind;
pub use crate::lit::LitValue;
pub use crate::loc::line_col;
pub use crate::loc::Loc;
pub use crate::num::JsNumber;

/// Compilation options.
#[derive(Default, Clone, Copy, Debug)]
pub struct CompileOptions {
  /// Dump every emitted instruction and the final image through `tracing`.
  pub show_instructions: bool,
}

/// A compiled program: the byte-code image plus the id-ordered literal table
/// its literal references resolve through.
#[derive(Debug)]
pub struct ScriptBytecode {
  pub image: BytecodeImage,
  pub literals: Vec<LitValue>,
}

/// Result of compiling an eval body.
#[derive(Debug)]
pub struct EvalBytecode {
  pub image: BytecodeImage,
  pub literals: Vec<LitValue>,
  /// Whether the compiled code contains a function declaration/expression.
  pub contains_functions: bool,
}

/// Compiles a program (non-strict, non-eval entry).
pub fn parse_script(source: &str) -> CompileResult<ScriptBytecode> {
  parse_script_with_options(source, CompileOptions::default())
}

pub fn parse_script_with_options(
  source: &str,
  options: CompileOptions,
) -> CompileResult<ScriptBytecode> {
  let (image, literals, _) =
    parse::parse_program(source, false, false, options.show_instructions)?;
  Ok(ScriptBytecode { image, literals })
}

/// Compiles a string passed to `eval()`. The body inherits the caller's
/// strictness, stores every top-level expression statement's value into the
/// eval-result register, and ends with `retval` of that register.
pub fn parse_eval(source: &str, inherited_strict: bool) -> CompileResult<EvalBytecode> {
  parse_eval_with_options(source, inherited_strict, CompileOptions::default())
}

pub fn parse_eval_with_options(
  source: &str,
  inherited_strict: bool,
  options: CompileOptions,
) -> CompileResult<EvalBytecode> {
  let (image, literals, contains_functions) =
    parse::parse_program(source, true, inherited_strict, options.show_instructions)?;
  Ok(EvalBytecode {
    image,
    literals,
    contains_functions,
  })
}

/// Renders an error with its 1-based line/column position in `source`.
pub fn format_error(err: &CompileError, source: &str) -> String {
  let (line, col) = line_col(source, err.loc.0);
  format!("{} at {}:{}", err, line, col)
}
