//! BlockScript Runtime - embedded scripting core
//!
//! This library provides the complete BlockScript pipeline:
//! - Lexical analysis and parsing
//! - Type checking with fixed frame layout
//! - Lowering to a register/stack instruction set
//! - A VM with explicit frames and a native call ABI

/// BlockScript runtime version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// Public API modules
pub mod assembly;
pub mod ast;
pub mod builder;
pub mod canonizer;
pub mod diagnostic;
pub mod funcallback;
pub mod host;
pub mod ir;
pub mod lexer;
pub mod log;
pub mod marshal;
pub mod parser;
pub mod runtime;
pub mod span;
pub mod stdlib;
pub mod string_pool;
pub mod token;
pub mod type_table;
pub mod typechecker;
pub mod vm;

// Re-export commonly used types
pub use assembly::{Assembly, Block, FunMapEntry, Instruction, Reg};
pub use builder::{BlockScriptBuilder, FunId, ModuleArena, StmtFunDec};
pub use diagnostic::{error_codes, Diagnostic, DiagnosticLevel, DIAG_VERSION};
pub use funcallback::{
    create_intrinsic_function, create_typed_intrinsic, execute_function, get_function_bind_point,
    FunBindPoint, FunCallback, FunCallbackContext, IntrinsicError, InvokeError, NativeError,
};
pub use host::VmHost;
pub use lexer::Lexer;
pub use log::LogTag;
pub use marshal::{ScriptArgs, ScriptValue, StringHandle};
pub use parser::Parser;
pub use runtime::{BlockScript, RuntimeError};
pub use span::Span;
pub use stdlib::register_system_intrinsics;
pub use string_pool::CHARS_PER_STRING;
pub use token::{Token, TokenKind};
pub use type_table::{TypeDesc, TypeId, TypeTable, CANON_REGISTER_BYTESIZE};
pub use vm::{BsVm, BsVmState, VmError};
