//! Compile arena: types, pooled strings and function declarations
//!
//! One arena backs one compilation unit. The builder clones it, adds the
//! script's declarations and freezes the result behind an `Arc` that the
//! assembly keeps for its whole lifetime.

use crate::funcallback::FunCallback;
use crate::span::Span;
use crate::string_pool::{PooledStr, StringPool, StringPoolError};
use crate::type_table::{TypeId, TypeTable};
use std::fmt;
use thiserror::Error;

/// Index of a declaration; equal to its bind point in the assembly built from the arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunId(pub(crate) u32);

impl FunId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Declared argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgDec {
    pub name: PooledStr,
    pub ty: TypeId,
}

/// Call-boundary facts about a function
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunDesc {
    /// Sum of argument sizes, i.e. the input buffer length
    pub input_args_byte_size: u32,
    pub is_method: bool,
}

/// Frame body size: arguments, locals and temporaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StackFrameInfo {
    pub frame_byte_size: u32,
}

/// A declared function, scripted or intrinsic
#[derive(Clone)]
pub struct StmtFunDec {
    pub name: PooledStr,
    pub args: Vec<ArgDec>,
    pub return_type: TypeId,
    pub desc: FunDesc,
    pub frame: StackFrameInfo,
    /// Native implementation; `None` for script functions
    pub intrinsic: Option<FunCallback>,
    pub span: Span,
}

impl StmtFunDec {
    pub fn is_intrinsic(&self) -> bool {
        self.intrinsic.is_some()
    }
}

impl fmt::Debug for StmtFunDec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StmtFunDec")
            .field("name", &self.name)
            .field("args", &self.args)
            .field("return_type", &self.return_type)
            .field("desc", &self.desc)
            .field("frame", &self.frame)
            .field("intrinsic", &self.intrinsic.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeclareError {
    #[error("argument '{arg}' of function '{function}' cannot be void")]
    VoidArgument { function: String, arg: String },

    #[error("function '{function}' declares argument '{arg}' twice")]
    DuplicateArgument { function: String, arg: String },

    #[error("method '{function}' needs at least one argument to bind its receiver")]
    MethodWithoutReceiver { function: String },

    #[error(transparent)]
    String(#[from] StringPoolError),
}

#[derive(Debug, Clone)]
pub struct ModuleArena {
    pub(crate) types: TypeTable,
    pub(crate) strings: StringPool,
    pub(crate) fun_decs: Vec<StmtFunDec>,
}

impl ModuleArena {
    pub fn new(string_pool_slots_per_page: usize) -> Self {
        Self {
            types: TypeTable::new(),
            strings: StringPool::new(string_pool_slots_per_page),
            fun_decs: Vec::new(),
        }
    }

    pub fn types(&self) -> &TypeTable {
        &self.types
    }

    pub fn strings(&self) -> &StringPool {
        &self.strings
    }

    pub fn fun_decs(&self) -> &[StmtFunDec] {
        &self.fun_decs
    }

    pub fn fun_dec(&self, id: FunId) -> Option<&StmtFunDec> {
        self.fun_decs.get(id.index())
    }

    pub fn fun_name(&self, dec: &StmtFunDec) -> &str {
        self.strings.get(dec.name)
    }

    pub fn arg_name(&self, arg: &ArgDec) -> &str {
        self.strings.get(arg.name)
    }

    /// Build and append a declaration
    ///
    /// Strings must already live in this arena's pool. The frame starts out
    /// holding just the arguments; the canonizer widens it for script bodies.
    pub(crate) fn declare_function(
        &mut self,
        name: PooledStr,
        args: Vec<ArgDec>,
        return_type: TypeId,
        is_method: bool,
        span: Span,
    ) -> Result<FunId, DeclareError> {
        let function = self.strings.get(name).to_string();

        for (i, arg) in args.iter().enumerate() {
            let arg_name = self.strings.get(arg.name);
            if arg.ty == TypeId::VOID {
                return Err(DeclareError::VoidArgument {
                    function,
                    arg: arg_name.to_string(),
                });
            }
            if args[..i].iter().any(|prev| self.strings.get(prev.name) == arg_name) {
                return Err(DeclareError::DuplicateArgument {
                    function,
                    arg: arg_name.to_string(),
                });
            }
        }
        if is_method && args.is_empty() {
            return Err(DeclareError::MethodWithoutReceiver { function });
        }

        let input_args_byte_size = args.iter().map(|a| self.types.size_of(a.ty)).sum();
        let id = FunId(self.fun_decs.len() as u32);
        self.fun_decs.push(StmtFunDec {
            name,
            args,
            return_type,
            desc: FunDesc {
                input_args_byte_size,
                is_method,
            },
            frame: StackFrameInfo {
                frame_byte_size: input_args_byte_size,
            },
            intrinsic: None,
            span,
        });
        Ok(id)
    }

    /// First declaration with this name and exactly these argument types
    pub fn find_signature(&self, name: &str, arg_types: &[TypeId]) -> Option<FunId> {
        self.fun_decs
            .iter()
            .position(|dec| {
                self.strings.get(dec.name) == name
                    && dec.args.len() == arg_types.len()
                    && dec.args.iter().zip(arg_types).all(|(a, t)| a.ty == *t)
            })
            .map(|i| FunId(i as u32))
    }

    /// Human-readable signature, e.g. `add(a : int, b : int) : int`
    pub fn signature(&self, dec: &StmtFunDec) -> String {
        let args = dec
            .args
            .iter()
            .map(|a| format!("{} : {}", self.arg_name(a), self.types.name_of(a.ty)))
            .collect::<Vec<_>>()
            .join(", ");
        format!(
            "{}({}) : {}",
            self.fun_name(dec),
            args,
            self.types.name_of(dec.return_type)
        )
    }
}
