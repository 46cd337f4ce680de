//! Typed intermediate form
//!
//! The type checker resolves every name to a frame offset, every call to a
//! declaration and every temporary to a frame slot. The canonizer lowers this
//! form to instructions without consulting any symbol table.

use crate::assembly::{ArithOp, CmpOp};
use crate::builder::FunId;
use crate::span::Span;
use crate::type_table::{TypeId, CANON_REGISTER_BYTESIZE};

/// Frame-relative storage location
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Place {
    /// Offset from SBP
    pub offset: u32,
    pub ty: TypeId,
    pub size: u32,
    /// Struct values are handled by address
    pub aggregate: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TExpr {
    pub kind: TExprKind,
    pub ty: TypeId,
    pub size: u32,
    /// Struct values evaluate to their address instead of their contents
    pub aggregate: bool,
    pub span: Span,
}

impl TExpr {
    /// Comes back in RET rather than through a caller-provided slot
    pub fn fits_register(&self) -> bool {
        self.size <= CANON_REGISTER_BYTESIZE
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TExprKind {
    Int(i32),
    Float(f32),
    Bool(bool),
    /// Index into the assembly's string literal table
    Str(u32),
    Local {
        offset: u32,
    },
    /// Field of a computed struct value
    Field {
        base: Box<TExpr>,
        offset: u32,
    },
    Arith {
        op: ArithOp,
        float: bool,
        lhs: Box<TExpr>,
        rhs: Box<TExpr>,
    },
    Compare {
        op: CmpOp,
        float: bool,
        lhs: Box<TExpr>,
        rhs: Box<TExpr>,
    },
    /// Short-circuit `&&` (and = true) or `||`
    Logical {
        and: bool,
        lhs: Box<TExpr>,
        rhs: Box<TExpr>,
    },
    Neg {
        float: bool,
        operand: Box<TExpr>,
    },
    Not(Box<TExpr>),
    IntToFloat(Box<TExpr>),
    FloatToInt(Box<TExpr>),
    /// Same bits, different static type (`int(true)`, `float(1.0)`)
    Retype(Box<TExpr>),
    /// Struct built field by field into a frame temporary
    Construct {
        temp: u32,
        fields: Vec<(u32, TExpr)>,
    },
    Call {
        fun: FunId,
        args: Vec<TExpr>,
        /// Frame slot the arguments are packed into before the call
        args_offset: u32,
        /// Frame slot receiving a struct result
        ret_temp: Option<u32>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TStmt {
    Eval(TExpr),
    Assign {
        place: Place,
        value: TExpr,
        span: Span,
    },
    /// Declaration without initializer
    Zero {
        place: Place,
        span: Span,
    },
    If {
        cond: TExpr,
        then_body: Vec<TStmt>,
        else_body: Vec<TStmt>,
        span: Span,
    },
    While {
        cond: TExpr,
        body: Vec<TStmt>,
        span: Span,
    },
    Return {
        value: Option<TExpr>,
        span: Span,
    },
    /// Nested block; scoping is already resolved into frame offsets
    Block(Vec<TStmt>),
}

/// Checked body of one script function
#[derive(Debug, Clone, PartialEq)]
pub struct TypedFunction {
    pub fun: FunId,
    pub body: Vec<TStmt>,
    /// Arguments + locals + temporaries
    pub frame_byte_size: u32,
    pub span: Span,
}
