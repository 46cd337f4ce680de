//! Abstract Syntax Tree (AST) definitions
//!
//! The parser produces these nodes; the type checker consumes them. Nodes
//! are plain data with spans so diagnostics can point back into the source.

use crate::span::Span;
use serde::{Deserialize, Serialize};

/// AST schema version, included in JSON dumps
pub const AST_VERSION: u32 = 1;

/// Top-level compilation unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub items: Vec<Item>,
}

impl Program {
    /// Serialize with the schema version for tooling
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&serde_json::json!({
            "ast_version": AST_VERSION,
            "items": self.items,
        }))
    }
}

/// Top-level item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Item {
    Struct(StructDecl),
    Function(FunctionDecl),
}

/// Identifier with its location
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    pub name: String,
    pub span: Span,
}

/// Reference to a type by name (`int`, `float3`, `Light`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeRef {
    pub name: String,
    pub span: Span,
}

/// Struct declaration
///
/// Syntax: `struct Light { pos : float3; intensity : float; };`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructDecl {
    pub name: Identifier,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: Identifier,
    pub type_ref: TypeRef,
    pub span: Span,
}

/// Function declaration
///
/// Syntax: `add(a : int, b : int) : int { return a + b; }`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDecl {
    pub name: Identifier,
    pub params: Vec<Param>,
    pub return_type: TypeRef,
    pub body: Block,
    pub span: Span,
}

/// Function parameter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Identifier,
    pub type_ref: TypeRef,
    pub span: Span,
}

/// Block of statements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub statements: Vec<Stmt>,
    pub span: Span,
}

/// Statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stmt {
    VarDecl(VarDecl),
    Assign(Assign),
    If(IfStmt),
    While(WhileStmt),
    Return(ReturnStmt),
    Block(Block),
    Expr(ExprStmt),
}

/// Local variable declaration
///
/// Syntax: `name : type = expr;` or `name : type;`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarDecl {
    pub name: Identifier,
    pub type_ref: TypeRef,
    pub init: Option<Expr>,
    pub span: Span,
}

/// Assignment to a variable or field chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assign {
    pub target: Expr,
    pub value: Expr,
    pub span: Span,
}

/// If statement; `else if` chains nest as a block holding the inner `if`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfStmt {
    pub cond: Expr,
    pub then_block: Block,
    pub else_block: Option<Block>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhileStmt {
    pub cond: Expr,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReturnStmt {
    pub value: Option<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExprStmt {
    pub expr: Expr,
    pub span: Span,
}

/// Expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Expr {
    Literal(Literal, Span),
    Identifier(Identifier),
    Unary(UnaryExpr),
    Binary(BinaryExpr),
    Call(CallExpr),
    Member(MemberExpr),
    Group(GroupExpr),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnaryExpr {
    pub op: UnaryOp,
    pub expr: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinaryExpr {
    pub op: BinaryOp,
    pub left: Box<Expr>,
    pub right: Box<Expr>,
    pub span: Span,
}

/// Call by name: functions, `int(x)`/`float(x)` conversions and struct constructors
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallExpr {
    pub callee: Identifier,
    pub args: Vec<Expr>,
    pub span: Span,
}

/// Member access or method call
///
/// Syntax: `expr.field` or `expr.method(args)`; a method call is sugar for
/// `method(expr, args)` restricted to functions declared as methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemberExpr {
    pub target: Box<Expr>,
    pub member: Identifier,
    /// Arguments if this is a method call, None for field access
    pub args: Option<Vec<Expr>>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupExpr {
    pub expr: Box<Expr>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i32),
    Float(f32),
    Bool(bool),
    String(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnaryOp {
    Negate,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BinaryOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    // Comparison
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    // Logical
    And,
    Or,
}

impl BinaryOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }
}

impl Expr {
    /// Get the span of this expression
    pub fn span(&self) -> Span {
        match self {
            Expr::Literal(_, span) => *span,
            Expr::Identifier(id) => id.span,
            Expr::Unary(u) => u.span,
            Expr::Binary(b) => b.span,
            Expr::Call(c) => c.span,
            Expr::Member(m) => m.span,
            Expr::Group(g) => g.span,
        }
    }
}

impl Stmt {
    /// Get the span of this statement
    pub fn span(&self) -> Span {
        match self {
            Stmt::VarDecl(v) => v.span,
            Stmt::Assign(a) => a.span,
            Stmt::If(i) => i.span,
            Stmt::While(w) => w.span,
            Stmt::Return(r) => r.span,
            Stmt::Block(b) => b.span,
            Stmt::Expr(e) => e.span,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_json_carries_version() {
        let program = Program { items: Vec::new() };
        let json = program.to_json().unwrap();
        assert!(json.contains("\"ast_version\": 1"));
    }

    #[test]
    fn test_expr_span() {
        let expr = Expr::Binary(BinaryExpr {
            op: BinaryOp::Add,
            left: Box::new(Expr::Literal(Literal::Int(1), Span::new(0, 1))),
            right: Box::new(Expr::Literal(Literal::Int(2), Span::new(4, 5))),
            span: Span::new(0, 5),
        });
        assert_eq!(expr.span(), Span::new(0, 5));
    }
}
