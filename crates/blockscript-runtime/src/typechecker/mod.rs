//! Type checking and frame layout
//!
//! The type checker enforces BlockScript's strict rules and produces the
//! typed form the canonizer lowers:
//! - Every variable, argument and temporary gets a fixed frame offset
//! - No implicit conversions; `int(x)`/`float(x)` are explicit
//! - Conditions require `bool`
//! - Non-void functions return on every path

mod expr;

use crate::ast::*;
use crate::builder::{FunId, ModuleArena};
use crate::diagnostic::{error_codes, Diagnostic};
use crate::ir::{Place, TStmt, TypedFunction};
use crate::span::Span;
use crate::type_table::TypeId;
use std::collections::HashMap;

/// Interned string literals shared by every function of one build
#[derive(Debug, Default)]
pub struct StringLiterals {
    values: Vec<String>,
    index: HashMap<String, u32>,
}

impl StringLiterals {
    pub fn intern(&mut self, value: &str) -> u32 {
        if let Some(&idx) = self.index.get(value) {
            return idx;
        }
        let idx = self.values.len() as u32;
        self.values.push(value.to_string());
        self.index.insert(value.to_string(), idx);
        idx
    }

    pub fn into_vec(self) -> Vec<String> {
        self.values
    }
}

/// Per-function frame allocation and lexical scopes
struct FrameScope {
    scopes: Vec<HashMap<String, Place>>,
    /// Next free byte in the frame body; slots are never reused
    next_offset: u32,
    return_type: TypeId,
}

/// Type checker state
pub struct TypeChecker<'a> {
    pub(super) arena: &'a ModuleArena,
    pub(super) literals: &'a mut StringLiterals,
    pub(super) diagnostics: Vec<Diagnostic>,
    frame: FrameScope,
}

impl<'a> TypeChecker<'a> {
    pub fn new(arena: &'a ModuleArena, literals: &'a mut StringLiterals) -> Self {
        Self {
            arena,
            literals,
            diagnostics: Vec::new(),
            frame: FrameScope {
                scopes: Vec::new(),
                next_offset: 0,
                return_type: TypeId::VOID,
            },
        }
    }

    /// Check one function body against its declaration
    pub fn check_function(
        &mut self,
        fun: FunId,
        decl: &FunctionDecl,
    ) -> Result<TypedFunction, Vec<Diagnostic>> {
        let (args, return_type) = match self.arena.fun_dec(fun) {
            Some(dec) => (dec.args.clone(), dec.return_type),
            None => {
                return Err(vec![Diagnostic::error_with_code(
                    error_codes::NO_MATCHING_FUNCTION,
                    format!("Function '{}' was not declared", decl.name.name),
                    decl.name.span,
                )]);
            }
        };

        self.frame = FrameScope {
            scopes: vec![HashMap::new()],
            next_offset: 0,
            return_type,
        };

        for (arg, param) in args.iter().zip(&decl.params) {
            let place = self.alloc_place(arg.ty);
            self.frame.scopes[0].insert(param.name.name.clone(), place);
        }

        let body = self.check_block(&decl.body);

        if return_type != TypeId::VOID && !Self::always_returns(&decl.body.statements) {
            let message = format!(
                "Function '{}' must return a value of type '{}' on every path",
                decl.name.name,
                self.type_name(return_type)
            );
            self.diagnostics.push(
                Diagnostic::error_with_code(error_codes::MISSING_RETURN, message, decl.name.span)
                    .with_label("not all paths return")
                    .with_help("add a return statement at the end of the function"),
            );
        }

        if !self.diagnostics.is_empty() {
            return Err(std::mem::take(&mut self.diagnostics));
        }

        Ok(TypedFunction {
            fun,
            body,
            frame_byte_size: self.frame.next_offset,
            span: decl.span,
        })
    }

    // === Frame layout ===

    pub(super) fn alloc_slot(&mut self, size: u32) -> u32 {
        let offset = self.frame.next_offset;
        self.frame.next_offset += size;
        offset
    }

    fn alloc_place(&mut self, ty: TypeId) -> Place {
        let desc = self.arena.types().desc(ty);
        let (size, aggregate) = (desc.byte_size, desc.is_struct());
        Place {
            offset: self.alloc_slot(size),
            ty,
            size,
            aggregate,
        }
    }

    pub(super) fn lookup(&self, name: &str) -> Option<Place> {
        self.frame
            .scopes
            .iter()
            .rev()
            .find_map(|scope| scope.get(name).copied())
    }

    pub(super) fn type_name(&self, ty: TypeId) -> &str {
        self.arena.types().name_of(ty)
    }

    pub(super) fn error(&mut self, code: &str, message: impl Into<String>, span: Span) {
        self.diagnostics
            .push(Diagnostic::error_with_code(code, message, span));
    }

    fn resolve_type(&mut self, type_ref: &TypeRef) -> Option<TypeId> {
        let found = self.arena.types().type_by_name(&type_ref.name);
        if found.is_none() {
            self.diagnostics.push(
                Diagnostic::error_with_code(
                    error_codes::UNKNOWN_TYPE,
                    format!("Unknown type '{}'", type_ref.name),
                    type_ref.span,
                )
                .with_label("type not found"),
            );
        }
        found
    }

    // === Statements ===

    fn check_block(&mut self, block: &Block) -> Vec<TStmt> {
        self.frame.scopes.push(HashMap::new());
        let statements = block
            .statements
            .iter()
            .filter_map(|stmt| self.check_statement(stmt))
            .collect();
        self.frame.scopes.pop();
        statements
    }

    fn check_statement(&mut self, stmt: &Stmt) -> Option<TStmt> {
        match stmt {
            Stmt::VarDecl(decl) => self.check_var_decl(decl),
            Stmt::Assign(assign) => self.check_assign(assign),
            Stmt::If(if_stmt) => {
                let cond = self.check_condition(&if_stmt.cond);
                let then_body = self.check_block(&if_stmt.then_block);
                let else_body = if_stmt
                    .else_block
                    .as_ref()
                    .map(|b| self.check_block(b))
                    .unwrap_or_default();
                Some(TStmt::If {
                    cond: cond.ok()?,
                    then_body,
                    else_body,
                    span: if_stmt.span,
                })
            }
            Stmt::While(while_stmt) => {
                let cond = self.check_condition(&while_stmt.cond);
                let body = self.check_block(&while_stmt.body);
                Some(TStmt::While {
                    cond: cond.ok()?,
                    body,
                    span: while_stmt.span,
                })
            }
            Stmt::Return(ret) => self.check_return(ret),
            Stmt::Block(block) => Some(TStmt::Block(self.check_block(block))),
            Stmt::Expr(expr_stmt) => self.check_expr(&expr_stmt.expr).ok().map(TStmt::Eval),
        }
    }

    fn check_var_decl(&mut self, decl: &VarDecl) -> Option<TStmt> {
        let ty = self.resolve_type(&decl.type_ref);
        let init = decl.init.as_ref().map(|e| self.check_value(e));

        if self
            .frame
            .scopes
            .last()
            .is_some_and(|scope| scope.contains_key(&decl.name.name))
        {
            self.diagnostics.push(
                Diagnostic::error_with_code(
                    error_codes::DUPLICATE_VARIABLE,
                    format!("Variable '{}' is already declared in this scope", decl.name.name),
                    decl.name.span,
                )
                .with_help("rename the variable or declare it in a nested block"),
            );
            return None;
        }

        let ty = ty?;
        if ty == TypeId::VOID {
            self.error(
                error_codes::VOID_VALUE,
                format!("Variable '{}' cannot have type 'void'", decl.name.name),
                decl.type_ref.span,
            );
            return None;
        }

        let init = match init {
            Some(Ok(value)) => {
                if value.ty != ty {
                    self.mismatch(ty, value.ty, value.span);
                    return None;
                }
                Some(value)
            }
            Some(Err(())) => return None,
            None => None,
        };

        // Declared after the initializer so `x : int = x;` sees the outer x
        let place = self.alloc_place(ty);
        if let Some(scope) = self.frame.scopes.last_mut() {
            scope.insert(decl.name.name.clone(), place);
        }

        Some(match init {
            Some(value) => TStmt::Assign {
                place,
                value,
                span: decl.span,
            },
            None => TStmt::Zero {
                place,
                span: decl.span,
            },
        })
    }

    fn check_assign(&mut self, assign: &Assign) -> Option<TStmt> {
        let place = self.check_place(&assign.target);
        let value = self.check_value(&assign.value);
        let (place, value) = (place.ok()?, value.ok()?);

        if place.ty != value.ty {
            self.mismatch(place.ty, value.ty, value.span);
            return None;
        }

        Some(TStmt::Assign {
            place,
            value,
            span: assign.span,
        })
    }

    /// Resolve a variable or field chain to its frame location
    fn check_place(&mut self, target: &Expr) -> Result<Place, ()> {
        match target {
            Expr::Identifier(id) => self.lookup(&id.name).ok_or_else(|| {
                self.undefined_variable(id);
            }),
            Expr::Member(member) if member.args.is_none() => {
                let base = self.check_place(&member.target)?;
                let field = self.field_of(base.ty, &member.member)?;
                let desc = self.arena.types().desc(field.ty);
                Ok(Place {
                    offset: base.offset + field.offset,
                    ty: field.ty,
                    size: desc.byte_size,
                    aggregate: desc.is_struct(),
                })
            }
            other => {
                self.error(
                    error_codes::NOT_ASSIGNABLE,
                    "Invalid assignment target: expected a variable or field",
                    other.span(),
                );
                Err(())
            }
        }
    }

    fn check_return(&mut self, ret: &ReturnStmt) -> Option<TStmt> {
        let expected = self.frame.return_type;
        let value = match (&ret.value, expected == TypeId::VOID) {
            (None, true) => None,
            (None, false) => {
                let message = format!(
                    "Missing return value of type '{}'",
                    self.type_name(expected)
                );
                self.error(error_codes::TYPE_MISMATCH, message, ret.span);
                return None;
            }
            (Some(expr), true) => {
                self.error(
                    error_codes::TYPE_MISMATCH,
                    "Cannot return a value from a function returning 'void'",
                    expr.span(),
                );
                return None;
            }
            (Some(expr), false) => {
                let value = self.check_value(expr).ok()?;
                if value.ty != expected {
                    self.mismatch(expected, value.ty, value.span);
                    return None;
                }
                Some(value)
            }
        };

        Some(TStmt::Return {
            value,
            span: ret.span,
        })
    }

    /// Whether every path through `statements` ends in a return
    fn always_returns(statements: &[Stmt]) -> bool {
        statements.iter().any(|stmt| match stmt {
            Stmt::Return(_) => true,
            Stmt::Block(block) => Self::always_returns(&block.statements),
            Stmt::If(if_stmt) => {
                Self::always_returns(&if_stmt.then_block.statements)
                    && if_stmt
                        .else_block
                        .as_ref()
                        .is_some_and(|b| Self::always_returns(&b.statements))
            }
            _ => false,
        })
    }

    pub(super) fn mismatch(&mut self, expected: TypeId, found: TypeId, span: Span) {
        let message = format!(
            "Type mismatch: expected '{}', found '{}'",
            self.type_name(expected),
            self.type_name(found)
        );
        self.diagnostics.push(
            Diagnostic::error_with_code(error_codes::TYPE_MISMATCH, message, span)
                .with_label("type mismatch")
                .with_help("BlockScript has no implicit conversions; use int(x) or float(x)"),
        );
    }

    pub(super) fn undefined_variable(&mut self, id: &Identifier) {
        self.diagnostics.push(
            Diagnostic::error_with_code(
                error_codes::UNDEFINED_VARIABLE,
                format!("Unknown variable '{}'", id.name),
                id.span,
            )
            .with_label("not found in this scope"),
        );
    }
}
