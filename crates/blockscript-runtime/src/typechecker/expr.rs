//! Expression type checking

use crate::assembly::{ArithOp, CmpOp};
use crate::ast::*;
use crate::builder::FunId;
use crate::diagnostic::{error_codes, Diagnostic};
use crate::ir::{TExpr, TExprKind};
use crate::span::Span;
use crate::type_table::{FieldDesc, TypeId, TypeKind};
use crate::typechecker::TypeChecker;

impl<'a> TypeChecker<'a> {
    fn typed(&self, kind: TExprKind, ty: TypeId, span: Span) -> TExpr {
        let desc = self.arena.types().desc(ty);
        TExpr {
            kind,
            ty,
            size: desc.byte_size,
            aggregate: desc.is_struct(),
            span,
        }
    }

    /// Check an expression whose value is used; `void` is rejected
    pub(super) fn check_value(&mut self, expr: &Expr) -> Result<TExpr, ()> {
        let value = self.check_expr(expr)?;
        if value.ty == TypeId::VOID {
            self.error(
                error_codes::VOID_VALUE,
                "Expression of type 'void' has no value",
                value.span,
            );
            return Err(());
        }
        Ok(value)
    }

    pub(super) fn check_condition(&mut self, expr: &Expr) -> Result<TExpr, ()> {
        let cond = self.check_value(expr)?;
        if cond.ty != TypeId::BOOL {
            self.mismatch(TypeId::BOOL, cond.ty, cond.span);
            return Err(());
        }
        Ok(cond)
    }

    pub(super) fn check_expr(&mut self, expr: &Expr) -> Result<TExpr, ()> {
        match expr {
            Expr::Literal(lit, span) => Ok(match lit {
                Literal::Int(v) => self.typed(TExprKind::Int(*v), TypeId::INT, *span),
                Literal::Float(v) => self.typed(TExprKind::Float(*v), TypeId::FLOAT, *span),
                Literal::Bool(v) => self.typed(TExprKind::Bool(*v), TypeId::BOOL, *span),
                Literal::String(s) => {
                    let idx = self.literals.intern(s);
                    self.typed(TExprKind::Str(idx), TypeId::STRING, *span)
                }
            }),
            Expr::Identifier(id) => match self.lookup(&id.name) {
                Some(place) => Ok(self.typed(
                    TExprKind::Local {
                        offset: place.offset,
                    },
                    place.ty,
                    id.span,
                )),
                None => {
                    self.undefined_variable(id);
                    Err(())
                }
            },
            Expr::Group(group) => self.check_expr(&group.expr),
            Expr::Unary(unary) => self.check_unary(unary),
            Expr::Binary(binary) => self.check_binary(binary),
            Expr::Call(call) => self.check_call(call),
            Expr::Member(member) => match &member.args {
                None => self.check_field(member),
                Some(args) => self.check_method_call(member, args),
            },
        }
    }

    fn check_unary(&mut self, unary: &UnaryExpr) -> Result<TExpr, ()> {
        let operand = self.check_value(&unary.expr)?;
        let ty = operand.ty;
        let kind = match (unary.op, ty) {
            (UnaryOp::Negate, TypeId::INT) => TExprKind::Neg {
                float: false,
                operand: Box::new(operand),
            },
            (UnaryOp::Negate, TypeId::FLOAT) => TExprKind::Neg {
                float: true,
                operand: Box::new(operand),
            },
            (UnaryOp::Not, TypeId::BOOL) => TExprKind::Not(Box::new(operand)),
            (op, _) => {
                let (symbol, wanted) = match op {
                    UnaryOp::Negate => ("-", "'int' or 'float'"),
                    UnaryOp::Not => ("!", "'bool'"),
                };
                let message = format!(
                    "Operator '{}' expects {}, found '{}'",
                    symbol,
                    wanted,
                    self.type_name(ty)
                );
                self.error(error_codes::INVALID_OPERAND, message, unary.span);
                return Err(());
            }
        };
        Ok(self.typed(kind, ty, unary.span))
    }

    fn check_binary(&mut self, binary: &BinaryExpr) -> Result<TExpr, ()> {
        let lhs = self.check_value(&binary.left);
        let rhs = self.check_value(&binary.right);
        let (lhs, rhs) = (lhs?, rhs?);
        let (lhs_ty, rhs_ty) = (lhs.ty, rhs.ty);

        let operand_error = |this: &mut Self, expected: &str| {
            this.operand_error(binary, lhs_ty, rhs_ty, expected)
        };

        let same = lhs.ty == rhs.ty;
        let numeric = same && (lhs.ty == TypeId::INT || lhs.ty == TypeId::FLOAT);
        let float = lhs.ty == TypeId::FLOAT;

        let (kind, ty) = match binary.op {
            BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => {
                let op = match binary.op {
                    BinaryOp::Add => ArithOp::Add,
                    BinaryOp::Sub => ArithOp::Sub,
                    BinaryOp::Mul => ArithOp::Mul,
                    BinaryOp::Div => ArithOp::Div,
                    _ => ArithOp::Mod,
                };
                if op == ArithOp::Mod && !(same && lhs.ty == TypeId::INT) {
                    operand_error(self, "'int' operands");
                    return Err(());
                }
                if !numeric {
                    operand_error(self, "two 'int' or two 'float' operands");
                    return Err(());
                }
                let ty = lhs.ty;
                (
                    TExprKind::Arith {
                        op,
                        float,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    ty,
                )
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                if !numeric {
                    operand_error(self, "two 'int' or two 'float' operands");
                    return Err(());
                }
                let op = match binary.op {
                    BinaryOp::Lt => CmpOp::Lt,
                    BinaryOp::Le => CmpOp::Le,
                    BinaryOp::Gt => CmpOp::Gt,
                    _ => CmpOp::Ge,
                };
                (
                    TExprKind::Compare {
                        op,
                        float,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    TypeId::BOOL,
                )
            }
            BinaryOp::Eq | BinaryOp::Ne => {
                if !same || lhs.aggregate {
                    operand_error(self, "two scalar operands of the same type");
                    return Err(());
                }
                let op = if binary.op == BinaryOp::Eq {
                    CmpOp::Eq
                } else {
                    CmpOp::Ne
                };
                (
                    TExprKind::Compare {
                        op,
                        float,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    TypeId::BOOL,
                )
            }
            BinaryOp::And | BinaryOp::Or => {
                if !(same && lhs.ty == TypeId::BOOL) {
                    operand_error(self, "'bool' operands");
                    return Err(());
                }
                (
                    TExprKind::Logical {
                        and: binary.op == BinaryOp::And,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    TypeId::BOOL,
                )
            }
        };

        Ok(self.typed(kind, ty, binary.span))
    }

    fn operand_error(&mut self, binary: &BinaryExpr, lhs: TypeId, rhs: TypeId, expected: &str) {
        let message = format!(
            "Operator '{}' expects {}, found '{}' and '{}'",
            binary.op.as_str(),
            expected,
            self.type_name(lhs),
            self.type_name(rhs)
        );
        self.diagnostics.push(
            Diagnostic::error_with_code(error_codes::INVALID_OPERAND, message, binary.span)
                .with_label("invalid operands")
                .with_help("both operands must have the same type; use int(x) or float(x)"),
        );
    }

    pub(super) fn field_of(&mut self, ty: TypeId, member: &Identifier) -> Result<FieldDesc, ()> {
        let desc = self.arena.types().desc(ty);
        match desc.field(&member.name) {
            Some(field) => Ok(field.clone()),
            None => {
                let message = if desc.is_struct() {
                    format!("Type '{}' has no field '{}'", desc.name, member.name)
                } else {
                    format!(
                        "Cannot access field '{}' on non-struct type '{}'",
                        member.name, desc.name
                    )
                };
                let fields = desc
                    .fields()
                    .iter()
                    .map(|f| f.name.as_str())
                    .collect::<Vec<_>>()
                    .join(", ");
                let mut diag =
                    Diagnostic::error_with_code(error_codes::UNKNOWN_FIELD, message, member.span);
                if !fields.is_empty() {
                    diag = diag.with_note(format!("available fields: {}", fields));
                }
                self.diagnostics.push(diag);
                Err(())
            }
        }
    }

    fn check_field(&mut self, member: &MemberExpr) -> Result<TExpr, ()> {
        let base = self.check_value(&member.target)?;
        let field = self.field_of(base.ty, &member.member)?;

        // Fields of locals are plain frame slots
        let kind = match base.kind {
            TExprKind::Local { offset } => TExprKind::Local {
                offset: offset + field.offset,
            },
            _ => TExprKind::Field {
                base: Box::new(base),
                offset: field.offset,
            },
        };
        Ok(self.typed(kind, field.ty, member.span))
    }

    fn check_args(&mut self, args: &[Expr]) -> Result<Vec<TExpr>, ()> {
        let checked: Vec<_> = args.iter().map(|a| self.check_value(a)).collect();
        checked.into_iter().collect()
    }

    fn check_call(&mut self, call: &CallExpr) -> Result<TExpr, ()> {
        let name = call.callee.name.as_str();

        if let Some(ty) = self.arena.types().type_by_name(name) {
            return self.check_type_call(ty, call);
        }

        let args = self.check_args(&call.args)?;
        let arg_types: Vec<TypeId> = args.iter().map(|a| a.ty).collect();

        match self.arena.find_signature(name, &arg_types) {
            Some(fun) => Ok(self.make_call(fun, args, call.span)),
            None => {
                self.no_matching_function(name, &arg_types, false, call.span);
                Err(())
            }
        }
    }

    /// `obj.method(args)` resolves to a method whose first argument is `obj`
    fn check_method_call(&mut self, member: &MemberExpr, args: &[Expr]) -> Result<TExpr, ()> {
        let receiver = self.check_value(&member.target);
        let rest = self.check_args(args);
        let mut all = vec![receiver?];
        all.extend(rest?);
        let arg_types: Vec<TypeId> = all.iter().map(|a| a.ty).collect();

        let name = member.member.name.as_str();
        let found = self.arena.fun_decs().iter().position(|dec| {
            dec.desc.is_method
                && self.arena.fun_name(dec) == name
                && dec.args.len() == arg_types.len()
                && dec.args.iter().zip(&arg_types).all(|(a, t)| a.ty == *t)
        });

        match found {
            Some(idx) => Ok(self.make_call(FunId(idx as u32), all, member.span)),
            None => {
                self.no_matching_function(name, &arg_types, true, member.member.span);
                Err(())
            }
        }
    }

    fn make_call(&mut self, fun: FunId, args: Vec<TExpr>, span: Span) -> TExpr {
        let (input_size, return_type) = match self.arena.fun_dec(fun) {
            Some(dec) => (dec.desc.input_args_byte_size, dec.return_type),
            None => (0, TypeId::VOID),
        };
        let args_offset = self.alloc_slot(input_size);
        let ret_temp = {
            let desc = self.arena.types().desc(return_type);
            desc.is_struct().then_some(desc.byte_size)
        }
        .map(|size| self.alloc_slot(size));

        self.typed(
            TExprKind::Call {
                fun,
                args,
                args_offset,
                ret_temp,
            },
            return_type,
            span,
        )
    }

    fn no_matching_function(&mut self, name: &str, arg_types: &[TypeId], method: bool, span: Span) {
        let shown = arg_types
            .iter()
            .map(|t| self.type_name(*t))
            .collect::<Vec<_>>()
            .join(", ");
        let kind = if method { "method" } else { "function" };
        let mut diag = Diagnostic::error_with_code(
            error_codes::NO_MATCHING_FUNCTION,
            format!("No {} '{}' matches argument types ({})", kind, name, shown),
            span,
        )
        .with_label("no matching signature");

        let candidates: Vec<String> = self
            .arena
            .fun_decs()
            .iter()
            .filter(|dec| self.arena.fun_name(dec) == name && (!method || dec.desc.is_method))
            .map(|dec| self.arena.signature(dec))
            .collect();
        for candidate in candidates {
            diag = diag.with_note(format!("candidate: {}", candidate));
        }
        self.diagnostics.push(diag);
    }

    /// `int(x)`, `float(x)` and struct constructors
    fn check_type_call(&mut self, ty: TypeId, call: &CallExpr) -> Result<TExpr, ()> {
        let args = self.check_args(&call.args)?;
        let desc = self.arena.types().desc(ty);
        let type_name = desc.name.clone();

        match &desc.kind {
            TypeKind::Int | TypeKind::Float => {
                if args.len() != 1 {
                    self.error(
                        error_codes::CONSTRUCTOR_ARITY,
                        format!("Conversion '{}(x)' takes exactly one argument", type_name),
                        call.span,
                    );
                    return Err(());
                }
                let arg = args.into_iter().next().ok_or(())?;
                let kind = match (ty, arg.ty) {
                    (TypeId::INT, TypeId::FLOAT) => TExprKind::FloatToInt(Box::new(arg)),
                    (TypeId::FLOAT, TypeId::INT) => TExprKind::IntToFloat(Box::new(arg)),
                    (TypeId::INT, TypeId::INT | TypeId::BOOL) | (TypeId::FLOAT, TypeId::FLOAT) => {
                        TExprKind::Retype(Box::new(arg))
                    }
                    (_, from) => {
                        let message = format!(
                            "Cannot convert '{}' to '{}'",
                            self.type_name(from),
                            type_name
                        );
                        self.error(error_codes::TYPE_MISMATCH, message, call.span);
                        return Err(());
                    }
                };
                Ok(self.typed(kind, ty, call.span))
            }
            TypeKind::Struct { fields } => {
                let fields = fields.clone();
                if args.len() != fields.len() {
                    self.error(
                        error_codes::CONSTRUCTOR_ARITY,
                        format!(
                            "Constructor '{}' expects {} arguments, found {}",
                            type_name,
                            fields.len(),
                            args.len()
                        ),
                        call.span,
                    );
                    return Err(());
                }

                let mut ok = true;
                for (arg, field) in args.iter().zip(&fields) {
                    if arg.ty != field.ty {
                        self.mismatch(field.ty, arg.ty, arg.span);
                        ok = false;
                    }
                }
                if !ok {
                    return Err(());
                }

                let temp = self.alloc_slot(self.arena.types().size_of(ty));
                let fields = fields
                    .iter()
                    .map(|f| f.offset)
                    .zip(args)
                    .collect();
                Ok(self.typed(TExprKind::Construct { temp, fields }, ty, call.span))
            }
            _ => {
                self.error(
                    error_codes::NO_MATCHING_FUNCTION,
                    format!("Type '{}' cannot be called", type_name),
                    call.callee.span,
                );
                Err(())
            }
        }
    }
}
