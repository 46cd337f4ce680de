//! Canonizer: typed IR to instruction blocks
//!
//! Expressions evaluate into R0. Struct values evaluate to their RAM address
//! and are copied with `MemCopy` wherever they are stored. Binary operators
//! park the left operand on the stack while the right one is evaluated.

use crate::assembly::{Block, Instruction, Reg};
use crate::builder::{FunId, ModuleArena};
use crate::ir::{TExpr, TExprKind, TStmt, TypedFunction};
use crate::span::Span;
use crate::type_table::TypeId;
use std::collections::HashMap;

/// Lower every declaration of `arena` to one block, indexed by `FunId`
///
/// Intrinsics get a `CallNative; Return` trampoline so they can be entered
/// both from scripts and through the call ABI.
pub fn canonize(arena: &ModuleArena, functions: &[TypedFunction]) -> Vec<Block> {
    let bodies: HashMap<FunId, &TypedFunction> = functions.iter().map(|f| (f.fun, f)).collect();

    (0..arena.fun_decs().len())
        .map(|index| {
            let fun = FunId(index as u32);
            let span = arena.fun_decs()[index].span;
            match bodies.get(&fun) {
                Some(function) => Canonizer::new().lower_function(function),
                None => native_block(fun, span),
            }
        })
        .collect()
}

fn native_block(fun: FunId, span: Span) -> Block {
    let mut block = Block::new();
    block.emit(Instruction::CallNative { fun }, span);
    block.emit(Instruction::Return, span);
    block
}

struct Canonizer {
    block: Block,
}

impl Canonizer {
    fn new() -> Self {
        Self {
            block: Block::new(),
        }
    }

    fn lower_function(mut self, function: &TypedFunction) -> Block {
        for stmt in &function.body {
            self.lower_stmt(stmt);
        }
        // Falling off the end of a void body
        self.emit(Instruction::Return, function.span);
        self.block
    }

    fn emit(&mut self, instruction: Instruction, span: Span) -> usize {
        self.block.emit(instruction, span)
    }

    // === Statements ===

    fn lower_stmt(&mut self, stmt: &TStmt) {
        match stmt {
            TStmt::Eval(expr) => self.lower_expr(expr),
            TStmt::Assign { place, value, span } => {
                self.lower_expr(value);
                self.store_r0(place.offset, value, *span);
            }
            TStmt::Zero { place, span } => {
                self.emit(
                    Instruction::Lea {
                        dst: Reg::R1,
                        base: Reg::Sbp,
                        offset: place.offset as i32,
                    },
                    *span,
                );
                self.emit(
                    Instruction::MemZero {
                        dst: Reg::R1,
                        size: place.size,
                    },
                    *span,
                );
            }
            TStmt::If {
                cond,
                then_body,
                else_body,
                span,
            } => {
                self.lower_expr(cond);
                let else_jump = self.emit(
                    Instruction::JumpIfFalse {
                        cond: Reg::R0,
                        target: 0,
                    },
                    *span,
                );
                self.lower_stmts(then_body);
                if else_body.is_empty() {
                    self.block.patch_jump(else_jump);
                } else {
                    let end_jump = self.emit(Instruction::Jump { target: 0 }, *span);
                    self.block.patch_jump(else_jump);
                    self.lower_stmts(else_body);
                    self.block.patch_jump(end_jump);
                }
            }
            TStmt::While { cond, body, span } => {
                let loop_start = self.block.current_offset() as u32;
                self.lower_expr(cond);
                let exit_jump = self.emit(
                    Instruction::JumpIfFalse {
                        cond: Reg::R0,
                        target: 0,
                    },
                    *span,
                );
                self.lower_stmts(body);
                self.emit(Instruction::Jump { target: loop_start }, *span);
                self.block.patch_jump(exit_jump);
            }
            TStmt::Return { value, span } => {
                if let Some(value) = value {
                    self.lower_return_value(value, *span);
                }
                self.emit(Instruction::Return, *span);
            }
            TStmt::Block(stmts) => self.lower_stmts(stmts),
        }
    }

    fn lower_stmts(&mut self, stmts: &[TStmt]) {
        for stmt in stmts {
            self.lower_stmt(stmt);
        }
    }

    /// Leave the result where the caller expects it
    ///
    /// Scalars and one-word structs go back in RET. Wider structs are copied
    /// to the caller's slot, whose address sits in the saved RET at `SBP - 4`.
    fn lower_return_value(&mut self, value: &TExpr, span: Span) {
        self.lower_expr(value);
        if !value.aggregate {
            self.mov(Reg::Ret, Reg::R0, span);
        } else if value.fits_register() {
            self.load(Reg::R0, Reg::R0, 0, span);
            self.mov(Reg::Ret, Reg::R0, span);
        } else {
            self.load(Reg::R1, Reg::Sbp, -4, span);
            self.emit(
                Instruction::MemCopy {
                    dst: Reg::R1,
                    src: Reg::R0,
                    size: value.size,
                },
                span,
            );
            self.mov(Reg::Ret, Reg::R1, span);
        }
    }

    /// Store R0 (a scalar, or the address of a struct) into the frame slot
    fn store_r0(&mut self, offset: u32, value: &TExpr, span: Span) {
        if value.aggregate {
            self.lea(Reg::R1, Reg::Sbp, offset, span);
            self.emit(
                Instruction::MemCopy {
                    dst: Reg::R1,
                    src: Reg::R0,
                    size: value.size,
                },
                span,
            );
        } else {
            self.emit(
                Instruction::Store {
                    src: Reg::R0,
                    addr: Reg::Sbp,
                    offset: offset as i32,
                },
                span,
            );
        }
    }

    fn mov(&mut self, dst: Reg, src: Reg, span: Span) {
        self.emit(Instruction::Move { dst, src }, span);
    }

    fn load(&mut self, dst: Reg, addr: Reg, offset: i32, span: Span) {
        self.emit(Instruction::Load { dst, addr, offset }, span);
    }

    fn lea(&mut self, dst: Reg, base: Reg, offset: u32, span: Span) {
        self.emit(
            Instruction::Lea {
                dst,
                base,
                offset: offset as i32,
            },
            span,
        );
    }

    fn load_imm(&mut self, value: i32, span: Span) {
        self.emit(Instruction::LoadImm { dst: Reg::R0, value }, span);
    }

    // === Expressions ===

    fn lower_expr(&mut self, expr: &TExpr) {
        let span = expr.span;
        match &expr.kind {
            TExprKind::Int(value) => self.load_imm(*value, span),
            TExprKind::Float(value) => self.load_imm(value.to_bits() as i32, span),
            TExprKind::Bool(value) => self.load_imm(*value as i32, span),
            TExprKind::Str(index) => self.load_imm(*index as i32, span),
            TExprKind::Local { offset } => {
                if expr.aggregate {
                    self.lea(Reg::R0, Reg::Sbp, *offset, span);
                } else {
                    self.load(Reg::R0, Reg::Sbp, *offset as i32, span);
                }
            }
            TExprKind::Field { base, offset } => {
                self.lower_expr(base);
                if expr.aggregate {
                    self.lea(Reg::R0, Reg::R0, *offset, span);
                } else {
                    self.load(Reg::R0, Reg::R0, *offset as i32, span);
                }
            }
            TExprKind::Arith {
                op,
                float,
                lhs,
                rhs,
            } => {
                self.lower_operands(lhs, rhs, span);
                let (dst, lhs, rhs, op) = (Reg::R0, Reg::R0, Reg::R1, *op);
                let instruction = if *float {
                    Instruction::FloatOp { op, dst, lhs, rhs }
                } else {
                    Instruction::IntOp { op, dst, lhs, rhs }
                };
                self.emit(instruction, span);
            }
            TExprKind::Compare {
                op,
                float,
                lhs,
                rhs,
            } => {
                self.lower_operands(lhs, rhs, span);
                let (dst, lhs, rhs, op) = (Reg::R0, Reg::R0, Reg::R1, *op);
                let instruction = if *float {
                    Instruction::FloatCmp { op, dst, lhs, rhs }
                } else {
                    Instruction::IntCmp { op, dst, lhs, rhs }
                };
                self.emit(instruction, span);
            }
            TExprKind::Logical { and, lhs, rhs } => {
                // R0 already holds the short-circuit result when the jump is taken
                self.lower_expr(lhs);
                let jump = if *and {
                    Instruction::JumpIfFalse {
                        cond: Reg::R0,
                        target: 0,
                    }
                } else {
                    Instruction::JumpIfTrue {
                        cond: Reg::R0,
                        target: 0,
                    }
                };
                let short_circuit = self.emit(jump, span);
                self.lower_expr(rhs);
                self.block.patch_jump(short_circuit);
            }
            TExprKind::Neg { float, operand } => {
                self.lower_expr(operand);
                let (dst, src) = (Reg::R0, Reg::R0);
                let instruction = if *float {
                    Instruction::FloatNeg { dst, src }
                } else {
                    Instruction::IntNeg { dst, src }
                };
                self.emit(instruction, span);
            }
            TExprKind::Not(operand) => {
                self.lower_expr(operand);
                self.emit(
                    Instruction::Not {
                        dst: Reg::R0,
                        src: Reg::R0,
                    },
                    span,
                );
            }
            TExprKind::IntToFloat(operand) => {
                self.lower_expr(operand);
                self.emit(
                    Instruction::IntToFloat {
                        dst: Reg::R0,
                        src: Reg::R0,
                    },
                    span,
                );
            }
            TExprKind::FloatToInt(operand) => {
                self.lower_expr(operand);
                self.emit(
                    Instruction::FloatToInt {
                        dst: Reg::R0,
                        src: Reg::R0,
                    },
                    span,
                );
            }
            TExprKind::Retype(operand) => self.lower_expr(operand),
            TExprKind::Construct { temp, fields } => {
                for (offset, value) in fields {
                    self.lower_expr(value);
                    self.store_r0(temp + offset, value, value.span);
                }
                self.lea(Reg::R0, Reg::Sbp, *temp, span);
            }
            TExprKind::Call {
                fun,
                args,
                args_offset,
                ret_temp,
            } => self.lower_call(expr, *fun, args, *args_offset, *ret_temp),
        }
    }

    /// Left operand in R0, right operand in R1
    fn lower_operands(&mut self, lhs: &TExpr, rhs: &TExpr, span: Span) {
        self.lower_expr(lhs);
        self.emit(Instruction::Push { src: Reg::R0 }, span);
        self.lower_expr(rhs);
        self.mov(Reg::R1, Reg::R0, span);
        self.emit(Instruction::Pop { dst: Reg::R0 }, span);
    }

    fn lower_call(
        &mut self,
        call: &TExpr,
        fun: FunId,
        args: &[TExpr],
        args_offset: u32,
        ret_temp: Option<u32>,
    ) {
        let span = call.span;
        let mut offset = args_offset;
        for arg in args {
            self.lower_expr(arg);
            self.store_r0(offset, arg, arg.span);
            offset += arg.size;
        }

        // Set after the arguments: nested calls clobber RET
        if let Some(temp) = ret_temp.filter(|_| !call.fits_register()) {
            self.lea(Reg::Ret, Reg::Sbp, temp, span);
        }
        self.emit(Instruction::Call { fun, args_offset }, span);

        match ret_temp {
            _ if call.ty == TypeId::VOID => {}
            Some(temp) if call.fits_register() => {
                self.emit(
                    Instruction::Store {
                        src: Reg::Ret,
                        addr: Reg::Sbp,
                        offset: temp as i32,
                    },
                    span,
                );
                self.lea(Reg::R0, Reg::Sbp, temp, span);
            }
            _ => self.mov(Reg::R0, Reg::Ret, span),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::assembly::{ArithOp, Instruction::*, Reg::*};
    use crate::builder::BlockScriptBuilder;
    use blockscript_config::CompilerConfig;
    use pretty_assertions::assert_eq;

    fn lower(source: &str) -> Vec<crate::assembly::Instruction> {
        let mut builder = BlockScriptBuilder::new(&CompilerConfig::default());
        let assembly = builder.build(source).unwrap();
        assembly.blocks()[0].instructions.clone()
    }

    #[test]
    fn test_binary_op_parks_lhs_on_stack() {
        assert_eq!(
            lower("add(a : int, b : int) : int { return a + b; }"),
            vec![
                Load { dst: R0, addr: Sbp, offset: 0 },
                Push { src: R0 },
                Load { dst: R0, addr: Sbp, offset: 4 },
                Move { dst: R1, src: R0 },
                Pop { dst: R0 },
                IntOp { op: ArithOp::Add, dst: R0, lhs: R0, rhs: R1 },
                Move { dst: Ret, src: R0 },
                Return,
                Return,
            ]
        );
    }

    #[test]
    fn test_while_jumps_back_to_condition() {
        let code = lower("f(n : int) : void { while (n > 0) { n = n - 1; } }");
        let exit = code
            .iter()
            .find_map(|i| match i {
                JumpIfFalse { target, .. } => Some(*target as usize),
                _ => None,
            })
            .unwrap();
        assert_eq!(code[exit - 1], Jump { target: 0 });
        assert_eq!(code[exit], Return);
    }

    #[test]
    fn test_wide_struct_return_copies_to_caller_slot() {
        let code = lower("make(x : float) : float3 { return float3(x, x, x); }");
        let tail = &code[code.len() - 5..];
        assert_eq!(
            tail,
            &[
                Load { dst: R1, addr: Sbp, offset: -4 },
                MemCopy { dst: R1, src: R0, size: 12 },
                Move { dst: Ret, src: R1 },
                Return,
                Return,
            ]
        );
    }
}
