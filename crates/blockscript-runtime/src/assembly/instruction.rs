//! Instruction set
//!
//! Register machine with an upward-growing stack in RAM. All registers hold
//! 32-bit words; floats travel as their bit patterns.

use crate::builder::FunId;
use std::fmt;

/// Register file index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reg {
    R0,
    R1,
    R2,
    R3,
    /// Instruction pointer within the current block
    Ip,
    /// Current block
    B,
    /// Stack base pointer (start of the current frame body)
    Sbp,
    /// Extended stack pointer (top of the stack)
    Esp,
    /// Return value, or the address of a large return slot
    Ret,
}

impl Reg {
    pub const COUNT: usize = 9;

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Reg::R0 => "r0",
            Reg::R1 => "r1",
            Reg::R2 => "r2",
            Reg::R3 => "r3",
            Reg::Ip => "ip",
            Reg::B => "b",
            Reg::Sbp => "sbp",
            Reg::Esp => "esp",
            Reg::Ret => "ret",
        }
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl ArithOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            ArithOp::Add => "add",
            ArithOp::Sub => "sub",
            ArithOp::Mul => "mul",
            ArithOp::Div => "div",
            ArithOp::Mod => "mod",
        }
    }
}

impl CmpOp {
    pub fn mnemonic(self) -> &'static str {
        match self {
            CmpOp::Eq => "eq",
            CmpOp::Ne => "ne",
            CmpOp::Lt => "lt",
            CmpOp::Le => "le",
            CmpOp::Gt => "gt",
            CmpOp::Ge => "ge",
        }
    }

    pub fn holds<T: PartialOrd>(self, lhs: T, rhs: T) -> bool {
        match self {
            CmpOp::Eq => lhs == rhs,
            CmpOp::Ne => lhs != rhs,
            CmpOp::Lt => lhs < rhs,
            CmpOp::Le => lhs <= rhs,
            CmpOp::Gt => lhs > rhs,
            CmpOp::Ge => lhs >= rhs,
        }
    }
}

/// One VM instruction
///
/// Memory operands address RAM as `reg + offset`. Jump targets are
/// instruction indices inside the current block.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    Nop,
    LoadImm { dst: Reg, value: i32 },
    Move { dst: Reg, src: Reg },
    /// `dst = base + offset`
    Lea { dst: Reg, base: Reg, offset: i32 },
    /// `dst = ram[addr + offset]` (one word)
    Load { dst: Reg, addr: Reg, offset: i32 },
    /// `ram[addr + offset] = src` (one word)
    Store { src: Reg, addr: Reg, offset: i32 },
    /// Copy `size` bytes from `ram[src]` to `ram[dst]`
    MemCopy { dst: Reg, src: Reg, size: u32 },
    MemZero { dst: Reg, size: u32 },
    /// Write a word at ESP and advance it
    Push { src: Reg },
    /// Retract ESP and read the word there
    Pop { dst: Reg },
    IntOp { op: ArithOp, dst: Reg, lhs: Reg, rhs: Reg },
    FloatOp { op: ArithOp, dst: Reg, lhs: Reg, rhs: Reg },
    IntCmp { op: CmpOp, dst: Reg, lhs: Reg, rhs: Reg },
    FloatCmp { op: CmpOp, dst: Reg, lhs: Reg, rhs: Reg },
    IntNeg { dst: Reg, src: Reg },
    FloatNeg { dst: Reg, src: Reg },
    /// Logical not: `dst = (src == 0)`
    Not { dst: Reg, src: Reg },
    IntToFloat { dst: Reg, src: Reg },
    FloatToInt { dst: Reg, src: Reg },
    Jump { target: u32 },
    JumpIfFalse { cond: Reg, target: u32 },
    JumpIfTrue { cond: Reg, target: u32 },
    /// Push a frame for `fun` and copy its arguments from `sbp + args_offset`
    Call { fun: FunId, args_offset: u32 },
    /// Invoke the native callback bound to `fun` against the current frame
    CallNative { fun: FunId },
    /// Pop the current frame
    Return,
}
