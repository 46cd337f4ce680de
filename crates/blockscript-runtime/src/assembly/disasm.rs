//! Assembly disassembler
//!
//! Renders blocks back to a readable listing. Used by `blockscript disasm`
//! and by tests that pin down code generation.

use super::{Assembly, Instruction};
use std::fmt;

impl Assembly {
    /// Disassemble every block
    ///
    /// # Format
    /// ```text
    /// === Strings ===
    /// 0: "hello"
    ///
    /// === add(a : int, b : int) : int  [frame 8] ===
    /// 0000  load r0, [sbp+0]
    /// 0001  push r0
    /// ```
    pub fn disassemble(&self) -> String {
        Listing(self).to_string()
    }

    /// Disassemble the block bound to one function table entry
    pub fn disassemble_block(&self, bind_point: usize) -> Option<String> {
        self.fun_map.get(bind_point)?;
        Some(BlockListing(self, bind_point).to_string())
    }

    fn format_instruction(&self, instruction: &Instruction) -> String {
        use Instruction::*;
        match *instruction {
            Nop => "nop".to_string(),
            LoadImm { dst, value } => format!("loadi {}, {}", dst, value),
            Move { dst, src } => format!("move {}, {}", dst, src),
            Lea { dst, base, offset } => format!("lea {}, {}", dst, address(base, offset)),
            Load { dst, addr, offset } => format!("load {}, {}", dst, address(addr, offset)),
            Store { src, addr, offset } => format!("store {}, {}", address(addr, offset), src),
            MemCopy { dst, src, size } => format!("memcpy [{}], [{}], {}", dst, src, size),
            MemZero { dst, size } => format!("memzero [{}], {}", dst, size),
            Push { src } => format!("push {}", src),
            Pop { dst } => format!("pop {}", dst),
            IntOp { op, dst, lhs, rhs } => {
                format!("i{} {}, {}, {}", op.mnemonic(), dst, lhs, rhs)
            }
            FloatOp { op, dst, lhs, rhs } => {
                format!("f{} {}, {}, {}", op.mnemonic(), dst, lhs, rhs)
            }
            IntCmp { op, dst, lhs, rhs } => {
                format!("icmp.{} {}, {}, {}", op.mnemonic(), dst, lhs, rhs)
            }
            FloatCmp { op, dst, lhs, rhs } => {
                format!("fcmp.{} {}, {}, {}", op.mnemonic(), dst, lhs, rhs)
            }
            IntNeg { dst, src } => format!("ineg {}, {}", dst, src),
            FloatNeg { dst, src } => format!("fneg {}, {}", dst, src),
            Not { dst, src } => format!("not {}, {}", dst, src),
            IntToFloat { dst, src } => format!("itof {}, {}", dst, src),
            FloatToInt { dst, src } => format!("ftoi {}, {}", dst, src),
            Jump { target } => format!("jmp {:04}", target),
            JumpIfFalse { cond, target } => format!("jz {}, {:04}", cond, target),
            JumpIfTrue { cond, target } => format!("jnz {}, {:04}", cond, target),
            Call { fun, args_offset } => format!(
                "call {} (#{}), args @sbp+{}",
                self.fun_name(fun),
                fun.index(),
                args_offset
            ),
            CallNative { fun } => format!("native {} (#{})", self.fun_name(fun), fun.index()),
            Return => "ret".to_string(),
        }
    }
}

fn address(base: super::Reg, offset: i32) -> String {
    if offset < 0 {
        format!("[{}-{}]", base, offset.unsigned_abs())
    } else {
        format!("[{}+{}]", base, offset)
    }
}

struct Listing<'a>(&'a Assembly);

impl fmt::Display for Listing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let assembly = self.0;
        if !assembly.strings.is_empty() {
            writeln!(f, "=== Strings ===")?;
            for (idx, value) in assembly.strings.iter().enumerate() {
                writeln!(f, "{}: {:?}", idx, value)?;
            }
            writeln!(f)?;
        }
        for bind_point in 0..assembly.fun_map.len() {
            if bind_point > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", BlockListing(assembly, bind_point))?;
        }
        Ok(())
    }
}

struct BlockListing<'a>(&'a Assembly, usize);

impl fmt::Display for BlockListing<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let BlockListing(assembly, bind_point) = *self;
        let Some(entry) = assembly.fun_map.get(bind_point) else {
            return Ok(());
        };
        match assembly.fun_dec(entry.fun) {
            Some(dec) => writeln!(
                f,
                "=== {}  [frame {}{}] ===",
                assembly.module.signature(dec),
                dec.frame.frame_byte_size,
                if dec.is_intrinsic() { ", native" } else { "" }
            )?,
            None => writeln!(f, "=== <unknown #{}> ===", entry.fun.index())?,
        }
        if let Some(block) = assembly.block(entry.block as usize) {
            for (ip, instruction) in block.instructions.iter().enumerate() {
                writeln!(f, "{:04}  {}", ip, assembly.format_instruction(instruction))?;
            }
        }
        Ok(())
    }
}
