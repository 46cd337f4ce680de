//! Assembly: instruction blocks plus the function table
//!
//! Every declared function, scripted or intrinsic, owns exactly one block.
//! The function table maps bind points to those blocks in declaration order,
//! so a bind point, a `FunId` index and a block index coincide.

mod disasm;
mod instruction;

pub use instruction::{ArithOp, CmpOp, Instruction, Reg};

use crate::builder::{FunId, ModuleArena, StmtFunDec};
use crate::span::Span;
use std::sync::Arc;

/// A flat instruction array with one debug span per instruction
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block {
    pub instructions: Vec<Instruction>,
    pub debug_spans: Vec<Span>,
}

impl Block {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an instruction and return its index
    pub fn emit(&mut self, instruction: Instruction, span: Span) -> usize {
        self.instructions.push(instruction);
        self.debug_spans.push(span);
        self.instructions.len() - 1
    }

    /// Index the next emitted instruction will get (for jump targets)
    pub fn current_offset(&self) -> usize {
        self.instructions.len()
    }

    /// Point the jump at `at` to the current offset
    ///
    /// Used for forward jumps whose target isn't known when they are emitted
    pub fn patch_jump(&mut self, at: usize) {
        let here = self.current_offset() as u32;
        if let Some(instruction) = self.instructions.get_mut(at) {
            match instruction {
                Instruction::Jump { target }
                | Instruction::JumpIfFalse { target, .. }
                | Instruction::JumpIfTrue { target, .. } => *target = here,
                _ => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn span_at(&self, ip: usize) -> Span {
        self.debug_spans.get(ip).copied().unwrap_or_else(Span::dummy)
    }
}

/// Function table entry; its position is the bind point
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunMapEntry {
    pub fun: FunId,
    pub block: u32,
}

/// Executable output of one successful build
///
/// Read-only during execution and cheap to share between VM states.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub(crate) blocks: Vec<Block>,
    pub(crate) fun_map: Vec<FunMapEntry>,
    pub(crate) strings: Vec<String>,
    pub(crate) module: Arc<ModuleArena>,
}

impl Assembly {
    pub(crate) fn new(
        blocks: Vec<Block>,
        fun_map: Vec<FunMapEntry>,
        strings: Vec<String>,
        module: Arc<ModuleArena>,
    ) -> Self {
        Self {
            blocks,
            fun_map,
            strings,
            module,
        }
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn block(&self, index: usize) -> Option<&Block> {
        self.blocks.get(index)
    }

    pub fn fun_map(&self) -> &[FunMapEntry] {
        &self.fun_map
    }

    /// String literal table; `string` values are indices into it
    pub fn strings(&self) -> &[String] {
        &self.strings
    }

    pub fn string(&self, handle: u32) -> Option<&str> {
        self.strings.get(handle as usize).map(String::as_str)
    }

    pub fn module(&self) -> &Arc<ModuleArena> {
        &self.module
    }

    pub fn fun_dec(&self, fun: FunId) -> Option<&StmtFunDec> {
        self.module.fun_dec(fun)
    }

    pub fn fun_name(&self, fun: FunId) -> &str {
        self.module
            .fun_dec(fun)
            .map(|dec| self.module.fun_name(dec))
            .unwrap_or("<unknown>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_patch_jump_targets_current_offset() {
        let mut block = Block::new();
        let jump = block.emit(
            Instruction::JumpIfFalse {
                cond: Reg::R0,
                target: u32::MAX,
            },
            Span::dummy(),
        );
        block.emit(Instruction::Nop, Span::dummy());
        block.emit(Instruction::Nop, Span::dummy());
        block.patch_jump(jump);
        assert_eq!(
            block.instructions[jump],
            Instruction::JumpIfFalse {
                cond: Reg::R0,
                target: 3
            }
        );
    }

    #[test]
    fn test_patch_jump_ignores_non_jumps() {
        let mut block = Block::new();
        block.emit(Instruction::Return, Span::new(4, 10));
        block.patch_jump(0);
        block.patch_jump(7);
        assert_eq!(block.instructions, vec![Instruction::Return]);
        assert_eq!(block.span_at(0), Span::new(4, 10));
        assert_eq!(block.span_at(9), Span::dummy());
    }
}
