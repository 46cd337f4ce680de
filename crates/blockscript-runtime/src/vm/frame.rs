//! Stack frames
//!
//! ```text
//! ... caller ... | [saved SBP][saved B][saved IP][saved RET] | [args][locals][temps] |
//!                ^ header                                     ^ SBP                 ^ ESP
//! ```
//!
//! The callee reads the caller's large-return address from the saved RET
//! slot at `SBP - 4`. Popping restores SBP, B and IP but keeps RET, which by
//! then carries the return value.

use crate::assembly::Reg;
use crate::builder::StackFrameInfo;
use crate::vm::{BsVmState, VmError};

/// Bytes of saved registers in front of every frame body
pub const FRAME_HEADER_BYTES: u32 = 16;

const SAVED: [Reg; 4] = [Reg::Sbp, Reg::B, Reg::Ip, Reg::Ret];

impl BsVmState {
    /// Open a frame on top of the stack
    ///
    /// The body comes out zeroed. Depth is the only thing besides RAM and
    /// the saved registers that changes.
    pub fn push_frame(&mut self, frame: StackFrameInfo) -> Result<(), VmError> {
        if self.stack_levels() >= self.max_stack_levels() {
            return Err(VmError::StackOverflow {
                limit: self.max_stack_levels(),
            });
        }

        let header = self.esp();
        self.grow(FRAME_HEADER_BYTES + frame.frame_byte_size)?;
        for (slot, reg) in SAVED.iter().enumerate() {
            self.write_u32(header, slot as i32 * 4, self.reg(*reg))?;
        }
        self.set_reg(Reg::Sbp, header + FRAME_HEADER_BYTES);
        self.set_stack_levels(self.stack_levels() + 1);
        Ok(())
    }

    /// Close the innermost frame, discarding everything above its header
    pub fn pop_frame(&mut self) -> Result<(), VmError> {
        if self.stack_levels() == 0 {
            return Err(VmError::StackUnderflow);
        }
        let header = self
            .sbp()
            .checked_sub(FRAME_HEADER_BYTES)
            .ok_or(VmError::StackUnderflow)?;

        let sbp = self.read_u32(header, 0)?;
        let block = self.read_u32(header, 4)?;
        let ip = self.read_u32(header, 8)?;

        self.truncate(header as usize);
        self.set_reg(Reg::Sbp, sbp);
        self.set_reg(Reg::B, block);
        self.set_reg(Reg::Ip, ip);
        self.set_stack_levels(self.stack_levels() - 1);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blockscript_config::VmConfig;
    use pretty_assertions::assert_eq;

    fn frame(frame_byte_size: u32) -> StackFrameInfo {
        StackFrameInfo { frame_byte_size }
    }

    #[test]
    fn test_push_pop_symmetry() {
        let mut state = BsVmState::default();
        state.set_reg(Reg::B, 3);
        state.set_reg(Reg::Ip, 9);
        state.set_reg(Reg::Ret, 77);

        state.push_frame(frame(8)).unwrap();
        assert_eq!(state.sbp(), 16);
        assert_eq!(state.esp(), 24);
        assert_eq!(state.stack_levels(), 1);
        assert_eq!(state.read_u32(state.sbp(), -4).unwrap(), 77);

        state.set_reg(Reg::B, 5);
        state.set_reg(Reg::Ip, 0);
        state.push_frame(frame(4)).unwrap();
        assert_eq!(state.sbp(), 40);
        state.pop_frame().unwrap();
        assert_eq!((state.sbp(), state.reg(Reg::B), state.esp()), (16, 5, 24));

        state.pop_frame().unwrap();
        assert_eq!(state.esp(), 0);
        assert_eq!(state.sbp(), 0);
        assert_eq!(state.reg(Reg::B), 3);
        assert_eq!(state.reg(Reg::Ip), 9);
        assert_eq!(state.stack_levels(), 0);
    }

    #[test]
    fn test_depth_limit() {
        let mut state = BsVmState::new(&VmConfig {
            max_stack_levels: 2,
            ..VmConfig::default()
        });
        state.push_frame(frame(0)).unwrap();
        state.push_frame(frame(0)).unwrap();
        assert_eq!(
            state.push_frame(frame(0)),
            Err(VmError::StackOverflow { limit: 2 })
        );
        assert_eq!(state.stack_levels(), 2);
    }

    #[test]
    fn test_pop_idle_state_fails() {
        let mut state = BsVmState::default();
        assert_eq!(state.pop_frame(), Err(VmError::StackUnderflow));
    }
}
