//! Register/stack virtual machine
//!
//! Interprets one assembly against one state. The VM is running while the
//! state has open frames and idle at depth 0.
//! - Integer arithmetic wraps; division and modulo by zero fault
//! - Floats travel through registers as their bit patterns
//! - Calls push a frame and copy the packed arguments into its body

mod frame;
mod state;

pub use frame::FRAME_HEADER_BYTES;
pub use state::BsVmState;

use crate::assembly::{ArithOp, Assembly, Instruction, Reg};
use crate::builder::FunId;
use crate::funcallback::FunCallbackContext;
use crate::host::VmHost;
use crate::log::LogTag;
use crate::span::Span;
use crate::type_table::CANON_REGISTER_BYTESIZE;
use byteorder::{ByteOrder, LittleEndian};
use thiserror::Error;

/// Fault raised while executing instructions; fatal for the call
#[derive(Debug, Clone, PartialEq, Error)]
pub enum VmError {
    #[error("Division by zero")]
    DivisionByZero { span: Span },

    #[error("RAM limit exceeded: {requested} bytes requested, limit is {limit}")]
    RamLimit { requested: usize, limit: usize },

    #[error("Stack overflow: frame depth limit of {limit} reached")]
    StackOverflow { limit: u32 },

    #[error("Step limit of {limit} instructions exceeded")]
    StepLimit { limit: u64 },

    #[error("Stack underflow")]
    StackUnderflow,

    #[error("Invalid block {block}")]
    InvalidBlock { block: u32 },

    #[error("Instruction pointer {ip} out of range in block {block}")]
    InvalidIp { block: u32, ip: u32 },

    #[error("Invalid memory access at {addr} ({len} bytes) with {ram} bytes of RAM")]
    InvalidMemoryAccess { addr: i64, len: u32, ram: usize },

    #[error("Unknown function #{fun}")]
    UnknownFunction { fun: u32 },

    #[error("Native function '{name}' failed: {message}")]
    Native { name: String, message: String },
}

/// The interpreter
///
/// Stateless apart from the host services handed to native callbacks, so
/// one VM can drive any number of states.
#[derive(Debug, Clone, Default)]
pub struct BsVm {
    host: VmHost,
}

impl BsVm {
    pub fn new(host: VmHost) -> Self {
        Self { host }
    }

    pub fn host(&self) -> &VmHost {
        &self.host
    }

    /// Fetch, advance IP and execute one instruction
    ///
    /// Does nothing when the state is idle.
    pub fn step_execution(&self, assembly: &Assembly, state: &mut BsVmState) -> Result<(), VmError> {
        if state.stack_levels() == 0 {
            return Ok(());
        }
        state.tick()?;

        let block_index = state.reg(Reg::B);
        let block = assembly
            .block(block_index as usize)
            .ok_or(VmError::InvalidBlock { block: block_index })?;
        let ip = state.reg(Reg::Ip);
        let instruction = *block.instructions.get(ip as usize).ok_or(VmError::InvalidIp {
            block: block_index,
            ip,
        })?;
        state.set_reg(Reg::Ip, ip + 1);

        self.execute(assembly, state, instruction, block.span_at(ip as usize))
    }

    fn execute(
        &self,
        assembly: &Assembly,
        state: &mut BsVmState,
        instruction: Instruction,
        span: Span,
    ) -> Result<(), VmError> {
        use Instruction::*;

        match instruction {
            Nop => {}
            LoadImm { dst, value } => state.set_reg(dst, value as u32),
            Move { dst, src } => state.set_reg(dst, state.reg(src)),
            Lea { dst, base, offset } => {
                state.set_reg(dst, (state.reg(base) as i32).wrapping_add(offset) as u32)
            }
            Load { dst, addr, offset } => {
                let value = state.read_u32(state.reg(addr), offset)?;
                state.set_reg(dst, value);
            }
            Store { src, addr, offset } => {
                state.write_u32(state.reg(addr), offset, state.reg(src))?;
            }
            MemCopy { dst, src, size } => state.copy(state.reg(dst), state.reg(src), size)?,
            MemZero { dst, size } => state.zero(state.reg(dst), size)?,
            Push { src } => {
                let value = state.reg(src);
                state.grow(4)?;
                state.write_u32(state.esp(), -4, value)?;
            }
            Pop { dst } => {
                // Never pop into the current frame body
                if state.esp() < state.sbp() + 4 {
                    return Err(VmError::StackUnderflow);
                }
                let value = state.read_u32(state.esp(), -4)?;
                state.shrink(4)?;
                state.set_reg(dst, value);
            }
            IntOp { op, dst, lhs, rhs } => {
                let (a, b) = (state.reg(lhs) as i32, state.reg(rhs) as i32);
                let value = match op {
                    ArithOp::Add => a.wrapping_add(b),
                    ArithOp::Sub => a.wrapping_sub(b),
                    ArithOp::Mul => a.wrapping_mul(b),
                    ArithOp::Div | ArithOp::Mod if b == 0 => {
                        return Err(VmError::DivisionByZero { span })
                    }
                    ArithOp::Div => a.wrapping_div(b),
                    ArithOp::Mod => a.wrapping_rem(b),
                };
                state.set_reg(dst, value as u32);
            }
            FloatOp { op, dst, lhs, rhs } => {
                let (a, b) = (float(state, lhs), float(state, rhs));
                let value = match op {
                    ArithOp::Add => a + b,
                    ArithOp::Sub => a - b,
                    ArithOp::Mul => a * b,
                    ArithOp::Div => a / b,
                    ArithOp::Mod => a % b,
                };
                state.set_reg(dst, value.to_bits());
            }
            IntCmp { op, dst, lhs, rhs } => {
                let holds = op.holds(state.reg(lhs) as i32, state.reg(rhs) as i32);
                state.set_reg(dst, holds as u32);
            }
            FloatCmp { op, dst, lhs, rhs } => {
                let holds = op.holds(float(state, lhs), float(state, rhs));
                state.set_reg(dst, holds as u32);
            }
            IntNeg { dst, src } => state.set_reg(dst, (state.reg(src) as i32).wrapping_neg() as u32),
            FloatNeg { dst, src } => state.set_reg(dst, (-float(state, src)).to_bits()),
            Not { dst, src } => state.set_reg(dst, (state.reg(src) == 0) as u32),
            IntToFloat { dst, src } => state.set_reg(dst, (state.reg(src) as i32 as f32).to_bits()),
            FloatToInt { dst, src } => state.set_reg(dst, float(state, src) as i32 as u32),
            Jump { target } => state.set_reg(Reg::Ip, target),
            JumpIfFalse { cond, target } => {
                if state.reg(cond) == 0 {
                    state.set_reg(Reg::Ip, target);
                }
            }
            JumpIfTrue { cond, target } => {
                if state.reg(cond) != 0 {
                    state.set_reg(Reg::Ip, target);
                }
            }
            Call { fun, args_offset } => self.call(assembly, state, fun, args_offset)?,
            CallNative { fun } => self.call_native(assembly, state, fun)?,
            Return => {
                tracing::trace!(tag = %LogTag::Vm, depth = state.stack_levels(), "return");
                state.pop_frame()?;
            }
        }
        Ok(())
    }

    fn call(
        &self,
        assembly: &Assembly,
        state: &mut BsVmState,
        fun: FunId,
        args_offset: u32,
    ) -> Result<(), VmError> {
        let unknown = VmError::UnknownFunction { fun: fun.0 };
        let dec = assembly.fun_dec(fun).ok_or(unknown.clone())?;
        let entry = assembly.fun_map().get(fun.index()).ok_or(unknown)?;
        tracing::trace!(
            tag = %LogTag::Vm,
            function = assembly.fun_name(fun),
            depth = state.stack_levels(),
            "call"
        );

        let args = state.sbp() + args_offset;
        state.push_frame(dec.frame)?;
        state.copy(state.sbp(), args, dec.desc.input_args_byte_size)?;
        state.set_reg(Reg::B, entry.block);
        state.set_reg(Reg::Ip, 0);
        Ok(())
    }

    /// Run the native callback of `fun` against the current frame
    ///
    /// Arguments sit at SBP. A result wider than a register is written to
    /// the caller's slot at RET; anything else comes back in RET itself.
    fn call_native(&self, assembly: &Assembly, state: &mut BsVmState, fun: FunId) -> Result<(), VmError> {
        let dec = assembly
            .fun_dec(fun)
            .ok_or(VmError::UnknownFunction { fun: fun.0 })?;
        let callback = dec
            .intrinsic
            .clone()
            .ok_or(VmError::UnknownFunction { fun: fun.0 })?;
        let name = assembly.fun_name(fun);

        let in_size = dec.desc.input_args_byte_size;
        let out_size = assembly.module().types().size_of(dec.return_type);
        let sbp = state.sbp();
        let ret = state.reg(Reg::Ret);
        let input_at = state.range(sbp, 0, in_size)?;
        let output_at = if out_size > CANON_REGISTER_BYTESIZE {
            let at = state.range(ret, 0, out_size)?;
            if at + out_size as usize > input_at {
                return Err(VmError::InvalidMemoryAccess {
                    addr: at as i64,
                    len: out_size,
                    ram: state.ram().len(),
                });
            }
            Some(at)
        } else {
            None
        };

        let mut word = [0u8; 4];
        let result = {
            let (lo, hi) = state.ram_mut().split_at_mut(input_at);
            let input = &hi[..in_size as usize];
            let output: &mut [u8] = match output_at {
                Some(at) => &mut lo[at..at + out_size as usize],
                None => &mut word[..out_size as usize],
            };
            let mut ctx = FunCallbackContext::new(input, output, assembly.strings(), &self.host);
            callback(&mut ctx)
        };

        result.map_err(|e| {
            tracing::error!(tag = %LogTag::Error, function = name, error = %e, "native call failed");
            VmError::Native {
                name: name.to_string(),
                message: e.to_string(),
            }
        })?;

        if output_at.is_none() && out_size > 0 {
            state.set_reg(Reg::Ret, LittleEndian::read_u32(&word));
        }
        Ok(())
    }
}

fn float(state: &BsVmState, reg: Reg) -> f32 {
    f32::from_bits(state.reg(reg))
}
