//! VM state: register file and stack RAM

use crate::assembly::Reg;
use crate::vm::VmError;
use blockscript_config::VmConfig;
use byteorder::{ByteOrder, LittleEndian};

/// Registers, RAM and frame depth of one execution session
///
/// RAM is the stack. Its length always equals ESP: growing pushes bytes at
/// the top, shrinking drops them, and nothing below ESP moves.
#[derive(Debug, Clone)]
pub struct BsVmState {
    regs: [u32; Reg::COUNT],
    ram: Vec<u8>,
    stack_levels: u32,
    steps: u64,
    max_ram_bytes: usize,
    max_stack_levels: u32,
    max_steps: u64,
}

impl Default for BsVmState {
    fn default() -> Self {
        Self::new(&VmConfig::default())
    }
}

impl BsVmState {
    pub fn new(config: &VmConfig) -> Self {
        Self {
            regs: [0; Reg::COUNT],
            ram: Vec::with_capacity(config.initial_ram_bytes.min(config.max_ram_bytes)),
            stack_levels: 0,
            steps: 0,
            max_ram_bytes: config.max_ram_bytes,
            max_stack_levels: config.max_stack_levels,
            max_steps: config.max_steps,
        }
    }

    pub fn reg(&self, reg: Reg) -> u32 {
        self.regs[reg.index()]
    }

    pub fn set_reg(&mut self, reg: Reg, value: u32) {
        self.regs[reg.index()] = value;
    }

    pub fn esp(&self) -> u32 {
        self.reg(Reg::Esp)
    }

    pub fn sbp(&self) -> u32 {
        self.reg(Reg::Sbp)
    }

    /// Current frame depth; 0 means idle
    pub fn stack_levels(&self) -> u32 {
        self.stack_levels
    }

    /// Instructions executed by the current (or last) call
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn ram(&self) -> &[u8] {
        &self.ram
    }

    pub fn max_stack_levels(&self) -> u32 {
        self.max_stack_levels
    }

    /// Drop everything and go back to idle
    pub fn reset(&mut self) {
        self.regs = [0; Reg::COUNT];
        self.ram.clear();
        self.stack_levels = 0;
        self.steps = 0;
    }

    pub(crate) fn ram_mut(&mut self) -> &mut [u8] {
        &mut self.ram
    }

    pub(crate) fn set_stack_levels(&mut self, levels: u32) {
        self.stack_levels = levels;
    }

    pub(crate) fn begin_call(&mut self) {
        self.steps = 0;
    }

    /// Count one instruction against the step budget
    pub(crate) fn tick(&mut self) -> Result<(), VmError> {
        self.steps += 1;
        if self.max_steps != 0 && self.steps > self.max_steps {
            return Err(VmError::StepLimit {
                limit: self.max_steps,
            });
        }
        Ok(())
    }

    /// Push `bytes` zeroed bytes on top of the stack
    pub(crate) fn grow(&mut self, bytes: u32) -> Result<(), VmError> {
        let requested = self.ram.len() + bytes as usize;
        if requested > self.max_ram_bytes {
            return Err(VmError::RamLimit {
                requested,
                limit: self.max_ram_bytes,
            });
        }
        self.ram.resize(requested, 0);
        self.set_reg(Reg::Esp, requested as u32);
        Ok(())
    }

    /// Pop `bytes` bytes off the top of the stack
    pub(crate) fn shrink(&mut self, bytes: u32) -> Result<(), VmError> {
        let len = self
            .ram
            .len()
            .checked_sub(bytes as usize)
            .ok_or(VmError::StackUnderflow)?;
        self.truncate(len);
        Ok(())
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.ram.truncate(len);
        self.set_reg(Reg::Esp, self.ram.len() as u32);
    }

    /// Resolve `base + offset` to a RAM range of `len` bytes
    pub(crate) fn range(&self, base: u32, offset: i32, len: u32) -> Result<usize, VmError> {
        let addr = base as i64 + offset as i64;
        if addr < 0 || addr + len as i64 > self.ram.len() as i64 {
            return Err(VmError::InvalidMemoryAccess {
                addr,
                len,
                ram: self.ram.len(),
            });
        }
        Ok(addr as usize)
    }

    pub(crate) fn read_u32(&self, base: u32, offset: i32) -> Result<u32, VmError> {
        let at = self.range(base, offset, 4)?;
        Ok(LittleEndian::read_u32(&self.ram[at..at + 4]))
    }

    pub(crate) fn write_u32(&mut self, base: u32, offset: i32, value: u32) -> Result<(), VmError> {
        let at = self.range(base, offset, 4)?;
        LittleEndian::write_u32(&mut self.ram[at..at + 4], value);
        Ok(())
    }

    pub(crate) fn read_bytes(&self, addr: u32, len: u32) -> Result<&[u8], VmError> {
        let at = self.range(addr, 0, len)?;
        Ok(&self.ram[at..at + len as usize])
    }

    pub(crate) fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<(), VmError> {
        let at = self.range(addr, 0, bytes.len() as u32)?;
        self.ram[at..at + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    /// Overlap-safe copy inside RAM
    pub(crate) fn copy(&mut self, dst: u32, src: u32, len: u32) -> Result<(), VmError> {
        let from = self.range(src, 0, len)?;
        let to = self.range(dst, 0, len)?;
        self.ram.copy_within(from..from + len as usize, to);
        Ok(())
    }

    pub(crate) fn zero(&mut self, dst: u32, len: u32) -> Result<(), VmError> {
        let at = self.range(dst, 0, len)?;
        self.ram[at..at + len as usize].fill(0);
        Ok(())
    }
}
