//! CPU execution engine for the TD4.
//!
//! Implements the fetch-decode-execute cycle, carry latch timing and the
//! self-jump halt idiom.

use crate::asm::disasm::disassemble;
use crate::cpu::decode::{self, Instruction, Opcode};
use crate::cpu::registers::{add_nibbles, NIBBLE_MASK};
use crate::cpu::{Registers, Rom};
use serde::{Serialize, Deserialize};
use thiserror::Error;
use tracing::debug;

/// Outcome of the most recent step.
///
/// This is bookkeeping for hosts; `step` never refuses to run because of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Freshly constructed/reset, or the last step succeeded.
    #[default]
    Ready,
    /// The last step hit a jump to its own address.
    Halted,
    /// The last step hit a malformed instruction.
    Errored,
}

/// The TD4 CPU.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Program ROM.
    pub rom: Rom,
    state: CpuState,
    cycles: u64,
}

impl Cpu {
    /// Create a new CPU with an all-`nop` ROM.
    pub fn new() -> Self {
        Self::with_rom(Rom::new())
    }

    /// Create a CPU from a program image (padded/truncated to 16 bytes).
    pub fn from_bytes(image: &[u8]) -> Self {
        Self::with_rom(Rom::from_bytes(image))
    }

    /// Create a CPU around an existing ROM.
    pub fn with_rom(rom: Rom) -> Self {
        Self {
            regs: Registers::new(),
            rom,
            state: CpuState::Ready,
            cycles: 0,
        }
    }

    /// Reset registers, flags and counters. The ROM is left as is.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.state = CpuState::Ready;
        self.cycles = 0;
    }

    /// Execute a single instruction at the current PC.
    pub fn step(&mut self) -> Result<(), CpuError> {
        // Fetch
        let pc = self.regs.pc();
        let byte = self.rom.fetch(pc);

        // Decode
        let (opcode, operand) = decode::split(byte);

        debug!(pc, byte, mnemonic = %disassemble(byte), "step");

        let result = if opcode == Opcode::JMP && operand == pc {
            Err(CpuError::Halted)
        } else {
            self.execute(opcode, operand)
        };

        match &result {
            Ok(()) => {
                self.state = CpuState::Ready;
                self.cycles += 1;
            }
            Err(CpuError::Halted) => self.state = CpuState::Halted,
            Err(_) => self.state = CpuState::Errored,
        }

        result
    }

    /// Execute an already-fetched opcode and operand.
    ///
    /// This skips the halt check that `step` performs, so `jmp` to the
    /// current address simply jumps.
    pub fn execute(&mut self, opcode: u8, operand: u8) -> Result<(), CpuError> {
        if operand > NIBBLE_MASK {
            return Err(CpuError::ImmediateOverflow(operand));
        }

        self.regs.tick_carry();

        match decode::decode_parts(opcode, operand)? {
            Instruction::AddA(imm) => {
                let (sum, carry) = add_nibbles(self.regs.a(), imm);
                self.regs.set_a(sum);
                self.regs.set_alu_carry(carry);
            }
            Instruction::MovAB(_) => {
                let b = self.regs.b();
                self.regs.set_a(b);
            }
            Instruction::InA(_) => {
                let input = self.regs.input();
                self.regs.set_a(input);
            }
            Instruction::MovA(imm) => self.regs.set_a(imm),
            Instruction::MovBA(_) => {
                let a = self.regs.a();
                self.regs.set_b(a);
            }
            Instruction::AddB(imm) => {
                let (sum, carry) = add_nibbles(self.regs.b(), imm);
                self.regs.set_b(sum);
                self.regs.set_alu_carry(carry);
            }
            Instruction::InB(_) => {
                let input = self.regs.input();
                self.regs.set_b(input);
            }
            Instruction::MovB(imm) => self.regs.set_b(imm),
            Instruction::OutB(imm) => {
                let (sum, carry) = add_nibbles(self.regs.b(), imm);
                self.regs.set_output(sum);
                self.regs.set_alu_carry(carry);
            }
            Instruction::Out(imm) => self.regs.set_output(imm),
            Instruction::Jnc(imm) => {
                if !self.regs.carry() {
                    self.regs.jump(imm);
                    return Ok(());
                }
            }
            Instruction::Jmp(imm) => {
                self.regs.jump(imm);
                return Ok(());
            }
        }

        self.regs.advance_pc();
        Ok(())
    }

    /// Step at most `max_steps` times.
    ///
    /// Returns the number of successful steps, or the first error (including
    /// `Halted`).
    pub fn run_limited(&mut self, max_steps: u64) -> Result<u64, CpuError> {
        for executed in 0..max_steps {
            if let Err(e) = self.step() {
                debug!(executed, error = %e, "run stopped");
                return Err(e);
            }
        }
        Ok(max_steps)
    }

    /// Outcome of the most recent step.
    pub fn state(&self) -> CpuState {
        self.state
    }

    /// Successful steps since the last reset.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    /// Check if the last step hit the halt idiom.
    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("state", &self.state)
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("rom", &self.rom)
            .finish()
    }
}

/// Errors that can occur during CPU execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CpuError {
    #[error("invalid opcode: {0:X}")]
    InvalidOpcode(u8),

    #[error("immediate overflow: {0:X}")]
    ImmediateOverflow(u8),

    #[error("ROM overflow")]
    RomOverflow,

    #[error("halt instruction detected")]
    Halted,
}

impl CpuError {
    /// `Halted` is normal termination, not a fault.
    pub fn is_halt(&self) -> bool {
        matches!(self, CpuError::Halted)
    }
}
