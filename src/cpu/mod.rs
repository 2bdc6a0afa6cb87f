//! CPU emulation for the TD4.
//!
//! This module implements the complete TD4 architecture:
//! - 16 bytes of program ROM
//! - Registers A and B, input and output ports (all 4 bits)
//! - Carry flag with a one-cycle drop latch
//! - 12-instruction set, one byte per instruction

pub mod rom;
pub mod registers;
pub mod decode;
pub mod execute;
pub mod runner;

pub use rom::{Rom, ROM_SIZE};
pub use registers::Registers;
pub use decode::{Instruction, Opcode};
pub use execute::{Cpu, CpuError, CpuState};
pub use runner::{Emulator, EmulatorError, RunHandle, RunReport, SharedCpu};
