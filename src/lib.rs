//! # TD4 Emulator
//!
//! An emulator of the TD4, the 4-bit CPU from the book "How to Build a
//! CPU" (CPUの創りかた). It has two registers, one input and one output
//! port, a carry flag and a 16-byte ROM.
//!
//! The core is [`Cpu`]: `step` runs one fetch-decode-execute cycle and
//! reports malformed instructions or the `jmp`-to-self halt as a
//! [`CpuError`]. [`Emulator`] adds a cancellable background `run`.

pub mod cpu;
pub mod asm;
pub mod config;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, CpuState, Emulator, EmulatorError, Instruction, Registers, Rom, RunReport};
pub use asm::{assemble, disassemble, disassemble_rom, load_program, save_bin, AssemblerError, BinError};
pub use config::{ConfigError, RunConfig};
