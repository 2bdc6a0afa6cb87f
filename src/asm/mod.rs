//! Assembler and disassembler for TD4 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → ROM image)
//! - A disassembler (ROM image → readable text)
//! - Raw image load/save

pub mod assembler;
pub mod binfile;
pub mod disasm;

pub use assembler::{assemble, assemble_rom, AssemblerError};
pub use binfile::{load_bin, load_bin_strict, load_program, save_bin, BinError};
pub use disasm::{disassemble, disassemble_rom};
