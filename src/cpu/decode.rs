//! Instruction decoder for the TD4.
//!
//! Every instruction is one byte: the high nibble selects the operation
//! and the low nibble is an immediate (constant or jump target). Twelve of
//! the sixteen opcodes are defined.

use crate::cpu::execute::CpuError;
use serde::{Serialize, Deserialize};

/// Decoded TD4 instruction.
///
/// The register-move and input instructions still carry the immediate
/// field so that `encode` reproduces the original byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    // ==================== Arithmetic ====================

    /// A := A + imm, carry on overflow
    AddA(u8),

    /// B := B + imm, carry on overflow
    AddB(u8),

    // ==================== Data Transfer ====================

    /// A := imm
    MovA(u8),

    /// B := imm
    MovB(u8),

    /// A := B
    MovAB(u8),

    /// B := A
    MovBA(u8),

    /// A := IN
    InA(u8),

    /// B := IN
    InB(u8),

    // ==================== Output ====================

    /// OUT := B + imm, carry on overflow
    OutB(u8),

    /// OUT := imm
    Out(u8),

    // ==================== Control Flow ====================

    /// Jump if carry is clear: if !C then PC := imm
    Jnc(u8),

    /// Unconditional jump: PC := imm
    Jmp(u8),
}

/// Opcode values (high nibble of the instruction byte).
pub struct Opcode;

impl Opcode {
    pub const ADD_A: u8 = 0b0000;
    pub const MOV_A_B: u8 = 0b0001;
    pub const IN_A: u8 = 0b0010;
    pub const MOV_A: u8 = 0b0011;
    pub const MOV_B_A: u8 = 0b0100;
    pub const ADD_B: u8 = 0b0101;
    pub const IN_B: u8 = 0b0110;
    pub const MOV_B: u8 = 0b0111;
    pub const OUT_B: u8 = 0b1001;
    pub const OUT: u8 = 0b1011;
    pub const JNC: u8 = 0b1110;
    pub const JMP: u8 = 0b1111;
}

/// Split an instruction byte into `(opcode, immediate)`.
#[inline]
pub fn split(byte: u8) -> (u8, u8) {
    (byte >> 4, byte & 0x0F)
}

/// Decode an opcode and immediate into an instruction.
pub fn decode_parts(opcode: u8, imm: u8) -> Result<Instruction, CpuError> {
    let instruction = match opcode {
        Opcode::ADD_A => Instruction::AddA(imm),
        Opcode::MOV_A_B => Instruction::MovAB(imm),
        Opcode::IN_A => Instruction::InA(imm),
        Opcode::MOV_A => Instruction::MovA(imm),
        Opcode::MOV_B_A => Instruction::MovBA(imm),
        Opcode::ADD_B => Instruction::AddB(imm),
        Opcode::IN_B => Instruction::InB(imm),
        Opcode::MOV_B => Instruction::MovB(imm),
        Opcode::OUT_B => Instruction::OutB(imm),
        Opcode::OUT => Instruction::Out(imm),
        Opcode::JNC => Instruction::Jnc(imm),
        Opcode::JMP => Instruction::Jmp(imm),
        _ => return Err(CpuError::InvalidOpcode(opcode)),
    };

    Ok(instruction)
}

/// Decode one instruction byte.
pub fn decode(byte: u8) -> Result<Instruction, CpuError> {
    let (opcode, imm) = split(byte);
    decode_parts(opcode, imm)
}

impl Instruction {
    /// The opcode nibble for this instruction.
    pub fn opcode(&self) -> u8 {
        match self {
            Instruction::AddA(_) => Opcode::ADD_A,
            Instruction::MovAB(_) => Opcode::MOV_A_B,
            Instruction::InA(_) => Opcode::IN_A,
            Instruction::MovA(_) => Opcode::MOV_A,
            Instruction::MovBA(_) => Opcode::MOV_B_A,
            Instruction::AddB(_) => Opcode::ADD_B,
            Instruction::InB(_) => Opcode::IN_B,
            Instruction::MovB(_) => Opcode::MOV_B,
            Instruction::OutB(_) => Opcode::OUT_B,
            Instruction::Out(_) => Opcode::OUT,
            Instruction::Jnc(_) => Opcode::JNC,
            Instruction::Jmp(_) => Opcode::JMP,
        }
    }

    /// The immediate nibble for this instruction.
    pub fn immediate(&self) -> u8 {
        match *self {
            Instruction::AddA(imm)
            | Instruction::MovAB(imm)
            | Instruction::InA(imm)
            | Instruction::MovA(imm)
            | Instruction::MovBA(imm)
            | Instruction::AddB(imm)
            | Instruction::InB(imm)
            | Instruction::MovB(imm)
            | Instruction::OutB(imm)
            | Instruction::Out(imm)
            | Instruction::Jnc(imm)
            | Instruction::Jmp(imm) => imm,
        }
    }
}

/// Encode an instruction back to its byte.
///
/// Immediates wider than 4 bits are truncated to the low nibble.
pub fn encode(instr: &Instruction) -> u8 {
    (instr.opcode() << 4) | (instr.immediate() & 0x0F)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split() {
        assert_eq!(split(0xE3), (0b1110, 3));
        assert_eq!(split(0x00), (0, 0));
    }

    #[test]
    fn test_decode_table() {
        assert_eq!(decode(0x05).unwrap(), Instruction::AddA(5));
        assert_eq!(decode(0x10).unwrap(), Instruction::MovAB(0));
        assert_eq!(decode(0x20).unwrap(), Instruction::InA(0));
        assert_eq!(decode(0x3A).unwrap(), Instruction::MovA(10));
        assert_eq!(decode(0x40).unwrap(), Instruction::MovBA(0));
        assert_eq!(decode(0x51).unwrap(), Instruction::AddB(1));
        assert_eq!(decode(0x60).unwrap(), Instruction::InB(0));
        assert_eq!(decode(0x7F).unwrap(), Instruction::MovB(15));
        assert_eq!(decode(0x92).unwrap(), Instruction::OutB(2));
        assert_eq!(decode(0xB8).unwrap(), Instruction::Out(8));
        assert_eq!(decode(0xE0).unwrap(), Instruction::Jnc(0));
        assert_eq!(decode(0xF4).unwrap(), Instruction::Jmp(4));
    }

    #[test]
    fn test_decode_invalid_opcodes() {
        for opcode in [0b1000u8, 0b1010, 0b1100, 0b1101] {
            let byte = (opcode << 4) | 0x7;
            assert!(matches!(decode(byte), Err(CpuError::InvalidOpcode(op)) if op == opcode));
        }
    }

    #[test]
    fn test_encode_reproduces_byte() {
        for byte in 0..=255u8 {
            if let Ok(instr) = decode(byte) {
                assert_eq!(encode(&instr), byte);
            }
        }
    }
}
