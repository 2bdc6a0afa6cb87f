//! Disassembler for TD4 programs.
//!
//! Converts instruction bytes back to readable assembly.

use crate::cpu::decode::{self, Opcode};
use crate::cpu::Rom;

/// Mnemonic prefix for an opcode. Unused opcodes read as `nop`.
fn mnemonic(opcode: u8) -> &'static str {
    match opcode {
        Opcode::ADD_A => "add a, ",
        Opcode::MOV_A_B => "mov a, b",
        Opcode::IN_A => "in a",
        Opcode::MOV_A => "mov a, ",
        Opcode::MOV_B_A => "mov b, a",
        Opcode::ADD_B => "add b, ",
        Opcode::IN_B => "in b",
        Opcode::MOV_B => "mov b, ",
        Opcode::OUT_B => "out b",
        Opcode::OUT => "out ",
        Opcode::JNC => "jnc ",
        Opcode::JMP => "jmp ",
        _ => "nop",
    }
}

/// Disassemble a single instruction byte to text.
///
/// Defined for every byte. Immediates print in decimal: as an operand
/// (`add a, 3`, `jmp 0`) or as a `+n` suffix on register forms
/// (`mov a, b+3`, `out b+1`) that is left off when zero.
pub fn disassemble(byte: u8) -> String {
    if byte == 0 {
        return "nop".to_string();
    }

    let (opcode, imm) = decode::split(byte);
    let text = mnemonic(opcode);
    let takes_operand = matches!(opcode, Opcode::OUT | Opcode::JNC | Opcode::JMP);

    if text.ends_with(", ") || takes_operand {
        format!("{}{}", text, imm)
    } else if imm == 0 {
        text.to_string()
    } else {
        format!("{}+{}", text, imm)
    }
}

/// Disassemble a whole ROM into a listing that `assemble` accepts.
///
/// Bytes with an unused opcode are emitted as `db` so the listing
/// reassembles to the same image.
pub fn disassemble_rom(rom: &Rom) -> String {
    let mut output = String::new();
    output.push_str("; TD4 Disassembly\n");
    output.push_str("; ---------------\n\n");

    for (addr, byte) in rom.iter() {
        let line = match decode::decode(byte) {
            Ok(_) => disassemble(byte),
            Err(_) => format!("db 0x{:02X}", byte),
        };
        output.push_str(&format!("    {:<12} ; {:02}: {:02X}\n", line, addr, byte));
    }

    output
}
