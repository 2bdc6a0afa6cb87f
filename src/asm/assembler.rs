//! Simple assembler for TD4 programs.
//!
//! Accepts the same syntax the disassembler prints:
//! ```text
//! ; Count B up and show it on the LEDs
//!         mov b, 0
//! loop:   add b, 1        ; carry on overflow
//!         out b
//!         jnc loop
//! end:    jmp end         ; halt
//!         db 0x80         ; raw byte
//! ```
//!
//! Numbers may be decimal, `0x` hex or `0b` binary.

use crate::cpu::decode::{encode, Instruction};
use crate::cpu::{Rom, ROM_SIZE};
use std::collections::HashMap;
use thiserror::Error;

/// Assemble source code to a program image (at most 16 bytes).
pub fn assemble(source: &str) -> Result<Vec<u8>, AssemblerError> {
    let mut asm = Assembler::new();
    asm.assemble(source)
}

/// Assemble source code straight into a ROM.
pub fn assemble_rom(source: &str) -> Result<Rom, AssemblerError> {
    assemble(source).map(|image| Rom::from_bytes(&image))
}

/// A parsed operand.
enum Value<'a> {
    Number(u32),
    Label(&'a str),
}

/// The assembler state.
struct Assembler {
    /// Symbol table (label -> address).
    symbols: HashMap<String, u8>,
    /// Jump targets to patch in pass 2: (output index, label, source line).
    pending: Vec<(usize, String, usize)>,
    /// Output bytes.
    output: Vec<u8>,
}

impl Assembler {
    fn new() -> Self {
        Self {
            symbols: HashMap::new(),
            pending: Vec::new(),
            output: Vec::new(),
        }
    }

    fn assemble(&mut self, source: &str) -> Result<Vec<u8>, AssemblerError> {
        // Pass 1: Collect labels and generate code
        for (line_num, line) in source.lines().enumerate() {
            self.process_line(line, line_num + 1)?;
        }

        // Pass 2: Resolve forward references
        self.resolve_references()?;

        Ok(std::mem::take(&mut self.output))
    }

    fn process_line(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        // Remove comments
        let line = match line.find(';') {
            Some(idx) => &line[..idx],
            None => line,
        };
        let mut line = line.trim();

        if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim().to_lowercase();
            if !is_identifier(&label) {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("invalid label '{}'", label),
                });
            }
            let addr = self.output.len() as u8;
            if self.symbols.insert(label.clone(), addr).is_some() {
                return Err(AssemblerError::SyntaxError {
                    line: line_num,
                    message: format!("label '{}' defined twice", label),
                });
            }
            line = line[colon_idx + 1..].trim();
        }

        if line.is_empty() {
            return Ok(());
        }

        self.process_instruction(line, line_num)
    }

    fn process_instruction(&mut self, line: &str, line_num: usize) -> Result<(), AssemblerError> {
        let (mnemonic, rest) = match line.find(char::is_whitespace) {
            Some(idx) => (&line[..idx], line[idx..].trim()),
            None => (line, ""),
        };
        let mnemonic = mnemonic.to_lowercase();
        let rest = rest.to_lowercase();
        let operands: Vec<&str> = if rest.is_empty() {
            Vec::new()
        } else {
            rest.split(',').map(str::trim).collect()
        };

        // Directives
        if mnemonic == "db" {
            let [value] = operands.as_slice() else {
                return Err(syntax(line_num, "db takes one value"));
            };
            let value = self.number(value, 0xFF, line_num)?;
            return self.emit(value, line_num);
        }

        let instr = match (mnemonic.as_str(), operands.as_slice()) {
            ("nop", []) => return self.emit(0, line_num),

            ("add", ["a", imm]) => Instruction::AddA(self.number(imm, 0x0F, line_num)?),
            ("add", ["b", imm]) => Instruction::AddB(self.number(imm, 0x0F, line_num)?),

            ("mov", ["a", src]) => match register_operand(src, "b") {
                Some(offset) => Instruction::MovAB(self.offset(offset, line_num)?),
                None => Instruction::MovA(self.number(src, 0x0F, line_num)?),
            },
            ("mov", ["b", src]) => match register_operand(src, "a") {
                Some(offset) => Instruction::MovBA(self.offset(offset, line_num)?),
                None => Instruction::MovB(self.number(src, 0x0F, line_num)?),
            },

            ("in", [dst]) => {
                if let Some(offset) = register_operand(dst, "a") {
                    Instruction::InA(self.offset(offset, line_num)?)
                } else if let Some(offset) = register_operand(dst, "b") {
                    Instruction::InB(self.offset(offset, line_num)?)
                } else {
                    return Err(syntax(line_num, "in expects register a or b"));
                }
            }

            ("out", [src]) => match register_operand(src, "b") {
                Some(offset) => Instruction::OutB(self.offset(offset, line_num)?),
                None => Instruction::Out(self.number(src, 0x0F, line_num)?),
            },

            ("jnc", [target]) => Instruction::Jnc(self.target(target, line_num)?),
            ("jmp", [target]) => Instruction::Jmp(self.target(target, line_num)?),

            ("nop" | "add" | "mov" | "in" | "out" | "jnc" | "jmp", _) => {
                return Err(syntax(line_num, &format!("bad operands for '{}'", mnemonic)));
            }

            _ => return Err(AssemblerError::UnknownMnemonic {
                line: line_num,
                mnemonic: mnemonic.clone(),
            }),
        };

        self.emit(encode(&instr), line_num)
    }

    /// Parse a numeric operand no larger than `max`.
    fn number(&self, text: &str, max: u32, line_num: usize) -> Result<u8, AssemblerError> {
        match parse_value(text, line_num)? {
            Value::Number(value) if value <= max => Ok(value as u8),
            Value::Number(value) => Err(AssemblerError::ValueOutOfRange { line: line_num, value }),
            Value::Label(_) => Err(syntax(line_num, &format!("expected a number, found '{}'", text))),
        }
    }

    /// Parse the optional `+n` after a register name.
    fn offset(&self, offset: Option<&str>, line_num: usize) -> Result<u8, AssemblerError> {
        match offset {
            Some(text) => self.number(text, 0x0F, line_num),
            None => Ok(0),
        }
    }

    /// Parse a jump target; labels are patched in pass 2.
    fn target(&mut self, text: &str, line_num: usize) -> Result<u8, AssemblerError> {
        match parse_value(text, line_num)? {
            Value::Label(label) => {
                self.pending.push((self.output.len(), label.to_string(), line_num));
                Ok(0) // Placeholder, will be resolved in pass 2
            }
            Value::Number(_) => self.number(text, 0x0F, line_num),
        }
    }

    fn emit(&mut self, byte: u8, line_num: usize) -> Result<(), AssemblerError> {
        if self.output.len() >= ROM_SIZE {
            return Err(AssemblerError::ProgramTooLarge { line: line_num });
        }
        self.output.push(byte);
        Ok(())
    }

    fn resolve_references(&mut self) -> Result<(), AssemblerError> {
        for (out_idx, label, line_num) in &self.pending {
            let addr = self.symbols.get(label)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: *line_num,
                    label: label.clone(),
                })?;
            // A label after the last byte has no ROM address to jump to.
            if *addr > 0x0F {
                return Err(AssemblerError::ValueOutOfRange {
                    line: *line_num,
                    value: u32::from(*addr),
                });
            }
            self.output[*out_idx] |= *addr;
        }
        Ok(())
    }
}

/// Match `reg` or `reg+n`, returning the optional offset text.
fn register_operand<'a>(text: &'a str, reg: &str) -> Option<Option<&'a str>> {
    let rest = text.strip_prefix(reg)?.trim_start();
    if rest.is_empty() {
        return Some(None);
    }
    rest.strip_prefix('+').map(|offset| Some(offset.trim()))
}

fn parse_value(text: &str, line_num: usize) -> Result<Value<'_>, AssemblerError> {
    let text = text.trim();
    let parsed = if let Some(hex) = text.strip_prefix("0x") {
        u32::from_str_radix(hex, 16)
    } else if let Some(bin) = text.strip_prefix("0b") {
        u32::from_str_radix(bin, 2)
    } else if text.starts_with(|c: char| c.is_ascii_digit()) {
        text.parse::<u32>()
    } else if is_identifier(text) {
        return Ok(Value::Label(text));
    } else {
        return Err(syntax(line_num, &format!("invalid operand '{}'", text)));
    };

    parsed
        .map(Value::Number)
        .map_err(|_| syntax(line_num, &format!("invalid number '{}'", text)))
}

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

fn syntax(line: usize, message: &str) -> AssemblerError {
    AssemblerError::SyntaxError { line, message: message.to_string() }
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    SyntaxError { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("value out of range on line {line}: {value}")]
    ValueOutOfRange { line: usize, value: u32 },

    #[error("program does not fit in 16 bytes (line {line})")]
    ProgramTooLarge { line: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::disasm::{disassemble, disassemble_rom};
    use crate::cpu::decode::decode;
    use proptest::prelude::*;

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            ; Reference program
            mov b, a
            out b
            mov a, b+1
            jnc 0
            jmp 4
        "#;

        assert_eq!(assemble(source).unwrap(), vec![0x40, 0x90, 0x11, 0xE0, 0xF4]);
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = r#"
                mov b, 0
        loop:   add b, 1
                out b
                jnc loop
        end:    jmp end
        "#;

        assert_eq!(assemble(source).unwrap(), vec![0x70, 0x51, 0x90, 0xE1, 0xF4]);
    }

    #[test]
    fn test_assemble_forward_reference() {
        let source = "jmp done\nnop\ndone: out 0b1010";
        assert_eq!(assemble(source).unwrap(), vec![0xF2, 0x00, 0xBA]);
    }

    #[test]
    fn test_assemble_case_and_numbers() {
        let source = "MOV A, 0xF\nIn B+2\nADD a, 0b11\ndb 0x80\ndb 255";
        assert_eq!(assemble(source).unwrap(), vec![0x3F, 0x62, 0x03, 0x80, 0xFF]);
    }

    #[test]
    fn test_assemble_errors() {
        assert!(matches!(
            assemble("nop\nfoo a"),
            Err(AssemblerError::UnknownMnemonic { line: 2, .. })
        ));
        assert!(matches!(
            assemble("add a, 16"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 16 })
        ));
        assert!(matches!(
            assemble("db 256"),
            Err(AssemblerError::ValueOutOfRange { value: 256, .. })
        ));
        assert!(matches!(
            assemble("jmp nowhere"),
            Err(AssemblerError::UndefinedLabel { line: 1, .. })
        ));
        assert!(matches!(
            assemble("mov a, c"),
            Err(AssemblerError::SyntaxError { line: 1, .. })
        ));
        assert!(matches!(
            assemble("add c, 1"),
            Err(AssemblerError::SyntaxError { .. })
        ));
        assert!(matches!(
            assemble("x: nop\nx: nop"),
            Err(AssemblerError::SyntaxError { line: 2, .. })
        ));
    }

    #[test]
    fn test_assemble_too_large() {
        let source = "nop\n".repeat(17);
        assert!(matches!(
            assemble(&source),
            Err(AssemblerError::ProgramTooLarge { line: 17 })
        ));
        assert_eq!(assemble(&"nop\n".repeat(16)).unwrap().len(), 16);
    }

    #[test]
    fn test_label_past_end_of_rom() {
        let source = format!("jmp end\n{}end:\n", "nop\n".repeat(15));
        assert!(matches!(
            assemble(&source),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 16 })
        ));

        // Unreferenced, it is harmless.
        let source = format!("{}end:\n", "nop\n".repeat(16));
        assert_eq!(assemble(&source).unwrap().len(), 16);
    }

    #[test]
    fn test_disassembly_reassembles() {
        for byte in 0..=255u8 {
            if decode(byte).is_ok() {
                assert_eq!(assemble(&disassemble(byte)).unwrap(), vec![byte], "byte {:02X}", byte);
            }
        }
    }

    proptest! {
        #[test]
        fn prop_listing_reassembles(image in prop::array::uniform16(any::<u8>())) {
            let rom = Rom::from(image);
            let rebuilt = assemble_rom(&disassemble_rom(&rom)).unwrap();
            prop_assert_eq!(rebuilt, rom);
        }
    }
}
