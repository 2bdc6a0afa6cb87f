//! TD4 register file.
//!
//! The TD4 has very little state:
//! - A, B: 4-bit general purpose registers
//! - IN: 4-bit input port (driven from outside)
//! - OUT: 4-bit output port
//! - C: carry flag, with a one-cycle drop latch
//! - PC: 4-bit program counter

use serde::{Serialize, Deserialize};

/// Mask for a 4-bit value held in an 8-bit cell.
pub const NIBBLE_MASK: u8 = 0x0F;

/// Add two nibbles the way the TD4 ALU does.
///
/// Returns the 4-bit sum and whether it overflowed.
#[inline]
pub fn add_nibbles(x: u8, y: u8) -> (u8, bool) {
    let sum = (x & NIBBLE_MASK) + (y & NIBBLE_MASK);
    (sum & NIBBLE_MASK, sum > NIBBLE_MASK)
}

/// The TD4 register file.
///
/// Every value is kept in the low nibble; setters mask their argument.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    a: u8,
    b: u8,
    input: u8,
    output: u8,
    carry: bool,
    /// Armed on the cycle after a carry was raised; the next cycle drops it.
    carry_drop: bool,
    pc: u8,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers, the carry flag and its latch.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn a(&self) -> u8 {
        self.a
    }

    pub fn set_a(&mut self, value: u8) {
        self.a = value & NIBBLE_MASK;
    }

    pub fn b(&self) -> u8 {
        self.b
    }

    pub fn set_b(&mut self, value: u8) {
        self.b = value & NIBBLE_MASK;
    }

    /// Value currently on the input pins.
    pub fn input(&self) -> u8 {
        self.input
    }

    pub fn set_input(&mut self, value: u8) {
        self.input = value & NIBBLE_MASK;
    }

    /// Value currently on the output LEDs.
    pub fn output(&self) -> u8 {
        self.output
    }

    pub fn set_output(&mut self, value: u8) {
        self.output = value & NIBBLE_MASK;
    }

    pub fn carry(&self) -> bool {
        self.carry
    }

    /// Set the carry flag directly. The drop latch is left alone.
    pub fn set_carry(&mut self, carry: bool) {
        self.carry = carry;
    }

    /// Program counter (0-15).
    pub fn pc(&self) -> u8 {
        self.pc
    }

    /// Set the program counter. Values wrap into 0-15.
    pub fn set_pc(&mut self, addr: u8) {
        self.pc = addr & NIBBLE_MASK;
    }

    /// Increment the program counter by 1, wrapping 15 to 0.
    /// Returns the old value.
    pub fn advance_pc(&mut self) -> u8 {
        let old = self.pc;
        self.pc = (self.pc + 1) & NIBBLE_MASK;
        old
    }

    /// Jump to an absolute address.
    pub fn jump(&mut self, addr: u8) {
        self.set_pc(addr);
    }

    /// Latch a fresh carry out of the ALU.
    ///
    /// The new value gets its own extra cycle of visibility, so any
    /// half-expired latch from an earlier carry is discarded.
    pub fn set_alu_carry(&mut self, carry: bool) {
        self.carry = carry;
        self.carry_drop = false;
    }

    /// Clock the carry latch once.
    ///
    /// A raised carry survives one extra cycle and is dropped at the start
    /// of the cycle after that, whatever instruction runs.
    pub fn tick_carry(&mut self) {
        if self.carry {
            if self.carry_drop {
                self.carry = false;
                self.carry_drop = false;
            } else {
                self.carry_drop = true;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_nibbles() {
        assert_eq!(add_nibbles(0, 0), (0, false));
        assert_eq!(add_nibbles(7, 8), (15, false));
        assert_eq!(add_nibbles(8, 8), (0, true));
        assert_eq!(add_nibbles(15, 15), (14, true));
    }

    #[test]
    fn test_setters_mask_to_nibble() {
        let mut regs = Registers::new();
        regs.set_a(0x1F);
        regs.set_b(0xA3);
        regs.set_input(0x10);
        regs.set_output(0xFF);
        regs.set_pc(17);

        assert_eq!(regs.a(), 0x0F);
        assert_eq!(regs.b(), 0x03);
        assert_eq!(regs.input(), 0);
        assert_eq!(regs.output(), 0x0F);
        assert_eq!(regs.pc(), 1);
    }

    #[test]
    fn test_advance_pc_wraps() {
        let mut regs = Registers::new();
        regs.set_pc(14);

        assert_eq!(regs.advance_pc(), 14);
        assert_eq!(regs.pc(), 15);
        assert_eq!(regs.advance_pc(), 15);
        assert_eq!(regs.pc(), 0);
    }

    #[test]
    fn test_carry_latch() {
        let mut regs = Registers::new();
        regs.set_carry(true);

        // Survives one tick, then drops on the next.
        regs.tick_carry();
        assert!(regs.carry());
        regs.tick_carry();
        assert!(!regs.carry());
        regs.tick_carry();
        assert!(!regs.carry());
    }

    #[test]
    fn test_alu_carry_restarts_latch() {
        let mut regs = Registers::new();
        regs.set_carry(true);
        regs.tick_carry();

        // A new carry while the old one is about to drop.
        regs.set_alu_carry(true);
        regs.tick_carry();
        assert!(regs.carry());
        regs.tick_carry();
        assert!(!regs.carry());
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.set_a(3);
        regs.set_carry(true);
        regs.tick_carry();
        regs.set_pc(9);

        regs.reset();
        assert_eq!(regs, Registers::new());
    }
}
