//! TD4 program store.
//!
//! The TD4 reads its program from 16 bytes of ROM (DIP switches on the
//! real board), addressed by the 4-bit program counter.

use crate::cpu::execute::CpuError;
use serde::{Serialize, Deserialize};

/// The number of bytes in the TD4 ROM.
pub const ROM_SIZE: usize = 16;

/// The TD4 ROM: 16 instruction bytes.
#[derive(Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rom {
    bytes: [u8; ROM_SIZE],
}

impl Rom {
    /// Create a ROM filled with `nop`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ROM from an image, zero-padding short images and
    /// truncating long ones to the first 16 bytes.
    pub fn from_bytes(image: &[u8]) -> Self {
        let mut rom = Self::new();
        let len = image.len().min(ROM_SIZE);
        rom.bytes[..len].copy_from_slice(&image[..len]);
        rom
    }

    /// Build a ROM from an image, rejecting images longer than 16 bytes.
    pub fn try_from_bytes(image: &[u8]) -> Result<Self, CpuError> {
        if image.len() > ROM_SIZE {
            return Err(CpuError::RomOverflow);
        }
        Ok(Self::from_bytes(image))
    }

    /// Read the instruction at a 4-bit address.
    ///
    /// Only the low nibble of `addr` is used, so this never goes out of
    /// bounds.
    #[inline]
    pub fn fetch(&self, addr: u8) -> u8 {
        self.bytes[(addr & 0x0F) as usize]
    }

    /// Read a byte by address.
    pub fn read(&self, addr: usize) -> Result<u8, CpuError> {
        self.bytes.get(addr).copied().ok_or(CpuError::RomOverflow)
    }

    /// Write a byte by address.
    pub fn write(&mut self, addr: usize, value: u8) -> Result<(), CpuError> {
        let cell = self.bytes.get_mut(addr).ok_or(CpuError::RomOverflow)?;
        *cell = value;
        Ok(())
    }

    /// Replace the whole ROM with a new image (strict, see `try_from_bytes`).
    pub fn load(&mut self, image: &[u8]) -> Result<(), CpuError> {
        *self = Self::try_from_bytes(image)?;
        Ok(())
    }

    /// Fill the ROM with `nop`.
    pub fn clear(&mut self) {
        self.bytes = [0; ROM_SIZE];
    }

    /// All 16 bytes, in address order.
    pub fn as_bytes(&self) -> &[u8; ROM_SIZE] {
        &self.bytes
    }

    /// Iterate over `(address, byte)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (u8, u8)> + '_ {
        self.bytes.iter().enumerate().map(|(addr, &b)| (addr as u8, b))
    }
}

impl From<[u8; ROM_SIZE]> for Rom {
    fn from(bytes: [u8; ROM_SIZE]) -> Self {
        Self { bytes }
    }
}

impl std::fmt::Debug for Rom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rom[")?;
        for (i, b) in self.bytes.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{:02X}", b)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_image_is_padded() {
        let rom = Rom::from_bytes(&[0x40, 0x90, 0x11, 0xE0, 0xF4]);
        let mut expected = [0u8; ROM_SIZE];
        expected[..5].copy_from_slice(&[0x40, 0x90, 0x11, 0xE0, 0xF4]);
        assert_eq!(rom.as_bytes(), &expected);
    }

    #[test]
    fn test_long_image_is_truncated() {
        let image: Vec<u8> = (0..20).collect();
        let rom = Rom::from_bytes(&image);
        assert_eq!(&rom.as_bytes()[..], &image[..ROM_SIZE]);
    }

    #[test]
    fn test_strict_load_rejects_long_image() {
        let image = [0u8; ROM_SIZE + 1];
        assert!(matches!(Rom::try_from_bytes(&image), Err(CpuError::RomOverflow)));
        assert!(Rom::try_from_bytes(&image[..ROM_SIZE]).is_ok());

        let mut rom = Rom::from_bytes(&[0x31]);
        assert!(rom.load(&image).is_err());
        assert_eq!(rom.fetch(0), 0x31);
    }

    #[test]
    fn test_bounds() {
        let mut rom = Rom::new();
        assert!(rom.write(15, 0xF3).is_ok());
        assert_eq!(rom.read(15).unwrap(), 0xF3);

        assert!(matches!(rom.write(16, 0), Err(CpuError::RomOverflow)));
        assert!(matches!(rom.read(16), Err(CpuError::RomOverflow)));
    }

    #[test]
    fn test_clear() {
        let mut rom = Rom::from_bytes(&[0x31, 0xF1]);
        rom.clear();
        assert_eq!(rom, Rom::new());
    }

    #[test]
    fn test_fetch_uses_low_nibble() {
        let rom = Rom::from_bytes(&[0xB7]);
        assert_eq!(rom.fetch(0x10), 0xB7);
    }

    #[test]
    fn test_debug_format() {
        let rom = Rom::from_bytes(&[0xAB]);
        let text = format!("{:?}", rom);
        assert!(text.starts_with("Rom[AB 00"));
    }
}
