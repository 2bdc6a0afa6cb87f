//! Raw TD4 ROM images.
//!
//! An image is just the instruction bytes in address order, at most 16 of
//! them. Short images are zero-padded (`nop`) on load.

use crate::asm::assembler::{assemble, AssemblerError};
use crate::cpu::{CpuError, Rom, ROM_SIZE};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

/// Load an image from disk, truncating anything past 16 bytes.
pub fn load_bin<P: AsRef<Path>>(path: P) -> Result<Rom, BinError> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)?;

    if bytes.len() > ROM_SIZE {
        warn!(path = %path.display(), len = bytes.len(), "image longer than ROM, truncating");
    }
    debug!(path = %path.display(), len = bytes.len(), "loaded image");

    Ok(Rom::from_bytes(&bytes))
}

/// Load an image from disk, rejecting anything past 16 bytes.
pub fn load_bin_strict<P: AsRef<Path>>(path: P) -> Result<Rom, BinError> {
    let bytes = std::fs::read(path.as_ref())?;
    Ok(Rom::try_from_bytes(&bytes)?)
}

/// Save all 16 ROM bytes to disk.
pub fn save_bin<P: AsRef<Path>>(path: P, rom: &Rom) -> Result<(), BinError> {
    std::fs::write(path.as_ref(), rom.as_bytes())?;
    Ok(())
}

/// Load a program, assembling it first if the path ends in `.s` or `.asm`.
pub fn load_program<P: AsRef<Path>>(path: P) -> Result<Rom, BinError> {
    let path = path.as_ref();
    let is_source = matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("s") | Some("asm")
    );

    if is_source {
        let source = std::fs::read_to_string(path)?;
        let image = assemble(&source)?;
        debug!(path = %path.display(), len = image.len(), "assembled program");
        Ok(Rom::from_bytes(&image))
    } else {
        load_bin(path)
    }
}

/// Errors that can occur while reading or writing images.
#[derive(Debug, Error)]
pub enum BinError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Rom(#[from] CpuError),

    #[error("{0}")]
    Assembler(#[from] AssemblerError),
}
