use crate::error::HarnessError;

// NB. addresses are u16 as per the chip-8; lengths are usize to stop endless casting

/// Represents the machine's address space
pub trait MemoryMap {
    /// read a single byte
    fn read(&self, addr: u16) -> u8;

    /// write a single byte
    fn write(&mut self, addr: u16, data: u8);

    /// get a two-byte big-endian word (instructions)
    fn get_word(&self, addr: u16) -> u16 {
        ((self.read(addr) as u16) << 8) | self.read(addr.wrapping_add(1)) as u16
    }

    /// write a chunk of bytes, one after the other
    fn write_slice(&mut self, addr: u16, data: &[u8]) {
        for (offset, byte) in data.iter().enumerate() {
            self.write(addr.wrapping_add(offset as u16), *byte);
        }
    }
}

/// how much RAM we have
pub const CHIP8_RAM_SIZE_BYTES: usize = 4096;

/// where the program is loaded
pub const CHIP8_PROGRAM_ADDR: u16 = 0x0200;

/// the biggest program that fits between the load address and the top of RAM
pub const CHIP8_MAX_PROGRAM_BYTES: usize = CHIP8_RAM_SIZE_BYTES - CHIP8_PROGRAM_ADDR as usize;

/// where the hex font lives
pub const CHIP8_FONT_ADDR: u16 = 0x050;

/// height (in bytes) of each font glyph
pub const CHIP8_FONT_HEIGHT: u16 = 5;

/// Defines the CHIP-8 memory map
///   0x0000-0x01ff  interpreter (font at 0x050)
///   0x0200-0x0fff  program
///
/// addresses wrap at 4K, so a stray index register can't take us out of bounds
pub struct Chip8MemoryMap {
    bytes: Box<[u8]>,
}

impl MemoryMap for Chip8MemoryMap {
    fn read(&self, addr: u16) -> u8 {
        self.bytes[addr as usize % CHIP8_RAM_SIZE_BYTES]
    }

    fn write(&mut self, addr: u16, data: u8) {
        self.bytes[addr as usize % CHIP8_RAM_SIZE_BYTES] = data;
    }
}

impl Chip8MemoryMap {
    /// zeroed RAM with the contemporary font baked in
    pub fn new() -> Self {
        let mut mm = Chip8MemoryMap {
            bytes: vec![0u8; CHIP8_RAM_SIZE_BYTES].into_boxed_slice(),
        };
        mm.write_slice(CHIP8_FONT_ADDR, &CHIP8_CONTEMPORARY_FONT);
        mm
    }

    /// load a CHIP-8 program at 0x200
    pub fn load_program(&mut self, program: &[u8]) -> Result<(), HarnessError> {
        if program.len() > CHIP8_MAX_PROGRAM_BYTES {
            return Err(HarnessError::RomTooLarge {
                size: program.len(),
                max_size: CHIP8_MAX_PROGRAM_BYTES,
            });
        }
        self.write_slice(CHIP8_PROGRAM_ADDR, program);
        Ok(())
    }

    /// address of the font glyph for a hex digit
    pub fn glyph_addr(digit: u8) -> u16 {
        CHIP8_FONT_ADDR + CHIP8_FONT_HEIGHT * (digit & 0x0f) as u16
    }
}

impl Default for Chip8MemoryMap {
    fn default() -> Self {
        Self::new()
    }
}

const CHIP8_CONTEMPORARY_FONT: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];
