//! # interpreter
//!
//! A plain CHIP-8 interpreter that satisfies the `Machine` boundary, so the
//! harness has something to drive out of the box.
//!
//! * programs load at 0x200; font glyphs at 0x050
//! * one `advance_one_cycle` is one instruction; no machine-cycle timing
//! * sprites XOR onto the display and wrap at the edges; VF is the collision flag
//! * 8xy6 / 8xyE shift VX in place (the modern convention)
//! * Bnnn jumps to nnn + V0 (COSMAC VIP behaviour)
//! * Fx0A re-executes until some key is down
//! * the redraw flag is raised by 00E0 and Dxyn and dropped at the start of
//!   every cycle
use crate::error::HarnessError;
use crate::machine::{Key, Machine, Pixel, DISPLAY_HEIGHT, DISPLAY_WIDTH, KEYPAD_SIZE};
use crate::memory::{Chip8MemoryMap, MemoryMap, CHIP8_PROGRAM_ADDR};
use log::warn;
use rand::Rng;
use std::fmt;

/// 16 levels of nesting, as on the VIP
const STACK_DEPTH: usize = 16;

pub struct Chip8Interpreter {
    memory: Chip8MemoryMap,
    program_counter: u16,
    i: u16,
    v: [u8; 16],
    stack: Vec<u16>,
    delay_timer: u8,
    sound_timer: u8,
    display: Box<[Pixel]>,
    keys: [bool; KEYPAD_SIZE],
    redraw: bool,
}

fn x(instr: u16) -> usize {
    ((instr & 0x0f00) >> 8) as usize
}

fn y(instr: u16) -> usize {
    ((instr & 0x00f0) >> 4) as usize
}

fn n(instr: u16) -> u8 {
    (instr & 0x000f) as u8
}

fn nn(instr: u16) -> u8 {
    (instr & 0x00ff) as u8
}

fn nnn(instr: u16) -> u16 {
    instr & 0x0fff
}

impl Chip8Interpreter {
    pub fn new() -> Chip8Interpreter {
        Chip8Interpreter {
            memory: Chip8MemoryMap::new(),
            program_counter: CHIP8_PROGRAM_ADDR,
            i: 0x0000,
            v: [0; 16],
            stack: Vec::with_capacity(STACK_DEPTH),
            delay_timer: 0x00,
            sound_timer: 0x00,
            display: vec![0; DISPLAY_WIDTH * DISPLAY_HEIGHT].into_boxed_slice(),
            keys: [false; KEYPAD_SIZE],
            redraw: false,
        }
    }

    fn skip_if(&mut self, condition: bool) {
        if condition {
            self.program_counter = self.program_counter.wrapping_add(2);
        }
    }

    fn execute(&mut self, instr: u16) {
        let (x, y, n, nn, nnn) = (x(instr), y(instr), n(instr), nn(instr), nnn(instr));

        match instr & 0xf000 {
            0x0000 => match nnn {
                0x0e0 => {
                    self.display.fill(0);
                    self.redraw = true;
                }
                0x0ee => match self.stack.pop() {
                    Some(addr) => self.program_counter = addr,
                    None => warn!("return with an empty call stack at {:#05x}", self.current_addr()),
                },
                // 0nnn machine code routines aren't supported
                _ => {}
            },
            0x1000 => self.program_counter = nnn,
            0x2000 => {
                if self.stack.len() == STACK_DEPTH {
                    warn!("call stack overflow at {:#05x}", self.current_addr());
                    return;
                }
                self.stack.push(self.program_counter);
                self.program_counter = nnn;
            }
            0x3000 => self.skip_if(self.v[x] == nn),
            0x4000 => self.skip_if(self.v[x] != nn),
            0x5000 => self.skip_if(self.v[x] == self.v[y]),
            0x6000 => self.v[x] = nn,
            0x7000 => self.v[x] = self.v[x].wrapping_add(nn),
            0x8000 => self.arithmetic(instr, x, y, n),
            0x9000 => self.skip_if(self.v[x] != self.v[y]),
            0xa000 => self.i = nnn,
            0xb000 => self.program_counter = nnn.wrapping_add(self.v[0] as u16),
            0xc000 => self.v[x] = nn & rand::thread_rng().gen::<u8>(),
            0xd000 => self.draw_sprite(x, y, n),
            0xe000 => match nn {
                0x9e => self.skip_if(self.keys[(self.v[x] & 0x0f) as usize]),
                0xa1 => self.skip_if(!self.keys[(self.v[x] & 0x0f) as usize]),
                _ => self.unknown(instr),
            },
            0xf000 => self.misc(instr, x, nn),
            _ => unreachable!(),
        }
    }

    fn arithmetic(&mut self, instr: u16, x: usize, y: usize, n: u8) {
        match n {
            0x0 => self.v[x] = self.v[y],
            0x1 => self.v[x] |= self.v[y],
            0x2 => self.v[x] &= self.v[y],
            0x3 => self.v[x] ^= self.v[y],
            0x4 => {
                let (sum, carry) = self.v[x].overflowing_add(self.v[y]);
                self.v[x] = sum;
                self.v[0xf] = carry as u8;
            }
            0x5 | 0x7 => {
                let (left, right) = if n == 0x5 {
                    (self.v[x], self.v[y])
                } else {
                    (self.v[y], self.v[x])
                };
                let (diff, borrow) = left.overflowing_sub(right);
                self.v[x] = diff;
                self.v[0xf] = !borrow as u8;
            }
            0x6 => {
                let flag = self.v[x] & 0x1;
                self.v[x] >>= 1;
                self.v[0xf] = flag;
            }
            0xe => {
                let flag = self.v[x] >> 7;
                self.v[x] <<= 1;
                self.v[0xf] = flag;
            }
            _ => self.unknown(instr),
        }
    }

    fn misc(&mut self, instr: u16, x: usize, nn: u8) {
        match nn {
            0x07 => self.v[x] = self.delay_timer,
            0x0a => match self.keys.iter().position(|&down| down) {
                Some(key) => self.v[x] = key as u8,
                // go round again until something is pressed
                None => self.program_counter = self.program_counter.wrapping_sub(2),
            },
            0x15 => self.delay_timer = self.v[x],
            0x18 => self.sound_timer = self.v[x],
            0x1e => self.i = self.i.wrapping_add(self.v[x] as u16),
            0x29 => self.i = Chip8MemoryMap::glyph_addr(self.v[x]),
            0x33 => {
                let value = self.v[x];
                self.memory
                    .write_slice(self.i, &[value / 100, (value / 10) % 10, value % 10]);
            }
            0x55 => {
                let registers = self.v;
                self.memory.write_slice(self.i, &registers[..=x]);
            }
            0x65 => {
                for offset in 0..=x {
                    self.v[offset] = self.memory.read(self.i.wrapping_add(offset as u16));
                }
            }
            _ => self.unknown(instr),
        }
    }

    /// XOR an n-row sprite from memory[I] onto the display at (VX, VY)
    fn draw_sprite(&mut self, x: usize, y: usize, height: u8) {
        let origin_x = self.v[x] as usize;
        let origin_y = self.v[y] as usize;
        let mut collision = 0;

        for row in 0..height as usize {
            let sprite = self.memory.read(self.i.wrapping_add(row as u16));
            let py = (origin_y + row) % DISPLAY_HEIGHT;
            for col in 0..8 {
                if sprite & (0x80 >> col) == 0 {
                    continue;
                }
                let px = (origin_x + col) % DISPLAY_WIDTH;
                let pixel = &mut self.display[py * DISPLAY_WIDTH + px];
                if *pixel != 0 {
                    collision = 1;
                }
                *pixel ^= 1;
            }
        }

        self.v[0xf] = collision;
        self.redraw = true;
    }

    fn unknown(&self, instr: u16) {
        warn!("skipping unknown instruction {:#06x} at {:#05x}", instr, self.current_addr());
    }

    /// address of the instruction currently executing
    fn current_addr(&self) -> u16 {
        self.program_counter.wrapping_sub(2)
    }
}

impl Default for Chip8Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Machine for Chip8Interpreter {
    fn advance_one_cycle(&mut self) {
        self.redraw = false;
        let instr = self.memory.get_word(self.program_counter);
        self.program_counter = self.program_counter.wrapping_add(2);
        self.execute(instr);
    }

    fn pending_redraw(&self) -> bool {
        self.redraw
    }

    fn tick_timers(&mut self) -> bool {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        if self.sound_timer > 0 {
            self.sound_timer -= 1;
            return true;
        }
        false
    }

    fn snapshot_display(&self) -> &[Pixel] {
        &self.display
    }

    fn load_program(&mut self, program: &[u8]) -> Result<(), HarnessError> {
        let mut memory = Chip8MemoryMap::new();
        memory.load_program(program)?;
        *self = Chip8Interpreter {
            memory,
            ..Chip8Interpreter::new()
        };
        Ok(())
    }

    fn set_key(&mut self, key: Key, pressed: bool) {
        self.keys[key.index()] = pressed;
    }
}

impl fmt::Debug for Chip8Interpreter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{:<5}  {:#x}", "PC:", self.program_counter)?;
        writeln!(f, "{:<5}  {:#x}", "I:", self.i)?;
        for (n, value) in self.v.iter().enumerate() {
            writeln!(f, "{:<5}  {:#x}", format!("V{:X}:", n), value)?;
        }
        writeln!(f, "{:<5}  {:#x}", "ST:", self.sound_timer)?;
        write!(f, "{:<5}  {:#x}", "DT:", self.delay_timer)
    }
}
