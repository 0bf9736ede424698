//! Command-line configuration.
use crate::rom::RomRequest;
use crate::scheduler::{SchedulerSettings, DEFAULT_CYCLES_PER_TICK};
use crate::sound::{Tone, SIMPLEBEEP_PITCH};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REFRESH_RATE: f64 = 60.0;
pub const DEFAULT_KEY_HOLD: u64 = 6;

#[derive(Parser, Debug)]
#[command(version, about = "Run CHIP-8 programs in the terminal", long_about = None)]
pub struct Args {
    #[arg(long, value_name = "DIR", default_value = "roms", help = "Directory of .ch8 ROMs; F1-F12 pick from it")]
    roms: PathBuf,

    #[arg(long, value_name = "NAME", conflicts_with = "file", help = "ROM to start with, from the ROM directory")]
    rom: Option<String>,

    #[arg(long, value_name = "PATH", help = "Run a ROM file from anywhere")]
    file: Option<PathBuf>,

    #[arg(long, default_value_t = DEFAULT_CYCLES_PER_TICK, value_parser = clap::value_parser!(u32).range(1..), help = "Instructions run per display refresh")]
    cycles_per_tick: u32,

    #[arg(long, value_name = "HZ", default_value_t = DEFAULT_REFRESH_RATE, value_parser = positive_rate, help = "Display refreshes per second")]
    refresh_rate: f64,

    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..=16), help = "Terminal cells per CHIP-8 pixel")]
    scale: u16,

    #[arg(long, default_value_t = SIMPLEBEEP_PITCH, help = "Beep pitch in Hz")]
    tone_hz: u16,

    #[arg(long, default_value_t = 1.0, help = "Beep gain; 0 is silent")]
    tone_gain: f32,

    #[arg(long, default_value_t = 50, help = "Beep length in milliseconds")]
    tone_ms: u64,

    #[arg(long, help = "No sound at all")]
    mute: bool,

    #[arg(long, value_name = "TICKS", default_value_t = DEFAULT_KEY_HOLD, help = "Refreshes a key stays down when the terminal can't report releases")]
    key_hold: u64,
}

fn positive_rate(s: &str) -> Result<f64, String> {
    let rate: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if rate.is_finite() && rate > 0.0 {
        Ok(rate)
    } else {
        Err(format!("{} is not a usable refresh rate", s))
    }
}

/// everything the binary needs to know, settled
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub rom_dir: PathBuf,
    pub initial: Option<RomRequest>,
    pub refresh_rate: f64,
    pub scheduler: SchedulerSettings,
    pub mute: bool,
    pub key_hold: u64,
}

impl Config {
    pub fn parse() -> Self {
        Args::parse().into()
    }
}

impl From<Args> for Config {
    fn from(args: Args) -> Self {
        let initial = match (args.rom, args.file) {
            (_, Some(path)) => Some(RomRequest::Local(path)),
            (Some(name), None) => Some(RomRequest::Named(name)),
            (None, None) => None,
        };
        Config {
            rom_dir: args.roms,
            initial,
            refresh_rate: args.refresh_rate,
            scheduler: SchedulerSettings {
                cycles_per_tick: args.cycles_per_tick,
                scale: args.scale as usize,
                tone: Tone {
                    frequency: args.tone_hz,
                    gain: args.tone_gain,
                    duration: Duration::from_millis(args.tone_ms),
                },
            },
            mute: args.mute,
            key_hold: args.key_hold,
        }
    }
}
