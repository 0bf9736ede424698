use std::error::Error;

use chip8_harness::clock::FramePacer;
use chip8_harness::config::Config;
use chip8_harness::display::MonoTermDisplay;
use chip8_harness::environment::Environment;
use chip8_harness::input::{InputMapper, Keymap, TermInput};
use chip8_harness::interpreter::Chip8Interpreter;
use chip8_harness::machine::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use chip8_harness::rom::{RomDirectory, RomLoader, RomRequest};
use chip8_harness::session::SessionManager;
use chip8_harness::sound::{Mute, SimpleBeep, Sound};
use log::warn;

fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let config = Config::parse();

    // ROMs
    let directory = RomDirectory::new(&config.rom_dir);
    let catalog = directory.catalog().unwrap_or_else(|e| {
        warn!("no ROM catalog: {}", e);
        Vec::new()
    });
    let initial = config
        .initial
        .clone()
        .or_else(|| catalog.first().cloned().map(RomRequest::Named));
    let loader = RomLoader::new(directory)?;

    // initialise
    let mut display =
        MonoTermDisplay::new(DISPLAY_WIDTH, DISPLAY_HEIGHT, config.scheduler.scale)?;
    let mut input = TermInput::new(config.key_hold)?;
    let mut sound: Box<dyn Sound> = if config.mute {
        Box::new(Mute::new())
    } else {
        Box::new(SimpleBeep::new())
    };
    let sessions = SessionManager::new(
        Chip8Interpreter::new,
        config.scheduler,
        InputMapper::new(Keymap::conventional()),
    );
    let mut env = Environment::new(
        sessions,
        loader,
        catalog,
        &mut input,
        &mut display,
        sound.as_mut(),
    );

    // load a program
    match initial {
        Some(request) => env.select(request),
        None => warn!("nothing to run; pass --rom or --file, or press F1-F12"),
    }

    let mut pacer = FramePacer::new(config.refresh_rate);
    env.run(&mut pacer)?;
    Ok(())
}
