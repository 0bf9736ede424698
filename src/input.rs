use crate::machine::{Key, KEYPAD_SIZE};
use crossterm::event::{
    poll, read, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, KeyboardEnhancementFlags,
    PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
};
use crossterm::{execute, terminal};
use log::{debug, trace, warn};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::time::Duration;

/// map of keys on the left-hand side of a qwerty keyboard to the COSMAC hex
/// keypad
///
///   1 2 3 4        1 2 3 C
///   q w e r   =>   4 5 6 D
///   a s d f        7 8 9 E
///   z x c v        A 0 B F
const CHIP8_CONVENTIONAL_KEYMAP: [(char, u8); KEYPAD_SIZE] = [
    ('x', 0x00),
    ('1', 0x01),
    ('2', 0x02),
    ('3', 0x03),
    ('q', 0x04),
    ('w', 0x05),
    ('e', 0x06),
    ('a', 0x07),
    ('s', 0x08),
    ('d', 0x09),
    ('z', 0x0a),
    ('c', 0x0b),
    ('4', 0x0c),
    ('r', 0x0d),
    ('f', 0x0e),
    ('v', 0x0f),
];

/// static host key => keypad lookup; anything not in the table is ignored
pub struct Keymap {
    keys: HashMap<char, Key>,
}

impl Keymap {
    pub fn conventional() -> Self {
        Keymap {
            keys: CHIP8_CONVENTIONAL_KEYMAP
                .iter()
                .filter_map(|&(host, slot)| Key::new(slot).map(|key| (host, key)))
                .collect(),
        }
    }

    pub fn lookup(&self, host: char) -> Option<Key> {
        self.keys.get(&host.to_ascii_lowercase()).copied()
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::conventional()
    }
}

/// pressed/released state of every keypad slot
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyTable {
    pressed: [bool; KEYPAD_SIZE],
}

impl KeyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// record a key's state; true if that was a change
    pub fn set(&mut self, key: Key, pressed: bool) -> bool {
        let slot = &mut self.pressed[key.index()];
        let changed = *slot != pressed;
        *slot = pressed;
        changed
    }

    pub fn is_pressed(&self, key: Key) -> bool {
        self.pressed[key.index()]
    }

    pub fn pressed(&self) -> impl Iterator<Item = Key> + '_ {
        Key::all().filter(|key| self.is_pressed(*key))
    }

    pub fn reset(&mut self) {
        self.pressed = [false; KEYPAD_SIZE];
    }
}

/// Turns host key events into keypad transitions.
///
/// Only transitions come out, so a held key that the host repeats is
/// forwarded to the machine once.
#[derive(Default)]
pub struct InputMapper {
    keymap: Keymap,
    table: KeyTable,
}

impl InputMapper {
    pub fn new(keymap: Keymap) -> Self {
        InputMapper {
            keymap,
            table: KeyTable::new(),
        }
    }

    /// the keypad transition caused by a host event, if any
    pub fn key_event(&mut self, host: char, pressed: bool) -> Option<Key> {
        let Some(key) = self.keymap.lookup(host) else {
            trace!("ignoring unmapped key {:?}", host);
            return None;
        };
        if self.table.set(key, pressed) {
            Some(key)
        } else {
            None
        }
    }

    pub fn table(&self) -> &KeyTable {
        &self.table
    }

    pub fn reset(&mut self) {
        self.table.reset();
    }
}

/// things the host can tell the harness
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostEvent {
    Key { key: char, pressed: bool },
    /// pick a ROM from the catalog, zero-based
    SelectSlot(usize),
    Quit,
}

/// reads host input, out of band from the tick loop
pub trait Input {
    /// everything the host delivered since the last call, in order
    fn poll_events(&mut self) -> Result<Vec<HostEvent>, io::Error>;
}

/// Most terminals only ever report presses, so a release is made up once a
/// key has gone quiet for `hold` refreshes.
pub struct ReleaseLatch {
    hold: u64,
    held: HashMap<char, u64>,
}

impl ReleaseLatch {
    pub fn new(hold: u64) -> Self {
        ReleaseLatch {
            hold: hold.max(1),
            held: HashMap::new(),
        }
    }

    /// note a press (or auto-repeat) at `now`; true if the key wasn't held
    pub fn press(&mut self, key: char, now: u64) -> bool {
        self.held.insert(key, now + self.hold).is_none()
    }

    /// a real release arrived; true if the key was held
    pub fn release(&mut self, key: char) -> bool {
        self.held.remove(&key).is_some()
    }

    /// keys whose hold ran out at or before `now`
    pub fn expire(&mut self, now: u64) -> Vec<char> {
        let mut expired: Vec<char> = self
            .held
            .iter()
            .filter(|&(_, &due)| due <= now)
            .map(|(&key, _)| key)
            .collect();
        expired.sort_unstable();
        for key in &expired {
            self.held.remove(key);
        }
        expired
    }
}

/// Turns crossterm key events into host events.
///
/// When the terminal speaks the kitty keyboard protocol (`enhanced`) we get
/// real releases; otherwise they come from a `ReleaseLatch`.
struct KeyTranslator {
    enhanced: bool,
    latch: ReleaseLatch,
    refreshes: u64,
}

impl KeyTranslator {
    fn new(enhanced: bool, key_hold: u64) -> Self {
        KeyTranslator {
            enhanced,
            latch: ReleaseLatch::new(key_hold),
            refreshes: 0,
        }
    }

    fn translate(&mut self, evt: KeyEvent, events: &mut Vec<HostEvent>) {
        let pressed = evt.kind != KeyEventKind::Release;
        match evt.code {
            KeyCode::Esc if pressed => events.push(HostEvent::Quit),
            // raw mode eats SIGINT
            KeyCode::Char('c') if pressed && evt.modifiers.contains(KeyModifiers::CONTROL) => {
                events.push(HostEvent::Quit)
            }
            KeyCode::F(n @ 1..=12) if evt.kind == KeyEventKind::Press => {
                events.push(HostEvent::SelectSlot(n as usize - 1))
            }
            KeyCode::Char(c) => {
                let key = c.to_ascii_lowercase();
                if self.enhanced {
                    // repeats carry no new information
                    if evt.kind != KeyEventKind::Repeat {
                        events.push(HostEvent::Key { key, pressed });
                    }
                } else if !pressed {
                    // some platforms report releases even without the protocol
                    if self.latch.release(key) {
                        events.push(HostEvent::Key { key, pressed: false });
                    }
                } else if self.latch.press(key, self.refreshes) {
                    events.push(HostEvent::Key { key, pressed: true });
                }
            }
            _ => trace!("ignoring key event {:?}", evt),
        }
    }

    fn begin_refresh(&mut self) {
        self.refreshes += 1;
    }

    /// releases for keys that went quiet; call after this refresh's events
    fn made_up_releases(&mut self) -> Vec<HostEvent> {
        if self.enhanced {
            return Vec::new();
        }
        self.latch
            .expire(self.refreshes)
            .into_iter()
            .map(|key| HostEvent::Key {
                key,
                pressed: false,
            })
            .collect()
    }
}

/// Input from the controlling terminal, using crossterm.
pub struct TermInput {
    keys: KeyTranslator,
}

impl TermInput {
    pub fn new(key_hold: u64) -> Result<Self, io::Error> {
        terminal::enable_raw_mode()?;
        let enhanced = matches!(terminal::supports_keyboard_enhancement(), Ok(true));
        if enhanced {
            execute!(
                io::stdout(),
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        } else {
            debug!("terminal can't report key releases; holding keys for {} refreshes", key_hold);
        }
        Ok(TermInput {
            keys: KeyTranslator::new(enhanced, key_hold),
        })
    }
}

impl Input for TermInput {
    fn poll_events(&mut self) -> Result<Vec<HostEvent>, io::Error> {
        self.keys.begin_refresh();
        let mut events = Vec::new();
        while poll(Duration::from_millis(0))? {
            match read()? {
                Event::Key(evt) => self.keys.translate(evt, &mut events),
                other => trace!("ignoring terminal event {:?}", other),
            }
        }
        events.extend(self.keys.made_up_releases());
        Ok(events)
    }
}

impl Drop for TermInput {
    fn drop(&mut self) {
        if self.keys.enhanced {
            if let Err(e) = execute!(io::stdout(), PopKeyboardEnhancementFlags) {
                warn!("couldn't restore keyboard mode: {}", e);
            }
        }
        if let Err(e) = terminal::disable_raw_mode() {
            warn!("couldn't leave raw mode: {}", e);
        }
    }
}

/// dummy Input implementation for testing; hands out one batch per poll
pub struct DummyInput {
    batches: VecDeque<Vec<HostEvent>>,
}

impl DummyInput {
    pub fn new(batches: Vec<Vec<HostEvent>>) -> Self {
        DummyInput {
            batches: batches.into(),
        }
    }
}

impl Input for DummyInput {
    fn poll_events(&mut self) -> Result<Vec<HostEvent>, io::Error> {
        Ok(self.batches.pop_front().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(slot: u8) -> Key {
        Key::new(slot).unwrap()
    }

    #[test]
    fn test_conventional_layout() {
        let map = Keymap::conventional();
        assert_eq!(map.lookup('1'), Some(key(0x1)));
        assert_eq!(map.lookup('4'), Some(key(0xc)));
        assert_eq!(map.lookup('x'), Some(key(0x0)));
        assert_eq!(map.lookup('V'), Some(key(0xf)));
        assert_eq!(map.lookup('p'), None);
    }

    #[test]
    fn test_keymap_is_total_over_keypad() {
        let map = Keymap::conventional();
        let mut seen: Vec<Key> = CHIP8_CONVENTIONAL_KEYMAP
            .iter()
            .filter_map(|&(c, _)| map.lookup(c))
            .collect();
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), KEYPAD_SIZE);
    }

    #[test]
    fn test_table_reports_changes() {
        let mut t = KeyTable::new();
        assert!(t.set(key(3), true));
        assert!(!t.set(key(3), true));
        assert!(t.is_pressed(key(3)));
        assert!(t.set(key(3), false));
        assert!(!t.set(key(3), false));
    }

    #[test]
    fn test_table_reset() {
        let mut t = KeyTable::new();
        t.set(key(1), true);
        t.set(key(0xe), true);
        assert_eq!(t.pressed().collect::<Vec<_>>(), vec![key(1), key(0xe)]);
        t.reset();
        assert_eq!(t.pressed().count(), 0);
    }

    #[test]
    fn test_mapper_forwards_transitions_only() {
        let mut m = InputMapper::default();
        assert_eq!(m.key_event('w', true), Some(key(5)));
        assert_eq!(m.key_event('W', true), None);
        assert_eq!(m.key_event('w', false), Some(key(5)));
        assert_eq!(m.key_event('w', false), None);
    }

    #[test]
    fn test_mapper_ignores_unmapped() {
        let mut m = InputMapper::default();
        assert_eq!(m.key_event('p', true), None);
        assert_eq!(m.table().pressed().count(), 0);
    }

    #[test]
    fn test_latch_holds_then_releases() {
        let mut l = ReleaseLatch::new(3);
        assert!(l.press('q', 1));
        assert!(!l.press('q', 2)); // auto-repeat extends the hold
        assert!(l.expire(4).is_empty());
        assert_eq!(l.expire(5), vec!['q']);
        assert!(l.press('q', 6));
    }

    #[test]
    fn test_latch_expires_in_order() {
        let mut l = ReleaseLatch::new(1);
        l.press('z', 0);
        l.press('a', 0);
        assert_eq!(l.expire(1), vec!['a', 'z']);
    }

    fn translate_all(keys: &mut KeyTranslator, evts: &[KeyEvent]) -> Vec<HostEvent> {
        let mut events = Vec::new();
        for evt in evts {
            keys.translate(*evt, &mut events);
        }
        events
    }

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn of_kind(code: KeyCode, kind: KeyEventKind) -> KeyEvent {
        KeyEvent::new_with_kind(code, KeyModifiers::NONE, kind)
    }

    #[test]
    fn test_function_keys_select_slots() {
        let mut keys = KeyTranslator::new(true, 2);
        let events = translate_all(
            &mut keys,
            &[
                press(KeyCode::F(1)),
                press(KeyCode::F(12)),
                press(KeyCode::F(13)),
                of_kind(KeyCode::F(1), KeyEventKind::Release),
                of_kind(KeyCode::F(2), KeyEventKind::Repeat),
            ],
        );
        assert_eq!(
            events,
            vec![HostEvent::SelectSlot(0), HostEvent::SelectSlot(11)]
        );
    }

    #[test]
    fn test_quit_keys() {
        let mut keys = KeyTranslator::new(false, 2);
        let events = translate_all(
            &mut keys,
            &[
                press(KeyCode::Esc),
                of_kind(KeyCode::Esc, KeyEventKind::Release),
                KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
            ],
        );
        assert_eq!(events, vec![HostEvent::Quit, HostEvent::Quit]);
        // plain 'c' is a keypad key, not quit
        assert_eq!(
            translate_all(&mut keys, &[press(KeyCode::Char('c'))]),
            vec![HostEvent::Key {
                key: 'c',
                pressed: true
            }]
        );
    }

    #[test]
    fn test_enhanced_passes_presses_and_releases_drops_repeats() {
        let mut keys = KeyTranslator::new(true, 2);
        keys.begin_refresh();
        let events = translate_all(
            &mut keys,
            &[
                press(KeyCode::Char('Q')),
                of_kind(KeyCode::Char('q'), KeyEventKind::Repeat),
                of_kind(KeyCode::Char('q'), KeyEventKind::Release),
            ],
        );
        assert_eq!(
            events,
            vec![
                HostEvent::Key {
                    key: 'q',
                    pressed: true
                },
                HostEvent::Key {
                    key: 'q',
                    pressed: false
                },
            ]
        );
        for _ in 0..5 {
            keys.begin_refresh();
            assert!(keys.made_up_releases().is_empty());
        }
    }

    #[test]
    fn test_fallback_latches_presses() {
        let mut keys = KeyTranslator::new(false, 2);
        keys.begin_refresh();
        // auto-repeat shows up as more presses
        let events = translate_all(
            &mut keys,
            &[press(KeyCode::Char('w')), press(KeyCode::Char('w'))],
        );
        assert_eq!(
            events,
            vec![HostEvent::Key {
                key: 'w',
                pressed: true
            }]
        );
        assert!(keys.made_up_releases().is_empty());

        keys.begin_refresh();
        assert!(keys.made_up_releases().is_empty());
        keys.begin_refresh();
        assert_eq!(
            keys.made_up_releases(),
            vec![HostEvent::Key {
                key: 'w',
                pressed: false
            }]
        );
    }

    #[test]
    fn test_fallback_uses_real_release() {
        let mut keys = KeyTranslator::new(false, 4);
        keys.begin_refresh();
        let events = translate_all(
            &mut keys,
            &[
                press(KeyCode::Char('e')),
                of_kind(KeyCode::Char('e'), KeyEventKind::Release),
                // a stray release for a key never pressed
                of_kind(KeyCode::Char('r'), KeyEventKind::Release),
            ],
        );
        assert_eq!(
            events,
            vec![
                HostEvent::Key {
                    key: 'e',
                    pressed: true
                },
                HostEvent::Key {
                    key: 'e',
                    pressed: false
                },
            ]
        );
        // nothing left for the latch to release later
        for _ in 0..6 {
            keys.begin_refresh();
            assert!(keys.made_up_releases().is_empty());
        }
    }

    #[test]
    fn test_latch_release() {
        let mut l = ReleaseLatch::new(3);
        l.press('a', 0);
        assert!(l.release('a'));
        assert!(!l.release('a'));
        assert!(l.expire(10).is_empty());
    }

    #[test]
    fn test_dummy_input_batches() -> Result<(), io::Error> {
        let mut i = DummyInput::new(vec![vec![HostEvent::Quit]]);
        assert_eq!(i.poll_events()?, vec![HostEvent::Quit]);
        assert!(i.poll_events()?.is_empty());
        Ok(())
    }
}
