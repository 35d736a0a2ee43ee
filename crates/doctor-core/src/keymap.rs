//! Keyboard shortcuts.
//!
//! Chords map straight to commands; there are no modes and no
//! multi-key sequences. Delete/Backspace are special: they only become
//! [`KeyAction::DeleteObject`] while an object is selected, otherwise
//! they belong to the text.

use crate::command::Command;
use crate::config::Config;
use crate::state::Margins;
use std::collections::HashMap;

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Modifiers = Modifiers {
        ctrl: false,
        alt: false,
        shift: false,
    };

    pub const CTRL: Modifiers = Modifiers {
        ctrl: true,
        alt: false,
        shift: false,
    };

    pub const CTRL_ALT: Modifiers = Modifiers {
        ctrl: true,
        alt: true,
        shift: false,
    };

    pub const CTRL_SHIFT: Modifiers = Modifiers {
        ctrl: true,
        alt: false,
        shift: true,
    };

    pub fn is_empty(&self) -> bool {
        !self.ctrl && !self.alt && !self.shift
    }

    /// Parses modifiers from a string like "ctrl+shift".
    pub fn parse(s: &str) -> Self {
        let lower = s.to_lowercase();
        Modifiers {
            ctrl: lower.contains("ctrl") || lower.contains("control") || lower.contains("cmd"),
            alt: lower.contains("alt") || lower.contains("option"),
            shift: lower.contains("shift"),
        }
    }
}

/// A key code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Char(char),
    Backspace,
    Delete,
    Escape,
    Enter,
}

impl Key {
    pub fn parse(s: &str) -> Option<Self> {
        let lower = s.to_lowercase();
        match lower.as_str() {
            "backspace" | "bs" => Some(Key::Backspace),
            "delete" | "del" => Some(Key::Delete),
            "escape" | "esc" => Some(Key::Escape),
            "enter" | "return" => Some(Key::Enter),
            "plus" => Some(Key::Char('=')),
            "minus" => Some(Key::Char('-')),
            _ => {
                let mut chars = lower.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Some(Key::Char(c)),
                    _ => None,
                }
            }
        }
    }
}

/// A key press event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyPress {
    pub key: Key,
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn new(key: Key, modifiers: Modifiers) -> Self {
        Self { key, modifiers }
    }

    /// Parses a chord like "ctrl+alt+1".
    pub fn parse(s: &str) -> Option<Self> {
        let (mods, key) = match s.rsplit_once('+') {
            // "ctrl++" binds the plus key itself
            Some((mods, "")) => (mods.trim_end_matches('+'), "="),
            Some((mods, key)) => (mods, key),
            None => ("", s),
        };
        let key = key.trim();
        let modifiers = Modifiers::parse(mods);
        let key = match (Key::parse(key)?, key.chars().next()) {
            // Shifted letters keep their case: "shift+A" types 'A'. Shortcuts stay lowercase.
            (Key::Char(_), Some(c))
                if modifiers.shift && !modifiers.ctrl && !modifiers.alt && key.chars().count() == 1 =>
            {
                Key::Char(c)
            }
            (parsed, _) => parsed,
        };
        Some(Self { key, modifiers })
    }
}

/// Formats in the same chord syntax [`KeyPress::parse`] accepts.
impl std::fmt::Display for KeyPress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let Modifiers { ctrl, alt, shift } = self.modifiers;
        for (held, name) in [(ctrl, "ctrl+"), (alt, "alt+"), (shift, "shift+")] {
            if held {
                f.write_str(name)?;
            }
        }
        match self.key {
            Key::Char('=') => f.write_str("plus"),
            Key::Char('-') => f.write_str("minus"),
            Key::Char(c) => write!(f, "{c}"),
            Key::Backspace => f.write_str("backspace"),
            Key::Delete => f.write_str("delete"),
            Key::Escape => f.write_str("escape"),
            Key::Enter => f.write_str("enter"),
        }
    }
}

/// What a key press turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    Command(Command),
    /// Delete the selected floating object
    DeleteObject,
    /// Not ours; the text surface handles it
    PassThrough,
}

/// Chord to command table.
#[derive(Debug, Clone)]
pub struct Keymap {
    bindings: HashMap<KeyPress, Command>,
}

impl Keymap {
    /// Creates a keymap with the default bindings.
    pub fn new() -> Self {
        let mut keymap = Self {
            bindings: HashMap::new(),
        };
        keymap.add_default_bindings();
        keymap
    }

    /// Default bindings plus the user's overrides.
    pub fn from_config(config: &Config) -> Self {
        let mut keymap = Self::new();
        for (chord, name) in &config.keyboard.bindings {
            match (KeyPress::parse(chord), name.parse::<Command>()) {
                (Some(key), Ok(command)) => {
                    keymap.bindings.insert(key, command);
                }
                (None, _) => tracing::warn!("Ignoring binding with bad chord '{}'", chord),
                (_, Err(err)) => tracing::warn!("Ignoring binding for '{}': {}", chord, err),
            }
        }
        keymap
    }

    fn add_default_bindings(&mut self) {
        use Command::*;

        let defaults = [
            (Key::Char('b'), Modifiers::CTRL, Bold),
            (Key::Char('i'), Modifiers::CTRL, Italic),
            (Key::Char('u'), Modifiers::CTRL, Underline),
            (Key::Char('1'), Modifiers::CTRL_ALT, Heading { level: 1 }),
            (Key::Char('2'), Modifiers::CTRL_ALT, Heading { level: 2 }),
            (Key::Char('3'), Modifiers::CTRL_ALT, Heading { level: 3 }),
            (Key::Char('0'), Modifiers::CTRL_ALT, Normal),
            (Key::Char('t'), Modifiers::CTRL_ALT, Title),
            (Key::Char('l'), Modifiers::CTRL, AlignLeft),
            (Key::Char('e'), Modifiers::CTRL, AlignCenter),
            (Key::Char('r'), Modifiers::CTRL, AlignRight),
            (Key::Char('l'), Modifiers::CTRL_SHIFT, BulletList),
            (Key::Char('m'), Modifiers::CTRL_SHIFT, SetMargins(Margins::Narrow)),
            (Key::Char('='), Modifiers::CTRL, ZoomIn),
            (Key::Char('-'), Modifiers::CTRL, ZoomOut),
            (Key::Char('0'), Modifiers::CTRL, ZoomReset),
        ];
        for (key, modifiers, command) in defaults {
            self.bindings.insert(KeyPress::new(key, modifiers), command);
        }
    }

    /// Resolves a key press.
    pub fn process(&self, key: KeyPress, object_selected: bool) -> KeyAction {
        if matches!(key.key, Key::Delete | Key::Backspace) && key.modifiers.is_empty() {
            return if object_selected {
                KeyAction::DeleteObject
            } else {
                KeyAction::PassThrough
            };
        }
        self.bindings
            .get(&key)
            .cloned()
            .map(KeyAction::Command)
            .unwrap_or(KeyAction::PassThrough)
    }

    pub fn binding(&self, key: &KeyPress) -> Option<&Command> {
        self.bindings.get(key)
    }

    /// Every binding, sorted by chord text.
    pub fn bindings(&self) -> Vec<(KeyPress, &Command)> {
        let mut all: Vec<_> = self.bindings.iter().map(|(key, command)| (*key, command)).collect();
        all.sort_by_key(|(key, _)| key.to_string());
        all
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl Default for Keymap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypress_parse() {
        let kp = KeyPress::parse("ctrl+alt+1").unwrap();
        assert_eq!(kp.key, Key::Char('1'));
        assert_eq!(kp.modifiers, Modifiers::CTRL_ALT);

        let plus = KeyPress::parse("ctrl++").unwrap();
        assert_eq!(plus, KeyPress::new(Key::Char('='), Modifiers::CTRL));
        assert_eq!(KeyPress::parse("Delete").unwrap().key, Key::Delete);
        assert!(KeyPress::parse("ctrl+nope").is_none());
    }

    #[test]
    fn test_chord_display_parses_back() {
        for chord in ["ctrl+alt+1", "ctrl+plus", "ctrl+shift+l", "delete"] {
            let key = KeyPress::parse(chord).unwrap();
            assert_eq!(key.to_string(), chord);
            assert_eq!(KeyPress::parse(&key.to_string()), Some(key));
        }
    }

    #[test]
    fn test_shift_keeps_letter_case() {
        let upper = KeyPress::parse("shift+A").unwrap();
        assert_eq!(upper, KeyPress::new(Key::Char('A'), Modifiers { shift: true, ..Modifiers::NONE }));
        assert_eq!(upper.to_string(), "shift+A");
        assert_eq!(KeyPress::parse("ctrl+B").unwrap().key, Key::Char('b'));
        assert_eq!(
            KeyPress::parse("ctrl+shift+L").unwrap(),
            KeyPress::new(Key::Char('l'), Modifiers::CTRL_SHIFT)
        );
        assert_eq!(KeyPress::parse("shift+Delete").unwrap().key, Key::Delete);
    }

    #[test]
    fn test_default_bindings() {
        let keymap = Keymap::new();
        assert_eq!(
            keymap.process(KeyPress::new(Key::Char('b'), Modifiers::CTRL), false),
            KeyAction::Command(Command::Bold)
        );
        assert_eq!(
            keymap.process(KeyPress::new(Key::Char('1'), Modifiers::CTRL_ALT), false),
            KeyAction::Command(Command::Heading { level: 1 })
        );
        assert_eq!(
            keymap.process(KeyPress::new(Key::Char('x'), Modifiers::NONE), false),
            KeyAction::PassThrough
        );
    }

    #[test]
    fn test_delete_key_follows_object_selection() {
        let keymap = Keymap::new();
        let delete = KeyPress::new(Key::Delete, Modifiers::NONE);
        let backspace = KeyPress::new(Key::Backspace, Modifiers::NONE);
        assert_eq!(keymap.process(delete, true), KeyAction::DeleteObject);
        assert_eq!(keymap.process(backspace, true), KeyAction::DeleteObject);
        assert_eq!(keymap.process(delete, false), KeyAction::PassThrough);
    }

    #[test]
    fn test_config_overrides() {
        let mut config = Config::default();
        config.keyboard.bindings.insert("ctrl+shift+t".to_string(), "toc".to_string());
        config.keyboard.bindings.insert("ctrl+b".to_string(), "underline".to_string());
        config.keyboard.bindings.insert("ctrl+k".to_string(), "launch".to_string());
        let keymap = Keymap::from_config(&config);

        let toc = KeyPress::parse("ctrl+shift+t").unwrap();
        assert_eq!(keymap.binding(&toc), Some(&Command::TableOfContents));
        let bold = KeyPress::parse("ctrl+b").unwrap();
        assert_eq!(keymap.binding(&bold), Some(&Command::Underline));
        assert!(keymap.binding(&KeyPress::parse("ctrl+k").unwrap()).is_none());
    }
}
