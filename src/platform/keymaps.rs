use evdev::Key;
use std::collections::HashMap;

/// (key, unshifted, shifted) for the US QWERTY positions
const QWERTY: &[(Key, char, char)] = &[
    (Key::KEY_Q, 'q', 'Q'), (Key::KEY_W, 'w', 'W'), (Key::KEY_E, 'e', 'E'), (Key::KEY_R, 'r', 'R'),
    (Key::KEY_T, 't', 'T'), (Key::KEY_Y, 'y', 'Y'), (Key::KEY_U, 'u', 'U'), (Key::KEY_I, 'i', 'I'),
    (Key::KEY_O, 'o', 'O'), (Key::KEY_P, 'p', 'P'), (Key::KEY_A, 'a', 'A'), (Key::KEY_S, 's', 'S'),
    (Key::KEY_D, 'd', 'D'), (Key::KEY_F, 'f', 'F'), (Key::KEY_G, 'g', 'G'), (Key::KEY_H, 'h', 'H'),
    (Key::KEY_J, 'j', 'J'), (Key::KEY_K, 'k', 'K'), (Key::KEY_L, 'l', 'L'), (Key::KEY_Z, 'z', 'Z'),
    (Key::KEY_X, 'x', 'X'), (Key::KEY_C, 'c', 'C'), (Key::KEY_V, 'v', 'V'), (Key::KEY_B, 'b', 'B'),
    (Key::KEY_N, 'n', 'N'), (Key::KEY_M, 'm', 'M'),
    (Key::KEY_1, '1', '!'), (Key::KEY_2, '2', '@'), (Key::KEY_3, '3', '#'), (Key::KEY_4, '4', '$'),
    (Key::KEY_5, '5', '%'), (Key::KEY_6, '6', '^'), (Key::KEY_7, '7', '&'), (Key::KEY_8, '8', '*'),
    (Key::KEY_9, '9', '('), (Key::KEY_0, '0', ')'),
    (Key::KEY_MINUS, '-', '_'), (Key::KEY_EQUAL, '=', '+'), (Key::KEY_LEFTBRACE, '[', '{'),
    (Key::KEY_RIGHTBRACE, ']', '}'), (Key::KEY_SEMICOLON, ';', ':'), (Key::KEY_APOSTROPHE, '\'', '"'),
    (Key::KEY_GRAVE, '`', '~'), (Key::KEY_BACKSLASH, '\\', '|'), (Key::KEY_COMMA, ',', '<'),
    (Key::KEY_DOT, '.', '>'), (Key::KEY_SLASH, '/', '?'),
];

/// French AZERTY differences from QWERTY
const AZERTY: &[(Key, char, char)] = &[
    (Key::KEY_Q, 'a', 'A'), (Key::KEY_A, 'q', 'Q'), (Key::KEY_W, 'z', 'Z'), (Key::KEY_Z, 'w', 'W'),
    (Key::KEY_SEMICOLON, 'm', 'M'),
    (Key::KEY_1, '&', '1'), (Key::KEY_2, 'é', '2'), (Key::KEY_3, '"', '3'), (Key::KEY_4, '\'', '4'),
    (Key::KEY_5, '(', '5'), (Key::KEY_6, '-', '6'), (Key::KEY_7, 'è', '7'), (Key::KEY_8, '_', '8'),
    (Key::KEY_9, 'ç', '9'), (Key::KEY_0, 'à', '0'),
    (Key::KEY_M, ',', '?'), (Key::KEY_COMMA, ';', '.'), (Key::KEY_DOT, ':', '/'), (Key::KEY_SLASH, '!', '§'),
];

/// German QWERTZ differences from QWERTY
const QWERTZ: &[(Key, char, char)] = &[
    (Key::KEY_Y, 'z', 'Z'), (Key::KEY_Z, 'y', 'Y'),
    (Key::KEY_SEMICOLON, 'ö', 'Ö'), (Key::KEY_APOSTROPHE, 'ä', 'Ä'), (Key::KEY_LEFTBRACE, 'ü', 'Ü'),
    (Key::KEY_MINUS, 'ß', '?'), (Key::KEY_SLASH, '-', '_'), (Key::KEY_COMMA, ',', ';'),
    (Key::KEY_DOT, '.', ':'),
];

/// Translates evdev key codes into typed characters for one layout
pub struct KeyMap {
    normal: HashMap<Key, char>,
    shifted: HashMap<Key, char>,
}

impl KeyMap {
    /// Unknown layout names fall back to QWERTY
    pub fn new(layout: &str) -> Self {
        let mut map = Self {
            normal: HashMap::new(),
            shifted: HashMap::new(),
        };
        map.apply(QWERTY);

        match layout.to_lowercase().as_str() {
            "azerty" => map.apply(AZERTY),
            "qwertz" => map.apply(QWERTZ),
            "qwerty" => {}
            other => log::warn!("Unknown keyboard layout '{}', using qwerty", other),
        }

        map
    }

    fn apply(&mut self, table: &[(Key, char, char)]) {
        for &(key, normal, shifted) in table {
            self.normal.insert(key, normal);
            self.shifted.insert(key, shifted);
        }
    }

    pub fn map_key(&self, key: Key, shift: bool, caps_lock: bool) -> Option<char> {
        let base = if shift {
            self.shifted.get(&key)
        } else {
            self.normal.get(&key)
        }
        .copied()?;

        // Caps lock flips the case of letters only
        if caps_lock && base.is_alphabetic() {
            let flipped = if base.is_uppercase() {
                base.to_lowercase().next()
            } else {
                base.to_uppercase().next()
            };
            return flipped.or(Some(base));
        }

        Some(base)
    }
}
