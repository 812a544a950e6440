//! Windows virtual-key vocabulary: key names, hotkey modifiers, and the
//! extended-key classification used when synthesizing key-ups.
//!
//! VK codes are from the Windows SDK (winuser.h). `Modifiers` carries the
//! `RegisterHotKey` bit values (MOD_ALT = 1, MOD_CONTROL = 2, MOD_SHIFT = 4,
//! MOD_WIN = 8) so the mask can be handed to the OS unchanged.

use std::fmt;
use std::ops::BitOr;

use crate::platform::Keyboard;

pub const VK_BACK: u16 = 0x08;
pub const VK_TAB: u16 = 0x09;
pub const VK_RETURN: u16 = 0x0D;
pub const VK_SHIFT: u16 = 0x10;
pub const VK_CONTROL: u16 = 0x11;
pub const VK_MENU: u16 = 0x12;
pub const VK_PAUSE: u16 = 0x13;
pub const VK_ESCAPE: u16 = 0x1B;
pub const VK_SPACE: u16 = 0x20;
pub const VK_PRIOR: u16 = 0x21;
pub const VK_NEXT: u16 = 0x22;
pub const VK_END: u16 = 0x23;
pub const VK_HOME: u16 = 0x24;
pub const VK_LEFT: u16 = 0x25;
pub const VK_UP: u16 = 0x26;
pub const VK_RIGHT: u16 = 0x27;
pub const VK_DOWN: u16 = 0x28;
pub const VK_SNAPSHOT: u16 = 0x2C;
pub const VK_INSERT: u16 = 0x2D;
pub const VK_DELETE: u16 = 0x2E;
pub const VK_P: u16 = 0x50;
pub const VK_LWIN: u16 = 0x5B;
pub const VK_RWIN: u16 = 0x5C;
pub const VK_APPS: u16 = 0x5D;
pub const VK_DIVIDE: u16 = 0x6F;
pub const VK_F1: u16 = 0x70;
pub const VK_NUMLOCK: u16 = 0x90;
pub const VK_RCONTROL: u16 = 0xA3;
pub const VK_RMENU: u16 = 0xA5;

// ---------------------------------------------------------------------------
// Modifiers
// ---------------------------------------------------------------------------

/// Hotkey modifier mask using `RegisterHotKey`'s MOD_* bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers(u32);

impl Modifiers {
    pub const NONE: Modifiers = Modifiers(0);
    pub const ALT: Modifiers = Modifiers(0x1);
    pub const CONTROL: Modifiers = Modifiers(0x2);
    pub const SHIFT: Modifiers = Modifiers(0x4);
    pub const WIN: Modifiers = Modifiers(0x8);

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn contains(self, other: Modifiers) -> bool {
        self.0 & other.0 == other.0
    }

    /// Parses "Ctrl+Alt" style strings by substring, case-insensitively.
    /// Unrecognised words are ignored, so an empty string means no modifiers.
    pub fn parse(s: &str) -> Self {
        let low = s.to_ascii_lowercase();
        let mut mods = Modifiers::NONE;
        if low.contains("ctrl") {
            mods = mods | Modifiers::CONTROL;
        }
        if low.contains("alt") {
            mods = mods | Modifiers::ALT;
        }
        if low.contains("shift") {
            mods = mods | Modifiers::SHIFT;
        }
        if low.contains("win") {
            mods = mods | Modifiers::WIN;
        }
        mods
    }

    /// Modifiers currently held, read from live key state.
    pub fn from_live(keyboard: &dyn Keyboard) -> Self {
        let mut mods = Modifiers::NONE;
        if keyboard.is_key_down(VK_CONTROL) {
            mods = mods | Modifiers::CONTROL;
        }
        if keyboard.is_key_down(VK_MENU) {
            mods = mods | Modifiers::ALT;
        }
        if keyboard.is_key_down(VK_SHIFT) {
            mods = mods | Modifiers::SHIFT;
        }
        if keyboard.is_key_down(VK_LWIN) || keyboard.is_key_down(VK_RWIN) {
            mods = mods | Modifiers::WIN;
        }
        mods
    }
}

impl BitOr for Modifiers {
    type Output = Modifiers;

    fn bitor(self, rhs: Modifiers) -> Modifiers {
        Modifiers(self.0 | rhs.0)
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            (Modifiers::CONTROL, "Ctrl"),
            (Modifiers::ALT, "Alt"),
            (Modifiers::SHIFT, "Shift"),
            (Modifiers::WIN, "Win"),
        ];
        let mut first = true;
        for (flag, name) in names {
            if self.contains(flag) {
                if !first {
                    f.write_str("+")?;
                }
                f.write_str(name)?;
                first = false;
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Hotkey
// ---------------------------------------------------------------------------

/// The configured pause/resume hotkey.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hotkey {
    pub vk: u16,
    pub modifiers: Modifiers,
}

impl Hotkey {
    /// True when exactly the required modifiers are held. The key itself
    /// is compared by the caller, which reads live state only on a match.
    pub fn modifiers_match(&self, live: Modifiers) -> bool {
        live == self.modifiers
    }
}

impl Default for Hotkey {
    fn default() -> Self {
        Self {
            vk: VK_P,
            modifiers: Modifiers::CONTROL | Modifiers::ALT,
        }
    }
}

impl fmt::Display for Hotkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers != Modifiers::NONE {
            write!(f, "{} + ", self.modifiers)?;
        }
        match key_name(self.vk) {
            Some(name) => f.write_str(&name),
            None => write!(f, "VK {:#04x}", self.vk),
        }
    }
}

// ---------------------------------------------------------------------------
// Names
// ---------------------------------------------------------------------------

/// Converts a configuration key name to a virtual key code.
///
/// Case-insensitive. Returns `None` for names outside the vocabulary.
pub fn parse_key_name(name: &str) -> Option<u16> {
    let low = name.trim().to_ascii_lowercase();
    let vk = match low.as_str() {
        "space" => VK_SPACE,
        "enter" | "return" => VK_RETURN,
        "esc" | "escape" => VK_ESCAPE,
        "tab" => VK_TAB,
        "pause" => VK_PAUSE,
        "left" => VK_LEFT,
        "right" => VK_RIGHT,
        "up" => VK_UP,
        "down" => VK_DOWN,
        "home" => VK_HOME,
        "end" => VK_END,
        "insert" => VK_INSERT,
        "delete" => VK_DELETE,
        "pageup" => VK_PRIOR,
        "pagedown" => VK_NEXT,
        "backspace" => VK_BACK,
        _ => return parse_function_key(&low).or_else(|| parse_alphanumeric(&low)),
    };
    Some(vk)
}

/// "f1".."f24" -> VK_F1..VK_F24.
fn parse_function_key(low: &str) -> Option<u16> {
    let n: u16 = low.strip_prefix('f')?.parse().ok()?;
    (1..=24).contains(&n).then(|| VK_F1 + n - 1)
}

/// Single letters and digits map to their uppercase ASCII value.
fn parse_alphanumeric(low: &str) -> Option<u16> {
    let mut chars = low.chars();
    let c = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() {
        return None;
    }
    c.is_ascii_alphanumeric().then_some(c as u16)
}

/// Human-readable name for logging; inverse of `parse_key_name`.
pub fn key_name(vk: u16) -> Option<String> {
    let name = match vk {
        VK_SPACE => "Space",
        VK_RETURN => "Enter",
        VK_ESCAPE => "Esc",
        VK_TAB => "Tab",
        VK_PAUSE => "Pause",
        VK_LEFT => "Left",
        VK_RIGHT => "Right",
        VK_UP => "Up",
        VK_DOWN => "Down",
        VK_HOME => "Home",
        VK_END => "End",
        VK_INSERT => "Insert",
        VK_DELETE => "Delete",
        VK_PRIOR => "PageUp",
        VK_NEXT => "PageDown",
        VK_BACK => "Backspace",
        0x70..=0x87 => return Some(format!("F{}", vk - VK_F1 + 1)),
        0x30..=0x39 | 0x41..=0x5A => return Some(char::from(vk as u8).to_string()),
        _ => return None,
    };
    Some(name.to_string())
}

// ---------------------------------------------------------------------------
// Key classes
// ---------------------------------------------------------------------------

/// Keys that need `KEYEVENTF_EXTENDEDKEY` when synthesized by VK code alone.
pub fn is_extended(vk: u16) -> bool {
    matches!(
        vk,
        VK_PRIOR
            | VK_NEXT
            | VK_END
            | VK_HOME
            | VK_LEFT
            | VK_UP
            | VK_RIGHT
            | VK_DOWN
            | VK_SNAPSHOT
            | VK_INSERT
            | VK_DELETE
            | VK_LWIN
            | VK_RWIN
            | VK_APPS
            | VK_DIVIDE
            | VK_NUMLOCK
            | VK_RCONTROL
            | VK_RMENU
    )
}

/// VK_LBUTTON, VK_RBUTTON, VK_MBUTTON, VK_XBUTTON1, VK_XBUTTON2.
pub fn is_mouse_button(vk: u16) -> bool {
    matches!(vk, 0x01 | 0x02 | 0x04 | 0x05 | 0x06)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
