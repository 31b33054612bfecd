//! Key bindings: parsing the configured key strings and matching terminal
//! key events against them.
//!
//! Grammar: an optional run of `C-` (control) and `M-` (alt) prefixes
//! followed by a single character or a named key in angle brackets, e.g.
//! `C-c`, `M-r`, `q`, `<esc>`, `C-<f5>`.

use std::fmt;
use std::str::FromStr;

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyBinding {
    pub code: KeyCode,
    pub modifiers: KeyModifiers,
}

impl KeyBinding {
    pub fn new(code: KeyCode, modifiers: KeyModifiers) -> Self {
        Self { code, modifiers }
    }

    /// Shift is ignored for characters since it is already part of the
    /// character itself; letters compare case-insensitively under control.
    pub fn matches(&self, event: &KeyEvent) -> bool {
        if event.kind != KeyEventKind::Press {
            return false;
        }
        let (code, modifiers) = match event.code {
            KeyCode::Char(c) => {
                let c = if event.modifiers.contains(KeyModifiers::CONTROL) {
                    c.to_ascii_lowercase()
                } else {
                    c
                };
                (KeyCode::Char(c), event.modifiers.difference(KeyModifiers::SHIFT))
            }
            other => (other, event.modifiers),
        };
        code == self.code && modifiers == self.modifiers
    }
}

impl FromStr for KeyBinding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut rest = s;
        let mut modifiers = KeyModifiers::NONE;
        loop {
            if let Some(tail) = rest.strip_prefix("C-") {
                modifiers |= KeyModifiers::CONTROL;
                rest = tail;
            } else if let Some(tail) = rest.strip_prefix("M-") {
                modifiers |= KeyModifiers::ALT;
                rest = tail;
            } else {
                break;
            }
        }

        if rest.is_empty() {
            return Err("missing key".to_string());
        }

        let code = if let Some(name) = rest.strip_prefix('<').and_then(|r| r.strip_suffix('>')) {
            named_key(name).ok_or_else(|| format!("unknown key <{}>", name))?
        } else {
            let mut chars = rest.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if modifiers.contains(KeyModifiers::CONTROL) => {
                    KeyCode::Char(c.to_ascii_lowercase())
                }
                (Some(c), None) => KeyCode::Char(c),
                _ => return Err(format!("{:?} is not a single key", rest)),
            }
        };

        Ok(KeyBinding { code, modifiers })
    }
}

fn named_key(name: &str) -> Option<KeyCode> {
    let code = match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => KeyCode::Enter,
        "esc" | "escape" => KeyCode::Esc,
        "tab" => KeyCode::Tab,
        "space" => KeyCode::Char(' '),
        "backspace" => KeyCode::Backspace,
        "delete" => KeyCode::Delete,
        "up" => KeyCode::Up,
        "down" => KeyCode::Down,
        "left" => KeyCode::Left,
        "right" => KeyCode::Right,
        "home" => KeyCode::Home,
        "end" => KeyCode::End,
        "pageup" => KeyCode::PageUp,
        "pagedown" => KeyCode::PageDown,
        other => {
            let n: u8 = other.strip_prefix('f')?.parse().ok()?;
            return (1..=12).contains(&n).then_some(KeyCode::F(n));
        }
    };
    Some(code)
}

impl fmt::Display for KeyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifiers.contains(KeyModifiers::CONTROL) {
            f.write_str("C-")?;
        }
        if self.modifiers.contains(KeyModifiers::ALT) {
            f.write_str("M-")?;
        }
        match self.code {
            KeyCode::Char(' ') => f.write_str("<space>"),
            KeyCode::Char(c) => write!(f, "{}", c),
            KeyCode::F(n) => write!(f, "<f{}>", n),
            KeyCode::Enter => f.write_str("<enter>"),
            KeyCode::Esc => f.write_str("<esc>"),
            KeyCode::Tab => f.write_str("<tab>"),
            other => write!(f, "<{:?}>", other),
        }
    }
}

/// What a key press asks the dashboard to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quit,
    Reload,
}

/// The two bindings the dashboard listens to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyMap {
    pub quit: KeyBinding,
    pub reload: KeyBinding,
}

impl KeyMap {
    /// Quit wins when both bindings are the same key.
    pub fn action(&self, event: &KeyEvent) -> Option<Action> {
        if self.quit.matches(event) {
            Some(Action::Quit)
        } else if self.reload.matches(event) {
            Some(Action::Reload)
        } else {
            None
        }
    }
}
