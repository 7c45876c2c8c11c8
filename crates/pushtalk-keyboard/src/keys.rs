//! Closed key-token alphabet.
//!
//! OS backends normalize their native key identifiers into this enum
//! before anything else sees them; the rest of the pipeline never deals
//! in free-form key strings.

use pushtalk_foundation::ConfigError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum KeyToken {
    Ctrl,
    Shift,
    Alt,
    Meta,
    Esc,
    Space,
    Enter,
    Tab,
    Backspace,
    Insert,
    Delete,
    Home,
    End,
    PageUp,
    PageDown,
    Up,
    Down,
    Left,
    Right,
    /// Function keys F1..=F24.
    F(u8),
    /// Lowercased ASCII letter, digit, or punctuation.
    Char(char),
}

impl KeyToken {
    pub fn is_modifier(&self) -> bool {
        matches!(self, KeyToken::Ctrl | KeyToken::Shift | KeyToken::Alt | KeyToken::Meta)
    }

    /// Parse a single token, canonicalizing aliases. Letters are
    /// case-insensitive.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let lower = raw.trim().to_ascii_lowercase();

        let token = match lower.as_str() {
            "ctrl" | "control" | "ctl" | "control_l" | "control_r" => KeyToken::Ctrl,
            "shift" | "shift_l" | "shift_r" => KeyToken::Shift,
            "alt" | "option" | "alt_l" | "alt_r" => KeyToken::Alt,
            "meta" | "win" | "super" | "cmd" | "command" => KeyToken::Meta,
            "esc" | "escape" => KeyToken::Esc,
            "space" | "spacebar" => KeyToken::Space,
            "enter" | "return" => KeyToken::Enter,
            "tab" => KeyToken::Tab,
            "backspace" => KeyToken::Backspace,
            "insert" | "ins" => KeyToken::Insert,
            "delete" | "del" => KeyToken::Delete,
            "home" => KeyToken::Home,
            "end" => KeyToken::End,
            "pageup" | "page_up" | "pgup" => KeyToken::PageUp,
            "pagedown" | "page_down" | "pgdn" => KeyToken::PageDown,
            "up" => KeyToken::Up,
            "down" => KeyToken::Down,
            "left" => KeyToken::Left,
            "right" => KeyToken::Right,
            _ => return Self::parse_fallback(raw, &lower),
        };
        Ok(token)
    }

    fn parse_fallback(raw: &str, lower: &str) -> Result<Self, ConfigError> {
        // Function keys F1..=F24.
        if let Some(num) = lower.strip_prefix('f') {
            if let Ok(n) = num.parse::<u8>() {
                if (1..=24).contains(&n) {
                    return Ok(KeyToken::F(n));
                }
                return Err(ConfigError::InvalidChord {
                    spec: raw.to_string(),
                    reason: format!("function key F{} out of range (F1-F24)", n),
                });
            }
        }

        let mut chars = lower.chars();
        if let (Some(c), None) = (chars.next(), chars.next()) {
            if c.is_ascii_alphanumeric() || c.is_ascii_punctuation() {
                return Ok(KeyToken::Char(c));
            }
        }

        Err(ConfigError::InvalidChord {
            spec: raw.to_string(),
            reason: format!("unknown key token {:?}", raw),
        })
    }
}

impl std::fmt::Display for KeyToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyToken::Ctrl => write!(f, "Ctrl"),
            KeyToken::Shift => write!(f, "Shift"),
            KeyToken::Alt => write!(f, "Alt"),
            KeyToken::Meta => write!(f, "Meta"),
            KeyToken::Esc => write!(f, "Esc"),
            KeyToken::Space => write!(f, "Space"),
            KeyToken::Enter => write!(f, "Enter"),
            KeyToken::Tab => write!(f, "Tab"),
            KeyToken::Backspace => write!(f, "Backspace"),
            KeyToken::Insert => write!(f, "Insert"),
            KeyToken::Delete => write!(f, "Delete"),
            KeyToken::Home => write!(f, "Home"),
            KeyToken::End => write!(f, "End"),
            KeyToken::PageUp => write!(f, "PageUp"),
            KeyToken::PageDown => write!(f, "PageDown"),
            KeyToken::Up => write!(f, "Up"),
            KeyToken::Down => write!(f, "Down"),
            KeyToken::Left => write!(f, "Left"),
            KeyToken::Right => write!(f, "Right"),
            KeyToken::F(n) => write!(f, "F{}", n),
            KeyToken::Char(c) if c.is_ascii_alphabetic() => {
                write!(f, "{}", c.to_ascii_uppercase())
            }
            KeyToken::Char(c) => write!(f, "{}", c),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aliases_canonicalize() {
        assert_eq!(KeyToken::parse("control").unwrap(), KeyToken::Ctrl);
        assert_eq!(KeyToken::parse("Control_L").unwrap(), KeyToken::Ctrl);
        assert_eq!(KeyToken::parse("ESCAPE").unwrap(), KeyToken::Esc);
        assert_eq!(KeyToken::parse("win").unwrap(), KeyToken::Meta);
        assert_eq!(KeyToken::parse("cmd").unwrap(), KeyToken::Meta);
        assert_eq!(KeyToken::parse("return").unwrap(), KeyToken::Enter);
    }

    #[test]
    fn letters_are_case_insensitive() {
        assert_eq!(KeyToken::parse("a").unwrap(), KeyToken::Char('a'));
        assert_eq!(KeyToken::parse("A").unwrap(), KeyToken::Char('a'));
        assert_eq!(KeyToken::parse("7").unwrap(), KeyToken::Char('7'));
        assert_eq!(KeyToken::parse(".").unwrap(), KeyToken::Char('.'));
    }

    #[test]
    fn function_keys_up_to_24() {
        assert_eq!(KeyToken::parse("f1").unwrap(), KeyToken::F(1));
        assert_eq!(KeyToken::parse("F13").unwrap(), KeyToken::F(13));
        assert_eq!(KeyToken::parse("F24").unwrap(), KeyToken::F(24));
        assert!(KeyToken::parse("F25").is_err());
        assert!(KeyToken::parse("F0").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(KeyToken::parse("").is_err());
        assert!(KeyToken::parse("hyperkey").is_err());
        assert!(KeyToken::parse("é").is_err());
    }

    #[test]
    fn display_is_canonical() {
        assert_eq!(KeyToken::Ctrl.to_string(), "Ctrl");
        assert_eq!(KeyToken::Char('a').to_string(), "A");
        assert_eq!(KeyToken::F(13).to_string(), "F13");
        assert_eq!(KeyToken::Char('.').to_string(), ".");
    }

    #[test]
    fn modifiers_are_flagged() {
        assert!(KeyToken::Ctrl.is_modifier());
        assert!(KeyToken::Meta.is_modifier());
        assert!(!KeyToken::Space.is_modifier());
        assert!(!KeyToken::F(1).is_modifier());
    }
}
