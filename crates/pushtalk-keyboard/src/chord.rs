//! Key chords and held-set tracking.

use std::collections::BTreeSet;
use std::str::FromStr;

use pushtalk_foundation::ConfigError;

use crate::keys::KeyToken;
use crate::queue::KeyboardEvent;

pub type ChordId = u32;

/// Unordered set of 1..=4 normalized key tokens.
///
/// A chord matches when it is a *subset* of the currently held keys, so
/// unrelated keys held at the same time do not break the match.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyChord {
    tokens: BTreeSet<KeyToken>,
}

pub const MAX_CHORD_KEYS: usize = 4;

impl KeyChord {
    pub fn new(tokens: impl IntoIterator<Item = KeyToken>) -> Result<Self, ConfigError> {
        let tokens: BTreeSet<KeyToken> = tokens.into_iter().collect();
        if tokens.is_empty() {
            return Err(ConfigError::InvalidChord {
                spec: String::new(),
                reason: "chord must contain at least one key".to_string(),
            });
        }
        if tokens.len() > MAX_CHORD_KEYS {
            return Err(ConfigError::InvalidChord {
                spec: Self::join(&tokens),
                reason: format!("chord may contain at most {} keys", MAX_CHORD_KEYS),
            });
        }
        Ok(Self { tokens })
    }

    pub fn single(token: KeyToken) -> Self {
        Self {
            tokens: BTreeSet::from([token]),
        }
    }

    pub fn tokens(&self) -> impl Iterator<Item = &KeyToken> {
        self.tokens.iter()
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn is_subset_of(&self, held: &BTreeSet<KeyToken>) -> bool {
        self.tokens.is_subset(held)
    }

    pub fn contains(&self, token: &KeyToken) -> bool {
        self.tokens.contains(token)
    }

    /// Canonical `+`-joined representation, e.g. `Ctrl+Space`.
    pub fn canonical(&self) -> String {
        Self::join(&self.tokens)
    }

    fn join(tokens: &BTreeSet<KeyToken>) -> String {
        tokens
            .iter()
            .map(|t| t.to_string())
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl FromStr for KeyChord {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err(ConfigError::InvalidChord {
                spec: s.to_string(),
                reason: "empty chord string".to_string(),
            });
        }
        let mut tokens = BTreeSet::new();
        for part in trimmed.split('+') {
            tokens.insert(KeyToken::parse(part)?);
        }
        if tokens.len() > MAX_CHORD_KEYS {
            return Err(ConfigError::InvalidChord {
                spec: s.to_string(),
                reason: format!("chord may contain at most {} keys", MAX_CHORD_KEYS),
            });
        }
        Ok(Self { tokens })
    }
}

impl std::fmt::Display for KeyChord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// Tracks the held-key set and derives chord edges from raw key events.
///
/// Match and release are edge-triggered: a chord that stays held emits
/// one `ChordMatch`, and one `ChordRelease` when it stops being a subset
/// of the held set. The cancel chord emits `CancelPressed` on its press
/// edge only.
pub struct ChordTracker {
    held: BTreeSet<KeyToken>,
    chords: Vec<(ChordId, KeyChord)>,
    cancel: Option<KeyChord>,
    matched: BTreeSet<ChordId>,
    cancel_down: bool,
}

impl ChordTracker {
    pub fn new() -> Self {
        Self {
            held: BTreeSet::new(),
            chords: Vec::new(),
            cancel: None,
            matched: BTreeSet::new(),
            cancel_down: false,
        }
    }

    pub fn register(&mut self, id: ChordId, chord: KeyChord) {
        self.chords.retain(|(existing, _)| *existing != id);
        self.chords.push((id, chord));
    }

    pub fn register_cancel(&mut self, chord: KeyChord) {
        self.cancel = Some(chord);
    }

    pub fn held(&self) -> &BTreeSet<KeyToken> {
        &self.held
    }

    /// Drop all held state, e.g. when the source stops while keys are
    /// physically down.
    pub fn clear_held(&mut self) {
        self.held.clear();
        self.matched.clear();
        self.cancel_down = false;
    }

    /// Apply one raw press/release and append the raw event plus any
    /// derived chord edges to `out`, in emission order.
    pub fn on_key(&mut self, token: KeyToken, pressed: bool, out: &mut Vec<KeyboardEvent>) {
        let changed = if pressed {
            out.push(KeyboardEvent::KeyDown(token));
            self.held.insert(token)
        } else {
            out.push(KeyboardEvent::KeyUp(token));
            self.held.remove(&token)
        };
        if !changed {
            // Key repeat or release of an untracked key; the held set is
            // unchanged so no chord edge can have occurred.
            return;
        }

        for (id, chord) in &self.chords {
            let now_matched = chord.is_subset_of(&self.held);
            let was_matched = self.matched.contains(id);
            if now_matched && !was_matched {
                self.matched.insert(*id);
                out.push(KeyboardEvent::ChordMatch(*id));
            } else if !now_matched && was_matched {
                self.matched.remove(id);
                out.push(KeyboardEvent::ChordRelease(*id));
            }
        }

        if let Some(cancel) = &self.cancel {
            let now_matched = cancel.is_subset_of(&self.held);
            if now_matched && !self.cancel_down {
                self.cancel_down = true;
                out.push(KeyboardEvent::CancelPressed);
            } else if !now_matched && self.cancel_down {
                self.cancel_down = false;
            }
        }
    }
}

impl Default for ChordTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chord(s: &str) -> KeyChord {
        s.parse().unwrap()
    }

    fn events_of(tracker: &mut ChordTracker, token: KeyToken, pressed: bool) -> Vec<KeyboardEvent> {
        let mut out = Vec::new();
        tracker.on_key(token, pressed, &mut out);
        out
    }

    #[test]
    fn parse_canonicalizes() {
        let c = chord("control+SPACE");
        assert_eq!(c.canonical(), "Ctrl+Space");
        assert_eq!(chord("ctrl+space"), c);
    }

    #[test]
    fn parse_rejects_bad_chords() {
        assert!("".parse::<KeyChord>().is_err());
        assert!("ctrl+".parse::<KeyChord>().is_err());
        assert!("ctrl+shift+alt+meta+space".parse::<KeyChord>().is_err());
        assert!("ctrl+nosuchkey".parse::<KeyChord>().is_err());
    }

    #[test]
    fn duplicate_tokens_collapse() {
        let c = chord("ctrl+CTRL+space");
        assert_eq!(c.len(), 2);
    }

    #[test]
    fn single_key_chord() {
        let c = chord("F13");
        assert_eq!(c.len(), 1);
        assert_eq!(c.canonical(), "F13");
    }

    #[test]
    fn match_is_edge_triggered() {
        let mut tracker = ChordTracker::new();
        tracker.register(0, chord("ctrl+space"));

        let ev = events_of(&mut tracker, KeyToken::Ctrl, true);
        assert_eq!(ev, vec![KeyboardEvent::KeyDown(KeyToken::Ctrl)]);

        let ev = events_of(&mut tracker, KeyToken::Space, true);
        assert_eq!(
            ev,
            vec![
                KeyboardEvent::KeyDown(KeyToken::Space),
                KeyboardEvent::ChordMatch(0)
            ]
        );

        // Key repeat while held: no re-emission.
        let ev = events_of(&mut tracker, KeyToken::Space, true);
        assert_eq!(ev, vec![KeyboardEvent::KeyDown(KeyToken::Space)]);

        let ev = events_of(&mut tracker, KeyToken::Space, false);
        assert_eq!(
            ev,
            vec![
                KeyboardEvent::KeyUp(KeyToken::Space),
                KeyboardEvent::ChordRelease(0)
            ]
        );
    }

    #[test]
    fn subset_matching_tolerates_extra_keys() {
        let mut tracker = ChordTracker::new();
        tracker.register(7, chord("down+right"));

        events_of(&mut tracker, KeyToken::Shift, true);
        events_of(&mut tracker, KeyToken::Down, true);
        let ev = events_of(&mut tracker, KeyToken::Right, true);
        assert!(ev.contains(&KeyboardEvent::ChordMatch(7)));

        // Releasing the unrelated key does not release the chord.
        let ev = events_of(&mut tracker, KeyToken::Shift, false);
        assert_eq!(ev, vec![KeyboardEvent::KeyUp(KeyToken::Shift)]);

        let ev = events_of(&mut tracker, KeyToken::Down, false);
        assert!(ev.contains(&KeyboardEvent::ChordRelease(7)));
    }

    #[test]
    fn cancel_fires_on_press_edge_only() {
        let mut tracker = ChordTracker::new();
        tracker.register_cancel(KeyChord::single(KeyToken::Esc));

        let ev = events_of(&mut tracker, KeyToken::Esc, true);
        assert!(ev.contains(&KeyboardEvent::CancelPressed));

        let ev = events_of(&mut tracker, KeyToken::Esc, false);
        assert_eq!(ev, vec![KeyboardEvent::KeyUp(KeyToken::Esc)]);

        // Pressing again fires again.
        let ev = events_of(&mut tracker, KeyToken::Esc, true);
        assert!(ev.contains(&KeyboardEvent::CancelPressed));
    }

    #[test]
    fn clear_held_drops_matches() {
        let mut tracker = ChordTracker::new();
        tracker.register(0, chord("ctrl+space"));
        events_of(&mut tracker, KeyToken::Ctrl, true);
        events_of(&mut tracker, KeyToken::Space, true);
        assert!(!tracker.held().is_empty());

        tracker.clear_held();
        assert!(tracker.held().is_empty());

        // A fresh press sequence matches again from scratch.
        events_of(&mut tracker, KeyToken::Ctrl, true);
        let ev = events_of(&mut tracker, KeyToken::Space, true);
        assert!(ev.contains(&KeyboardEvent::ChordMatch(0)));
    }
}
