//! Global keyboard hook via rdev.
//!
//! `rdev::listen` blocks its thread and offers no unhook, so the hook
//! thread is spawned once per backend and outlives `stop()`: stopping
//! swaps the shared sink slot to `None`, which silences the callback.
//! A later `start()` installs a fresh sink into the same hook.

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use pushtalk_foundation::KeyboardError;

use crate::backend::{EventSink, KeyboardBackend};
use crate::keys::KeyToken;

/// How long to wait for the hook thread to report an immediate failure
/// before assuming monitoring is up. `rdev::listen` never returns on
/// success, so absence of an error is the success signal.
const HOOK_STARTUP_GRACE: Duration = Duration::from_millis(300);

pub struct RdevBackend {
    sink_slot: Arc<Mutex<Option<EventSink>>>,
    hook_spawned: bool,
    err_rx: Option<Receiver<KeyboardError>>,
}

impl RdevBackend {
    pub fn new() -> Self {
        Self {
            sink_slot: Arc::new(Mutex::new(None)),
            hook_spawned: false,
            err_rx: None,
        }
    }

    fn spawn_hook(&mut self) -> Result<(), KeyboardError> {
        let sink_slot = Arc::clone(&self.sink_slot);
        let (err_tx, err_rx) = bounded::<KeyboardError>(1);

        std::thread::Builder::new()
            .name("keyboard-hook".to_string())
            .spawn(move || {
                let callback = move |event: rdev::Event| {
                    let (key, pressed) = match event.event_type {
                        rdev::EventType::KeyPress(key) => (key, true),
                        rdev::EventType::KeyRelease(key) => (key, false),
                        _ => return,
                    };
                    let Some(token) = map_key(key) else {
                        return;
                    };
                    if let Some(sink) = sink_slot.lock().as_ref() {
                        sink.accept(token, pressed);
                    }
                };

                if let Err(e) = rdev::listen(callback) {
                    tracing::error!(?e, "global keyboard hook exited");
                    let _ = err_tx.try_send(classify_listen_error(e));
                }
            })
            .map_err(|e| KeyboardError::Fatal(format!("failed to spawn hook thread: {}", e)))?;

        match err_rx.recv_timeout(HOOK_STARTUP_GRACE) {
            Ok(err) => Err(err),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                self.hook_spawned = true;
                // Kept for polling: a listen error after startup is a
                // fatal monitor exit the controller must learn about.
                self.err_rx = Some(err_rx);
                Ok(())
            }
        }
    }
}

impl Default for RdevBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyboardBackend for RdevBackend {
    fn start(&mut self, sink: EventSink) -> Result<(), KeyboardError> {
        if !self.hook_spawned {
            self.spawn_hook()?;
        }
        *self.sink_slot.lock() = Some(sink);
        tracing::info!("rdev keyboard backend attached");
        Ok(())
    }

    fn stop(&mut self) {
        if self.sink_slot.lock().take().is_some() {
            tracing::info!("rdev keyboard backend detached");
        }
    }

    fn take_error(&mut self) -> Option<KeyboardError> {
        self.err_rx.as_ref().and_then(|rx| rx.try_recv().ok())
    }

    fn name(&self) -> &'static str {
        "rdev"
    }
}

fn classify_listen_error(err: rdev::ListenError) -> KeyboardError {
    let msg = format!("{:?}", err);
    match err {
        rdev::ListenError::MissingDisplayError => KeyboardError::Unsupported(msg),
        rdev::ListenError::EventTapError | rdev::ListenError::LoopSourceError => {
            // macOS accessibility permission has not been granted.
            KeyboardError::PermissionDenied(msg)
        }
        _ => KeyboardError::Fatal(msg),
    }
}

/// Normalize rdev keys to the closed token alphabet. Unmapped keys
/// (lock keys, numpad, media keys) are ignored upstream.
pub fn map_key(key: rdev::Key) -> Option<KeyToken> {
    use rdev::Key::*;
    let token = match key {
        ControlLeft | ControlRight => KeyToken::Ctrl,
        ShiftLeft | ShiftRight => KeyToken::Shift,
        Alt | AltGr => KeyToken::Alt,
        MetaLeft | MetaRight => KeyToken::Meta,
        Escape => KeyToken::Esc,
        Space => KeyToken::Space,
        Return => KeyToken::Enter,
        Tab => KeyToken::Tab,
        Backspace => KeyToken::Backspace,
        Insert => KeyToken::Insert,
        Delete => KeyToken::Delete,
        Home => KeyToken::Home,
        End => KeyToken::End,
        PageUp => KeyToken::PageUp,
        PageDown => KeyToken::PageDown,
        UpArrow => KeyToken::Up,
        DownArrow => KeyToken::Down,
        LeftArrow => KeyToken::Left,
        RightArrow => KeyToken::Right,
        F1 => KeyToken::F(1),
        F2 => KeyToken::F(2),
        F3 => KeyToken::F(3),
        F4 => KeyToken::F(4),
        F5 => KeyToken::F(5),
        F6 => KeyToken::F(6),
        F7 => KeyToken::F(7),
        F8 => KeyToken::F(8),
        F9 => KeyToken::F(9),
        F10 => KeyToken::F(10),
        F11 => KeyToken::F(11),
        F12 => KeyToken::F(12),
        KeyA => KeyToken::Char('a'),
        KeyB => KeyToken::Char('b'),
        KeyC => KeyToken::Char('c'),
        KeyD => KeyToken::Char('d'),
        KeyE => KeyToken::Char('e'),
        KeyF => KeyToken::Char('f'),
        KeyG => KeyToken::Char('g'),
        KeyH => KeyToken::Char('h'),
        KeyI => KeyToken::Char('i'),
        KeyJ => KeyToken::Char('j'),
        KeyK => KeyToken::Char('k'),
        KeyL => KeyToken::Char('l'),
        KeyM => KeyToken::Char('m'),
        KeyN => KeyToken::Char('n'),
        KeyO => KeyToken::Char('o'),
        KeyP => KeyToken::Char('p'),
        KeyQ => KeyToken::Char('q'),
        KeyR => KeyToken::Char('r'),
        KeyS => KeyToken::Char('s'),
        KeyT => KeyToken::Char('t'),
        KeyU => KeyToken::Char('u'),
        KeyV => KeyToken::Char('v'),
        KeyW => KeyToken::Char('w'),
        KeyX => KeyToken::Char('x'),
        KeyY => KeyToken::Char('y'),
        KeyZ => KeyToken::Char('z'),
        Num0 => KeyToken::Char('0'),
        Num1 => KeyToken::Char('1'),
        Num2 => KeyToken::Char('2'),
        Num3 => KeyToken::Char('3'),
        Num4 => KeyToken::Char('4'),
        Num5 => KeyToken::Char('5'),
        Num6 => KeyToken::Char('6'),
        Num7 => KeyToken::Char('7'),
        Num8 => KeyToken::Char('8'),
        Num9 => KeyToken::Char('9'),
        Minus => KeyToken::Char('-'),
        Equal => KeyToken::Char('='),
        LeftBracket => KeyToken::Char('['),
        RightBracket => KeyToken::Char(']'),
        SemiColon => KeyToken::Char(';'),
        Quote => KeyToken::Char('\''),
        BackSlash => KeyToken::Char('\\'),
        Comma => KeyToken::Char(','),
        Dot => KeyToken::Char('.'),
        Slash => KeyToken::Char('/'),
        BackQuote => KeyToken::Char('`'),
        _ => return None,
    };
    Some(token)
}
