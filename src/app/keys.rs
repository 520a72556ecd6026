use crossterm::event::{Event, EventStream, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Input understood by the views, decoded from terminal events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Ctrl(char),
    Enter,
    Esc,
    Backspace,
    Tab,
    Up,
    Down,
    Left,
    Right,
    Home,
    End,
    PageUp,
    PageDown,
    F(u8),
    Resize,
}

impl Key {
    pub fn from_event(event: &Event) -> Option<Key> {
        match event {
            Event::Key(key) if key.kind != KeyEventKind::Release => Self::from_key_event(key),
            Event::Resize(_, _) => Some(Key::Resize),
            _ => None,
        }
    }

    fn from_key_event(key: &KeyEvent) -> Option<Key> {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
        let key = match key.code {
            KeyCode::Char(c) if ctrl => Key::Ctrl(c.to_ascii_lowercase()),
            KeyCode::Char(c) => Key::Char(c),
            KeyCode::Enter => Key::Enter,
            KeyCode::Esc => Key::Esc,
            KeyCode::Backspace => Key::Backspace,
            KeyCode::Tab => Key::Tab,
            KeyCode::Up => Key::Up,
            KeyCode::Down => Key::Down,
            KeyCode::Left => Key::Left,
            KeyCode::Right => Key::Right,
            KeyCode::Home => Key::Home,
            KeyCode::End => Key::End,
            KeyCode::PageUp => Key::PageUp,
            KeyCode::PageDown => Key::PageDown,
            KeyCode::F(n) => Key::F(n),
            _ => return None,
        };
        Some(key)
    }
}

/// Start the only reader of terminal events. Every view, nested or not,
/// borrows the returned receiver.
pub fn spawn_pump(token: CancellationToken) -> (mpsc::Receiver<Key>, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(64);
    let handle = tokio::spawn(async move {
        let mut events = EventStream::new();
        loop {
            let next = tokio::select! {
                _ = token.cancelled() => return,
                next = events.next() => next,
            };
            match next {
                Some(Ok(event)) => {
                    let Some(key) = Key::from_event(&event) else {
                        continue;
                    };
                    if tx.send(key).await.is_err() {
                        return;
                    }
                }
                Some(Err(e)) => {
                    tracing::error!(error = %e, "terminal event stream failed");
                    return;
                }
                None => return,
            }
        }
    });
    (rx, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> Event {
        Event::Key(KeyEvent::new(code, modifiers))
    }

    #[test]
    fn decodes_chords_and_named_keys() {
        assert_eq!(
            Key::from_event(&press(KeyCode::Char('d'), KeyModifiers::CONTROL)),
            Some(Key::Ctrl('d'))
        );
        assert_eq!(
            Key::from_event(&press(KeyCode::Char('G'), KeyModifiers::SHIFT)),
            Some(Key::Char('G'))
        );
        assert_eq!(Key::from_event(&press(KeyCode::F(3), KeyModifiers::NONE)), Some(Key::F(3)));
        assert_eq!(Key::from_event(&Event::Resize(80, 24)), Some(Key::Resize));
        assert_eq!(Key::from_event(&Event::FocusGained), None);
    }
}
