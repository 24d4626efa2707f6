use bugtriage::prelude::SortKey;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyAction {
    Quit,
    MoveDown,
    MoveUp,
    JumpFirst,
    JumpLast,
    NextPage,
    PrevPage,
    Sort(SortKey),
    StartFilter,
    Refresh,
    Export,
    Delete,
    Submit,
    InputChar(char),
    Backspace,
    CursorLeft,
    CursorRight,
    CursorStart,
    CursorEnd,
    KillToEnd,
    ToggleHelp,
    Dismiss,
    Noop,
}

pub fn map_key_with_input_mode(key: KeyEvent, input_mode_active: bool) -> KeyAction {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyAction::Quit;
    }
    if input_mode_active {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('a') {
            return KeyAction::CursorStart;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('e') {
            return KeyAction::CursorEnd;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('k') {
            return KeyAction::KillToEnd;
        }
        return match key.code {
            KeyCode::Enter => KeyAction::Submit,
            KeyCode::Esc => KeyAction::Dismiss,
            KeyCode::Backspace => KeyAction::Backspace,
            KeyCode::Left => KeyAction::CursorLeft,
            KeyCode::Right => KeyAction::CursorRight,
            KeyCode::Home => KeyAction::CursorStart,
            KeyCode::End => KeyAction::CursorEnd,
            KeyCode::Char(c) if !c.is_control() => KeyAction::InputChar(c),
            _ => KeyAction::Noop,
        };
    }
    match key.code {
        KeyCode::Char('q') => KeyAction::Quit,
        KeyCode::Char('/' | 'f') => KeyAction::StartFilter,
        KeyCode::Char('j') | KeyCode::Down => KeyAction::MoveDown,
        KeyCode::Char('k') | KeyCode::Up => KeyAction::MoveUp,
        KeyCode::Char('g') | KeyCode::Home => KeyAction::JumpFirst,
        KeyCode::Char('G') | KeyCode::End => KeyAction::JumpLast,
        KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => KeyAction::NextPage,
        KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => KeyAction::PrevPage,
        KeyCode::Char('1') => KeyAction::Sort(SortKey::Id),
        KeyCode::Char('2') => KeyAction::Sort(SortKey::Severity),
        KeyCode::Char('3') => KeyAction::Sort(SortKey::Component),
        KeyCode::Char('4') => KeyAction::Sort(SortKey::Status),
        KeyCode::Char('5') => KeyAction::Sort(SortKey::Summary),
        KeyCode::Char('r') => KeyAction::Refresh,
        KeyCode::Char('e') => KeyAction::Export,
        KeyCode::Char('D') => KeyAction::Delete,
        KeyCode::Char('?') => KeyAction::ToggleHelp,
        KeyCode::Enter => KeyAction::Submit,
        KeyCode::Esc => KeyAction::Dismiss,
        _ => KeyAction::Noop,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_mode_treats_letters_as_text() {
        for ch in ['q', 'j', 'n', 'D', '1'] {
            let key = KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE);
            assert_eq!(map_key_with_input_mode(key, true), KeyAction::InputChar(ch));
        }
    }

    #[test]
    fn digits_pick_sort_columns_in_table_order() {
        let keys: Vec<KeyAction> = ('1'..='5')
            .map(|ch| map_key_with_input_mode(KeyEvent::new(KeyCode::Char(ch), KeyModifiers::NONE), false))
            .collect();
        assert_eq!(
            keys,
            vec![
                KeyAction::Sort(SortKey::Id),
                KeyAction::Sort(SortKey::Severity),
                KeyAction::Sort(SortKey::Component),
                KeyAction::Sort(SortKey::Status),
                KeyAction::Sort(SortKey::Summary),
            ]
        );
    }

    #[test]
    fn ctrl_c_quits_in_both_modes() {
        let key = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(map_key_with_input_mode(key, false), KeyAction::Quit);
        assert_eq!(map_key_with_input_mode(key, true), KeyAction::Quit);
    }

    #[test]
    fn input_mode_ctrl_shortcuts_map_to_line_editing() {
        let a = KeyEvent::new(KeyCode::Char('a'), KeyModifiers::CONTROL);
        let e = KeyEvent::new(KeyCode::Char('e'), KeyModifiers::CONTROL);
        let k = KeyEvent::new(KeyCode::Char('k'), KeyModifiers::CONTROL);
        assert_eq!(map_key_with_input_mode(a, true), KeyAction::CursorStart);
        assert_eq!(map_key_with_input_mode(e, true), KeyAction::CursorEnd);
        assert_eq!(map_key_with_input_mode(k, true), KeyAction::KillToEnd);
    }

    #[test]
    fn lowercase_d_does_not_delete() {
        let d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::NONE);
        let shift_d = KeyEvent::new(KeyCode::Char('D'), KeyModifiers::SHIFT);
        assert_eq!(map_key_with_input_mode(d, false), KeyAction::Noop);
        assert_eq!(map_key_with_input_mode(shift_d, false), KeyAction::Delete);
    }
}
