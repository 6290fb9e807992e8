//! Key-to-command dispatch tables
//!
//! A flat table maps keys to commands; a second table handles the `C-x`
//! prefix and a third the `C-x r` rectangle prefix. Unmapped printable
//! characters self-insert. Modal states (minibuffer, search, confirms)
//! bypass these tables entirely.

use std::collections::HashMap;

use crate::commands::Command;
use crate::key::Key;

/// Pending prefix key state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Prefix {
    #[default]
    None,
    CtrlX,
    CtrlXR,
}

/// Result of feeding one key to the keymap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lookup {
    Command(Command),
    /// Key started or extended a prefix; wait for more
    Pending(Prefix),
    /// No binding
    Unbound,
}

#[derive(Debug)]
pub struct KeyMap {
    global: HashMap<Key, Command>,
    ctrl_x: HashMap<Key, Command>,
    rectangle: HashMap<Key, Command>,
}

impl KeyMap {
    /// Feed a key with the current prefix state
    pub fn lookup(&self, prefix: Prefix, key: Key) -> Lookup {
        match prefix {
            Prefix::None => {
                if key == Key::Ctrl('x') {
                    return Lookup::Pending(Prefix::CtrlX);
                }
                if let Some(&cmd) = self.global.get(&key) {
                    return Lookup::Command(cmd);
                }
                if let Key::Char(c) = key {
                    return Lookup::Command(Command::SelfInsert(c));
                }
                Lookup::Unbound
            }
            Prefix::CtrlX => {
                if key == Key::Char('r') {
                    return Lookup::Pending(Prefix::CtrlXR);
                }
                match self.ctrl_x.get(&key) {
                    Some(&cmd) => Lookup::Command(cmd),
                    None => Lookup::Unbound,
                }
            }
            Prefix::CtrlXR => match self.rectangle.get(&key) {
                Some(&cmd) => Lookup::Command(cmd),
                None => Lookup::Unbound,
            },
        }
    }
}

impl Default for KeyMap {
    fn default() -> Self {
        let mut global = HashMap::new();
        let mut ctrl_x = HashMap::new();
        let mut rectangle = HashMap::new();

        // Character motion
        global.insert(Key::Ctrl('f'), Command::ForwardChar);
        global.insert(Key::Ctrl('b'), Command::BackwardChar);
        global.insert(Key::Ctrl('n'), Command::NextLine);
        global.insert(Key::Ctrl('p'), Command::PrevLine);
        global.insert(Key::ArrowRight, Command::ForwardChar);
        global.insert(Key::ArrowLeft, Command::BackwardChar);
        global.insert(Key::ArrowDown, Command::NextLine);
        global.insert(Key::ArrowUp, Command::PrevLine);

        // Word and line motion
        global.insert(Key::Alt('f'), Command::ForwardWord);
        global.insert(Key::Alt('b'), Command::BackwardWord);
        global.insert(Key::Ctrl('a'), Command::LineStart);
        global.insert(Key::Ctrl('e'), Command::LineEnd);
        global.insert(Key::Home, Command::LineStart);
        global.insert(Key::End, Command::LineEnd);
        global.insert(Key::Alt('<'), Command::BufferStart);
        global.insert(Key::Alt('>'), Command::BufferEnd);
        global.insert(Key::Alt('{'), Command::BackwardParagraph);
        global.insert(Key::Alt('}'), Command::ForwardParagraph);
        global.insert(Key::Ctrl('v'), Command::PageDown);
        global.insert(Key::Alt('v'), Command::PageUp);
        global.insert(Key::PageDown, Command::PageDown);
        global.insert(Key::PageUp, Command::PageUp);
        global.insert(Key::Ctrl('l'), Command::Recenter);
        global.insert(Key::Alt('g'), Command::GotoLine);

        // Shift-selection
        global.insert(Key::ShiftArrowRight, Command::SelectForwardChar);
        global.insert(Key::ShiftArrowLeft, Command::SelectBackwardChar);
        global.insert(Key::ShiftArrowDown, Command::SelectNextLine);
        global.insert(Key::ShiftArrowUp, Command::SelectPrevLine);
        global.insert(Key::ShiftAltArrowRight, Command::SelectForwardWord);
        global.insert(Key::ShiftAltArrowLeft, Command::SelectBackwardWord);
        global.insert(Key::ShiftPageDown, Command::SelectPageDown);
        global.insert(Key::ShiftPageUp, Command::SelectPageUp);

        // Line reordering
        global.insert(Key::AltArrowUp, Command::MoveLineUp);
        global.insert(Key::AltArrowDown, Command::MoveLineDown);

        // Editing
        global.insert(Key::Enter, Command::Newline);
        global.insert(Key::Ctrl('j'), Command::Newline);
        global.insert(Key::Tab, Command::Tab);
        global.insert(Key::ShiftTab, Command::UnindentRegion);
        global.insert(Key::Backspace, Command::DeleteBackward);
        global.insert(Key::Delete, Command::DeleteChar);
        global.insert(Key::Ctrl('d'), Command::DeleteChar);
        global.insert(Key::Alt('d'), Command::KillWordForward);
        global.insert(Key::AltDelete, Command::KillWordForward);
        global.insert(Key::AltBackspace, Command::KillWordBackward);
        global.insert(Key::Ctrl('k'), Command::KillLine);
        global.insert(Key::Ctrl('w'), Command::KillRegion);
        global.insert(Key::Alt('w'), Command::CopyRegion);
        global.insert(Key::Ctrl('y'), Command::Yank);
        global.insert(Key::Ctrl('/'), Command::Undo);
        global.insert(Key::Alt('j'), Command::JoinLine);
        global.insert(Key::Alt(';'), Command::ToggleComment);

        // Mark and cancel
        global.insert(Key::Ctrl('@'), Command::SetMark);
        global.insert(Key::Ctrl('g'), Command::KeyboardQuit);
        global.insert(Key::Escape, Command::KeyboardQuit);

        // Search and shell
        global.insert(Key::Ctrl('s'), Command::ISearchForward);
        global.insert(Key::Ctrl('r'), Command::ISearchBackward);
        global.insert(Key::Alt('%'), Command::QueryReplace);
        global.insert(Key::Alt('|'), Command::ShellCommand);

        // Wheel
        global.insert(Key::ScrollUp, Command::ScrollUp);
        global.insert(Key::ScrollDown, Command::ScrollDown);

        // C-x prefix
        ctrl_x.insert(Key::Ctrl('f'), Command::FindFile);
        ctrl_x.insert(Key::Ctrl('s'), Command::SaveBuffer);
        ctrl_x.insert(Key::Ctrl('w'), Command::SaveBufferAs);
        ctrl_x.insert(Key::Ctrl('c'), Command::Quit);
        ctrl_x.insert(Key::Char('k'), Command::KillBuffer);
        ctrl_x.insert(Key::Char('b'), Command::NextBuffer);
        ctrl_x.insert(Key::Char('2'), Command::SplitHorizontal);
        ctrl_x.insert(Key::Char('3'), Command::SplitVertical);
        ctrl_x.insert(Key::Char('0'), Command::CloseWindow);
        ctrl_x.insert(Key::Char('1'), Command::CloseOtherWindows);
        ctrl_x.insert(Key::Char('o'), Command::OtherWindow);
        ctrl_x.insert(Key::Char('l'), Command::SelectLanguage);
        ctrl_x.insert(Key::Char('u'), Command::Undo);
        ctrl_x.insert(Key::Ctrl('/'), Command::Redo);
        ctrl_x.insert(Key::Ctrl('d'), Command::DuplicateLine);
        ctrl_x.insert(Key::Char('('), Command::MacroStart);
        ctrl_x.insert(Key::Char(')'), Command::MacroEnd);
        ctrl_x.insert(Key::Char('e'), Command::MacroPlay);

        // C-x r rectangle prefix
        rectangle.insert(Key::Char('k'), Command::RectKill);
        rectangle.insert(Key::Char('w'), Command::RectCopy);
        rectangle.insert(Key::Char('y'), Command::RectYank);

        Self {
            global,
            ctrl_x,
            rectangle,
        }
    }
}
