//! ze - a terminal text editor

pub mod buffer;
pub mod buffers;
pub mod commands;
pub mod constants;
pub mod context;
pub mod editor;
pub mod encoding;
pub mod error;
pub mod grapheme;
pub mod histfile;
pub mod input;
pub mod key;
pub mod keymap;
pub mod language;
pub mod minibuffer;
pub mod regex;
pub mod search;
pub mod shell;
pub mod term;
pub mod view;
pub mod window;
