// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Miscellaneous utility functions for working with X11.

use x11rb::protocol::xproto::{Screen, Visualtype};
use x11rb::resource_manager::Database as ResourceDb;

use crate::keyboard::KbKey;

// Apparently you have to get the visualtype this way :|
fn find_visual_from_screen(screen: &Screen, visual_id: u32) -> Option<Visualtype> {
    for depth in &screen.allowed_depths {
        for visual in &depth.visuals {
            if visual.visual_id == visual_id {
                return Some(*visual);
            }
        }
    }
    None
}

pub fn get_visual_from_screen(screen: &Screen) -> Option<Visualtype> {
    find_visual_from_screen(screen, screen.root_visual)
}

/// Reads `Xft.dpi` from the resource database, the conventional way X11
/// desktops communicate the font scaling the user configured.
pub fn xft_dpi(rdb: &ResourceDb) -> Option<f64> {
    match rdb.get_value::<f64>("Xft.dpi", "") {
        Ok(dpi) => dpi,
        Err(err) => {
            tracing::warn!("unable to parse Xft.dpi: {err:?}");
            None
        }
    }
}

/// Maps an X keysym to a logical key value.
///
/// Printable keysyms carry their character directly (with the 0x0100_0000
/// offset convention for Unicode keysyms); the rest is a table of the names
/// that matter for widget keyboard handling.
pub fn keysym_to_key(keysym: u32) -> KbKey {
    if let 0x20..=0x7e | 0xa0..=0xff = keysym {
        if let Some(c) = char::from_u32(keysym) {
            return KbKey::Character(c.to_string());
        }
    }
    if keysym & 0xff00_0000 == 0x0100_0000 {
        if let Some(c) = char::from_u32(keysym & 0x00ff_ffff) {
            return KbKey::Character(c.to_string());
        }
    }
    match keysym {
        0xff08 => KbKey::Backspace,
        0xff09 => KbKey::Tab,
        0xff0d | 0xff8d => KbKey::Enter,
        0xff13 => KbKey::Pause,
        0xff14 => KbKey::ScrollLock,
        0xff1b => KbKey::Escape,
        0xff50 => KbKey::Home,
        0xff51 => KbKey::ArrowLeft,
        0xff52 => KbKey::ArrowUp,
        0xff53 => KbKey::ArrowRight,
        0xff54 => KbKey::ArrowDown,
        0xff55 => KbKey::PageUp,
        0xff56 => KbKey::PageDown,
        0xff57 => KbKey::End,
        0xff61 => KbKey::PrintScreen,
        0xff63 => KbKey::Insert,
        0xff67 => KbKey::ContextMenu,
        0xff7f => KbKey::NumLock,
        0xffbe => KbKey::F1,
        0xffbf => KbKey::F2,
        0xffc0 => KbKey::F3,
        0xffc1 => KbKey::F4,
        0xffc2 => KbKey::F5,
        0xffc3 => KbKey::F6,
        0xffc4 => KbKey::F7,
        0xffc5 => KbKey::F8,
        0xffc6 => KbKey::F9,
        0xffc7 => KbKey::F10,
        0xffc8 => KbKey::F11,
        0xffc9 => KbKey::F12,
        0xffe1 | 0xffe2 => KbKey::Shift,
        0xffe3 | 0xffe4 => KbKey::Control,
        0xffe5 => KbKey::CapsLock,
        0xffe9 | 0xffea => KbKey::Alt,
        0xffeb | 0xffec => KbKey::Meta,
        0xffff => KbKey::Delete,
        _ => KbKey::Unidentified,
    }
}

macro_rules! log_x11 {
    ($val:expr) => {
        if let Err(e) = $val {
            // We probably don't want to include file/line numbers. This logging is done in
            // a context where X11 errors probably just mean that the connection to the X
            // server was lost. In particular, it doesn't represent a shell bug for which we
            // want more context.
            tracing::error!("X11 error: {}", e);
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keysym_mapping_covers_printable_and_named_keys() {
        assert_eq!(keysym_to_key(0x61), KbKey::Character("a".into()));
        assert_eq!(keysym_to_key(0x20), KbKey::Character(" ".into()));
        // Unicode keysym convention: 0x0100_0000 + code point
        assert_eq!(
            keysym_to_key(0x0100_0000 + 0x20ac),
            KbKey::Character("€".into())
        );
        assert_eq!(keysym_to_key(0xff1b), KbKey::Escape);
        assert_eq!(keysym_to_key(0xffbe), KbKey::F1);
        assert_eq!(keysym_to_key(0xffc9), KbKey::F12);
        assert_eq!(keysym_to_key(0x0), KbKey::Unidentified);
    }
}
