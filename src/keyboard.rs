// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Keyboard event types.
//!
//! The semantic types come from the `keyboard-types` crate; this module
//! only adds the event struct delivered to window handlers.

pub use keyboard_types::{Code, KeyState, Location, Modifiers};

/// The meaning (mapped value) of a keypress.
pub type KbKey = keyboard_types::Key;

/// A keyboard event, broadly corresponding to the W3C UI Events spec.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct KeyEvent {
    /// Whether the key is pressed or released.
    pub state: KeyState,
    /// Logical key value.
    pub key: KbKey,
    /// Physical key position.
    pub code: Code,
    /// Location for keys with multiple instances on common keyboards.
    pub location: Location,
    /// Flags for pressed modifier keys.
    pub mods: Modifiers,
    /// True if the key is currently auto-repeated.
    pub repeat: bool,
    /// Events with this flag should be ignored in a text editor and be
    /// handled by the IME instead.
    pub is_composing: bool,
}
