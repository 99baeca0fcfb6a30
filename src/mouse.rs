// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Pointer event types and multi-click tracking.

use std::time::{Duration, Instant};

use crate::kurbo::{Point, Vec2};
use crate::Modifiers;

/// Information about the mouse event.
#[derive(Debug, Clone, PartialEq)]
pub struct MouseEvent {
    /// The location of the mouse in user-space window coordinates.
    pub pos: Point,
    /// Mouse buttons being held down during a move or after a click event.
    /// Thus it will contain the `button` that triggered a mouse-down event,
    /// and it will not contain the `button` that triggered a mouse-up event.
    pub buttons: MouseButtons,
    /// Keyboard modifiers at the time of the event.
    pub mods: Modifiers,
    /// Zero-based count of extra consecutive clicks: `0` for a single
    /// click, `1` for a double click, `2` for a triple click. This is `0`
    /// for a mouse-up event, whether or not it is the release of a
    /// multi-click.
    pub count: u8,
    /// The button that was pressed down in the case of mouse-down, or the
    /// button that was released in the case of mouse-up. This will always
    /// be `MouseButton::None` in the case of mouse-move.
    pub button: MouseButton,
    /// The wheel movement, in lines scrolled; positive y is away from the
    /// user. Zero except on wheel events.
    pub wheel_delta: Vec2,
}

/// An indicator of which mouse button was pressed.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Hash)]
#[repr(u8)]
pub enum MouseButton {
    /// No mouse button.
    None,
    /// Left mouse button.
    Left,
    /// Middle mouse button.
    Middle,
    /// Right mouse button.
    Right,
    /// First X button.
    X1,
    /// Second X button.
    X2,
}

impl MouseButton {
    /// Returns `true` if this is [`MouseButton::Left`].
    #[inline]
    pub fn is_left(self) -> bool {
        self == MouseButton::Left
    }

    /// Returns `true` if this is [`MouseButton::Right`].
    #[inline]
    pub fn is_right(self) -> bool {
        self == MouseButton::Right
    }

    /// Returns `true` if this is [`MouseButton::Middle`].
    #[inline]
    pub fn is_middle(self) -> bool {
        self == MouseButton::Middle
    }
}

/// A set of [`MouseButton`]s.
#[derive(PartialEq, Eq, Clone, Copy, Default)]
pub struct MouseButtons(u8);

impl MouseButtons {
    /// Create a new empty set.
    #[inline]
    pub fn new() -> MouseButtons {
        MouseButtons(0)
    }

    /// Add the `button` to the set.
    #[inline]
    pub fn insert(&mut self, button: MouseButton) {
        self.0 |= 1.min(button as u8) << button as u8;
    }

    /// Remove the `button` from the set.
    #[inline]
    pub fn remove(&mut self, button: MouseButton) {
        self.0 &= !(1.min(button as u8) << button as u8);
    }

    /// Builder-style method for adding the `button` to the set.
    #[inline]
    pub fn with(mut self, button: MouseButton) -> MouseButtons {
        self.insert(button);
        self
    }

    /// Builder-style method for removing the `button` from the set.
    #[inline]
    pub fn without(mut self, button: MouseButton) -> MouseButtons {
        self.remove(button);
        self
    }

    /// Returns `true` if the `button` is in the set.
    #[inline]
    pub fn contains(self, button: MouseButton) -> bool {
        (self.0 & (1.min(button as u8) << button as u8)) != 0
    }

    /// Returns `true` if the set is empty.
    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Returns `true` if all the `buttons` are in the set.
    #[inline]
    pub fn is_superset(self, buttons: MouseButtons) -> bool {
        self.0 & buttons.0 == buttons.0
    }

    /// Returns `true` if [`MouseButton::Left`] is in the set.
    #[inline]
    pub fn has_left(self) -> bool {
        self.contains(MouseButton::Left)
    }

    /// Returns `true` if [`MouseButton::Right`] is in the set.
    #[inline]
    pub fn has_right(self) -> bool {
        self.contains(MouseButton::Right)
    }

    /// Returns `true` if [`MouseButton::Middle`] is in the set.
    #[inline]
    pub fn has_middle(self) -> bool {
        self.contains(MouseButton::Middle)
    }

    /// Count the number of pressed buttons in the set.
    #[inline]
    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    /// Clear the set.
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

impl std::fmt::Debug for MouseButtons {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "MouseButtons({:05b})", self.0 >> 1)?;
        Ok(())
    }
}

/// Thresholds for recognizing consecutive presses as one multi-click.
///
/// These are policy, not platform facts, so they are plain data a caller
/// can override before creating windows.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MultiClickConfig {
    /// Presses further apart than this never chain.
    pub idle_interval: Duration,
    /// The much shorter window that applies when the pointer was dragged
    /// between the presses.
    pub drag_interval: Duration,
    /// Presses further apart than this on either axis never chain.
    pub tolerance: f64,
}

impl Default for MultiClickConfig {
    fn default() -> MultiClickConfig {
        MultiClickConfig {
            idle_interval: Duration::from_millis(1000),
            drag_interval: Duration::from_millis(200),
            tolerance: 3.0,
        }
    }
}

/// Turns a stream of button presses into zero-based multi-click counts.
///
/// The platform delivers plain presses; chaining them into double and
/// triple clicks is done here so every backend agrees on the rules. A
/// press chains onto the previous one when it is the same button, has
/// moved no further than the tolerance on *either* axis, and arrives
/// within [`MultiClickConfig::idle_interval`] — or within the tighter
/// [`MultiClickConfig::drag_interval`] when the pointer was dragged
/// between the presses.
#[derive(Debug)]
pub struct ClickCounter {
    config: MultiClickConfig,
    last_button: MouseButton,
    last_pos: Point,
    last_time: Option<Instant>,
    count: u8,
}

impl ClickCounter {
    pub fn new(config: MultiClickConfig) -> ClickCounter {
        ClickCounter {
            config,
            last_button: MouseButton::None,
            last_pos: Point::ZERO,
            last_time: None,
            count: 0,
        }
    }

    /// Feed one press; returns the click count for the resulting event:
    /// `0` single, `1` double, `2` triple, saturating thereafter.
    ///
    /// `dragged` reports whether the pointer was dragged since the last
    /// press; a drag shrinks the allowed interval to `drag_interval`.
    pub fn click(&mut self, button: MouseButton, pos: Point, now: Instant, dragged: bool) -> u8 {
        let interval = if dragged {
            self.config.drag_interval
        } else {
            self.config.idle_interval
        };
        let chains = button == self.last_button
            && (pos.x - self.last_pos.x).abs() <= self.config.tolerance
            && (pos.y - self.last_pos.y).abs() <= self.config.tolerance
            && self
                .last_time
                .is_some_and(|t| now.duration_since(t) <= interval);
        self.count = if chains {
            self.count.saturating_add(1)
        } else {
            0
        };
        self.last_button = button;
        self.last_pos = pos;
        self.last_time = Some(now);
        self.count
    }

    /// The thresholds this counter chains presses with.
    #[inline]
    pub fn config(&self) -> &MultiClickConfig {
        &self.config
    }

    /// Forget the chain, e.g. when the pointer leaves the window.
    pub fn reset(&mut self) {
        self.last_button = MouseButton::None;
        self.last_time = None;
        self.count = 0;
    }
}

impl Default for ClickCounter {
    fn default() -> ClickCounter {
        ClickCounter::new(MultiClickConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: u64) -> Instant {
        // A fixed epoch keeps the arithmetic deterministic.
        static EPOCH: once_cell::sync::Lazy<Instant> = once_cell::sync::Lazy::new(Instant::now);
        *EPOCH + Duration::from_millis(ms)
    }

    #[test]
    fn buttons_set_basics() {
        let mut buttons = MouseButtons::new();
        assert!(buttons.is_empty());
        buttons.insert(MouseButton::Left);
        buttons.insert(MouseButton::Right);
        assert!(buttons.has_left());
        assert!(buttons.has_right());
        assert!(!buttons.has_middle());
        assert_eq!(buttons.count(), 2);
        buttons.remove(MouseButton::Left);
        assert!(!buttons.has_left());
        // None is never a member.
        buttons.insert(MouseButton::None);
        assert!(!buttons.contains(MouseButton::None));
    }

    #[test]
    fn rapid_presses_chain_into_multi_clicks() {
        let mut counter = ClickCounter::default();
        let p = Point::new(40.0, 40.0);
        assert_eq!(counter.click(MouseButton::Left, p, at(0), false), 0);
        assert_eq!(counter.click(MouseButton::Left, p, at(150), false), 1);
        assert_eq!(counter.click(MouseButton::Left, p, at(300), false), 2);
    }

    #[test]
    fn slow_presses_do_not_chain() {
        let mut counter = ClickCounter::default();
        let p = Point::new(40.0, 40.0);
        assert_eq!(counter.click(MouseButton::Left, p, at(0), false), 0);
        assert_eq!(counter.click(MouseButton::Left, p, at(1200), false), 0);
    }

    #[test]
    fn movement_beyond_tolerance_breaks_the_chain() {
        let mut counter = ClickCounter::default();
        assert_eq!(
            counter.click(MouseButton::Left, Point::new(40.0, 40.0), at(0), false),
            0
        );
        // within the per-axis tolerance
        assert_eq!(
            counter.click(MouseButton::Left, Point::new(43.0, 38.0), at(100), false),
            1
        );
        // 4 px on the x axis is too far even though y did not move
        assert_eq!(
            counter.click(MouseButton::Left, Point::new(47.0, 38.0), at(200), false),
            0
        );
    }

    #[test]
    fn different_button_breaks_the_chain() {
        let mut counter = ClickCounter::default();
        let p = Point::new(10.0, 10.0);
        assert_eq!(counter.click(MouseButton::Left, p, at(0), false), 0);
        assert_eq!(counter.click(MouseButton::Right, p, at(100), false), 0);
        assert_eq!(counter.click(MouseButton::Right, p, at(200), false), 1);
    }

    #[test]
    fn dragging_shrinks_the_chain_window() {
        let mut counter = ClickCounter::default();
        let p = Point::new(10.0, 10.0);
        assert_eq!(counter.click(MouseButton::Left, p, at(0), false), 0);
        // 100 ms is inside even the drag window
        assert_eq!(counter.click(MouseButton::Left, p, at(100), true), 1);
        // 300 ms would chain when idle, but not after a drag
        assert_eq!(counter.click(MouseButton::Left, p, at(400), true), 0);
        assert_eq!(counter.click(MouseButton::Left, p, at(700), false), 1);
    }

    #[test]
    fn custom_thresholds_are_honored() {
        let mut counter = ClickCounter::new(MultiClickConfig {
            idle_interval: Duration::from_millis(50),
            drag_interval: Duration::from_millis(20),
            tolerance: 0.0,
        });
        let p = Point::new(0.0, 0.0);
        assert_eq!(counter.click(MouseButton::Left, p, at(0), false), 0);
        assert_eq!(counter.click(MouseButton::Left, p, at(40), false), 1);
        assert_eq!(counter.click(MouseButton::Left, p, at(120), false), 0);
    }

    #[test]
    fn counter_exposes_its_thresholds() {
        let config = MultiClickConfig {
            idle_interval: Duration::from_millis(500),
            drag_interval: Duration::from_millis(100),
            tolerance: 5.0,
        };
        let counter = ClickCounter::new(config);
        assert_eq!(*counter.config(), config);
        assert_eq!(
            ClickCounter::default().config().tolerance,
            MultiClickConfig::default().tolerance
        );
    }
}
