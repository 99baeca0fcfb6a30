// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Platform-independent window types and the window-handler contract.

use std::any::Any;

use crate::application::Application;
use crate::backend::x11::window as backend;
use crate::draw::DrawCtx;
use crate::error::Error;
use crate::keyboard::KeyEvent;
use crate::kurbo::{Point, Rect, Size};
use crate::mouse::MouseEvent;
use crate::region::Region;
use crate::scale::Scale;

/// Levels in the window system - Z order.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum WindowLevel {
    /// A top level app window.
    AppWindow,
    /// A menu or drop down, shown without decorations and without asking
    /// the window manager to manage it.
    DropDown,
    /// A tooltip, likewise unmanaged.
    Tooltip,
    /// A modal dialog kept above its parent.
    Modal,
}

/// A handle that can enumerate and manipulate one platform window.
#[derive(Clone, PartialEq, Eq)]
pub struct WindowHandle(pub(crate) backend::WindowHandle);

impl WindowHandle {
    /// Make the window visible.
    pub fn show(&self) {
        self.0.show();
    }

    /// Close the window and destroy its native resources.
    pub fn close(&self) {
        self.0.close();
    }

    /// Set whether the window should be resizable.
    pub fn resizable(&self, resizable: bool) {
        self.0.resizable(resizable);
    }

    /// Sets the position of the window origin in user-space units,
    /// relative to the global display layout.
    pub fn set_position(&self, position: Point) {
        self.0.set_position(position);
    }

    /// The position of the window origin in user-space units.
    pub fn get_position(&self) -> Point {
        self.0.get_position()
    }

    /// Set the window's size in user-space units.
    pub fn set_size(&self, size: Size) {
        self.0.set_size(size);
    }

    /// The window's size in user-space units.
    pub fn get_size(&self) -> Size {
        self.0.get_size()
    }

    /// Sets the smallest size the user may resize the window to.
    pub fn set_min_size(&self, min_size: Size) {
        self.0.set_min_size(min_size);
    }

    /// Asks the window manager to resize the window in steps of
    /// `increments`.
    pub fn set_resize_increments(&self, increments: Size) {
        self.0.set_resize_increments(increments);
    }

    /// Raise the window to the top of the stacking order and focus it.
    pub fn bring_to_front_and_focus(&self) {
        self.0.bring_to_front_and_focus();
    }

    /// Routes all pointer and keyboard input to this window until
    /// [`release_grab`](WindowHandle::release_grab).
    pub fn set_grab(&self) {
        self.0.set_grab();
    }

    /// Releases an input grab; a no-op when this window holds none.
    pub fn release_grab(&self) {
        self.0.release_grab();
    }

    /// Request a repaint of the whole window.
    pub fn invalidate(&self) {
        self.0.invalidate();
    }

    /// Request a repaint of one user-space rectangle.
    pub fn invalidate_rect(&self, rect: Rect) {
        self.0.invalidate_rect(rect);
    }

    /// Set the window's title.
    pub fn set_title(&self, title: &str) {
        self.0.set_title(title);
    }

    /// The resolution scale this window renders at.
    pub fn get_scale(&self) -> Scale {
        self.0.get_scale()
    }
}

impl From<backend::WindowHandle> for WindowHandle {
    fn from(src: backend::WindowHandle) -> WindowHandle {
        WindowHandle(src)
    }
}

/// A builder type for creating new windows.
pub struct WindowBuilder(backend::WindowBuilder);

impl WindowBuilder {
    /// Create a new `WindowBuilder`.
    ///
    /// Takes the [`Application`] that this window is for.
    pub fn new(app: Application) -> WindowBuilder {
        WindowBuilder(backend::WindowBuilder::new(app.backend_app))
    }

    /// Set the [`WinHandler`] for this window. This is the client's
    /// handle to the windowing system's events.
    pub fn set_handler(&mut self, handler: Box<dyn WinHandler>) {
        self.0.set_handler(handler);
    }

    /// Set the window's initial size in user-space units.
    ///
    /// A zero or negative dimension is corrected to one device pixel, not
    /// rejected.
    pub fn set_size(&mut self, size: Size) {
        self.0.set_size(size);
    }

    /// Set the window's minimum size in user-space units.
    pub fn set_min_size(&mut self, size: Size) {
        self.0.set_min_size(size);
    }

    /// Ask the window manager to resize the window in steps of
    /// `increments`, e.g. one terminal cell at a time.
    pub fn set_resize_increments(&mut self, increments: Size) {
        self.0.set_resize_increments(increments);
    }

    /// Set whether the window should be resizable.
    pub fn resizable(&mut self, resizable: bool) {
        self.0.resizable(resizable);
    }

    /// Sets the initial window position in user-space units, relative to
    /// the global display layout. Unpositioned windows are centered on
    /// their screen's work area.
    pub fn set_position(&mut self, position: Point) {
        self.0.set_position(position);
    }

    /// Sets the window's level: its Z order and whether the window
    /// manager decorates and manages it.
    pub fn set_level(&mut self, level: WindowLevel) {
        self.0.set_level(level);
    }

    /// Set the window's initial title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.0.set_title(title);
    }

    /// Attempt to construct the platform window.
    ///
    /// If this fails, your application should exit.
    pub fn build(self) -> Result<WindowHandle, Error> {
        Ok(self.0.build()?.into())
    }
}

/// App behavior attached to one window.
///
/// Maps to the event delivery from the platform; most of the methods are
/// optional. The platform calls these on the event-loop thread, between
/// `connect` and `destroy`.
#[allow(unused_variables)]
pub trait WinHandler {
    /// Called when the window handle is available and the native window
    /// exists. Stash the handle if you need to invalidate or close later.
    fn connect(&mut self, handle: &WindowHandle);

    /// Called when the size of the window has changed, in user-space
    /// units.
    fn size(&mut self, size: Size) {}

    /// Called when the resolution scale of the window has changed.
    fn scale(&mut self, scale: Scale) {}

    /// Paint the invalid region of the window through `ctx`.
    ///
    /// The context arrives with its clip reset to `invalid` and its
    /// transform stack empty.
    fn paint(&mut self, ctx: &mut DrawCtx, invalid: &Region);

    /// Called on a mouse button press.
    fn mouse_down(&mut self, event: &MouseEvent) {}

    /// Called on a mouse button release.
    fn mouse_up(&mut self, event: &MouseEvent) {}

    /// Called when the mouse moves inside the window.
    fn mouse_move(&mut self, event: &MouseEvent) {}

    /// Called when the pointer enters the window.
    fn mouse_enter(&mut self, event: &MouseEvent) {}

    /// Called when the pointer leaves the window.
    fn mouse_leave(&mut self) {}

    /// Called on a scroll-wheel motion; the delta is in
    /// [`MouseEvent::wheel_delta`].
    fn wheel(&mut self, event: &MouseEvent) {}

    /// Called on a key press. Return `true` if the event was handled.
    fn key_down(&mut self, event: &KeyEvent) -> bool {
        false
    }

    /// Called on a key release.
    fn key_up(&mut self, event: &KeyEvent) {}

    /// Called when this window receives keyboard focus.
    fn got_focus(&mut self) {}

    /// Called when this window loses keyboard focus.
    fn lost_focus(&mut self) {}

    /// Called when the window becomes visible on screen.
    fn shown(&mut self) {}

    /// Called when the window is hidden or minimized.
    fn hidden(&mut self) {}

    /// Called when the user has requested to close the window, e.g. via
    /// the window manager's close button. The window is not closed until
    /// the handler calls [`WindowHandle::close`].
    fn request_close(&mut self) {}

    /// Called when the native window is being destroyed.
    fn destroy(&mut self) {}

    /// Get a reference to the handler state. Used mostly by the library
    /// consumer to downcast to its concrete handler type.
    fn as_any(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod test {
    use super::*;

    use static_assertions as sa;

    // Handles hold Rc/RefCell state and must stay on the event-loop thread.
    sa::assert_not_impl_any!(WindowHandle: Send, Sync);
    sa::assert_not_impl_any!(WindowBuilder: Send, Sync);
}
