// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! X11 window creation and window management.

use std::cell::{Cell, RefCell};
use std::panic::Location;
use std::rc::{Rc, Weak};
use std::time::Instant;

use anyhow::{anyhow, Context, Error};
use x11rb::connection::Connection;
use x11rb::properties::WmSizeHints;
use x11rb::protocol::xproto::{
    self, AtomEnum, ChangeWindowAttributesAux, ConfigureWindowAux, ConnectionExt, EventMask,
    PropMode, StackMode, WindowClass,
};
// For change_property8/change_property32.
use x11rb::wrapper::ConnectionExt as _;

use crate::draw::DrawCtx;
use crate::keyboard::{KbKey, KeyEvent, KeyState, Modifiers};
use crate::kurbo::{Point, Rect, Size, Vec2};
use crate::mouse::{ClickCounter, MouseButton, MouseButtons, MouseEvent, MultiClickConfig};
use crate::region::Region;
use crate::scale::{Scalable, Scale};
use crate::window::{WinHandler, WindowLevel};

use super::application::Application;
use super::draw::X11Surface;

macro_rules! borrow_mut {
    ($val:expr) => {{
        use anyhow::Context;
        $val.try_borrow_mut()
            .with_context(|| format!("[{}:{}] {}", file!(), line!(), stringify!($val)))
    }};
}

fn size_hints(
    resizable: bool,
    size: Size,
    min_size: Size,
    increments: Option<Size>,
) -> WmSizeHints {
    let mut size_hints = WmSizeHints::new();
    if resizable {
        size_hints.min_size = Some((min_size.width as i32, min_size.height as i32));
    } else {
        size_hints.min_size = Some((size.width as i32, size.height as i32));
        size_hints.max_size = Some((size.width as i32, size.height as i32));
    }
    if let Some(inc) = increments {
        size_hints.size_increment = Some((inc.width as i32, inc.height as i32));
    }
    size_hints
}

/// The pixel footprint of a user-space window size; zero or negative
/// dimensions are corrected to one device pixel, never rejected.
fn size_px(size: Size, scale: Scale) -> Size {
    let px = size.to_px(scale);
    Size::new(px.width.max(1.0), px.height.max(1.0))
}

pub struct WindowBuilder {
    app: Application,
    handler: Option<Box<dyn WinHandler>>,
    title: String,
    position: Option<Point>,
    size: Size,
    min_size: Size,
    resize_increments: Option<Size>,
    resizable: bool,
    level: WindowLevel,
}

impl WindowBuilder {
    pub fn new(app: Application) -> WindowBuilder {
        WindowBuilder {
            app,
            handler: None,
            title: String::new(),
            position: None,
            size: Size::new(500.0, 400.0),
            min_size: Size::new(0.0, 0.0),
            resize_increments: None,
            resizable: true,
            level: WindowLevel::AppWindow,
        }
    }

    pub fn set_handler(&mut self, handler: Box<dyn WinHandler>) {
        self.handler = Some(handler);
    }

    pub fn set_size(&mut self, size: Size) {
        // zero sized window results in server error
        self.size = if size.width == 0. || size.height == 0. {
            Size::new(1., 1.)
        } else {
            size
        };
    }

    pub fn set_min_size(&mut self, min_size: Size) {
        self.min_size = min_size;
    }

    pub fn set_resize_increments(&mut self, increments: Size) {
        self.resize_increments = Some(increments);
    }

    pub fn resizable(&mut self, resizable: bool) {
        self.resizable = resizable;
    }

    pub fn set_position(&mut self, position: Point) {
        self.position = Some(position);
    }

    pub fn set_level(&mut self, level: WindowLevel) {
        self.level = level;
    }

    pub fn set_title<S: Into<String>>(&mut self, title: S) {
        self.title = title.into();
    }

    pub fn build(self) -> Result<WindowHandle, Error> {
        let conn = self.app.connection();
        let screen_num = self.app.screen_num();
        let id = conn.generate_id()?;
        let setup = conn.setup();

        let scale = self.app.scale();
        let size_px = size_px(self.size, scale);

        let screen = setup
            .roots
            .get(screen_num)
            .ok_or_else(|| anyhow!("Invalid screen num: {}", screen_num))?;
        let visual_type = self.app.root_visual_type();

        // A window the manager doesn't decorate or reposition still wants
        // pointer crossing and focus events; the mask is the same either
        // way.
        let cw_values = xproto::CreateWindowAux::new().event_mask(
            EventMask::EXPOSURE
                | EventMask::STRUCTURE_NOTIFY
                | EventMask::KEY_PRESS
                | EventMask::KEY_RELEASE
                | EventMask::BUTTON_PRESS
                | EventMask::BUTTON_RELEASE
                | EventMask::POINTER_MOTION
                | EventMask::ENTER_WINDOW
                | EventMask::LEAVE_WINDOW
                | EventMask::FOCUS_CHANGE,
        );

        // An unpositioned window is centered on the primary work area,
        // which spares us a round of window-manager placement guessing.
        let pos_px = match self.position {
            Some(pos) => pos.to_px(scale),
            None => {
                let work = self.app.screens().work_area(0).to_px(scale);
                Point::new(
                    work.x0 + (work.width() - size_px.width).max(0.0) / 2.0,
                    work.y0 + (work.height() - size_px.height).max(0.0) / 2.0,
                )
            }
        };

        let (width_px, height_px) = (size_px.width as u16, size_px.height as u16);
        conn.create_window(
            screen.root_depth,
            id,
            screen.root,
            pos_px.x as i16,
            pos_px.y as i16,
            width_px,
            height_px,
            0,
            WindowClass::INPUT_OUTPUT,
            visual_type.visual_id,
            &cw_values,
        )?
        .check()
        .map_err(super::error::Error::from)
        .context("create window")?;

        // Initialize some properties
        let atoms = self.app.atoms();
        conn.change_property32(
            PropMode::REPLACE,
            id,
            atoms._NET_WM_PID,
            AtomEnum::CARDINAL,
            &[std::process::id()],
        )?
        .check()
        .context("set _NET_WM_PID")?;

        if let Some(name) = std::env::args_os().next() {
            // ICCCM § 4.1.2.5:
            // The WM_CLASS property (of type STRING without control characters)
            // contains two consecutive null-terminated strings. These specify
            // the Instance and Class names:
            // - instance: the program's name
            // - class: the program's name with the first letter in upper case
            let path: &std::path::Path = name.as_ref();
            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .unwrap_or("");

            let mut wm_class = Vec::with_capacity(2 * (name.len() + 1));
            wm_class.extend(name.as_bytes());
            wm_class.push(0);
            if let Some(&first) = wm_class.first() {
                wm_class.push(first.to_ascii_uppercase());
                wm_class.extend(&name.as_bytes()[1..]);
            }
            wm_class.push(0);
            conn.change_property8(
                PropMode::REPLACE,
                id,
                AtomEnum::WM_CLASS,
                AtomEnum::STRING,
                &wm_class,
            )?;
        }

        // Replace the window's WM_PROTOCOLS with the following.
        let protocols = [atoms.WM_DELETE_WINDOW];
        conn.change_property32(
            PropMode::REPLACE,
            id,
            atoms.WM_PROTOCOLS,
            AtomEnum::ATOM,
            &protocols,
        )?
        .check()
        .context("set WM_PROTOCOLS")?;

        let min_size_px = self.min_size.to_px(scale);
        let increments_px = self.resize_increments.map(|inc| inc.to_px(scale));
        log_x11!(size_hints(self.resizable, size_px, min_size_px, increments_px)
            .set_normal_hints(conn.as_ref(), id)
            .context("set wm normal hints"));

        // window level
        {
            let window_type = match self.level {
                WindowLevel::AppWindow => atoms._NET_WM_WINDOW_TYPE_NORMAL,
                WindowLevel::Tooltip => atoms._NET_WM_WINDOW_TYPE_TOOLTIP,
                WindowLevel::Modal => atoms._NET_WM_WINDOW_TYPE_DIALOG,
                WindowLevel::DropDown => atoms._NET_WM_WINDOW_TYPE_DROPDOWN_MENU,
            };
            log_x11!(conn.change_property32(
                PropMode::REPLACE,
                id,
                atoms._NET_WM_WINDOW_TYPE,
                AtomEnum::ATOM,
                &[window_type],
            ));
            if !matches!(self.level, WindowLevel::AppWindow) {
                // Secondary windows belong to the window that was active
                // when they were created.
                if let Some(parent) = self.app.active_window() {
                    log_x11!(conn.change_property32(
                        PropMode::REPLACE,
                        id,
                        AtomEnum::WM_TRANSIENT_FOR,
                        AtomEnum::WINDOW,
                        &[parent],
                    ));
                }
            }
            // Modal dialogs stay managed and decorated; only the popup
            // levels bypass the window manager.
            if matches!(self.level, WindowLevel::DropDown | WindowLevel::Tooltip) {
                log_x11!(conn.change_window_attributes(
                    id,
                    &ChangeWindowAttributesAux::new().override_redirect(1),
                ));
            }
        }

        let surface = X11Surface::new(Rc::clone(conn), id, screen.root_depth)?;
        let draw = RefCell::new(DrawCtx::new(Box::new(surface), scale));

        let handler = RefCell::new(
            self.handler
                .ok_or_else(|| anyhow!("a window must have a handler"))?,
        );

        let window = Rc::new(Window {
            id,
            app: self.app.clone(),
            handler,
            draw,
            size_px: Cell::new(size_px),
            scale: Cell::new(scale),
            min_size: Cell::new(self.min_size),
            resize_increments: Cell::new(self.resize_increments),
            resizable: Cell::new(self.resizable),
            destroyed: Cell::new(false),
            invalid: RefCell::new(Region::EMPTY),
            click_counter: RefCell::new(ClickCounter::new(self.app.multi_click_config())),
            buttons: Cell::new(MouseButtons::new()),
            last_press_pos: Cell::new(Point::ZERO),
            dragged: Cell::new(false),
        });

        window.set_title(&self.title);

        let handle = WindowHandle::new(id, Rc::downgrade(&window));
        window.connect(handle.clone())?;

        self.app.add_window(id, window)?;

        Ok(handle)
    }
}

pub(crate) struct Window {
    id: u32,
    app: Application,
    handler: RefCell<Box<dyn WinHandler>>,
    /// The drawing context painting goes through; owns the X surface.
    draw: RefCell<DrawCtx>,
    size_px: Cell<Size>,
    scale: Cell<Scale>,
    /// Min size in user-space units; kept for re-sending size hints when
    /// the scale changes.
    min_size: Cell<Size>,
    resize_increments: Cell<Option<Size>>,
    resizable: Cell<bool>,
    /// We've told X11 to destroy this window, so don't do any more X
    /// requests with this window id.
    destroyed: Cell<bool>,
    /// The region that was invalidated since the last time we rendered,
    /// in user-space units.
    invalid: RefCell<Region>,
    click_counter: RefCell<ClickCounter>,
    buttons: Cell<MouseButtons>,
    last_press_pos: Cell<Point>,
    dragged: Cell<bool>,
}

impl Window {
    #[track_caller]
    fn with_handler<T, F: FnOnce(&mut dyn WinHandler) -> T>(&self, f: F) -> Option<T> {
        if self.draw.try_borrow_mut().is_err() || self.invalid.try_borrow_mut().is_err() {
            tracing::error!("other RefCells were borrowed when calling into the handler");
            return None;
        }
        match self.handler.try_borrow_mut() {
            Ok(mut h) => Some(f(&mut **h)),
            Err(_) => {
                tracing::error!("failed to borrow WinHandler at {}", Location::caller());
                None
            }
        }
    }

    fn connect(&self, handle: WindowHandle) -> Result<(), Error> {
        let size = self.size_px.get().to_dp(self.scale.get());
        let scale = self.scale.get();
        let handle = crate::window::WindowHandle::from(handle);
        self.with_handler(|h| {
            h.connect(&handle);
            h.scale(scale);
            h.size(size);
        });
        Ok(())
    }

    /// Start the destruction of the window.
    pub fn destroy(&self) {
        if !self.destroyed() {
            self.destroyed.set(true);
            log_x11!(self.app.connection().destroy_window(self.id));
        }
    }

    fn destroyed(&self) -> bool {
        self.destroyed.get()
    }

    #[inline]
    pub(crate) fn scale(&self) -> Scale {
        self.scale.get()
    }

    fn add_invalid_rect(&self, rect: Rect) -> Result<(), Error> {
        borrow_mut!(self.invalid)?.add_rect(rect);
        Ok(())
    }

    pub(crate) fn invalidate(&self) {
        let rect = self.size_px.get().to_dp(self.scale.get()).to_rect();
        if let Err(e) = self.add_invalid_rect(rect) {
            tracing::error!("invalidate: {e:#}");
        }
    }

    fn invalidate_rect(&self, rect: Rect) {
        if let Err(e) = self.add_invalid_rect(rect) {
            tracing::error!("invalidate_rect: {e:#}");
        }
    }

    pub(crate) fn needs_paint(&self) -> bool {
        self.invalid
            .try_borrow()
            .map(|i| !i.is_empty())
            .unwrap_or(false)
    }

    /// Runs the handler's paint over the accumulated invalid region.
    pub(crate) fn render(&self) -> Result<(), Error> {
        if self.destroyed() {
            return Ok(());
        }
        let invalid = std::mem::replace(&mut *borrow_mut!(self.invalid)?, Region::EMPTY);
        if invalid.is_empty() {
            return Ok(());
        }
        let mut draw = borrow_mut!(self.draw)?;
        draw.reset_clip(Some(invalid.clone()));
        match self.handler.try_borrow_mut() {
            Ok(mut h) => h.paint(&mut draw, &invalid),
            Err(_) => {
                tracing::error!("failed to borrow WinHandler for paint");
            }
        }
        draw.reset_clip(None);
        Ok(())
    }

    fn show(&self) {
        log_x11!(self.app.connection().map_window(self.id));
    }

    fn close(&self) {
        self.destroy();
    }

    /// Set whether the window should be resizable
    fn resizable(&self, resizable: bool) {
        self.resizable.set(resizable);
        self.apply_size_hints();
    }

    fn apply_size_hints(&self) {
        let scale = self.scale.get();
        log_x11!(size_hints(
            self.resizable.get(),
            self.size_px.get(),
            self.min_size.get().to_px(scale),
            self.resize_increments.get().map(|inc| inc.to_px(scale)),
        )
        .set_normal_hints(self.app.connection().as_ref(), self.id)
        .context("set wm normal hints"));
    }

    fn get_position(&self) -> Point {
        fn _get_position(window: &Window) -> Result<Point, Error> {
            let conn = window.app.connection();
            let scale = window.scale.get();
            let geom = conn.get_geometry(window.id)?.reply()?;
            let cord = conn
                .translate_coordinates(window.id, geom.root, 0, 0)?
                .reply()?;
            Ok(Point::new(cord.dst_x as f64, cord.dst_y as f64).to_dp(scale))
        }
        let position = _get_position(self);
        log_x11!(&position);
        position.unwrap_or_default()
    }

    fn set_position(&self, pos: Point) {
        let pos = pos.to_px(self.scale.get());
        log_x11!(self.app.connection().configure_window(
            self.id,
            &ConfigureWindowAux::new().x(pos.x as i32).y(pos.y as i32),
        ));
    }

    fn set_size(&self, size: Size) {
        let size = size_px(size, self.scale.get());
        log_x11!(self.app.connection().configure_window(
            self.id,
            &ConfigureWindowAux::new()
                .width(size.width as u32)
                .height(size.height as u32),
        ));
    }

    fn get_size(&self) -> Size {
        self.size_px.get().to_dp(self.scale.get())
    }

    fn bring_to_front_and_focus(&self) {
        let conn = self.app.connection();
        log_x11!(conn.configure_window(
            self.id,
            &ConfigureWindowAux::new().stack_mode(StackMode::ABOVE),
        ));
        log_x11!(conn.set_input_focus(
            xproto::InputFocus::POINTER_ROOT,
            self.id,
            xproto::Time::CURRENT_TIME,
        ));
    }

    fn set_title(&self, title: &str) {
        let conn = self.app.connection();
        let atoms = self.app.atoms();
        // _NET_WM_NAME is the modern (UTF-8) name; WM_NAME the ICCCM one.
        log_x11!(conn.change_property8(
            PropMode::REPLACE,
            self.id,
            atoms._NET_WM_NAME,
            atoms.UTF8_STRING,
            title.as_bytes(),
        ));
        log_x11!(conn.change_property8(
            PropMode::REPLACE,
            self.id,
            AtomEnum::WM_NAME,
            AtomEnum::STRING,
            title.as_bytes(),
        ));
    }

    // note: size is in px
    fn size_changed(&self, size: Size) -> Result<(), Error> {
        let scale = self.scale.get();
        if size != self.size_px.get() {
            self.size_px.set(size);
            self.add_invalid_rect(size.to_dp(scale).to_rect())?;
            self.with_handler(|h| h.size(size.to_dp(scale)));
        }
        Ok(())
    }

    /// Applies a new scale factor, keeping the user-space size of the
    /// window fixed by resizing its pixel footprint.
    pub(crate) fn rescale(&self, scale: Scale) {
        let old = self.scale.get();
        if scale == old {
            return;
        }
        let size_dp = self.size_px.get().to_dp(old);
        self.scale.set(scale);
        if let Ok(mut draw) = self.draw.try_borrow_mut() {
            draw.set_scale(scale);
        }
        self.size_px.set(size_px(size_dp, scale));
        log_x11!(self.app.connection().configure_window(
            self.id,
            &ConfigureWindowAux::new()
                .width(self.size_px.get().width as u32)
                .height(self.size_px.get().height as u32),
        ));
        self.apply_size_hints();
        self.with_handler(|h| h.scale(scale));
        self.invalidate();
    }

    pub fn handle_expose(&self, expose: &xproto::ExposeEvent) -> Result<(), Error> {
        let rect = Rect::from_origin_size(
            (expose.x as f64, expose.y as f64),
            (expose.width as f64, expose.height as f64),
        )
        .to_dp(self.scale.get());

        self.add_invalid_rect(rect)?;
        // Expose events arrive in batches; `count` is the number still to
        // come, so only the last one triggers the paint.
        if expose.count == 0 {
            self.render()?;
        }
        Ok(())
    }

    pub fn handle_key_press(&self, event: &xproto::KeyPressEvent) {
        let key_event = self.key_event(event.detail, event.state, KeyState::Down);
        self.with_handler(|h| h.key_down(&key_event));
    }

    pub fn handle_key_release(&self, event: &xproto::KeyReleaseEvent) {
        let key_event = self.key_event(event.detail, event.state, KeyState::Up);
        self.with_handler(|h| h.key_up(&key_event));
    }

    fn key_event(&self, keycode: u8, state: u16, key_state: KeyState) -> KeyEvent {
        let mods = key_mods(state);
        let keysym = self.app.keysym(keycode, mods.contains(Modifiers::SHIFT));
        let key = super::util::keysym_to_key(keysym);
        let key = if mods.contains(Modifiers::CAPS_LOCK) {
            match key {
                KbKey::Character(c) => KbKey::Character(c.to_uppercase()),
                other => other,
            }
        } else {
            key
        };
        KeyEvent {
            state: key_state,
            key,
            mods,
            ..KeyEvent::default()
        }
    }

    pub fn handle_button_press(
        &self,
        button_press: &xproto::ButtonPressEvent,
    ) -> Result<(), Error> {
        let button = mouse_button(button_press.detail);
        let scale = self.scale.get();
        let pos =
            Point::new(button_press.event_x as f64, button_press.event_y as f64).to_dp(scale);
        let count = borrow_mut!(self.click_counter)?.click(
            button,
            pos,
            Instant::now(),
            self.dragged.replace(false),
        );
        self.last_press_pos.set(pos);
        // The xcb state field doesn't include the newly pressed button,
        // but handlers want it to be included.
        let buttons = mouse_buttons(button_press.state).with(button);
        self.buttons.set(buttons);
        let mouse_event = MouseEvent {
            pos,
            buttons,
            mods: key_mods(button_press.state),
            count,
            button,
            wheel_delta: Vec2::ZERO,
        };
        self.with_handler(|h| h.mouse_down(&mouse_event));
        Ok(())
    }

    pub fn handle_button_release(
        &self,
        button_release: &xproto::ButtonReleaseEvent,
    ) -> Result<(), Error> {
        let scale = self.scale.get();
        let button = mouse_button(button_release.detail);
        // The xcb state includes the newly released button, but handlers
        // don't want it.
        let buttons = mouse_buttons(button_release.state).without(button);
        self.buttons.set(buttons);
        let mouse_event = MouseEvent {
            pos: Point::new(button_release.event_x as f64, button_release.event_y as f64)
                .to_dp(scale),
            buttons,
            mods: key_mods(button_release.state),
            count: 0,
            button,
            wheel_delta: Vec2::ZERO,
        };
        self.with_handler(|h| h.mouse_up(&mouse_event));
        Ok(())
    }

    pub fn handle_wheel(&self, event: &xproto::ButtonPressEvent) -> Result<(), Error> {
        let button = event.detail;
        let mods = key_mods(event.state);
        let scale = self.scale.get();

        // X doesn't have dedicated scroll events: buttons 4/5 are vertical
        // and 6/7 horizontal, one line per tick. Shift turns a vertical
        // tick into a horizontal one.
        let is_shift = mods.contains(Modifiers::SHIFT);
        let delta = match button {
            4 if is_shift => (-1.0, 0.0),
            4 => (0.0, -1.0),
            5 if is_shift => (1.0, 0.0),
            5 => (0.0, 1.0),
            6 => (-1.0, 0.0),
            7 => (1.0, 0.0),
            _ => return Err(anyhow!("unexpected mouse wheel button: {}", button)),
        };
        let mouse_event = MouseEvent {
            pos: Point::new(event.event_x as f64, event.event_y as f64).to_dp(scale),
            buttons: mouse_buttons(event.state),
            mods,
            count: 0,
            button: MouseButton::None,
            wheel_delta: delta.into(),
        };

        self.with_handler(|h| h.wheel(&mouse_event));
        Ok(())
    }

    pub fn handle_motion_notify(
        &self,
        motion_notify: &xproto::MotionNotifyEvent,
    ) -> Result<(), Error> {
        let scale = self.scale.get();
        let pos =
            Point::new(motion_notify.event_x as f64, motion_notify.event_y as f64).to_dp(scale);
        let buttons = mouse_buttons(motion_notify.state);
        self.buttons.set(buttons);
        if !buttons.is_empty() {
            // A drag breaks any multi-click chain in progress.
            let tolerance = self
                .click_counter
                .try_borrow()
                .map(|c| c.config().tolerance)
                .unwrap_or_else(|_| MultiClickConfig::default().tolerance);
            let press = self.last_press_pos.get();
            if (pos - press).hypot() > tolerance {
                self.dragged.set(true);
            }
        }
        let mouse_event = MouseEvent {
            pos,
            buttons,
            mods: key_mods(motion_notify.state),
            count: 0,
            button: MouseButton::None,
            wheel_delta: Vec2::ZERO,
        };
        self.with_handler(|h| h.mouse_move(&mouse_event));
        Ok(())
    }

    pub fn handle_enter_notify(&self, event: &xproto::EnterNotifyEvent) {
        let scale = self.scale.get();
        let mouse_event = MouseEvent {
            pos: Point::new(event.event_x as f64, event.event_y as f64).to_dp(scale),
            buttons: mouse_buttons(event.state),
            mods: key_mods(event.state),
            count: 0,
            button: MouseButton::None,
            wheel_delta: Vec2::ZERO,
        };
        self.with_handler(|h| h.mouse_enter(&mouse_event));
    }

    pub fn handle_leave_notify(&self) {
        if let Ok(mut counter) = self.click_counter.try_borrow_mut() {
            counter.reset();
        }
        self.with_handler(|h| h.mouse_leave());
    }

    pub fn handle_client_message(&self, client_message: &xproto::ClientMessageEvent) {
        // https://www.x.org/releases/X11R7.6/doc/xorg-docs/specs/ICCCM/icccm.html#window_deletion
        let atoms = self.app.atoms();
        if client_message.type_ == atoms.WM_PROTOCOLS && client_message.format == 32 {
            let protocol = client_message.data.as_data32()[0];
            if protocol == atoms.WM_DELETE_WINDOW {
                self.with_handler(|h| h.request_close());
            }
        }
    }

    pub fn handle_destroy_notify(&self, _destroy_notify: &xproto::DestroyNotifyEvent) {
        self.with_handler(|h| h.destroy());
    }

    pub fn handle_configure_notify(&self, event: &xproto::ConfigureNotifyEvent) -> Result<(), Error> {
        self.size_changed(Size::new(event.width as f64, event.height as f64))
    }

    pub fn handle_map_notify(&self) {
        self.with_handler(|h| h.shown());
    }

    pub fn handle_unmap_notify(&self) {
        self.with_handler(|h| h.hidden());
    }

    pub fn handle_got_focus(&self) {
        self.with_handler(|h| h.got_focus());
    }

    pub fn handle_lost_focus(&self) {
        self.buttons.set(MouseButtons::new());
        self.with_handler(|h| h.lost_focus());
    }
}

fn mouse_button(button: u8) -> MouseButton {
    match button {
        1 => MouseButton::Left,
        2 => MouseButton::Middle,
        3 => MouseButton::Right,
        // buttons 4 through 7 are for scrolling.
        4..=7 => MouseButton::None,
        8 => MouseButton::X1,
        9 => MouseButton::X2,
        _ => {
            tracing::warn!("unknown mouse button code {}", button);
            MouseButton::None
        }
    }
}

// Extracts the mouse buttons from, e.g., the `state` field of
// `xproto::ButtonPressEvent`
fn mouse_buttons(mods: u16) -> MouseButtons {
    let mut buttons = MouseButtons::new();
    let button_masks = &[
        (xproto::ButtonMask::M1, MouseButton::Left),
        (xproto::ButtonMask::M2, MouseButton::Middle),
        (xproto::ButtonMask::M3, MouseButton::Right),
        // M4/M5 do not work: they are for scroll events.
    ];
    for (mask, button) in button_masks {
        if mods & u16::from(*mask) != 0 {
            buttons.insert(*button);
        }
    }
    buttons
}

// Extracts the keyboard modifiers from, e.g., the `state` field of
// `xproto::ButtonPressEvent`
fn key_mods(mods: u16) -> Modifiers {
    let mut ret = Modifiers::default();
    let mut key_masks = [
        (xproto::ModMask::SHIFT, Modifiers::SHIFT),
        (xproto::ModMask::CONTROL, Modifiers::CONTROL),
        // X11's mod keys are configurable, but this seems like a
        // reasonable default for US keyboards, at least, where the
        // "windows" key seems to be MOD_MASK_4.
        (xproto::ModMask::M1, Modifiers::ALT),
        (xproto::ModMask::M2, Modifiers::NUM_LOCK),
        (xproto::ModMask::M4, Modifiers::META),
        (xproto::ModMask::LOCK, Modifiers::CAPS_LOCK),
    ];
    for (mask, modifiers) in &mut key_masks {
        if mods & u16::from(*mask) != 0 {
            ret |= *modifiers;
        }
    }
    ret
}

#[derive(Clone)]
pub struct WindowHandle {
    id: u32,
    window: Weak<Window>,
}

impl PartialEq for WindowHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for WindowHandle {}

impl WindowHandle {
    fn new(id: u32, window: Weak<Window>) -> WindowHandle {
        WindowHandle { id, window }
    }

    pub fn show(&self) {
        if let Some(w) = self.window.upgrade() {
            w.show();
        } else {
            tracing::error!("show of dropped window");
        }
    }

    pub fn close(&self) {
        if let Some(w) = self.window.upgrade() {
            w.close();
        } else {
            tracing::error!("close of dropped window");
        }
    }

    pub fn resizable(&self, resizable: bool) {
        if let Some(w) = self.window.upgrade() {
            w.resizable(resizable);
        } else {
            tracing::error!("resizable of dropped window");
        }
    }

    pub fn set_position(&self, position: Point) {
        if let Some(w) = self.window.upgrade() {
            w.set_position(position);
        } else {
            tracing::error!("set_position of dropped window");
        }
    }

    pub fn get_position(&self) -> Point {
        if let Some(w) = self.window.upgrade() {
            w.get_position()
        } else {
            tracing::error!("get_position of dropped window");
            Point::ZERO
        }
    }

    pub fn set_size(&self, size: Size) {
        if let Some(w) = self.window.upgrade() {
            w.set_size(size);
        } else {
            tracing::error!("set_size of dropped window");
        }
    }

    pub fn get_size(&self) -> Size {
        if let Some(w) = self.window.upgrade() {
            w.get_size()
        } else {
            tracing::error!("get_size of dropped window");
            Size::ZERO
        }
    }

    pub fn set_min_size(&self, min_size: Size) {
        if let Some(w) = self.window.upgrade() {
            w.min_size.set(min_size);
            w.apply_size_hints();
        }
    }

    pub fn set_resize_increments(&self, increments: Size) {
        if let Some(w) = self.window.upgrade() {
            w.resize_increments.set(Some(increments));
            w.apply_size_hints();
        }
    }

    pub fn bring_to_front_and_focus(&self) {
        if let Some(w) = self.window.upgrade() {
            w.bring_to_front_and_focus();
        }
    }

    /// Routes all pointer and keyboard input to this window until
    /// [`release_grab`](WindowHandle::release_grab).
    pub fn set_grab(&self) {
        if let Some(w) = self.window.upgrade() {
            log_x11!(w.app.grab(w.id));
        }
    }

    /// Releases an input grab; a no-op when this window holds none.
    pub fn release_grab(&self) {
        if let Some(w) = self.window.upgrade() {
            w.app.release_grab();
        }
    }

    pub fn invalidate(&self) {
        if let Some(w) = self.window.upgrade() {
            w.invalidate();
        }
    }

    pub fn invalidate_rect(&self, rect: Rect) {
        if let Some(w) = self.window.upgrade() {
            w.invalidate_rect(rect);
        }
    }

    pub fn set_title(&self, title: &str) {
        if let Some(w) = self.window.upgrade() {
            w.set_title(title);
        }
    }

    /// The resolution scale this window renders at.
    pub fn get_scale(&self) -> Scale {
        match self.window.upgrade() {
            Some(w) => w.scale(),
            None => Scale::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_sizes_still_occupy_a_pixel() {
        let scale = Scale::new(1.0);
        assert_eq!(size_px(Size::ZERO, scale), Size::new(1.0, 1.0));
        assert_eq!(size_px(Size::new(-10.0, 5.0), scale), Size::new(1.0, 5.0));
        // the clamp applies after scaling
        assert_eq!(
            size_px(Size::new(0.0, 100.0), Scale::new(2.0)),
            Size::new(1.0, 200.0)
        );
        assert_eq!(
            size_px(Size::new(400.0, 300.0), Scale::new(2.0)),
            Size::new(800.0, 600.0)
        );
    }

    #[test]
    fn fixed_size_windows_pin_min_and_max() {
        let hints = size_hints(false, Size::new(640.0, 480.0), Size::ZERO, None);
        assert_eq!(hints.min_size, Some((640, 480)));
        assert_eq!(hints.max_size, Some((640, 480)));
        assert_eq!(hints.size_increment, None);
    }

    #[test]
    fn resizable_windows_only_get_a_minimum() {
        let hints = size_hints(true, Size::new(640.0, 480.0), Size::new(100.0, 50.0), None);
        assert_eq!(hints.min_size, Some((100, 50)));
        assert_eq!(hints.max_size, None);
    }

    #[test]
    fn resize_increments_are_forwarded() {
        let hints = size_hints(
            true,
            Size::new(640.0, 480.0),
            Size::ZERO,
            Some(Size::new(8.0, 16.0)),
        );
        assert_eq!(hints.size_increment, Some((8, 16)));
    }
}
