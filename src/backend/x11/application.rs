// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! X11 implementation of the connection and event-loop features.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, VecDeque};
use std::marker::PhantomData;
use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context as _, Error};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    ConnectionExt, CreateWindowAux, EventMask, Visualtype, WindowClass,
};
use x11rb::protocol::Event;
use x11rb::resource_manager::new_from_default as new_resource_db_from_default;
use x11rb::xcb_ffi::XCBConnection;

use crate::mouse::MultiClickConfig;
use crate::scale::Scale;
use crate::screen::Screens;
use crate::timer::TimerQueue;
use crate::watch::{FdInterest, FdSet};

use super::screen;
use super::util;
use super::window::Window;

x11rb::atom_manager! {
    pub(crate) AppAtoms: AppAtomsCookie {
        WM_PROTOCOLS,
        WM_DELETE_WINDOW,
        _NET_WM_PID,
        _NET_WM_NAME,
        UTF8_STRING,
        _NET_WM_WINDOW_TYPE,
        _NET_WM_WINDOW_TYPE_NORMAL,
        _NET_WM_WINDOW_TYPE_DROPDOWN_MENU,
        _NET_WM_WINDOW_TYPE_TOOLTIP,
        _NET_WM_WINDOW_TYPE_DIALOG,
    }
}

/// Hooks surrendering and re-taking an application-wide lock around the
/// blocking part of [`Application::wait`], so other threads can talk to the
/// toolkit while this one sleeps.
#[derive(Clone, Copy)]
pub struct LockHooks {
    pub lock: fn(),
    pub unlock: fn(),
}

/// The core keyboard mapping, refreshed on `MappingNotify`.
struct Keymap {
    min_keycode: u8,
    keysyms_per_keycode: u8,
    keysyms: Vec<u32>,
}

impl Keymap {
    fn fetch(conn: &XCBConnection) -> Result<Keymap, Error> {
        let setup = conn.setup();
        let (min, max) = (setup.min_keycode, setup.max_keycode);
        let reply = conn
            .get_keyboard_mapping(min, max - min + 1)?
            .reply()
            .context("get keyboard mapping")?;
        Ok(Keymap {
            min_keycode: min,
            keysyms_per_keycode: reply.keysyms_per_keycode,
            keysyms: reply.keysyms,
        })
    }

    fn keysym(&self, keycode: u8, shifted: bool) -> u32 {
        if keycode < self.min_keycode || self.keysyms_per_keycode == 0 {
            return 0;
        }
        let per = self.keysyms_per_keycode as usize;
        let base = (keycode - self.min_keycode) as usize * per;
        let column = usize::from(shifted && per > 1);
        let sym = self.keysyms.get(base + column).copied().unwrap_or(0);
        if sym == 0 && column == 1 {
            // Keys with a single entry per keycode repeat it for shift.
            self.keysyms.get(base).copied().unwrap_or(0)
        } else {
            sym
        }
    }
}

#[derive(Clone)]
pub(crate) struct Application {
    /// The connection to the X server.
    ///
    /// This connection is associated with a single display. The official
    /// docs say that init/connect can be called multiple times to connect
    /// to multiple displays, but we don't support that.
    connection: Rc<XCBConnection>,
    /// An `XCBConnection` is `Send` and `Sync`, but the event loop and all
    /// window state are strictly single-threaded, so give the application a
    /// raw pointer to make it `!Send` and `!Sync`.
    marker: PhantomData<*mut XCBConnection>,
    /// The default screen of the connected display.
    screen_num: usize,
    /// An invisible, input-only window used to wake up the event loop.
    event_window: u32,
    root_visual_type: Visualtype,
    atoms: Rc<AppAtoms>,
    /// Events read from the server but not yet delivered; `ready` peeks
    /// here without consuming.
    pending_events: Rc<RefCell<VecDeque<Event>>>,
    state: Rc<RefCell<State>>,
    timers: Rc<RefCell<TimerQueue>>,
    fds: Rc<RefCell<FdSet>>,
    screens: Rc<RefCell<Screens>>,
    keymap: Rc<RefCell<Keymap>>,
    lock_hooks: Rc<Cell<Option<LockHooks>>>,
}

/// The mutable state of the application.
struct State {
    /// Whether `quit` has been called.
    quitting: bool,
    /// A map from X window id to window.
    windows: HashMap<u32, Rc<Window>>,
    /// The window currently holding the pointer/keyboard grab, if any.
    grab: Option<u32>,
    /// The window that most recently had keyboard focus, if any.
    active_window: Option<u32>,
}

impl Application {
    pub fn new() -> Result<Application, Error> {
        let (conn, screen_num) = XCBConnection::connect(None)
            .map_err(|e| crate::Error::ConnectionFailed(e.to_string()))?;
        let connection = Rc::new(conn);
        let atoms = Rc::new(
            AppAtoms::new(connection.as_ref())?
                .reply()
                .context("get X11 atoms")?,
        );
        let rdb = new_resource_db_from_default(connection.as_ref())
            .context("get X11 resource database")?;
        // LUMEN_X11_DPI overrides whatever the desktop reports.
        let dpi = std::env::var("LUMEN_X11_DPI")
            .ok()
            .and_then(|x| x.parse::<f64>().ok())
            .or_else(|| util::xft_dpi(&rdb));

        let root_visual_type = {
            let screen = connection
                .setup()
                .roots
                .get(screen_num)
                .ok_or_else(|| anyhow!("Invalid screen num: {}", screen_num))?;
            util::get_visual_from_screen(screen)
                .ok_or_else(|| anyhow!("no visual found for the root window"))?
        };

        let screens = screen::get_screens(connection.as_ref(), screen_num, dpi)
            .context("enumerate screens")?;
        let keymap = Keymap::fetch(&connection)?;
        let event_window = Application::create_event_window(&connection, screen_num)?;

        let state = Rc::new(RefCell::new(State {
            quitting: false,
            windows: HashMap::new(),
            grab: None,
            active_window: None,
        }));

        Ok(Application {
            connection,
            marker: PhantomData,
            screen_num,
            event_window,
            root_visual_type,
            atoms,
            pending_events: Rc::new(RefCell::new(VecDeque::new())),
            state,
            timers: Rc::new(RefCell::new(TimerQueue::new())),
            fds: Rc::new(RefCell::new(FdSet::new())),
            screens: Rc::new(RefCell::new(screens)),
            keymap: Rc::new(RefCell::new(keymap)),
            lock_hooks: Rc::new(Cell::new(None)),
        })
    }

    fn create_event_window(conn: &XCBConnection, screen_num: usize) -> Result<u32, Error> {
        let id = conn.generate_id()?;
        let setup = conn.setup();
        let screen = setup
            .roots
            .get(screen_num)
            .ok_or_else(|| anyhow!("invalid screen num: {}", screen_num))?;

        // Create the window
        conn.create_window(
            // Window depth
            x11rb::COPY_DEPTH_FROM_PARENT,
            // The new window's ID
            id,
            // Parent window of this new window
            screen.root,
            // X-coordinate of the new window
            0,
            // Y-coordinate of the new window
            0,
            // Width of the new window
            1,
            // Height of the new window
            1,
            // Border width
            0,
            // Window class type
            WindowClass::INPUT_ONLY,
            // Visual ID
            x11rb::COPY_FROM_PARENT,
            // Window properties mask
            &CreateWindowAux::new().event_mask(EventMask::STRUCTURE_NOTIFY),
        )?
        .check()
        .context("create input-only window")?;

        Ok(id)
    }

    pub(crate) fn add_window(&self, id: u32, window: Rc<Window>) -> Result<(), Error> {
        self.state.try_borrow_mut()?.windows.insert(id, window);
        Ok(())
    }

    /// Remove the specified window from the `Application` and return the
    /// number of windows left.
    fn remove_window(&self, id: u32) -> Result<usize, Error> {
        let mut state = self.state.try_borrow_mut()?;
        state.windows.remove(&id);
        if state.grab == Some(id) {
            // The grabbing window is gone, the server drops the grab.
            state.grab = None;
        }
        if state.active_window == Some(id) {
            state.active_window = None;
        }
        Ok(state.windows.len())
    }

    /// The id of the window that most recently had keyboard focus, if it is
    /// still alive. New transient windows are made children of this one.
    pub(crate) fn active_window(&self) -> Option<u32> {
        self.state.try_borrow().ok().and_then(|s| s.active_window)
    }

    fn window(&self, id: u32) -> Result<Rc<Window>, Error> {
        self.state
            .try_borrow()?
            .windows
            .get(&id)
            .cloned()
            .ok_or_else(|| anyhow!("No window with id {}", id))
    }

    #[inline]
    pub(crate) fn connection(&self) -> &Rc<XCBConnection> {
        &self.connection
    }

    #[inline]
    pub(crate) fn screen_num(&self) -> usize {
        self.screen_num
    }

    #[inline]
    pub(crate) fn atoms(&self) -> &AppAtoms {
        &self.atoms
    }

    #[inline]
    pub(crate) fn root_visual_type(&self) -> Visualtype {
        self.root_visual_type
    }

    pub(crate) fn multi_click_config(&self) -> MultiClickConfig {
        MultiClickConfig::default()
    }

    pub(crate) fn keysym(&self, keycode: u8, shifted: bool) -> u32 {
        self.keymap
            .try_borrow()
            .map(|k| k.keysym(keycode, shifted))
            .unwrap_or(0)
    }

    pub(crate) fn screens(&self) -> std::cell::Ref<'_, Screens> {
        self.screens.borrow()
    }

    pub(crate) fn timers(&self) -> &Rc<RefCell<TimerQueue>> {
        &self.timers
    }

    pub(crate) fn fds(&self) -> &Rc<RefCell<FdSet>> {
        &self.fds
    }

    pub(crate) fn set_lock_hooks(&self, hooks: LockHooks) {
        self.lock_hooks.set(Some(hooks));
    }

    /// The scale shared by every window of this application.
    pub(crate) fn scale(&self) -> Scale {
        self.screens.borrow().scale(0)
    }

    /// Overrides the scale of `screen_num` and rescales every open window.
    ///
    /// X11 reports one `Xft.dpi` for the whole display, so all windows
    /// follow the first screen's scale.
    pub(crate) fn set_screen_scale(&self, screen_num: usize, scale: Scale) {
        self.screens.borrow_mut().set_scale(screen_num, scale);
        if screen_num == 0 {
            if let Ok(state) = self.state.try_borrow() {
                let windows: Vec<_> = state.windows.values().cloned().collect();
                drop(state);
                for window in windows {
                    window.rescale(scale);
                }
            }
        }
    }

    /// Handles one X event; returns `true` if it may have had visible
    /// consequences (used by `wait` to report activity).
    fn handle_event(&self, ev: &Event) -> bool {
        match ev {
            // NOTE: When adding handling for any of the following events,
            // there must be a check against self.event_window, to know
            // whether the event affects a real window.
            Event::Expose(e) => {
                let w = self.window(e.window);
                log_x11!(w.and_then(|w| w.handle_expose(e)));
            }
            Event::KeyPress(e) => {
                if let Ok(w) = self.window(e.event) {
                    w.handle_key_press(e);
                }
            }
            Event::KeyRelease(e) => {
                if let Ok(w) = self.window(e.event) {
                    w.handle_key_release(e);
                }
            }
            Event::ButtonPress(e) => {
                let w = self.window(e.event);
                if (4..=7).contains(&e.detail) {
                    log_x11!(w.and_then(|w| w.handle_wheel(e)));
                } else {
                    log_x11!(w.and_then(|w| w.handle_button_press(e)));
                }
            }
            Event::ButtonRelease(e) => {
                // The wheel buttons already delivered on press.
                if !(4..=7).contains(&e.detail) {
                    let w = self.window(e.event);
                    log_x11!(w.and_then(|w| w.handle_button_release(e)));
                }
            }
            Event::MotionNotify(e) => {
                let w = self.window(e.event);
                log_x11!(w.and_then(|w| w.handle_motion_notify(e)));
            }
            Event::EnterNotify(e) => {
                if let Ok(w) = self.window(e.event) {
                    w.handle_enter_notify(e);
                }
            }
            Event::LeaveNotify(e) => {
                if let Ok(w) = self.window(e.event) {
                    w.handle_leave_notify();
                }
            }
            Event::FocusIn(e) => {
                if let Ok(w) = self.window(e.event) {
                    if let Ok(mut state) = self.state.try_borrow_mut() {
                        state.active_window = Some(e.event);
                    }
                    w.handle_got_focus();
                }
            }
            Event::FocusOut(e) => {
                if let Ok(w) = self.window(e.event) {
                    w.handle_lost_focus();
                }
            }
            Event::ClientMessage(e) => {
                if let Ok(w) = self.window(e.window) {
                    w.handle_client_message(e);
                }
            }
            Event::ConfigureNotify(e) => {
                let w = self.window(e.window);
                log_x11!(w.and_then(|w| w.handle_configure_notify(e)));
            }
            Event::MapNotify(e) => {
                if let Ok(w) = self.window(e.window) {
                    w.handle_map_notify();
                }
            }
            Event::UnmapNotify(e) => {
                if let Ok(w) = self.window(e.window) {
                    w.handle_unmap_notify();
                }
            }
            Event::DestroyNotify(e) => {
                if let Ok(w) = self.window(e.window) {
                    w.handle_destroy_notify(e);
                }
                match self.remove_window(e.window) {
                    Ok(left) => {
                        if left == 0 && self.state.borrow().quitting {
                            self.finalize_quit();
                        }
                    }
                    Err(e) => tracing::error!("remove window: {e:#}"),
                }
            }
            Event::MappingNotify(_) => {
                match Keymap::fetch(&self.connection) {
                    Ok(keymap) => *self.keymap.borrow_mut() = keymap,
                    Err(e) => tracing::error!("refresh keyboard mapping: {e:#}"),
                }
                return false;
            }
            Event::Error(e) => {
                // Errors on the event stream are almost always late replies
                // to draw requests; log them instead of tearing down.
                tracing::error!("X11 error event: {e:?}");
                return false;
            }
            _ => return false,
        }
        true
    }

    /// Delivers every event the server has already queued, starting with
    /// events stashed by `ready`.
    fn drain_events(&self) -> Result<usize, Error> {
        let mut handled = 0;
        loop {
            let stashed = self.pending_events.borrow_mut().pop_front();
            let ev = match stashed {
                Some(ev) => ev,
                None => match self.connection.poll_for_event()? {
                    Some(ev) => ev,
                    None => break,
                },
            };
            if self.handle_event(&ev) {
                handled += 1;
            }
        }
        Ok(handled)
    }

    /// Repaints every window whose invalid region is non-empty and flushes
    /// the outgoing request queue.
    pub(crate) fn flush(&self) {
        let windows: Vec<_> = match self.state.try_borrow() {
            Ok(state) => state.windows.values().cloned().collect(),
            Err(_) => return,
        };
        for window in windows {
            if window.needs_paint() {
                log_x11!(window.render());
            }
        }
        log_x11!(self.connection.flush());
    }

    /// Waits for and processes events, timers and watched descriptors.
    ///
    /// Blocks for at most `timeout` seconds; a pending timer shortens the
    /// wait to its deadline. Returns a positive value when any event or
    /// timer was handled before the timeout, and `0.0` when the timeout
    /// expired with nothing to do.
    pub fn wait(&self, timeout: f64) -> Result<f64, Error> {
        let mut handled = self.drain_events()?;
        handled += self.fire_timers();
        self.flush();
        if handled > 0 {
            return Ok(1.0);
        }
        if timeout <= 0.0 {
            return Ok(0.0);
        }

        let start = Instant::now();
        // f64::INFINITY and "forever" sentinel values both mean no
        // deadline of their own.
        let wait_deadline = if timeout >= 1e19 {
            None
        } else {
            Some(start + Duration::from_secs_f64(timeout))
        };
        let deadline = match (wait_deadline, self.timers.borrow().next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        let watched = self.fds.borrow().poll_set();
        let hooks = self.lock_hooks.get();
        if let Some(h) = hooks {
            (h.unlock)();
        }
        let poll_result = poll_with_timeout(self.connection.as_raw_fd(), &watched, deadline);
        if let Some(h) = hooks {
            (h.lock)();
        }
        let ready = poll_result?;

        if !ready.is_empty() {
            handled += self.fds.borrow_mut().dispatch_ready(&ready);
        }
        handled += self.drain_events()?;
        handled += self.fire_timers();
        self.flush();
        Ok(if handled > 0 { 1.0 } else { 0.0 })
    }

    /// Returns `true` if a call to [`wait`](Application::wait) would find
    /// work without blocking.
    pub fn ready(&self) -> Result<bool, Error> {
        if let Some(deadline) = self.timers.borrow().next_deadline() {
            if deadline <= Instant::now() {
                return Ok(true);
            }
        }
        if !self.pending_events.borrow().is_empty() {
            return Ok(true);
        }
        if let Some(ev) = self.connection.poll_for_event()? {
            // poll_for_event consumes the event, so stash it for the next
            // `wait` to deliver.
            self.pending_events.borrow_mut().push_back(ev);
            return Ok(true);
        }
        let watched = self.fds.borrow().poll_set();
        let ready = poll_with_timeout(self.connection.as_raw_fd(), &watched, Some(Instant::now()))?;
        Ok(!ready.is_empty())
    }

    fn fire_timers(&self) -> usize {
        let now = Instant::now();
        let due = {
            let timers = self.timers.borrow();
            timers
                .next_deadline()
                .map(|d| d <= now)
                .unwrap_or(false)
        };
        if !due {
            return 0;
        }
        // The callbacks may re-enter the queue, so the borrow is scoped to
        // the firing call itself.
        self.timers.borrow_mut().fire_expired(now)
    }

    /// Runs the event loop until the last window closes or `quit` is
    /// called.
    pub fn run(&self) {
        loop {
            let done = match self.state.try_borrow() {
                Ok(state) => state.windows.is_empty(),
                Err(_) => false,
            };
            if done {
                break;
            }
            if let Err(e) = self.wait(1e20) {
                tracing::error!("event loop: {e:#}");
                break;
            }
        }
    }

    pub fn quit(&self) {
        if let Ok(mut state) = self.state.try_borrow_mut() {
            if !state.quitting {
                state.quitting = true;
                if state.windows.is_empty() {
                    // There are no windows, so it is safe to finalize the
                    // quit immediately.
                    drop(state);
                    self.finalize_quit();
                } else {
                    // We need to queue up the destruction of all our
                    // windows. Failure to do so will lead to resource
                    // leaks.
                    for window in state.windows.values() {
                        window.destroy();
                    }
                    log_x11!(self.connection.flush());
                }
            }
        } else {
            tracing::error!("Application state already borrowed");
        }
    }

    fn finalize_quit(&self) {
        log_x11!(self.connection.destroy_window(self.event_window));
        log_x11!(self.connection.flush());
    }

    /// Routes all pointer and keyboard input to `window_id` until
    /// [`release_grab`](Application::release_grab). Grabbing while another
    /// grab is active transfers it.
    pub(crate) fn grab(&self, window_id: u32) -> Result<(), Error> {
        use x11rb::protocol::xproto::{GrabMode, GrabStatus, Time};

        let events = EventMask::BUTTON_PRESS
            | EventMask::BUTTON_RELEASE
            | EventMask::POINTER_MOTION
            | EventMask::ENTER_WINDOW
            | EventMask::LEAVE_WINDOW;
        let reply = self
            .connection
            .grab_pointer(
                false,
                window_id,
                u32::from(events) as u16,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
                x11rb::NONE,
                x11rb::NONE,
                Time::CURRENT_TIME,
            )?
            .reply()
            .map_err(super::error::Error::from)?;
        if reply.status != GrabStatus::SUCCESS {
            return Err(super::error::Error::GrabRefused("pointer", reply.status).into());
        }
        let reply = self
            .connection
            .grab_keyboard(
                false,
                window_id,
                Time::CURRENT_TIME,
                GrabMode::ASYNC,
                GrabMode::ASYNC,
            )?
            .reply()
            .map_err(super::error::Error::from)?;
        if reply.status != GrabStatus::SUCCESS {
            log_x11!(self.connection.ungrab_pointer(Time::CURRENT_TIME));
            return Err(super::error::Error::GrabRefused("keyboard", reply.status).into());
        }
        if let Ok(mut state) = self.state.try_borrow_mut() {
            state.grab = Some(window_id);
        }
        Ok(())
    }

    /// Releases any active grab; releasing when nothing is grabbed is a
    /// no-op.
    pub(crate) fn release_grab(&self) {
        use x11rb::protocol::xproto::Time;

        let grabbed = self
            .state
            .try_borrow_mut()
            .map(|mut state| state.grab.take().is_some())
            .unwrap_or(false);
        if grabbed {
            log_x11!(self.connection.ungrab_pointer(Time::CURRENT_TIME));
            log_x11!(self.connection.ungrab_keyboard(Time::CURRENT_TIME));
            log_x11!(self.connection.flush());
        }
    }
}

/// Blocks until the connection or one of `watched` becomes ready, or
/// `deadline` passes. Returns the ready set, not including the connection
/// itself.
fn poll_with_timeout(
    conn_fd: RawFd,
    watched: &[(RawFd, FdInterest)],
    deadline: Option<Instant>,
) -> Result<Vec<(RawFd, FdInterest)>, Error> {
    use nix::poll::{poll, PollFd, PollFlags};

    fn interest_to_flags(interest: FdInterest) -> PollFlags {
        let mut flags = PollFlags::empty();
        if interest.contains(FdInterest::READ) {
            flags |= PollFlags::POLLIN;
        }
        if interest.contains(FdInterest::WRITE) {
            flags |= PollFlags::POLLOUT;
        }
        if interest.contains(FdInterest::EXCEPT) {
            flags |= PollFlags::POLLPRI;
        }
        flags
    }

    fn flags_to_interest(flags: PollFlags) -> FdInterest {
        let mut interest = FdInterest::empty();
        if flags.intersects(PollFlags::POLLIN | PollFlags::POLLHUP | PollFlags::POLLERR) {
            interest |= FdInterest::READ;
        }
        if flags.contains(PollFlags::POLLOUT) {
            interest |= FdInterest::WRITE;
        }
        if flags.contains(PollFlags::POLLPRI) {
            interest |= FdInterest::EXCEPT;
        }
        interest
    }

    let mut fds = Vec::with_capacity(watched.len() + 1);
    fds.push(PollFd::new(conn_fd, PollFlags::POLLIN));
    for &(fd, interest) in watched {
        fds.push(PollFd::new(fd, interest_to_flags(interest)));
    }

    // The poll timeout is in milliseconds, so we need to round up (or we
    // might wake up spuriously early and spin).
    fn millis_until(deadline: Instant) -> i32 {
        let remaining = deadline.saturating_duration_since(Instant::now());
        i32::try_from(remaining.as_millis()).unwrap_or(i32::MAX).saturating_add(1)
    }

    loop {
        let timeout = match deadline {
            None => -1,
            Some(d) if d <= Instant::now() => 0,
            Some(d) => millis_until(d),
        };
        match poll(&mut fds, timeout) {
            Ok(_) => break,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => return Err(e).context("poll"),
        }
    }

    let mut ready = Vec::new();
    for (poll_fd, &(fd, _)) in fds[1..].iter().zip(watched) {
        if let Some(revents) = poll_fd.revents() {
            let conditions = flags_to_interest(revents);
            if !conditions.is_empty() {
                ready.push((fd, conditions));
            }
        }
    }
    Ok(ready)
}
