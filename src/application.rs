// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! The top-level application type.

use std::cell::RefCell;
use std::os::unix::io::RawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use crate::backend::x11::application as backend;
use crate::error::Error;
use crate::scale::Scale;
use crate::screen::Screens;
use crate::timer::TimerHandler;
use crate::watch::{FdHandler, FdInterest};

pub use crate::backend::x11::application::LockHooks;

// Used to ensure only one Application instance is ever created.
static APPLICATION_CREATED: AtomicBool = AtomicBool::new(false);

thread_local! {
    /// A reference object to the current `Application`, if any.
    static GLOBAL_APP: RefCell<Option<Application>> = RefCell::new(None);
}

/// The top level application object.
///
/// This can be thought of as a reference and it can be safely cloned.
#[derive(Clone)]
pub struct Application {
    pub(crate) backend_app: backend::Application,
}

impl Application {
    /// Create a new `Application`.
    ///
    /// This opens the one connection to the display server. Only one
    /// application can exist at any time; any subsequent attempts to
    /// create one will return an error.
    pub fn new() -> Result<Application, Error> {
        APPLICATION_CREATED
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::ApplicationAlreadyExists)?;
        let backend_app = backend::Application::new()?;
        let app = Application { backend_app };
        GLOBAL_APP.with(|global_app| {
            *global_app.borrow_mut() = Some(app.clone());
        });
        Ok(app)
    }

    /// Get the current globally registered `Application`.
    ///
    /// # Panics
    ///
    /// Panics if there is no globally registered `Application`, or if the
    /// calling thread is not the one that created it.
    #[inline]
    pub fn global() -> Application {
        // Main thread assertion takes place in methods
        GLOBAL_APP.with(|global_app| {
            global_app
                .borrow()
                .clone()
                .expect("There is no globally registered Application. Please create one first.")
        })
    }

    /// Run the event loop until the last window closes or
    /// [`quit`](Application::quit) is called.
    pub fn run(&self) {
        self.backend_app.run();
    }

    /// Wait for and dispatch events for at most `timeout` seconds.
    ///
    /// Queued native events, expired timers and ready file descriptors
    /// are dispatched, and pending repaints are flushed, before any
    /// blocking happens. Returns a positive value when something was
    /// handled, `0.0` when the timeout expired with nothing to do.
    pub fn wait(&self, timeout: f64) -> f64 {
        match self.backend_app.wait(timeout) {
            Ok(remaining) => remaining,
            Err(e) => {
                tracing::error!("wait: {e:#}");
                0.0
            }
        }
    }

    /// Returns `true` if a call to [`wait`](Application::wait) would find
    /// work to do without blocking. Nothing is dispatched.
    pub fn ready(&self) -> bool {
        match self.backend_app.ready() {
            Ok(ready) => ready,
            Err(e) => {
                tracing::error!("ready: {e:#}");
                false
            }
        }
    }

    /// Quit the application. This closes every window and causes
    /// [`run`](Application::run) to return.
    pub fn quit(&self) {
        self.backend_app.quit();
    }

    /// Schedules `handler` to be called once, `delay` from now.
    pub fn add_timeout(&self, delay: Duration, handler: TimerHandler, data: usize) {
        self.backend_app
            .timers()
            .borrow_mut()
            .add(Instant::now(), delay, handler, data);
    }

    /// Re-arms the currently-firing timer `delay` after its nominal
    /// deadline, so periodic timers do not drift. Outside a timer
    /// callback this behaves like [`add_timeout`](Application::add_timeout).
    pub fn repeat_timeout(&self, delay: Duration, handler: TimerHandler, data: usize) {
        self.backend_app
            .timers()
            .borrow_mut()
            .repeat(delay, handler, data);
    }

    /// Returns `true` if a timeout with this exact handler and data is
    /// pending.
    pub fn has_timeout(&self, handler: TimerHandler, data: usize) -> bool {
        self.backend_app.timers().borrow().has(handler, data)
    }

    /// Cancels a pending timeout; missing entries are ignored.
    pub fn remove_timeout(&self, handler: TimerHandler, data: usize) {
        self.backend_app.timers().borrow_mut().remove(handler, data);
    }

    /// Watches `fd` for readability and calls `handler` from the event
    /// loop when it is ready.
    pub fn add_fd(&self, fd: RawFd, handler: FdHandler, data: usize) {
        self.backend_app.fds().borrow_mut().add(fd, handler, data);
    }

    /// Watches `fd` for the given conditions. Re-adding an fd merges the
    /// interest mask and replaces the handler and data.
    pub fn add_fd_with(&self, fd: RawFd, interest: FdInterest, handler: FdHandler, data: usize) {
        self.backend_app
            .fds()
            .borrow_mut()
            .add_with(fd, interest, handler, data);
    }

    /// Stops watching `fd` entirely.
    pub fn remove_fd(&self, fd: RawFd) {
        self.backend_app.fds().borrow_mut().remove(fd);
    }

    /// Removes only the given conditions from an fd's interest mask; the
    /// fd stays watched for whatever remains.
    pub fn remove_fd_interest(&self, fd: RawFd, interest: FdInterest) {
        self.backend_app
            .fds()
            .borrow_mut()
            .remove_interest(fd, interest);
    }

    /// The current monitor layout.
    pub fn screens(&self) -> Screens {
        self.backend_app.screens().clone()
    }

    /// The scale shared by every window of this application.
    pub fn scale(&self) -> Scale {
        self.backend_app.scale()
    }

    /// Overrides the scale of screen `n` and rescales every window
    /// anchored on it, preserving their user-space geometry.
    pub fn set_screen_scale(&self, n: usize, scale: Scale) {
        self.backend_app.set_screen_scale(n, scale);
    }

    /// Installs a lock/unlock pair released only around the blocking part
    /// of [`wait`](Application::wait), so other threads can take the lock
    /// while the event loop sleeps.
    pub fn set_lock_hooks(&self, hooks: LockHooks) {
        self.backend_app.set_lock_hooks(hooks);
    }
}
