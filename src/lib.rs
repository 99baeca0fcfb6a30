// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Platform abstraction for the Lumen GUI toolkit.
//!
//! `lumen-shell` is the layer between the widget toolkit and the display
//! server: it owns the display connection and event loop, creates native
//! windows, and funnels all drawing through a small device-surface
//! contract. Widgets draw in user-space units through [`DrawCtx`], which
//! applies the transform stack, the clip stack and the resolution scale
//! before anything touches a backend.

pub use kurbo;

mod backend;

pub mod draw;
pub mod error;
pub mod keyboard;
pub mod mouse;
pub mod region;
pub mod scale;
pub mod screen;
pub mod timer;
pub mod transform;
#[cfg(unix)]
pub mod watch;

#[cfg(feature = "x11")]
pub mod application;
#[cfg(feature = "x11")]
pub mod window;

pub use crate::draw::surface::{Color, DeviceSurface, FontId, LineStyle, SurfaceFeatures};
pub use crate::draw::{DrawCtx, SurfaceStack};
pub use crate::error::Error;
pub use crate::keyboard::{Code, KbKey, KeyEvent, KeyState, Location, Modifiers};
pub use crate::mouse::{MouseButton, MouseButtons, MouseEvent, MultiClickConfig};
pub use crate::region::Region;
pub use crate::scale::{Scalable, Scale};
pub use crate::screen::{Monitor, ScalingCapability, Screens};

#[cfg(feature = "x11")]
pub use crate::application::{Application, LockHooks};
#[cfg(feature = "x11")]
pub use crate::window::{WinHandler, WindowBuilder, WindowHandle, WindowLevel};
