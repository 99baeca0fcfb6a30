// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors at the X11 shell level.

use std::fmt;
use std::sync::Arc;

use x11rb::protocol::xproto::GrabStatus;

#[derive(Debug, Clone)]
pub enum Error {
    /// The X server rejected a request.
    XError(Arc<x11rb::errors::ReplyError>),
    /// The server refused a pointer or keyboard grab, e.g. because another
    /// client already holds one.
    GrabRefused(&'static str, GrabStatus),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::XError(e) => e.fmt(f),
            Error::GrabRefused(device, status) => {
                write!(f, "the server refused the {device} grab: {status:?}")
            }
        }
    }
}

impl std::error::Error for Error {}

impl From<x11rb::x11_utils::X11Error> for Error {
    fn from(err: x11rb::x11_utils::X11Error) -> Error {
        Error::XError(Arc::new(x11rb::errors::ReplyError::X11Error(err)))
    }
}

impl From<x11rb::errors::ReplyError> for Error {
    fn from(err: x11rb::errors::ReplyError) -> Error {
        Error::XError(Arc::new(err))
    }
}
