// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors at the shell level.

use std::fmt;
use std::sync::Arc;

/// Bounded-stack discipline errors.
///
/// The transform and clip stacks have fixed depth. Exceeding it is a caller
/// bug; these errors are surfaced instead of silently clamping so that the
/// bug is visible, but the drawing context catches and logs them at its
/// public boundary to keep the application alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackError {
    /// A push was attempted on a full stack.
    Overflow,
    /// A pop was attempted past the outermost entry.
    Underflow,
}

impl fmt::Display for StackError {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            StackError::Overflow => write!(f, "stack overflow: push on a full stack"),
            StackError::Underflow => write!(f, "stack underflow: pop past the outermost entry"),
        }
    }
}

impl std::error::Error for StackError {}

/// Shell errors.
#[derive(Debug, Clone)]
pub enum Error {
    /// The Application instance has already been created.
    ApplicationAlreadyExists,
    /// Tried to use the application after it had been dropped.
    ApplicationDropped,
    /// The window has already been destroyed.
    WindowDropped,
    /// The display connection could not be established.
    ///
    /// This is fatal for the caller: nothing in the shell works without a
    /// display.
    ConnectionFailed(String),
    /// Stack discipline violation on the transform or clip stack.
    Stack(StackError),
    /// Platform specific error.
    #[cfg(feature = "x11")]
    Platform(crate::backend::x11::error::Error),
    /// Other miscellaneous error.
    Other(Arc<anyhow::Error>),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        match self {
            Error::ApplicationAlreadyExists => {
                write!(f, "An application instance has already been created.")
            }
            Error::ApplicationDropped => {
                write!(
                    f,
                    "The application this operation requires has been dropped."
                )
            }
            Error::WindowDropped => write!(f, "The window has already been destroyed."),
            Error::ConnectionFailed(why) => {
                write!(f, "Failed to connect to the display server: {why}")
            }
            Error::Stack(err) => fmt::Display::fmt(err, f),
            #[cfg(feature = "x11")]
            Error::Platform(err) => fmt::Display::fmt(err, f),
            Error::Other(s) => write!(f, "{s}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StackError> for Error {
    fn from(src: StackError) -> Error {
        Error::Stack(src)
    }
}

impl From<anyhow::Error> for Error {
    fn from(src: anyhow::Error) -> Error {
        // Typed backend errors keep their identity across the anyhow
        // boundary so callers can match on `Error::Platform`.
        #[cfg(feature = "x11")]
        let src = match src.downcast::<crate::backend::x11::error::Error>() {
            Ok(platform) => return Error::Platform(platform),
            Err(src) => src,
        };
        Error::Other(Arc::new(src))
    }
}

#[cfg(feature = "x11")]
impl From<crate::backend::x11::error::Error> for Error {
    fn from(src: crate::backend::x11::error::Error) -> Error {
        Error::Platform(src)
    }
}

#[cfg(all(test, feature = "x11"))]
mod tests {
    use super::*;

    #[test]
    fn backend_errors_keep_their_identity_across_anyhow() {
        let reply = x11rb::errors::ReplyError::ConnectionError(
            x11rb::errors::ConnectionError::UnknownError,
        );
        let backend = crate::backend::x11::error::Error::from(reply);
        let err = Error::from(anyhow::Error::new(backend).context("create window"));
        assert!(matches!(err, Error::Platform(_)));
    }
}
