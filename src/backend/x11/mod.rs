// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! X11 implementation of the shell.

// # Notes on error handling in X11
//
// In XCB, errors are reported asynchronously by default, by sending them to
// the event loop. You can also request a synchronous error for a given
// call; we use this in window initialization, but otherwise we take the
// async route.
//
// When checking for X11 errors synchronously, there are two places where
// the error could happen. An error on the request means the connection is
// broken. There's no need for extra error context here, because the fact
// that the connection broke has nothing to do with what we're trying to do.
// An error on the reply means there was something wrong with the request,
// and so we add context. This convention is used throughout the x11
// backend.

#[macro_use]
mod util;

pub mod application;
pub mod draw;
pub mod error;
pub mod screen;
pub mod window;
