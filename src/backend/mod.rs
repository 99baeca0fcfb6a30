// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Platform specific implementations.

cfg_if::cfg_if! {
    if #[cfg(feature = "x11")] {
        pub(crate) mod x11;
    }
}
