// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! X11 Monitors and Screen information.

use x11rb::connection::Connection;
use x11rb::errors::ReplyOrIdError;
use x11rb::protocol::randr::{self, ConnectionExt as _, Crtc};
use x11rb::protocol::xproto::{Screen, Timestamp};

use crate::kurbo::Rect;
use crate::scale::{Scalable, Scale};
use crate::screen::{Monitor, ScalingCapability, Screens};

/// Geometry of one output, in device pixels, before dpi is known.
struct Output {
    primary: bool,
    x: i32,
    y: i32,
    width: u16,
    height: u16,
}

fn monitor(out: &Output, dpi: f64, scale: Scale) -> Monitor {
    let rect = Rect::new(
        out.x as f64,
        out.y as f64,
        out.x as f64 + out.width as f64,
        out.y as f64 + out.height as f64,
    )
    .to_dp(scale);
    // TODO: Support for a real work_rect via _NET_WORKAREA. It's complicated
    // on multi-monitor layouts...
    Monitor::new(out.primary, rect, rect, dpi, scale)
}

/// Enumerates the monitor layout of the connected display.
///
/// The dpi comes from `Xft.dpi` and applies to the whole display, so every
/// monitor gets the same scale factor; X11 has no per-monitor scaling the
/// application could honor without RandR transforms.
pub(crate) fn get_screens(
    conn: &impl Connection,
    screen_num: usize,
    dpi: Option<f64>,
) -> Result<Screens, ReplyOrIdError> {
    let dpi = dpi.unwrap_or(96.0);
    let scale = Scale::new(dpi / 96.0);
    let outputs = get_outputs(conn, screen_num)?;
    let monitors = outputs.iter().map(|o| monitor(o, dpi, scale)).collect();
    Ok(Screens::new(monitors, ScalingCapability::SystemWide))
}

fn get_outputs(conn: &impl Connection, screen_num: usize) -> Result<Vec<Output>, ReplyOrIdError> {
    let screen = &conn.setup().roots[screen_num];

    if conn
        .extension_information(randr::X11_EXTENSION_NAME)?
        .is_none()
    {
        return get_outputs_core(screen);
    }

    // Monitor support was added in RandR 1.5
    let version = conn.randr_query_version(1, 5)?.reply()?;
    match (version.major_version, version.minor_version) {
        (major, _) if major >= 2 => get_outputs_randr_monitors(conn, screen),
        (1, minor) if minor >= 5 => get_outputs_randr_monitors(conn, screen),
        (1, minor) if minor >= 3 => get_outputs_randr_screen_resources_current(conn, screen),
        (1, minor) if minor >= 2 => get_outputs_randr_screen_resources(conn, screen),
        _ => get_outputs_core(screen),
    }
}

fn get_outputs_core(screen: &Screen) -> Result<Vec<Output>, ReplyOrIdError> {
    Ok(vec![Output {
        primary: true,
        x: 0,
        y: 0,
        width: screen.width_in_pixels,
        height: screen.height_in_pixels,
    }])
}

fn get_outputs_randr_monitors(
    conn: &impl Connection,
    screen: &Screen,
) -> Result<Vec<Output>, ReplyOrIdError> {
    let result = conn
        .randr_get_monitors(screen.root, true)?
        .reply()?
        .monitors
        .iter()
        .map(|info| Output {
            primary: info.primary,
            x: info.x as i32,
            y: info.y as i32,
            width: info.width,
            height: info.height,
        })
        .collect();
    Ok(result)
}

fn get_outputs_randr_screen_resources_current(
    conn: &impl Connection,
    screen: &Screen,
) -> Result<Vec<Output>, ReplyOrIdError> {
    let reply = conn
        .randr_get_screen_resources_current(screen.root)?
        .reply()?;
    get_outputs_randr_crtcs_timestamp(conn, &reply.crtcs, reply.config_timestamp)
}

fn get_outputs_randr_screen_resources(
    conn: &impl Connection,
    screen: &Screen,
) -> Result<Vec<Output>, ReplyOrIdError> {
    let reply = conn.randr_get_screen_resources(screen.root)?.reply()?;
    get_outputs_randr_crtcs_timestamp(conn, &reply.crtcs, reply.config_timestamp)
}

// This function first sends a number of requests, collect()ing them into a
// Vec and then gets the replies. This saves round-trips. Without the
// collect(), there would be one round-trip per CRTC.
#[allow(clippy::needless_collect)]
fn get_outputs_randr_crtcs_timestamp(
    conn: &impl Connection,
    crtcs: &[Crtc],
    config_timestamp: Timestamp,
) -> Result<Vec<Output>, ReplyOrIdError> {
    let requests = crtcs
        .iter()
        .map(|&crtc| conn.randr_get_crtc_info(crtc, config_timestamp))
        .collect::<Vec<_>>();

    let mut result: Vec<Output> = Vec::new();
    for request in requests.into_iter() {
        let reply = request?.reply()?;
        // Disabled CRTCs report zero size; in clone mode several CRTCs
        // cover the same area and would each appear as a monitor.
        let duplicate = result
            .iter()
            .any(|o| o.x == reply.x as i32 && o.y == reply.y as i32);
        if reply.width != 0 && reply.height != 0 && !duplicate {
            // First CRTC is assumed to be the primary output
            let primary = result.is_empty();
            result.push(Output {
                primary,
                x: reply.x as i32,
                y: reply.y as i32,
                width: reply.width,
                height: reply.height,
            });
        }
    }

    Ok(result)
}
