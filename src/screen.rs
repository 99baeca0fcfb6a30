// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Information about screens and monitors.

use crate::kurbo::{Point, Rect};
use crate::scale::Scale;

/// How far the platform lets the application rescale its windows.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum ScalingCapability {
    /// The scale factor is fixed by the platform.
    NoRescaling,
    /// One scale factor shared by every screen.
    SystemWide,
    /// Each screen carries its own scale factor.
    PerScreen,
}

/// Information about a monitor.
///
/// Geometry is in user-space units within the global display layout; the
/// monitor's own scale factor relates those units to its pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct Monitor {
    primary: bool,
    rect: Rect,
    work_rect: Rect,
    dpi: f64,
    scale: Scale,
}

impl Monitor {
    pub fn new(primary: bool, rect: Rect, work_rect: Rect, dpi: f64, scale: Scale) -> Monitor {
        Monitor {
            primary,
            rect,
            work_rect,
            dpi,
            scale,
        }
    }

    /// Whether this is the primary monitor.
    #[inline]
    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// The monitor's full rectangle in the global layout.
    #[inline]
    pub fn virtual_rect(&self) -> Rect {
        self.rect
    }

    /// The monitor rectangle minus reserved areas such as task bars and
    /// docks.
    #[inline]
    pub fn virtual_work_rect(&self) -> Rect {
        self.work_rect
    }

    /// Resolution in dots per inch.
    #[inline]
    pub fn dpi(&self) -> f64 {
        self.dpi
    }

    #[inline]
    pub fn scale(&self) -> Scale {
        self.scale
    }
}

/// The monitor layout of the display, plus per-screen queries.
///
/// Screen numbers are indices into the enumeration order; queries with an
/// out-of-range number fall back to screen 0, so a window that was on a
/// monitor that got unplugged still resolves to something visible.
#[derive(Clone, Debug, Default)]
pub struct Screens {
    monitors: Vec<Monitor>,
    capability: Option<ScalingCapability>,
}

impl Screens {
    pub fn new(monitors: Vec<Monitor>, capability: ScalingCapability) -> Screens {
        Screens {
            monitors,
            capability: Some(capability),
        }
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.monitors.len()
    }

    pub fn monitors(&self) -> &[Monitor] {
        &self.monitors
    }

    pub fn scaling_capability(&self) -> ScalingCapability {
        self.capability.unwrap_or(ScalingCapability::NoRescaling)
    }

    fn get(&self, n: usize) -> Option<&Monitor> {
        self.monitors.get(n).or_else(|| self.monitors.first())
    }

    /// The full rectangle of screen `n`.
    pub fn rect(&self, n: usize) -> Rect {
        self.get(n).map(Monitor::virtual_rect).unwrap_or(Rect::ZERO)
    }

    /// The work area of screen `n`.
    pub fn work_area(&self, n: usize) -> Rect {
        self.get(n)
            .map(Monitor::virtual_work_rect)
            .unwrap_or(Rect::ZERO)
    }

    pub fn dpi(&self, n: usize) -> f64 {
        self.get(n).map(Monitor::dpi).unwrap_or(96.0)
    }

    pub fn scale(&self, n: usize) -> Scale {
        self.get(n).map(Monitor::scale).unwrap_or_default()
    }

    /// Overrides the scale factor of screen `n` (application rescaling).
    pub fn set_scale(&mut self, n: usize, scale: Scale) {
        if let Some(m) = self.monitors.get_mut(n) {
            m.scale = scale;
        }
    }

    /// The screen containing `point`, or the nearest one when the point
    /// falls in a gap of the layout.
    pub fn screen_num_at(&self, point: Point) -> usize {
        if let Some(n) = self
            .monitors
            .iter()
            .position(|m| m.rect.contains(point))
        {
            return n;
        }
        // Between monitors or off the layout entirely: pick the nearest.
        self.monitors
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                let da = dist2(a.rect, point);
                let db = dist2(b.rect, point);
                da.total_cmp(&db)
            })
            .map(|(n, _)| n)
            .unwrap_or(0)
    }

    /// The screen a window occupying `rect` belongs to: the one with the
    /// greatest overlap, ties going to the lowest screen number.
    pub fn screen_num_for_rect(&self, rect: Rect) -> usize {
        let mut best = None;
        for (n, m) in self.monitors.iter().enumerate() {
            let area = m.rect.intersect(rect).area();
            if area > 0.0 {
                match best {
                    Some((_, best_area)) if area <= best_area => {}
                    _ => best = Some((n, area)),
                }
            }
        }
        match best {
            Some((n, _)) => n,
            // No overlap at all: resolve by the rectangle's center.
            None => self.screen_num_at(rect.center()),
        }
    }
}

fn dist2(rect: Rect, p: Point) -> f64 {
    let dx = (rect.x0 - p.x).max(p.x - rect.x1).max(0.0);
    let dy = (rect.y0 - p.y).max(p.y - rect.y1).max(0.0);
    dx * dx + dy * dy
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_screens() -> Screens {
        // Side-by-side 1920x1080 layout with a 40 px task bar on the first.
        let a = Monitor::new(
            true,
            Rect::new(0.0, 0.0, 1920.0, 1080.0),
            Rect::new(0.0, 0.0, 1920.0, 1040.0),
            96.0,
            Scale::new(1.0),
        );
        let b = Monitor::new(
            false,
            Rect::new(1920.0, 0.0, 3840.0, 1080.0),
            Rect::new(1920.0, 0.0, 3840.0, 1080.0),
            192.0,
            Scale::new(2.0),
        );
        Screens::new(vec![a, b], ScalingCapability::PerScreen)
    }

    #[test]
    fn point_queries_resolve_to_the_containing_screen() {
        let screens = two_screens();
        assert_eq!(screens.screen_num_at(Point::new(100.0, 100.0)), 0);
        assert_eq!(screens.screen_num_at(Point::new(2000.0, 100.0)), 1);
        // off the layout: nearest wins
        assert_eq!(screens.screen_num_at(Point::new(-50.0, 50.0)), 0);
        assert_eq!(screens.screen_num_at(Point::new(5000.0, 50.0)), 1);
    }

    #[test]
    fn rect_queries_pick_the_greatest_overlap() {
        let screens = two_screens();
        // 320 of 500 px of width on screen 0
        let straddling = Rect::new(1600.0, 0.0, 2100.0, 600.0);
        assert_eq!(screens.screen_num_for_rect(straddling), 0);
        // 75% on screen 1
        let mostly_right = Rect::new(1820.0, 0.0, 2220.0, 600.0);
        assert_eq!(screens.screen_num_for_rect(mostly_right), 1);
    }

    #[test]
    fn equal_overlap_ties_go_to_the_lower_number() {
        let screens = two_screens();
        let split = Rect::new(1720.0, 0.0, 2120.0, 400.0);
        assert_eq!(screens.screen_num_for_rect(split), 0);
    }

    #[test]
    fn offscreen_rect_falls_back_to_nearest_by_center() {
        let screens = two_screens();
        let below = Rect::new(3000.0, 2000.0, 3400.0, 2400.0);
        assert_eq!(screens.screen_num_for_rect(below), 1);
    }

    #[test]
    fn out_of_range_screen_numbers_fall_back_to_screen_zero() {
        let screens = two_screens();
        assert_eq!(screens.rect(17), screens.rect(0));
        assert_eq!(screens.dpi(17), 96.0);
        let empty = Screens::default();
        assert_eq!(empty.rect(0), Rect::ZERO);
        assert_eq!(empty.scale(3), Scale::default());
        assert_eq!(empty.screen_num_at(Point::ZERO), 0);
    }

    #[test]
    fn per_screen_scale_can_be_overridden() {
        let mut screens = two_screens();
        assert_eq!(screens.scale(1).factor(), 2.0);
        screens.set_scale(1, Scale::new(1.5));
        assert_eq!(screens.scale(1).factor(), 1.5);
        assert_eq!(screens.scaling_capability(), ScalingCapability::PerScreen);
    }

    #[test]
    fn work_area_excludes_reserved_space() {
        let screens = two_screens();
        assert_eq!(screens.work_area(0).height(), 1040.0);
        assert_eq!(screens.rect(0).height(), 1080.0);
    }
}
