// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! The vertex-collection state machine behind `begin_*`/`vertex`/`end_*`.

use crate::kurbo::Point;

/// Which kind of vertex-collection session is open, if any.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum PathMode {
    #[default]
    None,
    Points,
    Line,
    Loop,
    Polygon,
    ComplexPolygon,
}

/// Accumulates device-space vertices between a `begin_*`/`end_*` pair.
///
/// Only one session may be open at a time. Vertices pushed while no
/// session is open are dropped with a warning (a deliberate choice over a
/// hard error; the draw simply has no visible effect, matching the
/// behavior of a no-op surface). `gap` is only meaningful inside a complex
/// polygon, where it closes the current contour and starts a hole
/// boundary.
#[derive(Debug, Default)]
pub struct PathBuilder {
    mode: PathMode,
    pts: Vec<Point>,
    contours: Vec<Vec<Point>>,
}

impl PathBuilder {
    pub fn new() -> PathBuilder {
        PathBuilder::default()
    }

    #[inline]
    pub fn mode(&self) -> PathMode {
        self.mode
    }

    /// Number of vertices collected in the open contour.
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.pts.len()
    }

    /// Opens a collection session, discarding any session left open.
    pub fn begin(&mut self, mode: PathMode) {
        if self.mode != PathMode::None {
            tracing::warn!(
                "begin_{:?} while a {:?} session is open; discarding it",
                mode,
                self.mode
            );
        }
        self.mode = mode;
        self.pts.clear();
        self.contours.clear();
    }

    /// Adds a device-space vertex to the open session.
    pub fn vertex(&mut self, p: Point) {
        if self.mode == PathMode::None {
            tracing::warn!("vertex() with no begin_*() session open; dropped");
            return;
        }
        self.pts.push(p);
    }

    /// Closes the current contour of a complex polygon.
    pub fn gap(&mut self) {
        if self.mode != PathMode::ComplexPolygon {
            tracing::warn!("gap() outside begin_complex_polygon(); ignored");
            return;
        }
        // A contour needs at least a triangle to enclose anything.
        if self.pts.len() > 2 {
            self.contours.push(std::mem::take(&mut self.pts));
        } else {
            self.pts.clear();
        }
    }

    /// Ends the session, returning the collected vertices.
    ///
    /// `expected` is the mode the caller's `end_*` corresponds to; a
    /// mismatch is tolerated with a warning so an unbalanced caller cannot
    /// wedge the state machine.
    pub fn end(&mut self, expected: PathMode) -> Vec<Point> {
        if self.mode != expected {
            tracing::warn!("end_{:?} closing a {:?} session", expected, self.mode);
        }
        self.mode = PathMode::None;
        self.contours.clear();
        std::mem::take(&mut self.pts)
    }

    /// Ends a complex-polygon session, returning all closed contours.
    pub fn end_complex(&mut self) -> Vec<Vec<Point>> {
        if self.mode != PathMode::ComplexPolygon {
            tracing::warn!("end_complex_polygon closing a {:?} session", self.mode);
        }
        self.gap_if_open();
        self.mode = PathMode::None;
        self.pts.clear();
        std::mem::take(&mut self.contours)
    }

    fn gap_if_open(&mut self) {
        if self.mode == PathMode::ComplexPolygon && !self.pts.is_empty() {
            if self.pts.len() > 2 {
                self.contours.push(std::mem::take(&mut self.pts));
            } else {
                self.pts.clear();
            }
        }
    }
}

/// Appends the vertices of a circular-arc approximation in user space.
///
/// Angles are in degrees counter-clockwise from three o'clock; the segment
/// count adapts to the radius so the chord error stays subpixel at scale
/// 1.
pub fn flatten_arc(out: &mut Vec<Point>, cx: f64, cy: f64, r: f64, a1: f64, a2: f64) {
    let a1 = a1.to_radians();
    let a2 = a2.to_radians();
    let sweep = a2 - a1;
    let segments = ((r.abs() * sweep.abs()).ceil() as usize).clamp(8, 360);
    for i in 0..=segments {
        let t = a1 + sweep * (i as f64) / (segments as f64);
        // Y grows downward on screen, so positive angles go counter-clockwise.
        out.push(Point::new(cx + r * t.cos(), cy - r * t.sin()));
    }
}

/// Appends the vertices of a flattened cubic Bezier in user space.
pub fn flatten_cubic(
    out: &mut Vec<Point>,
    p0: Point,
    p1: Point,
    p2: Point,
    p3: Point,
) {
    // Segment count from the control polygon length, like the classic
    // forward-difference implementation.
    let len = (p1 - p0).hypot() + (p2 - p1).hypot() + (p3 - p2).hypot();
    let segments = (len.ceil() as usize).clamp(4, 400);
    for i in 0..=segments {
        let t = i as f64 / segments as f64;
        let mt = 1.0 - t;
        let a = mt * mt * mt;
        let b = 3.0 * mt * mt * t;
        let c = 3.0 * mt * t * t;
        let d = t * t * t;
        out.push(Point::new(
            a * p0.x + b * p1.x + c * p2.x + d * p3.x,
            a * p0.y + b * p1.y + c * p2.y + d * p3.y,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn vertex_outside_session_is_dropped() {
        let mut path = PathBuilder::new();
        path.vertex(Point::new(1.0, 2.0));
        path.begin(PathMode::Line);
        assert_eq!(path.vertex_count(), 0);
    }

    #[test]
    fn only_one_session_at_a_time() {
        let mut path = PathBuilder::new();
        path.begin(PathMode::Line);
        path.vertex(Point::new(0.0, 0.0));
        path.begin(PathMode::Polygon);
        // The line session's vertices were discarded.
        assert_eq!(path.vertex_count(), 0);
        assert_eq!(path.mode(), PathMode::Polygon);
    }

    #[test]
    fn gap_splits_complex_polygon_contours() {
        let mut path = PathBuilder::new();
        path.begin(PathMode::ComplexPolygon);
        for p in [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)] {
            path.vertex(p.into());
        }
        path.gap();
        for p in [(2.0, 2.0), (8.0, 2.0), (8.0, 8.0)] {
            path.vertex(p.into());
        }
        let contours = path.end_complex();
        assert_eq!(contours.len(), 2);
        assert_eq!(contours[0].len(), 4);
        assert_eq!(contours[1].len(), 3);
        assert_eq!(path.mode(), PathMode::None);
    }

    #[test]
    fn gap_outside_complex_polygon_is_ignored() {
        let mut path = PathBuilder::new();
        path.begin(PathMode::Polygon);
        path.vertex(Point::new(0.0, 0.0));
        path.gap();
        assert_eq!(path.vertex_count(), 1);
    }

    #[test]
    fn degenerate_contours_are_dropped() {
        let mut path = PathBuilder::new();
        path.begin(PathMode::ComplexPolygon);
        path.vertex(Point::new(0.0, 0.0));
        path.vertex(Point::new(1.0, 1.0));
        path.gap(); // two points enclose nothing
        let contours = path.end_complex();
        assert!(contours.is_empty());
    }

    #[test]
    fn arc_endpoints_are_on_the_circle() {
        let mut pts = Vec::new();
        flatten_arc(&mut pts, 0.0, 0.0, 10.0, 0.0, 90.0);
        let first = pts[0];
        let last = *pts.last().unwrap();
        assert!((first.x - 10.0).abs() < 1e-9 && first.y.abs() < 1e-9);
        assert!(last.x.abs() < 1e-9 && (last.y + 10.0).abs() < 1e-9);
    }

    #[test]
    fn cubic_endpoints_are_exact() {
        let mut pts = Vec::new();
        let (p0, p3) = (Point::new(0.0, 0.0), Point::new(30.0, 0.0));
        flatten_cubic(&mut pts, p0, Point::new(10.0, 20.0), Point::new(20.0, 20.0), p3);
        assert_eq!(pts[0], p0);
        assert_eq!(*pts.last().unwrap(), p3);
    }
}
