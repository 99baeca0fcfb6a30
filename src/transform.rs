// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! The bounded coordinate-transform stack used by all vertex drawing calls.

use crate::error::StackError;
use crate::kurbo::{Affine, Point, Vec2};

/// Depth of the saved-transform stack.
pub const MATRIX_STACK_DEPTH: usize = 32;

/// A 2D affine transform plus a bounded stack of saved transforms.
///
/// There is always exactly one active transform; `push` saves a copy of it
/// and `pop` restores the most recently saved one. Operations compose so
/// that the newest operation applies to the incoming coordinates first:
/// `current = current * op`.
///
/// Overflow and underflow are reported as [`StackError`], never silently
/// ignored; the drawing context decides how to surface them.
#[derive(Clone, Debug)]
pub struct TransformStack {
    saved: Vec<Affine>,
    current: Affine,
}

impl Default for TransformStack {
    fn default() -> TransformStack {
        TransformStack::new()
    }
}

impl TransformStack {
    pub fn new() -> TransformStack {
        TransformStack {
            saved: Vec::with_capacity(MATRIX_STACK_DEPTH),
            current: Affine::IDENTITY,
        }
    }

    /// The active transform.
    #[inline]
    pub fn current(&self) -> Affine {
        self.current
    }

    /// Number of saved transforms.
    #[inline]
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    /// Saves a copy of the active transform.
    pub fn push(&mut self) -> Result<(), StackError> {
        if self.saved.len() == MATRIX_STACK_DEPTH {
            return Err(StackError::Overflow);
        }
        self.saved.push(self.current);
        Ok(())
    }

    /// Restores the most recently saved transform.
    pub fn pop(&mut self) -> Result<(), StackError> {
        match self.saved.pop() {
            Some(m) => {
                self.current = m;
                Ok(())
            }
            None => Err(StackError::Underflow),
        }
    }

    /// Composes `op` onto the active transform; `op` applies to incoming
    /// coordinates before everything already composed.
    #[inline]
    pub fn mult(&mut self, op: Affine) {
        self.current *= op;
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.mult(Affine::translate(Vec2::new(dx, dy)));
    }

    /// Rotates by `degrees` counter-clockwise.
    pub fn rotate(&mut self, degrees: f64) {
        if degrees != 0.0 {
            self.mult(Affine::rotate(degrees.to_radians()));
        }
    }

    /// Maps a user-space point through the active transform.
    #[inline]
    pub fn transform_point(&self, p: Point) -> Point {
        self.current * p
    }

    #[inline]
    pub fn transform_x(&self, x: f64, y: f64) -> f64 {
        self.transform_point(Point::new(x, y)).x
    }

    #[inline]
    pub fn transform_y(&self, x: f64, y: f64) -> f64 {
        self.transform_point(Point::new(x, y)).y
    }

    /// Maps a direction through the active transform, ignoring translation.
    #[inline]
    pub fn transform_vec(&self, v: Vec2) -> Vec2 {
        let [a, b, c, d, _, _] = self.current.as_coeffs();
        Vec2::new(a * v.x + c * v.y, b * v.x + d * v.y)
    }

    #[inline]
    pub fn transform_dx(&self, x: f64, y: f64) -> f64 {
        self.transform_vec(Vec2::new(x, y)).x
    }

    #[inline]
    pub fn transform_dy(&self, x: f64, y: f64) -> f64 {
        self.transform_vec(Vec2::new(x, y)).y
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_near(a: Point, b: Point) {
        assert!((a - b).hypot() < 1e-9, "{a:?} != {b:?}");
    }

    #[test]
    fn composition_matches_single_combined_matrix() {
        let mut stack = TransformStack::new();
        stack.translate(10.0, 20.0);
        stack.rotate(30.0);

        let combined =
            Affine::translate(Vec2::new(10.0, 20.0)) * Affine::rotate(30f64.to_radians());
        let p = Point::new(3.0, 4.0);
        assert_near(stack.transform_point(p), combined * p);
    }

    #[test]
    fn push_pop_restores_exact_transform() {
        let mut stack = TransformStack::new();
        stack.translate(1.5, -2.25);
        let before = stack.current();

        stack.push().unwrap();
        stack.rotate(45.0);
        stack.translate(7.0, 7.0);
        assert_ne!(stack.current(), before);
        stack.pop().unwrap();

        // bit-for-bit: pop restores a saved copy, it does not invert.
        assert_eq!(stack.current().as_coeffs(), before.as_coeffs());
    }

    #[test]
    fn overflow_and_underflow_are_reported() {
        let mut stack = TransformStack::new();
        for _ in 0..MATRIX_STACK_DEPTH {
            stack.push().unwrap();
        }
        assert_eq!(stack.push(), Err(StackError::Overflow));
        for _ in 0..MATRIX_STACK_DEPTH {
            stack.pop().unwrap();
        }
        assert_eq!(stack.pop(), Err(StackError::Underflow));
    }

    #[test]
    fn directions_ignore_translation() {
        let mut stack = TransformStack::new();
        stack.translate(100.0, 200.0);
        assert_eq!(stack.transform_dx(1.0, 0.0), 1.0);
        assert_eq!(stack.transform_dy(0.0, 1.0), 1.0);
        stack.rotate(90.0);
        assert!((stack.transform_dx(1.0, 0.0)).abs() < 1e-9);
        assert!((stack.transform_dy(1.0, 0.0) - 1.0).abs() < 1e-9);
    }
}
