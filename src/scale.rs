// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Resolution scale related helpers.

use crate::kurbo::{Point, Rect, Size, Vec2};

/// Coordinate scaling between device pixels and user-space units.
///
/// A pixel (**px**) is the smallest controllable area of color on the
/// display. A user-space unit (**dp**) is a resolution independent logical
/// unit; `px = dp * factor`. One pixel equals one user-space unit when the
/// factor is `1.0`.
///
/// ## Rounding
///
/// Wherever a scaled coordinate has to become an integer pixel, the rule is
/// *round half away from zero* (`f64::round`), applied through [`Scale::px`]
/// and nowhere else. Using a single rule everywhere keeps a shape's draw
/// path and any later query against the same shape (for example
/// `clip_box`) in agreement, so adjacent scaled shapes meet without
/// one-pixel seams.
///
/// A copy of `Scale` is stale as soon as the platform scale changes.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct Scale(f64);

impl Default for Scale {
    fn default() -> Scale {
        Scale(1.0)
    }
}

impl Scale {
    /// Create a new `Scale`.
    ///
    /// The factor must be positive and non-zero; anything else falls back
    /// to `1.0` with a warning rather than poisoning every later
    /// conversion.
    pub fn new(factor: f64) -> Scale {
        if factor.is_finite() && factor > 0.0 {
            Scale(factor)
        } else {
            tracing::warn!("invalid scale factor {factor}, falling back to 1.0");
            Scale(1.0)
        }
    }

    /// The scale factor relating user-space units to device pixels.
    #[inline]
    pub fn factor(self) -> f64 {
        self.0
    }

    /// Converts a user-space coordinate into device pixels, rounded to the
    /// pixel grid.
    #[inline]
    pub fn px<T: Into<f64>>(self, v: T) -> f64 {
        (v.into() * self.0).round()
    }

    /// Converts a user-space coordinate into device pixels without rounding.
    #[inline]
    pub fn px_exact<T: Into<f64>>(self, v: T) -> f64 {
        v.into() * self.0
    }

    /// Converts a device-pixel coordinate into user-space units.
    #[inline]
    pub fn dp<T: Into<f64>>(self, v: T) -> f64 {
        v.into() / self.0
    }
}

/// Conversion of a geometric value between user space and device pixels.
pub trait Scalable {
    /// Converts from user-space units into device pixels.
    fn to_px(&self, scale: Scale) -> Self;

    /// Converts from device pixels into user-space units.
    fn to_dp(&self, scale: Scale) -> Self;
}

impl Scalable for Point {
    #[inline]
    fn to_px(&self, scale: Scale) -> Point {
        Point::new(self.x * scale.0, self.y * scale.0)
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Point {
        Point::new(self.x / scale.0, self.y / scale.0)
    }
}

impl Scalable for Vec2 {
    #[inline]
    fn to_px(&self, scale: Scale) -> Vec2 {
        Vec2::new(self.x * scale.0, self.y * scale.0)
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Vec2 {
        Vec2::new(self.x / scale.0, self.y / scale.0)
    }
}

impl Scalable for Size {
    #[inline]
    fn to_px(&self, scale: Scale) -> Size {
        Size::new(self.width * scale.0, self.height * scale.0)
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Size {
        Size::new(self.width / scale.0, self.height / scale.0)
    }
}

impl Scalable for Rect {
    #[inline]
    fn to_px(&self, scale: Scale) -> Rect {
        Rect::new(
            self.x0 * scale.0,
            self.y0 * scale.0,
            self.x1 * scale.0,
            self.y1 * scale.0,
        )
    }

    #[inline]
    fn to_dp(&self, scale: Scale) -> Rect {
        Rect::new(
            self.x0 / scale.0,
            self.y0 / scale.0,
            self.x1 / scale.0,
            self.y1 / scale.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_factors_fall_back() {
        assert_eq!(Scale::new(0.0).factor(), 1.0);
        assert_eq!(Scale::new(-2.0).factor(), 1.0);
        assert_eq!(Scale::new(f64::NAN).factor(), 1.0);
        assert_eq!(Scale::new(1.5).factor(), 1.5);
    }

    #[test]
    fn round_trip_within_one_pixel() {
        // unscale(scale(x)) == x within one device pixel of rounding error,
        // across fractional factors and a wide coordinate range.
        for &s in &[0.5, 1.0, 1.25, 1.5, 2.0, 3.0] {
            let scale = Scale::new(s);
            for x in -2000..2000 {
                let x = x as f64;
                let back = scale.dp(scale.px(x));
                assert!(
                    (back - x).abs() <= scale.dp(1.0),
                    "x={x} s={s} back={back}"
                );
            }
        }
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        let scale = Scale::new(1.5);
        // 1 * 1.5 = 1.5 rounds up to 2, 3 * 1.5 = 4.5 rounds up to 5.
        assert_eq!(scale.px(1.0), 2.0);
        assert_eq!(scale.px(3.0), 5.0);
        assert_eq!(scale.px(-1.0), -2.0);
    }

    #[test]
    fn rect_conversions_agree_with_scalar() {
        let scale = Scale::new(2.0);
        let r = Rect::new(1.0, 2.0, 3.0, 4.0);
        assert_eq!(r.to_px(scale), Rect::new(2.0, 4.0, 6.0, 8.0));
        assert_eq!(r.to_px(scale).to_dp(scale), r);
    }
}
