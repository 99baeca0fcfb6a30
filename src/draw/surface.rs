// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! The device-space drawing contract implemented by concrete backends.

use bitflags::bitflags;

use crate::draw::image::PixelBuf;
use crate::kurbo::Point;
use crate::region::Region;

bitflags! {
    /// Optional capabilities a surface may possess, reported without
    /// requiring downcasts.
    pub struct SurfaceFeatures: u32 {
        /// Native graphics surface for the platform display.
        const NATIVE = 1;
        /// Surface that targets a printer.
        const PRINTER = 2;
        /// The surface can alpha-blend.
        const ALPHA_BLENDING = 4;
    }
}

/// An RGBA color; the alpha channel is ignored by surfaces without
/// [`SurfaceFeatures::ALPHA_BLENDING`].
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb8(0, 0, 0);
    pub const WHITE: Color = Color::rgb8(0xff, 0xff, 0xff);

    pub const fn rgb8(r: u8, g: u8, b: u8) -> Color {
        Color { r, g, b, a: 0xff }
    }
}

impl Default for Color {
    fn default() -> Color {
        Color::BLACK
    }
}

/// An opaque font face identifier; resolution to an actual face is the
/// surface's business.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub struct FontId(pub u32);

/// Line cap/join/pattern selection for stroked primitives.
#[derive(Copy, Clone, PartialEq, Eq, Debug, Default)]
pub enum LineStyle {
    #[default]
    Solid,
    Dash,
    Dot,
    DashDot,
}

/// The tight bounding box of a rendered string, offset from the draw
/// origin.
#[derive(Copy, Clone, PartialEq, Debug, Default)]
pub struct TextExtents {
    pub dx: f64,
    pub dy: f64,
    pub width: f64,
    pub height: f64,
}

/// Handle to a backend resource caching an image at device resolution.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct CacheHandle(pub u64);

/// The device-space surface contract.
///
/// Every coordinate is in device pixels; no scaling, no transform. The
/// user-space layer ([`DrawCtx`]) owns transform, clip and scale state and
/// only ever hands a surface fully resolved device coordinates, so a
/// backend implements exactly the rasterization it can do and nothing else.
///
/// Stroked/filled primitives use the most recent `set_color`,
/// `set_line_style` and clip; text uses the most recent `set_font`.
///
/// [`DrawCtx`]: crate::draw::DrawCtx
pub trait DeviceSurface {
    fn features(&self) -> SurfaceFeatures;

    // primitives
    fn point(&mut self, x: f64, y: f64);
    fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64);
    /// An open polyline through `pts`.
    fn polyline(&mut self, pts: &[Point]);
    /// A closed outline through `pts`.
    fn closed_loop(&mut self, pts: &[Point]);
    fn fill_polygon(&mut self, pts: &[Point]);
    /// Fills a polygon made of several closed contours; contours after the
    /// first describe hole boundaries.
    fn fill_complex_polygon(&mut self, contours: &[Vec<Point>]);
    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64);
    /// Arc inscribed in the box, angles in degrees counter-clockwise from
    /// three o'clock.
    fn arc(&mut self, x: f64, y: f64, w: f64, h: f64, a1: f64, a2: f64);
    /// Filled pie slice with the same parameters as `arc`.
    fn pie(&mut self, x: f64, y: f64, w: f64, h: f64, a1: f64, a2: f64);

    // state
    fn set_color(&mut self, color: Color);
    fn set_line_style(&mut self, style: LineStyle, width_px: f64);
    /// Restricts drawing to `region` (device pixels); `None` lifts the
    /// restriction.
    fn set_clip(&mut self, region: Option<&Region>);

    // text
    fn set_font(&mut self, face: FontId, size_px: f64);
    fn text_width(&self, text: &str) -> f64;
    fn line_height(&self) -> f64;
    fn descent(&self) -> f64;
    fn text_extents(&self, text: &str) -> TextExtents;
    /// Draws `text` with the baseline origin at `(x, y)`, rotated by
    /// `angle` degrees around the origin where the backend supports it.
    fn draw_text(&mut self, text: &str, x: f64, y: f64, angle: f64);
    /// Right-to-left variant: `(x, y)` is the *right* end of the baseline.
    fn rtl_draw_text(&mut self, text: &str, x: f64, y: f64);

    // images
    /// Creates a backend resource holding `pixels` at device resolution.
    fn cache_image(&mut self, pixels: &PixelBuf) -> Option<CacheHandle>;
    fn uncache_image(&mut self, handle: CacheHandle);
    /// Blits a `w`×`h` window of the cached image to `(x, y)`, with the
    /// image content offset by `(cx, cy)`.
    fn draw_cached_image(
        &mut self,
        handle: CacheHandle,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        cx: f64,
        cy: f64,
    );
    /// Direct blit of a pixel buffer, already at device resolution.
    fn draw_image(&mut self, pixels: &PixelBuf, x: f64, y: f64);
    /// Copies pixels out of a cached offscreen onto the surface.
    fn copy_offscreen(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        offscreen: CacheHandle,
        src_x: f64,
        src_y: f64,
    );
}

/// The explicit "no backend attached" surface.
///
/// Every operation is a safe no-op and every query returns a neutral
/// value, so callers never need to null-check the active surface. This is
/// selected explicitly instead of relying on empty default trait bodies.
#[derive(Default, Debug)]
pub struct NullSurface;

impl DeviceSurface for NullSurface {
    fn features(&self) -> SurfaceFeatures {
        SurfaceFeatures::empty()
    }

    fn point(&mut self, _x: f64, _y: f64) {}
    fn line(&mut self, _x0: f64, _y0: f64, _x1: f64, _y1: f64) {}
    fn polyline(&mut self, _pts: &[Point]) {}
    fn closed_loop(&mut self, _pts: &[Point]) {}
    fn fill_polygon(&mut self, _pts: &[Point]) {}
    fn fill_complex_polygon(&mut self, _contours: &[Vec<Point>]) {}
    fn rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64) {}
    fn fill_rect(&mut self, _x: f64, _y: f64, _w: f64, _h: f64) {}
    fn arc(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _a1: f64, _a2: f64) {}
    fn pie(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _a1: f64, _a2: f64) {}

    fn set_color(&mut self, _color: Color) {}
    fn set_line_style(&mut self, _style: LineStyle, _width_px: f64) {}
    fn set_clip(&mut self, _region: Option<&Region>) {}

    fn set_font(&mut self, _face: FontId, _size_px: f64) {}
    fn text_width(&self, _text: &str) -> f64 {
        0.0
    }
    fn line_height(&self) -> f64 {
        0.0
    }
    fn descent(&self) -> f64 {
        0.0
    }
    fn text_extents(&self, _text: &str) -> TextExtents {
        TextExtents::default()
    }
    fn draw_text(&mut self, _text: &str, _x: f64, _y: f64, _angle: f64) {}
    fn rtl_draw_text(&mut self, _text: &str, _x: f64, _y: f64) {}

    fn cache_image(&mut self, _pixels: &PixelBuf) -> Option<CacheHandle> {
        None
    }
    fn uncache_image(&mut self, _handle: CacheHandle) {}
    fn draw_cached_image(
        &mut self,
        _handle: CacheHandle,
        _x: f64,
        _y: f64,
        _w: f64,
        _h: f64,
        _cx: f64,
        _cy: f64,
    ) {
    }
    fn draw_image(&mut self, _pixels: &PixelBuf, _x: f64, _y: f64) {}
    fn copy_offscreen(
        &mut self,
        _x: f64,
        _y: f64,
        _w: f64,
        _h: f64,
        _offscreen: CacheHandle,
        _src_x: f64,
        _src_y: f64,
    ) {
    }
}
