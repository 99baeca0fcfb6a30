// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! The user-space drawing context and its scaling decorator logic.
//!
//! [`DrawCtx`] is the stable drawing API the toolkit paints through. It
//! owns the transform stack, the clip stack, the current color/font/line
//! style and the vertex state machine, converts every user-space
//! coordinate into device pixels, and forwards fully resolved device
//! coordinates to a [`DeviceSurface`]. Backends never see user space;
//! widget code never sees device pixels.

pub mod image;
pub mod path;
pub mod surface;

use crate::kurbo::{Affine, Point, Rect, Vec2};

use crate::region::{ClipStack, Region};
use crate::scale::{Scalable, Scale};
use crate::transform::TransformStack;

use image::{rescale_pixels, ImageCache, ImageSource, PixelBuf, PreparedDraw};
use path::{flatten_arc, flatten_cubic, PathBuilder, PathMode};
use surface::{
    CacheHandle, Color, DeviceSurface, FontId, LineStyle, NullSurface, SurfaceFeatures,
    TextExtents,
};

/// A drawing context targeting one device surface.
///
/// Bounded-stack misuse (transform or clip over/underflow) is logged and
/// clamped here at the public boundary, so a caller bug cannot abort the
/// application; the stacks themselves report
/// [`StackError`](crate::error::StackError) precisely.
///
/// Note on the transform: the vertex family (`begin_*`/`vertex`,
/// `circle`, `arc`, `curve`) and `line`/`point` map through the full
/// affine transform. The axis-aligned integer family (`rect`, `rectf`,
/// `xyline`, `yxline`) honors only its translation component, since those
/// primitives are axis-aligned by contract.
pub struct DrawCtx {
    surface: Box<dyn DeviceSurface>,
    scale: Scale,
    transforms: TransformStack,
    clips: ClipStack,
    path: PathBuilder,
    color: Color,
    font: FontId,
    font_size: f64,
    line_style: LineStyle,
    line_width: f64,
}

impl DrawCtx {
    pub fn new(surface: Box<dyn DeviceSurface>, scale: Scale) -> DrawCtx {
        let mut ctx = DrawCtx {
            surface,
            scale,
            transforms: TransformStack::new(),
            clips: ClipStack::new(),
            path: PathBuilder::new(),
            color: Color::BLACK,
            font: FontId::default(),
            font_size: 14.0,
            line_style: LineStyle::Solid,
            line_width: 0.0,
        };
        ctx.surface.set_color(ctx.color);
        ctx.sync_font();
        ctx
    }

    /// A context with no backend attached; every draw is a safe no-op.
    pub fn null() -> DrawCtx {
        DrawCtx::new(Box::new(NullSurface), Scale::default())
    }

    /// Reports an optional backend capability without downcasting.
    pub fn has_feature(&self, feature: SurfaceFeatures) -> bool {
        self.surface.features().contains(feature)
    }

    // --- scale ---------------------------------------------------------

    #[inline]
    pub fn scale(&self) -> Scale {
        self.scale
    }

    /// Changes the scale factor.
    ///
    /// The clip stack is kept in user space, so the active clip is simply
    /// re-projected onto the surface at the new factor; the caller is
    /// responsible for triggering a full redraw.
    pub fn set_scale(&mut self, scale: Scale) {
        if scale != self.scale {
            self.scale = scale;
            self.sync_clip();
            self.sync_font();
        }
    }

    // rounded device coordinate, the one rounding rule everywhere
    #[inline]
    fn px(&self, v: f64) -> f64 {
        self.scale.px(v)
    }

    #[inline]
    fn px_exact(&self, v: f64) -> f64 {
        self.scale.px_exact(v)
    }

    /// Translation-only mapping for the axis-aligned primitive family.
    #[inline]
    fn offset(&self) -> Vec2 {
        self.transforms.current().translation()
    }

    // --- color and line style ------------------------------------------

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    pub fn set_color(&mut self, color: Color) {
        self.color = color;
        self.surface.set_color(color);
    }

    /// Sets the line style; `width` is in user-space units, `0` meaning
    /// the thinnest line the device supports.
    pub fn line_style(&mut self, style: LineStyle, width: f64) {
        self.line_style = style;
        self.line_width = width;
        let width_px = if width > 0.0 {
            self.px_exact(width).max(1.0)
        } else {
            0.0
        };
        self.surface.set_line_style(style, width_px);
    }

    // --- axis-aligned primitives (user-space integers) -----------------

    pub fn point(&mut self, x: i32, y: i32) {
        let p = self.transforms.transform_point(Point::new(x as f64, y as f64));
        let (x, y) = (self.px(p.x), self.px(p.y));
        self.surface.point(x, y);
    }

    pub fn line(&mut self, x0: i32, y0: i32, x1: i32, y1: i32) {
        let a = self.transforms.transform_point(Point::new(x0 as f64, y0 as f64));
        let b = self.transforms.transform_point(Point::new(x1 as f64, y1 as f64));
        let (ax, ay, bx, by) = (self.px(a.x), self.px(a.y), self.px(b.x), self.px(b.y));
        self.surface.line(ax, ay, bx, by);
    }

    /// Rectangle outline; device edges are derived from the user-space
    /// edges so adjacent rectangles share pixels instead of leaving
    /// seams.
    pub fn rect(&mut self, x: i32, y: i32, w: i32, h: i32) {
        if w <= 0 || h <= 0 {
            return;
        }
        let (x0, y0, x1, y1) = self.rect_edges_px(x, y, w, h);
        self.surface.rect(x0, y0, x1 - x0, y1 - y0);
    }

    /// Filled rectangle.
    pub fn rectf(&mut self, x: i32, y: i32, w: i32, h: i32) {
        if w <= 0 || h <= 0 {
            return;
        }
        let (x0, y0, x1, y1) = self.rect_edges_px(x, y, w, h);
        self.surface.fill_rect(x0, y0, x1 - x0, y1 - y0);
    }

    fn rect_edges_px(&self, x: i32, y: i32, w: i32, h: i32) -> (f64, f64, f64, f64) {
        let off = self.offset();
        let x0 = self.px(x as f64 + off.x);
        let y0 = self.px(y as f64 + off.y);
        let x1 = self.px((x + w) as f64 + off.x);
        let y1 = self.px((y + h) as f64 + off.y);
        (x0, y0, x1, y1)
    }

    /// Horizontal line from `(x, y)` to `(x1, y)`.
    pub fn xyline(&mut self, x: i32, y: i32, x1: i32) {
        let off = self.offset();
        let yd = self.px(y as f64 + off.y);
        let xa = self.px(x as f64 + off.x);
        let xb = self.px(x1 as f64 + off.x);
        self.surface.line(xa, yd, xb, yd);
    }

    /// Vertical line from `(x, y)` to `(x, y1)`.
    pub fn yxline(&mut self, x: i32, y: i32, y1: i32) {
        let off = self.offset();
        let xd = self.px(x as f64 + off.x);
        let ya = self.px(y as f64 + off.y);
        let yb = self.px(y1 as f64 + off.y);
        self.surface.line(xd, ya, xd, yb);
    }

    /// Closed outline through `pts` (user space, full transform).
    pub fn loop_(&mut self, pts: &[Point]) {
        let device = self.map_points(pts);
        self.surface.closed_loop(&device);
    }

    /// Filled convex polygon through `pts` (user space, full transform).
    pub fn polygon(&mut self, pts: &[Point]) {
        if pts.len() < 3 {
            return;
        }
        let device = self.map_points(pts);
        self.surface.fill_polygon(&device);
    }

    fn map_points(&self, pts: &[Point]) -> Vec<Point> {
        pts.iter()
            .map(|&p| {
                let p = self.transforms.transform_point(p);
                Point::new(self.px(p.x), self.px(p.y))
            })
            .collect()
    }

    /// Arc inscribed in an integer box, angles in degrees.
    pub fn arc_box(&mut self, x: i32, y: i32, w: i32, h: i32, a1: f64, a2: f64) {
        if w <= 0 || h <= 0 {
            return;
        }
        let (x0, y0, x1, y1) = self.rect_edges_px(x, y, w, h);
        self.surface.arc(x0, y0, x1 - x0, y1 - y0, a1, a2);
    }

    /// Filled pie slice in an integer box, angles in degrees.
    pub fn pie(&mut self, x: i32, y: i32, w: i32, h: i32, a1: f64, a2: f64) {
        if w <= 0 || h <= 0 {
            return;
        }
        let (x0, y0, x1, y1) = self.rect_edges_px(x, y, w, h);
        self.surface.pie(x0, y0, x1 - x0, y1 - y0, a1, a2);
    }

    // --- clipping ------------------------------------------------------

    /// Replaces the whole clip stack with the outermost, widget-assigned
    /// clip (user space).
    pub fn reset_clip(&mut self, base: Option<Region>) {
        self.clips.reset(base);
        self.sync_clip();
    }

    /// Intersects a user-space rectangle with the current clip.
    pub fn push_clip(&mut self, x: i32, y: i32, w: i32, h: i32) {
        let rect = Rect::new(x as f64, y as f64, (x + w) as f64, (y + h) as f64) + self.offset();
        if let Err(e) = self.clips.push_clip(rect) {
            tracing::error!("push_clip: {e}");
            return;
        }
        self.sync_clip();
    }

    /// Disables clipping until the matching `pop_clip`.
    pub fn push_no_clip(&mut self) {
        if let Err(e) = self.clips.push_no_clip() {
            tracing::error!("push_no_clip: {e}");
            return;
        }
        self.sync_clip();
    }

    pub fn pop_clip(&mut self) {
        if let Err(e) = self.clips.pop_clip() {
            tracing::error!("pop_clip: {e}");
            return;
        }
        self.sync_clip();
    }

    /// The visible part of a user-space rectangle under the current clip:
    /// `(x, y, w, h, fully_inside)`.
    ///
    /// The rectangle is taken in the same translated space as `push_clip`,
    /// and the visible result is mapped back into it, so a rect pushed as
    /// a clip and immediately queried reports itself fully inside.
    pub fn clip_box(&self, x: i32, y: i32, w: i32, h: i32) -> (i32, i32, i32, i32, bool) {
        let off = self.offset();
        let rect = Rect::new(x as f64, y as f64, (x + w) as f64, (y + h) as f64) + off;
        let (visible, inside) = self.clips.clip_box(rect);
        let visible = visible - off;
        let vx = visible.x0.round() as i32;
        let vy = visible.y0.round() as i32;
        let vw = (visible.x1.round() - visible.x0.round()) as i32;
        let vh = (visible.y1.round() - visible.y0.round()) as i32;
        (vx, vy, vw, vh, inside)
    }

    /// Fast reject: does any part of the rectangle survive the clip?
    /// Translated like `push_clip` and `clip_box`.
    pub fn not_clipped(&self, x: i32, y: i32, w: i32, h: i32) -> bool {
        let rect = Rect::new(x as f64, y as f64, (x + w) as f64, (y + h) as f64) + self.offset();
        self.clips.not_clipped(rect)
    }

    /// The current clip as a user-space region, `None` when unrestricted.
    pub fn clip_region(&self) -> Option<Region> {
        self.clips.current().cloned()
    }

    // clip regions live in user space; the surface only ever sees device px
    fn sync_clip(&mut self) {
        match self.clips.current() {
            Some(region) => {
                let device = region.to_px(self.scale);
                self.surface.set_clip(Some(&device));
            }
            None => self.surface.set_clip(None),
        }
    }

    // --- transform stack -----------------------------------------------

    pub fn push_matrix(&mut self) {
        if let Err(e) = self.transforms.push() {
            tracing::error!("push_matrix: {e}");
        }
    }

    pub fn pop_matrix(&mut self) {
        if let Err(e) = self.transforms.pop() {
            tracing::error!("pop_matrix: {e}");
        }
    }

    pub fn mult_matrix(&mut self, a: f64, b: f64, c: f64, d: f64, x: f64, y: f64) {
        self.transforms.mult(Affine::new([a, b, c, d, x, y]));
    }

    pub fn translate(&mut self, dx: f64, dy: f64) {
        self.transforms.translate(dx, dy);
    }

    /// Rotates subsequent vertex drawing by `degrees` counter-clockwise.
    pub fn rotate(&mut self, degrees: f64) {
        self.transforms.rotate(degrees);
    }

    pub fn transform_x(&self, x: f64, y: f64) -> f64 {
        self.transforms.transform_x(x, y)
    }

    pub fn transform_y(&self, x: f64, y: f64) -> f64 {
        self.transforms.transform_y(x, y)
    }

    pub fn transform_dx(&self, x: f64, y: f64) -> f64 {
        self.transforms.transform_dx(x, y)
    }

    pub fn transform_dy(&self, x: f64, y: f64) -> f64 {
        self.transforms.transform_dy(x, y)
    }

    // --- vertex collection ---------------------------------------------

    pub fn begin_points(&mut self) {
        self.path.begin(PathMode::Points);
    }

    pub fn begin_line(&mut self) {
        self.path.begin(PathMode::Line);
    }

    pub fn begin_loop(&mut self) {
        self.path.begin(PathMode::Loop);
    }

    pub fn begin_polygon(&mut self) {
        self.path.begin(PathMode::Polygon);
    }

    pub fn begin_complex_polygon(&mut self) {
        self.path.begin(PathMode::ComplexPolygon);
    }

    /// Adds a vertex, mapped through the current transform and scale.
    pub fn vertex(&mut self, x: f64, y: f64) {
        let p = self.transforms.transform_point(Point::new(x, y));
        let device = Point::new(self.px_exact(p.x), self.px_exact(p.y));
        self.path.vertex(device);
    }

    /// Adds an already-transformed vertex (bypasses the matrix, not the
    /// scale).
    pub fn transformed_vertex(&mut self, xf: f64, yf: f64) {
        let device = Point::new(self.px_exact(xf), self.px_exact(yf));
        self.path.vertex(device);
    }

    /// Starts a hole boundary inside a complex polygon.
    pub fn gap(&mut self) {
        self.path.gap();
    }

    pub fn end_points(&mut self) {
        for p in self.path.end(PathMode::Points) {
            self.surface.point(p.x, p.y);
        }
    }

    pub fn end_line(&mut self) {
        let pts = self.path.end(PathMode::Line);
        if pts.len() > 1 {
            self.surface.polyline(&pts);
        }
    }

    pub fn end_loop(&mut self) {
        let pts = self.path.end(PathMode::Loop);
        if pts.len() > 2 {
            self.surface.closed_loop(&pts);
        } else if pts.len() == 2 {
            self.surface.line(pts[0].x, pts[0].y, pts[1].x, pts[1].y);
        }
    }

    pub fn end_polygon(&mut self) {
        let pts = self.path.end(PathMode::Polygon);
        if pts.len() > 2 {
            self.surface.fill_polygon(&pts);
        }
    }

    pub fn end_complex_polygon(&mut self) {
        let contours = self.path.end_complex();
        if !contours.is_empty() {
            self.surface.fill_complex_polygon(&contours);
        }
    }

    /// A circle outline, or circle vertices when a session is open.
    ///
    /// The radius follows the transform's scaling the way the center
    /// follows its translation, so a circle drawn under `rotate` +
    /// `translate` lands where its vertices would.
    pub fn circle(&mut self, x: f64, y: f64, r: f64) {
        if self.path.mode() != PathMode::None {
            let mut pts = Vec::new();
            flatten_arc(&mut pts, x, y, r, 0.0, 360.0);
            for p in pts {
                self.vertex(p.x, p.y);
            }
            return;
        }
        let center = self.transforms.transform_point(Point::new(x, y));
        let rx = r * self.transforms.transform_vec(Vec2::new(1.0, 0.0)).hypot();
        let ry = r * self.transforms.transform_vec(Vec2::new(0.0, 1.0)).hypot();
        let (cx, cy) = (self.px_exact(center.x), self.px_exact(center.y));
        let (rx, ry) = (self.px_exact(rx), self.px_exact(ry));
        self.surface
            .arc(cx - rx, cy - ry, 2.0 * rx, 2.0 * ry, 0.0, 360.0);
    }

    /// Adds the vertices of a circular arc to the open session; angles in
    /// degrees. Outside a session this is a no-op.
    pub fn arc(&mut self, x: f64, y: f64, r: f64, start: f64, end: f64) {
        if self.path.mode() == PathMode::None {
            tracing::warn!("arc() with no vertex session open; use arc_box() instead");
            return;
        }
        let mut pts = Vec::new();
        flatten_arc(&mut pts, x, y, r, start, end);
        for p in pts {
            self.vertex(p.x, p.y);
        }
    }

    /// Adds the vertices of a cubic Bezier to the open session.
    pub fn curve(
        &mut self,
        x0: f64,
        y0: f64,
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        x3: f64,
        y3: f64,
    ) {
        if self.path.mode() == PathMode::None {
            tracing::warn!("curve() with no vertex session open; dropped");
            return;
        }
        let mut pts = Vec::new();
        flatten_cubic(
            &mut pts,
            Point::new(x0, y0),
            Point::new(x1, y1),
            Point::new(x2, y2),
            Point::new(x3, y3),
        );
        for p in pts {
            self.vertex(p.x, p.y);
        }
    }

    // --- text ----------------------------------------------------------

    /// Selects a font face at a user-space size.
    pub fn font(&mut self, face: FontId, size: f64) {
        self.font = face;
        self.font_size = size;
        self.sync_font();
    }

    fn sync_font(&mut self) {
        let size_px = self.px_exact(self.font_size);
        self.surface.set_font(self.font, size_px);
    }

    #[inline]
    pub fn font_face(&self) -> FontId {
        self.font
    }

    #[inline]
    pub fn font_size(&self) -> f64 {
        self.font_size
    }

    /// Width of `text` in user-space units under the current font.
    pub fn width(&self, text: &str) -> f64 {
        self.scale.dp(self.surface.text_width(text))
    }

    /// Line height in user-space units.
    pub fn height(&self) -> f64 {
        self.scale.dp(self.surface.line_height())
    }

    /// Baseline descent in user-space units.
    pub fn descent(&self) -> f64 {
        self.scale.dp(self.surface.descent())
    }

    /// Tight bounding box of `text`, in user-space units relative to the
    /// draw origin.
    pub fn text_extents(&self, text: &str) -> TextExtents {
        let e = self.surface.text_extents(text);
        TextExtents {
            dx: self.scale.dp(e.dx),
            dy: self.scale.dp(e.dy),
            width: self.scale.dp(e.width),
            height: self.scale.dp(e.height),
        }
    }

    /// Draws `text` with the baseline origin at `(x, y)`.
    pub fn draw_text(&mut self, text: &str, x: i32, y: i32) {
        self.draw_text_angled(text, x, y, 0.0);
    }

    /// Draws `text` rotated by `angle` degrees around its origin.
    pub fn draw_text_angled(&mut self, text: &str, x: i32, y: i32, angle: f64) {
        let off = self.offset();
        let (dx, dy) = (self.px(x as f64 + off.x), self.px(y as f64 + off.y));
        self.surface.draw_text(text, dx, dy, angle);
    }

    /// Right-to-left draw: `(x, y)` is the right end of the baseline.
    pub fn rtl_draw_text(&mut self, text: &str, x: i32, y: i32) {
        let off = self.offset();
        let (dx, dy) = (self.px(x as f64 + off.x), self.px(y as f64 + off.y));
        self.surface.rtl_draw_text(text, dx, dy);
    }

    // --- images --------------------------------------------------------

    /// Draws the `(w, h)` window of `img` at `(x, y)`, with the image
    /// content offset by `(cx, cy)`; all user space.
    ///
    /// The image is cached on the backend at device resolution; the cache
    /// is rebuilt whenever the pixel data, size, or scale changed since it
    /// was created.
    pub fn draw_image(
        &mut self,
        img: &mut dyn ImageSource,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        cx: i32,
        cy: i32,
    ) {
        let Some(p) = image::prepare(img.width(), img.height(), x, y, w, h, cx, cy) else {
            return;
        };
        if !self.not_clipped(p.x, p.y, p.w, p.h) {
            return;
        }
        if let Some(cache) = self.ensure_cached(img) {
            self.blit_prepared(cache, &p);
        } else {
            // no backend cache available (e.g. null surface): direct draw
            let scale = self.scale.factor();
            let pixels = img.pixels();
            let w_px = (img.width() as f64 * scale).round().max(1.0) as usize;
            let h_px = (img.height() as f64 * scale).round().max(1.0) as usize;
            let data = rescale_pixels(&pixels, w_px, h_px);
            let buf = PixelBuf::new(&data, w_px, h_px, pixels.depth);
            let off = self.offset();
            let (dx, dy) = (
                self.scale.px((p.x - p.cx) as f64 + off.x),
                self.scale.px((p.y - p.cy) as f64 + off.y),
            );
            self.surface.draw_image(&buf, dx, dy);
        }
    }

    fn blit_prepared(&mut self, cache: ImageCache, p: &PreparedDraw) {
        let off = self.offset();
        let x0 = self.px(p.x as f64 + off.x);
        let y0 = self.px(p.y as f64 + off.y);
        let x1 = self.px((p.x + p.w) as f64 + off.x);
        let y1 = self.px((p.y + p.h) as f64 + off.y);
        let cx = self.px(p.cx as f64);
        let cy = self.px(p.cy as f64);
        self.surface
            .draw_cached_image(cache.handle, x0, y0, x1 - x0, y1 - y0, cx, cy);
    }

    fn ensure_cached(&mut self, img: &mut dyn ImageSource) -> Option<ImageCache> {
        let scale = self.scale.factor();
        let w_px = (img.width() as f64 * scale).round().max(1.0) as usize;
        let h_px = (img.height() as f64 * scale).round().max(1.0) as usize;
        let generation = img.generation();

        if let Some(cache) = img.cache() {
            if cache.scale == scale
                && cache.generation == generation
                && cache.width_px == w_px
                && cache.height_px == h_px
            {
                return Some(cache);
            }
            self.surface.uncache_image(cache.handle);
            img.set_cache(None);
        }

        let pixels = img.pixels();
        let data = rescale_pixels(&pixels, w_px, h_px);
        let buf = PixelBuf::new(&data, w_px, h_px, pixels.depth);
        let handle = self.surface.cache_image(&buf)?;
        let cache = ImageCache {
            handle,
            width_px: w_px,
            height_px: h_px,
            scale,
            generation,
        };
        img.set_cache(Some(cache));
        Some(cache)
    }

    /// Releases the backend resource cached for `img`, if any.
    pub fn uncache(&mut self, img: &mut dyn ImageSource) {
        if let Some(cache) = img.cache() {
            self.surface.uncache_image(cache.handle);
            img.set_cache(None);
        }
    }

    /// Draws a raw pixel buffer, resampled from user-space `(w, h)` to
    /// device resolution before the blit.
    pub fn draw_image_buf(&mut self, pixels: &PixelBuf, x: i32, y: i32, w: i32, h: i32) {
        if w <= 0 || h <= 0 {
            return;
        }
        let (x0, y0, x1, y1) = self.rect_edges_px(x, y, w, h);
        let w_px = ((x1 - x0) as usize).max(1);
        let h_px = ((y1 - y0) as usize).max(1);
        let data = rescale_pixels(pixels, w_px, h_px);
        let buf = PixelBuf::new(&data, w_px, h_px, pixels.depth);
        self.surface.draw_image(&buf, x0, y0);
    }

    /// Copies from a cached offscreen; all coordinates user space except
    /// the source offset, which addresses the offscreen's device pixels.
    pub fn copy_offscreen(
        &mut self,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
        offscreen: CacheHandle,
        src_x: i32,
        src_y: i32,
    ) {
        if w <= 0 || h <= 0 {
            return;
        }
        let (x0, y0, x1, y1) = self.rect_edges_px(x, y, w, h);
        self.surface.copy_offscreen(
            x0,
            y0,
            x1 - x0,
            y1 - y0,
            offscreen,
            src_x as f64,
            src_y as f64,
        );
    }
}

impl Default for DrawCtx {
    fn default() -> DrawCtx {
        DrawCtx::null()
    }
}

/// The current-surface stack.
///
/// Replaces a global driver pointer: painting code receives a `&mut
/// DrawCtx`, and redirecting drawing to another surface is a scoped
/// push/pop on this stack rather than a global swap.
#[derive(Default)]
pub struct SurfaceStack {
    stack: Vec<DrawCtx>,
}

impl SurfaceStack {
    pub fn new() -> SurfaceStack {
        SurfaceStack::default()
    }

    pub fn push_current(&mut self, ctx: DrawCtx) {
        self.stack.push(ctx);
    }

    pub fn pop_current(&mut self) -> Option<DrawCtx> {
        self.stack.pop()
    }

    /// The context drawing currently targets.
    pub fn current(&mut self) -> Option<&mut DrawCtx> {
        self.stack.last_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use test_log::test;

    /// Records every device-space call for assertions.
    #[derive(Clone, Debug, PartialEq)]
    enum Op {
        Rect(f64, f64, f64, f64),
        FillRect(f64, f64, f64, f64),
        Line(f64, f64, f64, f64),
        Polyline(Vec<Point>),
        Loop(Vec<Point>),
        FillPolygon(Vec<Point>),
        Complex(usize),
        Clip(Option<Vec<Rect>>),
        Font(FontId, f64),
        Text(String, f64, f64),
        Cache(usize, usize),
        Uncache(u64),
        Blit(u64, f64, f64, f64, f64),
    }

    #[derive(Default)]
    struct Recorder {
        ops: Rc<RefCell<Vec<Op>>>,
        next_handle: std::cell::Cell<u64>,
    }

    impl Recorder {
        fn new() -> (Recorder, Rc<RefCell<Vec<Op>>>) {
            let rec = Recorder::default();
            rec.next_handle.set(1);
            let ops = rec.ops.clone();
            (rec, ops)
        }
    }

    impl DeviceSurface for Recorder {
        fn features(&self) -> SurfaceFeatures {
            SurfaceFeatures::NATIVE
        }
        fn point(&mut self, _x: f64, _y: f64) {}
        fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
            self.ops.borrow_mut().push(Op::Line(x0, y0, x1, y1));
        }
        fn polyline(&mut self, pts: &[Point]) {
            self.ops.borrow_mut().push(Op::Polyline(pts.to_vec()));
        }
        fn closed_loop(&mut self, pts: &[Point]) {
            self.ops.borrow_mut().push(Op::Loop(pts.to_vec()));
        }
        fn fill_polygon(&mut self, pts: &[Point]) {
            self.ops.borrow_mut().push(Op::FillPolygon(pts.to_vec()));
        }
        fn fill_complex_polygon(&mut self, contours: &[Vec<Point>]) {
            self.ops.borrow_mut().push(Op::Complex(contours.len()));
        }
        fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
            self.ops.borrow_mut().push(Op::Rect(x, y, w, h));
        }
        fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
            self.ops.borrow_mut().push(Op::FillRect(x, y, w, h));
        }
        fn arc(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _a1: f64, _a2: f64) {}
        fn pie(&mut self, _x: f64, _y: f64, _w: f64, _h: f64, _a1: f64, _a2: f64) {}
        fn set_color(&mut self, _color: Color) {}
        fn set_line_style(&mut self, _style: LineStyle, _width_px: f64) {}
        fn set_clip(&mut self, region: Option<&Region>) {
            self.ops
                .borrow_mut()
                .push(Op::Clip(region.map(|r| r.rects().to_vec())));
        }
        fn set_font(&mut self, face: FontId, size_px: f64) {
            self.ops.borrow_mut().push(Op::Font(face, size_px));
        }
        fn text_width(&self, text: &str) -> f64 {
            // 10 device px per char, a convenient fiction
            text.len() as f64 * 10.0
        }
        fn line_height(&self) -> f64 {
            20.0
        }
        fn descent(&self) -> f64 {
            5.0
        }
        fn text_extents(&self, text: &str) -> TextExtents {
            TextExtents {
                dx: 0.0,
                dy: -15.0,
                width: text.len() as f64 * 10.0,
                height: 20.0,
            }
        }
        fn draw_text(&mut self, text: &str, x: f64, y: f64, _angle: f64) {
            self.ops.borrow_mut().push(Op::Text(text.into(), x, y));
        }
        fn rtl_draw_text(&mut self, text: &str, x: f64, y: f64) {
            let w = self.text_width(text);
            self.ops.borrow_mut().push(Op::Text(text.into(), x - w, y));
        }
        fn cache_image(&mut self, pixels: &PixelBuf) -> Option<CacheHandle> {
            self.ops
                .borrow_mut()
                .push(Op::Cache(pixels.width, pixels.height));
            let h = self.next_handle.get();
            self.next_handle.set(h + 1);
            Some(CacheHandle(h))
        }
        fn uncache_image(&mut self, handle: CacheHandle) {
            self.ops.borrow_mut().push(Op::Uncache(handle.0));
        }
        fn draw_cached_image(
            &mut self,
            handle: CacheHandle,
            x: f64,
            y: f64,
            w: f64,
            h: f64,
            _cx: f64,
            _cy: f64,
        ) {
            self.ops.borrow_mut().push(Op::Blit(handle.0, x, y, w, h));
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

    fn ctx_at(scale: f64) -> (DrawCtx, Rc<RefCell<Vec<Op>>>) {
        let (rec, ops) = Recorder::new();
        let ctx = DrawCtx::new(Box::new(rec), Scale::new(scale));
        ops.borrow_mut().clear(); // drop construction-time state sync
        (ctx, ops)
    }

    #[test]
    fn adjacent_rects_share_edges_at_fractional_scale() {
        let (mut ctx, ops) = ctx_at(1.5);
        ctx.rectf(0, 0, 10, 10);
        ctx.rectf(10, 0, 10, 10);
        let ops = ops.borrow();
        let (Op::FillRect(ax, _, aw, _), Op::FillRect(bx, ..)) = (&ops[0], &ops[1]) else {
            panic!("unexpected ops: {ops:?}");
        };
        // right edge of the first is the left edge of the second
        assert_eq!(ax + aw, *bx);
        assert_eq!(*bx, 15.0);
    }

    #[test]
    fn clip_api_is_user_space_surface_sees_device_pixels() {
        let (mut ctx, ops) = ctx_at(2.0);
        ctx.push_clip(10, 10, 20, 20);
        let ops_v = ops.borrow().clone();
        assert_eq!(
            ops_v.last(),
            Some(&Op::Clip(Some(vec![Rect::new(20.0, 20.0, 60.0, 60.0)])))
        );
        drop(ops_v);

        // queries stay in user space
        assert_eq!(ctx.clip_box(0, 0, 100, 100), (10, 10, 20, 20, false));
        assert!(ctx.not_clipped(15, 15, 1, 1));
        assert!(!ctx.not_clipped(50, 50, 1, 1));
    }

    #[test]
    fn clip_queries_agree_with_a_translated_push() {
        let (mut ctx, _ops) = ctx_at(1.0);
        ctx.push_matrix();
        ctx.translate(10.0, 0.0);
        ctx.push_clip(0, 0, 50, 50);
        // the rect that was just pushed is fully inside its own clip
        assert_eq!(ctx.clip_box(0, 0, 50, 50), (0, 0, 50, 50, true));
        assert!(ctx.not_clipped(0, 0, 50, 50));
        assert!(!ctx.not_clipped(45, 55, 10, 10));
        ctx.pop_clip();
        ctx.pop_matrix();
    }

    #[test]
    fn pop_clip_restores_and_clamps_at_empty() {
        let (mut ctx, ops) = ctx_at(1.0);
        ctx.push_clip(0, 0, 10, 10);
        ctx.pop_clip();
        assert_eq!(ops.borrow().last(), Some(&Op::Clip(None)));
        // popping past empty is logged, not fatal
        ctx.pop_clip();
        ctx.rectf(0, 0, 1, 1);
    }

    #[test]
    fn vertices_map_through_transform_then_scale() {
        let (mut ctx, ops) = ctx_at(2.0);
        ctx.push_matrix();
        ctx.translate(10.0, 0.0);
        ctx.begin_line();
        ctx.vertex(0.0, 0.0);
        ctx.vertex(5.0, 5.0);
        ctx.end_line();
        ctx.pop_matrix();
        let ops = ops.borrow();
        let Op::Polyline(pts) = &ops[0] else {
            panic!("unexpected ops: {ops:?}");
        };
        assert_eq!(pts[0], Point::new(20.0, 0.0));
        assert_eq!(pts[1], Point::new(30.0, 10.0));
    }

    #[test]
    fn text_metrics_round_trip_through_scale() {
        let (ctx, _ops) = ctx_at(2.0);
        // surface reports 10 device px per char; user space sees half
        assert_eq!(ctx.width("abcd"), 20.0);
        assert_eq!(ctx.height(), 10.0);
        assert_eq!(ctx.descent(), 2.5);
        assert_eq!(ctx.text_extents("ab").width, 10.0);
    }

    #[test]
    fn font_size_is_scaled_for_the_surface() {
        let (mut ctx, ops) = ctx_at(1.5);
        ctx.font(FontId(3), 12.0);
        assert_eq!(ops.borrow().last(), Some(&Op::Font(FontId(3), 18.0)));
    }

    struct TestImage {
        w: i32,
        h: i32,
        generation: u64,
        data: Vec<u8>,
        cache: Option<ImageCache>,
    }

    impl TestImage {
        fn new(w: i32, h: i32) -> TestImage {
            TestImage {
                w,
                h,
                generation: 0,
                data: vec![0; (w * h * 3) as usize],
                cache: None,
            }
        }
    }

    impl ImageSource for TestImage {
        fn width(&self) -> i32 {
            self.w
        }
        fn height(&self) -> i32 {
            self.h
        }
        fn generation(&self) -> u64 {
            self.generation
        }
        fn pixels(&self) -> PixelBuf<'_> {
            PixelBuf::new(&self.data, self.w as usize, self.h as usize, 3)
        }
        fn cache(&self) -> Option<ImageCache> {
            self.cache
        }
        fn set_cache(&mut self, cache: Option<ImageCache>) {
            self.cache = cache;
        }
    }

    #[test]
    fn image_cache_is_reused_until_invalidated() {
        let (mut ctx, ops) = ctx_at(2.0);
        let mut img = TestImage::new(10, 10);

        ctx.draw_image(&mut img, 0, 0, 10, 10, 0, 0);
        ctx.draw_image(&mut img, 5, 5, 10, 10, 0, 0);
        let cache_ops = ops
            .borrow()
            .iter()
            .filter(|o| matches!(o, Op::Cache(..)))
            .count();
        // cached at device resolution, exactly once
        assert_eq!(cache_ops, 1);
        assert!(ops.borrow().iter().any(|o| *o == Op::Cache(20, 20)));

        // pixel data change invalidates
        img.generation += 1;
        ctx.draw_image(&mut img, 0, 0, 10, 10, 0, 0);
        assert!(ops.borrow().iter().any(|o| matches!(o, Op::Uncache(_))));
        let cache_ops = ops
            .borrow()
            .iter()
            .filter(|o| matches!(o, Op::Cache(..)))
            .count();
        assert_eq!(cache_ops, 2);

        // scale change invalidates too
        ctx.set_scale(Scale::new(1.0));
        ctx.draw_image(&mut img, 0, 0, 10, 10, 0, 0);
        assert!(ops.borrow().iter().any(|o| *o == Op::Cache(10, 10)));
    }

    #[test]
    fn null_context_is_safe_for_every_operation() {
        let mut ctx = DrawCtx::null();
        ctx.rect(0, 0, 10, 10);
        ctx.rectf(-5, -5, 10, 10);
        ctx.line(0, 0, 100, 100);
        ctx.push_clip(0, 0, 5, 5);
        ctx.begin_polygon();
        ctx.vertex(0.0, 0.0);
        ctx.vertex(1.0, 0.0);
        ctx.vertex(1.0, 1.0);
        ctx.end_polygon();
        ctx.pop_clip();
        ctx.draw_text("hello", 0, 0);
        let mut img = TestImage::new(4, 4);
        ctx.draw_image(&mut img, 0, 0, 4, 4, 0, 0);
        assert!(img.cache().is_none());
        assert_eq!(ctx.width("hello"), 0.0);
    }

    #[test]
    fn surface_stack_is_scoped() {
        let mut stack = SurfaceStack::new();
        assert!(stack.current().is_none());
        stack.push_current(DrawCtx::null());
        assert!(stack.current().is_some());
        let ctx = stack.pop_current();
        assert!(ctx.is_some());
        assert!(stack.pop_current().is_none());
    }
}
