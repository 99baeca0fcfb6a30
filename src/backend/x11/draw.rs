// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! The core-protocol X11 rendering surface.
//!
//! Everything here is device pixels; user-space scaling happened one layer
//! up. Rendering errors are logged rather than propagated: a failed draw
//! usually means the connection is going away, and there is nothing a
//! widget could do about it mid-paint.

use std::cell::RefCell;
use std::rc::Rc;

use x11rb::connection::Connection;
use x11rb::protocol::xproto::{
    Arc as XArc, ArcMode, ChangeGCAux, ClipOrdering, ConnectionExt, CoordMode, FillRule, Font,
    Gcontext, ImageFormat, LineStyle as XLineStyle, Point as XPoint, PolyShape,
    Rectangle as XRectangle,
};
use x11rb::xcb_ffi::XCBConnection;

use crate::draw::image::PixelBuf;
use crate::draw::surface::{
    CacheHandle, Color, DeviceSurface, FontId, LineStyle, SurfaceFeatures, TextExtents,
};
use crate::kurbo::Point;
use crate::region::Region;

/// XLFD family/weight/slant triples, indexed by [`FontId`].
///
/// Follows the classic core-font toolkit set: sans, serif and monospace,
/// each in regular/bold/italic/bold-italic.
const FONT_FACES: &[(&str, &str, &str)] = &[
    ("helvetica", "medium", "r"),
    ("helvetica", "bold", "r"),
    ("helvetica", "medium", "o"),
    ("helvetica", "bold", "o"),
    ("courier", "medium", "r"),
    ("courier", "bold", "r"),
    ("courier", "medium", "o"),
    ("courier", "bold", "o"),
    ("times", "medium", "r"),
    ("times", "bold", "r"),
    ("times", "medium", "i"),
    ("times", "bold", "i"),
];

struct LoadedFont {
    fid: Font,
    ascent: i16,
    descent: i16,
}

/// A drawing surface backed by an X drawable and one graphics context.
///
/// The server-side GC and any loaded font are freed on drop.
pub(crate) struct X11Surface {
    conn: Rc<XCBConnection>,
    drawable: u32,
    gc: Gcontext,
    depth: u8,
    font: RefCell<Option<LoadedFont>>,
}

/// Rounds a device coordinate to the protocol's i16 coordinate space.
fn xi(v: f64) -> i16 {
    v.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
}

fn xu(v: f64) -> u16 {
    v.round().clamp(0.0, u16::MAX as f64) as u16
}

fn xpoints(pts: &[Point]) -> Vec<XPoint> {
    pts.iter()
        .map(|p| XPoint {
            x: xi(p.x),
            y: xi(p.y),
        })
        .collect()
}

/// Arc angles are in 1/64ths of a degree, the second one relative to the
/// first.
fn xangles(a1: f64, a2: f64) -> (i16, i16) {
    ((a1 * 64.0) as i16, ((a2 - a1) * 64.0) as i16)
}

/// TrueColor pixel with the conventional 8-bits-per-channel layout.
fn pixel(color: Color) -> u32 {
    (color.r as u32) << 16 | (color.g as u32) << 8 | color.b as u32
}

impl X11Surface {
    pub fn new(conn: Rc<XCBConnection>, drawable: u32, depth: u8) -> Result<X11Surface, anyhow::Error> {
        use anyhow::Context;
        let gc = conn.generate_id()?;
        conn.create_gc(gc, drawable, &x11rb::protocol::xproto::CreateGCAux::new())?
            .check()
            .context("create graphics context")?;
        Ok(X11Surface {
            conn,
            drawable,
            gc,
            depth,
            font: RefCell::new(None),
        })
    }

    fn text_char2bs(text: &str) -> Vec<x11rb::protocol::xproto::Char2b> {
        // Core fonts index glyphs by byte; non-latin1 text needs a real
        // text stack and degrades to per-byte glyphs here.
        text.bytes()
            .map(|b| x11rb::protocol::xproto::Char2b { byte1: 0, byte2: b })
            .collect()
    }

    fn free_server_resources(&self) {
        if let Some(font) = self.font.borrow_mut().take() {
            log_x11!(self.conn.close_font(font.fid));
        }
        log_x11!(self.conn.free_gc(self.gc));
    }

    /// Convert to the wire format for a depth-24/32 ZPixmap, one pixel per
    /// 32-bit word.
    fn to_zpixmap(pixels: &PixelBuf) -> Vec<u8> {
        let mut out = Vec::with_capacity(pixels.width * pixels.height * 4);
        for y in 0..pixels.height {
            for x in 0..pixels.width {
                let px = pixels.pixel(x, y);
                let (r, g, b) = match pixels.depth {
                    1 => (px[0], px[0], px[0]),
                    3 | 4 => (px[0], px[1], px[2]),
                    _ => (0, 0, 0),
                };
                out.extend_from_slice(&[b, g, r, 0]);
            }
        }
        out
    }
}

impl Drop for X11Surface {
    fn drop(&mut self) {
        self.free_server_resources();
    }
}

impl DeviceSurface for X11Surface {
    fn features(&self) -> SurfaceFeatures {
        SurfaceFeatures::NATIVE
    }

    fn point(&mut self, x: f64, y: f64) {
        let pts = [XPoint { x: xi(x), y: xi(y) }];
        log_x11!(self
            .conn
            .poly_point(CoordMode::ORIGIN, self.drawable, self.gc, &pts));
    }

    fn line(&mut self, x0: f64, y0: f64, x1: f64, y1: f64) {
        let pts = [
            XPoint {
                x: xi(x0),
                y: xi(y0),
            },
            XPoint {
                x: xi(x1),
                y: xi(y1),
            },
        ];
        log_x11!(self
            .conn
            .poly_line(CoordMode::ORIGIN, self.drawable, self.gc, &pts));
    }

    fn polyline(&mut self, pts: &[Point]) {
        log_x11!(self.conn.poly_line(
            CoordMode::ORIGIN,
            self.drawable,
            self.gc,
            &xpoints(pts)
        ));
    }

    fn closed_loop(&mut self, pts: &[Point]) {
        let mut device = xpoints(pts);
        if let Some(&first) = device.first() {
            device.push(first);
        }
        log_x11!(self
            .conn
            .poly_line(CoordMode::ORIGIN, self.drawable, self.gc, &device));
    }

    fn fill_polygon(&mut self, pts: &[Point]) {
        log_x11!(self.conn.fill_poly(
            self.drawable,
            self.gc,
            PolyShape::CONVEX,
            CoordMode::ORIGIN,
            &xpoints(pts),
        ));
    }

    fn fill_complex_polygon(&mut self, contours: &[Vec<Point>]) {
        // One FillPoly under the even-odd rule; each contour is closed by
        // repeating its first vertex, so holes cancel the fill.
        let mut device = Vec::new();
        for contour in contours {
            let pts = xpoints(contour);
            if let Some(&first) = pts.first() {
                device.extend_from_slice(&pts);
                device.push(first);
            }
        }
        log_x11!(self
            .conn
            .change_gc(self.gc, &ChangeGCAux::new().fill_rule(FillRule::EVEN_ODD)));
        log_x11!(self.conn.fill_poly(
            self.drawable,
            self.gc,
            PolyShape::COMPLEX,
            CoordMode::ORIGIN,
            &device,
        ));
        log_x11!(self
            .conn
            .change_gc(self.gc, &ChangeGCAux::new().fill_rule(FillRule::WINDING)));
    }

    fn rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let rects = [XRectangle {
            x: xi(x),
            y: xi(y),
            // outline rects cover [x, x+w); the protocol draws through
            // x+width, hence the -1
            width: xu(w).saturating_sub(1),
            height: xu(h).saturating_sub(1),
        }];
        log_x11!(self.conn.poly_rectangle(self.drawable, self.gc, &rects));
    }

    fn fill_rect(&mut self, x: f64, y: f64, w: f64, h: f64) {
        let rects = [XRectangle {
            x: xi(x),
            y: xi(y),
            width: xu(w),
            height: xu(h),
        }];
        log_x11!(self
            .conn
            .poly_fill_rectangle(self.drawable, self.gc, &rects));
    }

    fn arc(&mut self, x: f64, y: f64, w: f64, h: f64, a1: f64, a2: f64) {
        let (angle1, angle2) = xangles(a1, a2);
        let arcs = [XArc {
            x: xi(x),
            y: xi(y),
            width: xu(w),
            height: xu(h),
            angle1,
            angle2,
        }];
        log_x11!(self.conn.poly_arc(self.drawable, self.gc, &arcs));
    }

    fn pie(&mut self, x: f64, y: f64, w: f64, h: f64, a1: f64, a2: f64) {
        let (angle1, angle2) = xangles(a1, a2);
        let arcs = [XArc {
            x: xi(x),
            y: xi(y),
            width: xu(w),
            height: xu(h),
            angle1,
            angle2,
        }];
        log_x11!(self
            .conn
            .change_gc(self.gc, &ChangeGCAux::new().arc_mode(ArcMode::PIE_SLICE)));
        log_x11!(self.conn.poly_fill_arc(self.drawable, self.gc, &arcs));
    }

    fn set_color(&mut self, color: Color) {
        log_x11!(self
            .conn
            .change_gc(self.gc, &ChangeGCAux::new().foreground(pixel(color))));
    }

    fn set_line_style(&mut self, style: LineStyle, width_px: f64) {
        let width = width_px.round().max(0.0) as u32;
        let x_style = match style {
            LineStyle::Solid => XLineStyle::SOLID,
            _ => XLineStyle::ON_OFF_DASH,
        };
        log_x11!(self.conn.change_gc(
            self.gc,
            &ChangeGCAux::new().line_width(width).line_style(x_style)
        ));
        if x_style == XLineStyle::ON_OFF_DASH {
            // Dash lengths follow the line width so patterns stay legible
            // when lines get thicker.
            let unit = width.max(1) as u8;
            let dashes: Vec<u8> = match style {
                LineStyle::Dash => vec![unit.saturating_mul(3), unit.saturating_mul(3)],
                LineStyle::Dot => vec![unit, unit.saturating_mul(2)],
                LineStyle::DashDot => vec![
                    unit.saturating_mul(3),
                    unit.saturating_mul(2),
                    unit,
                    unit.saturating_mul(2),
                ],
                LineStyle::Solid => unreachable!(),
            };
            log_x11!(self.conn.set_dashes(self.gc, 0, &dashes));
        }
    }

    fn set_clip(&mut self, region: Option<&Region>) {
        match region {
            Some(region) => {
                let rects: Vec<XRectangle> = region
                    .rects()
                    .iter()
                    .map(|r| XRectangle {
                        x: xi(r.x0),
                        y: xi(r.y0),
                        width: xu(r.width()),
                        height: xu(r.height()),
                    })
                    .collect();
                log_x11!(self
                    .conn
                    .set_clip_rectangles(ClipOrdering::UNSORTED, self.gc, 0, 0, &rects));
            }
            None => {
                log_x11!(self
                    .conn
                    .change_gc(self.gc, &ChangeGCAux::new().clip_mask(x11rb::NONE)));
            }
        }
    }

    fn set_font(&mut self, face: FontId, size_px: f64) {
        let (family, weight, slant) = FONT_FACES
            .get(face.0 as usize)
            .copied()
            .unwrap_or(FONT_FACES[0]);
        let px = size_px.round().max(1.0) as u32;
        let xlfd = format!("-*-{family}-{weight}-{slant}-normal--{px}-*-*-*-*-*-iso8859-1");

        let open = |name: &str| -> Result<LoadedFont, anyhow::Error> {
            use anyhow::Context;
            let fid = self.conn.generate_id()?;
            self.conn
                .open_font(fid, name.as_bytes())?
                .check()
                .with_context(|| format!("open font {name}"))?;
            let info = self.conn.query_font(fid)?.reply().context("query font")?;
            Ok(LoadedFont {
                fid,
                ascent: info.font_ascent,
                descent: info.font_descent,
            })
        };

        let loaded = open(&xlfd).or_else(|e| {
            tracing::warn!("falling back to the server's fixed font: {e:#}");
            open("fixed")
        });
        match loaded {
            Ok(font) => {
                log_x11!(self
                    .conn
                    .change_gc(self.gc, &ChangeGCAux::new().font(font.fid)));
                if let Some(old) = self.font.borrow_mut().replace(font) {
                    log_x11!(self.conn.close_font(old.fid));
                }
            }
            Err(e) => tracing::error!("no usable font: {e:#}"),
        }
    }

    fn text_width(&self, text: &str) -> f64 {
        let font = self.font.borrow();
        let Some(font) = font.as_ref() else {
            return 0.0;
        };
        let reply = self
            .conn
            .query_text_extents(font.fid, &Self::text_char2bs(text))
            .ok()
            .and_then(|cookie| cookie.reply().ok());
        match reply {
            Some(reply) => reply.overall_width as f64,
            None => 0.0,
        }
    }

    fn line_height(&self) -> f64 {
        match self.font.borrow().as_ref() {
            Some(font) => (font.ascent + font.descent) as f64,
            None => 0.0,
        }
    }

    fn descent(&self) -> f64 {
        match self.font.borrow().as_ref() {
            Some(font) => font.descent as f64,
            None => 0.0,
        }
    }

    fn text_extents(&self, text: &str) -> TextExtents {
        let font = self.font.borrow();
        let Some(font) = font.as_ref() else {
            return TextExtents::default();
        };
        let reply = self
            .conn
            .query_text_extents(font.fid, &Self::text_char2bs(text))
            .ok()
            .and_then(|cookie| cookie.reply().ok());
        match reply {
            Some(reply) => TextExtents {
                dx: reply.overall_left as f64,
                dy: -(reply.overall_ascent as f64),
                width: (reply.overall_right - reply.overall_left) as f64,
                height: (reply.overall_ascent + reply.overall_descent) as f64,
            },
            None => TextExtents::default(),
        }
    }

    fn draw_text(&mut self, text: &str, x: f64, y: f64, angle: f64) {
        if angle != 0.0 {
            // Core-protocol text cannot rotate; glyphs land unrotated at
            // the requested origin.
            tracing::debug!("rotated text is not supported by the core protocol");
        }
        // PolyText8 wire format: each item is a length byte, a font delta
        // byte and up to 254 glyph bytes.
        let mut items = Vec::with_capacity(text.len() + 2);
        for chunk in text.as_bytes().chunks(254) {
            items.push(chunk.len() as u8);
            items.push(0);
            items.extend_from_slice(chunk);
        }
        log_x11!(self
            .conn
            .poly_text8(self.drawable, self.gc, xi(x), xi(y), &items));
    }

    fn rtl_draw_text(&mut self, text: &str, x: f64, y: f64) {
        let width = self.text_width(text);
        self.draw_text(text, x - width, y, 0.0);
    }

    fn cache_image(&mut self, pixels: &PixelBuf) -> Option<CacheHandle> {
        let make = || -> Result<u32, anyhow::Error> {
            use anyhow::Context;
            let pid = self.conn.generate_id()?;
            self.conn
                .create_pixmap(
                    self.depth,
                    pid,
                    self.drawable,
                    pixels.width as u16,
                    pixels.height as u16,
                )?
                .check()
                .context("create image pixmap")?;
            self.conn
                .put_image(
                    ImageFormat::Z_PIXMAP,
                    pid,
                    self.gc,
                    pixels.width as u16,
                    pixels.height as u16,
                    0,
                    0,
                    0,
                    self.depth,
                    &Self::to_zpixmap(pixels),
                )?
                .check()
                .context("upload image pixels")?;
            Ok(pid)
        };
        match make() {
            Ok(pid) => Some(CacheHandle(pid as u64)),
            Err(e) => {
                tracing::error!("failed to cache image: {e:#}");
                None
            }
        }
    }

    fn uncache_image(&mut self, handle: CacheHandle) {
        log_x11!(self.conn.free_pixmap(handle.0 as u32));
    }

    fn draw_cached_image(
        &mut self,
        handle: CacheHandle,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        cx: f64,
        cy: f64,
    ) {
        log_x11!(self.conn.copy_area(
            handle.0 as u32,
            self.drawable,
            self.gc,
            xi(cx),
            xi(cy),
            xi(x),
            xi(y),
            xu(w),
            xu(h),
        ));
    }

    fn draw_image(&mut self, pixels: &PixelBuf, x: f64, y: f64) {
        log_x11!(self.conn.put_image(
            ImageFormat::Z_PIXMAP,
            self.drawable,
            self.gc,
            pixels.width as u16,
            pixels.height as u16,
            xi(x),
            xi(y),
            0,
            self.depth,
            &Self::to_zpixmap(pixels),
        ));
    }

    fn copy_offscreen(
        &mut self,
        x: f64,
        y: f64,
        w: f64,
        h: f64,
        offscreen: CacheHandle,
        src_x: f64,
        src_y: f64,
    ) {
        log_x11!(self.conn.copy_area(
            offscreen.0 as u32,
            self.drawable,
            self.gc,
            xi(src_x),
            xi(src_y),
            xi(x),
            xi(y),
            xu(w),
            xu(h),
        ));
    }
}
