// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! The narrow contract between the drawing context and image objects.

use crate::draw::surface::CacheHandle;

/// A borrowed pixel buffer.
///
/// `depth` is bytes per pixel (1 = grayscale, 3 = RGB, 4 = RGBA);
/// `stride` is bytes per row, at least `width * depth` (extra bytes are row
/// padding and are never read past the pixel data).
#[derive(Clone, Copy, Debug)]
pub struct PixelBuf<'a> {
    pub data: &'a [u8],
    pub width: usize,
    pub height: usize,
    pub depth: usize,
    pub stride: usize,
}

impl<'a> PixelBuf<'a> {
    pub fn new(data: &'a [u8], width: usize, height: usize, depth: usize) -> PixelBuf<'a> {
        PixelBuf {
            data,
            width,
            height,
            depth,
            stride: width * depth,
        }
    }

    pub fn with_stride(mut self, stride: usize) -> PixelBuf<'a> {
        self.stride = stride;
        self
    }

    /// The pixel bytes at `(x, y)`; callers keep coordinates in range.
    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> &[u8] {
        let start = y * self.stride + x * self.depth;
        &self.data[start..start + self.depth]
    }
}

/// Resamples `src` to `dst_width`×`dst_height` with nearest-neighbor
/// sampling, preserving depth; the result is tightly packed
/// (`stride == width * depth`).
///
/// This is the one place where actual pixel resampling happens on the
/// scaled image draw path; everything else is coordinate math.
pub fn rescale_pixels(src: &PixelBuf, dst_width: usize, dst_height: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(dst_width * dst_height * src.depth);
    if src.width == 0 || src.height == 0 || dst_width == 0 || dst_height == 0 {
        return out;
    }
    for dy in 0..dst_height {
        let sy = (dy * src.height / dst_height).min(src.height - 1);
        for dx in 0..dst_width {
            let sx = (dx * src.width / dst_width).min(src.width - 1);
            out.extend_from_slice(src.pixel(sx, sy));
        }
    }
    out
}

/// A backend resource cached for one image instance.
///
/// At most one of these exists per image; it is invalidated (uncached and
/// rebuilt) whenever the image's pixel data, requested size, or the scale
/// it was cached at changes.
#[derive(Copy, Clone, PartialEq, Debug)]
pub struct ImageCache {
    pub handle: CacheHandle,
    /// Cached width in device pixels.
    pub width_px: usize,
    /// Cached height in device pixels.
    pub height_px: usize,
    /// The scale factor the cache was built for.
    pub scale: f64,
    /// Generation counter of the pixel data the cache was built from.
    pub generation: u64,
}

/// What an image object must expose to be drawable.
///
/// The drawing context never touches an image's pixel storage directly;
/// it reads pixels, size and the cache slot exclusively through this
/// interface.
pub trait ImageSource {
    /// Image width in user-space units.
    fn width(&self) -> i32;
    /// Image height in user-space units.
    fn height(&self) -> i32;
    /// A generation counter that changes whenever the pixel data changes.
    fn generation(&self) -> u64;
    fn pixels(&self) -> PixelBuf<'_>;
    /// The private cache slot.
    fn cache(&self) -> Option<ImageCache>;
    fn set_cache(&mut self, cache: Option<ImageCache>);
}

/// The visible part of a requested image draw.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct PreparedDraw {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    /// Content offset into the image, adjusted for the clipping above.
    pub cx: i32,
    pub cy: i32,
}

/// Clips a requested draw rectangle against the image bounds, returning
/// the visible sub-rectangle plus adjusted content offsets, or `None` when
/// nothing is visible.
pub fn prepare(
    img_w: i32,
    img_h: i32,
    x: i32,
    y: i32,
    w: i32,
    h: i32,
    mut cx: i32,
    mut cy: i32,
) -> Option<PreparedDraw> {
    let mut out = PreparedDraw { x, y, w, h, cx, cy };
    if cx < 0 {
        out.w += cx;
        out.x -= cx;
        cx = 0;
    }
    if out.w > img_w - cx {
        out.w = img_w - cx;
    }
    if cy < 0 {
        out.h += cy;
        out.y -= cy;
        cy = 0;
    }
    if out.h > img_h - cy {
        out.h = img_h - cy;
    }
    out.cx = cx;
    out.cy = cy;
    if out.w <= 0 || out.h <= 0 {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepare_clips_against_image_bounds() {
        // Draw an 8x8 window of a 10x10 image with the content shifted so
        // the window hangs off the right/bottom edge.
        let p = prepare(10, 10, 0, 0, 8, 8, 5, 5).unwrap();
        assert_eq!((p.w, p.h), (5, 5));
        assert_eq!((p.cx, p.cy), (5, 5));

        // Negative offsets shift the draw origin instead.
        let p = prepare(10, 10, 0, 0, 8, 8, -2, 0).unwrap();
        assert_eq!((p.x, p.y), (2, 0));
        assert_eq!((p.cx, p.cy), (0, 0));
        assert_eq!(p.w, 6);

        // Fully outside.
        assert!(prepare(10, 10, 0, 0, 8, 8, 20, 0).is_none());
    }

    #[test]
    fn rescale_preserves_depth_and_is_exact_at_integer_ratios() {
        // 2x2 RGB image, doubled to 4x4.
        #[rustfmt::skip]
        let data = [
            1, 1, 1,  2, 2, 2,
            3, 3, 3,  4, 4, 4,
        ];
        let src = PixelBuf::new(&data, 2, 2, 3);
        let out = rescale_pixels(&src, 4, 4);
        assert_eq!(out.len(), 4 * 4 * 3);
        // top-left quadrant is pixel 1, top-right is pixel 2
        assert_eq!(&out[0..3], &[1, 1, 1]);
        assert_eq!(&out[9..12], &[2, 2, 2]);
        assert_eq!(&out[out.len() - 3..], &[4, 4, 4]);
    }

    #[test]
    fn rescale_honors_row_stride() {
        // 2x2 single-channel image with 1 byte of row padding.
        let data = [10, 20, 99, 30, 40, 99];
        let src = PixelBuf::new(&data, 2, 2, 1).with_stride(3);
        let out = rescale_pixels(&src, 2, 2);
        assert_eq!(out, vec![10, 20, 30, 40]);
    }
}
