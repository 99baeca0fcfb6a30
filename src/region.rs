// Copyright 2026 the Lumen Authors
// SPDX-License-Identifier: Apache-2.0

//! Rectangle-set regions and the bounded clip stack.

use crate::error::StackError;
use crate::kurbo::{Rect, Vec2};
use crate::scale::{Scalable, Scale};

/// Depth of the clip stack.
pub const REGION_STACK_DEPTH: usize = 10;

/// A union of rectangles, used for clipping and for describing an area that
/// needs to be repainted.
#[derive(Clone, Debug, Default)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    /// The empty region.
    pub const EMPTY: Region = Region { rects: Vec::new() };

    /// Returns the collection of rectangles making up this region.
    #[inline]
    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Adds a rectangle to this region.
    pub fn add_rect(&mut self, rect: Rect) {
        if rect.area() > 0.0 {
            self.rects.push(rect);
        }
    }

    /// Replaces this region with a single rectangle.
    pub fn set_rect(&mut self, rect: Rect) {
        self.clear();
        self.add_rect(rect);
    }

    /// Sets this region to the empty region.
    pub fn clear(&mut self) {
        self.rects.clear();
    }

    /// Returns a rectangle containing this region.
    pub fn bounding_box(&self) -> Rect {
        if self.rects.is_empty() {
            Rect::ZERO
        } else {
            self.rects[1..]
                .iter()
                .fold(self.rects[0], |r, s| r.union(*s))
        }
    }

    /// Returns `true` if this region has a non-empty intersection with the
    /// given rectangle.
    pub fn intersects(&self, rect: Rect) -> bool {
        self.rects.iter().any(|r| r.intersect(rect).area() > 0.0)
    }

    /// Returns `true` if this region is empty.
    pub fn is_empty(&self) -> bool {
        // Note that we only ever add non-empty rects to self.rects.
        self.rects.is_empty()
    }

    /// Modifies this region by including everything in the other region.
    pub fn union_with(&mut self, other: &Region) {
        self.rects.extend_from_slice(&other.rects);
    }

    /// Modifies this region by intersecting it with the given rectangle.
    pub fn intersect_with(&mut self, rect: Rect) {
        for r in &mut self.rects {
            *r = r.intersect(rect);
        }
        self.rects.retain(|r| r.area() > 0.0)
    }

    /// The bounding box of the part of `rect` inside this region, and
    /// whether `rect` was entirely inside.
    pub fn clip_box(&self, rect: Rect) -> (Rect, bool) {
        let mut visible = Rect::ZERO;
        let mut any = false;
        for r in &self.rects {
            let i = r.intersect(rect);
            if i.area() > 0.0 {
                visible = if any { visible.union(i) } else { i };
                any = true;
            }
        }
        if !any {
            // Keep the origin so callers can still position against it.
            (Rect::new(rect.x0, rect.y0, rect.x0, rect.y0), false)
        } else {
            (visible, visible == rect)
        }
    }
}

impl Scalable for Region {
    fn to_px(&self, scale: Scale) -> Region {
        Region {
            rects: self.rects.iter().map(|r| r.to_px(scale)).collect(),
        }
    }

    fn to_dp(&self, scale: Scale) -> Region {
        Region {
            rects: self.rects.iter().map(|r| r.to_dp(scale)).collect(),
        }
    }
}

impl std::ops::AddAssign<Vec2> for Region {
    fn add_assign(&mut self, rhs: Vec2) {
        for r in &mut self.rects {
            *r = *r + rhs;
        }
    }
}

impl std::ops::SubAssign<Vec2> for Region {
    fn sub_assign(&mut self, rhs: Vec2) {
        for r in &mut self.rects {
            *r = *r - rhs;
        }
    }
}

impl From<Rect> for Region {
    fn from(rect: Rect) -> Region {
        Region { rects: vec![rect] }
    }
}

/// A bounded stack of nested clips.
///
/// Each entry is either a [`Region`] or `None`, meaning "no restriction".
/// Entry 0 is the outermost, widget-assigned clip. An empty stack behaves
/// like a single `None` entry. Pushing a clip intersects it with the
/// current one, so nesting can only ever shrink the visible area.
#[derive(Clone, Debug, Default)]
pub struct ClipStack {
    stack: Vec<Option<Region>>,
}

impl ClipStack {
    pub fn new() -> ClipStack {
        ClipStack { stack: Vec::new() }
    }

    /// The active clip; `None` means drawing is unrestricted.
    #[inline]
    pub fn current(&self) -> Option<&Region> {
        match self.stack.last() {
            Some(Some(region)) => Some(region),
            _ => None,
        }
    }

    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Replaces the whole stack with a single outermost clip.
    pub fn reset(&mut self, base: Option<Region>) {
        self.stack.clear();
        self.stack.push(base);
    }

    /// Pushes the intersection of `rect` with the current clip.
    pub fn push_clip(&mut self, rect: Rect) -> Result<(), StackError> {
        if self.stack.len() == REGION_STACK_DEPTH {
            return Err(StackError::Overflow);
        }
        let mut region = match self.current() {
            Some(current) => {
                let mut r = current.clone();
                r.intersect_with(rect);
                r
            }
            None => Region::from(rect),
        };
        if rect.area() <= 0.0 {
            region.clear();
        }
        self.stack.push(Some(region));
        Ok(())
    }

    /// Pushes "no restriction", disabling clipping until the matching pop.
    pub fn push_no_clip(&mut self) -> Result<(), StackError> {
        if self.stack.len() == REGION_STACK_DEPTH {
            return Err(StackError::Overflow);
        }
        self.stack.push(None);
        Ok(())
    }

    /// Restores the previous clip.
    pub fn pop_clip(&mut self) -> Result<(), StackError> {
        match self.stack.pop() {
            Some(_) => Ok(()),
            None => Err(StackError::Underflow),
        }
    }

    /// The visible part of `rect` under the current clip, plus whether it
    /// was entirely visible.
    pub fn clip_box(&self, rect: Rect) -> (Rect, bool) {
        match self.current() {
            Some(region) => region.clip_box(rect),
            None => (rect, true),
        }
    }

    /// Fast reject: does any part of `rect` survive the current clip?
    pub fn not_clipped(&self, rect: Rect) -> bool {
        match self.current() {
            Some(region) => region.intersects(rect),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_intersection_is_commutative_in_effect() {
        let a = Rect::new(0.0, 0.0, 100.0, 100.0);
        let b = Rect::new(50.0, 20.0, 150.0, 120.0);

        let mut ab = ClipStack::new();
        ab.push_clip(a).unwrap();
        ab.push_clip(b).unwrap();

        let mut ba = ClipStack::new();
        ba.push_clip(b).unwrap();
        ba.push_clip(a).unwrap();

        let probe = Rect::new(0.0, 0.0, 200.0, 200.0);
        assert_eq!(ab.clip_box(probe), ba.clip_box(probe));
        assert_eq!(ab.clip_box(probe).0, Rect::new(50.0, 20.0, 100.0, 100.0));
    }

    #[test]
    fn no_clip_disables_clipping_until_pop() {
        let mut clips = ClipStack::new();
        clips.push_clip(Rect::new(0.0, 0.0, 10.0, 10.0)).unwrap();
        assert!(!clips.not_clipped(Rect::new(20.0, 20.0, 30.0, 30.0)));

        clips.push_no_clip().unwrap();
        assert!(clips.not_clipped(Rect::new(20.0, 20.0, 30.0, 30.0)));

        clips.pop_clip().unwrap();
        assert!(!clips.not_clipped(Rect::new(20.0, 20.0, 30.0, 30.0)));
    }

    #[test]
    fn pop_past_empty_is_an_error() {
        let mut clips = ClipStack::new();
        clips.push_clip(Rect::new(0.0, 0.0, 1.0, 1.0)).unwrap();
        assert_eq!(clips.pop_clip(), Ok(()));
        assert_eq!(clips.pop_clip(), Err(StackError::Underflow));
    }

    #[test]
    fn overflow_is_reported() {
        let mut clips = ClipStack::new();
        for _ in 0..REGION_STACK_DEPTH {
            clips.push_no_clip().unwrap();
        }
        assert_eq!(
            clips.push_clip(Rect::new(0.0, 0.0, 1.0, 1.0)),
            Err(StackError::Overflow)
        );
    }

    #[test]
    fn clip_box_reports_full_visibility() {
        let mut clips = ClipStack::new();
        clips.push_clip(Rect::new(0.0, 0.0, 100.0, 100.0)).unwrap();

        let inside = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert_eq!(clips.clip_box(inside), (inside, true));

        let partial = Rect::new(90.0, 90.0, 110.0, 110.0);
        let (visible, full) = clips.clip_box(partial);
        assert_eq!(visible, Rect::new(90.0, 90.0, 100.0, 100.0));
        assert!(!full);

        let outside = Rect::new(200.0, 200.0, 210.0, 210.0);
        let (visible, full) = clips.clip_box(outside);
        assert_eq!(visible.area(), 0.0);
        assert!(!full);
    }

    #[test]
    fn nested_clips_only_shrink() {
        let mut clips = ClipStack::new();
        clips.reset(Some(Region::from(Rect::new(0.0, 0.0, 50.0, 50.0))));
        clips.push_clip(Rect::new(-10.0, -10.0, 100.0, 100.0)).unwrap();
        // The inner push is larger, but the result stays inside the base.
        assert_eq!(
            clips.clip_box(Rect::new(0.0, 0.0, 100.0, 100.0)).0,
            Rect::new(0.0, 0.0, 50.0, 50.0)
        );
    }
}
