// Geometry module
// Points, sizes and rectangles in image space, plus the origin clamp

use std::ops::{Add, Sub};

/// A point (or offset) in image coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x.saturating_add(rhs.x), self.y.saturating_add(rhs.y))
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x.saturating_sub(rhs.x), self.y.saturating_sub(rhs.y))
    }
}

/// Width and height of the visible canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }
}

/// Half-open rectangle `[min, max)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rect {
    pub min: Point,
    pub max: Point,
}

impl Rect {
    pub const fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    /// Rectangle anchored at `origin` spanning `size`
    pub fn from_origin(origin: Point, size: Size) -> Self {
        Self::new(origin, origin + Point::new(size.width, size.height))
    }

    pub fn dx(&self) -> i32 {
        self.max.x - self.min.x
    }

    pub fn dy(&self) -> i32 {
        self.max.y - self.min.y
    }

    pub fn size(&self) -> Size {
        Size::new(self.dx(), self.dy())
    }

    /// Largest rectangle contained by both; empty rectangles collapse to zero size
    pub fn intersect(&self, other: &Rect) -> Rect {
        let min = Point::new(self.min.x.max(other.min.x), self.min.y.max(other.min.y));
        let max = Point::new(self.max.x.min(other.max.x), self.max.y.min(other.max.y));
        if max.x <= min.x || max.y <= min.y {
            return Rect::new(min, min);
        }
        Rect::new(min, max)
    }
}

/// Restrict a candidate origin to the scrollable range of an image.
///
/// Panning can never go past the far edge of the image, and whenever the
/// canvas is wider (or taller) than the image the origin is pinned to 0 on
/// that axis. Without an image the origin is always `(0, 0)`.
pub fn clamp_origin(pt: Point, window: Size, bounds: Option<Rect>) -> Point {
    let Some(bounds) = bounds else {
        return Point::ZERO;
    };

    let slack_x = bounds.dx() - window.width;
    let slack_y = bounds.dy() - window.height;

    let mut x = pt.x.max(0).min(bounds.min.x + slack_x);
    let mut y = pt.y.max(0).min(bounds.min.y + slack_y);

    if bounds.dx() < window.width {
        x = 0;
    }
    if bounds.dy() < window.height {
        y = 0;
    }

    Point::new(x, y)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn image(w: i32, h: i32) -> Option<Rect> {
        Some(Rect::new(Point::ZERO, Point::new(w, h)))
    }

    #[test]
    fn no_image_always_yields_zero() {
        let pt = clamp_origin(Point::new(57, -3), Size::new(400, 300), None);
        assert_eq!(pt, Point::ZERO);
    }

    #[test]
    fn large_shift_stops_at_maximum_slack() {
        let pt = clamp_origin(Point::new(1000, 1000), Size::new(400, 300), image(800, 600));
        assert_eq!(pt, Point::new(400, 300));
    }

    #[test]
    fn negative_input_clamps_to_zero() {
        let pt = clamp_origin(Point::new(-50, -1), Size::new(400, 300), image(800, 600));
        assert_eq!(pt, Point::ZERO);
    }

    #[test]
    fn in_range_point_is_untouched() {
        let pt = clamp_origin(Point::new(120, 45), Size::new(400, 300), image(800, 600));
        assert_eq!(pt, Point::new(120, 45));
    }

    #[test]
    fn narrow_image_pins_x_only() {
        let pt = clamp_origin(Point::new(90, 90), Size::new(400, 300), image(200, 600));
        assert_eq!(pt, Point::new(0, 90));
    }

    #[test]
    fn short_image_pins_y_only() {
        let pt = clamp_origin(Point::new(90, 90), Size::new(400, 300), image(800, 100));
        assert_eq!(pt, Point::new(90, 0));
    }

    #[test]
    fn zero_size_image_pins_both_axes() {
        let pt = clamp_origin(Point::new(12, 34), Size::new(400, 300), image(0, 0));
        assert_eq!(pt, Point::ZERO);
    }

    #[test]
    fn image_matching_window_has_no_slack() {
        let pt = clamp_origin(Point::new(5, 5), Size::new(400, 300), image(400, 300));
        assert_eq!(pt, Point::ZERO);
    }

    #[test]
    fn clamp_is_idempotent_and_in_range() {
        let windows = [Size::new(1, 1), Size::new(400, 300), Size::new(1024, 768)];
        let images = [(0, 0), (1, 1), (200, 100), (800, 600), (4000, 50)];
        let points = [
            Point::new(-1000, -1000),
            Point::ZERO,
            Point::new(7, 3),
            Point::new(399, 299),
            Point::new(5000, 5000),
            Point::new(i32::MAX, i32::MIN),
        ];

        for window in windows {
            for (w, h) in images {
                let bounds = image(w, h);
                for pt in points {
                    let once = clamp_origin(pt, window, bounds);
                    let twice = clamp_origin(once, window, bounds);
                    assert_eq!(once, twice, "window {:?} image {}x{} pt {:?}", window, w, h, pt);

                    assert!(once.x >= 0 && once.x <= (w - window.width).max(0));
                    assert!(once.y >= 0 && once.y <= (h - window.height).max(0));
                }
            }
        }
    }

    #[test]
    fn offset_bounds_use_their_minimum_as_reference() {
        let bounds = Some(Rect::new(Point::new(10, 10), Point::new(810, 610)));
        let pt = clamp_origin(Point::new(5000, 5000), Size::new(400, 300), bounds);
        assert_eq!(pt, Point::new(410, 310));
    }

    #[test]
    fn intersect_clips_to_overlap() {
        let a = Rect::new(Point::ZERO, Point::new(800, 600));
        let b = Rect::from_origin(Point::new(600, 500), Size::new(400, 300));
        assert_eq!(a.intersect(&b), Rect::new(Point::new(600, 500), Point::new(800, 600)));

        let far = Rect::from_origin(Point::new(900, 900), Size::new(10, 10));
        assert_eq!(a.intersect(&far).size(), Size::new(0, 0));
    }
}
