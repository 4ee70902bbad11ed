//! Plain geometry values in pixel or ratio space.
//!
//! Derived accessors (edges, corners, center) are computed from position and
//! size on demand. Pixel rects use whole numbers after [`Rect::to_pixel_rect`];
//! ratio rects are fractions of a container and are never rounded.

use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Clamps `input` into `[min, max]`, letting `min` win when the bounds cross.
///
/// # Panics
/// Panics when any argument is NaN; callers never pass unvalidated numbers.
pub fn constrain(input: f64, min: f64, max: f64) -> f64 {
    assert!(
        !input.is_nan() && !min.is_nan() && !max.is_nan(),
        "constrain requires numeric arguments: input={input} min={min} max={max}"
    );
    min.max(max.min(input))
}

/// Integer variant of [`constrain`] with the same crossed-bounds rule.
pub fn constrain_ms(input: i64, min: i64, max: i64) -> i64 {
    min.max(max.min(input))
}

/// Rounds to the nearest integer with halves going toward positive infinity.
pub fn round_half_up(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor >= 0.5 {
        floor + 1.0
    } else {
        floor
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn is_empty(self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

impl Add for Size {
    type Output = Size;

    fn add(self, rhs: Size) -> Size {
        Size::new(self.width + rhs.width, self.height + rhs.height)
    }
}

impl Sub for Size {
    type Output = Size;

    fn sub(self, rhs: Size) -> Size {
        Size::new(self.width - rhs.width, self.height - rhs.height)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub position: Point,
    pub size: Size,
}

impl Rect {
    pub const fn new(position: Point, size: Size) -> Self {
        Self { position, size }
    }

    pub const fn from_xywh(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(Point::new(x, y), Size::new(width, height))
    }

    /// Square of side `side` centered on `center`.
    pub fn square_around(center: Point, side: f64) -> Self {
        Self::from_xywh(center.x - side / 2.0, center.y - side / 2.0, side, side)
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn width(&self) -> f64 {
        self.size.width
    }

    pub fn height(&self) -> f64 {
        self.size.height
    }

    pub fn left(&self) -> f64 {
        self.position.x
    }

    pub fn right(&self) -> f64 {
        self.position.x + self.size.width
    }

    pub fn top(&self) -> f64 {
        self.position.y
    }

    pub fn bottom(&self) -> f64 {
        self.position.y + self.size.height
    }

    pub fn top_left(&self) -> Point {
        self.position
    }

    pub fn top_right(&self) -> Point {
        Point::new(self.right(), self.top())
    }

    pub fn bottom_right(&self) -> Point {
        Point::new(self.right(), self.bottom())
    }

    pub fn bottom_left(&self) -> Point {
        Point::new(self.left(), self.bottom())
    }

    pub fn corners(&self) -> [Point; 4] {
        [
            self.top_left(),
            self.top_right(),
            self.bottom_right(),
            self.bottom_left(),
        ]
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.left() + self.width() / 2.0,
            self.top() + self.height() / 2.0,
        )
    }

    /// Zero-height rect along the top side.
    pub fn top_edge(&self) -> Rect {
        Rect::from_xywh(self.left(), self.top(), self.width(), 0.0)
    }

    pub fn right_edge(&self) -> Rect {
        Rect::from_xywh(self.right(), self.top(), 0.0, self.height())
    }

    pub fn bottom_edge(&self) -> Rect {
        Rect::from_xywh(self.left(), self.bottom(), self.width(), 0.0)
    }

    pub fn left_edge(&self) -> Rect {
        Rect::from_xywh(self.left(), self.top(), 0.0, self.height())
    }

    /// Half-open containment: `[left, right) x [top, bottom)`.
    pub fn contains_point(&self, point: Point) -> bool {
        point.x >= self.left()
            && point.x < self.right()
            && point.y >= self.top()
            && point.y < self.bottom()
    }

    /// Position of `point` as fractions of this rect's extent.
    pub fn ratio_point(&self, point: Point) -> Point {
        Point::new(
            (point.x - self.left()) / self.width(),
            (point.y - self.top()) / self.height(),
        )
    }

    pub fn inset(&self, distance: f64) -> Rect {
        Rect::new(
            self.position + Point::new(distance, distance),
            self.size - Size::new(distance * 2.0, distance * 2.0),
        )
    }

    pub fn outset(&self, distance: f64) -> Rect {
        Rect::new(
            self.position - Point::new(distance, distance),
            self.size + Size::new(distance * 2.0, distance * 2.0),
        )
    }

    /// Converts a pixel rect into fractions of `container`.
    pub fn to_ratio_rect(&self, container: Size) -> Rect {
        Rect::from_xywh(
            self.x() / container.width,
            self.y() / container.height,
            self.width() / container.width,
            self.height() / container.height,
        )
    }

    /// Converts a ratio rect into whole pixels of `container`.
    pub fn to_pixel_rect(&self, container: Size) -> Rect {
        Rect::from_xywh(
            round_half_up(self.x() * container.width),
            round_half_up(self.y() * container.height),
            round_half_up(self.width() * container.width),
            round_half_up(self.height() * container.height),
        )
    }
}

/// Millisecond window; mutators keep `start_ms <= end_ms`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeRange {
    pub const fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    pub fn duration_ms(&self) -> i64 {
        self.end_ms - self.start_ms
    }

    pub fn is_within(&self, other: &TimeRange) -> bool {
        self.start_ms >= other.start_ms && self.end_ms <= other.end_ms
    }
}

#[cfg(test)]
mod tests {
    use super::{Point, Rect, Size, TimeRange, constrain, constrain_ms, round_half_up};

    #[test]
    fn square_around_centers_on_point() {
        let square = Rect::square_around(Point::new(10.0, 10.0), 20.0);
        assert_eq!(square, Rect::from_xywh(0.0, 0.0, 20.0, 20.0));
        assert_eq!(square.center(), Point::new(10.0, 10.0));
    }

    #[test]
    fn containment_is_half_open() {
        let rect = Rect::from_xywh(0.0, 0.0, 10.0, 10.0);
        assert!(rect.contains_point(Point::new(0.0, 0.0)));
        assert!(rect.contains_point(Point::new(9.99, 9.99)));
        assert!(!rect.contains_point(Point::new(10.0, 5.0)));
        assert!(!rect.contains_point(Point::new(5.0, 10.0)));
    }

    #[test]
    fn zero_thickness_edge_contains_nothing_until_outset() {
        let rect = Rect::from_xywh(0.0, 0.0, 100.0, 50.0);
        let top = rect.top_edge();
        assert!(!top.contains_point(Point::new(10.0, 0.0)));
        let zone = top.outset(5.0);
        assert_eq!(zone, Rect::from_xywh(-5.0, -5.0, 110.0, 10.0));
        assert!(zone.contains_point(Point::new(10.0, 0.0)));
    }

    #[test]
    fn edges_and_corners_derive_from_position_and_size() {
        let rect = Rect::from_xywh(10.0, 20.0, 30.0, 40.0);
        assert_eq!(rect.right_edge(), Rect::from_xywh(40.0, 20.0, 0.0, 40.0));
        assert_eq!(rect.bottom_edge(), Rect::from_xywh(10.0, 60.0, 30.0, 0.0));
        assert_eq!(rect.left_edge(), Rect::from_xywh(10.0, 20.0, 0.0, 40.0));
        assert_eq!(
            rect.corners(),
            [
                Point::new(10.0, 20.0),
                Point::new(40.0, 20.0),
                Point::new(40.0, 60.0),
                Point::new(10.0, 60.0),
            ]
        );
    }

    #[test]
    fn inset_shrinks_every_side() {
        let region = Rect::from_xywh(0.0, 0.0, 640.0, 360.0).inset(6.0);
        assert_eq!(region, Rect::from_xywh(6.0, 6.0, 628.0, 348.0));
    }

    #[test]
    fn ratio_point_is_relative_to_rect_origin() {
        let rect = Rect::from_xywh(100.0, 0.0, 200.0, 50.0);
        assert_eq!(rect.ratio_point(Point::new(150.0, 25.0)), Point::new(0.25, 0.5));
    }

    #[test]
    fn ratio_round_trip_stays_within_one_pixel() {
        let containers = [Size::new(640.0, 360.0), Size::new(333.0, 177.0), Size::new(7.0, 3.0)];
        let rects = [
            Rect::from_xywh(0.0, 0.0, 640.0, 360.0),
            Rect::from_xywh(13.0, 27.0, 101.0, 55.0),
            Rect::from_xywh(1.0, 2.0, 3.0, 1.0),
        ];
        for container in containers {
            for rect in rects {
                let back = rect.to_ratio_rect(container).to_pixel_rect(container);
                assert!((back.x() - rect.x()).abs() <= 1.0);
                assert!((back.y() - rect.y()).abs() <= 1.0);
                assert!((back.width() - rect.width()).abs() <= 1.0);
                assert!((back.height() - rect.height()).abs() <= 1.0);
            }
        }
    }

    #[test]
    fn pixel_rect_rounds_halves_up() {
        let ratio = Rect::from_xywh(0.25, 0.5, 0.5, 0.25);
        let pixels = ratio.to_pixel_rect(Size::new(10.0, 10.0));
        assert_eq!(pixels, Rect::from_xywh(3.0, 5.0, 5.0, 3.0));
        assert_eq!(round_half_up(-0.5), 0.0);
        assert_eq!(round_half_up(-0.6), -1.0);
    }

    #[test]
    fn constrain_lets_min_win_on_crossed_bounds() {
        assert_eq!(constrain(5.0, 0.0, 10.0), 5.0);
        assert_eq!(constrain(-1.0, 0.0, 10.0), 0.0);
        assert_eq!(constrain(3.0, 24.0, 10.0), 24.0);
        assert_eq!(constrain_ms(50, 0, -10), 0);
    }

    #[test]
    #[should_panic(expected = "constrain requires numeric arguments")]
    fn constrain_panics_on_nan_bound() {
        constrain(1.0, f64::NAN, 2.0);
    }

    #[test]
    fn time_range_duration_is_derived() {
        let range = TimeRange::new(2_000, 5_000);
        assert_eq!(range.duration_ms(), 3_000);
        assert!(range.is_within(&TimeRange::new(0, 5_000)));
        assert!(!range.is_within(&TimeRange::new(2_500, 6_000)));
    }
}
