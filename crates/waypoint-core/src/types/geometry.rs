//! Screen geometry in integer pixel coordinates.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A point on the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Location {
    pub x: i32,
    pub y: i32,
}

impl Location {
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An axis-aligned rectangle. `x2`/`y2` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Region {
    #[must_use]
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    /// Build the smallest region spanning two corner locations.
    #[must_use]
    pub fn from_corners(a: Location, b: Location) -> Self {
        let x = a.x.min(b.x);
        let y = a.y.min(b.y);
        Self::new(x, y, span(a.x, b.x), span(a.y, b.y))
    }

    #[must_use]
    pub const fn x2(&self) -> i32 {
        self.x.saturating_add(self.w)
    }

    #[must_use]
    pub const fn y2(&self) -> i32 {
        self.y.saturating_add(self.h)
    }

    /// Area in square pixels; zero for degenerate regions.
    #[must_use]
    pub fn area(&self) -> i64 {
        if self.w <= 0 || self.h <= 0 {
            return 0;
        }
        i64::from(self.w) * i64::from(self.h)
    }

    /// A region is defined when it has a strictly positive area.
    #[must_use]
    pub fn is_defined(&self) -> bool {
        self.area() > 0
    }

    #[must_use]
    pub fn center(&self) -> Location {
        Location::new(self.x.saturating_add(self.w / 2), self.y.saturating_add(self.h / 2))
    }

    /// The overlapping rectangle, if the regions share any area.
    #[must_use]
    pub fn intersection(&self, other: &Region) -> Option<Region> {
        let x = self.x.max(other.x);
        let y = self.y.max(other.y);
        let x2 = self.x2().min(other.x2());
        let y2 = self.y2().min(other.y2());
        if x2 <= x || y2 <= y {
            return None;
        }
        Some(Region::new(x, y, x2.saturating_sub(x), y2.saturating_sub(y)))
    }

    #[must_use]
    pub fn overlaps(&self, other: &Region) -> bool {
        self.intersection(other).is_some()
    }

    /// Bounding box of both regions.
    #[must_use]
    pub fn union(&self, other: &Region) -> Region {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let x2 = self.x2().max(other.x2());
        let y2 = self.y2().max(other.y2());
        Region::new(x, y, x2.saturating_sub(x), y2.saturating_sub(y))
    }

    /// Whether `other` lies entirely inside this region.
    #[must_use]
    pub fn contains(&self, other: &Region) -> bool {
        other.x >= self.x && other.y >= self.y && other.x2() <= self.x2() && other.y2() <= self.y2()
    }

    #[must_use]
    pub fn contains_location(&self, location: Location) -> bool {
        location.x >= self.x && location.y >= self.y && location.x < self.x2() && location.y < self.y2()
    }

    /// Horizontal distance between the closest edges; zero when the spans touch or overlap.
    #[must_use]
    pub fn gap_x(&self, other: &Region) -> i32 {
        other
            .x
            .saturating_sub(self.x2())
            .max(self.x.saturating_sub(other.x2()))
            .max(0)
    }

    /// Vertical distance between the closest edges; zero when the spans touch or overlap.
    #[must_use]
    pub fn gap_y(&self, other: &Region) -> i32 {
        other
            .y
            .saturating_sub(self.y2())
            .max(self.y.saturating_sub(other.y2()))
            .max(0)
    }

    /// Canonical reading order: top-to-bottom, then left-to-right, then size.
    #[must_use]
    pub fn reading_order(&self, other: &Region) -> Ordering {
        (self.y, self.x, self.h, self.w).cmp(&(other.y, other.x, other.h, other.w))
    }
}

/// Distance between two coordinates, clamped to `i32::MAX`.
fn span(a: i32, b: i32) -> i32 {
    i32::try_from(a.abs_diff(b)).unwrap_or(i32::MAX)
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R[{},{} {}x{}]", self.x, self.y, self.w, self.h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersection_requires_shared_area() {
        let a = Region::new(0, 0, 10, 10);
        let touching = Region::new(10, 0, 5, 5);
        let overlapping = Region::new(5, 5, 10, 10);

        assert!(a.intersection(&touching).is_none());
        assert_eq!(a.intersection(&overlapping), Some(Region::new(5, 5, 5, 5)));
    }

    #[test]
    fn union_is_bounding_box() {
        let a = Region::new(0, 0, 10, 10);
        let b = Region::new(20, 5, 5, 20);
        assert_eq!(a.union(&b), Region::new(0, 0, 25, 25));
    }

    #[test]
    fn contains_and_gaps() {
        let outer = Region::new(0, 0, 100, 100);
        let inner = Region::new(10, 10, 20, 20);
        assert!(outer.contains(&inner));
        assert!(!inner.contains(&outer));

        let right = Region::new(35, 10, 5, 5);
        assert_eq!(inner.gap_x(&right), 5);
        assert_eq!(inner.gap_y(&right), 0);
        assert_eq!(right.gap_x(&inner), 5);
    }

    #[test]
    fn degenerate_region_is_undefined() {
        assert!(!Region::new(5, 5, 0, 10).is_defined());
        assert!(!Region::new(5, 5, -3, 10).is_defined());
        assert!(Region::new(5, 5, 1, 1).is_defined());
    }

    #[test]
    fn from_corners_normalizes() {
        let r = Region::from_corners(Location::new(30, 40), Location::new(10, 20));
        assert_eq!(r, Region::new(10, 20, 20, 20));
        assert!(r.contains_location(Location::new(10, 20)));
        assert!(!r.contains_location(Location::new(30, 40)));
    }

    #[test]
    fn extreme_coordinates_saturate() {
        let far_left = Region::new(i32::MIN, i32::MIN, 10, 10);
        let far_right = Region::new(i32::MAX - 10, i32::MAX - 10, 10, 10);

        let hull = far_left.union(&far_right);
        assert_eq!(hull.x, i32::MIN);
        assert_eq!(hull.w, i32::MAX);
        assert_eq!(far_left.gap_x(&far_right), i32::MAX);
        assert_eq!(far_right.gap_y(&far_left), i32::MAX);

        let corners = Region::from_corners(Location::new(i32::MIN, 0), Location::new(i32::MAX, 0));
        assert_eq!(corners.w, i32::MAX);

        let huge = Region::new(i32::MAX - 1, 0, i32::MAX, 4);
        assert_eq!(huge.center(), Location::new(i32::MAX, 2));
    }
}
