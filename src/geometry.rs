//! Basic 3D point type and numeric helpers used throughout the crate.

use std::cmp::Ordering;

/// Representation of a 3D point.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Translates the point by the given offsets.
    pub fn translated(self, dx: f64, dy: f64, dz: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

/// Planar (XY) distance between two points.
pub fn distance_2d(a: Point3, b: Point3) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Lexicographic `(x, then y)` ordering used by the point sort. Total over
/// all bit patterns so NaN coordinates cannot break sort determinism.
pub fn cmp_xy(a: Point3, b: Point3) -> Ordering {
    a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y))
}

/// Axis-aligned bounding volume of a point set.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BoundingCube {
    pub min: Point3,
    pub max: Point3,
}

impl BoundingCube {
    /// An empty cube; expanding it with any point makes it that point.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn expand(&mut self, p: Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Largest coordinate magnitude covered by the cube. Drives the
    /// machine-precision estimate for tolerance floors.
    pub fn range(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        let mut r: f64 = 0.0;
        for v in [
            self.min.x, self.min.y, self.min.z, self.max.x, self.max.y, self.max.z,
        ] {
            r = r.max(v.abs());
        }
        r
    }
}

/// Smallest distance representable at the magnitude of the model's
/// coordinates. Tolerances below this are meaningless.
pub fn machine_precision(range: f64) -> f64 {
    range.abs().max(1.0) * f64::EPSILON
}
