use cgmath::prelude::*;

use crate::{Float, Point3f, Vec3f, INFINITY};

pub mod bounds;

pub use bounds::*;

/// Offset applied to spawned rays to avoid self intersection.
pub const RAY_EPSILON: Float = 1e-4;

/// Mirror `wo` about the normal `n`. Both point away from the surface.
pub fn reflect(wo: Vec3f, n: Vec3f) -> Vec3f {
    -wo + 2.0 * wo.dot(n) * n
}

/// True if the vector can be used as a ray direction.
pub fn is_valid_direction(v: Vec3f) -> bool {
    let len2 = v.magnitude2();
    len2.is_finite() && len2 > 0.0
}

#[derive(Clone, Copy, Debug)]
pub struct Ray {
    pub origin: Point3f,
    pub dir: Vec3f,
    pub t_min: Float,
    pub t_max: Float,
    pub time: Float,
}

impl Ray {
    pub fn new(origin: Point3f, dir: Vec3f) -> Self {
        Self {
            origin, dir, t_min: 0.0, t_max: INFINITY, time: 0.0
        }
    }

    /// Ray starting at `origin` nudged along `dir`, as used for secondary rays.
    pub fn spawn(origin: Point3f, dir: Vec3f, time: Float) -> Self {
        Self {
            origin, dir, t_min: RAY_EPSILON, t_max: INFINITY, time
        }
    }

    pub fn at(&self, t: Float) -> Point3f {
        self.origin + (self.dir * t)
    }

    /// Origin must be finite and the direction non-degenerate.
    pub fn is_valid(&self) -> bool {
        self.origin.x.is_finite() && self.origin.y.is_finite() && self.origin.z.is_finite()
            && is_valid_direction(self.dir)
            && !self.t_min.is_nan() && !self.t_max.is_nan()
    }
}

/// Auxiliary rays offset by one pixel in x and y.
#[derive(Clone, Copy, Debug)]
pub struct Differential {
    pub rx_origin: Point3f,
    pub ry_origin: Point3f,
    pub rx_dir: Vec3f,
    pub ry_dir: Vec3f,
}

#[derive(Clone, Copy, Debug)]
pub struct RayDifferential {
    pub ray: Ray,
    pub diff: Option<Differential>,
}

impl RayDifferential {
    pub fn new(ray: Ray) -> Self {
        Self { ray, diff: None }
    }

    pub fn with_differential(ray: Ray, diff: Differential) -> Self {
        Self { ray, diff: Some(diff) }
    }

    pub fn has_differentials(&self) -> bool {
        self.diff.is_some()
    }

    /// Shrink the differentials to account for `s` samples per pixel spacing.
    pub fn scale_differentials(&mut self, s: Float) {
        let ray = &self.ray;
        if let Some(diff) = &mut self.diff {
            diff.rx_origin = ray.origin + (diff.rx_origin - ray.origin) * s;
            diff.ry_origin = ray.origin + (diff.ry_origin - ray.origin) * s;
            diff.rx_dir = ray.dir + (diff.rx_dir - ray.dir) * s;
            diff.ry_dir = ray.dir + (diff.ry_dir - ray.dir) * s;
        }
    }
}

impl From<Ray> for RayDifferential {
    fn from(ray: Ray) -> Self {
        Self::new(ray)
    }
}
