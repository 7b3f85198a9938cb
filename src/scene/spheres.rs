use cgmath::prelude::*;

use crate::{Bounds3f, ColorA, Float, Point3f, Ray, Vec3f};
use crate::scene::{HomogeneousRegion, Material, PointLight, Scene, SurfaceHit};

#[derive(Clone, Copy, Debug)]
pub struct Sphere {
    pub center: Point3f,
    pub radius: Float,
    pub material: Material,
}

impl Sphere {
    pub fn new(center: Point3f, radius: Float, material: Material) -> Self {
        Self { center, radius: radius.abs(), material }
    }

    /// Nearest root of the ray/sphere quadratic inside `(t_min, t_max)`.
    fn hit_t(&self, ray: &Ray) -> Option<Float> {
        let oc = ray.origin - self.center;
        let a = ray.dir.magnitude2();
        let half_b = oc.dot(ray.dir);
        let c = oc.magnitude2() - self.radius * self.radius;
        let discrim = half_b * half_b - a * c;
        if discrim < 0.0 || a == 0.0 {
            return None;
        }
        let root = discrim.sqrt();
        let t0 = (-half_b - root) / a;
        let t1 = (-half_b + root) / a;
        [t0, t1].iter()
            .copied()
            .find(|&t| t > ray.t_min && t < ray.t_max)
    }

    pub fn bounds(&self) -> Bounds3f {
        let r = Vec3f::from_value(self.radius);
        Bounds3f::with_bounds(self.center - r, self.center + r)
    }
}

/// Brute force list of spheres. Good enough for a handful of objects.
pub struct SphereScene {
    spheres: Vec<Sphere>,
    lights: Vec<PointLight>,
    regions: Vec<HomogeneousRegion>,
    background: ColorA,
}

impl SphereScene {
    pub fn new() -> Self {
        Self {
            spheres: Vec::new(),
            lights: Vec::new(),
            regions: Vec::new(),
            background: ColorA::transparent(),
        }
    }

    pub fn with_background(mut self, background: ColorA) -> Self {
        self.background = background;
        self
    }

    pub fn add_sphere(&mut self, sphere: Sphere) -> &mut Self {
        self.spheres.push(sphere);
        self
    }

    pub fn add_light(&mut self, light: PointLight) -> &mut Self {
        self.lights.push(light);
        self
    }

    pub fn add_region(&mut self, region: HomogeneousRegion) -> &mut Self {
        self.regions.push(region);
        self
    }

    pub fn spheres(&self) -> &[Sphere] {
        &self.spheres
    }
}

impl Default for SphereScene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene for SphereScene {
    fn intersect(&self, ray: &Ray) -> Option<SurfaceHit> {
        let mut ray = *ray;
        let mut closest: Option<(Float, &Sphere)> = None;
        for sphere in &self.spheres {
            if let Some(t) = sphere.hit_t(&ray) {
                ray.t_max = t;
                closest = Some((t, sphere));
            }
        }

        let (t, sphere) = closest?;
        let p = ray.at(t);
        let wo = -ray.dir.normalize();
        let mut n = (p - sphere.center) / sphere.radius;
        if n.dot(wo) < 0.0 {
            n = -n;
        }
        Some(SurfaceHit { t, p, n, wo, material: sphere.material })
    }

    fn is_occluded(&self, ray: &Ray) -> bool {
        self.spheres.iter().any(|s| s.hit_t(ray).is_some())
    }

    fn lights(&self) -> &[PointLight] {
        &self.lights
    }

    fn volume_regions(&self) -> &[HomogeneousRegion] {
        &self.regions
    }

    fn background(&self, _ray: &Ray) -> ColorA {
        self.background
    }

    fn world_bound(&self) -> Bounds3f {
        let mut bounds = self.spheres.iter().map(Sphere::bounds)
            .chain(self.regions.iter().map(|r| r.bounds));
        match bounds.next() {
            Some(first) => bounds.fold(first, |acc, b| Bounds3f::with_bounds(
                Point3f::new(acc.min.x.min(b.min.x), acc.min.y.min(b.min.y), acc.min.z.min(b.min.z)),
                Point3f::new(acc.max.x.max(b.max.x), acc.max.y.max(b.max.y), acc.max.z.max(b.max.z)),
            )),
            None => Bounds3f::with_bounds(Point3f::origin(), Point3f::origin()),
        }
    }
}
