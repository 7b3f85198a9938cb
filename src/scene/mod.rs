use cgmath::prelude::*;

use crate::{Bounds3f, ColorA, Float, Point3f, Ray, Vec3f};

pub mod spheres;

pub use spheres::{Sphere, SphereScene};

/// Ray queries and lighting data an integrator reads while rendering.
pub trait Scene: Send + Sync {
    /// Closest hit along the ray within `[t_min, t_max]`.
    fn intersect(&self, ray: &Ray) -> Option<SurfaceHit>;

    /// True if anything blocks the ray within `[t_min, t_max]`.
    fn is_occluded(&self, ray: &Ray) -> bool {
        self.intersect(ray).is_some()
    }

    fn lights(&self) -> &[PointLight];

    fn volume_regions(&self) -> &[HomogeneousRegion];

    /// Radiance for rays that leave the scene.
    fn background(&self, ray: &Ray) -> ColorA;

    fn world_bound(&self) -> Bounds3f;
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Material {
    /// Lambertian reflectance.
    pub diffuse: ColorA,
    /// Perfect mirror reflectance.
    pub mirror: ColorA,
    pub emit: ColorA,
}

impl Material {
    pub fn matte(diffuse: ColorA) -> Self {
        Self { diffuse, mirror: ColorA::black(), emit: ColorA::black() }
    }

    pub fn mirror(mirror: ColorA) -> Self {
        Self { diffuse: ColorA::black(), mirror, emit: ColorA::black() }
    }

    pub fn emitter(emit: ColorA) -> Self {
        Self { diffuse: ColorA::black(), mirror: ColorA::black(), emit }
    }

    pub fn is_specular(&self) -> bool {
        !self.mirror.is_black()
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SurfaceHit {
    pub t: Float,
    pub p: Point3f,
    /// Unit normal facing the side the ray came from.
    pub n: Vec3f,
    /// Unit vector back along the incoming ray.
    pub wo: Vec3f,
    pub material: Material,
}

#[derive(Clone, Copy, Debug)]
pub struct PointLight {
    pub position: Point3f,
    pub intensity: ColorA,
}

/// Light arriving at a point from a point light.
pub struct LightSample {
    pub wi: Vec3f,
    pub distance: Float,
    pub radiance: ColorA,
}

impl PointLight {
    pub fn new(position: Point3f, intensity: ColorA) -> Self {
        Self { position, intensity }
    }

    /// `None` if `p` coincides with the light.
    pub fn sample_incident(&self, p: Point3f) -> Option<LightSample> {
        let d = self.position - p;
        let dist2 = d.magnitude2();
        if !(dist2 > 0.0) || !dist2.is_finite() {
            return None;
        }
        let distance = dist2.sqrt();
        Some(LightSample {
            wi: d / distance,
            distance,
            radiance: (self.intensity / dist2).with_alpha(1.0),
        })
    }
}

/// Box of homogeneous participating medium.
///
/// Coefficients are per unit length and scaled by `density`.
#[derive(Clone, Copy, Debug)]
pub struct HomogeneousRegion {
    pub bounds: Bounds3f,
    pub density: Float,
    pub sigma_a: ColorA,
    pub sigma_s: ColorA,
    pub emission: ColorA,
}

impl HomogeneousRegion {
    pub fn new(bounds: Bounds3f, density: Float, sigma_a: ColorA, sigma_s: ColorA, emission: ColorA) -> Self {
        Self {
            bounds,
            density: density.max(0.0),
            sigma_a: sigma_a.sanitized(),
            sigma_s: sigma_s.sanitized(),
            emission: emission.sanitized(),
        }
    }

    /// Extinction coefficient including density.
    pub fn sigma_t(&self) -> ColorA {
        ((self.sigma_a + self.sigma_s) * self.density).with_alpha(1.0)
    }

    /// World space length of the ray's overlap with the region.
    pub fn path_length(&self, ray: &Ray) -> Float {
        match self.bounds.intersect_p(ray) {
            Some((t0, t1)) if t1 > t0 => {
                let len = (t1 - t0) * ray.dir.magnitude();
                if len.is_finite() { len } else { 0.0 }
            }
            _ => 0.0,
        }
    }

    /// Beer-Lambert attenuation along the ray, in [0, 1] per channel.
    pub fn transmittance(&self, ray: &Ray) -> ColorA {
        let d = self.path_length(ray);
        if d == 0.0 || self.density == 0.0 {
            return ColorA::rgb(1.0, 1.0, 1.0);
        }
        (-(self.sigma_t() * d)).exp().clamp(0.0, 1.0).with_alpha(1.0)
    }

    /// Emitted radiance accumulated along the ray, attenuated by the region itself.
    pub fn emission_along(&self, ray: &Ray) -> ColorA {
        let d = self.path_length(ray);
        if d == 0.0 || self.density == 0.0 || self.emission.is_black() {
            return ColorA::transparent();
        }
        let sigma_t = self.sigma_t();
        let le = self.emission * self.density;
        ColorA::new_with(|i| match i {
            3 => 0.0,
            _ if sigma_t[i] > 0.0 => le[i] * (1.0 - (-sigma_t[i] * d).exp()) / sigma_t[i],
            _ => le[i] * d,
        })
        .sanitized()
    }
}
