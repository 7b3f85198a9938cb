use cgmath::prelude::*;
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use crate::{ColorA, Differential, Float, Ray, RayDifferential, RenderSession, RenderState, Vec3f, INV_PI, PI, reflect};
use crate::integrator::{Integrator, IntegratorBase, IntegratorType, SurfaceIntegrator};
use crate::passes::{ColorPasses, PassMask, PassType};
use crate::photon::{Photon, PhotonMap};
use crate::scene::{Scene, SurfaceHit};
use crate::session::MapKind;

/// Settings for the optional caustic photon map.
#[derive(Clone, Copy, Debug)]
pub struct CausticParams {
    /// Photons shot from each light.
    pub photons_per_light: usize,
    pub max_bounces: u32,
    /// Lookup radius.
    pub radius: Float,
    /// Nearest photons used per lookup.
    pub max_gather: usize,
}

impl Default for CausticParams {
    fn default() -> Self {
        Self {
            photons_per_light: 20_000,
            max_bounces: 5,
            radius: 0.25,
            max_gather: 64,
        }
    }
}

/// Direct illumination from point lights, perfect mirror reflection and
/// emission. With caustics enabled, light reaching diffuse surfaces over
/// mirrors is estimated from a photon map built before the first pass and kept
/// in the session.
pub struct DirectLightingIntegrator {
    base: IntegratorBase,
    pub max_depth: u32,
    pub caustics: Option<CausticParams>,
    pub seed: u64,
}

impl DirectLightingIntegrator {
    pub fn new(max_depth: u32) -> Self {
        Self {
            base: IntegratorBase::new("Direct lighting", "DL"),
            max_depth,
            caustics: None,
            seed: 0,
        }
    }

    pub fn with_caustics(mut self, params: CausticParams) -> Self {
        self.caustics = Some(params);
        self
    }

    fn shoot_caustic_photons(&self, scene: &dyn Scene, params: &CausticParams, map: &mut PhotonMap) {
        let progress = self.base.progress();
        progress.set_tag("Building caustic photon map");
        progress.init(scene.lights().len() as u64);

        let mut rng = Xoshiro256Plus::seed_from_u64(self.seed);
        for light in scene.lights() {
            // intensity over the full sphere of directions
            let power = light.intensity * (4.0 * PI);
            for _ in 0..params.photons_per_light {
                let dir = uniform_sample_sphere(rng.gen(), rng.gen());
                let ray = Ray::spawn(light.position, dir, 0.0);
                trace_caustic_photon(scene, ray, power, params.max_bounces, map);
            }
            progress.update(1);
        }
        map.set_num_paths(params.photons_per_light);
        map.build(params.radius);
        progress.done();
    }

    fn caustic_radiance(&self, state: &RenderState, hit: &SurfaceHit) -> ColorA {
        let params = match &self.caustics {
            Some(params) => params,
            None => return ColorA::transparent(),
        };
        let map = match state.session.and_then(RenderSession::caustic_map) {
            Some(map) if map.num_paths() > 0 && !map.is_empty() => map,
            _ => return ColorA::transparent(),
        };

        let found = map.gather(hit.p, params.radius, params.max_gather);
        let flux: ColorA = found.iter()
            .filter(|f| f.photon.dir.dot(hit.n) > 0.0)
            .map(|f| f.photon.color)
            .sum();
        let area = PI * params.radius * params.radius * map.num_paths() as Float;
        (hit.material.diffuse * INV_PI * flux / area).with_alpha(0.0)
    }

    fn direct_light(&self, scene: &dyn Scene, hit: &SurfaceHit, time: Float, passes: &mut ColorPasses) -> ColorA {
        let mut lit = ColorA::transparent();
        if hit.material.diffuse.is_black() {
            return lit;
        }
        for light in scene.lights() {
            let sample = match light.sample_incident(hit.p) {
                Some(s) => s,
                None => continue,
            };
            let cos = sample.wi.dot(hit.n);
            if cos <= 0.0 {
                continue;
            }
            let contrib = (hit.material.diffuse * INV_PI * sample.radiance * cos).with_alpha(0.0);

            let mut shadow_ray = Ray::spawn(hit.p, sample.wi, time);
            shadow_ray.t_max = sample.distance * (1.0 - 1e-3);
            if scene.is_occluded(&shadow_ray) {
                passes.add(PassType::Shadow, contrib);
            } else {
                lit += contrib;
            }
        }
        lit
    }
}

fn uniform_sample_sphere(u1: Float, u2: Float) -> Vec3f {
    let z = 1.0 - 2.0 * u1;
    let r = (1.0 - z * z).max(0.0).sqrt();
    let phi = 2.0 * PI * u2;
    Vec3f::new(r * phi.cos(), r * phi.sin(), z)
}

/// Follow a photon through mirrors; it is stored where it first lands on a
/// diffuse surface after at least one specular bounce.
fn trace_caustic_photon(scene: &dyn Scene, mut ray: Ray, mut power: ColorA, max_bounces: u32, map: &mut PhotonMap) {
    let mut specular_bounces = 0;
    for _ in 0..=max_bounces {
        let hit = match scene.intersect(&ray) {
            Some(hit) => hit,
            None => return,
        };
        let material = hit.material;
        if material.is_specular() {
            power = power * material.mirror;
            if power.is_black() {
                return;
            }
            specular_bounces += 1;
            ray = Ray::spawn(hit.p, reflect(hit.wo, hit.n), ray.time);
            continue;
        }
        if specular_bounces > 0 && !material.diffuse.is_black() {
            map.push(Photon { pos: hit.p, dir: hit.wo, color: power.with_alpha(1.0) });
        }
        return;
    }
}

impl Integrator for DirectLightingIntegrator {
    fn base(&self) -> &IntegratorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IntegratorBase {
        &mut self.base
    }

    fn integrator_type(&self) -> IntegratorType {
        IntegratorType::Surface
    }

    fn preprocess(&mut self, session: &mut RenderSession) -> bool {
        let params = match self.caustics {
            Some(params) => params,
            None => return true,
        };
        let _span = tracing::debug_span!("preprocess", integrator = self.base.short_name()).entered();

        let scene = self.base.scene();
        if scene.lights().is_empty() {
            tracing::warn!("caustics requested but the scene has no lights");
            return false;
        }

        let reuse = session.render_resumed()
            && session.caustic_map().map_or(false, |m| m.is_ready() && m.num_paths() > 0);
        if reuse {
            tracing::debug!("reusing caustic photon map from the previous render");
            return true;
        }

        let map = session.map_or_insert(MapKind::Caustic);
        map.clear();
        self.shoot_caustic_photons(scene, &params, map);
        tracing::info!(photons = map.len(), "caustic photon map built");
        true
    }

    fn cleanup(&mut self) {
        tracing::debug!(integrator = self.base.short_name(), "cleanup");
    }
}

impl SurfaceIntegrator for DirectLightingIntegrator {
    fn integrate(
        &self,
        state: &mut RenderState,
        ray: &mut RayDifferential,
        passes: &mut ColorPasses,
        additional_depth: u32,
    ) -> ColorA {
        if !ray.ray.is_valid() {
            return ColorA::transparent();
        }
        let scene = self.base.scene();

        let hit = match scene.intersect(&ray.ray) {
            Some(hit) => hit,
            None => return scene.background(&ray.ray).sanitized(),
        };
        ray.ray.t_max = hit.t;

        // scratch copy, released when the worker resets its arena
        let arena = state.arena;
        let hit: &SurfaceHit = match arena.alloc(hit) {
            Ok(hit) => hit,
            Err(err) => {
                state.note_arena_error(err);
                return ColorA::transparent();
            }
        };
        let material = hit.material;

        let mut col = material.emit.with_alpha(0.0);
        passes.add(PassType::Emit, col);

        let diffuse = self.direct_light(scene, hit, ray.ray.time, passes);
        passes.add(PassType::Diffuse, diffuse);
        col += diffuse;

        let caustic = self.caustic_radiance(state, hit);
        passes.add(PassType::Caustic, caustic);
        col += caustic;

        if material.is_specular() && state.ray_level < self.max_depth + additional_depth {
            let wi = reflect(hit.wo, hit.n);
            let refl_ray = Ray::spawn(hit.p, wi, ray.ray.time);
            let diff = ray.diff.map(|d| Differential {
                rx_origin: hit.p,
                ry_origin: hit.p,
                rx_dir: reflect(-d.rx_dir.normalize(), hit.n),
                ry_dir: reflect(-d.ry_dir.normalize(), hit.n),
            });
            let mut refl = RayDifferential { ray: refl_ray, diff };

            let mut sub_passes = ColorPasses::new(PassMask::COMBINED);
            state.ray_level += 1;
            let li = self.integrate(state, &mut refl, &mut sub_passes, additional_depth);
            state.ray_level -= 1;

            let specular = (material.mirror * li).with_alpha(0.0);
            passes.add(PassType::Specular, specular);
            col += specular;
        }

        let col = col.with_alpha(1.0).sanitized();
        passes.set(PassType::Combined, col);
        col
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::MemoryArena;
    use crate::scene::{Material, PointLight, Sphere, SphereScene};

    fn lit_sphere() -> SphereScene {
        let mut scene = SphereScene::new();
        scene
            .add_sphere(Sphere::new(point3f!(0, 0, 0), 1.0, Material::matte(ColorA::rgb(0.5, 0.5, 0.5))))
            .add_light(PointLight::new(point3f!(0, 0, 3), ColorA::rgb(4.0, 4.0, 4.0)));
        scene
    }

    fn integrator(scene: SphereScene) -> DirectLightingIntegrator {
        let mut integrator = DirectLightingIntegrator::new(4);
        integrator.set_scene(Arc::new(scene));
        integrator
    }

    #[test]
    fn test_lambert_point_light() {
        let integrator = integrator(lit_sphere());
        let arena = MemoryArena::default();
        let mut state = RenderState::new(&arena, 0);
        let mut passes = ColorPasses::new(PassMask::DIFFUSE);
        let mut ray = RayDifferential::new(Ray::new(point3f!(0, 0, 5), vec3f!(0, 0, -1)));

        let c = integrator.integrate(&mut state, &mut ray, &mut passes, 0);
        // hit at z = 1, light 2 units away head on: 0.5 / pi * 4 / 4
        assert_abs_diff_eq!(c.r, 0.5 * INV_PI, epsilon = 1e-4);
        assert_abs_diff_eq!(ray.ray.t_max, 4.0, epsilon = 1e-4);
        assert_abs_diff_eq!(passes.get(PassType::Diffuse).unwrap().g, 0.5 * INV_PI, epsilon = 1e-4);
        assert_eq!(passes.get(PassType::Combined), Some(c));
    }

    #[test]
    fn test_invalid_ray_transparent() {
        let integrator = integrator(lit_sphere());
        let arena = MemoryArena::default();
        let mut state = RenderState::new(&arena, 0);
        let mut passes = ColorPasses::default();
        let mut ray = RayDifferential::new(Ray::new(point3f!(0, 0, 5), vec3f!(0, 0, 0)));
        assert_eq!(integrator.integrate(&mut state, &mut ray, &mut passes, 0), ColorA::transparent());
    }

    #[test]
    fn test_shadowed_goes_to_shadow_pass() {
        let mut scene = lit_sphere();
        scene.add_sphere(Sphere::new(point3f!(0, 0, 2), 0.25, Material::matte(ColorA::black())));
        let integrator = integrator(scene);
        let arena = MemoryArena::default();
        let mut state = RenderState::new(&arena, 0);
        let mut passes = ColorPasses::new(PassMask::SHADOW | PassMask::DIFFUSE);
        let mut ray = RayDifferential::new(Ray::new(point3f!(0.5, 0, 5), vec3f!(0, 0, -1)));
        // the small blocker sits between the big sphere and the light, off the camera ray
        let c = integrator.integrate(&mut state, &mut ray, &mut passes, 0);
        assert!(c.r >= 0.0);
        let shadow = passes.get(PassType::Shadow).unwrap();
        assert!(shadow.r > 0.0);
    }

    #[test]
    fn test_mirror_depth_limit() {
        let mut scene = SphereScene::new().with_background(ColorA::rgb(1.0, 1.0, 1.0));
        scene.add_sphere(Sphere::new(point3f!(0, 0, 0), 1.0, Material::mirror(ColorA::rgb(0.5, 0.5, 0.5))));
        let mut integrator = integrator(scene);
        let arena = MemoryArena::default();
        let mut passes = ColorPasses::new(PassMask::SPECULAR);

        integrator.max_depth = 0;
        let mut state = RenderState::new(&arena, 0);
        let mut ray = RayDifferential::new(Ray::new(point3f!(0, 0, 5), vec3f!(0, 0, -1)));
        assert!(integrator.integrate(&mut state, &mut ray, &mut passes, 0).is_black());

        let mut ray = RayDifferential::new(Ray::new(point3f!(0, 0, 5), vec3f!(0, 0, -1)));
        let c = integrator.integrate(&mut state, &mut ray, &mut passes, 1);
        assert_abs_diff_eq!(c.r, 0.5, epsilon = 1e-4);
        assert_eq!(state.ray_level, 0);
    }

    #[test]
    fn test_preprocess_without_caustics() {
        let mut integrator = integrator(lit_sphere());
        let mut session = RenderSession::new();
        assert!(integrator.preprocess(&mut session));
        assert!(session.caustic_map().is_none());
    }

    #[test]
    fn test_caustics_need_lights() {
        let mut scene = SphereScene::new();
        scene.add_sphere(Sphere::new(point3f!(0, 0, 0), 1.0, Material::matte(ColorA::rgb(0.5, 0.5, 0.5))));
        let mut integrator = integrator(scene).with_caustics(CausticParams::default());
        let mut session = RenderSession::new();
        assert!(!integrator.preprocess(&mut session));
    }

    #[test]
    fn test_caustic_map_built() {
        let mut scene = SphereScene::new();
        // mirror above the light bounces photons down onto a large diffuse floor
        scene
            .add_sphere(Sphere::new(point3f!(0, 0, -1000), 1000.0, Material::matte(ColorA::rgb(0.5, 0.5, 0.5))))
            .add_sphere(Sphere::new(point3f!(0, 0, 10), 4.0, Material::mirror(ColorA::rgb(1.0, 1.0, 1.0))))
            .add_light(PointLight::new(point3f!(0, 0, 3), ColorA::rgb(4.0, 4.0, 4.0)));
        let params = CausticParams { photons_per_light: 2000, ..CausticParams::default() };
        let mut integrator = integrator(scene).with_caustics(params);
        let mut session = RenderSession::new();

        assert!(integrator.preprocess(&mut session));
        let map = session.caustic_map().unwrap();
        assert!(map.is_ready());
        assert!(!map.is_empty());
        assert_eq!(map.num_paths(), 2000);
    }
}
