use crate::{ColorA, Float, Ray, RenderState};
use crate::integrator::{Integrator, IntegratorBase, IntegratorType, VolumeIntegrator};
use crate::passes::{ColorPasses, PassType};
use crate::scene::HomogeneousRegion;

/// Absorption and emission through homogeneous regions, no in-scattering.
///
/// Regions are composited front to back along the ray, so overlapping regions
/// are approximated as if they followed each other.
pub struct EmissionIntegrator {
    base: IntegratorBase,
}

impl EmissionIntegrator {
    pub fn new() -> Self {
        Self { base: IntegratorBase::new("Emission volume", "EmV") }
    }

    /// Entry distance and index of every region the ray passes through, sorted
    /// front to back. Allocated in the state's arena.
    fn crossed_regions<'a>(
        &self,
        state: &mut RenderState<'a>,
        regions: &[HomogeneousRegion],
        ray: &Ray,
    ) -> Option<&'a mut [(Float, usize)]> {
        let arena = state.arena;
        let crossed = match arena.alloc_slice_fill(regions.len(), (0.0, 0)) {
            Ok(slice) => slice,
            Err(err) => {
                state.note_arena_error(err);
                return None;
            }
        };
        let mut n = 0;
        for (i, region) in regions.iter().enumerate() {
            if let Some((t0, t1)) = region.bounds.intersect_p(ray) {
                if t1 > t0 {
                    crossed[n] = (t0, i);
                    n += 1;
                }
            }
        }
        let crossed = &mut crossed[..n];
        crossed.sort_unstable_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));
        Some(crossed)
    }
}

impl Default for EmissionIntegrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Integrator for EmissionIntegrator {
    fn base(&self) -> &IntegratorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IntegratorBase {
        &mut self.base
    }

    fn integrator_type(&self) -> IntegratorType {
        IntegratorType::Volume
    }
}

impl VolumeIntegrator for EmissionIntegrator {
    fn transmittance(&self, _state: &mut RenderState, ray: &Ray) -> ColorA {
        if !ray.is_valid() {
            return ColorA::rgb(1.0, 1.0, 1.0);
        }
        self.base.scene()
            .volume_regions()
            .iter()
            .fold(ColorA::rgb(1.0, 1.0, 1.0), |tr, region| tr * region.transmittance(ray))
            .clamp(0.0, 1.0)
    }

    fn integrate(&self, state: &mut RenderState, ray: &Ray, passes: &mut ColorPasses, _additional_depth: u32) -> ColorA {
        if !ray.is_valid() {
            return ColorA::transparent();
        }
        let regions = self.base.scene().volume_regions();
        if regions.is_empty() {
            return ColorA::transparent();
        }
        let crossed = match self.crossed_regions(state, regions, ray) {
            Some(crossed) => crossed,
            None => return ColorA::transparent(),
        };

        let mut tr = ColorA::rgb(1.0, 1.0, 1.0);
        let mut radiance = ColorA::transparent();
        for &(_, i) in crossed.iter() {
            let region = &regions[i];
            radiance += tr * region.emission_along(ray);
            tr = tr * region.transmittance(ray);
        }
        let radiance = radiance.with_alpha(0.0).sanitized();
        passes.add(PassType::Volume, radiance);
        radiance
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::{Bounds3f, MemoryArena};
    use crate::passes::PassMask;
    use crate::scene::SphereScene;

    fn slab(z0: Float, z1: Float, sigma_a: Float, emission: Float) -> HomogeneousRegion {
        HomogeneousRegion::new(
            Bounds3f::with_bounds(point3f!(-1, -1, z0), point3f!(1, 1, z1)),
            1.0,
            ColorA::rgb(sigma_a, sigma_a, sigma_a),
            ColorA::rgb(0.0, 0.0, 0.0),
            ColorA::rgb(emission, emission, emission),
        )
    }

    fn integrator(regions: Vec<HomogeneousRegion>) -> EmissionIntegrator {
        let mut scene = SphereScene::new();
        for r in regions {
            scene.add_region(r);
        }
        let mut integrator = EmissionIntegrator::new();
        integrator.set_scene(Arc::new(scene));
        integrator
    }

    #[test]
    fn test_front_region_attenuates_back_region() {
        // the ray passes the absorbing slab at z in [0, 1] before the emitting one at [2, 3]
        let integrator = integrator(vec![slab(2.0, 3.0, 0.0, 1.0), slab(0.0, 1.0, 1.0, 0.0)]);
        let arena = MemoryArena::default();
        let mut state = RenderState::new(&arena, 0);
        let mut passes = ColorPasses::new(PassMask::VOLUME);
        let ray = Ray::new(point3f!(0, 0, -1), vec3f!(0, 0, 1));

        let l = integrator.integrate(&mut state, &ray, &mut passes, 0);
        assert_abs_diff_eq!(l.r, (-1.0 as Float).exp(), epsilon = 1e-5);
        assert_abs_diff_eq!(passes.get(PassType::Volume).unwrap().g, l.g);

        let tr = integrator.transmittance(&mut state, &ray);
        assert_abs_diff_eq!(tr.b, (-1.0 as Float).exp(), epsilon = 1e-5);
        assert!(state.arena_error().is_none());
    }

    #[test]
    fn test_no_regions() {
        let integrator = integrator(Vec::new());
        let arena = MemoryArena::default();
        let mut state = RenderState::new(&arena, 0);
        let mut passes = ColorPasses::default();
        let ray = Ray::new(point3f!(0, 0, -1), vec3f!(0, 0, 1));
        assert_eq!(integrator.transmittance(&mut state, &ray), ColorA::rgb(1.0, 1.0, 1.0));
        assert!(integrator.integrate(&mut state, &ray, &mut passes, 0).is_black());
    }
}
