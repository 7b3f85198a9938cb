//! Light transport integrators.
//!
//! Every integrator shares the [`Integrator`] lifecycle: it is given a scene
//! and a progress reporter, preprocessed once per render, asked for radiance
//! while passes run and cleaned up afterwards. What it computes depends on the
//! capability it implements. [`SurfaceIntegrator`]s evaluate radiance arriving
//! along camera and secondary rays. [`VolumeIntegrator`]s evaluate attenuation
//! and in-scattered light through participating media. [`AnyIntegrator`] holds
//! one of either.
//!
//! `integrate` takes `&self` so one integrator can serve every worker of a pass.
//! Anything mutable per ray lives in the [`RenderState`] passed alongside.

use std::sync::Arc;

use crate::{ColorA, Ray, RayDifferential, RenderSession, RenderState};
use crate::passes::ColorPasses;
use crate::progress::{self, ProgressReporter};
use crate::scene::Scene;

pub mod direct_lighting;
pub mod emission;

pub use direct_lighting::DirectLightingIntegrator;
pub use emission::EmissionIntegrator;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IntegratorType {
    Surface,
    Volume,
}

/// State common to every integrator.
pub struct IntegratorBase {
    scene: Option<Arc<dyn Scene>>,
    progress: Arc<dyn ProgressReporter>,
    name: String,
    short_name: String,
}

impl IntegratorBase {
    pub fn new(name: impl Into<String>, short_name: impl Into<String>) -> Self {
        Self {
            scene: None,
            progress: progress::silent(),
            name: name.into(),
            short_name: short_name.into(),
        }
    }

    pub fn set_scene(&mut self, scene: Arc<dyn Scene>) {
        if self.scene.is_some() {
            tracing::warn!(integrator = %self.name, "scene replaced on an integrator that already had one");
        }
        self.scene = Some(scene);
    }

    /// # Panics
    /// If no scene was set.
    pub fn scene(&self) -> &dyn Scene {
        match &self.scene {
            Some(scene) => scene.as_ref(),
            None => panic!("integrator '{}' used before set_scene was called", self.name),
        }
    }

    pub fn set_progress(&mut self, progress: Arc<dyn ProgressReporter>) {
        self.progress = progress;
    }

    pub fn progress(&self) -> &dyn ProgressReporter {
        self.progress.as_ref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn short_name(&self) -> &str {
        &self.short_name
    }
}

pub trait Integrator: Send + Sync {
    fn base(&self) -> &IntegratorBase;

    fn base_mut(&mut self) -> &mut IntegratorBase;

    fn integrator_type(&self) -> IntegratorType;

    fn set_scene(&mut self, scene: Arc<dyn Scene>) {
        self.base_mut().set_scene(scene);
    }

    fn set_progress_bar(&mut self, progress: Arc<dyn ProgressReporter>) {
        self.base_mut().set_progress(progress);
    }

    fn name(&self) -> &str {
        self.base().name()
    }

    fn short_name(&self) -> &str {
        self.base().short_name()
    }

    /// Called once before the first pass. May build the session's photon maps.
    /// Returning `false` means the render must not start.
    fn preprocess(&mut self, _session: &mut RenderSession) -> bool {
        true
    }

    /// Called after the last pass, also when preprocessing failed or never ran.
    fn cleanup(&mut self) {}
}

pub trait SurfaceIntegrator: Integrator {
    /// Radiance arriving at the ray origin.
    ///
    /// On a hit the ray's `t_max` is shortened to the hit distance, so the
    /// caller can account for media along the visible segment. Invalid rays
    /// give transparent black.
    fn integrate(
        &self,
        state: &mut RenderState,
        ray: &mut RayDifferential,
        passes: &mut ColorPasses,
        additional_depth: u32,
    ) -> ColorA;
}

pub trait VolumeIntegrator: Integrator {
    /// Fraction of light surviving along `[t_min, t_max]` of the ray, in [0, 1].
    fn transmittance(&self, state: &mut RenderState, ray: &Ray) -> ColorA;

    /// Radiance emitted or scattered toward the ray origin along the segment.
    fn integrate(
        &self,
        state: &mut RenderState,
        ray: &Ray,
        passes: &mut ColorPasses,
        additional_depth: u32,
    ) -> ColorA;
}

pub enum AnyIntegrator {
    Surface(Box<dyn SurfaceIntegrator>),
    Volume(Box<dyn VolumeIntegrator>),
}

macro_rules! dispatch {
    ($self:ident, $i:ident => $body:expr) => {
        match $self {
            AnyIntegrator::Surface($i) => $body,
            AnyIntegrator::Volume($i) => $body,
        }
    };
}

impl AnyIntegrator {
    pub fn integrator_type(&self) -> IntegratorType {
        match self {
            AnyIntegrator::Surface(_) => IntegratorType::Surface,
            AnyIntegrator::Volume(_) => IntegratorType::Volume,
        }
    }

    pub fn name(&self) -> &str {
        dispatch!(self, i => i.name())
    }

    pub fn short_name(&self) -> &str {
        dispatch!(self, i => i.short_name())
    }

    pub fn set_scene(&mut self, scene: Arc<dyn Scene>) {
        dispatch!(self, i => i.set_scene(scene))
    }

    pub fn set_progress_bar(&mut self, progress: Arc<dyn ProgressReporter>) {
        dispatch!(self, i => i.set_progress_bar(progress))
    }

    pub fn preprocess(&mut self, session: &mut RenderSession) -> bool {
        dispatch!(self, i => i.preprocess(session))
    }

    pub fn cleanup(&mut self) {
        dispatch!(self, i => i.cleanup())
    }

    pub fn as_surface(&self) -> Option<&dyn SurfaceIntegrator> {
        match self {
            AnyIntegrator::Surface(s) => Some(s.as_ref()),
            AnyIntegrator::Volume(_) => None,
        }
    }

    pub fn as_volume(&self) -> Option<&dyn VolumeIntegrator> {
        match self {
            AnyIntegrator::Volume(v) => Some(v.as_ref()),
            AnyIntegrator::Surface(_) => None,
        }
    }
}

impl From<Box<dyn SurfaceIntegrator>> for AnyIntegrator {
    fn from(integrator: Box<dyn SurfaceIntegrator>) -> Self {
        AnyIntegrator::Surface(integrator)
    }
}

impl From<Box<dyn VolumeIntegrator>> for AnyIntegrator {
    fn from(integrator: Box<dyn VolumeIntegrator>) -> Self {
        AnyIntegrator::Volume(integrator)
    }
}

/// Log and zero out radiance that went non-finite or negative.
pub fn check_radiance(radiance: ColorA, pixel: u64) -> ColorA {
    if !radiance.is_finite() {
        tracing::warn!(pixel, ?radiance, "non-finite radiance value");
    } else if radiance.r < 0.0 || radiance.g < 0.0 || radiance.b < 0.0 {
        tracing::warn!(pixel, ?radiance, "negative radiance value");
    }
    radiance.sanitized()
}
