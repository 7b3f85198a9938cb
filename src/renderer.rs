//! Pass driver tying a session, a camera and the integrators together.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rayon::prelude::*;

use crate::{ArenaError, Float, MemoryArena, RayDifferential, RenderError, RenderSession, RenderState};
use crate::camera::{Camera, CameraSample};
use crate::film::{ImageFilm, TileBounds};
use crate::memory::MIN_ALIGN;
use crate::integrator::{check_radiance, AnyIntegrator, SurfaceIntegrator, VolumeIntegrator};
use crate::passes::{ColorPasses, PassMask, PassType};
use crate::progress::{self, ProgressReporter};
use crate::scene::Scene;
use crate::Point2f;

#[derive(Clone, Debug)]
pub struct RenderSettings {
    /// Progressive passes per render.
    pub passes: u32,
    pub samples_per_pass: u32,
    pub tile_size: u32,
    /// Worker threads, 0 lets rayon decide.
    pub threads: usize,
    pub arena_block_size: usize,
    pub seed: u64,
    pub enabled_passes: PassMask,
    /// Keep what the film already holds and mark the session as resumed.
    pub resume: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            passes: 4,
            samples_per_pass: 1,
            tile_size: 16,
            threads: 0,
            arena_block_size: MemoryArena::DEFAULT_BLOCK_SIZE,
            seed: 0,
            enabled_passes: PassMask::COMBINED,
            resume: false,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderOutcome {
    Finished,
    Aborted,
}

pub struct Renderer {
    settings: RenderSettings,
    camera: Box<dyn Camera>,
    surface: Option<Box<dyn SurfaceIntegrator>>,
    volume: Option<Box<dyn VolumeIntegrator>>,
    progress: Arc<dyn ProgressReporter>,
    /// One scratch arena per pool worker, recycled across tiles, passes and renders.
    arenas: Vec<Mutex<MemoryArena>>,
}

impl Renderer {
    pub fn new(camera: Box<dyn Camera>, settings: RenderSettings) -> Self {
        Self {
            settings,
            camera,
            surface: None,
            volume: None,
            progress: progress::silent(),
            arenas: Vec::new(),
        }
    }

    pub fn settings(&self) -> &RenderSettings {
        &self.settings
    }

    pub fn settings_mut(&mut self) -> &mut RenderSettings {
        &mut self.settings
    }

    /// Install an integrator in the slot for its kind, returning the one it replaces.
    pub fn set_integrator(&mut self, integrator: AnyIntegrator) -> Option<AnyIntegrator> {
        match integrator {
            AnyIntegrator::Surface(s) => self.surface.replace(s).map(AnyIntegrator::Surface),
            AnyIntegrator::Volume(v) => self.volume.replace(v).map(AnyIntegrator::Volume),
        }
    }

    pub fn set_scene(&mut self, scene: Arc<dyn Scene>) {
        if let Some(s) = &mut self.surface {
            s.set_scene(scene.clone());
        }
        if let Some(v) = &mut self.volume {
            v.set_scene(scene);
        }
    }

    /// Used for pass progress and handed to the integrators.
    pub fn set_progress_bar(&mut self, progress: Arc<dyn ProgressReporter>) {
        if let Some(s) = &mut self.surface {
            s.set_progress_bar(progress.clone());
        }
        if let Some(v) = &mut self.volume {
            v.set_progress_bar(progress.clone());
        }
        self.progress = progress;
    }

    /// Blocks held by the worker arenas, in use or recycled.
    pub fn scratch_block_count(&self) -> usize {
        self.arenas.iter().map(|a| a.lock().block_count()).sum()
    }

    /// A film matching the camera resolution and the enabled passes.
    pub fn create_film(&self) -> ImageFilm {
        let (w, h) = self.camera.resolution();
        ImageFilm::new(w, h, self.settings.enabled_passes)
    }

    /// Run one render cycle on the session.
    ///
    /// Returns `Ok(RenderOutcome::Aborted)` if the session was aborted while
    /// passes were running. Integrators are cleaned up on every path that got
    /// past starting the session.
    pub fn render(&mut self, session: &mut RenderSession, film: &ImageFilm) -> Result<RenderOutcome, RenderError> {
        if self.surface.is_none() {
            return Err(RenderError::MissingIntegrator);
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.settings.threads)
            .build()?;
        self.prepare_arenas(pool.current_num_threads());

        if !session.start_render() {
            return Err(RenderError::AlreadyInProgress);
        }
        if self.settings.resume {
            session.resume_render();
        } else {
            film.clear();
        }
        session.set_total_passes(self.settings.passes);

        if let Err(err) = self.preprocess(session) {
            session.abort_render();
            self.cleanup();
            return Err(err);
        }

        let start = Instant::now();
        let result = self.run_passes(&pool, session, film);
        self.cleanup();
        self.progress.done();

        if let Err(err) = result {
            session.abort_render();
            return Err(err.into());
        }
        if session.render_aborted() {
            tracing::info!(pass = session.current_pass(), "render aborted");
            return Ok(RenderOutcome::Aborted);
        }
        session.finish_render();
        tracing::info!(passes = self.settings.passes, elapsed = ?start.elapsed(), "render finished");
        Ok(RenderOutcome::Finished)
    }

    /// Keep the existing worker arenas unless the pool size or block size changed.
    fn prepare_arenas(&mut self, workers: usize) {
        let workers = workers.max(1);
        let block_size = self.settings.arena_block_size;
        let reusable = self.arenas.len() == workers
            && self.arenas.iter().all(|a| a.lock().block_size() == block_size.max(MIN_ALIGN));
        if !reusable {
            tracing::debug!(workers, block_size, "creating worker arenas");
            self.arenas = (0..workers).map(|_| Mutex::new(MemoryArena::new(block_size))).collect();
        }
    }

    fn preprocess(&mut self, session: &mut RenderSession) -> Result<(), RenderError> {
        let _span = tracing::debug_span!("preprocess").entered();
        if let Some(s) = &mut self.surface {
            if !s.preprocess(session) {
                return Err(RenderError::PreprocessFailed { integrator: s.name().to_string() });
            }
        }
        if let Some(v) = &mut self.volume {
            if !v.preprocess(session) {
                return Err(RenderError::PreprocessFailed { integrator: v.name().to_string() });
            }
        }
        Ok(())
    }

    fn cleanup(&mut self) {
        if let Some(s) = &mut self.surface {
            s.cleanup();
        }
        if let Some(v) = &mut self.volume {
            v.cleanup();
        }
    }

    fn run_passes(&self, pool: &rayon::ThreadPool, session: &RenderSession, film: &ImageFilm) -> Result<(), ArenaError> {
        let surface = match &self.surface {
            Some(s) => s.as_ref(),
            None => return Ok(()),
        };
        let tiles = film.tiles(self.settings.tile_size);
        let total_passes = self.settings.passes;

        for pass in 0..total_passes {
            if session.render_aborted() {
                break;
            }
            let _span = tracing::debug_span!("pass", pass = pass + 1).entered();
            session.set_current_pass(pass + 1);
            session.set_current_pass_percent(0.0);
            self.progress.init(tiles.len() as u64);
            self.progress.set_tag(&format!("Rendering pass {}/{}", pass + 1, total_passes));

            let done = AtomicUsize::new(0);
            pool.install(|| {
                tiles.par_iter().try_for_each(|tile| -> Result<(), ArenaError> {
                    // cooperative cancellation, checked once per tile
                    if session.render_aborted() {
                        return Ok(());
                    }
                    // a worker only ever locks its own arena, render_tile never yields to rayon
                    let worker = rayon::current_thread_index().unwrap_or(0) % self.arenas.len();
                    let mut arena = self.arenas[worker].lock();
                    self.render_tile(surface, session, film, &mut arena, *tile, pass)?;
                    drop(arena);

                    let n = done.fetch_add(1, Ordering::Relaxed) + 1;
                    session.set_current_pass_percent(100.0 * n as f32 / tiles.len() as f32);
                    self.progress.update(1);
                    Ok(())
                })
            })?;
            if !session.render_aborted() {
                session.set_current_pass_percent(100.0);
            }
            tracing::debug!(
                tiles = done.load(Ordering::Relaxed),
                scratch_blocks = self.scratch_block_count(),
                "pass done"
            );
        }
        Ok(())
    }

    fn render_tile(
        &self,
        surface: &dyn SurfaceIntegrator,
        session: &RenderSession,
        film: &ImageFilm,
        arena: &mut MemoryArena,
        tile: TileBounds,
        pass: u32,
    ) -> Result<(), ArenaError> {
        let spp = self.settings.samples_per_pass.max(1);
        let (width, _) = film.resolution();
        let use_differentials = session.differential_rays_enabled();
        let mut film_tile = film.tile(tile);

        for (x, y) in tile.pixels() {
            let pixel_number = y as u64 * width as u64 + x as u64;
            for sample in 0..spp {
                let seed = sample_seed(self.settings.seed, pass, pixel_number, sample);
                let (passes, err) = {
                    let mut state = RenderState::new(arena, seed).with_session(session);
                    state.start_pixel(pixel_number);

                    let (u, v) = state.get_2d();
                    let camera_sample = CameraSample {
                        p_film: Point2f::new(x as Float + u, y as Float + v),
                        time: 0.0,
                    };
                    let mut ray = if use_differentials {
                        let mut rd = self.camera.generate_ray_differential(camera_sample);
                        rd.scale_differentials(1.0 / (spp as Float).sqrt());
                        rd
                    } else {
                        RayDifferential::new(self.camera.generate_ray(camera_sample))
                    };

                    let mut passes = ColorPasses::new(self.settings.enabled_passes);
                    let mut col = surface.integrate(&mut state, &mut ray, &mut passes, 0);

                    if let Some(volume) = &self.volume {
                        let tr = volume.transmittance(&mut state, &ray.ray);
                        passes.scale_components(tr);
                        let lv = volume.integrate(&mut state, &ray.ray, &mut passes, 0);
                        col = col * tr + lv;
                    }

                    passes.set(PassType::Combined, check_radiance(col, pixel_number));
                    (passes, state.take_arena_error())
                };
                arena.free_all();

                if let Some(err) = err {
                    return Err(err);
                }
                film_tile.add_sample(x, y, &passes, 1.0);
            }
        }
        film.merge_tile(film_tile);
        Ok(())
    }
}

fn sample_seed(seed: u64, pass: u32, pixel: u64, sample: u32) -> u64 {
    seed.wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ ((pass as u64) << 48)
        ^ (pixel << 8)
        ^ sample as u64
}
