use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use rendercore::{point3f, rgb, vec3f, ArenaError, ColorA, RayDifferential, RenderError, RenderSession, RenderState, SessionMonitor};
use rendercore::camera::PinholeCamera;
use rendercore::integrator::{AnyIntegrator, Integrator, IntegratorBase, IntegratorType, SurfaceIntegrator};
use rendercore::passes::{ColorPasses, PassType};
use rendercore::renderer::{RenderOutcome, RenderSettings, Renderer};
use rendercore::scene::SphereScene;

#[derive(Default)]
struct Counters {
    integrate: AtomicUsize,
    with_differentials: AtomicUsize,
    cleanup: AtomicUsize,
    fresh_arenas: AtomicUsize,
}

struct Probe {
    base: IntegratorBase,
    counters: Arc<Counters>,
    preprocess_ok: bool,
    abort_via: Option<SessionMonitor>,
    exhaust_arena: bool,
    scratch: bool,
}

impl Probe {
    fn new(counters: Arc<Counters>) -> Self {
        Self {
            base: IntegratorBase::new("Probe", "probe"),
            counters,
            preprocess_ok: true,
            abort_via: None,
            exhaust_arena: false,
            scratch: false,
        }
    }
}

impl Integrator for Probe {
    fn base(&self) -> &IntegratorBase {
        &self.base
    }

    fn base_mut(&mut self) -> &mut IntegratorBase {
        &mut self.base
    }

    fn integrator_type(&self) -> IntegratorType {
        IntegratorType::Surface
    }

    fn preprocess(&mut self, _session: &mut RenderSession) -> bool {
        self.preprocess_ok
    }

    fn cleanup(&mut self) {
        self.counters.cleanup.fetch_add(1, Ordering::SeqCst);
    }
}

impl SurfaceIntegrator for Probe {
    fn integrate(&self, state: &mut RenderState, ray: &mut RayDifferential, _passes: &mut ColorPasses, _depth: u32) -> ColorA {
        self.counters.integrate.fetch_add(1, Ordering::SeqCst);
        if ray.has_differentials() {
            self.counters.with_differentials.fetch_add(1, Ordering::SeqCst);
        }
        if self.scratch {
            // free_all keeps blocks, so nothing reserved means an arena never used before
            if state.arena.bytes_reserved() == 0 {
                self.counters.fresh_arenas.fetch_add(1, Ordering::SeqCst);
            }
            if let Err(err) = state.arena.alloc_bytes(64) {
                state.note_arena_error(err);
            }
        }
        if self.exhaust_arena {
            if let Err(err) = state.arena.alloc_bytes(usize::MAX) {
                state.note_arena_error(err);
            }
        }
        if let Some(monitor) = &self.abort_via {
            monitor.abort_render();
        }
        rgb!(1, 1, 1)
    }
}

fn renderer(probe: Probe, passes: u32) -> Renderer {
    let camera = PinholeCamera::new(point3f!(0, 0, 5), point3f!(0, 0, 0), vec3f!(0, 1, 0), 45.0, 4, 4);
    let settings = RenderSettings { passes, tile_size: 2, threads: 2, ..RenderSettings::default() };
    let mut renderer = Renderer::new(Box::new(camera), settings);
    renderer.set_integrator(AnyIntegrator::Surface(Box::new(probe)));
    renderer.set_scene(Arc::new(SphereScene::new()));
    renderer
}

#[test]
fn failed_preprocess_means_no_integrate() {
    let counters = Arc::new(Counters::default());
    let mut probe = Probe::new(counters.clone());
    probe.preprocess_ok = false;
    let mut renderer = renderer(probe, 3);
    let mut session = RenderSession::new();
    let film = renderer.create_film();

    let result = renderer.render(&mut session, &film);
    match result {
        Err(RenderError::PreprocessFailed { integrator }) => assert_eq!(integrator, "Probe"),
        other => panic!("unexpected result {:?}", other),
    }
    assert_eq!(counters.integrate.load(Ordering::SeqCst), 0);
    assert_eq!(counters.cleanup.load(Ordering::SeqCst), 1);
    assert!(session.render_aborted());
    assert!(!session.render_in_progress());
}

#[test]
fn progressive_passes_accumulate() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let mut renderer = renderer(Probe::new(counters.clone()), 3);
    let mut session = RenderSession::new();
    let film = renderer.create_film();

    assert_eq!(renderer.render(&mut session, &film)?, RenderOutcome::Finished);
    assert_eq!(counters.integrate.load(Ordering::SeqCst), 3 * 16);
    assert_eq!(session.total_passes(), 3);
    assert_eq!(session.current_pass(), 3);
    assert!(session.render_finished());
    assert_abs_diff_eq!(film.weight(1, 2), 3.0);
    assert_eq!(film.pixel(1, 2, PassType::Combined), Some(rgb!(1, 1, 1)));
    Ok(())
}

#[test]
fn resume_keeps_film_and_flags_session() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let mut renderer = renderer(Probe::new(counters.clone()), 2);
    let mut session = RenderSession::new();
    let film = renderer.create_film();

    renderer.render(&mut session, &film)?;
    assert!(!session.render_resumed());

    renderer.settings_mut().resume = true;
    assert_eq!(renderer.render(&mut session, &film)?, RenderOutcome::Finished);
    assert!(session.render_resumed());
    assert_abs_diff_eq!(film.weight(0, 0), 4.0);

    renderer.settings_mut().resume = false;
    renderer.render(&mut session, &film)?;
    assert_abs_diff_eq!(film.weight(0, 0), 2.0);
    assert_eq!(counters.cleanup.load(Ordering::SeqCst), 3);
    Ok(())
}

#[test]
fn abort_stops_the_render() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let mut session = RenderSession::new();
    let mut probe = Probe::new(counters.clone());
    probe.abort_via = Some(session.monitor());
    let mut renderer = renderer(probe, 5);
    let film = renderer.create_film();

    assert_eq!(renderer.render(&mut session, &film)?, RenderOutcome::Aborted);
    assert!(session.render_aborted());
    assert_eq!(session.current_pass(), 1);
    // tiles already started finish, nothing new is scheduled
    assert!(counters.integrate.load(Ordering::SeqCst) < 5 * 16);
    assert_eq!(counters.cleanup.load(Ordering::SeqCst), 1);
    Ok(())
}

#[test]
fn busy_session_is_rejected() {
    let counters = Arc::new(Counters::default());
    let mut renderer = renderer(Probe::new(counters.clone()), 1);
    let mut session = RenderSession::new();
    session.start_render();
    let film = renderer.create_film();

    assert!(matches!(renderer.render(&mut session, &film), Err(RenderError::AlreadyInProgress)));
    assert!(session.render_in_progress());
    assert_eq!(counters.integrate.load(Ordering::SeqCst), 0);
}

#[test]
fn differentials_follow_session_flag() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let mut renderer = renderer(Probe::new(counters.clone()), 1);
    let mut session = RenderSession::new();
    let film = renderer.create_film();

    renderer.render(&mut session, &film)?;
    assert_eq!(counters.with_differentials.load(Ordering::SeqCst), 0);

    session.set_differential_rays_enabled(true);
    renderer.render(&mut session, &film)?;
    assert_eq!(counters.with_differentials.load(Ordering::SeqCst), 16);
    Ok(())
}

#[test]
fn arena_exhaustion_is_reported() {
    let counters = Arc::new(Counters::default());
    let mut probe = Probe::new(counters.clone());
    probe.exhaust_arena = true;
    let mut renderer = renderer(probe, 2);
    let mut session = RenderSession::new();
    let film = renderer.create_film();

    match renderer.render(&mut session, &film) {
        Err(RenderError::Arena(ArenaError::LayoutOverflow { .. })) => {}
        other => panic!("unexpected result {:?}", other),
    }
    assert!(session.render_aborted());
    assert_eq!(counters.cleanup.load(Ordering::SeqCst), 1);
}

#[test]
fn worker_arenas_are_reused_across_passes() -> anyhow::Result<()> {
    let counters = Arc::new(Counters::default());
    let mut probe = Probe::new(counters.clone());
    probe.scratch = true;
    let camera = PinholeCamera::new(point3f!(0, 0, 5), point3f!(0, 0, 0), vec3f!(0, 1, 0), 45.0, 64, 64);
    let settings = RenderSettings { passes: 4, tile_size: 4, threads: 4, ..RenderSettings::default() };
    let mut renderer = Renderer::new(Box::new(camera), settings);
    renderer.set_integrator(AnyIntegrator::Surface(Box::new(probe)));
    renderer.set_scene(Arc::new(SphereScene::new()));
    let mut session = RenderSession::new();
    let film = renderer.create_film();

    assert_eq!(renderer.render(&mut session, &film)?, RenderOutcome::Finished);
    assert_eq!(counters.integrate.load(Ordering::SeqCst), 4 * 64 * 64);
    let fresh = counters.fresh_arenas.load(Ordering::SeqCst);
    assert!(fresh >= 1 && fresh <= 4, "{} arenas started empty", fresh);
    let blocks = renderer.scratch_block_count();
    assert!(blocks >= 1 && blocks <= 4);

    renderer.render(&mut session, &film)?;
    assert_eq!(counters.fresh_arenas.load(Ordering::SeqCst), fresh + (renderer.scratch_block_count() - blocks));
    Ok(())
}
