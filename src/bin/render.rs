use std::env::args;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use rendercore::{point3f, rgb, vec3f, Bounds3f, RenderSession};
use rendercore::camera::PinholeCamera;
use rendercore::integrator::{AnyIntegrator, DirectLightingIntegrator, EmissionIntegrator};
use rendercore::integrator::direct_lighting::CausticParams;
use rendercore::passes::{PassMask, PassType};
use rendercore::progress::ConsoleProgress;
use rendercore::renderer::{RenderOutcome, RenderSettings, Renderer};
use rendercore::scene::{HomogeneousRegion, Material, PointLight, Sphere, SphereScene};

fn demo_scene() -> SphereScene {
    let mut scene = SphereScene::new().with_background(rgb!(0.05, 0.05, 0.08));
    scene
        .add_sphere(Sphere::new(point3f!(0, -1000, 0), 999.0, Material::matte(rgb!(0.6, 0.6, 0.6))))
        .add_sphere(Sphere::new(point3f!(-1.2, 0, 0), 1.0, Material::matte(rgb!(0.8, 0.3, 0.2))))
        .add_sphere(Sphere::new(point3f!(1.2, 0, 0), 1.0, Material::mirror(rgb!(0.9, 0.9, 0.9))))
        .add_sphere(Sphere::new(point3f!(0, 2.5, -2), 0.3, Material::emitter(rgb!(4, 4, 3))))
        .add_light(PointLight::new(point3f!(0, 4, 2), rgb!(30, 30, 28)))
        .add_region(HomogeneousRegion::new(
            Bounds3f::with_bounds(point3f!(-3, -1, -3), point3f!(3, 0.5, 3)),
            0.15,
            rgb!(0.2, 0.2, 0.3),
            rgb!(0, 0, 0),
            rgb!(0.05, 0.05, 0.1),
        ));
    scene
}

fn join_monitor(handle: JoinHandle<()>) -> anyhow::Result<()> {
    handle.join().map_err(|_| anyhow::anyhow!("render monitor thread panicked"))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let output = PathBuf::from(args().nth(1).unwrap_or_else(|| "render.png".to_string()));
    let timeout = args().nth(2)
        .map(|s| s.parse::<u64>().context("timeout must be a number of seconds"))
        .transpose()?
        .map(Duration::from_secs);

    let settings = RenderSettings {
        passes: 8,
        samples_per_pass: 2,
        enabled_passes: PassMask::DIFFUSE | PassMask::SPECULAR | PassMask::VOLUME | PassMask::CAUSTIC,
        ..RenderSettings::default()
    };
    let camera = PinholeCamera::new(point3f!(0, 1.5, 7), point3f!(0, 0, 0), vec3f!(0, 1, 0), 40.0, 640, 400);

    let mut renderer = Renderer::new(Box::new(camera), settings);
    let surface = DirectLightingIntegrator::new(4).with_caustics(CausticParams::default());
    renderer.set_integrator(AnyIntegrator::Surface(Box::new(surface)));
    renderer.set_integrator(AnyIntegrator::Volume(Box::new(EmissionIntegrator::new())));
    renderer.set_scene(Arc::new(demo_scene()));
    renderer.set_progress_bar(Arc::new(ConsoleProgress::new()));

    let mut session = RenderSession::new();
    session.set_path_image_output(output.clone());
    session.set_differential_rays_enabled(true);

    let monitor = session.monitor();
    let done = Arc::new(AtomicBool::new(false));
    let watcher = {
        let done = done.clone();
        thread::spawn(move || {
            let start = Instant::now();
            while !done.load(Ordering::Acquire) {
                thread::sleep(Duration::from_millis(250));
                let status = monitor.snapshot();
                tracing::debug!(
                    pass = status.current_pass,
                    total = status.total_passes,
                    percent = status.current_pass_percent,
                    "render status"
                );
                if let Some(timeout) = timeout {
                    if start.elapsed() > timeout && monitor.render_in_progress() && monitor.abort_render() {
                        tracing::warn!(?timeout, "render timed out, aborting");
                    }
                }
            }
        })
    };

    let film = renderer.create_film();
    let outcome = renderer.render(&mut session, &film);
    done.store(true, Ordering::Release);
    join_monitor(watcher)?;

    match outcome? {
        RenderOutcome::Finished => tracing::info!("render complete"),
        RenderOutcome::Aborted => tracing::warn!(pass = session.current_pass(), "writing partial render"),
    }

    let path = session.path_image_output().unwrap_or(output);
    film.write_png(&path, PassType::Combined)?;
    for pass in &[PassType::Diffuse, PassType::Specular, PassType::Volume, PassType::Caustic] {
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("render");
        film.write_png(path.with_file_name(format!("{}_{}.png", stem, pass.name())), *pass)?;
    }
    Ok(())
}
