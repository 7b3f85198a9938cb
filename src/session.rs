//! Render session coordination.
//!
//! [`SessionStatus`] is the lifecycle and progress register shared between the
//! thread driving a render and any number of observers. Every accessor takes the
//! lock for a single read or write, never across ray evaluation.
//!
//! [`RenderSession`] pairs a status handle with the photon maps that persist
//! between passes. The maps are written through `&mut RenderSession` while an
//! integrator preprocesses and only read through `&RenderSession` while passes
//! run, so they need no lock of their own.
//!
//! Lifecycle:
//!
//! ```text
//! Idle ──start──> Rendering ──finish──> Finished
//!                  │    ▲  └──abort───> Aborted
//!                  └resume┘
//! ```
//! Only `start_render` leaves `Finished` or `Aborted`.

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::photon::PhotonMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderPhase {
    Idle,
    Rendering,
    Finished,
    Aborted,
}

impl Default for RenderPhase {
    fn default() -> Self {
        RenderPhase::Idle
    }
}

/// Consistent copy of the whole status, taken under one lock.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StatusSnapshot {
    pub phase: RenderPhase,
    pub resumed: bool,
    pub total_passes: u32,
    pub current_pass: u32,
    pub current_pass_percent: f32,
    pub interactive: bool,
    pub differential_rays: bool,
}

#[derive(Default)]
struct StatusInner {
    snapshot: StatusSnapshot,
    path_scene_export: Option<PathBuf>,
    path_image_output: Option<PathBuf>,
}

impl StatusInner {
    fn accepts_progress(&self) -> bool {
        match self.snapshot.phase {
            RenderPhase::Idle | RenderPhase::Rendering => true,
            RenderPhase::Finished | RenderPhase::Aborted => false,
        }
    }
}

/// Synchronized lifecycle and progress state of a render.
///
/// The coordinator never fails: transitions that don't apply in the current
/// phase are rejected (the method returns `false` and logs a warning) and leave
/// the state untouched. Progress updates are ignored once a render has finished
/// or been aborted, so observers never see progress after an abort.
#[derive(Default)]
pub struct SessionStatus {
    inner: Mutex<StatusInner>,
}

/// Handle for threads that only watch a render.
pub type SessionMonitor = Arc<SessionStatus>;

impl SessionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a render cycle. Clears the finished, aborted and resumed flags and
    /// the current pass progress; the total pass count is kept.
    pub fn start_render(&self) -> bool {
        let mut inner = self.inner.lock();
        let s = &mut inner.snapshot;
        if s.phase == RenderPhase::Rendering {
            tracing::warn!("start_render called while a render is already in progress");
            return false;
        }
        s.phase = RenderPhase::Rendering;
        s.resumed = false;
        s.current_pass = 0;
        s.current_pass_percent = 0.0;
        tracing::debug!("render started");
        true
    }

    /// Mark a running render as continuing from previously accumulated results.
    /// Pass counters are preserved.
    pub fn resume_render(&self) -> bool {
        let mut inner = self.inner.lock();
        let s = &mut inner.snapshot;
        if s.phase != RenderPhase::Rendering {
            tracing::warn!(phase = ?s.phase, "resume_render ignored, no render in progress");
            return false;
        }
        s.resumed = true;
        tracing::debug!(pass = s.current_pass, "render resumed");
        true
    }

    pub fn finish_render(&self) -> bool {
        self.end_render(RenderPhase::Finished)
    }

    /// Request cancellation. Workers observe it through [`SessionStatus::render_aborted`].
    pub fn abort_render(&self) -> bool {
        self.end_render(RenderPhase::Aborted)
    }

    fn end_render(&self, phase: RenderPhase) -> bool {
        let mut inner = self.inner.lock();
        let s = &mut inner.snapshot;
        if s.phase != RenderPhase::Rendering {
            tracing::warn!(from = ?s.phase, to = ?phase, "render transition ignored, no render in progress");
            return false;
        }
        s.phase = phase;
        tracing::debug!(?phase, pass = s.current_pass, total = s.total_passes, "render ended");
        true
    }

    pub fn set_total_passes(&self, total_passes: u32) {
        let mut inner = self.inner.lock();
        if inner.accepts_progress() {
            let s = &mut inner.snapshot;
            s.total_passes = total_passes;
            s.current_pass = s.current_pass.min(total_passes);
        }
    }

    /// Clamped to the total pass count.
    pub fn set_current_pass(&self, current_pass: u32) {
        let mut inner = self.inner.lock();
        if inner.accepts_progress() {
            let s = &mut inner.snapshot;
            s.current_pass = current_pass.min(s.total_passes);
        }
    }

    /// Clamped to [0, 100]. NaN is stored as 0.
    pub fn set_current_pass_percent(&self, percent: f32) {
        let percent = if percent.is_nan() { 0.0 } else { percent.max(0.0).min(100.0) };
        let mut inner = self.inner.lock();
        if inner.accepts_progress() {
            inner.snapshot.current_pass_percent = percent;
        }
    }

    pub fn set_interactive(&self, interactive: bool) {
        self.inner.lock().snapshot.interactive = interactive;
    }

    pub fn set_differential_rays_enabled(&self, enabled: bool) {
        self.inner.lock().snapshot.differential_rays = enabled;
    }

    pub fn set_path_scene_export(&self, path: impl Into<PathBuf>) {
        self.inner.lock().path_scene_export = Some(path.into());
    }

    pub fn set_path_image_output(&self, path: impl Into<PathBuf>) {
        self.inner.lock().path_image_output = Some(path.into());
    }

    pub fn phase(&self) -> RenderPhase {
        self.inner.lock().snapshot.phase
    }

    pub fn render_in_progress(&self) -> bool {
        self.phase() == RenderPhase::Rendering
    }

    pub fn render_resumed(&self) -> bool {
        self.inner.lock().snapshot.resumed
    }

    pub fn render_finished(&self) -> bool {
        self.phase() == RenderPhase::Finished
    }

    pub fn render_aborted(&self) -> bool {
        self.phase() == RenderPhase::Aborted
    }

    pub fn total_passes(&self) -> u32 {
        self.inner.lock().snapshot.total_passes
    }

    pub fn current_pass(&self) -> u32 {
        self.inner.lock().snapshot.current_pass
    }

    pub fn current_pass_percent(&self) -> f32 {
        self.inner.lock().snapshot.current_pass_percent
    }

    pub fn is_interactive(&self) -> bool {
        self.inner.lock().snapshot.interactive
    }

    pub fn differential_rays_enabled(&self) -> bool {
        self.inner.lock().snapshot.differential_rays
    }

    pub fn path_scene_export(&self) -> Option<PathBuf> {
        self.inner.lock().path_scene_export.clone()
    }

    pub fn path_image_output(&self) -> Option<PathBuf> {
        self.inner.lock().path_image_output.clone()
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        self.inner.lock().snapshot.clone()
    }
}

/// Identifies one of the session's persistent photon maps.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapKind {
    Caustic,
    Diffuse,
    Radiance,
}

/// Per-context render session: the shared status plus the photon maps that
/// live across passes. Dereferences to [`SessionStatus`].
#[derive(Default)]
pub struct RenderSession {
    status: Arc<SessionStatus>,
    caustic_map: Option<PhotonMap>,
    diffuse_map: Option<PhotonMap>,
    radiance_map: Option<PhotonMap>,
}

macro_rules! map_accessors {
    ($field:ident, $get_mut:ident, $set:ident, $take:ident) => {
        pub fn $field(&self) -> Option<&PhotonMap> {
            self.$field.as_ref()
        }

        pub fn $get_mut(&mut self) -> Option<&mut PhotonMap> {
            self.$field.as_mut()
        }

        /// Replace the map, returning the previous one.
        pub fn $set(&mut self, map: PhotonMap) -> Option<PhotonMap> {
            self.$field.replace(map)
        }

        pub fn $take(&mut self) -> Option<PhotonMap> {
            self.$field.take()
        }
    };
}

impl RenderSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    /// A status handle that can be moved to another thread.
    pub fn monitor(&self) -> SessionMonitor {
        self.status.clone()
    }

    map_accessors!(caustic_map, caustic_map_mut, set_caustic_map, take_caustic_map);
    map_accessors!(diffuse_map, diffuse_map_mut, set_diffuse_map, take_diffuse_map);
    map_accessors!(radiance_map, radiance_map_mut, set_radiance_map, take_radiance_map);

    pub fn map(&self, kind: MapKind) -> Option<&PhotonMap> {
        match kind {
            MapKind::Caustic => self.caustic_map.as_ref(),
            MapKind::Diffuse => self.diffuse_map.as_ref(),
            MapKind::Radiance => self.radiance_map.as_ref(),
        }
    }

    /// The map slot, created empty if needed.
    pub fn map_or_insert(&mut self, kind: MapKind) -> &mut PhotonMap {
        let (slot, name) = match kind {
            MapKind::Caustic => (&mut self.caustic_map, "caustic"),
            MapKind::Diffuse => (&mut self.diffuse_map, "diffuse"),
            MapKind::Radiance => (&mut self.radiance_map, "radiance"),
        };
        slot.get_or_insert_with(|| PhotonMap::new(name))
    }

    /// Drop every persistent map.
    pub fn clear_maps(&mut self) {
        self.caustic_map = None;
        self.diffuse_map = None;
        self.radiance_map = None;
    }
}

impl Deref for RenderSession {
    type Target = SessionStatus;

    fn deref(&self) -> &Self::Target {
        &self.status
    }
}
