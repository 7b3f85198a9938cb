use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256Plus;

use crate::{ArenaError, Float, MemoryArena, RenderSession};

/// Per-ray evaluation state, owned by one worker at a time.
///
/// The arena is borrowed from the worker, which resets it once the state (and
/// everything allocated through it) is gone.
pub struct RenderState<'a> {
    pub arena: &'a MemoryArena,
    /// Session whose persistent maps may be read while passes run.
    pub session: Option<&'a RenderSession>,
    /// Recursion depth of the ray being evaluated, 0 for camera rays.
    pub ray_level: u32,
    pub pixel_number: u64,
    rng: Xoshiro256Plus,
    arena_error: Option<ArenaError>,
}

impl<'a> RenderState<'a> {
    pub fn new(arena: &'a MemoryArena, seed: u64) -> Self {
        Self {
            arena,
            session: None,
            ray_level: 0,
            pixel_number: 0,
            rng: Xoshiro256Plus::seed_from_u64(seed),
            arena_error: None,
        }
    }

    pub fn with_session(mut self, session: &'a RenderSession) -> Self {
        self.session = Some(session);
        self
    }

    /// Prepare for the camera ray of a new pixel.
    pub fn start_pixel(&mut self, pixel_number: u64) {
        self.pixel_number = pixel_number;
        self.ray_level = 0;
    }

    pub fn get_1d(&mut self) -> Float {
        self.rng.gen()
    }

    pub fn get_2d(&mut self) -> (Float, Float) {
        (self.rng.gen(), self.rng.gen())
    }

    /// Remember an allocation failure hit during `integrate`. Only the first
    /// one is kept.
    pub fn note_arena_error(&mut self, err: ArenaError) {
        if self.arena_error.is_none() {
            tracing::error!(error = %err, pixel = self.pixel_number, "scratch allocation failed");
            self.arena_error = Some(err);
        }
    }

    pub fn arena_error(&self) -> Option<ArenaError> {
        self.arena_error
    }

    pub fn take_arena_error(&mut self) -> Option<ArenaError> {
        self.arena_error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_error_kept() {
        let arena = MemoryArena::default();
        let mut state = RenderState::new(&arena, 1);
        state.note_arena_error(ArenaError::OutOfMemory { bytes: 10 });
        state.note_arena_error(ArenaError::LayoutOverflow { bytes: 20 });
        assert_eq!(state.take_arena_error(), Some(ArenaError::OutOfMemory { bytes: 10 }));
        assert_eq!(state.arena_error(), None);
    }

    #[test]
    fn test_same_seed_same_sequence() {
        let arena = MemoryArena::default();
        let mut a = RenderState::new(&arena, 42);
        let mut b = RenderState::new(&arena, 42);
        for _ in 0..8 {
            let x = a.get_1d();
            assert!(x >= 0.0 && x < 1.0);
            assert_eq!(x, b.get_1d());
        }
    }

    #[test]
    fn test_start_pixel_resets_depth() {
        let arena = MemoryArena::default();
        let mut state = RenderState::new(&arena, 0);
        state.ray_level = 3;
        state.start_pixel(17);
        assert_eq!(state.ray_level, 0);
        assert_eq!(state.pixel_number, 17);
    }
}
