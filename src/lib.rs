#[macro_use] pub mod macros; // must stay at the top
pub mod error;
pub mod memory;
pub mod color;
pub mod geometry;
pub mod passes;
pub mod progress;
pub mod photon;
pub mod session;
pub mod state;
pub mod scene;
pub mod camera;
pub mod film;
pub mod integrator;
pub mod renderer;

pub use geometry::*;
pub use color::ColorA;
pub use error::{ArenaError, RenderError};
pub use memory::{MemoryArena, ObjectArena};
pub use session::{RenderSession, SessionMonitor, RenderPhase};
pub use state::RenderState;

use cgmath::{Point2, Point3, Vector3};

pub type Float = f32;

pub type Point2f = Point2<Float>;
pub type Point3f = Point3<Float>;
pub type Vec3f = Vector3<Float>;

pub const INFINITY: Float = std::f32::INFINITY;
pub const PI: Float = std::f32::consts::PI;
pub const INV_PI: Float = std::f32::consts::FRAC_1_PI;
