use cgmath::prelude::*;

use crate::{Differential, Float, Point2f, Point3f, Ray, RayDifferential, Vec3f};

#[derive(Clone, Copy, Debug)]
pub struct CameraSample {
    /// Raster position, x to the right and y down, in pixels.
    pub p_film: Point2f,
    pub time: Float,
}

pub trait Camera: Send + Sync {
    /// Image size in pixels.
    fn resolution(&self) -> (u32, u32);

    fn generate_ray(&self, sample: CameraSample) -> Ray;

    /// Camera ray plus the rays through the neighbouring pixels in x and y.
    fn generate_ray_differential(&self, sample: CameraSample) -> RayDifferential {
        let ray = self.generate_ray(sample);

        let shift_x = CameraSample { p_film: Point2f::new(sample.p_film.x + 1.0, sample.p_film.y), ..sample };
        let rx = self.generate_ray(shift_x);

        let shift_y = CameraSample { p_film: Point2f::new(sample.p_film.x, sample.p_film.y + 1.0), ..sample };
        let ry = self.generate_ray(shift_y);

        RayDifferential::with_differential(ray, Differential {
            rx_origin: rx.origin,
            rx_dir: rx.dir,
            ry_origin: ry.origin,
            ry_dir: ry.dir,
        })
    }
}

pub struct PinholeCamera {
    origin: Point3f,
    lower_left: Vec3f,
    horizontal: Vec3f,
    vertical: Vec3f,
    width: u32,
    height: u32,
}

impl PinholeCamera {
    /// `vfov` is the vertical field of view in degrees.
    pub fn new(look_from: Point3f, look_at: Point3f, up: Vec3f, vfov: Float, width: u32, height: u32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let aspect = width as Float / height as Float;
        let half_height = (vfov.to_radians() / 2.0).tan();
        let half_width = aspect * half_height;

        // w points away from the scene
        let w = (look_from - look_at).normalize();
        let u = up.cross(w).normalize();
        let v = w.cross(u);

        Self {
            origin: look_from,
            lower_left: -half_width * u - half_height * v - w,
            horizontal: 2.0 * half_width * u,
            vertical: 2.0 * half_height * v,
            width,
            height,
        }
    }
}

impl Camera for PinholeCamera {
    fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn generate_ray(&self, sample: CameraSample) -> Ray {
        let s = sample.p_film.x / self.width as Float;
        let t = 1.0 - sample.p_film.y / self.height as Float;
        let dir = (self.lower_left + s * self.horizontal + t * self.vertical).normalize();
        Ray { time: sample.time, ..Ray::new(self.origin, dir) }
    }
}
