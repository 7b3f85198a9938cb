//! Photon storage shared across passes.
//!
//! A map is filled once while an integrator preprocesses, indexed with
//! [`PhotonMap::build`] and then only read while passes run.

use std::collections::HashMap;

use cgmath::prelude::*;
use smallvec::SmallVec;

use crate::{ColorA, Float, Point3f, Vec3f};

#[derive(Clone, Copy, Debug)]
pub struct Photon {
    pub pos: Point3f,
    /// Direction the photon arrived from, pointing away from the surface.
    pub dir: Vec3f,
    pub color: ColorA,
}

type CellKey = (i32, i32, i32);

pub struct PhotonMap {
    name: String,
    photons: Vec<Photon>,
    n_paths: usize,
    cell_size: Float,
    grid: HashMap<CellKey, Vec<u32>>,
    ready: bool,
}

/// A photon found by [`PhotonMap::gather`] and its squared distance to the lookup point.
#[derive(Clone, Copy, Debug)]
pub struct FoundPhoton<'a> {
    pub photon: &'a Photon,
    pub dist2: Float,
}

impl PhotonMap {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            photons: Vec::new(),
            n_paths: 0,
            cell_size: 1.0,
            grid: HashMap::new(),
            ready: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn push(&mut self, photon: Photon) {
        self.photons.push(photon);
        self.ready = false;
    }

    pub fn len(&self) -> usize {
        self.photons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photons.is_empty()
    }

    pub fn photons(&self) -> &[Photon] {
        &self.photons
    }

    /// Number of light paths that were traced to produce the stored photons.
    /// Photon power is normalized by this.
    pub fn num_paths(&self) -> usize {
        self.n_paths
    }

    pub fn set_num_paths(&mut self, n: usize) {
        self.n_paths = n;
    }

    /// True once indexed and not modified since.
    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn clear(&mut self) {
        self.photons.clear();
        self.grid.clear();
        self.n_paths = 0;
        self.ready = false;
    }

    /// Index the photons in a uniform grid. `cell_size` should be on the order of
    /// the lookup radius.
    pub fn build(&mut self, cell_size: Float) {
        self.cell_size = if cell_size.is_finite() && cell_size > 0.0 { cell_size } else { 1.0 };
        self.grid.clear();
        for (i, photon) in self.photons.iter().enumerate() {
            let key = Self::cell(photon.pos, self.cell_size);
            self.grid.entry(key).or_insert_with(Vec::new).push(i as u32);
        }
        self.ready = true;
        tracing::debug!(map = %self.name, photons = self.photons.len(), cells = self.grid.len(), "photon map indexed");
    }

    fn cell(p: Point3f, cell_size: Float) -> CellKey {
        (
            (p.x / cell_size).floor() as i32,
            (p.y / cell_size).floor() as i32,
            (p.z / cell_size).floor() as i32,
        )
    }

    /// Up to `max_photons` photons within `radius` of `p`, nearest first.
    pub fn gather(&self, p: Point3f, radius: Float, max_photons: usize) -> SmallVec<[FoundPhoton<'_>; 32]> {
        let r2 = radius * radius;
        let mut found = SmallVec::new();

        if self.ready {
            let lo = Self::cell(p - Vec3f::from_value(radius), self.cell_size);
            let hi = Self::cell(p + Vec3f::from_value(radius), self.cell_size);
            for x in lo.0..=hi.0 {
                for y in lo.1..=hi.1 {
                    for z in lo.2..=hi.2 {
                        if let Some(indices) = self.grid.get(&(x, y, z)) {
                            for &i in indices {
                                Self::consider(&self.photons[i as usize], p, r2, &mut found);
                            }
                        }
                    }
                }
            }
        } else {
            for photon in &self.photons {
                Self::consider(photon, p, r2, &mut found);
            }
        }

        if found.len() > max_photons {
            found.sort_unstable_by(|a, b| a.dist2.partial_cmp(&b.dist2).unwrap_or(std::cmp::Ordering::Equal));
            found.truncate(max_photons);
        }
        found
    }

    #[inline]
    fn consider<'a>(photon: &'a Photon, p: Point3f, r2: Float, found: &mut SmallVec<[FoundPhoton<'a>; 32]>) {
        let dist2 = (photon.pos - p).magnitude2();
        if dist2 <= r2 {
            found.push(FoundPhoton { photon, dist2 });
        }
    }
}

impl std::fmt::Debug for PhotonMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhotonMap")
            .field("name", &self.name)
            .field("photons", &self.photons.len())
            .field("n_paths", &self.n_paths)
            .field("ready", &self.ready)
            .finish()
    }
}
