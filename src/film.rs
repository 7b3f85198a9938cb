use std::path::Path;

use parking_lot::Mutex;

use crate::{ColorA, Float, RenderError};
use crate::passes::{ColorPasses, PassMask, PassType};

/// Pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TileBounds {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl TileBounds {
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Pixels in scanline order.
    pub fn pixels(self) -> impl Iterator<Item=(u32, u32)> {
        (self.y0..self.y1).flat_map(move |y| (self.x0..self.x1).map(move |x| (x, y)))
    }
}

struct Channels {
    sums: Vec<(PassType, Vec<ColorA>)>,
    weights: Vec<Float>,
}

impl Channels {
    fn new(enabled: PassMask, len: usize) -> Self {
        let sums = PassType::ALL.iter()
            .copied()
            .filter(|p| enabled.contains(p.mask()))
            .map(|p| (p, vec![ColorA::transparent(); len]))
            .collect();
        Self { sums, weights: vec![0.0; len] }
    }

    fn clear(&mut self) {
        for (_, buf) in &mut self.sums {
            buf.iter_mut().for_each(|c| *c = ColorA::transparent());
        }
        self.weights.iter_mut().for_each(|w| *w = 0.0);
    }
}

/// Samples for one tile, accumulated by a single worker and merged into the
/// film when the tile is done.
pub struct FilmTile {
    bounds: TileBounds,
    channels: Channels,
}

impl FilmTile {
    pub fn bounds(&self) -> TileBounds {
        self.bounds
    }

    pub fn add_sample(&mut self, x: u32, y: u32, passes: &ColorPasses, weight: Float) {
        let b = self.bounds;
        if x < b.x0 || x >= b.x1 || y < b.y0 || y >= b.y1 {
            return;
        }
        let idx = (y - b.y0) as usize * b.width() as usize + (x - b.x0) as usize;
        for (pass, buf) in &mut self.channels.sums {
            if let Some(c) = passes.get(*pass) {
                buf[idx] += c * weight;
            }
        }
        self.channels.weights[idx] += weight;
    }
}

/// Accumulation buffer for every enabled pass channel.
///
/// Samples from every pass are averaged, so a progressive render refines the
/// same film pass after pass.
pub struct ImageFilm {
    width: u32,
    height: u32,
    enabled: PassMask,
    pixels: Mutex<Channels>,
}

impl ImageFilm {
    pub fn new(width: u32, height: u32, enabled: PassMask) -> Self {
        let enabled = enabled | PassMask::COMBINED;
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            enabled,
            pixels: Mutex::new(Channels::new(enabled, len)),
        }
    }

    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn enabled_passes(&self) -> PassMask {
        self.enabled
    }

    /// Split the image into tiles of at most `tile_size` pixels square.
    pub fn tiles(&self, tile_size: u32) -> Vec<TileBounds> {
        let ts = tile_size.max(1);
        let mut tiles = Vec::new();
        for y0 in (0..self.height).step_by(ts as usize) {
            for x0 in (0..self.width).step_by(ts as usize) {
                tiles.push(TileBounds {
                    x0,
                    y0,
                    x1: (x0 + ts).min(self.width),
                    y1: (y0 + ts).min(self.height),
                });
            }
        }
        tiles
    }

    pub fn tile(&self, bounds: TileBounds) -> FilmTile {
        FilmTile { bounds, channels: Channels::new(self.enabled, bounds.area()) }
    }

    pub fn merge_tile(&self, tile: FilmTile) {
        let b = tile.bounds;
        let mut pixels = self.pixels.lock();
        for (i, (x, y)) in b.pixels().enumerate() {
            if x >= self.width || y >= self.height {
                continue;
            }
            let idx = y as usize * self.width as usize + x as usize;
            for ((_, dst), (_, src)) in pixels.sums.iter_mut().zip(tile.channels.sums.iter()) {
                dst[idx] += src[i];
            }
            pixels.weights[idx] += tile.channels.weights[i];
        }
    }

    /// Average of the samples taken at a pixel. `None` if out of range or the
    /// pass is not recorded.
    pub fn pixel(&self, x: u32, y: u32, pass: PassType) -> Option<ColorA> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = y as usize * self.width as usize + x as usize;
        let pixels = self.pixels.lock();
        let (_, buf) = pixels.sums.iter().find(|(p, _)| *p == pass)?;
        let w = pixels.weights[idx];
        Some(if w > 0.0 { buf[idx] / w } else { ColorA::transparent() })
    }

    pub fn weight(&self, x: u32, y: u32) -> Float {
        if x >= self.width || y >= self.height {
            return 0.0;
        }
        self.pixels.lock().weights[y as usize * self.width as usize + x as usize]
    }

    pub fn clear(&self) {
        self.pixels.lock().clear();
    }

    /// 8-bit gamma corrected copy of one pass.
    pub fn to_image(&self, pass: PassType) -> Option<image::RgbaImage> {
        if !self.enabled.contains(pass.mask()) {
            return None;
        }
        let mut img = image::RgbaImage::new(self.width, self.height);
        for (x, y, px) in img.enumerate_pixels_mut() {
            let c = self.pixel(x, y, pass).unwrap_or_else(ColorA::transparent).sanitized();
            let to_byte = |v: Float, gamma: bool| {
                let v = if gamma { v.powf(1.0 / 2.2) } else { v };
                (v.max(0.0).min(1.0) * 255.0 + 0.5) as u8
            };
            *px = image::Rgba([to_byte(c.r, true), to_byte(c.g, true), to_byte(c.b, true), to_byte(c.a, false)]);
        }
        Some(img)
    }

    pub fn write_png(&self, path: impl AsRef<Path>, pass: PassType) -> Result<(), RenderError> {
        let path = path.as_ref();
        if let Some(img) = self.to_image(pass) {
            img.save_with_format(path, image::ImageFormat::Png)?;
            tracing::info!(path = %path.display(), pass = pass.name(), "wrote image");
        }
        Ok(())
    }
}
