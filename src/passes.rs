//! Named output channels that integrators split their radiance into.

use bitflags::bitflags;

use crate::ColorA;

bitflags! {
    pub struct PassMask: u32 {
        const COMBINED      = 1 << 0;
        const DIFFUSE       = 1 << 1;
        const SPECULAR      = 1 << 2;
        const EMIT          = 1 << 3;
        const VOLUME        = 1 << 4;
        const CAUSTIC       = 1 << 5;
        const SHADOW        = 1 << 6;
    }
}

impl Default for PassMask {
    fn default() -> Self {
        PassMask::COMBINED
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassType {
    Combined,
    Diffuse,
    Specular,
    Emit,
    Volume,
    Caustic,
    Shadow,
}

const PASS_COUNT: usize = 7;

impl PassType {
    pub const ALL: [PassType; PASS_COUNT] = [
        PassType::Combined,
        PassType::Diffuse,
        PassType::Specular,
        PassType::Emit,
        PassType::Volume,
        PassType::Caustic,
        PassType::Shadow,
    ];

    pub fn mask(self) -> PassMask {
        match self {
            PassType::Combined => PassMask::COMBINED,
            PassType::Diffuse => PassMask::DIFFUSE,
            PassType::Specular => PassMask::SPECULAR,
            PassType::Emit => PassMask::EMIT,
            PassType::Volume => PassMask::VOLUME,
            PassType::Caustic => PassMask::CAUSTIC,
            PassType::Shadow => PassMask::SHADOW,
        }
    }

    fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            PassType::Combined => "combined",
            PassType::Diffuse => "diffuse",
            PassType::Specular => "specular",
            PassType::Emit => "emit",
            PassType::Volume => "volume",
            PassType::Caustic => "caustic",
            PassType::Shadow => "shadow",
        }
    }
}

/// Per-ray accumulator of decomposed contributions.
///
/// Enabled channels start at zero and every value stored is sanitized, so an
/// enabled channel is always finite and non-negative. Writes to disabled
/// channels are dropped.
#[derive(Clone, Debug)]
pub struct ColorPasses {
    enabled: PassMask,
    values: [ColorA; PASS_COUNT],
}

impl ColorPasses {
    pub fn new(enabled: PassMask) -> Self {
        Self {
            enabled: enabled | PassMask::COMBINED,
            values: [ColorA::transparent(); PASS_COUNT],
        }
    }

    pub fn enabled(&self) -> PassMask {
        self.enabled
    }

    pub fn is_enabled(&self, pass: PassType) -> bool {
        self.enabled.contains(pass.mask())
    }

    /// True if any channel besides `Combined` wants values.
    pub fn wants_extra_passes(&self) -> bool {
        !(self.enabled - PassMask::COMBINED).is_empty()
    }

    pub fn get(&self, pass: PassType) -> Option<ColorA> {
        if self.is_enabled(pass) {
            Some(self.values[pass.index()])
        } else {
            None
        }
    }

    pub fn add(&mut self, pass: PassType, color: ColorA) {
        if self.is_enabled(pass) {
            let slot = &mut self.values[pass.index()];
            *slot = (*slot + color.sanitized()).sanitized();
        }
    }

    pub fn set(&mut self, pass: PassType, color: ColorA) {
        if self.is_enabled(pass) {
            self.values[pass.index()] = color.sanitized();
        }
    }

    /// Multiply every channel but `Combined` by `factor`, e.g. volume transmittance.
    pub fn scale_components(&mut self, factor: ColorA) {
        let factor = factor.sanitized();
        for pass in PassType::ALL.iter().skip(1) {
            if self.is_enabled(*pass) {
                let slot = &mut self.values[pass.index()];
                *slot = (*slot * factor).sanitized();
            }
        }
    }

    /// Zero every channel, keeping the enabled set.
    pub fn reset(&mut self) {
        self.values = [ColorA::transparent(); PASS_COUNT];
    }

    pub fn iter(&self) -> impl Iterator<Item=(PassType, ColorA)> + '_ {
        PassType::ALL.iter()
            .copied()
            .filter(move |p| self.is_enabled(*p))
            .map(move |p| (p, self.values[p.index()]))
    }
}

impl Default for ColorPasses {
    fn default() -> Self {
        Self::new(PassMask::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_pass_ignored() {
        let mut passes = ColorPasses::new(PassMask::DIFFUSE);
        passes.add(PassType::Specular, ColorA::rgb(1.0, 1.0, 1.0));
        assert_eq!(passes.get(PassType::Specular), None);
        assert_eq!(passes.get(PassType::Diffuse), Some(ColorA::transparent()));
        assert!(passes.is_enabled(PassType::Combined));
    }

    #[test]
    fn test_values_sanitized() {
        let mut passes = ColorPasses::new(PassMask::DIFFUSE | PassMask::EMIT);
        passes.add(PassType::Diffuse, ColorA::rgb(std::f32::NAN, -1.0, 0.5));
        passes.set(PassType::Emit, ColorA::rgb(std::f32::INFINITY, 2.0, 0.0));

        for (_, c) in passes.iter() {
            assert!(c.is_finite());
            assert!(c.r >= 0.0 && c.g >= 0.0 && c.b >= 0.0);
        }
        assert_eq!(passes.get(PassType::Diffuse), Some(ColorA::rgb(0.0, 0.0, 0.5)));
    }

    #[test]
    fn test_iter_enabled_only() {
        let passes = ColorPasses::new(PassMask::SHADOW);
        let names: Vec<_> = passes.iter().map(|(p, _)| p.name()).collect();
        assert_eq!(names, vec!["combined", "shadow"]);
        assert!(passes.wants_extra_passes());
        assert!(!ColorPasses::default().wants_extra_passes());
    }
}
