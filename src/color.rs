use crate::Float;

/// RGB color with an alpha channel. Arithmetic applies to all four channels.
#[derive(Clone, Copy, PartialEq, Default)]
pub struct ColorA {
    pub r: Float,
    pub g: Float,
    pub b: Float,
    pub a: Float,
}

impl ColorA {
    #[inline]
    pub const fn new(r: Float, g: Float, b: Float, a: Float) -> Self {
        Self { r, g, b, a }
    }

    #[inline]
    pub const fn rgb(r: Float, g: Float, b: Float) -> Self {
        Self::new(r, g, b, 1.0)
    }

    /// All channels zero, including alpha.
    #[inline]
    pub const fn transparent() -> Self {
        Self::new(0.0, 0.0, 0.0, 0.0)
    }

    /// Zero radiance with full coverage.
    #[inline]
    pub const fn black() -> Self {
        Self::new(0.0, 0.0, 0.0, 1.0)
    }

    pub const fn uniform(val: Float) -> Self {
        Self::new(val, val, val, val)
    }

    #[inline]
    pub fn new_with<F: FnMut(usize) -> Float>(mut init: F) -> Self {
        Self::new(init(0), init(1), init(2), init(3))
    }

    #[inline]
    pub fn to_array(self) -> [Float; 4] {
        [self.r, self.g, self.b, self.a]
    }

    #[inline]
    pub fn map<F: Fn(Float) -> Float>(self, f: F) -> Self {
        Self::new(f(self.r), f(self.g), f(self.b), f(self.a))
    }

    #[inline]
    pub fn zip<F: Fn(Float, Float) -> Float>(self, other: Self, f: F) -> Self {
        Self::new(f(self.r, other.r), f(self.g, other.g), f(self.b, other.b), f(self.a, other.a))
    }

    /// Same color channels with a different alpha.
    pub fn with_alpha(self, a: Float) -> Self {
        Self { a, ..self }
    }

    /// True when every color channel is zero. Alpha is ignored.
    pub fn is_black(&self) -> bool {
        self.r == 0.0 && self.g == 0.0 && self.b == 0.0
    }

    pub fn is_finite(&self) -> bool {
        self.to_array().iter().all(|x| x.is_finite())
    }

    pub fn clamp(self, low: Float, high: Float) -> Self {
        self.map(|x| x.max(low).min(high))
    }

    /// Replace NaN and infinite channels with zero and clamp negatives to zero.
    pub fn sanitized(self) -> Self {
        self.map(|x| if x.is_finite() { x.max(0.0) } else { 0.0 })
    }

    /// Channel-wise `e^x` on the color channels, alpha set to 1.
    pub fn exp(self) -> Self {
        Self::rgb(self.r.exp(), self.g.exp(), self.b.exp())
    }
}

impl std::ops::Index<usize> for ColorA {
    type Output = Float;

    fn index(&self, index: usize) -> &Self::Output {
        match index {
            0 => &self.r,
            1 => &self.g,
            2 => &self.b,
            3 => &self.a,
            _ => panic!("ColorA index out of range: {}", index),
        }
    }
}

impl std::fmt::Debug for ColorA {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.to_array().iter()).finish()
    }
}

impl From<[Float; 4]> for ColorA {
    fn from(a: [Float; 4]) -> Self {
        Self::new(a[0], a[1], a[2], a[3])
    }
}

impl From<[Float; 3]> for ColorA {
    fn from(a: [Float; 3]) -> Self {
        Self::rgb(a[0], a[1], a[2])
    }
}

impl From<ColorA> for [Float; 4] {
    fn from(c: ColorA) -> Self {
        c.to_array()
    }
}

impl std::iter::Sum for ColorA {
    fn sum<I: Iterator<Item=Self>>(iter: I) -> Self {
        iter.fold(Self::transparent(), std::ops::Add::add)
    }
}

impl std::ops::Neg for ColorA {
    type Output = Self;

    fn neg(self) -> Self {
        self.map(|x| -x)
    }
}

macro_rules! impl_op {
    ($op:ident, $name:ident, $sym:tt) => {
        impl std::ops::$op for ColorA {
            type Output = Self;

            #[inline]
            fn $name(self, rhs: Self) -> Self::Output {
                self.zip(rhs, |x, y| x $sym y)
            }
        }

        impl std::ops::$op<Float> for ColorA {
            type Output = Self;

            #[inline]
            fn $name(self, rhs: Float) -> Self::Output {
                self.map(|x| x $sym rhs)
            }
        }

        impl std::ops::$op<ColorA> for Float {
            type Output = ColorA;

            #[inline]
            fn $name(self, rhs: ColorA) -> Self::Output {
                rhs.map(|x| self $sym x)
            }
        }
    }
}

macro_rules! impl_assign_op {
    ($op:ident, $name:ident, $sym:tt) => {
        impl std::ops::$op for ColorA {
            #[inline]
            fn $name(&mut self, rhs: Self) {
                self.r $sym rhs.r;
                self.g $sym rhs.g;
                self.b $sym rhs.b;
                self.a $sym rhs.a;
            }
        }

        impl std::ops::$op<Float> for ColorA {
            #[inline]
            fn $name(&mut self, rhs: Float) {
                self.r $sym rhs;
                self.g $sym rhs;
                self.b $sym rhs;
                self.a $sym rhs;
            }
        }
    }
}

impl_op!(Add, add, +);
impl_op!(Sub, sub, -);
impl_op!(Mul, mul, *);
impl_op!(Div, div, /);
impl_assign_op!(AddAssign, add_assign, +=);
impl_assign_op!(SubAssign, sub_assign, -=);
impl_assign_op!(MulAssign, mul_assign, *=);
impl_assign_op!(DivAssign, div_assign, /=);
