
/// Convenience macro that allows creating a Vec3 without needing to use f32 literals
///
/// ```
/// use rendercore::{vec3f, Vec3f};
/// assert_eq!(vec3f!(1, 2, 3), Vec3f::new(1.0, 2.0, 3.0));
/// ```
///
#[macro_export]
macro_rules! vec3f {
    ($x:expr, $y:expr, $z:expr) => {
        $crate::Vec3f::new($x as $crate::Float, $y as $crate::Float, $z as $crate::Float)
    };
}

#[macro_export]
macro_rules! point3f {
    ( ($x:expr , $y:expr , $z:expr) ) => { $crate::Point3f::new($x as $crate::Float, $y as $crate::Float, $z as $crate::Float)};
    ($x:expr , $y:expr , $z:expr) => { $crate::Point3f::new($x as $crate::Float, $y as $crate::Float, $z as $crate::Float)};
}

/// Opaque RGB color, alpha = 1.
///
/// ```
/// use rendercore::{rgb, ColorA};
/// assert_eq!(rgb!(1, 0.5, 0), ColorA::new(1.0, 0.5, 0.0, 1.0));
/// ```
#[macro_export]
macro_rules! rgb {
    ($r:expr, $g:expr, $b:expr) => {
        $crate::ColorA::new($r as $crate::Float, $g as $crate::Float, $b as $crate::Float, 1.0)
    };
}
