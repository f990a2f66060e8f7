//! Small fixed-size 3-vector used for cell coordinates, process-grid
//! coordinates and physical positions.

use num_traits::{Num, Signed};
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Index, IndexMut, Mul, Neg, Sub};

/// Component-wise `(x, y, z)` triple.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec3<T> {
    pub x: T,
    pub y: T,
    pub z: T,
}

/// Integer triple: process-grid coordinate or cell coordinate.
pub type Int3 = Vec3<i64>;
/// Continuous triple: position or velocity in simulation units.
pub type Double3 = Vec3<f64>;

impl<T> Vec3<T> {
    #[inline]
    pub const fn new(x: T, y: T, z: T) -> Self {
        Self { x, y, z }
    }
}

impl<T: Copy> Vec3<T> {
    #[inline]
    pub fn splat(v: T) -> Self {
        Self::new(v, v, v)
    }

    #[inline]
    pub fn map<U>(self, f: impl Fn(T) -> U) -> Vec3<U> {
        Vec3::new(f(self.x), f(self.y), f(self.z))
    }

    #[inline]
    pub fn zip_with<U: Copy, R>(self, other: Vec3<U>, f: impl Fn(T, U) -> R) -> Vec3<R> {
        Vec3::new(f(self.x, other.x), f(self.y, other.y), f(self.z, other.z))
    }

    #[inline]
    pub fn to_array(self) -> [T; 3] {
        [self.x, self.y, self.z]
    }

    #[inline]
    pub fn all(self, f: impl Fn(T) -> bool) -> bool {
        f(self.x) && f(self.y) && f(self.z)
    }
}

impl<T: Num + Copy> Vec3<T> {
    #[inline]
    pub fn zero() -> Self {
        Self::splat(T::zero())
    }

    #[inline]
    pub fn component_mul(self, o: Self) -> Self {
        self.zip_with(o, |a, b| a * b)
    }

    /// Product of the three components (cell or process count of a box).
    #[inline]
    pub fn product(self) -> T {
        self.x * self.y * self.z
    }
}

impl<T: Num + Copy + Signed + PartialOrd> Vec3<T> {
    /// Largest absolute component.
    #[inline]
    pub fn max_abs(self) -> T {
        let (ax, ay, az) = (self.x.abs(), self.y.abs(), self.z.abs());
        let m = if ax > ay { ax } else { ay };
        if m > az { m } else { az }
    }
}

impl Int3 {
    /// `0 <= self < bounds` on every axis.
    #[inline]
    pub fn is_in_bounds(self, bounds: Int3) -> bool {
        self.x >= 0
            && self.y >= 0
            && self.z >= 0
            && self.x < bounds.x
            && self.y < bounds.y
            && self.z < bounds.z
    }

    #[inline]
    pub fn div_euclid(self, d: Int3) -> Int3 {
        self.zip_with(d, i64::div_euclid)
    }

    #[inline]
    pub fn rem_euclid(self, d: Int3) -> Int3 {
        self.zip_with(d, i64::rem_euclid)
    }

    #[inline]
    pub fn cast_f64(self) -> Double3 {
        self.map(|v| v as f64)
    }

    /// Row-major linear index with `x` varying fastest.
    #[inline]
    pub fn linear_index(self, dims: Int3) -> usize {
        (self.x + self.y * dims.x + self.z * dims.x * dims.y) as usize
    }

    /// Inverse of [`Int3::linear_index`].
    #[inline]
    pub fn from_linear_index(index: usize, dims: Int3) -> Int3 {
        let i = index as i64;
        Int3::new(i % dims.x, (i / dims.x) % dims.y, i / (dims.x * dims.y))
    }
}

impl Double3 {
    #[inline]
    pub fn is_finite(self) -> bool {
        self.all(f64::is_finite)
    }

    /// Replace non-finite components with zero.
    #[inline]
    pub fn sanitized(self) -> Double3 {
        self.map(|v| if v.is_finite() { v } else { 0.0 })
    }
}

impl<T: Num + Copy> Add for Vec3<T> {
    type Output = Self;
    #[inline]
    fn add(self, o: Self) -> Self {
        self.zip_with(o, |a, b| a + b)
    }
}

impl<T: Num + Copy> AddAssign for Vec3<T> {
    #[inline]
    fn add_assign(&mut self, o: Self) {
        *self = *self + o;
    }
}

impl<T: Num + Copy> Sub for Vec3<T> {
    type Output = Self;
    #[inline]
    fn sub(self, o: Self) -> Self {
        self.zip_with(o, |a, b| a - b)
    }
}

impl<T: Num + Copy> Mul<T> for Vec3<T> {
    type Output = Self;
    #[inline]
    fn mul(self, s: T) -> Self {
        self.map(|a| a * s)
    }
}

impl<T: Num + Copy + Neg<Output = T>> Neg for Vec3<T> {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        self.map(|a| -a)
    }
}

impl<T> Index<usize> for Vec3<T> {
    type Output = T;
    #[inline]
    fn index(&self, axis: usize) -> &T {
        match axis {
            0 => &self.x,
            1 => &self.y,
            2 => &self.z,
            _ => panic!("axis {axis} out of range for Vec3"),
        }
    }
}

impl<T> IndexMut<usize> for Vec3<T> {
    #[inline]
    fn index_mut(&mut self, axis: usize) -> &mut T {
        match axis {
            0 => &mut self.x,
            1 => &mut self.y,
            2 => &mut self.z,
            _ => panic!("axis {axis} out of range for Vec3"),
        }
    }
}
