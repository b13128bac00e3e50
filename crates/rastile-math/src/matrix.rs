//! 3x3 homogeneous matrix for planar affine and perspective transforms.
//!
//! [`Matrix3`] maps image coordinates `(x, y)` through `(u, v, w) = M * (x, y, 1)`
//! and divides by `w`. It is the matrix type consumed by the resampler in
//! `rastile-ops`.
//!
//! # Convention
//!
//! Matrices are stored in **row-major** order and use **column vectors**:
//!
//! ```text
//! | m00 m01 m02 |   | x |   | u |
//! | m10 m11 m12 | * | y | = | v |
//! | m20 m21 m22 |   | 1 |   | w |
//! ```
//!
//! Builder methods such as [`Matrix3::translate`] and [`Matrix3::rotate`]
//! *pre*-multiply, so a chain reads in the order the operations are applied:
//!
//! ```rust
//! use rastile_math::Matrix3;
//!
//! // rotate about (10, 10): move the pivot to the origin, rotate, move back
//! let m = Matrix3::IDENTITY
//!     .translate(-10.0, -10.0)
//!     .rotate(std::f64::consts::FRAC_PI_2)
//!     .translate(10.0, 10.0);
//!
//! let (x, y) = m.transform_point(10.0, 10.0);
//! assert!((x - 10.0).abs() < 1e-9 && (y - 10.0).abs() < 1e-9);
//! ```

use std::ops::{Index, Mul};

/// Tolerance used by the structural predicates ([`Matrix3::is_identity`],
/// [`Matrix3::is_affine`], [`Matrix3::is_simple`]).
pub const MATRIX_EPSILON: f64 = 1e-6;

/// Determinant magnitude below which a matrix is treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-10;

/// A 3x3 transformation matrix in double precision.
#[derive(Debug, Clone, Copy, PartialEq)]
#[repr(C)]
pub struct Matrix3 {
    /// Elements in row-major order: `[row0, row1, row2]`.
    pub m: [[f64; 3]; 3],
}

impl Matrix3 {
    /// Zero matrix.
    pub const ZERO: Self = Self { m: [[0.0; 3]; 3] };

    /// Identity matrix.
    pub const IDENTITY: Self = Self {
        m: [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]],
    };

    /// Creates a matrix from row arrays.
    #[inline]
    pub const fn from_rows(rows: [[f64; 3]; 3]) -> Self {
        Self { m: rows }
    }

    /// Creates an affine matrix from the six coefficients of
    /// `u = a*x + b*y + c`, `v = d*x + e*y + f`.
    #[inline]
    pub const fn affine(a: f64, b: f64, c: f64, d: f64, e: f64, f: f64) -> Self {
        Self::from_rows([[a, b, c], [d, e, f], [0.0, 0.0, 1.0]])
    }

    /// Returns `T(tx, ty) * self`.
    #[inline]
    pub fn translate(&self, tx: f64, ty: f64) -> Self {
        Self::affine(1.0, 0.0, tx, 0.0, 1.0, ty).mul_mat(self)
    }

    /// Returns `S(sx, sy) * self`.
    #[inline]
    pub fn scale(&self, sx: f64, sy: f64) -> Self {
        Self::affine(sx, 0.0, 0.0, 0.0, sy, 0.0).mul_mat(self)
    }

    /// Returns `R(theta) * self`, rotating by `theta` radians.
    ///
    /// With y pointing down, positive angles turn clockwise on screen.
    #[inline]
    pub fn rotate(&self, theta: f64) -> Self {
        let (s, c) = theta.sin_cos();
        Self::affine(c, -s, 0.0, s, c, 0.0).mul_mat(self)
    }

    /// Returns a horizontal shear (`u = x + amount * y`) applied after `self`.
    #[inline]
    pub fn xshear(&self, amount: f64) -> Self {
        Self::affine(1.0, amount, 0.0, 0.0, 1.0, 0.0).mul_mat(self)
    }

    /// Returns a vertical shear (`v = y + amount * x`) applied after `self`.
    #[inline]
    pub fn yshear(&self, amount: f64) -> Self {
        Self::affine(1.0, 0.0, 0.0, amount, 1.0, 0.0).mul_mat(self)
    }

    /// Computes the determinant.
    #[inline]
    pub fn determinant(&self) -> f64 {
        let m = &self.m;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Computes the inverse, or `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Self> {
        let det = self.determinant();
        if det.abs() < SINGULAR_EPSILON || !det.is_finite() {
            return None;
        }

        let m = &self.m;
        let r = 1.0 / det;

        Some(Self::from_rows([
            [
                (m[1][1] * m[2][2] - m[1][2] * m[2][1]) * r,
                (m[0][2] * m[2][1] - m[0][1] * m[2][2]) * r,
                (m[0][1] * m[1][2] - m[0][2] * m[1][1]) * r,
            ],
            [
                (m[1][2] * m[2][0] - m[1][0] * m[2][2]) * r,
                (m[0][0] * m[2][2] - m[0][2] * m[2][0]) * r,
                (m[0][2] * m[1][0] - m[0][0] * m[1][2]) * r,
            ],
            [
                (m[1][0] * m[2][1] - m[1][1] * m[2][0]) * r,
                (m[0][1] * m[2][0] - m[0][0] * m[2][1]) * r,
                (m[0][0] * m[1][1] - m[0][1] * m[1][0]) * r,
            ],
        ]))
    }

    /// Returns the undivided homogeneous image of `(x, y, 1)`.
    #[inline]
    pub fn transform_homogeneous(&self, x: f64, y: f64) -> [f64; 3] {
        let m = &self.m;
        [
            m[0][0] * x + m[0][1] * y + m[0][2],
            m[1][0] * x + m[1][1] * y + m[1][2],
            m[2][0] * x + m[2][1] * y + m[2][2],
        ]
    }

    /// Maps a point, dividing by the homogeneous coordinate.
    ///
    /// A zero `w` leaves the point undivided; callers that need to report
    /// the degenerate case use [`Matrix3::transform_homogeneous`].
    #[inline]
    pub fn transform_point(&self, x: f64, y: f64) -> (f64, f64) {
        let [u, v, w] = self.transform_homogeneous(x, y);
        if w != 0.0 { (u / w, v / w) } else { (u, v) }
    }

    /// Matrix product `self * other`.
    #[inline]
    pub fn mul_mat(&self, other: &Self) -> Self {
        let mut result = Self::ZERO;
        for i in 0..3 {
            for j in 0..3 {
                result.m[i][j] = self.m[i][0] * other.m[0][j]
                    + self.m[i][1] * other.m[1][j]
                    + self.m[i][2] * other.m[2][j];
            }
        }
        result
    }

    /// True when every element is within [`MATRIX_EPSILON`] of the identity.
    pub fn is_identity(&self) -> bool {
        self.approx_eq(&Self::IDENTITY, MATRIX_EPSILON)
    }

    /// True when the bottom row is `(0, 0, 1)`.
    pub fn is_affine(&self) -> bool {
        self.m[2][0].abs() < MATRIX_EPSILON
            && self.m[2][1].abs() < MATRIX_EPSILON
            && (self.m[2][2] - 1.0).abs() < MATRIX_EPSILON
    }

    /// True for matrices made only of flips, quarter turns and translations.
    ///
    /// Every element of the linear 2x2 block is 0 or ±1. Such transforms
    /// land every pixel centre on a pixel centre, so interpolation is pointless.
    pub fn is_simple(&self) -> bool {
        if !self.is_affine() {
            return false;
        }
        for row in &self.m[..2] {
            for &value in &row[..2] {
                let a = value.abs();
                if a > MATRIX_EPSILON && (a - 1.0).abs() > MATRIX_EPSILON {
                    return false;
                }
            }
        }
        true
    }

    /// Returns true if all elements are finite.
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.m.iter().flatten().all(|x| x.is_finite())
    }

    /// Element-wise comparison within `eps`.
    pub fn approx_eq(&self, other: &Self, eps: f64) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(other.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= eps)
    }

    /// Converts to glam `DMat3` (column-major).
    #[inline]
    pub fn to_glam(&self) -> glam::DMat3 {
        glam::DMat3::from_cols_array_2d(&[
            [self.m[0][0], self.m[1][0], self.m[2][0]],
            [self.m[0][1], self.m[1][1], self.m[2][1]],
            [self.m[0][2], self.m[1][2], self.m[2][2]],
        ])
    }

    /// Creates from glam `DMat3`.
    #[inline]
    pub fn from_glam(m: glam::DMat3) -> Self {
        let c = m.to_cols_array_2d();
        Self::from_rows([
            [c[0][0], c[1][0], c[2][0]],
            [c[0][1], c[1][1], c[2][1]],
            [c[0][2], c[1][2], c[2][2]],
        ])
    }
}

impl Default for Matrix3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for Matrix3 {
    type Output = Self;

    #[inline]
    fn mul(self, rhs: Self) -> Self {
        self.mul_mat(&rhs)
    }
}

impl Index<usize> for Matrix3 {
    type Output = [f64; 3];

    #[inline]
    fn index(&self, i: usize) -> &[f64; 3] {
        &self.m[i]
    }
}

impl From<glam::DMat3> for Matrix3 {
    fn from(m: glam::DMat3) -> Self {
        Self::from_glam(m)
    }
}
