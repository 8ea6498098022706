//! Equivalent inertia boxes
//!
//! A link's inertia tensor is diagonalized with cyclic Jacobi rotations. The
//! principal moments are then inverted through the solid box formula to get
//! the box with the same mass and moments, oriented along the principal axes.

use crate::config::InertiaConfig;
use bevy::math::{DMat3, DQuat, DVec3};
use linkview_core::InertiaTensor;

const JACOBI_TOLERANCE: f64 = 1e-10;
const JACOBI_MAX_ITERATIONS: usize = 50;
const ZERO_MOMENT: f64 = 1e-12;

/// Eigen-decomposition of a symmetric 3x3 matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SymmetricEigen {
    pub values: [f64; 3],
    /// Column `i` is the unit eigenvector for `values[i]`
    pub vectors: DMat3,
}

/// Jacobi eigenvalue iteration. Each step zeroes the largest off-diagonal
/// entry with a plane rotation and accumulates the rotation into the
/// eigenvector matrix. Values are left in diagonal order, not sorted.
pub fn symmetric_eigen(matrix: [[f64; 3]; 3]) -> SymmetricEigen {
    let mut a = matrix;
    let mut v = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];

    for _ in 0..JACOBI_MAX_ITERATIONS {
        let (p, q) = [(0, 1), (0, 2), (1, 2)]
            .into_iter()
            .max_by(|x, y| a[x.0][x.1].abs().total_cmp(&a[y.0][y.1].abs()))
            .unwrap_or((0, 1));
        let apq = a[p][q];
        if apq.abs() < JACOBI_TOLERANCE {
            break;
        }

        let theta = (a[q][q] - a[p][p]) / (2.0 * apq);
        let t = if theta == 0.0 {
            1.0
        } else {
            theta.signum() / (theta.abs() + (theta * theta + 1.0).sqrt())
        };
        let c = 1.0 / (t * t + 1.0).sqrt();
        let s = t * c;

        let mut rotation = [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]];
        rotation[p][p] = c;
        rotation[q][q] = c;
        rotation[p][q] = s;
        rotation[q][p] = -s;

        a = multiply(&transpose(&rotation), &multiply(&a, &rotation));
        v = multiply(&v, &rotation);
    }

    SymmetricEigen {
        values: [a[0][0], a[1][1], a[2][2]],
        vectors: DMat3::from_cols(
            DVec3::new(v[0][0], v[1][0], v[2][0]),
            DVec3::new(v[0][1], v[1][1], v[2][1]),
            DVec3::new(v[0][2], v[1][2], v[2][2]),
        ),
    }
}

fn multiply(a: &[[f64; 3]; 3], b: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in out.iter_mut().enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            *cell = (0..3).map(|k| a[i][k] * b[k][j]).sum();
        }
    }
    out
}

fn transpose(m: &[[f64; 3]; 3]) -> [[f64; 3]; 3] {
    let mut out = [[0.0; 3]; 3];
    for (i, row) in m.iter().enumerate() {
        for (j, value) in row.iter().enumerate() {
            out[j][i] = *value;
        }
    }
    out
}

/// Box with the same mass and principal moments as a link
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InertiaBox {
    /// Extent along the rotated X axis
    pub width: f64,
    /// Extent along the rotated Y axis
    pub height: f64,
    /// Extent along the rotated Z axis
    pub depth: f64,
    /// Principal axes relative to the inertial frame
    pub rotation: DQuat,
}

impl InertiaBox {
    pub fn size(&self) -> DVec3 {
        DVec3::new(self.width, self.height, self.depth)
    }
}

/// Equivalent box for an inertia tensor, or `None` when the data is zero,
/// a placeholder, or physically implausible.
pub fn compute_box(tensor: &InertiaTensor, mass: f64, limits: &InertiaConfig) -> Option<InertiaBox> {
    if !mass.is_finite() || mass <= 0.0 {
        return None;
    }

    let off_diagonal = tensor.ixy.abs().max(tensor.ixz.abs()).max(tensor.iyz.abs());
    let diagonal_scale = tensor.ixx.abs().max(tensor.iyy.abs()).max(tensor.izz.abs());
    let (moments, axes) = if off_diagonal <= JACOBI_TOLERANCE * diagonal_scale.max(1.0) {
        ([tensor.ixx, tensor.iyy, tensor.izz], DMat3::IDENTITY)
    } else {
        let eigen = symmetric_eigen(tensor.to_rows());
        (eigen.values, eigen.vectors)
    };
    let [i1, i2, i3] = moments;

    if moments.iter().all(|m| m.abs() < ZERO_MOMENT) {
        return None;
    }

    let radius = ((i1 + i2 + i3).abs() / (2.0 * mass)).sqrt();
    if mass < limits.min_mass && radius > limits.min_visual_size {
        return None;
    }

    let edge = |a: f64, b: f64, c: f64| (6.0 / mass * (b + c - a)).abs().sqrt();
    let width = edge(i1, i2, i3);
    let height = edge(i2, i3, i1);
    let depth = edge(i3, i1, i2);

    let average = (width + height + depth) / 3.0;
    if radius > average {
        return None;
    }

    let volume = width * height * depth;
    if volume > 0.0 && mass / volume < limits.min_density {
        return None;
    }

    // Principal axes must form a proper rotation
    let mut axes = axes;
    if axes.determinant() < 0.0 {
        axes.z_axis = -axes.z_axis;
    }

    Some(InertiaBox {
        width: width.max(limits.min_visual_size),
        height: height.max(limits.min_visual_size),
        depth: depth.max(limits.min_visual_size),
        rotation: DQuat::from_mat3(&axes).normalize(),
    })
}
