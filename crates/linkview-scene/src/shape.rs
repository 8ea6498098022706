//! Renderable surface shapes and ray intersection
//!
//! Shapes are expressed in the surface's local frame. Cylinders and capsules
//! are aligned with local Z, matching the model description convention.

use bevy::math::{Affine3A, Vec3};
use std::sync::Arc;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    pub fn from_center_half(center: Vec3, half: Vec3) -> Self {
        Self {
            min: center - half,
            max: center + half,
        }
    }

    pub fn from_points(points: impl IntoIterator<Item = Vec3>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;
        let mut aabb = Self {
            min: first,
            max: first,
        };
        for p in iter {
            aabb.min = aabb.min.min(p);
            aabb.max = aabb.max.max(p);
        }
        Some(aabb)
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    pub fn expand(&self, margin: f32) -> Aabb {
        Aabb {
            min: self.min - Vec3::splat(margin),
            max: self.max + Vec3::splat(margin),
        }
    }

    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.cmpge(self.min).all() && p.cmple(self.max).all()
    }

    /// Bounds of this box after an affine transform
    pub fn transformed(&self, transform: &Affine3A) -> Aabb {
        let (min, max) = (self.min, self.max);
        let corners = [
            Vec3::new(min.x, min.y, min.z),
            Vec3::new(max.x, min.y, min.z),
            Vec3::new(min.x, max.y, min.z),
            Vec3::new(max.x, max.y, min.z),
            Vec3::new(min.x, min.y, max.z),
            Vec3::new(max.x, min.y, max.z),
            Vec3::new(min.x, max.y, max.z),
            Vec3::new(max.x, max.y, max.z),
        ];
        let mut out = Aabb {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        };
        for corner in corners {
            let p = transform.transform_point3(corner);
            out.min = out.min.min(p);
            out.max = out.max.max(p);
        }
        out
    }

    /// Slab test. Returns the entry distance, or 0 when the origin is inside.
    pub fn ray_distance(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        let mut t_min: f32 = 0.0;
        let mut t_max: f32 = f32::INFINITY;
        for axis in 0..3 {
            let o = origin[axis];
            let d = dir[axis];
            let (lo, hi) = (self.min[axis], self.max[axis]);
            if d.abs() < f32::EPSILON {
                if o < lo || o > hi {
                    return None;
                }
                continue;
            }
            let inv = 1.0 / d;
            let mut t1 = (lo - o) * inv;
            let mut t2 = (hi - o) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }
            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return None;
            }
        }
        Some(t_min)
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone, PartialEq)]
pub struct TriMesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<[u32; 3]>,
    bounds: Aabb,
}

impl TriMesh {
    pub fn new(positions: Vec<Vec3>, indices: Vec<[u32; 3]>) -> Self {
        let bounds = Aabb::from_points(positions.iter().copied()).unwrap_or(Aabb {
            min: Vec3::ZERO,
            max: Vec3::ZERO,
        });
        Self {
            positions,
            indices,
            bounds,
        }
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len()
    }

    fn ray_distance(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        self.bounds.ray_distance(origin, dir)?;
        let mut best: Option<f32> = None;
        for tri in &self.indices {
            let (Some(a), Some(b), Some(c)) = (
                self.positions.get(tri[0] as usize),
                self.positions.get(tri[1] as usize),
                self.positions.get(tri[2] as usize),
            ) else {
                continue;
            };
            if let Some(t) = ray_triangle(origin, dir, *a, *b, *c) {
                if best.map_or(true, |b| t < b) {
                    best = Some(t);
                }
            }
        }
        best
    }
}

/// Möller-Trumbore, double sided
fn ray_triangle(origin: Vec3, dir: Vec3, a: Vec3, b: Vec3, c: Vec3) -> Option<f32> {
    let e1 = b - a;
    let e2 = c - a;
    let p = dir.cross(e2);
    let det = e1.dot(p);
    if det.abs() < 1e-9 {
        return None;
    }
    let inv_det = 1.0 / det;
    let s = origin - a;
    let u = s.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return None;
    }
    let q = s.cross(e1);
    let v = dir.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return None;
    }
    let t = e2.dot(q) * inv_det;
    (t >= 0.0).then_some(t)
}

fn ray_sphere(origin: Vec3, dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = origin - center;
    let b = oc.dot(dir);
    let c = oc.length_squared() - radius * radius;
    let discriminant = b * b - c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    let mut t = -b - sqrt_d;
    if t < 0.0 {
        t = -b + sqrt_d;
    }
    (t >= 0.0).then_some(t)
}

/// Side wall of a Z-aligned cylinder, limited to |z| <= half_length
fn ray_cylinder_wall(origin: Vec3, dir: Vec3, radius: f32, half_length: f32) -> Option<f32> {
    let a = dir.x * dir.x + dir.y * dir.y;
    if a < f32::EPSILON {
        return None;
    }
    let b = origin.x * dir.x + origin.y * dir.y;
    let c = origin.x * origin.x + origin.y * origin.y - radius * radius;
    let discriminant = b * b - a * c;
    if discriminant < 0.0 {
        return None;
    }
    let sqrt_d = discriminant.sqrt();
    [(-b - sqrt_d) / a, (-b + sqrt_d) / a]
        .into_iter()
        .filter(|t| *t >= 0.0)
        .find(|t| (origin.z + dir.z * t).abs() <= half_length)
}

fn ray_cylinder(origin: Vec3, dir: Vec3, radius: f32, half_length: f32) -> Option<f32> {
    let mut best = ray_cylinder_wall(origin, dir, radius, half_length);
    if dir.z.abs() > f32::EPSILON {
        for cap in [-half_length, half_length] {
            let t = (cap - origin.z) / dir.z;
            if t < 0.0 {
                continue;
            }
            let p = origin + dir * t;
            if p.x * p.x + p.y * p.y <= radius * radius && best.map_or(true, |b| t < b) {
                best = Some(t);
            }
        }
    }
    best
}

fn ray_capsule(origin: Vec3, dir: Vec3, radius: f32, half_length: f32) -> Option<f32> {
    let wall = ray_cylinder_wall(origin, dir, radius, half_length);
    let caps = [-half_length, half_length]
        .into_iter()
        .filter_map(|z| ray_sphere(origin, dir, Vec3::new(0.0, 0.0, z), radius));
    wall.into_iter().chain(caps).reduce(f32::min)
}

/// Intersectable surface shape in local coordinates
#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Cuboid { half_extents: Vec3 },
    Sphere { radius: f32 },
    Cylinder { radius: f32, half_length: f32 },
    Capsule { radius: f32, half_length: f32 },
    TriMesh(Arc<TriMesh>),
}

impl Shape {
    pub fn cuboid(size: Vec3) -> Self {
        Shape::Cuboid {
            half_extents: size * 0.5,
        }
    }

    pub fn local_bounds(&self) -> Aabb {
        match self {
            Shape::Cuboid { half_extents } => Aabb::from_center_half(Vec3::ZERO, *half_extents),
            Shape::Sphere { radius } => Aabb::from_center_half(Vec3::ZERO, Vec3::splat(*radius)),
            Shape::Cylinder {
                radius,
                half_length,
            } => Aabb::from_center_half(Vec3::ZERO, Vec3::new(*radius, *radius, *half_length)),
            Shape::Capsule {
                radius,
                half_length,
            } => Aabb::from_center_half(
                Vec3::ZERO,
                Vec3::new(*radius, *radius, half_length + radius),
            ),
            Shape::TriMesh(mesh) => mesh.bounds(),
        }
    }

    /// Local-space hit parameter along a normalized local ray
    pub fn local_ray_distance(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        match self {
            Shape::Cuboid { half_extents } => {
                Aabb::from_center_half(Vec3::ZERO, *half_extents).ray_distance(origin, dir)
            }
            Shape::Sphere { radius } => ray_sphere(origin, dir, Vec3::ZERO, *radius),
            Shape::Cylinder {
                radius,
                half_length,
            } => ray_cylinder(origin, dir, *radius, *half_length),
            Shape::Capsule {
                radius,
                half_length,
            } => ray_capsule(origin, dir, *radius, *half_length),
            Shape::TriMesh(mesh) => mesh.ray_distance(origin, dir),
        }
    }

    /// World-space distance from `origin` to the nearest hit on this shape
    /// placed by `world`.
    pub fn ray_distance(&self, world: &Affine3A, origin: Vec3, dir: Vec3) -> Option<f32> {
        let inv = world.inverse();
        let local_origin = inv.transform_point3(origin);
        let local_dir = inv.transform_vector3(dir);
        if !local_origin.is_finite() || local_dir.length_squared() <= f32::EPSILON {
            return None;
        }
        let local_dir = local_dir.normalize();
        let t = self.local_ray_distance(local_origin, local_dir)?;
        let hit_world = world.transform_point3(local_origin + local_dir * t);
        Some((hit_world - origin).length())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::math::Quat;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_aabb_slab() {
        let aabb = Aabb::from_center_half(Vec3::ZERO, Vec3::splat(1.0));
        let t = aabb.ray_distance(Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z).unwrap();
        assert!(approx(t, 4.0));
        assert_eq!(aabb.ray_distance(Vec3::ZERO, Vec3::X), Some(0.0));
        assert!(aabb.ray_distance(Vec3::new(3.0, 0.0, 5.0), Vec3::NEG_Z).is_none());
        assert!(aabb.ray_distance(Vec3::new(0.0, 0.0, 5.0), Vec3::Z).is_none());
    }

    #[test]
    fn test_primitive_hits() {
        let down = Vec3::NEG_Z;
        let above = Vec3::new(0.0, 0.0, 10.0);

        let sphere = Shape::Sphere { radius: 0.5 };
        assert!(approx(sphere.local_ray_distance(above, down).unwrap(), 9.5));

        let cylinder = Shape::Cylinder {
            radius: 0.5,
            half_length: 1.0,
        };
        // Through the cap
        assert!(approx(cylinder.local_ray_distance(above, down).unwrap(), 9.0));
        // Through the wall
        let side = Vec3::new(-10.0, 0.0, 0.0);
        assert!(approx(cylinder.local_ray_distance(side, Vec3::X).unwrap(), 9.5));
        // Passing above the wall
        assert!(cylinder
            .local_ray_distance(Vec3::new(-10.0, 0.0, 1.5), Vec3::X)
            .is_none());

        let capsule = Shape::Capsule {
            radius: 0.5,
            half_length: 1.0,
        };
        assert!(approx(capsule.local_ray_distance(above, down).unwrap(), 8.5));
    }

    #[test]
    fn test_trimesh_hit() {
        let mesh = TriMesh::new(
            vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(0.0, 1.0, 0.0),
            ],
            vec![[0, 1, 2]],
        );
        let shape = Shape::TriMesh(Arc::new(mesh));
        let t = shape
            .local_ray_distance(Vec3::new(0.0, 0.0, 2.0), Vec3::NEG_Z)
            .unwrap();
        assert!(approx(t, 2.0));
        assert!(shape
            .local_ray_distance(Vec3::new(2.0, 2.0, 2.0), Vec3::NEG_Z)
            .is_none());
    }

    #[test]
    fn test_world_distance_with_scale_and_rotation() {
        let shape = Shape::cuboid(Vec3::splat(1.0));
        let world = Affine3A::from_scale_rotation_translation(
            Vec3::splat(2.0),
            Quat::from_rotation_z(0.3),
            Vec3::new(0.0, 0.0, -1.0),
        );
        // Top face sits at z = -1 + 1 = 0
        let d = shape
            .ray_distance(&world, Vec3::new(0.0, 0.0, 5.0), Vec3::NEG_Z)
            .unwrap();
        assert!(approx(d, 5.0));
    }

    #[test]
    fn test_transformed_bounds() {
        let aabb = Aabb::from_center_half(Vec3::ZERO, Vec3::new(1.0, 0.5, 0.5));
        let rotated = aabb.transformed(&Affine3A::from_rotation_z(std::f32::consts::FRAC_PI_2));
        assert!(approx(rotated.max.x, 0.5));
        assert!(approx(rotated.max.y, 1.0));
    }
}
