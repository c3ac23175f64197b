//! Axis-aligned bounding volumes.
//!
//! A [`BoundingVolume`] is always derived from geometry at one specific
//! transform state. Nothing in the engine stores one across a transform
//! change; callers recompute it via [`BoundingVolume::from_points`] or
//! [`crate::data_structures::scene_graph::Node::bounds`].

use cgmath::{ElementWise, InnerSpace, Vector3};

/// Axis-aligned box given by its minimum and maximum corner.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingVolume {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl BoundingVolume {
    pub fn new(min: Vector3<f32>, max: Vector3<f32>) -> Self {
        Self { min, max }
    }

    /// Tightest box around `points`. Returns `None` for an empty iterator.
    pub fn from_points<I>(points: I) -> Option<Self>
    where
        I: IntoIterator<Item = Vector3<f32>>,
    {
        let mut points = points.into_iter();
        let first = points.next()?;
        let bounds = points.fold(Self::new(first, first), |mut acc, p| {
            acc.min = Vector3::new(acc.min.x.min(p.x), acc.min.y.min(p.y), acc.min.z.min(p.z));
            acc.max = Vector3::new(acc.max.x.max(p.x), acc.max.y.max(p.y), acc.max.z.max(p.z));
            acc
        });
        Some(bounds)
    }

    pub fn center(&self) -> Vector3<f32> {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vector3<f32> {
        self.max - self.min
    }

    /// Ray/box intersection using the slab method.
    ///
    /// Returns the distance along `ray` to the entry point, or `0.0` when the
    /// origin is inside the box. Hits behind the origin are misses.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<f32> {
        let inv = Vector3::new(1.0 / ray.direction.x, 1.0 / ray.direction.y, 1.0 / ray.direction.z);
        let t1 = (self.min - ray.origin).mul_element_wise(inv);
        let t2 = (self.max - ray.origin).mul_element_wise(inv);

        let mut enter = f32::NEG_INFINITY;
        let mut exit = f32::INFINITY;
        for axis in 0..3 {
            // A parallel ray inside the slab yields NaN via 0 * inf; it must not restrict the range.
            let (a, b) = (t1[axis], t2[axis]);
            if a.is_nan() || b.is_nan() {
                if ray.origin[axis] < self.min[axis] || ray.origin[axis] > self.max[axis] {
                    return None;
                }
                continue;
            }
            enter = enter.max(a.min(b));
            exit = exit.min(a.max(b));
        }

        if exit >= enter.max(0.0) {
            Some(enter.max(0.0))
        } else {
            None
        }
    }
}

/// A half line in world space. `direction` is kept normalized so hit
/// distances of different boxes are comparable.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vector3<f32>,
    pub direction: Vector3<f32>,
}

impl Ray {
    pub fn new(origin: Vector3<f32>, direction: Vector3<f32>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    pub fn at(&self, t: f32) -> Vector3<f32> {
        self.origin + self.direction * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_box() -> BoundingVolume {
        BoundingVolume::new(Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn from_points_tracks_extremes() {
        let bounds = BoundingVolume::from_points(vec![
            Vector3::new(1.0, -2.0, 3.0),
            Vector3::new(-4.0, 5.0, 0.5),
            Vector3::new(0.0, 0.0, -6.0),
        ])
        .unwrap();
        assert_eq!(bounds.min, Vector3::new(-4.0, -2.0, -6.0));
        assert_eq!(bounds.max, Vector3::new(1.0, 5.0, 3.0));
        assert_eq!(bounds.center(), Vector3::new(-1.5, 1.5, -1.5));
    }

    #[test]
    fn from_points_of_nothing_is_none() {
        assert!(BoundingVolume::from_points(Vec::new()).is_none());
    }

    #[test]
    fn ray_hits_box_in_front() {
        let ray = Ray::new(Vector3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, -1.0));
        let t = unit_box().intersect_ray(&ray).unwrap();
        assert!((t - 9.0).abs() < 1e-5);
        assert!((ray.at(t).z - 1.0).abs() < 1e-5);
    }

    #[test]
    fn ray_misses_box_behind_or_beside() {
        let behind = Ray::new(Vector3::new(0.0, 0.0, 10.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(unit_box().intersect_ray(&behind).is_none());
        let beside = Ray::new(Vector3::new(3.0, 0.0, 10.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(unit_box().intersect_ray(&beside).is_none());
    }

    #[test]
    fn axis_parallel_ray_outside_slab_misses() {
        let ray = Ray::new(Vector3::new(0.0, 2.0, 10.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(unit_box().intersect_ray(&ray).is_none());
    }

    #[test]
    fn origin_inside_reports_zero() {
        let ray = Ray::new(Vector3::new(0.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(unit_box().intersect_ray(&ray), Some(0.0));
    }
}
