use crate::physics::math::{Scalar, Vector};

/// Axis-aligned bounding region of a tree node.
#[derive(Debug, Clone, Copy)]
pub struct Aabb3d {
    pub min: Vector,
    pub max: Vector,
}

impl Aabb3d {
    pub fn new(min: Vector, max: Vector) -> Self {
        Self { min, max }
    }

    /// Tight box around `points`, widened on every side by `padding` times
    /// the extent so border particles never sit exactly on a face.
    pub fn enclosing(points: impl IntoIterator<Item = Vector>, padding: Scalar) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;

        let (min, max) = points.fold((first, first), |(min, max), p| (min.min(p), max.max(p)));
        let pad = (max - min) * padding;
        Some(Self::new(min - pad, max + pad))
    }

    #[inline]
    pub fn center(&self) -> Vector {
        (self.min + self.max) * 0.5
    }

    /// Diagonal length, the node size used by the opening criterion.
    #[inline]
    pub fn diagonal(&self) -> Scalar {
        (self.max - self.min).length()
    }

    pub fn octants(self) -> [Aabb3d; 8] {
        let center = self.center();

        [
            Aabb3d::new(self.min, center),
            Aabb3d::new(
                Vector::new(center.x, self.min.y, self.min.z),
                Vector::new(self.max.x, center.y, center.z),
            ),
            Aabb3d::new(
                Vector::new(self.min.x, center.y, self.min.z),
                Vector::new(center.x, self.max.y, center.z),
            ),
            Aabb3d::new(
                Vector::new(center.x, center.y, self.min.z),
                Vector::new(self.max.x, self.max.y, center.z),
            ),
            Aabb3d::new(
                Vector::new(self.min.x, self.min.y, center.z),
                Vector::new(center.x, center.y, self.max.z),
            ),
            Aabb3d::new(
                Vector::new(center.x, self.min.y, center.z),
                Vector::new(self.max.x, center.y, self.max.z),
            ),
            Aabb3d::new(
                Vector::new(self.min.x, center.y, center.z),
                Vector::new(center.x, self.max.y, self.max.z),
            ),
            Aabb3d::new(center, self.max),
        ]
    }
}
