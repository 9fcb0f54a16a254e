//! Rays and tile corner geometry.

use glam::{Quat, Vec2, Vec3};

/// A view ray in world space: origin plus normalized direction.
///
/// Rays are ephemeral query results; `Ray::ZERO` is the degenerate ray
/// returned when no camera is available to anchor the computation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub const ZERO: Ray = Ray {
        origin: Vec3::ZERO,
        direction: Vec3::ZERO,
    };

    /// Creates a ray, normalizing the direction. A zero direction stays zero.
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }

    /// True for the zero ray produced when no camera was available.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.direction == Vec3::ZERO
    }

    /// Returns the point at parameter `t` along the ray.
    #[inline]
    pub fn point_at(&self, t: f32) -> Vec3 {
        self.origin + self.direction * t
    }
}

/// The three corner points that define a tile's rectangle in 3D.
///
/// The fourth corner (top-right) is implied and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TileCorners {
    pub top_left: Vec3,
    pub bottom_left: Vec3,
    pub bottom_right: Vec3,
}

/// Computes a tile's 3D corners from its center, orientation and physical
/// size (meters).
///
/// This is a pure function of its inputs: recomputing with identical
/// parameters yields bit-identical corners, so callers may re-run it freely
/// whenever a placement parameter changes.
pub fn compute_tile_corners(center: Vec3, yaw_deg: f32, pitch_deg: f32, size: Vec2) -> TileCorners {
    let orientation = Quat::from_rotation_y(yaw_deg.to_radians())
        * Quat::from_rotation_x(pitch_deg.to_radians());

    let up = orientation * Vec3::Y;
    let right = orientation * Vec3::X;

    let half_up = up * (size.y / 2.0);
    let half_right = right * (size.x / 2.0);

    TileCorners {
        top_left: center + half_up - half_right,
        bottom_left: center - half_up - half_right,
        bottom_right: center - half_up + half_right,
    }
}

/// Converts a world-space view ray back into a normalized 2D position on the
/// display surface.
///
/// A display topology (cylindrical, planar, ...) registers one active
/// converter per canvas; interaction code uses it to turn wand rays into 2D
/// pointers.
pub trait RayToPointConverter: Send + Sync {
    /// Returns the normalized screen position hit by `ray`, or `None` when
    /// the ray misses the display surface.
    fn point_from_ray(&self, ray: &Ray) -> Option<Vec2>;
}
