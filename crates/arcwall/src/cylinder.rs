//! Cylindrical display topology.
//!
//! Places every tile of a canvas on a cylindrical surface (columns are
//! "sides" at fixed angular increments, rows stack vertically) and provides
//! the bidirectional mapping between world coordinates / rays and normalized
//! 2D screen positions on that cylinder.

use crate::config::CanvasConfig;
use crate::geometry::{Ray, RayToPointConverter};
use glam::{IVec2, Vec2, Vec3};
use std::f32::consts::TAU;
use std::sync::Arc;

/// Topology parameters for a cylindrical canvas.
///
/// The door gap and x trim are installation calibration values; they used to
/// be hard-coded and are configuration here so other installations can set
/// their own.
#[derive(Debug, Clone, Copy)]
pub struct CylinderSettings {
    /// Cylinder radius in meters.
    pub radius: f32,
    /// Angle of the side containing the 0-index tile column, degrees.
    pub side_angle_start: f32,
    /// Angle increment per side (column), degrees.
    pub side_angle_increment: f32,
    /// Angular span of the display opening (e.g. a physical entrance),
    /// degrees. Excluded from the normalized screen-coordinate range.
    pub door_gap_deg: f32,
    /// Empirically measured horizontal trim applied to normalized screen
    /// positions.
    pub x_trim: f32,
}

impl Default for CylinderSettings {
    fn default() -> Self {
        Self {
            radius: 5.0,
            side_angle_start: -90.0,
            side_angle_increment: 90.0,
            door_gap_deg: 36.0,
            x_trim: 0.027777,
        }
    }
}

/// Clamp tolerance for vertical out-of-range coordinates, meters.
const MAX_Y_ERROR: f32 = 0.5;
/// Clamp tolerance for normalized horizontal positions.
const MAX_X_ERROR: f32 = 0.05;

/// Ray/screen-position converter for a cylindrical canvas.
///
/// Built by [`CylindricalProjector::build`], which also fills in tile
/// placement; the standalone [`CylindricalProjector::new`] constructor exists
/// for processes that only need the coordinate mapping.
#[derive(Debug, Clone, Copy)]
pub struct CylindricalProjector {
    radius: f32,
    /// World-space Y of the low edge of the bottom tile row.
    y_offset: f32,
    /// Total cylinder height in meters.
    height: f32,
    door_gap: f32,
    x_trim: f32,
}

impl CylindricalProjector {
    pub fn new(radius: f32, y_offset: f32, height: f32, door_gap_deg: f32, x_trim: f32) -> Self {
        Self {
            radius,
            y_offset,
            height,
            door_gap: door_gap_deg.to_radians(),
            x_trim,
        }
    }

    /// Computes the placement of every tile on the cylinder and registers the
    /// resulting projector as the canvas's ray-to-point converter.
    ///
    /// Tile names follow the `t<column>x<row>` convention; a name absent from
    /// the canvas produces a warning and leaves that grid slot empty (the
    /// tile stays disabled). Row 0 is the bottom of the cylinder while pixel
    /// row 0 is the top of the canvas, so vertical pixel offsets are
    /// inverted.
    pub fn build(settings: &CylinderSettings, cfg: &mut CanvasConfig) -> Arc<Self> {
        let num_sides = cfg.params.tile_grid_size.x;
        let num_side_tiles = cfg.params.tile_grid_size.y;
        let tile_size = cfg.params.tile_size;
        let resolution = cfg.params.tile_resolution;
        let y_offset = cfg.params.reference_offset.y;

        let projector = Arc::new(Self::new(
            settings.radius,
            // The reference offset names the center of the bottom row.
            y_offset - tile_size.y / 2.0,
            num_side_tiles as f32 * tile_size.y,
            settings.door_gap_deg,
            settings.x_trim,
        ));

        let mut angle = settings.side_angle_start;
        for x in 0..num_sides {
            let mut y_pos = y_offset;
            for y in 0..num_side_tiles {
                let name = format!("t{x}x{y}");
                let Some(id) = cfg.tile_by_name(&name) else {
                    tracing::warn!(
                        tile = %name,
                        "cylindrical build: tile not assigned to any node, leaving grid slot empty"
                    );
                    y_pos += tile_size.y;
                    continue;
                };

                let angle_rad = angle.to_radians();
                let channel_y = num_side_tiles - y - 1;

                let tile = cfg.tile_mut(id);
                tile.enabled = true;
                tile.in_grid = true;
                tile.grid_x = x;
                tile.grid_y = y;
                tile.yaw = angle;
                tile.pitch = 0.0;
                tile.center = Vec3::new(
                    angle_rad.sin() * settings.radius,
                    y_pos,
                    -angle_rad.cos() * settings.radius,
                );
                tile.offset = IVec2::new(
                    (resolution.x * x) as i32,
                    (resolution.y * channel_y) as i32,
                );
                tile.update_corners();

                cfg.grid.set(x, channel_y, id);
                y_pos += tile_size.y;
            }
            angle += settings.side_angle_increment;
        }

        cfg.ray_to_point = Some(projector.clone());
        projector
    }

    /// Maps a world coordinate onto the cylinder's normalized screen space.
    ///
    /// Coordinates slightly past the physical bounds are clamped (within
    /// `MAX_Y_ERROR` meters vertically, `MAX_X_ERROR` horizontally);
    /// anything further out is reported as a miss.
    pub fn screen_position_from_world(&self, p: Vec3) -> Option<Vec2> {
        let min_y = self.y_offset;
        let max_y = self.y_offset + self.height;

        let mut y = p.y;
        if y > max_y {
            if y < max_y + MAX_Y_ERROR {
                y = max_y;
            } else {
                return None;
            }
        }
        if y < min_y {
            if y > min_y - MAX_Y_ERROR {
                y = min_y;
            } else {
                return None;
            }
        }

        // Angular position around the cylinder axis, normalized to [0, TAU),
        // then shifted past the door gap so screen x spans only the covered
        // arc.
        let mut angle = p.x.atan2(p.z);
        if angle < 0.0 {
            angle += TAU;
        }
        angle -= self.door_gap / 2.0;

        let mut x = angle / (TAU - self.door_gap);
        x += self.x_trim;

        if x > 1.0 {
            if x < 1.0 + MAX_X_ERROR {
                x = 1.0;
            } else {
                return None;
            }
        }
        if x < 0.0 {
            if x > -MAX_X_ERROR {
                x = 0.0;
            } else {
                return None;
            }
        }

        let y_norm = (y - min_y) / (max_y - min_y);
        Some(Vec2::new(x, 1.0 - y_norm))
    }

    /// Intersects a ray with the cylinder and maps the hit point to screen
    /// space.
    ///
    /// The cylinder is centered on the Y axis. Solves the quadratic in the
    /// ray parameter and takes the smallest non-negative root; a ray parallel
    /// to the axis or one that misses the surface is a typed miss, never a
    /// panic.
    pub fn point_from_ray(&self, ray: &Ray) -> Option<Vec2> {
        let d = ray.direction;
        let o = ray.origin;

        let a = d.x * d.x + d.z * d.z;
        if a == 0.0 {
            return None;
        }

        let b = 2.0 * d.x * o.x + 2.0 * d.z * o.z;
        let c = o.x * o.x + o.z * o.z - self.radius * self.radius;

        let discriminant = b * b - 4.0 * a * c;
        if discriminant < 0.0 {
            return None;
        }

        let sq = discriminant.sqrt();
        let t_near = (-b - sq) / (2.0 * a);
        let t_far = (-b + sq) / (2.0 * a);

        let t = if t_near >= 0.0 {
            t_near
        } else if t_far >= 0.0 {
            t_far
        } else {
            return None;
        };

        self.screen_position_from_world(ray.point_at(t))
    }
}

impl RayToPointConverter for CylindricalProjector {
    fn point_from_ray(&self, ray: &Ray) -> Option<Vec2> {
        CylindricalProjector::point_from_ray(self, ray)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CanvasConfig, CanvasParams};
    use glam::UVec2;

    fn canvas(grid: UVec2, specs: &[&str]) -> CanvasConfig {
        let mut cfg = CanvasConfig::new(CanvasParams {
            tile_grid_size: grid,
            tile_resolution: UVec2::new(100, 50),
            tile_size: Vec2::new(2.0, 1.0),
            reference_offset: Vec3::new(0.0, 1.0, 0.0),
            ..CanvasParams::default()
        });
        for spec in specs {
            cfg.add_node(spec).unwrap();
        }
        cfg
    }

    fn projector() -> CylindricalProjector {
        // radius 5, bottom edge at 0.5, height 1.0, default calibration
        CylindricalProjector::new(5.0, 0.5, 1.0, 36.0, 0.027777)
    }

    #[test]
    fn opposite_sides_land_on_opposite_ends_of_the_diameter() {
        let mut cfg = canvas(UVec2::new(2, 1), &["local=t0x0", "n1=t1x0"]);
        let settings = CylinderSettings {
            radius: 5.0,
            side_angle_start: -90.0,
            side_angle_increment: 180.0,
            ..CylinderSettings::default()
        };
        CylindricalProjector::build(&settings, &mut cfg);

        let a = cfg.tile(cfg.tile_by_name("t0x0").unwrap());
        let b = cfg.tile(cfg.tile_by_name("t1x0").unwrap());

        assert!(a.enabled && b.enabled);
        assert!((a.center - Vec3::new(-5.0, 1.0, 0.0)).length() < 1e-4);
        assert!((b.center - Vec3::new(5.0, 1.0, 0.0)).length() < 1e-4);
        assert_eq!(a.yaw, -90.0);
        assert_eq!(b.yaw, 90.0);
        assert!(cfg.ray_to_point.is_some());
    }

    #[test]
    fn vertical_pixel_offsets_are_inverted() {
        // Row 0 is the bottom of the cylinder but the top row of pixels
        // belongs to the top tile.
        let mut cfg = canvas(UVec2::new(2, 2), &["local=t0x0,t0x1", "n1=t1x0,t1x1"]);
        CylindricalProjector::build(&CylinderSettings::default(), &mut cfg);

        let bottom = cfg.tile_by_name("t0x0").unwrap();
        let top = cfg.tile_by_name("t0x1").unwrap();
        assert_eq!(cfg.tile(bottom).offset, IVec2::new(0, 50));
        assert_eq!(cfg.tile(top).offset, IVec2::new(0, 0));
        assert_eq!(cfg.tile(cfg.tile_by_name("t1x0").unwrap()).offset, IVec2::new(100, 50));

        // The channel grid mirrors pixel space, so offset / resolution finds
        // the tile directly.
        assert_eq!(cfg.grid.get(0, 1), Some(bottom));
        assert_eq!(cfg.grid.get(0, 0), Some(top));

        // Row stacking: the top tile sits one tile height above the bottom.
        let dy = cfg.tile(top).center.y - cfg.tile(bottom).center.y;
        assert!((dy - 1.0).abs() < 1e-5);
    }

    #[test]
    fn missing_tiles_warn_and_stay_disabled() {
        let mut cfg = canvas(UVec2::new(2, 1), &["local=t0x0"]);
        CylindricalProjector::build(&CylinderSettings::default(), &mut cfg);

        assert!(cfg.tile(cfg.tile_by_name("t0x0").unwrap()).enabled);
        // t1x0 was never declared: its grid slot stays empty and the build
        // continues past it.
        assert_eq!(cfg.tile_by_name("t1x0"), None);
        assert_eq!(cfg.grid.get(1, 0), None);
    }

    #[test]
    fn screen_position_round_trips_through_the_angle_formula() {
        let proj = projector();
        let door = 36.0f32.to_radians();

        let phi = 2.0f32;
        let p = Vec3::new(5.0 * phi.sin(), 1.0, 5.0 * phi.cos());
        let screen = proj.screen_position_from_world(p).unwrap();

        let phi_back = (screen.x - 0.027777) * (TAU - door) + door / 2.0;
        assert!((phi_back - phi).abs() < 1e-4);

        // Mid-height maps to the middle of the (inverted) vertical range.
        let y_back = (1.0 - screen.y) * 1.0 + 0.5;
        assert!((y_back - 1.0).abs() < 1e-4);
    }

    #[test]
    fn vertical_clamping_tolerance() {
        let proj = projector();
        let phi = 2.0f32;
        let (sx, cx) = (5.0 * phi.sin(), 5.0 * phi.cos());

        // Within tolerance above the top edge: clamps to the top row.
        let near_top = proj
            .screen_position_from_world(Vec3::new(sx, 1.5 + 0.3, cx))
            .unwrap();
        assert_eq!(near_top.y, 0.0);

        // Beyond tolerance: miss.
        assert!(proj
            .screen_position_from_world(Vec3::new(sx, 1.5 + 0.6, cx))
            .is_none());

        // Same at the bottom edge.
        let near_bottom = proj
            .screen_position_from_world(Vec3::new(sx, 0.5 - 0.3, cx))
            .unwrap();
        assert_eq!(near_bottom.y, 1.0);
        assert!(proj
            .screen_position_from_world(Vec3::new(sx, 0.5 - 0.6, cx))
            .is_none());
    }

    #[test]
    fn ray_intersection_matches_direct_projection() {
        let proj = projector();
        let phi = 2.0f32;

        let direction = Vec3::new(phi.sin(), 0.0, phi.cos());
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), direction);
        let from_ray = proj.point_from_ray(&ray).unwrap();
        let from_point = proj
            .screen_position_from_world(Vec3::new(5.0 * phi.sin(), 1.0, 5.0 * phi.cos()))
            .unwrap();

        assert!((from_ray - from_point).length() < 1e-4);
    }

    #[test]
    fn ray_takes_smallest_non_negative_root() {
        let proj = projector();
        // From inside the cylinder the near root is negative; the hit must
        // use the far (forward) intersection rather than failing.
        let ray = Ray::new(Vec3::new(0.0, 1.0, 0.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(proj.point_from_ray(&ray).is_some());
    }

    #[test]
    fn degenerate_rays_miss() {
        let proj = projector();

        // Parallel to the cylinder axis: quadratic degenerates.
        let vertical = Ray::new(Vec3::new(1.0, 1.0, 0.0), Vec3::Y);
        assert!(proj.point_from_ray(&vertical).is_none());

        // Pointing away from the surface: both roots negative.
        let away = Ray::new(Vec3::new(10.0, 1.0, 0.0), Vec3::X);
        assert!(proj.point_from_ray(&away).is_none());
    }
}
