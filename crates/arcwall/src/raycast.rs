//! Pixel/event to view-ray resolution.
//!
//! Maps 2D canvas pixel coordinates, or raw pointer/wand events, to 3D rays
//! in world space using the tile grid and per-tile camera bindings. Geometry
//! failures are typed (`Option` / degenerate rays), never panics: resolution
//! may run during startup before any camera exists.

use crate::camera::CameraRegistry;
use crate::config::{CanvasConfig, Tile};
use crate::geometry::Ray;
use glam::{Quat, Vec2, Vec3};

/// An input event carrying enough information to derive a view ray.
#[derive(Debug, Clone, Copy)]
pub enum InputEvent {
    /// A tracked 6-DOF wand. Position and orientation are in the default
    /// camera's local frame.
    Wand { position: Vec3, orientation: Quat },
    /// A 2D pointer. Some pointer services attach a precomputed world-space
    /// ray (origin, direction); otherwise the position is resolved through
    /// the tile grid.
    Pointer {
        position: Vec2,
        ray: Option<(Vec3, Vec3)>,
    },
}

/// Resolves canvas positions and input events into world-space view rays.
pub struct ViewRayResolver<'a> {
    cfg: &'a CanvasConfig,
    cameras: &'a CameraRegistry,
}

impl<'a> ViewRayResolver<'a> {
    pub fn new(cfg: &'a CanvasConfig, cameras: &'a CameraRegistry) -> Self {
        Self { cfg, cameras }
    }

    /// Maps a canvas pixel position to a view ray.
    ///
    /// Fast path: divide by the tile resolution and look the tile up in the
    /// channel grid. On a grid miss (or a tile with mouse input disabled)
    /// falls back to a linear scan over the tile table in insertion order;
    /// first match wins. Returns the degenerate ray when no tile contains
    /// the position or no camera is available.
    pub fn pixel_to_ray(&self, pos: Vec2) -> Ray {
        let res = self.cfg.params.tile_resolution;
        let channel_x = (pos.x / res.x as f32).floor() as i32;
        let channel_y = (pos.y / res.y as f32).floor() as i32;

        if channel_x >= 0 && channel_y >= 0 {
            if let Some(id) = self.cfg.grid.get(channel_x as u32, channel_y as u32) {
                let tile = self.cfg.tile(id);
                if !tile.disable_mouse {
                    return self.tile_ray(tile, pos - tile.offset.as_vec2());
                }
            }
        }

        self.linear_scan(pos)
    }

    /// Slow path: scan every tile for one containing the position. Tiles are
    /// visited in insertion order, which keeps the result deterministic.
    fn linear_scan(&self, pos: Vec2) -> Ray {
        for (_, tile) in self.cfg.tiles() {
            if tile.disable_mouse {
                continue;
            }
            let origin = tile.offset.as_vec2();
            let size = tile.pixel_size.as_vec2();
            if pos.x >= origin.x
                && pos.x < origin.x + size.x
                && pos.y >= origin.y
                && pos.y < origin.y + size.y
            {
                return self.tile_ray(tile, pos - origin);
            }
        }
        // No tile contains this position.
        Ray::ZERO
    }

    /// Computes the view ray through a tile-local pixel position.
    ///
    /// The position is normalized into the tile (pixel Y grows downward, so
    /// the vertical axis flips), the 3D point is bilinearly interpolated
    /// from the tile corners, and point and direction are taken into world
    /// space through the tile's camera.
    fn tile_ray(&self, tile: &Tile, local: Vec2) -> Ray {
        let camera_id = tile.camera.or_else(|| self.cameras.default_camera());
        let Some(camera_id) = camera_id else {
            tracing::warn!(
                tile = %tile.name,
                "no camera available for view ray, returning degenerate ray"
            );
            return Ray::ZERO;
        };
        let camera = self.cameras.get(camera_id);

        let px = local.x / tile.pixel_size.x as f32;
        let py = 1.0 - local.y / tile.pixel_size.y as f32;

        let bottom_left = tile.corners.bottom_left;
        let to_top = tile.corners.top_left - bottom_left;
        let to_right = tile.corners.bottom_right - bottom_left;

        let point = bottom_left + to_top * py + to_right * px;
        let direction = point - camera.head_offset;

        let origin = camera.orientation * point + camera.position;
        let direction = (camera.orientation * direction).normalize_or_zero();

        Ray { origin, direction }
    }

    /// Derives a view ray from an input event.
    ///
    /// Wand events transform the event pose through the default camera and
    /// point along the canonical backward axis. Pointer events use an
    /// attached ray when present; otherwise the position is resolved through
    /// [`Self::pixel_to_ray`], denormalizing against the canvas pixel size
    /// first when `normalized_coords` is set. `None` is the typed failure:
    /// no camera, or no tile under the pointer.
    pub fn ray_from_event(&self, event: &InputEvent, normalized_coords: bool) -> Option<Ray> {
        match event {
            InputEvent::Wand {
                position,
                orientation,
            } => {
                let Some(id) = self.cameras.default_camera() else {
                    tracing::warn!("wand event arrived before any camera exists");
                    return None;
                };
                let camera = self.cameras.get(id);
                let origin = camera.local_to_world_position(*position);
                let direction = camera.local_to_world_orientation(*orientation) * Vec3::NEG_Z;
                Some(Ray::new(origin, direction))
            }
            InputEvent::Pointer {
                ray: Some((origin, direction)),
                ..
            } => Some(Ray::new(*origin, *direction)),
            InputEvent::Pointer {
                position,
                ray: None,
            } => {
                let mut pos = *position;
                if normalized_coords {
                    pos.x *= self.cfg.canvas_pixel_size.x as f32;
                    pos.y *= self.cfg.canvas_pixel_size.y as f32;
                }
                let ray = self.pixel_to_ray(pos);
                if ray.is_degenerate() {
                    None
                } else {
                    Some(ray)
                }
            }
        }
    }
}
