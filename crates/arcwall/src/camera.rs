//! Camera registry and tile camera binding.
//!
//! Cameras are owned by the registry, never by tiles; tiles hold a
//! [`CameraId`] resolved eagerly at configuration-load time so lookup
//! failures surface at startup instead of per-event.

use crate::config::CanvasConfig;
use glam::{Quat, Vec3};
use std::collections::HashMap;

/// Index of a camera in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CameraId(pub usize);

/// Pose of one rendering camera.
#[derive(Debug, Clone, Copy)]
pub struct Camera {
    pub position: Vec3,
    pub orientation: Quat,
    /// Offset of the viewer's head from the camera origin, used as the ray
    /// origin for per-tile view rays.
    pub head_offset: Vec3,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            orientation: Quat::IDENTITY,
            head_offset: Vec3::ZERO,
        }
    }
}

impl Camera {
    #[inline]
    pub fn local_to_world_position(&self, p: Vec3) -> Vec3 {
        self.orientation * p + self.position
    }

    #[inline]
    pub fn local_to_world_orientation(&self, o: Quat) -> Quat {
        self.orientation * o
    }
}

/// Name-addressable arena of cameras with one optional default.
#[derive(Debug, Default)]
pub struct CameraRegistry {
    cameras: Vec<Camera>,
    names: HashMap<String, CameraId>,
    default_id: Option<CameraId>,
}

impl CameraRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the camera named `name`, creating it with a default pose on
    /// first use.
    pub fn get_or_create(&mut self, name: &str) -> CameraId {
        if let Some(&id) = self.names.get(name) {
            return id;
        }
        let id = CameraId(self.cameras.len());
        self.cameras.push(Camera::default());
        self.names.insert(name.into(), id);
        id
    }

    pub fn by_name(&self, name: &str) -> Option<CameraId> {
        self.names.get(name).copied()
    }

    #[inline]
    pub fn get(&self, id: CameraId) -> &Camera {
        &self.cameras[id.0]
    }

    #[inline]
    pub fn get_mut(&mut self, id: CameraId) -> &mut Camera {
        &mut self.cameras[id.0]
    }

    pub fn set_default(&mut self, id: CameraId) {
        self.default_id = Some(id);
    }

    #[inline]
    pub fn default_camera(&self) -> Option<CameraId> {
        self.default_id
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cameras.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cameras.is_empty()
    }
}

/// Resolves every tile's camera binding against the registry.
///
/// Tiles naming a custom camera get it created on first use; unnamed tiles
/// fall back to the registry default, if one exists. Safe to call again after
/// cameras change.
pub fn bind_tile_cameras(cfg: &mut CanvasConfig, cameras: &mut CameraRegistry) {
    let default_id = cameras.default_camera();
    for (_, tile) in cfg.tiles_mut() {
        tile.camera = match &tile.camera_name {
            Some(name) => Some(cameras.get_or_create(name)),
            None => default_id,
        };
    }
}
