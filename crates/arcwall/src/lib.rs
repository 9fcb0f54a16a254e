//! Display configuration and ray casting for tiled display walls.
//!
//! This library is the coordinate-mapping core of the arcwall cluster display
//! system: it partitions a logical canvas across rendering nodes, GPUs and
//! windows, computes the physical placement of every tile on a cylindrical
//! surface, and resolves 2D pointer / 3D wand input into world-space view
//! rays for interaction and picking.

pub mod camera;
pub mod config;
pub mod cylinder;
pub mod geometry;
pub mod partition;
pub mod raycast;

pub use camera::{bind_tile_cameras, Camera, CameraId, CameraRegistry};
pub use config::{CanvasConfig, CanvasParams, ConfigError, NodeConfig, Tile, TileGrid, TileId};
pub use cylinder::{CylinderSettings, CylindricalProjector};
pub use geometry::{Ray, RayToPointConverter, TileCorners};
pub use raycast::{InputEvent, ViewRayResolver};
