//! Canvas, tile and node configuration tables.
//!
//! All tables are built once during display-system initialization and are
//! read-only for the rest of the process lifetime, except for per-tile
//! enablement flags. Tiles live in an arena indexed by [`TileId`]; the grid
//! and the node lists hold ids, never owning references.

use crate::camera::CameraId;
use crate::geometry::{compute_tile_corners, RayToPointConverter, TileCorners};
use glam::{IVec2, UVec2, Vec2, Vec3};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Hostname that marks the coordinating ("head") process in a node spec.
pub const LOCAL_HOSTNAME: &str = "local";

/// Index of a tile in the canvas arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId(pub usize);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid node spec '{0}': expected 'host[:port]=tile[@device],...'")]
    MalformedNodeSpec(String),

    #[error("invalid port '{port}' in node spec '{spec}'")]
    BadPort { spec: String, port: String },

    #[error("invalid device id '{device}' in tile entry '{entry}'")]
    BadDevice { entry: String, device: String },

    #[error("node spec '{0}' declares no tiles")]
    EmptyNode(String),

    #[error("tile '{0}' is assigned to more than one node")]
    DuplicateTile(String),

    #[error("no tile named '{0}' in the canvas")]
    UnknownTile(String),

    #[error("no local node declared (exactly one node must use hostname '{LOCAL_HOSTNAME}')")]
    NoLocalNode,

    #[error("{0} local nodes declared, expected exactly one")]
    MultipleLocalNodes(usize),
}

/// One rectangular physical display surface within the canvas.
#[derive(Debug, Clone)]
pub struct Tile {
    pub name: String,
    /// Disabled tiles take no part in partitioning or ray resolution.
    pub enabled: bool,
    /// True once a topology builder has placed this tile in the grid.
    pub in_grid: bool,
    pub grid_x: u32,
    pub grid_y: u32,
    /// Orientation in degrees.
    pub yaw: f32,
    pub pitch: f32,
    /// Center of the tile surface in world space (meters).
    pub center: Vec3,
    /// Physical size in meters.
    pub size: Vec2,
    /// Resolution in pixels.
    pub pixel_size: UVec2,
    /// Pixel offset of this tile within the canvas. Pixel row 0 is at the
    /// top of the canvas.
    pub offset: IVec2,
    /// Window position on the node's desktop.
    pub position: IVec2,
    /// GPU device id driving this tile.
    pub device: u32,
    pub corners: TileCorners,
    /// Named camera to bind; `None` means the canvas default camera.
    pub camera_name: Option<String>,
    /// Bound camera, resolved eagerly by [`crate::camera::bind_tile_cameras`].
    pub camera: Option<CameraId>,
    pub disable_mouse: bool,
    pub borderless: bool,
}

impl Tile {
    fn new(name: String, pixel_size: UVec2, size: Vec2, device: u32) -> Self {
        Self {
            name,
            enabled: false,
            in_grid: false,
            grid_x: 0,
            grid_y: 0,
            yaw: 0.0,
            pitch: 0.0,
            center: Vec3::ZERO,
            size,
            pixel_size,
            offset: IVec2::ZERO,
            position: IVec2::ZERO,
            device,
            corners: TileCorners::default(),
            camera_name: None,
            camera: None,
            disable_mouse: false,
            borderless: false,
        }
    }

    /// Recomputes the 3D corners from the current center, yaw, pitch and
    /// size. Must be called whenever any placement parameter changes.
    pub fn update_corners(&mut self) {
        self.corners = compute_tile_corners(self.center, self.yaw, self.pitch, self.size);
    }
}

/// Dense 2D channel lookup from pixel-channel coordinates to tiles.
///
/// Cells are indexed by `tile.offset / tile_resolution`, so a pixel position
/// divided by the tile resolution lands directly on the tile containing it.
/// The tile's logical grid coordinates are stored on the tile itself.
#[derive(Debug, Clone)]
pub struct TileGrid {
    size: UVec2,
    cells: Vec<Option<TileId>>,
}

impl TileGrid {
    pub fn new(size: UVec2) -> Self {
        Self {
            size,
            cells: vec![None; (size.x * size.y) as usize],
        }
    }

    #[inline]
    pub fn size(&self) -> UVec2 {
        self.size
    }

    pub fn get(&self, x: u32, y: u32) -> Option<TileId> {
        if x >= self.size.x || y >= self.size.y {
            return None;
        }
        self.cells[(y * self.size.x + x) as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, id: TileId) {
        if x < self.size.x && y < self.size.y {
            self.cells[(y * self.size.x + x) as usize] = Some(id);
        }
    }
}

/// One rendering process: the local head or a remote node.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub hostname: String,
    /// Port relative to the canvas base port.
    pub port: u16,
    /// Tiles driven by this node, in declaration order.
    pub tiles: Vec<TileId>,
}

impl NodeConfig {
    #[inline]
    pub fn is_remote(&self) -> bool {
        self.hostname != LOCAL_HOSTNAME
    }
}

/// Immutable canvas-wide parameters supplied at startup.
#[derive(Debug, Clone)]
pub struct CanvasParams {
    /// Tile grid dimensions: columns (sides) by rows.
    pub tile_grid_size: UVec2,
    /// Per-tile resolution in pixels.
    pub tile_resolution: UVec2,
    /// Per-tile physical size in meters.
    pub tile_size: Vec2,
    /// World-space offset of the center of the bottom tile row.
    pub reference_offset: Vec3,
    /// Desktop offset added to every window position.
    pub window_offset: IVec2,
    pub fullscreen: bool,
    pub borderless: bool,
    pub swap_sync: bool,
    /// Base TCP port; node ports are relative to this.
    pub base_port: u16,
    /// Frame latency allowed by the cluster renderer.
    pub latency: u32,
    /// Command template used to launch one remote node. Placeholders:
    /// `%c` executable, `%h` hostname, `%d` current working directory.
    pub node_launcher: String,
    /// Command template used to kill one remote node; same placeholders.
    /// Empty disables remote teardown.
    pub node_killer: String,
    /// Settling delay after launching all remote nodes.
    pub launcher_interval: Duration,
    /// When false, no cluster configuration artifact is written.
    pub generate_artifact: bool,
    /// Well-known path of the cluster configuration artifact.
    pub artifact_path: PathBuf,
}

impl Default for CanvasParams {
    fn default() -> Self {
        Self {
            tile_grid_size: UVec2::new(1, 1),
            tile_resolution: UVec2::new(1280, 720),
            tile_size: Vec2::new(1.02, 0.574),
            reference_offset: Vec3::ZERO,
            window_offset: IVec2::ZERO,
            fullscreen: false,
            borderless: false,
            swap_sync: false,
            base_port: 24000,
            latency: 0,
            node_launcher: String::new(),
            node_killer: String::new(),
            launcher_interval: Duration::from_secs(2),
            generate_artifact: true,
            artifact_path: PathBuf::from("./cluster.cfg"),
        }
    }
}

/// The full logical display surface: tile arena, channel grid and node list.
pub struct CanvasConfig {
    pub params: CanvasParams,
    /// Canvas size in pixels, derived from the grid dimensions.
    pub canvas_pixel_size: UVec2,
    pub grid: TileGrid,
    pub nodes: Vec<NodeConfig>,
    /// Active ray-to-point converter for this canvas, registered by the
    /// topology builder. At most one per canvas.
    pub ray_to_point: Option<Arc<dyn RayToPointConverter>>,
    tiles: Vec<Tile>,
    names: HashMap<String, TileId>,
}

impl CanvasConfig {
    pub fn new(params: CanvasParams) -> Self {
        let canvas_pixel_size = params.tile_grid_size * params.tile_resolution;
        let grid = TileGrid::new(params.tile_grid_size);
        Self {
            params,
            canvas_pixel_size,
            grid,
            nodes: Vec::new(),
            ray_to_point: None,
            tiles: Vec::new(),
            names: HashMap::new(),
        }
    }

    /// Parses and adds one node spec of the form
    /// `host[:port]=tile[@device],tile[@device],...`.
    ///
    /// The hostname `local` marks the head process. When the port is omitted
    /// it defaults to the node's position in declaration order. Each tile
    /// entry creates a new tile in the arena; tiles start disabled until a
    /// topology builder places them.
    pub fn add_node(&mut self, spec: &str) -> Result<(), ConfigError> {
        let (host_part, tile_part) = spec
            .split_once('=')
            .ok_or_else(|| ConfigError::MalformedNodeSpec(spec.into()))?;

        let (hostname, port) = match host_part.split_once(':') {
            Some((host, port_str)) => {
                let port = port_str.parse::<u16>().map_err(|_| ConfigError::BadPort {
                    spec: spec.into(),
                    port: port_str.into(),
                })?;
                (host.trim(), port)
            }
            None => (host_part.trim(), self.nodes.len() as u16),
        };

        if hostname.is_empty() {
            return Err(ConfigError::MalformedNodeSpec(spec.into()));
        }

        let mut tile_ids = Vec::new();
        for entry in tile_part.split(',').map(str::trim).filter(|e| !e.is_empty()) {
            let (name, device) = match entry.split_once('@') {
                Some((name, device_str)) => {
                    let device =
                        device_str
                            .parse::<u32>()
                            .map_err(|_| ConfigError::BadDevice {
                                entry: entry.into(),
                                device: device_str.into(),
                            })?;
                    (name, device)
                }
                None => (entry, 0),
            };

            if self.names.contains_key(name) {
                return Err(ConfigError::DuplicateTile(name.into()));
            }

            let id = TileId(self.tiles.len());
            self.tiles.push(Tile::new(
                name.into(),
                self.params.tile_resolution,
                self.params.tile_size,
                device,
            ));
            self.names.insert(name.into(), id);
            tile_ids.push(id);
        }

        if tile_ids.is_empty() {
            return Err(ConfigError::EmptyNode(spec.into()));
        }

        self.nodes.push(NodeConfig {
            hostname: hostname.into(),
            port,
            tiles: tile_ids,
        });
        Ok(())
    }

    /// Checks cross-node invariants; call once after all nodes are added.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let locals = self.nodes.iter().filter(|n| !n.is_remote()).count();
        match locals {
            0 => Err(ConfigError::NoLocalNode),
            1 => Ok(()),
            n => Err(ConfigError::MultipleLocalNodes(n)),
        }
    }

    /// Binds a named camera to a tile. The camera itself is resolved later
    /// by [`crate::camera::bind_tile_cameras`].
    pub fn set_tile_camera(&mut self, tile: &str, camera: &str) -> Result<(), ConfigError> {
        let id = self
            .tile_by_name(tile)
            .ok_or_else(|| ConfigError::UnknownTile(tile.into()))?;
        self.tiles[id.0].camera_name = Some(camera.into());
        Ok(())
    }

    #[inline]
    pub fn tile(&self, id: TileId) -> &Tile {
        &self.tiles[id.0]
    }

    #[inline]
    pub fn tile_mut(&mut self, id: TileId) -> &mut Tile {
        &mut self.tiles[id.0]
    }

    pub fn tile_by_name(&self, name: &str) -> Option<TileId> {
        self.names.get(name).copied()
    }

    /// Iterates tiles in insertion order. Insertion order is the documented
    /// tie-break for the linear-scan ray resolver, so results stay
    /// reproducible across runs.
    pub fn tiles(&self) -> impl Iterator<Item = (TileId, &Tile)> {
        self.tiles
            .iter()
            .enumerate()
            .map(|(i, t)| (TileId(i), t))
    }

    /// Iterates tiles mutably, in insertion order.
    pub fn tiles_mut(&mut self) -> impl Iterator<Item = (TileId, &mut Tile)> {
        self.tiles
            .iter_mut()
            .enumerate()
            .map(|(i, t)| (TileId(i), t))
    }

    #[inline]
    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }
}
