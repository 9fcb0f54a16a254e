use arcwall::{CanvasConfig, CanvasParams, CylinderSettings};
use clap::Parser;
use glam::{IVec2, UVec2, Vec2, Vec3};
use std::path::PathBuf;
use std::time::Duration;

/// `arcwall_head` - coordinating process for an arcwall display cluster.
///
/// Builds the canvas configuration, writes the cluster configuration
/// artifact, launches the remote rendering nodes and drives the frame loop.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct HeadConfig {
    /// Number of tile columns (cylinder sides).
    #[arg(long, env = "ARCWALL_TILES_X", default_value_t = 4)]
    pub tiles_x: u32,

    /// Number of tile rows per side.
    #[arg(long, env = "ARCWALL_TILES_Y", default_value_t = 3)]
    pub tiles_y: u32,

    /// Per-tile horizontal resolution in pixels.
    #[arg(long, env = "ARCWALL_TILE_RES_X", default_value_t = 1280)]
    pub tile_res_x: u32,

    /// Per-tile vertical resolution in pixels.
    #[arg(long, env = "ARCWALL_TILE_RES_Y", default_value_t = 720)]
    pub tile_res_y: u32,

    /// Physical tile width in meters.
    #[arg(long, env = "ARCWALL_TILE_WIDTH_M", default_value_t = 1.02)]
    pub tile_width_m: f32,

    /// Physical tile height in meters.
    #[arg(long, env = "ARCWALL_TILE_HEIGHT_M", default_value_t = 0.574)]
    pub tile_height_m: f32,

    /// World-space height of the center of the bottom tile row, meters.
    #[arg(long, env = "ARCWALL_REFERENCE_Y", default_value_t = 0.3)]
    pub reference_y: f32,

    /// Cylinder radius in meters.
    #[arg(long, env = "ARCWALL_RADIUS_M", default_value_t = 5.0)]
    pub radius_m: f32,

    /// Angle of the 0-index tile column, degrees.
    #[arg(long, env = "ARCWALL_SIDE_ANGLE_START", default_value_t = -90.0)]
    pub side_angle_start: f32,

    /// Angle increment per column, degrees.
    #[arg(long, env = "ARCWALL_SIDE_ANGLE_INCREMENT", default_value_t = 90.0)]
    pub side_angle_increment: f32,

    /// Angular span of the display opening, degrees.
    #[arg(long, env = "ARCWALL_DOOR_GAP_DEG", default_value_t = 36.0)]
    pub door_gap_deg: f32,

    /// Measured horizontal trim applied to normalized screen positions.
    #[arg(long, env = "ARCWALL_SCREEN_X_TRIM", default_value_t = 0.027777)]
    pub screen_x_trim: f32,

    /// Base TCP port for the cluster; node ports are relative to this.
    #[arg(long, env = "ARCWALL_BASE_PORT", default_value_t = 24000)]
    pub base_port: u16,

    /// Frame latency allowed by the cluster renderer.
    #[arg(long, env = "ARCWALL_LATENCY", default_value_t = 0)]
    pub latency: u32,

    #[arg(long, env = "ARCWALL_FULLSCREEN")]
    pub fullscreen: bool,

    #[arg(long, env = "ARCWALL_BORDERLESS")]
    pub borderless: bool,

    /// Wrap every channel in a swap barrier.
    #[arg(long, env = "ARCWALL_SWAP_SYNC")]
    pub swap_sync: bool,

    /// Command template launching one remote node.
    /// Placeholders: %c executable, %h hostname, %d working directory.
    #[arg(long, env = "ARCWALL_NODE_LAUNCHER", default_value = "ssh %h %c")]
    pub node_launcher: String,

    /// Command template killing one remote node; empty disables remote
    /// teardown. Same placeholders as the launcher.
    #[arg(long, env = "ARCWALL_NODE_KILLER", default_value = "ssh %h killall %c")]
    pub node_killer: String,

    /// Settling delay after launching all remote nodes, milliseconds.
    #[arg(long, env = "ARCWALL_SETTLE_MS", default_value_t = 2000)]
    pub settle_ms: u64,

    /// Skip writing the cluster configuration artifact.
    #[arg(long, env = "ARCWALL_NO_ARTIFACT")]
    pub no_artifact: bool,

    /// Path of the cluster configuration artifact.
    #[arg(long, env = "ARCWALL_ARTIFACT_PATH", default_value = "./cluster.cfg")]
    pub artifact_path: PathBuf,

    /// Node specs: `host[:port]=tile[@device],...`. Hostname `local` marks
    /// this process. Repeatable.
    #[arg(long = "node", env = "ARCWALL_NODES", value_delimiter = ';', required = true)]
    pub nodes: Vec<String>,

    /// Executable launched on remote nodes; defaults to this binary.
    #[arg(long, env = "ARCWALL_NODE_EXECUTABLE")]
    pub node_executable: Option<String>,

    /// Tear down a running cluster instead of starting one, then exit.
    #[arg(long)]
    pub kill_cluster: bool,

    /// Listen address for the Prometheus metrics endpoint.
    #[arg(long, env = "ARCWALL_METRICS_LISTEN_ADDR", default_value = "0.0.0.0:9091")]
    pub metrics_listen_addr: String,

    /// Target frame period for the pacing frame sync, milliseconds.
    #[arg(long, env = "ARCWALL_FRAME_MS", default_value_t = 16)]
    pub frame_ms: u64,
}

impl HeadConfig {
    pub fn canvas_params(&self) -> CanvasParams {
        CanvasParams {
            tile_grid_size: UVec2::new(self.tiles_x, self.tiles_y),
            tile_resolution: UVec2::new(self.tile_res_x, self.tile_res_y),
            tile_size: Vec2::new(self.tile_width_m, self.tile_height_m),
            reference_offset: Vec3::new(0.0, self.reference_y, 0.0),
            window_offset: IVec2::ZERO,
            fullscreen: self.fullscreen,
            borderless: self.borderless,
            swap_sync: self.swap_sync,
            base_port: self.base_port,
            latency: self.latency,
            node_launcher: self.node_launcher.clone(),
            node_killer: self.node_killer.clone(),
            launcher_interval: Duration::from_millis(self.settle_ms),
            generate_artifact: !self.no_artifact,
            artifact_path: self.artifact_path.clone(),
        }
    }

    pub fn cylinder_settings(&self) -> CylinderSettings {
        CylinderSettings {
            radius: self.radius_m,
            side_angle_start: self.side_angle_start,
            side_angle_increment: self.side_angle_increment,
            door_gap_deg: self.door_gap_deg,
            x_trim: self.screen_x_trim,
        }
    }

    /// Builds and validates the canvas from the node specs.
    pub fn build_canvas(&self) -> anyhow::Result<CanvasConfig> {
        let mut canvas = CanvasConfig::new(self.canvas_params());
        for spec in &self.nodes {
            canvas.add_node(spec)?;
        }
        canvas.validate()?;
        Ok(canvas)
    }

    /// Resolves the executable path used in launch/kill templates.
    pub fn executable(&self) -> anyhow::Result<String> {
        if let Some(exe) = &self.node_executable {
            return Ok(exe.clone());
        }
        let exe = std::env::current_exe()?;
        Ok(exe.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> HeadConfig {
        HeadConfig::parse_from([
            "arcwall_head",
            "--tiles-x",
            "2",
            "--tiles-y",
            "1",
            "--node",
            "local=t0x0",
            "--node",
            "n1=t1x0",
        ])
    }

    #[test]
    fn canvas_builds_from_node_specs() {
        let cfg = minimal();
        let canvas = cfg.build_canvas().unwrap();
        assert_eq!(canvas.nodes.len(), 2);
        assert_eq!(canvas.num_tiles(), 2);
        assert_eq!(canvas.canvas_pixel_size, UVec2::new(2560, 720));
    }

    #[test]
    fn invalid_specs_surface_at_startup() {
        let cfg = HeadConfig::parse_from([
            "arcwall_head",
            "--node",
            "n1=t0x0", // no local node
        ]);
        assert!(cfg.build_canvas().is_err());
    }

    #[test]
    fn cylinder_settings_carry_calibration() {
        let mut cfg = minimal();
        cfg.door_gap_deg = 20.0;
        cfg.screen_x_trim = 0.01;
        let settings = cfg.cylinder_settings();
        assert_eq!(settings.door_gap_deg, 20.0);
        assert_eq!(settings.x_trim, 0.01);
    }
}
