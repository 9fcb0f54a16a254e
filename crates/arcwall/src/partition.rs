//! Cluster partitioning: configuration artifact and node launch plans.
//!
//! Walks the node/tile tables and emits (a) the textual cluster
//! configuration consumed by the rendering runtime and (b) the launch/kill
//! command lists for remote nodes. The artifact is assembled as a typed block
//! tree and serialized once, so generation logic carries no indentation
//! bookkeeping.

use crate::config::{CanvasConfig, NodeConfig, Tile};
use glam::Vec3;
use std::fmt::{self, Write as _};
use std::io;
use std::path::PathBuf;

enum Item {
    Line(String),
    Block(Block),
}

/// One named `{ ... }` block of the cluster configuration artifact.
pub struct Block {
    name: String,
    items: Vec<Item>,
}

impl Block {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            items: Vec::new(),
        }
    }

    pub fn line(&mut self, line: impl Into<String>) {
        self.items.push(Item::Line(line.into()));
    }

    pub fn push(&mut self, block: Block) {
        self.items.push(Item::Block(block));
    }

    fn write(&self, out: &mut String, depth: usize) {
        let indent = "\t".repeat(depth);
        let _ = writeln!(out, "{indent}{}", self.name);
        let _ = writeln!(out, "{indent}{{");
        for item in &self.items {
            match item {
                Item::Line(line) => {
                    let _ = writeln!(out, "{indent}\t{line}");
                }
                Item::Block(block) => block.write(out, depth + 1),
            }
        }
        let _ = writeln!(out, "{indent}}}");
    }
}

/// A whole artifact: a sequence of top-level blocks.
#[derive(Default)]
pub struct Doc {
    blocks: Vec<Block>,
}

impl Doc {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }
}

impl fmt::Display for Doc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = String::new();
        for block in &self.blocks {
            block.write(&mut out, 0);
        }
        f.write_str(&out)
    }
}

/// True when at least one of the node's tiles is enabled. Inactive nodes are
/// omitted from the generated configuration entirely.
pub fn node_is_active(cfg: &CanvasConfig, node: &NodeConfig) -> bool {
    node.tiles.iter().any(|&id| cfg.tile(id).enabled)
}

fn fmt_corner(v: Vec3) -> String {
    format!("[ {:.3} {:.3} {:.3} ]", v.x, v.y, v.z)
}

fn wall_block(tile: &Tile) -> Block {
    let mut wall = Block::new("wall");
    wall.line(format!("bottom_left {}", fmt_corner(tile.corners.bottom_left)));
    wall.line(format!("bottom_right {}", fmt_corner(tile.corners.bottom_right)));
    wall.line(format!("top_left {}", fmt_corner(tile.corners.top_left)));
    wall
}

fn window_block(cfg: &CanvasConfig, tile: &Tile) -> Block {
    let mut window = Block::new("window");
    window.line(format!("name \"{}\"", tile.name));

    let pos = tile.position + cfg.params.window_offset;
    window.line(format!(
        "viewport [{} {} {} {}]",
        pos.x, pos.y, tile.pixel_size.x, tile.pixel_size.y
    ));

    let mut channel = Block::new("channel");
    channel.line(format!("name \"{}\"", tile.name));
    window.push(channel);

    if cfg.params.fullscreen {
        let mut attrs = Block::new("attributes");
        attrs.line("hint_fullscreen ON");
        attrs.line("hint_decoration OFF");
        window.push(attrs);
    } else if cfg.params.borderless || tile.borderless {
        let mut attrs = Block::new("attributes");
        attrs.line("hint_decoration OFF");
        window.push(attrs);
    }

    window
}

fn node_block(cfg: &CanvasConfig, node: &NodeConfig) -> Block {
    let mut block;
    if node.is_remote() {
        block = Block::new("node");
        let mut connection = Block::new("connection");
        connection.line("type TCPIP");
        connection.line(format!("hostname \"{}\"", node.hostname));
        connection.line(format!("port {}", cfg.params.base_port + node.port));
        block.push(connection);
    } else {
        block = Block::new("appNode");
    }

    let mut attrs = Block::new("attributes");
    attrs.line("thread_model DRAW_SYNC");
    block.push(attrs);

    // Consecutive tiles sharing a GPU device share a pipe block; a device
    // change closes the current pipe and opens a new one.
    let mut current_device: Option<u32> = None;
    let mut pipe: Option<Block> = None;
    for &id in &node.tiles {
        let tile = cfg.tile(id);
        if !tile.enabled {
            continue;
        }
        if current_device != Some(tile.device) {
            if let Some(done) = pipe.take() {
                block.push(done);
            }
            let mut next = Block::new("pipe");
            next.line(format!("name \"{}-{}\"", tile.name, tile.device));
            next.line("port 0");
            next.line(format!("device {}", tile.device));
            pipe = Some(next);
            current_device = Some(tile.device);
        }
        pipe.as_mut()
            .expect("pipe block opened above")
            .push(window_block(cfg, tile));
    }
    if let Some(done) = pipe.take() {
        block.push(done);
    }

    block
}

/// Generates the cluster configuration artifact for the canvas.
///
/// Nodes whose tiles are all disabled are skipped. The compound section
/// lists one channel/wall per enabled tile (insertion order), wrapped in a
/// swap barrier when swap sync is enabled.
pub fn generate_cluster_config(cfg: &CanvasConfig) -> String {
    let mut doc = Doc::new();

    let mut global = Block::new("global");
    global.line("eye_base 0.06");
    global.line("stencil ON");
    doc.push(global);

    let mut server = Block::new("server");

    let mut connection = Block::new("connection");
    connection.line("type TCPIP");
    connection.line(format!("port {}", cfg.params.base_port));
    server.push(connection);

    let mut config = Block::new("config");
    config.line(format!("latency {}", cfg.params.latency));

    for node in &cfg.nodes {
        if !node_is_active(cfg, node) {
            continue;
        }
        config.push(node_block(cfg, node));
    }

    let mut compound = Block::new("compound");
    for (_, tile) in cfg.tiles() {
        if !tile.enabled {
            continue;
        }
        if cfg.params.swap_sync {
            let mut inner = Block::new("compound");
            let mut barrier = Block::new("swapbarrier");
            barrier.line("name \"defaultbarrier\"");
            inner.push(barrier);
            inner.line(format!("channel \"{}\"", tile.name));
            inner.push(wall_block(tile));
            compound.push(inner);
        } else {
            compound.line(format!("channel \"{}\"", tile.name));
            compound.push(wall_block(tile));
        }
    }
    config.push(compound);

    server.push(config);
    doc.push(server);

    doc.to_string()
}

/// Writes the artifact to the configured path, unless generation is
/// disabled. Returns the path written, if any.
pub fn write_cluster_config(cfg: &CanvasConfig) -> io::Result<Option<PathBuf>> {
    if !cfg.params.generate_artifact {
        return Ok(None);
    }
    let text = generate_cluster_config(cfg);
    std::fs::write(&cfg.params.artifact_path, text)?;
    Ok(Some(cfg.params.artifact_path.clone()))
}

/// One shell command targeting one remote node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCommand {
    pub hostname: String,
    /// Absolute port the node will listen on (base + relative).
    pub port: u16,
    pub command: String,
}

/// Substitutes the launcher/killer template placeholders: `%c` executable,
/// `%h` hostname, `%d` current working directory.
pub fn substitute_template(template: &str, executable: &str, hostname: &str, cwd: &str) -> String {
    template
        .replace("%c", executable)
        .replace("%h", hostname)
        .replace("%d", cwd)
}

/// Builds the launch command list: one per active remote node, in node
/// declaration order.
pub fn launch_plan(cfg: &CanvasConfig, executable: &str, cwd: &str) -> Vec<NodeCommand> {
    cfg.nodes
        .iter()
        .filter(|n| n.is_remote() && node_is_active(cfg, n))
        .map(|n| NodeCommand {
            hostname: n.hostname.clone(),
            port: cfg.params.base_port + n.port,
            command: substitute_template(&cfg.params.node_launcher, executable, &n.hostname, cwd),
        })
        .collect()
}

/// Builds the teardown command list, mirroring [`launch_plan`] with the kill
/// template. Empty when no kill template is configured.
pub fn kill_plan(cfg: &CanvasConfig, executable: &str, cwd: &str) -> Vec<NodeCommand> {
    if cfg.params.node_killer.is_empty() {
        return Vec::new();
    }
    cfg.nodes
        .iter()
        .filter(|n| n.is_remote() && node_is_active(cfg, n))
        .map(|n| NodeCommand {
            hostname: n.hostname.clone(),
            port: cfg.params.base_port + n.port,
            command: substitute_template(&cfg.params.node_killer, executable, &n.hostname, cwd),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CanvasConfig, CanvasParams};
    use glam::UVec2;

    /// Enables every declared tile without going through a topology build.
    fn enable_all(cfg: &mut CanvasConfig) {
        for (_, tile) in cfg.tiles_mut() {
            tile.enabled = true;
        }
    }

    fn base_canvas() -> CanvasConfig {
        CanvasConfig::new(CanvasParams {
            tile_grid_size: UVec2::new(3, 1),
            base_port: 24000,
            latency: 1,
            ..CanvasParams::default()
        })
    }

    #[test]
    fn consecutive_devices_share_a_pipe() {
        let mut cfg = base_canvas();
        cfg.add_node("local=t0x0@0,t1x0@0,t2x0@1").unwrap();
        enable_all(&mut cfg);

        let text = generate_cluster_config(&cfg);

        // Devices [0, 0, 1] produce exactly two pipe blocks.
        let pipes: Vec<usize> = text.match_indices("\tpipe\n").map(|(i, _)| i).collect();
        assert_eq!(pipes.len(), 2);

        // First pipe holds two windows, the second one.
        let second_pipe = pipes[1];
        let windows_before = text[..second_pipe].matches("window").count();
        let windows_after = text[second_pipe..].matches("window").count();
        assert_eq!(windows_before, 2);
        assert_eq!(windows_after, 1);
    }

    #[test]
    fn inactive_nodes_are_omitted() {
        let mut cfg = base_canvas();
        cfg.add_node("local=t0x0").unwrap();
        cfg.add_node("ghost-node=t1x0").unwrap();
        // Only the local node's tile is enabled.
        let id = cfg.tile_by_name("t0x0").unwrap();
        cfg.tile_mut(id).enabled = true;

        let text = generate_cluster_config(&cfg);
        assert!(text.contains("appNode"));
        assert!(!text.contains("ghost-node"));
    }

    #[test]
    fn remote_nodes_get_connection_blocks() {
        let mut cfg = base_canvas();
        cfg.add_node("local=t0x0").unwrap();
        cfg.add_node("render-01:3=t1x0").unwrap();
        enable_all(&mut cfg);

        let text = generate_cluster_config(&cfg);
        assert!(text.contains("hostname \"render-01\""));
        assert!(text.contains("port 24003"));
        assert!(text.contains("thread_model DRAW_SYNC"));
        // The server connection advertises the base port.
        assert!(text.contains("port 24000"));
        assert!(text.contains("latency 1"));
    }

    #[test]
    fn swap_sync_wraps_channels_in_barriers() {
        let mut cfg = base_canvas();
        cfg.params.swap_sync = true;
        cfg.add_node("local=t0x0,t1x0").unwrap();
        enable_all(&mut cfg);

        let text = generate_cluster_config(&cfg);
        assert_eq!(text.matches("swapbarrier").count(), 2);
        assert!(text.contains("name \"defaultbarrier\""));
        assert_eq!(text.matches("bottom_left").count(), 2);
        assert_eq!(text.matches("top_left").count(), 2);
    }

    #[test]
    fn fullscreen_emits_window_hints() {
        let mut cfg = base_canvas();
        cfg.params.fullscreen = true;
        cfg.add_node("local=t0x0").unwrap();
        enable_all(&mut cfg);

        let text = generate_cluster_config(&cfg);
        assert!(text.contains("hint_fullscreen ON"));
        assert!(text.contains("hint_decoration OFF"));
    }

    #[test]
    fn template_substitution_covers_all_placeholders() {
        let cmd = substitute_template("ssh %h %c --cwd %d", "/opt/app", "node-7", "/home/run");
        assert_eq!(cmd, "ssh node-7 /opt/app --cwd /home/run");
    }

    #[test]
    fn launch_plan_skips_local_and_inactive_nodes() {
        let mut cfg = base_canvas();
        cfg.params.node_launcher = "ssh %h %c".into();
        cfg.params.node_killer = "ssh %h killall %c".into();
        cfg.add_node("local=t0x0").unwrap();
        cfg.add_node("n1=t1x0").unwrap();
        cfg.add_node("n2=t2x0").unwrap();
        // n2's tile stays disabled.
        for name in ["t0x0", "t1x0"] {
            let id = cfg.tile_by_name(name).unwrap();
            cfg.tile_mut(id).enabled = true;
        }

        let plan = launch_plan(&cfg, "/opt/wall", "/tmp");
        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].hostname, "n1");
        assert_eq!(plan[0].port, 24001);
        assert_eq!(plan[0].command, "ssh n1 /opt/wall");

        let kills = kill_plan(&cfg, "/opt/wall", "/tmp");
        assert_eq!(kills.len(), 1);
        assert_eq!(kills[0].command, "ssh n1 killall /opt/wall");

        cfg.params.node_killer.clear();
        assert!(kill_plan(&cfg, "/opt/wall", "/tmp").is_empty());
    }

    #[test]
    fn artifact_generation_can_be_disabled() {
        let mut cfg = base_canvas();
        cfg.params.generate_artifact = false;
        cfg.add_node("local=t0x0").unwrap();
        enable_all(&mut cfg);
        assert_eq!(write_cluster_config(&cfg).unwrap(), None);
    }
}
