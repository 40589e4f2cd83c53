use crate::botview::{GridRenderer, MAX_CANVAS_SIDE, MAX_CELL_SIZE};
use anyhow::Context;
use botscope_protocol::WorldConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DebuggerConfig {
    /// Pixels per bot-view cell.
    pub cell_size: u32,
    /// Canvas side in cells; views are centred inside it.
    pub max_view_size: u32,
    pub playback_interval_ms: u64,
    /// Turns requested per playback tick.
    pub playback_steps: u32,
    /// World parameters for new sandboxes.
    pub world: WorldConfig,
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            cell_size: 7,
            max_view_size: 31,
            playback_interval_ms: 100,
            playback_steps: 2,
            world: WorldConfig::default(),
        }
    }
}

impl DebuggerConfig {
    pub fn from_yaml(raw: &str) -> anyhow::Result<Self> {
        let cfg: Self = serde_yaml::from_str(raw).context("parse debugger config")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read config: {}", path.display()))?;
        Self::from_yaml(&raw).with_context(|| format!("load config: {}", path.display()))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            (1..=MAX_CELL_SIZE).contains(&self.cell_size),
            "cell_size must be between 1 and {MAX_CELL_SIZE}"
        );
        anyhow::ensure!(self.max_view_size > 0, "max_view_size must be positive");
        let side = self.max_view_size.checked_mul(self.cell_size);
        anyhow::ensure!(
            side.is_some_and(|side| side <= MAX_CANVAS_SIDE),
            "canvas of {} cells of {}px exceeds {MAX_CANVAS_SIDE}px",
            self.max_view_size,
            self.cell_size
        );
        anyhow::ensure!(
            self.playback_interval_ms > 0,
            "playback_interval_ms must be positive"
        );
        anyhow::ensure!(self.playback_steps > 0, "playback_steps must be positive");
        Ok(())
    }

    pub fn renderer(&self) -> GridRenderer {
        GridRenderer::new(self.cell_size, self.max_view_size)
    }

    pub fn playback_interval(&self) -> Duration {
        Duration::from_millis(self.playback_interval_ms)
    }
}
