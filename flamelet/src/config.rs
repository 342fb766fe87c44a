use anyhow::{Context, Result};
use std::{fs::File, io::Read};

use serde::{Deserialize, Serialize};

use crate::sample::EventKind;

/// How a frame tree is assembled from samples.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Eq, PartialEq)]
pub struct BuildOptions {
    #[serde(default)]
    pub thread_mode: bool,
    #[serde(default = "default_true")]
    pub lambda_collapse: bool,
    #[serde(default)]
    pub event_kind: EventKind,
}

fn default_true() -> bool {
    true
}

impl BuildOptions {
    pub fn new(event_kind: EventKind) -> Self {
        Self {
            thread_mode: false,
            lambda_collapse: true,
            event_kind,
        }
    }

    pub fn thread_mode(mut self, enabled: bool) -> Self {
        self.thread_mode = enabled;
        self
    }

    pub fn lambda_collapse(mut self, enabled: bool) -> Self {
        self.lambda_collapse = enabled;
        self
    }
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::new(EventKind::Execution)
    }
}

/// Rendering defaults, overridable from a toml file. Both thresholds are
/// percentages of the graph's total weight.
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct RenderConfig {
    #[serde(default = "default_min_width_pct")]
    pub min_width_pct: f64,
    #[serde(default = "default_min_samples_pct")]
    pub min_samples_pct: f64,
}

fn default_min_width_pct() -> f64 {
    0.1
}

fn default_min_samples_pct() -> f64 {
    0.1
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            min_width_pct: default_min_width_pct(),
            min_samples_pct: default_min_samples_pct(),
        }
    }
}

impl RenderConfig {
    pub fn from_path(path: &str) -> Result<Self> {
        let mut config_file =
            File::open(path).with_context(|| format!("config not found at {path}"))?;
        let mut contents = String::new();
        config_file
            .read_to_string(&mut contents)
            .with_context(|| format!("something went wrong reading {path}"))?;
        let config: RenderConfig = toml::from_str(&contents)?;
        Ok(config)
    }
}
