use anyhow::{Context, Result};
use plume_graph::NodeId;
use plume_locator::{LocatorConfig, OriginChoice, DEFAULT_SENSORS_PER_ROUND};
use serde::Deserialize;
use std::path::Path;

/// `plume.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub run: RunSection,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunSection {
    pub sink: Option<u64>,
    pub sensors_per_round: Option<usize>,
    pub origin: Option<u64>,
    pub seed: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&raw).with_context(|| format!("Invalid {}", path.display()))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }
}

/// Values given on the command line; each one wins over the file
#[derive(Debug, Clone, Copy, Default)]
pub struct RunOverrides {
    pub sink: Option<u64>,
    pub sensors_per_round: Option<usize>,
    pub origin: Option<u64>,
    pub seed: Option<u64>,
}

pub fn resolve_locator_config(file: &FileConfig, overrides: RunOverrides) -> Result<LocatorConfig> {
    let sink = overrides
        .sink
        .or(file.run.sink)
        .context("No sink configured: pass --sink or set run.sink in the config file")?;

    let config = LocatorConfig {
        sink: NodeId(sink),
        sensors_per_round: overrides
            .sensors_per_round
            .or(file.run.sensors_per_round)
            .unwrap_or(DEFAULT_SENSORS_PER_ROUND),
        origin: overrides
            .origin
            .or(file.run.origin)
            .map_or(OriginChoice::Arbitrary, |id| OriginChoice::Explicit(NodeId(id))),
        seed: overrides.seed.or(file.run.seed),
    };
    config.validate()?;
    Ok(config)
}
