use crate::error::{LocateError, Result};
use plume_graph::NodeId;
use serde::{Deserialize, Serialize};

/// Sensors placed per round unless configured otherwise
pub const DEFAULT_SENSORS_PER_ROUND: usize = 3;

/// How the hidden origin of a simulated run is picked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OriginChoice {
    /// Use this node when it is an eligible candidate, otherwise pick arbitrarily
    Explicit(NodeId),
    Arbitrary,
}

/// Fixed inputs of one localization run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorConfig {
    pub sink: NodeId,

    /// Per-round sensor budget `K`
    pub sensors_per_round: usize,

    pub origin: OriginChoice,

    /// Seed for arbitrary origin selection; `None` draws from the thread RNG
    pub seed: Option<u64>,
}

impl LocatorConfig {
    pub fn new(sink: NodeId) -> Self {
        Self {
            sink,
            sensors_per_round: DEFAULT_SENSORS_PER_ROUND,
            origin: OriginChoice::Arbitrary,
            seed: None,
        }
    }

    #[must_use]
    pub fn with_sensors_per_round(mut self, sensors: usize) -> Self {
        self.sensors_per_round = sensors;
        self
    }

    #[must_use]
    pub fn with_origin(mut self, origin: NodeId) -> Self {
        self.origin = OriginChoice::Explicit(origin);
        self
    }

    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.sensors_per_round == 0 {
            return Err(LocateError::InvalidConfig(
                "sensors_per_round must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_methods_fill_in_overrides() {
        let config = LocatorConfig::new(NodeId(1))
            .with_sensors_per_round(2)
            .with_origin(NodeId(5))
            .with_seed(9);

        assert_eq!(config.sensors_per_round, 2);
        assert_eq!(config.origin, OriginChoice::Explicit(NodeId(5)));
        assert_eq!(config.seed, Some(9));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_sensor_budget_is_rejected() {
        let config = LocatorConfig::new(NodeId(1)).with_sensors_per_round(0);
        assert!(matches!(
            config.validate(),
            Err(LocateError::InvalidConfig(_))
        ));
    }
}
